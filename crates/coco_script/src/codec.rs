//! Native struct layouts for value records
//!
//! Parses Objective-C `@encode` strings such as `{CGPoint=dd}` or
//! `{CGRect={CGPoint=ff}{CGSize=ff}}` and packs records into (or out of) the
//! matching native byte layout. Byte order is the host's.

use bytemuck::Pod;

use crate::error::ValueError;
use crate::value::{StructKind, StructValue};

/// Width and kind of every field in a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scalar {
    F32,
    F64,
    U32,
    U64,
}

impl Scalar {
    fn from_code(code: char) -> Option<Self> {
        match code {
            'f' => Some(Scalar::F32),
            'd' => Some(Scalar::F64),
            'I' | 'L' => Some(Scalar::U32),
            'Q' => Some(Scalar::U64),
            _ => None,
        }
    }

    pub fn size(self) -> usize {
        match self {
            Scalar::F32 | Scalar::U32 => 4,
            Scalar::F64 | Scalar::U64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Scalar::F32 => "f32",
            Scalar::F64 => "f64",
            Scalar::U32 => "u32",
            Scalar::U64 => "u64",
        }
    }
}

/// A record kind together with its native scalar width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StructLayout {
    pub kind: StructKind,
    pub scalar: Scalar,
}

impl StructLayout {
    pub const fn new(kind: StructKind, scalar: Scalar) -> Self {
        Self { kind, scalar }
    }

    /// Parse an Objective-C struct type encoding.
    pub fn parse(encoding: &str) -> Result<Self, ValueError> {
        let unsupported = || ValueError::UnsupportedEncoding(encoding.to_string());

        let inner = encoding
            .trim()
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .ok_or_else(unsupported)?;
        let (name, body) = inner.split_once('=').ok_or_else(unsupported)?;

        let kind = match name {
            "CGPoint" | "NSPoint" => StructKind::Point,
            "CGSize" | "NSSize" => StructKind::Size,
            "CGRect" | "NSRect" => StructKind::Rect,
            "_NSRange" | "NSRange" => StructKind::Range,
            "CGAffineTransform" => StructKind::AffineTransform,
            "UIEdgeInsets" | "NSEdgeInsets" => StructKind::EdgeInsets,
            _ => return Err(unsupported()),
        };

        // Nested structs contribute their scalars in order; their names are skipped.
        let mut codes = Vec::new();
        let mut chars = body.chars();
        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    if !chars.by_ref().any(|c| c == '=') {
                        return Err(unsupported());
                    }
                }
                '}' => {}
                c => codes.push(Scalar::from_code(c).ok_or_else(unsupported)?),
            }
        }

        let scalar = *codes.first().ok_or_else(unsupported)?;
        if codes.len() != kind.fields().len() || codes.iter().any(|s| *s != scalar) {
            return Err(unsupported());
        }

        Ok(Self { kind, scalar })
    }

    /// Native size in bytes.
    pub fn size(&self) -> usize {
        self.kind.fields().len() * self.scalar.size()
    }

    pub fn pack(&self, value: &StructValue) -> Result<Vec<u8>, ValueError> {
        if value.kind() != self.kind {
            return Err(ValueError::KindMismatch {
                expected: self.kind,
                found: value.kind(),
            });
        }

        let values = value.values();
        let bytes = match self.scalar {
            Scalar::F32 => to_bytes(self.narrow(&values)?.into_iter()),
            Scalar::F64 => to_bytes(values.iter().copied()),
            Scalar::U32 => to_bytes(self.unsigned(&values, U32_LIMIT)?.map(|v| v as u32)),
            Scalar::U64 => to_bytes(self.unsigned(&values, U64_LIMIT)?.map(|v| v as u64)),
        };
        Ok(bytes)
    }

    pub fn unpack(&self, bytes: &[u8]) -> Result<StructValue, ValueError> {
        if bytes.len() != self.size() {
            return Err(ValueError::BufferSize {
                kind: self.kind,
                expected: self.size(),
                actual: bytes.len(),
            });
        }

        let values: Vec<f64> = match self.scalar {
            Scalar::F32 => from_bytes::<f32>(bytes).map(f64::from).collect(),
            Scalar::F64 => from_bytes::<f64>(bytes).collect(),
            Scalar::U32 => from_bytes::<u32>(bytes).map(f64::from).collect(),
            Scalar::U64 => from_bytes::<u64>(bytes).map(|v| v as f64).collect(),
        };
        Ok(StructValue::from_values(self.kind, &values))
    }

    /// Narrow to `f32`; values beyond its range would silently become infinite.
    fn narrow(&self, values: &[f64]) -> Result<Vec<f32>, ValueError> {
        self.kind
            .fields()
            .iter()
            .zip(values)
            .map(|(field, value)| {
                let narrowed = *value as f32;
                if narrowed.is_finite() {
                    Ok(narrowed)
                } else {
                    Err(self.unrepresentable(*field, *value))
                }
            })
            .collect()
    }

    /// `limit` is exclusive: the first whole number the target type cannot hold.
    fn unsigned<'a>(
        &self,
        values: &'a [f64],
        limit: f64,
    ) -> Result<impl Iterator<Item = f64> + 'a, ValueError> {
        let fields = self.kind.fields();
        for (field, value) in fields.iter().zip(values) {
            if *value < 0.0 || *value >= limit || value.fract() != 0.0 {
                return Err(self.unrepresentable(*field, *value));
            }
        }
        Ok(values.iter().copied())
    }

    fn unrepresentable(&self, field: &'static str, value: f64) -> ValueError {
        ValueError::Unrepresentable {
            kind: self.kind,
            field,
            value,
            scalar: self.scalar.name(),
        }
    }
}

// `u64::MAX as f64` rounds up to 2^64, so the bounds are spelled out.
const U32_LIMIT: f64 = 4_294_967_296.0;
const U64_LIMIT: f64 = 18_446_744_073_709_551_616.0;

fn to_bytes<T: Pod>(values: impl Iterator<Item = T>) -> Vec<u8> {
    let values: Vec<T> = values.collect();
    bytemuck::cast_slice(&values).to_vec()
}

fn from_bytes<T: Pod>(bytes: &[u8]) -> impl Iterator<Item = T> + '_ {
    bytes
        .chunks_exact(std::mem::size_of::<T>())
        .map(bytemuck::pod_read_unaligned::<T>)
}
