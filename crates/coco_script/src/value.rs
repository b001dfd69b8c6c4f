//! Value records shared between scripts and the host
//!
//! Every record is a plain bag of `f64` fields. Typed constructors (`Point::new`)
//! take numbers and cannot fail; the error path is reserved for dynamically
//! typed input crossing a boundary (script arguments, JSON), handled by
//! [`Record::from_args`], [`Record::from_json`] and the `FromJs` impls.
//!
//! No range checks are applied: a negative width or a zero-length range is
//! accepted as given.

use std::fmt;

use rquickjs::{Ctx, Exception, FromJs, IntoJs, Object};
use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// A dynamically typed argument that may or may not hold a number.
pub trait NumericArg {
    /// The numeric value, if this argument is of numeric kind.
    fn as_number(&self) -> Option<f64>;

    /// Human readable rendering used in diagnostics.
    fn describe(&self) -> String;
}

impl NumericArg for f64 {
    fn as_number(&self) -> Option<f64> {
        Some(*self)
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

impl NumericArg for serde_json::Value {
    fn as_number(&self) -> Option<f64> {
        self.as_f64()
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

impl<'js> NumericArg for rquickjs::Value<'js> {
    fn as_number(&self) -> Option<f64> {
        rquickjs::Value::as_number(self)
    }

    fn describe(&self) -> String {
        if self.is_undefined() {
            "undefined".to_string()
        } else if self.is_null() {
            "null".to_string()
        } else if let Some(b) = self.as_bool() {
            b.to_string()
        } else if let Some(n) = rquickjs::Value::as_number(self) {
            n.to_string()
        } else if let Some(s) = self.as_string() {
            match s.to_string() {
                Ok(s) => format!("{s:?}"),
                Err(_) => "<string>".to_string(),
            }
        } else {
            format!("<{}>", self.type_name())
        }
    }
}

/// Validate `(field, argument)` pairs, collecting every offending field.
///
/// A missing argument is reported as `undefined`. Non-finite numbers are
/// rejected along with non-numbers.
pub(crate) fn check_fields<'a, A, I>(record: &'static str, fields: I) -> Result<Vec<f64>, ValueError>
where
    A: NumericArg + 'a,
    I: IntoIterator<Item = (&'static str, Option<&'a A>)>,
{
    let mut values = Vec::new();
    let mut offending = Vec::new();

    for (field, arg) in fields {
        match arg.and_then(NumericArg::as_number).filter(|n| n.is_finite()) {
            Some(n) => values.push(n),
            None => {
                let actual = arg.map_or_else(|| "undefined".to_string(), NumericArg::describe);
                offending.push(format!("{field}={actual}"));
            }
        }
    }

    if offending.is_empty() {
        Ok(values)
    } else {
        Err(ValueError::InvalidArgumentType {
            record,
            details: offending.join(", "),
        })
    }
}

/// A fixed-shape record of named numeric fields.
pub trait Record: Sized + Copy {
    const NAME: &'static str;
    const FIELDS: &'static [&'static str];
    const KIND: StructKind;

    /// Build from values in field order. Missing trailing values read as zero.
    fn from_values(values: &[f64]) -> Self;

    /// Field values in declaration order.
    fn values(&self) -> Vec<f64>;

    /// Validate positional arguments. Extra arguments are ignored.
    fn from_args<A: NumericArg>(args: &[A]) -> Result<Self, ValueError> {
        let pairs = Self::FIELDS
            .iter()
            .enumerate()
            .map(|(i, field)| (*field, args.get(i)));
        let values = check_fields(Self::NAME, pairs)?;
        Ok(Self::from_values(&values))
    }

    /// Validate a JSON object with the named fields, or a positional array.
    fn from_json(value: &serde_json::Value) -> Result<Self, ValueError> {
        match value {
            serde_json::Value::Array(items) => Self::from_args(items),
            serde_json::Value::Object(map) => {
                let pairs = Self::FIELDS.iter().map(|field| (*field, map.get(*field)));
                let values = check_fields(Self::NAME, pairs)?;
                Ok(Self::from_values(&values))
            }
            other => Err(ValueError::NotARecord {
                record: Self::NAME,
                found: other.to_string(),
            }),
        }
    }
}

pub(crate) fn record_into_js<'js, R: Record>(record: R, ctx: &Ctx<'js>) -> rquickjs::Result<rquickjs::Value<'js>> {
    let object = Object::new(ctx.clone())?;
    for (field, value) in R::FIELDS.iter().zip(record.values()) {
        object.set(*field, value)?;
    }
    Ok(object.into_value())
}

pub(crate) fn record_from_js<'js, R: Record>(ctx: &Ctx<'js>, value: rquickjs::Value<'js>) -> rquickjs::Result<R> {
    let object = value.as_object().ok_or(rquickjs::Error::FromJs {
        from: value.type_name(),
        to: R::NAME,
        message: Some("expected an object".to_string()),
    })?;

    let fields = R::FIELDS
        .iter()
        .map(|field| object.get::<_, rquickjs::Value>(*field))
        .collect::<rquickjs::Result<Vec<_>>>()?;

    let pairs = R::FIELDS.iter().copied().zip(fields.iter().map(Some));
    match check_fields(R::NAME, pairs) {
        Ok(values) => Ok(R::from_values(&values)),
        Err(e) => Err(Exception::throw_type(ctx, &e.to_string())),
    }
}

macro_rules! value_record {
    ($(#[$meta:meta])* $name:ident => $kind:ident { $($field:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
        pub struct $name {
            $(pub $field: f64,)+
        }

        impl $name {
            #[allow(clippy::too_many_arguments)]
            pub const fn new($($field: f64),+) -> Self {
                Self { $($field),+ }
            }
        }

        impl Record for $name {
            const NAME: &'static str = stringify!($name);
            const FIELDS: &'static [&'static str] = &[$(stringify!($field)),+];
            const KIND: StructKind = StructKind::$kind;

            fn from_values(values: &[f64]) -> Self {
                let mut iter = values.iter().copied();
                Self {
                    $($field: iter.next().unwrap_or_default(),)+
                }
            }

            fn values(&self) -> Vec<f64> {
                vec![$(self.$field),+]
            }
        }

        impl From<$name> for StructValue {
            fn from(record: $name) -> Self {
                StructValue::$kind(record)
            }
        }

        impl<'js> IntoJs<'js> for $name {
            fn into_js(self, ctx: &Ctx<'js>) -> rquickjs::Result<rquickjs::Value<'js>> {
                record_into_js(self, ctx)
            }
        }

        impl<'js> FromJs<'js> for $name {
            fn from_js(ctx: &Ctx<'js>, value: rquickjs::Value<'js>) -> rquickjs::Result<Self> {
                record_from_js(ctx, value)
            }
        }
    };
}

value_record! {
    /// A location in a 2D coordinate space.
    Point => Point { x, y }
}

value_record! {
    /// A 2D extent.
    Size => Size { width, height }
}

value_record! {
    /// An origin plus an extent.
    Rect => Rect { x, y, width, height }
}

value_record! {
    /// A span within a sequence.
    Range => Range { location, length }
}

value_record! {
    /// A 2D affine transform matrix `[a b 0; c d 0; tx ty 1]`.
    AffineTransform => AffineTransform { a, b, c, d, tx, ty }
}

value_record! {
    EdgeInsets => EdgeInsets { top, left, bottom, right }
}

impl Rect {
    pub const fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub const fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl AffineTransform {
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);
}

/// The kinds of record that cross the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructKind {
    Point,
    Size,
    Rect,
    Range,
    AffineTransform,
    EdgeInsets,
}

impl StructKind {
    pub const ALL: [StructKind; 6] = [
        StructKind::Point,
        StructKind::Size,
        StructKind::Rect,
        StructKind::Range,
        StructKind::AffineTransform,
        StructKind::EdgeInsets,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StructKind::Point => Point::NAME,
            StructKind::Size => Size::NAME,
            StructKind::Rect => Rect::NAME,
            StructKind::Range => Range::NAME,
            StructKind::AffineTransform => AffineTransform::NAME,
            StructKind::EdgeInsets => EdgeInsets::NAME,
        }
    }

    pub fn fields(self) -> &'static [&'static str] {
        match self {
            StructKind::Point => Point::FIELDS,
            StructKind::Size => Size::FIELDS,
            StructKind::Rect => Rect::FIELDS,
            StructKind::Range => Range::FIELDS,
            StructKind::AffineTransform => AffineTransform::FIELDS,
            StructKind::EdgeInsets => EdgeInsets::FIELDS,
        }
    }
}

impl fmt::Display for StructKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Any record, tagged with its kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum StructValue {
    Point(Point),
    Size(Size),
    Rect(Rect),
    Range(Range),
    AffineTransform(AffineTransform),
    EdgeInsets(EdgeInsets),
}

impl StructValue {
    pub fn kind(&self) -> StructKind {
        match self {
            StructValue::Point(_) => StructKind::Point,
            StructValue::Size(_) => StructKind::Size,
            StructValue::Rect(_) => StructKind::Rect,
            StructValue::Range(_) => StructKind::Range,
            StructValue::AffineTransform(_) => StructKind::AffineTransform,
            StructValue::EdgeInsets(_) => StructKind::EdgeInsets,
        }
    }

    pub fn values(&self) -> Vec<f64> {
        match self {
            StructValue::Point(r) => r.values(),
            StructValue::Size(r) => r.values(),
            StructValue::Rect(r) => r.values(),
            StructValue::Range(r) => r.values(),
            StructValue::AffineTransform(r) => r.values(),
            StructValue::EdgeInsets(r) => r.values(),
        }
    }

    pub fn from_values(kind: StructKind, values: &[f64]) -> Self {
        match kind {
            StructKind::Point => Point::from_values(values).into(),
            StructKind::Size => Size::from_values(values).into(),
            StructKind::Rect => Rect::from_values(values).into(),
            StructKind::Range => Range::from_values(values).into(),
            StructKind::AffineTransform => AffineTransform::from_values(values).into(),
            StructKind::EdgeInsets => EdgeInsets::from_values(values).into(),
        }
    }
}

impl<'js> IntoJs<'js> for StructValue {
    fn into_js(self, ctx: &Ctx<'js>) -> rquickjs::Result<rquickjs::Value<'js>> {
        match self {
            StructValue::Point(r) => r.into_js(ctx),
            StructValue::Size(r) => r.into_js(ctx),
            StructValue::Rect(r) => r.into_js(ctx),
            StructValue::Range(r) => r.into_js(ctx),
            StructValue::AffineTransform(r) => r.into_js(ctx),
            StructValue::EdgeInsets(r) => r.into_js(ctx),
        }
    }
}
