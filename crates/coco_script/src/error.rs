use thiserror::Error;

use crate::value::StructKind;

/// Errors raised while building or converting value records.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    /// One or more arguments were not finite numbers. `details` lists every
    /// offending field as `field=value`.
    #[error("invalid argument type for {record}: expected numbers, got {details}")]
    InvalidArgumentType {
        record: &'static str,
        details: String,
    },

    #[error("{record} expects an object or an array, got {found}")]
    NotARecord { record: &'static str, found: String },

    #[error("unsupported struct encoding '{0}'")]
    UnsupportedEncoding(String),

    #[error("cannot pack a {found} into a {expected} layout")]
    KindMismatch {
        expected: StructKind,
        found: StructKind,
    },

    #[error("{kind} field '{field}' = {value} is not representable as {scalar}")]
    Unrepresentable {
        kind: StructKind,
        field: &'static str,
        value: f64,
        scalar: &'static str,
    },

    #[error("{kind} layout needs {expected} bytes, got {actual}")]
    BufferSize {
        kind: StructKind,
        expected: usize,
        actual: usize,
    },
}

/// Errors surfaced by the script runtime to Rust callers.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("runtime initialization failed: {0}")]
    Init(rquickjs::Error),

    /// An uncaught JavaScript exception.
    #[error("uncaught exception: {message}")]
    Exception {
        message: String,
        stack: Option<String>,
    },

    /// A script failed while being loaded through the module loader.
    #[error("failed to load '{file}': {message}")]
    LoadFailure { file: String, message: String },

    #[error("script '{id}' not found in search paths")]
    ScriptNotFound { id: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error(transparent)]
    Js(#[from] rquickjs::Error),
}
