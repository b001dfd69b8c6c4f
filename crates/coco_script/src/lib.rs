//! Coco Scripting Host
//!
//! Embeds QuickJS and exposes a small host API to scripts.
//!
//! ## Architecture
//!
//! - **Loader:** `require(id)` evaluates each script once; `require.reload()`
//!   re-runs everything in original order for live reload
//! - **Values:** `Point`, `Size`, `Rect`, `Range`, `AffineTransform` and
//!   `EdgeInsets` records, validated at the script boundary
//! - **Codec:** native struct layouts described by Objective-C type encodings
//!
//! The loader is generic over [`loader::Evaluate`], so it can be driven by
//! something other than QuickJS (tests use an in-memory script table).

pub mod bindings;
pub mod codec;
pub mod error;
pub mod loader;
pub mod resolver;
pub mod runtime;
pub mod value;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use error::{ScriptError, ValueError};
pub use loader::{Evaluate, LoadRegistry, ModuleLoader};
pub use runtime::ScriptRuntime;
pub use value::{AffineTransform, EdgeInsets, Point, Range, Record, Rect, Size, StructKind, StructValue};

pub use rquickjs;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Configuration for a [`ScriptRuntime`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Directories searched, in order, when resolving a script identifier
    pub search_paths: Vec<PathBuf>,
    /// Extension appended to identifiers without one
    pub extension: String,
    /// Scripts loaded by [`ScriptRuntime::bootstrap`], in order
    pub bootstrap: Vec<String>,
    /// QuickJS heap limit in bytes
    pub memory_limit: Option<usize>,
    /// Allocation threshold that triggers a collection, in bytes
    pub gc_threshold: Option<usize>,
    /// Number of `log()` lines kept until drained
    pub message_capacity: usize,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            search_paths: vec![PathBuf::from("scripts")],
            extension: resolver::DEFAULT_EXTENSION.to_string(),
            bootstrap: Vec::new(),
            memory_limit: None,
            gc_threshold: None,
            message_capacity: 256,
        }
    }
}
