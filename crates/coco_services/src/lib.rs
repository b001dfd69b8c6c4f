//! Coco Services Layer
//!
//! Host configuration shared by the runtime binary and embedders.

pub mod settings;

pub use settings::{ConsoleSettings, LogSettings, Settings, SettingsError};
