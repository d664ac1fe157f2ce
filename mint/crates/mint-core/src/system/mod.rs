//! System Module - platform integration.

pub mod plugin;

pub use plugin::{CursorHandle, Plugin};
