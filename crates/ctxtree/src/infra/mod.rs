//! Infrastructure adapters for config, logging, and the clipboard.

pub mod clipboard;
pub mod config;
pub mod logging;
