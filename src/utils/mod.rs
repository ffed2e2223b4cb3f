//! Utility modules.

pub mod file;

pub use file::{has_binary_extension, read_utf8_text, record_id, relative_path};
