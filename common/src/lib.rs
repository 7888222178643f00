//! Utilities shared across the workspace.

pub mod buffer2;
pub mod file_utils;
pub mod log_setup;

pub use buffer2::Buffer2;
