//! Numeric helpers shared by the photometry stages.

pub mod bbox;
pub mod statistics;

pub use bbox::PixelBox;
pub use statistics::{mean, median_mut, rms_about};
