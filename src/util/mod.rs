//! Common utilities and data structures

pub mod buffer;
pub mod colorspace;

pub use buffer::Buffer;
pub use colorspace::{PlaneMask, Rgb, Yuv};
