//! faceguard-hw — Video source abstraction and V4L2 capture.

pub mod frame;
pub mod source;
pub mod v4l2;

pub use frame::Frame;
pub use source::{open_source, SourceError, SourceId, VideoSource};
