pub mod clip;
pub mod decoder;
pub mod frame;
#[cfg(feature = "gstreamer-pipeline")]
pub mod gst_capture;
pub mod source;
pub mod surface;
pub mod v4l2;

pub use frame::Frame;
pub use frame::PixelFormat;
pub use source::{spawn_capture, FrameSource, MediaSource};
pub use surface::{PlaybackState, VideoSurface};
pub use v4l2::V4l2Capture;
