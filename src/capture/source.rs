use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use color_eyre::Result;
#[cfg(not(feature = "gstreamer-pipeline"))]
use color_eyre::eyre::eyre;
use tracing::{error, info, warn};

#[cfg(feature = "gstreamer-pipeline")]
use super::gst_capture::GstCapture;
use super::{Frame, PlaybackState, V4l2Capture, VideoSurface};
use crate::pipeline::StreamControl;

/// Blocking producer of video frames
pub trait FrameSource {
    /// Next frame, or `None` if nothing arrived in time.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Rewind to the start, if the source can.
    fn restart(&mut self) -> Result<()>;

    fn is_ended(&self) -> bool;
}

/// Where the video comes from: the live camera or a recorded debug clip
pub enum MediaSource {
    Camera(V4l2Capture),
    #[cfg(feature = "gstreamer-pipeline")]
    Clip(GstCapture),
}

impl MediaSource {
    #[cfg(feature = "gstreamer-pipeline")]
    pub fn clip(path: &std::path::Path) -> Result<Self> {
        Ok(Self::Clip(GstCapture::from_file(path)?))
    }

    #[cfg(not(feature = "gstreamer-pipeline"))]
    pub fn clip(path: &std::path::Path) -> Result<Self> {
        Err(eyre!(
            "Playing {} requires the gstreamer-pipeline feature",
            path.display()
        ))
    }

    pub fn start(&mut self) -> Result<()> {
        match self {
            Self::Camera(camera) => camera.start_stream(),
            #[cfg(feature = "gstreamer-pipeline")]
            Self::Clip(clip) => clip.start_stream(),
        }
    }
}

impl FrameSource for MediaSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match self {
            Self::Camera(camera) => camera.capture_frame().map(Some),
            #[cfg(feature = "gstreamer-pipeline")]
            Self::Clip(clip) => clip.capture_frame(),
        }
    }

    /// Live cameras ignore the request.
    fn restart(&mut self) -> Result<()> {
        match self {
            Self::Camera(_) => {
                warn!("Restart requested on a live camera; ignoring");
                Ok(())
            }
            #[cfg(feature = "gstreamer-pipeline")]
            Self::Clip(clip) => {
                clip.restart()?;
                info!("Clip restarted");
                Ok(())
            }
        }
    }

    /// A camera never ends.
    fn is_ended(&self) -> bool {
        match self {
            Self::Camera(_) => false,
            #[cfg(feature = "gstreamer-pipeline")]
            Self::Clip(clip) => clip.is_ended(),
        }
    }
}

/// Run `source` on its own thread, publishing frames to `surface` until
/// `control` stops. Reads block, so they stay off the async runtime.
pub fn spawn_capture<S>(
    mut source: S,
    surface: Arc<VideoSurface>,
    control: StreamControl,
) -> std::io::Result<JoinHandle<()>>
where
    S: FrameSource + Send + 'static,
{
    std::thread::Builder::new()
        .name("capture".into())
        .spawn(move || capture_loop(&mut source, &surface, &control))
}

fn capture_loop<S: FrameSource>(source: &mut S, surface: &VideoSurface, control: &StreamControl) {
    while control.is_running() {
        if control.take_restart() {
            match source.restart() {
                Ok(()) => surface.clear(),
                Err(e) => error!("Restart failed: {}", e),
            }
        }

        match source.next_frame() {
            Ok(Some(frame)) => surface.present(frame),
            Ok(None) if source.is_ended() => {
                if surface.state() != PlaybackState::Ended {
                    info!("Media ended");
                    surface.set_state(PlaybackState::Ended);
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Ok(None) => {}
            Err(e) => {
                error!("Capture error: {}", e);
                std::thread::sleep(Duration::from_millis(10));
            }
        }
    }
    info!("Capture stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::{FrameMetadata, PixelFormat};
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Plays `length` frames 5 ms apart, blocking like a real decoder
    struct FakeClip {
        position: u64,
        length: u64,
        restarts: Arc<AtomicUsize>,
    }

    impl FrameSource for FakeClip {
        fn next_frame(&mut self) -> Result<Option<Frame>> {
            std::thread::sleep(Duration::from_millis(5));
            if self.position >= self.length {
                return Ok(None);
            }
            let frame = Frame::new(
                Bytes::from_static(&[0, 0, 0]),
                FrameMetadata::packed(
                    self.position,
                    1,
                    1,
                    PixelFormat::Rgb24,
                    Duration::from_millis(self.position * 5),
                ),
            );
            self.position += 1;
            Ok(Some(frame))
        }

        fn restart(&mut self) -> Result<()> {
            self.position = 0;
            self.restarts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn is_ended(&self) -> bool {
            self.position >= self.length
        }
    }

    fn clip(length: u64) -> (FakeClip, Arc<AtomicUsize>) {
        let restarts = Arc::new(AtomicUsize::new(0));
        let clip = FakeClip {
            position: 0,
            length,
            restarts: restarts.clone(),
        };
        (clip, restarts)
    }

    #[tokio::test(flavor = "current_thread")]
    async fn blocking_reads_leave_the_runtime_free() {
        let (source, _) = clip(u64::MAX);
        let surface = Arc::new(VideoSurface::new());
        let control = StreamControl::new();
        let handle = spawn_capture(source, surface.clone(), control.clone()).unwrap();

        // Single-threaded runtime: these timers only fire if capture is not
        // holding the worker.
        let mut ticks = 0;
        for _ in 0..5 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            ticks += 1;
        }
        assert_eq!(ticks, 5);
        assert!(surface.current_frame().is_some());

        control.stop();
        handle.join().unwrap();
    }

    #[test]
    fn end_of_clip_marks_the_surface_ended() {
        let (source, _) = clip(3);
        let surface = Arc::new(VideoSurface::new());
        let control = StreamControl::new();
        let handle = spawn_capture(source, surface.clone(), control.clone()).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while surface.state() != PlaybackState::Ended && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        control.stop();
        handle.join().unwrap();

        assert_eq!(surface.state(), PlaybackState::Ended);
        assert_eq!(surface.current_frame().unwrap().meta.sequence, 2);
    }

    #[test]
    fn restart_clears_the_surface_and_plays_again() {
        let (source, restarts) = clip(3);
        let surface = Arc::new(VideoSurface::new());
        let control = StreamControl::new();
        let handle = spawn_capture(source, surface.clone(), control.clone()).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while surface.state() != PlaybackState::Ended && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        control.request_restart();
        while surface.epoch() == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        while surface.current_frame().is_none() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        control.stop();
        handle.join().unwrap();

        assert_eq!(restarts.load(Ordering::SeqCst), 1);
        assert_eq!(surface.epoch(), 1);
        assert!(surface.current_frame().is_some());
    }
}
