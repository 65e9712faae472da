//! Latest-frame surface shared by capture, draw loop and frame pump

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use arc_swap::ArcSwapOption;

use super::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PlaybackState {
    Idle = 0,
    Playing = 1,
    Paused = 2,
    Ended = 3,
}

impl PlaybackState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Playing,
            2 => Self::Paused,
            3 => Self::Ended,
            _ => Self::Idle,
        }
    }
}

/// Holds whatever the media source produced last. Readers never block the
/// writer; a new frame simply replaces the previous one.
///
/// Each [`VideoSurface::clear`] starts a new epoch, so a restarted clip's
/// positions are never confused with the previous run's.
pub struct VideoSurface {
    frame: ArcSwapOption<Frame>,
    state: AtomicU8,
    epoch: AtomicU64,
}

impl VideoSurface {
    pub fn new() -> Self {
        Self {
            frame: ArcSwapOption::empty(),
            state: AtomicU8::new(PlaybackState::Idle as u8),
            epoch: AtomicU64::new(0),
        }
    }

    /// Publish a frame; the surface counts as playing from here on.
    pub fn present(&self, frame: Frame) {
        self.frame.store(Some(Arc::new(frame)));
        self.state
            .store(PlaybackState::Playing as u8, Ordering::Release);
    }

    pub fn current_frame(&self) -> Option<Arc<Frame>> {
        self.frame.load_full()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: PlaybackState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    /// Forget the current frame, e.g. before a clip restarts from zero.
    pub fn clear(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.frame.store(None);
        self.set_state(PlaybackState::Idle);
    }
}

impl Default for VideoSurface {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::{FrameMetadata, PixelFormat};
    use bytes::Bytes;
    use std::time::Duration;

    fn frame_at(ms: u64) -> Frame {
        Frame::new(
            Bytes::from_static(&[0, 0, 0]),
            FrameMetadata::packed(ms, 1, 1, PixelFormat::Rgb24, Duration::from_millis(ms)),
        )
    }

    #[test]
    fn empty_surface_reports_nothing() {
        let surface = VideoSurface::new();
        assert_eq!(surface.state(), PlaybackState::Idle);
        assert!(surface.current_frame().is_none());
        assert_eq!(surface.epoch(), 0);
    }

    #[test]
    fn present_replaces_frame_and_starts_playing() {
        let surface = VideoSurface::new();
        surface.present(frame_at(10));
        surface.present(frame_at(20));
        assert!(surface.is_playing());
        let current = surface.current_frame().unwrap();
        assert_eq!(current.meta.position, Duration::from_millis(20));

        surface.set_state(PlaybackState::Ended);
        assert_eq!(surface.state(), PlaybackState::Ended);

        surface.clear();
        assert!(surface.current_frame().is_none());
        assert_eq!(surface.state(), PlaybackState::Idle);
        assert_eq!(surface.epoch(), 1);
    }
}
