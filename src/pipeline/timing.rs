//! Inference rate limiting

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Millisecond time source for the frame pump
pub trait Clock: Send {
    fn now_ms(&self) -> f64;
}

/// Milliseconds since creation, like a page's high-resolution timer
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Clock moved by hand. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(start_ms.to_bits())),
        }
    }

    pub fn set(&self, ms: f64) {
        self.bits.store(ms.to_bits(), Ordering::Release);
    }

    pub fn advance(&self, ms: f64) {
        self.set(self.now_ms() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

/// Time of the last admitted tick and the minimum spacing between admitted
/// ticks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTiming {
    pub last_frame_ms: f64,
    pub min_interval_ms: f64,
}

impl FrameTiming {
    /// The interval is `1000 / max_fps` truncated to hundredths of a
    /// millisecond, so at 30 fps two 60 Hz refreshes (33.33 ms) are enough.
    pub fn new(start_ms: f64, max_fps: u32) -> Self {
        Self {
            last_frame_ms: start_ms,
            min_interval_ms: (100_000.0 / max_fps.max(1) as f64).floor() / 100.0,
        }
    }

    /// Admit a tick at `now_ms` if enough time has passed, recording it as
    /// the last frame time.
    pub fn admit(&mut self, now_ms: f64) -> bool {
        if now_ms - self.last_frame_ms < self.min_interval_ms {
            return false;
        }
        self.last_frame_ms = now_ms;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirty_fps_interval() {
        let timing = FrameTiming::new(0.0, 30);
        assert!((timing.min_interval_ms - 33.33).abs() < 1e-9);
        assert_eq!(FrameTiming::new(0.0, 20).min_interval_ms, 50.0);
    }

    #[test]
    fn gap_of_exactly_the_interval_is_admitted() {
        let mut timing = FrameTiming::new(0.0, 30);
        assert!(!timing.admit(33.32));
        assert!(timing.admit(33.33));
        assert!(timing.admit(66.66));
    }

    #[test]
    fn sixty_hz_refresh_gives_thirty_inferences() {
        let mut timing = FrameTiming::new(0.0, 30);
        let admitted = (1..=60)
            .filter(|&i| timing.admit(i as f64 * 16.666))
            .count();
        assert_eq!(admitted, 30);
    }

    #[test]
    fn first_tick_waits_a_full_interval() {
        let mut timing = FrameTiming::new(100.0, 30);
        assert!(!timing.admit(120.0));
        assert!(timing.admit(140.0));
        assert_eq!(timing.last_frame_ms, 140.0);
    }

    #[test]
    fn suppressed_ticks_do_not_move_the_window() {
        let mut timing = FrameTiming::new(0.0, 30);
        assert!(timing.admit(40.0));
        // 16 ms refresh: 32 ms is still too early, 48 ms gets through
        let admitted: Vec<bool> = [56.0, 72.0, 88.0, 104.0, 120.0, 136.0]
            .iter()
            .map(|&t| timing.admit(t))
            .collect();
        assert_eq!(admitted, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn manual_clock_is_shared() {
        let clock = ManualClock::new(5.0);
        let other = clock.clone();
        clock.advance(10.0);
        assert_eq!(other.now_ms(), 15.0);
    }
}
