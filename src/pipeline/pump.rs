//! Frame pump: decides per render tick whether to skip, wait or submit the
//! current video frame for pose inference, and relays results to the sink.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, trace, warn};

use super::control::StreamControl;
use super::session::InferenceSession;
use super::stats::{PumpSnapshot, PumpStats};
use super::timing::{Clock, FrameTiming, MonotonicClock};
use crate::capture::{Frame, VideoSurface};
use crate::inference::{EngineError, Pending, PoseDetections, PoseEngine, RunningMode};
use crate::sink::{PoseFrame, PoseSink, SinkError};
use crate::PipelineConfig;

#[derive(Debug, Error)]
pub enum PumpError {
    #[error("switching the engine to video mode failed")]
    ModeSwitch(#[source] EngineError),
    #[error("inference failed")]
    Inference(#[source] EngineError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// What a render tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Streaming has been stopped
    Stopped,
    /// Too soon after the last admitted tick
    RateLimited,
    /// A previous call is still in flight; this frame is dropped
    Busy,
    /// The video has not advanced since the last submission
    NoNewFrame,
    /// A frame went to the engine
    Submitted,
}

#[derive(Debug, Clone, Copy)]
pub struct PumpOptions {
    /// Render tick period
    pub refresh: Duration,
    pub max_fps: u32,
    pub continue_on_error: bool,
}

impl From<&PipelineConfig> for PumpOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            refresh: Duration::from_secs_f64(1.0 / config.refresh_hz.max(1) as f64),
            max_fps: config.inference_fps,
            continue_on_error: config.continue_on_error,
        }
    }
}

impl Default for PumpOptions {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

struct InFlight {
    pending: Pending<PoseDetections>,
    submitted_at: Instant,
}

enum Wake {
    Tick,
    Result(Result<PoseDetections, EngineError>),
}

pub struct FramePump<E, S, C = MonotonicClock> {
    engine: Arc<E>,
    sink: S,
    surface: Arc<VideoSurface>,
    control: StreamControl,
    clock: C,
    options: PumpOptions,
    timing: FrameTiming,
    session: InferenceSession,
    /// Surface epoch and playback position of the last submitted frame
    last_video_time: Option<(u64, Duration)>,
    last_timestamp_ms: Option<u64>,
    in_flight: Option<InFlight>,
    stats: Arc<PumpStats>,
}

impl<E: PoseEngine, S: PoseSink> FramePump<E, S, MonotonicClock> {
    pub fn new(
        engine: Arc<E>,
        sink: S,
        surface: Arc<VideoSurface>,
        control: StreamControl,
        options: PumpOptions,
    ) -> Self {
        Self::with_clock(engine, sink, surface, control, MonotonicClock::new(), options)
    }
}

impl<E: PoseEngine, S: PoseSink, C: Clock> FramePump<E, S, C> {
    pub fn with_clock(
        engine: Arc<E>,
        sink: S,
        surface: Arc<VideoSurface>,
        control: StreamControl,
        clock: C,
        options: PumpOptions,
    ) -> Self {
        let timing = FrameTiming::new(clock.now_ms(), options.max_fps);
        Self {
            engine,
            sink,
            surface,
            control,
            clock,
            options,
            timing,
            session: InferenceSession::new(),
            last_video_time: None,
            last_timestamp_ms: None,
            in_flight: None,
            stats: Arc::new(PumpStats::new()),
        }
    }

    pub fn stats(&self) -> Arc<PumpStats> {
        self.stats.clone()
    }

    pub fn session(&self) -> InferenceSession {
        self.session
    }

    pub fn timing(&self) -> FrameTiming {
        self.timing
    }

    pub fn is_busy(&self) -> bool {
        self.session.is_busy()
    }

    /// One render tick. Submits at most one frame and never waits for its
    /// result; see [`FramePump::finish_inference`].
    #[instrument(level = "trace", skip(self))]
    pub async fn on_render_tick(&mut self) -> Result<TickOutcome, PumpError> {
        if !self.control.is_running() {
            return Ok(TickOutcome::Stopped);
        }
        self.stats.tick();

        let now = self.clock.now_ms();
        if !self.timing.admit(now) {
            self.stats.rate_limited();
            return Ok(TickOutcome::RateLimited);
        }

        if !self.session.try_acquire() {
            self.stats.busy_dropped();
            return Ok(TickOutcome::Busy);
        }

        if self.session.begin_streaming() {
            info!("Switching {} to video mode", self.engine.name());
            if let Err(e) = self.engine.set_mode(RunningMode::Video).wait().await {
                self.session.release();
                return Err(PumpError::ModeSwitch(e));
            }
        }

        let Some(frame) = self.next_video_frame() else {
            self.session.release();
            self.stats.stale_skipped();
            return Ok(TickOutcome::NoNewFrame);
        };

        let timestamp_ms = self.next_timestamp(now);
        debug!(
            "Submitting frame {} at {} ms",
            frame.meta.sequence, timestamp_ms
        );
        self.in_flight = Some(InFlight {
            pending: self.engine.detect(frame, timestamp_ms),
            submitted_at: Instant::now(),
        });
        self.stats.submitted();
        Ok(TickOutcome::Submitted)
    }

    /// Wait for the in-flight call, if any, and relay its result. Returns
    /// whether a payload reached the sink.
    pub async fn finish_inference(&mut self) -> Result<bool, PumpError> {
        let Some(in_flight) = self.in_flight.as_ref() else {
            return Ok(false);
        };
        let result = in_flight.pending.wait().await;
        self.complete(result)
    }

    /// Drive the pump from a display-refresh interval until streaming stops
    /// and nothing is in flight.
    pub async fn run(mut self) -> Result<PumpSnapshot, PumpError> {
        let mut ticker = tokio::time::interval(self.options.refresh);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            "Frame pump running: {:?} ticks, at most {} inferences/s",
            self.options.refresh, self.options.max_fps
        );

        loop {
            let wake = match self.in_flight.as_ref() {
                Some(in_flight) => tokio::select! {
                    result = in_flight.pending.wait() => Wake::Result(result),
                    _ = ticker.tick() => Wake::Tick,
                },
                None => {
                    ticker.tick().await;
                    Wake::Tick
                }
            };

            let step = match wake {
                Wake::Tick => self.on_render_tick().await.map(|_| ()),
                Wake::Result(result) => self.complete(result).map(|_| ()),
            };

            match step {
                Ok(()) => {}
                Err(e @ PumpError::ModeSwitch(_)) => return Err(e),
                Err(e) if self.options.continue_on_error => {
                    warn!("Frame pump error, keeping schedule: {:#}", e);
                }
                Err(e) => return Err(e),
            }

            if !self.control.is_running() && self.in_flight.is_none() {
                break;
            }
        }

        let snapshot = self.stats.snapshot();
        info!("Frame pump stopped: {:?}", snapshot);
        Ok(snapshot)
    }

    fn complete(&mut self, result: Result<PoseDetections, EngineError>) -> Result<bool, PumpError> {
        if let Some(in_flight) = self.in_flight.take() {
            metrics::histogram!("inference_latency_ms")
                .record(in_flight.submitted_at.elapsed().as_secs_f64() * 1000.0);
        }
        self.session.release();

        let detections = result.map_err(|e| {
            self.stats.failed();
            PumpError::Inference(e)
        })?;
        trace!("{} poses detected", detections.pose_count());

        if !self.control.is_running() {
            debug!("Discarding result that arrived after stop");
            return Ok(false);
        }

        match PoseFrame::from_detections(&detections) {
            Ok(Some(frame)) => {
                self.sink.post(&frame.to_json()?)?;
                self.stats.emitted();
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(mismatch) => {
                warn!("Dropping frame: {}", mismatch);
                Ok(false)
            }
        }
    }

    /// Current frame if the video moved since the last submission. The first
    /// frame, and the first after a restart, always counts as new.
    fn next_video_frame(&mut self) -> Option<Frame> {
        let epoch = self.surface.epoch();
        let frame = self.surface.current_frame()?;
        let seen = (epoch, frame.meta.position);
        if self.last_video_time == Some(seen) {
            return None;
        }
        self.last_video_time = Some(seen);
        Some((*frame).clone())
    }

    fn next_timestamp(&mut self, now_ms: f64) -> u64 {
        let now = now_ms.max(0.0) as u64;
        let timestamp = match self.last_timestamp_ms {
            Some(last) if now <= last => last + 1,
            _ => now,
        };
        self.last_timestamp_ms = Some(timestamp);
        timestamp
    }
}
