//! Runs a blocking model on its own thread behind the async engine contract

use std::thread;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::{Completer, EngineError, Pending, PoseDetections, PoseEngine, RunningMode};
use crate::capture::Frame;

/// Synchronous pose model. Owned by exactly one worker thread.
pub trait PoseModel: Send + 'static {
    fn name(&self) -> &'static str;

    fn set_mode(&mut self, _mode: RunningMode) -> Result<(), EngineError> {
        Ok(())
    }

    fn infer(&mut self, frame: &Frame, timestamp_ms: u64) -> Result<PoseDetections, EngineError>;
}

enum Job {
    SetMode(RunningMode, Completer<()>),
    Detect(Frame, u64, Completer<PoseDetections>),
}

pub struct WorkerEngine {
    name: &'static str,
    jobs: flume::Sender<Job>,
}

impl WorkerEngine {
    /// Move `model` onto a dedicated thread, optionally pinned to `core`.
    /// Results carry at most `max_poses` poses.
    pub fn spawn<M: PoseModel>(
        mut model: M,
        core: Option<usize>,
        max_poses: usize,
    ) -> std::io::Result<Self> {
        let name = model.name();
        let (jobs, rx) = flume::unbounded::<Job>();

        thread::Builder::new()
            .name(format!("pose-{name}"))
            .spawn(move || {
                if let Some(id) = core {
                    pin_to_core(id);
                }
                info!("Inference worker {} ready", name);

                for job in rx.iter() {
                    match job {
                        Job::SetMode(mode, done) => {
                            debug!("Switching {} to {:?} mode", name, mode);
                            done.complete(model.set_mode(mode));
                        }
                        Job::Detect(frame, timestamp_ms, done) => {
                            let started = Instant::now();
                            let result = model.infer(&frame, timestamp_ms).map(|mut d| {
                                d.truncate(max_poses);
                                d
                            });
                            metrics::histogram!("inference_time_us")
                                .record(started.elapsed().as_micros() as f64);
                            done.complete(result);
                        }
                    }
                }
                debug!("Inference worker {} stopped", name);
            })?;

        Ok(Self { name, jobs })
    }

    fn submit<T>(&self, make: impl FnOnce(Completer<T>) -> Job) -> Pending<T> {
        let (done, pending) = Pending::channel();
        if self.jobs.send(make(done)).is_err() {
            return Pending::ready(Err(EngineError::Disconnected));
        }
        pending
    }
}

fn pin_to_core(id: usize) {
    let core = core_affinity::get_core_ids()
        .unwrap_or_default()
        .into_iter()
        .find(|core| core.id == id);
    match core {
        Some(core) if core_affinity::set_for_current(core) => {
            debug!("Inference worker pinned to core {}", id);
        }
        _ => warn!("Could not pin inference worker to core {}", id),
    }
}

impl PoseEngine for WorkerEngine {
    fn name(&self) -> &'static str {
        self.name
    }

    fn set_mode(&self, mode: RunningMode) -> Pending<()> {
        self.submit(|done| Job::SetMode(mode, done))
    }

    fn detect(&self, frame: Frame, timestamp_ms: u64) -> Pending<PoseDetections> {
        self.submit(|done| Job::Detect(frame, timestamp_ms, done))
    }
}
