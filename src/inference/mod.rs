//! Pose inference engine contract
//!
//! The model is a black box. The frame pump only needs two asynchronous
//! calls: a one-time switch into video mode and per-frame detection. Both
//! hand back a [`Pending`] completion that resolves exactly once.

pub mod landmark;
pub mod replay;
#[cfg(feature = "backend-tract")]
pub mod tract;
pub mod worker;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::Frame;
use crate::{InferenceConfig, ModelBackend};

pub use landmark::{Landmark, PoseDetections};
pub use replay::ReplayModel;
pub use worker::{PoseModel, WorkerEngine};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("inference worker is gone")]
    Disconnected,
    #[error("failed to load model: {0}")]
    Load(String),
    #[error("frame could not be prepared: {0}")]
    Frame(String),
    #[error("model run failed: {0}")]
    Model(String),
}

/// Execution backend requested for the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Delegate {
    #[default]
    #[serde(rename = "CPU", alias = "cpu")]
    Cpu,
    #[serde(rename = "GPU", alias = "gpu")]
    Gpu,
}

impl FromStr for Delegate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CPU" => Ok(Self::Cpu),
            "GPU" => Ok(Self::Gpu),
            _ => Err(format!("unknown delegate {s:?} (expected CPU or GPU)")),
        }
    }
}

impl fmt::Display for Delegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("CPU"),
            Self::Gpu => f.write_str("GPU"),
        }
    }
}

/// How the engine expects to be fed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunningMode {
    /// Independent still images
    Image,
    /// Consecutive frames with increasing timestamps
    Video,
}

/// Completion of one submitted engine call
pub struct Pending<T> {
    rx: flume::Receiver<Result<T, EngineError>>,
}

/// Producer half of a [`Pending`].
pub struct Completer<T> {
    tx: flume::Sender<Result<T, EngineError>>,
}

impl<T> Pending<T> {
    pub fn channel() -> (Completer<T>, Pending<T>) {
        let (tx, rx) = flume::bounded(1);
        (Completer { tx }, Pending { rx })
    }

    /// Already-resolved completion.
    pub fn ready(result: Result<T, EngineError>) -> Pending<T> {
        let (completer, pending) = Self::channel();
        completer.complete(result);
        pending
    }

    /// Wait for the result. Safe to drop and call again; the result stays
    /// queued until received.
    pub async fn wait(&self) -> Result<T, EngineError> {
        match self.rx.recv_async().await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Disconnected),
        }
    }
}

impl<T> Completer<T> {
    pub fn complete(self, result: Result<T, EngineError>) {
        // The waiting side may have gone away; nobody to tell.
        let _ = self.tx.send(result);
    }
}

/// Asynchronous pose engine as seen by the frame pump
pub trait PoseEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Switch running mode. Must resolve before the next `detect`.
    fn set_mode(&self, mode: RunningMode) -> Pending<()>;

    /// Submit a frame. `timestamp_ms` must increase strictly between calls
    /// in video mode.
    fn detect(&self, frame: Frame, timestamp_ms: u64) -> Pending<PoseDetections>;
}

/// Start the configured model on its worker thread.
pub fn build_engine(
    config: &InferenceConfig,
    core: Option<usize>,
) -> Result<WorkerEngine, EngineError> {
    let spawn_failed = |e: std::io::Error| EngineError::Load(format!("cannot start worker: {e}"));
    match config.backend {
        ModelBackend::Replay => {
            let model = ReplayModel::load(&config.replay_path)?;
            WorkerEngine::spawn(model, core, config.num_poses).map_err(spawn_failed)
        }
        #[cfg(feature = "backend-tract")]
        ModelBackend::Tract => {
            let model = tract::TractPoseModel::load(
                &config.model_path,
                config.delegate,
                config.min_pose_score,
            )?;
            WorkerEngine::spawn(model, core, config.num_poses).map_err(spawn_failed)
        }
        #[cfg(not(feature = "backend-tract"))]
        ModelBackend::Tract => Err(EngineError::Load(
            "the tract backend requires the backend-tract feature".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delegate_parses_case_insensitively() {
        assert_eq!("gpu".parse::<Delegate>(), Ok(Delegate::Gpu));
        assert_eq!("CPU".parse::<Delegate>(), Ok(Delegate::Cpu));
        assert!("tpu".parse::<Delegate>().is_err());
        assert_eq!(Delegate::Gpu.to_string(), "GPU");
    }

    #[tokio::test]
    async fn pending_resolves_once() {
        let (completer, pending) = Pending::<u32>::channel();
        let early = tokio::time::timeout(std::time::Duration::from_millis(10), pending.wait()).await;
        assert!(early.is_err());
        completer.complete(Ok(7));
        assert_eq!(pending.wait().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn dropped_completer_disconnects() {
        let (completer, pending) = Pending::<u32>::channel();
        drop(completer);
        assert!(matches!(pending.wait().await, Err(EngineError::Disconnected)));
    }
}
