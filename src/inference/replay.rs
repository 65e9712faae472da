//! Plays back recorded detections instead of running a model

use std::path::Path;

use tracing::{info, warn};

use super::{EngineError, PoseDetections, PoseModel};
use crate::capture::Frame;

/// Cycles through a recorded list of results, one per `infer` call. An
/// empty recording detects nothing.
pub struct ReplayModel {
    recording: Vec<PoseDetections>,
    cursor: usize,
}

impl ReplayModel {
    pub fn new(recording: Vec<PoseDetections>) -> Self {
        Self {
            recording,
            cursor: 0,
        }
    }

    /// Load a JSON array of results, each `{"landmarks": [...], "worldLandmarks": [...]}`.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Load(format!("{}: {e}", path.display())))?;
        let recording: Vec<PoseDetections> = serde_json::from_str(&text)
            .map_err(|e| EngineError::Load(format!("{}: {e}", path.display())))?;
        if recording.is_empty() {
            warn!("{} holds no recorded results; nothing will be detected", path.display());
        } else {
            info!("Loaded {} recorded results from {}", recording.len(), path.display());
        }
        Ok(Self::new(recording))
    }
}

impl PoseModel for ReplayModel {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn infer(&mut self, _frame: &Frame, _timestamp_ms: u64) -> Result<PoseDetections, EngineError> {
        if self.recording.is_empty() {
            return Ok(PoseDetections::empty());
        }
        let result = self.recording[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.recording.len();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::{FrameMetadata, PixelFormat};
    use crate::inference::Landmark;
    use bytes::Bytes;
    use std::io::Write;
    use std::time::Duration;

    fn frame() -> Frame {
        Frame::new(
            Bytes::from_static(&[0, 0, 0]),
            FrameMetadata::packed(1, 1, 1, PixelFormat::Rgb24, Duration::ZERO),
        )
    }

    fn single(x: f32) -> PoseDetections {
        let pose = vec![Landmark::new(x, 0.0, Some(0.0), 1.0)];
        PoseDetections {
            landmarks: vec![pose.clone()],
            world_landmarks: vec![pose],
        }
    }

    #[test]
    fn cycles_through_recording() {
        let mut model = ReplayModel::new(vec![single(1.0), single(2.0)]);
        let xs: Vec<f32> = (0..5)
            .map(|t| model.infer(&frame(), t).unwrap().landmarks[0][0].x)
            .collect();
        assert_eq!(xs, vec![1.0, 2.0, 1.0, 2.0, 1.0]);
    }

    #[test]
    fn empty_recording_detects_nothing() {
        let mut model = ReplayModel::new(Vec::new());
        assert_eq!(model.infer(&frame(), 0).unwrap().pose_count(), 0);
    }

    #[test]
    fn loads_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"landmarks": [[{{"x": 0.5, "y": 0.5, "visibility": 1.0}}]],
                "worldLandmarks": [[{{"x": 0.0, "y": 0.0, "z": 0.1, "visibility": 1.0}}]]}}, {{}}]"#
        )
        .unwrap();
        let mut model = ReplayModel::load(file.path()).unwrap();
        let counts: Vec<usize> = (0..3)
            .map(|t| model.infer(&frame(), t).unwrap().pose_count())
            .collect();
        assert_eq!(counts, vec![1, 0, 1]);
    }

    #[test]
    fn malformed_file_is_a_load_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(ReplayModel::load(file.path()), Err(EngineError::Load(_))));
    }
}
