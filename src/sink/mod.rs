//! Delivery of pose payloads to the host application

pub mod channel;
pub mod line;

use serde::Serialize;
use thiserror::Error;

use crate::inference::{Landmark, PoseDetections};
use crate::SinkConfig;

pub use channel::ChannelSink;
pub use line::LineSink;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write payload: {0}")]
    Io(#[from] std::io::Error),
    #[error("host channel closed")]
    Closed,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("pose has {image} image landmarks but {world} world landmarks")]
pub struct LandmarkMismatch {
    pub image: usize,
    pub world: usize,
}

/// Receives one JSON message per processed frame
pub trait PoseSink: Send {
    fn post(&mut self, message: &str) -> Result<(), SinkError>;
}

impl PoseSink for Box<dyn PoseSink> {
    fn post(&mut self, message: &str) -> Result<(), SinkError> {
        (**self).post(message)
    }
}

pub fn open(config: &SinkConfig) -> Result<Box<dyn PoseSink>, SinkError> {
    Ok(match config {
        SinkConfig::Stdout => Box::new(LineSink::stdout()),
        SinkConfig::File { path } => Box::new(LineSink::append(path)?),
    })
}

/// One landmark as the host expects it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseLandmark {
    pub image_x: f32,
    pub image_y: f32,
    pub world_x: f32,
    pub world_y: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub world_z: Option<f32>,
    pub visibility: f32,
}

impl PoseLandmark {
    pub fn combine(image: &Landmark, world: &Landmark) -> Self {
        Self {
            image_x: image.x,
            image_y: image.y,
            world_x: world.x,
            world_y: world.y,
            world_z: world.z,
            visibility: image.visibility,
        }
    }
}

/// Payload `{"data": [...]}`, one entry per landmark index in ascending order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoseFrame {
    pub data: Vec<PoseLandmark>,
}

impl PoseFrame {
    /// Zip the first pose's image and world landmarks. `Ok(None)` when no
    /// pose was detected.
    pub fn from_detections(detections: &PoseDetections) -> Result<Option<Self>, LandmarkMismatch> {
        let Some(image) = detections.landmarks.first() else {
            return Ok(None);
        };
        let world = detections
            .world_landmarks
            .first()
            .map(Vec::as_slice)
            .unwrap_or_default();
        if image.len() != world.len() {
            return Err(LandmarkMismatch {
                image: image.len(),
                world: world.len(),
            });
        }

        let data = image
            .iter()
            .zip(world)
            .map(|(image, world)| PoseLandmark::combine(image, world))
            .collect();
        Ok(Some(Self { data }))
    }

    pub fn to_json(&self) -> Result<String, SinkError> {
        Ok(serde_json::to_string(self)?)
    }
}
