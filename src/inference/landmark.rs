use serde::{Deserialize, Serialize};

/// Landmarks tracked per pose by the full-body landmark model
pub const POSE_LANDMARK_COUNT: usize = 33;

/// Single landmark. Image-space landmarks are normalised to the frame
/// (0.0..1.0); world-space ones are metres around the hip centre.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
    #[serde(default)]
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: Option<f32>, visibility: f32) -> Self {
        Self {
            x,
            y,
            z,
            visibility,
        }
    }
}

/// Everything the engine found in one frame: one landmark list per pose in
/// both coordinate spaces, index-aligned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseDetections {
    #[serde(default)]
    pub landmarks: Vec<Vec<Landmark>>,
    #[serde(default)]
    pub world_landmarks: Vec<Vec<Landmark>>,
}

impl PoseDetections {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn pose_count(&self) -> usize {
        self.landmarks.len()
    }

    /// Keep at most `max` poses.
    pub fn truncate(&mut self, max: usize) {
        self.landmarks.truncate(max);
        self.world_landmarks.truncate(max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_recorded_result_without_z() {
        let json = r#"{
            "landmarks": [[{"x": 0.5, "y": 0.25, "visibility": 0.9}]],
            "worldLandmarks": [[{"x": 0.1, "y": -0.2, "z": 0.3, "visibility": 0.9}]]
        }"#;
        let detections: PoseDetections = serde_json::from_str(json).unwrap();
        assert_eq!(detections.pose_count(), 1);
        assert_eq!(detections.landmarks[0][0].z, None);
        assert_eq!(detections.world_landmarks[0][0].z, Some(0.3));
    }

    #[test]
    fn truncate_limits_both_spaces() {
        let pose = vec![Landmark::default(); 3];
        let mut detections = PoseDetections {
            landmarks: vec![pose.clone(), pose.clone()],
            world_landmarks: vec![pose.clone(), pose],
        };
        detections.truncate(1);
        assert_eq!(detections.landmarks.len(), 1);
        assert_eq!(detections.world_landmarks.len(), 1);
    }
}
