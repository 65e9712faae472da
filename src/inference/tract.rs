//! ONNX pose landmark model run with tract
//!
//! Expects a BlazePose-style full-body landmark model: one NHWC float input
//! of `input_size`², values in 0..1, and outputs holding 39×5 screen
//! landmarks (input pixels; x, y, z, visibility logit, presence logit), a
//! single pose score, and 39×3 world landmarks. Outputs are told apart by
//! element count. The whole frame is fed to the model without a person
//! crop.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbImage;
use tracing::{info, warn};
use tract_onnx::prelude::*;

use super::landmark::POSE_LANDMARK_COUNT;
use super::{Delegate, EngineError, Landmark, PoseDetections, PoseModel};
use crate::capture::{decoder, Frame};

const MODEL_LANDMARKS: usize = 39;
const SCREEN_LEN: usize = MODEL_LANDMARKS * 5;
const WORLD_LEN: usize = MODEL_LANDMARKS * 3;

pub struct TractPoseModel {
    plan: TypedRunnableModel<TypedModel>,
    input_size: u32,
    min_pose_score: f32,
}

impl TractPoseModel {
    pub fn load(path: &Path, delegate: Delegate, min_pose_score: f32) -> Result<Self, EngineError> {
        if delegate == Delegate::Gpu {
            warn!("GPU delegate requested; tract runs on the CPU");
        }

        let input_size = 256u32;
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| {
                model.with_input_fact(
                    0,
                    InferenceFact::dt_shape(
                        f32::datum_type(),
                        tvec!(1, input_size as usize, input_size as usize, 3),
                    ),
                )
            })
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| EngineError::Load(format!("{}: {e}", path.display())))?;

        info!("Loaded pose model {}", path.display());
        Ok(Self {
            plan,
            input_size,
            min_pose_score,
        })
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor, EngineError> {
        let rgb = decoder::decode_frame(frame).map_err(|e| EngineError::Frame(e.to_string()))?;
        let image = RgbImage::from_raw(rgb.width, rgb.height, rgb.pixels)
            .ok_or_else(|| EngineError::Frame("pixel buffer does not match frame size".into()))?;
        let resized = imageops::resize(&image, self.input_size, self.input_size, FilterType::Triangle);

        let size = self.input_size as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, size, size, 3), |(_, y, x, c)| {
            resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        });
        Ok(input.into_tensor())
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

impl PoseModel for TractPoseModel {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn infer(&mut self, frame: &Frame, _timestamp_ms: u64) -> Result<PoseDetections, EngineError> {
        let input = self.build_input(frame)?;
        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| EngineError::Model(e.to_string()))?;

        let mut screen = None;
        let mut world = None;
        let mut score = None;
        for output in outputs.iter() {
            let view = output
                .to_array_view::<f32>()
                .map_err(|e| EngineError::Model(e.to_string()))?;
            match view.len() {
                SCREEN_LEN => screen = Some(view.iter().copied().collect::<Vec<f32>>()),
                WORLD_LEN => world = Some(view.iter().copied().collect::<Vec<f32>>()),
                1 => score = view.iter().next().copied(),
                _ => {}
            }
        }

        let (Some(screen), Some(world)) = (screen, world) else {
            return Err(EngineError::Model("model outputs do not look like pose landmarks".into()));
        };
        if score.unwrap_or(1.0) < self.min_pose_score {
            return Ok(PoseDetections::empty());
        }

        let size = self.input_size as f32;
        let mut image_pose = Vec::with_capacity(POSE_LANDMARK_COUNT);
        let mut world_pose = Vec::with_capacity(POSE_LANDMARK_COUNT);
        for i in 0..POSE_LANDMARK_COUNT {
            let s = &screen[i * 5..i * 5 + 5];
            let w = &world[i * 3..i * 3 + 3];
            let visibility = sigmoid(s[3]);
            image_pose.push(Landmark::new(s[0] / size, s[1] / size, Some(s[2] / size), visibility));
            world_pose.push(Landmark::new(w[0], w[1], Some(w[2]), visibility));
        }

        Ok(PoseDetections {
            landmarks: vec![image_pose],
            world_landmarks: vec![world_pose],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_is_centred() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(10.0) > 0.99);
    }

    #[test]
    fn missing_model_is_a_load_error() {
        let result = TractPoseModel::load(Path::new("/nonexistent/pose.onnx"), Delegate::Cpu, 0.5);
        assert!(matches!(result, Err(EngineError::Load(_))));
    }
}
