pub mod capture;
pub mod display;
pub mod inference;
pub mod params;
pub mod pipeline;
pub mod sink;
pub mod utils;

use std::path::{Path, PathBuf};

use arc_swap::ArcSwap;
use capture::frame::PixelFormat;
use serde::{Deserialize, Serialize};

use crate::inference::Delegate;
use crate::utils::FoundDevice;

pub use capture::Frame;

/// Global configuration that can be atomically swapped at runtime
pub static CONFIG: once_cell::sync::Lazy<ArcSwap<Config>> =
    once_cell::sync::Lazy::new(|| ArcSwap::from_pointee(Config::default()));

/// Environment prefix for overrides, e.g. `SCREENING__CLIP__API_KEY`
pub const ENV_PREFIX: &str = "SCREENING";

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub display: DisplayConfig,
    pub pipeline: PipelineConfig,
    pub inference: InferenceConfig,
    pub clip: ClipConfig,
    pub sink: SinkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Empty path means auto-detect.
    pub device: FoundDevice,
    pub width: u32,
    pub height: u32,
    /// Requested camera frame rate; 0 keeps the driver default.
    pub fps: u32,
    pub format: PixelFormat,
    pub buffer_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Raw video-to-window draw rate, independent of inference.
    pub draw_fps: u32,
    /// Debug clips whose name starts with this value are drawn mirrored.
    pub mirror_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Render tick rate driving the frame pump.
    pub refresh_hz: u32,
    /// Upper bound on inference attempts per second.
    pub inference_fps: u32,
    /// Keep the pump scheduled after an inference or sink failure.
    pub continue_on_error: bool,
    /// Pin the inference worker thread to this core.
    pub worker_core: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelBackend {
    /// Recorded detections played back from a JSON file.
    Replay,
    /// ONNX pose landmark model (requires `backend-tract`).
    Tract,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub backend: ModelBackend,
    pub model_path: PathBuf,
    pub replay_path: PathBuf,
    pub delegate: Delegate,
    pub num_poses: usize,
    /// Minimum pose presence score for the ONNX model.
    pub min_pose_score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipConfig {
    /// Clips are fetched from `<base_url><name>.mp4`.
    pub base_url: String,
    pub api_key: Option<String>,
    pub cache_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SinkConfig {
    Stdout,
    File { path: PathBuf },
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: FoundDevice::new(String::new(), PixelFormat::Mjpeg),
            width: 640,
            height: 480,
            fps: 30,
            format: PixelFormat::Mjpeg,
            buffer_count: 4,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            title: "Pose Screening".into(),
            width: 800,
            height: 600,
            draw_fps: 30,
            mirror_prefix: "3".into(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            refresh_hz: 60,
            inference_fps: 30,
            continue_on_error: false,
            worker_core: None,
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            backend: ModelBackend::Replay,
            model_path: PathBuf::from("models/pose_landmark_full.onnx"),
            replay_path: PathBuf::from("models/replay.json"),
            delegate: Delegate::Cpu,
            num_poses: 1,
            min_pose_score: 0.5,
        }
    }
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/debugVideos/".into(),
            api_key: None,
            cache_dir: std::env::temp_dir().join("screening-clips"),
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self::Stdout
    }
}

impl Config {
    /// Layer defaults, an optional TOML file and `SCREENING__*` environment
    /// variables.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }
        builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_the_screening_page() {
        let config = Config::default();
        assert_eq!(config.pipeline.inference_fps, 30);
        assert_eq!(config.display.draw_fps, 30);
        assert_eq!(config.capture.fps, 30);
        assert_eq!(config.display.mirror_prefix, "3");
        assert_eq!(config.inference.num_poses, 1);
        assert_eq!(config.sink, SinkConfig::Stdout);
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[pipeline]
inference_fps = 15
continue_on_error = true

[inference]
delegate = "GPU"

[sink]
kind = "file"
path = "/tmp/poses.jsonl"
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.pipeline.inference_fps, 15);
        assert!(config.pipeline.continue_on_error);
        assert_eq!(config.pipeline.refresh_hz, 60);
        assert_eq!(config.inference.delegate, Delegate::Gpu);
        assert_eq!(
            config.sink,
            SinkConfig::File {
                path: PathBuf::from("/tmp/poses.jsonl")
            }
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(Config::load(Some(Path::new("/nonexistent/screening.toml"))).is_err());
    }
}
