use crate::capture::frame::PixelFormat;
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use v4l::{capability::Flags, video::Capture, Device, FourCC};

/// Camera device path and the pixel format it will be opened with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoundDevice {
    pub path: String,
    pub format: PixelFormat,
}

impl FoundDevice {
    pub fn new(path: String, format: PixelFormat) -> Self {
        Self { path, format }
    }

    pub fn is_unset(&self) -> bool {
        self.path.trim().is_empty()
    }
}

fn fourcc_format(fourcc: FourCC) -> Option<PixelFormat> {
    if fourcc == FourCC::new(b"MJPG") {
        Some(PixelFormat::Mjpeg)
    } else if fourcc == FourCC::new(b"YUYV") {
        Some(PixelFormat::Yuyv4)
    } else if fourcc == FourCC::new(b"RGB3") {
        Some(PixelFormat::Rgb24)
    } else {
        None
    }
}

/// Find the first capture-capable camera, preferring `preferred` when a
/// device offers several formats we can decode.
pub async fn auto_detect_device(preferred: PixelFormat) -> Result<FoundDevice> {
    use std::path::Path;

    info!("Auto-detecting cameras...");

    let mut fallback = None;
    for i in 0..10 {
        let path = format!("/dev/video{}", i);
        if !Path::new(&path).exists() {
            continue;
        }

        let Ok(dev) = Device::with_path(&path) else {
            continue;
        };
        let Ok(caps) = dev.query_caps() else {
            continue;
        };
        if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
            debug!("{} has no capture capability", path);
            continue;
        }
        let Ok(formats) = dev.enum_formats() else {
            continue;
        };

        for format in formats.iter().filter_map(|f| fourcc_format(f.fourcc)) {
            if format == preferred {
                info!("Found {:?} camera: {} - {}", format, path, caps.card);
                return Ok(FoundDevice::new(path, format));
            }
            if fallback.is_none() {
                fallback = Some(FoundDevice::new(path.clone(), format));
            }
        }
    }

    fallback.ok_or_else(|| eyre!("No usable camera found"))
}
