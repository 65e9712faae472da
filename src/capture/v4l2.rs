//! Live camera capture over V4L2 memory-mapped buffers

use std::time::{Duration, Instant};

use bytes::Bytes;
use color_eyre::{eyre::eyre, Result};
use tracing::{info, instrument, warn};
use v4l::buffer::Type;
use v4l::capability::Flags as CapFlags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::{
    capture::frame::{Frame, FrameMetadata, PixelFormat},
    CaptureConfig,
};

pub struct V4l2Capture {
    device: Box<Device>,
    stream: Option<MmapStream<'static>>,
    config: CaptureConfig,
    width: u32,
    height: u32,
    stride: u32,
    sequence: u64,
    started: Option<Instant>,
}

impl V4l2Capture {
    /// Open the camera and negotiate the configured size and format
    pub fn new(config: CaptureConfig) -> Result<Self> {
        info!("Opening camera: {:?}", config.device);

        let device = Device::with_path(&config.device.path)?;

        let caps = device.query_caps()?;
        info!("Device: {} ({})", caps.card, caps.driver);

        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            return Err(eyre!("Device doesn't support video capture"));
        }

        let mut fmt = device.format()?;
        fmt.width = config.width;
        fmt.height = config.height;
        fmt.fourcc = match config.device.format {
            PixelFormat::Mjpeg => FourCC::new(b"MJPG"),
            PixelFormat::Yuyv4 => FourCC::new(b"YUYV"),
            PixelFormat::Rgb24 => FourCC::new(b"RGB3"),
            other => return Err(eyre!("Unsupported pixel format: {:?}", other)),
        };

        // The driver may pick the nearest size it supports.
        let actual = device.set_format(&fmt)?;
        if actual.width != config.width || actual.height != config.height {
            info!(
                "Camera negotiated {}x{} instead of {}x{}",
                actual.width, actual.height, config.width, config.height
            );
        }

        if config.fps > 0 {
            match device.set_params(&Parameters::with_fps(config.fps)) {
                Ok(params) => info!(
                    "Camera frame interval {}/{} s",
                    params.interval.numerator, params.interval.denominator
                ),
                Err(e) => warn!("Failed to set {} fps: {}", config.fps, e),
            }
        }

        Ok(Self {
            device: Box::new(device),
            stream: None,
            width: actual.width,
            height: actual.height,
            stride: actual.stride,
            config,
            sequence: 0,
            started: None,
        })
    }

    pub fn start_stream(&mut self) -> Result<()> {
        let stream =
            MmapStream::with_buffers(&self.device, Type::VideoCapture, self.config.buffer_count)?;

        self.stream = Some(stream);
        self.started = Some(Instant::now());
        info!(
            "Camera stream started with {} buffers",
            self.config.buffer_count
        );
        Ok(())
    }

    /// Dequeue the next frame, blocking until the driver has one. The
    /// playback position of a live stream is the time since the stream
    /// started.
    #[instrument(level = "trace", skip(self))]
    pub fn capture_frame(&mut self) -> Result<Frame> {
        let timestamp = Instant::now();

        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| eyre!("Stream not started"))?;

        let (buf, meta) = stream.next()?;
        let used = (meta.bytesused as usize).min(buf.len());
        let data = Bytes::copy_from_slice(&buf[..used]);

        self.sequence += 1;
        let position = self
            .started
            .map(|started| timestamp.duration_since(started))
            .unwrap_or_default();

        let mut frame_meta = FrameMetadata::packed(
            self.sequence,
            self.width,
            self.height,
            self.config.device.format,
            position,
        );
        if self.stride > 0 {
            frame_meta.stride = self.stride;
        }
        frame_meta.device_timestamp = Some(
            Duration::from_secs(meta.timestamp.sec as u64)
                + Duration::from_micros(meta.timestamp.usec as u64),
        );

        let mut frame = Frame::new(data, frame_meta);
        frame.timestamp = timestamp;
        Ok(frame)
    }
}
