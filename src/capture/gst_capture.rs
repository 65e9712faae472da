//! GStreamer clip playback for recorded debug videos

use std::path::Path;
use std::time::Instant;

use bytes::Bytes;
use color_eyre::{eyre::eyre, Result};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use tracing::{info, instrument, trace};

use crate::capture::frame::{Frame, FrameMetadata, PixelFormat};

/// Longest a single pull waits, so the capture thread can notice a stop.
const PULL_TIMEOUT_MS: u64 = 100;

/// Decodes a local video file to RGB frames at its native rate
pub struct GstCapture {
    pipeline: gst::Pipeline,
    appsink: gst_app::AppSink,
    sequence: u64,
}

impl GstCapture {
    pub fn from_file(path: &Path) -> Result<Self> {
        gst::init().map_err(|e| eyre!("Failed to initialize GStreamer: {}", e))?;

        let pipeline_str = Self::build_pipeline_string(path)?;
        info!("Pipeline: {}", pipeline_str);

        let pipeline = gst::parse::launch(&pipeline_str)?
            .downcast::<gst::Pipeline>()
            .map_err(|_| eyre!("Failed to create pipeline"))?;

        let appsink = pipeline
            .by_name("appsink")
            .ok_or_else(|| eyre!("Failed to find appsink element"))?
            .downcast::<gst_app::AppSink>()
            .map_err(|_| eyre!("Failed to cast to AppSink"))?;

        appsink.set_property("emit-signals", false);
        appsink.set_property("max-buffers", 2u32);
        appsink.set_property("drop", true);
        // Playback follows the clip clock so positions advance in real time.
        appsink.set_property("sync", true);

        Ok(Self {
            pipeline,
            appsink,
            sequence: 0,
        })
    }

    fn build_pipeline_string(path: &Path) -> Result<String> {
        let location = path
            .to_str()
            .ok_or_else(|| eyre!("Clip path is not valid UTF-8: {}", path.display()))?;
        Ok(format!(
            "filesrc location=\"{}\" ! \
             decodebin ! \
             videoconvert ! \
             video/x-raw,format=RGB ! \
             appsink name=appsink",
            location.replace('"', "\\\"")
        ))
    }

    pub fn start_stream(&mut self) -> Result<()> {
        info!("Starting clip playback");
        self.pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| eyre!("Failed to start pipeline: {:?}", e))?;
        Ok(())
    }

    pub fn stop_stream(&mut self) -> Result<()> {
        self.pipeline
            .set_state(gst::State::Null)
            .map_err(|e| eyre!("Failed to stop pipeline: {:?}", e))?;
        Ok(())
    }

    /// Seek back to the first frame and keep playing.
    #[instrument(skip(self))]
    pub fn restart(&mut self) -> Result<()> {
        info!("Restarting clip from the beginning");
        self.pipeline
            .seek_simple(
                gst::SeekFlags::FLUSH | gst::SeekFlags::KEY_UNIT,
                gst::ClockTime::ZERO,
            )
            .map_err(|e| eyre!("Seek failed: {}", e))?;
        self.pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| eyre!("Failed to resume pipeline: {:?}", e))?;
        Ok(())
    }

    pub fn is_ended(&self) -> bool {
        self.appsink.is_eos()
    }

    /// Pull the next decoded frame, waiting at most `PULL_TIMEOUT_MS`.
    /// Returns `None` on timeout or at end of stream; see [`Self::is_ended`].
    pub fn capture_frame(&mut self) -> Result<Option<Frame>> {
        let Some(sample) = self
            .appsink
            .try_pull_sample(gst::ClockTime::from_mseconds(PULL_TIMEOUT_MS))
        else {
            if self.appsink.is_eos() {
                trace!("Clip reached end of stream");
            }
            return Ok(None);
        };
        let timestamp = Instant::now();

        let buffer = sample
            .buffer()
            .ok_or_else(|| eyre!("Sample contains no buffer"))?;
        let map = buffer
            .map_readable()
            .map_err(|_| eyre!("Failed to map buffer"))?;
        let data = Bytes::copy_from_slice(map.as_slice());

        let caps = sample.caps().ok_or_else(|| eyre!("Sample has no caps"))?;
        let video_info = gst_video::VideoInfo::from_caps(caps)
            .map_err(|_| eyre!("Failed to parse video info from caps"))?;

        self.sequence += 1;
        let position = buffer
            .pts()
            .map(|pts| std::time::Duration::from_nanos(pts.nseconds()))
            .unwrap_or_default();

        let mut meta = FrameMetadata::packed(
            self.sequence,
            video_info.width(),
            video_info.height(),
            PixelFormat::Rgb24,
            position,
        );
        meta.stride = video_info.stride()[0] as u32;

        let mut frame = Frame::new(data, meta);
        frame.timestamp = timestamp;
        Ok(Some(frame))
    }
}

impl Drop for GstCapture {
    fn drop(&mut self) {
        let _ = self.stop_stream();
    }
}
