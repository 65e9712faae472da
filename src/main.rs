//! Pose screening: live camera or debug clip on screen, pose landmarks
//! streamed to the host as JSON lines

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use screening::capture::{clip, spawn_capture, MediaSource, V4l2Capture, VideoSurface};
use screening::display::Sdl2Display;
use screening::inference::{self, Delegate, PoseEngine};
use screening::params::LaunchParams;
use screening::pipeline::{FramePump, PumpOptions, StreamControl};
use screening::{sink, utils, Config};

#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// TOML configuration file
    #[arg(long, env = "SCREENING_CONFIG")]
    config: Option<PathBuf>,

    /// Launch parameters as a query string, e.g. `delegate=GPU&debugVideo=3squat`
    #[arg(long)]
    query: Option<String>,

    /// Inference backend (CPU or GPU); overrides the query string
    #[arg(long)]
    delegate: Option<Delegate>,

    /// Play this recorded clip instead of the camera; overrides the query string
    #[arg(long)]
    debug_video: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    // stdout carries the pose payloads
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("screening=debug")),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .with_writer(std::io::stderr)
        .init();

    info!("Pose screening launching...");

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;

    let query = match args.query.as_deref() {
        Some(query) => LaunchParams::parse(query)?,
        None => LaunchParams::default(),
    };
    let params = query.merge(LaunchParams {
        delegate: args.delegate,
        debug_video: args.debug_video.filter(|name| !name.is_empty()),
    });
    if let Some(delegate) = params.delegate {
        config.inference.delegate = delegate;
    }
    screening::CONFIG.store(Arc::new(config.clone()));

    // Nothing starts until the model is loaded.
    let engine = Arc::new(inference::build_engine(
        &config.inference,
        config.pipeline.worker_core,
    )?);
    info!(
        "Inference engine {} on {}",
        engine.name(),
        config.inference.delegate
    );

    let mut media = open_media(&config, params.debug_video.as_deref()).await?;
    media.start()?;

    let surface = Arc::new(VideoSurface::new());
    let control = StreamControl::new();

    // Detached; the thread exits once `control` stops.
    let _capture_thread = spawn_capture(media, surface.clone(), control.clone())?;

    let pump = FramePump::new(
        engine,
        sink::open(&config.sink)?,
        surface.clone(),
        control.clone(),
        PumpOptions::from(&config.pipeline),
    );
    let pump_control = control.clone();
    let pump_handle = tokio::spawn(async move {
        let result = pump.run().await;
        pump_control.stop();
        result
    });

    spawn_signal_handlers(control.clone());

    let sdl_context = sdl2::init().map_err(|e| eyre!(e))?;
    let mirrored = params.mirrored(&config.display.mirror_prefix);
    let mut display = Sdl2Display::new(&sdl_context, &config.display, mirrored)?;
    display.run(&sdl_context, surface, control.clone())?;
    control.stop();

    let outcome = tokio::time::timeout(Duration::from_secs(2), pump_handle).await;

    match outcome {
        Ok(Ok(Ok(snapshot))) => info!("Pose screening shutting down: {:?}", snapshot),
        Ok(Ok(Err(e))) => return Err(e.into()),
        Ok(Err(e)) => return Err(eyre!("Frame pump task failed: {}", e)),
        Err(_) => warn!("Inference still in flight at shutdown; not waiting for it"),
    }
    Ok(())
}

async fn open_media(config: &Config, debug_video: Option<&str>) -> Result<MediaSource> {
    match debug_video {
        Some(name) => {
            let clip_config = config.clip.clone();
            let name = name.to_string();
            let path =
                tokio::task::spawn_blocking(move || clip::fetch_clip(&clip_config, &name)).await??;
            MediaSource::clip(&path)
        }
        None => {
            let mut capture_config = config.capture.clone();
            if capture_config.device.is_unset() {
                capture_config.device = utils::auto_detect_device(capture_config.format).await?;
            }
            info!("Using camera: {:?}", capture_config.device);
            Ok(MediaSource::Camera(V4l2Capture::new(capture_config)?))
        }
    }
}

fn spawn_signal_handlers(control: StreamControl) {
    let stop = control.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted");
            stop.stop();
        }
    });

    // SIGUSR1 rewinds a debug clip
    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::user_defined1()) {
            Ok(mut restarts) => {
                while restarts.recv().await.is_some() {
                    info!("Restart requested");
                    control.request_restart();
                }
            }
            Err(e) => warn!("Restart signal unavailable: {}", e),
        }
    });
    #[cfg(not(unix))]
    drop(control);
}
