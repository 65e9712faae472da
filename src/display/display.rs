//! SDL2 Window Display Module
//! Draws the latest video frame onto the window at a fixed rate, scaled to
//! cover the window and optionally mirrored. Runs independently of the
//! frame pump; both only share the `VideoSurface`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use color_eyre::{eyre::eyre, Result};
use sdl2::event::{Event, WindowEvent};
use sdl2::pixels::PixelFormatEnum;
use sdl2::rect::Rect;
use sdl2::render::{Canvas, TextureCreator};
use sdl2::video::{Window, WindowContext};
use tracing::{debug, info, warn};

use crate::capture::{decoder, Frame, VideoSurface};
use crate::display::geometry::{DrawPlan, VideoGeometry};
use crate::pipeline::StreamControl;
use crate::DisplayConfig;

pub struct Sdl2Display {
    canvas: Canvas<Window>,
    texture_creator: TextureCreator<WindowContext>,
    width: u32,
    height: u32,
    mirrored: bool,
    draw_interval: Duration,
    last_sequence: Option<u64>,
    shown_first: bool,
}

impl Sdl2Display {
    pub fn new(sdl_context: &sdl2::Sdl, config: &DisplayConfig, mirrored: bool) -> Result<Self> {
        let video_subsystem = sdl_context.video().map_err(|e| eyre!(e))?;

        let window = video_subsystem
            .window(&config.title, config.width, config.height)
            .position_centered()
            .resizable()
            .build()?;

        let canvas = window.into_canvas().present_vsync().build()?;
        let texture_creator = canvas.texture_creator();

        Ok(Self {
            canvas,
            texture_creator,
            width: config.width,
            height: config.height,
            mirrored,
            draw_interval: Duration::from_secs_f64(1.0 / config.draw_fps.max(1) as f64),
            last_sequence: None,
            shown_first: false,
        })
    }

    /// Draw one frame covering the window.
    pub fn render_frame(&mut self, frame: &Frame) -> Result<()> {
        let rgb = decoder::decode_frame(frame)?;
        let plan = DrawPlan::new(
            VideoGeometry::new((rgb.width, rgb.height), (self.width, self.height)),
            self.mirrored,
        )?;

        let mut texture = self
            .texture_creator
            .create_texture_streaming(PixelFormatEnum::RGB24, rgb.width, rgb.height)
            .map_err(|e| eyre!(e))?;
        texture
            .update(None, &rgb.pixels, (rgb.width * 3) as usize)
            .map_err(|e| eyre!(e))?;

        let (x, y, w, h) = plan.rect.to_pixels();
        self.canvas.clear();
        self.canvas
            .copy_ex(
                &texture,
                None,
                Some(Rect::new(x, y, w, h)),
                0.0,
                None,
                plan.mirrored,
                false,
            )
            .map_err(|e| eyre!(e))?;
        self.canvas.present();

        if !self.shown_first {
            info!("First frame on screen ({}x{})", rgb.width, rgb.height);
            self.shown_first = true;
        }
        self.last_sequence = Some(frame.meta.sequence);
        Ok(())
    }

    /// Draw loop. Returns when the window is closed or the stream stops.
    pub fn run(
        &mut self,
        sdl_context: &sdl2::Sdl,
        surface: Arc<VideoSurface>,
        control: StreamControl,
    ) -> Result<()> {
        let mut event_pump = sdl_context.event_pump().map_err(|e| eyre!(e))?;

        'running: loop {
            let started = Instant::now();

            for event in event_pump.poll_iter() {
                match event {
                    Event::Quit { .. } => {
                        info!("Quit event received");
                        break 'running;
                    }
                    Event::Window {
                        win_event: WindowEvent::SizeChanged(w, h),
                        ..
                    } => {
                        debug!("Window resized to {}x{}", w, h);
                        self.width = w.max(1) as u32;
                        self.height = h.max(1) as u32;
                        self.last_sequence = None;
                    }
                    _ => {}
                }
            }

            if !control.is_running() {
                break 'running;
            }

            // Paused or ended media keeps the last frame on screen.
            if surface.is_playing() {
                if let Some(frame) = surface.current_frame() {
                    if self.last_sequence != Some(frame.meta.sequence) {
                        if let Err(e) = self.render_frame(&frame) {
                            warn!("Failed to draw frame: {}", e);
                        }
                        metrics::histogram!("draw_time_us")
                            .record(started.elapsed().as_micros() as f64);
                    }
                }
            }

            if let Some(rest) = self.draw_interval.checked_sub(started.elapsed()) {
                std::thread::sleep(rest);
            }
        }

        Ok(())
    }
}
