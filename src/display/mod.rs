pub mod display;
pub mod geometry;

pub use display::Sdl2Display;
pub use geometry::{DrawPlan, DrawRect, GeometryError, VideoGeometry};
