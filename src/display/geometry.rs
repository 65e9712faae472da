//! Aspect-preserving "cover" fit of a video frame onto a drawing surface

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("cannot fit {source_width}x{source_height} into {target_width}x{target_height}")]
pub struct GeometryError {
    pub source_width: u32,
    pub source_height: u32,
    pub target_width: u32,
    pub target_height: u32,
}

/// Source frame and target surface dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoGeometry {
    pub source_width: u32,
    pub source_height: u32,
    pub target_width: u32,
    pub target_height: u32,
}

/// Where and how large to draw the frame, in target pixels. Offsets are
/// negative along the axis that overflows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRect {
    pub offset_x: f64,
    pub offset_y: f64,
    pub width: f64,
    pub height: f64,
}

impl VideoGeometry {
    pub fn new(source: (u32, u32), target: (u32, u32)) -> Self {
        Self {
            source_width: source.0,
            source_height: source.1,
            target_width: target.0,
            target_height: target.1,
        }
    }

    /// Scale the source uniformly so it covers the whole target, centred.
    /// One axis matches the target exactly, the other overflows evenly on
    /// both sides.
    pub fn cover(&self) -> Result<DrawRect, GeometryError> {
        if self.source_width == 0
            || self.source_height == 0
            || self.target_width == 0
            || self.target_height == 0
        {
            return Err(GeometryError {
                source_width: self.source_width,
                source_height: self.source_height,
                target_width: self.target_width,
                target_height: self.target_height,
            });
        }

        let (sw, sh) = (self.source_width as f64, self.source_height as f64);
        let (tw, th) = (self.target_width as f64, self.target_height as f64);

        let (width, height) = if sw / sh < tw / th {
            (tw, sh * (tw / sw))
        } else {
            (sw * (th / sh), th)
        };

        Ok(DrawRect {
            offset_x: tw * 0.5 - width * 0.5,
            offset_y: th * 0.5 - height * 0.5,
            width,
            height,
        })
    }
}

impl DrawRect {
    /// Integer rect for the renderer: position rounded, size rounded up so
    /// the surface stays covered.
    pub fn to_pixels(&self) -> (i32, i32, u32, u32) {
        (
            self.offset_x.round() as i32,
            self.offset_y.round() as i32,
            self.width.ceil().max(1.0) as u32,
            self.height.ceil().max(1.0) as u32,
        )
    }
}

/// A frame draw: the fitted rect plus the presentation-only mirror flag.
/// Mirroring never changes the reported landmark coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawPlan {
    pub rect: DrawRect,
    pub mirrored: bool,
}

impl DrawPlan {
    pub fn new(geometry: VideoGeometry, mirrored: bool) -> Result<Self, GeometryError> {
        Ok(Self {
            rect: geometry.cover()?,
            mirrored,
        })
    }
}
