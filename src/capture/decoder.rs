use color_eyre::{eyre::eyre, Result};
use jpeg_decoder::Decoder;

use super::frame::{Frame, PixelFormat};

/// Tightly packed RGB24 pixels
#[derive(Debug, Clone)]
pub struct RgbFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

pub fn decode_frame(frame: &Frame) -> Result<RgbFrame> {
    let meta = &frame.meta;
    let data = &frame.data[..];
    match meta.format {
        PixelFormat::Mjpeg => decode_mjpeg(data),
        PixelFormat::Rgb24 => {
            let pixels = unpack(data, meta.width, meta.height, meta.stride, 3)?;
            Ok(RgbFrame {
                width: meta.width,
                height: meta.height,
                pixels,
            })
        }
        PixelFormat::Bgr24 => {
            let mut pixels = unpack(data, meta.width, meta.height, meta.stride, 3)?;
            for px in pixels.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
            Ok(RgbFrame {
                width: meta.width,
                height: meta.height,
                pixels,
            })
        }
        PixelFormat::Yuyv4 => {
            let packed = unpack(data, meta.width, meta.height, meta.stride, 2)?;
            Ok(RgbFrame {
                width: meta.width,
                height: meta.height,
                pixels: yuyv_to_rgb(&packed),
            })
        }
        PixelFormat::Nv12 => Err(eyre!("Unsupported format: {:?}", meta.format)),
    }
}

fn decode_mjpeg(data: &[u8]) -> Result<RgbFrame> {
    let mut decoder = Decoder::new(data);
    let pixels = decoder.decode()?;
    let info = decoder
        .info()
        .ok_or_else(|| eyre!("JPEG header missing after decode"))?;

    let pixels = match info.pixel_format {
        jpeg_decoder::PixelFormat::RGB24 => pixels,
        jpeg_decoder::PixelFormat::L8 => pixels.iter().flat_map(|&l| [l, l, l]).collect(),
        other => return Err(eyre!("Unsupported JPEG pixel format: {:?}", other)),
    };

    Ok(RgbFrame {
        width: info.width as u32,
        height: info.height as u32,
        pixels,
    })
}

/// Drop row padding so rows are exactly `width * bpp` bytes.
fn unpack(data: &[u8], width: u32, height: u32, stride: u32, bpp: u32) -> Result<Vec<u8>> {
    let row = (width * bpp) as usize;
    let stride = (stride as usize).max(row);
    let needed = stride * (height as usize).saturating_sub(1) + row;
    if height == 0 || data.len() < needed {
        return Err(eyre!(
            "Frame too short: {} bytes for {}x{} (stride {})",
            data.len(),
            width,
            height,
            stride
        ));
    }
    if stride == row {
        return Ok(data[..row * height as usize].to_vec());
    }
    let mut out = Vec::with_capacity(row * height as usize);
    for y in 0..height as usize {
        out.extend_from_slice(&data[y * stride..y * stride + row]);
    }
    Ok(out)
}

// BT.601 limited range
fn yuyv_to_rgb(packed: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(packed.len() / 2 * 3);
    for chunk in packed.chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        rgb.extend_from_slice(&yuv_pixel(y0, u, v));
        rgb.extend_from_slice(&yuv_pixel(y1, u, v));
    }
    rgb
}

fn yuv_pixel(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = (y as i32 - 16).max(0);
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clamp = |x: i32| ((x + 128) >> 8).clamp(0, 255) as u8;
    [
        clamp(298 * c + 409 * e),
        clamp(298 * c - 100 * d - 208 * e),
        clamp(298 * c + 516 * d),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::FrameMetadata;
    use bytes::Bytes;
    use std::time::Duration;

    fn frame(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Frame {
        Frame::new(
            Bytes::from(data),
            FrameMetadata::packed(1, width, height, format, Duration::ZERO),
        )
    }

    #[test]
    fn bgr_is_swapped_to_rgb() {
        let decoded = decode_frame(&frame(vec![1, 2, 3, 4, 5, 6], 2, 1, PixelFormat::Bgr24)).unwrap();
        assert_eq!(decoded.pixels, vec![3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn yuyv_grey_and_white() {
        // Neutral chroma: black-level luma 16 and white-level 235.
        let decoded =
            decode_frame(&frame(vec![16, 128, 235, 128], 2, 1, PixelFormat::Yuyv4)).unwrap();
        assert_eq!(decoded.width, 2);
        assert_eq!(&decoded.pixels[..3], &[0, 0, 0]);
        assert_eq!(&decoded.pixels[3..], &[255, 255, 255]);
    }

    #[test]
    fn padded_rows_are_unpacked() {
        let mut meta = FrameMetadata::packed(1, 1, 2, PixelFormat::Rgb24, Duration::ZERO);
        meta.stride = 4;
        let f = Frame::new(Bytes::from(vec![9, 8, 7, 0, 6, 5, 4, 0]), meta);
        let decoded = decode_frame(&f).unwrap();
        assert_eq!(decoded.pixels, vec![9, 8, 7, 6, 5, 4]);
    }

    #[test]
    fn short_frame_is_rejected() {
        assert!(decode_frame(&frame(vec![0; 5], 2, 1, PixelFormat::Rgb24)).is_err());
    }
}
