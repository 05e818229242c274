//! Off-screen raster surface
//!
//! An RGBA8 buffer with the handful of drawing operations the compositor
//! needs: clear, stretched draw, circle-clipped draw and circle stroke.

use crate::capture::traits::VideoFrame;
use crate::utils::error::{AppError, AppResult};
use bytes::Bytes;

/// Axis-aligned rectangle in surface pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Radius of the circle inscribed in this rectangle
    pub fn inscribed_radius(&self) -> f64 {
        self.width.min(self.height) / 2.0
    }
}

/// RGBA8 raster canvas
pub struct RasterSurface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; (width as usize) * (height as usize) * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// RGBA value at (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 4) as usize;
        Some([
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ])
    }

    /// Reset every pixel to transparent black
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Draw `frame` stretched over the whole surface (nearest neighbor)
    pub fn draw_stretched(&mut self, frame: &VideoFrame) {
        let rect = PixelRect {
            x: 0.0,
            y: 0.0,
            width: self.width as f64,
            height: self.height as f64,
        };
        self.draw_frame(frame, rect, None);
    }

    /// Draw `frame` scaled into `rect`, keeping only pixels inside the
    /// circle inscribed in `rect`
    pub fn draw_circle_clipped(&mut self, frame: &VideoFrame, rect: PixelRect) {
        let (cx, cy) = rect.center();
        let radius = rect.inscribed_radius();
        self.draw_frame(frame, rect, Some((cx, cy, radius)));
    }

    fn draw_frame(&mut self, frame: &VideoFrame, rect: PixelRect, clip: Option<(f64, f64, f64)>) {
        if frame.width == 0 || frame.height == 0 || rect.width <= 0.0 || rect.height <= 0.0 {
            return;
        }
        let expected = (frame.width as usize) * (frame.height as usize) * 4;
        if frame.data.len() < expected {
            tracing::warn!(
                "Skipping frame with {} bytes, expected {} ({}x{}x4)",
                frame.data.len(),
                expected,
                frame.width,
                frame.height
            );
            return;
        }

        let x0 = rect.x.floor().max(0.0) as u32;
        let y0 = rect.y.floor().max(0.0) as u32;
        let x1 = ((rect.x + rect.width).ceil().max(0.0) as u32).min(self.width);
        let y1 = ((rect.y + rect.height).ceil().max(0.0) as u32).min(self.height);

        for dy in y0..y1 {
            let py = dy as f64 + 0.5;
            let v = (py - rect.y) / rect.height;
            if !(0.0..1.0).contains(&v) {
                continue;
            }
            let src_y = ((v * frame.height as f64) as u32).min(frame.height - 1);

            for dx in x0..x1 {
                let px = dx as f64 + 0.5;
                if let Some((cx, cy, r)) = clip {
                    let (ddx, ddy) = (px - cx, py - cy);
                    if ddx * ddx + ddy * ddy > r * r {
                        continue;
                    }
                }
                let u = (px - rect.x) / rect.width;
                if !(0.0..1.0).contains(&u) {
                    continue;
                }
                let src_x = ((u * frame.width as f64) as u32).min(frame.width - 1);

                let src_idx = ((src_y * frame.width + src_x) * 4) as usize;
                let dst_idx = ((dy * self.width + dx) * 4) as usize;
                self.data[dst_idx..dst_idx + 3].copy_from_slice(&frame.data[src_idx..src_idx + 3]);
                self.data[dst_idx + 3] = 255;
            }
        }
    }

    /// Stroke a ring of `line_width` pixels centered on the circle's edge
    pub fn stroke_circle(&mut self, cx: f64, cy: f64, radius: f64, line_width: f64, color: [u8; 4]) {
        if radius <= 0.0 || line_width <= 0.0 {
            return;
        }
        let half = line_width / 2.0;
        let outer = radius + half;
        let inner = (radius - half).max(0.0);

        let x0 = (cx - outer).floor().max(0.0) as u32;
        let y0 = (cy - outer).floor().max(0.0) as u32;
        let x1 = ((cx + outer).ceil().max(0.0) as u32).min(self.width);
        let y1 = ((cy + outer).ceil().max(0.0) as u32).min(self.height);

        for y in y0..y1 {
            for x in x0..x1 {
                let dx = x as f64 + 0.5 - cx;
                let dy = y as f64 + 0.5 - cy;
                let dist_sq = dx * dx + dy * dy;
                if dist_sq >= inner * inner && dist_sq <= outer * outer {
                    let idx = ((y * self.width + x) * 4) as usize;
                    self.data[idx..idx + 4].copy_from_slice(&color);
                }
            }
        }
    }

    /// Copy the current contents into a frame
    pub fn snapshot(&self, timestamp_ms: f64) -> VideoFrame {
        VideoFrame::new(
            self.width,
            self.height,
            Bytes::copy_from_slice(&self.data),
            timestamp_ms,
        )
    }

    /// Encode the current contents as PNG
    pub fn encode_png(&self) -> AppResult<Vec<u8>> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, self.width, self.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder
                .write_header()
                .map_err(|e| AppError::Io(std::io::Error::other(e.to_string())))?;
            writer
                .write_image_data(&self.data)
                .map_err(|e| AppError::Io(std::io::Error::other(e.to_string())))?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> VideoFrame {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
        }
        VideoFrame::new(width, height, Bytes::from(data), 0.0)
    }

    #[test]
    fn test_stretched_draw_fills_surface() {
        let mut surface = RasterSurface::new(16, 9);
        surface.draw_stretched(&solid(4, 4, [10, 20, 30]));
        assert_eq!(surface.pixel(0, 0), Some([10, 20, 30, 255]));
        assert_eq!(surface.pixel(15, 8), Some([10, 20, 30, 255]));

        surface.clear();
        assert_eq!(surface.pixel(7, 4), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_circle_clip_leaves_corners_untouched() {
        let mut surface = RasterSurface::new(40, 40);
        let rect = PixelRect {
            x: 0.0,
            y: 0.0,
            width: 40.0,
            height: 40.0,
        };
        surface.draw_circle_clipped(&solid(8, 8, [200, 0, 0]), rect);

        assert_eq!(surface.pixel(20, 20), Some([200, 0, 0, 255]));
        assert_eq!(surface.pixel(0, 0), Some([0, 0, 0, 0]));
        assert_eq!(surface.pixel(39, 39), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_stroke_circle_ring() {
        let mut surface = RasterSurface::new(40, 40);
        surface.stroke_circle(20.0, 20.0, 10.0, 2.0, [255, 255, 255, 255]);

        assert_eq!(surface.pixel(29, 20), Some([255, 255, 255, 255]));
        assert_eq!(surface.pixel(20, 20), Some([0, 0, 0, 0]));
        assert_eq!(surface.pixel(0, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_short_frame_is_skipped() {
        let mut surface = RasterSurface::new(4, 4);
        let frame = VideoFrame::new(4, 4, Bytes::from(vec![255; 8]), 0.0);
        surface.draw_stretched(&frame);
        assert_eq!(surface.pixel(0, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_png_signature() {
        let surface = RasterSurface::new(2, 2);
        let png = surface.encode_png().unwrap();
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }
}
