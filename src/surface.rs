//! 2D drawing surfaces the compositor paints on.

use image::imageops::{self, FilterType};
use image::{Pixel, Rgba, RgbaImage};

use crate::types::{AnchorRect, Point};

/// A transparent 2D layer drawn over the video, sized to the displayed frame.
///
/// Callers clear the surface at the start of each frame; nothing drawn on it
/// survives into the next frame.
pub trait Surface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Resize to match the displayed video. Contents are discarded.
    fn resize(&mut self, width: u32, height: u32);

    /// Reset every pixel to fully transparent.
    fn clear(&mut self);

    /// Composite `image` scaled into `rect`.
    fn draw_image(&mut self, image: &RgbaImage, rect: AnchorRect);

    fn fill_circle(&mut self, center: Point, radius: f32, color: Rgba<u8>);

    fn stroke_polyline(&mut self, points: &[Point], width: u32, color: Rgba<u8>);
}

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// An in-memory RGBA surface.
#[derive(Debug, Clone)]
pub struct Canvas {
    pixels: RgbaImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::from_pixel(width, height, TRANSPARENT),
        }
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }

    /// Whether no pixel carries any coverage.
    pub fn is_blank(&self) -> bool {
        self.pixels.pixels().all(|p| p[3] == 0)
    }

    fn blend_pixel(&mut self, x: u32, y: u32, color: Rgba<u8>) {
        self.pixels.get_pixel_mut(x, y).blend(&color);
    }

    /// Square brush of `width` pixels centered on (x, y), clipped to the canvas.
    fn stamp(&mut self, x: i64, y: i64, width: u32, color: Rgba<u8>) {
        let (w, h) = self.pixels.dimensions();
        let lo = -((width as i64 - 1) / 2);
        let hi = width as i64 / 2;

        for py in (y + lo).max(0)..=(y + hi).min(h as i64 - 1) {
            for px in (x + lo).max(0)..=(x + hi).min(w as i64 - 1) {
                self.blend_pixel(px as u32, py as u32, color);
            }
        }
    }

    fn draw_line(&mut self, from: Point, to: Point, width: u32, color: Rgba<u8>) {
        let margin = width as f32;
        let min = Point::new(-margin, -margin);
        let max = Point::new(
            self.pixels.width() as f32 + margin,
            self.pixels.height() as f32 + margin,
        );
        let Some((from, to)) = clip_segment(from, to, min, max) else {
            return;
        };

        let (x0, y0) = (from.x.round() as i64, from.y.round() as i64);
        let (x1, y1) = (to.x.round() as i64, to.y.round() as i64);

        let dx = (x1 - x0).abs();
        let dy = (y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx - dy;

        let mut x = x0;
        let mut y = y0;

        loop {
            self.stamp(x, y, width, color);

            if x == x1 && y == y1 {
                break;
            }

            let e2 = 2 * err;
            if e2 > -dy {
                err -= dy;
                x += sx;
            }
            if e2 < dx {
                err += dx;
                y += sy;
            }
        }
    }
}

/// Clip a segment to the box `[min, max]` (Liang-Barsky).
fn clip_segment(from: Point, to: Point, min: Point, max: Point) -> Option<(Point, Point)> {
    if ![from.x, from.y, to.x, to.y].iter().all(|v| v.is_finite()) {
        return None;
    }

    let (fx, fy) = (from.x as f64, from.y as f64);
    let (dx, dy) = (to.x as f64 - fx, to.y as f64 - fy);
    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;
    for (p, q) in [
        (-dx, fx - min.x as f64),
        (dx, max.x as f64 - fx),
        (-dy, fy - min.y as f64),
        (dy, max.y as f64 - fy),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return None;
                }
                t1 = t1.min(r);
            }
        }
    }

    let at = |t: f64| Point::new((fx + dx * t) as f32, (fy + dy * t) as f32);
    let start = if t0 > 0.0 { at(t0) } else { from };
    let end = if t1 < 1.0 { at(t1) } else { to };
    Some((start, end))
}

/// Where an image of `src_len` pixels stretched over `len` pixels at `pos`
/// lands inside `[0, canvas_len)`.
///
/// Returns the source range `[s0, s1)` that covers the visible part and the
/// destination range `[d0, d1)` that source range maps to.
fn visible_span(pos: i64, len: i64, src_len: u32, canvas_len: u32) -> Option<(u32, u32, i64, i64)> {
    let (pos_f, len_f) = (pos as f64, len as f64);
    let v0 = pos_f.max(0.0);
    let v1 = (pos_f + len_f).min(canvas_len as f64);
    if v0 >= v1 {
        return None;
    }

    let scale = len_f / src_len as f64;
    let s0 = (((v0 - pos_f) / scale).floor() as u32).min(src_len - 1);
    let s1 = (((v1 - pos_f) / scale).ceil() as u32).clamp(s0 + 1, src_len);

    let d0 = (pos_f + s0 as f64 * scale).round() as i64;
    let d1 = (pos_f + s1 as f64 * scale).round() as i64;
    Some((s0, s1, d0, d1.max(d0 + 1)))
}

impl Surface for Canvas {
    fn width(&self) -> u32 {
        self.pixels.width()
    }

    fn height(&self) -> u32 {
        self.pixels.height()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.pixels = RgbaImage::from_pixel(width, height, TRANSPARENT);
    }

    fn clear(&mut self) {
        for p in self.pixels.pixels_mut() {
            *p = TRANSPARENT;
        }
    }

    /// Only the part of `rect` inside the canvas is resampled.
    fn draw_image(&mut self, image: &RgbaImage, rect: AnchorRect) {
        let w = rect.width.round();
        let h = rect.height.round();
        let (iw, ih) = image.dimensions();
        if !(w >= 1.0 && h >= 1.0 && w.is_finite() && h.is_finite()) || iw == 0 || ih == 0 {
            return;
        }
        if !(rect.x.is_finite() && rect.y.is_finite()) {
            return;
        }

        let (x, y) = (rect.x.round() as i64, rect.y.round() as i64);
        let (w, h) = (w as i64, h as i64);
        let (cw, ch) = self.pixels.dimensions();

        let Some((sx0, sx1, dx0, dx1)) = visible_span(x, w, iw, cw) else {
            return;
        };
        let Some((sy0, sy1, dy0, dy1)) = visible_span(y, h, ih, ch) else {
            return;
        };

        let (dw, dh) = ((dx1 - dx0) as u32, (dy1 - dy0) as u32);
        let visible = if (sx0, sy0, sx1, sy1) == (0, 0, iw, ih) {
            None
        } else {
            Some(imageops::crop_imm(image, sx0, sy0, sx1 - sx0, sy1 - sy0).to_image())
        };
        let source = visible.as_ref().unwrap_or(image);

        if source.dimensions() == (dw, dh) {
            imageops::overlay(&mut self.pixels, source, dx0, dy0);
        } else {
            let scaled = imageops::resize(source, dw, dh, FilterType::Triangle);
            imageops::overlay(&mut self.pixels, &scaled, dx0, dy0);
        }
    }

    fn fill_circle(&mut self, center: Point, radius: f32, color: Rgba<u8>) {
        let r = radius.max(0.5) as f64;
        if !(r.is_finite() && center.x.is_finite() && center.y.is_finite()) {
            return;
        }

        let (w, h) = self.pixels.dimensions();
        let cx = (center.x as f64).round();
        let cy = (center.y as f64).round();
        let reach = r.ceil();

        // Saturating float casts keep far-off centers from overflowing
        let x0 = ((cx - reach) as i64).max(0);
        let x1 = ((cx + reach) as i64).min(w as i64 - 1);
        let y0 = ((cy - reach) as i64).max(0);
        let y1 = ((cy + reach) as i64).min(h as i64 - 1);

        for py in y0..=y1 {
            let dy = py as f64 - cy;
            for px in x0..=x1 {
                let dx = px as f64 - cx;
                if dx * dx + dy * dy <= r * r {
                    self.blend_pixel(px as u32, py as u32, color);
                }
            }
        }
    }

    fn stroke_polyline(&mut self, points: &[Point], width: u32, color: Rgba<u8>) {
        let width = width.max(1);
        for pair in points.windows(2) {
            self.draw_line(pair[0], pair[1], width, color);
        }
    }
}
