use image::imageops::{self, FilterType};
use kurbo::Rect;

use crate::assets::decode::PreparedImage;
use crate::foundation::core::{Canvas, HexColor, Rgba8Premul};
use crate::foundation::error::{DyelotError, DyelotResult};
use crate::foundation::math::mul_div255_u8;
use crate::render::blend::{CompositeOp, composite_in_place, composite_solid_in_place};

/// Premultiplied RGBA8 accumulation buffer with canvas-style drawing operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Surface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Surface {
    /// Fully transparent surface.
    pub fn new(width: u32, height: u32) -> DyelotResult<Self> {
        if width == 0 || height == 0 {
            return Err(DyelotError::render("surface dimensions must be non-zero"));
        }
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| DyelotError::render("surface size overflow"))?;
        Ok(Self {
            width,
            height,
            data: vec![0u8; len],
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel dimensions.
    pub fn size(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    /// Row-major premultiplied RGBA8 bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Full-surface rectangle in pixel coordinates.
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
    }

    /// Premultiplied pixel at `(x, y)`, or `None` outside the surface.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    /// Cover every pixel with `color` using `op`.
    pub fn fill(&mut self, color: Rgba8Premul, op: CompositeOp, opacity: f32) {
        composite_solid_in_place(&mut self.data, color.to_array(), op, opacity);
    }

    /// Composite another surface of the same size onto this one.
    pub fn draw_surface(
        &mut self,
        src: &Surface,
        op: CompositeOp,
        opacity: f32,
    ) -> DyelotResult<()> {
        if src.size() != self.size() {
            return Err(DyelotError::render(format!(
                "draw_surface size mismatch: {}x{} onto {}x{}",
                src.width, src.height, self.width, self.height
            )));
        }
        composite_in_place(&mut self.data, &src.data, op, opacity)
    }

    /// Draw `img` scaled into `dest` using `op`.
    ///
    /// Like a canvas `drawImage`, the source is treated as transparent outside `dest`, so
    /// coverage-based operations such as [`CompositeOp::DestinationIn`] affect the whole surface.
    /// An empty destination draws nothing.
    pub fn draw_image(
        &mut self,
        img: &PreparedImage,
        dest: Rect,
        op: CompositeOp,
        opacity: f32,
    ) -> DyelotResult<()> {
        let Some(layer) = self.rasterize_layer(img, dest)? else {
            return Ok(());
        };
        composite_in_place(&mut self.data, &layer, op, opacity)
    }

    /// Flatten over an opaque matte into straight RGB8.
    pub fn to_rgb8(&self, matte: HexColor) -> Vec<u8> {
        let m = [matte.r, matte.g, matte.b];
        let mut out = Vec::with_capacity((self.width as usize) * (self.height as usize) * 3);
        for px in self.data.chunks_exact(4) {
            let inv = 255u16 - u16::from(px[3]);
            for c in 0..3 {
                out.push(px[c].saturating_add(mul_div255_u8(u16::from(m[c]), inv)));
            }
        }
        out
    }

    /// Full-size transparent layer with `img` resampled into the pixel-snapped `dest`.
    ///
    /// Only the part of `dest` that lands on the surface is ever materialized.
    fn rasterize_layer(&self, img: &PreparedImage, dest: Rect) -> DyelotResult<Option<Vec<u8>>> {
        let x0 = dest.x0.round() as i64;
        let y0 = dest.y0.round() as i64;
        let x1 = dest.x1.round() as i64;
        let y1 = dest.y1.round() as i64;
        if x1 <= x0 || y1 <= y0 {
            return Ok(None);
        }

        let mut layer = vec![0u8; self.data.len()];
        let (w, h) = (i64::from(self.width), i64::from(self.height));
        let window = Window {
            x0: x0.clamp(0, w),
            y0: y0.clamp(0, h),
            x1: x1.clamp(0, w),
            y1: y1.clamp(0, h),
        };
        if window.x0 >= window.x1 || window.y0 >= window.y1 {
            return Ok(Some(layer));
        }

        if (window.x0, window.y0, window.x1, window.y1) == (x0, y0, x1, y1) {
            self.resize_into(&mut layer, img, &window)?;
        } else {
            self.sample_into(&mut layer, img, (x0, y0, x1, y1), &window);
        }
        Ok(Some(layer))
    }

    /// `dest` lies fully on the surface, so the resized buffer is bounded by the surface size.
    fn resize_into(
        &self,
        layer: &mut [u8],
        img: &PreparedImage,
        dest: &Window,
    ) -> DyelotResult<()> {
        let (dw, dh) = ((dest.x1 - dest.x0) as u32, (dest.y1 - dest.y0) as u32);
        let src = image::ImageBuffer::<image::Rgba<u8>, &[u8]>::from_raw(
            img.width,
            img.height,
            img.rgba8_premul.as_slice(),
        )
        .ok_or_else(|| DyelotError::render("layer pixel buffer does not match its dimensions"))?;

        // Premultiplied data resamples without dark fringes at alpha edges.
        let scaled = if (dw, dh) == (img.width, img.height) {
            None
        } else {
            Some(imageops::resize(&src, dw, dh, FilterType::Triangle))
        };
        let pixels: &[u8] = match &scaled {
            Some(buf) => buf.as_raw(),
            None => img.rgba8_premul.as_slice(),
        };

        let stride = (self.width as usize) * 4;
        let row_len = (dw as usize) * 4;
        for (sy, row) in (dest.y0..dest.y1).enumerate() {
            let s = sy * row_len;
            let d = (row as usize) * stride + (dest.x0 as usize) * 4;
            layer[d..d + row_len].copy_from_slice(&pixels[s..s + row_len]);
        }
        Ok(())
    }

    /// Bilinear sampling of `img` stretched over `full`, evaluated only inside `window`.
    fn sample_into(
        &self,
        layer: &mut [u8],
        img: &PreparedImage,
        full: (i64, i64, i64, i64),
        window: &Window,
    ) {
        let (x0, y0, x1, y1) = full;
        let sx = f64::from(img.width) / (x1 - x0) as f64;
        let sy = f64::from(img.height) / (y1 - y0) as f64;
        let max_x = f64::from(img.width - 1);
        let max_y = f64::from(img.height - 1);
        let src = img.rgba8_premul.as_slice();
        let src_stride = (img.width as usize) * 4;
        let stride = (self.width as usize) * 4;

        for row in window.y0..window.y1 {
            let v = (((row - y0) as f64 + 0.5) * sy - 0.5).clamp(0.0, max_y);
            let (ty, fy) = (v.floor() as usize, v.fract());
            let by = (ty + 1).min(img.height as usize - 1);
            for col in window.x0..window.x1 {
                let u = (((col - x0) as f64 + 0.5) * sx - 0.5).clamp(0.0, max_x);
                let (lx, fx) = (u.floor() as usize, u.fract());
                let rx = (lx + 1).min(img.width as usize - 1);

                let taps = [
                    (ty * src_stride + lx * 4, (1.0 - fx) * (1.0 - fy)),
                    (ty * src_stride + rx * 4, fx * (1.0 - fy)),
                    (by * src_stride + lx * 4, (1.0 - fx) * fy),
                    (by * src_stride + rx * 4, fx * fy),
                ];
                let mut px = [0u8; 4];
                for (c, out) in px.iter_mut().enumerate() {
                    let v: f64 = taps.iter().map(|&(i, wt)| f64::from(src[i + c]) * wt).sum();
                    *out = v.round().clamp(0.0, 255.0) as u8;
                }
                for c in 0..3 {
                    px[c] = px[c].min(px[3]);
                }

                let d = (row as usize) * stride + (col as usize) * 4;
                layer[d..d + 4].copy_from_slice(&px);
            }
        }
    }
}

/// Visible destination window in surface pixels, half-open.
struct Window {
    x0: i64,
    y0: i64,
    x1: i64,
    y1: i64,
}

#[cfg(test)]
#[path = "../../tests/unit/render/surface.rs"]
mod tests;
