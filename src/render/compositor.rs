//! Garment recoloring.
//!
//! The layer order is the algorithm: a flat color fill is multiplied by the garment photograph so
//! the fabric's folds survive as darkening, then clipped to the photograph's alpha silhouette.
//! Lighting, the print graphic and (for white) a brightness lift are layered on top.

use kurbo::Rect;

use crate::assets::decode::PreparedImage;
use crate::assets::resolver::LayerBundle;
use crate::foundation::core::{Canvas, HexColor, Rgba8Premul};
use crate::foundation::error::{DyelotError, DyelotResult};
use crate::render::blend::CompositeOp;
use crate::render::encode::{EncodedImage, encode_jpeg};
use crate::render::surface::Surface;

/// Knobs for [`composite`]. Defaults reproduce the storefront preview.
#[derive(Clone, Debug, PartialEq)]
pub struct CompositorOpts {
    /// Display pixel density; the working surface is this many times the logical size.
    pub device_pixel_ratio: f32,
    /// JPEG quality, `1..=100`.
    pub jpeg_quality: u8,
    /// Opacity of the shadow overlay.
    pub shadow_opacity: f32,
    /// Design width as a fraction of the canvas width.
    pub design_width_frac: f64,
    /// Design top edge as a fraction of the canvas height.
    pub design_top_frac: f64,
    /// Apply the screen pass that brightens white garments.
    pub white_correction: bool,
    /// Opacity of that screen pass.
    pub white_screen_opacity: f32,
    /// Color transparent regions are flattened over before encoding.
    pub matte: HexColor,
}

impl Default for CompositorOpts {
    fn default() -> Self {
        Self {
            device_pixel_ratio: 1.0,
            jpeg_quality: 90,
            shadow_opacity: 0.3,
            design_width_frac: 0.4,
            design_top_frac: 0.3,
            white_correction: true,
            white_screen_opacity: 0.2,
            matte: HexColor::BLACK,
        }
    }
}

impl CompositorOpts {
    /// Reject settings that cannot produce an image.
    pub fn validate(&self) -> DyelotResult<()> {
        if !self.device_pixel_ratio.is_finite() || self.device_pixel_ratio <= 0.0 {
            return Err(DyelotError::validation(
                "device_pixel_ratio must be finite and > 0",
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(DyelotError::validation("jpeg_quality must be in 1..=100"));
        }
        for (name, v) in [
            ("shadow_opacity", self.shadow_opacity),
            ("white_screen_opacity", self.white_screen_opacity),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(DyelotError::validation(format!("{name} must be in 0..=1")));
            }
        }
        for (name, v) in [
            ("design_width_frac", self.design_width_frac),
            ("design_top_frac", self.design_top_frac),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(DyelotError::validation(format!(
                    "{name} must be finite and >= 0"
                )));
            }
        }
        Ok(())
    }
}

/// Logical and physical output size for one render.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputGeometry {
    /// Size the result is presented at.
    pub logical: Canvas,
    /// Size of the working surface and the encoded raster.
    pub pixels: Canvas,
}

/// Output size locked to the background's aspect ratio.
pub fn output_geometry(
    background: &PreparedImage,
    output_width: u32,
    device_pixel_ratio: f32,
) -> DyelotResult<OutputGeometry> {
    if output_width == 0 {
        return Err(DyelotError::validation("output width must be > 0"));
    }
    if background.width == 0 || background.height == 0 {
        return Err(DyelotError::render("background has zero size"));
    }
    let w = f64::from(output_width);
    let h = w * f64::from(background.height) / f64::from(background.width);
    let dpr = f64::from(device_pixel_ratio);

    let to_px = |v: f64| -> DyelotResult<u32> {
        let r = v.round().max(1.0);
        if r > f64::from(u16::MAX) {
            return Err(DyelotError::render(format!(
                "output dimension {r} exceeds encoder limit"
            )));
        }
        Ok(r as u32)
    };

    Ok(OutputGeometry {
        logical: Canvas {
            width: output_width,
            height: to_px(h)?,
        },
        pixels: Canvas {
            width: to_px(w * dpr)?,
            height: to_px(h * dpr)?,
        },
    })
}

/// Where the design lands on a `canvas`-sized surface.
///
/// Fixed chest-area placement: horizontally centered, `design_width_frac` of the canvas wide with
/// the design's own aspect ratio, top edge at `design_top_frac` of the canvas height.
pub fn design_rect(design: &PreparedImage, canvas: Canvas, opts: &CompositorOpts) -> Rect {
    let cw = f64::from(canvas.width);
    let ch = f64::from(canvas.height);
    let w = cw * opts.design_width_frac;
    let h = w * f64::from(design.height) / f64::from(design.width.max(1));
    let x = (cw - w) / 2.0;
    let y = ch * opts.design_top_frac;
    Rect::new(x, y, x + w, y + h)
}

/// Run the layer stack and return the premultiplied working surface.
pub fn compose_layers(
    bundle: &LayerBundle,
    color: HexColor,
    output_width: u32,
    opts: &CompositorOpts,
) -> DyelotResult<Surface> {
    compose(bundle, color, output_width, opts).map(|(surface, _)| surface)
}

fn compose(
    bundle: &LayerBundle,
    color: HexColor,
    output_width: u32,
    opts: &CompositorOpts,
) -> DyelotResult<(Surface, OutputGeometry)> {
    opts.validate()?;
    let geom = output_geometry(&bundle.background, output_width, opts.device_pixel_ratio)?;
    let mut acc = Surface::new(geom.pixels.width, geom.pixels.height)?;
    let full = acc.bounds();

    acc.draw_image(&bundle.background, full, CompositeOp::SourceOver, 1.0)?;

    // Tint on a separate layer so clipping to the silhouette keeps the background around it.
    let mut garment = Surface::new(geom.pixels.width, geom.pixels.height)?;
    garment.fill(color.to_rgba8_premul(), CompositeOp::SourceOver, 1.0);
    garment.draw_image(&bundle.base_shape, full, CompositeOp::Multiply, 1.0)?;
    garment.draw_image(&bundle.base_shape, full, CompositeOp::DestinationIn, 1.0)?;
    acc.draw_surface(&garment, CompositeOp::SourceOver, 1.0)?;

    if let Some(shadow) = &bundle.shadow {
        acc.draw_image(shadow, full, CompositeOp::SourceOver, opts.shadow_opacity)?;
    }

    if let Some(design) = &bundle.design {
        let dest = design_rect(design, geom.pixels, opts);
        acc.draw_image(design, dest, CompositeOp::SourceOver, 1.0)?;
    }

    if opts.white_correction && color.is_white() {
        acc.fill(
            Rgba8Premul::from_straight_rgba(255, 255, 255, 255),
            CompositeOp::Screen,
            opts.white_screen_opacity,
        );
    }

    Ok((acc, geom))
}

/// Composite `bundle` tinted to `color` and encode the result.
///
/// Pure: identical inputs give byte-identical output.
#[tracing::instrument(skip(bundle, color, opts), fields(color = %color))]
pub fn composite(
    bundle: &LayerBundle,
    color: HexColor,
    output_width: u32,
    opts: &CompositorOpts,
) -> DyelotResult<EncodedImage> {
    let result = compose(bundle, color, output_width, opts).and_then(|(surface, geom)| {
        encode_jpeg(&surface, opts.matte, opts.jpeg_quality, geom.logical)
    });
    match result {
        Ok(img) => {
            tracing::debug!(
                width = img.pixel_size().width,
                height = img.pixel_size().height,
                bytes = img.bytes().len(),
                "composite encoded"
            );
            Ok(img)
        }
        Err(e) => {
            tracing::warn!(error = %e, "composite failed");
            Err(match e {
                DyelotError::Render(_) => e,
                other => DyelotError::render(other.to_string()),
            })
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
