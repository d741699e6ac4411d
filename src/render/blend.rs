use crate::foundation::error::{DyelotError, DyelotResult};
use crate::foundation::math::{add_sat_u8, mul_div255_u8, opacity_to_u16, unit_to_u8};

pub type PremulRgba8 = [u8; 4];

/// How a source layer combines with the accumulated destination.
///
/// Names follow the canvas `globalCompositeOperation` vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompositeOp {
    /// Porter-Duff source-over.
    SourceOver,
    /// Separable multiply blend, composited source-over.
    Multiply,
    /// Keep destination only where the source has coverage.
    DestinationIn,
    /// Separable screen blend, composited source-over.
    Screen,
}

/// Porter-Duff source-over with a global `opacity`.
pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let op = opacity_to_u16(opacity);
    if op == 0 || src[3] == 0 {
        return dst;
    }

    let sa = mul_div255_u8(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = add_sat_u8(sa, mul_div255_u8(u16::from(dst[3]), inv));

    for i in 0..3 {
        let sc = mul_div255_u8(u16::from(src[i]), op);
        let dc = mul_div255_u8(u16::from(dst[i]), inv);
        out[i] = add_sat_u8(sc, dc);
    }
    out
}

/// Scale `dst` by the source's coverage.
pub fn destination_in(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let sa = u16::from(mul_div255_u8(u16::from(src[3]), opacity_to_u16(opacity)));
    [
        mul_div255_u8(u16::from(dst[0]), sa),
        mul_div255_u8(u16::from(dst[1]), sa),
        mul_div255_u8(u16::from(dst[2]), sa),
        mul_div255_u8(u16::from(dst[3]), sa),
    ]
}

/// Separable multiply blend.
pub fn multiply(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    // out = sp * (1 - da) + dp * (1 - sa) + sp * dp
    separable(dst, src, opacity, |sp, dp, sa, da| {
        sp * (1.0 - da) + dp * (1.0 - sa) + sp * dp
    })
}

/// Separable screen blend.
pub fn screen(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    // out = sp + dp - sp * dp
    separable(dst, src, opacity, |sp, dp, _sa, _da| sp + dp - sp * dp)
}

#[inline(always)]
fn separable<F>(dst: PremulRgba8, src: PremulRgba8, opacity: f32, channel: F) -> PremulRgba8
where
    F: Fn(f32, f32, f32, f32) -> f32,
{
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    // Premultiplied src scaled by opacity.
    let sa = (src[3] as f32 / 255.0) * opacity;
    let da = dst[3] as f32 / 255.0;

    let mut out = [0u8; 4];
    for i in 0..3 {
        let sp = (src[i] as f32 / 255.0) * opacity;
        let dp = dst[i] as f32 / 255.0;
        out[i] = unit_to_u8(channel(sp, dp, sa, da));
    }
    out[3] = unit_to_u8(sa + da * (1.0 - sa));
    // Premultiplied invariant: no channel exceeds alpha.
    for i in 0..3 {
        out[i] = out[i].min(out[3]);
    }
    out
}

/// Composite an equally sized premultiplied layer onto `dst`.
pub fn composite_in_place(
    dst: &mut [u8],
    src: &[u8],
    op: CompositeOp,
    opacity: f32,
) -> DyelotResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(DyelotError::render(
            "composite_in_place expects equal-length rgba8 buffers",
        ));
    }

    // Kernel dispatch happens once per layer, not per pixel.
    match op {
        CompositeOp::SourceOver => apply(dst, src, opacity, over),
        CompositeOp::Multiply => apply(dst, src, opacity, multiply),
        CompositeOp::DestinationIn => apply(dst, src, opacity, destination_in),
        CompositeOp::Screen => apply(dst, src, opacity, screen),
    }
    Ok(())
}

/// Composite a single premultiplied color over every pixel of `dst`.
pub fn composite_solid_in_place(
    dst: &mut [u8],
    color: PremulRgba8,
    op: CompositeOp,
    opacity: f32,
) {
    let kernel: fn(PremulRgba8, PremulRgba8, f32) -> PremulRgba8 = match op {
        CompositeOp::SourceOver => over,
        CompositeOp::Multiply => multiply,
        CompositeOp::DestinationIn => destination_in,
        CompositeOp::Screen => screen,
    };
    for d in dst.chunks_exact_mut(4) {
        let out = kernel([d[0], d[1], d[2], d[3]], color, opacity);
        d.copy_from_slice(&out);
    }
}

#[inline(always)]
fn apply<F>(dst: &mut [u8], src: &[u8], opacity: f32, kernel: F)
where
    F: Fn(PremulRgba8, PremulRgba8, f32) -> PremulRgba8,
{
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let out = kernel([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]], opacity);
        d.copy_from_slice(&out);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/blend.rs"]
mod tests;
