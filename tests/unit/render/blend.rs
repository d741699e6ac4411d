use super::*;

#[test]
fn over_opacity_0_is_noop() {
    let dst = [1, 2, 3, 4];
    let src = [200, 200, 200, 200];
    assert_eq!(over(dst, src, 0.0), dst);
}

#[test]
fn over_src_opaque_replaces_dst() {
    let dst = [0, 0, 0, 255];
    let src = [255, 0, 0, 255];
    assert_eq!(over(dst, src, 1.0), src);
}

#[test]
fn over_dst_transparent_returns_scaled_src() {
    let dst = [0, 0, 0, 0];
    let src = [100, 110, 120, 200];
    assert_eq!(over(dst, src, 1.0), src);
}

#[test]
fn multiply_tints_by_source_luminance() {
    let red = [255, 0, 0, 255];
    let gray = [128, 128, 128, 255];
    assert_eq!(multiply(red, gray, 1.0), [128, 0, 0, 255]);

    let white = [255, 255, 255, 255];
    assert_eq!(multiply(red, white, 1.0), red);
}

#[test]
fn multiply_with_transparent_source_keeps_destination() {
    let dst = [12, 200, 40, 255];
    assert_eq!(multiply(dst, [0, 0, 0, 0], 1.0), dst);
}

#[test]
fn multiply_black_fill_stays_black() {
    let black = [0, 0, 0, 255];
    assert_eq!(multiply(black, [220, 180, 90, 255], 1.0), black);
}

#[test]
fn destination_in_clips_to_source_alpha() {
    let dst = [200, 100, 50, 255];
    assert_eq!(destination_in(dst, [9, 9, 9, 255], 1.0), dst);
    assert_eq!(destination_in(dst, [0, 0, 0, 0], 1.0), [0, 0, 0, 0]);
    assert_eq!(destination_in(dst, [0, 0, 0, 128], 1.0), [100, 50, 25, 128]);
}

#[test]
fn screen_brightens_and_white_at_full_is_white() {
    let dst = [100, 100, 100, 255];
    let out = screen(dst, [255, 255, 255, 255], 0.2);
    assert!(out[0] > dst[0]);
    assert_eq!(out[3], 255);
    assert_eq!(screen(dst, [255, 255, 255, 255], 1.0), [255, 255, 255, 255]);
    assert_eq!(screen(dst, [0, 0, 0, 255], 1.0), dst);
}

#[test]
fn separable_output_stays_premultiplied() {
    let out = screen([10, 10, 10, 20], [200, 0, 0, 200], 1.0);
    assert!(out.iter().take(3).all(|&c| c <= out[3]));
}

#[test]
fn composite_in_place_rejects_mismatched_buffers() {
    let mut dst = vec![0u8; 8];
    assert!(composite_in_place(&mut dst, &[0u8; 4], CompositeOp::SourceOver, 1.0).is_err());
    assert!(composite_in_place(&mut [0u8; 3], &[0u8; 3], CompositeOp::SourceOver, 1.0).is_err());
}

#[test]
fn composite_in_place_dispatches_per_op() {
    let mut dst = [255u8, 0, 0, 255, 255, 0, 0, 255].to_vec();
    let src = [128u8, 128, 128, 255, 0, 0, 0, 0];
    composite_in_place(&mut dst, &src, CompositeOp::Multiply, 1.0).unwrap();
    assert_eq!(dst, vec![128, 0, 0, 255, 255, 0, 0, 255]);
    composite_in_place(&mut dst, &src, CompositeOp::DestinationIn, 1.0).unwrap();
    assert_eq!(dst, vec![128, 0, 0, 255, 0, 0, 0, 0]);
}

#[test]
fn solid_fill_source_over_replaces_everything() {
    let mut dst = vec![1u8, 2, 3, 4, 0, 0, 0, 0];
    composite_solid_in_place(&mut dst, [9, 8, 7, 255], CompositeOp::SourceOver, 1.0);
    assert_eq!(dst, vec![9, 8, 7, 255, 9, 8, 7, 255]);
}
