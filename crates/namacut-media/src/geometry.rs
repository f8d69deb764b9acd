//! Display <-> source coordinate mapping for crop selections.
//!
//! The crop box is drawn over a viewport that may carry letterbox/pillarbox
//! bars and shows the frame rotated and flipped. The encoder crops *before*
//! any rotation, so the box must be mapped back to original source pixels.
//!
//! Nothing in here fails loudly: degenerate input maps to "no crop".

use namacut_models::{
    AspectRatioPreset, CropRect, DisplayGeometry, Rect, Rotation, TransformState,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Crop boxes narrower or shorter than this (display pixels) are ignored.
pub const MIN_CROP_DISPLAY_PX: f64 = 10.0;

/// Smallest default crop box (display pixels).
pub const MIN_DEFAULT_CROP_PX: f64 = 50.0;

/// Relative tolerance for "already on ratio".
const RATIO_EPSILON: f64 = 1e-9;

/// Padding bars needed to center the rotated frame in the viewport.
///
/// Returns `(pad_x, pad_y)`. At most one is non-zero; both are zero for an
/// exact aspect match or for any zero dimension.
pub fn compute_padding(
    source_width: u32,
    source_height: u32,
    rotation: Rotation,
    viewport_width: u32,
    viewport_height: u32,
) -> (f64, f64) {
    if source_width == 0 || source_height == 0 || viewport_width == 0 || viewport_height == 0 {
        return (0.0, 0.0);
    }

    let (ew, eh) = rotation.effective_dimensions(source_width, source_height);
    let (ew, eh) = (ew as f64, eh as f64);
    let (vw, vh) = (viewport_width as f64, viewport_height as f64);

    // Cross-multiplied ratio comparison keeps exact matches exact.
    let video_cross = ew * vh;
    let display_cross = vw * eh;

    if video_cross > display_cross {
        // Wider than the viewport: bars top and bottom
        let pad_y = (vh - vw * eh / ew) / 2.0;
        (0.0, snap_padding(pad_y))
    } else if video_cross < display_cross {
        // Taller than the viewport: bars left and right
        let pad_x = (vw - vh * ew / eh) / 2.0;
        (snap_padding(pad_x), 0.0)
    } else {
        (0.0, 0.0)
    }
}

fn snap_padding(pad: f64) -> f64 {
    if pad.is_finite() && pad > 1e-9 {
        pad
    } else {
        0.0
    }
}

/// Full display geometry for a source shown in a viewport.
pub fn display_geometry(
    source_width: u32,
    source_height: u32,
    rotation: Rotation,
    viewport_width: u32,
    viewport_height: u32,
) -> DisplayGeometry {
    let (effective_width, effective_height) =
        rotation.effective_dimensions(source_width, source_height);
    let (pad_x, pad_y) = compute_padding(
        source_width,
        source_height,
        rotation,
        viewport_width,
        viewport_height,
    );

    DisplayGeometry {
        viewport_width,
        viewport_height,
        source_width,
        source_height,
        rotation,
        effective_width,
        effective_height,
        pad_x,
        pad_y,
    }
}

/// Map a display-space crop box to an even-sized source-pixel rectangle.
///
/// Returns `None` ("no crop") when the box is smaller than
/// [`MIN_CROP_DISPLAY_PX`] inside the video region, lies entirely on the
/// padding bars, or collapses after clamping.
pub fn display_to_source(
    display_rect: Rect,
    geometry: &DisplayGeometry,
    transform: &TransformState,
) -> Option<CropRect> {
    if geometry.is_degenerate() {
        return None;
    }
    if geometry.rotation != transform.rotation {
        debug!(
            geometry_rotation = %geometry.rotation,
            transform_rotation = %transform.rotation,
            "Display geometry is stale for the current rotation; ignoring crop"
        );
        return None;
    }

    let rect = display_rect.normalized();
    if !(rect.x.is_finite()
        && rect.y.is_finite()
        && rect.width.is_finite()
        && rect.height.is_finite())
    {
        return None;
    }

    // 1. Clamp to the video-occupied region; padding never maps to pixels.
    let clipped = rect.intersect(&geometry.video_region())?;
    if clipped.width < MIN_CROP_DISPLAY_PX || clipped.height < MIN_CROP_DISPLAY_PX {
        return None;
    }

    // 2. Scale into effective (rotated) source space.
    let scale_x = geometry.effective_width as f64 / geometry.video_display_width();
    let scale_y = geometry.effective_height as f64 / geometry.video_display_height();
    let ex = (clipped.x - geometry.pad_x) * scale_x;
    let ey = (clipped.y - geometry.pad_y) * scale_y;
    let ew = clipped.width * scale_x;
    let eh = clipped.height * scale_y;

    // 3. Un-rotate into original orientation.
    let sw = geometry.source_width as f64;
    let sh = geometry.source_height as f64;
    let (mut ox, mut oy, ow, oh) = match transform.rotation {
        Rotation::Deg0 => (ex, ey, ew, eh),
        Rotation::Deg90 => (ey, sh - ex - ew, eh, ew),
        Rotation::Deg180 => (sw - ex - ew, sh - ey - eh, ew, eh),
        Rotation::Deg270 => (sw - ey - eh, ex, eh, ew),
    };

    // 4. Un-flip in original space.
    if transform.flip_horizontal {
        ox = sw - ox - ow;
    }
    if transform.flip_vertical {
        oy = sh - oy - oh;
    }

    // 5. Integer pixels, even dimensions, inside the frame.
    snap_to_frame(ox, oy, ow, oh, geometry.source_width, geometry.source_height)
}

fn snap_to_frame(x: f64, y: f64, w: f64, h: f64, frame_w: u32, frame_h: u32) -> Option<CropRect> {
    if frame_w < 2 || frame_h < 2 {
        return None;
    }
    let frame_w = frame_w as i64;
    let frame_h = frame_h as i64;

    let mut width = (w.round() as i64) & !1;
    let mut height = (h.round() as i64) & !1;
    let x = (x.round() as i64).clamp(0, frame_w - 2);
    let y = (y.round() as i64).clamp(0, frame_h - 2);

    width = width.min(frame_w - x) & !1;
    height = height.min(frame_h - y) & !1;

    if width <= 0 || height <= 0 {
        return None;
    }

    Some(CropRect::new(x as u32, y as u32, width as u32, height as u32))
}

/// Map a source-pixel rectangle to display space (inverse of
/// [`display_to_source`]).
pub fn source_to_display(
    crop: CropRect,
    geometry: &DisplayGeometry,
    transform: &TransformState,
) -> Option<Rect> {
    if geometry.is_degenerate() || geometry.rotation != transform.rotation {
        return None;
    }

    let sw = geometry.source_width as f64;
    let sh = geometry.source_height as f64;
    let mut ox = crop.x as f64;
    let mut oy = crop.y as f64;
    let ow = crop.width as f64;
    let oh = crop.height as f64;

    if transform.flip_horizontal {
        ox = sw - ox - ow;
    }
    if transform.flip_vertical {
        oy = sh - oy - oh;
    }

    let (ex, ey, ew, eh) = match transform.rotation {
        Rotation::Deg0 => (ox, oy, ow, oh),
        Rotation::Deg90 => (sh - oy - oh, ox, oh, ow),
        Rotation::Deg180 => (sw - ox - ow, sh - oy - oh, ow, oh),
        Rotation::Deg270 => (oy, sw - ox - ow, oh, ow),
    };

    let scale_x = geometry.video_display_width() / geometry.effective_width as f64;
    let scale_y = geometry.video_display_height() / geometry.effective_height as f64;

    Some(Rect::new(
        geometry.pad_x + ex * scale_x,
        geometry.pad_y + ey * scale_y,
        ew * scale_x,
        eh * scale_y,
    ))
}

/// Which point stays fixed when a rectangle is reshaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    #[default]
    Center,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Shrink the longer axis of `rect` so that width / height == `ratio`.
///
/// Already on-ratio rectangles come back unchanged, so repeated calls are
/// idempotent. A non-positive or non-finite ratio leaves the rect as is.
pub fn apply_aspect_ratio(rect: Rect, ratio: f64, anchor: Anchor) -> Rect {
    let rect = rect.normalized();
    if !(ratio.is_finite() && ratio > 0.0) || rect.is_empty() {
        return rect;
    }

    let current = rect.width / rect.height;
    if (current - ratio).abs() <= RATIO_EPSILON * ratio {
        return rect;
    }

    let (width, height) = if current > ratio {
        (rect.height * ratio, rect.height)
    } else {
        (rect.width, rect.width / ratio)
    };

    let (x, y) = match anchor {
        Anchor::Center => {
            let (cx, cy) = rect.center();
            (cx - width / 2.0, cy - height / 2.0)
        }
        Anchor::TopLeft => (rect.x, rect.y),
        Anchor::TopRight => (rect.right() - width, rect.y),
        Anchor::BottomLeft => (rect.x, rect.bottom() - height),
        Anchor::BottomRight => (rect.right() - width, rect.bottom() - height),
    };

    Rect::new(x, y, width, height)
}

/// Initial crop box shown when crop mode is switched on.
///
/// Free mode covers half of each axis; a preset takes two thirds of the
/// largest on-ratio box. The box is centered, built in source pixels, and
/// drawn through [`source_to_display`]. It is never smaller than
/// [`MIN_DEFAULT_CROP_PX`] and never leaves the video region.
pub fn default_crop_rect(
    geometry: &DisplayGeometry,
    transform: &TransformState,
    preset: AspectRatioPreset,
) -> Option<Rect> {
    if geometry.is_degenerate() || geometry.source_width < 2 || geometry.source_height < 2 {
        return None;
    }

    let ew = geometry.effective_width as f64;
    let eh = geometry.effective_height as f64;
    let (box_w, box_h) = match preset.ratio() {
        None => (ew / 2.0, eh / 2.0),
        Some(ratio) => {
            let (w, h) = if ew / eh > ratio {
                (eh * ratio, eh)
            } else {
                (ew, ew / ratio)
            };
            (w * 2.0 / 3.0, h * 2.0 / 3.0)
        }
    };

    // Centered boxes are symmetric, so un-rotating only swaps the axes.
    let (ow, oh) = if geometry.rotation.swaps_axes() {
        (box_h, box_w)
    } else {
        (box_w, box_h)
    };
    let ow = ((ow.round() as u32) & !1).clamp(2, geometry.source_width & !1);
    let oh = ((oh.round() as u32) & !1).clamp(2, geometry.source_height & !1);
    let crop = CropRect::new(
        (geometry.source_width - ow) / 2,
        (geometry.source_height - oh) / 2,
        ow,
        oh,
    );

    let rect = source_to_display(crop, geometry, transform)?;
    Some(enforce_minimum(rect, &geometry.video_region()))
}

fn enforce_minimum(rect: Rect, region: &Rect) -> Rect {
    let width = rect.width.max(MIN_DEFAULT_CROP_PX).min(region.width);
    let height = rect.height.max(MIN_DEFAULT_CROP_PX).min(region.height);
    let (cx, cy) = rect.center();
    let x = (cx - width / 2.0).min(region.right() - width).max(region.x);
    let y = (cy - height / 2.0).min(region.bottom() - height).max(region.y);
    Rect::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use namacut_models::TransformAction;

    fn state(rotation: Rotation, flip_h: bool, flip_v: bool) -> TransformState {
        TransformState {
            rotation,
            flip_horizontal: flip_h,
            flip_vertical: flip_v,
            ..Default::default()
        }
    }

    #[test]
    fn test_padding_exact_match() {
        assert_eq!(compute_padding(1920, 1080, Rotation::Deg0, 800, 450), (0.0, 0.0));
    }

    #[test]
    fn test_padding_portrait_in_landscape_viewport() {
        // Portrait video in a wide viewport gets side bars
        let (pad_x, pad_y) = compute_padding(1080, 1920, Rotation::Deg0, 800, 450);
        assert!((pad_x - 273.4375).abs() < 1e-9);
        assert_eq!(pad_y, 0.0);
    }

    #[test]
    fn test_padding_letterbox() {
        let (pad_x, pad_y) = compute_padding(1920, 1080, Rotation::Deg0, 800, 600);
        assert_eq!(pad_x, 0.0);
        assert!((pad_y - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_padding_uses_rotated_dimensions() {
        // 1920x1080 rotated 90° is 1080x1920: exact fit in 450x800
        assert_eq!(compute_padding(1920, 1080, Rotation::Deg90, 450, 800), (0.0, 0.0));
        let (pad_x, pad_y) = compute_padding(1920, 1080, Rotation::Deg270, 800, 450);
        assert!(pad_x > 0.0);
        assert_eq!(pad_y, 0.0);
    }

    #[test]
    fn test_padding_degenerate() {
        assert_eq!(compute_padding(0, 1080, Rotation::Deg0, 800, 450), (0.0, 0.0));
        assert_eq!(compute_padding(1920, 1080, Rotation::Deg0, 800, 0), (0.0, 0.0));
    }

    #[test]
    fn test_display_to_source_identity() {
        let geometry = display_geometry(1920, 1080, Rotation::Deg0, 960, 540);
        let crop = display_to_source(
            Rect::new(100.0, 50.0, 200.0, 100.0),
            &geometry,
            &TransformState::default(),
        );
        assert_eq!(crop, Some(CropRect::new(200, 100, 400, 200)));
    }

    #[test]
    fn test_display_to_source_rotated_90() {
        // Effective frame 1080x1920 fills a 450x800 viewport, scale 2.4
        let geometry = display_geometry(1920, 1080, Rotation::Deg90, 450, 800);
        let transform = state(Rotation::Deg90, false, false);
        let crop = display_to_source(Rect::new(45.0, 80.0, 90.0, 160.0), &geometry, &transform)
            .unwrap();

        // Effective (108, 192, 216, 384) -> original (y, H - x - w, h, w)
        assert_eq!(crop, CropRect::new(192, 756, 384, 216));
        assert!(crop.has_even_dimensions());
        assert!(crop.width > crop.height, "axes swap under 90° rotation");
    }

    #[test]
    fn test_display_to_source_flip_in_source_space() {
        let geometry = display_geometry(1920, 1080, Rotation::Deg0, 960, 540);
        let transform = state(Rotation::Deg0, true, true);
        let crop = display_to_source(Rect::new(0.0, 0.0, 100.0, 50.0), &geometry, &transform)
            .unwrap();
        assert_eq!(crop, CropRect::new(1720, 980, 200, 100));
    }

    #[test]
    fn test_display_to_source_clamps_padding() {
        // Pillarboxed: video occupies x in [273.4375, 526.5625]
        let geometry = display_geometry(1080, 1920, Rotation::Deg0, 800, 450);
        let crop = display_to_source(
            Rect::new(0.0, 0.0, 400.0, 450.0),
            &geometry,
            &TransformState::default(),
        )
        .unwrap();
        assert_eq!(crop.x, 0);
        assert_eq!(crop.y, 0);
        assert!(crop.fits_within(1080, 1920));
        assert_eq!(crop.height, 1920);

        // Entirely on the bar: no crop
        assert_eq!(
            display_to_source(
                Rect::new(0.0, 0.0, 200.0, 450.0),
                &geometry,
                &TransformState::default()
            ),
            None
        );
    }

    #[test]
    fn test_display_to_source_negative_drag() {
        let geometry = display_geometry(1920, 1080, Rotation::Deg0, 960, 540);
        let crop = display_to_source(
            Rect::new(300.0, 150.0, -200.0, -100.0),
            &geometry,
            &TransformState::default(),
        );
        assert_eq!(crop, Some(CropRect::new(200, 100, 400, 200)));
    }

    #[test]
    fn test_display_to_source_rejects_small_and_stale() {
        let geometry = display_geometry(1920, 1080, Rotation::Deg0, 960, 540);
        let small = Rect::new(10.0, 10.0, 9.5, 200.0);
        assert_eq!(display_to_source(small, &geometry, &TransformState::default()), None);

        let rotated = TransformState::default().apply(TransformAction::RotateRight);
        let big = Rect::new(10.0, 10.0, 200.0, 200.0);
        assert_eq!(display_to_source(big, &geometry, &rotated), None);
    }

    #[test]
    fn test_odd_source_dimensions_stay_in_frame() {
        let geometry = display_geometry(1001, 555, Rotation::Deg0, 1001, 555);
        let crop = display_to_source(
            Rect::new(0.0, 0.0, 1001.0, 555.0),
            &geometry,
            &TransformState::default(),
        )
        .unwrap();
        assert_eq!(crop, CropRect::new(0, 0, 1000, 554));
    }

    #[test]
    fn test_apply_aspect_ratio_anchors() {
        let rect = Rect::new(0.0, 0.0, 400.0, 100.0);
        let centered = apply_aspect_ratio(rect, 1.0, Anchor::Center);
        assert_eq!(centered, Rect::new(150.0, 0.0, 100.0, 100.0));

        let right = apply_aspect_ratio(rect, 1.0, Anchor::BottomRight);
        assert_eq!(right, Rect::new(300.0, 0.0, 100.0, 100.0));

        let tall = Rect::new(10.0, 10.0, 160.0, 400.0);
        let wide = apply_aspect_ratio(tall, 16.0 / 9.0, Anchor::TopLeft);
        assert_eq!(wide.x, 10.0);
        assert_eq!(wide.width, 160.0);
        assert!((wide.height - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_apply_aspect_ratio_idempotent() {
        let rect = Rect::new(5.0, 5.0, 160.0, 90.0);
        let once = apply_aspect_ratio(rect, 16.0 / 9.0, Anchor::Center);
        assert_eq!(once, rect);
        let reshaped = apply_aspect_ratio(Rect::new(0.0, 0.0, 300.0, 300.0), 4.0 / 3.0, Anchor::Center);
        assert_eq!(apply_aspect_ratio(reshaped, 4.0 / 3.0, Anchor::Center), reshaped);
    }

    #[test]
    fn test_default_crop_rect_free_and_preset() {
        let geometry = display_geometry(1920, 1080, Rotation::Deg0, 960, 540);
        let transform = TransformState::default();

        let free = default_crop_rect(&geometry, &transform, AspectRatioPreset::Free).unwrap();
        assert!((free.width - 480.0).abs() < 1e-9);
        assert!((free.height - 270.0).abs() < 1e-9);
        assert!((free.center().0 - 480.0).abs() < 1e-9);

        let square = default_crop_rect(&geometry, &transform, AspectRatioPreset::Square).unwrap();
        assert!((square.width - square.height).abs() < 1.0);
        assert!((square.height - 360.0).abs() < 1.0);
        assert!(geometry.video_region().contains(&square));
    }

    #[test]
    fn test_default_crop_rect_minimum_size() {
        let geometry = display_geometry(1920, 1080, Rotation::Deg0, 64, 36);
        let rect = default_crop_rect(&geometry, &TransformState::default(), AspectRatioPreset::Free)
            .unwrap();
        assert!((rect.width - 50.0).abs() < 1e-9);
        assert!((rect.height - 36.0).abs() < 1e-9, "clamped to the video region");
        assert!(geometry.video_region().contains(&rect));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn rotation_strategy() -> impl Strategy<Value = Rotation> {
        prop_oneof![
            Just(Rotation::Deg0),
            Just(Rotation::Deg90),
            Just(Rotation::Deg180),
            Just(Rotation::Deg270),
        ]
    }

    proptest! {
        /// Property: exactly one axis (or none) carries padding, never negative.
        #[test]
        fn prop_padding_single_axis(
            sw in 1u32..=8000,
            sh in 1u32..=8000,
            vw in 1u32..=4000,
            vh in 1u32..=4000,
            rotation in rotation_strategy(),
        ) {
            let (pad_x, pad_y) = compute_padding(sw, sh, rotation, vw, vh);
            prop_assert!(pad_x >= 0.0 && pad_y >= 0.0);
            prop_assert!(pad_x == 0.0 || pad_y == 0.0);
            prop_assert!(pad_x * 2.0 < vw as f64 + 1e-6);
            prop_assert!(pad_y * 2.0 < vh as f64 + 1e-6);
        }

        /// Property: display_to_source(source_to_display(rect)) == rect.
        #[test]
        fn prop_round_trip(
            sw in 64u32..=3840,
            sh in 64u32..=2160,
            vw in 320u32..=1600,
            vh in 240u32..=1200,
            rotation in rotation_strategy(),
            flip_h in any::<bool>(),
            flip_v in any::<bool>(),
            fx in 0.0f64..0.5,
            fy in 0.0f64..0.5,
            fw in 0.2f64..0.5,
            fh in 0.2f64..0.5,
        ) {
            let w = ((sw as f64 * fw) as u32) & !1;
            let h = ((sh as f64 * fh) as u32) & !1;
            let x = (sw as f64 * fx) as u32;
            let y = (sh as f64 * fy) as u32;
            let crop = CropRect::new(x, y, w, h);
            prop_assume!(crop.fits_within(sw, sh));

            let geometry = display_geometry(sw, sh, rotation, vw, vh);
            let transform = TransformState {
                rotation,
                flip_horizontal: flip_h,
                flip_vertical: flip_v,
                ..Default::default()
            };

            let display = source_to_display(crop, &geometry, &transform).unwrap();
            prop_assume!(display.width >= MIN_CROP_DISPLAY_PX + 1.0 && display.height >= MIN_CROP_DISPLAY_PX + 1.0);

            let back = display_to_source(display, &geometry, &transform);
            prop_assert_eq!(back, Some(crop));
        }

        /// Property: tiny boxes are rejected for every rotation and flip.
        #[test]
        fn prop_small_crops_rejected(
            rotation in rotation_strategy(),
            flip_h in any::<bool>(),
            small in 0.0f64..9.99,
            large in 10.0f64..200.0,
            horizontal in any::<bool>(),
        ) {
            let geometry = display_geometry(1920, 1080, rotation, 800, 800);
            let transform = TransformState {
                rotation,
                flip_horizontal: flip_h,
                ..Default::default()
            };
            let origin = geometry.video_region().center();
            let (w, h) = if horizontal { (small, large) } else { (large, small) };
            let rect = Rect::new(origin.0 - w / 2.0, origin.1 - h / 2.0, w, h);
            prop_assert_eq!(display_to_source(rect, &geometry, &transform), None);
        }

        /// Property: any accepted crop has even dimensions and fits the frame.
        #[test]
        fn prop_output_even_and_in_frame(
            rotation in rotation_strategy(),
            flip_h in any::<bool>(),
            flip_v in any::<bool>(),
            x in -200.0f64..1000.0,
            y in -200.0f64..1000.0,
            w in -800.0f64..800.0,
            h in -800.0f64..800.0,
        ) {
            let geometry = display_geometry(1279, 719, rotation, 800, 600);
            let transform = TransformState {
                rotation,
                flip_horizontal: flip_h,
                flip_vertical: flip_v,
                ..Default::default()
            };
            if let Some(crop) = display_to_source(Rect::new(x, y, w, h), &geometry, &transform) {
                prop_assert!(crop.has_even_dimensions());
                prop_assert!(crop.width > 0 && crop.height > 0);
                prop_assert!(crop.fits_within(1279, 719));
            }
        }
    }
}
