//! FFmpeg video filter chain for crop, rotation, flips, and rescale.
//!
//! Stage order is fixed: `crop` (original pixel space) first, then
//! `transpose`, then `hflip`/`vflip`, and `scale` last on the transformed
//! frame.

use std::fmt;

use namacut_models::{
    Container, CropRect, DisplayGeometry, ResolutionPreset, Rotation, TransformState, Warning,
};

use crate::geometry::display_to_source;

/// Width/height ratio difference below which a rescale keeps the preset box.
const SCALE_RATIO_TOLERANCE: f64 = 0.01;

/// Direction argument of the `transpose` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transpose {
    /// `transpose=1`: rotate 90° clockwise
    Clockwise,
    /// `transpose=2`: rotate 90° counter-clockwise
    CounterClockwise,
}

/// A single filter stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOp {
    Crop(CropRect),
    Transpose(Transpose),
    HFlip,
    VFlip,
    Scale { width: u32, height: u32 },
}

impl FilterOp {
    /// Short name used in warnings.
    pub fn name(&self) -> &'static str {
        match self {
            FilterOp::Crop(_) => "crop",
            FilterOp::Transpose(_) => "transpose",
            FilterOp::HFlip => "hflip",
            FilterOp::VFlip => "vflip",
            FilterOp::Scale { .. } => "scale",
        }
    }

    fn is_flip(&self) -> bool {
        matches!(self, FilterOp::HFlip | FilterOp::VFlip)
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterOp::Crop(rect) => {
                write!(f, "crop={}:{}:{}:{}", rect.width, rect.height, rect.x, rect.y)
            }
            FilterOp::Transpose(Transpose::Clockwise) => write!(f, "transpose=1"),
            FilterOp::Transpose(Transpose::CounterClockwise) => write!(f, "transpose=2"),
            FilterOp::HFlip => write!(f, "hflip"),
            FilterOp::VFlip => write!(f, "vflip"),
            FilterOp::Scale { width, height } => write!(f, "scale={}:{}", width, height),
        }
    }
}

/// Ordered, non-empty list of filter stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterChain {
    ops: Vec<FilterOp>,
}

impl FilterChain {
    pub fn ops(&self) -> &[FilterOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn crop(&self) -> Option<CropRect> {
        self.ops.iter().find_map(|op| match op {
            FilterOp::Crop(rect) => Some(*rect),
            _ => None,
        })
    }

    fn has(&self, pred: impl Fn(&FilterOp) -> bool) -> bool {
        self.ops.iter().any(pred)
    }

    /// Crop, rotation, and a flip all at once.
    pub fn is_complex(&self) -> bool {
        self.has(|op| matches!(op, FilterOp::Crop(_)))
            && self.has(|op| matches!(op, FilterOp::Transpose(_)))
            && self.has(FilterOp::is_flip)
    }

    /// The `-vf` argument.
    pub fn to_filter_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, op) in self.ops.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", op)?;
        }
        Ok(())
    }
}

/// Source-pixel crop for the current transform, if crop mode is on and the
/// selection maps to something usable.
pub fn crop_for_export(transform: &TransformState, geometry: &DisplayGeometry) -> Option<CropRect> {
    transform
        .active_crop()
        .and_then(|rect| display_to_source(rect, geometry, transform))
}

/// Build the filter chain for `transform`.
///
/// Returns `None` when nothing changes the picture, which makes the export
/// eligible for stream copy.
pub fn build_filter_chain(
    transform: &TransformState,
    geometry: &DisplayGeometry,
    resolution: ResolutionPreset,
) -> Option<FilterChain> {
    let mut ops = Vec::new();

    let crop = crop_for_export(transform, geometry);
    if let Some(rect) = crop {
        ops.push(FilterOp::Crop(rect));
    }

    match transform.rotation {
        Rotation::Deg0 => {}
        Rotation::Deg90 => ops.push(FilterOp::Transpose(Transpose::Clockwise)),
        Rotation::Deg180 => {
            ops.push(FilterOp::Transpose(Transpose::Clockwise));
            ops.push(FilterOp::Transpose(Transpose::Clockwise));
        }
        Rotation::Deg270 => ops.push(FilterOp::Transpose(Transpose::CounterClockwise)),
    }

    if transform.flip_horizontal {
        ops.push(FilterOp::HFlip);
    }
    if transform.flip_vertical {
        ops.push(FilterOp::VFlip);
    }

    // Frame size after crop and rotation
    let (frame_w, frame_h) = match crop {
        Some(rect) => (rect.width, rect.height),
        None => (geometry.source_width, geometry.source_height),
    };
    let (frame_w, frame_h) = transform.rotation.effective_dimensions(frame_w, frame_h);

    if let Some((width, height)) = scale_dimensions(frame_w, frame_h, resolution) {
        if (width, height) != (frame_w, frame_h) {
            ops.push(FilterOp::Scale { width, height });
        }
    }

    if ops.is_empty() {
        None
    } else {
        Some(FilterChain { ops })
    }
}

/// Fit a resolution preset to a `frame_w` x `frame_h` frame.
///
/// Matching aspect ratios take the preset box as is; otherwise the frame is
/// fit inside the box. Both dimensions are even. `None` for `Original`, a
/// degenerate frame, or a fit smaller than 2x2.
pub fn scale_dimensions(
    frame_w: u32,
    frame_h: u32,
    resolution: ResolutionPreset,
) -> Option<(u32, u32)> {
    let (target_w, target_h) = resolution.dimensions()?;
    if frame_w == 0 || frame_h == 0 {
        return None;
    }
    let target_w = target_w & !1;
    let target_h = target_h & !1;

    let frame_ratio = frame_w as f64 / frame_h as f64;
    let target_ratio = target_w as f64 / target_h as f64;

    let (width, height) = if (frame_ratio - target_ratio).abs() < SCALE_RATIO_TOLERANCE {
        (target_w, target_h)
    } else if frame_ratio > target_ratio {
        let height = target_w as u64 * frame_h as u64 / frame_w as u64;
        (target_w, height as u32)
    } else {
        let width = target_h as u64 * frame_w as u64 / frame_h as u64;
        (width as u32, target_h)
    };

    let (width, height) = (width & !1, height & !1);
    if width < 2 || height < 2 {
        return None;
    }
    Some((width, height))
}

/// Drop flips from a complex chain for containers with filter limitations.
///
/// Crop and rotation are kept; the returned warning lists what was dropped.
pub fn simplify_for_container(
    chain: FilterChain,
    container: Container,
) -> (FilterChain, Option<Warning>) {
    if !container.has_filter_limitations() || !chain.is_complex() {
        return (chain, None);
    }

    let (dropped, kept): (Vec<FilterOp>, Vec<FilterOp>) =
        chain.ops.into_iter().partition(FilterOp::is_flip);

    tracing::warn!(
        container = %container,
        dropped = dropped.len(),
        "Dropping flips from complex filter chain"
    );

    let warning = Warning::FiltersDropped {
        container,
        dropped: dropped.iter().map(|op| op.name().to_string()).collect(),
    };
    (FilterChain { ops: kept }, Some(warning))
}
