//! Interactive transform state and the actions that replace it.
//!
//! `TransformState` is an immutable value: every user action produces a new
//! state through [`TransformState::apply`], and `version` increases by one per
//! applied action so observers can detect changes without diffing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::geometry::{Rect, Rotation};
use crate::settings::SettingsParseError;

/// Aspect ratio constraint for the crop box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AspectRatioPreset {
    #[default]
    Free,
    Square,
    Widescreen,
    Vertical,
    Classic,
}

impl AspectRatioPreset {
    pub const ALL: &'static [AspectRatioPreset] = &[
        AspectRatioPreset::Free,
        AspectRatioPreset::Square,
        AspectRatioPreset::Widescreen,
        AspectRatioPreset::Vertical,
        AspectRatioPreset::Classic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatioPreset::Free => "free",
            AspectRatioPreset::Square => "1:1",
            AspectRatioPreset::Widescreen => "16:9",
            AspectRatioPreset::Vertical => "9:16",
            AspectRatioPreset::Classic => "4:3",
        }
    }

    /// Width / height, `None` for free-form.
    pub fn ratio(&self) -> Option<f64> {
        match self {
            AspectRatioPreset::Free => None,
            AspectRatioPreset::Square => Some(1.0),
            AspectRatioPreset::Widescreen => Some(16.0 / 9.0),
            AspectRatioPreset::Vertical => Some(9.0 / 16.0),
            AspectRatioPreset::Classic => Some(4.0 / 3.0),
        }
    }
}

impl fmt::Display for AspectRatioPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AspectRatioPreset {
    type Err = SettingsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" | "none" => Ok(AspectRatioPreset::Free),
            "1:1" | "square" => Ok(AspectRatioPreset::Square),
            "16:9" | "widescreen" => Ok(AspectRatioPreset::Widescreen),
            "9:16" | "vertical" => Ok(AspectRatioPreset::Vertical),
            "4:3" | "classic" => Ok(AspectRatioPreset::Classic),
            _ => Err(SettingsParseError {
                kind: "aspect ratio",
                value: s.to_string(),
            }),
        }
    }
}

/// Closed set of editor actions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "value", rename_all = "snake_case")]
pub enum TransformAction {
    RotateLeft,
    RotateRight,
    FlipHorizontal,
    FlipVertical,
    /// Back to defaults (also used when a new file is loaded).
    Reset,
    /// Replace the crop box and enable crop mode. The rect is normalized.
    SetCrop(Rect),
    DisableCrop,
    SetAspectRatio(AspectRatioPreset),
}

/// Rotation, flips, and crop selection for the loaded file.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformState {
    pub rotation: Rotation,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    /// Crop box in display pixels; always normalized.
    pub crop_rect: Option<Rect>,
    pub crop_enabled: bool,
    pub aspect_ratio: AspectRatioPreset,
    pub version: u64,
}

impl TransformState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce the state that results from `action`.
    ///
    /// Rotating or flipping discards the crop box, since its display
    /// coordinates no longer describe the same source pixels.
    pub fn apply(&self, action: TransformAction) -> Self {
        let mut next = *self;
        match action {
            TransformAction::RotateLeft => {
                next.rotation = self.rotation.counter_clockwise();
                next.clear_crop();
            }
            TransformAction::RotateRight => {
                next.rotation = self.rotation.clockwise();
                next.clear_crop();
            }
            TransformAction::FlipHorizontal => {
                next.flip_horizontal = !self.flip_horizontal;
                next.clear_crop();
            }
            TransformAction::FlipVertical => {
                next.flip_vertical = !self.flip_vertical;
                next.clear_crop();
            }
            TransformAction::Reset => {
                next = TransformState::default();
            }
            TransformAction::SetCrop(rect) => {
                next.crop_rect = Some(rect.normalized());
                next.crop_enabled = true;
            }
            TransformAction::DisableCrop => next.clear_crop(),
            TransformAction::SetAspectRatio(preset) => next.aspect_ratio = preset,
        }
        next.version = self.version.wrapping_add(1);
        next
    }

    fn clear_crop(&mut self) {
        self.crop_rect = None;
        self.crop_enabled = false;
    }

    /// Crop box to hand to consumers, if crop mode is on.
    pub fn active_crop(&self) -> Option<Rect> {
        if self.crop_enabled {
            self.crop_rect.map(|rect| rect.normalized())
        } else {
            None
        }
    }

    /// Whether rotation or flips change the picture.
    pub fn has_orientation_change(&self) -> bool {
        self.rotation != Rotation::Deg0 || self.flip_horizontal || self.flip_vertical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_wraps_and_versions() {
        let state = TransformState::new()
            .apply(TransformAction::RotateLeft)
            .apply(TransformAction::RotateLeft);
        assert_eq!(state.rotation, Rotation::Deg180);
        assert_eq!(state.version, 2);

        let state = state
            .apply(TransformAction::RotateRight)
            .apply(TransformAction::RotateRight)
            .apply(TransformAction::RotateRight);
        assert_eq!(state.rotation, Rotation::Deg90);
        assert_eq!(state.version, 5);
    }

    #[test]
    fn test_set_crop_normalizes() {
        let state = TransformState::new().apply(TransformAction::SetCrop(Rect::new(
            200.0, 150.0, -100.0, -50.0,
        )));
        assert!(state.crop_enabled);
        assert_eq!(state.active_crop(), Some(Rect::new(100.0, 100.0, 100.0, 50.0)));
    }

    #[test]
    fn test_orientation_change_clears_crop() {
        let cropped = TransformState::new()
            .apply(TransformAction::SetCrop(Rect::new(10.0, 10.0, 100.0, 100.0)));
        for action in [
            TransformAction::RotateLeft,
            TransformAction::RotateRight,
            TransformAction::FlipHorizontal,
            TransformAction::FlipVertical,
        ] {
            let next = cropped.apply(action);
            assert!(!next.crop_enabled, "{:?} should disable crop", action);
            assert_eq!(next.crop_rect, None);
            assert_eq!(next.version, cropped.version + 1);
        }
    }

    #[test]
    fn test_reset_keeps_version_monotonic() {
        let state = TransformState::new()
            .apply(TransformAction::FlipHorizontal)
            .apply(TransformAction::SetAspectRatio(AspectRatioPreset::Square))
            .apply(TransformAction::Reset);
        assert_eq!(state.rotation, Rotation::Deg0);
        assert!(!state.flip_horizontal);
        assert_eq!(state.aspect_ratio, AspectRatioPreset::Free);
        assert_eq!(state.version, 3);
    }

    #[test]
    fn test_original_state_unchanged() {
        let state = TransformState::new();
        let _ = state.apply(TransformAction::FlipVertical);
        assert!(!state.flip_vertical);
        assert_eq!(state.version, 0);
    }

    #[test]
    fn test_aspect_preset_parse() {
        assert_eq!("16:9".parse::<AspectRatioPreset>().unwrap(), AspectRatioPreset::Widescreen);
        assert_eq!(AspectRatioPreset::Vertical.ratio(), Some(9.0 / 16.0));
        assert!("21:9".parse::<AspectRatioPreset>().is_err());
    }
}
