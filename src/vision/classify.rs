use std::fmt;

use crate::config::ClassifierConfig;
use crate::vision::eye_region::EyeRoi;

/// Discretized gaze direction for one eye. The integer values are part of
/// the gaze trace contract and must stay {-1, 0, 1}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i8)]
pub enum EyeballPosition {
    Left = -1,
    #[default]
    Center = 0,
    Right = 1,
}

impl EyeballPosition {
    pub fn as_i8(self) -> i8 {
        self as i8
    }

    pub fn from_i8(value: i8) -> Option<Self> {
        match value {
            -1 => Some(Self::Left),
            0 => Some(Self::Center),
            1 => Some(Self::Right),
            _ => None,
        }
    }
}

impl fmt::Display for EyeballPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i8())
    }
}

/// Classifies one eye from its bounding box and pupil centroid. The pupil's
/// horizontal placement inside the box is expressed as
/// `(min.x - cx) / (cx - max.x)`; ratios strictly above the left threshold
/// read as Left, strictly below the right threshold as Right. A missing
/// pupil, an empty box, or a centroid on the right edge (which would divide
/// by zero) all degrade to Center.
pub fn classify(
    roi: &EyeRoi,
    centroid: Option<(i32, i32)>,
    config: &ClassifierConfig,
) -> EyeballPosition {
    let (cx, _cy) = match centroid {
        Some(c) => c,
        None => return EyeballPosition::Center,
    };
    if roi.is_empty() || cx == roi.max.0 {
        return EyeballPosition::Center;
    }
    let ratio = (roi.min.0 - cx) as f64 / (cx - roi.max.0) as f64;
    position_for_ratio(ratio, config)
}

fn position_for_ratio(ratio: f64, config: &ClassifierConfig) -> EyeballPosition {
    if ratio > config.left_ratio {
        EyeballPosition::Left
    } else if ratio < config.right_ratio {
        EyeballPosition::Right
    } else {
        EyeballPosition::Center
    }
}
