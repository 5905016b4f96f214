// Face mesh data model and the external landmark-detection seam. The
// detector itself (whichever library provides the 468-point face mesh) is
// plugged in behind `FaceLandmarker`; everything downstream only sees the
// scaled pixel-space points.
use anyhow::Result;
use image::RgbImage;

pub const FACE_MESH_POINTS: usize = 468;

/// Mesh indices tracing the left eye contour.
pub const LEFT_EYE: [usize; 16] = [
    7, 33, 133, 144, 145, 153, 154, 155, 157, 158, 159, 160, 161, 163, 173, 246,
];

/// Mesh indices tracing the right eye contour.
pub const RIGHT_EYE: [usize; 16] = [
    249, 263, 362, 373, 374, 380, 381, 382, 384, 385, 386, 387, 388, 390, 398, 466,
];

/// Nose bridge point whose x-coordinate splits the frame into eye halves.
pub const BRIDGE: usize = 6;

/// One frame's detected face mesh in pixel coordinates. Always holds exactly
/// [`FACE_MESH_POINTS`] points; index positions carry fixed anatomical
/// meaning and are read-only after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Landmarks {
    points: Vec<(i32, i32)>,
}

impl Landmarks {
    pub fn from_points(points: Vec<(i32, i32)>) -> Option<Self> {
        if points.len() == FACE_MESH_POINTS {
            Some(Self { points })
        } else {
            None
        }
    }

    /// Scales detector output in normalized [0,1] coordinates to pixel
    /// space, truncating toward zero.
    pub fn from_normalized(normalized: &[(f32, f32)], width: u32, height: u32) -> Option<Self> {
        if normalized.len() != FACE_MESH_POINTS {
            return None;
        }
        let points = normalized
            .iter()
            .map(|&(x, y)| ((x * width as f32) as i32, (y * height as f32) as i32))
            .collect();
        Some(Self { points })
    }

    pub fn point(&self, index: usize) -> (i32, i32) {
        self.points[index]
    }

    pub fn bridge_x(&self) -> i32 {
        self.points[BRIDGE].0
    }

    pub fn eye_points(&self, indices: &[usize]) -> Vec<(i32, i32)> {
        indices.iter().map(|&i| self.points[i]).collect()
    }
}

/// External landmark detection capability. `Ok(None)` means no face in the
/// frame, which is a normal outcome, not an error.
pub trait FaceLandmarker: Send {
    fn detect(&mut self, frame: &RgbImage) -> Result<Option<Landmarks>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_point_counts() {
        assert!(Landmarks::from_points(vec![(0, 0); 10]).is_none());
        assert!(Landmarks::from_normalized(&[(0.5, 0.5); 467], 100, 100).is_none());
        assert!(Landmarks::from_points(vec![(0, 0); FACE_MESH_POINTS]).is_some());
    }

    #[test]
    fn normalized_points_scale_and_truncate() {
        let mut normalized = vec![(0.0, 0.0); FACE_MESH_POINTS];
        normalized[BRIDGE] = (0.5, 0.25);
        normalized[7] = (0.999, 0.999);
        let landmarks = Landmarks::from_normalized(&normalized, 101, 101).unwrap();
        assert_eq!(landmarks.point(BRIDGE), (50, 25));
        assert_eq!(landmarks.point(7), (100, 100));
        assert_eq!(landmarks.bridge_x(), 50);
    }

    #[test]
    fn eye_index_sets_are_disjoint_and_in_range() {
        for i in LEFT_EYE {
            assert!(i < FACE_MESH_POINTS);
            assert!(!RIGHT_EYE.contains(&i));
        }
        for i in RIGHT_EYE {
            assert!(i < FACE_MESH_POINTS);
        }
    }
}
