// Turns a color frame plus face mesh into the masked, contrast-normalized
// grayscale image the pupil localizer works on. Non-eye pixels are forced to
// a white sentinel rather than black so they stay out of the histogram work.
use image::{GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::drawing::draw_polygon_mut;
use imageproc::geometry::convex_hull;
use imageproc::morphology::dilate;
use imageproc::point::Point;

use crate::vision::landmarks::{Landmarks, LEFT_EYE, RIGHT_EYE};

/// Marker value for every pixel outside the eye regions.
pub const SENTINEL: u8 = 255;

/// Margin added around the eye polygons, as the radius of a square
/// structuring element (9x9).
const MASK_MARGIN: u8 = 4;

const CLAHE_CLIP_LIMIT: f32 = 2.0;
const CLAHE_TILES: usize = 8;

/// Axis-aligned bounding box of one eye's landmark points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EyeRoi {
    pub min: (i32, i32),
    pub max: (i32, i32),
}

impl EyeRoi {
    pub fn from_points(points: &[(i32, i32)]) -> Self {
        if points.is_empty() {
            return Self {
                min: (0, 0),
                max: (0, 0),
            };
        }
        let mut min = points[0];
        let mut max = points[0];
        for &(x, y) in points {
            min.0 = min.0.min(x);
            min.1 = min.1.min(y);
            max.0 = max.0.max(x);
            max.1 = max.1.max(y);
        }
        Self { min, max }
    }

    /// A zero-area box. Downstream treats this as "no pupil can exist here".
    pub fn is_empty(&self) -> bool {
        self.max.0 <= self.min.0 || self.max.1 <= self.min.1
    }
}

/// The extractor's output for one frame: equalized eye pixels on a sentinel
/// background, plus each eye's bounding box.
#[derive(Debug, Clone)]
pub struct MaskedEyes {
    pub gray: GrayImage,
    pub left: EyeRoi,
    pub right: EyeRoi,
}

pub fn extract_eye_regions(frame: &RgbImage, landmarks: &Landmarks) -> MaskedEyes {
    let (width, height) = frame.dimensions();
    let left_points = landmarks.eye_points(&LEFT_EYE);
    let right_points = landmarks.eye_points(&RIGHT_EYE);

    let mut mask = GrayImage::new(width, height);
    fill_eye(&mut mask, &left_points);
    fill_eye(&mut mask, &right_points);
    let mask = dilate(&mask, Norm::LInf, MASK_MARGIN);

    let mut gray = GrayImage::from_pixel(width, height, Luma([SENTINEL]));
    for (x, y, pixel) in frame.enumerate_pixels() {
        if mask.get_pixel(x, y)[0] > 0 {
            let [r, g, b] = pixel.0;
            // Pure black pixels are indistinguishable from the masked-out
            // background and stay sentinel.
            if r != 0 || g != 0 || b != 0 {
                gray.put_pixel(x, y, Luma([luma(r, g, b)]));
            }
        }
    }

    equalize_masked(&mut gray);

    MaskedEyes {
        gray,
        left: EyeRoi::from_points(&left_points),
        right: EyeRoi::from_points(&right_points),
    }
}

/// Fills the convex hull of one eye's landmarks onto the mask. Fewer than
/// three distinct hull points means a degenerate eye; the mask is left
/// untouched and the region stays empty.
fn fill_eye(mask: &mut GrayImage, points: &[(i32, i32)]) {
    let poly: Vec<Point<i32>> = points.iter().map(|&(x, y)| Point::new(x, y)).collect();
    let hull = convex_hull(&poly[..]);
    if hull.len() >= 3 {
        draw_polygon_mut(mask, &hull, Luma([255u8]));
    }
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round() as u8
}

/// Equalizes the non-sentinel pixels in place: a global pass over exactly
/// the eye pixels, then a clip-limited adaptive pass, written back in scan
/// order. Sentinel pixels never participate.
fn equalize_masked(gray: &mut GrayImage) {
    let values: Vec<u8> = gray
        .pixels()
        .filter(|p| p[0] != SENTINEL)
        .map(|p| p[0])
        .collect();
    if values.is_empty() {
        return;
    }

    let equalized = equalize_sequence(&values);
    let adapted = adaptive_equalize(&equalized, CLAHE_CLIP_LIMIT, CLAHE_TILES);

    let mut next = adapted.iter();
    for pixel in gray.pixels_mut() {
        if pixel[0] != SENTINEL {
            if let Some(&v) = next.next() {
                pixel[0] = v;
            }
        }
    }
}

/// Classic histogram equalization over a pixel sample set: the lowest
/// occupied bin maps to zero and the cumulative distribution stretches the
/// rest across the full range.
fn equalize_sequence(values: &[u8]) -> Vec<u8> {
    let mut hist = [0u32; 256];
    for &v in values {
        hist[v as usize] += 1;
    }
    let total = values.len() as u32;
    let first = match hist.iter().position(|&c| c > 0) {
        Some(i) => i,
        None => return Vec::new(),
    };
    if hist[first] == total {
        return values.to_vec();
    }

    let scale = 255.0 / (total - hist[first]) as f32;
    let mut lut = [0u8; 256];
    let mut sum = 0u32;
    for i in (first + 1)..256 {
        sum += hist[i];
        lut[i] = (sum as f32 * scale).round().min(255.0) as u8;
    }
    values.iter().map(|&v| lut[v as usize]).collect()
}

/// Contrast-limited adaptive equalization over the extracted pixel
/// sequence: per-tile clipped histograms with interpolation between
/// neighboring tile mappings (clip 2.0, 8 tiles).
fn adaptive_equalize(values: &[u8], clip_limit: f32, tiles: usize) -> Vec<u8> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let tile_len = n.div_ceil(tiles).max(1);
    let tile_count = n.div_ceil(tile_len);

    let mut luts = Vec::with_capacity(tile_count);
    for t in 0..tile_count {
        let lo = t * tile_len;
        let hi = ((t + 1) * tile_len).min(n);
        luts.push(clipped_lut(&values[lo..hi], clip_limit));
    }

    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            // Fractional position in tile-center coordinates.
            let pos = (i as f32 + 0.5) / tile_len as f32 - 0.5;
            let t0 = (pos.floor().max(0.0) as usize).min(tile_count - 1);
            let t1 = (t0 + 1).min(tile_count - 1);
            let w = (pos - t0 as f32).clamp(0.0, 1.0);
            let a = luts[t0][v as usize] as f32;
            let b = luts[t1][v as usize] as f32;
            (a + (b - a) * w).round() as u8
        })
        .collect()
}

fn clipped_lut(tile: &[u8], clip_limit: f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    if tile.is_empty() {
        for (i, entry) in lut.iter_mut().enumerate() {
            *entry = i as u8;
        }
        return lut;
    }

    let mut hist = [0.0f32; 256];
    for &v in tile {
        hist[v as usize] += 1.0;
    }

    let area = tile.len() as f32;
    let limit = (clip_limit * area / 256.0).max(1.0);
    let mut excess = 0.0;
    for h in hist.iter_mut() {
        if *h > limit {
            excess += *h - limit;
            *h = limit;
        }
    }
    let bonus = excess / 256.0;

    let scale = 255.0 / area;
    let mut cdf = 0.0;
    for i in 0..256 {
        cdf += hist[i] + bonus;
        lut[i] = (cdf * scale).round().min(255.0) as u8;
    }
    lut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::landmarks::{FACE_MESH_POINTS, BRIDGE};

    fn ring(center: (i32, i32), radius: f64) -> Vec<(i32, i32)> {
        (0..16)
            .map(|i| {
                let angle = i as f64 * std::f64::consts::TAU / 16.0;
                (
                    center.0 + (radius * angle.cos()).round() as i32,
                    center.1 + (radius * angle.sin()).round() as i32,
                )
            })
            .collect()
    }

    fn mesh_with_eyes(left: &[(i32, i32)], right: &[(i32, i32)], bridge_x: i32) -> Landmarks {
        let mut points = vec![(0, 0); FACE_MESH_POINTS];
        points[BRIDGE] = (bridge_x, 40);
        for (slot, &p) in LEFT_EYE.iter().zip(left) {
            points[*slot] = p;
        }
        for (slot, &p) in RIGHT_EYE.iter().zip(right) {
            points[*slot] = p;
        }
        Landmarks::from_points(points).unwrap()
    }

    fn gradient_frame(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(40 + x % 150) as u8, (60 + y % 120) as u8, 90])
        })
    }

    #[test]
    fn roi_is_the_bounding_box_of_the_landmark_points() {
        let roi = EyeRoi::from_points(&ring((50, 50), 10.0));
        assert_eq!(roi.min, (40, 40));
        assert_eq!(roi.max, (60, 60));
        assert!(!roi.is_empty());
    }

    #[test]
    fn identical_points_give_an_empty_roi() {
        let roi = EyeRoi::from_points(&[(5, 5); 16]);
        assert!(roi.is_empty());
    }

    #[test]
    fn non_eye_pixels_are_sentinel_and_eye_pixels_are_not() {
        let frame = gradient_frame(200, 100);
        let landmarks = mesh_with_eyes(&ring((50, 50), 10.0), &ring((150, 50), 10.0), 100);
        let masked = extract_eye_regions(&frame, &landmarks);

        let mut eye_pixels = 0u32;
        for (x, y, pixel) in masked.gray.enumerate_pixels() {
            if pixel[0] != SENTINEL {
                eye_pixels += 1;
                let (x, y) = (x as i32, y as i32);
                let margin = MASK_MARGIN as i32;
                let in_left = x >= masked.left.min.0 - margin
                    && x <= masked.left.max.0 + margin
                    && y >= masked.left.min.1 - margin
                    && y <= masked.left.max.1 + margin;
                let in_right = x >= masked.right.min.0 - margin
                    && x <= masked.right.max.0 + margin
                    && y >= masked.right.min.1 - margin
                    && y <= masked.right.max.1 + margin;
                assert!(in_left || in_right, "eye data leaked to ({}, {})", x, y);
            }
        }
        assert!(eye_pixels > 0, "no eye pixels survived masking");
        assert_eq!(masked.gray.get_pixel(5, 5)[0], SENTINEL);
    }

    #[test]
    fn degenerate_landmarks_produce_an_all_sentinel_frame() {
        let frame = gradient_frame(120, 80);
        let landmarks = mesh_with_eyes(&[(30, 40); 16], &[(90, 40); 16], 60);
        let masked = extract_eye_regions(&frame, &landmarks);
        assert!(masked.left.is_empty());
        assert!(masked.right.is_empty());
        assert!(masked.gray.pixels().all(|p| p[0] == SENTINEL));
    }

    #[test]
    fn equalize_stretches_a_small_sample_across_the_range() {
        assert_eq!(equalize_sequence(&[10, 20, 30, 40]), vec![0, 85, 170, 255]);
    }

    #[test]
    fn equalize_leaves_a_uniform_sample_unchanged() {
        assert_eq!(equalize_sequence(&[7; 5]), vec![7; 5]);
    }

    #[test]
    fn adaptive_pass_preserves_length_and_uniformity() {
        let flat = adaptive_equalize(&[100; 64], 2.0, 8);
        assert_eq!(flat.len(), 64);
        assert!(flat.windows(2).all(|w| w[0] == w[1]));

        let mixed: Vec<u8> = (0..200).map(|i| (i % 256) as u8).collect();
        assert_eq!(adaptive_equalize(&mixed, 2.0, 8).len(), mixed.len());
    }
}
