// Pupil localization over the masked grayscale frame: binarize so the dark
// pupil becomes foreground, clean up the equalization noise, then take the
// centroid of the largest contour in each eye half.
use image::{imageops, GrayImage};
use imageproc::contours::find_contours;
use imageproc::distance_transform::Norm;
use imageproc::filter::median_filter;
use imageproc::morphology::{dilate, erode};
use imageproc::point::Point;

const PUPIL_THRESHOLD: u8 = 127;

/// Locates the pupil centroid in each half of the masked frame, split at the
/// bridge column `mid`. Right-eye coordinates are reported in full-image
/// space. A half with no usable contour yields `None`, never an error.
pub fn localize_pupils(gray: &GrayImage, mid: i32) -> (Option<(i32, i32)>, Option<(i32, i32)>) {
    let cleaned = clean_threshold(binarize(gray, PUPIL_THRESHOLD));
    let (width, height) = cleaned.dimensions();
    let mid = mid.clamp(0, width as i32) as u32;

    let left = if mid > 0 {
        centroid_of_largest(&imageops::crop_imm(&cleaned, 0, 0, mid, height).to_image())
    } else {
        None
    };
    let right = if mid < width {
        centroid_of_largest(&imageops::crop_imm(&cleaned, mid, 0, width - mid, height).to_image())
            .map(|(cx, cy)| (cx + mid as i32, cy))
    } else {
        None
    };

    (left, right)
}

fn binarize(gray: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y)[0] > threshold {
            image::Luma([255u8])
        } else {
            image::Luma([0u8])
        }
    })
}

/// Erosion then dilation removes the salt noise equalization leaves in the
/// sclera while keeping the larger pupil blob; the final inversion makes
/// the dark region the one the contour finder sees.
fn clean_threshold(thresh: GrayImage) -> GrayImage {
    let thresh = erode(&thresh, Norm::LInf, 2);
    let thresh = dilate(&thresh, Norm::LInf, 4);
    let mut thresh = median_filter(&thresh, 1, 1);
    imageops::invert(&mut thresh);
    thresh
}

fn centroid_of_largest(binary: &GrayImage) -> Option<(i32, i32)> {
    if binary.width() == 0 || binary.height() == 0 {
        return None;
    }

    let contours = find_contours::<i32>(binary);
    let largest = contours
        .iter()
        .filter(|c| c.parent.is_none())
        .map(|c| (polygon_moments(&c.points).0.abs(), c))
        .max_by(|a, b| a.0.total_cmp(&b.0))?
        .1;

    let (m00, m10, m01) = polygon_moments(&largest.points);
    if m00 == 0.0 {
        return None;
    }
    Some(((m10 / m00) as i32, (m01 / m00) as i32))
}

/// Area-weighted polygon moments over the closed contour (Green's theorem):
/// centroid = (m10/m00, m01/m00). Degenerate contours report zero area.
fn polygon_moments(points: &[Point<i32>]) -> (f64, f64, f64) {
    if points.len() < 3 {
        return (0.0, 0.0, 0.0);
    }
    let mut m00 = 0.0;
    let mut m10 = 0.0;
    let mut m01 = 0.0;
    for i in 0..points.len() {
        let p = points[i];
        let q = points[(i + 1) % points.len()];
        let cross = p.x as f64 * q.y as f64 - q.x as f64 * p.y as f64;
        m00 += cross;
        m10 += (p.x + q.x) as f64 * cross;
        m01 += (p.y + q.y) as f64 * cross;
    }
    (m00 / 2.0, m10 / 6.0, m01 / 6.0)
}
