// Camera acquisition and the frame-rate-bound capture loop. The loop owns
// the camera for its lifetime, runs the vision pipeline per frame and
// publishes the classified pair; it never terminates on a bad frame, only
// on the shared stop token.
use std::sync::Arc;
use std::time::Duration;

use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;

use crate::config::ClassifierConfig;
use crate::error::{Error, Result};
use crate::shared::{GazePair, SharedGaze, StopToken};
use crate::vision::{classify, extract_eye_regions, localize_pupils, FaceLandmarker};

/// Frame producer consumed by the capture loop. The camera implements this;
/// tests substitute synthetic frames.
pub trait FrameSource: Send {
    fn grab(&mut self) -> Result<RgbImage>;
}

pub struct CameraSource {
    camera: Camera,
}

impl CameraSource {
    pub fn open(index: u32) -> Result<Self> {
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = Camera::new(CameraIndex::Index(index), requested)
            .map_err(|e| Error::Camera(format!("failed to open camera {}: {}", index, e)))?;
        camera
            .open_stream()
            .map_err(|e| Error::Camera(format!("failed to start camera stream: {}", e)))?;
        log::info!(
            "camera opened: {} ({})",
            camera.info().human_name(),
            camera.camera_format()
        );
        Ok(Self { camera })
    }
}

impl FrameSource for CameraSource {
    fn grab(&mut self) -> Result<RgbImage> {
        let frame = self
            .camera
            .frame()
            .map_err(|e| Error::Camera(e.to_string()))?;
        frame
            .decode_image::<RgbFormat>()
            .map_err(|e| Error::Camera(e.to_string()))
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            log::debug!("camera stream already stopped: {}", e);
        }
        log::info!("camera released");
    }
}

/// Runs until the stop token is set. Grab failures retry on the next
/// iteration; a frame with no detectable face leaves the previously
/// published pair in place rather than overriding it with Center/Center.
pub fn run_capture_loop(
    mut frames: Box<dyn FrameSource>,
    mut landmarker: Box<dyn FaceLandmarker>,
    classifier: ClassifierConfig,
    shared: Arc<SharedGaze>,
    stop: StopToken,
) {
    log::info!("capture loop started");
    while !stop.is_set() {
        let frame = match frames.grab() {
            Ok(frame) => frame,
            Err(e) => {
                log::debug!("frame grab failed: {}", e);
                std::thread::sleep(Duration::from_millis(10));
                continue;
            }
        };

        let landmarks = match landmarker.detect(&frame) {
            Ok(Some(landmarks)) => landmarks,
            Ok(None) => continue,
            Err(e) => {
                log::warn!("landmark detection failed: {}", e);
                continue;
            }
        };

        let masked = extract_eye_regions(&frame, &landmarks);
        let (left_centroid, right_centroid) = localize_pupils(&masked.gray, landmarks.bridge_x());
        let pair = GazePair::new(
            classify(&masked.left, left_centroid, &classifier),
            classify(&masked.right, right_centroid, &classifier),
        );
        shared.store(pair);
    }
    log::info!("capture loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::landmarks::{Landmarks, FACE_MESH_POINTS, BRIDGE, LEFT_EYE, RIGHT_EYE};
    use crate::vision::EyeballPosition::{Center, Left, Right};
    use std::time::Instant;

    struct StaticFrames {
        frame: RgbImage,
    }

    impl FrameSource for StaticFrames {
        fn grab(&mut self) -> Result<RgbImage> {
            Ok(self.frame.clone())
        }
    }

    struct ScriptedLandmarker {
        landmarks: Option<Landmarks>,
    }

    impl FaceLandmarker for ScriptedLandmarker {
        fn detect(&mut self, _frame: &RgbImage) -> anyhow::Result<Option<Landmarks>> {
            Ok(self.landmarks.clone())
        }
    }

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

    fn mesh(left_eye: (i32, i32), right_eye: (i32, i32), bridge_x: i32) -> Landmarks {
        let mut points = vec![(0, 0); FACE_MESH_POINTS];
        points[BRIDGE] = (bridge_x, 50);
        for (slot, p) in LEFT_EYE.iter().zip(ring(left_eye, 15.0)) {
            points[*slot] = p;
        }
        for (slot, p) in RIGHT_EYE.iter().zip(ring(right_eye, 15.0)) {
            points[*slot] = p;
        }
        Landmarks::from_points(points).unwrap()
    }

    /// Face-like frame: light sclera inside both eye rings, with a dark
    /// pupil square offset toward the left edge of the left eye.
    fn face_frame() -> RgbImage {
        RgbImage::from_fn(200, 100, |x, y| {
            let (x, y) = (x as i32, y as i32);
            let pupil =
                (x - 40).abs() <= 5 && (y - 50).abs() <= 5;
            if pupil {
                image::Rgb([10, 10, 10])
            } else {
                image::Rgb([180, 170, 160])
            }
        })
    }

    fn wait_for_pair(shared: &SharedGaze, expected: GazePair) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if shared.load() == expected {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn publishes_the_classified_pair_for_a_synthetic_face() {
        let shared = Arc::new(SharedGaze::new());
        let stop = StopToken::new();
        let frames = Box::new(StaticFrames {
            frame: face_frame(),
        });
        let landmarker = Box::new(ScriptedLandmarker {
            landmarks: Some(mesh((50, 50), (150, 50), 100)),
        });

        let loop_shared = shared.clone();
        let loop_stop = stop.clone();
        let handle = std::thread::spawn(move || {
            run_capture_loop(
                frames,
                landmarker,
                ClassifierConfig::default(),
                loop_shared,
                loop_stop,
            );
        });

        // Pupil at x=40 in a 35..65 box: ratio (35-40)/(40-65) = 0.2 -> Right.
        // The right eye has no pupil at all -> Center.
        let expected = GazePair::new(Right, Center);
        assert!(wait_for_pair(&shared, expected), "pair never published");

        stop.trigger();
        handle.join().unwrap();
    }

    #[test]
    fn no_face_keeps_the_previously_published_pair() {
        let shared = Arc::new(SharedGaze::new());
        shared.store(GazePair::new(Left, Left));
        let stop = StopToken::new();
        let frames = Box::new(StaticFrames {
            frame: face_frame(),
        });
        let landmarker = Box::new(ScriptedLandmarker { landmarks: None });

        let loop_shared = shared.clone();
        let loop_stop = stop.clone();
        let handle = std::thread::spawn(move || {
            run_capture_loop(
                frames,
                landmarker,
                ClassifierConfig::default(),
                loop_shared,
                loop_stop,
            );
        });

        std::thread::sleep(Duration::from_millis(50));
        stop.trigger();
        handle.join().unwrap();

        assert_eq!(shared.load(), GazePair::new(Left, Left));
    }
}
