// Per-frame vision pipeline: landmarks -> masked eye regions -> pupil
// centroids -> discrete gaze directions.
pub mod classify;
pub mod eye_region;
pub mod landmarks;
pub mod pupil;

pub use classify::{classify, EyeballPosition};
pub use eye_region::{extract_eye_regions, EyeRoi, MaskedEyes, SENTINEL};
pub use landmarks::{FaceLandmarker, Landmarks, BRIDGE, FACE_MESH_POINTS, LEFT_EYE, RIGHT_EYE};
pub use pupil::localize_pupils;
