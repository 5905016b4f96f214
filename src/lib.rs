//! Gaze-driven input control.
//!
//! A webcam frame goes through face-mesh landmarks, eye-region masking and
//! pupil localization to a discrete left/center/right direction per eye.
//! A dwell controller samples that pair at a fixed cadence, logs it to a
//! CSV trace and turns sustained stillness into key and pointer actions.
//! On Windows hosts a vendor tracker process can replace the in-process
//! pipeline; the controller consumes both through the same interface.

pub mod capture;
pub mod config;
pub mod dwell;
pub mod error;
pub mod input;
pub mod shared;
pub mod source;
pub mod timer;
pub mod trace;
pub mod tracker;
pub mod vision;

pub use config::{ClassifierConfig, TrackerConfig};
pub use dwell::{parse_args, run_session, DwellAction, DwellController};
pub use error::{Error, Result};
pub use shared::{GazePair, SharedGaze, StopToken};
pub use source::{select_gaze_source, GazeSource, GazeSourceKind};
pub use tracker::{
    command_action, gaze_session_active, init_gaze_tracker, process_voice_command,
    register_landmark_backend, request_gaze_stop, start_gaze_session, start_gaze_tracking,
    stop_gaze_tracking, wait_for_gaze_session, EyeTracker, LandmarkerFactory, CMD_WORDS,
};
pub use vision::{EyeballPosition, FaceLandmarker, Landmarks};
