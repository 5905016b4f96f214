// Error taxonomy for the tracking core. Transient conditions (frame not
// ready, no face in frame, degenerate eye geometry) are handled locally by
// the pipeline and never reach this type.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Camera device could not be opened or streamed; fails the session
    /// start. Read failures after open are retried, not surfaced here.
    #[error("camera error: {0}")]
    Camera(String),

    /// Simulated input device unavailable. The session continues in
    /// log-only mode.
    #[error("input device error: {0}")]
    Input(String),

    /// Rejected before any loop starts (bad action keyword, no gaze source
    /// available, session already running).
    #[error("configuration error: {0}")]
    Config(String),

    /// Gaze trace file could not be created. Append failures after creation
    /// are best-effort and do not produce this error.
    #[error("gaze trace error: {0}")]
    Trace(#[from] std::io::Error),

    /// External tracker executable failed to spawn or stream.
    #[error("vendor tracker error: {0}")]
    Vendor(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert_to_trace() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io.into();
        assert!(matches!(err, Error::Trace(_)));
    }

    #[test]
    fn messages_name_the_failing_component() {
        let err = Error::Camera("device 0 busy".to_string());
        assert_eq!(err.to_string(), "camera error: device 0 busy");
    }
}
