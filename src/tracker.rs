// Session facade. Owns the configuration, the open gaze trace and at most
// one running session; exposes the voice-command entrypoint and a
// process-wide instance for hosts that drive tracking from several places.
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;
use tokio::task::JoinHandle;

use crate::config::TrackerConfig;
use crate::dwell::{run_session, DwellAction, DwellController};
use crate::error::{Error, Result};
use crate::input::open_input_backend;
use crate::shared::{SharedGaze, StopToken};
use crate::source::{select_gaze_source, vendor_available};
use crate::trace::GazeTrace;
use crate::vision::FaceLandmarker;

/// Words the voice vocabulary is trimmed to before interpretation.
pub const CMD_WORDS: [&str; 11] = [
    "build", "place", "move", "track", "turn", "tilt", "undo", "redo", "store", "clone", "give",
];

const MOVE_SPEED_DIVISOR: i32 = 30;
const FALLBACK_MOVE_SPEED: i32 = 64;

/// Builds a fresh landmark detector per session. Registered by the host,
/// since the face-mesh model itself lives outside this crate.
pub type LandmarkerFactory =
    Box<dyn Fn() -> anyhow::Result<Box<dyn FaceLandmarker>> + Send + Sync>;

/// Interprets a voice transcript. Words are lowercased, stripped of edge
/// punctuation and filtered to [`CMD_WORDS`]; the remainder must start
/// with "track" to mean anything, and the word after it picks the action.
pub fn command_action(transcript: &str) -> Option<DwellAction> {
    let lowered = transcript.to_lowercase();
    let words: Vec<&str> = lowered
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_ascii_alphabetic()))
        .filter(|word| CMD_WORDS.contains(word))
        .collect();

    if words.first() != Some(&"track") {
        return None;
    }
    Some(match words.get(1) {
        Some(&"move") => DwellAction::Move,
        Some(&"build") | Some(&"place") => DwellAction::Stop,
        _ => DwellAction::Noop,
    })
}

struct SessionHandle {
    stop: StopToken,
    handle: JoinHandle<Result<()>>,
}

pub struct EyeTracker {
    config: TrackerConfig,
    landmarker_factory: Option<LandmarkerFactory>,
    trace: Option<Arc<Mutex<GazeTrace>>>,
    session: Option<SessionHandle>,
}

impl EyeTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            landmarker_factory: None,
            trace: None,
            session: None,
        }
    }

    pub fn set_landmark_backend(&mut self, factory: LandmarkerFactory) {
        self.landmarker_factory = Some(factory);
    }

    /// Opens the gaze trace for this tracking run and returns its path.
    /// Idempotent while a trace is already open.
    pub fn start_tracking(&mut self) -> Result<PathBuf> {
        let trace = self.ensure_trace()?;
        let path = lock_trace(&trace).path().to_path_buf();
        Ok(path)
    }

    /// Reacts to one voice transcript. Returns whether the transcript was
    /// a tracking command; unrelated speech is reported as unhandled, not
    /// as an error.
    pub fn process_command(&mut self, transcript: &str) -> Result<bool> {
        match command_action(transcript) {
            Some(action) => {
                log::info!("voice command accepted: {:?}", action);
                self.spawn_session(action, false)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Launches the session worker. Must run inside a tokio runtime; the
    /// session loop itself occupies a blocking thread until it stops.
    pub fn spawn_session(&mut self, action: DwellAction, log_mode: bool) -> Result<()> {
        if self.is_session_active() {
            return Err(Error::Config(
                "a tracking session is already running".to_string(),
            ));
        }
        self.session = None;

        let trace = self.ensure_trace()?;
        let shared = Arc::new(SharedGaze::new());
        let stop = StopToken::new();

        let landmarker = if vendor_available(&self.config) {
            None
        } else {
            match &self.landmarker_factory {
                Some(factory) => Some(factory().map_err(|e| {
                    Error::Config(format!("landmark backend failed to initialize: {}", e))
                })?),
                None => None,
            }
        };
        let source = select_gaze_source(&self.config, landmarker, shared, stop.clone())?;

        let input = match open_input_backend() {
            Ok(input) => Some(input),
            Err(e) => {
                log::warn!("input backend unavailable, session runs degraded: {}", e);
                None
            }
        };
        let move_speed = input
            .as_ref()
            .and_then(|input| input.screen_width())
            .map(|width| width / MOVE_SPEED_DIVISOR)
            .unwrap_or(FALLBACK_MOVE_SPEED);

        let controller = DwellController::new(
            action,
            log_mode,
            &self.config,
            move_speed,
            input,
            trace,
            stop.clone(),
        );
        let tick_hz = self.config.tick_hz;
        let loop_stop = stop.clone();
        let handle =
            tokio::task::spawn_blocking(move || run_session(source, controller, tick_hz, loop_stop));

        log::info!(
            "gaze session started at {} (action {:?}, log mode {}, move speed {})",
            chrono::Local::now().to_rfc3339(),
            action,
            log_mode,
            move_speed
        );
        self.session = Some(SessionHandle { stop, handle });
        Ok(())
    }

    pub fn is_session_active(&self) -> bool {
        self.session
            .as_ref()
            .map_or(false, |session| !session.handle.is_finished())
    }

    /// Asks the running session to wind down without waiting for it.
    pub fn request_stop(&self) {
        if let Some(session) = &self.session {
            session.stop.trigger();
        }
    }

    /// Stops any running session and closes the trace, returning the path
    /// of the finished trace file when one was open.
    pub async fn stop_tracking(&mut self) -> Option<PathBuf> {
        if let Some(session) = self.take_session() {
            session.stop.trigger();
            await_session(session.handle).await;
        }
        self.close_trace()
    }

    fn ensure_trace(&mut self) -> Result<Arc<Mutex<GazeTrace>>> {
        if let Some(trace) = &self.trace {
            return Ok(trace.clone());
        }
        let dir = self
            .config
            .trace_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let trace = Arc::new(Mutex::new(GazeTrace::create_in(&dir)?));
        self.trace = Some(trace.clone());
        Ok(trace)
    }

    fn take_session(&mut self) -> Option<SessionHandle> {
        self.session.take()
    }

    fn close_trace(&mut self) -> Option<PathBuf> {
        self.trace.take().map(|trace| {
            let mut trace = lock_trace(&trace);
            trace.close();
            let path = trace.path().to_path_buf();
            log::info!(
                "gaze trace closed at {}: {}",
                chrono::Local::now().to_rfc3339(),
                path.display()
            );
            path
        })
    }
}

fn lock_trace(trace: &Arc<Mutex<GazeTrace>>) -> std::sync::MutexGuard<'_, GazeTrace> {
    trace.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn await_session(handle: JoinHandle<Result<()>>) {
    match handle.await {
        Ok(Ok(())) => log::info!("gaze session ended"),
        Ok(Err(e)) => log::warn!("gaze session ended with error: {}", e),
        Err(e) => log::warn!("gaze session task failed: {}", e),
    }
}

lazy_static! {
    static ref TRACKER: Arc<Mutex<Option<EyeTracker>>> = Arc::new(Mutex::new(None));
}

fn with_tracker<T>(f: impl FnOnce(&mut EyeTracker) -> T) -> T {
    let mut guard = TRACKER.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let tracker = guard.get_or_insert_with(|| EyeTracker::new(TrackerConfig::load()));
    f(tracker)
}

/// Replaces the process-wide tracker with one using the given config.
pub fn init_gaze_tracker(config: TrackerConfig) {
    let mut guard = TRACKER.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = Some(EyeTracker::new(config));
}

pub fn register_landmark_backend<F>(factory: F)
where
    F: Fn() -> anyhow::Result<Box<dyn FaceLandmarker>> + Send + Sync + 'static,
{
    with_tracker(|tracker| tracker.set_landmark_backend(Box::new(factory)));
}

pub fn start_gaze_tracking() -> Result<PathBuf> {
    with_tracker(|tracker| tracker.start_tracking())
}

pub fn process_voice_command(transcript: &str) -> Result<bool> {
    with_tracker(|tracker| tracker.process_command(transcript))
}

pub fn start_gaze_session(action: DwellAction, log_mode: bool) -> Result<()> {
    with_tracker(|tracker| tracker.spawn_session(action, log_mode))
}

pub fn gaze_session_active() -> bool {
    with_tracker(|tracker| tracker.is_session_active())
}

/// Signals the running session to stop without waiting for it. Safe to
/// call from signal handlers and concurrent tasks.
pub fn request_gaze_stop() {
    with_tracker(|tracker| tracker.request_stop());
}

/// Waits for the running session to end, either on its own through a Stop
/// dwell or after [`request_gaze_stop`]. The session stays registered
/// until it finishes, so a stop request can still reach it; the trace
/// stays open until [`stop_gaze_tracking`].
pub async fn wait_for_gaze_session() {
    while gaze_session_active() {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    let session = with_tracker(|tracker| tracker.take_session());
    if let Some(session) = session {
        await_session(session.handle).await;
    }
}

/// Stops the session if one still runs and closes the trace. The lock on
/// the process-wide tracker is never held across an await.
pub async fn stop_gaze_tracking() -> Option<PathBuf> {
    let session = with_tracker(|tracker| tracker.take_session());
    if let Some(session) = session {
        session.stop.trigger();
        await_session(session.handle).await;
    }
    with_tracker(|tracker| tracker.close_trace())
}
