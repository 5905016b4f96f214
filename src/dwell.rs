// Dwell detection and the actions it drives. One controller instance lives
// for one session; it samples the latest gaze pair at a fixed cadence,
// measures how long the pair has been still and fires the configured
// action once stillness outlasts the threshold.
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::TrackerConfig;
use crate::error::{Error, Result};
use crate::input::InputBackend;
use crate::shared::{GazePair, StopToken};
use crate::source::GazeSource;
use crate::timer::Timer;
use crate::trace::GazeTrace;

/// What a completed dwell does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DwellAction {
    /// Record only.
    Noop,
    /// End the session.
    Stop,
    /// Hold the forward key until the gaze moves again.
    Move,
}

/// Maps command-line words to a session mode. The first argument selects
/// the dwell action; `log` may appear in any position and suppresses mouse
/// movement while keeping the trace.
pub fn parse_args(args: &[String]) -> Result<(DwellAction, bool)> {
    let mut action = DwellAction::Noop;
    let mut log_mode = false;
    for (i, arg) in args.iter().enumerate() {
        match arg.as_str() {
            "stop" if i == 0 => action = DwellAction::Stop,
            "move" if i == 0 => action = DwellAction::Move,
            "log" => log_mode = true,
            other => {
                return Err(Error::Config(format!(
                    "unrecognized argument: {} (expected stop, move or log)",
                    other
                )))
            }
        }
    }
    Ok((action, log_mode))
}

pub struct DwellController {
    action: DwellAction,
    log_mode: bool,
    threshold: Duration,
    move_speed: i32,
    forward_key: char,
    /// Runs while the pair is still; stopped while the gaze is moving.
    dwell: Timer,
    key_held: bool,
    prev: GazePair,
    stop: StopToken,
    input: Option<Box<dyn InputBackend>>,
    trace: Arc<Mutex<GazeTrace>>,
}

impl DwellController {
    pub fn new(
        action: DwellAction,
        log_mode: bool,
        config: &TrackerConfig,
        move_speed: i32,
        input: Option<Box<dyn InputBackend>>,
        trace: Arc<Mutex<GazeTrace>>,
        stop: StopToken,
    ) -> Self {
        // The stillness clock starts with the session, so holding the gaze
        // from the first frame counts toward the threshold.
        let mut dwell = Timer::new();
        dwell.start();
        Self {
            action,
            log_mode,
            threshold: Duration::from_secs_f64(config.dwell_threshold_secs),
            move_speed,
            forward_key: config.forward_key,
            dwell,
            key_held: false,
            prev: GazePair::default(),
            stop,
            input,
            trace,
        }
    }

    /// One controller step. The pair is considered to have moved only when
    /// BOTH eyes changed direction since the previous tick; a single-eye
    /// change keeps the dwell measurement running.
    pub fn tick(&mut self, pair: GazePair) {
        if self.stop.is_set() {
            return;
        }
        self.record_trace(pair);

        let moved = pair.left != self.prev.left && pair.right != self.prev.right;
        if moved {
            if self.dwell.is_running() {
                self.dwell.stop();
                if self.key_held {
                    self.release_forward_key();
                }
            }
        } else if !self.dwell.is_running() {
            self.dwell.start();
        }

        if self.dwell.is_running() && self.dwell.elapsed() > self.threshold {
            match self.action {
                DwellAction::Stop => {
                    log::info!("dwell held for {:?}, ending session", self.threshold);
                    self.stop.trigger();
                    return;
                }
                DwellAction::Move => {
                    if !self.key_held {
                        self.press_forward_key();
                    }
                }
                DwellAction::Noop => {}
            }
        }

        if !self.log_mode && pair.left == pair.right {
            let dx = pair.left.as_i8() as i32 * self.move_speed;
            if let Some(input) = self.input.as_mut() {
                input.move_relative(dx, 0);
            }
        }

        self.prev = pair;
    }

    pub fn terminate(&self) {
        self.stop.trigger();
    }

    pub fn is_terminated(&self) -> bool {
        self.stop.is_set()
    }

    pub fn key_held(&self) -> bool {
        self.key_held
    }

    /// Releases anything still held and flushes the trace. Called once when
    /// the session loop exits.
    pub fn shutdown(&mut self) {
        if self.key_held {
            self.release_forward_key();
        }
        if let Ok(mut trace) = self.trace.lock() {
            trace.flush();
        }
    }

    fn record_trace(&mut self, pair: GazePair) {
        // Never stalls the tick on the trace lock; a missed line is fine.
        match self.trace.try_lock() {
            Ok(mut trace) => trace.record(self.dwell.log_elapsed(), pair),
            Err(_) => log::debug!("trace busy, line skipped"),
        }
    }

    fn press_forward_key(&mut self) {
        if let Some(input) = self.input.as_mut() {
            input.key_down(self.forward_key);
            self.key_held = true;
            log::debug!("holding {:?}", self.forward_key);
        }
    }

    fn release_forward_key(&mut self) {
        if let Some(input) = self.input.as_mut() {
            input.key_up(self.forward_key);
            log::debug!("released {:?}", self.forward_key);
        }
        self.key_held = false;
    }
}

/// Drives one session to completion on the calling thread: starts the gaze
/// source, ticks the controller at the configured cadence and tears both
/// down once the shared stop token is set, from any side.
pub fn run_session(
    mut source: Box<dyn GazeSource>,
    mut controller: DwellController,
    tick_hz: u32,
    stop: StopToken,
) -> Result<()> {
    source.start()?;
    let interval = Duration::from_secs_f64(1.0 / tick_hz.max(1) as f64);
    log::info!("session loop running every {:?}", interval);

    let mut cadence = Timer::new();
    cadence.start();
    while !stop.is_set() {
        if cadence.elapsed() >= interval {
            cadence.start();
            controller.tick(source.latest());
        } else {
            std::thread::yield_now();
        }
    }

    controller.shutdown();
    source.stop();
    log::info!("session loop stopped");
    Ok(())
}
