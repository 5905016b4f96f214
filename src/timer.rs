use std::time::{Duration, Instant};

/// Stopwatch used for both the dwell measurement and the controller tick
/// cadence. `elapsed()` reports time since the last `start()` while running
/// and zero otherwise; `log_elapsed()` reports time since construction and
/// never resets, which is what the gaze trace timestamps.
#[derive(Debug, Clone)]
pub struct Timer {
    origin: Instant,
    started: Instant,
    running: bool,
}

impl Timer {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            origin: now,
            started: now,
            running: false,
        }
    }

    pub fn start(&mut self) {
        self.started = Instant::now();
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn elapsed(&self) -> Duration {
        if self.running {
            self.started.elapsed()
        } else {
            Duration::ZERO
        }
    }

    pub fn log_elapsed(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn elapsed_is_zero_unless_running() {
        let mut timer = Timer::new();
        assert_eq!(timer.elapsed(), Duration::ZERO);

        timer.start();
        sleep(Duration::from_millis(15));
        assert!(timer.elapsed() >= Duration::from_millis(15));

        timer.stop();
        assert_eq!(timer.elapsed(), Duration::ZERO);
    }

    #[test]
    fn restart_resets_the_reference_instant() {
        let mut timer = Timer::new();
        timer.start();
        sleep(Duration::from_millis(20));
        timer.start();
        assert!(timer.elapsed() < Duration::from_millis(20));
    }

    #[test]
    fn log_elapsed_is_monotonic_and_ignores_stop() {
        let mut timer = Timer::new();
        timer.start();
        sleep(Duration::from_millis(5));
        let first = timer.log_elapsed();
        timer.stop();
        sleep(Duration::from_millis(5));
        let second = timer.log_elapsed();
        assert!(second > first);
        assert!(first > 0.0);
    }
}
