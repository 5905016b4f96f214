// Simulated keyboard/mouse output. Everything here is fire-and-forget: a
// dropped event is logged and forgotten, matching how the controller treats
// input (no retries, no acknowledgement).
use enigo::{Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};

use crate::error::{Error, Result};

pub trait InputBackend: Send {
    fn key_down(&mut self, key: char);
    fn key_up(&mut self, key: char);
    fn move_relative(&mut self, dx: i32, dy: i32);
    fn screen_width(&self) -> Option<i32>;
}

/// System-level input via enigo.
pub struct EnigoInput {
    enigo: Enigo,
}

impl EnigoInput {
    pub fn new() -> Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| Error::Input(format!("failed to open input device: {}", e)))?;
        Ok(Self { enigo })
    }
}

impl InputBackend for EnigoInput {
    fn key_down(&mut self, key: char) {
        if let Err(e) = self.enigo.key(Key::Unicode(key), Direction::Press) {
            log::debug!("key press dropped: {}", e);
        }
    }

    fn key_up(&mut self, key: char) {
        if let Err(e) = self.enigo.key(Key::Unicode(key), Direction::Release) {
            log::debug!("key release dropped: {}", e);
        }
    }

    fn move_relative(&mut self, dx: i32, dy: i32) {
        if let Err(e) = self.enigo.move_mouse(dx, dy, Coordinate::Rel) {
            log::debug!("mouse move dropped: {}", e);
        }
    }

    fn screen_width(&self) -> Option<i32> {
        match self.enigo.main_display() {
            Ok((width, _height)) => Some(width),
            Err(e) => {
                log::debug!("display size unavailable: {}", e);
                None
            }
        }
    }
}

/// Opens the system input backend. Failure here is not fatal to a session;
/// the caller degrades to log-only operation.
pub fn open_input_backend() -> Result<Box<dyn InputBackend>> {
    Ok(Box::new(EnigoInput::new()?))
}
