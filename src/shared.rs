// The only state shared between the capture side and the controller side:
// the latest classified (left, right) pair and the cooperative stop flag.
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;

use crate::vision::EyeballPosition;

/// Discretized gaze direction for both eyes, published whole by whichever
/// gaze source is active. Readers may observe a stale pair, never a torn one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GazePair {
    pub left: EyeballPosition,
    pub right: EyeballPosition,
}

impl GazePair {
    pub fn new(left: EyeballPosition, right: EyeballPosition) -> Self {
        Self { left, right }
    }
}

/// Single-writer handoff cell for the gaze pair. Both directions are packed
/// into one atomic word so a load always sees a pair written together.
pub struct SharedGaze(AtomicU16);

impl SharedGaze {
    pub fn new() -> Self {
        Self(AtomicU16::new(encode(GazePair::default())))
    }

    pub fn store(&self, pair: GazePair) {
        self.0.store(encode(pair), Ordering::SeqCst);
    }

    pub fn load(&self) -> GazePair {
        decode(self.0.load(Ordering::SeqCst))
    }
}

impl Default for SharedGaze {
    fn default() -> Self {
        Self::new()
    }
}

fn encode(pair: GazePair) -> u16 {
    let left = pair.left.as_i8() as u8 as u16;
    let right = pair.right.as_i8() as u8 as u16;
    (left << 8) | right
}

fn decode(word: u16) -> GazePair {
    let left = (word >> 8) as u8 as i8;
    let right = word as u8 as i8;
    GazePair {
        left: EyeballPosition::from_i8(left).unwrap_or(EyeballPosition::Center),
        right: EyeballPosition::from_i8(right).unwrap_or(EyeballPosition::Center),
    }
}

/// Cancellation token observed by the capture loop, the controller loop and
/// the vendor stream reader. Triggering is idempotent.
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
