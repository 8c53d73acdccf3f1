//! Held-key scrubbing.
//!
//! Terminals report a held key as a burst of press/repeat events at the OS
//! repeat rate, and some never report a release. [`KeyRepeat`] turns that into
//! single steps on a fixed cadence, and treats a key as released once no
//! event has arrived for the grace period.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrubDirection {
    Forward,
    Backward,
}

#[derive(Debug, Clone, Copy)]
struct Hold {
    direction: ScrubDirection,
    last_fired: Instant,
    last_event: Instant,
}

#[derive(Debug, Clone)]
pub struct KeyRepeat {
    interval: Duration,
    release_grace: Duration,
    held: Option<Hold>,
}

impl KeyRepeat {
    pub fn new(interval: Duration, release_grace: Duration) -> Self {
        Self {
            interval,
            release_grace,
            held: None,
        }
    }

    /// Register a press or OS repeat. A new press steps immediately; repeats
    /// of the held direction only refresh the hold.
    pub fn press(&mut self, direction: ScrubDirection, now: Instant) -> Option<ScrubDirection> {
        match &mut self.held {
            Some(hold) if hold.direction == direction => {
                hold.last_event = now;
                None
            }
            _ => {
                self.held = Some(Hold {
                    direction,
                    last_fired: now,
                    last_event: now,
                });
                Some(direction)
            }
        }
    }

    pub fn release(&mut self, direction: ScrubDirection) {
        if self.held.is_some_and(|hold| hold.direction == direction) {
            self.held = None;
        }
    }

    /// Step due at `now`, if any. Called from the UI tick.
    pub fn poll(&mut self, now: Instant) -> Option<ScrubDirection> {
        let hold = self.held.as_mut()?;
        if now.saturating_duration_since(hold.last_event) > self.release_grace {
            self.held = None;
            return None;
        }
        if now.saturating_duration_since(hold.last_fired) >= self.interval {
            hold.last_fired = now;
            return Some(hold.direction);
        }
        None
    }

    pub fn is_held(&self) -> bool {
        self.held.is_some()
    }
}
