//! A simple animated glyph shown while waiting on the LLM (§4.6), stopped
//! the moment any text or tool event arrives.

use std::time::{Duration, Instant};

const FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const FRAME_DURATION: Duration = Duration::from_millis(80);

#[derive(Debug, Clone)]
pub struct Spinner {
    frame_index: usize,
    last_frame_time: Instant,
    active: bool,
}

impl Default for Spinner {
    fn default() -> Self {
        Self {
            frame_index: 0,
            last_frame_time: Instant::now(),
            active: false,
        }
    }
}

impl Spinner {
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
        if active {
            self.last_frame_time = Instant::now();
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Advances the frame if enough time elapsed. Returns whether it moved.
    pub fn tick(&mut self) -> bool {
        if !self.active {
            return false;
        }
        if self.last_frame_time.elapsed() >= FRAME_DURATION {
            self.frame_index = (self.frame_index + 1) % FRAMES.len();
            self.last_frame_time = Instant::now();
            true
        } else {
            false
        }
    }

    pub fn current_frame(&self) -> &'static str {
        FRAMES[self.frame_index % FRAMES.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_by_default_and_does_not_tick() {
        let mut spinner = Spinner::default();
        assert!(!spinner.is_active());
        assert!(!spinner.tick());
    }

    #[test]
    fn advances_frame_once_duration_elapses() {
        let mut spinner = Spinner::default();
        spinner.set_active(true);
        spinner.last_frame_time = Instant::now() - Duration::from_millis(100);
        assert!(spinner.tick());
        assert_eq!(spinner.frame_index, 1);
    }

    #[test]
    fn stops_advancing_once_deactivated() {
        let mut spinner = Spinner::default();
        spinner.set_active(true);
        spinner.set_active(false);
        spinner.last_frame_time = Instant::now() - Duration::from_millis(100);
        assert!(!spinner.tick());
    }
}
