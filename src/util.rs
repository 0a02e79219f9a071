//! Timing helpers.

use std::time::Instant;

/// RAII stage timer that logs elapsed time on drop.
pub struct StageTimer {
    label: &'static str,
    start: Instant,
    level: log::Level,
}

impl StageTimer {
    /// Time a stage, logging at INFO level when it finishes.
    pub fn info(label: &'static str) -> Self {
        Self {
            label,
            start: Instant::now(),
            level: log::Level::Info,
        }
    }

    /// Time a stage, logging at DEBUG level when it finishes.
    pub fn debug(label: &'static str) -> Self {
        Self {
            label,
            start: Instant::now(),
            level: log::Level::Debug,
        }
    }
}

impl Drop for StageTimer {
    fn drop(&mut self) {
        log::log!(self.level, "{} took {:.3?}", self.label, self.start.elapsed());
    }
}
