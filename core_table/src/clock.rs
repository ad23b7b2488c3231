use serde::Serialize;
use thiserror::Error;

/// Logical time in milliseconds of warped (virtual) time.
pub type LogicalTime = f64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClockState {
    pub warped_time: LogicalTime,
    pub former_time: LogicalTime,
    /// Playback rate hint for the scheduling layer. Never moves time.
    pub speed: f64,
}

impl Default for ClockState {
    fn default() -> Self {
        Self {
            warped_time: 0.0,
            former_time: 0.0,
            speed: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ClockError {
    #[error("clock regression: tick to {new_time} from {former_time}")]
    Regression {
        new_time: LogicalTime,
        former_time: LogicalTime,
    },
    #[error("tick carries a non-finite time ({new_time}, {former_time})")]
    NonFinite {
        new_time: LogicalTime,
        former_time: LogicalTime,
    },
}

/// Virtual clock driven entirely by external TICKs.
///
/// A tick whose `new_time` is below its `former_time` is a frame-driver
/// bug. With fatal regressions enabled (the debug-build default) it
/// panics; otherwise it is rejected and the clock keeps its state. Only
/// [`LogicalClock::seek`] and [`LogicalClock::reset`] move time backward.
#[derive(Debug, Clone)]
pub struct LogicalClock {
    state: ClockState,
    fatal_regressions: bool,
}

impl Default for LogicalClock {
    fn default() -> Self {
        Self::new()
    }
}

impl LogicalClock {
    pub fn new() -> Self {
        Self {
            state: ClockState::default(),
            fatal_regressions: cfg!(debug_assertions),
        }
    }

    /// A clock that never panics on regressions.
    pub fn tolerant() -> Self {
        Self::new().with_fatal_regressions(false)
    }

    pub fn with_fatal_regressions(mut self, fatal: bool) -> Self {
        self.fatal_regressions = fatal;
        self
    }

    /// Returns the previous setting.
    pub fn set_fatal_regressions(&mut self, fatal: bool) -> bool {
        std::mem::replace(&mut self.fatal_regressions, fatal)
    }

    pub fn fatal_regressions(&self) -> bool {
        self.fatal_regressions
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn now(&self) -> LogicalTime {
        self.state.warped_time
    }

    pub fn tick(
        &mut self,
        new_time: LogicalTime,
        former_time: LogicalTime,
        speed: Option<f64>,
    ) -> Result<ClockState, ClockError> {
        if !new_time.is_finite() || !former_time.is_finite() {
            tracing::warn!(
                target: "table::clock",
                new_time,
                former_time,
                "clock.rejected=non_finite"
            );
            return Err(ClockError::NonFinite {
                new_time,
                former_time,
            });
        }
        if new_time < former_time {
            if self.fatal_regressions {
                panic!("clock regression: tick to {new_time} from {former_time}");
            }
            tracing::warn!(
                target: "table::clock",
                new_time,
                former_time,
                "clock.rejected=regression"
            );
            return Err(ClockError::Regression {
                new_time,
                former_time,
            });
        }

        self.state = ClockState {
            warped_time: new_time,
            former_time,
            speed: speed.unwrap_or(self.state.speed),
        };
        tracing::trace!(
            target: "table::clock",
            warped_time = new_time,
            former_time,
            speed = self.state.speed,
            "clock.tick"
        );
        Ok(self.state)
    }

    /// Jumps to `time` without regression checks. The previous time becomes
    /// `former_time`.
    pub fn seek(&mut self, time: LogicalTime) -> ClockState {
        self.state.former_time = self.state.warped_time;
        self.state.warped_time = time;
        tracing::debug!(
            target: "table::clock",
            warped_time = time,
            former_time = self.state.former_time,
            "clock.seek"
        );
        self.state
    }

    /// Back to time zero for a replay from the beginning.
    pub fn reset(&mut self) -> ClockState {
        self.state = ClockState {
            speed: self.state.speed,
            ..ClockState::default()
        };
        self.state
    }

    /// True when the last tick moved time across `threshold`.
    pub fn crossed(&self, threshold: LogicalTime) -> bool {
        self.state.former_time < threshold && threshold <= self.state.warped_time
    }
}
