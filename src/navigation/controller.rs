// src/navigation/controller.rs
// Velocity output for the explorer and the fixed-rate loop timer.

use std::time::{Duration, Instant};

use crate::MissionError;

/// Planar velocity command
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityCommand {
    /// Linear velocity (m/s)
    pub linear: f64,
    /// Angular velocity (rad/s)
    pub angular: f64,
}

impl VelocityCommand {
    /// Zero velocity
    pub fn stop() -> Self {
        VelocityCommand {
            linear: 0.0,
            angular: 0.0,
        }
    }

    /// Rotate in place at `angular` rad/s
    pub fn rotate(angular: f64) -> Self {
        VelocityCommand {
            linear: 0.0,
            angular,
        }
    }
}

/// Sink for velocity commands
#[cfg_attr(test, mockall::automock)]
pub trait VelocityPublisher {
    /// Publishes one command
    fn publish(&self, command: VelocityCommand) -> Result<(), MissionError>;
}

/// Keeps a loop at a fixed rate, like a ROS rate object.
pub struct LoopRate {
    period: Duration,
    next: Instant,
}

impl LoopRate {
    /// Rate of `hz` cycles per second, starting now
    pub fn new(hz: f64) -> Self {
        let period = Duration::from_secs_f64(1.0 / hz);
        LoopRate {
            period,
            next: Instant::now() + period,
        }
    }

    /// Cycle period
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Time left in the current cycle
    pub fn remaining(&self) -> Duration {
        self.next.saturating_duration_since(Instant::now())
    }

    /// Sleeps until the end of the current cycle. An overrun cycle restarts the
    /// schedule from now instead of trying to catch up.
    pub fn sleep(&mut self) {
        let remaining = self.remaining();
        if remaining.is_zero() {
            self.next = Instant::now() + self.period;
        } else {
            std::thread::sleep(remaining);
            self.next += self.period;
        }
    }
}
