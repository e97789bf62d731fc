//! Runtime Lifecycle Management
//!
//! This module provides the GPUart runtime facade, including:
//! - Runtime configuration
//! - The lifecycle phase state machine
//! - Checked, short-circuiting sequencing of layer calls
//! - Forwarding of scheduling triggers
//!
//! # Architecture
//!
//! - **Phases**: `Uninitialized` → `Initialized` → `Running` → `Stopped` → `Destroyed`,
//!   with `Failed` reachable from any transition whose layer call fails
//! - **Ordering**: `init` brings up Implementation, Scheduler, Abstraction in that
//!   order; `destroy` tears them down in the same order
//! - **Scheduling**: poll-driven; the caller owns the cadence of `schedule()`
//!
//! # Example
//!
//! ```rust,ignore
//! use gpuart_core::runtime::GpuRuntime;
//!
//! let mut runtime = GpuRuntime::builder()
//!     .production()
//!     .implementation(executor)
//!     .scheduler(scheduler)
//!     .abstraction(surface)
//!     .build()?;
//!
//! runtime.init()?;
//! runtime.start()?;
//! for _ in 0..ticks {
//!     runtime.schedule()?;
//! }
//! runtime.stop()?;
//! runtime.destroy()?;
//! ```

pub mod config;
pub mod lifecycle;

pub use config::{ConfigError, RuntimeConfig, RuntimeConfigBuilder};
pub use lifecycle::{GpuRuntime, RuntimeBuilder};

use crate::error::{Layer, Operation};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Lifecycle phase of a runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// No layer has been initialized
    Uninitialized,
    /// All layers are initialized, the persistent thread is inactive
    Initialized,
    /// The persistent thread is active; scheduling triggers are accepted
    Running,
    /// The persistent thread has been terminated
    Stopped,
    /// All layers have been torn down (terminal)
    Destroyed,
    /// A layer call failed during a transition (absorbing)
    Failed,
}

impl Phase {
    /// Returns true if no further operation is accepted.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Phase::Destroyed | Phase::Failed)
    }

    /// Returns the phase name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "Uninitialized",
            Self::Initialized => "Initialized",
            Self::Running => "Running",
            Self::Stopped => "Stopped",
            Self::Destroyed => "Destroyed",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime presets for common deployment scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimePreset {
    /// Development mode - restartable, verbose logging
    Development,
    /// Production mode - single session, structured logging
    Production,
    /// Testing mode - short timeouts, small queues
    Testing,
}

impl RuntimePreset {
    /// Convert preset to configuration
    pub fn to_config(&self) -> RuntimeConfig {
        match self {
            Self::Development => RuntimeConfig::development(),
            Self::Production => RuntimeConfig::production(),
            Self::Testing => RuntimeConfig::testing(),
        }
    }
}

impl std::str::FromStr for RuntimePreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "testing" | "test" => Ok(Self::Testing),
            _ => Err(format!("Unknown runtime preset: {}", s)),
        }
    }
}

/// Runtime statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    /// Scheduling decisions forwarded successfully
    pub schedules_completed: u64,
    /// Scheduling decisions the scheduler layer reported as failed
    pub schedules_failed: u64,
    /// Successful `start` transitions
    pub starts: u64,
    /// Successful `stop` transitions
    pub stops: u64,
    /// Accumulated time spent in the `[start, stop)` window
    pub running_time: Duration,
}

/// Runtime event types for lifecycle hooks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    /// The phase changed
    PhaseChanged {
        /// Previous phase
        from: Phase,
        /// New phase
        to: Phase,
    },
    /// A layer call returned success
    LayerCalled {
        /// Layer that was called
        layer: Layer,
        /// Operation performed
        operation: Operation,
    },
    /// A layer call failed
    LayerFailed {
        /// Layer that failed
        layer: Layer,
        /// Operation performed
        operation: Operation,
        /// Fault message
        message: String,
    },
    /// An operation was rejected by its phase precondition
    TransitionRejected {
        /// Rejected operation
        operation: Operation,
        /// Phase at the time of the call
        phase: Phase,
    },
    /// A scheduling decision was forwarded successfully
    ScheduleCompleted {
        /// Running count of completed decisions
        sequence: u64,
    },
}

/// Callback for runtime events
pub type RuntimeEventCallback = Arc<dyn Fn(&RuntimeEvent) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_preset_to_config() {
        let dev_config = RuntimePreset::Development.to_config();
        assert!(dev_config.allow_restart);

        let prod_config = RuntimePreset::Production.to_config();
        assert!(!prod_config.allow_restart);
    }

    #[test]
    fn test_runtime_preset_parse() {
        assert_eq!("prod".parse::<RuntimePreset>().unwrap(), RuntimePreset::Production);
        assert_eq!("Testing".parse::<RuntimePreset>().unwrap(), RuntimePreset::Testing);
        assert!("staging".parse::<RuntimePreset>().is_err());
    }

    #[test]
    fn test_terminal_phases() {
        assert!(Phase::Destroyed.is_terminal());
        assert!(Phase::Failed.is_terminal());
        assert!(!Phase::Stopped.is_terminal());
    }
}
