//! Layer traits.
//!
//! The facade drives three independently lifecycled layers:
//! - `ImplementationLayer`: execution resource and persistent execution thread
//! - `SchedulerLayer`: scheduling state and the one-shot scheduling decision
//! - `AbstractionLayer`: hardware-independent task surface for applications
//!
//! Each layer owns its internal state exclusively. The facade only owns the
//! order in which these methods are called.

use crate::error::{Layer, Status};

/// Implementation layer: owns the execution resource and the persistent thread.
pub trait ImplementationLayer: Send {
    /// Human-readable layer name used in logs.
    fn name(&self) -> &str {
        Layer::Implementation.as_str()
    }

    /// Acquire the execution resource.
    fn init(&mut self) -> Status;

    /// Activate the persistent execution thread.
    ///
    /// Must not return `Ok` before the thread is fully active.
    fn start(&mut self) -> Status;

    /// Terminate the persistent execution thread.
    ///
    /// Must not return before the thread has fully stopped.
    fn stop(&mut self) -> Status;

    /// Release the execution resource.
    fn destroy(&mut self) -> Status;
}

/// Scheduler layer: owns scheduling state.
pub trait SchedulerLayer: Send {
    /// Human-readable layer name used in logs.
    fn name(&self) -> &str {
        Layer::Scheduler.as_str()
    }

    /// Create scheduling state.
    fn init(&mut self) -> Status;

    /// Release scheduling state.
    fn destroy(&mut self) -> Status;

    /// Compute and apply the next scheduling decision.
    fn schedule(&mut self) -> Status;
}

/// Abstraction layer: the application-facing task surface.
pub trait AbstractionLayer: Send {
    /// Human-readable layer name used in logs.
    fn name(&self) -> &str {
        Layer::Abstraction.as_str()
    }

    /// Expose the task surface.
    fn init(&mut self) -> Status;

    /// Withdraw the task surface.
    fn destroy(&mut self) -> Status;
}
