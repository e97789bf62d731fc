//! Test layers for validating the runtime facade.
//!
//! This module provides recording doubles for the three layers:
//! - `RecordingImplementation`, `RecordingScheduler`, `RecordingAbstraction`
//! - `CallLog`: shared, ordered record of every layer call, with failure injection
//!
//! A failing call is still recorded, so tests can assert both that the failing
//! call happened and that nothing after it did.

use crate::error::{Layer, LayerFault, Operation, Result, Status};
use crate::runtime::{GpuRuntime, RuntimeConfig};
use crate::traits::{AbstractionLayer, ImplementationLayer, SchedulerLayer};
use hashbrown::HashSet;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// One observed layer call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerCall {
    /// Layer that was called.
    pub layer: Layer,
    /// Operation invoked.
    pub operation: Operation,
}

impl LayerCall {
    /// Create a call record.
    #[must_use]
    pub const fn new(layer: Layer, operation: Operation) -> Self {
        Self { layer, operation }
    }
}

impl fmt::Display for LayerCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.layer, self.operation)
    }
}

#[derive(Debug, Default)]
struct CallLogInner {
    calls: Vec<LayerCall>,
    failures: HashSet<LayerCall>,
}

/// Shared call log for the recording layers.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    inner: Arc<Mutex<CallLogInner>>,
}

impl CallLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All calls observed so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<LayerCall> {
        self.inner.lock().calls.clone()
    }

    /// Calls of a single operation, in order.
    #[must_use]
    pub fn calls_for(&self, operation: Operation) -> Vec<LayerCall> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .copied()
            .collect()
    }

    /// Number of times a layer operation was invoked.
    #[must_use]
    pub fn count(&self, layer: Layer, operation: Operation) -> usize {
        let call = LayerCall::new(layer, operation);
        self.inner.lock().calls.iter().filter(|c| **c == call).count()
    }

    /// Make every future call of `layer.operation` fail.
    pub fn fail_on(&self, layer: Layer, operation: Operation) {
        self.inner
            .lock()
            .failures
            .insert(LayerCall::new(layer, operation));
    }

    /// Remove an injected failure.
    pub fn clear_failure(&self, layer: Layer, operation: Operation) {
        self.inner
            .lock()
            .failures
            .remove(&LayerCall::new(layer, operation));
    }

    fn record(&self, layer: Layer, operation: Operation) -> Status {
        let call = LayerCall::new(layer, operation);
        let mut inner = self.inner.lock();
        inner.calls.push(call);
        if inner.failures.contains(&call) {
            return Err(LayerFault::new(format!("injected {} failure", call)));
        }
        Ok(())
    }

    /// Recording Implementation layer bound to this log.
    #[must_use]
    pub fn implementation(&self) -> RecordingImplementation {
        RecordingImplementation { log: self.clone() }
    }

    /// Recording Scheduler layer bound to this log.
    #[must_use]
    pub fn scheduler(&self) -> RecordingScheduler {
        RecordingScheduler { log: self.clone() }
    }

    /// Recording Abstraction layer bound to this log.
    #[must_use]
    pub fn abstraction(&self) -> RecordingAbstraction {
        RecordingAbstraction { log: self.clone() }
    }

    /// Build a runtime whose three layers all record into this log.
    pub fn runtime(&self, config: RuntimeConfig) -> Result<GpuRuntime> {
        GpuRuntime::builder()
            .with_config(config)
            .implementation(self.implementation())
            .scheduler(self.scheduler())
            .abstraction(self.abstraction())
            .build()
    }
}

/// Implementation layer that only records its calls.
#[derive(Debug, Clone)]
pub struct RecordingImplementation {
    log: CallLog,
}

impl ImplementationLayer for RecordingImplementation {
    fn name(&self) -> &str {
        "recording-implementation"
    }

    fn init(&mut self) -> Status {
        self.log.record(Layer::Implementation, Operation::Init)
    }

    fn start(&mut self) -> Status {
        self.log.record(Layer::Implementation, Operation::Start)
    }

    fn stop(&mut self) -> Status {
        self.log.record(Layer::Implementation, Operation::Stop)
    }

    fn destroy(&mut self) -> Status {
        self.log.record(Layer::Implementation, Operation::Destroy)
    }
}

/// Scheduler layer that only records its calls.
#[derive(Debug, Clone)]
pub struct RecordingScheduler {
    log: CallLog,
}

impl SchedulerLayer for RecordingScheduler {
    fn name(&self) -> &str {
        "recording-scheduler"
    }

    fn init(&mut self) -> Status {
        self.log.record(Layer::Scheduler, Operation::Init)
    }

    fn destroy(&mut self) -> Status {
        self.log.record(Layer::Scheduler, Operation::Destroy)
    }

    fn schedule(&mut self) -> Status {
        self.log.record(Layer::Scheduler, Operation::Schedule)
    }
}

/// Abstraction layer that only records its calls.
#[derive(Debug, Clone)]
pub struct RecordingAbstraction {
    log: CallLog,
}

impl AbstractionLayer for RecordingAbstraction {
    fn name(&self) -> &str {
        "recording-abstraction"
    }

    fn init(&mut self) -> Status {
        self.log.record(Layer::Abstraction, Operation::Init)
    }

    fn destroy(&mut self) -> Status {
        self.log.record(Layer::Abstraction, Operation::Destroy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injected_failure_is_recorded() {
        let log = CallLog::new();
        log.fail_on(Layer::Scheduler, Operation::Init);

        let mut scheduler = log.scheduler();
        let fault = scheduler.init().unwrap_err();
        assert_eq!(fault.message(), "injected scheduler.init failure");
        assert_eq!(log.count(Layer::Scheduler, Operation::Init), 1);

        log.clear_failure(Layer::Scheduler, Operation::Init);
        assert!(scheduler.init().is_ok());
    }

    #[test]
    fn test_calls_for_filters_by_operation() {
        let log = CallLog::new();
        let mut implementation = log.implementation();
        let mut abstraction = log.abstraction();

        implementation.init().unwrap();
        implementation.start().unwrap();
        abstraction.init().unwrap();

        assert_eq!(
            log.calls_for(Operation::Init),
            vec![
                LayerCall::new(Layer::Implementation, Operation::Init),
                LayerCall::new(Layer::Abstraction, Operation::Init),
            ]
        );
    }
}
