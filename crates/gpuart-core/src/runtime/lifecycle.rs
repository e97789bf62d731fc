//! Runtime Lifecycle Management
//!
//! Manages the lifecycle of the GPUart runtime including:
//! - Phase state machine transitions
//! - Ordered, checked layer calls with short-circuit on failure
//! - Scheduling trigger forwarding
//! - Event callbacks and statistics

use super::config::{ConfigError, RuntimeConfig};
use super::{Phase, RuntimeEvent, RuntimeEventCallback, RuntimeStats};
use crate::error::{GpuartError, Layer, LayerFault, Operation, Result, Status};
use crate::traits::{AbstractionLayer, ImplementationLayer, SchedulerLayer};
use std::time::Instant;
use tracing::{debug, error, info, warn};

const INIT_SEQUENCE: &[Layer] = &[Layer::Implementation, Layer::Scheduler, Layer::Abstraction];
const START_SEQUENCE: &[Layer] = &[Layer::Implementation];
const STOP_SEQUENCE: &[Layer] = &[Layer::Implementation];
const DESTROY_SEQUENCE: &[Layer] = &[Layer::Implementation, Layer::Scheduler, Layer::Abstraction];
const SCHEDULE_SEQUENCE: &[Layer] = &[Layer::Scheduler];

struct LayerSet {
    implementation: Box<dyn ImplementationLayer>,
    scheduler: Box<dyn SchedulerLayer>,
    abstraction: Box<dyn AbstractionLayer>,
}

impl LayerSet {
    fn name(&self, layer: Layer) -> &str {
        match layer {
            Layer::Implementation => self.implementation.name(),
            Layer::Scheduler => self.scheduler.name(),
            Layer::Abstraction => self.abstraction.name(),
        }
    }

    fn invoke(&mut self, layer: Layer, operation: Operation) -> Status {
        match (layer, operation) {
            (Layer::Implementation, Operation::Init) => self.implementation.init(),
            (Layer::Implementation, Operation::Start) => self.implementation.start(),
            (Layer::Implementation, Operation::Stop) => self.implementation.stop(),
            (Layer::Implementation, Operation::Destroy) => self.implementation.destroy(),
            (Layer::Scheduler, Operation::Init) => self.scheduler.init(),
            (Layer::Scheduler, Operation::Destroy) => self.scheduler.destroy(),
            (Layer::Scheduler, Operation::Schedule) => self.scheduler.schedule(),
            (Layer::Abstraction, Operation::Init) => self.abstraction.init(),
            (Layer::Abstraction, Operation::Destroy) => self.abstraction.destroy(),
            (layer, operation) => Err(LayerFault::new(format!(
                "{} layer has no {} operation",
                layer, operation
            ))),
        }
    }
}

#[derive(Default)]
struct EventHooks {
    callbacks: Vec<RuntimeEventCallback>,
}

impl EventHooks {
    fn emit(&self, event: RuntimeEvent) {
        for callback in &self.callbacks {
            callback(&event);
        }
    }
}

/// Invoke one layer operation and check its status.
///
/// Every layer call made by the runtime goes through here.
fn checked(
    layers: &mut LayerSet,
    hooks: &EventHooks,
    layer: Layer,
    operation: Operation,
) -> Result<()> {
    debug!(layer = %layer, layer_name = layers.name(layer), operation = %operation, "layer call");

    match layers.invoke(layer, operation) {
        Ok(()) => {
            hooks.emit(RuntimeEvent::LayerCalled { layer, operation });
            Ok(())
        }
        Err(fault) => {
            error!(
                layer = %layer,
                layer_name = layers.name(layer),
                operation = %operation,
                "layer call failed: {}",
                fault
            );
            hooks.emit(RuntimeEvent::LayerFailed {
                layer,
                operation,
                message: fault.message().to_string(),
            });
            Err(GpuartError::layer_failed(layer, operation, fault))
        }
    }
}

/// The GPUart runtime facade
///
/// Owns the lifecycle phase and the three layers, and sequences every layer
/// call. All operations run to completion on the calling thread.
pub struct GpuRuntime {
    config: RuntimeConfig,
    phase: Phase,
    layers: LayerSet,
    hooks: EventHooks,
    stats: RuntimeStats,
    running_since: Option<Instant>,
}

impl GpuRuntime {
    /// Create a new runtime with the given configuration and layers
    pub fn new(
        config: RuntimeConfig,
        implementation: Box<dyn ImplementationLayer>,
        scheduler: Box<dyn SchedulerLayer>,
        abstraction: Box<dyn AbstractionLayer>,
    ) -> Self {
        Self {
            config,
            phase: Phase::Uninitialized,
            layers: LayerSet {
                implementation,
                scheduler,
                abstraction,
            },
            hooks: EventHooks::default(),
            stats: RuntimeStats::default(),
            running_since: None,
        }
    }

    /// Create a runtime builder
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    /// Get the current configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Get current lifecycle phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Check if scheduling triggers are currently accepted
    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    /// Add an event callback
    pub fn on_event(&mut self, callback: RuntimeEventCallback) {
        self.hooks.callbacks.push(callback);
    }

    /// Get runtime statistics
    pub fn stats(&self) -> RuntimeStats {
        let mut stats = self.stats.clone();
        if let (Phase::Running, Some(since)) = (self.phase, self.running_since) {
            stats.running_time += since.elapsed();
        }
        stats
    }

    /// Bring all layers up: Implementation, Scheduler, then Abstraction.
    pub fn init(&mut self) -> Result<()> {
        self.require(Operation::Init, &[Phase::Uninitialized])?;
        info!("Initializing GPUart layers");
        self.transition(Operation::Init, INIT_SEQUENCE, Phase::Initialized)
    }

    /// Activate kernel execution by starting the persistent execution thread.
    ///
    /// Valid after `init`, or after `stop` when `allow_restart` is set.
    pub fn start(&mut self) -> Result<()> {
        let restart = self.config.allow_restart && self.phase == Phase::Stopped;
        if !restart {
            self.require(Operation::Start, &[Phase::Initialized])?;
        }
        info!(restart, "Starting persistent execution");
        self.transition(Operation::Start, START_SEQUENCE, Phase::Running)?;

        self.stats.starts += 1;
        self.running_since = Some(Instant::now());
        Ok(())
    }

    /// Deactivate kernel execution by terminating the persistent execution thread.
    pub fn stop(&mut self) -> Result<()> {
        self.require(Operation::Stop, &[Phase::Running])?;
        info!("Stopping persistent execution");
        self.transition(Operation::Stop, STOP_SEQUENCE, Phase::Stopped)?;

        self.stats.stops += 1;
        if let Some(since) = self.running_since.take() {
            self.stats.running_time += since.elapsed();
        }
        Ok(())
    }

    /// Tear all layers down: Implementation, Scheduler, then Abstraction.
    pub fn destroy(&mut self) -> Result<()> {
        self.require(Operation::Destroy, &[Phase::Stopped, Phase::Initialized])?;
        info!("Destroying GPUart layers");
        self.transition(Operation::Destroy, DESTROY_SEQUENCE, Phase::Destroyed)
    }

    /// Trigger one scheduling decision in the Scheduler layer.
    ///
    /// Only accepted while running. A failed decision is reported but does
    /// not change the phase.
    pub fn schedule(&mut self) -> Result<()> {
        self.require(Operation::Schedule, &[Phase::Running])?;

        match self.run_sequence(Operation::Schedule, SCHEDULE_SEQUENCE) {
            Ok(()) => {
                self.stats.schedules_completed += 1;
                self.hooks.emit(RuntimeEvent::ScheduleCompleted {
                    sequence: self.stats.schedules_completed,
                });
                Ok(())
            }
            Err(err) => {
                self.stats.schedules_failed += 1;
                Err(err)
            }
        }
    }

    fn require(&self, operation: Operation, allowed: &[Phase]) -> Result<()> {
        if allowed.contains(&self.phase) {
            return Ok(());
        }
        if self.phase.is_terminal() {
            warn!(operation = %operation, phase = %self.phase, "Runtime is finished, call rejected");
        } else {
            warn!(operation = %operation, phase = %self.phase, "Rejected lifecycle transition");
        }
        self.hooks.emit(RuntimeEvent::TransitionRejected {
            operation,
            phase: self.phase,
        });
        Err(GpuartError::invalid_transition(operation, self.phase))
    }

    fn run_sequence(&mut self, operation: Operation, sequence: &[Layer]) -> Result<()> {
        sequence
            .iter()
            .try_for_each(|&layer| checked(&mut self.layers, &self.hooks, layer, operation))
    }

    fn transition(&mut self, operation: Operation, sequence: &[Layer], target: Phase) -> Result<()> {
        match self.run_sequence(operation, sequence) {
            Ok(()) => {
                self.set_phase(target);
                Ok(())
            }
            Err(err) => {
                self.set_phase(Phase::Failed);
                Err(err)
            }
        }
    }

    fn set_phase(&mut self, to: Phase) {
        let from = std::mem::replace(&mut self.phase, to);
        if to == Phase::Failed {
            error!(from = %from, "Runtime entered failed phase");
        } else {
            info!(from = %from, to = %to, "Runtime phase changed");
        }
        self.hooks.emit(RuntimeEvent::PhaseChanged { from, to });
    }
}

impl Drop for GpuRuntime {
    fn drop(&mut self) {
        if self.phase != Phase::Uninitialized && !self.phase.is_terminal() {
            warn!(phase = %self.phase, "GPUart runtime dropped without destroy");
        }
    }
}

impl std::fmt::Debug for GpuRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuRuntime")
            .field("config", &self.config)
            .field("phase", &self.phase)
            .field("implementation", &self.layers.implementation.name())
            .field("scheduler", &self.layers.scheduler.name())
            .field("abstraction", &self.layers.abstraction.name())
            .finish()
    }
}

/// Builder for GpuRuntime
#[derive(Default)]
pub struct RuntimeBuilder {
    config: Option<RuntimeConfig>,
    implementation: Option<Box<dyn ImplementationLayer>>,
    scheduler: Option<Box<dyn SchedulerLayer>>,
    abstraction: Option<Box<dyn AbstractionLayer>>,
    event_callbacks: Vec<RuntimeEventCallback>,
}

impl RuntimeBuilder {
    /// Use development configuration
    pub fn development(mut self) -> Self {
        self.config = Some(RuntimeConfig::development());
        self
    }

    /// Use production configuration
    pub fn production(mut self) -> Self {
        self.config = Some(RuntimeConfig::production());
        self
    }

    /// Use testing configuration
    pub fn testing(mut self) -> Self {
        self.config = Some(RuntimeConfig::testing());
        self
    }

    /// Use custom configuration
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load configuration from environment
    pub fn from_env(mut self) -> Self {
        self.config = Some(RuntimeConfig::from_env());
        self
    }

    /// Load configuration from file
    pub fn from_file(mut self, path: &std::path::Path) -> Result<Self> {
        self.config = Some(RuntimeConfig::from_file(path)?);
        Ok(self)
    }

    /// Set the Implementation layer
    pub fn implementation(mut self, layer: impl ImplementationLayer + 'static) -> Self {
        self.implementation = Some(Box::new(layer));
        self
    }

    /// Set the Scheduler layer
    pub fn scheduler(mut self, layer: impl SchedulerLayer + 'static) -> Self {
        self.scheduler = Some(Box::new(layer));
        self
    }

    /// Set the Abstraction layer
    pub fn abstraction(mut self, layer: impl AbstractionLayer + 'static) -> Self {
        self.abstraction = Some(Box::new(layer));
        self
    }

    /// Add event callback
    pub fn on_event(mut self, callback: RuntimeEventCallback) -> Self {
        self.event_callbacks.push(callback);
        self
    }

    /// Build the runtime
    pub fn build(self) -> Result<GpuRuntime> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let implementation = self
            .implementation
            .ok_or_else(|| ConfigError::MissingField("implementation layer".to_string()))?;
        let scheduler = self
            .scheduler
            .ok_or_else(|| ConfigError::MissingField("scheduler layer".to_string()))?;
        let abstraction = self
            .abstraction
            .ok_or_else(|| ConfigError::MissingField("abstraction layer".to_string()))?;

        let mut runtime = GpuRuntime::new(config, implementation, scheduler, abstraction);
        runtime.hooks.callbacks = self.event_callbacks;

        Ok(runtime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_layers::CallLog;
    use std::sync::{Arc, Mutex};

    fn runtime(log: &CallLog) -> GpuRuntime {
        log.runtime(RuntimeConfig::testing()).unwrap()
    }

    #[test]
    fn test_runtime_lifecycle() {
        let log = CallLog::new();
        let mut runtime = runtime(&log);
        assert_eq!(runtime.phase(), Phase::Uninitialized);

        runtime.init().unwrap();
        assert_eq!(runtime.phase(), Phase::Initialized);
        runtime.start().unwrap();
        assert!(runtime.is_running());
        runtime.stop().unwrap();
        assert_eq!(runtime.phase(), Phase::Stopped);
        runtime.destroy().unwrap();
        assert_eq!(runtime.phase(), Phase::Destroyed);
    }

    #[test]
    fn test_destroy_from_initialized() {
        let log = CallLog::new();
        let mut runtime = runtime(&log);

        runtime.init().unwrap();
        runtime.destroy().unwrap();
        assert_eq!(runtime.phase(), Phase::Destroyed);
        assert_eq!(log.count(Layer::Implementation, Operation::Start), 0);
    }

    #[test]
    fn test_restart_follows_config() {
        let log = CallLog::new();
        let mut runtime = runtime(&log);
        runtime.init().unwrap();
        runtime.start().unwrap();
        runtime.stop().unwrap();
        runtime.start().unwrap();
        assert_eq!(runtime.stats().starts, 2);

        let log = CallLog::new();
        let config = RuntimeConfig {
            allow_restart: false,
            ..RuntimeConfig::testing()
        };
        let mut runtime = log.runtime(config).unwrap();
        runtime.init().unwrap();
        runtime.start().unwrap();
        runtime.stop().unwrap();
        let err = runtime.start().unwrap_err();
        assert!(err.is_invalid_transition());
        assert_eq!(runtime.phase(), Phase::Stopped);
        assert_eq!(log.count(Layer::Implementation, Operation::Start), 1);
    }

    #[test]
    fn test_failed_phase_is_absorbing() {
        let log = CallLog::new();
        log.fail_on(Layer::Abstraction, Operation::Init);
        let mut runtime = runtime(&log);

        assert!(runtime.init().unwrap_err().is_layer_failure());
        assert_eq!(runtime.phase(), Phase::Failed);

        for result in [runtime.init(), runtime.start(), runtime.destroy(), runtime.schedule()] {
            assert!(result.unwrap_err().is_invalid_transition());
        }
        assert_eq!(log.calls().len(), 3);
    }

    #[test]
    fn test_schedule_failure_keeps_running() {
        let log = CallLog::new();
        let mut runtime = runtime(&log);
        runtime.init().unwrap();
        runtime.start().unwrap();

        log.fail_on(Layer::Scheduler, Operation::Schedule);
        let err = runtime.schedule().unwrap_err();
        assert_eq!(err.failed_call(), Some((Layer::Scheduler, Operation::Schedule)));
        assert!(runtime.is_running());

        log.clear_failure(Layer::Scheduler, Operation::Schedule);
        runtime.schedule().unwrap();

        let stats = runtime.stats();
        assert_eq!(stats.schedules_failed, 1);
        assert_eq!(stats.schedules_completed, 1);
    }

    #[test]
    fn test_event_callbacks() {
        let log = CallLog::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let mut runtime = runtime(&log);
        runtime.on_event(Arc::new(move |event: &RuntimeEvent| {
            sink.lock().unwrap().push(event.clone());
        }));

        runtime.init().unwrap();
        let _ = runtime.schedule();

        let events = events.lock().unwrap();
        assert_eq!(
            events.as_slice(),
            &[
                RuntimeEvent::LayerCalled {
                    layer: Layer::Implementation,
                    operation: Operation::Init
                },
                RuntimeEvent::LayerCalled {
                    layer: Layer::Scheduler,
                    operation: Operation::Init
                },
                RuntimeEvent::LayerCalled {
                    layer: Layer::Abstraction,
                    operation: Operation::Init
                },
                RuntimeEvent::PhaseChanged {
                    from: Phase::Uninitialized,
                    to: Phase::Initialized
                },
                RuntimeEvent::TransitionRejected {
                    operation: Operation::Schedule,
                    phase: Phase::Initialized
                },
            ]
        );
    }

    #[test]
    fn test_builder_requires_all_layers() {
        let log = CallLog::new();
        let err = GpuRuntime::builder()
            .testing()
            .implementation(log.implementation())
            .scheduler(log.scheduler())
            .build()
            .unwrap_err();
        assert!(matches!(err, GpuartError::ConfigError(msg) if msg.contains("abstraction")));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let log = CallLog::new();
        let config = RuntimeConfig {
            event_queue_length: 0,
            ..RuntimeConfig::testing()
        };
        assert!(log.runtime(config).is_err());
        assert!(log.calls().is_empty());
    }

    #[test]
    fn test_unsupported_layer_operation_is_a_fault() {
        let log = CallLog::new();
        let mut runtime = runtime(&log);
        let status = runtime.layers.invoke(Layer::Abstraction, Operation::Start);
        assert!(status.is_err());
        assert!(log.calls().is_empty());
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<(tracing::Level, String)>>>);

    struct MessageVisitor(String);

    impl tracing::field::Visit for MessageVisitor {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                self.0 = format!("{:?}", value);
            }
        }
    }

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for Captured {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let mut visitor = MessageVisitor(String::new());
            event.record(&mut visitor);
            self.0
                .lock()
                .unwrap()
                .push((*event.metadata().level(), visitor.0));
        }
    }

    fn count(captured: &Captured, level: tracing::Level, message: &str) -> usize {
        captured
            .0
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, m)| *l == level && m == message)
            .count()
    }

    #[test]
    fn test_layer_calls_and_rejections_are_logged() {
        use tracing_subscriber::layer::SubscriberExt;

        let captured = Captured::default();
        let subscriber = tracing_subscriber::registry().with(captured.clone());
        let log = CallLog::new();

        tracing::subscriber::with_default(subscriber, || {
            let mut runtime = runtime(&log);
            assert!(runtime.start().is_err());
            runtime.init().unwrap();
            runtime.destroy().unwrap();
            assert!(runtime.init().is_err());
        });

        assert_eq!(
            count(&captured, tracing::Level::DEBUG, "layer call"),
            log.calls().len()
        );
        assert_eq!(
            count(&captured, tracing::Level::WARN, "Rejected lifecycle transition"),
            1
        );
        assert_eq!(
            count(&captured, tracing::Level::WARN, "Runtime is finished, call rejected"),
            1
        );
    }
}
