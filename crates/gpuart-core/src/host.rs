//! Host reference layers.
//!
//! CPU stand-ins for the three layers, used to drive the runtime end to end
//! without a device:
//! - `PersistentExecutor`: Implementation layer with a persistent worker thread
//!   polling a bounded event queue
//! - `PollingScheduler`: Scheduler layer posting one decision event per trigger
//! - `HostAbstraction`: Abstraction layer tracking whether the surface is exposed
//!
//! The persistent thread is owned by `PersistentExecutor` alone. Other layers
//! reach it only through an [`EventPort`].

use crate::error::{LayerFault, Result, Status};
use crate::runtime::{GpuRuntime, RuntimeConfig};
use crate::traits::{AbstractionLayer, ImplementationLayer, SchedulerLayer};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, trace};

/// Events consumed by the persistent thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExecutorEvent {
    /// Apply the scheduling decision with this sequence number.
    Decision(u64),
    /// Leave the event loop.
    Terminate,
}

/// Sending side of the persistent thread's event queue.
///
/// Empty while the thread is inactive.
#[derive(Debug, Clone, Default)]
pub struct EventPort {
    sender: Arc<Mutex<Option<SyncSender<ExecutorEvent>>>>,
}

impl EventPort {
    /// Returns true if the persistent thread is accepting events.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.sender.lock().is_some()
    }

    fn post(&self, event: ExecutorEvent) -> Status {
        let guard = self.sender.lock();
        let sender = guard
            .as_ref()
            .ok_or_else(|| LayerFault::new("persistent thread is not active"))?;

        sender.try_send(event).map_err(|err| match err {
            TrySendError::Full(_) => LayerFault::new("persistent thread event queue is full"),
            TrySendError::Disconnected(_) => LayerFault::new("persistent thread has exited"),
        })
    }

    fn open(&self, sender: SyncSender<ExecutorEvent>) {
        *self.sender.lock() = Some(sender);
    }

    fn close(&self) -> Option<SyncSender<ExecutorEvent>> {
        self.sender.lock().take()
    }
}

/// Read-only view of the executor's progress.
#[derive(Debug, Clone, Default)]
pub struct ExecutorProbe {
    executed: Arc<AtomicU64>,
}

impl ExecutorProbe {
    /// Scheduling decisions applied by the persistent thread.
    #[must_use]
    pub fn decisions_executed(&self) -> u64 {
        self.executed.load(Ordering::Acquire)
    }
}

fn persistent_loop(events: Receiver<ExecutorEvent>, ready: Sender<()>, executed: Arc<AtomicU64>) {
    if ready.send(()).is_err() {
        return;
    }
    drop(ready);
    debug!("Persistent thread active");

    for event in events.iter() {
        match event {
            ExecutorEvent::Decision(sequence) => {
                trace!(sequence, "Applying scheduling decision");
                executed.fetch_add(1, Ordering::AcqRel);
            }
            ExecutorEvent::Terminate => break,
        }
    }

    debug!("Persistent thread terminated");
}

/// Wait for the persistent thread's ready acknowledgement.
fn await_ready(ready: &Receiver<()>, timeout: Duration) -> Status {
    ready.recv_timeout(timeout).map_err(|e| match e {
        RecvTimeoutError::Timeout => {
            LayerFault::new(format!("persistent thread not ready within {:?}", timeout))
        }
        RecvTimeoutError::Disconnected => {
            LayerFault::new("persistent thread exited before signalling ready")
        }
    })
}

/// Implementation layer backed by a persistent host thread.
#[derive(Debug)]
pub struct PersistentExecutor {
    worker_name: String,
    queue_length: usize,
    start_timeout: Duration,
    port: EventPort,
    probe: ExecutorProbe,
    worker: Option<JoinHandle<()>>,
    initialized: bool,
}

impl PersistentExecutor {
    /// Create an executor from the runtime configuration.
    #[must_use]
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            worker_name: config.worker_name.clone(),
            queue_length: config.event_queue_length,
            start_timeout: config.start_timeout,
            port: EventPort::default(),
            probe: ExecutorProbe::default(),
            worker: None,
            initialized: false,
        }
    }

    /// Port through which other layers post events to the persistent thread.
    #[must_use]
    pub fn port(&self) -> EventPort {
        self.port.clone()
    }

    /// Progress probe for the persistent thread.
    #[must_use]
    pub fn probe(&self) -> ExecutorProbe {
        self.probe.clone()
    }

    /// Returns true while the persistent thread is alive.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.worker.is_some()
    }
}

impl ImplementationLayer for PersistentExecutor {
    fn name(&self) -> &str {
        "host-persistent-executor"
    }

    fn init(&mut self) -> Status {
        if self.initialized {
            return Err(LayerFault::new("executor already initialized"));
        }
        self.probe.executed.store(0, Ordering::Release);
        self.initialized = true;
        debug!(queue_length = self.queue_length, "Executor initialized");
        Ok(())
    }

    fn start(&mut self) -> Status {
        if !self.initialized {
            return Err(LayerFault::new("executor not initialized"));
        }
        if self.worker.is_some() {
            return Err(LayerFault::new("persistent thread already active"));
        }

        let (events_tx, events_rx) = mpsc::sync_channel(self.queue_length);
        let (ready_tx, ready_rx) = mpsc::channel();
        let executed = self.probe.executed.clone();

        let handle = thread::Builder::new()
            .name(self.worker_name.clone())
            .spawn(move || persistent_loop(events_rx, ready_tx, executed))
            .map_err(|e| LayerFault::new(format!("failed to spawn persistent thread: {}", e)))?;

        if let Err(fault) = await_ready(&ready_rx, self.start_timeout) {
            drop(events_tx);
            return match handle.join() {
                Ok(()) => Err(fault),
                Err(_) => Err(LayerFault::new(format!(
                    "{} (persistent thread panicked during startup)",
                    fault
                ))),
            };
        }

        self.port.open(events_tx);
        self.worker = Some(handle);
        info!(worker = %self.worker_name, "Persistent thread started");
        Ok(())
    }

    fn stop(&mut self) -> Status {
        let handle = self
            .worker
            .take()
            .ok_or_else(|| LayerFault::new("persistent thread is not active"))?;

        // Pending decisions ahead of Terminate are still applied.
        if let Some(sender) = self.port.close() {
            if sender.send(ExecutorEvent::Terminate).is_err() {
                debug!("Persistent thread exited before terminate event");
            }
        }

        handle
            .join()
            .map_err(|_| LayerFault::new("persistent thread panicked"))?;
        info!(worker = %self.worker_name, "Persistent thread stopped");
        Ok(())
    }

    fn destroy(&mut self) -> Status {
        if self.worker.is_some() {
            return Err(LayerFault::new("persistent thread still active"));
        }
        if !self.initialized {
            return Err(LayerFault::new("executor not initialized"));
        }
        self.initialized = false;
        debug!("Executor destroyed");
        Ok(())
    }
}

/// Scheduler layer that forwards one decision per trigger.
#[derive(Debug)]
pub struct PollingScheduler {
    port: EventPort,
    next_decision: Option<u64>,
}

impl PollingScheduler {
    /// Create a scheduler posting to the given executor port.
    #[must_use]
    pub fn new(port: EventPort) -> Self {
        Self {
            port,
            next_decision: None,
        }
    }

    /// Number of decisions posted since `init`.
    #[must_use]
    pub fn decisions_posted(&self) -> u64 {
        self.next_decision.unwrap_or(0)
    }
}

impl SchedulerLayer for PollingScheduler {
    fn name(&self) -> &str {
        "host-polling-scheduler"
    }

    fn init(&mut self) -> Status {
        if self.next_decision.is_some() {
            return Err(LayerFault::new("scheduling state already exists"));
        }
        self.next_decision = Some(0);
        Ok(())
    }

    fn destroy(&mut self) -> Status {
        self.next_decision
            .take()
            .map(|_| ())
            .ok_or_else(|| LayerFault::new("scheduling state does not exist"))
    }

    fn schedule(&mut self) -> Status {
        let next = self
            .next_decision
            .as_mut()
            .ok_or_else(|| LayerFault::new("scheduling state does not exist"))?;
        self.port.post(ExecutorEvent::Decision(*next))?;
        *next += 1;
        Ok(())
    }
}

/// Abstraction layer tracking whether the application surface is exposed.
#[derive(Debug, Default)]
pub struct HostAbstraction {
    exposed: bool,
}

impl HostAbstraction {
    /// Returns true between `init` and `destroy`.
    #[must_use]
    pub fn is_exposed(&self) -> bool {
        self.exposed
    }
}

impl AbstractionLayer for HostAbstraction {
    fn name(&self) -> &str {
        "host-abstraction"
    }

    fn init(&mut self) -> Status {
        if self.exposed {
            return Err(LayerFault::new("task surface already exposed"));
        }
        self.exposed = true;
        Ok(())
    }

    fn destroy(&mut self) -> Status {
        if !self.exposed {
            return Err(LayerFault::new("task surface not exposed"));
        }
        self.exposed = false;
        Ok(())
    }
}

/// Build a runtime wired to the host reference layers.
pub fn host_runtime(config: RuntimeConfig) -> Result<(GpuRuntime, ExecutorProbe)> {
    let executor = PersistentExecutor::new(&config);
    let probe = executor.probe();
    let scheduler = PollingScheduler::new(executor.port());

    let runtime = GpuRuntime::builder()
        .with_config(config)
        .implementation(executor)
        .scheduler(scheduler)
        .abstraction(HostAbstraction::default())
        .build()?;

    Ok((runtime, probe))
}
