//! # GPUart Core
//!
//! Lifecycle and scheduling-trigger facade for the GPUart real-time GPU runtime.
//!
//! This crate provides:
//! - Layer traits for the Implementation, Scheduler and Abstraction layers
//! - The `GpuRuntime` facade with its phase state machine
//! - Uniform, short-circuiting failure propagation for every layer call
//! - A process-wide installed runtime
//! - Host reference layers with a persistent worker thread
//! - Recording test layers

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod global;
pub mod host;
pub mod observability;
pub mod runtime;
pub mod test_layers;
pub mod traits;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{GpuartError, Layer, LayerFault, Operation, Result, Status};
    pub use crate::host::{
        host_runtime, ExecutorProbe, HostAbstraction, PersistentExecutor, PollingScheduler,
    };
    pub use crate::observability::{LogConfig, LogLevel};
    pub use crate::runtime::{
        GpuRuntime, Phase, RuntimeBuilder, RuntimeConfig, RuntimeEvent, RuntimeEventCallback,
        RuntimePreset, RuntimeStats,
    };
    pub use crate::traits::{AbstractionLayer, ImplementationLayer, SchedulerLayer};
}
