//! Error types for GPUart.

use crate::runtime::Phase;
use std::fmt;
use thiserror::Error;

/// Result type alias using `GpuartError`.
pub type Result<T> = std::result::Result<T, GpuartError>;

/// Outcome of a single layer call.
///
/// Layers report success or a [`LayerFault`]; the facade attaches the layer
/// identity and operation name when it propagates the fault.
pub type Status = std::result::Result<(), LayerFault>;

/// The three lifecycled layers below the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Owns the execution resource and the persistent execution thread.
    Implementation,
    /// Owns scheduling state and produces scheduling decisions.
    Scheduler,
    /// Application-facing, hardware-independent task surface.
    Abstraction,
}

impl Layer {
    /// Returns the layer name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Layer::Implementation => "implementation",
            Layer::Scheduler => "scheduler",
            Layer::Abstraction => "abstraction",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations exposed by the facade and forwarded to the layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Bring a layer up.
    Init,
    /// Activate the persistent execution thread.
    Start,
    /// Deactivate the persistent execution thread.
    Stop,
    /// Tear a layer down.
    Destroy,
    /// Produce one scheduling decision.
    Schedule,
}

impl Operation {
    /// Returns the operation name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Operation::Init => "init",
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::Destroy => "destroy",
            Operation::Schedule => "schedule",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct LayerFault {
    message: String,
}

impl LayerFault {
    /// Create a fault with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The fault message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors surfaced by the GPUart facade.
#[derive(Debug, Error)]
pub enum GpuartError {
    /// A layer call failed; the remaining calls of the operation were skipped.
    #[error("{layer} layer failed during {operation}: {source}")]
    LayerFailed {
        /// Layer whose call failed.
        layer: Layer,
        /// Operation being performed.
        operation: Operation,
        /// Fault reported by the layer.
        #[source]
        source: LayerFault,
    },

    /// Operation is not valid in the current phase.
    #[error("Invalid lifecycle transition: cannot {operation} while {phase}")]
    InvalidTransition {
        /// Rejected operation.
        operation: Operation,
        /// Phase at the time of the call.
        phase: Phase,
    },

    /// A runtime has already been installed for this process.
    #[error("GPUart runtime already installed for this process")]
    AlreadyInstalled,

    /// No runtime has been installed for this process.
    #[error("GPUart runtime not installed")]
    NotInstalled,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl GpuartError {
    /// Create a layer failure error.
    #[must_use]
    pub fn layer_failed(layer: Layer, operation: Operation, source: LayerFault) -> Self {
        GpuartError::LayerFailed {
            layer,
            operation,
            source,
        }
    }

    /// Create an invalid transition error.
    #[must_use]
    pub fn invalid_transition(operation: Operation, phase: Phase) -> Self {
        GpuartError::InvalidTransition { operation, phase }
    }

    /// Returns true if a layer call failed.
    #[must_use]
    pub fn is_layer_failure(&self) -> bool {
        matches!(self, GpuartError::LayerFailed { .. })
    }

    /// Returns true if the call was rejected by a phase precondition.
    #[must_use]
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, GpuartError::InvalidTransition { .. })
    }

    /// Layer and operation of a layer failure, if this is one.
    #[must_use]
    pub fn failed_call(&self) -> Option<(Layer, Operation)> {
        match self {
            GpuartError::LayerFailed {
                layer, operation, ..
            } => Some((*layer, *operation)),
            _ => None,
        }
    }
}

impl From<crate::runtime::config::ConfigError> for GpuartError {
    fn from(err: crate::runtime::config::ConfigError) -> Self {
        GpuartError::ConfigError(err.to_string())
    }
}
