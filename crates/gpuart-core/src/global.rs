//! Process-wide runtime.
//!
//! GPUart is a singleton runtime: an application installs exactly one
//! [`GpuRuntime`] per process and drives it through the free functions here.
//! Each call locks the installed runtime, so lifecycle transitions and
//! scheduling triggers from different threads are serialized.

use crate::error::{GpuartError, Result};
use crate::runtime::{GpuRuntime, Phase, RuntimeStats};
use parking_lot::Mutex;
use std::sync::OnceLock;

static RUNTIME: OnceLock<Mutex<GpuRuntime>> = OnceLock::new();

/// Install the process-wide runtime. Fails if one is already installed.
pub fn install(runtime: GpuRuntime) -> Result<()> {
    RUNTIME
        .set(Mutex::new(runtime))
        .map_err(|_| GpuartError::AlreadyInstalled)
}

/// Returns true once a runtime has been installed.
pub fn is_installed() -> bool {
    RUNTIME.get().is_some()
}

fn with_runtime<T>(f: impl FnOnce(&mut GpuRuntime) -> Result<T>) -> Result<T> {
    let runtime = RUNTIME.get().ok_or(GpuartError::NotInstalled)?;
    let mut guard = runtime.lock();
    f(&mut *guard)
}

/// Initialize all layers of the installed runtime.
pub fn init() -> Result<()> {
    with_runtime(GpuRuntime::init)
}

/// Enable kernel execution on the installed runtime.
pub fn start() -> Result<()> {
    with_runtime(GpuRuntime::start)
}

/// Disable kernel execution on the installed runtime.
pub fn stop() -> Result<()> {
    with_runtime(GpuRuntime::stop)
}

/// Destroy all layers of the installed runtime.
pub fn destroy() -> Result<()> {
    with_runtime(GpuRuntime::destroy)
}

/// Trigger one scheduling decision on the installed runtime.
pub fn schedule() -> Result<()> {
    with_runtime(GpuRuntime::schedule)
}

/// Current phase of the installed runtime.
pub fn phase() -> Result<Phase> {
    with_runtime(|runtime| Ok(runtime.phase()))
}

/// Statistics of the installed runtime.
pub fn stats() -> Result<RuntimeStats> {
    with_runtime(|runtime| Ok(runtime.stats()))
}
