//! Platform operations interface (spec.md §4.E).
//!
//! Grounded in `os/kernel/src/device/mlx4/cmd.rs`'s `CommandInterface` —
//! a typed boundary to a concrete piece of hardware that the rest of the
//! driver never assumes a specific revision of — and in the
//! re-architecture guidance of spec.md §9 ("Callback tables (`ops`
//! vtables): model as a typed capability record passed at registration;
//! the core holds a reference but does not own it"). No concrete SoC
//! backend ships in this crate; a host integrator implements these
//! traits against real clocks, reset lines, and an IOMMU.

use std::sync::Arc;

use crate::error::Result;

/// Per-SoC start/stop, as named by spec.md §4.E. `start` programs
/// clocks, reset lines, and the IOMMU from the processor's memory map
/// and releases the coprocessor at `boot_addr`; `stop` must be callable
/// repeatedly once the processor is OFFLINE without error.
pub trait PlatformOps: Send + Sync {
    fn start(&self, boot_addr: u64) -> Result<()>;
    fn stop(&self) -> Result<()>;
}

/// The "memory-write primitive" spec.md §4.B says the firmware parser
/// needs from the owning record: map `[pa, pa+data.len())` host-side
/// (page-aligned, offset preserved) and copy `data` in. Mapping and
/// unmapping are the platform's job (spec.md §1 out-of-scope list).
pub trait MemoryWriter: Send + Sync {
    fn write_memory(&self, pa: u64, data: &[u8]) -> Result<()>;
}

/// Read-back primitive for trace buffers (spec.md §9 observability
/// design notes: the core exposes trace data "behind a narrow
/// interface", independent of any filesystem or UI). Optional — a
/// platform with no trace support simply omits it from the bundle.
pub trait MemoryReader: Send + Sync {
    fn read_memory(&self, pa: u64, len: u32) -> Result<Vec<u8>>;
}

/// Asynchronous firmware retrieval. Actual file I/O is out of scope
/// (spec.md §1); this is the contractual interface the registry submits
/// load requests through. `on_done` is invoked exactly once.
pub trait FirmwareLoader: Send + Sync {
    fn submit(
        &self,
        firmware_path: &str,
        on_done: Box<dyn FnOnce(Result<Vec<u8>>) + Send>,
    ) -> Result<()>;
}

/// The bundle a platform shim hands to `register()`: everything D needs
/// to drive one remote processor, plus an opaque private value the
/// platform may stash state in (spec.md's "opaque platform private").
pub struct PlatformBundle {
    pub ops: Arc<dyn PlatformOps>,
    pub memory: Arc<dyn MemoryWriter>,
    pub loader: Arc<dyn FirmwareLoader>,
    pub reader: Option<Arc<dyn MemoryReader>>,
    pub private: Arc<dyn std::any::Any + Send + Sync>,
}
