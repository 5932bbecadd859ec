//! Observability surface (spec.md §9 design notes: "move behind a
//! narrow interface... the core does not depend on any particular
//! filesystem or UI"). A caller building a `/sys`-style debug tree, a
//! CLI, or a remote diagnostics endpoint goes through here rather than
//! reaching into `Registry`/`RemoteProcessor` internals directly.
//!
//! Grounded in `device_manager`-style introspection in the teacher
//! (`process/process_manager.rs` exposing process listings without
//! exposing the scheduler's internal queues): a thin read-only wrapper
//! over the registry.

use crate::error::Result;
use crate::remoteproc::{Registry, State};

/// Snapshot of one remote processor's status, suitable for rendering
/// in a debug listing without handing out the underlying handle.
#[derive(Debug, Clone)]
pub struct ProcessorStatus {
    pub name: String,
    pub state: State,
    pub refcount: usize,
}

/// Read-only view over a `Registry` for diagnostics.
pub struct DebugView<'a> {
    registry: &'a Registry,
}

impl<'a> DebugView<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    pub fn processors(&self) -> Vec<ProcessorStatus> {
        // `Registry::names()` then `peek()` per name, rather than one
        // lock held across the whole snapshot: a processor vanishing
        // between the two calls (a concurrent `unregister`) just drops
        // out of the result instead of requiring special handling.
        self.registry
            .names()
            .into_iter()
            .filter_map(|name| self.registry.peek(&name))
            .map(|handle| ProcessorStatus {
                name: handle.name().to_string(),
                state: handle.state(),
                refcount: handle.refcount(),
            })
            .collect()
    }

    /// Dump a processor's trace buffer by name and slot index. Returns
    /// `Ok(None)` if the processor doesn't exist, has nothing in that
    /// slot, or the platform never wired up trace read-back.
    pub fn trace(&self, name: &str, slot: usize) -> Result<Option<Vec<u8>>> {
        match self.registry.peek(name) {
            Some(handle) => handle.read_trace(slot),
            None => Ok(None),
        }
    }
}
