//! Remote-processor registry (spec.md §4.D).
//!
//! Grounded in `process/process_manager.rs`: a `Vec<Arc<T>>` scanned
//! linearly under one lock, handing out `Arc::clone`d handles. spec.md
//! §9 warns against file-scope singletons for this kind of registry —
//! `Registry` is therefore an explicit, constructed object (construct it
//! once at boot, pass the handle down) rather than a `static`.

use std::sync::Arc;

use spin::Mutex;

use crate::error::{Result, RprocError};
use crate::remoteproc::platform::PlatformBundle;
use crate::remoteproc::processor::RemoteProcessor;
use crate::translate::MemoryMap;

/// Process-wide table of registered remote processors.
#[derive(Default)]
pub struct Registry {
    processors: Mutex<Vec<Arc<RemoteProcessor>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self { processors: Mutex::new(Vec::new()) }
    }

    /// Insert a new record in state OFFLINE with refcount 0. Fails
    /// `Exists` if `name` is already registered.
    pub fn register(
        &self,
        name: impl Into<String>,
        firmware_path: impl Into<String>,
        memory_map: MemoryMap,
        bundle: PlatformBundle,
    ) -> Result<Arc<RemoteProcessor>> {
        let name = name.into();
        let mut processors = self.processors.lock();
        if processors.iter().any(|p| p.name() == name) {
            return Err(RprocError::Exists);
        }
        let proc = RemoteProcessor::new(name, firmware_path.into(), memory_map, bundle);
        log::info!("registered remote processor {}", proc.name());
        processors.push(Arc::clone(&proc));
        Ok(proc)
    }

    /// Remove a record. The caller must ensure no activations are
    /// outstanding (spec.md §4.D: "Failure to do so is undefined;
    /// implementations should assert").
    pub fn unregister(&self, name: &str) -> Result<()> {
        let mut processors = self.processors.lock();
        let index = processors.iter().position(|p| p.name() == name).ok_or(RprocError::NotFound)?;
        assert_eq!(
            processors[index].refcount(),
            0,
            "unregister({name}) called with activations outstanding"
        );
        processors.swap_remove(index);
        log::info!("unregistered remote processor {name}");
        Ok(())
    }

    fn find(&self, name: &str) -> Option<Arc<RemoteProcessor>> {
        self.processors.lock().iter().find(|p| p.name() == name).cloned()
    }

    /// Look a processor up without activating it — for diagnostics
    /// (spec.md §9 observability design notes), where touching the
    /// refcount would be an unwanted side effect of just looking.
    pub fn peek(&self, name: &str) -> Option<Arc<RemoteProcessor>> {
        self.find(name)
    }

    /// spec.md §4.D `get()`: look up, then activate (refcount-driven).
    pub fn get(&self, name: &str) -> Result<Arc<RemoteProcessor>> {
        let proc = self.find(name).ok_or(RprocError::NotFound)?;
        proc.activate()?;
        Ok(proc)
    }

    /// spec.md §4.D `put()`.
    pub fn put(&self, handle: &Arc<RemoteProcessor>) {
        handle.release();
    }

    pub fn names(&self) -> Vec<String> {
        self.processors.lock().iter().map(|p| p.name().to_string()).collect()
    }
}
