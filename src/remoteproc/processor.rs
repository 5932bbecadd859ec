//! Remote-processor record and lifecycle state machine (spec.md §4.D).
//!
//! The `Inner` struct grouping state + refcount + trace slots behind one
//! `spin::Mutex` mirrors `process/scheduler.rs`'s `ReadyState` (grouping
//! everything one critical section needs to touch behind a single
//! lock), and `Arc<RemoteProcessor>` as the public handle mirrors
//! `process_manager.rs` handing out `Arc<Process>`.

use std::sync::{Arc, Condvar, Mutex as StdMutex};

use spin::Mutex;

use crate::error::Result;
use crate::firmware::{self, FirmwareSink, ResourceEntry, TraceBuffer, TraceSlots};
use crate::remoteproc::platform::{FirmwareLoader, MemoryReader, MemoryWriter, PlatformBundle, PlatformOps};
use crate::translate::MemoryMap;

/// The lifecycle state machine named in spec.md §4.D. `Suspended` is
/// reserved for future power management (spec.md §9 open question):
/// the variant exists, nothing transitions into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Offline,
    Loading,
    Running,
    Suspended,
    Crashed,
}

struct Inner {
    state: State,
    refcount: usize,
    traces: TraceSlots,
}

/// A one-shot-per-load completion signal. `spin::Mutex` is right for the
/// short critical sections elsewhere in this module, but `put()` must
/// block cooperatively while a load is in flight (spec.md §4.D), so this
/// uses the blocking pair the standard library provides for exactly
/// that — there is no teacher precedent for an async-completion wait
/// (the teacher never does asynchronous I/O), so this is drawn from
/// ordinary Rust idiom rather than from the pack.
struct LoadSignal {
    done: StdMutex<bool>,
    condvar: Condvar,
}

impl LoadSignal {
    fn new() -> Self {
        Self { done: StdMutex::new(true), condvar: Condvar::new() }
    }

    fn arm(&self) {
        *self.done.lock().unwrap() = false;
    }

    fn signal(&self) {
        *self.done.lock().unwrap() = true;
        self.condvar.notify_all();
    }

    fn wait(&self) {
        let mut done = self.done.lock().unwrap();
        while !*done {
            done = self.condvar.wait(done).unwrap();
        }
    }
}

/// One registered remote processor. Identity (`name`), configuration
/// (firmware path, memory map, platform bundle) are immutable after
/// registration (spec.md §3); only `Inner` and the load signal change
/// over the processor's life.
pub struct RemoteProcessor {
    name: String,
    firmware_path: String,
    memory_map: MemoryMap,
    ops: Arc<dyn PlatformOps>,
    memory: Arc<dyn MemoryWriter>,
    loader: Arc<dyn FirmwareLoader>,
    reader: Option<Arc<dyn MemoryReader>>,
    #[allow(dead_code)] // platform-owned, the core never reads it itself
    private: Arc<dyn std::any::Any + Send + Sync>,
    inner: Mutex<Inner>,
    load_signal: LoadSignal,
}

impl RemoteProcessor {
    pub(crate) fn new(
        name: String,
        firmware_path: String,
        memory_map: MemoryMap,
        bundle: PlatformBundle,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            firmware_path,
            memory_map,
            ops: bundle.ops,
            memory: bundle.memory,
            loader: bundle.loader,
            reader: bundle.reader,
            private: bundle.private,
            inner: Mutex::new(Inner {
                state: State::Offline,
                refcount: 0,
                traces: TraceSlots::new(),
            }),
            load_signal: LoadSignal::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> State {
        self.inner.lock().state
    }

    pub fn refcount(&self) -> usize {
        self.inner.lock().refcount
    }

    pub fn trace_slot(&self, index: usize) -> Option<TraceBuffer> {
        self.inner.lock().traces.slot(index)
    }

    /// Read back a trace buffer's current contents, if the platform
    /// bundle supplied a `MemoryReader` and the slot is populated
    /// (spec.md §9 observability design notes).
    pub fn read_trace(&self, index: usize) -> Result<Option<Vec<u8>>> {
        let Some(slot) = self.trace_slot(index) else {
            return Ok(None);
        };
        let Some(reader) = &self.reader else {
            return Ok(None);
        };
        reader.read_memory(slot.pa, slot.len).map(Some)
    }

    /// spec.md §4.D `get()`, minus the registry lookup (that's
    /// `Registry::get`). Pre-increments the refcount; if this is the
    /// first activation, arms the signal and submits an asynchronous
    /// load. Rolls the refcount back and returns an error only if the
    /// *submission* itself fails synchronously — a failure discovered
    /// later, inside the callback, is handled by `on_firmware_loaded`.
    pub(crate) fn activate(self: &Arc<Self>) -> Result<()> {
        let mut inner = self.inner.lock();
        let prior = inner.refcount;
        inner.refcount += 1;
        if prior != 0 {
            log::debug!("{}: activation already in progress or complete (refcount {})", self.name, inner.refcount);
            return Ok(());
        }

        self.load_signal.arm();
        inner.state = State::Loading;
        drop(inner);

        log::info!("{}: loading firmware from {}", self.name, self.firmware_path);
        let this = Arc::clone(self);
        let submitted = self.loader.submit(
            &self.firmware_path,
            Box::new(move |bytes| this.on_firmware_loaded(bytes)),
        );

        if let Err(e) = submitted {
            log::error!("{}: firmware load submission failed: {e}", self.name);
            let mut inner = self.inner.lock();
            inner.refcount -= 1;
            inner.state = State::Offline;
            drop(inner);
            self.load_signal.signal();
            return Err(e);
        }
        Ok(())
    }

    /// spec.md §4.D `put()`.
    pub(crate) fn release(self: &Arc<Self>) {
        self.load_signal.wait();

        let mut inner = self.inner.lock();
        assert!(inner.refcount > 0, "{}: put() called more times than get()", self.name);
        inner.refcount -= 1;
        if inner.refcount > 0 {
            return;
        }

        let was_running = inner.state == State::Running;
        drop(inner); // do not hold the per-record mutex across stop() (spec.md §9)

        if was_running {
            if let Err(e) = self.ops.stop() {
                log::warn!("{}: stop() failed: {e}", self.name);
            }
        }

        let mut inner = self.inner.lock();
        inner.traces.clear();
        inner.state = State::Offline;
        log::info!("{}: offline", self.name);
    }

    /// Invoked by the firmware loader exactly once per load. On failure
    /// the state stays LOADING, not OFFLINE — spec.md §8 scenario E2 is
    /// explicit that a bad-magic image leaves the processor in LOADING
    /// until the caller `put()`s it, at which point `release()` (which
    /// unconditionally sets OFFLINE on a refcount drop to zero,
    /// regardless of prior state) takes it offline.
    fn on_firmware_loaded(self: Arc<Self>, bytes: Result<Vec<u8>>) {
        let image = match bytes {
            Ok(image) => image,
            Err(e) => {
                log::error!("{}: firmware load failed: {e}", self.name);
                self.load_signal.signal();
                return;
            }
        };

        let mut sink = LoadSink { memory: &*self.memory, traces: TraceSlots::new() };
        let parsed = firmware::load(&image, &self.memory_map, &mut sink);

        match parsed {
            Err(e) => {
                log::warn!("{}: firmware parse failed: {e}", self.name);
            }
            Ok(result) => match self.ops.start(result.boot_addr) {
                Ok(()) => {
                    let mut inner = self.inner.lock();
                    inner.state = State::Running;
                    inner.traces = sink.traces;
                    log::info!("{}: running, boot_addr=0x{:x}", self.name, result.boot_addr);
                }
                Err(e) => {
                    log::error!("{}: start() failed: {e}", self.name);
                }
            },
        }
        self.load_signal.signal();
    }

    /// Mailbox `CRASH` (spec.md §6): log and transition, regardless of
    /// current state. The remote is expected to be reset by operator
    /// action in this revision (spec.md §7).
    pub fn on_crash(&self) {
        log::error!("{}: mailbox reported CRASH", self.name);
        self.inner.lock().state = State::Crashed;
    }

    /// Teardown path out of CRASHED (spec.md's state diagram). Only
    /// valid with no outstanding activations.
    pub(crate) fn teardown_crashed(&self) {
        let mut inner = self.inner.lock();
        assert_eq!(inner.refcount, 0, "{}: teardown with outstanding activations", self.name);
        inner.traces.clear();
        inner.state = State::Offline;
    }
}

struct LoadSink<'a> {
    memory: &'a dyn MemoryWriter,
    traces: TraceSlots,
}

impl FirmwareSink for LoadSink<'_> {
    fn write(&mut self, pa: u64, data: &[u8]) -> Result<()> {
        self.memory.write_memory(pa, data)
    }

    fn resource(&mut self, entry: ResourceEntry, pa: Option<u64>) {
        crate::firmware::resource::apply(&entry, pa, &mut self.traces);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remoteproc::platform::{FirmwareLoader, PlatformBundle};

    struct NoopOps;
    impl PlatformOps for NoopOps {
        fn start(&self, _boot_addr: u64) -> Result<()> {
            Ok(())
        }
        fn stop(&self) -> Result<()> {
            Ok(())
        }
    }
    struct NoopMemory;
    impl MemoryWriter for NoopMemory {
        fn write_memory(&self, _pa: u64, _data: &[u8]) -> Result<()> {
            Ok(())
        }
    }
    struct BadMagicLoader;
    impl FirmwareLoader for BadMagicLoader {
        fn submit(&self, _path: &str, on_done: Box<dyn FnOnce(Result<Vec<u8>>) + Send>) -> Result<()> {
            on_done(Ok(b"XXXX\0\0\0\0\0\0\0\0".to_vec()));
            Ok(())
        }
    }

    /// spec.md §8 scenario E2: state remains LOADING until `put`, then OFFLINE.
    #[test]
    fn bad_magic_leaves_state_loading_until_put() {
        let proc = RemoteProcessor::new(
            "ipu".to_string(),
            "fw.bin".to_string(),
            MemoryMap::new(vec![]),
            PlatformBundle {
                ops: Arc::new(NoopOps),
                memory: Arc::new(NoopMemory),
                loader: Arc::new(BadMagicLoader),
                reader: None,
                private: Arc::new(()),
            },
        );

        proc.activate().unwrap();
        assert_eq!(proc.state(), State::Loading);

        proc.release();
        assert_eq!(proc.state(), State::Offline);
    }
}
