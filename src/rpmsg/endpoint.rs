//! Endpoint table (spec.md §4.G): address → callback, with dynamic
//! allocation for channels that don't request a fixed address.
//!
//! Grounded in `process/scheduler.rs`'s id-table pattern (a `Mutex`-
//! guarded map handing out the next free key), generalized here from a
//! monotonic counter to a free-list so addresses released by a torn-
//! down channel are available again rather than burned forever.

use std::collections::BTreeMap;
use std::sync::Arc;

use spin::Mutex;

use crate::error::{Result, RprocError};
use crate::rpmsg::frame::Frame;

/// Reserved well-known address for the name-service channel (spec.md §4.I).
pub const NS_ADDR: u32 = 53;

/// Dynamic addresses start here; everything below is reserved for
/// well-known services like the name service.
pub const RESERVED_LOW: u32 = 1024;

/// Sentinel requesting a dynamically allocated address, as opposed to a
/// concrete one (spec.md §4.H, §4.I; the original's `RPMSG_ADDR_ANY`).
pub const ADDR_ANY: u32 = u32::MAX;

pub type EndpointCallback = Arc<dyn Fn(Frame) + Send + Sync>;

struct Endpoint {
    callback: EndpointCallback,
}

/// Per-processor table mapping local addresses to the callback that
/// should run when a frame with that `dst` arrives (spec.md §4.G, §4.H
/// RX dispatch).
#[derive(Default)]
pub struct EndpointTable {
    endpoints: Mutex<BTreeMap<u32, Endpoint>>,
    next_dynamic: Mutex<u32>,
}

impl EndpointTable {
    pub fn new() -> Self {
        Self { endpoints: Mutex::new(BTreeMap::new()), next_dynamic: Mutex::new(RESERVED_LOW) }
    }

    /// Bind a specific address. `Exists` if already taken.
    pub fn bind(&self, addr: u32, callback: EndpointCallback) -> Result<()> {
        let mut endpoints = self.endpoints.lock();
        if endpoints.contains_key(&addr) {
            return Err(RprocError::Exists);
        }
        endpoints.insert(addr, Endpoint { callback });
        Ok(())
    }

    /// Allocate the next free dynamic address (>= `RESERVED_LOW`) and
    /// bind it. Mirrors `rpmsg_create_ept`'s `ADDR_ANY` path.
    pub fn bind_dynamic(&self, callback: EndpointCallback) -> Result<u32> {
        let mut next = self.next_dynamic.lock();
        let mut endpoints = self.endpoints.lock();
        loop {
            let candidate = *next;
            *next = if candidate == u32::MAX { RESERVED_LOW } else { candidate + 1 };
            if !endpoints.contains_key(&candidate) {
                endpoints.insert(candidate, Endpoint { callback });
                return Ok(candidate);
            }
        }
    }

    pub fn unbind(&self, addr: u32) {
        self.endpoints.lock().remove(&addr);
    }

    pub fn is_bound(&self, addr: u32) -> bool {
        self.endpoints.lock().contains_key(&addr)
    }

    /// spec.md §4.H: dispatch an inbound frame to the endpoint bound at
    /// its `dst` address. Silently dropped (with a log line) if nothing
    /// is bound there — a channel the remote tore down mid-flight.
    pub fn dispatch(&self, frame: Frame) {
        let callback = self.endpoints.lock().get(&frame.dst).map(|ep| Arc::clone(&ep.callback));
        match callback {
            Some(callback) => callback(frame),
            None => log::debug!("no endpoint bound at address {}, dropping frame", frame.dst),
        }
    }
}
