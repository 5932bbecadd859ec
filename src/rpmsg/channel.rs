//! Channel: one rpmsg endpoint pairing with a name and a local address
//! (spec.md §4.H). A channel is what a driver binds to, and what
//! carries the driver's own private state between `probe` and later
//! callbacks.

use std::any::Any;
use std::sync::Arc;

/// Local endpoint address the channel was given at construction — may
/// be `ADDR_ANY`, in which case `Bus::bind` allocates a concrete one
/// and overwrites it (spec.md §4.H step 1). `dst` is fixed once the
/// remote's CREATE announcement (or a local `publish`) has been seen.
pub struct Channel {
    name: String,
    src: spin::Mutex<u32>,
    dst: spin::Mutex<Option<u32>>,
    /// Driver-private state, set by `Driver::probe` and handed back on
    /// every subsequent callback (mirrors `rpmsg_channel.priv` in the
    /// original kernel binding — spec.md §11 supplement).
    driver_data: spin::Mutex<Option<Box<dyn Any + Send>>>,
}

impl Channel {
    pub fn new(name: impl Into<String>, src: u32) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            src: spin::Mutex::new(src),
            dst: spin::Mutex::new(None),
            driver_data: spin::Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn src(&self) -> u32 {
        *self.src.lock()
    }

    /// Overwrite the local endpoint address once `Bus::bind` has
    /// allocated or claimed one (spec.md §4.H step 1; the original's
    /// `rpdev->src = ept->addr` in `rpmsg_dev_probe`).
    pub fn set_src(&self, src: u32) {
        *self.src.lock() = src;
    }

    pub fn dst(&self) -> Option<u32> {
        *self.dst.lock()
    }

    pub fn set_dst(&self, dst: u32) {
        *self.dst.lock() = Some(dst);
    }

    pub fn set_driver_data(&self, data: Box<dyn Any + Send>) {
        *self.driver_data.lock() = Some(data);
    }

    pub fn with_driver_data<R>(&self, f: impl FnOnce(Option<&mut (dyn Any + Send)>) -> R) -> R {
        let mut guard = self.driver_data.lock();
        f(guard.as_deref_mut())
    }

    /// Send a frame from this channel's endpoint to its paired remote
    /// endpoint. `NotFound` if the channel hasn't been bound to a
    /// remote address yet (no CREATE seen, no explicit `set_dst`).
    pub fn send(
        &self,
        transport: &crate::rpmsg::buffer::Transport,
        payload: &[u8],
    ) -> crate::error::Result<()> {
        let dst = self.dst().ok_or(crate::error::RprocError::NotFound)?;
        transport.send(self.src(), dst, payload)
    }
}
