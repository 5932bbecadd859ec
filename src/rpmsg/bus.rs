//! Driver/channel matching (spec.md §4.H), split into a pure matching
//! step (`find_driver`) and the side-effecting step that actually wires
//! a matched driver to a channel (`bind`) — spec.md §11 supplement,
//! mirroring the original kernel's separation between walking the bus's
//! driver list (`bus_for_each_drv`) and calling `device_bind_driver`.
//!
//! Grounded in `process/scheduler.rs`'s registration pattern: drivers
//! register themselves with the bus once, up front, then the bus
//! dispatches to them by name as channels show up.

use std::sync::Arc;

use spin::Mutex;

use crate::error::{Result, RprocError};
use crate::rpmsg::channel::Channel;
use crate::rpmsg::endpoint::{EndpointTable, ADDR_ANY};
use crate::rpmsg::frame::Frame;

/// A driver bound to zero or more channels by name. `id_table` lists
/// the channel names this driver is willing to `probe`.
pub trait Driver: Send + Sync {
    fn id_table(&self) -> &[&str];

    /// Called when a channel whose name matches `id_table` appears.
    /// Implementations typically call `channel.set_driver_data(..)`.
    fn probe(&self, channel: &Arc<Channel>) -> Result<()>;

    /// Called when the channel is torn down.
    fn remove(&self, channel: &Arc<Channel>);

    /// Called for every frame the channel's endpoint receives.
    fn callback(&self, channel: &Arc<Channel>, frame: Frame);
}

struct Binding {
    channel: Arc<Channel>,
    driver: Arc<dyn Driver>,
}

/// The rpmsg bus: a driver registry plus the set of channels currently
/// bound to one of them. Owns the `EndpointTable` so `bind` can
/// allocate the channel its actual RX address (spec.md §4.H step 1;
/// the original's `rpmsg_create_ept` inside `rpmsg_dev_probe`).
pub struct Bus {
    drivers: Mutex<Vec<Arc<dyn Driver>>>,
    bindings: Mutex<Vec<Binding>>,
    endpoints: Arc<EndpointTable>,
}

impl Bus {
    pub fn new(endpoints: Arc<EndpointTable>) -> Self {
        Self { drivers: Mutex::new(Vec::new()), bindings: Mutex::new(Vec::new()), endpoints }
    }

    pub fn register_driver(&self, driver: Arc<dyn Driver>) {
        self.drivers.lock().push(driver);
    }

    /// Pure match: does any registered driver claim this channel name?
    /// No side effects, so callers can match speculatively (e.g. before
    /// deciding whether to announce a channel at all).
    pub fn find_driver(&self, channel_name: &str) -> Option<Arc<dyn Driver>> {
        self.drivers
            .lock()
            .iter()
            .find(|d| d.id_table().iter().any(|n| *n == channel_name))
            .cloned()
    }

    /// Bind a matched driver to a channel: allocates the channel's
    /// endpoint (a fresh dynamic address if `channel.src()` is
    /// `ADDR_ANY`, otherwise the requested one) at `driver.callback`,
    /// overwrites `channel`'s `src` with whatever address was actually
    /// allocated, then calls `probe`. If `probe` fails the endpoint is
    /// torn down again and the channel is left unbound (spec.md §4.H
    /// step 1; the original's `rpdev->src = ept->addr` in
    /// `rpmsg_dev_probe`).
    pub fn bind(&self, channel: Arc<Channel>) -> Result<()> {
        let driver = self.find_driver(channel.name()).ok_or(RprocError::NotFound)?;

        let callback_channel = Arc::clone(&channel);
        let callback_driver = Arc::clone(&driver);
        let callback: crate::rpmsg::endpoint::EndpointCallback =
            Arc::new(move |frame: Frame| callback_driver.callback(&callback_channel, frame));

        let addr = if channel.src() == ADDR_ANY {
            self.endpoints.bind_dynamic(callback)?
        } else {
            let requested = channel.src();
            self.endpoints.bind(requested, callback)?;
            requested
        };
        channel.set_src(addr);

        if let Err(e) = driver.probe(&channel) {
            self.endpoints.unbind(addr);
            return Err(e);
        }
        log::info!("rpmsg: bound driver to channel {} at address {addr}", channel.name());
        self.bindings.lock().push(Binding { channel, driver });
        Ok(())
    }

    pub fn unbind(&self, channel_name: &str) {
        let mut bindings = self.bindings.lock();
        if let Some(index) = bindings.iter().position(|b| b.channel.name() == channel_name) {
            let binding = bindings.swap_remove(index);
            self.endpoints.unbind(binding.channel.src());
            binding.driver.remove(&binding.channel);
            log::info!("rpmsg: unbound channel {channel_name}");
        }
    }

    /// Dispatch a received frame to the endpoint owning its `dst`
    /// address. Kept for driver callbacks that don't go through the
    /// bus's own `EndpointTable` (e.g. loopback tests); production RX
    /// goes through `EndpointTable::dispatch` directly since that's
    /// what `bind` actually registers with.
    pub fn dispatch(&self, frame: Frame) {
        self.endpoints.dispatch(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoDriver {
        names: Vec<&'static str>,
        probes: Arc<AtomicUsize>,
    }

    impl Driver for EchoDriver {
        fn id_table(&self) -> &[&str] {
            &self.names
        }
        fn probe(&self, _channel: &Arc<Channel>) -> Result<()> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn remove(&self, _channel: &Arc<Channel>) {}
        fn callback(&self, _channel: &Arc<Channel>, _frame: Frame) {}
    }

    #[test]
    fn find_driver_matches_by_name_without_side_effects() {
        let bus = Bus::new(Arc::new(EndpointTable::new()));
        let probes = Arc::new(AtomicUsize::new(0));
        bus.register_driver(Arc::new(EchoDriver { names: vec!["rpmsg-client-sample"], probes: Arc::clone(&probes) }));
        assert!(bus.find_driver("rpmsg-client-sample").is_some());
        assert!(bus.find_driver("unknown-channel").is_none());
        assert_eq!(probes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn bind_invokes_probe_exactly_once() {
        let bus = Bus::new(Arc::new(EndpointTable::new()));
        let probes = Arc::new(AtomicUsize::new(0));
        bus.register_driver(Arc::new(EchoDriver { names: vec!["rpmsg-client-sample"], probes: Arc::clone(&probes) }));
        let channel = Channel::new("rpmsg-client-sample", 1024);
        bus.bind(channel).unwrap();
        assert_eq!(probes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn bind_without_a_matching_driver_is_not_found() {
        let bus = Bus::new(Arc::new(EndpointTable::new()));
        let channel = Channel::new("no-such-driver", 1024);
        assert_eq!(bus.bind(channel).unwrap_err(), RprocError::NotFound);
    }

    #[test]
    fn bind_allocates_a_dynamic_address_for_addr_any() {
        let bus = Bus::new(Arc::new(EndpointTable::new()));
        let probes = Arc::new(AtomicUsize::new(0));
        bus.register_driver(Arc::new(EchoDriver { names: vec!["rpmsg-client-sample"], probes }));
        let channel = Channel::new("rpmsg-client-sample", ADDR_ANY);
        bus.bind(Arc::clone(&channel)).unwrap();
        assert_ne!(channel.src(), ADDR_ANY);
        assert!(channel.src() >= crate::rpmsg::endpoint::RESERVED_LOW);
    }

    #[test]
    fn bind_failure_releases_the_allocated_endpoint() {
        struct FailingDriver;
        impl Driver for FailingDriver {
            fn id_table(&self) -> &[&str] {
                &["rpmsg-client-sample"]
            }
            fn probe(&self, _channel: &Arc<Channel>) -> Result<()> {
                Err(RprocError::Invalid)
            }
            fn remove(&self, _channel: &Arc<Channel>) {}
            fn callback(&self, _channel: &Arc<Channel>, _frame: Frame) {}
        }

        let endpoints = Arc::new(EndpointTable::new());
        let bus = Bus::new(Arc::clone(&endpoints));
        bus.register_driver(Arc::new(FailingDriver));
        let channel = Channel::new("rpmsg-client-sample", 1024);
        assert_eq!(bus.bind(channel).unwrap_err(), RprocError::Invalid);
        assert!(!endpoints.is_bound(1024));
    }
}
