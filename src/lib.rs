//! Remote-processor lifecycle management and rpmsg messaging.
//!
//! This crate is the host side of a remoteproc/rpmsg style framework:
//! it owns firmware image parsing and loading, the coprocessor
//! lifecycle state machine, and a virtqueue-backed messaging layer with
//! dynamic channel discovery. It does not own any particular SoC's
//! clocks, reset lines, or DMA mapping — those are supplied by a
//! platform integrator through the traits in [`remoteproc::platform`].
//!
//! Module map:
//! - [`translate`]: device-address to physical-address translation.
//! - [`firmware`]: firmware image format, parser, and resource table handling.
//! - [`remoteproc`]: the processor record, lifecycle state machine, and registry.
//! - [`rpmsg`]: virtqueue transport, endpoints, channels, bus, and name service.
//! - [`debug`]: read-only diagnostics surface.
//! - [`error`]: the crate's error type.

pub mod debug;
pub mod error;
pub mod firmware;
pub mod remoteproc;
pub mod rpmsg;
pub mod translate;

pub use error::{Result, RprocError};
