//! Name service (spec.md §4.I): the remote announces channels it wants
//! opened by sending a small control message to the well-known address
//! `NS_ADDR`; this module decodes those announcements and drives `Bus`
//! bind/unbind accordingly, and supplements spec.md with two behaviors
//! present in `original_source/` but dropped by the distillation
//! (spec.md §11): publishing a locally-created channel outward, and the
//! "UP!" handshake the name-service driver sends once probed.
//!
//! Wire format grounded the same way `frame.rs` is: `zerocopy` byte-order
//! wrappers over a `#[repr(C, packed)]` struct.

use zerocopy::byteorder::U32;
use zerocopy::{AsBytes, FromBytes};

use crate::error::{Result, RprocError};
use crate::rpmsg::bus::Bus;
use crate::rpmsg::channel::Channel;
use crate::rpmsg::endpoint::{ADDR_ANY, NS_ADDR};
use crate::rpmsg::frame::Frame;

pub const NAME_SIZE: usize = 32;
const WIRE_LEN: usize = NAME_SIZE + 4 + 4;

/// Sent by the name-service driver immediately after it is probed, to
/// signal to the remote that the host side is ready to receive CREATE
/// announcements. Dropped by the distillation but present in the
/// original `rpmsg_ns_probe` (spec.md §11).
pub const HANDSHAKE: &[u8] = b"UP!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NsFlags {
    Create,
    Destroy,
}

impl From<u32> for NsFlags {
    fn from(value: u32) -> Self {
        if value == 1 {
            NsFlags::Destroy
        } else {
            NsFlags::Create
        }
    }
}

impl From<NsFlags> for u32 {
    fn from(value: NsFlags) -> Self {
        match value {
            NsFlags::Create => 0,
            NsFlags::Destroy => 1,
        }
    }
}

#[derive(Clone, Copy, FromBytes, AsBytes)]
#[repr(C, packed)]
struct NsWire {
    name: [u8; NAME_SIZE],
    addr: U32<byteorder::LittleEndian>,
    flags: U32<byteorder::LittleEndian>,
}

pub struct NsMessage {
    pub name: String,
    pub addr: u32,
    pub flags: NsFlags,
}

impl NsMessage {
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.name.len() >= NAME_SIZE {
            return Err(RprocError::Invalid);
        }
        let mut name = [0u8; NAME_SIZE];
        name[..self.name.len()].copy_from_slice(self.name.as_bytes());
        let wire = NsWire { name, addr: U32::new(self.addr), flags: U32::new(self.flags.into()) };
        Ok(wire.as_bytes().to_vec())
    }

    pub fn decode(bytes: &[u8]) -> Result<NsMessage> {
        if bytes.len() < WIRE_LEN {
            return Err(RprocError::Truncated);
        }
        let wire = NsWire::read_from_prefix(bytes).ok_or(RprocError::Malformed)?;
        let nul = wire.name.iter().position(|&b| b == 0).ok_or(RprocError::Malformed)?;
        let name = std::str::from_utf8(&wire.name[..nul]).map_err(|_| RprocError::Malformed)?;
        Ok(NsMessage { name: name.to_string(), addr: wire.addr.get(), flags: wire.flags.get().into() })
    }
}

/// Decode an inbound frame addressed to `NS_ADDR` and drive the bus:
/// CREATE binds a new channel at the remote's announced address; DESTROY
/// unbinds the matching channel. Returns `Ok(())` even when no local
/// driver claims the name — an unclaimed channel is simply not bound.
pub fn handle_message(bus: &Bus, frame: &Frame) -> Result<()> {
    if frame.dst != NS_ADDR {
        return Err(RprocError::BadAddress);
    }
    let message = NsMessage::decode(&frame.payload)?;
    match message.flags {
        NsFlags::Create => {
            log::info!("rpmsg-ns: CREATE {} at remote address {}", message.name, message.addr);
            // Local src is unknown until Bus::bind allocates it; dst is
            // the remote's announced address (the original's
            // `chinfo.src = RPMSG_ADDR_ANY; chinfo.dst = msg->addr`).
            let channel = Channel::new(message.name.clone(), ADDR_ANY);
            channel.set_dst(message.addr);
            match bus.bind(channel) {
                Ok(()) => Ok(()),
                Err(RprocError::NotFound) => {
                    log::debug!("rpmsg-ns: no driver claims channel {}", message.name);
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        NsFlags::Destroy => {
            log::info!("rpmsg-ns: DESTROY {}", message.name);
            bus.unbind(&message.name);
            Ok(())
        }
    }
}

/// Announce a locally created channel to the remote name service
/// (spec.md §11 supplement — `rpmsg_ns_publish` in the original).
pub fn publish(transport: &crate::rpmsg::buffer::Transport, local_addr: u32, name: &str) -> Result<()> {
    let message = NsMessage { name: name.to_string(), addr: local_addr, flags: NsFlags::Create };
    transport.send(local_addr, NS_ADDR, &message.encode()?)
}

/// Send the post-probe handshake (spec.md §11 supplement).
pub fn send_handshake(transport: &crate::rpmsg::buffer::Transport, local_addr: u32) -> Result<()> {
    transport.send(local_addr, NS_ADDR, HANDSHAKE)
}
