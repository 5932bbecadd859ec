//! Wire layout of an rpmsg message frame (spec.md §3, §6).
//!
//! Grounded in `os/kernel/src/device/mlx4/fw.rs`'s use of `zerocopy`
//! byte-order wrapper types over a `#[repr(C, packed)]` struct — the
//! same technique, little-endian instead of the NIC's big-endian.

use zerocopy::byteorder::{U16, U32};
use zerocopy::{AsBytes, FromBytes};

pub const HEADER_LEN: usize = 16;

/// 16-byte fixed header, little-endian, followed by `len` payload bytes.
#[derive(Clone, Copy, FromBytes, AsBytes)]
#[repr(C, packed)]
pub struct FrameHeader {
    pub len: U16<byteorder::LittleEndian>,
    pub flags: U16<byteorder::LittleEndian>,
    pub src: U32<byteorder::LittleEndian>,
    pub dst: U32<byteorder::LittleEndian>,
    pub reserved: U32<byteorder::LittleEndian>,
}

impl FrameHeader {
    pub fn new(src: u32, dst: u32, len: u16) -> Self {
        Self {
            len: U16::new(len),
            flags: U16::new(0),
            src: U32::new(src),
            dst: U32::new(dst),
            reserved: U32::new(0),
        }
    }
}

/// A received or about-to-be-sent frame: header fields plus a payload
/// slice. `Frame` owns its bytes (a single slot's worth); the transport
/// copies in and out of shared-memory slots around it.
#[derive(Clone)]
pub struct Frame {
    pub src: u32,
    pub dst: u32,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn encode(&self) -> Vec<u8> {
        let header = FrameHeader::new(self.src, self.dst, self.payload.len() as u16);
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<Frame> {
        if bytes.len() < HEADER_LEN {
            return None;
        }
        let header = FrameHeader::read_from_prefix(bytes)?;
        let len = header.len.get() as usize;
        let payload = bytes.get(HEADER_LEN..HEADER_LEN + len)?;
        Some(Frame { src: header.src.get(), dst: header.dst.get(), payload: payload.to_vec() })
    }
}
