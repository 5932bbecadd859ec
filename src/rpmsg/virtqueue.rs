//! Split-virtqueue wire layout (spec.md §6): descriptor table, avail
//! ring, used ring, contiguous in shared memory at a platform-configured
//! alignment. This is the bit-for-bit contract with the remote
//! processor's own virtio implementation — changing it requires
//! updating the remote firmware, so the struct layouts below are not
//! negotiable the way an ordinary internal data structure would be.
//!
//! Grounded directly in `os/kernel/src/device/virtio/transport/virtqueue.rs`
//! and `transport/flags.rs` (`Descriptor`, `AvailableRing`, `UsedRing`,
//! `bitflags!`-based descriptor flags); reference `N = 256` fixed-size
//! 512-byte slots halves into two 128-descriptor rings (spec.md §3, §6).

bitflags::bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct DescriptorFlags: u16 {
        /// This marks a buffer as continuing via the next field.
        const NEXT = 1 << 0;
        /// This marks a buffer as device write-only (otherwise device read-only).
        const WRITE = 1 << 1;
        /// This means the buffer contains a list of buffer descriptors.
        const INDIRECT = 1 << 2;
    }
}

/// Reference geometry: N = 256 fixed-size slots, split RX/TX.
pub const RING_TOTAL_SLOTS: usize = 256;
pub const RING_CAPACITY: usize = RING_TOTAL_SLOTS / 2;
pub const DEFAULT_SLOT_SIZE: usize = 512;
pub const RING_ALIGNMENT: usize = 4096;

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct Descriptor {
    pub address: u64,
    pub length: u32,
    pub flags: DescriptorFlags,
    pub next: u16,
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct UsedRingElement {
    pub id: u32,
    pub length: u32,
}

/// Per-direction ring geometry and index bookkeeping. The descriptor
/// table and avail/used rings themselves live in the platform's shared
/// memory mapping (out of scope here, spec.md §1); this struct is the
/// host-side index state the transport advances as it publishes and
/// drains buffers.
#[derive(Debug, Clone, Copy)]
pub struct RingState {
    pub capacity: u16,
    pub avail_index: u16,
    pub used_index: u16,
    pub last_used_seen: u16,
}

impl RingState {
    pub const fn new(capacity: u16) -> Self {
        Self { capacity, avail_index: 0, used_index: 0, last_used_seen: 0 }
    }

    pub fn publish(&mut self) {
        self.avail_index = self.avail_index.wrapping_add(1);
    }

    pub fn mark_used(&mut self) {
        self.used_index = self.used_index.wrapping_add(1);
    }

    /// Number of used entries not yet drained by the host.
    pub fn pending(&self) -> u16 {
        self.used_index.wrapping_sub(self.last_used_seen)
    }

    pub fn consume_one(&mut self) {
        self.last_used_seen = self.last_used_seen.wrapping_add(1);
    }
}
