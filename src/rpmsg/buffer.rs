//! TX/RX buffer pool and the transport that drives frames across a pair
//! of virtqueues (spec.md §4.F: `find_vqs`, `publish_rx_buffers`,
//! `send`, RX dispatch).
//!
//! Resolved open question (spec.md §9, recorded in DESIGN.md): the
//! reference implementation allocates TX buffers from a monotonically
//! advancing cursor until the ring fills, then switches to reclaiming
//! slots the used ring reports as returned. Here both sources are the
//! same free-list: a TX slot is either still in its initial position in
//! the list (the "cursor" case) or has been pushed back onto it after
//! reclamation — one `tx_free` deque guarded by one lock covers both,
//! so callers never need to know which regime they are in.

use std::collections::VecDeque;
use std::sync::atomic::{fence, Ordering};

use spin::Mutex;

use crate::error::{Result, RprocError};
use crate::rpmsg::frame::Frame;
use crate::rpmsg::virtqueue::{RingState, RING_CAPACITY};

/// Kicks the remote side after publishing descriptors. Returns whether
/// the slot backing `frame_bytes` was already reclaimed by the time
/// `kick_tx` returns. Real hardware rings the doorbell and returns
/// immediately — the used-ring entry that frees the slot shows up
/// later, off an interrupt this crate does not model (spec.md §1) — so
/// a platform `Doorbell` always answers `false`. The loopback double
/// below answers `true`: delivery already happened synchronously.
pub trait Doorbell: Send + Sync {
    fn kick_tx(&self, frame_bytes: &[u8]) -> bool;
}

struct Pool {
    rx_slots: Vec<Vec<u8>>,
    next_rx_slot: u16,
    rx_ring: RingState,
    tx_free: VecDeque<u16>,
    tx_ring: RingState,
}

/// One RX/TX virtqueue pair plus the slot pool backing it. Grounded in
/// the teacher's `transport/virtqueue.rs` queue-pair handling, adapted
/// from a single (RX, TX) pair per virtio device to the fixed RX/TX
/// split spec.md §6 describes for one channel's worth of traffic.
pub struct Transport {
    pool: Mutex<Pool>,
    doorbell: Box<dyn Doorbell>,
}

impl Transport {
    /// spec.md §4.F `find_vqs` + `publish_rx_buffers`: allocate both
    /// rings and make every RX slot available to the remote immediately.
    pub fn new(doorbell: Box<dyn Doorbell>) -> Self {
        let rx_slots = vec![Vec::new(); RING_CAPACITY];
        let mut rx_ring = RingState::new(RING_CAPACITY as u16);
        for _ in 0..RING_CAPACITY {
            rx_ring.publish();
        }
        let tx_free = (0..RING_CAPACITY as u16).collect();
        let tx_ring = RingState::new(RING_CAPACITY as u16);
        let pool = Pool { rx_slots, next_rx_slot: 0, rx_ring, tx_free, tx_ring };
        Self { pool: Mutex::new(pool), doorbell }
    }

    /// spec.md §4.F `send`: encode the frame into a reclaimed TX slot
    /// and kick. `MsgTooBig` if the payload plus header wouldn't fit in
    /// one slot; `NoBuffer` if the ring is fully outstanding.
    pub fn send(&self, src: u32, dst: u32, payload: &[u8]) -> Result<()> {
        let max_payload = crate::rpmsg::virtqueue::DEFAULT_SLOT_SIZE - crate::rpmsg::frame::HEADER_LEN;
        if payload.len() > max_payload {
            return Err(RprocError::MsgTooBig { len: payload.len(), max: max_payload });
        }

        let frame = Frame { src, dst, payload: payload.to_vec() };
        let bytes = frame.encode();

        let mut pool = self.pool.lock();
        let slot = pool.tx_free.pop_front().ok_or(RprocError::NoBuffer)?;
        pool.tx_ring.publish();
        drop(pool);

        // Descriptor contents must be visible before the doorbell write
        // that tells the remote to look at them (spec.md §6).
        fence(Ordering::Release);
        let reclaimed_now = self.doorbell.kick_tx(&bytes);

        if reclaimed_now {
            // The remote's used-ring write must be visible before we
            // treat the slot as reclaimable.
            fence(Ordering::Acquire);
            let mut pool = self.pool.lock();
            pool.tx_ring.mark_used();
            pool.tx_ring.consume_one();
            pool.tx_free.push_back(slot);
        }
        Ok(())
    }

    /// Called once a platform doorbell's deferred completion (an
    /// interrupt this crate does not model, spec.md §1) reports a slot
    /// as used. Unused by the loopback path, which reclaims inline.
    #[allow(dead_code)]
    pub fn reclaim_deferred(&self, _slot: u16) {
        let mut pool = self.pool.lock();
        pool.tx_ring.mark_used();
        pool.tx_ring.consume_one();
        pool.tx_free.push_back(_slot);
    }

    /// Invoked by the doorbell's remote-side counterpart (or, in the
    /// loopback test double, directly from `kick_tx`) when a frame has
    /// landed in an RX slot. Copies the payload out and republishes the
    /// same slot — the RX side never needs an allocator, only recycling.
    pub fn deliver(&self, bytes: &[u8], mut on_frame: impl FnMut(Frame)) {
        let Some(frame) = Frame::decode(bytes) else {
            log::warn!("dropping malformed rpmsg frame ({} bytes)", bytes.len());
            return;
        };
        {
            let mut pool = self.pool.lock();
            let index = (pool.next_rx_slot as usize) % pool.rx_slots.len();
            pool.rx_slots[index] = bytes.to_vec();
            pool.next_rx_slot = pool.next_rx_slot.wrapping_add(1);
            pool.rx_ring.mark_used();
            pool.rx_ring.consume_one();
            pool.rx_ring.publish();
        }
        on_frame(frame);
    }
}

/// Stands in for a real doorbell in the in-process messaging tests
/// spec.md §8's "loopback transport" property describes: there is no
/// separate remote processor, so the frame is considered delivered (and
/// its slot reclaimed) the instant `kick_tx` is asked to send it. Actual
/// delivery into a dispatch callback is exercised through `deliver`
/// directly — a bare `Doorbell` has no handle back to the `Transport`
/// that owns it to redeliver into.
pub struct LoopbackDoorbell;

impl Doorbell for LoopbackDoorbell {
    fn kick_tx(&self, _frame_bytes: &[u8]) -> bool {
        true
    }
}

/// A doorbell standing in for hardware whose completion interrupt never
/// fires within the scope this crate models — used only to exercise
/// pool exhaustion.
#[cfg(test)]
struct NeverAckDoorbell;

#[cfg(test)]
impl Doorbell for NeverAckDoorbell {
    fn kick_tx(&self, _frame_bytes: &[u8]) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    #[test]
    fn send_over_slot_capacity_is_msg_too_big() {
        let transport = Transport::new(Box::new(LoopbackDoorbell));
        let payload = vec![0u8; 500];
        let err = transport.send(1024, 53, &payload).unwrap_err();
        assert_eq!(err, RprocError::MsgTooBig { len: 500, max: 512 - 16 });
    }

    #[test]
    fn send_exhausts_pool_then_reports_no_buffer() {
        let transport = Transport::new(Box::new(NeverAckDoorbell));
        for _ in 0..RING_CAPACITY {
            transport.send(1024, 53, b"x").unwrap();
        }
        assert_eq!(transport.send(1024, 53, b"x").unwrap_err(), RprocError::NoBuffer);
    }

    #[test]
    fn deferred_reclaim_frees_a_slot_after_exhaustion() {
        let transport = Transport::new(Box::new(NeverAckDoorbell));
        for _ in 0..RING_CAPACITY {
            transport.send(1024, 53, b"x").unwrap();
        }
        transport.reclaim_deferred(0);
        assert!(transport.send(1024, 53, b"x").is_ok());
    }

    #[test]
    fn deliver_decodes_and_dispatches() {
        let transport = Transport::new(Box::new(LoopbackDoorbell));
        let frame = Frame { src: 1024, dst: 53, payload: vec![9, 9] };
        let bytes = frame.encode();
        let seen = Arc::new(StdMutex::new(None));
        let seen2 = Arc::clone(&seen);
        transport.deliver(&bytes, move |f| *seen2.lock().unwrap() = Some((f.src, f.dst, f.payload)));
        assert_eq!(*seen.lock().unwrap(), Some((1024, 53, vec![9, 9])));
    }

    #[test]
    fn deliver_drops_malformed_bytes() {
        let transport = Transport::new(Box::new(LoopbackDoorbell));
        transport.deliver(&[0u8; 2], |_| panic!("callback must not run"));
    }
}
