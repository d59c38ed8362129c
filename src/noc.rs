// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Software realisation of the NoC adapter contract described in the external
// interfaces: `/noc/sync/<node>:<tag>`, `/noc/mailbox/<node>:<tag>`,
// `/noc/portal/<node>:<tag>` pathnames, backed by named shared memory. This
// is the only module in the crate that touches `ShmHandle`/`IpcMutex`/
// `IpcCondition`/`Waiter`/`ShmRing` directly; every other module goes
// through the connectors defined here, mirroring how the original system
// calls into a single hardware driver through `hal_*`/`mppa_*` functions.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{NanvixError, Result};
use crate::proto::shm_ring::ShmRing;
use crate::shm::{ShmHandle, ShmOpenMode};
use crate::spin_lock::{adaptive_yield_pub, SpinLock};
use crate::topology::{NodeId, Purpose};
use crate::waiter::Waiter;

/// Fixed mailbox frame size for the whole system (§9 Open Questions).
pub const MAILBOX_MSG_SIZE: usize = 64;

/// Mailbox ring capacity per input mailbox (power of two, per `ShmRing`).
const MAILBOX_RING_CAPACITY: usize = 16;

/// Maximum single portal transfer this simulated NoC supports.
pub const MAX_PORTAL_TRANSFER: usize = 1 << 20;

fn pathname(kind: &str, node: NodeId, tag: u32) -> String {
    format!("__nanvix_noc_{kind}_{node}_{tag}")
}

/// Build the canonical pathname for a connector, mirroring the
/// `/noc/<kind>/<node>:<tag>` convention from §6.
pub fn connector_pathname(purpose: Purpose, node: NodeId) -> String {
    let tag = crate::topology::noctag_for(purpose, node);
    match purpose {
        Purpose::Sync | Purpose::Barrier => pathname("sync", node, tag),
        Purpose::Mailbox => pathname("mailbox", node, tag),
        Purpose::Portal => pathname("portal", node, tag),
    }
}

// ---------------------------------------------------------------------------
// SyncChannel — a named 64-bit bitmask rendezvous connector
// ---------------------------------------------------------------------------

/// One sync endpoint: a shared 64-bit mask plus a waiter to block readers.
///
/// Multiple sync *pathnames* may exist simultaneously (one per barrier /
/// portal handshake); each is independently named and independently backed.
pub struct SyncChannel {
    shm: ShmHandle,
    waiter: Waiter,
}

#[repr(C)]
struct SyncData {
    mask: AtomicU64,
}

impl SyncChannel {
    /// Open (creating if necessary) the sync connector at `pathname`.
    pub fn open(pathname: &str) -> Result<Self> {
        let shm = ShmHandle::acquire(pathname, std::mem::size_of::<SyncData>(), ShmOpenMode::CreateOrOpen)?;
        let waiter = Waiter::open(pathname)?;
        Ok(Self { shm, waiter })
    }

    fn data(&self) -> &SyncData {
        unsafe { &*(self.shm.get() as *const SyncData) }
    }

    /// OR `bit` into the shared mask and wake any blocked waiter.
    pub fn signal(&self, bit: u64) -> Result<()> {
        self.data().mask.fetch_or(bit, Ordering::AcqRel);
        self.waiter.broadcast()?;
        Ok(())
    }

    /// Block until the accumulated mask satisfies `match_mask` (all of its
    /// bits are set), then return the mask observed at that point. Mirrors
    /// the hardware sync connector's blocking read once its match-mask ioctl
    /// condition is met.
    pub fn wait_match(&self, match_mask: u64) -> Result<u64> {
        self.waiter.wait_if(|| self.data().mask.load(Ordering::Acquire) & match_mask != match_mask, None)?;
        Ok(self.data().mask.load(Ordering::Acquire))
    }

    /// Same as [`wait_match`](Self::wait_match) but gives up after `timeout_ms`
    /// milliseconds, returning `Err(NanvixError::Unavailable)`. Not part of the
    /// core protocol (§5 Cancellation and timeouts); exists purely so test
    /// harnesses can assert "this would have blocked forever" without hanging.
    pub fn wait_match_timeout(&self, match_mask: u64, timeout_ms: u64) -> Result<u64> {
        let deadline = std::time::Instant::now() + std::time::Duration::from_millis(timeout_ms);
        loop {
            let mask = self.data().mask.load(Ordering::Acquire);
            if mask & match_mask == match_mask {
                return Ok(mask);
            }
            if std::time::Instant::now() >= deadline {
                return Err(NanvixError::Unavailable);
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    }

    /// Reset the mask to zero (used when recycling a sync descriptor).
    pub fn reset(&self) {
        self.data().mask.store(0, Ordering::Release);
    }

    /// Remove the backing storage for a sync connector by pathname.
    pub fn unlink_by_name(pathname: &str) {
        Waiter::clear_storage(pathname);
        ShmHandle::clear_storage(pathname);
    }
}

// ---------------------------------------------------------------------------
// MailboxQueue — a named fixed-frame FIFO connector
// ---------------------------------------------------------------------------

/// One input mailbox's backing queue: a fixed-capacity ring of
/// `MAILBOX_MSG_SIZE`-byte frames plus a waiter so `read` can block until a
/// frame is available. Writers serialise through `write_lock` since the
/// underlying [`ShmRing`] is only safe for a single producer; any number of
/// remote nodes may send to one input mailbox, so the queue itself
/// arbitrates between them.
pub struct MailboxQueue {
    ring: ShmRing<[u8; MAILBOX_MSG_SIZE], MAILBOX_RING_CAPACITY>,
    waiter: Waiter,
    write_lock: ShmHandle,
}

#[repr(C)]
struct WriteLockData {
    lock: crate::spin_lock::SpinLock,
}

impl MailboxQueue {
    /// Open (creating if necessary) the mailbox connector at `pathname`.
    pub fn open(pathname: &str) -> Result<Self> {
        let mut ring = ShmRing::new(pathname);
        ring.open_or_create()?;
        let waiter = Waiter::open(pathname)?;
        let lock_name = format!("{pathname}_WLOCK_");
        let write_lock = ShmHandle::acquire(&lock_name, std::mem::size_of::<WriteLockData>(), ShmOpenMode::CreateOrOpen)?;
        Ok(Self { ring, waiter, write_lock })
    }

    fn lock_data(&self) -> &SpinLock {
        unsafe { &(*(self.write_lock.get() as *const WriteLockData)).lock }
    }

    /// Push one frame, blocking (spin, bounded by the ring filling up) if the
    /// ring is momentarily full from concurrent producers. Wakes any blocked
    /// reader.
    pub fn push(&self, frame: &[u8; MAILBOX_MSG_SIZE]) -> Result<()> {
        self.lock_data().lock();
        let mut k = 0u32;
        while !self.ring.write(frame) {
            adaptive_yield_pub(&mut k);
        }
        self.lock_data().unlock();
        self.waiter.broadcast()?;
        Ok(())
    }

    /// Block until a frame is available, then pop and return it.
    pub fn pop(&self) -> Result<[u8; MAILBOX_MSG_SIZE]> {
        let mut out = [0u8; MAILBOX_MSG_SIZE];
        self.waiter.wait_if(|| self.ring.is_empty(), None)?;
        // Another reader could race us on a true MPMC ring; this system has
        // exactly one reader per input mailbox (§4.3), so a single `read` after
        // the wait is sufficient.
        self.ring.read(&mut out);
        Ok(out)
    }

    /// Same as [`pop`](Self::pop) but gives up after `timeout_ms` milliseconds,
    /// returning `Err(NanvixError::Unavailable)` (§5 Cancellation and timeouts;
    /// not part of the core protocol, exists for test harnesses only).
    pub fn pop_timeout(&self, timeout_ms: u64) -> Result<[u8; MAILBOX_MSG_SIZE]> {
        let mut out = [0u8; MAILBOX_MSG_SIZE];
        let signalled = self.waiter.wait_if(|| self.ring.is_empty(), Some(timeout_ms))?;
        if !signalled {
            return Err(NanvixError::Unavailable);
        }
        self.ring.read(&mut out);
        Ok(out)
    }

    /// Remove the backing storage for a mailbox connector by pathname.
    pub fn unlink_by_name(pathname: &str) {
        Waiter::clear_storage(pathname);
        ShmHandle::clear_storage(&format!("{pathname}_WLOCK_"));
        ShmHandle::clear_storage(pathname);
    }
}

// ---------------------------------------------------------------------------
// PortalBuffer — bulk DMA payload staging for the portal rendezvous
// ---------------------------------------------------------------------------

/// A named shared buffer standing in for the hardware portal's DMA engine.
/// The reader arms an expected length, the sender copies its payload in and
/// publishes the length, the reader's async-wait completes.
pub struct PortalBuffer {
    shm: ShmHandle,
    waiter: Waiter,
    capacity: usize,
}

#[repr(C)]
struct PortalHeader {
    ready_len: std::sync::atomic::AtomicUsize,
}

impl PortalBuffer {
    pub fn open(pathname: &str, capacity: usize) -> Result<Self> {
        let total = std::mem::size_of::<PortalHeader>() + capacity;
        let shm = ShmHandle::acquire(pathname, total, ShmOpenMode::CreateOrOpen)?;
        let waiter = Waiter::open(pathname)?;
        Ok(Self { shm, waiter, capacity })
    }

    fn header(&self) -> &PortalHeader {
        unsafe { &*(self.shm.get() as *const PortalHeader) }
    }

    fn payload_ptr(&self) -> *mut u8 {
        unsafe { self.shm.get().add(std::mem::size_of::<PortalHeader>()) }
    }

    /// Sender side: copy `buf` in and publish its length. `buf.len()` must
    /// not exceed the buffer's capacity.
    pub fn publish(&self, buf: &[u8]) -> Result<()> {
        if buf.len() > self.capacity {
            return Err(NanvixError::InvalidArgument);
        }
        unsafe { std::ptr::copy_nonoverlapping(buf.as_ptr(), self.payload_ptr(), buf.len()) };
        self.header().ready_len.store(buf.len(), std::sync::atomic::Ordering::Release);
        self.waiter.broadcast()?;
        Ok(())
    }

    /// Reader side: block until exactly `expected` bytes have been published,
    /// then copy them into `out` (`out.len() == expected` required) and reset
    /// the buffer for reuse.
    pub fn await_exact(&self, expected: usize, out: &mut [u8]) -> Result<()> {
        if out.len() != expected {
            return Err(NanvixError::InvalidArgument);
        }
        self.waiter.wait_if(
            || self.header().ready_len.load(std::sync::atomic::Ordering::Acquire) != expected,
            None,
        )?;
        unsafe { std::ptr::copy_nonoverlapping(self.payload_ptr(), out.as_mut_ptr(), expected) };
        self.header().ready_len.store(0, std::sync::atomic::Ordering::Release);
        Ok(())
    }

    /// Same as [`await_exact`](Self::await_exact) but gives up after
    /// `timeout_ms` milliseconds, returning `Err(NanvixError::Unavailable)`
    /// (§5 Cancellation and timeouts; test-harness use only).
    pub fn await_exact_timeout(&self, expected: usize, out: &mut [u8], timeout_ms: u64) -> Result<()> {
        if out.len() != expected {
            return Err(NanvixError::InvalidArgument);
        }
        let signalled = self.waiter.wait_if(
            || self.header().ready_len.load(std::sync::atomic::Ordering::Acquire) != expected,
            Some(timeout_ms),
        )?;
        if !signalled {
            return Err(NanvixError::Unavailable);
        }
        unsafe { std::ptr::copy_nonoverlapping(self.payload_ptr(), out.as_mut_ptr(), expected) };
        self.header().ready_len.store(0, std::sync::atomic::Ordering::Release);
        Ok(())
    }

    pub fn unlink_by_name(pathname: &str) {
        Waiter::clear_storage(pathname);
        ShmHandle::clear_storage(pathname);
    }
}
