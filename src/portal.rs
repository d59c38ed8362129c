// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Portal rendezvous (§4.4): bulk transfer gated by a sync handshake so the
// sender never writes before the receiver has armed a matching-size
// receive. The receiver signals its own control-sync channel first (the
// "arm" step), then waits on the payload; the sender waits for that signal
// before publishing, guaranteeing the bit-exact n-byte transfer invariant
// (I3) — no partial writes are ever observable on either side.

use crate::error::{NanvixError, Result};
use crate::noc::{connector_pathname, PortalBuffer, SyncChannel, MAX_PORTAL_TRANSFER};
use crate::topology::{is_valid_node, portal_sync_bit, NodeId, Purpose};

/// Receiver side of a portal: owned by the local node, matched against one
/// remote sender per transfer.
pub struct ReceivePortal {
    control: SyncChannel,
    buffer: PortalBuffer,
    local: NodeId,
    pathname: String,
    buf_pathname: String,
}

/// Sender side of a portal, allowed to write to exactly one remote node.
pub struct SendPortal {
    control: SyncChannel,
    buffer: PortalBuffer,
    remote_bit: u64,
}

impl ReceivePortal {
    pub fn create(local: NodeId) -> Result<Self> {
        if !is_valid_node(local) {
            return Err(NanvixError::InvalidArgument);
        }
        let pathname = connector_pathname(Purpose::Portal, local);
        let buf_pathname = format!("{pathname}_BUF_");
        let control = SyncChannel::open(&pathname)?;
        control.reset();
        let buffer = PortalBuffer::open(&buf_pathname, MAX_PORTAL_TRANSFER)?;
        Ok(Self { control, buffer, local, pathname, buf_pathname })
    }

    pub fn node(&self) -> NodeId {
        self.local
    }

    /// Arm the handshake for `remote`, then block until exactly `out.len()`
    /// bytes arrive. Matches the "reader arms async receive + signals
    /// control-sync to unblock sender" ordering required by the rendezvous.
    pub fn receive(&self, remote: NodeId, out: &mut [u8]) -> Result<()> {
        if !is_valid_node(remote) {
            return Err(NanvixError::InvalidArgument);
        }
        if out.len() > MAX_PORTAL_TRANSFER {
            return Err(NanvixError::InvalidArgument);
        }
        self.control.signal(portal_sync_bit(remote))?;
        self.buffer.await_exact(out.len(), out)
    }

    /// Same as [`receive`](Self::receive) but gives up after `timeout_ms`
    /// milliseconds, returning `Err(NanvixError::Unavailable)` instead of
    /// blocking forever (§5 Cancellation and timeouts; test-harness use only).
    pub fn receive_timeout(&self, remote: NodeId, out: &mut [u8], timeout_ms: u64) -> Result<()> {
        if !is_valid_node(remote) {
            return Err(NanvixError::InvalidArgument);
        }
        if out.len() > MAX_PORTAL_TRANSFER {
            return Err(NanvixError::InvalidArgument);
        }
        self.control.signal(portal_sync_bit(remote))?;
        self.buffer.await_exact_timeout(out.len(), out, timeout_ms)
    }

    pub fn unlink(self) {
        SyncChannel::unlink_by_name(&self.pathname);
        PortalBuffer::unlink_by_name(&self.buf_pathname);
    }
}

impl SendPortal {
    /// Open a portal toward `remote`'s receive side from `local`.
    pub fn open(local: NodeId, remote: NodeId) -> Result<Self> {
        if !is_valid_node(local) || !is_valid_node(remote) {
            return Err(NanvixError::InvalidArgument);
        }
        let pathname = connector_pathname(Purpose::Portal, remote);
        let buf_pathname = format!("{pathname}_BUF_");
        let control = SyncChannel::open(&pathname)?;
        let buffer = PortalBuffer::open(&buf_pathname, MAX_PORTAL_TRANSFER)?;
        Ok(Self { control, buffer, remote_bit: portal_sync_bit(local) })
    }

    /// Wait for the receiver to arm, then publish `buf` synchronously (I3:
    /// either all of `buf` is observed on the other side, or none of it is).
    pub fn send(&self, buf: &[u8]) -> Result<()> {
        if buf.len() > MAX_PORTAL_TRANSFER {
            return Err(NanvixError::InvalidArgument);
        }
        self.control.wait_match(self.remote_bit)?;
        self.control.reset();
        self.buffer.publish(buf)
    }
}
