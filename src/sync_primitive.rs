// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Sync connector: single-bit identification handshake used directly by
// barriers and as the control channel for portal rendezvous. Grounded on
// `hal_sync_create`/`hal_sync_open`/`hal_sync_wait`/`hal_sync_signal` in
// `src/kernel/arch/mppa/sync.c` and the `MPPA_RX_SET_MATCH` /
// `MPPA_TX_SET_RX_RANKS` ioctl pair used throughout `barrier.c`/`portal.c`.

use crate::error::{NanvixError, Result};
use crate::noc::{connector_pathname, SyncChannel};
use crate::topology::{is_valid_node, NodeId, Purpose};

/// The two topologies a sync connector can be opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncType {
    /// One receiver waits for a single remote sender's bit.
    OneToOne,
    /// One receiver waits for every node in `nodes` to have signalled.
    AllToOne,
    /// One sender signals every node in `nodes` simultaneously.
    OneToAll,
}

/// A receive-side sync descriptor: owns the connector at the local node and
/// knows which bits it must observe before `wait` returns.
pub struct SyncReceiver {
    channel: SyncChannel,
    match_mask: u64,
    pathname: String,
    mode: SyncType,
}

/// A send-side sync descriptor: knows which remote connector(s) to signal.
pub struct SyncSender {
    remotes: Vec<(SyncChannel, u64)>,
    mode: SyncType,
}

impl SyncReceiver {
    /// Create the local sync connector for `local`, configured to wait for
    /// the bits identified by `senders` (mirrors `MPPA_RX_SET_MATCH`).
    ///
    /// `mode` states the caller's intended topology and is cross-checked
    /// against `senders`' shape (§4.2's "`EINVAL` for ... role conflict"):
    /// `OneToOne` requires exactly one sender, `AllToOne` requires at least
    /// one. A receiver can never be the `OneToAll` side — that role belongs
    /// to the broadcasting [`SyncSender::allow_many`].
    pub fn create(local: NodeId, senders: &[NodeId], mode: SyncType) -> Result<Self> {
        if !is_valid_node(local) || senders.iter().any(|&n| !is_valid_node(n)) {
            return Err(NanvixError::InvalidArgument);
        }
        match mode {
            SyncType::OneToOne if senders.len() == 1 => {}
            SyncType::AllToOne if !senders.is_empty() => {}
            _ => return Err(NanvixError::InvalidArgument),
        }
        let pathname = connector_pathname(Purpose::Sync, local);
        let channel = SyncChannel::open(&pathname)?;
        channel.reset();
        let match_mask = senders.iter().fold(0u64, |acc, &n| acc | crate::topology::portal_sync_bit(n));
        Ok(Self { channel, match_mask, pathname, mode })
    }

    /// The topology this receiver was created for.
    pub fn mode(&self) -> SyncType {
        self.mode
    }

    /// Block until every configured sender bit has arrived, then reset the
    /// connector for its next use.
    pub fn wait(&self) -> Result<()> {
        self.channel.wait_match(self.match_mask)?;
        self.channel.reset();
        Ok(())
    }

    /// Same as [`wait`](Self::wait) but bounded by `timeout_ms`, for test
    /// harnesses that must assert non-completion without hanging forever.
    pub fn wait_timeout(&self, timeout_ms: u64) -> Result<()> {
        self.channel.wait_match_timeout(self.match_mask, timeout_ms)?;
        self.channel.reset();
        Ok(())
    }

    pub fn close(self) {
        SyncChannel::unlink_by_name(&self.pathname);
    }
}

impl SyncSender {
    /// Open a sync sender addressed at a single remote node. `mode` must be
    /// `OneToOne` — a single point-to-point signal, whether it belongs to a
    /// two-party barrier or to one leg of a larger all-to-one topology.
    pub fn allow(local: NodeId, remote: NodeId, mode: SyncType) -> Result<Self> {
        if !is_valid_node(local) || !is_valid_node(remote) {
            return Err(NanvixError::InvalidArgument);
        }
        if mode != SyncType::OneToOne {
            return Err(NanvixError::InvalidArgument);
        }
        let pathname = connector_pathname(Purpose::Sync, remote);
        let channel = SyncChannel::open(&pathname)?;
        let bit = crate::topology::portal_sync_bit(local);
        Ok(Self { remotes: vec![(channel, bit)], mode })
    }

    /// Open a sync sender addressed at every node in `remotes`, all
    /// signalled with the same identification bit for `local` (used by the
    /// one-to-all barrier topology). `mode` must be `OneToAll`.
    pub fn allow_many(local: NodeId, remotes: &[NodeId], mode: SyncType) -> Result<Self> {
        if !is_valid_node(local) || remotes.iter().any(|&n| !is_valid_node(n)) {
            return Err(NanvixError::InvalidArgument);
        }
        if mode != SyncType::OneToAll || remotes.is_empty() {
            return Err(NanvixError::InvalidArgument);
        }
        let bit = crate::topology::portal_sync_bit(local);
        let mut out = Vec::with_capacity(remotes.len());
        for &remote in remotes {
            let pathname = connector_pathname(Purpose::Sync, remote);
            out.push((SyncChannel::open(&pathname)?, bit));
        }
        Ok(Self { remotes: out, mode })
    }

    /// The topology this sender was opened for.
    pub fn mode(&self) -> SyncType {
        self.mode
    }

    /// Signal every configured remote connector.
    pub fn signal(&self) -> Result<()> {
        for (channel, bit) in &self.remotes {
            channel.signal(*bit)?;
        }
        Ok(())
    }
}
