// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Mailbox connector lifecycle (§4.3): node-addressed fixed-frame queues.
// `mailbox_create`/`mailbox_open` in the source accept a "name or node"
// argument; every call site that matters to this core (name service,
// SHM server, spawner ack) ultimately resolves to a node ID before
// touching the NoC, so this module addresses mailboxes purely by
// `NodeId` (the name/address resolution itself is the name service's job,
// §4.6) — recorded as a resolved Open Question in DESIGN.md.

use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};

use crate::error::{NanvixError, Result};
use crate::noc::{connector_pathname, MailboxQueue, MAILBOX_MSG_SIZE};
use crate::topology::{is_valid_node, NodeId, Purpose};

fn input_registry() -> &'static Mutex<HashSet<NodeId>> {
    static REGISTRY: OnceLock<Mutex<HashSet<NodeId>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashSet::new()))
}

/// An input mailbox: owned by exactly one node (§3). Only one may exist per
/// node at a time — a second `create` for the same node fails with
/// `AlreadyExists`, mirroring "fails ... if already linked".
pub struct InputMailbox {
    queue: MailboxQueue,
    node: NodeId,
    pathname: String,
}

/// A transient output mailbox opened toward a peer node.
pub struct OutputMailbox {
    queue: MailboxQueue,
    node: NodeId,
}

impl InputMailbox {
    pub fn create(node: NodeId) -> Result<Self> {
        if !is_valid_node(node) {
            return Err(NanvixError::InvalidArgument);
        }
        {
            let mut registry = input_registry().lock().unwrap();
            if !registry.insert(node) {
                return Err(NanvixError::AlreadyExists);
            }
        }
        let pathname = connector_pathname(Purpose::Mailbox, node);
        match MailboxQueue::open(&pathname) {
            Ok(queue) => Ok(Self { queue, node, pathname }),
            Err(e) => {
                input_registry().lock().unwrap().remove(&node);
                Err(e)
            }
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Block until one frame is available.
    pub fn read(&self) -> Result<[u8; MAILBOX_MSG_SIZE]> {
        self.queue.pop()
    }

    /// Same as [`read`](Self::read) but gives up after `timeout_ms`
    /// milliseconds, returning `Err(NanvixError::Unavailable)` instead of
    /// blocking forever (§5 Cancellation and timeouts; test-harness use only).
    pub fn read_timeout(&self, timeout_ms: u64) -> Result<[u8; MAILBOX_MSG_SIZE]> {
        self.queue.pop_timeout(timeout_ms)
    }

    /// Same as [`read`](Self::read) into caller-supplied storage; fails with
    /// `InvalidArgument` unless `buf.len() == MAILBOX_MSG_SIZE` (I4).
    pub fn read_into(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() != MAILBOX_MSG_SIZE {
            return Err(NanvixError::InvalidArgument);
        }
        let frame = self.queue.pop()?;
        buf.copy_from_slice(&frame);
        Ok(())
    }

    /// `mailbox_unlink`: only the owning node may remove its own input
    /// mailbox, consumed by value since unlink invalidates the handle (I1).
    pub fn unlink(self) {
        input_registry().lock().unwrap().remove(&self.node);
        MailboxQueue::unlink_by_name(&self.pathname);
    }
}

impl OutputMailbox {
    pub fn open(node: NodeId) -> Result<Self> {
        if !is_valid_node(node) {
            return Err(NanvixError::InvalidArgument);
        }
        let pathname = connector_pathname(Purpose::Mailbox, node);
        let queue = MailboxQueue::open(&pathname)?;
        Ok(Self { queue, node })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn write(&self, frame: &[u8; MAILBOX_MSG_SIZE]) -> Result<()> {
        self.queue.push(frame)
    }

    /// Fails with `InvalidArgument` unless `buf.len() == MAILBOX_MSG_SIZE` (I4).
    pub fn write_slice(&self, buf: &[u8]) -> Result<()> {
        if buf.len() != MAILBOX_MSG_SIZE {
            return Err(NanvixError::InvalidArgument);
        }
        let mut frame = [0u8; MAILBOX_MSG_SIZE];
        frame.copy_from_slice(buf);
        self.write(&frame)
    }

    /// `mailbox_close`: output mailboxes are transient descriptors; closing
    /// just drops the handle (no backing storage to remove, §3/§4.3).
    pub fn close(self) {}
}
