// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Generic resource-server loop shape (§4.7), shared by the name server and
// the SHM server: open one input mailbox, read-dispatch-reply, one request
// fully handled before the next frame is consumed. Two-frame requests (the
// SHM server's `create`/`create_excl`/`open`) are the handler's concern;
// this module only gives it somewhere to park the first frame via
// [`PendingSlots`].

use std::collections::HashMap;

use crate::error::{NanvixError, Result};
use crate::mailbox::{InputMailbox, OutputMailbox};
use crate::noc::MAILBOX_MSG_SIZE;
use crate::topology::{is_valid_node, NodeId};
use crate::wire::FrameHeader;

/// Sentinel opcode for the spawner's own clean-teardown signal (§4.9); no
/// protocol in §4.6/§4.8 uses this opcode value, so handlers are free to
/// check for it without colliding with real request opcodes.
pub const SHUTDOWN_OPCODE: u16 = 0xFFFE;

/// A server's per-request dispatch logic. `handle` is called once per frame
/// read off the input mailbox; returning `Some(reply)` sends that frame back
/// to `source`'s input mailbox, `None` either drops the frame (invalid
/// request) or means a two-frame sequence isn't complete yet.
pub trait RequestHandler {
    fn handle(&mut self, source: NodeId, frame: &[u8; MAILBOX_MSG_SIZE]) -> Option<[u8; MAILBOX_MSG_SIZE]>;

    /// Checked after every processed frame; `run` exits its loop once this
    /// returns `true`. Default: never stop (servers other than the spawner's
    /// managed children run forever).
    fn should_stop(&self) -> bool {
        false
    }
}

/// Owns the input mailbox and drives one handler's request/reply cycle.
pub struct ServerLoop<H: RequestHandler> {
    inbox: InputMailbox,
    handler: H,
}

impl<H: RequestHandler> ServerLoop<H> {
    /// Bring up the input mailbox and print the boot/alive breadcrumbs the
    /// original `shm-server.c` prints around its own `mailbox_create` call
    /// (`"[nanvix][shm] booting up server"` / `"... server alive"`).
    pub fn new(node: NodeId, handler: H) -> Result<Self> {
        println!("[nanvix][server] booting up server on node {node}");
        let inbox = InputMailbox::create(node)?;
        println!("[nanvix][server] server alive on node {node}");
        Ok(Self { inbox, handler })
    }

    pub fn node(&self) -> NodeId {
        self.inbox.node()
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Read one frame, validate `req.source`, dispatch, reply if the handler
    /// produced one. An invalid source node is dropped silently per §4.7 step 3.
    pub fn step(&mut self) -> Result<()> {
        let frame = self.inbox.read()?;
        let header = FrameHeader::decode(&frame);
        let source = header.source as NodeId;
        if !is_valid_node(source) {
            return Ok(());
        }
        if let Some(reply) = self.handler.handle(source, &frame) {
            let out = OutputMailbox::open(source)?;
            out.write(&reply)?;
            out.close();
        }
        Ok(())
    }

    /// Run until the handler signals it should stop (§4.9's reverse-order
    /// teardown relies on this via a `SHUTDOWN_OPCODE` frame).
    pub fn run(&mut self) -> Result<()> {
        while !self.handler.should_stop() {
            self.step()?;
        }
        Ok(())
    }

    pub fn unlink(self) {
        println!("[nanvix][server] shutting down server on node {}", self.inbox.node());
        self.inbox.unlink();
    }
}

/// Per-source pending slot for two-frame requests (I7): the first frame's
/// partial state is parked here until a matching second frame arrives.
pub struct PendingSlots<T> {
    slots: HashMap<NodeId, (u32, T)>,
}

impl<T> PendingSlots<T> {
    pub fn new() -> Self {
        Self { slots: HashMap::new() }
    }

    /// Park `partial` for `source` under `seq`. Fails with `AlreadyExists` if
    /// a slot is already pending for this source — a client may not interleave
    /// two open two-frame sequences.
    pub fn begin(&mut self, source: NodeId, seq: u32, partial: T) -> Result<()> {
        if self.slots.contains_key(&source) {
            return Err(NanvixError::AlreadyExists);
        }
        self.slots.insert(source, (seq, partial));
        Ok(())
    }

    /// Consume the slot for `source` if `seq` is the first frame's sequence
    /// number with its low bit set (`second.seq == first.seq | 1`, I7).
    /// Fails with `InvalidArgument` if there's no pending slot or the
    /// sequence doesn't match.
    pub fn complete(&mut self, source: NodeId, seq: u32) -> Result<T> {
        match self.slots.get(&source) {
            Some((pending_seq, _)) if seq == (pending_seq | 1) => Ok(self.slots.remove(&source).unwrap().1),
            _ => Err(NanvixError::InvalidArgument),
        }
    }

    pub fn is_pending(&self, source: NodeId) -> bool {
        self.slots.contains_key(&source)
    }
}

impl<T> Default for PendingSlots<T> {
    fn default() -> Self {
        Self::new()
    }
}
