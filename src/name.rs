// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Name service (§4.6): a single-frame mailbox wire protocol for linking a
// name to a node, registering a name with a port, and looking either back
// up. `NameServer` implements `RequestHandler` so it runs under the same
// `ServerLoop` every other server uses (§4.7); `NameClient` is the
// process-wide, per-core client side with the one-outstanding-request lock
// and single EAGAIN retry described there.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::error::{NanvixError, PermissionKind, Result};
use crate::mailbox::{InputMailbox, OutputMailbox};
use crate::noc::MAILBOX_MSG_SIZE;
use crate::server::RequestHandler;
use crate::topology::{is_valid_node, NodeId};
use crate::wire::{self, FrameHeader};

/// Maximum name length, nul-terminator included in the fixed field width
/// (source's `NANVIX_PROC_NAME_MAX`, scaled to fit this frame's payload).
pub const NAME_MAX: usize = 48;

const NODE_OFFSET: usize = NAME_MAX;
const PORT_OFFSET: usize = NAME_MAX + 2;
const REPLY_NODE_OFFSET: usize = 0;
const REPLY_PORT_OFFSET: usize = 2;

const OPCODE_LINK: u16 = 1;
const OPCODE_UNLINK: u16 = 2;
const OPCODE_LOOKUP: u16 = 3;
const OPCODE_REGISTER: u16 = 4;
const OPCODE_UNREGISTER: u16 = 5;
const OPCODE_ADDRESS_LOOKUP: u16 = 6;
const OPCODE_SUCCESS: u16 = 100;
const OPCODE_FAILURE: u16 = 101;

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() >= NAME_MAX {
        return Err(NanvixError::InvalidArgument);
    }
    Ok(())
}

struct NameEntry {
    node: NodeId,
    port: Option<u16>,
    owner: NodeId,
}

/// Read-only snapshot of one live name-table entry (§4.10 diagnostics).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameEntryView {
    pub name: String,
    pub node: NodeId,
    pub port: Option<u16>,
}

/// The dynamic name table. One instance lives on whichever node hosts the
/// name service; drive it with a `ServerLoop<NameServer>`.
#[derive(Default)]
pub struct NameServer {
    table: HashMap<String, NameEntry>,
}

impl NameServer {
    pub fn new() -> Self {
        Self { table: HashMap::new() }
    }

    /// `link(node, name)`: associate `name` with `node`, owned by `caller`.
    /// Shares the table with `register` — a name already bound (linked or
    /// registered) cannot be re-linked.
    pub fn link(&mut self, caller: NodeId, name: &str, node: NodeId) -> Result<()> {
        validate_name(name)?;
        if !is_valid_node(node) {
            return Err(NanvixError::InvalidArgument);
        }
        if self.table.contains_key(name) {
            return Err(NanvixError::AlreadyExists);
        }
        self.table.insert(name.to_string(), NameEntry { node, port: None, owner: caller });
        Ok(())
    }

    pub fn unlink(&mut self, caller: NodeId, name: &str) -> Result<()> {
        validate_name(name)?;
        match self.table.get(name) {
            Some(entry) if entry.owner == caller => {
                self.table.remove(name);
                Ok(())
            }
            Some(_) => Err(NanvixError::PermissionDenied(PermissionKind::Owner)),
            None => Err(NanvixError::NotFound),
        }
    }

    /// Succeeds for both linked and registered names.
    pub fn lookup(&self, name: &str) -> Result<NodeId> {
        validate_name(name)?;
        self.table.get(name).map(|e| e.node).ok_or(NanvixError::NotFound)
    }

    /// `register(name, port)`: binds the caller's own node plus `port`;
    /// fails if the name already exists in either table.
    pub fn register(&mut self, caller: NodeId, name: &str, port: u16) -> Result<()> {
        validate_name(name)?;
        if self.table.contains_key(name) {
            return Err(NanvixError::AlreadyExists);
        }
        self.table.insert(name.to_string(), NameEntry { node: caller, port: Some(port), owner: caller });
        Ok(())
    }

    pub fn unregister(&mut self, caller: NodeId, name: &str) -> Result<()> {
        validate_name(name)?;
        match self.table.get(name) {
            Some(entry) if entry.port.is_none() => Err(NanvixError::NotFound),
            Some(entry) if entry.owner == caller => {
                self.table.remove(name);
                Ok(())
            }
            Some(_) => Err(NanvixError::PermissionDenied(PermissionKind::Owner)),
            None => Err(NanvixError::NotFound),
        }
    }

    /// Succeeds only if `name` was `register`ed, not merely `link`ed.
    pub fn address_lookup(&self, name: &str) -> Result<(NodeId, u16)> {
        validate_name(name)?;
        match self.table.get(name) {
            Some(entry) => entry.port.map(|p| (entry.node, p)).ok_or(NanvixError::NotFound),
            None => Err(NanvixError::NotFound),
        }
    }

    /// Read-only snapshot of the live table, for diagnostics and tests
    /// (§4.10) — supplements the original's static lookup table.
    pub fn dump(&self) -> Vec<NameEntryView> {
        self.table
            .iter()
            .map(|(name, e)| NameEntryView { name: name.clone(), node: e.node, port: e.port })
            .collect()
    }

    fn reply_for(&mut self, source: NodeId, header: FrameHeader, frame: &[u8; MAILBOX_MSG_SIZE]) -> [u8; MAILBOX_MSG_SIZE] {
        let name = match wire::read_str(frame, 0, NAME_MAX) {
            Ok(name) => name,
            Err(e) => return failure_frame(header.seq, e),
        };
        let outcome = match header.opcode {
            OPCODE_LINK => {
                let node = wire::read_u16(frame, NODE_OFFSET) as NodeId;
                self.link(source, &name, node).map(|_| (None, None))
            }
            OPCODE_UNLINK => self.unlink(source, &name).map(|_| (None, None)),
            OPCODE_LOOKUP => self.lookup(&name).map(|n| (Some(n), None)),
            OPCODE_REGISTER => {
                let port = wire::read_u16(frame, PORT_OFFSET);
                self.register(source, &name, port).map(|_| (None, None))
            }
            OPCODE_UNREGISTER => self.unregister(source, &name).map(|_| (None, None)),
            OPCODE_ADDRESS_LOOKUP => self.address_lookup(&name).map(|(n, p)| (Some(n), Some(p))),
            _ => Err(NanvixError::InvalidArgument),
        };
        match outcome {
            Ok((node, port)) => success_frame(header.seq, node, port),
            Err(e) => failure_frame(header.seq, e),
        }
    }
}

fn failure_frame(seq: u32, err: NanvixError) -> [u8; MAILBOX_MSG_SIZE] {
    let mut frame = [0u8; MAILBOX_MSG_SIZE];
    FrameHeader { opcode: OPCODE_FAILURE, source: 0, seq }.encode(&mut frame);
    wire::write_i32(&mut frame, 0, err.errno());
    frame
}

fn success_frame(seq: u32, node: Option<NodeId>, port: Option<u16>) -> [u8; MAILBOX_MSG_SIZE] {
    let mut frame = [0u8; MAILBOX_MSG_SIZE];
    FrameHeader { opcode: OPCODE_SUCCESS, source: 0, seq }.encode(&mut frame);
    if let Some(n) = node {
        wire::write_u16(&mut frame, REPLY_NODE_OFFSET, n as u16);
    }
    if let Some(p) = port {
        wire::write_u16(&mut frame, REPLY_PORT_OFFSET, p);
    }
    frame
}

impl RequestHandler for NameServer {
    fn handle(&mut self, source: NodeId, frame: &[u8; MAILBOX_MSG_SIZE]) -> Option<[u8; MAILBOX_MSG_SIZE]> {
        let header = FrameHeader::decode(frame);
        Some(self.reply_for(source, header, frame))
    }
}

/// Lets a spawner pre-seed a handful of well-known `(name, node)` pairs into
/// a fresh server at boot (§4.10), replacing the original's compiled-in
/// static lookup table with explicit, testable calls.
#[derive(Default)]
pub struct StaticTable {
    entries: Vec<(String, NodeId)>,
}

impl StaticTable {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn with(mut self, name: &str, node: NodeId) -> Self {
        self.entries.push((name.to_string(), node));
        self
    }

    /// Seed every configured pair into `server`, each owned by its own node.
    pub fn seed(&self, server: &mut NameServer) -> Result<()> {
        for (name, node) in &self.entries {
            server.link(*node, name, *node)?;
        }
        Ok(())
    }
}

/// The process-wide, per-core name-service client: a persistent input
/// mailbox plus a lock serializing outstanding requests from this core.
pub struct NameClient {
    core: NodeId,
    server: NodeId,
    inbox: InputMailbox,
    lock: Mutex<()>,
    seq: AtomicU32,
}

impl NameClient {
    pub fn new(core: NodeId, server: NodeId) -> Result<Self> {
        if !is_valid_node(server) {
            return Err(NanvixError::InvalidArgument);
        }
        let inbox = InputMailbox::create(core)?;
        Ok(Self { core, server, inbox, lock: Mutex::new(()), seq: AtomicU32::new(0) })
    }

    fn build_frame(&self, opcode: u16, name: &str) -> Result<[u8; MAILBOX_MSG_SIZE]> {
        validate_name(name)?;
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let mut frame = [0u8; MAILBOX_MSG_SIZE];
        FrameHeader { opcode, source: self.core as u16, seq }.encode(&mut frame);
        wire::write_str(&mut frame, 0, NAME_MAX, name)?;
        Ok(frame)
    }

    /// Send `frame` and block for the reply, retrying once if the server
    /// reports a transient `EAGAIN` (§4.7 client-side retry policy).
    fn send_and_wait(&self, frame: [u8; MAILBOX_MSG_SIZE]) -> Result<[u8; MAILBOX_MSG_SIZE]> {
        let _guard = self.lock.lock().unwrap();
        for attempt in 0..2 {
            let out = OutputMailbox::open(self.server)?;
            out.write(&frame)?;
            out.close();
            let reply = self.inbox.read()?;
            let header = FrameHeader::decode(&reply);
            if header.opcode == OPCODE_FAILURE {
                let err = NanvixError::from_errno(wire::read_i32(&reply, 0));
                if err == NanvixError::Unavailable && attempt == 0 {
                    continue;
                }
                return Err(err);
            }
            return Ok(reply);
        }
        unreachable!("loop above always returns by its second iteration")
    }

    pub fn link(&self, name: &str, node: NodeId) -> Result<()> {
        if !is_valid_node(node) {
            return Err(NanvixError::InvalidArgument);
        }
        let mut frame = self.build_frame(OPCODE_LINK, name)?;
        wire::write_u16(&mut frame, NODE_OFFSET, node as u16);
        self.send_and_wait(frame).map(|_| ())
    }

    pub fn unlink(&self, name: &str) -> Result<()> {
        let frame = self.build_frame(OPCODE_UNLINK, name)?;
        self.send_and_wait(frame).map(|_| ())
    }

    pub fn lookup(&self, name: &str) -> Result<NodeId> {
        let frame = self.build_frame(OPCODE_LOOKUP, name)?;
        let reply = self.send_and_wait(frame)?;
        Ok(wire::read_u16(&reply, REPLY_NODE_OFFSET) as NodeId)
    }

    pub fn register(&self, name: &str, port: u16) -> Result<()> {
        let mut frame = self.build_frame(OPCODE_REGISTER, name)?;
        wire::write_u16(&mut frame, PORT_OFFSET, port);
        self.send_and_wait(frame).map(|_| ())
    }

    pub fn unregister(&self, name: &str) -> Result<()> {
        let frame = self.build_frame(OPCODE_UNREGISTER, name)?;
        self.send_and_wait(frame).map(|_| ())
    }

    pub fn address_lookup(&self, name: &str) -> Result<(NodeId, u16)> {
        let frame = self.build_frame(OPCODE_ADDRESS_LOOKUP, name)?;
        let reply = self.send_and_wait(frame)?;
        let node = wire::read_u16(&reply, REPLY_NODE_OFFSET) as NodeId;
        let port = wire::read_u16(&reply, REPLY_PORT_OFFSET);
        Ok((node, port))
    }

    pub fn close(self) {
        self.inbox.unlink();
    }
}
