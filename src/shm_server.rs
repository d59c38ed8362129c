// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Shared-memory region server (§4.8), the case study built on the generic
// resource-server loop (§4.7). State lives entirely inside one `ShmServer`
// instance owned by whichever node's `ServerLoop` drives it: a fixed-size
// region table, a `name -> shmid` index, and a per-calling-node open table.
// `create`/`create_excl`/`open` are two-frame requests; everything else is
// single-frame.
//
// Both bugs the original source carried are fixed here (§9): `create_excl`
// delegates to `create`'s logic with the uniform `(name, mode, writable)`
// argument order, and `map`'s writable check is `!open.writable && writable`
// (fail only when the caller wants write access an existing open doesn't
// have), not the precedence-broken version in the source.

use std::collections::HashMap;

use crate::error::{ExhaustedKind, NanvixError, PermissionKind, Result};
use crate::noc::MAILBOX_MSG_SIZE;
use crate::server::{PendingSlots, RequestHandler};
use crate::topology::NodeId;
use crate::wire::{self, FrameHeader};

/// Total size of the backing RMEM region every shared region is carved out
/// of (§3's "external RMEM provides a contiguous byte region").
pub const RMEM_SIZE: usize = 1 << 24;

const NR_SHM_REGIONS: usize = 64;
const SHM_OPEN_MAX: usize = 16;
const SLAB_SIZE: usize = RMEM_SIZE / NR_SHM_REGIONS;

pub const NAME_MAX: usize = crate::name::NAME_MAX;

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() >= NAME_MAX {
        return Err(NanvixError::InvalidArgument);
    }
    Ok(())
}

struct Region {
    owner: NodeId,
    mode: u16,
    base: usize,
    size: usize,
    refcount: usize,
    remove_pending: bool,
}

#[derive(Clone, Copy)]
struct OpenEntry {
    shmid: usize,
    writable: bool,
    shared: bool,
    mapped: bool,
}

#[derive(Clone, Copy)]
enum PendingKind {
    Create,
    CreateExcl,
    Open,
}

/// One node's shared-memory region server. Drive it with a
/// `ServerLoop<ShmServer>`.
pub struct ShmServer {
    regions: Vec<Option<Region>>,
    name_to_id: HashMap<String, usize>,
    opens: HashMap<NodeId, Vec<OpenEntry>>,
    pending: PendingSlots<(PendingKind, String)>,
}

impl Default for ShmServer {
    fn default() -> Self {
        Self::new()
    }
}

impl ShmServer {
    pub fn new() -> Self {
        let mut regions = Vec::with_capacity(NR_SHM_REGIONS);
        regions.resize_with(NR_SHM_REGIONS, || None);
        Self { regions, name_to_id: HashMap::new(), opens: HashMap::new(), pending: PendingSlots::new() }
    }

    fn open_table_full(&self, caller: NodeId) -> bool {
        self.opens.get(&caller).map(|v| v.len() >= SHM_OPEN_MAX).unwrap_or(false)
    }

    fn push_open(&mut self, caller: NodeId, entry: OpenEntry) {
        self.opens.entry(caller).or_default().push(entry);
    }

    fn find_open(&self, caller: NodeId, shmid: usize) -> Option<usize> {
        self.opens.get(&caller)?.iter().position(|e| e.shmid == shmid)
    }

    fn region(&self, shmid: usize) -> Result<&Region> {
        self.regions.get(shmid).and_then(|r| r.as_ref()).ok_or(NanvixError::InvalidArgument)
    }

    fn region_mut(&mut self, shmid: usize) -> Result<&mut Region> {
        self.regions.get_mut(shmid).and_then(|r| r.as_mut()).ok_or(NanvixError::InvalidArgument)
    }

    fn any_open_mapped(&self, shmid: usize) -> bool {
        self.opens.values().flatten().any(|e| e.shmid == shmid && e.mapped)
    }

    fn allocate_region(&mut self, caller: NodeId, mode: u16) -> Result<usize> {
        let slot = self.regions.iter().position(|r| r.is_none()).ok_or(NanvixError::Unavailable)?;
        if self.open_table_full(caller) {
            return Err(NanvixError::Exhausted(ExhaustedKind::Table));
        }
        self.regions[slot] = Some(Region {
            owner: caller,
            mode,
            base: slot * SLAB_SIZE,
            size: 0,
            refcount: 1,
            remove_pending: false,
        });
        Ok(slot)
    }

    /// `create(name, mode, writable)`: if `name` already exists, behaves as
    /// [`open`](Self::open).
    pub fn create(&mut self, caller: NodeId, name: &str, mode: u16, writable: bool) -> Result<usize> {
        validate_name(name)?;
        if let Some(&shmid) = self.name_to_id.get(name) {
            return self.open(caller, name, writable).map(|_| shmid);
        }
        let shmid = self.allocate_region(caller, mode)?;
        self.name_to_id.insert(name.to_string(), shmid);
        self.push_open(caller, OpenEntry { shmid, writable, shared: false, mapped: false });
        Ok(shmid)
    }

    /// `create_excl(name, mode, writable)`: fails with `AlreadyExists` if
    /// `name` is already bound, otherwise identical to `create`'s
    /// not-found branch (uniform argument order, §9 bug fix).
    pub fn create_excl(&mut self, caller: NodeId, name: &str, mode: u16, writable: bool) -> Result<usize> {
        validate_name(name)?;
        if self.name_to_id.contains_key(name) {
            return Err(NanvixError::AlreadyExists);
        }
        let shmid = self.allocate_region(caller, mode)?;
        self.name_to_id.insert(name.to_string(), shmid);
        self.push_open(caller, OpenEntry { shmid, writable, shared: false, mapped: false });
        Ok(shmid)
    }

    pub fn open(&mut self, caller: NodeId, name: &str, writable: bool) -> Result<usize> {
        validate_name(name)?;
        let shmid = *self.name_to_id.get(name).ok_or(NanvixError::NotFound)?;
        {
            let region = self.region(shmid)?;
            if region.remove_pending {
                return Err(NanvixError::Unavailable);
            }
        }
        if self.open_table_full(caller) {
            return Err(NanvixError::Exhausted(ExhaustedKind::Table));
        }
        self.region_mut(shmid)?.refcount += 1;
        self.push_open(caller, OpenEntry { shmid, writable, shared: false, mapped: false });
        Ok(shmid)
    }

    pub fn close(&mut self, caller: NodeId, shmid: usize) -> Result<()> {
        self.region(shmid)?;
        let idx = self.find_open(caller, shmid).ok_or(NanvixError::PermissionDenied(PermissionKind::Access))?;
        self.opens.get_mut(&caller).unwrap().remove(idx);
        let region = self.region_mut(shmid)?;
        region.refcount = region.refcount.saturating_sub(1);
        if region.refcount == 0 && region.remove_pending {
            self.name_to_id.retain(|_, &mut id| id != shmid);
            self.regions[shmid] = None;
        }
        Ok(())
    }

    /// Marks the region remove-pending; the `name -> shmid` mapping survives
    /// so a racing `open` still resolves the name and observes
    /// `remove_pending` (§8 scenario 6). Physical release, and removal of
    /// the mapping, happens once the last reference drops via
    /// [`close`](Self::close).
    pub fn unlink(&mut self, caller: NodeId, name: &str) -> Result<()> {
        validate_name(name)?;
        let shmid = *self.name_to_id.get(name).ok_or(NanvixError::NotFound)?;
        if self.region(shmid)?.owner != caller {
            return Err(NanvixError::PermissionDenied(PermissionKind::Owner));
        }
        let region = self.region_mut(shmid)?;
        region.remove_pending = true;
        if region.refcount == 0 {
            self.name_to_id.remove(name);
            self.regions[shmid] = None;
        }
        Ok(())
    }

    /// I8: fails with `Busy` if any node currently has this region mapped.
    pub fn truncate(&mut self, caller: NodeId, shmid: usize, size: usize) -> Result<()> {
        self.region(shmid)?;
        self.find_open(caller, shmid).ok_or(NanvixError::PermissionDenied(PermissionKind::Access))?;
        if size > RMEM_SIZE {
            return Err(NanvixError::NoMemory);
        }
        if self.any_open_mapped(shmid) {
            return Err(NanvixError::Busy);
        }
        self.region_mut(shmid)?.size = size;
        Ok(())
    }

    /// Returns `mapblk = region.base + off`.
    pub fn map(&mut self, caller: NodeId, shmid: usize, size: usize, writable: bool, shared: bool, off: usize) -> Result<usize> {
        let region_size = self.region(shmid)?.size;
        let region_base = self.region(shmid)?.base;
        let idx = self.find_open(caller, shmid).ok_or(NanvixError::PermissionDenied(PermissionKind::Access))?;
        let open_writable = self.opens.get(&caller).unwrap()[idx].writable;
        if writable && !open_writable {
            return Err(NanvixError::PermissionDenied(PermissionKind::Access));
        }
        if size > RMEM_SIZE {
            return Err(NanvixError::NoMemory);
        }
        if off.checked_add(size).map(|end| end > region_size).unwrap_or(true) {
            return Err(NanvixError::Range);
        }
        let entry = &mut self.opens.get_mut(&caller).unwrap()[idx];
        entry.mapped = true;
        entry.shared = shared;
        Ok(region_base + off)
    }

    pub fn unmap(&mut self, caller: NodeId, shmid: usize) -> Result<()> {
        self.region(shmid)?;
        let idx = self.find_open(caller, shmid).ok_or(NanvixError::PermissionDenied(PermissionKind::Access))?;
        self.opens.get_mut(&caller).unwrap()[idx].mapped = false;
        Ok(())
    }
}

const OPCODE_CREATE: u16 = 1;
const OPCODE_CREATE_EXCL: u16 = 2;
const OPCODE_OPEN: u16 = 3;
const OPCODE_CLOSE: u16 = 4;
const OPCODE_UNLINK: u16 = 5;
const OPCODE_TRUNCATE: u16 = 6;
const OPCODE_MAP: u16 = 7;
const OPCODE_UNMAP: u16 = 8;
const OPCODE_SUCCESS: u16 = 100;
const OPCODE_FAILURE: u16 = 101;

fn failure_frame(seq: u32, err: NanvixError) -> [u8; MAILBOX_MSG_SIZE] {
    let mut frame = [0u8; MAILBOX_MSG_SIZE];
    FrameHeader { opcode: OPCODE_FAILURE, source: 0, seq }.encode(&mut frame);
    wire::write_i32(&mut frame, 0, err.errno());
    frame
}

fn success_value_frame(seq: u32, value: u32) -> [u8; MAILBOX_MSG_SIZE] {
    let mut frame = [0u8; MAILBOX_MSG_SIZE];
    FrameHeader { opcode: OPCODE_SUCCESS, source: 0, seq }.encode(&mut frame);
    wire::write_u32(&mut frame, 0, value);
    frame
}

fn success_empty_frame(seq: u32) -> [u8; MAILBOX_MSG_SIZE] {
    let mut frame = [0u8; MAILBOX_MSG_SIZE];
    FrameHeader { opcode: OPCODE_SUCCESS, source: 0, seq }.encode(&mut frame);
    frame
}

impl RequestHandler for ShmServer {
    fn handle(&mut self, source: NodeId, frame: &[u8; MAILBOX_MSG_SIZE]) -> Option<[u8; MAILBOX_MSG_SIZE]> {
        let header = FrameHeader::decode(frame);
        match header.opcode {
            OPCODE_CREATE | OPCODE_CREATE_EXCL | OPCODE_OPEN if header.seq & 1 == 0 => {
                let name = match wire::read_str(frame, 0, NAME_MAX) {
                    Ok(n) => n,
                    Err(e) => return Some(failure_frame(header.seq, e)),
                };
                let kind = match header.opcode {
                    OPCODE_CREATE => PendingKind::Create,
                    OPCODE_CREATE_EXCL => PendingKind::CreateExcl,
                    _ => PendingKind::Open,
                };
                match self.pending.begin(source, header.seq, (kind, name)) {
                    Ok(()) => None,
                    Err(e) => Some(failure_frame(header.seq, e)),
                }
            }
            OPCODE_CREATE | OPCODE_CREATE_EXCL | OPCODE_OPEN => {
                let mode = wire::read_u16(frame, 0);
                let writable = wire::read_u16(frame, 2) != 0;
                let (kind, name) = match self.pending.complete(source, header.seq) {
                    Ok(v) => v,
                    Err(e) => return Some(failure_frame(header.seq, e)),
                };
                let result = match kind {
                    PendingKind::Create => self.create(source, &name, mode, writable),
                    PendingKind::CreateExcl => self.create_excl(source, &name, mode, writable),
                    PendingKind::Open => self.open(source, &name, writable),
                };
                Some(match result {
                    Ok(shmid) => success_value_frame(header.seq, shmid as u32),
                    Err(e) => failure_frame(header.seq, e),
                })
            }
            OPCODE_CLOSE => {
                let shmid = wire::read_u32(frame, 0) as usize;
                Some(match self.close(source, shmid) {
                    Ok(()) => success_empty_frame(header.seq),
                    Err(e) => failure_frame(header.seq, e),
                })
            }
            OPCODE_UNLINK => {
                let name = match wire::read_str(frame, 0, NAME_MAX) {
                    Ok(n) => n,
                    Err(e) => return Some(failure_frame(header.seq, e)),
                };
                Some(match self.unlink(source, &name) {
                    Ok(()) => success_empty_frame(header.seq),
                    Err(e) => failure_frame(header.seq, e),
                })
            }
            OPCODE_TRUNCATE => {
                let shmid = wire::read_u32(frame, 0) as usize;
                let size = wire::read_u32(frame, 4) as usize;
                Some(match self.truncate(source, shmid, size) {
                    Ok(()) => success_empty_frame(header.seq),
                    Err(e) => failure_frame(header.seq, e),
                })
            }
            OPCODE_MAP => {
                let shmid = wire::read_u32(frame, 0) as usize;
                let size = wire::read_u32(frame, 4) as usize;
                let writable = wire::read_u16(frame, 8) != 0;
                let shared = wire::read_u16(frame, 10) != 0;
                let off = wire::read_u32(frame, 12) as usize;
                Some(match self.map(source, shmid, size, writable, shared, off) {
                    Ok(mapblk) => success_value_frame(header.seq, mapblk as u32),
                    Err(e) => failure_frame(header.seq, e),
                })
            }
            OPCODE_UNMAP => {
                let shmid = wire::read_u32(frame, 0) as usize;
                Some(match self.unmap(source, shmid) {
                    Ok(()) => success_empty_frame(header.seq),
                    Err(e) => failure_frame(header.seq, e),
                })
            }
            _ => Some(failure_frame(header.seq, NanvixError::InvalidArgument)),
        }
    }
}
