// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// N-party barrier rendezvous (§4.5), layered entirely on the sync
// primitives in `sync_primitive`. Two topologies: a two-party IO↔IO
// barrier, and a master/workers barrier where the master is compute-node 0.
// A small per-node pool bounds how many barriers may be live at once (I2):
// `alloc` returns `Exhausted(BarrierPool)` once a node's pool is full,
// mirroring `barrier_alloc`'s `-ENOENT`.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use crate::error::{ExhaustedKind, NanvixError, Result};
use crate::sync_primitive::{SyncReceiver, SyncSender, SyncType};
use crate::topology::{is_valid_node, NodeId, CCLUSTER0};

/// Maximum simultaneous barriers per node (§3's "source uses 3").
pub const NR_BARRIER: usize = 3;

fn pool() -> &'static Mutex<HashMap<NodeId, usize>> {
    static POOL: OnceLock<Mutex<HashMap<NodeId, usize>>> = OnceLock::new();
    POOL.get_or_init(|| Mutex::new(HashMap::new()))
}

fn pool_alloc(node: NodeId) -> Result<()> {
    let mut table = pool().lock().unwrap();
    let count = table.entry(node).or_insert(0);
    if *count >= NR_BARRIER {
        return Err(NanvixError::Exhausted(ExhaustedKind::BarrierPool));
    }
    *count += 1;
    Ok(())
}

fn pool_free(node: NodeId) {
    let mut table = pool().lock().unwrap();
    if let Some(count) = table.get_mut(&node) {
        *count = count.saturating_sub(1);
    }
}

/// Two-party barrier between a pair of I/O clusters.
pub struct IoIoBarrier {
    local: NodeId,
    rx: SyncReceiver,
    tx: SyncSender,
}

impl IoIoBarrier {
    pub fn create(local: NodeId, remote: NodeId) -> Result<Self> {
        if !is_valid_node(local) || !is_valid_node(remote) {
            return Err(NanvixError::InvalidArgument);
        }
        pool_alloc(local)?;
        let rx = match SyncReceiver::create(local, &[remote], SyncType::OneToOne) {
            Ok(rx) => rx,
            Err(e) => {
                pool_free(local);
                return Err(e);
            }
        };
        let tx = match SyncSender::allow(local, remote, SyncType::OneToOne) {
            Ok(tx) => tx,
            Err(e) => {
                pool_free(local);
                return Err(e);
            }
        };
        Ok(Self { local, rx, tx })
    }

    /// Signal the remote side and block until it has signalled back.
    pub fn wait(&self) -> Result<()> {
        self.tx.signal()?;
        self.rx.wait()
    }

    pub fn close(self) {
        self.rx.close();
        pool_free(self.local);
    }
}

/// Master side of a master/workers barrier; must run on compute-node 0.
pub struct MasterBarrier {
    local: NodeId,
    rx: SyncReceiver,
    tx: SyncSender,
}

/// Worker side of a master/workers barrier.
pub struct WorkerBarrier {
    local: NodeId,
    rx: SyncReceiver,
    tx: SyncSender,
}

impl MasterBarrier {
    pub fn create(workers: &[NodeId]) -> Result<Self> {
        let local = CCLUSTER0;
        if workers.iter().any(|&n| !is_valid_node(n)) {
            return Err(NanvixError::InvalidArgument);
        }
        pool_alloc(local)?;
        let rx = match SyncReceiver::create(local, workers, SyncType::AllToOne) {
            Ok(rx) => rx,
            Err(e) => {
                pool_free(local);
                return Err(e);
            }
        };
        let tx = match SyncSender::allow_many(local, workers, SyncType::OneToAll) {
            Ok(tx) => tx,
            Err(e) => {
                pool_free(local);
                return Err(e);
            }
        };
        Ok(Self { local, rx, tx })
    }

    /// Wait for every worker's bit to arrive, then broadcast the release.
    pub fn wait(&self) -> Result<()> {
        self.rx.wait()?;
        self.tx.signal()
    }

    pub fn close(self) {
        self.rx.close();
        pool_free(self.local);
    }
}

impl WorkerBarrier {
    pub fn create(local: NodeId) -> Result<Self> {
        if !is_valid_node(local) {
            return Err(NanvixError::InvalidArgument);
        }
        let master = CCLUSTER0;
        pool_alloc(local)?;
        let rx = match SyncReceiver::create(local, &[master], SyncType::OneToOne) {
            Ok(rx) => rx,
            Err(e) => {
                pool_free(local);
                return Err(e);
            }
        };
        let tx = match SyncSender::allow(local, master, SyncType::OneToOne) {
            Ok(tx) => tx,
            Err(e) => {
                pool_free(local);
                return Err(e);
            }
        };
        Ok(Self { local, rx, tx })
    }

    /// Signal arrival to the master, then block for the release broadcast.
    pub fn wait(&self) -> Result<()> {
        self.tx.signal()?;
        self.rx.wait()
    }

    pub fn close(self) {
        self.rx.close();
        pool_free(self.local);
    }
}
