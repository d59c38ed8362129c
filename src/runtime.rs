// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Process bring-up ring every node-local process calls before touching IPC
// (§4.11 supplement). Two levels are exposed: `InboxOnly` just opens the
// per-core input mailbox; `WithName` additionally brings up a name-service
// client on that same mailbox (a node has exactly one input mailbox, §I1,
// so `WithName` doesn't open a second one — the `NameClient` owns it).
// Semaphores (the original's level 2) are out of scope and have no variant
// here. Setup/teardown is serialized by a process-wide lock mirroring the
// original's `runtime_lock`/`initialized[core_id]` bookkeeping, re-
// architected as an owned `Runtime` value instead of a global array (§9).

use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};

use crate::error::{NanvixError, Result};
use crate::mailbox::InputMailbox;
use crate::name::NameClient;
use crate::topology::{is_valid_node, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeLevel {
    /// Only the per-core input mailbox is brought up.
    InboxOnly,
    /// The input mailbox plus a name-service client against `name_server`.
    WithName,
}

fn runtime_lock() -> &'static Mutex<HashSet<NodeId>> {
    static LOCK: OnceLock<Mutex<HashSet<NodeId>>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(HashSet::new()))
}

enum RuntimeState {
    InboxOnly(InputMailbox),
    WithName(NameClient),
}

/// A node-local process's IPC bring-up state. Obtained from
/// [`setup`](Self::setup), released with [`cleanup`](Self::cleanup).
pub struct Runtime {
    core: NodeId,
    state: RuntimeState,
}

impl Runtime {
    /// Bring up `core`'s runtime ring at `level`. Fails with `AlreadyExists`
    /// if `core` already has a live runtime (mirrors `initialized[core_id]`
    /// already being set); rolls back cleanly on any partial failure so no
    /// half-initialized state is left behind.
    pub fn setup(core: NodeId, level: RuntimeLevel, name_server: NodeId) -> Result<Self> {
        if !is_valid_node(core) {
            return Err(NanvixError::InvalidArgument);
        }
        {
            let mut table = runtime_lock().lock().unwrap();
            if !table.insert(core) {
                return Err(NanvixError::AlreadyExists);
            }
        }
        let state = match level {
            RuntimeLevel::InboxOnly => InputMailbox::create(core).map(RuntimeState::InboxOnly),
            RuntimeLevel::WithName => NameClient::new(core, name_server).map(RuntimeState::WithName),
        };
        match state {
            Ok(state) => Ok(Self { core, state }),
            Err(e) => {
                runtime_lock().lock().unwrap().remove(&core);
                Err(e)
            }
        }
    }

    pub fn core(&self) -> NodeId {
        self.core
    }

    pub fn level(&self) -> RuntimeLevel {
        match self.state {
            RuntimeState::InboxOnly(_) => RuntimeLevel::InboxOnly,
            RuntimeState::WithName(_) => RuntimeLevel::WithName,
        }
    }

    pub fn name_client(&self) -> Option<&NameClient> {
        match &self.state {
            RuntimeState::WithName(client) => Some(client),
            RuntimeState::InboxOnly(_) => None,
        }
    }

    /// Tear down this core's runtime ring, freeing its `initialized[]` slot.
    pub fn cleanup(self) {
        match self.state {
            RuntimeState::InboxOnly(inbox) => inbox.unlink(),
            RuntimeState::WithName(client) => client.close(),
        }
        runtime_lock().lock().unwrap().remove(&self.core);
    }
}
