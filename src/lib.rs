// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// IPC runtime and naming/service plane for a distributed many-core
// micro-kernel: sync/mailbox/portal NoC primitives (§4.2-4.4), barrier
// rendezvous (§4.5), a name service (§4.6), a generic resource-server loop
// (§4.7), an SHM server built on that loop (§4.8), and spawner/runtime
// bring-up (§4.9, §4.11). Built on the same shared-memory and
// synchronization primitives as the cpp-ipc library this crate grew out of
// — `ShmHandle`, `IpcMutex`, `IpcCondition`, `Waiter`, `ShmRing` — used here
// to simulate a NoC in software rather than to move bytes between
// unrelated host processes.

pub mod shm_name;

mod platform;

mod shm;
pub use shm::{ShmHandle, ShmOpenMode};

mod mutex;
pub use mutex::IpcMutex;

mod condition;
pub use condition::IpcCondition;

mod waiter;
pub use waiter::Waiter;

mod spin_lock;
pub use spin_lock::SpinLock;

mod proto;
pub use proto::ShmRing;

pub mod mem;

pub mod error;
pub use error::{ExhaustedKind, IoErrorKind, NanvixError, PermissionKind, Result};

pub mod topology;
pub use topology::{NodeId, Purpose, NANVIX_NR_NODES};

mod noc;
pub use noc::MAILBOX_MSG_SIZE;

mod wire;

pub mod sync_primitive;
pub use sync_primitive::{SyncReceiver, SyncSender, SyncType};

pub mod mailbox;
pub use mailbox::{InputMailbox, OutputMailbox};

pub mod portal;
pub use portal::{ReceivePortal, SendPortal};

pub mod barrier;
pub use barrier::{IoIoBarrier, MasterBarrier, WorkerBarrier};

pub mod name;
pub use name::{NameClient, NameServer};

pub mod server;
pub use server::{RequestHandler, ServerLoop};

pub mod shm_server;
pub use shm_server::ShmServer;

pub mod spawner;
pub use spawner::{spawner_ack, Managed, ServerEntry, Spawner, SpawnerConfig};

pub mod runtime;
pub use runtime::{Runtime, RuntimeLevel};
