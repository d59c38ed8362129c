// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Spawner bring-up (§4.9): each declared server runs on its own thread,
// acks the spawner once its state is initialized, the spawner waits for
// every ack, optionally rendezvous with a peer spawner over a dedicated
// barrier, invokes the user's `main2`, then tears every server down in
// reverse bring-up order via a `SHUTDOWN_OPCODE` sentinel frame — the
// generic server loop (§4.7) otherwise has no way to stop a `run()` that
// waits on its input mailbox forever.

use crate::barrier::IoIoBarrier;
use crate::error::{IoErrorKind, NanvixError, Result};
use crate::mailbox::{InputMailbox, OutputMailbox};
use crate::noc::MAILBOX_MSG_SIZE;
use crate::server::{RequestHandler, SHUTDOWN_OPCODE};
use crate::topology::NodeId;
use crate::wire::FrameHeader;

const ACK_OPCODE: u16 = 0xFFFF;

/// A server calls this once its own state is initialized, from inside its
/// `main` closure, to unblock the spawner's bring-up wait (§4.9 step 2).
pub fn spawner_ack(server_node: NodeId, spawner_node: NodeId) -> Result<()> {
    let out = OutputMailbox::open(spawner_node)?;
    let mut frame = [0u8; MAILBOX_MSG_SIZE];
    FrameHeader { opcode: ACK_OPCODE, source: server_node as u16, seq: 0 }.encode(&mut frame);
    out.write(&frame)?;
    out.close();
    Ok(())
}

/// Wraps a `RequestHandler` so its `ServerLoop` stops cleanly on a
/// `SHUTDOWN_OPCODE` frame from the spawner, instead of blocking forever on
/// its input mailbox (§4.9's reverse-order teardown needs somewhere to
/// land).
pub struct Managed<H> {
    inner: H,
    stop: bool,
}

impl<H> Managed<H> {
    pub fn new(inner: H) -> Self {
        Self { inner, stop: false }
    }

    pub fn into_inner(self) -> H {
        self.inner
    }
}

impl<H: RequestHandler> RequestHandler for Managed<H> {
    fn handle(&mut self, source: NodeId, frame: &[u8; MAILBOX_MSG_SIZE]) -> Option<[u8; MAILBOX_MSG_SIZE]> {
        let header = FrameHeader::decode(frame);
        if header.opcode == SHUTDOWN_OPCODE {
            self.stop = true;
            return None;
        }
        self.inner.handle(source, frame)
    }

    fn should_stop(&self) -> bool {
        self.stop
    }
}

/// One server this spawner brings up: a node to run it on and the closure
/// that builds and drives it (typically a `ServerLoop<Managed<H>>::run()`).
pub struct ServerEntry {
    pub name: String,
    pub node: NodeId,
    main: Box<dyn FnOnce() + Send + 'static>,
}

impl ServerEntry {
    pub fn new(name: impl Into<String>, node: NodeId, main: impl FnOnce() + Send + 'static) -> Self {
        Self { name: name.into(), node, main: Box::new(main) }
    }
}

pub struct SpawnerConfig {
    pub node: NodeId,
    pub servers: Vec<ServerEntry>,
}

/// A running spawner: bring-up is complete by the time [`bring_up`](Self::bring_up)
/// returns; call [`run_main2_and_teardown`](Self::run_main2_and_teardown) to
/// finish the lifecycle.
pub struct Spawner {
    node: NodeId,
    inbox: InputMailbox,
    handles: Vec<(NodeId, std::thread::JoinHandle<()>)>,
}

impl Spawner {
    /// Spawn every declared server and block until all have acked
    /// (§4.9 steps 1-3).
    pub fn bring_up(config: SpawnerConfig) -> Result<Self> {
        println!("[nanvix][spawner] booting up spawner on node {}", config.node);
        let inbox = InputMailbox::create(config.node)?;
        let n_servers = config.servers.len();
        let mut handles = Vec::with_capacity(n_servers);
        for entry in config.servers {
            println!("[nanvix][spawner] starting server '{}' on node {}", entry.name, entry.node);
            handles.push((entry.node, std::thread::spawn(entry.main)));
        }
        for _ in 0..n_servers {
            let frame = inbox.read()?;
            let header = FrameHeader::decode(&frame);
            if header.opcode != ACK_OPCODE {
                inbox.unlink();
                return Err(NanvixError::InvalidArgument);
            }
        }
        println!("[nanvix][spawner] all {n_servers} servers acked, spawner alive on node {}", config.node);
        Ok(Self { node: config.node, inbox, handles })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Cross-spawner synchronization before invoking user `main2`
    /// (§4.9 step 4), via a dedicated two-party barrier with `peer`.
    pub fn sync_with_peer(&self, peer: NodeId) -> Result<()> {
        let barrier = IoIoBarrier::create(self.node, peer)?;
        barrier.wait()?;
        barrier.close();
        Ok(())
    }

    /// Run the user's `main2`, then tear every managed server down in
    /// reverse bring-up order (§4.9 step 5).
    pub fn run_main2_and_teardown(mut self, main2: impl FnOnce()) -> Result<()> {
        main2();
        self.teardown()?;
        self.inbox.unlink();
        Ok(())
    }

    fn teardown(&mut self) -> Result<()> {
        println!("[nanvix][spawner] shutting down spawner on node {}", self.node);
        while let Some((node, handle)) = self.handles.pop() {
            let out = OutputMailbox::open(node)?;
            let mut frame = [0u8; MAILBOX_MSG_SIZE];
            FrameHeader { opcode: SHUTDOWN_OPCODE, source: self.node as u16, seq: 0 }.encode(&mut frame);
            out.write(&frame)?;
            out.close();
            handle.join().map_err(|_| NanvixError::Io(IoErrorKind::Other))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::ServerLoop;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    static COUNTER: AtomicU32 = AtomicU32::new(7000);

    fn fresh_node() -> NodeId {
        COUNTER.fetch_add(1, Ordering::Relaxed) as NodeId % crate::topology::NANVIX_NR_NODES
    }

    struct Counting(std::sync::Arc<AtomicUsize>);
    impl RequestHandler for Counting {
        fn handle(&mut self, _source: NodeId, _frame: &[u8; MAILBOX_MSG_SIZE]) -> Option<[u8; MAILBOX_MSG_SIZE]> {
            self.0.fetch_add(1, Ordering::SeqCst);
            None
        }
    }

    #[test]
    fn bring_up_waits_for_every_ack_then_tears_down() {
        let spawner_node = fresh_node();
        let server_node = fresh_node();
        let handled = std::sync::Arc::new(AtomicUsize::new(0));
        let handled_clone = handled.clone();

        let config = SpawnerConfig {
            node: spawner_node,
            servers: vec![ServerEntry::new("echo", server_node, move || {
                let mut loop_ = ServerLoop::new(server_node, Managed::new(Counting(handled_clone))).unwrap();
                spawner_ack(server_node, spawner_node).unwrap();
                loop_.run().unwrap();
                loop_.unlink();
            })],
        };

        let spawner = Spawner::bring_up(config).unwrap();
        spawner.run_main2_and_teardown(|| {}).unwrap();
        // Only the ack was processed before teardown; no real requests sent.
        assert_eq!(handled.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn two_spawner_peer_sync_rendezvous() {
        let a = fresh_node();
        let b = fresh_node();
        let config_a = SpawnerConfig { node: a, servers: vec![] };
        let config_b = SpawnerConfig { node: b, servers: vec![] };
        let spawner_a = Spawner::bring_up(config_a).unwrap();
        let spawner_b = Spawner::bring_up(config_b).unwrap();

        let t = std::thread::spawn(move || {
            spawner_b.sync_with_peer(a).unwrap();
            spawner_b.run_main2_and_teardown(|| {}).unwrap();
        });
        spawner_a.sync_with_peer(b).unwrap();
        t.join().unwrap();

        spawner_a.run_main2_and_teardown(|| {}).unwrap();
    }
}
