// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Node numbering and NoC tag allocation. Pure functions only; no I/O, no
// shared state. Grounded on the fixed node layout assumed throughout
// `src/kernel/arch/mppa/barrier.c` and `src/kernel/arch/mppa256/portal.c`
// in the original sources (`IOCLUSTER0`/`IOCLUSTER1`/`CCLUSTER0..`).

/// Number of compute-cluster nodes.
pub const NR_CCLUSTER: usize = 16;

/// Number of I/O clusters (each hosting `NR_IOCLUSTER_DMA` DMA nodes).
pub const NR_IOCLUSTER: usize = 2;

/// Number of DMA-capable nodes per I/O cluster.
pub const NR_IOCLUSTER_DMA: usize = 4;

/// Total number of addressable nodes in the topology.
pub const NANVIX_NR_NODES: usize = NR_CCLUSTER + NR_IOCLUSTER * NR_IOCLUSTER_DMA;

/// Node ID of the master compute cluster (runs the primary spawner logic).
pub const CCLUSTER0: usize = 0;

/// First node ID belonging to I/O cluster 0.
pub const IOCLUSTER0: usize = NR_CCLUSTER;

/// First node ID belonging to I/O cluster 1.
pub const IOCLUSTER1: usize = NR_CCLUSTER + NR_IOCLUSTER_DMA;

/// A single addressable NoC endpoint.
pub type NodeId = usize;

/// The purpose a NoC tag is allocated for; tags never collide across purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    Sync,
    Mailbox,
    Portal,
    Barrier,
}

/// Whether `node` is a valid, in-range node ID.
pub const fn is_valid_node(node: NodeId) -> bool {
    node < NANVIX_NR_NODES
}

/// Whether `node` is a compute-cluster node.
pub const fn is_ccluster(node: NodeId) -> bool {
    node < NR_CCLUSTER
}

/// Whether `node` is an I/O-cluster DMA node (either I/O cluster).
pub const fn is_io_dma(node: NodeId) -> bool {
    (node >= IOCLUSTER0 && node < IOCLUSTER0 + NR_IOCLUSTER_DMA)
        || (node >= IOCLUSTER1 && node < IOCLUSTER1 + NR_IOCLUSTER_DMA)
}

/// The barrier NoC tag for `node`.
///
/// Bit-exact with `barrier_noctag()` in the original sources: `2` for any
/// I/O-cluster DMA node, `3` for compute-cluster node 0, `4` otherwise.
pub const fn barrier_noctag(node: NodeId) -> u32 {
    if is_io_dma(node) {
        2
    } else if node == CCLUSTER0 {
        3
    } else {
        4
    }
}

/// The portal NoC tag for `node`: a value distinct from every sync/mailbox
/// tag, deterministic per node.
pub const fn portal_noctag(node: NodeId) -> u32 {
    100 + node as u32
}

/// The mailbox NoC tag for `node`: distinct from sync/portal/barrier tags.
pub const fn mailbox_noctag(node: NodeId) -> u32 {
    200 + node as u32
}

/// A pure NoC-tag allocator, unifying the per-purpose rules above.
pub const fn noctag_for(purpose: Purpose, node: NodeId) -> u32 {
    match purpose {
        Purpose::Barrier => barrier_noctag(node),
        Purpose::Portal => portal_noctag(node),
        Purpose::Mailbox => mailbox_noctag(node),
        // Sync connectors used outside the barrier protocol (e.g. the portal
        // rendezvous control channel) share the barrier numbering space,
        // since both are single-bit handshake primitives over the same
        // underlying hardware sync descriptor.
        Purpose::Sync => barrier_noctag(node),
    }
}

/// The identification bit a reader signals on its control-sync channel,
/// per §4.4: compute nodes use `1 << node_id`; I/O-DMA nodes map to
/// dedicated upper bits, deterministic by `(cluster, dma_index)`.
pub const fn portal_sync_bit(node: NodeId) -> u64 {
    if node >= IOCLUSTER0 && node < IOCLUSTER0 + NR_IOCLUSTER_DMA {
        1u64 << (NR_CCLUSTER + (node - IOCLUSTER0))
    } else if node >= IOCLUSTER1 && node < IOCLUSTER1 + NR_IOCLUSTER_DMA {
        1u64 << (NR_CCLUSTER + NR_IOCLUSTER_DMA + (node - IOCLUSTER1))
    } else {
        1u64 << node
    }
}
