// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Portal rendezvous throughput at a handful of transfer sizes (§4.4).
//
// Run with:
//   cargo bench --bench portal_ring
//
// Each iteration spawns a fresh sender thread bound to a distinct node pair
// so no two iterations race over the same simulated NoC connector; the
// thread-spawn cost is included in the measurement, matching how
// `bench_ipc.rs` in this crate's teacher measures `ipc::route` end to end
// rather than isolating the transport primitive in a microbenchmark.

use std::sync::atomic::{AtomicUsize, Ordering};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use nanvix_ipc::portal::{ReceivePortal, SendPortal};
use nanvix_ipc::NANVIX_NR_NODES;

const SIZES: &[(&str, usize)] = &[
    ("small_128", 128),
    ("medium_4096", 4096),
    ("large_65536", 65536),
];

static NEXT_NODE: AtomicUsize = AtomicUsize::new(0);

/// Two node IDs guaranteed distinct and not reused by a concurrent criterion
/// sample, so each bench iteration gets its own pair of simulated NoC
/// connectors.
fn fresh_node_pair() -> (usize, usize) {
    let base = NEXT_NODE.fetch_add(2, Ordering::Relaxed) % NANVIX_NR_NODES;
    let a = base;
    let b = (base + 1) % NANVIX_NR_NODES;
    (a, b)
}

fn bench_portal_rendezvous(c: &mut Criterion) {
    let mut group = c.benchmark_group("portal_rendezvous");

    for &(label, size) in SIZES {
        group.throughput(Throughput::Bytes(size as u64));
        let payload = vec![0xABu8; size];

        group.bench_with_input(BenchmarkId::from_parameter(label), &payload, |b, payload| {
            b.iter(|| {
                let (receiver_node, sender_node) = fresh_node_pair();
                let recv = ReceivePortal::create(receiver_node).unwrap();

                let payload = payload.clone();
                let sender = std::thread::spawn(move || {
                    let send = SendPortal::open(sender_node, receiver_node).unwrap();
                    send.send(&payload).unwrap();
                });

                let mut out = vec![0u8; size];
                recv.receive(sender_node, &mut out).unwrap();
                sender.join().unwrap();
                black_box(&out);
                recv.unlink();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_portal_rendezvous);
criterion_main!(benches);
