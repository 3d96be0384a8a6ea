// model = "claude-opus-4-5"
// created = 2026-10-19
// modified = 2026-10-19
// driver = "Isaac Clayton"

//! Benchmarks for local editing, update encoding and remote apply.
//!
//! Run with: cargo bench --bench sync_bench

use criterion::{
    black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput,
};
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use tandem::Doc;
use tandem::ReadTxn;
use tandem::StateVector;

// =============================================================================
// Workloads
// =============================================================================

/// Type `count` characters at the end, one transaction per keystroke.
fn type_forward(doc: &mut Doc, count: usize) {
    let text = doc.get_or_insert_text("t").unwrap();
    for i in 0..count {
        let mut txn = doc.transact();
        let len = text.len(&txn);
        let ch = (b'a' + (i % 26) as u8) as char;
        text.insert(&mut txn, len, ch.encode_utf8(&mut [0; 4])).unwrap();
        txn.commit();
    }
}

/// Mixed inserts and deletes at random positions.
fn random_edits(doc: &mut Doc, ops: usize, rng: &mut StdRng) {
    let text = doc.get_or_insert_text("t").unwrap();
    for _ in 0..ops {
        let mut txn = doc.transact();
        let len = text.len(&txn);
        // 70% insert, 30% delete
        if len == 0 || rng.gen_bool(0.7) {
            let pos = rng.gen_range(0..=len);
            let ch = rng.gen_range(b'a'..=b'z') as char;
            text.insert(&mut txn, pos, ch.encode_utf8(&mut [0; 4])).unwrap();
        } else {
            let pos = rng.gen_range(0..len);
            text.remove_range(&mut txn, pos, 1).unwrap();
        }
        txn.commit();
    }
}

/// Two replicas edit concurrently, returning their updates.
fn concurrent_updates(ops: usize) -> Vec<Vec<u8>> {
    let mut rng = StdRng::seed_from_u64(42);
    let mut updates = Vec::new();
    for replica in 1..=2u64 {
        let mut doc = Doc::with_replica_id(replica);
        random_edits(&mut doc, ops, &mut rng);
        updates.push(doc.encode_state_diff(None).unwrap());
    }
    return updates;
}

// =============================================================================
// Local editing
// =============================================================================

fn bench_local_editing(c: &mut Criterion) {
    let mut group = c.benchmark_group("local_editing");

    for size in [100, 1000, 5000] {
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("type_forward", size), &size, |b, &size| {
            b.iter(|| {
                let mut doc = Doc::with_replica_id(1);
                type_forward(&mut doc, size);
                black_box(doc.state_vector())
            });
        });

        group.bench_with_input(BenchmarkId::new("random_edits", size), &size, |b, &size| {
            b.iter(|| {
                let mut rng = StdRng::seed_from_u64(7);
                let mut doc = Doc::with_replica_id(1);
                random_edits(&mut doc, size, &mut rng);
                black_box(doc.state_vector())
            });
        });
    }

    group.finish();
}

// =============================================================================
// Encoding
// =============================================================================

fn bench_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("encoding");

    for size in [1000, 5000] {
        let mut doc = Doc::with_replica_id(1);
        let mut rng = StdRng::seed_from_u64(11);
        random_edits(&mut doc, size, &mut rng);

        group.bench_with_input(BenchmarkId::new("full_snapshot", size), &doc, |b, doc| {
            b.iter(|| black_box(doc.encode_state_diff(None).unwrap()));
        });

        let mut half = StateVector::new();
        half.set(tandem::ReplicaId(1), (size / 2) as u32);
        group.bench_with_input(BenchmarkId::new("diff_half", size), &doc, |b, doc| {
            b.iter(|| black_box(doc.encode_diff(&half)));
        });

        let snapshot = doc.encode_state_diff(None).unwrap();
        group.throughput(Throughput::Bytes(snapshot.len() as u64));
        group.bench_with_input(BenchmarkId::new("decode", size), &snapshot, |b, snapshot| {
            b.iter(|| black_box(tandem::Update::decode(snapshot).unwrap()));
        });
    }

    group.finish();
}

// =============================================================================
// Remote apply
// =============================================================================

fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply");

    for size in [500, 2000] {
        let updates = concurrent_updates(size);

        group.bench_with_input(BenchmarkId::new("in_order", size), &updates, |b, updates| {
            b.iter(|| {
                let mut doc = Doc::with_replica_id(9);
                for update in updates {
                    doc.apply_update(update).unwrap();
                }
                black_box(doc.state_vector())
            });
        });

        // Single-keystroke updates delivered newest first all wait in pending.
        let mut source = Doc::with_replica_id(3);
        let mut keystrokes = Vec::with_capacity(size);
        let text = source.get_or_insert_text("t").unwrap();
        for i in 0..size {
            let mut txn = source.transact();
            let before = txn.before_state().clone();
            let ch = (b'a' + (i % 26) as u8) as char;
            text.insert(&mut txn, i as u32, ch.encode_utf8(&mut [0; 4])).unwrap();
            txn.commit();
            keystrokes.push(txn.encode_diff(&before));
        }
        keystrokes.reverse();

        group.bench_with_input(BenchmarkId::new("reversed", size), &keystrokes, |b, keystrokes| {
            b.iter(|| {
                let mut doc = Doc::with_replica_id(9);
                for update in keystrokes {
                    doc.apply_update(update).unwrap();
                }
                black_box(doc.pending_len())
            });
        });
    }

    group.finish();
}

// =============================================================================
// Garbage collection
// =============================================================================

fn bench_gc(c: &mut Criterion) {
    let mut group = c.benchmark_group("gc");

    for size in [1000, 5000] {
        group.bench_with_input(BenchmarkId::new("force_gc", size), &size, |b, &size| {
            b.iter(|| {
                let mut rng = StdRng::seed_from_u64(5);
                let mut doc = Doc::with_replica_id(1);
                random_edits(&mut doc, size, &mut rng);
                let mut txn = doc.transact();
                txn.force_gc();
                txn.commit();
                black_box(txn.gc_stats())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_local_editing, bench_encoding, bench_apply, bench_gc);
criterion_main!(benches);
