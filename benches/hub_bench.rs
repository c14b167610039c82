//! Benchmarks for the bandcast broadcast hub
//!
//! Run with: cargo bench

use bandcast::hub::{messages, parse_command, ConnectionRegistry};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;
use tokio::sync::mpsc;

fn bench_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("decoding");

    group.bench_function("command_double_quoted", |b| {
        b.iter(|| parse_command(black_box(r#"{"action": "add", "interface": "eth0"}"#)).unwrap())
    });

    group.bench_function("command_single_quoted", |b| {
        b.iter(|| parse_command(black_box("{'action': 'add', 'interface': 'eth0'}")).unwrap())
    });

    group.bench_function("device_name", |b| {
        b.iter(|| {
            messages::device_name(black_box(
                r#"{"device_name": "eth0", "pid": 1234, "sent": 42.5, "recv": 7.1}"#,
            ))
        })
    });

    group.finish();
}

fn bench_broadcast_pass(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("broadcast_pass");

    for connections in [10, 100, 1000] {
        // Half the connections watch eth0, half are wildcards; receivers are
        // held open so the senders stay registered.
        let (registry, _rxs) = rt.block_on(async {
            let registry = Arc::new(ConnectionRegistry::new(connections + 1));
            let mut rxs = Vec::new();

            for i in 0..connections {
                let (tx, rx) = mpsc::unbounded_channel();
                let id = format!("{:016x}", i);
                registry.register(id.clone(), tx).await.unwrap();
                if i % 2 == 0 {
                    registry.add_interface(&id, "eth0").await.unwrap();
                }
                rxs.push(rx);
            }

            (registry, rxs)
        });

        group.throughput(Throughput::Elements(connections as u64));

        group.bench_function(format!("snapshot_filter_{}", connections), |b| {
            b.iter(|| {
                rt.block_on(async {
                    let snapshot = registry.snapshot().await;
                    let mut eligible = 0usize;
                    for connection in &snapshot {
                        if connection.wants(black_box("eth0")) {
                            eligible += 1;
                        }
                    }
                    eligible
                })
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_decoding, bench_broadcast_pass);
criterion_main!(benches);
