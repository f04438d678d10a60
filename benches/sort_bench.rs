//! Destination sorting benchmark.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use resolvnet::dns::{AddressSorter, ResolvedAddress, SourceAddr, SourceAddrProbe};
use std::net::SocketAddr;
use std::sync::Arc;

/// Routes IPv6 through one global address, IPv4 through another.
struct StaticProbe;

impl SourceAddrProbe for StaticProbe {
    fn source_addr(&self, dest: &ResolvedAddress) -> Option<SourceAddr> {
        let src: SocketAddr = if dest.ip().is_ipv4() {
            "192.0.2.1:0".parse().ok()?
        } else {
            "[2001:db8::1]:0".parse().ok()?
        };
        Some(SourceAddr::new(src))
    }
}

fn addresses(n: usize) -> Vec<ResolvedAddress> {
    (0..n)
        .map(|i| {
            let text = match i % 4 {
                0 => format!("10.0.{}.{}:443", i / 256, i % 256),
                1 => format!("[2001:db8::{:x}]:443", i),
                2 => format!("[fe80::{:x}]:443", i),
                _ => format!("[2002:c000:{:x}::1]:443", i),
            };
            ResolvedAddress::new(text.parse().unwrap())
        })
        .collect()
}

fn sort_mixed_families(c: &mut Criterion) {
    let sorter = AddressSorter::new(Arc::new(StaticProbe));
    let mut group = c.benchmark_group("rfc6724_sort");

    for n in [2usize, 8, 64] {
        let input = addresses(n);
        group.bench_function(format!("mixed_{}", n), |b| {
            b.iter_batched(
                || input.clone(),
                |mut addrs| {
                    sorter.sort(&mut addrs);
                    black_box(addrs)
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn sort_socket_probe(c: &mut Criterion) {
    let sorter = AddressSorter::with_socket_probe();
    let input = vec![
        ResolvedAddress::new("127.0.0.1:443".parse().unwrap()),
        ResolvedAddress::new("[::1]:443".parse().unwrap()),
    ];

    c.bench_function("sort_loopback_socket_probe", |b| {
        b.iter_batched(
            || input.clone(),
            |mut addrs| {
                sorter.sort(&mut addrs);
                black_box(addrs)
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, sort_mixed_families, sort_socket_probe);
criterion_main!(benches);
