//! # Lead Marketplace Routing Benchmarks
//!
//! Hot paths of one routing pass, measured in isolation:
//!
//! | Path | Work per lead | Target |
//! |------|---------------|--------|
//! | Distance filter | one bounding box test + haversine per area | < 1ms for 1000 areas |
//! | Ranking | sort by distance, rating, id | < 1ms for 1000 candidates |
//! | Dedupe fingerprint | normalize + SHA-256 | < 10µs |

use std::collections::BTreeSet;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lm_02_dedupe_guard::Fingerprint;
use lm_03_lead_routing::domain::distance_within;
use lm_03_lead_routing::{haversine_km, rank_candidates, Candidate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared_types::entities::{ConsumerContact, GeoPoint, ProviderId, ServiceId, TenantId, MS_PER_DAY};

const ORIGIN: GeoPoint = GeoPoint {
    lat: 30.2672,
    lng: -97.7431,
};

/// Points scattered within roughly 100 km of the origin.
fn scattered_points(count: usize, rng: &mut StdRng) -> Vec<GeoPoint> {
    (0..count)
        .map(|_| {
            GeoPoint::new(
                ORIGIN.lat + rng.gen_range(-0.9..0.9),
                ORIGIN.lng + rng.gen_range(-1.0..1.0),
            )
        })
        .collect()
}

fn candidates(count: usize, rng: &mut StdRng) -> Vec<Candidate> {
    (0..count)
        .map(|i| Candidate {
            provider_id: ProviderId(i as u64 + 1),
            distance_km: rng.gen_range(0.0..50.0),
            // Every tenth provider is unrated
            avg_rating: (i % 10 != 0).then(|| rng.gen_range(1.0..5.0)),
        })
        .collect()
}

// ============================================================================
// Geo
// ============================================================================

fn bench_distance(c: &mut Criterion) {
    let mut group = c.benchmark_group("lm-03-geo");
    let mut rng = StdRng::seed_from_u64(7);
    let point = GeoPoint::new(30.5, -97.5);

    group.bench_function("haversine_km", |b| {
        b.iter(|| black_box(haversine_km(black_box(ORIGIN), black_box(point))))
    });

    for size in [100, 1000] {
        let centers = scattered_points(size, &mut rng);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(
            BenchmarkId::new("distance_within_25km", size),
            &centers,
            |b, centers| {
                b.iter(|| {
                    let within = centers
                        .iter()
                        .filter_map(|&center| distance_within(center, 25.0, ORIGIN))
                        .count();
                    black_box(within)
                })
            },
        );
    }

    group.finish();
}

// ============================================================================
// Ranking
// ============================================================================

fn bench_ranking(c: &mut Criterion) {
    let mut group = c.benchmark_group("lm-03-ranking");
    group.measurement_time(Duration::from_secs(5));
    let mut rng = StdRng::seed_from_u64(11);

    for size in [10, 100, 1000] {
        let pool = candidates(size, &mut rng);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("rank_candidates", size), &pool, |b, pool| {
            b.iter(|| {
                let ranked = rank_candidates(pool.clone());
                black_box(ranked.first().map(|c| c.provider_id))
            })
        });
    }

    group.finish();
}

// ============================================================================
// Dedupe
// ============================================================================

fn bench_fingerprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("lm-02-fingerprint");
    let contact = ConsumerContact::new(
        Some("Robin"),
        Some("  Robin.Example@Example.COM "),
        Some("+1 (512) 555-0100"),
    );
    let services: BTreeSet<ServiceId> = [ServiceId(3), ServiceId(1), ServiceId(7)].into();

    group.bench_function("compute", |b| {
        b.iter(|| {
            black_box(Fingerprint::compute(
                TenantId(1),
                black_box(&contact),
                &services,
                1_700_000_000_000,
                MS_PER_DAY,
            ))
        })
    });

    group.finish();
}

criterion_group!(benches, bench_distance, bench_ranking, bench_fingerprint);
criterion_main!(benches);
