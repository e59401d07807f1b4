use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use in_out_regime::data::lagged_rolling_mean;
use in_out_regime::strategy::signals::percentile_linear;
use in_out_regime::{Config, MomentumSignalEngine, PriceHistoryStore, SyntheticMarket};

fn full_store(config: &Config) -> PriceHistoryStore {
    let mut store = PriceHistoryStore::new(config.signal.lookback, config.signal.baseline());
    let start = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
    let sessions = SyntheticMarket::new(config.universe.all_instruments(), 11).generate(start, config.signal.lookback);
    for session in &sessions {
        for bar in &session.bars {
            store.apply(bar);
        }
    }
    store
}

/// Snapshot over a full lookback window; runs once per session
fn bench_compute_snapshot(c: &mut Criterion) {
    let config = Config::default();
    let store = full_store(&config);
    let engine = MomentumSignalEngine::new(config.universe.signal_universe(), config.signal.percentile);

    c.bench_function("compute_snapshot_full_window", |b| {
        b.iter(|| black_box(engine.compute_snapshot(black_box(&store), 0)));
    });
}

fn bench_rolling_mean(c: &mut Criterion) {
    let mut group = c.benchmark_group("lagged_rolling_mean");
    for len in [252usize, 1024, 4096] {
        let values: Vec<f64> = (0..len).map(|i| 100.0 + (i as f64).sin()).collect();
        group.bench_with_input(BenchmarkId::from_parameter(len), &values, |b, values| {
            b.iter(|| black_box(lagged_rolling_mean(black_box(values), 55, 11)));
        });
    }
    group.finish();
}

fn bench_percentile(c: &mut Criterion) {
    let values: Vec<f64> = (0..187).map(|i| ((i * 37) % 101) as f64 / 100.0 - 0.5).collect();

    c.bench_function("percentile_linear_187", |b| {
        b.iter(|| black_box(percentile_linear(black_box(&values), 1.0)));
    });
}

criterion_group!(benches, bench_compute_snapshot, bench_rolling_mean, bench_percentile);
criterion_main!(benches);
