//! Performance benchmarks for the selection hot path.
//!
//! Measures:
//! - Weight computation for a single candidate
//! - Weight computation across a large candidate pool
//! - Palette similarity scoring

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use smart_selection::color::{self, PaletteMetrics};
use smart_selection::config::SelectionConfig;
use smart_selection::model::PaletteTarget;
use smart_selection::weight::{self, CandidateInputs};

fn bench_weight(c: &mut Criterion) {
    let config = SelectionConfig::default();
    let metrics = PaletteMetrics {
        avg_hue: 30.0,
        avg_saturation: 0.5,
        avg_lightness: 0.4,
        color_temperature: 0.2,
    };
    let target = PaletteTarget {
        lightness: Some(0.5),
        temperature: Some(0.0),
        saturation: Some(0.5),
        tolerance: None,
    };
    let inputs = CandidateInputs {
        now: 1_000_000,
        last_shown_at: Some(500_000),
        source_last_shown_at: Some(900_000),
        is_favorite: true,
        times_shown: 3,
        palette_metrics: Some(&metrics),
    };

    c.bench_function("weight_single_candidate", |b| {
        b.iter(|| weight::weight(black_box(&inputs), black_box(&config), Some(black_box(&target))))
    });
}

fn bench_similarity(c: &mut Criterion) {
    let a = PaletteMetrics {
        avg_hue: 30.0,
        avg_saturation: 0.5,
        avg_lightness: 0.4,
        color_temperature: 0.2,
    };
    let b = PaletteMetrics {
        avg_hue: 200.0,
        avg_saturation: 0.3,
        avg_lightness: 0.6,
        color_temperature: -0.1,
    };

    c.bench_function("palette_similarity", |bencher| {
        bencher.iter(|| color::similarity(black_box(&a), black_box(&b)))
    });
}

fn bench_weight_over_large_pool(c: &mut Criterion) {
    let config = SelectionConfig::default();
    let pool: Vec<CandidateInputs> = (0..10_000)
        .map(|i| CandidateInputs {
            now: 1_000_000,
            last_shown_at: if i % 3 == 0 { Some(i * 1000) } else { None },
            source_last_shown_at: Some(i * 500),
            is_favorite: i % 10 == 0,
            times_shown: (i % 5) as u32,
            palette_metrics: None,
        })
        .collect();

    c.bench_function("weight_10k_candidates", |b| {
        b.iter(|| {
            for inputs in &pool {
                black_box(weight::weight(inputs, &config, None));
            }
        })
    });
}

criterion_group!(benches, bench_weight, bench_similarity, bench_weight_over_large_pool);
criterion_main!(benches);
