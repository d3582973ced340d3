//! Lexicon construction benchmarks.
//!
//! Isolates `LexiconBuilder::build`, which validates weights and derives
//! the per-connector candidate lists.
#![expect(
    missing_docs,
    reason = "Criterion macros generate items without doc comments"
)]
#![expect(
    clippy::shadow_reuse,
    reason = "Criterion bench_with_input closures rebind parameter names"
)]
use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};

use kumiko_benches::{
    error::BenchSetupError,
    params::LexiconBenchParams,
    source::{SyntheticLexiconConfig, populate},
};

const SEED: u64 = 42;

const CASES: &[(usize, usize)] = &[(64, 4), (1_024, 8), (8_192, 16)];

fn lexicon_build_impl(c: &mut Criterion) -> Result<(), BenchSetupError> {
    let mut group = c.benchmark_group("lexicon_build");

    for &(template_count, connector_types) in CASES {
        let (builder, _templates) = populate(&SyntheticLexiconConfig {
            template_count,
            connector_types,
            max_arity: 6,
            seed: SEED,
        })?;
        let bench_params = LexiconBenchParams {
            template_count,
            connector_types,
        };

        group.bench_with_input(
            BenchmarkId::from_parameter(&bench_params),
            &builder,
            |b, builder| {
                b.iter_batched(|| builder.clone(), |builder| builder.build(), BatchSize::SmallInput);
            },
        );
    }

    group.finish();
    Ok(())
}

fn lexicon_build(c: &mut Criterion) {
    if let Err(err) = lexicon_build_impl(c) {
        panic!("lexicon_build benchmark setup failed: {err}");
    }
}

criterion_group!(benches, lexicon_build);
criterion_main!(benches);
