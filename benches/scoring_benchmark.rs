use caseolap::{ExecutionMode, PublicationMentions, ScoringInputs, score_corpus};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

const CATEGORIES: usize = 8;
const PUBLICATIONS_PER_CATEGORY: usize = 2_000;

/// A synthetic corpus where each publication mentions a handful of entities drawn
/// from a universe of `entities` identifiers.
fn synthetic_corpus(entities: usize) -> ScoringInputs {
    let mut rng = StdRng::seed_from_u64(0xCA5E_01A9 + entities as u64);
    let category_names: Vec<String> = (0..CATEGORIES).map(|c| format!("CAT{c}")).collect();

    let mut category_publications = HashMap::new();
    let mut publication_mentions: PublicationMentions = HashMap::new();
    for (c, name) in category_names.iter().enumerate() {
        let mut pmids = Vec::with_capacity(PUBLICATIONS_PER_CATEGORY);
        for p in 0..PUBLICATIONS_PER_CATEGORY {
            let pmid = format!("{}", c * PUBLICATIONS_PER_CATEGORY + p);
            let mentions = (0..rng.gen_range(1..8))
                .map(|_| {
                    (
                        format!("ENT{:05}", rng.gen_range(0..entities)),
                        rng.gen_range(1..6u64),
                    )
                })
                .collect();
            publication_mentions.insert(pmid.clone(), mentions);
            pmids.push(pmid);
        }
        category_publications.insert(name.clone(), pmids);
    }

    ScoringInputs {
        category_names,
        category_publications,
        publication_mentions,
    }
}

fn benchmark_scoring(c: &mut Criterion) {
    let sizes = [1_000_usize, 5_000];
    let corpora: Vec<_> = sizes
        .iter()
        .map(|&size| (size, synthetic_corpus(size)))
        .collect();

    let mut group = c.benchmark_group("score_corpus");
    for (size, inputs) in corpora.iter() {
        group.throughput(Throughput::Elements((*size * CATEGORIES) as u64));

        for mode in [ExecutionMode::Sequential, ExecutionMode::Parallel] {
            group.bench_with_input(
                BenchmarkId::new(mode.to_string(), size),
                inputs,
                |b, input| {
                    b.iter(|| {
                        let run = score_corpus(black_box(input), mode).expect("scoring");
                        black_box(run);
                    });
                },
            );
        }
    }
    group.finish();
}

criterion_group!(scoring, benchmark_scoring);
criterion_main!(scoring);
