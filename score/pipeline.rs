// ========================================================================================
//
//                              THE SCORING PIPELINE
//
// ========================================================================================
//
// This module conducts the four scoring stages in their strict data-dependency order:
//
//   aggregate ──┬── popularity ──────┬── combine
//               └── distinctiveness ─┘
//
// Every stage returns a fresh, immutable value. The two scorers only read the
// aggregation, so in parallel mode they run side by side on the Rayon pool.

use crate::aggregate::{CategoryCounts, aggregate_counts};
use crate::combine::{CombineError, ScoreTables, combine_scores};
use crate::distinctiveness::score_distinctiveness;
use crate::popularity::{PopularityError, check_category_totals, score_popularity};
use crate::types::{CategoryError, CategorySet, ExecutionMode, ScoringInputs};
use std::time::Instant;
use thiserror::Error;

/// Fatal failures of a scoring run. There is no meaningful partial result, so any of
/// these aborts the whole computation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScoringError {
    #[error("Invalid category configuration: {0}")]
    Configuration(#[from] CategoryError),
    #[error("Degenerate category: {0}")]
    DegenerateCategory(#[from] PopularityError),
    #[error("Internal error while assembling score tables: {0}")]
    Assembly(#[from] CombineError),
}

/// Everything a scoring run produces: the aggregation it was computed from and the
/// three aligned score tables.
#[derive(Debug, Clone)]
pub struct ScoringRun {
    pub counts: CategoryCounts,
    pub scores: ScoreTables,
}

/// Scores a corpus over the universe of entities it actually mentions.
pub fn score_corpus(
    inputs: &ScoringInputs,
    mode: ExecutionMode,
) -> Result<ScoringRun, ScoringError> {
    let counts = aggregate_inputs(inputs, mode)?;
    score_counts(counts, mode)
}

/// Scores a corpus over the union of the mentioned entities and `entities`.
///
/// Entities that no category mentions are zero-filled and score 0 everywhere, which
/// lets callers align the output rows with an external dictionary.
pub fn score_with_universe<I>(
    inputs: &ScoringInputs,
    entities: I,
    mode: ExecutionMode,
) -> Result<ScoringRun, ScoringError>
where
    I: IntoIterator<Item = String>,
{
    let counts = aggregate_inputs(inputs, mode)?.extend_universe(entities);
    score_counts(counts, mode)
}

fn aggregate_inputs(
    inputs: &ScoringInputs,
    mode: ExecutionMode,
) -> Result<CategoryCounts, ScoringError> {
    let start = Instant::now();
    let categories = CategorySet::new(inputs.category_names.clone())?;
    let counts = aggregate_counts(
        &categories,
        &inputs.category_publications,
        &inputs.publication_mentions,
        mode,
    )?;
    log::info!("Aggregation finished in {:.2?}", start.elapsed());
    Ok(counts)
}

/// Runs the two scorers and the combiner over an existing aggregation.
pub fn score_counts(
    counts: CategoryCounts,
    mode: ExecutionMode,
) -> Result<ScoringRun, ScoringError> {
    // Degenerate categories must be rejected before any score is computed.
    check_category_totals(&counts)?;

    let start = Instant::now();
    let (popularity, distinctiveness) = mode.join(
        || score_popularity(&counts, mode),
        || score_distinctiveness(&counts, mode),
    );
    let scores = combine_scores(&counts, popularity?, distinctiveness)?;
    log::info!(
        "Scored {} entities x {} categories ({mode}) in {:.2?}",
        scores.entities().len(),
        scores.categories().len(),
        start.elapsed()
    );

    Ok(ScoringRun { counts, scores })
}
