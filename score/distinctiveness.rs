//! # Distinctiveness Scoring
//!
//! Distinctiveness rewards entities whose signal is concentrated in few categories.
//! It is computed in two phases:
//!
//! 1. Per category, a BM25-style saturated term frequency (NTF) and a log-scaled
//!    document frequency (NDF) are multiplied into a nonnegative signal.
//! 2. Per entity, the signals of all categories are softmax-normalised with an
//!    extra unit term in the denominator:
//!    `(exp(s_c) - 1) / (1 + Σ_k exp(s_k))`.
//!
//! The result lies in `[0, 1)` and is exactly 0 wherever the signal is 0.
//!
//! The NTF length normaliser is the category breadth `N` (number of entities with a
//! nonzero count), i.e. a single constant per category. This is the reduced form of
//! `total_tf / (total_tf / N)` and is kept as is for reproducibility of published
//! scores.

use crate::aggregate::CategoryCounts;
use crate::types::{CategoryIndex, ExecutionMode};
use ndarray::{Array1, Array2, Axis, Zip};

/// BM25 term-frequency saturation constant.
pub const K1: f64 = 1.2;
/// BM25 length-normalisation weight.
pub const B: f64 = 0.75;

/// Saturated term frequency of an entity with `term_count` mentions in a category
/// whose breadth is `breadth`. Returns 0 when `term_count` is 0.
#[inline]
pub fn normalized_term_frequency(term_count: u64, breadth: usize) -> f64 {
    if term_count == 0 {
        return 0.0;
    }
    let tf = term_count as f64;
    let length_norm = 1.0 - B + B * breadth as f64;
    tf * (K1 + 1.0) / (tf + K1 * length_norm)
}

/// Log-scaled document frequency relative to the category's most broadly mentioned
/// entity. Returns 0 when the entity is not mentioned in the category.
#[inline]
pub fn normalized_document_frequency(document_count: u64, max_document_count: u64) -> f64 {
    if document_count == 0 || max_document_count == 0 {
        return 0.0;
    }
    (document_count as f64).ln_1p() / (max_document_count as f64).ln_1p()
}

/// The per-category signal `ntf * ndf` for every universe entity.
pub fn category_signal(counts: &CategoryCounts, category: CategoryIndex) -> Array1<f64> {
    let breadth = counts.breadth(category);
    let max_df = counts.max_document_count(category);
    let mut signal = Array1::<f64>::zeros(counts.universe().len());
    // Entities absent from the document table have tf = df = 0 and keep a zero signal.
    for (&entity, &df) in counts.document_counts(category) {
        let ntf = normalized_term_frequency(counts.term_count(entity, category), breadth);
        let ndf = normalized_document_frequency(df, max_df);
        signal[entity.0] = ntf * ndf;
    }
    signal
}

/// The signal matrix. Shape: [n_entities, n_categories].
pub fn signal_table(counts: &CategoryCounts, mode: ExecutionMode) -> Array2<f64> {
    let columns = mode.map_categories(counts.categories(), |category| {
        category_signal(counts, category)
    });
    Array2::from_shape_fn(
        (counts.universe().len(), counts.categories().len()),
        |(e, c)| columns[c][e],
    )
}

/// Cross-category normalisation of one entity's signal row, written into `out`.
fn normalize_row(signals: ndarray::ArrayView1<'_, f64>, mut out: ndarray::ArrayViewMut1<'_, f64>) {
    let denominator = 1.0 + signals.iter().map(|s| s.exp()).sum::<f64>();
    Zip::from(&mut out)
        .and(&signals)
        .for_each(|d, &s| *d = s.exp_m1() / denominator);
}

/// Computes the distinctiveness table. Shape: [n_entities, n_categories].
pub fn score_distinctiveness(counts: &CategoryCounts, mode: ExecutionMode) -> Array2<f64> {
    let signals = signal_table(counts, mode);
    let mut table = Array2::<f64>::zeros(signals.dim());
    match mode {
        ExecutionMode::Sequential => {
            Zip::from(table.axis_iter_mut(Axis(0)))
                .and(signals.axis_iter(Axis(0)))
                .for_each(|out, row| normalize_row(row, out));
        }
        ExecutionMode::Parallel => {
            Zip::from(table.axis_iter_mut(Axis(0)))
                .and(signals.axis_iter(Axis(0)))
                .par_for_each(|out, row| normalize_row(row, out));
        }
    }
    table
}
