//! # Popularity Scoring
//!
//! Popularity measures how much of a category's discourse concerns an entity, on a
//! log scale normalised by the category's total mention count:
//!
//! `popularity(e, c) = ln(tf(e, c) + 1) / ln(total_tf(c))`
//!
//! A category with a total count of 0 or 1 has no usable denominator (`ln(0)` is
//! undefined and `ln(1) = 0`). Such a category is rejected before any score is
//! produced instead of leaking NaN or infinity into the tables.

use crate::aggregate::CategoryCounts;
use crate::types::ExecutionMode;
use ndarray::{Array1, Array2};
use thiserror::Error;

/// The smallest category total for which the popularity denominator is positive.
pub const MIN_CATEGORY_TOTAL: u64 = 2;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PopularityError {
    #[error(
        "Category '{category}' has a total mention count of {total}. Popularity needs at least {min} mentions per category; check the category's publication set and entity counts.",
        min = MIN_CATEGORY_TOTAL
    )]
    DegenerateCategory { category: String, total: u64 },
}

/// Rejects the first category (in declared order) whose total count is below
/// [`MIN_CATEGORY_TOTAL`].
pub fn check_category_totals(counts: &CategoryCounts) -> Result<(), PopularityError> {
    let categories = counts.categories();
    match categories
        .indices()
        .find(|&c| counts.total(c) < MIN_CATEGORY_TOTAL)
    {
        Some(c) => Err(PopularityError::DegenerateCategory {
            category: categories.name(c).to_string(),
            total: counts.total(c),
        }),
        None => Ok(()),
    }
}

/// Popularity of an entity with `term_count` mentions in a category totalling
/// `category_total` mentions. `category_total` must be at least 2.
#[inline]
pub fn popularity(term_count: u64, category_total: u64) -> f64 {
    (term_count as f64 + 1.0).ln() / (category_total as f64).ln()
}

/// Computes the popularity table. Shape: [n_entities, n_categories].
pub fn score_popularity(
    counts: &CategoryCounts,
    mode: ExecutionMode,
) -> Result<Array2<f64>, PopularityError> {
    check_category_totals(counts)?;

    let columns: Vec<Array1<f64>> = mode.map_categories(counts.categories(), |category| {
        let total = counts.total(category);
        counts
            .category_term_counts(category)
            .mapv(|tf| popularity(tf, total))
    });

    Ok(Array2::from_shape_fn(
        (counts.universe().len(), counts.categories().len()),
        |(e, c)| columns[c][e],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate_counts;
    use crate::aggregate::tests::{sample_counts, sample_inputs};
    use crate::types::CategoryIndex;
    use approx::assert_abs_diff_eq;

    #[test]
    fn matches_hand_computed_values() {
        let counts = sample_counts();
        let table = score_popularity(&counts, ExecutionMode::Sequential).unwrap();
        let e1 = counts.universe().get("E1").unwrap().0;
        let e2 = counts.universe().get("E2").unwrap().0;

        assert_abs_diff_eq!(table[[e1, 0]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(table[[e2, 0]], 0.5, epsilon = 1e-12);
        assert_eq!(table[[e1, 1]], 0.0);
        assert_abs_diff_eq!(table[[e2, 1]], 4f64.ln() / 3f64.ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(table[[e2, 1]], 1.2619, epsilon = 1e-4);
    }

    #[test]
    fn strictly_increasing_in_term_count() {
        let total = 500;
        let mut previous = popularity(0, total);
        assert_eq!(previous, 0.0);
        for tf in 1..=total {
            let current = popularity(tf, total);
            assert!(current > previous, "popularity not increasing at tf={tf}");
            previous = current;
        }
        assert!(previous <= (total as f64 + 1.0).ln() / (total as f64).ln());
    }

    #[test]
    fn degenerate_categories_are_reported() {
        let (categories, mut publications, mut mentions) = sample_inputs();
        mentions.insert(
            "P4".into(),
            std::collections::HashMap::from([("E2".to_string(), 1)]),
        );
        publications.insert("B".into(), vec!["P4".into()]);
        let counts =
            aggregate_counts(&categories, &publications, &mentions, ExecutionMode::Sequential)
                .unwrap();
        assert_eq!(counts.total(CategoryIndex(1)), 1);

        let err = score_popularity(&counts, ExecutionMode::Sequential).unwrap_err();
        assert_eq!(
            err,
            PopularityError::DegenerateCategory {
                category: "B".to_string(),
                total: 1
            }
        );
    }

    #[test]
    fn empty_categories_are_reported() {
        let (categories, mut publications, mentions) = sample_inputs();
        publications.insert("A".into(), Vec::new());
        let counts =
            aggregate_counts(&categories, &publications, &mentions, ExecutionMode::Sequential)
                .unwrap();

        assert!(matches!(
            check_category_totals(&counts),
            Err(PopularityError::DegenerateCategory { ref category, total: 0 }) if category == "A"
        ));
    }
}
