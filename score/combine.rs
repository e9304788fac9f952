//! # Score Combination
//!
//! The final stage multiplies popularity and distinctiveness cell by cell into the
//! CaseOLAP score and packages all three tables with their shared row (entity) and
//! column (category) indices.

use crate::aggregate::CategoryCounts;
use crate::types::{CategoryIndex, CategorySet, EntityIndex, EntityUniverse};
use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::Serialize;
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CombineError {
    #[error(
        "The {table} table has shape {found:?}, but the entity universe and category set require {expected:?}."
    )]
    ShapeMismatch {
        table: ScoreKind,
        expected: (usize, usize),
        found: (usize, usize),
    },
}

/// Identifies one of the three aligned output tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreKind {
    Popularity,
    Distinctiveness,
    Combined,
}

impl ScoreKind {
    pub const ALL: [ScoreKind; 3] = [
        ScoreKind::Popularity,
        ScoreKind::Distinctiveness,
        ScoreKind::Combined,
    ];

    /// Base name used for the exported table of this kind.
    pub fn file_stem(self) -> &'static str {
        match self {
            ScoreKind::Popularity => "popularity",
            ScoreKind::Distinctiveness => "distinctiveness",
            ScoreKind::Combined => "caseolap",
        }
    }
}

impl std::fmt::Display for ScoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.file_stem())
    }
}

/// All three scores of one (entity, category) cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreRecord {
    pub popularity: f64,
    pub distinctiveness: f64,
    pub combined: f64,
}

/// An entity and its combined score within one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntity {
    pub entity: String,
    pub score: f64,
}

/// The three aligned score tables of a run.
///
/// Every table has exactly one row per universe entity and one column per category,
/// in the same order. The tables are never mutated after construction.
#[derive(Debug, Clone)]
pub struct ScoreTables {
    entities: EntityUniverse,
    categories: CategorySet,
    popularity: Array2<f64>,
    distinctiveness: Array2<f64>,
    combined: Array2<f64>,
}

/// Multiplies the two score tables into the combined CaseOLAP table.
pub fn combine_scores(
    counts: &CategoryCounts,
    popularity: Array2<f64>,
    distinctiveness: Array2<f64>,
) -> Result<ScoreTables, CombineError> {
    let expected = (counts.universe().len(), counts.categories().len());
    for (table, found) in [
        (ScoreKind::Popularity, popularity.dim()),
        (ScoreKind::Distinctiveness, distinctiveness.dim()),
    ] {
        if found != expected {
            return Err(CombineError::ShapeMismatch {
                table,
                expected,
                found,
            });
        }
    }

    let combined = &popularity * &distinctiveness;

    Ok(ScoreTables {
        entities: counts.universe().clone(),
        categories: counts.categories().clone(),
        popularity,
        distinctiveness,
        combined,
    })
}

impl ScoreTables {
    pub fn entities(&self) -> &EntityUniverse {
        &self.entities
    }

    pub fn categories(&self) -> &CategorySet {
        &self.categories
    }

    /// Number of cells in each table: `|universe| x |categories|`.
    pub fn len(&self) -> usize {
        self.combined.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combined.is_empty()
    }

    pub fn table(&self, kind: ScoreKind) -> ArrayView2<'_, f64> {
        match kind {
            ScoreKind::Popularity => self.popularity.view(),
            ScoreKind::Distinctiveness => self.distinctiveness.view(),
            ScoreKind::Combined => self.combined.view(),
        }
    }

    pub fn popularity(&self) -> ArrayView2<'_, f64> {
        self.popularity.view()
    }

    pub fn distinctiveness(&self) -> ArrayView2<'_, f64> {
        self.distinctiveness.view()
    }

    pub fn combined(&self) -> ArrayView2<'_, f64> {
        self.combined.view()
    }

    /// One category's column of the given table, in universe order.
    pub fn column(&self, kind: ScoreKind, category: CategoryIndex) -> ArrayView1<'_, f64> {
        match kind {
            ScoreKind::Popularity => self.popularity.column(category.0),
            ScoreKind::Distinctiveness => self.distinctiveness.column(category.0),
            ScoreKind::Combined => self.combined.column(category.0),
        }
    }

    #[inline]
    pub fn record(&self, entity: EntityIndex, category: CategoryIndex) -> ScoreRecord {
        let cell = [entity.0, category.0];
        ScoreRecord {
            popularity: self.popularity[cell],
            distinctiveness: self.distinctiveness[cell],
            combined: self.combined[cell],
        }
    }

    /// Looks up a cell by identifiers. `None` if either is unknown.
    pub fn get(&self, entity: &str, category: &str) -> Option<ScoreRecord> {
        let e = self.entities.get(entity)?;
        let c = self.categories.get(category)?;
        Some(self.record(e, c))
    }

    /// The `n` highest combined scores in `category`, best first. Ties are broken by
    /// entity identifier and zero scores are never reported.
    pub fn top_entities(&self, category: &str, n: usize) -> Option<Vec<RankedEntity>> {
        let c = self.categories.get(category)?;
        let column = self.combined.column(c.0);
        let mut ranked: Vec<(usize, f64)> = column
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, score)| score > 0.0)
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        Some(
            ranked
                .into_iter()
                .take(n)
                .map(|(e, score)| RankedEntity {
                    entity: self.entities.id(EntityIndex(e)).to_string(),
                    score,
                })
                .collect(),
        )
    }
}
