// ========================================================================================
//
//                          THE ENTITY COUNT AGGREGATOR
//
// ========================================================================================
//
// ### Purpose ###
//
// This module turns the two raw input tables (category -> publications and
// publication -> entity -> count) into the per-category count universe consumed by
// both scorers. It is the only stage that touches string-keyed input; everything
// downstream works on dense, index-addressed matrices.
//
// ### The Alignment Invariant ###
//
// The universe is fixed before any category-level number is materialised, and the
// term-count matrix is zero-filled over it. Every category therefore exposes a count
// for every entity, which is what makes the popularity denominator and the
// distinctiveness cross-category sum comparable.

use crate::types::{
    CategoryError, CategoryIndex, CategoryPublications, CategorySet, EntityIndex,
    EntityUniverse, ExecutionMode, PublicationMentions,
};
use ahash::{AHashMap, AHashSet};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use std::collections::BTreeMap;

/// Per-category bookkeeping collected while aggregating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryDiagnostics {
    /// Number of distinct publications assigned to the category.
    pub publications: usize,
    /// Assigned publications that have no mention record, in assignment order.
    /// They contribute zero mentions.
    pub missing_publications: Vec<String>,
}

/// The complete, validated output of the aggregation stage.
///
/// This is a "proof token": it can only be built by [`aggregate_counts`] (or derived
/// from one via [`CategoryCounts::extend_universe`]), so holding one guarantees that
/// the universe, the zero-filled term counts, the sparse document counts and the
/// totals all agree with each other.
#[derive(Debug, Clone)]
pub struct CategoryCounts {
    categories: CategorySet,
    universe: EntityUniverse,
    /// Shape: [n_entities, n_categories]. Zero-filled over the universe.
    term_counts: Array2<u64>,
    /// Per category, the number of distinct publications mentioning each entity.
    /// Entities never mentioned in the category are absent.
    document_counts: Vec<BTreeMap<EntityIndex, u64>>,
    totals: Array1<u64>,
    diagnostics: Vec<CategoryDiagnostics>,
}

/// String-keyed accumulation for one category, before the universe exists.
struct SparseCategory<'a> {
    term_counts: AHashMap<&'a str, u64>,
    document_counts: AHashMap<&'a str, u64>,
    total: u64,
    diagnostics: CategoryDiagnostics,
}

/// Builds the per-category entity-count universe from the raw input tables.
///
/// Fails if the keys of `category_publications` and the declared categories do not
/// match exactly. Publications without a mention record are tolerated and reported
/// in the diagnostics.
pub fn aggregate_counts(
    categories: &CategorySet,
    category_publications: &CategoryPublications,
    publication_mentions: &PublicationMentions,
    mode: ExecutionMode,
) -> Result<CategoryCounts, CategoryError> {
    validate_category_keys(categories, category_publications)?;

    let sparse = mode.map_categories(categories, |category| {
        let name = categories.name(category);
        // Presence was checked by `validate_category_keys`.
        let publications = category_publications
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default();
        accumulate_category(name, publications, publication_mentions)
    });
    let sparse = sparse.into_iter().collect::<Result<Vec<_>, _>>()?;

    for (category, partial) in categories.indices().zip(&sparse) {
        report_missing(categories.name(category), &partial.diagnostics);
    }

    let universe = EntityUniverse::from_ids(
        sparse
            .iter()
            .flat_map(|partial| partial.term_counts.keys())
            .map(|id| id.to_string()),
    );

    let mut term_counts = Array2::<u64>::zeros((universe.len(), categories.len()));
    let mut document_counts = Vec::with_capacity(categories.len());
    let mut totals = Array1::<u64>::zeros(categories.len());
    let mut diagnostics = Vec::with_capacity(categories.len());

    for (c, partial) in sparse.into_iter().enumerate() {
        for (entity, &count) in &partial.term_counts {
            if let Some(e) = universe.get(entity) {
                term_counts[[e.0, c]] = count;
            }
        }
        totals[c] = partial.total;
        document_counts.push(
            partial
                .document_counts
                .iter()
                .filter_map(|(entity, &df)| universe.get(entity).map(|e| (e, df)))
                .collect(),
        );
        diagnostics.push(partial.diagnostics);
    }

    log::info!(
        "Aggregated {} entities across {} categories",
        universe.len(),
        categories.len()
    );

    Ok(CategoryCounts {
        categories: categories.clone(),
        universe,
        term_counts,
        document_counts,
        totals,
        diagnostics,
    })
}

fn validate_category_keys(
    categories: &CategorySet,
    category_publications: &CategoryPublications,
) -> Result<(), CategoryError> {
    // Sorted so the reported offender does not depend on hash order.
    let mut keys: Vec<&String> = category_publications.keys().collect();
    keys.sort_unstable();
    if let Some(undeclared) = keys.into_iter().find(|k| categories.get(k).is_none()) {
        return Err(CategoryError::UndeclaredCategory(undeclared.clone()));
    }
    if let Some(missing) = categories
        .names()
        .iter()
        .find(|name| !category_publications.contains_key(name.as_str()))
    {
        return Err(CategoryError::MissingPublicationSet(missing.clone()));
    }
    Ok(())
}

/// Sums one category's mentions. Fails instead of wrapping when an entity count or
/// the category total no longer fits in a `u64`.
fn accumulate_category<'a>(
    category: &str,
    publications: &[String],
    publication_mentions: &'a PublicationMentions,
) -> Result<SparseCategory<'a>, CategoryError> {
    let overflow = || CategoryError::CountOverflow(category.to_string());
    let mut term_counts: AHashMap<&'a str, u64> = AHashMap::new();
    let mut document_counts: AHashMap<&'a str, u64> = AHashMap::new();
    let mut total: u64 = 0;
    let mut seen: AHashSet<&str> = AHashSet::with_capacity(publications.len());
    let mut missing_publications = Vec::new();

    for publication in publications {
        if !seen.insert(publication.as_str()) {
            continue;
        }
        let Some(mentions) = publication_mentions.get(publication) else {
            missing_publications.push(publication.clone());
            continue;
        };
        for (entity, &count) in mentions {
            if count == 0 {
                continue;
            }
            let term_count = term_counts.entry(entity.as_str()).or_insert(0);
            *term_count = term_count.checked_add(count).ok_or_else(overflow)?;
            total = total.checked_add(count).ok_or_else(overflow)?;
            *document_counts.entry(entity.as_str()).or_insert(0) += 1;
        }
    }

    Ok(SparseCategory {
        term_counts,
        document_counts,
        total,
        diagnostics: CategoryDiagnostics {
            publications: seen.len(),
            missing_publications,
        },
    })
}

fn report_missing(category: &str, diagnostics: &CategoryDiagnostics) {
    if diagnostics.missing_publications.is_empty() {
        return;
    }
    log::warn!(
        "Category '{}': {} of {} publications have no entity mentions and contribute zero counts",
        category,
        diagnostics.missing_publications.len(),
        diagnostics.publications
    );
    for publication in &diagnostics.missing_publications {
        log::debug!("Category '{category}': no mention record for publication {publication}");
    }
}

impl CategoryCounts {
    pub fn categories(&self) -> &CategorySet {
        &self.categories
    }

    pub fn universe(&self) -> &EntityUniverse {
        &self.universe
    }

    /// The zero-filled term-count matrix. Shape: [n_entities, n_categories].
    pub fn term_counts(&self) -> ArrayView2<'_, u64> {
        self.term_counts.view()
    }

    /// Term counts of every universe entity within one category.
    pub fn category_term_counts(&self, category: CategoryIndex) -> ArrayView1<'_, u64> {
        self.term_counts.column(category.0)
    }

    #[inline]
    pub fn term_count(&self, entity: EntityIndex, category: CategoryIndex) -> u64 {
        self.term_counts[[entity.0, category.0]]
    }

    /// Distinct publications within `category` that mention `entity`; 0 when absent.
    #[inline]
    pub fn document_count(&self, entity: EntityIndex, category: CategoryIndex) -> u64 {
        self.document_counts[category.0]
            .get(&entity)
            .copied()
            .unwrap_or(0)
    }

    /// The sparse document-frequency table of one category.
    pub fn document_counts(&self, category: CategoryIndex) -> &BTreeMap<EntityIndex, u64> {
        &self.document_counts[category.0]
    }

    /// The largest document count in the category, or 0 if nothing is mentioned.
    pub fn max_document_count(&self, category: CategoryIndex) -> u64 {
        self.document_counts[category.0]
            .values()
            .copied()
            .max()
            .unwrap_or(0)
    }

    /// Number of entities with a nonzero count in the category.
    pub fn breadth(&self, category: CategoryIndex) -> usize {
        self.document_counts[category.0].len()
    }

    /// Sum of all entity counts in the category.
    #[inline]
    pub fn total(&self, category: CategoryIndex) -> u64 {
        self.totals[category.0]
    }

    pub fn totals(&self) -> ArrayView1<'_, u64> {
        self.totals.view()
    }

    /// Entities with a nonzero count in the category, in universe order.
    pub fn category_entities(&self, category: CategoryIndex) -> impl Iterator<Item = &str> + '_ {
        self.document_counts[category.0]
            .keys()
            .map(|&entity| self.universe.id(entity))
    }

    pub fn diagnostics(&self, category: CategoryIndex) -> &CategoryDiagnostics {
        &self.diagnostics[category.0]
    }

    /// Re-indexes the counts over the union of the current universe and `extra_ids`.
    ///
    /// Added entities get zero term counts and no document counts in every category,
    /// so they score exactly 0 everywhere downstream.
    pub fn extend_universe<I>(&self, extra_ids: I) -> CategoryCounts
    where
        I: IntoIterator<Item = String>,
    {
        let universe = EntityUniverse::from_ids(
            self.universe
                .ids()
                .iter()
                .cloned()
                .chain(extra_ids),
        );
        let remap: Vec<EntityIndex> = self
            .universe
            .ids()
            .iter()
            .filter_map(|id| universe.get(id))
            .collect();

        let mut term_counts = Array2::<u64>::zeros((universe.len(), self.categories.len()));
        for (old, row) in self.term_counts.outer_iter().enumerate() {
            term_counts.row_mut(remap[old].0).assign(&row);
        }
        let document_counts = self
            .document_counts
            .iter()
            .map(|table| {
                table
                    .iter()
                    .map(|(entity, &df)| (remap[entity.0], df))
                    .collect()
            })
            .collect();

        log::debug!(
            "Extended entity universe from {} to {} entities",
            self.universe.len(),
            universe.len()
        );

        CategoryCounts {
            categories: self.categories.clone(),
            universe,
            term_counts,
            document_counts,
            totals: self.totals.clone(),
            diagnostics: self.diagnostics.clone(),
        }
    }
}
