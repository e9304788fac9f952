// ========================================================================================
//                             High-Level Data Contracts
// ========================================================================================

// This file is ONLY for types that are SHARED BETWEEN FILES, not types that only are used in one file.

use ahash::AHashMap;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Category name -> the publication identifiers assigned to that category.
pub type CategoryPublications = HashMap<String, Vec<String>>;

/// Publication identifier -> entity identifier -> mention count within that publication.
pub type PublicationMentions = HashMap<String, HashMap<String, u64>>;

/// The complete raw input of one scoring run, as produced by the text-cube and
/// entity-counting stages upstream of this crate.
#[derive(Debug, Clone, Default)]
pub struct ScoringInputs {
    /// Ordered category names. This order defines the column order of every output table.
    pub category_names: Vec<String>,
    pub category_publications: CategoryPublications,
    pub publication_mentions: PublicationMentions,
}

/// Failures caused by an inconsistent category declaration. Every variant aborts the
/// run; a category is never silently skipped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CategoryError {
    #[error("No categories were declared. At least one category name is required.")]
    NoCategories,
    #[error("Category '{0}' is declared more than once.")]
    DuplicateCategory(String),
    #[error(
        "Category '{0}' has a publication set but is not one of the declared category names."
    )]
    UndeclaredCategory(String),
    #[error("Declared category '{0}' has no publication set.")]
    MissingPublicationSet(String),
    #[error(
        "Mention counts in category '{0}' add up to more than {max}, the largest representable count.",
        max = u64::MAX
    )]
    CountOverflow(String),
}

// ========================================================================================
//                            Primitive Type Definitions
// ========================================================================================

/// A row index into the entity x category matrices.
///
/// This newtype prevents confusion between the two index spaces at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct EntityIndex(pub usize);

/// A column index into the entity x category matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct CategoryIndex(pub usize);

// ========================================================================================
//                                 Validated index sets
// ========================================================================================

/// The ordered, duplicate-free set of categories for a run.
///
/// Construction is the only place category names are validated, so holding a
/// `CategorySet` is proof that the column index space is well formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySet {
    names: Vec<String>,
    index: AHashMap<String, CategoryIndex>,
}

impl CategorySet {
    pub fn new(names: Vec<String>) -> Result<Self, CategoryError> {
        if names.is_empty() {
            return Err(CategoryError::NoCategories);
        }
        let mut index = AHashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if index.insert(name.clone(), CategoryIndex(i)).is_some() {
                return Err(CategoryError::DuplicateCategory(name.clone()));
            }
        }
        Ok(Self { names, index })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[inline]
    pub fn name(&self, category: CategoryIndex) -> &str {
        &self.names[category.0]
    }

    pub fn get(&self, name: &str) -> Option<CategoryIndex> {
        self.index.get(name).copied()
    }

    pub fn indices(&self) -> impl Iterator<Item = CategoryIndex> + '_ {
        (0..self.names.len()).map(CategoryIndex)
    }
}

/// The global entity universe: every entity that any category mentions at least once.
///
/// Identifiers are kept sorted, so the row order of every table derived from a
/// universe is a pure function of its contents.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntityUniverse {
    ids: Vec<String>,
    index: AHashMap<String, EntityIndex>,
}

impl EntityUniverse {
    /// Builds a universe from any collection of identifiers. Duplicates collapse.
    pub fn from_ids<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut ids: Vec<String> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        let index = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), EntityIndex(i)))
            .collect();
        Self { ids, index }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    #[inline]
    pub fn id(&self, entity: EntityIndex) -> &str {
        &self.ids[entity.0]
    }

    pub fn get(&self, id: &str) -> Option<EntityIndex> {
        self.index.get(id).copied()
    }
}

// ========================================================================================
//                                  Execution strategy
// ========================================================================================

/// How the per-category work of each stage is scheduled.
///
/// Both modes run identical scalar arithmetic per cell in identical order, so the
/// results are bit-for-bit equal; `Parallel` only spreads categories over the
/// Rayon pool and runs the two independent scorers side by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Parallel,
}

impl ExecutionMode {
    /// Maps `f` over every category, returning results in category order.
    pub(crate) fn map_categories<T, F>(self, categories: &CategorySet, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(CategoryIndex) -> T + Sync + Send,
    {
        match self {
            Self::Sequential => categories.indices().map(f).collect(),
            Self::Parallel => (0..categories.len())
                .into_par_iter()
                .map(|c| f(CategoryIndex(c)))
                .collect(),
        }
    }

    /// Runs two independent computations, concurrently when parallel.
    pub(crate) fn join<A, B, RA, RB>(self, a: A, b: B) -> (RA, RB)
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send,
        RB: Send,
    {
        match self {
            Self::Sequential => (a(), b()),
            Self::Parallel => rayon::join(a, b),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Parallel => write!(f, "parallel"),
        }
    }
}
