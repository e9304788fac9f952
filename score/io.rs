// ========================================================================================
//
//                                  INPUT LOADING
//
// ========================================================================================
//
// ### Purpose ###
//
// This module is the exclusive entry point for the two externally produced input
// tables. It reads them from disk, validates them, and hands back the plain maps the
// scoring pipeline consumes.
//
// - Category assignments are a JSON object: `{ "IHD": ["31415", "27182"], ... }`.
// - Mention counts are either a nested JSON object
//   (`{ "31415": { "P02768": 3 } }`) or a long-format TSV with the columns
//   `publication`, `entity` and `count`.
//
// Failures are assumed to be user-input errors and carry the offending path.

use crate::types::{CategoryPublications, PublicationMentions, ScoringInputs};
use polars::prelude::*;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;

const PUBLICATION_COLUMN: &str = "publication";
const ENTITY_COLUMN: &str = "entity";
const COUNT_COLUMN: &str = "count";

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Failed to open input file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Input file '{path}' is not valid JSON of the expected shape: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Error from the underlying Polars DataFrame library while reading '{path}': {source}")]
    Polars {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },
    #[error(
        "The required column '{column}' was not found in '{path}'. Please check spelling and case."
    )]
    ColumnNotFound { path: PathBuf, column: &'static str },
    #[error("Missing values were found in column '{column}' of '{path}' (data row {row}).")]
    MissingValue {
        path: PathBuf,
        column: &'static str,
        row: usize,
    },
    #[error(
        "Invalid mention count '{value}' in '{path}' (data row {row}). Counts must be nonnegative integers."
    )]
    InvalidCount {
        path: PathBuf,
        row: usize,
        value: String,
    },
    #[error(
        "Repeated rows for publication '{publication}' and entity '{entity}' in '{path}' add up to more than {max} (data row {row}).",
        max = u64::MAX
    )]
    CountOverflow {
        path: PathBuf,
        row: usize,
        publication: String,
        entity: String,
    },
    #[error(
        "Unsupported mention table format for '{0}'. Expected a .json, .tsv or .txt file."
    )]
    UnsupportedFormat(PathBuf),
}

/// Loads both input tables and bundles them with the declared category names.
pub fn load_inputs(
    category_names: Vec<String>,
    category_publications: &Path,
    publication_mentions: &Path,
) -> Result<ScoringInputs, InputError> {
    let category_publications = load_category_publications(category_publications)?;
    let publication_mentions = load_publication_mentions(publication_mentions)?;
    Ok(ScoringInputs {
        category_names,
        category_publications,
        publication_mentions,
    })
}

/// Reads the category -> publications JSON object.
pub fn load_category_publications(path: &Path) -> Result<CategoryPublications, InputError> {
    let table: CategoryPublications = read_json(path)?;
    log::info!(
        "Loaded publication sets for {} categories from '{}'",
        table.len(),
        path.display()
    );
    Ok(table)
}

/// Reads the publication -> entity -> count table, dispatching on the file extension.
pub fn load_publication_mentions(path: &Path) -> Result<PublicationMentions, InputError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let table = match extension.as_deref() {
        Some("json") => read_json(path)?,
        Some("tsv") | Some("txt") => read_mention_tsv(path)?,
        _ => return Err(InputError::UnsupportedFormat(path.to_path_buf())),
    };
    log::info!(
        "Loaded mention records for {} publications from '{}'",
        table.len(),
        path.display()
    );
    Ok(table)
}

fn read_json<T>(path: &Path) -> Result<T, InputError>
where
    T: serde::de::DeserializeOwned,
{
    let file = File::open(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| InputError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a long-format mention table. Repeated (publication, entity) rows are summed.
fn read_mention_tsv(path: &Path) -> Result<PublicationMentions, InputError> {
    let polars_err = |source: PolarsError| InputError::Polars {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    // Every column is read as text: identifiers such as PMIDs must keep their exact
    // spelling, and counts are validated by hand below.
    let df = CsvReader::new(file)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_infer_schema_length(Some(0))
                .with_parse_options(CsvParseOptions::default().with_separator(b'\t')),
        )
        .finish()
        .map_err(polars_err)?;

    let text_column = |column: &'static str| -> Result<Vec<Option<String>>, InputError> {
        if !df.get_column_names().iter().any(|c| c.as_str() == column) {
            return Err(InputError::ColumnNotFound {
                path: path.to_path_buf(),
                column,
            });
        }
        let values = df.column(column).map_err(polars_err)?;
        let values = values.str().map_err(polars_err)?;
        Ok(values
            .into_iter()
            .map(|v| v.map(|s| s.trim().to_string()))
            .collect())
    };

    let publications = text_column(PUBLICATION_COLUMN)?;
    let entities = text_column(ENTITY_COLUMN)?;
    let counts = text_column(COUNT_COLUMN)?;

    let mut table: PublicationMentions = HashMap::new();
    for (row, ((publication, entity), count)) in publications
        .into_iter()
        .zip(entities)
        .zip(counts)
        .enumerate()
    {
        let data_row = row + 1;
        let missing = |column| InputError::MissingValue {
            path: path.to_path_buf(),
            column,
            row: data_row,
        };
        let publication = publication
            .filter(|s| !s.is_empty())
            .ok_or_else(|| missing(PUBLICATION_COLUMN))?;
        let entity = entity
            .filter(|s| !s.is_empty())
            .ok_or_else(|| missing(ENTITY_COLUMN))?;
        let raw = count.ok_or_else(|| missing(COUNT_COLUMN))?;
        let count = raw.parse::<u64>().map_err(|_| InputError::InvalidCount {
            path: path.to_path_buf(),
            row: data_row,
            value: raw.clone(),
        })?;

        let current = table
            .get(&publication)
            .and_then(|entities| entities.get(&entity))
            .copied()
            .unwrap_or(0);
        let summed = current
            .checked_add(count)
            .ok_or_else(|| InputError::CountOverflow {
                path: path.to_path_buf(),
                row: data_row,
                publication: publication.clone(),
                entity: entity.clone(),
            })?;
        table.entry(publication).or_default().insert(entity, summed);
    }
    Ok(table)
}
