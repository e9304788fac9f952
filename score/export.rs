// ========================================================================================
//
//                                  RESULT EXPORT
//
// ========================================================================================
//
// Writes the products of a scoring run into an output directory:
//
//   popularity.tsv, distinctiveness.tsv, caseolap.tsv   entity rows x category columns
//   entities.txt                                        the entity universe, one per line
//   category_entities.json                              category -> mentioned entities
//   summary.json                                        per-category run statistics
//
// Every file is written to a temporary sibling and renamed into place, so a failed
// export never leaves a truncated table behind. Existing outputs are only replaced
// when the caller asks for it.

use crate::combine::{RankedEntity, ScoreKind, ScoreTables};
use crate::pipeline::ScoringRun;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const UNIVERSE_FILE: &str = "entities.txt";
pub const CATEGORY_ENTITIES_FILE: &str = "category_entities.json";
pub const SUMMARY_FILE: &str = "summary.json";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(
        "Output file '{0}' already exists. It will not be overwritten; remove it or pass --force."
    )]
    OutputExists(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    /// Replace existing output files instead of refusing to run.
    pub overwrite: bool,
    /// Number of top-ranked entities per category recorded in the summary.
    pub top_n: usize,
}

#[derive(Debug, Serialize)]
struct CategorySummary<'a> {
    category: &'a str,
    publications: usize,
    publications_without_mentions: usize,
    total_mentions: u64,
    breadth: usize,
    top_entities: Vec<RankedEntity>,
}

#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    entities: usize,
    categories: Vec<CategorySummary<'a>>,
}

/// Category -> entity list, serialised as a JSON object in category order.
struct OrderedCategoryEntities<'a>(Vec<(&'a str, Vec<&'a str>)>);

impl Serialize for OrderedCategoryEntities<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(category, entities)| (category, entities)))
    }
}

/// Writes every output of `run` into `directory`, returning the written paths.
pub fn export_run(
    run: &ScoringRun,
    directory: &Path,
    options: &ExportOptions,
) -> Result<Vec<PathBuf>, ExportError> {
    fs::create_dir_all(directory).map_err(|source| ExportError::Io {
        path: directory.to_path_buf(),
        source,
    })?;

    let mut targets: Vec<PathBuf> = ScoreKind::ALL
        .iter()
        .map(|kind| directory.join(format!("{}.tsv", kind.file_stem())))
        .collect();
    targets.extend(
        [UNIVERSE_FILE, CATEGORY_ENTITIES_FILE, SUMMARY_FILE]
            .iter()
            .map(|name| directory.join(name)),
    );
    // Checked up front so a refused export writes nothing at all.
    if !options.overwrite
        && let Some(existing) = targets.iter().find(|p| p.exists())
    {
        return Err(ExportError::OutputExists(existing.clone()));
    }

    for (kind, path) in ScoreKind::ALL.iter().zip(&targets) {
        write_atomically(path, |w| render_score_table(&run.scores, *kind, w))?;
    }
    write_atomically(&targets[3], |w| render_universe(&run.scores, w))?;
    write_atomically(&targets[4], |w| {
        serde_json::to_writer_pretty(&mut *w, &category_entities(run))?;
        writeln!(w)
    })?;
    write_atomically(&targets[5], |w| {
        serde_json::to_writer_pretty(&mut *w, &summarize(run, options.top_n))?;
        writeln!(w)
    })?;

    log::info!(
        "Wrote {} output files to {}",
        targets.len(),
        directory.display()
    );
    Ok(targets)
}

/// Renders one score table as TSV: a header of `entity` plus the category names,
/// then one row per universe entity. Values use the shortest round-trip decimal form.
pub fn render_score_table<W: Write>(
    tables: &ScoreTables,
    kind: ScoreKind,
    writer: &mut W,
) -> io::Result<()> {
    write!(writer, "entity")?;
    for name in tables.categories().names() {
        write!(writer, "\t{name}")?;
    }
    writeln!(writer)?;

    let table = tables.table(kind);
    let mut line_buffer = String::with_capacity(32 + tables.categories().len() * 24);
    let mut ryu_buffer = ryu::Buffer::new();
    for (entity, row) in tables.entities().ids().iter().zip(table.outer_iter()) {
        line_buffer.clear();
        line_buffer.push_str(entity);
        for &value in row.iter() {
            line_buffer.push('\t');
            line_buffer.push_str(ryu_buffer.format(value));
        }
        writeln!(writer, "{line_buffer}")?;
    }
    Ok(())
}

/// Renders the entity universe, one identifier per line, in row order.
pub fn render_universe<W: Write>(tables: &ScoreTables, writer: &mut W) -> io::Result<()> {
    for entity in tables.entities().ids() {
        writeln!(writer, "{entity}")?;
    }
    Ok(())
}

fn category_entities(run: &ScoringRun) -> OrderedCategoryEntities<'_> {
    let counts = &run.counts;
    OrderedCategoryEntities(
        counts
            .categories()
            .indices()
            .map(|c| {
                (
                    counts.categories().name(c),
                    counts.category_entities(c).collect(),
                )
            })
            .collect(),
    )
}

fn summarize(run: &ScoringRun, top_n: usize) -> RunSummary<'_> {
    let counts = &run.counts;
    let categories = counts
        .categories()
        .indices()
        .map(|c| {
            let name = counts.categories().name(c);
            let diagnostics = counts.diagnostics(c);
            CategorySummary {
                category: name,
                publications: diagnostics.publications,
                publications_without_mentions: diagnostics.missing_publications.len(),
                total_mentions: counts.total(c),
                breadth: counts.breadth(c),
                top_entities: run.scores.top_entities(name, top_n).unwrap_or_default(),
            }
        })
        .collect();
    RunSummary {
        entities: counts.universe().len(),
        categories,
    }
}

fn write_atomically<F>(path: &Path, write: F) -> Result<(), ExportError>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let io_err = |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let temp_path = path.with_file_name(format!(".{file_name}.{}.tmp", std::process::id()));

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(io_err)?;
    let mut writer = BufWriter::new(file);

    let write_result = (|| -> io::Result<()> {
        write(&mut writer)?;
        writer.flush()?;
        let file = writer.into_inner().map_err(io::Error::other)?;
        file.sync_all()
    })();

    if let Err(err) = write_result {
        let _ = fs::remove_file(&temp_path);
        return Err(io_err(err));
    }

    fs::rename(&temp_path, path).map_err(|err| {
        let _ = fs::remove_file(&temp_path);
        io_err(err)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::tests::sample_inputs;
    use crate::pipeline::score_corpus;
    use crate::types::{ExecutionMode, ScoringInputs};
    use tempfile::tempdir;

    fn sample_run() -> ScoringRun {
        let (categories, category_publications, publication_mentions) = sample_inputs();
        let inputs = ScoringInputs {
            category_names: categories.names().to_vec(),
            category_publications,
            publication_mentions,
        };
        score_corpus(&inputs, ExecutionMode::Sequential).unwrap()
    }

    #[test]
    fn score_tables_have_one_row_per_entity_and_one_column_per_category() {
        let run = sample_run();
        let mut buffer = Vec::new();
        render_score_table(&run.scores, ScoreKind::Popularity, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "entity\tA\tB");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "E1\t1.0\t0.0");
        let e2: Vec<f64> = lines[2]
            .split('\t')
            .skip(1)
            .map(|v| v.parse().unwrap())
            .collect();
        assert!(lines[2].starts_with("E2\t"));
        assert!((e2[0] - 0.5).abs() < 1e-12);
        assert!((e2[1] - 1.2619).abs() < 1e-4);
        for line in &lines[1..] {
            assert_eq!(line.split('\t').count(), 3);
        }
    }

    #[test]
    fn export_writes_every_artifact_and_refuses_to_overwrite() {
        let run = sample_run();
        let dir = tempdir().unwrap();
        let out = dir.path().join("result");
        let options = ExportOptions {
            overwrite: false,
            top_n: 5,
        };

        let written = export_run(&run, &out, &options).unwrap();
        assert_eq!(written.len(), 6);
        for path in &written {
            assert!(path.exists(), "missing {}", path.display());
        }
        assert_eq!(fs::read_to_string(out.join(UNIVERSE_FILE)).unwrap(), "E1\nE2\n");

        let category_entities: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join(CATEGORY_ENTITIES_FILE)).unwrap())
                .unwrap();
        assert_eq!(category_entities["A"], serde_json::json!(["E1", "E2"]));
        assert_eq!(category_entities["B"], serde_json::json!(["E2"]));

        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join(SUMMARY_FILE)).unwrap()).unwrap();
        assert_eq!(summary["entities"], 2);
        assert_eq!(summary["categories"][0]["category"], "A");
        assert_eq!(summary["categories"][0]["total_mentions"], 4);
        assert_eq!(summary["categories"][1]["top_entities"][0]["entity"], "E2");

        assert!(matches!(
            export_run(&run, &out, &options),
            Err(ExportError::OutputExists(_))
        ));
        let forced = ExportOptions {
            overwrite: true,
            ..options
        };
        assert!(export_run(&run, &out, &forced).is_ok());
        let leftovers: Vec<_> = fs::read_dir(&out)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn rendering_is_byte_identical_across_runs() {
        let render = |run: &ScoringRun| {
            let mut buffer = Vec::new();
            for kind in ScoreKind::ALL {
                render_score_table(&run.scores, kind, &mut buffer).unwrap();
            }
            buffer
        };
        assert_eq!(render(&sample_run()), render(&sample_run()));
    }
}
