use approx::assert_abs_diff_eq;
use caseolap::export::{ExportOptions, export_run, render_score_table};
use caseolap::pipeline::score_counts;
use caseolap::aggregate::aggregate_counts;
use caseolap::types::CategorySet;
use caseolap::{
    CategoryPublications, ExecutionMode, PublicationMentions, ScoreKind, ScoringInputs,
    score_corpus,
};
use std::collections::HashMap;

fn mentions(entries: &[(&str, &[(&str, u64)])]) -> PublicationMentions {
    entries
        .iter()
        .map(|(publication, counts)| {
            (
                publication.to_string(),
                counts
                    .iter()
                    .map(|(entity, count)| (entity.to_string(), *count))
                    .collect::<HashMap<_, _>>(),
            )
        })
        .collect()
}

fn publications(entries: &[(&str, &[&str])]) -> CategoryPublications {
    entries
        .iter()
        .map(|(category, pmids)| {
            (
                category.to_string(),
                pmids.iter().map(|p| p.to_string()).collect(),
            )
        })
        .collect()
}

fn two_category_inputs() -> ScoringInputs {
    ScoringInputs {
        category_names: vec!["A".to_string(), "B".to_string()],
        category_publications: publications(&[("A", &["P1", "P2"]), ("B", &["P3"])]),
        publication_mentions: mentions(&[
            ("P1", &[("E1", 2)]),
            ("P2", &[("E1", 1), ("E2", 1)]),
            ("P3", &[("E2", 3)]),
        ]),
    }
}

#[test]
fn two_category_corpus_matches_reference_scores() {
    let run = score_corpus(&two_category_inputs(), ExecutionMode::Sequential).unwrap();
    let scores = &run.scores;

    let expected = [
        ("E1", "A", 1.0000, 0.4688, 0.4688),
        ("E2", "A", 0.5000, 0.0766, 0.0383),
        ("E1", "B", 0.0000, 0.0000, 0.0000),
        ("E2", "B", 1.2619, 0.5169, 0.6524),
    ];
    for (entity, category, popularity, distinctiveness, combined) in expected {
        let record = scores.get(entity, category).unwrap();
        assert_abs_diff_eq!(record.popularity, popularity, epsilon = 5e-4);
        assert_abs_diff_eq!(record.distinctiveness, distinctiveness, epsilon = 5e-4);
        assert_abs_diff_eq!(record.combined, combined, epsilon = 5e-4);
    }
    assert_eq!(scores.len(), 4);
}

/// A larger corpus with three categories and uneven entity spread.
fn cardiovascular_inputs() -> ScoringInputs {
    ScoringInputs {
        category_names: vec!["IHD".into(), "CM".into(), "ARR".into()],
        category_publications: publications(&[
            ("IHD", &["101", "102", "103", "104", "999"]),
            ("CM", &["201", "202", "203"]),
            ("ARR", &["301", "302", "103"]),
        ]),
        publication_mentions: mentions(&[
            ("101", &[("P02768", 4), ("P04114", 2)]),
            ("102", &[("P04114", 5), ("Q14524", 1)]),
            ("103", &[("P04114", 1), ("Q12809", 2)]),
            ("104", &[("P02768", 1)]),
            ("201", &[("P12883", 6), ("P02768", 1)]),
            ("202", &[("P12883", 2), ("Q14524", 1)]),
            ("203", &[("P10916", 3)]),
            ("301", &[("Q14524", 7), ("Q12809", 3)]),
            ("302", &[("Q12809", 4)]),
        ]),
    }
}

#[test]
fn every_cell_respects_the_score_invariants() {
    let run = score_corpus(&cardiovascular_inputs(), ExecutionMode::Sequential).unwrap();
    let counts = &run.counts;
    let scores = &run.scores;

    assert_eq!(scores.entities().len(), 6);
    assert_eq!(scores.len(), 6 * 3);
    for kind in ScoreKind::ALL {
        assert_eq!(scores.table(kind).dim(), (6, 3));
    }

    for category in counts.categories().indices() {
        for (e, entity) in scores.entities().ids().iter().enumerate() {
            let index = counts.universe().get(entity).unwrap();
            let record = scores.record(index, category);
            let tf = counts.term_count(index, category);

            assert!((0.0..1.0).contains(&record.distinctiveness));
            assert!(record.popularity >= 0.0);
            assert_eq!(record.combined, record.popularity * record.distinctiveness);
            if tf == 0 {
                assert_eq!(record.popularity, 0.0, "{entity} row {e}");
                assert_eq!(record.distinctiveness, 0.0, "{entity} row {e}");
            } else {
                assert!(record.distinctiveness > 0.0, "{entity} row {e}");
            }
        }
    }

    // The shared publication 103 counts towards both IHD and ARR.
    let q12809 = counts.universe().get("Q12809").unwrap();
    let ihd = counts.categories().get("IHD").unwrap();
    let arr = counts.categories().get("ARR").unwrap();
    assert_eq!(counts.term_count(q12809, ihd), 2);
    assert_eq!(counts.term_count(q12809, arr), 9);
    assert_eq!(counts.diagnostics(ihd).missing_publications, vec!["999"]);
}

#[test]
fn concentrated_entities_outrank_spread_ones() {
    let run = score_corpus(&cardiovascular_inputs(), ExecutionMode::Sequential).unwrap();
    let top_cm = run.scores.top_entities("CM", 3).unwrap();
    assert_eq!(top_cm[0].entity, "P12883");

    // Q14524 is mentioned in all three categories; its best distinctiveness stays
    // below that of P12883, which only CM mentions.
    let spread = ["IHD", "CM", "ARR"]
        .iter()
        .map(|c| run.scores.get("Q14524", c).unwrap().distinctiveness)
        .fold(0.0_f64, f64::max);
    let focused = run.scores.get("P12883", "CM").unwrap().distinctiveness;
    assert!(focused > spread);
}

#[test]
fn exported_tables_are_byte_identical_across_modes() {
    let inputs = cardiovascular_inputs();
    let sequential = score_corpus(&inputs, ExecutionMode::Sequential).unwrap();
    let parallel = score_corpus(&inputs, ExecutionMode::Parallel).unwrap();

    for kind in ScoreKind::ALL {
        let mut a = Vec::new();
        let mut b = Vec::new();
        render_score_table(&sequential.scores, kind, &mut a).unwrap();
        render_score_table(&parallel.scores, kind, &mut b).unwrap();
        assert_eq!(a, b, "{kind} table differs between modes");
    }

    let dir = tempfile::tempdir().unwrap();
    let options = ExportOptions {
        overwrite: false,
        top_n: 3,
    };
    let first = export_run(&sequential, &dir.path().join("seq"), &options).unwrap();
    let second = export_run(&parallel, &dir.path().join("par"), &options).unwrap();
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(std::fs::read(a).unwrap(), std::fs::read(b).unwrap());
    }
}

#[test]
fn stages_compose_the_same_as_the_pipeline() {
    let inputs = cardiovascular_inputs();
    let categories = CategorySet::new(inputs.category_names.clone()).unwrap();
    let counts = aggregate_counts(
        &categories,
        &inputs.category_publications,
        &inputs.publication_mentions,
        ExecutionMode::Sequential,
    )
    .unwrap();
    let staged = score_counts(counts, ExecutionMode::Sequential).unwrap();
    let direct = score_corpus(&inputs, ExecutionMode::Sequential).unwrap();
    assert_eq!(staged.scores.combined(), direct.scores.combined());
}
