/// Region catalog loading and validation through the public API
mod common;

use common::random_sequence;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use regionplex::{RegionCatalog, RegionplexError, ValidationIssue};

/// Distinct amplicons: each starts with its index spelled in bases.
fn amplicon(index: usize, len: usize, seed: u64) -> String {
    let mut prefix = String::new();
    let mut n = index;
    for _ in 0..6 {
        prefix.push(b"ACGT"[n % 4] as char);
        n /= 4;
    }
    format!("{}{}", prefix, random_sequence(seed + index as u64, len))
}

fn render(rows: &[(String, String, Option<String>)]) -> String {
    let mut text = String::from("Name\tAmplicon_Sequence\tsgRNA\n");
    for (name, seq, guide) in rows {
        text.push_str(&format!(
            "{}\t{}\t{}\n",
            name,
            seq,
            guide.as_deref().unwrap_or("NA")
        ));
    }
    text
}

fn render_catalog(catalog: &RegionCatalog) -> String {
    let rows: Vec<_> = catalog
        .iter()
        .map(|r| (r.name.clone(), r.sequence.clone(), r.guide.clone()))
        .collect();
    render(&rows)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_catalog_reparses_to_itself(
        count in 1usize..12,
        len in 40usize..120,
        seed in any::<u32>(),
        guide_at in 0usize..20,
    ) {
        let rows: Vec<_> = (0..count)
            .map(|i| {
                let seq = amplicon(i, len, seed as u64);
                let guide = (i % 2 == 0).then(|| seq[guide_at..guide_at + 20].to_string());
                (format!("site_{}", i), seq, guide)
            })
            .collect();

        let catalog = RegionCatalog::from_reader(render(&rows).as_bytes()).unwrap();
        prop_assert_eq!(catalog.len(), count);

        let reparsed = RegionCatalog::from_reader(render_catalog(&catalog).as_bytes()).unwrap();
        prop_assert_eq!(reparsed, catalog);
    }
}

#[test]
fn test_lowercase_input_is_normalized() {
    let text = "amp1\tacgtacgtacgtacgtacgtacgt\tcgtacgtacgtacgtacgta\n";
    let catalog = RegionCatalog::from_reader(text.as_bytes()).unwrap();
    let region = catalog.get("amp1").unwrap();
    assert_eq!(region.sequence, "ACGTACGTACGTACGTACGTACGT");
    assert_eq!(region.guide.as_deref(), Some("CGTACGTACGTACGTACGTA"));
    assert!(!region.cut_offsets.is_empty());
}

#[test]
fn test_duplicate_sequence_without_duplicate_name() {
    let seq = random_sequence(7, 60);
    let text = format!("a\t{}\nb\t{}\n", seq, seq);
    let err = RegionCatalog::from_reader(text.as_bytes()).unwrap_err();
    match err {
        RegionplexError::Validation(report) => {
            assert!(report.has_duplicate_sequence());
            assert!(!report.has_duplicate_name());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_duplicate_name_without_duplicate_sequence() {
    let text = format!(
        "a\t{}\na\t{}\n",
        random_sequence(1, 60),
        random_sequence(2, 60)
    );
    let err = RegionCatalog::from_reader(text.as_bytes()).unwrap_err();
    match err {
        RegionplexError::Validation(report) => {
            assert!(report.has_duplicate_name());
            assert!(!report.has_duplicate_sequence());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_every_problem_is_reported() {
    let text = format!(
        "ok\t{}\nbad_bases\tACGTXXACGT\nno_guide\t{}\tTTTTTTTTTTTTTTTTTTTT\n",
        "ACGT".repeat(15),
        "ACGA".repeat(15)
    );
    let err = RegionCatalog::from_reader(text.as_bytes()).unwrap_err();
    let RegionplexError::Validation(report) = err else {
        panic!("expected a validation error");
    };
    assert_eq!(report.issues().len(), 2);
    assert!(report
        .issues()
        .iter()
        .any(|i| matches!(i, ValidationIssue::InvalidNucleotide { region, .. } if region == "bad_bases")));
    assert!(report
        .issues()
        .iter()
        .any(|i| matches!(i, ValidationIssue::GuideNotFound { region, .. } if region == "no_guide")));
}

#[test]
fn test_names_that_clean_to_the_same_file_collide() {
    let text = format!(
        "site 1\t{}\nsite1\t{}\n",
        random_sequence(3, 50),
        random_sequence(4, 50)
    );
    let err = RegionCatalog::from_reader(text.as_bytes()).unwrap_err();
    let RegionplexError::Validation(report) = err else {
        panic!("expected a validation error");
    };
    assert!(report
        .issues()
        .iter()
        .any(|i| matches!(i, ValidationIssue::FilenameCollision { .. })));
}
