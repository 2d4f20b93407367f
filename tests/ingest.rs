use std::path::{Path, PathBuf};

use assert_matches::assert_matches;
use serde_json::json;

use synleth_harmonizer::config::{Config, ConfigLoader, ResolvedConfig};
use synleth_harmonizer::domain::{Assay, Perturbation};
use synleth_harmonizer::error::SlError;
use synleth_harmonizer::hgnc::SymbolResolver;
use synleth_harmonizer::ingest::{DatasetIngestor, ManualIngestor, TableIngestor};

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn resolver() -> SymbolResolver {
    SymbolResolver::from_path(fixtures().join("hgnc_small.tsv")).unwrap()
}

fn resolve(value: serde_json::Value) -> ResolvedConfig {
    let config: Config = serde_json::from_value(value).unwrap();
    ConfigLoader::resolve_config(config, &fixtures()).unwrap()
}

fn kras_study(overrides: serde_json::Value) -> serde_json::Value {
    let mut study = json!({
        "id": "kras-shrna",
        "source_id": "19490893",
        "path": "kras_screen.tsv",
        "gene_a": {"fixed": "KRAS"},
        "gene_b": {"column": "gene"},
        "gene_a_perturbation": "activating mutation",
        "gene_b_perturbation": "shRNA",
        "assay": "RNA-interference assay",
        "effect_type": "zscore",
        "effect_column": "score",
        "cell_line": "HCT116",
        "cell_line_identifier": "CVCL_0291",
        "interaction": {"rule": "column", "column": "hit", "positive": ["yes"]},
        "on_missing_gene": "skip",
        "skip_symbols": ["SCRAM"],
        "symbol_overrides": {"CLN10": "CTSD"}
    });
    if let (Some(target), Some(extra)) = (study.as_object_mut(), overrides.as_object()) {
        for (key, value) in extra {
            target.insert(key.clone(), value.clone());
        }
    }
    study
}

#[test]
fn table_study_is_resolved_and_reduced() {
    let config = resolve(json!({ "studies": [kras_study(json!({}))] }));
    let ingestor = TableIngestor::new(config.studies[0].clone());
    let outcome = ingestor.ingest(&resolver()).unwrap();

    let rows = outcome
        .records
        .iter()
        .map(|r| {
            (
                r.gene_b_symbol().to_string(),
                r.effect_size().to_string(),
                r.is_canonical(),
                r.is_interaction(),
            )
        })
        .collect::<Vec<_>>();
    assert_eq!(
        rows,
        vec![
            ("STK33".to_string(), "3.3".to_string(), true, true),
            ("STK33".to_string(), "-3.3".to_string(), false, true),
            ("STK33".to_string(), "-1.2".to_string(), false, true),
            ("PARP1".to_string(), "-0.8".to_string(), true, false),
            ("CTSD".to_string(), "-2.0".to_string(), true, true),
        ]
    );

    let first = &outcome.records[0];
    assert_eq!(first.gene_a_id(), "NCBIGene:3845");
    assert_eq!(first.gene_b_id(), "NCBIGene:65975");
    assert_eq!(first.source_id(), "PMID:19490893");
    assert_eq!(first.cell_line_identifier(), "CVCL_0291");
    assert_eq!(first.effect_type(), "zscore");
    assert_eq!(*first.assay(), Assay::RnaInterference);

    let stats = outcome.stats();
    assert_eq!(stats.rows_read, 7);
    assert_eq!(stats.rows_skipped, 2);
    assert_eq!(stats.positive, 4);
    assert_eq!(stats.negative, 1);
    assert_eq!(stats.canonical, 3);
    assert_eq!(stats.unresolved_symbols, vec!["UNKNOWNX".to_string()]);
}

#[test]
fn unresolved_symbol_fails_by_default() {
    let config = resolve(json!({
        "studies": [kras_study(json!({"on_missing_gene": "fail"}))]
    }));
    let err = TableIngestor::new(config.studies[0].clone())
        .ingest(&resolver())
        .unwrap_err();
    assert_matches!(err, SlError::UnresolvedSymbol { symbol, .. } if symbol == "UNKNOWNX");
}

#[test]
fn sentinel_policy_keeps_unresolved_rows() {
    let config = resolve(json!({
        "studies": [kras_study(json!({"on_missing_gene": "sentinel", "reduce": false}))]
    }));
    let outcome = TableIngestor::new(config.studies[0].clone())
        .ingest(&resolver())
        .unwrap();
    assert_eq!(outcome.records.len(), 6);
    let unknown = outcome.records.last().unwrap();
    assert_eq!(unknown.gene_b_symbol(), "UNKNOWNX");
    assert_eq!(unknown.gene_b_id(), "n/a");
    assert!(outcome.records.iter().all(|r| !r.is_canonical()));
}

#[test]
fn effect_threshold_rule_classifies_rows() {
    let config = resolve(json!({
        "studies": [kras_study(json!({
            "interaction": {"rule": "effect_at_most", "value": -1.0}
        }))]
    }));
    let outcome = TableIngestor::new(config.studies[0].clone())
        .ingest(&resolver())
        .unwrap();
    let positives = outcome
        .records
        .iter()
        .filter(|r| r.is_interaction())
        .map(|r| r.effect_size().to_string())
        .collect::<Vec<_>>();
    assert_eq!(positives, ["-3.3", "-1.2", "-2.0"]);
}

#[test]
fn blank_effect_cell_clears_the_effect_type() {
    let config = resolve(json!({
        "studies": [kras_study(json!({"path": "kras_screen_blank.tsv", "reduce": false}))]
    }));
    let outcome = TableIngestor::new(config.studies[0].clone())
        .ingest(&resolver())
        .unwrap();
    let effects = outcome
        .records
        .iter()
        .map(|r| (r.effect_type().to_string(), r.effect_size().to_string()))
        .collect::<Vec<_>>();
    assert_eq!(
        effects,
        vec![
            ("zscore".to_string(), "-1.2".to_string()),
            (String::new(), String::new()),
            ("zscore".to_string(), "-0.8".to_string()),
        ]
    );
    assert!(outcome.records[1].effect_size().is_missing());
    assert!(outcome.records[1].is_interaction());
}

#[test]
fn reducing_a_blank_effect_fails() {
    let config = resolve(json!({
        "studies": [kras_study(json!({"path": "kras_screen_blank.tsv"}))]
    }));
    assert!(config.studies[0].reduce);
    let err = TableIngestor::new(config.studies[0].clone())
        .ingest(&resolver())
        .unwrap_err();
    assert_matches!(err, SlError::NonNumericEffect { gene_b, .. } if gene_b == "STK33");
}

#[test]
fn reducing_a_text_effect_fails() {
    let config = resolve(json!({
        "studies": [kras_study(json!({"path": "kras_screen_text.tsv"}))]
    }));
    let err = TableIngestor::new(config.studies[0].clone())
        .ingest(&resolver())
        .unwrap_err();
    assert_matches!(
        err,
        SlError::NonNumericEffect { gene_b, value, .. } if gene_b == "STK33" && value == "strong"
    );
}

#[test]
fn effect_rule_skips_rows_without_effect() {
    let config = resolve(json!({
        "studies": [kras_study(json!({
            "path": "kras_screen_blank.tsv",
            "interaction": {"rule": "effect_at_most", "value": -1.0}
        }))]
    }));
    let outcome = TableIngestor::new(config.studies[0].clone())
        .ingest(&resolver())
        .unwrap();
    let stats = outcome.stats();
    assert_eq!(stats.rows_read, 3);
    assert_eq!(stats.rows_skipped, 1);
    assert_eq!(stats.positive, 1);
    assert_eq!(stats.negative, 1);
    assert!(outcome.records.iter().all(|r| !r.effect_size().is_missing()));
}

#[test]
fn effect_rule_rejects_text_effects() {
    let config = resolve(json!({
        "studies": [kras_study(json!({
            "path": "kras_screen_text.tsv",
            "interaction": {"rule": "effect_at_most", "value": -1.0}
        }))]
    }));
    let err = TableIngestor::new(config.studies[0].clone())
        .ingest(&resolver())
        .unwrap_err();
    assert_matches!(
        err,
        SlError::MalformedRow { study, message, .. } if study == "kras-shrna" && message.contains("strong")
    );
}

#[test]
fn decimal_comma_effects_keep_their_digits() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("comma.tsv"),
        "gene\tscore\thit\nSTK33\t-1,50\tyes\n",
    )
    .unwrap();
    let study = kras_study(json!({"path": "comma.tsv", "decimal_comma": true}));
    let config: Config = serde_json::from_value(json!({ "studies": [study] })).unwrap();
    let config = ConfigLoader::resolve_config(config, dir.path()).unwrap();
    let outcome = TableIngestor::new(config.studies[0].clone())
        .ingest(&resolver())
        .unwrap();
    assert_eq!(outcome.records[0].effect_size().to_string(), "-1.50");
    assert_eq!(outcome.records[0].effect_size().value(), Some(-1.5));
}

#[test]
fn headerless_study_with_separated_symbols() {
    let config = resolve(json!({
        "studies": [{
            "id": "parp-panel",
            "source_id": "PMID:18832051",
            "path": "parp_panel.csv",
            "delimiter": ",",
            "has_header": false,
            "gene_a": {"column": 0, "separator": ";"},
            "gene_b": {"fixed": "PARP1"},
            "gene_a_perturbation": "lof_mutation",
            "gene_b_perturbation": "pharmaceutical",
            "assay": "growth inhibition assay",
            "interaction": {"rule": "all_negative"},
            "background": {"status": "wildtype", "gene": "INrf2"}
        }]
    }));
    let study = &config.studies[0];
    assert!(!study.reduce);

    let outcome = TableIngestor::new(study.clone())
        .ingest(&resolver())
        .unwrap();
    let pairs = outcome
        .records
        .iter()
        .map(|r| format!("{}-{}", r.gene_a_symbol(), r.gene_b_symbol()))
        .collect::<Vec<_>>();
    assert_eq!(pairs, ["BRCA1-PARP1", "BRCA2-PARP1", "ATR-PARP1"]);

    let record = &outcome.records[0];
    assert!(!record.is_interaction());
    assert_eq!(record.effect_type(), "");
    assert_eq!(record.effect_size().to_string(), "");
    assert_eq!(*record.gene_b_perturbation(), Perturbation::Pharmaceutical);
    assert_eq!(record.background().gene_symbol, "KEAP1");
    assert_eq!(record.background().gene_id, "NCBIGene:9817");
}

#[test]
fn missing_dataset_file_is_a_study_error() {
    let config = resolve(json!({
        "studies": [kras_study(json!({"path": "does_not_exist.tsv"}))]
    }));
    let err = TableIngestor::new(config.studies[0].clone())
        .ingest(&resolver())
        .unwrap_err();
    assert_matches!(err, SlError::StudyRead { study, .. } if study == "kras-shrna");
}

#[test]
fn unknown_column_is_reported() {
    let config = resolve(json!({
        "studies": [kras_study(json!({"effect_column": "z"}))]
    }));
    let err = TableIngestor::new(config.studies[0].clone())
        .ingest(&resolver())
        .unwrap_err();
    assert_matches!(err, SlError::StudyRead { message, .. } if message.contains("z"));
}

#[test]
fn manual_entries_resolve_every_gene() {
    let config = resolve(json!({
        "manual": [
            {
                "gene_a": "KRAS2",
                "gene_b": "STK33",
                "gene_a_perturbation": "activating mutation",
                "gene_b_perturbation": "shRNA",
                "assay": "RNA-interference assay",
                "source_id": "19490893",
                "effect_type": "fold change",
                "effect_size": 0.4
            },
            {
                "gene_a": "BRCA1",
                "gene_b": "PARP1",
                "gene_a_perturbation": "lof_mutation",
                "gene_b_perturbation": "drug",
                "assay": "cell viability assay",
                "source_id": "PMID:15829966",
                "effect_type": "fold change",
                "cancer_type": "breast carcinoma",
                "is_interaction": false
            }
        ]
    }));
    let outcome = ManualIngestor::new(config.manual.clone())
        .ingest(&resolver())
        .unwrap();
    assert_eq!(outcome.study_id, "manual");
    assert_eq!(outcome.records.len(), 2);

    let kras = &outcome.records[0];
    assert_eq!(kras.gene_a_symbol(), "KRAS");
    assert_eq!(kras.source_id(), "PMID:19490893");
    assert_eq!(kras.effect_size().to_string(), "0.4");

    // An effect type without a size leaves both empty.
    let brca = &outcome.records[1];
    assert_eq!(brca.effect_type(), "");
    assert!(brca.effect_size().is_missing());
    assert_eq!(brca.cancer_type(), "breast carcinoma");
    assert_eq!(brca.cancer_type_identifier(), "n/a");
    assert!(!brca.is_interaction());

    let size_only = resolve(json!({
        "manual": [{
            "gene_a": "KRAS",
            "gene_b": "STK33",
            "gene_a_perturbation": "activating mutation",
            "gene_b_perturbation": "shRNA",
            "assay": "RNA-interference assay",
            "source_id": "19490893",
            "effect_size": -1.1
        }]
    }));
    let outcome = ManualIngestor::new(size_only.manual)
        .ingest(&resolver())
        .unwrap();
    assert_eq!(outcome.records[0].effect_type(), "");
    assert!(outcome.records[0].effect_size().is_missing());

    let unknown = resolve(json!({
        "manual": [{
            "gene_a": "NOPE",
            "gene_b": "STK33",
            "gene_a_perturbation": "knockout",
            "gene_b_perturbation": "knockout",
            "assay": "PDX",
            "source_id": "1"
        }]
    }));
    let err = ManualIngestor::new(unknown.manual)
        .ingest(&resolver())
        .unwrap_err();
    assert_matches!(err, SlError::UnresolvedSymbol { study, .. } if study == "manual");
}
