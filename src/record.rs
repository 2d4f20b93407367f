//! The common record every study is normalized into.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Assay, BackgroundDependency, EffectSize, HUMAN_TAXON, N_A, Perturbation};
use crate::error::SlError;
use crate::hgnc::SymbolResolver;

pub const TSV_HEADER: [&str; 16] = [
    "geneA",
    "geneA.id",
    "geneB",
    "geneB.id",
    "geneA.perturbation",
    "geneB.perturbation",
    "effect.type",
    "effect.size",
    "species.id",
    "assay",
    "cell.line",
    "cellosaurus.id",
    "cancer.type",
    "ncit.id",
    "pmid",
    "SL",
];

pub const TSV_HEADER_EXPANDED: [&str; 21] = [
    "geneA",
    "geneA.ncbi-id",
    "geneA.ensembl-id",
    "geneB",
    "geneB.ncbi-id",
    "geneB.ensembl-id",
    "geneA.perturbation",
    "geneB.perturbation",
    "effect.type",
    "effect.size",
    "species.id",
    "assay",
    "cell.line",
    "cellosaurus.id",
    "cancer.type",
    "ncit.id",
    "pmid",
    "SL",
    "back.status",
    "back.gene",
    "back.gene.id",
];

/// Lookup of a secondary identifier (e.g. Ensembl) by approved symbol.
pub trait SecondaryIds {
    fn secondary_id(&self, symbol: &str) -> Option<&str>;
}

impl SecondaryIds for HashMap<String, String> {
    fn secondary_id(&self, symbol: &str) -> Option<&str> {
        self.get(symbol).map(String::as_str)
    }
}

impl SecondaryIds for SymbolResolver {
    fn secondary_id(&self, symbol: &str) -> Option<&str> {
        self.get_ensembl_id(symbol)
    }
}

/// One observation of a candidate interaction between two genes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    gene_a_symbol: String,
    gene_a_id: String,
    gene_b_symbol: String,
    gene_b_id: String,
    gene_a_perturbation: Perturbation,
    gene_b_perturbation: Perturbation,
    effect_type: String,
    effect_size: EffectSize,
    species_id: String,
    assay: Assay,
    cell_line: String,
    cell_line_identifier: String,
    cancer_type: String,
    cancer_type_identifier: String,
    source_id: String,
    is_interaction: bool,
    is_canonical: bool,
    background: BackgroundDependency,
}

impl InteractionRecord {
    pub fn builder() -> InteractionRecordBuilder {
        InteractionRecordBuilder::default()
    }

    pub fn gene_a_symbol(&self) -> &str {
        &self.gene_a_symbol
    }

    pub fn gene_a_id(&self) -> &str {
        &self.gene_a_id
    }

    pub fn gene_b_symbol(&self) -> &str {
        &self.gene_b_symbol
    }

    pub fn gene_b_id(&self) -> &str {
        &self.gene_b_id
    }

    pub fn gene_a_perturbation(&self) -> &Perturbation {
        &self.gene_a_perturbation
    }

    pub fn gene_b_perturbation(&self) -> &Perturbation {
        &self.gene_b_perturbation
    }

    pub fn effect_type(&self) -> &str {
        &self.effect_type
    }

    pub fn effect_size(&self) -> &EffectSize {
        &self.effect_size
    }

    pub fn species_id(&self) -> &str {
        &self.species_id
    }

    pub fn assay(&self) -> &Assay {
        &self.assay
    }

    pub fn cell_line(&self) -> &str {
        &self.cell_line
    }

    pub fn cell_line_identifier(&self) -> &str {
        &self.cell_line_identifier
    }

    pub fn cancer_type(&self) -> &str {
        &self.cancer_type
    }

    pub fn cancer_type_identifier(&self) -> &str {
        &self.cancer_type_identifier
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn is_interaction(&self) -> bool {
        self.is_interaction
    }

    pub fn is_canonical(&self) -> bool {
        self.is_canonical
    }

    pub fn background(&self) -> &BackgroundDependency {
        &self.background
    }

    pub fn mark_canonical(&mut self) {
        self.is_canonical = true;
    }

    fn flag(&self) -> String {
        let flag = if self.is_interaction { "T" } else { "F" };
        flag.to_string()
    }

    /// Fields in the fixed column order of [`TSV_HEADER`].
    pub fn tsv_fields(&self) -> Vec<String> {
        vec![
            self.gene_a_symbol.clone(),
            self.gene_a_id.clone(),
            self.gene_b_symbol.clone(),
            self.gene_b_id.clone(),
            self.gene_a_perturbation.to_string(),
            self.gene_b_perturbation.to_string(),
            self.effect_type.clone(),
            self.effect_size.to_string(),
            self.species_id.clone(),
            self.assay.to_string(),
            self.cell_line.clone(),
            self.cell_line_identifier.clone(),
            self.cancer_type.clone(),
            self.cancer_type_identifier.clone(),
            self.source_id.clone(),
            self.flag(),
        ]
    }

    /// Fields in the order of [`TSV_HEADER_EXPANDED`]: each gene's secondary id
    /// follows its primary id, and the background triple closes the row.
    pub fn tsv_fields_expanded(&self, secondary: &dyn SecondaryIds) -> Vec<String> {
        let lookup = |symbol: &str| secondary.secondary_id(symbol).unwrap_or(N_A).to_string();
        vec![
            self.gene_a_symbol.clone(),
            self.gene_a_id.clone(),
            lookup(&self.gene_a_symbol),
            self.gene_b_symbol.clone(),
            self.gene_b_id.clone(),
            lookup(&self.gene_b_symbol),
            self.gene_a_perturbation.to_string(),
            self.gene_b_perturbation.to_string(),
            self.effect_type.clone(),
            self.effect_size.to_string(),
            self.species_id.clone(),
            self.assay.to_string(),
            self.cell_line.clone(),
            self.cell_line_identifier.clone(),
            self.cancer_type.clone(),
            self.cancer_type_identifier.clone(),
            self.source_id.clone(),
            self.flag(),
            self.background.status.clone(),
            self.background.gene_symbol.clone(),
            self.background.gene_id.clone(),
        ]
    }

    pub fn tsv_line(&self) -> String {
        self.tsv_fields().join("\t")
    }
}

/// Collects the fields of an [`InteractionRecord`]; `build` enforces the
/// required ones.
#[derive(Debug, Clone, Default)]
pub struct InteractionRecordBuilder {
    gene_a_symbol: Option<String>,
    gene_a_id: Option<String>,
    gene_b_symbol: Option<String>,
    gene_b_id: Option<String>,
    gene_a_perturbation: Option<Perturbation>,
    gene_b_perturbation: Option<Perturbation>,
    effect: Option<(String, EffectSize)>,
    species_id: Option<String>,
    assay: Option<Assay>,
    cell_line: Option<String>,
    cell_line_identifier: Option<String>,
    cancer_type: Option<String>,
    cancer_type_identifier: Option<String>,
    source_id: Option<String>,
    is_interaction: Option<bool>,
    background: Option<BackgroundDependency>,
}

impl InteractionRecordBuilder {
    pub fn gene_a(mut self, symbol: impl Into<String>, id: impl Into<String>) -> Self {
        self.gene_a_symbol = Some(symbol.into());
        self.gene_a_id = Some(id.into());
        self
    }

    pub fn gene_b(mut self, symbol: impl Into<String>, id: impl Into<String>) -> Self {
        self.gene_b_symbol = Some(symbol.into());
        self.gene_b_id = Some(id.into());
        self
    }

    pub fn gene_a_perturbation(mut self, value: impl Into<Perturbation>) -> Self {
        self.gene_a_perturbation = Some(value.into());
        self
    }

    pub fn gene_b_perturbation(mut self, value: impl Into<Perturbation>) -> Self {
        self.gene_b_perturbation = Some(value.into());
        self
    }

    /// Effect type and size are only ever set together. A blank type or a
    /// missing size clears both when the record is built.
    pub fn effect(mut self, effect_type: impl Into<String>, size: impl Into<EffectSize>) -> Self {
        self.effect = Some((effect_type.into(), size.into()));
        self
    }

    pub fn species_id(mut self, value: impl Into<String>) -> Self {
        self.species_id = Some(value.into());
        self
    }

    pub fn assay(mut self, value: impl Into<Assay>) -> Self {
        self.assay = Some(value.into());
        self
    }

    pub fn cell_line(mut self, name: impl Into<String>, identifier: impl Into<String>) -> Self {
        self.cell_line = Some(name.into());
        self.cell_line_identifier = Some(identifier.into());
        self
    }

    pub fn cancer_type(mut self, name: impl Into<String>, identifier: impl Into<String>) -> Self {
        self.cancer_type = Some(name.into());
        self.cancer_type_identifier = Some(identifier.into());
        self
    }

    pub fn source_id(mut self, value: impl Into<String>) -> Self {
        self.source_id = Some(value.into());
        self
    }

    pub fn is_interaction(mut self, value: bool) -> Self {
        self.is_interaction = Some(value);
        self
    }

    pub fn background(mut self, value: BackgroundDependency) -> Self {
        self.background = Some(value);
        self
    }

    pub fn build(self) -> Result<InteractionRecord, SlError> {
        let gene_a_symbol = required(self.gene_a_symbol, "gene_a_symbol")?;
        let gene_a_id = required(self.gene_a_id, "gene_a_id")?;
        let gene_b_symbol = required(self.gene_b_symbol, "gene_b_symbol")?;
        let gene_b_id = required(self.gene_b_id, "gene_b_id")?;
        let gene_a_perturbation = self
            .gene_a_perturbation
            .filter(|value| !value.as_str().is_empty())
            .ok_or(SlError::MissingField("gene_a_perturbation"))?;
        let gene_b_perturbation = self
            .gene_b_perturbation
            .filter(|value| !value.as_str().is_empty())
            .ok_or(SlError::MissingField("gene_b_perturbation"))?;
        let assay = self
            .assay
            .filter(|value| !value.as_str().is_empty())
            .ok_or(SlError::MissingField("assay"))?;
        let source_id = required(self.source_id, "source_id")?;
        let is_interaction = self
            .is_interaction
            .ok_or(SlError::MissingField("is_interaction"))?;
        let (effect_type, effect_size) = self
            .effect
            .filter(|(effect_type, size)| !effect_type.trim().is_empty() && !size.is_missing())
            .unwrap_or_else(|| (String::new(), EffectSize::Missing));

        Ok(InteractionRecord {
            gene_a_symbol,
            gene_a_id,
            gene_b_symbol,
            gene_b_id,
            gene_a_perturbation,
            gene_b_perturbation,
            effect_type,
            effect_size,
            species_id: self.species_id.unwrap_or_else(|| HUMAN_TAXON.to_string()),
            assay,
            cell_line: self.cell_line.unwrap_or_else(|| N_A.to_string()),
            cell_line_identifier: self
                .cell_line_identifier
                .unwrap_or_else(|| N_A.to_string()),
            cancer_type: self.cancer_type.unwrap_or_else(|| N_A.to_string()),
            cancer_type_identifier: self
                .cancer_type_identifier
                .unwrap_or_else(|| N_A.to_string()),
            source_id,
            is_interaction,
            is_canonical: false,
            background: self.background.unwrap_or_default(),
        })
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, SlError> {
    value
        .filter(|value| !value.trim().is_empty())
        .ok_or(SlError::MissingField(field))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn minimal() -> InteractionRecordBuilder {
        InteractionRecord::builder()
            .gene_a("KRAS", "NCBIGene:3845")
            .gene_b("STK33", "NCBIGene:65975")
            .gene_a_perturbation(Perturbation::ActivatingMutation)
            .gene_b_perturbation("shRNA")
            .assay("RNA-interference assay")
            .source_id("PMID:19490893")
            .is_interaction(true)
    }

    #[test]
    fn minimal_record_defaults() {
        let record = minimal().build().unwrap();
        assert_eq!(record.effect_type(), "");
        assert_eq!(record.effect_size().to_string(), "");
        assert_eq!(record.species_id(), "9606");
        assert_eq!(record.cell_line(), "n/a");
        assert!(!record.is_canonical());
        assert!(record.background().is_unset());
    }

    #[test]
    fn effect_type_and_size_are_cleared_together() {
        let record = minimal().effect("zscore", "").build().unwrap();
        assert_eq!(record.effect_type(), "");
        assert!(record.effect_size().is_missing());

        let record = minimal().effect("zscore", "   ").build().unwrap();
        assert_eq!(record.effect_type(), "");
        assert!(record.effect_size().is_missing());

        let record = minimal().effect(" ", 1.5).build().unwrap();
        assert_eq!(record.effect_type(), "");
        assert!(record.effect_size().is_missing());

        let record = minimal().effect("zscore", -0.4).build().unwrap();
        assert_eq!(record.effect_type(), "zscore");
        assert_eq!(record.effect_size().to_string(), "-0.4");
    }

    #[test]
    fn each_required_field_is_enforced() {
        let err = InteractionRecord::builder()
            .gene_b("STK33", "NCBIGene:65975")
            .gene_a_perturbation("knockout")
            .gene_b_perturbation("shRNA")
            .assay("PDX")
            .source_id("PMID:1")
            .is_interaction(false)
            .build()
            .unwrap_err();
        assert_matches!(err, SlError::MissingField("gene_a_symbol"));

        let mut builder = minimal();
        builder.is_interaction = None;
        assert_matches!(
            builder.build().unwrap_err(),
            SlError::MissingField("is_interaction")
        );

        let mut builder = minimal();
        builder.assay = None;
        assert_matches!(builder.build().unwrap_err(), SlError::MissingField("assay"));

        assert_matches!(
            minimal().source_id("  ").build().unwrap_err(),
            SlError::MissingField("source_id")
        );
    }

    #[test]
    fn mark_canonical_is_idempotent() {
        let mut record = minimal().build().unwrap();
        record.mark_canonical();
        record.mark_canonical();
        assert!(record.is_canonical());
    }

    #[test]
    fn flat_serialization_order() {
        let record = minimal()
            .effect("stddev", -2.5)
            .cell_line("CAL-51", "CVCL_1110")
            .cancer_type("Breast Carcinoma", "NCIT:C4872")
            .build()
            .unwrap();
        assert_eq!(
            record.tsv_fields(),
            vec![
                "KRAS",
                "NCBIGene:3845",
                "STK33",
                "NCBIGene:65975",
                "activating mutation",
                "shRNA",
                "stddev",
                "-2.5",
                "9606",
                "RNA-interference assay",
                "CAL-51",
                "CVCL_1110",
                "Breast Carcinoma",
                "NCIT:C4872",
                "PMID:19490893",
                "T",
            ]
        );
        assert_eq!(record.tsv_fields().len(), TSV_HEADER.len());
    }

    #[test]
    fn expanded_serialization_interleaves_secondary_ids() {
        let record = minimal().is_interaction(false).build().unwrap();
        let mut ensembl = HashMap::new();
        ensembl.insert("KRAS".to_string(), "ENSG00000133703".to_string());

        let fields = record.tsv_fields_expanded(&ensembl);
        assert_eq!(fields.len(), TSV_HEADER_EXPANDED.len());
        assert_eq!(fields[2], "ENSG00000133703");
        assert_eq!(fields[5], "n/a");
        assert_eq!(fields[17], "F");
        assert_eq!(&fields[18..], ["n/a", "n/a", "n/a"]);
    }
}
