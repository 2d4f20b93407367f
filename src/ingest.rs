//! Study ingestion: turn a study table (or hand-curated entries) into
//! normalized [`InteractionRecord`]s.
//!
//! One configuration-driven [`TableIngestor`] covers every tabular study; a
//! study is described by a [`StudyDefinition`] instead of its own parser.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{BackgroundEntry, Column, GeneSource, ManualEntry, StudyDefinition};
use crate::domain::{BackgroundDependency, EffectSize, N_A};
use crate::error::SlError;
use crate::hgnc::SymbolResolver;
use crate::pair::PairGroups;
use crate::record::InteractionRecord;
use crate::reduce::mark_maximum_entries;

pub const MANUAL_STUDY_ID: &str = "manual";

/// What to do when a gene symbol has no identifier in the authority file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissPolicy {
    /// Abort the study.
    #[default]
    Fail,
    /// Drop the row.
    Skip,
    /// Keep the row with identifier `n/a`.
    Sentinel,
}

/// Decides whether a row is asserted positive or is a negative control.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum InteractionRule {
    #[default]
    AllPositive,
    AllNegative,
    /// Positive when the column holds one of `positive` (case-insensitive).
    Column { column: Column, positive: Vec<String> },
    EffectAtMost { value: f64 },
    EffectAtLeast { value: f64 },
    AbsEffectAtLeast { value: f64 },
}

impl InteractionRule {
    pub fn needs_effect(&self) -> bool {
        matches!(
            self,
            InteractionRule::EffectAtMost { .. }
                | InteractionRule::EffectAtLeast { .. }
                | InteractionRule::AbsEffectAtLeast { .. }
        )
    }

    fn classify(&self, label: Option<&str>, effect: Option<f64>) -> Option<bool> {
        match self {
            InteractionRule::AllPositive => Some(true),
            InteractionRule::AllNegative => Some(false),
            InteractionRule::Column { positive, .. } => {
                let label = label?.trim();
                Some(positive.iter().any(|value| value.eq_ignore_ascii_case(label)))
            }
            InteractionRule::EffectAtMost { value } => effect.map(|effect| effect <= *value),
            InteractionRule::EffectAtLeast { value } => effect.map(|effect| effect >= *value),
            InteractionRule::AbsEffectAtLeast { value } => {
                effect.map(|effect| effect.abs() >= *value)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedGene {
    pub symbol: String,
    pub id: String,
}

/// Resolves a raw symbol to its approved symbol and `NCBIGene:` identifier,
/// applying `policy` when the authority has no identifier for it. `Ok(None)`
/// means the caller should skip the row.
pub fn resolve_gene(
    resolver: &SymbolResolver,
    raw_symbol: &str,
    policy: MissPolicy,
    study: &str,
) -> Result<Option<ResolvedGene>, SlError> {
    let symbol = resolver.resolve_current_symbol(raw_symbol.trim());
    match resolver.ncbigene_curie(symbol) {
        Some(id) => Ok(Some(ResolvedGene {
            symbol: symbol.to_string(),
            id,
        })),
        None => match policy {
            MissPolicy::Fail => Err(SlError::UnresolvedSymbol {
                study: study.to_string(),
                symbol: raw_symbol.to_string(),
            }),
            MissPolicy::Skip => Ok(None),
            MissPolicy::Sentinel => Ok(Some(ResolvedGene {
                symbol: symbol.to_string(),
                id: N_A.to_string(),
            })),
        },
    }
}

fn resolve_background(resolver: &SymbolResolver, entry: &BackgroundEntry) -> BackgroundDependency {
    let mut background = BackgroundDependency {
        status: entry.status.clone(),
        ..BackgroundDependency::default()
    };
    if let Some(gene) = entry.gene.as_deref() {
        let symbol = resolver.resolve_current_symbol(gene.trim());
        background.gene_symbol = symbol.to_string();
        background.gene_id = resolver
            .ncbigene_curie(symbol)
            .unwrap_or_else(|| N_A.to_string());
    }
    background
}

/// Records of one study plus bookkeeping about what was dropped.
#[derive(Debug, Clone, Default)]
pub struct StudyOutcome {
    pub study_id: String,
    pub records: Vec<InteractionRecord>,
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub unresolved: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudyStats {
    pub study_id: String,
    pub records: usize,
    pub positive: usize,
    pub negative: usize,
    pub canonical: usize,
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub unresolved_symbols: Vec<String>,
}

impl StudyOutcome {
    pub fn stats(&self) -> StudyStats {
        let positive = self.records.iter().filter(|r| r.is_interaction()).count();
        StudyStats {
            study_id: self.study_id.clone(),
            records: self.records.len(),
            positive,
            negative: self.records.len() - positive,
            canonical: self.records.iter().filter(|r| r.is_canonical()).count(),
            rows_read: self.rows_read,
            rows_skipped: self.rows_skipped,
            unresolved_symbols: self.unresolved.iter().cloned().collect(),
        }
    }
}

pub trait DatasetIngestor: Send + Sync {
    fn study_id(&self) -> &str;
    fn ingest(&self, resolver: &SymbolResolver) -> Result<StudyOutcome, SlError>;
}

pub struct TableIngestor {
    definition: StudyDefinition,
}

struct ColumnIndex {
    gene_a: Option<usize>,
    gene_b: Option<usize>,
    effect: Option<usize>,
    label: Option<usize>,
}

impl TableIngestor {
    pub fn new(definition: StudyDefinition) -> Self {
        Self { definition }
    }

    pub fn definition(&self) -> &StudyDefinition {
        &self.definition
    }

    fn read_error(&self, message: impl Into<String>) -> SlError {
        SlError::StudyRead {
            study: self.definition.id.clone(),
            message: message.into(),
        }
    }

    fn locate_columns(&self, headers: Option<&csv::StringRecord>) -> Result<ColumnIndex, SlError> {
        let locate = |column: &Column| {
            column
                .locate(headers)
                .ok_or_else(|| self.read_error(format!("column {column} not found")))
        };
        let gene_column = |source: &GeneSource| match source {
            GeneSource::Fixed { .. } => Ok(None),
            GeneSource::Column { column, .. } => locate(column).map(Some),
        };
        let label = match &self.definition.interaction {
            InteractionRule::Column { column, .. } => Some(locate(column)?),
            _ => None,
        };
        Ok(ColumnIndex {
            gene_a: gene_column(&self.definition.gene_a)?,
            gene_b: gene_column(&self.definition.gene_b)?,
            effect: self
                .definition
                .effect
                .as_ref()
                .map(|effect| locate(&effect.column))
                .transpose()?,
            label,
        })
    }

    fn symbols<'r>(
        &self,
        source: &'r GeneSource,
        row: &'r csv::StringRecord,
        idx: Option<usize>,
        line: u64,
    ) -> Result<Vec<&'r str>, SlError> {
        let (raw, separator) = match source {
            GeneSource::Fixed { fixed } => return Ok(vec![fixed.trim()]),
            GeneSource::Column { separator, .. } => {
                let raw = idx.and_then(|idx| row.get(idx)).ok_or_else(|| {
                    self.malformed(line, format!("only {} fields", row.len()))
                })?;
                (raw, separator.as_deref())
            }
        };
        let symbols = match separator {
            Some(separator) => raw.split(separator).map(str::trim).collect(),
            None => vec![raw.trim()],
        };
        Ok(symbols)
    }

    fn malformed(&self, line: u64, message: impl Into<String>) -> SlError {
        SlError::MalformedRow {
            study: self.definition.id.clone(),
            line,
            message: message.into(),
        }
    }

    fn parse_effect(&self, raw: &str, line: u64) -> Result<EffectSize, SlError> {
        let decimal_comma = self
            .definition
            .effect
            .as_ref()
            .map(|effect| effect.decimal_comma)
            .unwrap_or(false);
        let text = raw.trim();
        let normalized = if decimal_comma {
            text.replace(',', ".")
        } else {
            text.to_string()
        };
        if normalized.is_empty() {
            return Ok(EffectSize::Missing);
        }
        // Numbers keep their source text so the table shows `-2.0`, not `-2`.
        match normalized.parse::<f64>() {
            Ok(_) => Ok(EffectSize::Text(normalized)),
            Err(_) if self.definition.interaction.needs_effect() => {
                Err(self.malformed(line, format!("effect size `{text}` is not numeric")))
            }
            Err(_) => Ok(EffectSize::Text(text.to_string())),
        }
    }

    fn canonical_symbol<'s>(&'s self, raw: &'s str) -> &'s str {
        self.definition
            .symbol_overrides
            .get(raw)
            .map(String::as_str)
            .unwrap_or(raw)
    }

    fn is_skipped(&self, symbol: &str) -> bool {
        self.definition.skip_symbols.contains(symbol)
    }
}

impl DatasetIngestor for TableIngestor {
    fn study_id(&self) -> &str {
        &self.definition.id
    }

    fn ingest(&self, resolver: &SymbolResolver) -> Result<StudyOutcome, SlError> {
        let definition = &self.definition;
        if !definition.path.exists() {
            return Err(self.read_error(format!(
                "dataset file {} does not exist",
                definition.path.display()
            )));
        }
        let file = File::open(&definition.path).map_err(|err| self.read_error(err.to_string()))?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(definition.delimiter)
            .has_headers(definition.has_header)
            .flexible(true)
            .from_reader(BufReader::new(file));
        let headers = if definition.has_header {
            Some(
                reader
                    .headers()
                    .map_err(|err| self.read_error(err.to_string()))?
                    .clone(),
            )
        } else {
            None
        };
        let columns = self.locate_columns(headers.as_ref())?;
        let background = definition
            .background
            .as_ref()
            .map(|entry| resolve_background(resolver, entry));

        let mut outcome = StudyOutcome {
            study_id: definition.id.clone(),
            ..StudyOutcome::default()
        };
        let mut records = Vec::new();
        for row in reader.records() {
            let row = row.map_err(|err| self.read_error(err.to_string()))?;
            let line = row.position().map(|pos| pos.line()).unwrap_or_default();
            outcome.rows_read += 1;

            let effect_size = match (&definition.effect, columns.effect) {
                (Some(_), Some(idx)) => {
                    let raw = row
                        .get(idx)
                        .ok_or_else(|| self.malformed(line, "effect column missing"))?;
                    self.parse_effect(raw, line)?
                }
                _ => EffectSize::Missing,
            };
            let label = columns.label.and_then(|idx| row.get(idx));
            let Some(is_interaction) = definition
                .interaction
                .classify(label, effect_size.value())
            else {
                warn!(study = %definition.id, line, "row has no value for the interaction rule, skipping");
                outcome.rows_skipped += 1;
                continue;
            };

            let genes_a = self.symbols(&definition.gene_a, &row, columns.gene_a, line)?;
            let genes_b = self.symbols(&definition.gene_b, &row, columns.gene_b, line)?;
            let mut emitted = false;
            for raw_a in &genes_a {
                for raw_b in &genes_b {
                    let raw_a = self.canonical_symbol(raw_a);
                    let raw_b = self.canonical_symbol(raw_b);
                    if self.is_skipped(raw_a) || self.is_skipped(raw_b) {
                        continue;
                    }
                    let gene_a = resolve_gene(resolver, raw_a, definition.on_missing_gene, &definition.id)?;
                    let gene_b = resolve_gene(resolver, raw_b, definition.on_missing_gene, &definition.id)?;
                    for (raw, gene) in [(raw_a, &gene_a), (raw_b, &gene_b)] {
                        if gene.as_ref().map(|g| g.id == N_A).unwrap_or(true) {
                            outcome.unresolved.insert(raw.to_string());
                        }
                    }
                    let (Some(gene_a), Some(gene_b)) = (gene_a, gene_b) else {
                        debug!(study = %definition.id, line, raw_a, raw_b, "unresolved gene, skipping");
                        continue;
                    };
                    if self.is_skipped(&gene_a.symbol) || self.is_skipped(&gene_b.symbol) {
                        continue;
                    }

                    let mut builder = InteractionRecord::builder()
                        .gene_a(gene_a.symbol, gene_a.id)
                        .gene_b(gene_b.symbol, gene_b.id)
                        .gene_a_perturbation(definition.gene_a_perturbation.clone())
                        .gene_b_perturbation(definition.gene_b_perturbation.clone())
                        .assay(definition.assay.clone())
                        .species_id(definition.species_id.clone())
                        .cell_line(
                            definition.cell_line.clone(),
                            definition.cell_line_identifier.clone(),
                        )
                        .cancer_type(
                            definition.cancer_type.clone(),
                            definition.cancer_type_identifier.clone(),
                        )
                        .source_id(definition.source_id.clone())
                        .is_interaction(is_interaction);
                    if let Some(effect) = &definition.effect {
                        builder = builder.effect(effect.effect_type.clone(), effect_size.clone());
                    }
                    if let Some(background) = &background {
                        builder = builder.background(background.clone());
                    }
                    match builder.build() {
                        Ok(record) => {
                            records.push(record);
                            emitted = true;
                        }
                        Err(SlError::MissingField(field)) => {
                            warn!(study = %definition.id, line, field, "incomplete row, skipping");
                        }
                        Err(err) => return Err(err),
                    }
                }
            }
            if !emitted {
                outcome.rows_skipped += 1;
            }
        }

        outcome.records = if definition.reduce {
            mark_maximum_entries(records.into_iter().collect::<PairGroups>())?
        } else {
            records
        };
        log_stats(&outcome);
        Ok(outcome)
    }
}

fn log_stats(outcome: &StudyOutcome) {
    let stats = outcome.stats();
    info!(
        study = %stats.study_id,
        positive = stats.positive,
        negative = stats.negative,
        canonical = stats.canonical,
        skipped = stats.rows_skipped,
        "study ingested"
    );
    if !stats.unresolved_symbols.is_empty() {
        warn!(
            study = %stats.study_id,
            symbols = %stats.unresolved_symbols.join(","),
            "symbols without identifier"
        );
    }
}

/// Hand-curated entries; every gene must resolve.
pub struct ManualIngestor {
    entries: Vec<ManualEntry>,
}

impl ManualIngestor {
    pub fn new(entries: Vec<ManualEntry>) -> Self {
        Self { entries }
    }
}

impl DatasetIngestor for ManualIngestor {
    fn study_id(&self) -> &str {
        MANUAL_STUDY_ID
    }

    fn ingest(&self, resolver: &SymbolResolver) -> Result<StudyOutcome, SlError> {
        let mut outcome = StudyOutcome {
            study_id: MANUAL_STUDY_ID.to_string(),
            ..StudyOutcome::default()
        };
        for entry in &self.entries {
            outcome.rows_read += 1;
            let resolve = |symbol: &str| {
                resolve_gene(resolver, symbol, MissPolicy::Fail, MANUAL_STUDY_ID)?
                    .ok_or_else(|| SlError::UnresolvedSymbol {
                        study: MANUAL_STUDY_ID.to_string(),
                        symbol: symbol.to_string(),
                    })
            };
            let gene_a = resolve(&entry.gene_a)?;
            let gene_b = resolve(&entry.gene_b)?;

            let mut builder = InteractionRecord::builder()
                .gene_a(gene_a.symbol, gene_a.id)
                .gene_b(gene_b.symbol, gene_b.id)
                .gene_a_perturbation(entry.gene_a_perturbation.clone())
                .gene_b_perturbation(entry.gene_b_perturbation.clone())
                .assay(entry.assay.clone())
                .source_id(entry.source_id.clone())
                .is_interaction(entry.is_interaction);
            match (&entry.effect_type, &entry.effect_size) {
                (Some(effect_type), Some(effect_size)) => {
                    builder = builder.effect(effect_type.clone(), effect_size.clone());
                }
                (None, None) => {}
                _ => warn!(
                    gene_a = %entry.gene_a,
                    gene_b = %entry.gene_b,
                    "manual entry sets only one of effect_type and effect_size, dropping both"
                ),
            }
            if let Some(species_id) = &entry.species_id {
                builder = builder.species_id(species_id.clone());
            }
            if entry.cell_line.is_some() || entry.cell_line_identifier.is_some() {
                builder = builder.cell_line(
                    entry.cell_line.clone().unwrap_or_else(|| N_A.to_string()),
                    entry
                        .cell_line_identifier
                        .clone()
                        .unwrap_or_else(|| N_A.to_string()),
                );
            }
            if entry.cancer_type.is_some() || entry.cancer_type_identifier.is_some() {
                builder = builder.cancer_type(
                    entry.cancer_type.clone().unwrap_or_else(|| N_A.to_string()),
                    entry
                        .cancer_type_identifier
                        .clone()
                        .unwrap_or_else(|| N_A.to_string()),
                );
            }
            if let Some(background) = &entry.background {
                builder = builder.background(resolve_background(resolver, background));
            }
            outcome.records.push(builder.build()?);
        }
        log_stats(&outcome);
        Ok(outcome)
    }
}

/// One ingestor per configured study, followed by the manual entries if any.
pub fn ingestors_for(
    studies: &[StudyDefinition],
    manual: &[ManualEntry],
) -> Vec<Box<dyn DatasetIngestor>> {
    let mut ingestors: Vec<Box<dyn DatasetIngestor>> = studies
        .iter()
        .cloned()
        .map(|definition| Box::new(TableIngestor::new(definition)) as Box<dyn DatasetIngestor>)
        .collect();
    if !manual.is_empty() {
        ingestors.push(Box::new(ManualIngestor::new(manual.to_vec())));
    }
    ingestors
}
