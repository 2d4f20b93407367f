use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{Assay, EffectSize, HUMAN_TAXON, N_A, Perturbation, normalize_source_id};
use crate::error::SlError;
use crate::ingest::{InteractionRule, MissPolicy};

pub const DEFAULT_CONFIG: &str = "slh.json";
pub const DEFAULT_OUTPUT: &str = "SL_data.tsv";

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub hgnc: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub studies: Vec<StudyEntry>,
    #[serde(default)]
    pub manual: Vec<ManualEntry>,
}

/// A table column, by header name or zero-based position.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Column {
    Index(usize),
    Name(String),
}

impl Column {
    pub fn locate(&self, headers: Option<&csv::StringRecord>) -> Option<usize> {
        match (self, headers) {
            (Column::Index(idx), _) => Some(*idx),
            (Column::Name(name), Some(headers)) => {
                headers.iter().position(|header| header.trim() == name)
            }
            (Column::Name(_), None) => None,
        }
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Column::Index(idx) => write!(f, "#{idx}"),
            Column::Name(name) => write!(f, "{name}"),
        }
    }
}

/// Where a study takes a gene symbol from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum GeneSource {
    /// The same gene for every row, e.g. the drug target of a screen.
    Fixed { fixed: String },
    /// A column, optionally holding several symbols separated by `separator`.
    Column {
        column: Column,
        #[serde(default)]
        separator: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BackgroundEntry {
    pub status: String,
    #[serde(default)]
    pub gene: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct StudyEntry {
    pub id: String,
    pub source_id: String,
    pub path: String,
    #[serde(default)]
    pub delimiter: Option<String>,
    #[serde(default)]
    pub has_header: Option<bool>,
    pub gene_a: GeneSource,
    pub gene_b: GeneSource,
    pub gene_a_perturbation: Perturbation,
    pub gene_b_perturbation: Perturbation,
    pub assay: Assay,
    #[serde(default)]
    pub effect_type: Option<String>,
    #[serde(default)]
    pub effect_column: Option<Column>,
    #[serde(default)]
    pub decimal_comma: bool,
    #[serde(default)]
    pub species_id: Option<String>,
    #[serde(default)]
    pub cell_line: Option<String>,
    #[serde(default)]
    pub cell_line_identifier: Option<String>,
    #[serde(default)]
    pub cancer_type: Option<String>,
    #[serde(default)]
    pub cancer_type_identifier: Option<String>,
    #[serde(default)]
    pub background: Option<BackgroundEntry>,
    #[serde(default)]
    pub interaction: Option<InteractionRule>,
    #[serde(default)]
    pub on_missing_gene: Option<MissPolicy>,
    #[serde(default)]
    pub skip_symbols: Vec<String>,
    #[serde(default)]
    pub symbol_overrides: BTreeMap<String, String>,
    #[serde(default)]
    pub reduce: Option<bool>,
}

/// A single hand-curated interaction from a paper that reports only a few.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ManualEntry {
    pub gene_a: String,
    pub gene_b: String,
    pub gene_a_perturbation: Perturbation,
    pub gene_b_perturbation: Perturbation,
    pub assay: Assay,
    pub source_id: String,
    #[serde(default)]
    pub effect_type: Option<String>,
    #[serde(default)]
    pub effect_size: Option<EffectSize>,
    #[serde(default)]
    pub species_id: Option<String>,
    #[serde(default)]
    pub cell_line: Option<String>,
    #[serde(default)]
    pub cell_line_identifier: Option<String>,
    #[serde(default)]
    pub cancer_type: Option<String>,
    #[serde(default)]
    pub cancer_type_identifier: Option<String>,
    #[serde(default)]
    pub background: Option<BackgroundEntry>,
    #[serde(default = "default_true")]
    pub is_interaction: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectColumn {
    pub effect_type: String,
    pub column: Column,
    pub decimal_comma: bool,
}

#[derive(Debug, Clone)]
pub struct StudyDefinition {
    pub id: String,
    pub source_id: String,
    pub path: PathBuf,
    pub delimiter: u8,
    pub has_header: bool,
    pub gene_a: GeneSource,
    pub gene_b: GeneSource,
    pub gene_a_perturbation: Perturbation,
    pub gene_b_perturbation: Perturbation,
    pub assay: Assay,
    pub effect: Option<EffectColumn>,
    pub species_id: String,
    pub cell_line: String,
    pub cell_line_identifier: String,
    pub cancer_type: String,
    pub cancer_type_identifier: String,
    pub background: Option<BackgroundEntry>,
    pub interaction: InteractionRule,
    pub on_missing_gene: MissPolicy,
    pub skip_symbols: BTreeSet<String>,
    pub symbol_overrides: BTreeMap<String, String>,
    pub reduce: bool,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub hgnc: Option<PathBuf>,
    pub output: PathBuf,
    pub studies: Vec<StudyDefinition>,
    pub manual: Vec<ManualEntry>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, SlError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG),
        };

        if path.is_none() && !config_path.exists() {
            return Err(SlError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| SlError::ConfigRead(config_path.clone()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|err| SlError::ConfigParse(err.to_string()))?;

        let base_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self::resolve_config(config, &base_dir)
    }

    /// Validates `config`; relative paths are taken relative to `base_dir`.
    pub fn resolve_config(config: Config, base_dir: &Path) -> Result<ResolvedConfig, SlError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let mut seen = HashSet::new();
        let studies = config
            .studies
            .into_iter()
            .map(|entry| {
                if !seen.insert(entry.id.clone()) {
                    return Err(SlError::InvalidConfig(format!(
                        "duplicate study id {}",
                        entry.id
                    )));
                }
                resolve_study(entry, base_dir)
            })
            .collect::<Result<Vec<_>, SlError>>()?;

        let manual = config
            .manual
            .into_iter()
            .map(resolve_manual)
            .collect::<Result<Vec<_>, SlError>>()?;

        Ok(ResolvedConfig {
            schema_version,
            hgnc: config.hgnc.map(|path| base_dir.join(path)),
            output: base_dir.join(config.output.as_deref().unwrap_or(DEFAULT_OUTPUT)),
            studies,
            manual,
        })
    }
}

fn resolve_study(entry: StudyEntry, base_dir: &Path) -> Result<StudyDefinition, SlError> {
    let id = entry.id.trim().to_string();
    if id.is_empty() {
        return Err(SlError::InvalidConfig("study id must not be empty".to_string()));
    }
    let invalid = |message: &str| SlError::InvalidConfig(format!("study {id}: {message}"));

    if entry.source_id.trim().is_empty() {
        return Err(invalid("source_id must not be empty"));
    }
    let delimiter = match entry.delimiter.as_deref() {
        None => b'\t',
        Some(value) if value.len() == 1 => value.as_bytes()[0],
        Some("\\t") => b'\t',
        Some(_) => return Err(invalid("delimiter must be a single byte")),
    };
    for source in [&entry.gene_a, &entry.gene_b] {
        if let GeneSource::Fixed { fixed } = source {
            if fixed.trim().is_empty() {
                return Err(invalid("fixed gene symbol must not be empty"));
            }
        }
    }

    let effect = match (entry.effect_column, entry.effect_type) {
        (Some(column), Some(effect_type)) => Some(EffectColumn {
            effect_type,
            column,
            decimal_comma: entry.decimal_comma,
        }),
        (Some(_), None) => return Err(invalid("effect_column requires effect_type")),
        (None, _) => None,
    };

    let interaction = entry.interaction.unwrap_or_default();
    if interaction.needs_effect() && effect.is_none() {
        return Err(invalid("effect-based interaction rule requires effect_column"));
    }
    let reduce = entry.reduce.unwrap_or(effect.is_some());
    if reduce && effect.is_none() {
        return Err(invalid("reduce requires effect_column"));
    }

    Ok(StudyDefinition {
        source_id: normalize_source_id(&entry.source_id),
        path: base_dir.join(entry.path),
        delimiter,
        has_header: entry.has_header.unwrap_or(true),
        gene_a: entry.gene_a,
        gene_b: entry.gene_b,
        gene_a_perturbation: entry.gene_a_perturbation,
        gene_b_perturbation: entry.gene_b_perturbation,
        assay: entry.assay,
        effect,
        species_id: entry.species_id.unwrap_or_else(|| HUMAN_TAXON.to_string()),
        cell_line: or_n_a(entry.cell_line),
        cell_line_identifier: or_n_a(entry.cell_line_identifier),
        cancer_type: or_n_a(entry.cancer_type),
        cancer_type_identifier: or_n_a(entry.cancer_type_identifier),
        background: entry.background,
        interaction,
        on_missing_gene: entry.on_missing_gene.unwrap_or_default(),
        skip_symbols: entry.skip_symbols.into_iter().collect(),
        symbol_overrides: entry.symbol_overrides,
        reduce,
        id,
    })
}

fn resolve_manual(mut entry: ManualEntry) -> Result<ManualEntry, SlError> {
    if entry.gene_a.trim().is_empty() || entry.gene_b.trim().is_empty() {
        return Err(SlError::InvalidConfig(format!(
            "manual entry for {} lacks a gene symbol",
            entry.source_id
        )));
    }
    entry.source_id = normalize_source_id(&entry.source_id);
    Ok(entry)
}

fn or_n_a(value: Option<String>) -> String {
    value.unwrap_or_else(|| N_A.to_string())
}

fn default_true() -> bool {
    true
}
