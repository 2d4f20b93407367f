use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SlError {
    #[error("missing config file slh.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("authority file not found: {0}")]
    #[diagnostic(help("run `slh fetch-hgnc` or point `hgnc` at a local hgnc_complete_set.txt"))]
    AuthorityMissing(PathBuf),

    #[error("failed to read authority file {path}: {message}")]
    AuthorityRead { path: PathBuf, message: String },

    #[error("authority file {path} lacks required columns: {missing}")]
    AuthorityColumns { path: PathBuf, missing: String },

    #[error("interaction record is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("effect size `{value}` for pair ({gene_a}, {gene_b}) is not numeric")]
    #[diagnostic(help("the study parser must convert effect sizes to numbers before reduction"))]
    NonNumericEffect {
        gene_a: String,
        gene_b: String,
        value: String,
    },

    #[error("study {study}: could not resolve gene symbol {symbol}")]
    UnresolvedSymbol { study: String, symbol: String },

    #[error("study {study}: {message}")]
    StudyRead { study: String, message: String },

    #[error("study {study}, line {line}: {message}")]
    MalformedRow {
        study: String,
        line: u64,
        message: String,
    },

    #[error("HGNC request failed: {0}")]
    HgncHttp(String),

    #[error("HGNC returned status {status}: {message}")]
    HgncStatus { status: u16, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl SlError {
    /// True for the errors raised while loading configuration or the authority file.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SlError::MissingConfig
                | SlError::ConfigRead(_)
                | SlError::ConfigParse(_)
                | SlError::InvalidConfig(_)
                | SlError::AuthorityMissing(_)
                | SlError::AuthorityRead { .. }
                | SlError::AuthorityColumns { .. }
        )
    }

    /// Process exit status: 2 configuration, 3 network, 4 data defect, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        match self {
            error if error.is_configuration() => 2,
            SlError::HgncHttp(_) | SlError::HgncStatus { .. } => 3,
            SlError::MissingField(_)
            | SlError::NonNumericEffect { .. }
            | SlError::UnresolvedSymbol { .. }
            | SlError::StudyRead { .. }
            | SlError::MalformedRow { .. } => 4,
            _ => 1,
        }
    }
}
