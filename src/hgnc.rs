//! HGNC-backed gene symbol resolution.
//!
//! The authority table is the tab-separated HGNC complete set: one row per
//! approved symbol with its NCBI Gene id, Ensembl gene id and pipe-delimited
//! lists of previous and alias symbols.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::debug;

use crate::domain::{MULTIPLE, ncbigene_curie};
use crate::error::SlError;

const SYMBOL: &str = "symbol";
const ENTREZ_ID: &str = "entrez_id";
const ENSEMBL_GENE_ID: &str = "ensembl_gene_id";
const PREV_SYMBOL: &str = "prev_symbol";
const ALIAS_SYMBOL: &str = "alias_symbol";

/// Target of a historical or alias symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynonymTarget {
    Current(String),
    /// More than one approved symbol claims the alias.
    Multiple,
}

impl SynonymTarget {
    pub fn as_str(&self) -> &str {
        match self {
            SynonymTarget::Current(symbol) => symbol,
            SynonymTarget::Multiple => MULTIPLE,
        }
    }
}

impl fmt::Display for SynonymTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq<&str> for SynonymTarget {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// Read-only symbol lookup tables, built once per ingestion run and shared by
/// every ingestor.
#[derive(Debug, Clone, Default)]
pub struct SymbolResolver {
    symbol_to_identifier: HashMap<String, String>,
    symbol_to_ensembl: HashMap<String, String>,
    synonym_to_symbol: HashMap<String, SynonymTarget>,
}

struct Columns {
    symbol: usize,
    entrez_id: usize,
    ensembl_gene_id: usize,
    prev_symbol: usize,
    alias_symbol: usize,
}

impl Columns {
    fn locate(headers: &csv::StringRecord, path: &Path) -> Result<Self, SlError> {
        let find = |name: &str| headers.iter().position(|header| header.trim() == name);
        let wanted = [SYMBOL, ENTREZ_ID, ENSEMBL_GENE_ID, PREV_SYMBOL, ALIAS_SYMBOL];
        let missing = wanted
            .into_iter()
            .filter(|name| find(name).is_none())
            .collect::<Vec<&str>>();
        if !missing.is_empty() {
            return Err(SlError::AuthorityColumns {
                path: path.to_path_buf(),
                missing: missing.join(", "),
            });
        }
        let index = |name: &str| find(name).unwrap_or_default();
        Ok(Self {
            symbol: index(SYMBOL),
            entrez_id: index(ENTREZ_ID),
            ensembl_gene_id: index(ENSEMBL_GENE_ID),
            prev_symbol: index(PREV_SYMBOL),
            alias_symbol: index(ALIAS_SYMBOL),
        })
    }
}

impl SymbolResolver {
    /// Loads the authority file at `path`; `.gz` files are decompressed on the fly.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SlError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SlError::AuthorityMissing(path.to_path_buf()));
        }
        let file = File::open(path).map_err(|err| SlError::AuthorityRead {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        let gzipped = path.extension().map(|ext| ext == "gz").unwrap_or(false);
        if gzipped {
            Self::from_reader(GzDecoder::new(BufReader::new(file)), path)
        } else {
            Self::from_reader(BufReader::new(file), path)
        }
    }

    /// Builds the tables from tab-separated content. `origin` is only used in errors.
    pub fn from_reader<R: Read>(reader: R, origin: &Path) -> Result<Self, SlError> {
        let read_error = |err: csv::Error| SlError::AuthorityRead {
            path: origin.to_path_buf(),
            message: err.to_string(),
        };
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .quoting(false)
            .flexible(true)
            .from_reader(reader);
        let headers = csv_reader.headers().map_err(read_error)?.clone();
        let columns = Columns::locate(&headers, origin)?;

        let mut resolver = Self::default();
        for row in csv_reader.records() {
            let row = row.map_err(read_error)?;
            let field = |idx: usize| row.get(idx).map(unquote).unwrap_or_default();
            let symbol = field(columns.symbol);
            if symbol.is_empty() {
                continue;
            }
            let previous = field(columns.prev_symbol);
            let aliases = field(columns.alias_symbol);
            for synonym in split_symbols(&previous).chain(split_symbols(&aliases)) {
                resolver.add_synonym(synonym, &symbol);
            }
            let entrez_id = field(columns.entrez_id);
            if !entrez_id.is_empty() {
                resolver
                    .symbol_to_identifier
                    .insert(symbol.clone(), entrez_id);
            }
            let ensembl_id = field(columns.ensembl_gene_id);
            if !ensembl_id.is_empty() {
                resolver.symbol_to_ensembl.insert(symbol, ensembl_id);
            }
        }

        debug!(
            symbols = resolver.symbol_to_identifier.len(),
            synonyms = resolver.synonym_to_symbol.len(),
            "loaded gene symbol authority"
        );
        Ok(resolver)
    }

    fn add_synonym(&mut self, synonym: &str, symbol: &str) {
        match self.synonym_to_symbol.entry(synonym.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(SynonymTarget::Current(symbol.to_string()));
            }
            Entry::Occupied(mut slot) => {
                if slot.get().as_str() != symbol {
                    slot.insert(SynonymTarget::Multiple);
                }
            }
        }
    }

    /// Maps a historical or alias symbol to its approved symbol. Symbols that are
    /// unknown or ambiguous are returned unchanged.
    pub fn resolve_current_symbol<'a>(&'a self, raw_symbol: &'a str) -> &'a str {
        match self.synonym_to_symbol.get(raw_symbol) {
            Some(SynonymTarget::Current(symbol)) => symbol,
            _ => raw_symbol,
        }
    }

    /// NCBI Gene id of an approved symbol.
    pub fn get_identifier(&self, symbol: &str) -> Option<&str> {
        self.symbol_to_identifier.get(symbol).map(String::as_str)
    }

    pub fn get_ensembl_id(&self, symbol: &str) -> Option<&str> {
        self.symbol_to_ensembl.get(symbol).map(String::as_str)
    }

    /// `NCBIGene:<id>` for an approved symbol.
    pub fn ncbigene_curie(&self, symbol: &str) -> Option<String> {
        self.get_identifier(symbol).map(ncbigene_curie)
    }

    pub fn synonym(&self, alias: &str) -> Option<&SynonymTarget> {
        self.synonym_to_symbol.get(alias)
    }

    pub fn symbol_to_identifier(&self) -> &HashMap<String, String> {
        &self.symbol_to_identifier
    }

    pub fn symbol_to_ensembl(&self) -> &HashMap<String, String> {
        &self.symbol_to_ensembl
    }

    pub fn synonym_to_symbol(&self) -> &HashMap<String, SynonymTarget> {
        &self.synonym_to_symbol
    }

    pub fn len(&self) -> usize {
        self.symbol_to_identifier.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbol_to_identifier.is_empty()
    }
}

fn unquote(value: &str) -> String {
    value.replace('"', "").trim().to_string()
}

fn split_symbols(list: &str) -> impl Iterator<Item = &str> {
    list.split('|')
        .map(str::trim)
        .filter(|symbol| !symbol.is_empty())
}
