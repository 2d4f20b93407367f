//! Interaction-network overview of a harmonized dataset.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Serialize;

use crate::error::SlError;
use crate::record::InteractionRecord;

pub const DEFAULT_HUB_DEGREE: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hub {
    pub gene: String,
    pub degree: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkSummary {
    pub total_genes: usize,
    pub positive_genes: usize,
    pub positive_interactions: usize,
    /// Degree -> number of genes with that many distinct positive partners.
    pub degree_distribution: BTreeMap<usize, usize>,
    /// Genes whose degree exceeds the threshold, highest degree first.
    pub hubs: Vec<Hub>,
    pub hub_degree: usize,
}

#[derive(Debug, Default)]
struct NetworkBuilder {
    genes: BTreeSet<String>,
    positive_genes: BTreeSet<String>,
    partners: HashMap<String, BTreeSet<String>>,
    positive_interactions: usize,
}

impl NetworkBuilder {
    fn add(&mut self, gene_a: &str, gene_b: &str, positive: bool) {
        self.genes.insert(gene_a.to_string());
        self.genes.insert(gene_b.to_string());
        if !positive {
            return;
        }
        self.positive_interactions += 1;
        self.positive_genes.insert(gene_a.to_string());
        self.positive_genes.insert(gene_b.to_string());
        self.partners
            .entry(gene_a.to_string())
            .or_default()
            .insert(gene_b.to_string());
        self.partners
            .entry(gene_b.to_string())
            .or_default()
            .insert(gene_a.to_string());
    }

    fn finish(self, hub_degree: usize) -> NetworkSummary {
        let mut degree_distribution = BTreeMap::new();
        let mut hubs = Vec::new();
        for (gene, partners) in self.partners {
            let degree = partners.len();
            *degree_distribution.entry(degree).or_insert(0) += 1;
            if degree > hub_degree {
                hubs.push(Hub { gene, degree });
            }
        }
        hubs.sort_by(|a, b| b.degree.cmp(&a.degree).then_with(|| a.gene.cmp(&b.gene)));
        NetworkSummary {
            total_genes: self.genes.len(),
            positive_genes: self.positive_genes.len(),
            positive_interactions: self.positive_interactions,
            degree_distribution,
            hubs,
            hub_degree,
        }
    }
}

impl NetworkSummary {
    pub fn from_records(records: &[InteractionRecord], hub_degree: usize) -> Self {
        let mut builder = NetworkBuilder::default();
        for record in records {
            builder.add(
                record.gene_a_symbol(),
                record.gene_b_symbol(),
                record.is_interaction(),
            );
        }
        builder.finish(hub_degree)
    }

    /// Reads a written table; basic and expanded layouts both qualify since
    /// only the `geneA`, `geneB` and `SL` columns are consulted.
    pub fn from_tsv(path: &Path, hub_degree: usize) -> Result<Self, SlError> {
        let file = File::open(path).map_err(|err| {
            SlError::Filesystem(format!("failed to open {}: {err}", path.display()))
        })?;
        Self::from_reader(BufReader::new(file), hub_degree)
    }

    pub fn from_reader<R: Read>(reader: R, hub_degree: usize) -> Result<Self, SlError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .quoting(false)
            .flexible(true)
            .from_reader(reader);
        let headers = reader
            .headers()
            .map_err(|err| SlError::Filesystem(err.to_string()))?
            .clone();
        let find = |name: &str| {
            headers
                .iter()
                .position(|header| header == name)
                .ok_or_else(|| SlError::Filesystem(format!("table lacks column {name}")))
        };
        let (gene_a, gene_b, flag) = (find("geneA")?, find("geneB")?, find("SL")?);

        let mut builder = NetworkBuilder::default();
        for row in reader.records() {
            let row = row.map_err(|err| SlError::Filesystem(err.to_string()))?;
            let (Some(a), Some(b)) = (row.get(gene_a), row.get(gene_b)) else {
                continue;
            };
            builder.add(a, b, row.get(flag) == Some("T"));
        }
        Ok(builder.finish(hub_degree))
    }
}
