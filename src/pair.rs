use std::collections::HashMap;
use std::fmt;

use crate::record::InteractionRecord;

/// Ordered `(gene A, gene B)` grouping key. `(A, B)` and `(B, A)` are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    gene_a: String,
    gene_b: String,
}

impl PairKey {
    pub fn new(gene_a: impl Into<String>, gene_b: impl Into<String>) -> Self {
        Self {
            gene_a: gene_a.into(),
            gene_b: gene_b.into(),
        }
    }

    pub fn of(record: &InteractionRecord) -> Self {
        Self::new(record.gene_a_symbol(), record.gene_b_symbol())
    }

    pub fn gene_a(&self) -> &str {
        &self.gene_a
    }

    pub fn gene_b(&self) -> &str {
        &self.gene_b
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.gene_a, self.gene_b)
    }
}

/// Records grouped by [`PairKey`]. Groups iterate in first-insertion order and
/// records within a group keep their insertion order.
#[derive(Debug, Clone, Default)]
pub struct PairGroups {
    groups: Vec<(PairKey, Vec<InteractionRecord>)>,
    index: HashMap<PairKey, usize>,
}

impl PairGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record under the key formed by its own gene symbols.
    pub fn push(&mut self, record: InteractionRecord) {
        let key = PairKey::of(&record);
        self.insert(key, record);
    }

    pub fn insert(&mut self, key: PairKey, record: InteractionRecord) {
        match self.index.get(&key) {
            Some(&idx) => self.groups[idx].1.push(record),
            None => {
                self.index.insert(key.clone(), self.groups.len());
                self.groups.push((key, vec![record]));
            }
        }
    }

    pub fn get(&self, key: &PairKey) -> Option<&[InteractionRecord]> {
        self.index
            .get(key)
            .map(|&idx| self.groups[idx].1.as_slice())
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn record_count(&self) -> usize {
        self.groups.iter().map(|(_, records)| records.len()).sum()
    }

    pub fn keys(&self) -> impl Iterator<Item = &PairKey> {
        self.groups.iter().map(|(key, _)| key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PairKey, &[InteractionRecord])> {
        self.groups
            .iter()
            .map(|(key, records)| (key, records.as_slice()))
    }
}

impl IntoIterator for PairGroups {
    type Item = (PairKey, Vec<InteractionRecord>);
    type IntoIter = std::vec::IntoIter<(PairKey, Vec<InteractionRecord>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}

impl FromIterator<InteractionRecord> for PairGroups {
    fn from_iter<I: IntoIterator<Item = InteractionRecord>>(iter: I) -> Self {
        let mut groups = Self::new();
        for record in iter {
            groups.push(record);
        }
        groups
    }
}
