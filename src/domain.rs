use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Sentinel for unknown or unresolved values.
pub const N_A: &str = "n/a";

/// NCBI taxonomy id for human, the default species.
pub const HUMAN_TAXON: &str = "9606";

/// Stored in place of a current symbol when an alias is claimed by several genes.
pub const MULTIPLE: &str = "MULTIPLE";

pub const NCBIGENE_PREFIX: &str = "NCBIGene:";

static PUBMED_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i:pmid:?\s*)?(\d+)$").expect("valid PMID pattern"));

pub fn ncbigene_curie(identifier: &str) -> String {
    format!("{NCBIGENE_PREFIX}{identifier}")
}

/// Bare PubMed ids and `pmid:` variants become `PMID:<n>`; anything else is kept verbatim.
pub fn normalize_source_id(value: &str) -> String {
    let trimmed = value.trim();
    match PUBMED_ID.captures(trimmed) {
        Some(caps) => format!("PMID:{}", &caps[1]),
        None => trimmed.to_string(),
    }
}

macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($variant:ident => $label:literal $(| $alias:literal)*),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            Other(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $label,)+
                    $name::Other(value) => value.as_str(),
                }
            }

            pub fn is_other(&self) -> bool {
                matches!(self, $name::Other(_))
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                let trimmed = value.trim();
                let key = trimmed.to_ascii_lowercase();
                $(
                    if key == $label.to_ascii_lowercase() $(|| key == $alias)* {
                        return $name::$variant;
                    }
                )+
                $name::Other(trimmed.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                $name::from(value.as_str())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

vocabulary! {
    /// How a gene was manipulated in the experiment.
    Perturbation {
        Knockout => "knockout" | "ko",
        SiRna => "siRNA" | "si_rna",
        ShRna => "shRNA" | "sh_rna",
        SgRna => "sgRNA" | "sg_rna",
        CrisprCas9 => "CRISPR CAS9" | "crispr" | "crispr-cas9",
        Pharmaceutical => "pharmaceutical" | "drug" | "inhibitor",
        ActivatingMutation => "activating mutation" | "activating_mutation" | "oncogenic_mutation",
        LofMutation => "lof_mutation" | "lof mutation" | "loss of function mutation",
        Overexpression => "overexpression" | "increased.expression",
        Agonist => "agonist",
        AntisenseOligonucleotide => "antisense oligonucleotide",
        Degradation => "degradation",
        InhibitoryAntibody => "inhibitory antibody",
        NaturalTsg => "natural (is a TSG)",
        PromoterHypermethylation => "promoter hypermethylation",
        CohortStudy => "cohort study",
    }
}

vocabulary! {
    /// Experimental assay used to establish the interaction.
    Assay {
        RnaInterference => "RNA-interference assay" | "rnai" | "rna interference",
        CrisprCas9Interference => "CRISPR-Cas9 Interference assay",
        GrowthInhibition => "growth inhibition assay" | "growth.inhibition.assay",
        CellViability => "cell viability assay",
        Apoptosis => "apoptosis assay",
        Cytotoxicity => "cytotoxicity assay",
        CisplatinToxicity => "cisplatin toxicity assay",
        CompetitiveHybridization => "competitive hybridization",
        MulticolorCompetition => "multicolor competition assay",
        DifferentialViability => "differential viability assay",
        PharmaceuticalInhibition => "pharmaceutical inhibition assay",
        ShRnaDepletion => "shRNA depletion assay",
        SgRnaDepletion => "sgRNA depletion assay",
        PatientDerivedXenograft => "PDX" | "patient derived xenograft",
        TransgenicMouseModel => "transgenic mouse model",
    }
}

/// Measured statistic of one observation. `Missing` renders as the empty string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum EffectSize {
    #[default]
    Missing,
    Numeric(f64),
    Text(String),
}

impl EffectSize {
    /// Absolute value used to rank observations of one pair. Text that parses as a
    /// finite number is accepted; everything else yields `None`.
    pub fn magnitude(&self) -> Option<f64> {
        self.value().map(f64::abs)
    }

    /// Signed finite value, with the same coercion as [`EffectSize::magnitude`].
    pub fn value(&self) -> Option<f64> {
        let value = match self {
            EffectSize::Missing => return None,
            EffectSize::Numeric(value) => *value,
            EffectSize::Text(text) => text.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }

    /// True for `Missing` and for blank text.
    pub fn is_missing(&self) -> bool {
        match self {
            EffectSize::Missing => true,
            EffectSize::Numeric(_) => false,
            EffectSize::Text(text) => text.trim().is_empty(),
        }
    }
}

impl From<f64> for EffectSize {
    fn from(value: f64) -> Self {
        EffectSize::Numeric(value)
    }
}

impl From<&str> for EffectSize {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            EffectSize::Missing
        } else {
            EffectSize::Text(value.to_string())
        }
    }
}

impl From<String> for EffectSize {
    fn from(value: String) -> Self {
        EffectSize::from(value.as_str())
    }
}

impl fmt::Display for EffectSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectSize::Missing => Ok(()),
            EffectSize::Numeric(value) => write!(f, "{value}"),
            EffectSize::Text(text) => f.write_str(text),
        }
    }
}

/// A third gene whose state the interaction depends on (e.g. KEAP1 wildtype).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundDependency {
    pub status: String,
    pub gene_symbol: String,
    pub gene_id: String,
}

impl Default for BackgroundDependency {
    fn default() -> Self {
        Self {
            status: N_A.to_string(),
            gene_symbol: N_A.to_string(),
            gene_id: N_A.to_string(),
        }
    }
}

impl BackgroundDependency {
    pub fn is_unset(&self) -> bool {
        self.status == N_A && self.gene_symbol == N_A
    }
}
