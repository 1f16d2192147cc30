use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AtlasError;
use crate::text::{is_null_marker, normalize_factors};

/// Kind of Expression Atlas experiment. Baseline experiments describe
/// expression under normal conditions, differential ones compare conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentCategory {
    Baseline,
    Differential,
}

impl ExperimentCategory {
    pub const ALL: [ExperimentCategory; 2] =
        [ExperimentCategory::Baseline, ExperimentCategory::Differential];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentCategory::Baseline => "baseline",
            ExperimentCategory::Differential => "differential",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "baseline" => Some(ExperimentCategory::Baseline),
            "differential" => Some(ExperimentCategory::Differential),
            _ => None,
        }
    }
}

impl fmt::Display for ExperimentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExperimentCategory {
    type Err = AtlasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| AtlasError::UnknownCategory(s.to_string()))
    }
}

/// One experiment row of the corpus. Records are never mutated after load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub accession: String,
    pub category: ExperimentCategory,
    pub species: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub factors: String,
    /// Last-update date as the listing reported it; empty when unknown.
    #[serde(default)]
    pub last_update: String,
}

impl ExperimentRecord {
    pub fn new(
        accession: impl Into<String>,
        category: ExperimentCategory,
        species: impl Into<String>,
        description: impl Into<String>,
        factors: impl Into<String>,
    ) -> Self {
        Self {
            accession: accession.into(),
            category,
            species: species.into(),
            description: description.into(),
            factors: factors.into(),
            last_update: String::new(),
        }
    }

    pub fn with_last_update(mut self, last_update: impl Into<String>) -> Self {
        self.last_update = last_update.into();
        self
    }

    /// Text fed to the embedding backends: species, description, category and
    /// the factors with commas turned into spaces. Empty fields and `nan`
    /// placeholders are skipped.
    pub fn searchable_text(&self) -> String {
        let factors = normalize_factors(&self.factors);
        [
            self.species.as_str(),
            self.description.as_str(),
            self.category.as_str(),
            factors.as_str(),
        ]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty() && !is_null_marker(part))
        .collect::<Vec<_>>()
        .join(" ")
    }

    pub fn matches_species(&self, filter: &str) -> bool {
        self.species
            .to_lowercase()
            .contains(&filter.to_lowercase())
    }
}
