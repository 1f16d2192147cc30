use std::fs;
use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use tracing::{info, warn};

use crate::corpus::{BASELINE_FILE, DIFFERENTIAL_FILE};
use crate::error::Result;
use crate::record::{ExperimentCategory, ExperimentRecord};

/// One way of obtaining the experiment list for a category. Strategies never
/// fail loudly: anything that goes wrong is reported as an empty list.
pub trait SnapshotStrategy {
    fn name(&self) -> &str;
    fn fetch(&self, category: ExperimentCategory) -> Vec<ExperimentRecord>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub category: ExperimentCategory,
    pub source: String,
    pub records: Vec<ExperimentRecord>,
}

/// Tries `strategies` in order and keeps the first non-empty result.
pub fn best_snapshot(
    strategies: &[&dyn SnapshotStrategy],
    category: ExperimentCategory,
) -> Option<Snapshot> {
    for strategy in strategies {
        let records = strategy.fetch(category);
        if records.is_empty() {
            warn!(strategy = strategy.name(), %category, "snapshot strategy returned nothing");
            continue;
        }
        info!(
            strategy = strategy.name(),
            %category,
            records = records.len(),
            "snapshot obtained"
        );
        return Some(Snapshot {
            category,
            source: strategy.name().to_string(),
            records,
        });
    }
    None
}

pub fn snapshot_path(dir: &Path, category: ExperimentCategory) -> PathBuf {
    match category {
        ExperimentCategory::Baseline => dir.join(BASELINE_FILE),
        ExperimentCategory::Differential => dir.join(DIFFERENTIAL_FILE),
    }
}

/// Writes `snapshot` to `path` as the CSV file the corpus loader reads back.
pub fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut writer = WriterBuilder::new().from_path(path)?;
    writer.write_record([
        "accession",
        "type",
        "species",
        "description",
        "last_update",
        "factors",
    ])?;
    for record in &snapshot.records {
        writer.write_record([
            record.accession.as_str(),
            record.category.as_str(),
            record.species.as_str(),
            record.description.as_str(),
            record.last_update.as_str(),
            record.factors.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Hand-maintained list of well-known experiments, the last resort when no
/// remote listing is reachable.
#[derive(Debug, Default, Clone, Copy)]
pub struct CuratedSnapshot;

impl SnapshotStrategy for CuratedSnapshot {
    fn name(&self) -> &str {
        "curated"
    }

    fn fetch(&self, category: ExperimentCategory) -> Vec<ExperimentRecord> {
        let rows: &[(&str, &str, &str, &str)] = match category {
            ExperimentCategory::Baseline => &[
                (
                    "E-MTAB-513",
                    "Homo sapiens",
                    "RNA-seq of human tissues from Illumina Body Map",
                    "organism part",
                ),
                (
                    "E-MTAB-5214",
                    "Mus musculus",
                    "RNA-seq of mouse tissues",
                    "organism part",
                ),
                (
                    "E-MTAB-3358",
                    "Arabidopsis thaliana",
                    "RNA-seq of Arabidopsis thaliana tissues and developmental stages",
                    "developmental stage, organism part",
                ),
            ],
            ExperimentCategory::Differential => &[
                (
                    "E-GEOD-21860",
                    "Homo sapiens",
                    "Transcription profiling of human colorectal cancer",
                    "disease",
                ),
                (
                    "E-MTAB-1733",
                    "Mus musculus",
                    "RNA-seq of mouse liver after drug treatment",
                    "compound",
                ),
            ],
        };
        rows.iter()
            .map(|(accession, species, description, factors)| {
                ExperimentRecord::new(*accession, category, *species, *description, *factors)
            })
            .collect()
    }
}

/// Accessions worth suggesting when a search comes back empty.
pub fn popular_accessions(category: ExperimentCategory) -> &'static [&'static str] {
    match category {
        ExperimentCategory::Baseline => &["E-MTAB-513", "E-MTAB-5214", "E-MTAB-3358"],
        ExperimentCategory::Differential => &["E-GEOD-21860", "E-MTAB-1733"],
    }
}
