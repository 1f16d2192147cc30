use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, info};

use crate::error::Result;
use crate::record::{ExperimentCategory, ExperimentRecord};
use crate::text::is_null_marker;

pub const BASELINE_FILE: &str = "baseline_experiments.csv";
pub const DIFFERENTIAL_FILE: &str = "differential_experiments.csv";

/// A tabular metadata file whose rows all belong to one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusSource {
    pub path: PathBuf,
    pub category: ExperimentCategory,
}

impl CorpusSource {
    pub fn new(path: impl Into<PathBuf>, category: ExperimentCategory) -> Self {
        Self {
            path: path.into(),
            category,
        }
    }

    /// Baseline snapshot first, then differential, as laid out by `refresh`.
    pub fn standard(dir: &Path) -> Vec<CorpusSource> {
        vec![
            CorpusSource::new(dir.join(BASELINE_FILE), ExperimentCategory::Baseline),
            CorpusSource::new(dir.join(DIFFERENTIAL_FILE), ExperimentCategory::Differential),
        ]
    }
}

/// Ordered experiment records. Position `i` is the join key into the
/// embedding matrix, so the order is never changed after load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    records: Vec<ExperimentRecord>,
}

impl Corpus {
    pub fn new(records: Vec<ExperimentRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ExperimentRecord> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[ExperimentRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExperimentRecord> {
        self.records.iter()
    }

    /// First record carrying `accession` (case-insensitive).
    pub fn find(&self, accession: &str) -> Option<&ExperimentRecord> {
        self.records
            .iter()
            .find(|record| record.accession.eq_ignore_ascii_case(accession))
    }

    pub fn searchable_texts(&self) -> Vec<String> {
        self.records.iter().map(|r| r.searchable_text()).collect()
    }
}

pub fn load(sources: &[CorpusSource]) -> Result<Corpus> {
    let mut records = Vec::new();
    for source in sources {
        let file = match File::open(&source.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %source.path.display(), "corpus source missing, skipping");
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        let before = records.len();
        read_records(file, source.category, &mut records)?;
        info!(
            path = %source.path.display(),
            category = %source.category,
            rows = records.len() - before,
            "loaded corpus source"
        );
    }
    Ok(Corpus::new(records))
}

fn read_records<R: Read>(
    reader: R,
    category: ExperimentCategory,
    out: &mut Vec<ExperimentRecord>,
) -> Result<()> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);
    let headers = reader.headers()?.clone();
    let columns = Columns::locate(&headers);
    let mut skipped = 0usize;
    for row in reader.records() {
        let row = match row {
            Ok(row) => row,
            Err(_) => {
                skipped += 1;
                continue;
            }
        };
        match columns.record(&row, category) {
            Some(record) => out.push(record),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!(skipped, "dropped rows without accession or species");
    }
    Ok(())
}

struct Columns {
    accession: Option<usize>,
    species: Option<usize>,
    description: Option<usize>,
    factors: Option<usize>,
    last_update: Option<usize>,
}

impl Columns {
    fn locate(headers: &StringRecord) -> Self {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        Self {
            accession: find("accession"),
            species: find("species"),
            description: find("description"),
            factors: find("factors"),
            last_update: find("last_update"),
        }
    }

    fn record(&self, row: &StringRecord, category: ExperimentCategory) -> Option<ExperimentRecord> {
        let accession = required(row, self.accession)?;
        let species = required(row, self.species)?;
        Some(ExperimentRecord {
            accession,
            category,
            species,
            description: optional(row, self.description),
            factors: optional(row, self.factors),
            last_update: optional(row, self.last_update),
        })
    }
}

fn required(row: &StringRecord, column: Option<usize>) -> Option<String> {
    let value = row.get(column?)?.trim();
    if value.is_empty() || is_null_marker(value) {
        return None;
    }
    Some(value.to_string())
}

fn optional(row: &StringRecord, column: Option<usize>) -> String {
    column
        .and_then(|idx| row.get(idx))
        .map(|value| value.trim())
        .filter(|value| !is_null_marker(value))
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(path: &Path, body: &str) {
        fs::write(path, body).unwrap();
    }

    #[test]
    fn load_preserves_source_and_row_order() {
        let dir = tempdir().unwrap();
        write(
            &dir.path().join(BASELINE_FILE),
            "accession,type,species,description,last_update,factors\n\
             E-MTAB-513,baseline,Homo sapiens,Body map,2024,organism part\n\
             E-MTAB-5214,baseline,Mus musculus,Mouse tissues,2024,organism part\n",
        );
        write(
            &dir.path().join(DIFFERENTIAL_FILE),
            "accession,type,species,description,last_update,factors\n\
             E-GEOD-21860,differential,Homo sapiens,Colorectal cancer,2024,disease\n",
        );
        let corpus = load(&CorpusSource::standard(dir.path())).unwrap();
        let accessions: Vec<_> = corpus.iter().map(|r| r.accession.as_str()).collect();
        assert_eq!(accessions, vec!["E-MTAB-513", "E-MTAB-5214", "E-GEOD-21860"]);
        assert_eq!(corpus.get(0).unwrap().last_update, "2024");
        assert_eq!(
            corpus.get(2).unwrap().category,
            ExperimentCategory::Differential
        );
    }

    #[test]
    fn missing_sources_contribute_nothing() {
        let dir = tempdir().unwrap();
        let corpus = load(&CorpusSource::standard(dir.path())).unwrap();
        assert!(corpus.is_empty());
    }

    #[test]
    fn rows_without_required_fields_are_dropped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        write(
            &path,
            "accession,species,description,factors\n\
             ,Homo sapiens,no accession,\n\
             E-MTAB-1,,no species,\n\
             E-MTAB-2,nan,nan species,\n\
             E-MTAB-3,Danio rerio,nan,\n",
        );
        let corpus = load(&[CorpusSource::new(&path, ExperimentCategory::Baseline)]).unwrap();
        assert_eq!(corpus.len(), 1);
        let record = corpus.get(0).unwrap();
        assert_eq!(record.accession, "E-MTAB-3");
        assert_eq!(record.description, "");
        assert_eq!(record.factors, "");
        assert_eq!(record.last_update, "");
    }

    #[test]
    fn duplicate_accessions_are_kept_positionally() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dups.csv");
        write(
            &path,
            "accession,species\nE-MTAB-9,Homo sapiens\nE-MTAB-9,Homo sapiens\n",
        );
        let corpus = load(&[CorpusSource::new(&path, ExperimentCategory::Baseline)]).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.find("e-mtab-9").unwrap().accession, "E-MTAB-9");
    }

    #[test]
    fn quoted_factor_lists_survive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("quoted.csv");
        write(
            &path,
            "accession,species,description,factors\n\
             E-MTAB-3358,Arabidopsis thaliana,\"Tissues, stages\",\"developmental stage, organism part\"\n",
        );
        let corpus = load(&[CorpusSource::new(&path, ExperimentCategory::Baseline)]).unwrap();
        assert_eq!(
            corpus.get(0).unwrap().factors,
            "developmental stage, organism part"
        );
    }
}
