mod artifact;
mod corpus;
mod error;
mod record;
mod snapshot;
mod text;
mod tfidf;

pub use artifact::{ArtifactCatalog, ArtifactKind, FileItem};
pub use corpus::{load, Corpus, CorpusSource, BASELINE_FILE, DIFFERENTIAL_FILE};
pub use error::{AtlasError, Result};
pub use record::{ExperimentCategory, ExperimentRecord};
pub use snapshot::{
    best_snapshot, popular_accessions, snapshot_path, write_snapshot, CuratedSnapshot, Snapshot,
    SnapshotStrategy,
};
pub use text::{find_accession, is_accession, is_null_marker, normalize_factors, tokenize};
pub use tfidf::{TfidfConfig, TfidfVectorizer};
