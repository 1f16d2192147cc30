use atlas_core::{
    best_snapshot, load, snapshot_path, write_snapshot, ArtifactCatalog, ArtifactKind,
    CorpusSource, CuratedSnapshot, ExperimentCategory, FileItem, SnapshotStrategy,
};
use tempfile::tempdir;

struct Unreachable;

impl SnapshotStrategy for Unreachable {
    fn name(&self) -> &str {
        "unreachable"
    }

    fn fetch(&self, _category: ExperimentCategory) -> Vec<atlas_core::ExperimentRecord> {
        Vec::new()
    }
}

#[test]
fn refresh_then_load_gives_baseline_before_differential() {
    let dir = tempdir().unwrap();
    for category in [ExperimentCategory::Differential, ExperimentCategory::Baseline] {
        let snapshot = best_snapshot(&[&Unreachable, &CuratedSnapshot], category).unwrap();
        write_snapshot(&snapshot_path(dir.path(), category), &snapshot).unwrap();
    }

    let corpus = load(&CorpusSource::standard(dir.path())).unwrap();
    let categories: Vec<_> = corpus.iter().map(|r| r.category).collect();
    assert_eq!(
        categories,
        vec![
            ExperimentCategory::Baseline,
            ExperimentCategory::Baseline,
            ExperimentCategory::Baseline,
            ExperimentCategory::Differential,
            ExperimentCategory::Differential,
        ]
    );
    assert_eq!(corpus.get(0).unwrap().accession, "E-MTAB-513");
}

#[test]
fn only_differential_present() {
    let dir = tempdir().unwrap();
    let snapshot = best_snapshot(&[&CuratedSnapshot], ExperimentCategory::Differential).unwrap();
    let path = dir.path().join("nested").join("differential_experiments.csv");
    write_snapshot(&path, &snapshot).unwrap();
    assert!(path.exists());
    write_snapshot(&snapshot_path(dir.path(), ExperimentCategory::Differential), &snapshot).unwrap();
    let corpus = load(&CorpusSource::standard(dir.path())).unwrap();
    assert_eq!(corpus.len(), 2);
    assert!(corpus
        .iter()
        .all(|r| r.category == ExperimentCategory::Differential));
}

#[test]
fn listing_json_classifies_into_groups() {
    let items: Vec<FileItem> = serde_json::from_str(
        r#"[
            {"name": "E-MTAB-3358-tpms.tsv", "size": 1024},
            "E-MTAB-3358-raw-counts.tsv",
            "E-MTAB-3358.condensed-sdrf.tsv",
            {"name": "E-MTAB-3358-configuration.xml"}
        ]"#,
    )
    .unwrap();
    let catalog = ArtifactCatalog::classify(items);
    assert_eq!(catalog.total_files, 4);
    assert_eq!(catalog.expression_files(), 2);
    assert_eq!(catalog.metadata_files(), 1);
    assert_eq!(catalog.groups[&ArtifactKind::Other].len(), 1);
    let (kind, item) = catalog.recommended().unwrap();
    assert_eq!(kind, ArtifactKind::Tpms);
    assert_eq!(item.size, Some(1024));
}
