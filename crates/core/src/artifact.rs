use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A downloadable file belonging to an experiment. Listings hand these over
/// either as bare names or as `{name, url, size}` objects; both shapes are
/// folded into this one type when they are read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawFileItem")]
pub struct FileItem {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFileItem {
    Name(String),
    Structured {
        name: String,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        size: Option<RawSize>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSize {
    Bytes(u64),
    Text(String),
}

impl From<RawFileItem> for FileItem {
    fn from(raw: RawFileItem) -> Self {
        match raw {
            RawFileItem::Name(name) => FileItem::named(name),
            RawFileItem::Structured { name, url, size } => FileItem {
                name,
                url,
                size: size.and_then(|s| match s {
                    RawSize::Bytes(bytes) => Some(bytes),
                    RawSize::Text(text) => text.trim().parse().ok(),
                }),
            },
        }
    }
}

impl FileItem {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
            size: None,
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        ArtifactKind::classify(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Tpms,
    Fpkms,
    Counts,
    Analytics,
    Metadata,
    Other,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Tpms => "tpms",
            ArtifactKind::Fpkms => "fpkms",
            ArtifactKind::Counts => "counts",
            ArtifactKind::Analytics => "analytics",
            ArtifactKind::Metadata => "metadata",
            ArtifactKind::Other => "other",
        }
    }

    pub fn classify(file_name: &str) -> Self {
        let lower = file_name.to_lowercase();
        let tsv = lower.ends_with(".tsv");
        if lower.contains("tpm") && tsv {
            ArtifactKind::Tpms
        } else if lower.contains("fpkm") && tsv {
            ArtifactKind::Fpkms
        } else if lower.contains("count") && tsv {
            ArtifactKind::Counts
        } else if lower.contains("analytics") {
            ArtifactKind::Analytics
        } else if lower.contains("sdrf") || lower.contains("metadata") {
            ArtifactKind::Metadata
        } else {
            ArtifactKind::Other
        }
    }

    fn is_expression(&self) -> bool {
        matches!(
            self,
            ArtifactKind::Tpms | ArtifactKind::Fpkms | ArtifactKind::Counts
        )
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const RECOMMENDATION_ORDER: [ArtifactKind; 4] = [
    ArtifactKind::Tpms,
    ArtifactKind::Fpkms,
    ArtifactKind::Counts,
    ArtifactKind::Analytics,
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArtifactCatalog {
    pub groups: BTreeMap<ArtifactKind, Vec<FileItem>>,
    pub total_files: usize,
}

impl ArtifactCatalog {
    pub fn classify(items: impl IntoIterator<Item = FileItem>) -> Self {
        let mut catalog = ArtifactCatalog::default();
        for item in items {
            catalog.total_files += 1;
            catalog.groups.entry(item.kind()).or_default().push(item);
        }
        catalog
    }

    /// Preferred file to fetch: TPMs, then FPKMs, raw counts, analytics.
    pub fn recommended(&self) -> Option<(ArtifactKind, &FileItem)> {
        RECOMMENDATION_ORDER.iter().find_map(|kind| {
            self.groups
                .get(kind)
                .and_then(|items| items.first())
                .map(|item| (*kind, item))
        })
    }

    pub fn expression_files(&self) -> usize {
        self.count_where(|kind| kind.is_expression())
    }

    pub fn metadata_files(&self) -> usize {
        self.count_where(|kind| *kind == ArtifactKind::Metadata)
    }

    fn count_where(&self, pred: impl Fn(&ArtifactKind) -> bool) -> usize {
        self.groups
            .iter()
            .filter(|(kind, _)| pred(kind))
            .map(|(_, items)| items.len())
            .sum()
    }
}
