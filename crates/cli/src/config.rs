use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use atlas_core::{CorpusSource, ExperimentCategory, TfidfConfig, BASELINE_FILE, DIFFERENTIAL_FILE};
use serde::Deserialize;

pub const DEFAULT_CONFIG: &str = "atlas.toml";

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataSection,
    pub index: IndexSection,
    pub search: SearchSection,
    pub download: DownloadSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataSection {
    pub dir: PathBuf,
    pub baseline_file: String,
    pub differential_file: String,
    pub cache_file: String,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./atlas_cache"),
            baseline_file: BASELINE_FILE.to_string(),
            differential_file: DIFFERENTIAL_FILE.to_string(),
            cache_file: "embeddings_cache.bin".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexSection {
    pub max_features: usize,
    pub ngram_max: usize,
    pub model_cache_dir: Option<PathBuf>,
    pub use_model: bool,
}

impl Default for IndexSection {
    fn default() -> Self {
        Self {
            max_features: 1000,
            ngram_max: 2,
            model_cache_dir: None,
            use_model: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub top_k: usize,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadSection {
    pub output_dir: PathBuf,
    pub timeout_secs: u64,
}

impl Default for DownloadSection {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./expression_atlas_data"),
            timeout_secs: 60,
        }
    }
}

impl AppConfig {
    pub fn sources(&self) -> Vec<CorpusSource> {
        vec![
            CorpusSource::new(
                self.data.dir.join(&self.data.baseline_file),
                ExperimentCategory::Baseline,
            ),
            CorpusSource::new(
                self.data.dir.join(&self.data.differential_file),
                ExperimentCategory::Differential,
            ),
        ]
    }

    pub fn cache_path(&self) -> PathBuf {
        self.data.dir.join(&self.data.cache_file)
    }

    pub fn tfidf(&self) -> TfidfConfig {
        TfidfConfig {
            max_features: self.index.max_features,
            ngram_min: 1,
            ngram_max: self.index.ngram_max,
        }
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = env::var("ATLAS_DATA_DIR") {
            if !dir.trim().is_empty() {
                self.data.dir = PathBuf::from(dir);
            }
        }
        if let Ok(dir) = env::var("ATLAS_DOWNLOAD_DIR") {
            if !dir.trim().is_empty() {
                self.download.output_dir = PathBuf::from(dir);
            }
        }
    }
}

/// Reads `path` (defaults when absent) and applies environment overrides.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let mut config = read_config_file(path)?;
    config.apply_env();
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&contents).map_err(|e| anyhow!("invalid config: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = read_config_file(&dir.path().join("atlas.toml")).unwrap();
        assert_eq!(config.data.cache_file, "embeddings_cache.bin");
        assert_eq!(config.index.max_features, 1000);
        assert_eq!(config.search.top_k, 5);
        assert_eq!(config.download.timeout_secs, 60);
        assert!(config.index.use_model);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("atlas.toml");
        fs::write(
            &path,
            "[data]\ndir = \"/srv/atlas\"\n\n[index]\nuse_model = false\nmax_features = 50\n",
        )
        .unwrap();
        let config = read_config_file(&path).unwrap();
        assert_eq!(config.data.dir, PathBuf::from("/srv/atlas"));
        assert_eq!(config.data.baseline_file, BASELINE_FILE);
        assert_eq!(config.cache_path(), PathBuf::from("/srv/atlas/embeddings_cache.bin"));
        assert!(!config.index.use_model);
        assert_eq!(config.tfidf().max_features, 50);
        assert_eq!(config.tfidf().ngram_max, 2);
        assert_eq!(config.sources()[1].category, ExperimentCategory::Differential);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("atlas.toml");
        fs::write(&path, "[data\n").unwrap();
        assert!(read_config_file(&path).is_err());
    }
}
