use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use atlas_core::{Corpus, TfidfConfig, TfidfVectorizer};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::embedding::{EmbeddingMethod, ModelLoader, QueryEncoder, SemanticEncoder};
use crate::error::{SearchError, SearchResult};

/// Dense row-major embedding matrix, one row per corpus record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingIndex {
    pub method: EmbeddingMethod,
    pub row_count: usize,
    pub dimension: usize,
    pub rows: Vec<Vec<f32>>,
    pub built_at: String,
    /// The fitted vocabulary behind statistical rows. Queries against a
    /// cached statistical index are encoded with this, never a refit.
    pub vectorizer: Option<TfidfVectorizer>,
}

impl EmbeddingIndex {
    pub fn new(method: EmbeddingMethod, rows: Vec<Vec<f32>>) -> Self {
        let dimension = rows.first().map(|row| row.len()).unwrap_or(0);
        Self {
            method,
            row_count: rows.len(),
            dimension,
            rows,
            built_at: chrono::Utc::now().to_rfc3339(),
            vectorizer: None,
        }
    }

    pub fn statistical(vectorizer: TfidfVectorizer, rows: Vec<Vec<f32>>) -> Self {
        let mut index = Self::new(EmbeddingMethod::StatisticalFallback, rows);
        if index.rows.is_empty() {
            index.dimension = vectorizer.dimension();
        }
        index.vectorizer = Some(vectorizer);
        index
    }

    pub fn is_consistent(&self) -> bool {
        let vocabulary_fits = match &self.vectorizer {
            Some(vectorizer) => vectorizer.dimension() == self.dimension,
            None => true,
        };
        vocabulary_fits
            && self.rows.len() == self.row_count
            && self.rows.iter().all(|row| row.len() == self.dimension)
    }
}

/// Single-file binary cache for an [`EmbeddingIndex`].
#[derive(Debug, Clone)]
pub struct IndexCache {
    path: PathBuf,
}

impl IndexCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the cached index. Missing or undecodable files yield `None`.
    pub fn load(&self) -> Option<EmbeddingIndex> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no embedding cache");
                return None;
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "embedding cache unreadable");
                return None;
            }
        };
        let mut reader = BufReader::new(file);
        match bincode::deserialize_from::<_, EmbeddingIndex>(&mut reader) {
            Ok(index) if index.is_consistent() => Some(index),
            Ok(_) => {
                warn!(path = %self.path.display(), "embedding cache inconsistent, ignoring");
                None
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "embedding cache corrupt, ignoring");
                None
            }
        }
    }

    /// Overwrites the cache file with `index`.
    pub fn store(&self, index: &EmbeddingIndex) -> SearchResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = BufWriter::new(File::create(&self.path)?);
        bincode::serialize_into(&mut file, index)?;
        file.flush()?;
        Ok(())
    }
}

/// An index together with the encoder that maps queries into its space.
#[derive(Debug)]
pub struct PreparedIndex {
    pub index: EmbeddingIndex,
    pub encoder: QueryEncoder,
    pub reused: bool,
}

/// Builds the corpus embedding matrix, reusing the on-disk cache when it
/// still matches the corpus.
pub struct VectorIndexer {
    cache: IndexCache,
    loader: Box<dyn ModelLoader>,
    tfidf: TfidfConfig,
}

impl VectorIndexer {
    pub fn new(cache: IndexCache, loader: Box<dyn ModelLoader>, tfidf: TfidfConfig) -> Self {
        Self {
            cache,
            loader,
            tfidf,
        }
    }

    pub fn cache(&self) -> &IndexCache {
        &self.cache
    }

    pub fn build(&self, corpus: &Corpus, force_rebuild: bool) -> SearchResult<PreparedIndex> {
        let texts = corpus.searchable_texts();
        if corpus.is_empty() {
            info!("corpus is empty, nothing to embed");
            let vectorizer = TfidfVectorizer::fit(self.tfidf, &texts)?;
            return Ok(PreparedIndex {
                index: EmbeddingIndex::new(EmbeddingMethod::StatisticalFallback, Vec::new()),
                encoder: QueryEncoder::Statistical(vectorizer),
                reused: false,
            });
        }

        if !force_rebuild {
            if let Some(prepared) = self.reuse_cached(corpus.len()) {
                return Ok(prepared);
            }
        }

        let prepared = self.encode_corpus(&texts)?;
        info!(
            method = %prepared.index.method,
            rows = prepared.index.row_count,
            dimension = prepared.index.dimension,
            "embedding index built"
        );
        if let Err(err) = self.cache.store(&prepared.index) {
            warn!(path = %self.cache.path().display(), error = %err, "failed to write embedding cache");
        }
        Ok(prepared)
    }

    fn reuse_cached(&self, expected_rows: usize) -> Option<PreparedIndex> {
        let index = self.cache.load()?;
        if index.row_count != expected_rows {
            info!(
                cached = index.row_count,
                corpus = expected_rows,
                "embedding cache is stale"
            );
            return None;
        }
        let encoder = match index.method {
            EmbeddingMethod::StatisticalFallback => match &index.vectorizer {
                Some(vectorizer) if vectorizer.config() == self.tfidf => {
                    QueryEncoder::Statistical(vectorizer.clone())
                }
                Some(_) => {
                    info!("vectorizer settings changed, rebuilding");
                    return None;
                }
                None => {
                    warn!("cached statistical index has no vocabulary, rebuilding");
                    return None;
                }
            },
            EmbeddingMethod::ModelBased => match self.loader.load() {
                Ok(encoder) => QueryEncoder::Model(encoder),
                Err(err) => {
                    warn!(error = %err, "cached index needs the semantic model, rebuilding");
                    return None;
                }
            },
        };
        info!(
            method = %index.method,
            rows = index.row_count,
            "reusing embedding cache"
        );
        Some(PreparedIndex {
            index,
            encoder,
            reused: true,
        })
    }

    fn encode_corpus(&self, texts: &[String]) -> SearchResult<PreparedIndex> {
        match self.loader.load() {
            Ok(encoder) => match embed_with_model(encoder, texts) {
                Ok(prepared) => return Ok(prepared),
                Err(err) => warn!(error = %err, "semantic encoding failed, using statistical fallback"),
            },
            Err(err) => warn!(error = %err, "semantic model unavailable, using statistical fallback"),
        }
        let (vectorizer, rows) = TfidfVectorizer::fit_transform(self.tfidf, texts)?;
        Ok(PreparedIndex {
            index: EmbeddingIndex::statistical(vectorizer.clone(), rows),
            encoder: QueryEncoder::Statistical(vectorizer),
            reused: false,
        })
    }
}

fn embed_with_model(
    mut encoder: Box<dyn SemanticEncoder>,
    texts: &[String],
) -> SearchResult<PreparedIndex> {
    let rows = encoder.embed_batch(texts)?;
    if rows.len() != texts.len() {
        return Err(SearchError::Model(format!(
            "model returned {} rows for {} texts",
            rows.len(),
            texts.len()
        )));
    }
    let index = EmbeddingIndex::new(EmbeddingMethod::ModelBased, rows);
    if !index.is_consistent() {
        return Err(SearchError::Model(
            "model returned rows of differing length".to_string(),
        ));
    }
    Ok(PreparedIndex {
        index,
        encoder: QueryEncoder::Model(encoder),
        reused: false,
    })
}

impl std::fmt::Debug for VectorIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndexer")
            .field("cache", &self.cache)
            .field("tfidf", &self.tfidf)
            .finish()
    }
}
