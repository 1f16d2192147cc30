use std::fmt;
use std::path::PathBuf;

use atlas_core::TfidfVectorizer;
use serde::{Deserialize, Serialize};

use crate::error::{SearchError, SearchResult};

/// How the rows of an index were produced. Queries must be encoded the same
/// way or their scores are meaningless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmbeddingMethod {
    ModelBased,
    StatisticalFallback,
}

impl EmbeddingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingMethod::ModelBased => "model-based",
            EmbeddingMethod::StatisticalFallback => "statistical-fallback",
        }
    }
}

impl fmt::Display for EmbeddingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A loaded sentence-embedding model.
pub trait SemanticEncoder {
    fn model_name(&self) -> &str;

    /// Encodes `texts` in one pass, one vector per input, in input order.
    fn embed_batch(&mut self, texts: &[String]) -> SearchResult<Vec<Vec<f32>>>;
}

/// Produces a [`SemanticEncoder`] on demand. Failing here is not fatal: the
/// indexer falls back to the statistical encoder.
pub trait ModelLoader {
    fn load(&self) -> SearchResult<Box<dyn SemanticEncoder>>;
}

/// Loader used when no model is compiled in or the config turns it off.
#[derive(Debug, Clone)]
pub struct UnavailableModel {
    reason: String,
}

impl UnavailableModel {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl ModelLoader for UnavailableModel {
    fn load(&self) -> SearchResult<Box<dyn SemanticEncoder>> {
        Err(SearchError::Model(self.reason.clone()))
    }
}

#[cfg(feature = "semantic")]
pub use self::fastembed_backend::FastEmbedLoader;

#[cfg(feature = "semantic")]
mod fastembed_backend {
    use std::path::PathBuf;

    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use tracing::info;

    use super::{ModelLoader, SemanticEncoder};
    use crate::error::{SearchError, SearchResult};

    /// Multilingual paraphrase MiniLM, run locally through fastembed.
    #[derive(Debug, Clone, Default)]
    pub struct FastEmbedLoader {
        cache_dir: Option<PathBuf>,
    }

    impl FastEmbedLoader {
        pub fn new(cache_dir: Option<PathBuf>) -> Self {
            Self { cache_dir }
        }
    }

    impl ModelLoader for FastEmbedLoader {
        fn load(&self) -> SearchResult<Box<dyn SemanticEncoder>> {
            let model_type = EmbeddingModel::ParaphraseMLMiniLML12V2;
            let model_name = format!("{:?}", model_type);
            let mut options = InitOptions::new(model_type);
            if let Some(dir) = &self.cache_dir {
                options = options.with_cache_dir(dir.clone());
            }
            let model = TextEmbedding::try_new(options)
                .map_err(|e| SearchError::Model(format!("failed to initialize {model_name}: {e}")))?;
            info!(model = %model_name, "semantic model loaded");
            Ok(Box::new(FastEmbedEncoder { model, model_name }))
        }
    }

    struct FastEmbedEncoder {
        model: TextEmbedding,
        model_name: String,
    }

    impl SemanticEncoder for FastEmbedEncoder {
        fn model_name(&self) -> &str {
            &self.model_name
        }

        fn embed_batch(&mut self, texts: &[String]) -> SearchResult<Vec<Vec<f32>>> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            self.model
                .embed(texts.to_vec(), None)
                .map_err(|e| SearchError::Model(format!("embedding failed: {e}")))
        }
    }
}

/// The loader this build can offer: fastembed when the `semantic` feature is
/// on and `use_model` is set, otherwise a loader that always declines.
pub fn default_loader(use_model: bool, cache_dir: Option<PathBuf>) -> Box<dyn ModelLoader> {
    if !use_model {
        return Box::new(UnavailableModel::new("semantic model disabled by configuration"));
    }
    compiled_loader(cache_dir)
}

#[cfg(feature = "semantic")]
fn compiled_loader(cache_dir: Option<PathBuf>) -> Box<dyn ModelLoader> {
    Box::new(FastEmbedLoader::new(cache_dir))
}

#[cfg(not(feature = "semantic"))]
fn compiled_loader(_cache_dir: Option<PathBuf>) -> Box<dyn ModelLoader> {
    Box::new(UnavailableModel::new("built without the `semantic` feature"))
}

/// Encodes queries into the vector space of an index.
pub enum QueryEncoder {
    Model(Box<dyn SemanticEncoder>),
    Statistical(TfidfVectorizer),
}

impl QueryEncoder {
    pub fn method(&self) -> EmbeddingMethod {
        match self {
            QueryEncoder::Model(_) => EmbeddingMethod::ModelBased,
            QueryEncoder::Statistical(_) => EmbeddingMethod::StatisticalFallback,
        }
    }

    pub fn encode(&mut self, text: &str) -> SearchResult<Vec<f32>> {
        match self {
            QueryEncoder::Model(encoder) => {
                let mut rows = encoder.embed_batch(&[text.to_string()])?;
                rows.pop()
                    .ok_or_else(|| SearchError::Model("model returned no embedding".to_string()))
            }
            QueryEncoder::Statistical(vectorizer) => Ok(vectorizer.transform(text)),
        }
    }
}

impl fmt::Debug for QueryEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryEncoder::Model(encoder) => f
                .debug_tuple("Model")
                .field(&encoder.model_name())
                .finish(),
            QueryEncoder::Statistical(vectorizer) => f
                .debug_tuple("Statistical")
                .field(&vectorizer.dimension())
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_core::TfidfConfig;

    #[test]
    fn unavailable_model_reports_reason() {
        let loader = UnavailableModel::new("offline");
        match loader.load() {
            Err(SearchError::Model(reason)) => assert_eq!(reason, "offline"),
            _ => panic!("expected model error"),
        }
    }

    #[test]
    fn disabled_loader_always_declines() {
        assert!(default_loader(false, None).load().is_err());
    }

    #[test]
    fn statistical_encoder_uses_vectorizer_space() {
        let texts = vec!["mouse liver".to_string(), "human brain".to_string()];
        let vectorizer = TfidfVectorizer::fit(TfidfConfig::default(), &texts).unwrap();
        let dimension = vectorizer.dimension();
        let mut encoder = QueryEncoder::Statistical(vectorizer);
        assert_eq!(encoder.method(), EmbeddingMethod::StatisticalFallback);
        assert_eq!(encoder.encode("liver").unwrap().len(), dimension);
    }
}
