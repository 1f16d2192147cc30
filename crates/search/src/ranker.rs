use atlas_core::{Corpus, ExperimentCategory, ExperimentRecord};
use serde::Serialize;
use tracing::debug;

use crate::embedding::{EmbeddingMethod, QueryEncoder};
use crate::error::SearchResult;
use crate::index::{EmbeddingIndex, PreparedIndex};

/// Hard filters applied before scoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilters {
    /// Case-insensitive substring of the record species.
    pub species: Option<String>,
    pub category: Option<ExperimentCategory>,
}

impl SearchFilters {
    pub fn new(species: Option<String>, category: Option<ExperimentCategory>) -> Self {
        Self { species, category }
    }

    pub fn admits(&self, record: &ExperimentRecord) -> bool {
        if let Some(species) = &self.species {
            if !record.matches_species(species) {
                return false;
            }
        }
        match self.category {
            Some(category) => record.category == category,
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedExperiment {
    pub record: ExperimentRecord,
    pub score: f32,
    /// 1-based position in the result list.
    pub rank: usize,
    pub corpus_index: usize,
}

/// Ranks corpus records against queries using a prepared index.
#[derive(Debug)]
pub struct SearchEngine {
    corpus: Corpus,
    index: EmbeddingIndex,
    encoder: QueryEncoder,
}

impl SearchEngine {
    /// Panics if the index does not line up with the corpus or was produced
    /// by a different method than `encoder`.
    pub fn new(corpus: Corpus, index: EmbeddingIndex, encoder: QueryEncoder) -> Self {
        assert!(
            index.row_count == corpus.len() && index.rows.len() == corpus.len(),
            "embedding index has {} rows ({} stored) but the corpus has {} records",
            index.row_count,
            index.rows.len(),
            corpus.len()
        );
        assert_eq!(
            encoder.method(),
            index.method,
            "query encoder method does not match the index"
        );
        Self {
            corpus,
            index,
            encoder,
        }
    }

    pub fn from_prepared(corpus: Corpus, prepared: PreparedIndex) -> Self {
        Self::new(corpus, prepared.index, prepared.encoder)
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn method(&self) -> EmbeddingMethod {
        self.index.method
    }

    pub fn search(
        &mut self,
        query: &str,
        top_k: usize,
        filters: &SearchFilters,
    ) -> SearchResult<Vec<RankedExperiment>> {
        let candidates: Vec<usize> = self
            .corpus
            .iter()
            .enumerate()
            .filter(|(_, record)| filters.admits(record))
            .map(|(idx, _)| idx)
            .collect();
        debug!(
            query,
            admitted = candidates.len(),
            corpus = self.corpus.len(),
            "filters applied"
        );
        if candidates.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.encoder.encode(query)?;
        let mut hits: Vec<(usize, f32)> = candidates
            .into_iter()
            .map(|idx| {
                let score = cosine_similarity(&self.index.rows[idx], &query_vector);
                // NaN from a misbehaving model counts as no similarity.
                (idx, if score.is_nan() { 0.0 } else { score })
            })
            .collect();
        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        hits.truncate(top_k);

        Ok(hits
            .into_iter()
            .enumerate()
            .filter_map(|(pos, (idx, score))| {
                self.corpus.get(idx).map(|record| RankedExperiment {
                    record: record.clone(),
                    score,
                    rank: pos + 1,
                    corpus_index: idx,
                })
            })
            .collect())
    }

    /// Searches with `species` followed by `keywords` as the query text, and
    /// `species`/`category` as hard filters.
    pub fn search_by_keywords(
        &mut self,
        species: Option<&str>,
        keywords: &[String],
        category: Option<ExperimentCategory>,
        top_k: usize,
    ) -> SearchResult<Vec<RankedExperiment>> {
        let query = species
            .into_iter()
            .chain(keywords.iter().map(String::as_str))
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let filters = SearchFilters::new(species.map(str::to_string), category);
        self.search(&query, top_k, &filters)
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut a_norm = 0.0f32;
    let mut b_norm = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        a_norm += x * x;
        b_norm += y * y;
    }
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    dot / (a_norm.sqrt() * b_norm.sqrt())
}
