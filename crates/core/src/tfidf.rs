use std::cmp::Ordering;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};
use crate::text::tokenize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TfidfConfig {
    pub max_features: usize,
    pub ngram_min: usize,
    pub ngram_max: usize,
}

impl Default for TfidfConfig {
    fn default() -> Self {
        Self {
            max_features: 1000,
            ngram_min: 1,
            ngram_max: 2,
        }
    }
}

impl TfidfConfig {
    fn validate(&self) -> Result<()> {
        if self.max_features == 0 {
            return Err(AtlasError::InvalidVectorizer("max_features must be positive"));
        }
        if self.ngram_min == 0 || self.ngram_min > self.ngram_max {
            return Err(AtlasError::InvalidVectorizer(
                "ngram range must satisfy 1 <= min <= max",
            ));
        }
        Ok(())
    }
}

/// Term-frequency / inverse-document-frequency encoder fitted on the corpus.
///
/// The vocabulary keeps the `max_features` terms with the highest total count
/// across the fitted texts (ties go to the alphabetically smaller term) and is
/// indexed in alphabetical order, so fitting the same texts twice yields the
/// same columns. Vectors are raw counts weighted by smoothed idf
/// `ln((1 + n) / (1 + df)) + 1`, then L2-normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    config: TfidfConfig,
    vocabulary: FxHashMap<String, usize>,
    idf: Vec<f32>,
}

impl TfidfVectorizer {
    pub fn fit(config: TfidfConfig, texts: &[String]) -> Result<Self> {
        config.validate()?;
        let mut total_counts: FxHashMap<String, u64> = FxHashMap::default();
        let mut doc_freq: FxHashMap<String, u64> = FxHashMap::default();
        for text in texts {
            let counts = term_counts(&config, text);
            for (term, count) in counts {
                *total_counts.entry(term.clone()).or_insert(0) += count;
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(String, u64)> = total_counts.into_iter().collect();
        ranked.sort_by(|a, b| match b.1.cmp(&a.1) {
            Ordering::Equal => a.0.cmp(&b.0),
            other => other,
        });
        ranked.truncate(config.max_features);
        let mut terms: Vec<String> = ranked.into_iter().map(|(term, _)| term).collect();
        terms.sort();

        let n_docs = texts.len() as f32;
        let mut vocabulary = FxHashMap::default();
        let mut idf = Vec::with_capacity(terms.len());
        for (column, term) in terms.into_iter().enumerate() {
            let df = doc_freq.get(&term).copied().unwrap_or(0) as f32;
            idf.push(((1.0 + n_docs) / (1.0 + df)).ln() + 1.0);
            vocabulary.insert(term, column);
        }
        Ok(Self {
            config,
            vocabulary,
            idf,
        })
    }

    pub fn fit_transform(config: TfidfConfig, texts: &[String]) -> Result<(Self, Vec<Vec<f32>>)> {
        let vectorizer = Self::fit(config, texts)?;
        let rows = texts.iter().map(|text| vectorizer.transform(text)).collect();
        Ok((vectorizer, rows))
    }

    pub fn transform(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.idf.len()];
        for (term, count) in term_counts(&self.config, text) {
            if let Some(&column) = self.vocabulary.get(&term) {
                vector[column] += count as f32 * self.idf[column];
            }
        }
        normalize(&mut vector);
        vector
    }

    pub fn dimension(&self) -> usize {
        self.idf.len()
    }

    pub fn config(&self) -> TfidfConfig {
        self.config
    }

    pub fn contains_term(&self, term: &str) -> bool {
        self.vocabulary.contains_key(term)
    }
}

fn term_counts(config: &TfidfConfig, text: &str) -> FxHashMap<String, u64> {
    let tokens = tokenize(text);
    let mut counts = FxHashMap::default();
    for n in config.ngram_min..=config.ngram_max {
        if n > tokens.len() {
            break;
        }
        for window in tokens.windows(n) {
            *counts.entry(window.join(" ")).or_insert(0) += 1;
        }
    }
    counts
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn vocabulary_holds_unigrams_and_bigrams() {
        let corpus = texts(&["mouse liver", "human brain"]);
        let vectorizer = TfidfVectorizer::fit(TfidfConfig::default(), &corpus).unwrap();
        assert_eq!(vectorizer.dimension(), 6);
        assert!(vectorizer.contains_term("mouse liver"));
        assert!(vectorizer.contains_term("brain"));
        assert!(!vectorizer.contains_term("liver human"));
    }

    #[test]
    fn vocabulary_is_capped_by_total_frequency() {
        let corpus = texts(&["seedling seedling root", "seedling leaf"]);
        let config = TfidfConfig {
            max_features: 1,
            ngram_min: 1,
            ngram_max: 1,
        };
        let vectorizer = TfidfVectorizer::fit(config, &corpus).unwrap();
        assert_eq!(vectorizer.dimension(), 1);
        assert!(vectorizer.contains_term("seedling"));
    }

    #[test]
    fn rows_are_unit_length_or_zero() {
        let corpus = texts(&["arabidopsis seedling", "homo sapiens brain", ""]);
        let (_, rows) = TfidfVectorizer::fit_transform(TfidfConfig::default(), &corpus).unwrap();
        for row in &rows[..2] {
            let norm: f32 = row.iter().map(|v| v * v).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5);
        }
        assert!(rows[2].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn rarer_terms_weigh_more() {
        let corpus = texts(&["liver tissue", "brain tissue", "heart tissue"]);
        let vectorizer = TfidfVectorizer::fit(
            TfidfConfig {
                max_features: 100,
                ngram_min: 1,
                ngram_max: 1,
            },
            &corpus,
        )
        .unwrap();
        let row = vectorizer.transform("liver tissue");
        let liver = row.iter().cloned().fold(f32::MIN, f32::max);
        let nonzero: Vec<f32> = row.iter().cloned().filter(|v| *v > 0.0).collect();
        assert_eq!(nonzero.len(), 2);
        assert!(nonzero.contains(&liver));
        assert!(nonzero.iter().any(|v| *v < liver));
    }

    #[test]
    fn unknown_query_terms_encode_to_zero() {
        let corpus = texts(&["mouse liver"]);
        let vectorizer = TfidfVectorizer::fit(TfidfConfig::default(), &corpus).unwrap();
        assert!(vectorizer.transform("zebrafish").iter().all(|v| *v == 0.0));
    }

    #[test]
    fn refitting_is_deterministic() {
        let corpus = texts(&["beta alpha gamma", "gamma delta alpha", "epsilon zeta eta theta"]);
        let (_, first) = TfidfVectorizer::fit_transform(TfidfConfig::default(), &corpus).unwrap();
        let (_, second) = TfidfVectorizer::fit_transform(TfidfConfig::default(), &corpus).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = TfidfConfig {
            max_features: 10,
            ngram_min: 2,
            ngram_max: 1,
        };
        assert!(TfidfVectorizer::fit(config, &[]).is_err());
    }
}
