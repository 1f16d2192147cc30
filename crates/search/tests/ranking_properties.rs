use atlas_core::{Corpus, ExperimentCategory, ExperimentRecord};
use atlas_search::{
    cosine_similarity, EmbeddingIndex, EmbeddingMethod, QueryEncoder, SearchEngine,
    SearchFilters, SearchResult, SemanticEncoder,
};
use proptest::prelude::*;

const SPECIES: [&str; 3] = ["Homo sapiens", "Mus musculus", "Arabidopsis thaliana"];

/// Encodes every query to the same vector.
struct FixedQuery(Vec<f32>);

impl SemanticEncoder for FixedQuery {
    fn model_name(&self) -> &str {
        "fixed"
    }

    fn embed_batch(&mut self, texts: &[String]) -> SearchResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| self.0.clone()).collect())
    }
}

#[derive(Clone, Debug)]
struct Row {
    species: usize,
    differential: bool,
    vector: Vec<f32>,
}

fn row() -> impl Strategy<Value = Row> {
    (
        0usize..SPECIES.len(),
        any::<bool>(),
        prop::collection::vec(prop_oneof![Just(0.0f32), -2.0f32..2.0], 4),
    )
        .prop_map(|(species, differential, vector)| Row {
            species,
            differential,
            vector,
        })
}

fn engine(rows: &[Row], query: Vec<f32>) -> SearchEngine {
    let records = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let category = if row.differential {
                ExperimentCategory::Differential
            } else {
                ExperimentCategory::Baseline
            };
            ExperimentRecord::new(format!("E-MTAB-{i}"), category, SPECIES[row.species], "", "")
        })
        .collect();
    let index = EmbeddingIndex::new(
        EmbeddingMethod::ModelBased,
        rows.iter().map(|row| row.vector.clone()).collect(),
    );
    SearchEngine::new(
        Corpus::new(records),
        index,
        QueryEncoder::Model(Box::new(FixedQuery(query))),
    )
}

fn filters() -> impl Strategy<Value = SearchFilters> {
    (
        prop::option::of(prop_oneof![
            Just("homo".to_string()),
            Just("MUSCULUS".to_string()),
            Just("thal".to_string()),
            Just("danio".to_string()),
        ]),
        prop::option::of(prop_oneof![
            Just(ExperimentCategory::Baseline),
            Just(ExperimentCategory::Differential),
        ]),
    )
        .prop_map(|(species, category)| SearchFilters::new(species, category))
}

proptest! {
    #[test]
    fn results_are_sorted_with_index_tie_break(
        rows in prop::collection::vec(row(), 1..24),
        query in prop::collection::vec(-2.0f32..2.0, 4),
        top_k in 1usize..30,
    ) {
        let mut engine = engine(&rows, query);
        let hits = engine.search("q", top_k, &SearchFilters::default()).unwrap();
        for (pos, hit) in hits.iter().enumerate() {
            prop_assert_eq!(hit.rank, pos + 1);
        }
        for pair in hits.windows(2) {
            prop_assert!(
                pair[0].score > pair[1].score
                    || (pair[0].score == pair[1].score && pair[0].corpus_index < pair[1].corpus_index)
            );
        }
    }

    #[test]
    fn only_admitted_records_are_returned(
        rows in prop::collection::vec(row(), 1..24),
        query in prop::collection::vec(-2.0f32..2.0, 4),
        filters in filters(),
        top_k in 1usize..30,
    ) {
        let mut engine = engine(&rows, query);
        let admitted = engine.corpus().iter().filter(|r| filters.admits(r)).count();
        let hits = engine.search("q", top_k, &filters).unwrap();
        prop_assert_eq!(hits.len(), top_k.min(admitted));
        for hit in &hits {
            prop_assert!(filters.admits(&hit.record));
            if let Some(species) = &filters.species {
                prop_assert!(hit.record.species.to_lowercase().contains(&species.to_lowercase()));
            }
            if let Some(category) = filters.category {
                prop_assert_eq!(hit.record.category, category);
            }
        }
    }

    #[test]
    fn scores_are_raw_cosine(
        rows in prop::collection::vec(row(), 1..12),
        query in prop::collection::vec(-2.0f32..2.0, 4),
    ) {
        let mut engine = engine(&rows, query.clone());
        let hits = engine.search("q", rows.len(), &SearchFilters::default()).unwrap();
        prop_assert_eq!(hits.len(), rows.len());
        for hit in &hits {
            let expected = cosine_similarity(&rows[hit.corpus_index].vector, &query);
            prop_assert_eq!(hit.score, expected);
            prop_assert!((-1.0001..=1.0001).contains(&hit.score));
        }
    }
}
