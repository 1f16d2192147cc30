use atlas_core::{ExperimentCategory, ExperimentRecord, TfidfConfig, TfidfVectorizer};
use proptest::prelude::*;

proptest! {
    #[test]
    fn rows_are_unit_or_zero_length(texts in text_vec()) {
        let (vectorizer, rows) = TfidfVectorizer::fit_transform(TfidfConfig::default(), &texts).unwrap();
        prop_assert_eq!(rows.len(), texts.len());
        prop_assert!(vectorizer.dimension() <= TfidfConfig::default().max_features);
        for row in &rows {
            prop_assert_eq!(row.len(), vectorizer.dimension());
            let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt();
            prop_assert!(norm == 0.0 || (norm - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn transform_matches_fit_transform(texts in text_vec()) {
        let (vectorizer, rows) = TfidfVectorizer::fit_transform(TfidfConfig::default(), &texts).unwrap();
        let refit = TfidfVectorizer::fit(TfidfConfig::default(), &texts).unwrap();
        for (text, row) in texts.iter().zip(&rows) {
            prop_assert_eq!(&vectorizer.transform(text), row);
            prop_assert_eq!(&refit.transform(text), row);
        }
    }

    #[test]
    fn searchable_text_never_has_blank_runs(
        species in "[A-Za-z ]{0,20}",
        description in "[A-Za-z ,-]{0,40}",
        factors in "[a-z ,]{0,30}",
    ) {
        let record = ExperimentRecord::new("E-MTAB-1", ExperimentCategory::Baseline, species, description, factors);
        let text = record.searchable_text();
        prop_assert!(!text.starts_with(' '));
        prop_assert!(!text.ends_with(' '));
        prop_assert!(text.contains("baseline"));
    }
}

fn text_vec() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{1,8}( [a-z]{1,8}){0,6}", 0..12)
}
