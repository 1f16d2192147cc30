use once_cell::sync::Lazy;
use regex::Regex;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").unwrap());

static ACCESSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bE-(MTAB|GEOD|MEXP|TABM|ATMX|AFMX|MAGE|ENAD|ERAD|CURD|PROT)-\d+\b")
        .unwrap()
});

const NULL_MARKERS: [&str; 3] = ["nan", "none", "null"];

pub fn is_null_marker(value: &str) -> bool {
    let lower = value.trim().to_lowercase();
    NULL_MARKERS.contains(&lower.as_str())
}

/// Turns the comma-joined factor list into plain space-separated words.
pub fn normalize_factors(factors: &str) -> String {
    factors
        .replace(',', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercased word tokens of two or more word characters.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOKEN_RE
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// First Expression Atlas accession mentioned in `text`, upper-cased.
pub fn find_accession(text: &str) -> Option<String> {
    ACCESSION_RE
        .find(text)
        .map(|m| m.as_str().to_uppercase())
}

pub fn is_accession(text: &str) -> bool {
    find_accession(text.trim()).map_or(false, |found| found.len() == text.trim().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_drops_single_characters_and_punctuation() {
        assert_eq!(
            tokenize("RNA-seq of a Mouse, liver!"),
            vec!["rna", "seq", "of", "mouse", "liver"]
        );
    }

    #[test]
    fn factors_are_space_separated() {
        assert_eq!(
            normalize_factors("developmental stage, organism part,"),
            "developmental stage organism part"
        );
    }

    #[test]
    fn null_markers_are_case_insensitive() {
        assert!(is_null_marker("NaN"));
        assert!(is_null_marker(" none "));
        assert!(!is_null_marker("nano"));
    }

    #[test]
    fn accession_found_inside_free_text() {
        assert_eq!(
            find_accession("please fetch e-mtab-513 for me"),
            Some("E-MTAB-513".to_string())
        );
        assert_eq!(find_accession("arabidopsis seedling"), None);
        assert_eq!(find_accession("E-FOO-12"), None);
    }

    #[test]
    fn is_accession_requires_whole_token() {
        assert!(is_accession(" E-GEOD-21860 "));
        assert!(!is_accession("E-GEOD-21860 liver"));
    }
}
