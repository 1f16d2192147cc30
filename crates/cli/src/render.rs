use std::collections::BTreeMap;
use std::path::PathBuf;

use atlas_core::{popular_accessions, ArtifactCatalog, ExperimentCategory, ExperimentRecord};
use atlas_search::RankedExperiment;

use crate::remote::{experiment_page, FileListing};

const DESCRIPTION_WIDTH: usize = 90;

pub fn print_ranked(hits: &[RankedExperiment]) {
    for hit in hits {
        println!(
            "{:>2}. {} [{}] {} (score {:.3})",
            hit.rank, hit.record.accession, hit.record.category, hit.record.species, hit.score
        );
        print_details(&hit.record, "    ");
    }
}

pub fn print_record(record: &ExperimentRecord) {
    println!(
        "{} [{}] {}",
        record.accession, record.category, record.species
    );
    print_details(record, "  ");
}

fn print_details(record: &ExperimentRecord, indent: &str) {
    if !record.description.is_empty() {
        println!("{indent}{}", truncate(&record.description, DESCRIPTION_WIDTH));
    }
    if !record.factors.is_empty() {
        println!("{indent}factors: {}", record.factors);
    }
}

pub fn print_popular(category: Option<ExperimentCategory>) {
    let categories = match category {
        Some(category) => vec![category],
        None => ExperimentCategory::ALL.to_vec(),
    };
    println!("Popular experiments:");
    for category in categories {
        println!("  {category}: {}", popular_accessions(category).join(", "));
    }
}

pub fn print_artifacts(artifacts: &BTreeMap<String, PathBuf>) {
    for (kind, path) in artifacts {
        println!("  {kind:<15} {}", path.display());
    }
}

pub fn print_listing(accession: &str, listing: &FileListing, catalog: &ArtifactCatalog) {
    println!(
        "{accession}: {} files via {} ({})",
        catalog.total_files,
        listing.method.as_str(),
        listing.url
    );
    for (kind, items) in &catalog.groups {
        println!("{kind}:");
        for item in items {
            match item.size {
                Some(size) => println!("  {} ({size} bytes)", item.name),
                None => println!("  {}", item.name),
            }
        }
    }
    println!(
        "expression files: {}, metadata files: {}",
        catalog.expression_files(),
        catalog.metadata_files()
    );
    match catalog.recommended() {
        Some((kind, item)) => println!("recommended: {} ({kind})", item.name),
        None => println!("no expression data recognised; see {}", experiment_page(accession)),
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let cut: String = text.chars().take(width.saturating_sub(3)).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 8), "abcde...");
        assert_eq!(truncate("拟南芥拟南芥", 5), "拟南...");
    }
}
