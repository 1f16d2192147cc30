mod config;
mod remote;
mod render;
mod repl;

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use atlas_core::{
    best_snapshot, load, write_snapshot, ArtifactCatalog, Corpus, CuratedSnapshot,
    ExperimentCategory, SnapshotStrategy,
};
use atlas_search::{
    default_loader, Coordinator, IndexCache, PreparedIndex, SearchEngine, VectorIndexer,
};

use crate::config::{load_config, AppConfig, DEFAULT_CONFIG};
use crate::remote::{
    experiment_page, http_client, list_files, HtmlScrapeSnapshot, HttpArtifactFetcher,
    JsonEndpointSnapshot,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const VERSION_LONG: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (embeddings: ",
    env!("ATLAS_EMBEDDINGS"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "atlas", version = VERSION, long_version = VERSION_LONG, about = "Find Expression Atlas experiments by description")]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory holding the experiment snapshots and the embedding cache.
    #[arg(long = "data-dir", global = true)]
    data_dir: Option<PathBuf>,
    #[arg(short, long, global = true, action = ArgAction::SetTrue)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the embedding index, or confirm the cached one is current.
    Index {
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
    /// Rank experiments against a free-text query.
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        #[arg(long)]
        species: Option<String>,
        #[arg(long)]
        category: Option<ExperimentCategory>,
        #[arg(long = "top-k")]
        top_k: Option<usize>,
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// Interactive search, selection and download.
    Chat {
        #[arg(long = "download-dir")]
        download_dir: Option<PathBuf>,
    },
    /// Refresh the experiment snapshots from Expression Atlas.
    Refresh {
        /// Skip the JSON endpoint and page scrape; write the curated list.
        #[arg(long, action = ArgAction::SetTrue)]
        offline: bool,
    },
    /// List and classify the data files of one experiment.
    Files {
        accession: String,
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let mut config = load_config(&config_path)?;
    if let Some(dir) = cli.data_dir {
        config.data.dir = dir;
    }

    match cli.command {
        Commands::Index { force } => {
            let (_, prepared) = prepare(&config, force)?;
            println!(
                "{} index: {} rows x {} dims ({}) at {}",
                if prepared.reused { "cached" } else { "built" },
                prepared.index.row_count,
                prepared.index.dimension,
                prepared.index.method,
                config.cache_path().display()
            );
        }
        Commands::Search {
            query,
            species,
            category,
            top_k,
            json,
        } => {
            let mut engine = open_engine(&config)?;
            let top_k = top_k.unwrap_or(config.search.top_k);
            let hits = engine
                .search_by_keywords(species.as_deref(), &query, category, top_k)
                .map_err(|e| anyhow!("search failed: {e}"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else if hits.is_empty() {
                println!("No experiments matched.");
                render::print_popular(category);
            } else {
                render::print_ranked(&hits);
            }
        }
        Commands::Chat { download_dir } => {
            let mut engine = open_engine(&config)?;
            let target = download_dir.unwrap_or_else(|| config.download.output_dir.clone());
            let fetcher = HttpArtifactFetcher::new(http_client(config.download.timeout_secs)?);
            let mut coordinator = Coordinator::new(fetcher, target);
            repl::run_chat(&mut engine, &mut coordinator)?;
        }
        Commands::Refresh { offline } => refresh(&config, offline)?,
        Commands::Files { accession, json } => {
            let accession = accession.trim().to_uppercase();
            let client = http_client(config.download.timeout_secs)?;
            let listing = list_files(&client, &accession).ok_or_else(|| {
                anyhow!(
                    "could not list files for {accession}; see {}",
                    experiment_page(&accession)
                )
            })?;
            let catalog = ArtifactCatalog::classify(listing.items.clone());
            if json {
                let recommended = catalog.recommended().map(|(kind, item)| {
                    json!({ "kind": kind, "file": item })
                });
                let out = json!({
                    "accession": accession,
                    "url": listing.url,
                    "method": listing.method.as_str(),
                    "catalog": catalog,
                    "recommended": recommended,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                render::print_listing(&accession, &listing, &catalog);
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn prepare(config: &AppConfig, force: bool) -> Result<(Corpus, PreparedIndex)> {
    let corpus = load(&config.sources())
        .with_context(|| format!("failed to load experiments from {}", config.data.dir.display()))?;
    if corpus.is_empty() {
        info!(dir = %config.data.dir.display(), "no experiments found; run `atlas refresh` first");
    }
    let indexer = VectorIndexer::new(
        IndexCache::new(config.cache_path()),
        default_loader(config.index.use_model, config.index.model_cache_dir.clone()),
        config.tfidf(),
    );
    let prepared = indexer
        .build(&corpus, force)
        .map_err(|e| anyhow!("failed to build embedding index: {e}"))?;
    Ok((corpus, prepared))
}

fn open_engine(config: &AppConfig) -> Result<SearchEngine> {
    let (corpus, prepared) = prepare(config, false)?;
    Ok(SearchEngine::from_prepared(corpus, prepared))
}

fn refresh(config: &AppConfig, offline: bool) -> Result<()> {
    let remote = if offline {
        None
    } else {
        let client = http_client(config.download.timeout_secs)?;
        Some((
            JsonEndpointSnapshot::new(client.clone()),
            HtmlScrapeSnapshot::new(client),
        ))
    };
    let curated = CuratedSnapshot;
    let mut strategies: Vec<&dyn SnapshotStrategy> = Vec::new();
    if let Some((endpoint, scrape)) = &remote {
        strategies.push(endpoint);
        strategies.push(scrape);
    }
    strategies.push(&curated);

    for category in ExperimentCategory::ALL {
        let snapshot = best_snapshot(&strategies, category)
            .ok_or_else(|| anyhow!("no {category} experiments from any source"))?;
        let file_name = match category {
            ExperimentCategory::Baseline => &config.data.baseline_file,
            ExperimentCategory::Differential => &config.data.differential_file,
        };
        let target = config.data.dir.join(file_name);
        write_snapshot(&target, &snapshot)
            .with_context(|| format!("failed to write {}", target.display()))?;
        println!(
            "{category}: {} experiments from {} -> {}",
            snapshot.records.len(),
            snapshot.source,
            target.display()
        );
    }
    println!("Run `atlas index --force` to rebuild the embedding index.");
    Ok(())
}
