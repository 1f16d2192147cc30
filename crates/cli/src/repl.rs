use anyhow::{Context, Result};
use atlas_core::ExperimentCategory;
use atlas_search::{
    ConversationState, Coordinator, FollowOnAction, QueryRequest, SearchEngine, TurnOutcome,
};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::error;

use crate::render;

#[derive(Debug, Default)]
struct ChatFilters {
    species: Option<String>,
    category: Option<ExperimentCategory>,
}

fn print_help() {
    println!("Commands:");
    println!("  <query>               - Describe the experiments you are looking for");
    println!("  <N>                   - Pick candidate N");
    println!("  yes / no              - Confirm or skip downloading the selection");
    println!("  back                  - Go back one step");
    println!("  /species NAME|clear   - Restrict searches to a species");
    println!("  /category baseline|differential|clear");
    println!("  /popular              - Show well-known experiments");
    println!("  /help                 - Show this help");
    println!("  quit, Ctrl+D or Ctrl+C - Exit");
}

fn prompt(state: ConversationState) -> &'static str {
    match state {
        ConversationState::Initial => "atlas> ",
        ConversationState::Selecting => "choose> ",
        ConversationState::Confirming => "download? [y/n]> ",
    }
}

pub fn run_chat<A: FollowOnAction>(
    engine: &mut SearchEngine,
    coordinator: &mut Coordinator<A>,
) -> Result<()> {
    println!(
        "Expression Atlas finder: {} experiments indexed ({})",
        engine.corpus().len(),
        engine.method()
    );
    print_help();
    println!();

    let mut rl = DefaultEditor::new().with_context(|| "failed to create readline editor")?;
    let mut filters = ChatFilters::default();

    loop {
        match rl.readline(prompt(coordinator.state())) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line).ok();
                if matches!(line, "quit" | "exit") {
                    break;
                }
                if line.starts_with('/') {
                    handle_command(line, &mut filters);
                    continue;
                }

                let outcome = if coordinator.state() == ConversationState::Initial {
                    let request = QueryRequest::new(line)
                        .with_species(filters.species.clone())
                        .with_category(filters.category);
                    coordinator.submit_query(engine, request)
                } else {
                    coordinator.handle_input(engine, line)
                };
                match outcome {
                    Ok(outcome) => show(&outcome, filters.category),
                    Err(err) => eprintln!("Search failed: {err}"),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                error!("error reading input: {}", err);
                break;
            }
        }
    }
    println!("Goodbye!");
    Ok(())
}

fn handle_command(line: &str, filters: &mut ChatFilters) {
    let (command, arg) = match line.split_once(char::is_whitespace) {
        Some((command, arg)) => (command, arg.trim()),
        None => (line, ""),
    };
    match command {
        "/help" => print_help(),
        "/popular" => render::print_popular(filters.category),
        "/species" => match arg {
            "" => eprintln!("Usage: /species NAME  or  /species clear"),
            "clear" => {
                filters.species = None;
                println!("Cleared species filter");
            }
            name => {
                filters.species = Some(name.to_string());
                println!("Species filter: {name}");
            }
        },
        "/category" => match arg {
            "clear" => {
                filters.category = None;
                println!("Cleared category filter");
            }
            value => match ExperimentCategory::parse(value) {
                Some(category) => {
                    filters.category = Some(category);
                    println!("Category filter: {category}");
                }
                None => eprintln!("Usage: /category baseline|differential|clear"),
            },
        },
        other => eprintln!("Unknown command: {other}. Type /help for available commands."),
    }
}

fn show(outcome: &TurnOutcome, category: Option<ExperimentCategory>) {
    match outcome {
        TurnOutcome::AwaitingQuery => {}
        TurnOutcome::Candidates(hits) => {
            render::print_ranked(hits);
            println!("Pick a number, or 'back' for a new search.");
        }
        TurnOutcome::NoMatch { query } => {
            println!("No experiments matched '{query}'.");
            render::print_popular(category);
        }
        TurnOutcome::InvalidChoice { input, max } => {
            println!("'{input}' is not a valid choice; enter 1-{max} or 'back'.");
        }
        TurnOutcome::ConfirmSelection { accession, record } => {
            match record {
                Some(record) => render::print_record(record),
                None => println!("{accession} (not in the local index)"),
            }
            println!("Download the data files for {accession}? [y/n]");
        }
        TurnOutcome::ConfirmReprompt { accession } => {
            println!("Please answer yes or no for {accession} (or 'back').");
        }
        TurnOutcome::ActionCompleted {
            accession,
            artifacts,
        } => {
            println!("Downloaded {} files for {accession}:", artifacts.len());
            render::print_artifacts(artifacts);
        }
        TurnOutcome::ActionFailed { accession } => {
            println!(
                "Could not download files for {accession}; browse {}",
                crate::remote::mirror_dir(accession)
            );
        }
        TurnOutcome::Skipped { accession } => println!("Skipped {accession}."),
        TurnOutcome::Reset => println!("Starting over. What are you looking for?"),
    }
}
