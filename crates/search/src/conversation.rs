use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use atlas_core::{find_accession, ExperimentCategory, ExperimentRecord};
use tracing::{debug, info, warn};

use crate::error::SearchResult;
use crate::ranker::{RankedExperiment, SearchEngine};

/// Number of candidates offered per query in a conversation.
pub const CONVERSATION_TOP_K: usize = 3;

const AFFIRMATIVE: [&str; 6] = ["yes", "y", "true", "ok", "是", "好"];
const NEGATIVE: [&str; 6] = ["no", "n", "skip", "false", "否", "不"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversationState {
    #[default]
    Initial,
    Selecting,
    Confirming,
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConversationState::Initial => "initial",
            ConversationState::Selecting => "selecting",
            ConversationState::Confirming => "confirming",
        };
        f.write_str(name)
    }
}

/// A user query with whatever structure has already been pulled out of it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRequest {
    pub text: String,
    pub species: Option<String>,
    pub category: Option<ExperimentCategory>,
    pub keywords: Vec<String>,
}

impl QueryRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_species(mut self, species: Option<String>) -> Self {
        self.species = species.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn with_category(mut self, category: Option<ExperimentCategory>) -> Self {
        self.category = category;
        self
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    /// Keywords to rank with; the raw text when none were extracted.
    pub fn effective_keywords(&self) -> Vec<String> {
        if self.keywords.is_empty() {
            vec![self.text.trim().to_string()]
        } else {
            self.keywords.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationSession {
    pub state: ConversationState,
    pub last_query: Option<QueryRequest>,
    pub candidates: Vec<RankedExperiment>,
    pub selection: Option<String>,
}

impl ConversationSession {
    fn clear(&mut self) {
        *self = ConversationSession::default();
    }
}

/// Work triggered once the user confirms a selection, typically fetching the
/// experiment's files. An empty map means the action failed.
pub trait FollowOnAction {
    fn fetch(&mut self, accession: &str, target_dir: &Path) -> BTreeMap<String, PathBuf>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Blank input while waiting for a query.
    AwaitingQuery,
    Candidates(Vec<RankedExperiment>),
    NoMatch { query: String },
    InvalidChoice { input: String, max: usize },
    ConfirmSelection {
        accession: String,
        record: Option<ExperimentRecord>,
    },
    ConfirmReprompt { accession: String },
    ActionCompleted {
        accession: String,
        artifacts: BTreeMap<String, PathBuf>,
    },
    ActionFailed { accession: String },
    Skipped { accession: String },
    Reset,
}

/// Drives the select-then-confirm dialogue on top of a [`SearchEngine`].
pub struct Coordinator<A> {
    session: ConversationSession,
    action: A,
    target_dir: PathBuf,
}

impl<A: FollowOnAction> Coordinator<A> {
    pub fn new(action: A, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            session: ConversationSession::default(),
            action,
            target_dir: target_dir.into(),
        }
    }

    pub fn state(&self) -> ConversationState {
        self.session.state
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    pub fn action(&self) -> &A {
        &self.action
    }

    pub fn reset(&mut self) {
        debug!(from = %self.session.state, "conversation reset");
        self.session.clear();
    }

    /// Handles one line of user input in the current state. In the initial
    /// state the line is taken as a plain-text query.
    pub fn handle_input(
        &mut self,
        engine: &mut SearchEngine,
        input: &str,
    ) -> SearchResult<TurnOutcome> {
        match self.session.state {
            ConversationState::Initial => self.submit_query(engine, QueryRequest::new(input)),
            ConversationState::Selecting => Ok(self.on_selecting(input)),
            ConversationState::Confirming => Ok(self.on_confirming(input)),
        }
    }

    /// Starts a new query. Any selection in progress is discarded.
    pub fn submit_query(
        &mut self,
        engine: &mut SearchEngine,
        request: QueryRequest,
    ) -> SearchResult<TurnOutcome> {
        self.session.clear();
        if request.text.trim().is_empty() && request.keywords.is_empty() {
            return Ok(TurnOutcome::AwaitingQuery);
        }

        if let Some(accession) = find_accession(&request.text) {
            info!(%accession, "query names an accession, skipping search");
            let record = engine.corpus().find(&accession).cloned();
            self.session.last_query = Some(request);
            self.session.selection = Some(accession.clone());
            self.transition(ConversationState::Confirming);
            return Ok(TurnOutcome::ConfirmSelection { accession, record });
        }

        let hits = engine.search_by_keywords(
            request.species.as_deref(),
            &request.effective_keywords(),
            request.category,
            CONVERSATION_TOP_K,
        )?;
        if hits.is_empty() {
            let query = request.text.clone();
            self.session.last_query = Some(request);
            return Ok(TurnOutcome::NoMatch { query });
        }
        self.session.last_query = Some(request);
        self.session.candidates = hits.clone();
        self.transition(ConversationState::Selecting);
        Ok(TurnOutcome::Candidates(hits))
    }

    fn on_selecting(&mut self, input: &str) -> TurnOutcome {
        let input = normalize_input(input);
        if matches!(input.as_str(), "back" | "new" | "cancel") {
            self.reset();
            return TurnOutcome::Reset;
        }
        let max = self.session.candidates.len();
        match input.parse::<usize>() {
            Ok(choice) if (1..=max).contains(&choice) => {
                let candidate = &self.session.candidates[choice - 1];
                let accession = candidate.record.accession.clone();
                let record = Some(candidate.record.clone());
                self.session.selection = Some(accession.clone());
                self.transition(ConversationState::Confirming);
                TurnOutcome::ConfirmSelection { accession, record }
            }
            _ => TurnOutcome::InvalidChoice { input, max },
        }
    }

    fn on_confirming(&mut self, input: &str) -> TurnOutcome {
        let input = normalize_input(input);
        let accession = self.session.selection.clone().unwrap_or_default();
        if matches!(input.as_str(), "back" | "cancel") {
            self.session.selection = None;
            if self.session.candidates.is_empty() {
                self.reset();
                return TurnOutcome::Reset;
            }
            self.transition(ConversationState::Selecting);
            return TurnOutcome::Candidates(self.session.candidates.clone());
        }
        if AFFIRMATIVE.contains(&input.as_str()) {
            let artifacts = self.action.fetch(&accession, &self.target_dir);
            self.reset();
            if artifacts.is_empty() {
                warn!(%accession, "follow-on action produced nothing");
                return TurnOutcome::ActionFailed { accession };
            }
            info!(%accession, artifacts = artifacts.len(), "follow-on action completed");
            return TurnOutcome::ActionCompleted {
                accession,
                artifacts,
            };
        }
        if NEGATIVE.contains(&input.as_str()) {
            self.reset();
            return TurnOutcome::Skipped { accession };
        }
        TurnOutcome::ConfirmReprompt { accession }
    }

    fn transition(&mut self, next: ConversationState) {
        debug!(from = %self.session.state, to = %next, "conversation transition");
        self.session.state = next;
    }
}

fn normalize_input(input: &str) -> String {
    input.trim().to_lowercase()
}

impl<A> fmt::Debug for Coordinator<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("session", &self.session)
            .field("target_dir", &self.target_dir)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_default_to_the_text() {
        let request = QueryRequest::new("  liver cancer ");
        assert_eq!(request.effective_keywords(), vec!["liver cancer"]);
        let request = request.with_keywords(vec!["liver".into()]);
        assert_eq!(request.effective_keywords(), vec!["liver"]);
    }

    #[test]
    fn blank_species_is_no_filter() {
        let request = QueryRequest::new("x").with_species(Some("  ".into()));
        assert_eq!(request.species, None);
    }

    #[test]
    fn input_words_are_case_and_space_insensitive() {
        assert_eq!(normalize_input("  YES "), "yes");
        assert!(AFFIRMATIVE.contains(&normalize_input("好").as_str()));
        assert!(NEGATIVE.contains(&normalize_input(" Skip").as_str()));
    }
}
