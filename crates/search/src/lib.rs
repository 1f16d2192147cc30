pub mod conversation;
pub mod embedding;
pub mod error;
pub mod index;
pub mod ranker;

pub use conversation::{
    ConversationSession, ConversationState, Coordinator, FollowOnAction, QueryRequest,
    TurnOutcome, CONVERSATION_TOP_K,
};
#[cfg(feature = "semantic")]
pub use embedding::FastEmbedLoader;
pub use embedding::{
    default_loader, EmbeddingMethod, ModelLoader, QueryEncoder, SemanticEncoder, UnavailableModel,
};
pub use error::{SearchError, SearchResult};
pub use index::{EmbeddingIndex, IndexCache, PreparedIndex, VectorIndexer};
pub use ranker::{cosine_similarity, RankedExperiment, SearchEngine, SearchFilters};
