use atlas_core::AtlasError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error(transparent)]
    Core(#[from] AtlasError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("index cache codec error: {0}")]
    Cache(#[from] bincode::Error),
    #[error("embedding model error: {0}")]
    Model(String),
}

pub type SearchResult<T> = std::result::Result<T, SearchError>;
