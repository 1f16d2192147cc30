use thiserror::Error;

#[derive(Error, Debug)]
pub enum AtlasError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("unknown experiment category: {0}")]
    UnknownCategory(String),
    #[error("invalid vectorizer config: {0}")]
    InvalidVectorizer(&'static str),
    #[error("other: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, AtlasError>;
