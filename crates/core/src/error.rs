use thiserror::Error;

/// Core domain errors
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid repository name: {name:?}")]
    InvalidRepository { name: String },
}

/// Failures reported by an event source
///
/// All of these are recovered by the update layer and degrade to
/// "no new events".
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Repository not found")]
    NotFound,

    #[error("Event source rejected the credentials")]
    Unauthorized,

    #[error("Event source rate limit exceeded")]
    RateLimited,

    #[error("Event source answered with status {0}")]
    Status(u16),

    #[error("Event source unreachable: {0}")]
    Transport(String),

    #[error("Malformed event source response: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
