use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid user name: {0:?}")]
    InvalidName(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("{0} is not supported by this session")]
    Unsupported(&'static str),

    #[error("peer session is closed")]
    SessionClosed,

    #[error("no remote offer is waiting for an answer")]
    NoPendingOffer,

    #[error("no provisional answer to confirm")]
    NotProvisional,

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("transport error: {0:#}")]
    Transport(#[from] anyhow::Error),
}

/// Room-creation failure, already reduced to one human-readable line: the
/// server's structured error if it sent one, else the HTTP status text, else
/// the underlying I/O message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DirectoryError(pub String);

pub type Result<T, E = Error> = std::result::Result<T, E>;
