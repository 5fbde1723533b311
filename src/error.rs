use thiserror::Error;

/// Error taxonomy for the placement core. Each variant maps onto the
/// status code the HTTP layer in front of this crate is expected to
/// return; see [`Error::status`].
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed required input, rejected before any write.
    #[error("{0}")]
    Validation(String),

    /// No matching document.
    #[error("{0}")]
    NotFound(String),

    /// Underlying read/write failure in the document store.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// A stored document does not decode into its schema.
    #[error("malformed document: {0}")]
    Document(#[from] serde_json::Error),

    /// A multi-write event failed after an earlier write had already
    /// committed. The sibling records are now skewed; nothing rolls the
    /// earlier write back.
    #[error("{event}: write failed after {committed} had committed")]
    PartialPropagation {
        event: &'static str,
        committed: &'static str,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Status code this error corresponds to on the wire.
    pub fn status(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::NotFound(_) => 404,
            Error::Store(_) | Error::Document(_) | Error::PartialPropagation { .. } => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
