//! Error types for the retrieval core.
//!
//! Leaf crates keep their own error enums; they convert into [`Error`] at
//! the component boundary.

use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The store could not be reached; fatal for the current operation.
    #[error("Store unreachable: {0}")]
    StoreConnection(String),

    #[error("Collection already exists: {0}")]
    CollectionExists(String),

    /// Some documents could not be indexed; the rest were committed.
    #[error("{} document(s) failed to index: {}", failed.len(), failed.join(", "))]
    PartialIndex { failed: Vec<String> },

    #[error("Query error: {0}")]
    Query(String),

    #[error("Deadline of {0:?} exceeded")]
    Timeout(Duration),

    /// Store rejected a request for a reason other than connectivity.
    #[error("Vector store error: {0}")]
    Store(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::StoreConnection(_))
    }
}

impl From<lateness_store::Error> for Error {
    fn from(e: lateness_store::Error) -> Self {
        match e {
            lateness_store::Error::Connection(msg) => Error::StoreConnection(msg),
            lateness_store::Error::CollectionExists(name) => Error::CollectionExists(name),
            other => Error::Store(other.to_string()),
        }
    }
}

impl From<lateness_embeddings::Error> for Error {
    fn from(e: lateness_embeddings::Error) -> Self {
        Error::Encoding(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_by_kind() {
        let err: Error = lateness_store::Error::Connection("refused".into()).into();
        assert!(err.is_connection());

        let err: Error = lateness_store::Error::CollectionExists("docs".into()).into();
        assert!(matches!(err, Error::CollectionExists(name) if name == "docs"));

        let err: Error = lateness_store::Error::InvalidRequest("bad dim".into()).into();
        assert!(matches!(err, Error::Store(_)));
    }

    #[test]
    fn test_partial_index_message_lists_ids() {
        let err = Error::PartialIndex {
            failed: vec!["doc_3".into(), "doc_9".into()],
        };
        assert_eq!(err.to_string(), "2 document(s) failed to index: doc_3, doc_9");
    }
}
