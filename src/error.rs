//! Error types surfaced by the resolution engine.
//!
//! Validation errors (`MalformedRequest`, `UnknownField`, `InvalidCursor`)
//! are argument-level and returned before any repository call. Registry
//! construction errors (`DuplicateResource`, `RelationshipResourceNotFound`)
//! fail at boot, never mid-request. `Repository` wraps opaque failures
//! bubbled up from a storage collaborator; a failed batch read propagates to
//! every parent row depending on that batch without aborting sibling
//! batches.

use thiserror::Error;

/// Errors produced by the engine.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Conflicting or unparsable pagination/filter input.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Sort/filter field not in the schema's resolvable set.
    #[error("unknown field `{0}`")]
    UnknownField(String),

    /// A declared relationship points at a resource that is not registered.
    #[error("relationship `{relationship}` targets unknown resource `{resource}`")]
    RelationshipResourceNotFound {
        relationship: String,
        resource: String,
    },

    /// Two resources were registered under the same identifier.
    #[error("duplicate resource identifier `{0}`")]
    DuplicateResource(String),

    /// A registry lookup for an identifier that does not exist.
    #[error("resource `{0}` does not exist")]
    ResourceNotFound(String),

    /// An opaque cursor could not be decoded.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// Opaque failure reported by the storage collaborator.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl Error {
    /// Shorthand for a [`Error::MalformedRequest`] with a formatted message.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRequest(message.into())
    }
}

/// Failure reported by a repository read.
///
/// The engine treats the message as opaque; it is surfaced verbatim to the
/// caller for every parent row that depended on the failed batch.
#[derive(Debug, Clone, Error)]
#[error("repository error: {message}")]
pub struct RepositoryError {
    message: String,
}

impl RepositoryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
