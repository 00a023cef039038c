//! Error types for locator resolution
//!
//! Every variant is a programmer error: a malformed description at a call site.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LocatorError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocatorError {
    #[error("Empty {0} locator")]
    Empty(&'static str),

    #[error("Identifier must not contain whitespace: {0:?}")]
    WhitespaceInIdentifier(String),

    #[error("Malformed structural expression: {0:?}")]
    MalformedExpression(String),

    #[error("Unknown locator kind {kind:?} in {input:?}")]
    UnknownKind { kind: String, input: String },
}
