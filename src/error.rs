//! Error taxonomy for the dictionary-encoded column format.
//!
//! Covers malformed bytes (`CorruptFormat`), accessor misuse
//! (`InvalidArity`), impossible construction states (`ProgrammerError`), and
//! failures bubbling up from an external bitmap/R-tree implementation
//! (`CollaboratorFailure`). There is no retry path anywhere in this crate; a
//! buffer is either valid or it is not.

/// The single error type returned by every fallible operation in this crate.
#[derive(Debug, thiserror::Error)]
pub enum ColumnError {
    /// Truncated buffer, an illegal width, non-monotonic offsets, or a
    /// count that disagrees with the bytes actually present.
    #[error("corrupt column format: {0}")]
    CorruptFormat(String),

    /// A single-valued accessor was used on a multi-valued column, or vice
    /// versa.
    #[error("invalid arity: {0}")]
    InvalidArity(&'static str),

    /// The codec was asked to do something its construction forbids, e.g.
    /// `write` on a descriptor-only spec, or building with both (or
    /// neither) of single/multi id storage present.
    #[error("programmer error: {0}")]
    ProgrammerError(&'static str),

    /// The bitmap factory or R-tree strategy rejected the bytes handed to
    /// it. The faulting component is named so callers can tell a corrupt
    /// dictionary from a corrupt bitmap payload.
    #[error("collaborator `{component}` rejected its payload: {source}")]
    CollaboratorFailure {
        component: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ColumnError {
    pub fn corrupt(msg: impl Into<String>) -> Self {
        ColumnError::CorruptFormat(msg.into())
    }

    pub fn collaborator(
        component: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ColumnError::CollaboratorFailure {
            component,
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, ColumnError>;
