//! Error types for treemerge.

use thiserror::Error;

use crate::scenario::MergeType;

/// Result type alias for treemerge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during parsing, matching, or merging.
#[derive(Error, Debug)]
pub enum Error {
    /// Source file could not be parsed.
    #[error("parse error at line {line}: {message}")]
    Parse {
        /// One-based line of the offending token.
        line: usize,
        /// What the parser expected or found.
        message: String,
    },

    /// A rebuilt node violates its grammar arity, or a conflict node lost
    /// both alternatives. Signals a bug in the engine or the grammar
    /// implementation.
    #[error("tree reconstruction failed at node {id}: {message}")]
    Reconstruction {
        /// `revision:number` id of the offending artifact.
        id: String,
        /// Details of the violated invariant.
        message: String,
    },

    /// The selected strategy cannot serve this scenario type.
    #[error("{strategy} strategy does not support {mtype} scenarios")]
    UnsupportedMergeType {
        /// Name of the strategy that rejected the scenario.
        strategy: &'static str,
        /// The offending scenario type.
        mtype: MergeType,
    },

    /// The external line-based merge failed for a subtree.
    #[error("line-based merge failed: {0}")]
    External(String),

    /// The merge was cancelled through the context's cancellation token.
    /// The target tree is in an unspecified state and must be discarded.
    #[error("merge cancelled")]
    Cancelled,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
