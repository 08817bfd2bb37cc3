//! Error types for the Poligras core library.
//!
//! Defines error enums exposed by the public API and convenient result
//! aliases, following the same stable-code pattern across every error kind:
//! each `*Error` enum has a matching `*ErrorCode` enum with a machine-readable
//! `as_str()` and a `code()` accessor on the error itself.

use std::fmt;

use thiserror::Error;

use crate::ids::NodeId;

/// Stable codes describing [`InputError`] variants.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum InputErrorCode {
    /// The graph or feature file could not be found on disk.
    NotFound,
    /// The file's contents did not deserialize into the expected shape.
    Malformed,
    /// Feature matrix row count did not match the graph's node count.
    DimensionMismatch,
}

impl InputErrorCode {
    /// Returns the stable machine-readable representation of this error code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "POLIGRAS_INPUT_NOT_FOUND",
            Self::Malformed => "POLIGRAS_INPUT_MALFORMED",
            Self::DimensionMismatch => "POLIGRAS_INPUT_DIMENSION_MISMATCH",
        }
    }
}

impl fmt::Display for InputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error produced while loading a graph or feature file.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum InputError {
    /// The requested file does not exist.
    #[error("input file `{path}` was not found")]
    NotFound {
        /// Path that was probed.
        path: String,
    },
    /// The file did not deserialize, or lacked a required field.
    #[error("input file `{path}` is malformed: {reason}")]
    Malformed {
        /// Path of the offending file.
        path: String,
        /// Human-readable reason the parse failed.
        reason: String,
    },
    /// The feature matrix's row count does not match the graph's node count.
    #[error("feature matrix has {rows} rows but the graph has {nodes} nodes")]
    DimensionMismatch {
        /// Row count found in the feature file.
        rows: usize,
        /// Node count found in the graph file.
        nodes: usize,
    },
}

impl InputError {
    /// Retrieves the stable [`InputErrorCode`] for this error.
    #[must_use]
    pub const fn code(&self) -> InputErrorCode {
        match self {
            Self::NotFound { .. } => InputErrorCode::NotFound,
            Self::Malformed { .. } => InputErrorCode::Malformed,
            Self::DimensionMismatch { .. } => InputErrorCode::DimensionMismatch,
        }
    }
}

/// Stable codes describing [`PoligrasError`] variants.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum PoligrasErrorCode {
    /// An edge already existed when an insertion was attempted.
    EdgeAlreadyExists,
    /// An operation referenced a supernode that is not present in the graph.
    UnknownSupernode,
    /// An internal invariant was violated; indicates a bug.
    InvariantViolation,
}

impl PoligrasErrorCode {
    /// Returns the stable machine-readable representation of this error code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EdgeAlreadyExists => "POLIGRAS_EDGE_ALREADY_EXISTS",
            Self::UnknownSupernode => "POLIGRAS_UNKNOWN_SUPERNODE",
            Self::InvariantViolation => "POLIGRAS_INVARIANT_VIOLATION",
        }
    }
}

impl fmt::Display for PoligrasErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type produced by the graph store, reward evaluator, and merge
/// engine (components C1, C4, C5).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PoligrasError {
    /// Caller attempted to insert an edge that is already present; callers
    /// must update the existing edge in place instead.
    #[error("edge ({a}, {b}) already exists")]
    EdgeAlreadyExists {
        /// First endpoint of the edge.
        a: NodeId,
        /// Second endpoint of the edge.
        b: NodeId,
    },
    /// An operation referenced a supernode id that does not exist.
    #[error("supernode {id} is not present in the graph")]
    UnknownSupernode {
        /// The missing supernode id.
        id: NodeId,
    },
    /// An internal invariant was violated; this indicates a bug rather than
    /// bad input.
    #[error("invariant violated: {invariant} ({detail})")]
    InvariantViolation {
        /// Short name of the violated invariant.
        invariant: &'static str,
        /// Additional detail describing the violation.
        detail: String,
    },
}

impl PoligrasError {
    /// Retrieves the stable [`PoligrasErrorCode`] for this error.
    #[must_use]
    pub const fn code(&self) -> PoligrasErrorCode {
        match self {
            Self::EdgeAlreadyExists { .. } => PoligrasErrorCode::EdgeAlreadyExists,
            Self::UnknownSupernode { .. } => PoligrasErrorCode::UnknownSupernode,
            Self::InvariantViolation { .. } => PoligrasErrorCode::InvariantViolation,
        }
    }
}

/// Stable codes describing [`UpdateStreamError`] variants.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum UpdateStreamErrorCode {
    /// The stream was not valid JSON, or not an array/`updates`-object.
    Malformed,
    /// An entry was missing a recognized operation field.
    MissingOperation,
    /// An entry specified an operation token that is not recognized.
    UnknownOperation,
    /// An entry was missing a source or target endpoint.
    MissingEndpoint,
    /// An entry specified a self-loop update, which dynamic updates refuse.
    SelfLoopUpdate,
    /// An entry referenced a node absent from the summary's membership map.
    UnknownNode,
}

impl UpdateStreamErrorCode {
    /// Returns the stable machine-readable representation of this error code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Malformed => "POLIGRAS_UPDATE_STREAM_MALFORMED",
            Self::MissingOperation => "POLIGRAS_UPDATE_MISSING_OPERATION",
            Self::UnknownOperation => "POLIGRAS_UPDATE_UNKNOWN_OPERATION",
            Self::MissingEndpoint => "POLIGRAS_UPDATE_MISSING_ENDPOINT",
            Self::SelfLoopUpdate => "POLIGRAS_UPDATE_SELF_LOOP",
            Self::UnknownNode => "POLIGRAS_UPDATE_UNKNOWN_NODE",
        }
    }
}

impl fmt::Display for UpdateStreamErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised while parsing or applying a dynamic update stream (C7).
///
/// Any one invalid entry fails the entire batch; there is no partial
/// application.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum UpdateStreamError {
    /// The stream was not valid JSON, or was neither an array nor an object
    /// with an `updates` field.
    #[error("update stream is malformed: {reason}")]
    Malformed {
        /// Human-readable parse failure reason.
        reason: String,
    },
    /// Entry `index` did not specify a recognized operation field.
    #[error(
        "update #{index} is missing an operation field (use 'type', 'op', 'operation', or 'action')"
    )]
    MissingOperation {
        /// Zero-based index of the offending entry.
        index: usize,
    },
    /// Entry `index` specified an operation token that is not recognized.
    #[error("update #{index} has unsupported operation '{token}'")]
    UnknownOperation {
        /// Zero-based index of the offending entry.
        index: usize,
        /// The unrecognized token.
        token: String,
    },
    /// Entry `index` was missing a `source` or `target` endpoint.
    #[error("update #{index} must specify 'source' and 'target'")]
    MissingEndpoint {
        /// Zero-based index of the offending entry.
        index: usize,
    },
    /// Entry `index` specified a self-loop, which dynamic updates refuse.
    #[error("self-loop updates are not supported in the dynamic summary model")]
    SelfLoopUpdate {
        /// Zero-based index of the offending entry.
        index: usize,
    },
    /// Entry `index` referenced a node absent from the summary's membership
    /// map.
    #[error("node '{node}' is not present in the summary membership map")]
    UnknownNode {
        /// Zero-based index of the offending entry.
        index: usize,
        /// The unknown node identifier as given in the stream.
        node: String,
    },
}

impl UpdateStreamError {
    /// Retrieves the stable [`UpdateStreamErrorCode`] for this error.
    #[must_use]
    pub const fn code(&self) -> UpdateStreamErrorCode {
        match self {
            Self::Malformed { .. } => UpdateStreamErrorCode::Malformed,
            Self::MissingOperation { .. } => UpdateStreamErrorCode::MissingOperation,
            Self::UnknownOperation { .. } => UpdateStreamErrorCode::UnknownOperation,
            Self::MissingEndpoint { .. } => UpdateStreamErrorCode::MissingEndpoint,
            Self::SelfLoopUpdate { .. } => UpdateStreamErrorCode::SelfLoopUpdate,
            Self::UnknownNode { .. } => UpdateStreamErrorCode::UnknownNode,
        }
    }
}

/// Convenient alias for results returned by the core API.
pub type Result<T> = core::result::Result<T, PoligrasError>;
