//! Error types.
//!
//! Every error here is a hard failure of the query that produced it.

use thiserror::Error;

/// Failure to parse address text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid IPv4 address: {0:?}")]
    InvalidIp(String),
    #[error("invalid prefix: {0:?}")]
    InvalidPrefix(String),
    #[error("invalid prefix length {1} in {0:?}")]
    InvalidPrefixLength(String, String),
    #[error("invalid wildcard: {0:?}")]
    InvalidWildcard(String),
}

/// Failure to compile a header-space expression into a BDD.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToBddError {
    /// The expression kind has no compilation rule in this core.
    #[error("unsupported expression: {0}")]
    UnsupportedExpression(&'static str),
    /// A named IP space is referenced but not defined.
    #[error("undefined IP space reference: {0:?}")]
    UndefinedReference(String),
    /// A named IP space (transitively) references itself.
    #[error("cyclic IP space reference: {0:?}")]
    CyclicReference(String),
}

/// Violation of a trace DAG structural invariant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TraceDagError {
    #[error("node has both a disposition and successors")]
    DispositionAndSuccessors,
    #[error("node has neither a disposition nor successors")]
    NoDispositionNorSuccessors,
    #[error("node with successful disposition {0} has no return flow")]
    MissingReturnFlow(String),
    #[error("node has a return flow but is not a successful leaf")]
    UnexpectedReturnFlow,
    #[error("node {node} has successor {successor} out of range (node count {len})")]
    SuccessorOutOfRange {
        node: usize,
        successor: usize,
        len: usize,
    },
    #[error("root {root} out of range (node count {len})")]
    RootOutOfRange { root: usize, len: usize },
    #[error("cycle through node {0}")]
    Cycle(usize),
}
