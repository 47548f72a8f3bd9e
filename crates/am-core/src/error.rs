use crate::id::NodeId;
use crate::model::Feature;

/// Errors raised by `ModelGraph` mutations and snapshot decoding.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("node {0} already exists in the model")]
    DuplicateId(NodeId),

    #[error("position {position} out of range for {parent} ({len} children)")]
    InvalidPosition {
        parent: NodeId,
        position: usize,
        len: usize,
    },

    #[error("{0} cannot own children")]
    NotAContainer(NodeId),

    #[error("{node} has no {feature:?} feature")]
    FeatureMismatch { node: NodeId, feature: Feature },

    #[error("the model root cannot be removed")]
    RootImmutable,

    #[error("snapshot encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("snapshot decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// A syntax error in the outline format, with a 1-based location.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{line}:{column}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseError {
    /// Build an error located where `rest` begins inside `source`.
    pub(crate) fn at(source: &str, rest: &str, message: impl Into<String>) -> Self {
        let offset = source.len().saturating_sub(rest.len());
        let consumed = &source[..offset];
        let line = consumed.matches('\n').count() + 1;
        let column = match consumed.rfind('\n') {
            Some(nl) => consumed[nl + 1..].chars().count() + 1,
            None => consumed.chars().count() + 1,
        };
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}
