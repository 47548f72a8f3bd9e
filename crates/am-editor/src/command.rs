//! The reversible `Command` abstraction.
//!
//! A command captures the node ids it touches and whatever prior state it
//! needs to reverse itself (old value, old position, removed subtree).
//! Commands are executed, undone and redone only through a `CommandStack`,
//! which guarantees they run in history order.

use am_core::{ModelError, ModelGraph};

/// Errors raised while executing, undoing or redoing a command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("{label}: {reason}")]
    Failed { label: String, reason: String },

    #[error("{0}: undo before execute")]
    NotExecuted(String),
}

impl CommandError {
    pub fn failed(label: &str, reason: impl Into<String>) -> Self {
        CommandError::Failed {
            label: label.to_string(),
            reason: reason.into(),
        }
    }
}

/// A reversible edit of a `ModelGraph`.
///
/// `undo` must leave the graph observably identical to the state before
/// `execute`, emitting equivalent notifications on the way. `redo` must
/// reproduce the state after `execute`, including any ids generated then.
pub trait Command {
    /// User-visible name, e.g. "Rename" or "New Business Actor".
    fn label(&self) -> &str;

    /// Whether the command would do anything against the current graph.
    /// The stack re-checks this immediately before executing.
    fn can_execute(&self, _graph: &ModelGraph) -> bool {
        true
    }

    fn execute(&mut self, graph: &mut ModelGraph) -> Result<(), CommandError>;

    fn undo(&mut self, graph: &mut ModelGraph) -> Result<(), CommandError>;

    fn redo(&mut self, graph: &mut ModelGraph) -> Result<(), CommandError> {
        self.execute(graph)
    }

    /// Release captured state. Called once when the command leaves history.
    fn dispose(&mut self) {}
}

impl std::fmt::Debug for dyn Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Command({:?})", self.label())
    }
}
