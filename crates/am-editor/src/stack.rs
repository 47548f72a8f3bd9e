//! Undo/Redo command stack.
//!
//! A single linear history with a cursor: everything before the cursor is
//! applied, everything after it can be redone. Executing a new command
//! drops the redo tail. The stack also remembers which cursor position was
//! last saved, which is what the dirty flag compares against.

use crate::command::{Command, CommandError};
use am_core::ModelGraph;

/// Something that happened on a `CommandStack`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackEvent {
    Executed { label: String },
    Undone { label: String },
    Redone { label: String },
    Saved,
    Flushed,
}

/// Handle returned by `CommandStack::add_listener`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&StackEvent)>;

/// Manages one model's undo/redo history.
pub struct CommandStack {
    history: Vec<Box<dyn Command>>,
    /// Number of applied commands; `history[..cursor]` are applied.
    cursor: usize,
    /// Cursor at the last save. `None` once that state is unreachable.
    saved: Option<usize>,
    /// Maximum number of commands kept (None = unbounded).
    max_depth: Option<usize>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl CommandStack {
    pub fn new(max_depth: Option<usize>) -> Self {
        Self {
            history: Vec::new(),
            cursor: 0,
            saved: Some(0),
            max_depth,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    /// Run `command` and record it.
    ///
    /// Returns `Ok(false)` without touching anything when the command
    /// reports it cannot execute. A command whose `execute` fails is not
    /// recorded and the history (including the redo tail) is unchanged.
    pub fn execute(
        &mut self,
        graph: &mut ModelGraph,
        mut command: Box<dyn Command>,
    ) -> Result<bool, CommandError> {
        if !command.can_execute(graph) {
            log::debug!("rejected {:?}: cannot execute", command.label());
            command.dispose();
            return Ok(false);
        }

        if let Err(e) = command.execute(graph) {
            log::warn!("{:?} failed: {e}", command.label());
            command.dispose();
            return Err(e);
        }

        self.truncate_redo();
        let label = command.label().to_string();
        self.history.push(command);
        self.cursor += 1;
        self.trim_to_depth();

        log::debug!("executed {label:?} ({}/{})", self.cursor, self.history.len());
        self.emit(&StackEvent::Executed { label });
        Ok(true)
    }

    /// Undo the command before the cursor. `Ok(None)` if there is none.
    pub fn undo(&mut self, graph: &mut ModelGraph) -> Result<Option<String>, CommandError> {
        if self.cursor == 0 {
            return Ok(None);
        }
        let command = &mut self.history[self.cursor - 1];
        command.undo(graph)?;
        let label = command.label().to_string();
        self.cursor -= 1;
        log::debug!("undone {label:?}");
        self.emit(&StackEvent::Undone {
            label: label.clone(),
        });
        Ok(Some(label))
    }

    /// Redo the command at the cursor. `Ok(None)` if there is none.
    pub fn redo(&mut self, graph: &mut ModelGraph) -> Result<Option<String>, CommandError> {
        let Some(command) = self.history.get_mut(self.cursor) else {
            return Ok(None);
        };
        command.redo(graph)?;
        let label = command.label().to_string();
        self.cursor += 1;
        log::debug!("redone {label:?}");
        self.emit(&StackEvent::Redone {
            label: label.clone(),
        });
        Ok(Some(label))
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.history.len()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.cursor
            .checked_sub(1)
            .map(|i| self.history[i].label())
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.history.get(self.cursor).map(|c| c.label())
    }

    /// Record the current state as saved.
    pub fn mark_saved(&mut self) {
        self.saved = Some(self.cursor);
        self.emit(&StackEvent::Saved);
    }

    /// Whether the graph differs from the last saved state.
    pub fn is_dirty(&self) -> bool {
        self.saved != Some(self.cursor)
    }

    /// Dispose every command and reset to an empty, clean history.
    pub fn flush(&mut self) {
        for mut command in self.history.drain(..) {
            command.dispose();
        }
        self.cursor = 0;
        self.saved = Some(0);
        self.emit(&StackEvent::Flushed);
    }

    /// Number of commands in history (applied and undone).
    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    pub fn add_listener(&mut self, listener: impl FnMut(&StackEvent) + 'static) -> ListenerId {
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    fn emit(&mut self, event: &StackEvent) {
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }

    /// Drop everything after the cursor.
    fn truncate_redo(&mut self) {
        if self.cursor == self.history.len() {
            return;
        }
        for mut command in self.history.drain(self.cursor..) {
            command.dispose();
        }
        if self.saved.is_some_and(|s| s > self.cursor) {
            self.saved = None;
        }
    }

    /// Drop the oldest commands beyond `max_depth`.
    fn trim_to_depth(&mut self) {
        let Some(max) = self.max_depth else {
            return;
        };
        let excess = self.history.len().saturating_sub(max);
        if excess == 0 {
            return;
        }
        for mut command in self.history.drain(..excess) {
            log::trace!("trimmed {:?}", command.label());
            command.dispose();
        }
        self.cursor -= excess;
        self.saved = match self.saved {
            Some(s) if s >= excess => Some(s - excess),
            _ => None,
        };
    }
}

impl Default for CommandStack {
    fn default() -> Self {
        Self::new(None)
    }
}

impl std::fmt::Debug for CommandStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandStack")
            .field("history", &self.history)
            .field("cursor", &self.cursor)
            .field("saved", &self.saved)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}
