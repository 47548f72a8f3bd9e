//! One open model: its graph, its command stack and its deferred queue.
//!
//! All edits go through `ModelSession::execute`, so every change is
//! undoable and observers see it through the graph's notifications.

use crate::command::{Command, CommandError};
use crate::config::EditorConfig;
use crate::stack::{CommandStack, ListenerId, StackEvent};
use am_core::{ModelGraph, NodeId, ObserverId, SharedObserver};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Commands scheduled by observers, run once the current stack operation
/// has finished. Cloning gives another handle to the same queue.
#[derive(Clone, Default)]
pub struct Deferred {
    queue: Rc<RefCell<VecDeque<Box<dyn Command>>>>,
}

impl Deferred {
    pub fn schedule(&self, command: Box<dyn Command>) {
        log::trace!("deferred {:?}", command.label());
        self.queue.borrow_mut().push_back(command);
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    fn take_all(&self) -> Vec<Box<dyn Command>> {
        self.queue.borrow_mut().drain(..).collect()
    }

    /// Dispose and drop everything queued. Returns how many were dropped.
    fn discard(&self) -> usize {
        let dropped = self.take_all();
        let count = dropped.len();
        for mut command in dropped {
            command.dispose();
        }
        count
    }
}

impl std::fmt::Debug for Deferred {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred").field("len", &self.len()).finish()
    }
}

/// An editing session over one model.
#[derive(Debug)]
pub struct ModelSession {
    graph: ModelGraph,
    stack: CommandStack,
    deferred: Deferred,
    config: EditorConfig,
}

impl ModelSession {
    pub fn new(graph: ModelGraph, config: EditorConfig) -> Self {
        Self {
            stack: CommandStack::new(config.max_undo_depth),
            graph,
            deferred: Deferred::default(),
            config,
        }
    }

    pub fn graph(&self) -> &ModelGraph {
        &self.graph
    }

    pub fn stack(&self) -> &CommandStack {
        &self.stack
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Handle observers use to schedule follow-up commands.
    pub fn deferred(&self) -> Deferred {
        self.deferred.clone()
    }

    pub fn observe(&mut self, node: NodeId, observer: SharedObserver) -> ObserverId {
        self.graph.observe(node, observer)
    }

    pub fn observe_all(&mut self, observer: SharedObserver) -> ObserverId {
        self.graph.observe_all(observer)
    }

    pub fn unobserve(&mut self, id: ObserverId) -> bool {
        self.graph.unobserve(id)
    }

    pub fn add_stack_listener(&mut self, listener: impl FnMut(&StackEvent) + 'static) -> ListenerId {
        self.stack.add_listener(listener)
    }

    pub fn remove_stack_listener(&mut self, id: ListenerId) -> bool {
        self.stack.remove_listener(id)
    }

    /// Execute `command` through the stack, then run whatever observers
    /// deferred while it ran. Each deferred command becomes its own
    /// history entry. When `command` fails, whatever observers deferred
    /// while it ran (and rolled back) is dropped.
    pub fn execute(&mut self, command: Box<dyn Command>) -> Result<bool, CommandError> {
        match self.stack.execute(&mut self.graph, command) {
            Ok(executed) => {
                self.drain_deferred()?;
                Ok(executed)
            }
            Err(e) => {
                self.discard_deferred("failed execute");
                Err(e)
            }
        }
    }

    fn drain_deferred(&mut self) -> Result<(), CommandError> {
        for round in 1..=self.config.max_deferred_rounds {
            let batch = self.deferred.take_all();
            if batch.is_empty() {
                return Ok(());
            }
            log::debug!("draining {} deferred command(s), round {round}", batch.len());
            let mut batch = batch.into_iter();
            while let Some(command) = batch.next() {
                if let Err(e) = self.stack.execute(&mut self.graph, command) {
                    for mut rest in batch {
                        rest.dispose();
                    }
                    self.deferred.discard();
                    return Err(e);
                }
            }
        }
        let dropped = self.deferred.discard();
        if dropped > 0 {
            log::warn!(
                "dropped {dropped} deferred command(s) after {} rounds",
                self.config.max_deferred_rounds
            );
        }
        Ok(())
    }

    /// Undo replays history exactly, so anything observers defer while it
    /// runs is dropped.
    pub fn undo(&mut self) -> Result<Option<String>, CommandError> {
        let result = self.stack.undo(&mut self.graph);
        self.discard_deferred("undo");
        result
    }

    pub fn redo(&mut self) -> Result<Option<String>, CommandError> {
        let result = self.stack.redo(&mut self.graph);
        self.discard_deferred("redo");
        result
    }

    fn discard_deferred(&self, during: &str) {
        let dropped = self.deferred.discard();
        if dropped > 0 {
            log::debug!("discarded {dropped} command(s) deferred during {during}");
        }
    }

    pub fn can_undo(&self) -> bool {
        self.stack.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.stack.can_redo()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.stack.undo_label()
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.stack.redo_label()
    }

    pub fn mark_saved(&mut self) {
        self.stack.mark_saved();
    }

    pub fn is_dirty(&self) -> bool {
        self.stack.is_dirty()
    }

    /// End the session: dispose history and pending work, hand back the
    /// model.
    pub fn close(mut self) -> ModelGraph {
        self.stack.flush();
        self.deferred.discard();
        self.graph
    }
}
