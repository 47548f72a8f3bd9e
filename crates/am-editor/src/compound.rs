//! Ordered groups of commands that execute and undo as one step.

use crate::command::{Command, CommandError};
use am_core::ModelGraph;

/// A sequence of commands treated as one history entry.
///
/// Children execute in insertion order and undo in reverse. A child that
/// fails rolls back the ones already applied, leaving the graph as it was.
pub struct CompoundCommand {
    label: String,
    children: Vec<Box<dyn Command>>,
    /// Indices of the children that actually ran, in execution order.
    ran: Vec<usize>,
}

impl CompoundCommand {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            children: Vec::new(),
            ran: Vec::new(),
        }
    }

    pub fn add(&mut self, command: Box<dyn Command>) {
        self.children.push(command);
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Drop (and dispose) children that cannot execute against `graph`.
    /// Returns how many were dropped.
    pub fn prune(&mut self, graph: &ModelGraph) -> usize {
        let before = self.children.len();
        self.children.retain_mut(|child| {
            let keep = child.can_execute(graph);
            if !keep {
                log::debug!("{}: dropping {:?}", self.label, child.label());
                child.dispose();
            }
            keep
        });
        before - self.children.len()
    }

    /// Prune, then unwrap: nothing left gives `None`, a single child is
    /// returned on its own (keeping its label), otherwise the compound.
    pub fn finish(mut self, graph: &ModelGraph) -> Option<Box<dyn Command>> {
        self.prune(graph);
        match self.children.len() {
            0 => None,
            1 => self.children.pop(),
            _ => Some(Box::new(self)),
        }
    }

    /// Undo the children in `ran` in reverse, logging (not returning)
    /// failures. Used to back out of a failed execute or redo.
    fn roll_back(&mut self, graph: &mut ModelGraph) {
        for index in self.ran.drain(..).rev() {
            if let Err(e) = self.children[index].undo(graph) {
                log::warn!("{}: rollback of {:?} failed: {e}", self.label, self.children[index].label());
            }
        }
    }
}

impl Command for CompoundCommand {
    fn label(&self) -> &str {
        &self.label
    }

    fn can_execute(&self, graph: &ModelGraph) -> bool {
        self.children.iter().any(|child| child.can_execute(graph))
    }

    fn execute(&mut self, graph: &mut ModelGraph) -> Result<(), CommandError> {
        self.ran.clear();
        for index in 0..self.children.len() {
            // Earlier children may have changed what later ones can do.
            if !self.children[index].can_execute(graph) {
                continue;
            }
            if let Err(e) = self.children[index].execute(graph) {
                self.roll_back(graph);
                return Err(e);
            }
            self.ran.push(index);
        }
        Ok(())
    }

    fn undo(&mut self, graph: &mut ModelGraph) -> Result<(), CommandError> {
        for &index in self.ran.iter().rev() {
            self.children[index].undo(graph)?;
        }
        Ok(())
    }

    /// On failure the children redone so far are undone again and the
    /// compound stays redoable.
    fn redo(&mut self, graph: &mut ModelGraph) -> Result<(), CommandError> {
        let planned = std::mem::take(&mut self.ran);
        for &index in &planned {
            if let Err(e) = self.children[index].redo(graph) {
                self.roll_back(graph);
                self.ran = planned;
                return Err(e);
            }
            self.ran.push(index);
        }
        Ok(())
    }

    fn dispose(&mut self) {
        for child in &mut self.children {
            child.dispose();
        }
        self.ran.clear();
    }
}

impl std::fmt::Debug for CompoundCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompoundCommand")
            .field("label", &self.label)
            .field("children", &self.children)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::SetFeatureCommand;
    use am_core::{ElementType, FolderType, ModelNode, NodeId, NodeKind};
    use std::cell::Cell;
    use std::rc::Rc;

    fn graph_with(ids: &[&str]) -> ModelGraph {
        let mut graph = ModelGraph::with_default_folders("Compound");
        let business = graph.folder_of_type(FolderType::Business).unwrap();
        for id in ids {
            graph
                .add_child(
                    business,
                    ModelNode::named(
                        NodeId::intern(id),
                        NodeKind::Element {
                            element_type: ElementType::BusinessActor,
                        },
                        *id,
                    ),
                    None,
                )
                .unwrap();
        }
        graph
    }

    /// Always fails on execute.
    struct Broken;

    impl Command for Broken {
        fn label(&self) -> &str {
            "Broken"
        }
        fn execute(&mut self, _graph: &mut ModelGraph) -> Result<(), CommandError> {
            Err(CommandError::failed("Broken", "on purpose"))
        }
        fn undo(&mut self, _graph: &mut ModelGraph) -> Result<(), CommandError> {
            Ok(())
        }
    }

    #[test]
    fn finish_unwraps() {
        let graph = graph_with(&["cc_a"]);
        let a = NodeId::intern("cc_a");

        let empty = CompoundCommand::new("Nothing");
        assert!(empty.finish(&graph).is_none());

        let mut all_noop = CompoundCommand::new("Same");
        all_noop.add(Box::new(SetFeatureCommand::rename(a, "cc_a")));
        assert!(!all_noop.can_execute(&graph));
        assert!(all_noop.finish(&graph).is_none());

        let mut single = CompoundCommand::new("Outer");
        single.add(Box::new(SetFeatureCommand::rename(a, "cc_a")));
        single.add(Box::new(SetFeatureCommand::rename(a, "Renamed")));
        let cmd = single.finish(&graph).unwrap();
        assert_eq!(cmd.label(), "Rename");

        let mut many = CompoundCommand::new("Outer");
        many.add(Box::new(SetFeatureCommand::rename(a, "X")));
        many.add(Box::new(SetFeatureCommand::set_documentation(a, "doc")));
        assert_eq!(many.finish(&graph).unwrap().label(), "Outer");
    }

    #[test]
    fn failure_rolls_back_executed_children() {
        let mut graph = graph_with(&["cf_a"]);
        let a = NodeId::intern("cf_a");
        let mut compound = CompoundCommand::new("Mixed");
        compound.add(Box::new(SetFeatureCommand::rename(a, "Changed")));
        compound.add(Box::new(Broken));
        assert!(compound.execute(&mut graph).is_err());
        assert_eq!(graph.get(a).unwrap().name, "cf_a");
    }

    /// Refuses its first redo, then behaves.
    struct FailsFirstRedo {
        inner: SetFeatureCommand,
        refused: bool,
    }

    impl Command for FailsFirstRedo {
        fn label(&self) -> &str {
            "Flaky"
        }
        fn execute(&mut self, graph: &mut ModelGraph) -> Result<(), CommandError> {
            self.inner.execute(graph)
        }
        fn undo(&mut self, graph: &mut ModelGraph) -> Result<(), CommandError> {
            self.inner.undo(graph)
        }
        fn redo(&mut self, graph: &mut ModelGraph) -> Result<(), CommandError> {
            if !self.refused {
                self.refused = true;
                return Err(CommandError::failed("Flaky", "not yet"));
            }
            self.inner.redo(graph)
        }
    }

    #[test]
    fn failed_redo_can_be_retried() {
        let mut graph = graph_with(&["cy_a"]);
        let a = NodeId::intern("cy_a");
        let mut compound = CompoundCommand::new("Pair");
        compound.add(Box::new(SetFeatureCommand::rename(a, "Renamed")));
        compound.add(Box::new(FailsFirstRedo {
            inner: SetFeatureCommand::set_documentation(a, "doc"),
            refused: false,
        }));
        compound.execute(&mut graph).unwrap();
        compound.undo(&mut graph).unwrap();

        assert!(compound.redo(&mut graph).is_err());
        let node = graph.get(a).unwrap();
        assert_eq!((node.name.as_str(), node.documentation.as_str()), ("cy_a", ""));

        compound.redo(&mut graph).unwrap();
        let node = graph.get(a).unwrap();
        assert_eq!((node.name.as_str(), node.documentation.as_str()), ("Renamed", "doc"));

        compound.undo(&mut graph).unwrap();
        let node = graph.get(a).unwrap();
        assert_eq!((node.name.as_str(), node.documentation.as_str()), ("cy_a", ""));
    }

    /// Counts `dispose` calls; can be told whether it is executable.
    struct Counted {
        runnable: bool,
        disposed: Rc<Cell<usize>>,
    }

    impl Command for Counted {
        fn label(&self) -> &str {
            "Counted"
        }
        fn can_execute(&self, _graph: &ModelGraph) -> bool {
            self.runnable
        }
        fn execute(&mut self, _graph: &mut ModelGraph) -> Result<(), CommandError> {
            Ok(())
        }
        fn undo(&mut self, _graph: &mut ModelGraph) -> Result<(), CommandError> {
            Ok(())
        }
        fn dispose(&mut self) {
            self.disposed.set(self.disposed.get() + 1);
        }
    }

    #[test]
    fn prune_disposes_dropped_children() {
        let graph = graph_with(&[]);
        let disposed = Rc::new(Cell::new(0));
        let mut compound = CompoundCommand::new("Some");
        for runnable in [false, true, false] {
            compound.add(Box::new(Counted {
                runnable,
                disposed: disposed.clone(),
            }));
        }
        assert_eq!(compound.prune(&graph), 2);
        assert_eq!(compound.len(), 1);
        assert_eq!(disposed.get(), 2);

        compound.dispose();
        assert_eq!(disposed.get(), 3);
    }

    #[test]
    fn undo_runs_in_reverse() {
        let mut graph = graph_with(&["cr_a"]);
        let a = NodeId::intern("cr_a");
        let mut compound = CompoundCommand::new("Twice");
        compound.add(Box::new(SetFeatureCommand::rename(a, "first")));
        compound.add(Box::new(SetFeatureCommand::rename(a, "second")));
        compound.execute(&mut graph).unwrap();
        assert_eq!(graph.get(a).unwrap().name, "second");
        compound.undo(&mut graph).unwrap();
        assert_eq!(graph.get(a).unwrap().name, "cr_a");
        compound.redo(&mut graph).unwrap();
        assert_eq!(graph.get(a).unwrap().name, "second");
    }
}
