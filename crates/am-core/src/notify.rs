//! Change notifications and the observer registry.
//!
//! `ModelGraph` emits exactly one `Notification` per elementary mutation,
//! synchronously and before the mutating call returns. Node observers see
//! changes whose `source` is the node they are attached to; model-wide
//! observers see every change. Node observers run first, each group in
//! registration order.

use crate::id::NodeId;
use crate::model::{Feature, FeatureValue, ModelGraph};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Coarse classification of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Add,
    Remove,
    Set,
    Move,
}

/// What happened to the notifying node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// A feature value was replaced.
    Set {
        feature: Feature,
        old: FeatureValue,
        new: FeatureValue,
    },
    /// `child` was inserted at `position`.
    Add { child: NodeId, position: usize },
    /// `child` was removed from `position`.
    Remove { child: NodeId, position: usize },
    /// `child` moved from `from` to `to`.
    Move {
        child: NodeId,
        from: usize,
        to: usize,
    },
}

/// A single change, reported on the node that changed. Structural changes
/// are reported on the parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub source: NodeId,
    pub change: Change,
}

impl Notification {
    pub fn kind(&self) -> ChangeKind {
        match self.change {
            Change::Set { .. } => ChangeKind::Set,
            Change::Add { .. } => ChangeKind::Add,
            Change::Remove { .. } => ChangeKind::Remove,
            Change::Move { .. } => ChangeKind::Move,
        }
    }

    /// The feature that changed; `Feature::Children` for structural changes.
    pub fn feature(&self) -> Feature {
        match &self.change {
            Change::Set { feature, .. } => *feature,
            _ => Feature::Children,
        }
    }

    /// The child involved in a structural change.
    pub fn child(&self) -> Option<NodeId> {
        match &self.change {
            Change::Add { child, .. } | Change::Remove { child, .. } | Change::Move { child, .. } => {
                Some(*child)
            }
            Change::Set { .. } => None,
        }
    }
}

/// Receives model changes.
///
/// Every method has a no-op default, so an observer only implements the
/// changes it cares about. `graph` is the model *after* the change;
/// observers read from it but cannot mutate it. Follow-up edits must be
/// scheduled as deferred commands instead.
pub trait Observer {
    fn attribute_set(
        &mut self,
        _graph: &ModelGraph,
        _node: NodeId,
        _feature: Feature,
        _old: &FeatureValue,
        _new: &FeatureValue,
    ) {
    }

    fn child_added(&mut self, _graph: &ModelGraph, _parent: NodeId, _child: NodeId, _position: usize) {}

    fn child_removed(
        &mut self,
        _graph: &ModelGraph,
        _parent: NodeId,
        _child: NodeId,
        _position: usize,
    ) {
    }

    fn child_moved(
        &mut self,
        _graph: &ModelGraph,
        _parent: NodeId,
        _child: NodeId,
        _from: usize,
        _to: usize,
    ) {
    }

    /// Dispatch to the per-kind method.
    fn notify(&mut self, graph: &ModelGraph, notification: &Notification) {
        let source = notification.source;
        match &notification.change {
            Change::Set { feature, old, new } => self.attribute_set(graph, source, *feature, old, new),
            Change::Add { child, position } => self.child_added(graph, source, *child, *position),
            Change::Remove { child, position } => {
                self.child_removed(graph, source, *child, *position);
            }
            Change::Move { child, from, to } => self.child_moved(graph, source, *child, *from, *to),
        }
    }
}

/// Observers are shared between the registry and whoever reads their state.
pub type SharedObserver = Rc<RefCell<dyn Observer>>;

/// Handle returned on registration, used to detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Registry of observers, owned by `ModelGraph`.
#[derive(Default)]
pub struct ChangeHub {
    next_id: u64,
    by_node: HashMap<NodeId, Vec<(ObserverId, SharedObserver)>>,
    global: Vec<(ObserverId, SharedObserver)>,
}

impl ChangeHub {
    fn next(&mut self) -> ObserverId {
        self.next_id += 1;
        ObserverId(self.next_id)
    }

    pub fn observe(&mut self, node: NodeId, observer: SharedObserver) -> ObserverId {
        let id = self.next();
        self.by_node.entry(node).or_default().push((id, observer));
        id
    }

    pub fn observe_all(&mut self, observer: SharedObserver) -> ObserverId {
        let id = self.next();
        self.global.push((id, observer));
        id
    }

    pub fn unobserve(&mut self, id: ObserverId) -> bool {
        if let Some(pos) = self.global.iter().position(|(oid, _)| *oid == id) {
            self.global.remove(pos);
            return true;
        }
        let mut found = false;
        self.by_node.retain(|_, list| {
            if let Some(pos) = list.iter().position(|(oid, _)| *oid == id) {
                list.remove(pos);
                found = true;
            }
            !list.is_empty()
        });
        found
    }

    /// Total number of registered observers.
    pub fn len(&self) -> usize {
        self.global.len() + self.by_node.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn dispatch(&self, graph: &ModelGraph, notification: &Notification) {
        let node_observers = self
            .by_node
            .get(&notification.source)
            .map_or(&[][..], Vec::as_slice);
        for (id, observer) in node_observers.iter().chain(self.global.iter()) {
            match observer.try_borrow_mut() {
                Ok(mut observer) => observer.notify(graph, notification),
                Err(_) => log::warn!("observer {id:?} is busy, dropped {notification:?}"),
            }
        }
    }
}

/// An observer that records every notification it receives.
#[derive(Debug, Default)]
pub struct ChangeLog {
    pub entries: Vec<Notification>,
}

impl ChangeLog {
    pub fn shared() -> Rc<RefCell<ChangeLog>> {
        Rc::new(RefCell::new(ChangeLog::default()))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn kinds(&self) -> Vec<ChangeKind> {
        self.entries.iter().map(Notification::kind).collect()
    }
}

impl Observer for ChangeLog {
    fn notify(&mut self, _graph: &ModelGraph, notification: &Notification) {
        self.entries.push(notification.clone());
    }
}
