//! Headless presentation observers.
//!
//! Each presenter caches what a real view would display and updates that
//! cache only from notifications, never by re-reading the whole model. This
//! is what lets tests check that change propagation alone keeps the views
//! correct across execute, undo and redo.

use crate::session::ModelSession;
use am_core::{
    Bounds, Color, Feature, FeatureValue, ModelGraph, NodeId, NodeKind, Observer, ObserverId,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

// ─── Model tree ──────────────────────────────────────────────────────────

/// The model tree view: one label per node and the ordered children of
/// every container. Listens to the whole model.
#[derive(Debug, Default)]
pub struct TreePresenter {
    labels: HashMap<NodeId, String>,
    children: HashMap<NodeId, Vec<NodeId>>,
    updates: usize,
    observer: Option<ObserverId>,
}

impl TreePresenter {
    /// Build the tree from `graph` as it is now.
    pub fn new(graph: &ModelGraph) -> Self {
        let mut tree = Self::default();
        tree.load(graph, graph.root_id());
        tree
    }

    /// Build the tree and register it on the whole model.
    pub fn attach(session: &mut ModelSession) -> Rc<RefCell<TreePresenter>> {
        let tree = Rc::new(RefCell::new(Self::new(session.graph())));
        let id = session.observe_all(tree.clone());
        tree.borrow_mut().observer = Some(id);
        tree
    }

    pub fn detach(&mut self, session: &mut ModelSession) -> bool {
        self.observer
            .take()
            .is_some_and(|id| session.unobserve(id))
    }

    pub fn label(&self, id: NodeId) -> Option<&str> {
        self.labels.get(&id).map(String::as_str)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children.get(&id).map_or(&[], Vec::as_slice)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.labels.contains_key(&id)
    }

    /// Notifications that changed the tree.
    pub fn updates(&self) -> usize {
        self.updates
    }

    /// Whether the cache agrees with `graph` node for node.
    pub fn matches(&self, graph: &ModelGraph) -> bool {
        let ids = graph.walk();
        ids.len() == self.labels.len()
            && ids.iter().all(|id| {
                graph.get(*id).map(|n| n.display_name()) == self.label(*id)
                    && graph.children_of(*id) == self.children(*id)
            })
    }

    fn load(&mut self, graph: &ModelGraph, id: NodeId) {
        let Some(node) = graph.get(id) else {
            return;
        };
        self.labels.insert(id, node.display_name().to_string());
        let children = graph.children_of(id);
        for child in &children {
            self.load(graph, *child);
        }
        if !children.is_empty() {
            self.children.insert(id, children);
        }
    }

    fn forget(&mut self, id: NodeId) {
        self.labels.remove(&id);
        for child in self.children.remove(&id).unwrap_or_default() {
            self.forget(child);
        }
    }
}

impl Observer for TreePresenter {
    fn attribute_set(
        &mut self,
        graph: &ModelGraph,
        node: NodeId,
        feature: Feature,
        _old: &FeatureValue,
        _new: &FeatureValue,
    ) {
        if feature != Feature::Name {
            return;
        }
        if let Some(n) = graph.get(node) {
            self.labels.insert(node, n.display_name().to_string());
            self.updates += 1;
        }
    }

    fn child_added(&mut self, graph: &ModelGraph, parent: NodeId, child: NodeId, position: usize) {
        let siblings = self.children.entry(parent).or_default();
        let position = position.min(siblings.len());
        siblings.insert(position, child);
        self.load(graph, child);
        self.updates += 1;
    }

    fn child_removed(&mut self, _graph: &ModelGraph, parent: NodeId, child: NodeId, position: usize) {
        if let Some(siblings) = self.children.get_mut(&parent) {
            if siblings.get(position) == Some(&child) {
                siblings.remove(position);
            } else {
                siblings.retain(|c| *c != child);
            }
            if siblings.is_empty() {
                self.children.remove(&parent);
            }
        }
        self.forget(child);
        self.updates += 1;
    }

    fn child_moved(&mut self, _graph: &ModelGraph, parent: NodeId, child: NodeId, from: usize, to: usize) {
        let Some(siblings) = self.children.get_mut(&parent) else {
            return;
        };
        if siblings.get(from) == Some(&child) && to < siblings.len() {
            let moved = siblings.remove(from);
            siblings.insert(to, moved);
            self.updates += 1;
        }
    }
}

// ─── Diagram part ────────────────────────────────────────────────────────

/// What a diagram figure shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Figure {
    pub label: String,
    pub bounds: Option<Bounds>,
    pub fill_color: Option<Color>,
    pub font: Option<String>,
    pub font_color: Option<Color>,
    pub line_color: Option<Color>,
}

/// The edit part of one diagram object or connection. Listens to the
/// diagram component and to the element it shows, whose name is the label.
#[derive(Debug)]
pub struct DiagramPart {
    component: NodeId,
    element: Option<NodeId>,
    figure: Figure,
    refreshes: usize,
    observers: Vec<ObserverId>,
}

impl DiagramPart {
    pub fn new(graph: &ModelGraph, component: NodeId) -> Option<Self> {
        let node = graph.get(component)?;
        let element = match &node.kind {
            NodeKind::DiagramObject { element, .. } => *element,
            NodeKind::DiagramConnection { relationship, .. } => *relationship,
            _ => return None,
        };
        let mut part = Self {
            component,
            element,
            figure: Figure {
                label: String::new(),
                bounds: None,
                fill_color: None,
                font: None,
                font_color: None,
                line_color: None,
            },
            refreshes: 0,
            observers: Vec::new(),
        };
        part.refresh_figure(graph);
        Some(part)
    }

    /// Build the part and register it on its component and element.
    pub fn attach(session: &mut ModelSession, component: NodeId) -> Option<Rc<RefCell<DiagramPart>>> {
        let part = Rc::new(RefCell::new(Self::new(session.graph(), component)?));
        let mut ids = vec![session.observe(component, part.clone())];
        if let Some(element) = part.borrow().element {
            ids.push(session.observe(element, part.clone()));
        }
        part.borrow_mut().observers = ids;
        Some(part)
    }

    pub fn detach(&mut self, session: &mut ModelSession) {
        for id in self.observers.drain(..) {
            session.unobserve(id);
        }
    }

    pub fn figure(&self) -> &Figure {
        &self.figure
    }

    /// Times the figure was redrawn.
    pub fn refreshes(&self) -> usize {
        self.refreshes
    }

    fn refresh_figure(&mut self, graph: &ModelGraph) {
        let Some(node) = graph.get(self.component) else {
            return;
        };
        let label = self
            .element
            .and_then(|e| graph.get(e))
            .map_or(node.name.as_str(), |e| e.name.as_str());
        self.figure = Figure {
            label: label.to_string(),
            bounds: match node.kind {
                NodeKind::DiagramObject { bounds, .. } => Some(bounds),
                _ => None,
            },
            fill_color: node.style.fill_color,
            font: node.style.font.clone(),
            font_color: node.style.font_color,
            line_color: node.style.line_color,
        };
    }
}

impl Observer for DiagramPart {
    fn attribute_set(
        &mut self,
        graph: &ModelGraph,
        node: NodeId,
        feature: Feature,
        _old: &FeatureValue,
        _new: &FeatureValue,
    ) {
        let relevant = if node == self.component {
            matches!(
                feature,
                Feature::Name
                    | Feature::Bounds
                    | Feature::FillColor
                    | Feature::Font
                    | Feature::FontColor
                    | Feature::LineColor
            )
        } else {
            Some(node) == self.element && feature == Feature::Name
        };
        if relevant {
            self.refresh_figure(graph);
            self.refreshes += 1;
        }
    }

    fn child_added(&mut self, graph: &ModelGraph, parent: NodeId, _child: NodeId, _position: usize) {
        if parent == self.component {
            self.refresh_figure(graph);
            self.refreshes += 1;
        }
    }

    fn child_removed(&mut self, graph: &ModelGraph, parent: NodeId, _child: NodeId, _position: usize) {
        if parent == self.component {
            self.refresh_figure(graph);
            self.refreshes += 1;
        }
    }
}

// ─── Property section ────────────────────────────────────────────────────

/// The properties view for one selected node: name, documentation,
/// user properties and, for the model root, the purpose.
#[derive(Debug, Default)]
pub struct PropertySection {
    node: Option<NodeId>,
    pub name: String,
    pub documentation: String,
    pub purpose: Option<String>,
    pub properties: Vec<(String, String)>,
    refreshes: usize,
    observer: Option<ObserverId>,
}

impl PropertySection {
    pub fn new(graph: &ModelGraph, node: NodeId) -> Self {
        let mut section = Self {
            node: Some(node),
            ..Self::default()
        };
        section.reload(graph);
        section
    }

    pub fn attach(session: &mut ModelSession, node: NodeId) -> Rc<RefCell<PropertySection>> {
        let section = Rc::new(RefCell::new(Self::new(session.graph(), node)));
        let id = session.observe(node, section.clone());
        section.borrow_mut().observer = Some(id);
        section
    }

    pub fn detach(&mut self, session: &mut ModelSession) -> bool {
        self.observer
            .take()
            .is_some_and(|id| session.unobserve(id))
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes
    }

    fn reload(&mut self, graph: &ModelGraph) {
        let Some(node) = self.node.and_then(|id| graph.get(id)) else {
            return;
        };
        self.name = node.name.clone();
        self.documentation = node.documentation.clone();
        self.purpose = match &node.kind {
            NodeKind::Model { purpose } => Some(purpose.clone()),
            _ => None,
        };
        self.properties = node
            .properties
            .iter()
            .map(|p| (p.key.clone(), p.value.clone()))
            .collect();
    }
}

impl Observer for PropertySection {
    fn attribute_set(
        &mut self,
        graph: &ModelGraph,
        node: NodeId,
        feature: Feature,
        _old: &FeatureValue,
        _new: &FeatureValue,
    ) {
        if Some(node) != self.node {
            return;
        }
        if matches!(
            feature,
            Feature::Name | Feature::Documentation | Feature::Properties | Feature::Purpose
        ) {
            self.reload(graph);
            self.refreshes += 1;
        }
    }
}
