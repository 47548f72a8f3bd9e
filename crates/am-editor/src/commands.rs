//! Concrete model-editing commands.
//!
//! Commands that create nodes generate fresh ids on their first `execute`
//! and keep the removed subtree on `undo`, so `redo` puts back the very
//! same nodes (same ids) instead of minting new ones.

use crate::command::{Command, CommandError};
use crate::compound::CompoundCommand;
use am_core::{
    Bounds, Color, ElementType, Feature, FeatureValue, FolderType, ModelGraph, ModelNode, NodeId,
    NodeKind, Property, RelationshipType, Removed, Subtree, TextAlignment,
};
use smallvec::SmallVec;
use std::collections::VecDeque;

// ─── Placement bookkeeping ───────────────────────────────────────────────

/// One node a command inserted, with the subtree held while it is out of
/// the graph.
#[derive(Debug)]
struct Placement {
    id: NodeId,
    parent: NodeId,
    position: Option<usize>,
    detached: Option<Subtree>,
}

impl Placement {
    fn new(parent: NodeId, subtree: Subtree, position: Option<usize>) -> Self {
        Self {
            id: subtree.id(),
            parent,
            position,
            detached: Some(subtree),
        }
    }

    fn is_detached(&self) -> bool {
        self.detached.is_some()
    }

    fn insert(&mut self, graph: &mut ModelGraph, label: &str) -> Result<(), CommandError> {
        let subtree = self
            .detached
            .as_ref()
            .ok_or_else(|| CommandError::failed(label, format!("{} is already in the model", self.id)))?;
        let position = graph.insert_subtree(self.parent, subtree.clone(), self.position)?;
        self.position = Some(position);
        self.detached = None;
        Ok(())
    }

    fn remove(&mut self, graph: &mut ModelGraph) -> Result<(), CommandError> {
        let Removed {
            subtree, position, ..
        } = graph.remove_child(self.id)?;
        self.position = Some(position);
        self.detached = Some(subtree);
        Ok(())
    }
}

/// Nodes created by one command, in creation order.
#[derive(Debug, Default)]
struct Placements {
    items: SmallVec<[Placement; 3]>,
}

impl Placements {
    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Insert a brand-new node and remember it.
    fn create(
        &mut self,
        graph: &mut ModelGraph,
        label: &str,
        parent: NodeId,
        node: ModelNode,
        position: Option<usize>,
    ) -> Result<NodeId, CommandError> {
        let mut placement = Placement::new(parent, Subtree::leaf(node), position);
        let id = placement.id;
        if let Err(e) = placement.insert(graph, label) {
            self.rollback(graph);
            return Err(e);
        }
        self.items.push(placement);
        Ok(id)
    }

    /// Take back whatever was created so far, after a failure.
    fn rollback(&mut self, graph: &mut ModelGraph) {
        for mut placement in self.items.drain(..).rev() {
            if let Err(e) = placement.remove(graph) {
                log::warn!("rollback of {} failed: {e}", placement.id);
            }
        }
    }

    fn remove_all(&mut self, graph: &mut ModelGraph) -> Result<(), CommandError> {
        for placement in self.items.iter_mut().rev() {
            placement.remove(graph)?;
        }
        Ok(())
    }

    fn reinsert_all(&mut self, graph: &mut ModelGraph, label: &str) -> Result<(), CommandError> {
        for placement in self.items.iter_mut() {
            placement.insert(graph, label)?;
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.items.clear();
    }
}

/// Top-level folder of `folder_type`, creating it if missing.
fn ensure_folder(
    graph: &mut ModelGraph,
    placements: &mut Placements,
    label: &str,
    folder_type: FolderType,
) -> Result<NodeId, CommandError> {
    if let Some(folder) = graph.folder_of_type(folder_type) {
        return Ok(folder);
    }
    log::debug!("{label}: creating missing {folder_type:?} folder");
    let folder = ModelNode::named(
        NodeId::fresh(folder_type.keyword()),
        NodeKind::Folder { folder_type },
        folder_type.default_name(),
    );
    let root = graph.root_id();
    placements.create(graph, label, root, folder, None)
}

// ─── Set feature ─────────────────────────────────────────────────────────

/// Set one feature of one node.
#[derive(Debug)]
pub struct SetFeatureCommand {
    label: String,
    node: NodeId,
    value: FeatureValue,
    old: Option<FeatureValue>,
}

impl SetFeatureCommand {
    pub fn new(label: impl Into<String>, node: NodeId, value: FeatureValue) -> Self {
        Self {
            label: label.into(),
            node,
            value,
            old: None,
        }
    }

    pub fn rename(node: NodeId, name: impl Into<String>) -> Self {
        Self::new("Rename", node, FeatureValue::Name(name.into()))
    }

    pub fn set_documentation(node: NodeId, text: impl Into<String>) -> Self {
        Self::new("Documentation", node, FeatureValue::Documentation(text.into()))
    }

    pub fn set_purpose(model: NodeId, text: impl Into<String>) -> Self {
        Self::new("Purpose", model, FeatureValue::Purpose(text.into()))
    }

    pub fn set_properties(node: NodeId, properties: Vec<Property>) -> Self {
        Self::new("Properties", node, FeatureValue::Properties(properties))
    }

    pub fn set_fill_color(node: NodeId, color: Option<Color>) -> Self {
        Self::new("Fill Colour", node, FeatureValue::FillColor(color))
    }

    pub fn set_font(node: NodeId, font: Option<String>) -> Self {
        Self::new("Change font", node, FeatureValue::Font(font))
    }

    pub fn set_font_color(node: NodeId, color: Option<Color>) -> Self {
        Self::new("Change font", node, FeatureValue::FontColor(color))
    }

    pub fn set_line_color(node: NodeId, color: Option<Color>) -> Self {
        Self::new("Line Colour", node, FeatureValue::LineColor(color))
    }

    pub fn set_text_alignment(node: NodeId, alignment: TextAlignment) -> Self {
        Self::new("Text Alignment", node, FeatureValue::TextAlignment(alignment))
    }

    pub fn set_bounds(node: NodeId, bounds: Bounds) -> Self {
        Self::new("Move", node, FeatureValue::Bounds(bounds))
    }

    pub fn set_locked(node: NodeId, locked: bool) -> Self {
        let label = if locked { "Lock" } else { "Unlock" };
        Self::new(label, node, FeatureValue::Locked(locked))
    }

    pub fn reconnect_source(node: NodeId, source: NodeId) -> Self {
        Self::new("Reconnect", node, FeatureValue::Source(source))
    }

    pub fn reconnect_target(node: NodeId, target: NodeId) -> Self {
        Self::new("Reconnect", node, FeatureValue::Target(target))
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn feature(&self) -> Feature {
        self.value.feature()
    }
}

impl Command for SetFeatureCommand {
    fn label(&self) -> &str {
        &self.label
    }

    /// False when the node is gone, lacks the feature, already holds the
    /// value, or is locked against this feature. A relationship end must be
    /// an element; a connection end must be a diagram object on the
    /// connection's own view.
    fn can_execute(&self, graph: &ModelGraph) -> bool {
        let Some(node) = graph.get(self.node) else {
            return false;
        };
        let feature = self.value.feature();
        let Some(current) = node.value_of(feature) else {
            return false;
        };
        if current == self.value || (node.locked && feature.guarded_by_lock()) {
            return false;
        }
        let (FeatureValue::Source(end) | FeatureValue::Target(end)) = &self.value else {
            return true;
        };
        let Some(end_node) = graph.get(*end) else {
            return false;
        };
        match &node.kind {
            NodeKind::Relationship { .. } => end_node.kind.is_element(),
            NodeKind::DiagramConnection { .. } => {
                matches!(end_node.kind, NodeKind::DiagramObject { .. })
                    && graph.view_of(*end).is_some()
                    && graph.view_of(*end) == graph.view_of(self.node)
            }
            _ => false,
        }
    }

    fn execute(&mut self, graph: &mut ModelGraph) -> Result<(), CommandError> {
        let old = graph.set(self.node, self.value.clone())?;
        self.old = Some(old);
        Ok(())
    }

    fn undo(&mut self, graph: &mut ModelGraph) -> Result<(), CommandError> {
        let old = self
            .old
            .clone()
            .ok_or_else(|| CommandError::NotExecuted(self.label.clone()))?;
        graph.set(self.node, old)?;
        Ok(())
    }

    fn dispose(&mut self) {
        self.old = None;
    }
}

// ─── Add a caller-built node ─────────────────────────────────────────────

/// Add a node the caller already built (id included).
#[derive(Debug)]
pub struct AddNodeCommand {
    label: String,
    placement: Placement,
}

impl AddNodeCommand {
    pub fn new(parent: NodeId, node: ModelNode, position: Option<usize>) -> Self {
        Self::subtree(parent, Subtree::leaf(node), position)
    }

    /// Add a node together with its children.
    pub fn subtree(parent: NodeId, subtree: Subtree, position: Option<usize>) -> Self {
        let label = format!("New {}", subtree.node.display_name());
        Self {
            label,
            placement: Placement::new(parent, subtree, position),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.placement.id
    }
}

impl Command for AddNodeCommand {
    fn label(&self) -> &str {
        &self.label
    }

    fn can_execute(&self, graph: &ModelGraph) -> bool {
        let Some(subtree) = &self.placement.detached else {
            return false;
        };
        let parent_ok = graph
            .get(self.placement.parent)
            .is_some_and(|p| p.kind.is_container());
        let position_ok = self
            .placement
            .position
            .is_none_or(|p| p <= graph.children_of(self.placement.parent).len());
        parent_ok && position_ok && subtree.ids().iter().all(|id| !graph.contains(*id))
    }

    fn execute(&mut self, graph: &mut ModelGraph) -> Result<(), CommandError> {
        self.placement.insert(graph, &self.label)
    }

    fn undo(&mut self, graph: &mut ModelGraph) -> Result<(), CommandError> {
        self.placement.remove(graph)
    }
}

// ─── Create a node with a generated id ───────────────────────────────────

/// Where a created node goes.
#[derive(Debug, Clone, Copy)]
enum Destination {
    Parent(NodeId),
    Folder(FolderType),
}

impl Destination {
    fn resolve(&self, graph: &ModelGraph) -> Option<NodeId> {
        let parent = match self {
            Destination::Parent(parent) => *parent,
            Destination::Folder(folder_type) => graph.folder_of_type(*folder_type)?,
        };
        graph
            .get(parent)
            .filter(|p| p.kind.is_container())
            .map(|p| p.id)
    }
}

/// Create a new node with a freshly generated id.
#[derive(Debug)]
pub struct CreateNodeCommand {
    label: String,
    destination: Destination,
    id_prefix: String,
    kind: NodeKind,
    name: String,
    placement: Option<Placement>,
}

impl CreateNodeCommand {
    fn build(
        destination: Destination,
        id_prefix: impl Into<String>,
        kind: NodeKind,
        name: impl Into<String>,
        label: String,
    ) -> Self {
        Self {
            label,
            destination,
            id_prefix: id_prefix.into(),
            kind,
            name: name.into(),
            placement: None,
        }
    }

    /// A new element in the top-level folder for its type.
    pub fn element(element_type: ElementType, name: impl Into<String>) -> Self {
        let name = name.into();
        Self::build(
            Destination::Folder(element_type.default_folder()),
            element_type.id_prefix(),
            NodeKind::Element { element_type },
            name.clone(),
            format!("New {name}"),
        )
    }

    /// A new element in a specific folder.
    pub fn element_in(folder: NodeId, element_type: ElementType, name: impl Into<String>) -> Self {
        let name = name.into();
        Self::build(
            Destination::Parent(folder),
            element_type.id_prefix(),
            NodeKind::Element { element_type },
            name.clone(),
            format!("New {name}"),
        )
    }

    /// A user sub-folder.
    pub fn folder(parent: NodeId, name: impl Into<String>) -> Self {
        let name = name.into();
        Self::build(
            Destination::Parent(parent),
            "folder",
            NodeKind::Folder {
                folder_type: FolderType::User,
            },
            name.clone(),
            format!("New {name}"),
        )
    }

    /// A new view in the Views folder.
    pub fn view(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::build(
            Destination::Folder(FolderType::Views),
            "view",
            NodeKind::View,
            name.clone(),
            format!("New {name}"),
        )
    }

    /// A diagram object showing `element`, inside a view or another object.
    pub fn diagram_object(container: NodeId, element: NodeId, bounds: Bounds) -> Self {
        Self::build(
            Destination::Parent(container),
            "object",
            NodeKind::DiagramObject {
                element: Some(element),
                bounds,
            },
            "",
            "Add to View".to_string(),
        )
    }

    /// A note (a diagram object without an element).
    pub fn note(container: NodeId, text: impl Into<String>, bounds: Bounds) -> Self {
        Self::build(
            Destination::Parent(container),
            "note",
            NodeKind::DiagramObject {
                element: None,
                bounds,
            },
            text,
            "New Note".to_string(),
        )
    }

    /// The generated id, once executed.
    pub fn created_id(&self) -> Option<NodeId> {
        self.placement.as_ref().map(|p| p.id)
    }
}

impl Command for CreateNodeCommand {
    fn label(&self) -> &str {
        &self.label
    }

    fn can_execute(&self, graph: &ModelGraph) -> bool {
        let Some(parent) = self.destination.resolve(graph) else {
            return false;
        };
        let parent_kind = graph.get(parent).map(|p| &p.kind);
        match &self.kind {
            // Diagram objects live on a view, directly or nested.
            NodeKind::DiagramObject { element, .. } => {
                let on_view =
                    matches!(parent_kind, Some(NodeKind::View)) || graph.view_of(parent).is_some();
                on_view
                    && element.is_none_or(|e| graph.get(e).is_some_and(|n| n.kind.is_element()))
            }
            _ => matches!(
                parent_kind,
                Some(NodeKind::Folder { .. } | NodeKind::Model { .. })
            ),
        }
    }

    fn execute(&mut self, graph: &mut ModelGraph) -> Result<(), CommandError> {
        if let Some(placement) = &mut self.placement {
            return placement.insert(graph, &self.label);
        }
        let parent = self
            .destination
            .resolve(graph)
            .ok_or_else(|| CommandError::failed(&self.label, "destination is missing"))?;
        let node = ModelNode::named(
            NodeId::fresh(&self.id_prefix),
            self.kind.clone(),
            self.name.clone(),
        );
        let mut placement = Placement::new(parent, Subtree::leaf(node), None);
        placement.insert(graph, &self.label)?;
        log::debug!("{}: created {}", self.label, placement.id);
        self.placement = Some(placement);
        Ok(())
    }

    fn undo(&mut self, graph: &mut ModelGraph) -> Result<(), CommandError> {
        match &mut self.placement {
            Some(placement) => placement.remove(graph),
            None => Err(CommandError::NotExecuted(self.label.clone())),
        }
    }

    fn redo(&mut self, graph: &mut ModelGraph) -> Result<(), CommandError> {
        match &mut self.placement {
            Some(placement) if placement.is_detached() => placement.insert(graph, &self.label),
            _ => Err(CommandError::NotExecuted(self.label.clone())),
        }
    }

    fn dispose(&mut self) {
        self.placement = None;
    }
}

// ─── Relationships & connections ─────────────────────────────────────────

/// Create a relationship between two elements in the Relations folder.
#[derive(Debug)]
pub struct CreateRelationshipCommand {
    label: String,
    relationship_type: RelationshipType,
    source: NodeId,
    target: NodeId,
    name: String,
    created: Placements,
    relationship: Option<NodeId>,
}

impl CreateRelationshipCommand {
    pub fn new(
        relationship_type: RelationshipType,
        source: NodeId,
        target: NodeId,
        name: impl Into<String>,
    ) -> Self {
        Self {
            label: format!("New {}", relationship_type.default_name()),
            relationship_type,
            source,
            target,
            name: name.into(),
            created: Placements::default(),
            relationship: None,
        }
    }

    pub fn created_id(&self) -> Option<NodeId> {
        self.relationship
    }
}

fn relationship_node(
    relationship_type: RelationshipType,
    source: NodeId,
    target: NodeId,
    name: &str,
) -> ModelNode {
    ModelNode::named(
        NodeId::fresh(&relationship_type.id_prefix()),
        NodeKind::Relationship {
            relationship_type,
            source,
            target,
        },
        name,
    )
}

impl Command for CreateRelationshipCommand {
    fn label(&self) -> &str {
        &self.label
    }

    fn can_execute(&self, graph: &ModelGraph) -> bool {
        [self.source, self.target]
            .iter()
            .all(|id| graph.get(*id).is_some_and(|n| n.kind.is_element()))
    }

    fn execute(&mut self, graph: &mut ModelGraph) -> Result<(), CommandError> {
        if !self.created.is_empty() {
            return self.created.reinsert_all(graph, &self.label);
        }
        let folder = ensure_folder(graph, &mut self.created, &self.label, FolderType::Relations)?;
        let node = relationship_node(self.relationship_type, self.source, self.target, &self.name);
        self.relationship = Some(self.created.create(graph, &self.label, folder, node, None)?);
        Ok(())
    }

    fn undo(&mut self, graph: &mut ModelGraph) -> Result<(), CommandError> {
        if self.created.is_empty() {
            return Err(CommandError::NotExecuted(self.label.clone()));
        }
        self.created.remove_all(graph)
    }

    fn dispose(&mut self) {
        self.created.clear();
    }
}

/// Create a relationship and the diagram connection that shows it, between
/// two diagram objects on the same view.
///
/// `new` files the relationship under Relations; `derived` files it under
/// the Derived folder, creating that folder when the model has none.
#[derive(Debug)]
pub struct CreateConnectionCommand {
    label: String,
    relationship_type: RelationshipType,
    source: NodeId,
    target: NodeId,
    folder_type: FolderType,
    name: String,
    created: Placements,
    ids: Option<(NodeId, NodeId)>,
}

impl CreateConnectionCommand {
    pub fn new(relationship_type: RelationshipType, source: NodeId, target: NodeId) -> Self {
        Self {
            label: format!("New {}", relationship_type.default_name()),
            relationship_type,
            source,
            target,
            folder_type: FolderType::Relations,
            name: String::new(),
            created: Placements::default(),
            ids: None,
        }
    }

    pub fn derived(
        relationship_type: RelationshipType,
        source: NodeId,
        target: NodeId,
        name: impl Into<String>,
    ) -> Self {
        Self {
            label: "Create Derived Relation".to_string(),
            folder_type: FolderType::Derived,
            name: name.into(),
            ..Self::new(relationship_type, source, target)
        }
    }

    /// `(relationship, connection)` ids, once executed.
    pub fn created_ids(&self) -> Option<(NodeId, NodeId)> {
        self.ids
    }

    /// `(source element, target element, view)` if both ends are diagram
    /// objects showing elements on the same view.
    fn endpoints(&self, graph: &ModelGraph) -> Option<(NodeId, NodeId, NodeId)> {
        let element_of = |id: NodeId| match graph.get(id).map(|n| &n.kind) {
            Some(NodeKind::DiagramObject {
                element: Some(element),
                ..
            }) if graph.contains(*element) => Some(*element),
            _ => None,
        };
        let source = element_of(self.source)?;
        let target = element_of(self.target)?;
        let view = graph.view_of(self.source)?;
        (graph.view_of(self.target) == Some(view)).then_some((source, target, view))
    }
}

impl Command for CreateConnectionCommand {
    fn label(&self) -> &str {
        &self.label
    }

    fn can_execute(&self, graph: &ModelGraph) -> bool {
        self.endpoints(graph).is_some()
    }

    fn execute(&mut self, graph: &mut ModelGraph) -> Result<(), CommandError> {
        if !self.created.is_empty() {
            return self.created.reinsert_all(graph, &self.label);
        }
        let (source, target, view) = self
            .endpoints(graph)
            .ok_or_else(|| CommandError::failed(&self.label, "ends are not on one view"))?;

        let folder = ensure_folder(graph, &mut self.created, &self.label, self.folder_type)?;
        let relationship = relationship_node(self.relationship_type, source, target, &self.name);
        let relationship = self
            .created
            .create(graph, &self.label, folder, relationship, None)?;

        let connection = ModelNode::new(
            NodeId::fresh("connection"),
            NodeKind::DiagramConnection {
                relationship: Some(relationship),
                source: self.source,
                target: self.target,
            },
        );
        let connection = self
            .created
            .create(graph, &self.label, view, connection, None)?;
        self.ids = Some((relationship, connection));
        Ok(())
    }

    fn undo(&mut self, graph: &mut ModelGraph) -> Result<(), CommandError> {
        if self.created.is_empty() {
            return Err(CommandError::NotExecuted(self.label.clone()));
        }
        self.created.remove_all(graph)
    }

    fn dispose(&mut self) {
        self.created.clear();
    }
}

// ─── Delete ──────────────────────────────────────────────────────────────

/// Remove a node and everything it owns.
#[derive(Debug)]
pub struct DeleteNodeCommand {
    label: String,
    node: NodeId,
    ignore_lock: bool,
    removed: Option<Removed>,
}

impl DeleteNodeCommand {
    pub fn new(node: NodeId) -> Self {
        Self {
            label: "Delete".to_string(),
            node,
            ignore_lock: false,
            removed: None,
        }
    }

    /// Delete even if the node is a locked diagram object.
    pub fn ignoring_lock(mut self) -> Self {
        self.ignore_lock = true;
        self
    }

    pub fn node(&self) -> NodeId {
        self.node
    }
}

impl Command for DeleteNodeCommand {
    fn label(&self) -> &str {
        &self.label
    }

    fn can_execute(&self, graph: &ModelGraph) -> bool {
        match graph.get(self.node) {
            Some(node) => {
                self.node != graph.root_id() && (self.ignore_lock || !node.locked)
            }
            None => false,
        }
    }

    fn execute(&mut self, graph: &mut ModelGraph) -> Result<(), CommandError> {
        self.removed = Some(graph.remove_child(self.node)?);
        Ok(())
    }

    fn undo(&mut self, graph: &mut ModelGraph) -> Result<(), CommandError> {
        let removed = self
            .removed
            .as_ref()
            .ok_or_else(|| CommandError::NotExecuted(self.label.clone()))?;
        graph.insert_subtree(removed.parent, removed.subtree.clone(), Some(removed.position))?;
        self.removed = None;
        Ok(())
    }

    fn dispose(&mut self) {
        self.removed = None;
    }
}

/// Build the command that deletes `ids` from the model together with
/// every relationship attached to them and every diagram object or
/// connection showing any of it. Nodes owned by another deleted node are
/// not deleted separately. `None` when nothing would be deleted.
pub fn delete_from_model(graph: &ModelGraph, ids: &[NodeId]) -> Option<Box<dyn Command>> {
    let mut doomed: Vec<NodeId> = Vec::new();
    let mut queue: VecDeque<NodeId> = ids.iter().copied().collect();

    while let Some(id) = queue.pop_front() {
        if doomed.contains(&id) || !graph.contains(id) || id == graph.root_id() {
            continue;
        }
        doomed.push(id);
        let Some(subtree) = graph.subtree(id) else {
            continue;
        };
        for owned in subtree.ids() {
            queue.extend(graph.relationships_of(owned));
            queue.extend(graph.diagram_references_to(owned));
        }
    }

    let mut compound = CompoundCommand::new("Delete");
    for id in &doomed {
        if doomed.iter().any(|other| graph.is_ancestor_of(*other, *id)) {
            continue;
        }
        compound.add(Box::new(DeleteNodeCommand::new(*id).ignoring_lock()));
    }
    compound.finish(graph)
}

// ─── Reordering ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reorder {
    ToBack,
    ToFront,
    Backward,
    Forward,
    To(usize),
}

/// Move a node within its parent's child list (z-order on diagrams).
#[derive(Debug)]
pub struct MoveChildCommand {
    label: String,
    child: NodeId,
    reorder: Reorder,
    /// `(parent, from, to)` as applied.
    applied: Option<(NodeId, usize, usize)>,
}

impl MoveChildCommand {
    fn build(label: &str, child: NodeId, reorder: Reorder) -> Self {
        Self {
            label: label.to_string(),
            child,
            reorder,
            applied: None,
        }
    }

    pub fn send_to_back(child: NodeId) -> Self {
        Self::build("Send To Back", child, Reorder::ToBack)
    }

    pub fn bring_to_front(child: NodeId) -> Self {
        Self::build("Bring To Front", child, Reorder::ToFront)
    }

    pub fn send_backward(child: NodeId) -> Self {
        Self::build("Send Backward", child, Reorder::Backward)
    }

    pub fn bring_forward(child: NodeId) -> Self {
        Self::build("Bring Forward", child, Reorder::Forward)
    }

    pub fn to_position(child: NodeId, position: usize) -> Self {
        Self::build("Move", child, Reorder::To(position))
    }

    fn resolve(&self, graph: &ModelGraph) -> Option<(NodeId, usize, usize)> {
        let parent = graph.parent_of(self.child)?;
        let from = graph.position_of(self.child)?;
        let last = graph.children_of(parent).len().checked_sub(1)?;
        let to = match self.reorder {
            Reorder::ToBack => 0,
            Reorder::ToFront => last,
            Reorder::Backward => from.saturating_sub(1),
            Reorder::Forward => (from + 1).min(last),
            Reorder::To(position) => position,
        };
        (to <= last).then_some((parent, from, to))
    }
}

impl Command for MoveChildCommand {
    fn label(&self) -> &str {
        &self.label
    }

    fn can_execute(&self, graph: &ModelGraph) -> bool {
        self.resolve(graph).is_some_and(|(_, from, to)| from != to)
    }

    fn execute(&mut self, graph: &mut ModelGraph) -> Result<(), CommandError> {
        let (parent, from, to) = self
            .resolve(graph)
            .ok_or_else(|| CommandError::failed(&self.label, format!("{} has no parent", self.child)))?;
        graph.move_child(parent, from, to)?;
        self.applied = Some((parent, from, to));
        Ok(())
    }

    fn undo(&mut self, graph: &mut ModelGraph) -> Result<(), CommandError> {
        let (parent, from, to) = self
            .applied
            .ok_or_else(|| CommandError::NotExecuted(self.label.clone()))?;
        graph.move_child(parent, to, from)?;
        Ok(())
    }

    fn redo(&mut self, graph: &mut ModelGraph) -> Result<(), CommandError> {
        let (parent, from, to) = self
            .applied
            .ok_or_else(|| CommandError::NotExecuted(self.label.clone()))?;
        graph.move_child(parent, from, to)?;
        Ok(())
    }

    fn dispose(&mut self) {
        self.applied = None;
    }
}
