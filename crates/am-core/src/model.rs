//! Core data model for ArchiMate models.
//!
//! A model is a tree of `ModelNode` values: the model root owns folders,
//! folders own elements, relationships, views and sub-folders, views own
//! diagram objects and connections. Edges in the underlying graph are
//! ownership only (parent → child, exactly one parent per node). Relationship
//! endpoints and diagram-object → element links are plain `NodeId`
//! references stored on the node, never edges.
//!
//! Every mutation goes through `ModelGraph` and emits one `Notification`
//! per elementary change (see `crate::notify`).

use crate::error::ModelError;
use crate::id::NodeId;
use crate::notify::{Change, ChangeHub, Notification, ObserverId, SharedObserver};
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};

// ─── Colors ──────────────────────────────────────────────────────────────

/// An RGB color as stored on diagram objects (`#RRGGBB`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RGB` or `#RRGGBB`. The leading `#` is optional.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let bytes = hex.as_bytes();
        match bytes.len() {
            3 => Some(Self::rgb(
                hex_val(bytes[0])? * 17,
                hex_val(bytes[1])? * 17,
                hex_val(bytes[2])? * 17,
            )),
            6 => Some(Self::rgb(
                hex_val(bytes[0])? << 4 | hex_val(bytes[1])?,
                hex_val(bytes[2])? << 4 | hex_val(bytes[3])?,
                hex_val(bytes[4])? << 4 | hex_val(bytes[5])?,
            )),
            _ => None,
        }
    }

    /// Emit as `#RRGGBB` (upper case).
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

// ─── Styling & geometry ──────────────────────────────────────────────────

/// Horizontal alignment of a diagram object's label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextAlignment {
    Left,
    #[default]
    Center,
    Right,
}

impl TextAlignment {
    pub fn keyword(&self) -> &'static str {
        match self {
            TextAlignment::Left => "left",
            TextAlignment::Center => "center",
            TextAlignment::Right => "right",
        }
    }

    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "left" => Some(TextAlignment::Left),
            "center" => Some(TextAlignment::Center),
            "right" => Some(TextAlignment::Right),
            _ => None,
        }
    }
}

/// Visual attributes of diagram objects and connections.
/// `None` means "use the default for this kind of figure".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Style {
    pub fill_color: Option<Color>,
    /// Font descriptor, e.g. `"Arial 9 bold"`.
    pub font: Option<String>,
    pub font_color: Option<Color>,
    pub line_color: Option<Color>,
    pub text_alignment: TextAlignment,
}

/// Position and size of a diagram object inside its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Bounds {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::new(0, 0, 120, 55)
    }
}

/// A user-defined key/value property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub key: String,
    pub value: String,
}

impl Property {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

// ─── Element / relationship / folder types ───────────────────────────────

/// Top-level folder categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FolderType {
    Business,
    Application,
    Technology,
    Relations,
    Views,
    /// Holds relationships created by the derived-relation action.
    Derived,
    /// A user sub-folder.
    User,
}

impl FolderType {
    /// The folders a freshly created model starts with, in tree order.
    pub const DEFAULTS: [FolderType; 5] = [
        FolderType::Business,
        FolderType::Application,
        FolderType::Technology,
        FolderType::Relations,
        FolderType::Views,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            FolderType::Business => "business",
            FolderType::Application => "application",
            FolderType::Technology => "technology",
            FolderType::Relations => "relations",
            FolderType::Views => "views",
            FolderType::Derived => "derived",
            FolderType::User => "user",
        }
    }

    pub fn from_keyword(s: &str) -> Option<Self> {
        [
            FolderType::Business,
            FolderType::Application,
            FolderType::Technology,
            FolderType::Relations,
            FolderType::Views,
            FolderType::Derived,
            FolderType::User,
        ]
        .into_iter()
        .find(|f| f.keyword() == s)
    }

    pub fn default_name(&self) -> &'static str {
        match self {
            FolderType::Business => "Business",
            FolderType::Application => "Application",
            FolderType::Technology => "Technology",
            FolderType::Relations => "Relations",
            FolderType::Views => "Views",
            FolderType::Derived => "Derived Relations",
            FolderType::User => "New Folder",
        }
    }
}

/// ArchiMate element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    BusinessActor,
    BusinessRole,
    BusinessCollaboration,
    BusinessInterface,
    BusinessProcess,
    BusinessFunction,
    BusinessEvent,
    BusinessObject,
    BusinessService,
    BusinessMeaning,
    ApplicationComponent,
    ApplicationInterface,
    ApplicationFunction,
    ApplicationService,
    DataObject,
    Node,
    Device,
    SystemSoftware,
    TechnologyNetwork,
    Artifact,
    InfrastructureService,
    Junction,
}

/// (type, keyword, default name, home folder)
const ELEMENT_TYPES: [(ElementType, &str, &str, FolderType); 22] = [
    (ElementType::BusinessActor, "business-actor", "Business Actor", FolderType::Business),
    (ElementType::BusinessRole, "business-role", "Business Role", FolderType::Business),
    (ElementType::BusinessCollaboration, "business-collaboration", "Business Collaboration", FolderType::Business),
    (ElementType::BusinessInterface, "business-interface", "Business Interface", FolderType::Business),
    (ElementType::BusinessProcess, "business-process", "Business Process", FolderType::Business),
    (ElementType::BusinessFunction, "business-function", "Business Function", FolderType::Business),
    (ElementType::BusinessEvent, "business-event", "Business Event", FolderType::Business),
    (ElementType::BusinessObject, "business-object", "Business Object", FolderType::Business),
    (ElementType::BusinessService, "business-service", "Business Service", FolderType::Business),
    (ElementType::BusinessMeaning, "business-meaning", "Meaning", FolderType::Business),
    (ElementType::ApplicationComponent, "application-component", "Application Component", FolderType::Application),
    (ElementType::ApplicationInterface, "application-interface", "Application Interface", FolderType::Application),
    (ElementType::ApplicationFunction, "application-function", "Application Function", FolderType::Application),
    (ElementType::ApplicationService, "application-service", "Application Service", FolderType::Application),
    (ElementType::DataObject, "data-object", "Data Object", FolderType::Application),
    (ElementType::Node, "node", "Node", FolderType::Technology),
    (ElementType::Device, "device", "Device", FolderType::Technology),
    (ElementType::SystemSoftware, "system-software", "System Software", FolderType::Technology),
    (ElementType::TechnologyNetwork, "network", "Network", FolderType::Technology),
    (ElementType::Artifact, "artifact", "Artifact", FolderType::Technology),
    (ElementType::InfrastructureService, "infrastructure-service", "Infrastructure Service", FolderType::Technology),
    (ElementType::Junction, "junction", "Junction", FolderType::Relations),
];

impl ElementType {
    fn entry(&self) -> &'static (ElementType, &'static str, &'static str, FolderType) {
        // The table covers every variant.
        ELEMENT_TYPES
            .iter()
            .find(|(t, ..)| t == self)
            .unwrap_or(&ELEMENT_TYPES[0])
    }

    pub fn keyword(&self) -> &'static str {
        self.entry().1
    }

    pub fn from_keyword(s: &str) -> Option<Self> {
        ELEMENT_TYPES
            .iter()
            .find(|(_, kw, ..)| *kw == s)
            .map(|(t, ..)| *t)
    }

    pub fn default_name(&self) -> &'static str {
        self.entry().2
    }

    /// The top-level folder new elements of this type are filed under.
    pub fn default_folder(&self) -> FolderType {
        self.entry().3
    }

    /// Prefix for generated ids (`business_actor_7`).
    pub fn id_prefix(&self) -> String {
        self.keyword().replace('-', "_")
    }
}

/// ArchiMate relationship types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipType {
    Access,
    Aggregation,
    Assignment,
    Association,
    Composition,
    Flow,
    Realisation,
    Specialisation,
    Triggering,
    UsedBy,
}

const RELATIONSHIP_TYPES: [(RelationshipType, &str, &str); 10] = [
    (RelationshipType::Access, "access", "Access relation"),
    (RelationshipType::Aggregation, "aggregation", "Aggregation relation"),
    (RelationshipType::Assignment, "assignment", "Assignment relation"),
    (RelationshipType::Association, "association", "Association relation"),
    (RelationshipType::Composition, "composition", "Composition relation"),
    (RelationshipType::Flow, "flow", "Flow relation"),
    (RelationshipType::Realisation, "realisation", "Realisation relation"),
    (RelationshipType::Specialisation, "specialisation", "Specialisation relation"),
    (RelationshipType::Triggering, "triggering", "Triggering relation"),
    (RelationshipType::UsedBy, "used-by", "Used By relation"),
];

impl RelationshipType {
    pub fn keyword(&self) -> &'static str {
        RELATIONSHIP_TYPES
            .iter()
            .find(|(t, ..)| t == self)
            .map_or("association", |(_, kw, _)| kw)
    }

    pub fn from_keyword(s: &str) -> Option<Self> {
        RELATIONSHIP_TYPES
            .iter()
            .find(|(_, kw, _)| *kw == s)
            .map(|(t, ..)| *t)
    }

    pub fn default_name(&self) -> &'static str {
        RELATIONSHIP_TYPES
            .iter()
            .find(|(t, ..)| t == self)
            .map_or("Relation", |(.., name)| name)
    }

    pub fn id_prefix(&self) -> String {
        format!("{}_relation", self.keyword().replace('-', "_"))
    }
}

// ─── Nodes ───────────────────────────────────────────────────────────────

/// What a node is. One variant per kind of model object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// The model root.
    Model { purpose: String },

    Folder { folder_type: FolderType },

    Element { element_type: ElementType },

    /// `source` and `target` reference elements; they do not own them.
    Relationship {
        relationship_type: RelationshipType,
        source: NodeId,
        target: NodeId,
    },

    /// A diagram (view) over the model.
    View,

    /// A box on a view. `element` is `None` for notes and plain groups.
    /// May contain nested diagram objects.
    DiagramObject {
        element: Option<NodeId>,
        bounds: Bounds,
    },

    /// A line between two diagram objects on the same view.
    DiagramConnection {
        relationship: Option<NodeId>,
        source: NodeId,
        target: NodeId,
    },
}

impl NodeKind {
    /// Whether nodes of this kind may own children.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            NodeKind::Model { .. }
                | NodeKind::Folder { .. }
                | NodeKind::View
                | NodeKind::DiagramObject { .. }
        )
    }

    pub fn is_element(&self) -> bool {
        matches!(self, NodeKind::Element { .. })
    }

    pub fn is_diagram_component(&self) -> bool {
        matches!(
            self,
            NodeKind::DiagramObject { .. } | NodeKind::DiagramConnection { .. }
        )
    }
}

/// A structural or attribute feature of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    Name,
    Documentation,
    Properties,
    Purpose,
    FillColor,
    Font,
    FontColor,
    LineColor,
    TextAlignment,
    Bounds,
    Locked,
    Source,
    Target,
    /// Ownership list; used by add/remove/move notifications.
    Children,
}

impl Feature {
    /// Features that cannot be changed while the node is locked.
    pub fn guarded_by_lock(&self) -> bool {
        matches!(self, Feature::Bounds)
    }
}

/// A typed value for one feature. Used both to set a feature and to report
/// old/new values in notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureValue {
    Name(String),
    Documentation(String),
    Properties(Vec<Property>),
    Purpose(String),
    FillColor(Option<Color>),
    Font(Option<String>),
    FontColor(Option<Color>),
    LineColor(Option<Color>),
    TextAlignment(TextAlignment),
    Bounds(Bounds),
    Locked(bool),
    Source(NodeId),
    Target(NodeId),
}

impl FeatureValue {
    pub fn feature(&self) -> Feature {
        match self {
            FeatureValue::Name(_) => Feature::Name,
            FeatureValue::Documentation(_) => Feature::Documentation,
            FeatureValue::Properties(_) => Feature::Properties,
            FeatureValue::Purpose(_) => Feature::Purpose,
            FeatureValue::FillColor(_) => Feature::FillColor,
            FeatureValue::Font(_) => Feature::Font,
            FeatureValue::FontColor(_) => Feature::FontColor,
            FeatureValue::LineColor(_) => Feature::LineColor,
            FeatureValue::TextAlignment(_) => Feature::TextAlignment,
            FeatureValue::Bounds(_) => Feature::Bounds,
            FeatureValue::Locked(_) => Feature::Locked,
            FeatureValue::Source(_) => Feature::Source,
            FeatureValue::Target(_) => Feature::Target,
        }
    }
}

/// A single node in the model tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub name: String,
    pub documentation: String,
    pub properties: SmallVec<[Property; 2]>,
    /// Only meaningful on diagram objects and connections.
    pub style: Style,
    /// Only meaningful on diagram objects.
    pub locked: bool,
}

impl ModelNode {
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            name: String::new(),
            documentation: String::new(),
            properties: SmallVec::new(),
            style: Style::default(),
            locked: false,
        }
    }

    pub fn named(id: NodeId, kind: NodeKind, name: impl Into<String>) -> Self {
        let mut node = Self::new(id, kind);
        node.name = name.into();
        node
    }

    /// Current value of `feature`, or `None` if this kind of node has no
    /// such feature.
    pub fn value_of(&self, feature: Feature) -> Option<FeatureValue> {
        let diagram = self.kind.is_diagram_component();
        match feature {
            Feature::Name => Some(FeatureValue::Name(self.name.clone())),
            Feature::Documentation => Some(FeatureValue::Documentation(self.documentation.clone())),
            Feature::Properties => Some(FeatureValue::Properties(self.properties.to_vec())),
            Feature::Purpose => match &self.kind {
                NodeKind::Model { purpose } => Some(FeatureValue::Purpose(purpose.clone())),
                _ => None,
            },
            Feature::FillColor if diagram => Some(FeatureValue::FillColor(self.style.fill_color)),
            Feature::Font if diagram => Some(FeatureValue::Font(self.style.font.clone())),
            Feature::FontColor if diagram => Some(FeatureValue::FontColor(self.style.font_color)),
            Feature::LineColor if diagram => Some(FeatureValue::LineColor(self.style.line_color)),
            Feature::TextAlignment if diagram => {
                Some(FeatureValue::TextAlignment(self.style.text_alignment))
            }
            Feature::Bounds | Feature::Locked => match &self.kind {
                NodeKind::DiagramObject { bounds, .. } => Some(if feature == Feature::Bounds {
                    FeatureValue::Bounds(*bounds)
                } else {
                    FeatureValue::Locked(self.locked)
                }),
                _ => None,
            },
            Feature::Source => match &self.kind {
                NodeKind::Relationship { source, .. }
                | NodeKind::DiagramConnection { source, .. } => Some(FeatureValue::Source(*source)),
                _ => None,
            },
            Feature::Target => match &self.kind {
                NodeKind::Relationship { target, .. }
                | NodeKind::DiagramConnection { target, .. } => Some(FeatureValue::Target(*target)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Replace one feature and return the previous value.
    pub fn apply(&mut self, value: FeatureValue) -> Result<FeatureValue, ModelError> {
        let feature = value.feature();
        let old = self.value_of(feature).ok_or(ModelError::FeatureMismatch {
            node: self.id,
            feature,
        })?;
        match value {
            FeatureValue::Name(v) => self.name = v,
            FeatureValue::Documentation(v) => self.documentation = v,
            FeatureValue::Properties(v) => self.properties = v.into_iter().collect(),
            FeatureValue::Purpose(v) => {
                if let NodeKind::Model { purpose } = &mut self.kind {
                    *purpose = v;
                }
            }
            FeatureValue::FillColor(v) => self.style.fill_color = v,
            FeatureValue::Font(v) => self.style.font = v,
            FeatureValue::FontColor(v) => self.style.font_color = v,
            FeatureValue::LineColor(v) => self.style.line_color = v,
            FeatureValue::TextAlignment(v) => self.style.text_alignment = v,
            FeatureValue::Bounds(v) => {
                if let NodeKind::DiagramObject { bounds, .. } = &mut self.kind {
                    *bounds = v;
                }
            }
            FeatureValue::Locked(v) => self.locked = v,
            FeatureValue::Source(v) => match &mut self.kind {
                NodeKind::Relationship { source, .. }
                | NodeKind::DiagramConnection { source, .. } => *source = v,
                _ => {}
            },
            FeatureValue::Target(v) => match &mut self.kind {
                NodeKind::Relationship { target, .. }
                | NodeKind::DiagramConnection { target, .. } => *target = v,
                _ => {}
            },
        }
        Ok(old)
    }

    /// The label a tree or diagram shows for this node.
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            return &self.name;
        }
        match &self.kind {
            NodeKind::Folder { folder_type } => folder_type.default_name(),
            NodeKind::Element { element_type } => element_type.default_name(),
            NodeKind::Relationship {
                relationship_type, ..
            } => relationship_type.default_name(),
            _ => "",
        }
    }
}

/// A detached node together with everything it owns, in child order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtree {
    pub node: ModelNode,
    pub children: Vec<Subtree>,
}

impl Subtree {
    pub fn leaf(node: ModelNode) -> Self {
        Self {
            node,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.node.id
    }

    /// All ids in this subtree, depth-first pre-order.
    pub fn ids(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_ids(&mut out);
        out
    }

    fn collect_ids(&self, out: &mut Vec<NodeId>) {
        out.push(self.node.id);
        for child in &self.children {
            child.collect_ids(out);
        }
    }
}

/// What `ModelGraph::remove_child` took out, and where from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removed {
    pub subtree: Subtree,
    pub parent: NodeId,
    pub position: usize,
}

// ─── Model graph ─────────────────────────────────────────────────────────

/// The complete model: an ownership tree of `ModelNode`s plus the
/// observers attached to it.
pub struct ModelGraph {
    graph: StableDiGraph<ModelNode, ()>,
    root: NodeIndex,
    id_index: HashMap<NodeId, NodeIndex>,
    /// Child order per container. Positions in notifications index into this.
    child_order: HashMap<NodeIndex, Vec<NodeIndex>>,
    hub: ChangeHub,
}

impl ModelGraph {
    /// Create an empty model with a generated root id.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let root = ModelNode::named(
            NodeId::fresh("model"),
            NodeKind::Model {
                purpose: String::new(),
            },
            name,
        );
        Self::from_root(root)
    }

    /// Create a model around an explicit root node.
    #[must_use]
    pub fn from_root(root_node: ModelNode) -> Self {
        let mut graph = StableDiGraph::new();
        let id = root_node.id;
        let root = graph.add_node(root_node);
        let mut id_index = HashMap::new();
        id_index.insert(id, root);
        Self {
            graph,
            root,
            id_index,
            child_order: HashMap::new(),
            hub: ChangeHub::default(),
        }
    }

    /// Create a model with the standard top-level folders.
    #[must_use]
    pub fn with_default_folders(name: &str) -> Self {
        let mut model = Self::new(name);
        for folder_type in FolderType::DEFAULTS {
            let folder = ModelNode::named(
                NodeId::fresh(folder_type.keyword()),
                NodeKind::Folder { folder_type },
                folder_type.default_name(),
            );
            let root = model.root;
            model.attach(root, Subtree::leaf(folder), None);
        }
        model
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    pub fn root_id(&self) -> NodeId {
        self.graph[self.root].id
    }

    pub fn root(&self) -> &ModelNode {
        &self.graph[self.root]
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() <= 1
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.id_index.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&ModelNode> {
        self.id_index.get(&id).map(|idx| &self.graph[*idx])
    }

    fn index_of(&self, id: NodeId) -> Result<NodeIndex, ModelError> {
        self.id_index
            .get(&id)
            .copied()
            .ok_or(ModelError::UnknownNode(id))
    }

    fn parent_index(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .next()
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        let idx = self.id_index.get(&id)?;
        self.parent_index(*idx).map(|p| self.graph[p].id)
    }

    fn child_indices(&self, idx: NodeIndex) -> &[NodeIndex] {
        self.child_order.get(&idx).map_or(&[], Vec::as_slice)
    }

    /// Children of `id` in order. Empty for unknown nodes and leaves.
    pub fn children_of(&self, id: NodeId) -> Vec<NodeId> {
        match self.id_index.get(&id) {
            Some(idx) => self
                .child_indices(*idx)
                .iter()
                .map(|c| self.graph[*c].id)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Index of `id` within its parent's children.
    pub fn position_of(&self, id: NodeId) -> Option<usize> {
        let idx = *self.id_index.get(&id)?;
        let parent = self.parent_index(idx)?;
        self.child_indices(parent).iter().position(|c| *c == idx)
    }

    /// Whether `ancestor` owns `descendant`, directly or transitively.
    pub fn is_ancestor_of(&self, ancestor: NodeId, descendant: NodeId) -> bool {
        if ancestor == descendant {
            return false;
        }
        let mut current = match self.id_index.get(&descendant) {
            Some(idx) => *idx,
            None => return false,
        };
        while let Some(parent) = self.parent_index(current) {
            if self.graph[parent].id == ancestor {
                return true;
            }
            current = parent;
        }
        false
    }

    /// All node ids, depth-first pre-order from the root.
    pub fn walk(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.len());
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            out.push(self.graph[idx].id);
            stack.extend(self.child_indices(idx).iter().rev());
        }
        out
    }

    /// Clone the subtree rooted at `id`.
    pub fn subtree(&self, id: NodeId) -> Option<Subtree> {
        let idx = *self.id_index.get(&id)?;
        Some(self.clone_subtree(idx))
    }

    fn clone_subtree(&self, idx: NodeIndex) -> Subtree {
        Subtree {
            node: self.graph[idx].clone(),
            children: self
                .child_indices(idx)
                .iter()
                .map(|c| self.clone_subtree(*c))
                .collect(),
        }
    }

    /// First top-level folder of the given type.
    pub fn folder_of_type(&self, folder_type: FolderType) -> Option<NodeId> {
        self.child_indices(self.root)
            .iter()
            .map(|idx| &self.graph[*idx])
            .find(|n| matches!(n.kind, NodeKind::Folder { folder_type: t } if t == folder_type))
            .map(|n| n.id)
    }

    /// Relationships whose source or target is `element`.
    pub fn relationships_of(&self, element: NodeId) -> Vec<NodeId> {
        self.walk()
            .into_iter()
            .filter(|id| {
                matches!(
                    self.get(*id).map(|n| &n.kind),
                    Some(NodeKind::Relationship { source, target, .. })
                        if *source == element || *target == element
                )
            })
            .collect()
    }

    /// Diagram objects and connections that reference `id`: objects showing
    /// an element, connections showing a relationship, and connections
    /// attached to a diagram object.
    pub fn diagram_references_to(&self, id: NodeId) -> Vec<NodeId> {
        self.walk()
            .into_iter()
            .filter(|candidate| match self.get(*candidate).map(|n| &n.kind) {
                Some(NodeKind::DiagramObject { element, .. }) => *element == Some(id),
                Some(NodeKind::DiagramConnection {
                    relationship,
                    source,
                    target,
                }) => *relationship == Some(id) || *source == id || *target == id,
                _ => false,
            })
            .collect()
    }

    /// The view that (transitively) owns a diagram component.
    pub fn view_of(&self, id: NodeId) -> Option<NodeId> {
        let mut current = *self.id_index.get(&id)?;
        while let Some(parent) = self.parent_index(current) {
            if matches!(self.graph[parent].kind, NodeKind::View) {
                return Some(self.graph[parent].id);
            }
            current = parent;
        }
        None
    }

    /// Views with at least one diagram object showing `element`.
    pub fn views_referencing(&self, element: NodeId) -> Vec<NodeId> {
        let mut views: Vec<NodeId> = Vec::new();
        for reference in self.diagram_references_to(element) {
            if let Some(view) = self.view_of(reference)
                && !views.contains(&view)
            {
                views.push(view);
            }
        }
        views
    }

    // ─── Observers ───────────────────────────────────────────────────────

    /// Attach an observer to one node. It keeps receiving that node's
    /// notifications across removal and re-insertion.
    pub fn observe(&mut self, node: NodeId, observer: SharedObserver) -> ObserverId {
        self.hub.observe(node, observer)
    }

    /// Attach an observer to every node in the model.
    pub fn observe_all(&mut self, observer: SharedObserver) -> ObserverId {
        self.hub.observe_all(observer)
    }

    /// Detach an observer. Returns false if it was not attached.
    pub fn unobserve(&mut self, id: ObserverId) -> bool {
        self.hub.unobserve(id)
    }

    pub fn observer_count(&self) -> usize {
        self.hub.len()
    }

    fn emit(&self, source: NodeId, change: Change) {
        let notification = Notification { source, change };
        log::trace!("notify {notification:?}");
        // Observers see the post-mutation graph, registry included, through
        // a shared borrow.
        self.hub.dispatch(self, &notification);
    }

    // ─── Mutations ───────────────────────────────────────────────────────

    /// Add a single node under `parent`. `position` defaults to the end.
    /// Returns the position the node landed at.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        node: ModelNode,
        position: Option<usize>,
    ) -> Result<usize, ModelError> {
        self.insert_subtree(parent, Subtree::leaf(node), position)
    }

    /// Add a node and everything it owns under `parent`. Emits a single
    /// `Add` on the parent.
    pub fn insert_subtree(
        &mut self,
        parent: NodeId,
        subtree: Subtree,
        position: Option<usize>,
    ) -> Result<usize, ModelError> {
        let parent_idx = self.index_of(parent)?;
        if !self.graph[parent_idx].kind.is_container() {
            return Err(ModelError::NotAContainer(parent));
        }
        let len = self.child_indices(parent_idx).len();
        let position = position.unwrap_or(len);
        if position > len {
            return Err(ModelError::InvalidPosition {
                parent,
                position,
                len,
            });
        }
        let mut seen = HashSet::new();
        if let Some(dup) = subtree
            .ids()
            .into_iter()
            .find(|id| self.contains(*id) || !seen.insert(*id))
        {
            return Err(ModelError::DuplicateId(dup));
        }

        let child = subtree.id();
        self.attach(parent_idx, subtree, Some(position));
        self.emit(parent, Change::Add { child, position });
        Ok(position)
    }

    /// Raw insertion without validation or notification.
    fn attach(&mut self, parent: NodeIndex, subtree: Subtree, position: Option<usize>) {
        let Subtree { node, children } = subtree;
        let id = node.id;
        let idx = self.graph.add_node(node);
        self.graph.add_edge(parent, idx, ());
        self.id_index.insert(id, idx);
        let order = self.child_order.entry(parent).or_default();
        match position {
            Some(p) if p <= order.len() => order.insert(p, idx),
            _ => order.push(idx),
        }
        for child in children {
            self.attach(idx, child, None);
        }
    }

    /// Remove `id` and everything it owns. Emits a single `Remove` on the
    /// former parent.
    pub fn remove_child(&mut self, id: NodeId) -> Result<Removed, ModelError> {
        let idx = self.index_of(id)?;
        let parent_idx = self.parent_index(idx).ok_or(ModelError::RootImmutable)?;
        let parent = self.graph[parent_idx].id;
        let position = self
            .child_indices(parent_idx)
            .iter()
            .position(|c| *c == idx)
            .ok_or(ModelError::UnknownNode(id))?;

        if let Some(order) = self.child_order.get_mut(&parent_idx) {
            order.remove(position);
        }
        let subtree = self.detach(idx);
        self.emit(
            parent,
            Change::Remove {
                child: id,
                position,
            },
        );
        Ok(Removed {
            subtree,
            parent,
            position,
        })
    }

    /// Raw removal of `idx` and its descendants, returning them.
    fn detach(&mut self, idx: NodeIndex) -> Subtree {
        let children: Vec<Subtree> = self
            .child_order
            .remove(&idx)
            .unwrap_or_default()
            .into_iter()
            .map(|c| self.detach(c))
            .collect();
        // Index came from our own tables, so the weight is present.
        let node = match self.graph.remove_node(idx) {
            Some(node) => node,
            None => unreachable!("detached node missing from graph"),
        };
        self.id_index.remove(&node.id);
        Subtree { node, children }
    }

    /// Move the child at `from` to `to` within `parent`. No-op (and no
    /// notification) when `from == to`.
    pub fn move_child(&mut self, parent: NodeId, from: usize, to: usize) -> Result<(), ModelError> {
        let parent_idx = self.index_of(parent)?;
        let len = self.child_indices(parent_idx).len();
        for position in [from, to] {
            if position >= len {
                return Err(ModelError::InvalidPosition {
                    parent,
                    position,
                    len,
                });
            }
        }
        if from == to {
            return Ok(());
        }
        let child = match self.child_order.get_mut(&parent_idx) {
            Some(order) => {
                let moved = order.remove(from);
                order.insert(to, moved);
                moved
            }
            None => return Err(ModelError::NotAContainer(parent)),
        };
        let child = self.graph[child].id;
        self.emit(parent, Change::Move { child, from, to });
        Ok(())
    }

    /// Set one feature of `id`, returning the old value. Always notifies,
    /// even when the value is unchanged.
    pub fn set(&mut self, id: NodeId, value: FeatureValue) -> Result<FeatureValue, ModelError> {
        let idx = self.index_of(id)?;
        let feature = value.feature();
        let old = self.graph[idx].apply(value.clone())?;
        self.emit(
            id,
            Change::Set {
                feature,
                old: old.clone(),
                new: value,
            },
        );
        Ok(old)
    }
}

impl Default for ModelGraph {
    fn default() -> Self {
        Self::new("(new model)")
    }
}

impl std::fmt::Debug for ModelGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelGraph")
            .field("root", &self.root_id())
            .field("nodes", &self.len())
            .field("observers", &self.hub.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(id: &str, element_type: ElementType, name: &str) -> ModelNode {
        ModelNode::named(NodeId::intern(id), NodeKind::Element { element_type }, name)
    }

    fn model_with_business(children: &[&str]) -> (ModelGraph, NodeId) {
        let mut model = ModelGraph::with_default_folders("Test");
        let business = model.folder_of_type(FolderType::Business).unwrap();
        for id in children {
            model
                .add_child(business, element(id, ElementType::BusinessActor, id), None)
                .unwrap();
        }
        (model, business)
    }

    #[test]
    fn default_folders_in_order() {
        let model = ModelGraph::with_default_folders("Archisurance");
        let kinds: Vec<FolderType> = model
            .children_of(model.root_id())
            .into_iter()
            .filter_map(|id| match model.get(id).unwrap().kind {
                NodeKind::Folder { folder_type } => Some(folder_type),
                _ => None,
            })
            .collect();
        assert_eq!(kinds, FolderType::DEFAULTS.to_vec());
        assert_eq!(model.root().name, "Archisurance");
    }

    #[test]
    fn add_at_position_and_query() {
        let (mut model, business) = model_with_business(&["m_a", "m_b"]);
        let pos = model
            .add_child(
                business,
                element("m_c", ElementType::BusinessRole, "Role"),
                Some(1),
            )
            .unwrap();
        assert_eq!(pos, 1);
        assert_eq!(
            model.children_of(business),
            vec![
                NodeId::intern("m_a"),
                NodeId::intern("m_c"),
                NodeId::intern("m_b")
            ]
        );
        assert_eq!(model.parent_of(NodeId::intern("m_c")), Some(business));
        assert_eq!(model.position_of(NodeId::intern("m_b")), Some(2));
        assert!(model.is_ancestor_of(model.root_id(), NodeId::intern("m_c")));
    }

    #[test]
    fn add_rejects_duplicates_and_leaves() {
        let (mut model, business) = model_with_business(&["dup_a"]);
        let err = model
            .add_child(business, element("dup_a", ElementType::BusinessActor, "again"), None)
            .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateId(_)));

        let err = model
            .add_child(
                NodeId::intern("dup_a"),
                element("dup_b", ElementType::BusinessActor, "x"),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, ModelError::NotAContainer(_)));

        let err = model
            .add_child(business, element("dup_c", ElementType::BusinessActor, "x"), Some(9))
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidPosition { len: 1, .. }));
    }

    #[test]
    fn remove_returns_subtree_and_position() {
        let (mut model, business) = model_with_business(&["rm_a", "rm_b", "rm_c"]);
        let removed = model.remove_child(NodeId::intern("rm_b")).unwrap();
        assert_eq!(removed.parent, business);
        assert_eq!(removed.position, 1);
        assert!(!model.contains(NodeId::intern("rm_b")));

        model
            .insert_subtree(business, removed.subtree, Some(removed.position))
            .unwrap();
        assert_eq!(model.position_of(NodeId::intern("rm_b")), Some(1));
    }

    #[test]
    fn remove_folder_takes_contents() {
        let (mut model, business) = model_with_business(&["fold_a", "fold_b"]);
        let before = model.len();
        let removed = model.remove_child(business).unwrap();
        assert_eq!(removed.subtree.children.len(), 2);
        assert_eq!(model.len(), before - 3);
        assert!(!model.contains(NodeId::intern("fold_a")));
        assert!(model.remove_child(model.root_id()).is_err());
    }

    #[test]
    fn move_child_reorders() {
        let (mut model, business) =
            model_with_business(&["mv_0", "mv_1", "mv_2", "mv_3", "mv_4"]);
        model.move_child(business, 2, 0).unwrap();
        let names: Vec<String> = model
            .children_of(business)
            .iter()
            .map(|id| id.as_str().to_string())
            .collect();
        assert_eq!(names, ["mv_2", "mv_0", "mv_1", "mv_3", "mv_4"]);
        assert!(model.move_child(business, 0, 5).is_err());
    }

    #[test]
    fn set_returns_old_value_and_checks_feature() {
        let (mut model, _) = model_with_business(&["set_a"]);
        let id = NodeId::intern("set_a");
        let old = model
            .set(id, FeatureValue::Name("Customer".into()))
            .unwrap();
        assert_eq!(old, FeatureValue::Name("set_a".into()));
        assert_eq!(model.get(id).unwrap().name, "Customer");

        let err = model
            .set(id, FeatureValue::Bounds(Bounds::default()))
            .unwrap_err();
        assert!(matches!(
            err,
            ModelError::FeatureMismatch {
                feature: Feature::Bounds,
                ..
            }
        ));
    }

    #[test]
    fn references_are_found() {
        let (mut model, _) = model_with_business(&["ref_a", "ref_b"]);
        let relations = model.folder_of_type(FolderType::Relations).unwrap();
        let views = model.folder_of_type(FolderType::Views).unwrap();
        let a = NodeId::intern("ref_a");
        let b = NodeId::intern("ref_b");
        let rel = NodeId::intern("ref_rel");
        model
            .add_child(
                relations,
                ModelNode::new(
                    rel,
                    NodeKind::Relationship {
                        relationship_type: RelationshipType::Assignment,
                        source: a,
                        target: b,
                    },
                ),
                None,
            )
            .unwrap();
        let view = NodeId::intern("ref_view");
        model
            .add_child(views, ModelNode::new(view, NodeKind::View), None)
            .unwrap();
        let obj = NodeId::intern("ref_obj");
        model
            .add_child(
                view,
                ModelNode::new(
                    obj,
                    NodeKind::DiagramObject {
                        element: Some(a),
                        bounds: Bounds::default(),
                    },
                ),
                None,
            )
            .unwrap();

        assert_eq!(model.relationships_of(a), vec![rel]);
        assert_eq!(model.diagram_references_to(a), vec![obj]);
        assert_eq!(model.views_referencing(a), vec![view]);
        assert!(model.views_referencing(b).is_empty());
        assert_eq!(model.view_of(obj), Some(view));
    }

    #[test]
    fn walk_is_preorder() {
        let (model, business) = model_with_business(&["walk_a", "walk_b"]);
        let order = model.walk();
        assert_eq!(order[0], model.root_id());
        assert_eq!(order[1], business);
        assert_eq!(order[2], NodeId::intern("walk_a"));
        assert_eq!(order[3], NodeId::intern("walk_b"));
        assert_eq!(order.len(), model.len());
    }

    #[test]
    fn color_hex_roundtrip() {
        let c = Color::from_hex("#FFFFB5").unwrap();
        assert_eq!(c, Color::rgb(255, 255, 181));
        assert_eq!(c.to_hex(), "#FFFFB5");
        assert_eq!(Color::from_hex("0f0"), Some(Color::rgb(0, 255, 0)));
        assert_eq!(Color::from_hex("#12345"), None);
    }

    #[test]
    fn element_type_table() {
        assert_eq!(
            ElementType::from_keyword("business-actor"),
            Some(ElementType::BusinessActor)
        );
        assert_eq!(ElementType::DataObject.default_folder(), FolderType::Application);
        assert_eq!(ElementType::SystemSoftware.id_prefix(), "system_software");
        assert_eq!(RelationshipType::UsedBy.keyword(), "used-by");
        assert_eq!(
            RelationshipType::from_keyword("used-by"),
            Some(RelationshipType::UsedBy)
        );
    }
}
