//! Input document model
//!
//! The layout core reads the design document through [`DocumentSource`]
//! and never mutates it. [`DocumentTree`] is the in-memory implementation
//! used by the CLI and tests.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::{LayoutError, Result};

/// Identity of a box in the document
pub type ElementId = u64;

/// A raw style value as authored: a bare number or a CSS-like string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StyleValue {
    Number(f64),
    Text(String),
}

impl StyleValue {
    /// String form, if this is a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            StyleValue::Text(s) => Some(s.as_str()),
            StyleValue::Number(_) => None,
        }
    }

    /// Numeric form: a bare number, or a string that parses as one
    pub fn as_number(&self) -> Option<f64> {
        match self {
            StyleValue::Number(n) => Some(*n),
            StyleValue::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Whether this is the given keyword (case-insensitive)
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.as_str()
            .is_some_and(|s| s.trim().eq_ignore_ascii_case(keyword))
    }
}

impl fmt::Display for StyleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StyleValue::Number(n) => write!(f, "{}", n),
            StyleValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for StyleValue {
    fn from(value: &str) -> Self {
        StyleValue::Text(value.to_string())
    }
}

impl From<String> for StyleValue {
    fn from(value: String) -> Self {
        StyleValue::Text(value)
    }
}

impl From<f64> for StyleValue {
    fn from(value: f64) -> Self {
        StyleValue::Number(value)
    }
}

impl From<f32> for StyleValue {
    fn from(value: f32) -> Self {
        StyleValue::Number(f64::from(value))
    }
}

impl From<i32> for StyleValue {
    fn from(value: i32) -> Self {
        StyleValue::Number(f64::from(value))
    }
}

/// Authored style declarations, keyed by camelCase property name.
///
/// Ordered so that serialized forms are deterministic.
pub type StyleMap = BTreeMap<String, StyleValue>;

/// Widget properties relevant to layout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Props {
    pub style: StyleMap,
    /// Text content for text leaves
    pub text: Option<String>,
    /// Control label, used when a control has no explicit children
    pub label: Option<String>,
    /// Size variant: `sm`, `md` or `lg`
    pub size: Option<String>,
    /// Natural width of replaced content (images)
    pub natural_width: Option<f32>,
    /// Natural height of replaced content (images)
    pub natural_height: Option<f32>,
}

/// A node in the input tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyledBox {
    pub id: ElementId,
    pub tag: String,
    #[serde(default)]
    pub props: Props,
    #[serde(default)]
    pub parent_id: Option<ElementId>,
    #[serde(default)]
    pub order_num: f64,
}

impl StyledBox {
    /// Create a parentless box
    pub fn new(id: ElementId, tag: impl Into<String>) -> Self {
        Self {
            id,
            tag: tag.into(),
            props: Props::default(),
            parent_id: None,
            order_num: 0.0,
        }
    }

    /// Set one style declaration
    pub fn with_style(mut self, property: &str, value: impl Into<StyleValue>) -> Self {
        self.props.style.insert(property.to_string(), value.into());
        self
    }

    /// Set the text content
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.props.text = Some(text.into());
        self
    }

    /// Set the control label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.props.label = Some(label.into());
        self
    }

    /// Attach to a parent at the given sibling order
    pub fn child_of(mut self, parent: ElementId, order_num: f64) -> Self {
        self.parent_id = Some(parent);
        self.order_num = order_num;
        self
    }

    /// Style declaration lookup
    pub fn style(&self, property: &str) -> Option<&StyleValue> {
        self.props.style.get(property)
    }
}

/// Read-only access to the document for one frame
pub trait DocumentSource {
    /// Look up one element
    fn element(&self, id: ElementId) -> Option<&StyledBox>;

    /// Children of `id` in sibling order
    fn child_elements(&self, id: ElementId) -> Vec<&StyledBox>;
}

/// In-memory document
#[derive(Debug, Clone, Default)]
pub struct DocumentTree {
    nodes: HashMap<ElementId, StyledBox>,
    children: HashMap<ElementId, Vec<ElementId>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DocumentJson {
    Nodes(Vec<StyledBox>),
    Wrapped { nodes: Vec<StyledBox> },
}

impl DocumentTree {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from a flat node list
    pub fn from_nodes(nodes: impl IntoIterator<Item = StyledBox>) -> Self {
        let mut tree = Self::new();
        for node in nodes {
            tree.insert(node);
        }
        tree
    }

    /// Parse either a bare node array or `{ "nodes": [...] }`
    pub fn from_json_str(json: &str) -> Result<Self> {
        let parsed: DocumentJson = serde_json::from_str(json)?;
        let nodes = match parsed {
            DocumentJson::Nodes(nodes) | DocumentJson::Wrapped { nodes } => nodes,
        };
        Ok(Self::from_nodes(nodes))
    }

    /// Insert or replace a node, keeping sibling order sorted
    pub fn insert(&mut self, node: StyledBox) {
        if let Some(previous) = self.nodes.get(&node.id) {
            if let Some(old_parent) = previous.parent_id {
                if let Some(siblings) = self.children.get_mut(&old_parent) {
                    siblings.retain(|&id| id != node.id);
                }
            }
        }
        let id = node.id;
        let parent = node.parent_id;
        self.nodes.insert(id, node);
        if let Some(parent) = parent {
            let siblings = self.children.entry(parent).or_default();
            siblings.push(id);
            let nodes = &self.nodes;
            siblings.sort_by(|a, b| {
                let oa = nodes.get(a).map_or(0.0, |n| n.order_num);
                let ob = nodes.get(b).map_or(0.0, |n| n.order_num);
                oa.total_cmp(&ob).then(a.cmp(b))
            });
        }
    }

    /// Remove a node and its whole subtree
    pub fn remove(&mut self, id: ElementId) -> Option<StyledBox> {
        let node = self.nodes.remove(&id)?;
        if let Some(parent) = node.parent_id {
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.retain(|&c| c != id);
            }
        }
        for child in self.children.remove(&id).unwrap_or_default() {
            self.remove(child);
        }
        Some(node)
    }

    /// Mutable access to a node's style map
    pub fn style_mut(&mut self, id: ElementId) -> Result<&mut StyleMap> {
        self.nodes
            .get_mut(&id)
            .map(|n| &mut n.props.style)
            .ok_or(LayoutError::UnknownNode(id))
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the document has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// First node without a parent, by id
    pub fn root_id(&self) -> Option<ElementId> {
        self.nodes
            .values()
            .filter(|n| n.parent_id.is_none())
            .map(|n| n.id)
            .min()
    }
}

impl DocumentSource for DocumentTree {
    fn element(&self, id: ElementId) -> Option<&StyledBox> {
        self.nodes.get(&id)
    }

    fn child_elements(&self, id: ElementId) -> Vec<&StyledBox> {
        self.children
            .get(&id)
            .map(|ids| ids.iter().filter_map(|c| self.nodes.get(c)).collect())
            .unwrap_or_default()
    }
}
