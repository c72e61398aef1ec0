//! A small arena-backed DOM used as the render target for documents.
//!
//! Nodes are never freed; detached nodes simply stop being reachable from the
//! root. Ids stay valid for the life of the fragment.

use pulldown_cmark_escape::escape_html;

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input"];

/// Handle to a node inside a `Fragment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Payload of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    /// An element with a tag name and ordered attributes.
    Element {
        /// Attribute name/value pairs in insertion order.
        attrs: Vec<(String, String)>,
        /// Lowercase tag name.
        tag: String,
    },
    /// A run of text.
    Text(String),
}

/// Arena slot.
#[derive(Debug, Clone)]
struct Node {
    /// Ordered child ids.
    children: Vec<NodeId>,
    /// Element or text payload.
    data: NodeData,
    /// Owning element, `None` for the root and detached nodes.
    parent: Option<NodeId>,
}

/// A rendered document: a root element and everything below it.
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Every node ever created in this fragment.
    nodes: Vec<Node>,
    /// The root element.
    root: NodeId,
}

impl Default for Fragment {
    fn default() -> Self {
        return Self::new("div");
    }
}

impl Fragment {
    /// Create an empty fragment whose root is a `tag` element.
    pub fn new(tag: &str) -> Self {
        let root = Node {
            children: Vec::new(),
            data: NodeData::Element { attrs: Vec::new(), tag: tag.to_string() },
            parent: None,
        };
        return Self { nodes: vec![root], root: NodeId(0) };
    }

    /// Append `child` as the last child of `parent`, detaching it from any previous parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
    }

    /// Attribute value on an element.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        let NodeData::Element { attrs, .. } = self.data(id)? else {
            return None;
        };
        return attrs.iter().find(|(k, _)| return k == name).map(|(_, v)| return v.as_str());
    }

    /// Children of a node, empty for text and unknown ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        return self.node(id).map_or(&[], |n| return n.children.as_slice());
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        return self.push(NodeData::Element { attrs: Vec::new(), tag: tag.to_string() });
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        return self.push(NodeData::Text(text.to_string()));
    }

    /// Payload of a node.
    pub fn data(&self, id: NodeId) -> Option<&NodeData> {
        return self.node(id).map(|n| return &n.data);
    }

    /// Every node below `id` in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        return out;
    }

    /// Remove a node from its parent's child list. The node keeps its own subtree.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(node) = self.node_mut(parent) {
            node.children.retain(|c| return *c != id);
        }
        if let Some(node) = self.node_mut(id) {
            node.parent = None;
        }
    }

    /// Whether an element's `class` attribute contains `class`.
    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        return self.attr(id, "class").is_some_and(|v| return v.split_whitespace().any(|c| return c == class));
    }

    /// Join runs of adjacent text children of `parent` into single text nodes
    /// and drop empty ones.
    pub fn merge_adjacent_text(&mut self, parent: NodeId) {
        let children = self.children(parent).to_vec();
        let mut merged: Vec<NodeId> = Vec::with_capacity(children.len());
        for child in children {
            let Some(text) = self.text(child).map(str::to_string) else {
                merged.push(child);
                continue;
            };
            let previous = merged.last().copied().filter(|p| return self.text(*p).is_some());
            match previous {
                Some(prev) => {
                    if let Some(Node { data: NodeData::Text(existing), .. }) = self.node_mut(prev) {
                        existing.push_str(&text);
                    }
                    if let Some(node) = self.node_mut(child) {
                        node.parent = None;
                    }
                },
                None if text.is_empty() => {
                    if let Some(node) = self.node_mut(child) {
                        node.parent = None;
                    }
                },
                None => merged.push(child),
            }
        }
        if let Some(node) = self.node_mut(parent) {
            node.children = merged;
        }
    }

    /// Shared access to a node.
    fn node(&self, id: NodeId) -> Option<&Node> {
        return self.nodes.get(id.0);
    }

    /// Mutable access to a node.
    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        return self.nodes.get_mut(id.0);
    }

    /// Parent of a node.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        return self.node(id).and_then(|n| return n.parent);
    }

    /// Allocate a node in the arena.
    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node { children: Vec::new(), data, parent: None });
        return id;
    }

    /// Replace `old` in its parent with `replacements`, in order.
    /// Does nothing if `old` is detached.
    pub fn replace_with(&mut self, old: NodeId, replacements: &[NodeId]) {
        let Some(parent) = self.parent(old) else {
            return;
        };
        for &r in replacements {
            self.detach(r);
        }
        let Some(position) = self.children(parent).iter().position(|c| return *c == old) else {
            return;
        };
        if let Some(node) = self.node_mut(parent) {
            node.children.splice(position..=position, replacements.iter().copied());
        }
        for &r in replacements {
            if let Some(node) = self.node_mut(r) {
                node.parent = Some(parent);
            }
        }
        if let Some(node) = self.node_mut(old) {
            node.parent = None;
        }
    }

    /// The root element.
    pub const fn root(&self) -> NodeId {
        return self.root;
    }

    /// Set or replace an attribute on an element.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        let Some(Node { data: NodeData::Element { attrs, .. }, .. }) = self.node_mut(id) else {
            return;
        };
        if let Some(slot) = attrs.iter_mut().find(|(k, _)| return k == name) {
            slot.1 = value.to_string();
        } else {
            attrs.push((name.to_string(), value.to_string()));
        }
    }

    /// Tag name of an element.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        return match self.data(id)? {
            NodeData::Element { tag, .. } => Some(tag.as_str()),
            NodeData::Text(_) => None,
        };
    }

    /// Text of a text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        return match self.data(id)? {
            NodeData::Element { .. } => None,
            NodeData::Text(t) => Some(t.as_str()),
        };
    }

    /// Concatenated text of every text node under `id` whose ancestors all pass `keep`.
    pub fn text_content_filtered(&self, id: NodeId, keep: &dyn Fn(&Self, NodeId) -> bool) -> String {
        let mut out = String::new();
        for node in self.text_nodes(id, keep) {
            out.push_str(self.text(node).unwrap_or_default());
        }
        return out;
    }

    /// Text nodes under `id` in document order, depth-first. Elements for which
    /// `keep` returns false are skipped along with their subtree.
    pub fn text_nodes(&self, id: NodeId, keep: &dyn Fn(&Self, NodeId) -> bool) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            match self.data(current) {
                Some(NodeData::Text(_)) => out.push(current),
                Some(NodeData::Element { .. }) if current == id || keep(self, current) => {
                    stack.extend(self.children(current).iter().rev().copied());
                },
                _ => {},
            }
        }
        return out;
    }

    /// Serialize the subtree under the root's children as HTML.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for &child in self.children(self.root) {
            self.write_html(child, &mut out);
        }
        return out;
    }

    /// Serialize one node and its subtree.
    fn write_html(&self, id: NodeId, out: &mut String) {
        match self.data(id) {
            None => {},
            Some(NodeData::Text(text)) => {
                let _ = escape_html(&mut *out, text);
            },
            Some(NodeData::Element { attrs, tag }) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    let _ = escape_html(&mut *out, value);
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    return;
                }
                for &child in self.children(id) {
                    self.write_html(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            },
        }
    }
}

/// Keep-everything predicate for `text_nodes`.
pub fn keep_all(_fragment: &Fragment, _id: NodeId) -> bool {
    return true;
}
