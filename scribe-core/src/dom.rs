//! Arena-backed DOM model the editing engine operates on

use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::fmt;

/// Handle to a node in a [`Document`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

/// Element payload: lower-cased tag name plus attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
}

/// What a node is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Elements that never carry children
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Block-level containers
const BLOCK_TAGS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "body",
    "dd",
    "div",
    "dl",
    "dt",
    "figure",
    "footer",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "html",
    "li",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "tbody",
    "td",
    "tfoot",
    "th",
    "thead",
    "tr",
    "ul",
];

/// Returns true for elements that cannot have children
pub fn is_void_tag(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

/// Returns true for block-level elements
pub fn is_block_tag(tag: &str) -> bool {
    BLOCK_TAGS.contains(&tag)
}

/// The document arena
///
/// Nodes are never freed; detaching a node only unlinks it from its parent.
/// Every mutation bumps [`Document::revision`].
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    document_node: NodeId,
    revision: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document holding only the document node
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
            document_node: NodeId(0),
            revision: 0,
        }
    }

    pub fn document_node(&self) -> NodeId {
        self.document_node
    }

    /// Mutation counter
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.create_element_with(tag, BTreeMap::new())
    }

    /// Create a detached element with attributes
    pub fn create_element_with(&mut self, tag: &str, attrs: BTreeMap<String, String>) -> NodeId {
        let attrs = attrs
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        self.push(NodeKind::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attrs,
        }))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Element(_))
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Text(_))
    }

    /// Tag name of an element
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Element(el) => Some(el.tag.as_str()),
            _ => None,
        }
    }

    /// Returns true if `id` is an element with the given tag
    pub fn has_tag(&self, id: NodeId, tag: &str) -> bool {
        self.tag(id) == Some(tag)
    }

    pub fn is_block(&self, id: NodeId) -> bool {
        self.tag(id).is_some_and(is_block_tag)
    }

    pub fn is_void(&self, id: NodeId) -> bool {
        self.tag(id).is_some_and(is_void_tag)
    }

    /// Text of a text node
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Text(t) => Some(t.as_str()),
            _ => None,
        }
    }

    pub fn attrs(&self, id: NodeId) -> Option<&BTreeMap<String, String>> {
        match self.kind(id) {
            NodeKind::Element(el) => Some(&el.attrs),
            _ => None,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attrs(id)
            .and_then(|attrs| attrs.get(name))
            .map(String::as_str)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.nodes[id.0].children.len()
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).last().copied()
    }

    /// Position of `id` among its parent's children
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        self.children(parent).get(index + 1).copied()
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        index
            .checked_sub(1)
            .and_then(|i| self.children(parent).get(i).copied())
    }

    /// DOM "length": characters for text nodes, child count otherwise
    pub fn node_len(&self, id: NodeId) -> usize {
        match self.kind(id) {
            NodeKind::Text(t) => t.chars().count(),
            _ => self.child_count(id),
        }
    }

    /// Inclusive containment: true if `ancestor` is `node` or one of its ancestors
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(n) = current {
            out.push(n);
            current = self.parent(n);
        }
        out
    }

    /// Nearest inclusive ancestor of `id` below or equal to `root` satisfying `pred`
    pub fn closest(
        &self,
        id: NodeId,
        root: NodeId,
        mut pred: impl FnMut(&Document, NodeId) -> bool,
    ) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(n) = current {
            if pred(self, n) {
                return Some(n);
            }
            if n == root {
                return None;
            }
            current = self.parent(n);
        }
        None
    }

    /// Preorder descendants of `id`, excluding `id`
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).iter().rev().copied());
        }
        out
    }

    /// Text nodes below `id` in document order
    pub fn text_nodes(&self, id: NodeId) -> Vec<NodeId> {
        if self.is_text(id) {
            return vec![id];
        }
        self.descendants(id)
            .into_iter()
            .filter(|&n| self.is_text(n))
            .collect()
    }

    /// Concatenated text of `id` and its descendants
    pub fn text_content(&self, id: NodeId) -> String {
        self.text_nodes(id)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    /// Child-index path from `ancestor` down to `node`
    pub fn path_from(&self, ancestor: NodeId, node: NodeId) -> Option<Vec<usize>> {
        let mut path = Vec::new();
        let mut current = node;
        while current != ancestor {
            path.push(self.index_in_parent(current)?);
            current = self.parent(current)?;
        }
        path.reverse();
        Some(path)
    }

    /// Resolve a child-index path below `ancestor`
    pub fn node_at_path(&self, ancestor: NodeId, path: &[usize]) -> Option<NodeId> {
        let mut current = ancestor;
        for &index in path {
            current = *self.children(current).get(index)?;
        }
        Some(current)
    }

    /// Returns true if `node` is connected to the document node
    pub fn is_attached(&self, node: NodeId) -> bool {
        self.contains(self.document_node, node)
    }

    /// Unlink `id` from its parent; no-op for detached nodes
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
            self.touch();
        }
    }

    /// Insert `child` into `parent` at `index`, moving it if already attached
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        debug_assert!(!self.contains(child, parent), "cannot insert a node into itself");
        self.detach(child);
        let index = index.min(self.child_count(parent));
        self.nodes[parent.0].children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
        self.touch();
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        // insert_child clamps after detaching, so this lands at the end
        // even when `child` already lives under `parent`.
        let end = self.child_count(parent);
        self.insert_child(parent, end, child);
    }

    /// Insert `node` immediately before `reference`
    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) -> Result<()> {
        self.detach(node);
        let parent = self
            .parent(reference)
            .context("insert_before: reference node is detached")?;
        let index = self.index_in_parent(reference).unwrap_or(0);
        self.insert_child(parent, index, node);
        Ok(())
    }

    /// Insert `node` immediately after `reference`
    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) -> Result<()> {
        self.detach(node);
        let parent = self
            .parent(reference)
            .context("insert_after: reference node is detached")?;
        let index = self.index_in_parent(reference).unwrap_or(0);
        self.insert_child(parent, index + 1, node);
        Ok(())
    }

    /// Move every child of `from` to the end of `to`
    pub fn move_children(&mut self, from: NodeId, to: NodeId) {
        let children: Vec<NodeId> = self.children(from).to_vec();
        for child in children {
            self.append_child(to, child);
        }
    }

    /// Replace `id` with its children, preserving their document position
    pub fn unwrap(&mut self, id: NodeId) -> Result<()> {
        let parent = self.parent(id).context("unwrap: node is detached")?;
        let index = self.index_in_parent(id).unwrap_or(0);
        let children: Vec<NodeId> = self.children(id).to_vec();
        for (offset, child) in children.into_iter().enumerate() {
            self.insert_child(parent, index + offset, child);
        }
        self.detach(id);
        Ok(())
    }

    /// Wrap `node` in a fresh element created from `tag`
    pub fn wrap(&mut self, node: NodeId, tag: &str) -> Result<NodeId> {
        let wrapper = self.create_element(tag);
        self.insert_before(node, wrapper)?;
        self.append_child(wrapper, node);
        Ok(wrapper)
    }

    /// Change an element's tag in place
    pub fn rename(&mut self, id: NodeId, tag: &str) {
        if let NodeKind::Element(el) = &mut self.nodes[id.0].kind {
            el.tag = tag.to_ascii_lowercase();
            self.touch();
        }
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeKind::Element(el) = &mut self.nodes[id.0].kind {
            el.attrs
                .insert(name.to_ascii_lowercase(), value.to_string());
            self.touch();
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<String> {
        let removed = match &mut self.nodes[id.0].kind {
            NodeKind::Element(el) => el.attrs.remove(name),
            _ => None,
        };
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    pub fn set_text(&mut self, id: NodeId, text: &str) {
        if let NodeKind::Text(t) = &mut self.nodes[id.0].kind {
            *t = text.to_string();
            self.touch();
        }
    }

    /// Split a text node at a char offset; returns the new node holding the tail
    ///
    /// The tail node is inserted right after `id` when `id` is attached.
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> Result<NodeId> {
        let text = self
            .text(id)
            .with_context(|| format!("split_text: {} is not a text node", id))?
            .to_string();
        let byte = char_to_byte(&text, offset);
        let (head, tail) = text.split_at(byte);
        let (head, tail) = (head.to_string(), tail.to_string());
        self.set_text(id, &head);
        let tail_node = self.create_text(&tail);
        if self.parent(id).is_some() {
            self.insert_after(id, tail_node)?;
        }
        Ok(tail_node)
    }

    /// Copy of an element (tag and attributes) without children
    pub fn shallow_clone(&mut self, id: NodeId) -> NodeId {
        let kind = self.kind(id).clone();
        self.push(kind)
    }

    /// Detached copy of `id` and its whole subtree
    pub fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let copy = self.shallow_clone(id);
        let children: Vec<NodeId> = self.children(id).to_vec();
        for child in children {
            let child_copy = self.deep_clone(child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    /// Detach every child of `id`
    pub fn clear_children(&mut self, id: NodeId) {
        let children: Vec<NodeId> = self.children(id).to_vec();
        for child in children {
            self.detach(child);
        }
    }

    /// Merge adjacent text nodes and drop empty ones below `id`
    pub fn normalize(&mut self, id: NodeId) {
        let mut index = 0;
        while index < self.child_count(id) {
            let child = self.children(id)[index];
            if let Some(text) = self.text(child).map(str::to_string) {
                if text.is_empty() {
                    self.detach(child);
                    continue;
                }
                if let Some(&next) = self.children(id).get(index + 1) {
                    if let Some(next_text) = self.text(next) {
                        let merged = format!("{}{}", text, next_text);
                        self.set_text(child, &merged);
                        self.detach(next);
                        continue;
                    }
                }
            } else {
                self.normalize(child);
            }
            index += 1;
        }
    }

    /// Structural equality of two subtrees, possibly from different documents
    pub fn structurally_equal(&self, a: NodeId, other: &Document, b: NodeId) -> bool {
        if self.kind(a) != other.kind(b) {
            return false;
        }
        let (left, right) = (self.children(a), other.children(b));
        left.len() == right.len()
            && left
                .iter()
                .zip(right.iter())
                .all(|(&l, &r)| self.structurally_equal(l, other, r))
    }

    /// Verify parent/child links and content-model constraints below `root`
    pub fn check_well_formed(&self, root: NodeId) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if !seen.insert(node) {
                bail!("{} reachable twice (cycle or shared child)", node);
            }
            let children = self.children(node);
            if self.is_text(node) && !children.is_empty() {
                bail!("text {} has children", node);
            }
            if self.is_void(node) && !children.is_empty() {
                bail!("void element {} has children", node);
            }
            for &child in children {
                if self.parent(child) != Some(node) {
                    bail!("{} lists {} as child but parent link differs", node, child);
                }
                stack.push(child);
            }
        }
        Ok(())
    }
}

/// Byte index of a char offset, clamped to the string end
pub(crate) fn char_to_byte(text: &str, offset: usize) -> usize {
    text.char_indices()
        .nth(offset)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, NodeId) {
        let mut doc = Document::new();
        let root = doc.create_element("div");
        let document = doc.document_node();
        doc.append_child(document, root);
        let p = doc.create_element("p");
        doc.append_child(root, p);
        let text = doc.create_text("Hello world");
        doc.append_child(p, text);
        (doc, root)
    }

    #[test]
    fn test_split_text() -> Result<()> {
        let (mut doc, root) = sample();
        let text = doc.text_nodes(root)[0];
        let tail = doc.split_text(text, 5)?;
        assert_eq!(doc.text(text), Some("Hello"));
        assert_eq!(doc.text(tail), Some(" world"));
        assert_eq!(doc.next_sibling(text), Some(tail));
        Ok(())
    }

    #[test]
    fn test_split_text_multibyte() -> Result<()> {
        let mut doc = Document::new();
        let text = doc.create_text("héllo");
        let tail = doc.split_text(text, 2)?;
        assert_eq!(doc.text(text), Some("hé"));
        assert_eq!(doc.text(tail), Some("llo"));
        Ok(())
    }

    #[test]
    fn test_unwrap_preserves_order() -> Result<()> {
        let (mut doc, root) = sample();
        let p = doc.children(root)[0];
        doc.unwrap(p)?;
        assert_eq!(doc.child_count(root), 1);
        assert_eq!(doc.text_content(root), "Hello world");
        doc.check_well_formed(root)?;
        Ok(())
    }

    #[test]
    fn test_normalize_merges_text() {
        let (mut doc, root) = sample();
        let p = doc.children(root)[0];
        let extra = doc.create_text("!");
        let empty = doc.create_text("");
        doc.append_child(p, empty);
        doc.append_child(p, extra);
        doc.normalize(root);
        assert_eq!(doc.child_count(p), 1);
        assert_eq!(doc.text_content(p), "Hello world!");
    }

    #[test]
    fn test_paths_round_trip() {
        let (doc, root) = sample();
        let text = doc.text_nodes(root)[0];
        let path = doc.path_from(root, text).unwrap();
        assert_eq!(path, vec![0, 0]);
        assert_eq!(doc.node_at_path(root, &path), Some(text));
    }

    #[test]
    fn test_append_existing_child_moves_to_end() {
        let mut doc = Document::new();
        let parent = doc.create_element("p");
        let a = doc.create_text("a");
        let b = doc.create_text("b");
        doc.append_child(parent, a);
        doc.append_child(parent, b);
        doc.append_child(parent, a);
        assert_eq!(doc.children(parent), &[b, a]);
    }

    #[test]
    fn test_revision_bumps_on_mutation() {
        let (mut doc, root) = sample();
        let before = doc.revision();
        doc.set_attr(root, "class", "x");
        assert!(doc.revision() > before);
    }

    #[test]
    fn test_structural_equality_across_documents() {
        let (a, root_a) = sample();
        let (b, root_b) = sample();
        assert!(a.structurally_equal(root_a, &b, root_b));
    }
}
