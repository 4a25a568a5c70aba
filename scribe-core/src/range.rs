//! Selection and range model
//!
//! Positions are DOM boundary points (`node`, `offset`): a char offset inside
//! a text node, or a child index inside an element. Ordering between two
//! positions is computed from their child-index paths, so it stays correct
//! regardless of which nodes the positions reference.

use crate::context::EditContext;
use crate::dom::{Document, NodeId};
use std::cmp::Ordering;

/// A boundary point in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub node: NodeId,
    pub offset: usize,
}

impl Position {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }

    /// The point immediately before `node` in its parent
    pub fn before(doc: &Document, node: NodeId) -> Option<Self> {
        Some(Self::new(doc.parent(node)?, doc.index_in_parent(node)?))
    }

    /// The point immediately after `node` in its parent
    pub fn after(doc: &Document, node: NodeId) -> Option<Self> {
        Some(Self::new(doc.parent(node)?, doc.index_in_parent(node)? + 1))
    }

    /// Sort key: the node's path from the document node followed by the offset
    ///
    /// A point in an element sorts before everything inside the child at
    /// that index because a prefix orders first.
    pub fn key(&self, doc: &Document) -> Option<Vec<usize>> {
        let mut path = doc.path_from(doc.document_node(), self.node)?;
        path.push(self.offset);
        Some(path)
    }

    /// Returns true if the offset is within the node's length
    pub fn is_valid(&self, doc: &Document) -> bool {
        self.offset <= doc.node_len(self.node)
    }
}

/// Document-order comparison; `None` if either position is detached
pub fn compare(doc: &Document, a: &Position, b: &Position) -> Option<Ordering> {
    Some(a.key(doc)?.cmp(&b.key(doc)?))
}

/// A start/end pair of positions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// A caret at `pos`
    pub fn collapsed(pos: Position) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Range covering the whole of `node`
    pub fn around(doc: &Document, node: NodeId) -> Option<Self> {
        Some(Self::new(
            Position::before(doc, node)?,
            Position::after(doc, node)?,
        ))
    }

    /// Range covering the contents of `node`
    pub fn contents(doc: &Document, node: NodeId) -> Self {
        Self::new(
            Position::new(node, 0),
            Position::new(node, doc.node_len(node)),
        )
    }

    /// Swap the boundaries if the end precedes the start
    pub fn normalized(&self, doc: &Document) -> Self {
        match compare(doc, &self.start, &self.end) {
            Some(Ordering::Greater) => Self::new(self.end, self.start),
            _ => *self,
        }
    }

    /// Deepest node containing both boundaries
    pub fn common_ancestor(&self, doc: &Document) -> Option<NodeId> {
        let mut current = Some(self.start.node);
        while let Some(node) = current {
            if doc.contains(node, self.end.node) {
                return Some(node);
            }
            current = doc.parent(node);
        }
        None
    }

    /// Returns true if the whole of `node` lies inside the range
    pub fn contains_node(&self, doc: &Document, node: NodeId) -> bool {
        let (Some(before), Some(after)) = (Position::before(doc, node), Position::after(doc, node))
        else {
            return false;
        };
        matches!(
            compare(doc, &before, &self.start),
            Some(Ordering::Greater | Ordering::Equal)
        ) && matches!(
            compare(doc, &after, &self.end),
            Some(Ordering::Less | Ordering::Equal)
        )
    }

    /// Returns true if any part of `node` lies inside the range
    pub fn intersects_node(&self, doc: &Document, node: NodeId) -> bool {
        let (Some(before), Some(after)) = (Position::before(doc, node), Position::after(doc, node))
        else {
            return false;
        };
        matches!(compare(doc, &before, &self.end), Some(Ordering::Less))
            && matches!(compare(doc, &after, &self.start), Some(Ordering::Greater))
    }
}

/// A validated snapshot of the user's selection
///
/// Derived fresh from the live window state on every command; never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub is_collapsed: bool,
    pub start_node: NodeId,
    pub start_offset: usize,
    pub end_node: NodeId,
    pub end_offset: usize,
    pub common_ancestor: NodeId,
}

impl Selection {
    /// Validate `range` against `root`; `None` if it cannot be resolved
    pub fn from_range(doc: &Document, root: NodeId, range: &Range) -> Option<Self> {
        let range = range.normalized(doc);
        for pos in [range.start, range.end] {
            if !doc.is_attached(pos.node) || !doc.contains(root, pos.node) || !pos.is_valid(doc)
            {
                return None;
            }
        }
        let common_ancestor = range.common_ancestor(doc)?;
        Some(Self {
            is_collapsed: range.is_collapsed(),
            start_node: range.start.node,
            start_offset: range.start.offset,
            end_node: range.end.node,
            end_offset: range.end.offset,
            common_ancestor,
        })
    }

    pub fn start(&self) -> Position {
        Position::new(self.start_node, self.start_offset)
    }

    pub fn end(&self) -> Position {
        Position::new(self.end_node, self.end_offset)
    }

    pub fn range(&self) -> Range {
        Range::new(self.start(), self.end())
    }

    /// The single element selected as a whole (an image, say)
    pub fn selected_element(&self, doc: &Document) -> Option<NodeId> {
        if self.start_node != self.end_node
            || !doc.is_element(self.start_node)
            || self.end_offset != self.start_offset + 1
        {
            return None;
        }
        let child = *doc.children(self.start_node).get(self.start_offset)?;
        doc.is_element(child).then_some(child)
    }
}

/// Capture the live selection of `ctx` as a [`Selection`]
pub fn capture_selection(ctx: &EditContext) -> Option<Selection> {
    let range = ctx.selection_range()?;
    Selection::from_range(ctx.doc(), ctx.root(), &range)
}

/// Which side of a text-node boundary a text offset resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    /// Prefer the start of the following text node
    Forward,
    /// Prefer the end of the preceding text node
    Backward,
}

/// Total number of characters in the text below `root`
pub fn text_length(doc: &Document, root: NodeId) -> usize {
    doc.text_nodes(root).iter().map(|&t| doc.node_len(t)).sum()
}

/// Characters of text below `root` that precede `pos`
pub fn text_offset_of(doc: &Document, root: NodeId, pos: &Position) -> Option<usize> {
    let target = pos.key(doc)?;
    let mut acc = 0;
    for text in doc.text_nodes(root) {
        let len = doc.node_len(text);
        if text == pos.node {
            return Some(acc + pos.offset.min(len));
        }
        let end_key = Position::new(text, len).key(doc)?;
        if end_key <= target {
            acc += len;
        } else {
            break;
        }
    }
    Some(acc)
}

/// Resolve a text offset below `root` to a position inside a text node
///
/// Offsets past the end clamp to the end of the last text node; a root
/// without text resolves to its first or last child boundary.
pub fn position_at_text_offset(doc: &Document, root: NodeId, offset: usize, bias: Bias) -> Position {
    let mut acc = 0;
    let mut last = None;
    for text in doc.text_nodes(root) {
        let len = doc.node_len(text);
        if len == 0 {
            continue;
        }
        let hit = match bias {
            Bias::Backward => offset <= acc + len,
            Bias::Forward => offset < acc + len,
        };
        if hit {
            return Position::new(text, offset.saturating_sub(acc));
        }
        acc += len;
        last = Some(text);
    }
    match (last, bias) {
        (Some(text), _) => Position::new(text, doc.node_len(text)),
        (None, Bias::Forward) => Position::new(root, 0),
        (None, Bias::Backward) => Position::new(root, doc.child_count(root)),
    }
}

/// Shrink `range` past leading and trailing whitespace
pub fn trim_whitespace(doc: &Document, root: NodeId, range: &Range) -> Range {
    let (Some(start), Some(end)) = (
        text_offset_of(doc, root, &range.start),
        text_offset_of(doc, root, &range.end),
    ) else {
        return *range;
    };
    if end <= start {
        return *range;
    }
    let text: Vec<char> = doc.text_content(root).chars().collect();
    let slice = &text[start.min(text.len())..end.min(text.len())];
    let leading = slice.iter().take_while(|c| c.is_whitespace()).count();
    if leading == slice.len() {
        return Range::collapsed(position_at_text_offset(doc, root, start, Bias::Backward));
    }
    let trailing = slice.iter().rev().take_while(|c| c.is_whitespace()).count();
    if leading == 0 && trailing == 0 {
        return *range;
    }
    Range::new(
        position_at_text_offset(doc, root, start + leading, Bias::Forward),
        position_at_text_offset(doc, root, end - trailing, Bias::Backward),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `<div><p>Hello <b>big</b> world</p></div>`
    fn sample() -> (Document, NodeId, Vec<NodeId>) {
        let mut doc = Document::new();
        let root = doc.create_element("div");
        let document = doc.document_node();
        doc.append_child(document, root);
        let p = doc.create_element("p");
        doc.append_child(root, p);
        let a = doc.create_text("Hello ");
        let b = doc.create_element("b");
        let big = doc.create_text("big");
        let c = doc.create_text(" world");
        doc.append_child(p, a);
        doc.append_child(p, b);
        doc.append_child(b, big);
        doc.append_child(p, c);
        (doc, root, vec![p, a, b, big, c])
    }

    #[test]
    fn test_compare_element_and_text_positions() {
        let (doc, _, nodes) = sample();
        let (p, a, big) = (nodes[0], nodes[1], nodes[3]);
        let in_a = Position::new(a, 3);
        let before_b = Position::new(p, 1);
        let in_big = Position::new(big, 0);
        assert_eq!(compare(&doc, &in_a, &before_b), Some(Ordering::Less));
        assert_eq!(compare(&doc, &before_b, &in_big), Some(Ordering::Less));
        assert_eq!(
            compare(&doc, &Position::new(p, 2), &in_big),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn test_selection_normalizes_backwards_range() {
        let (doc, root, nodes) = sample();
        let range = Range::new(Position::new(nodes[4], 2), Position::new(nodes[1], 1));
        let sel = Selection::from_range(&doc, root, &range).unwrap();
        assert_eq!(sel.start_node, nodes[1]);
        assert_eq!(sel.end_node, nodes[4]);
        assert_eq!(sel.common_ancestor, nodes[0]);
        assert!(!sel.is_collapsed);
    }

    #[test]
    fn test_selection_rejects_out_of_bounds_offset() {
        let (doc, root, nodes) = sample();
        let range = Range::collapsed(Position::new(nodes[1], 99));
        assert!(Selection::from_range(&doc, root, &range).is_none());
    }

    #[test]
    fn test_selected_element() {
        let (doc, root, nodes) = sample();
        let range = Range::new(Position::new(nodes[0], 1), Position::new(nodes[0], 2));
        let sel = Selection::from_range(&doc, root, &range).unwrap();
        assert_eq!(sel.selected_element(&doc), Some(nodes[2]));
    }

    #[test]
    fn test_text_offsets() {
        let (doc, root, nodes) = sample();
        assert_eq!(text_length(&doc, root), 15);
        assert_eq!(text_offset_of(&doc, root, &Position::new(nodes[3], 1)), Some(7));
        assert_eq!(text_offset_of(&doc, root, &Position::new(nodes[0], 2)), Some(9));
        assert_eq!(
            position_at_text_offset(&doc, root, 6, Bias::Backward),
            Position::new(nodes[1], 6)
        );
        assert_eq!(
            position_at_text_offset(&doc, root, 6, Bias::Forward),
            Position::new(nodes[3], 0)
        );
    }

    #[test]
    fn test_trim_whitespace() {
        let (doc, root, nodes) = sample();
        // " big " spans the space before and after the bold word
        let range = Range::new(Position::new(nodes[1], 5), Position::new(nodes[4], 1));
        let trimmed = trim_whitespace(&doc, root, &range);
        assert_eq!(trimmed.start, Position::new(nodes[3], 0));
        assert_eq!(trimmed.end, Position::new(nodes[3], 3));
    }
}
