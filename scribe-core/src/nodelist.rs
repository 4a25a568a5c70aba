//! Node lists: the DOM nodes a selection touches, and the structural
//! operations formatting commands run over them

use crate::context::EditContext;
use crate::dom::{Document, NodeId};
use crate::range::{position_at_text_offset, text_offset_of, Bias, Position, Range, Selection};
use anyhow::{Context, Result};
use std::collections::BTreeMap;

/// Temporary element used to pin range boundaries during surgery
const MARKER_TAG: &str = "scribe-marker";

/// Matches elements by tag (with aliases) and required attributes
///
/// A required attribute with a value must match exactly, except `class`,
/// which matches a single class token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMatcher {
    pub tags: Vec<String>,
    pub attrs: Vec<(String, Option<String>)>,
}

impl TagMatcher {
    pub fn tag(tag: &str) -> Self {
        Self::tags(&[tag])
    }

    pub fn tags(tags: &[&str]) -> Self {
        Self {
            tags: tags.iter().map(|t| t.to_ascii_lowercase()).collect(),
            attrs: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: Option<&str>) -> Self {
        self.attrs
            .push((name.to_ascii_lowercase(), value.map(str::to_string)));
        self
    }

    pub fn with_class(self, class: &str) -> Self {
        self.with_attr("class", Some(class))
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(tag) = doc.tag(node) else {
            return false;
        };
        if !self.tags.iter().any(|t| t == tag) {
            return false;
        }
        self.attrs
            .iter()
            .all(|(name, expected)| match (doc.attr(node, name), expected) {
                (None, _) => false,
                (Some(_), None) => true,
                (Some(actual), Some(expected)) if name == "class" => {
                    actual.split_whitespace().any(|c| c == expected)
                }
                (Some(actual), Some(expected)) => actual == expected,
            })
    }
}

/// How deep [`NodeList::build`] descends into fully covered elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// Emit fully covered elements whole
    Coarse,
    /// Always descend to leaves
    Fine,
}

/// A node touched by the selection
///
/// For text nodes `text_offset`/`char_count` give the covered span; for
/// elements they span the element's whole text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessNode {
    pub node: NodeId,
    pub text_offset: usize,
    pub char_count: usize,
    pub parent: Option<NodeId>,
}

impl ProcessNode {
    /// Returns true for a text node only partly covered
    pub fn is_partial(&self, doc: &Document) -> bool {
        doc.is_text(self.node)
            && (self.text_offset > 0 || self.text_offset + self.char_count < doc.node_len(self.node))
    }
}

/// How much of a selection carries a given formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    All,
    None,
    Mixed,
}

/// The ordered nodes of one selection, built and consumed by a single command
#[derive(Debug, Clone)]
pub struct NodeList {
    nodes: Vec<ProcessNode>,
    common_ancestor: NodeId,
    range: Range,
}

impl NodeList {
    /// Walk the selection in document order
    pub fn build(ctx: &EditContext, selection: &Selection, granularity: Granularity) -> Self {
        let doc = ctx.doc();
        let range = selection.range();
        let common_ancestor = selection.common_ancestor;
        let mut nodes = Vec::new();
        if !selection.is_collapsed {
            if doc.is_text(common_ancestor) {
                let count = selection.end_offset.saturating_sub(selection.start_offset);
                if count > 0 {
                    nodes.push(ProcessNode {
                        node: common_ancestor,
                        text_offset: selection.start_offset,
                        char_count: count,
                        parent: doc.parent(common_ancestor),
                    });
                }
            } else {
                collect(doc, common_ancestor, &range, granularity, &mut nodes);
            }
        }
        Self {
            nodes,
            common_ancestor,
            range,
        }
    }

    pub fn nodes(&self) -> &[ProcessNode] {
        &self.nodes
    }

    pub fn common_ancestor(&self) -> NodeId {
        self.common_ancestor
    }

    pub fn range(&self) -> Range {
        self.range
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Wrap the covered content in `tag` elements
    ///
    /// Content already inside an equivalent wrapper is left alone, nested
    /// equivalent wrappers are flattened and new wrappers merge with
    /// equivalent neighbours, so surrounding twice never double-wraps.
    /// Returns the wrappers holding the content afterwards.
    pub fn surround(
        &self,
        ctx: &mut EditContext,
        tag: &str,
        attrs: &BTreeMap<String, String>,
    ) -> Result<Vec<NodeId>> {
        let root = ctx.root();
        let doc = ctx.doc_mut();
        let tag = tag.to_ascii_lowercase();

        let mut isolated = Vec::with_capacity(self.nodes.len());
        for pn in &self.nodes {
            isolated.push(isolate(doc, pn)?);
        }

        let mut leaves = Vec::new();
        for node in isolated {
            inline_leaves(doc, node, &mut leaves);
        }
        leaves.retain(|&leaf| {
            doc.closest(leaf, root, |d, n| n != root && equivalent(d, n, &tag, attrs))
                .is_none()
        });

        let mut wrappers = Vec::new();
        for run in sibling_runs(doc, &leaves) {
            let wrapper = doc.create_element_with(&tag, attrs.clone());
            doc.insert_before(run[0], wrapper)?;
            for &node in &run {
                doc.append_child(wrapper, node);
            }
            for nested in doc.descendants(wrapper) {
                if equivalent(doc, nested, &tag, attrs) {
                    doc.unwrap(nested)?;
                }
            }
            let merged = merge_adjacent(doc, wrapper, &tag, attrs)?;
            if !wrappers.contains(&merged) {
                wrappers.push(merged);
            }
        }
        doc.normalize(root);
        Ok(wrappers)
    }

    /// Strip elements matching `matcher` from the selection
    pub fn remove_nodes_by_tag(
        &self,
        ctx: &mut EditContext,
        matcher: &TagMatcher,
        keep_children: bool,
    ) -> Result<usize> {
        remove_in_range(ctx, &self.range, matcher, keep_children)
    }

    /// Elements matching any of `matchers` that intersect the selection
    ///
    /// With `full_tag`, ancestors enclosing the whole selection are included
    /// too, which is how a caret inside a link finds that link.
    pub fn get_tags(&self, ctx: &EditContext, matchers: &[TagMatcher], full_tag: bool) -> Vec<NodeId> {
        let doc = ctx.doc();
        let root = ctx.root();
        let matches = |n: NodeId| matchers.iter().any(|m| m.matches(doc, n));
        let mut found = Vec::new();

        for pn in &self.nodes {
            let mut ancestor = pn.parent;
            while let Some(a) = ancestor {
                if a == self.common_ancestor || a == root {
                    break;
                }
                if matches(a) && !found.contains(&a) {
                    found.push(a);
                }
                ancestor = doc.parent(a);
            }
            let subtree = std::iter::once(pn.node).chain(doc.descendants(pn.node));
            for n in subtree {
                if matches(n) && !found.contains(&n) {
                    found.push(n);
                }
            }
        }

        if full_tag {
            let mut enclosing = Some(self.common_ancestor);
            while let Some(a) = enclosing {
                if a == root {
                    break;
                }
                if matches(a) && !found.contains(&a) {
                    found.push(a);
                }
                enclosing = doc.parent(a);
            }
        }

        found.sort_by_key(|&n| Position::before(doc, n).and_then(|p| p.key(doc)));
        found
    }

    /// Links intersecting the selection
    pub fn get_anchors(&self, ctx: &EditContext, full_tag: bool) -> Vec<NodeId> {
        self.get_tags(ctx, &[TagMatcher::tag("a")], full_tag)
    }
}

fn collect(
    doc: &Document,
    parent: NodeId,
    range: &Range,
    granularity: Granularity,
    out: &mut Vec<ProcessNode>,
) {
    for &child in doc.children(parent) {
        if !range.intersects_node(doc, child) {
            continue;
        }
        if doc.is_text(child) {
            let len = doc.node_len(child);
            let start = if range.start.node == child {
                range.start.offset
            } else {
                0
            };
            let end = if range.end.node == child {
                range.end.offset
            } else {
                len
            };
            if end > start {
                out.push(ProcessNode {
                    node: child,
                    text_offset: start,
                    char_count: end - start,
                    parent: Some(parent),
                });
            }
        } else if (granularity == Granularity::Coarse && range.contains_node(doc, child))
            || doc.child_count(child) == 0
        {
            out.push(ProcessNode {
                node: child,
                text_offset: 0,
                char_count: doc.text_content(child).chars().count(),
                parent: Some(parent),
            });
        } else {
            collect(doc, child, range, granularity, out);
        }
    }
}

/// Split a partial text span into its own node
fn isolate(doc: &mut Document, pn: &ProcessNode) -> Result<NodeId> {
    if !pn.is_partial(doc) {
        return Ok(pn.node);
    }
    let mut node = pn.node;
    if pn.text_offset + pn.char_count < doc.node_len(node) {
        doc.split_text(node, pn.text_offset + pn.char_count)?;
    }
    if pn.text_offset > 0 {
        node = doc.split_text(node, pn.text_offset)?;
    }
    Ok(node)
}

/// Inline content of `node`: itself, or the inline children of a block
fn inline_leaves(doc: &Document, node: NodeId, out: &mut Vec<NodeId>) {
    if !doc.is_block(node) {
        out.push(node);
        return;
    }
    let children = doc.children(node);
    let has_blocks = children.iter().any(|&c| doc.is_block(c));
    for &child in children {
        let blank = doc.text(child).is_some_and(|t| t.trim().is_empty());
        if has_blocks && blank {
            continue;
        }
        inline_leaves(doc, child, out);
    }
}

/// Group document-ordered nodes into runs of adjacent siblings
fn sibling_runs(doc: &Document, nodes: &[NodeId]) -> Vec<Vec<NodeId>> {
    let mut runs: Vec<Vec<NodeId>> = Vec::new();
    for &node in nodes {
        match runs.last_mut() {
            Some(run) if run.last().and_then(|&l| doc.next_sibling(l)) == Some(node) => {
                run.push(node)
            }
            _ => runs.push(vec![node]),
        }
    }
    runs
}

fn equivalent(doc: &Document, node: NodeId, tag: &str, attrs: &BTreeMap<String, String>) -> bool {
    doc.tag(node) == Some(tag) && doc.attrs(node) == Some(attrs)
}

fn merge_adjacent(
    doc: &mut Document,
    wrapper: NodeId,
    tag: &str,
    attrs: &BTreeMap<String, String>,
) -> Result<NodeId> {
    let mut current = wrapper;
    if let Some(prev) = doc.prev_sibling(current) {
        if equivalent(doc, prev, tag, attrs) {
            doc.move_children(current, prev);
            doc.detach(current);
            current = prev;
        }
    }
    if let Some(next) = doc.next_sibling(current) {
        if equivalent(doc, next, tag, attrs) {
            doc.move_children(next, current);
            doc.detach(next);
        }
    }
    Ok(current)
}

/// Returns true if the start of the selection sits inside a match
///
/// Mirrors native command-state semantics: only the start is consulted.
/// A non-collapsed selection starting at the very end of a text node is
/// moved forward onto the first selected character.
pub fn is_active_at_start(ctx: &EditContext, selection: &Selection, matcher: &TagMatcher) -> bool {
    let doc = ctx.doc();
    let root = ctx.root();
    let node = effective_start(doc, root, selection);
    doc.closest(node, root, |d, n| n != root && matcher.matches(d, n))
        .is_some()
}

fn effective_start(doc: &Document, root: NodeId, selection: &Selection) -> NodeId {
    let mut start = selection.start();
    if !selection.is_collapsed {
        if let Some(offset) = text_offset_of(doc, root, &start) {
            let forward = position_at_text_offset(doc, root, offset, Bias::Forward);
            if doc.is_text(forward.node) {
                start = forward;
            }
        }
    }
    if doc.is_element(start.node) {
        if let Some(&child) = doc.children(start.node).get(start.offset) {
            return child;
        }
    }
    start.node
}

/// How much of the selected content sits inside a match
pub fn coverage(ctx: &EditContext, selection: &Selection, matcher: &TagMatcher) -> Coverage {
    let doc = ctx.doc();
    let root = ctx.root();
    let list = NodeList::build(ctx, selection, Granularity::Fine);
    let leaves: Vec<NodeId> = list
        .nodes()
        .iter()
        .filter(|pn| match doc.text(pn.node) {
            Some(text) => text
                .chars()
                .skip(pn.text_offset)
                .take(pn.char_count)
                .any(|c| !c.is_whitespace()),
            None => doc.is_void(pn.node),
        })
        .map(|pn| pn.node)
        .collect();
    if leaves.is_empty() {
        return if is_active_at_start(ctx, selection, matcher) {
            Coverage::All
        } else {
            Coverage::None
        };
    }
    let active = leaves
        .iter()
        .filter(|&&leaf| {
            doc.closest(leaf, root, |d, n| n != root && matcher.matches(d, n))
                .is_some()
        })
        .count();
    match active {
        0 => Coverage::None,
        n if n == leaves.len() => Coverage::All,
        _ => Coverage::Mixed,
    }
}

/// Strip elements matching `matcher` from `range`
///
/// Matching ancestors that straddle a boundary are split there first, so
/// only the selected part loses the formatting. A collapsed range unwraps
/// the whole enclosing match. Returns the number of elements removed.
pub fn remove_in_range(
    ctx: &mut EditContext,
    range: &Range,
    matcher: &TagMatcher,
    keep_children: bool,
) -> Result<usize> {
    let root = ctx.root();
    let doc = ctx.doc_mut();
    let range = range.normalized(doc);

    if range.is_collapsed() {
        let enclosing: Vec<NodeId> = std::iter::once(range.start.node)
            .chain(doc.ancestors(range.start.node))
            .take_while(|&n| n != root)
            .filter(|&n| matcher.matches(doc, n))
            .collect();
        for &node in &enclosing {
            strip(doc, node, keep_children)?;
        }
        doc.normalize(root);
        return Ok(enclosing.len());
    }

    let end_marker = insert_marker(doc, &range.end)?;
    let start_marker = insert_marker(doc, &range.start)?;
    let mut touched = Vec::new();

    if let Some(outer) = outermost_match(doc, root, start_marker, matcher) {
        let boundary = Position::before(doc, start_marker).context("start marker detached")?;
        split_at(doc, outer, boundary, &mut touched)?;
    }
    if let Some(outer) = outermost_match(doc, root, end_marker, matcher) {
        let boundary = Position::after(doc, end_marker).context("end marker detached")?;
        split_at(doc, outer, boundary, &mut touched)?;
    }

    let low = climb(doc, root, start_marker, true);
    let high = climb(doc, root, end_marker, false);
    let low_key = Position::before(doc, low)
        .and_then(|p| p.key(doc))
        .context("lower bound detached")?;
    let high_key = Position::after(doc, high)
        .and_then(|p| p.key(doc))
        .context("upper bound detached")?;

    let victims: Vec<NodeId> = doc
        .descendants(root)
        .into_iter()
        .filter(|&n| matcher.matches(doc, n))
        .filter(|&n| {
            let before = Position::before(doc, n).and_then(|p| p.key(doc));
            let after = Position::after(doc, n).and_then(|p| p.key(doc));
            matches!((before, after), (Some(b), Some(a)) if b >= low_key && a <= high_key)
        })
        .collect();
    for &victim in &victims {
        strip(doc, victim, keep_children)?;
    }

    doc.detach(start_marker);
    doc.detach(end_marker);
    for node in touched {
        if node != root && doc.is_element(node) && !doc.is_void(node) && doc.child_count(node) == 0
        {
            doc.detach(node);
        }
    }
    doc.normalize(root);
    Ok(victims.len())
}

fn strip(doc: &mut Document, node: NodeId, keep_children: bool) -> Result<()> {
    if keep_children {
        doc.unwrap(node)
    } else {
        doc.detach(node);
        Ok(())
    }
}

fn insert_marker(doc: &mut Document, pos: &Position) -> Result<NodeId> {
    let marker = doc.create_element(MARKER_TAG);
    insert_at(doc, pos, marker)?;
    Ok(marker)
}

/// Insert `node` at `pos`, splitting a text node when `pos` falls inside one
pub(crate) fn insert_at(doc: &mut Document, pos: &Position, node: NodeId) -> Result<()> {
    if doc.is_text(pos.node) {
        let len = doc.node_len(pos.node);
        if pos.offset == 0 {
            doc.insert_before(pos.node, node)?;
        } else if pos.offset >= len {
            doc.insert_after(pos.node, node)?;
        } else {
            doc.split_text(pos.node, pos.offset)?;
            doc.insert_after(pos.node, node)?;
        }
    } else {
        doc.insert_child(pos.node, pos.offset, node);
    }
    Ok(())
}

fn outermost_match(doc: &Document, root: NodeId, node: NodeId, matcher: &TagMatcher) -> Option<NodeId> {
    doc.ancestors(node)
        .into_iter()
        .take_while(|&n| n != root)
        .filter(|&n| matcher.matches(doc, n))
        .last()
}

/// Climb while `node` is the first (or last) child, stopping below `root`
fn climb(doc: &Document, root: NodeId, node: NodeId, first: bool) -> NodeId {
    let mut current = node;
    while let Some(parent) = doc.parent(current) {
        if parent == root {
            break;
        }
        let edge = if first {
            doc.first_child(parent)
        } else {
            doc.last_child(parent)
        };
        if edge != Some(current) {
            break;
        }
        current = parent;
    }
    current
}

/// Delete the content of `range`, joining the blocks at its two ends
///
/// Returns the caret position afterwards. Inline wrappers emptied by the
/// deletion are removed; an emptied block is kept so the caret has a home.
pub(crate) fn delete_contents(ctx: &mut EditContext, range: &Range) -> Result<Position> {
    let root = ctx.root();
    let doc = ctx.doc_mut();
    let range = range.normalized(doc);
    if range.is_collapsed() {
        return Ok(range.start);
    }

    let end_marker = insert_marker(doc, &range.end)?;
    let start_marker = insert_marker(doc, &range.start)?;
    let low_key = Position::after(doc, start_marker)
        .and_then(|p| p.key(doc))
        .context("start marker detached")?;
    let high_key = Position::before(doc, end_marker)
        .and_then(|p| p.key(doc))
        .context("end marker detached")?;

    let inside: Vec<NodeId> = doc
        .descendants(root)
        .into_iter()
        .filter(|&n| {
            let before = Position::before(doc, n).and_then(|p| p.key(doc));
            let after = Position::after(doc, n).and_then(|p| p.key(doc));
            matches!((before, after), (Some(b), Some(a)) if b >= low_key && a <= high_key)
        })
        .collect();
    for &node in &inside {
        if doc.parent(node).is_some_and(|p| !inside.contains(&p)) {
            doc.detach(node);
        }
    }

    let block_of = |doc: &Document, node: NodeId| {
        doc.closest(node, root, |d, n| n != root && d.is_block(n))
    };
    let start_block = block_of(doc, start_marker);
    let end_block = block_of(doc, end_marker);
    if let (Some(first), Some(second)) = (start_block, end_block) {
        if first != second && !doc.contains(first, second) && !doc.contains(second, first) {
            doc.move_children(second, first);
            let mut empty = Some(second);
            while let Some(node) = empty {
                let parent = doc.parent(node).filter(|&p| p != root);
                doc.detach(node);
                empty = parent.filter(|&p| doc.child_count(p) == 0);
            }
        }
    }

    prune_empty_inlines(doc, root, start_marker, &[start_marker, end_marker])?;
    prune_empty_inlines(doc, root, end_marker, &[start_marker, end_marker])?;

    let caret = Position::before(doc, start_marker).context("start marker detached")?;
    let scope = block_of(doc, start_marker).unwrap_or(root);
    let offset = text_offset_of(doc, scope, &caret).unwrap_or(0);
    doc.detach(start_marker);
    doc.detach(end_marker);
    doc.normalize(root);

    if doc.text_nodes(scope).is_empty() {
        let host = if doc.is_attached(caret.node) { caret.node } else { scope };
        return Ok(Position::new(host, caret.offset.min(doc.child_count(host))));
    }
    let bias = if offset == 0 { Bias::Forward } else { Bias::Backward };
    Ok(position_at_text_offset(doc, scope, offset, bias))
}

/// Unwrap inline ancestors of `marker` that hold nothing but `markers`
fn prune_empty_inlines(
    doc: &mut Document,
    root: NodeId,
    marker: NodeId,
    markers: &[NodeId],
) -> Result<()> {
    let mut current = doc.parent(marker);
    while let Some(node) = current {
        if node == root || doc.is_block(node) {
            break;
        }
        if !doc.children(node).iter().all(|c| markers.contains(c)) {
            break;
        }
        let parent = doc.parent(node);
        doc.unwrap(node)?;
        current = parent;
    }
    Ok(())
}

/// Split `container` at `boundary` (a point inside it)
///
/// Everything after the boundary moves into shallow clones inserted after
/// each split level. Returns the clone of `container`. Both halves of every
/// level are appended to `touched` so empty leftovers can be pruned.
pub(crate) fn split_at(
    doc: &mut Document,
    container: NodeId,
    boundary: Position,
    touched: &mut Vec<NodeId>,
) -> Result<NodeId> {
    let mut parent = boundary.node;
    let mut index = boundary.offset;
    loop {
        let clone = doc.shallow_clone(parent);
        let split = index.min(doc.child_count(parent));
        let moving: Vec<NodeId> = doc.children(parent)[split..].to_vec();
        for child in moving {
            doc.append_child(clone, child);
        }
        doc.insert_after(parent, clone)?;
        touched.push(parent);
        touched.push(clone);
        if parent == container {
            return Ok(clone);
        }
        index = doc
            .index_in_parent(parent)
            .context("split_at: boundary escaped its container")?
            + 1;
        parent = doc
            .parent(parent)
            .context("split_at: boundary escaped its container")?;
    }
}

/// Insert a marker at `pos`, split `container` there, and drop the marker
///
/// Returns the second half. Used by block-splitting edits such as Enter.
pub(crate) fn split_container_at(
    doc: &mut Document,
    container: NodeId,
    pos: &Position,
) -> Result<NodeId> {
    let marker = insert_marker(doc, pos)?;
    let boundary = Position::before(doc, marker).context("marker detached")?;
    let mut touched = Vec::new();
    let tail = split_at(doc, container, boundary, &mut touched)?;
    doc.detach(marker);
    Ok(tail)
}
