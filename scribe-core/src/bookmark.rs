//! Range bookmarks that survive DOM mutation

use crate::context::EditContext;
use crate::dom::{Document, NodeId};
use crate::range::{
    capture_selection, position_at_text_offset, text_length, text_offset_of, Bias, Position, Range,
};
use log::debug;
use serde::{Deserialize, Serialize};

/// One boundary of a bookmark, encoded two ways
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryMark {
    /// Child-index path from the editing root to the boundary node
    pub path: Vec<usize>,
    pub offset: usize,
    /// Characters of root text preceding the boundary
    pub text_offset: usize,
}

impl BoundaryMark {
    fn capture(doc: &Document, root: NodeId, pos: &Position) -> Option<Self> {
        Some(Self {
            path: doc.path_from(root, pos.node)?,
            offset: pos.offset,
            text_offset: text_offset_of(doc, root, pos)?,
        })
    }

    fn resolve_exact(&self, doc: &Document, root: NodeId) -> Option<Position> {
        let node = doc.node_at_path(root, &self.path)?;
        let pos = Position::new(node, self.offset);
        pos.is_valid(doc).then_some(pos)
    }

    /// Deepest node on the recorded path that still exists
    fn resolve_nearest(&self, doc: &Document, root: NodeId) -> Position {
        let mut node = root;
        for &index in &self.path {
            match doc.children(node).get(index) {
                Some(&child) => node = child,
                None => return Position::new(node, index.min(doc.child_count(node))),
            }
        }
        Position::new(node, self.offset.min(doc.node_len(node)))
    }
}

/// A DOM-independent encoding of a selection
///
/// The path encoding reproduces the selection exactly on an unmodified
/// document; the text-offset encoding lands on the same logical position
/// after structural edits that keep the text intact (wrapping, unwrapping,
/// splitting).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeBookmark {
    pub revision: u64,
    pub collapsed: bool,
    pub start: BoundaryMark,
    pub end: BoundaryMark,
}

impl RangeBookmark {
    pub fn from_range(doc: &Document, root: NodeId, range: &Range) -> Option<Self> {
        let range = range.normalized(doc);
        Some(Self {
            revision: doc.revision(),
            collapsed: range.is_collapsed(),
            start: BoundaryMark::capture(doc, root, &range.start)?,
            end: BoundaryMark::capture(doc, root, &range.end)?,
        })
    }

    fn resolve_exact(&self, doc: &Document, root: NodeId) -> Option<Range> {
        Some(Range::new(
            self.start.resolve_exact(doc, root)?,
            self.end.resolve_exact(doc, root)?,
        ))
    }

    fn resolve_by_text(&self, doc: &Document, root: NodeId) -> Range {
        if text_length(doc, root) == 0 {
            return Range::new(
                self.start.resolve_nearest(doc, root),
                self.end.resolve_nearest(doc, root),
            );
        }
        let end = position_at_text_offset(doc, root, self.end.text_offset, Bias::Backward);
        if self.collapsed {
            return Range::collapsed(end);
        }
        let start = position_at_text_offset(doc, root, self.start.text_offset, Bias::Forward);
        Range::new(start, end).normalized(doc)
    }
}

/// Bookmark the live selection of `ctx`
pub fn create_bookmark(ctx: &EditContext) -> Option<RangeBookmark> {
    let selection = capture_selection(ctx)?;
    RangeBookmark::from_range(ctx.doc(), ctx.root(), &selection.range())
}

/// Restore a bookmark, exact when the document is unmodified
///
/// Returns false and leaves focus on the root when nothing can be resolved.
pub fn restore_bookmark(ctx: &mut EditContext, bookmark: &RangeBookmark) -> bool {
    if ctx.doc().revision() == bookmark.revision {
        if let Some(range) = bookmark.resolve_exact(ctx.doc(), ctx.root()) {
            ctx.set_selection(Some(range));
            return true;
        }
    }
    restore_by_text(ctx, bookmark)
}

/// Restore a bookmark by path first, regardless of revision
///
/// Used when the markup was restored verbatim from the bookmarked state.
pub fn restore_bookmark_structural(ctx: &mut EditContext, bookmark: &RangeBookmark) -> bool {
    if let Some(range) = bookmark.resolve_exact(ctx.doc(), ctx.root()) {
        ctx.set_selection(Some(range));
        return true;
    }
    restore_by_text(ctx, bookmark)
}

fn restore_by_text(ctx: &mut EditContext, bookmark: &RangeBookmark) -> bool {
    let root = ctx.root();
    if !ctx.root_attached() {
        debug!("bookmark restore skipped: editing root is detached");
        ctx.window_mut().focused = Some(root);
        return false;
    }
    let range = bookmark.resolve_by_text(ctx.doc(), root);
    ctx.set_selection(Some(range));
    true
}
