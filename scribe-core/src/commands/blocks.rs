//! Block discovery shared by the paragraph-level commands

use crate::context::EditContext;
use crate::dom::{Document, NodeId};
use crate::nodelist::Coverage;
use crate::range::Range;
use anyhow::Result;

/// Blocks that only structure other blocks
const CONTAINER_TAGS: &[&str] = &[
    "ul", "ol", "dl", "table", "tbody", "thead", "tfoot", "tr", "body", "html",
];

/// A block holding inline content directly
pub(crate) fn is_text_block(doc: &Document, node: NodeId) -> bool {
    doc.is_block(node)
        && !doc.is_void(node)
        && !doc.tag(node).is_some_and(|t| CONTAINER_TAGS.contains(&t))
        && !doc.children(node).iter().any(|&c| doc.is_block(c))
}

/// Nearest enclosing text block of `node` below `root`
pub(crate) fn block_of(doc: &Document, root: NodeId, node: NodeId) -> Option<NodeId> {
    doc.closest(node, root, |d, n| n != root && is_text_block(d, n))
}

/// Every text block below `root` in document order
pub(crate) fn text_blocks(doc: &Document, root: NodeId) -> Vec<NodeId> {
    doc.descendants(root)
        .into_iter()
        .filter(|&n| is_text_block(doc, n))
        .collect()
}

/// Text blocks touched by `range`, in document order
///
/// Loose inline content directly under the root is wrapped in paragraphs
/// first, and an empty root gets one, so the result is never empty.
pub(crate) fn selected_blocks(ctx: &mut EditContext, range: &Range) -> Result<Vec<NodeId>> {
    let root = ctx.root();
    let doc = ctx.doc_mut();
    let range = range.normalized(doc);

    let runs: Vec<Vec<NodeId>> = loose_runs(doc, root)
        .into_iter()
        .filter(|run| run.iter().any(|&n| touches(doc, &range, n)))
        .collect();
    let mut blocks: Vec<NodeId> = doc
        .descendants(root)
        .into_iter()
        .filter(|&n| is_text_block(doc, n) && touches(doc, &range, n))
        .collect();

    for run in runs {
        let paragraph = doc.create_element("p");
        doc.insert_before(run[0], paragraph)?;
        for node in run {
            doc.append_child(paragraph, node);
        }
        blocks.push(paragraph);
    }

    if blocks.is_empty() {
        blocks.extend(fallback_block(doc, root, &range));
    }
    if blocks.is_empty() {
        let paragraph = doc.create_element("p");
        doc.append_child(root, paragraph);
        blocks.push(paragraph);
    }

    blocks.sort_by_key(|&n| doc.path_from(root, n));
    blocks.dedup();
    Ok(blocks)
}

/// Text blocks touched by `range`, without wrapping loose content
///
/// Read-only counterpart of [`selected_blocks`] for state queries.
pub(crate) fn touched_blocks(doc: &Document, root: NodeId, range: &Range) -> Vec<NodeId> {
    let range = range.normalized(doc);
    let mut blocks: Vec<NodeId> = doc
        .descendants(root)
        .into_iter()
        .filter(|&n| is_text_block(doc, n) && touches(doc, &range, n))
        .collect();
    if blocks.is_empty() {
        blocks.extend(
            block_of(doc, root, range.start.node).or_else(|| fallback_block(doc, root, &range)),
        );
    }
    blocks
}

/// How many of `blocks` satisfy `has`
pub(crate) fn block_coverage(blocks: &[NodeId], has: impl Fn(NodeId) -> bool) -> Coverage {
    match blocks.iter().filter(|&&b| has(b)).count() {
        0 => Coverage::None,
        n if n == blocks.len() => Coverage::All,
        _ => Coverage::Mixed,
    }
}

/// Returns true if `node` intersects `range`, or holds a collapsed caret
fn touches(doc: &Document, range: &Range, node: NodeId) -> bool {
    range.intersects_node(doc, node) || range.start.node == node
}

/// Runs of adjacent inline children of `root`
fn loose_runs(doc: &Document, root: NodeId) -> Vec<Vec<NodeId>> {
    let mut runs: Vec<Vec<NodeId>> = Vec::new();
    let mut current: Vec<NodeId> = Vec::new();
    for &child in doc.children(root) {
        if doc.is_block(child) {
            if !current.is_empty() {
                runs.push(std::mem::take(&mut current));
            }
        } else {
            current.push(child);
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs.retain(|run| {
        run.iter()
            .any(|&n| !doc.text(n).is_some_and(|t| t.trim().is_empty()))
    });
    runs
}

/// Block next to a caret sitting between root children
fn fallback_block(doc: &Document, root: NodeId, range: &Range) -> Option<NodeId> {
    let children = doc.children(root);
    let index = if range.start.node == root {
        range.start.offset.min(children.len().saturating_sub(1))
    } else {
        return None;
    };
    let candidate = *children.get(index)?;
    if is_text_block(doc, candidate) {
        return Some(candidate);
    }
    doc.descendants(candidate)
        .into_iter()
        .find(|&n| is_text_block(doc, n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SurfaceKind;
    use crate::html::HtmlProcessor;
    use crate::range::Position;

    fn context(html: &str) -> EditContext {
        let mut doc = Document::new();
        let root = doc.create_element("div");
        let document = doc.document_node();
        doc.append_child(document, root);
        let mut ctx = EditContext::new(doc, root, None, SurfaceKind::Container);
        HtmlProcessor::permissive().set_content(&mut ctx, html).unwrap();
        ctx
    }

    #[test]
    fn test_blocks_across_list_items() -> Result<()> {
        let mut ctx = context("<p>a</p><ul><li>b</li><li>c</li></ul>");
        let root = ctx.root();
        let texts = ctx.doc().text_nodes(root);
        let range = Range::new(Position::new(texts[0], 0), Position::new(texts[1], 1));
        let blocks = selected_blocks(&mut ctx, &range)?;
        let tags: Vec<&str> = blocks.iter().filter_map(|&b| ctx.doc().tag(b)).collect();
        assert_eq!(tags, vec!["p", "li"]);
        Ok(())
    }

    #[test]
    fn test_loose_text_gets_wrapped() -> Result<()> {
        let mut ctx = context("loose <b>text</b><p>para</p>");
        let root = ctx.root();
        let first = ctx.doc().text_nodes(root)[0];
        let blocks = selected_blocks(&mut ctx, &Range::collapsed(Position::new(first, 2)))?;
        assert_eq!(blocks.len(), 1);
        assert_eq!(
            HtmlProcessor::permissive().serialize(&ctx),
            "<p>loose <b>text</b></p><p>para</p>"
        );
        Ok(())
    }

    #[test]
    fn test_empty_root_gets_paragraph() -> Result<()> {
        let mut ctx = context("");
        let root = ctx.root();
        let blocks = selected_blocks(&mut ctx, &Range::collapsed(Position::new(root, 0)))?;
        assert_eq!(blocks.len(), 1);
        assert_eq!(ctx.doc().tag(blocks[0]), Some("p"));
        Ok(())
    }

    #[test]
    fn test_touched_blocks_leaves_document_alone() {
        let ctx = context("loose<p>one</p><p>two</p>");
        let root = ctx.root();
        let texts = ctx.doc().text_nodes(root);
        let range = Range::new(Position::new(texts[1], 1), Position::new(texts[2], 1));
        let blocks = touched_blocks(ctx.doc(), root, &range);
        assert_eq!(blocks.len(), 2);
        assert_eq!(
            block_coverage(&blocks, |b| b == blocks[0]),
            Coverage::Mixed
        );
        assert_eq!(block_coverage(&blocks, |_| true), Coverage::All);
        assert_eq!(
            HtmlProcessor::permissive().serialize(&ctx),
            "loose<p>one</p><p>two</p>"
        );
    }
}
