//! Default editing actions of the editable surface
//!
//! These stand in for what the browser does natively on key presses inside
//! an editable region: typing, deleting, splitting blocks and moving the
//! caret. Every function works on the live selection of the context and
//! leaves a collapsed (or extended) selection behind.

use crate::commands::blocks::{block_of, selected_blocks, text_blocks};
use crate::context::EditContext;
use crate::dom::{char_to_byte, Document, NodeId};
use crate::input::Motion;
use crate::nodelist::{delete_contents, split_container_at};
use crate::range::{position_at_text_offset, text_length, text_offset_of, Bias, Position, Range};
use anyhow::{Context, Result};

const HEADINGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

fn live_range(ctx: &EditContext) -> Result<Range> {
    ctx.selection_range().context("no selection in the editing root")
}

fn place_caret(ctx: &mut EditContext, pos: Position) {
    ctx.set_selection(Some(Range::collapsed(pos)));
}

/// Previous and next text blocks around `block`
fn neighbours(doc: &Document, root: NodeId, block: NodeId) -> (Option<NodeId>, Option<NodeId>) {
    let blocks = text_blocks(doc, root);
    let Some(index) = blocks.iter().position(|&b| b == block) else {
        return (None, None);
    };
    let prev = index.checked_sub(1).map(|i| blocks[i]);
    (prev, blocks.get(index + 1).copied())
}

fn block_start(doc: &Document, block: NodeId) -> Position {
    position_at_text_offset(doc, block, 0, Bias::Forward)
}

fn block_end(doc: &Document, block: NodeId) -> Position {
    position_at_text_offset(doc, block, text_length(doc, block), Bias::Backward)
}

/// Insert `text` at the caret, replacing any selected content
pub fn insert_text(ctx: &mut EditContext, text: &str) -> Result<()> {
    let range = live_range(ctx)?;
    let mut caret = delete_contents(ctx, &range)?;
    let root = ctx.root();
    let doc = ctx.doc_mut();

    if caret.node == root && doc.child_count(root) == 0 {
        let paragraph = doc.create_element("p");
        doc.append_child(root, paragraph);
        caret = Position::new(paragraph, 0);
    }

    let added = text.chars().count();
    let end = if let Some(existing) = doc.text(caret.node).map(str::to_string) {
        let mut spliced = existing;
        spliced.insert_str(char_to_byte(&spliced, caret.offset), text);
        doc.set_text(caret.node, &spliced);
        Position::new(caret.node, caret.offset + added)
    } else {
        // A lone <br> only keeps an empty block open
        let children = doc.children(caret.node);
        if children.len() == 1 && doc.has_tag(children[0], "br") {
            let filler = children[0];
            doc.detach(filler);
            caret.offset = 0;
        }
        let preceding = caret
            .offset
            .checked_sub(1)
            .and_then(|i| doc.children(caret.node).get(i).copied())
            .filter(|&n| doc.is_text(n));
        match preceding {
            Some(node) => {
                let mut joined = doc.text(node).unwrap_or_default().to_string();
                joined.push_str(text);
                doc.set_text(node, &joined);
                Position::new(node, joined.chars().count())
            }
            None => {
                let node = doc.create_text(text);
                doc.insert_child(caret.node, caret.offset, node);
                Position::new(node, added)
            }
        }
    };
    place_caret(ctx, end);
    Ok(())
}

/// Backspace: delete the selection, the character before the caret, or
/// join the caret's block with the previous one
///
/// Returns false if there was nothing to delete.
pub fn delete_backward(ctx: &mut EditContext) -> Result<bool> {
    let range = live_range(ctx)?;
    let target = if range.is_collapsed() {
        let root = ctx.root();
        let doc = ctx.doc();
        let caret = range.start;
        let offset = text_offset_of(doc, root, &caret).context("caret is detached")?;
        match block_of(doc, root, caret.node) {
            Some(block) if text_offset_of(doc, block, &caret) == Some(0) => {
                let (prev, _) = neighbours(doc, root, block);
                let Some(prev) = prev else {
                    return Ok(false);
                };
                Range::new(
                    Position::new(prev, doc.child_count(prev)),
                    Position::new(block, 0),
                )
            }
            _ if offset == 0 => return Ok(false),
            _ => Range::new(
                position_at_text_offset(doc, root, offset - 1, Bias::Forward),
                position_at_text_offset(doc, root, offset, Bias::Backward),
            ),
        }
    } else {
        range
    };
    let caret = delete_contents(ctx, &target)?;
    place_caret(ctx, caret);
    Ok(true)
}

/// Delete key: the forward counterpart of [`delete_backward`]
pub fn delete_forward(ctx: &mut EditContext) -> Result<bool> {
    let range = live_range(ctx)?;
    let target = if range.is_collapsed() {
        let root = ctx.root();
        let doc = ctx.doc();
        let caret = range.start;
        let offset = text_offset_of(doc, root, &caret).context("caret is detached")?;
        match block_of(doc, root, caret.node) {
            Some(block) if text_offset_of(doc, block, &caret) == Some(text_length(doc, block)) => {
                let (_, next) = neighbours(doc, root, block);
                let Some(next) = next else {
                    return Ok(false);
                };
                Range::new(
                    Position::new(block, doc.child_count(block)),
                    Position::new(next, 0),
                )
            }
            _ if offset >= text_length(doc, root) => return Ok(false),
            _ => Range::new(
                position_at_text_offset(doc, root, offset, Bias::Forward),
                position_at_text_offset(doc, root, offset + 1, Bias::Backward),
            ),
        }
    } else {
        range
    };
    let caret = delete_contents(ctx, &target)?;
    place_caret(ctx, caret);
    Ok(true)
}

/// Detach empty non-void inline elements below `node`
fn prune_empty(doc: &mut Document, node: NodeId) {
    for child in doc.descendants(node).into_iter().rev() {
        if doc.is_element(child)
            && !doc.is_void(child)
            && !doc.is_block(child)
            && doc.child_count(child) == 0
        {
            doc.detach(child);
        }
    }
}

/// Enter: split the caret's block in two and move the caret into the tail
///
/// A heading split at its end continues with a plain paragraph.
pub fn insert_paragraph(ctx: &mut EditContext) -> Result<()> {
    let range = live_range(ctx)?;
    let root = ctx.root();
    let caret = delete_contents(ctx, &range)?;
    let offset = text_offset_of(ctx.doc(), root, &caret).unwrap_or(0);
    let blocks = selected_blocks(ctx, &Range::collapsed(caret))?;

    let doc = ctx.doc_mut();
    let caret = if doc.is_text(caret.node) && doc.is_attached(caret.node) {
        caret
    } else {
        position_at_text_offset(doc, root, offset, Bias::Backward)
    };
    let block = match block_of(doc, root, caret.node) {
        Some(block) => block,
        None => *blocks.first().context("no block to split")?,
    };
    let caret = if doc.contains(block, caret.node) {
        caret
    } else {
        Position::new(block, doc.child_count(block))
    };

    let tail = split_container_at(doc, block, &caret)?;
    prune_empty(doc, block);
    prune_empty(doc, tail);
    if doc.text_nodes(tail).is_empty() && doc.tag(tail).is_some_and(|t| HEADINGS.contains(&t)) {
        doc.rename(tail, "p");
    }
    let start = match doc.text_nodes(tail).first() {
        Some(&text) => Position::new(text, 0),
        None => Position::new(tail, 0),
    };
    place_caret(ctx, start);
    Ok(())
}

/// Move the caret (or the focus end of the selection when `extend`)
pub fn move_caret(ctx: &mut EditContext, motion: Motion, extend: bool) -> Result<()> {
    let range = live_range(ctx)?;
    let root = ctx.root();
    let doc = ctx.doc();

    if !extend && !range.is_collapsed() && matches!(motion, Motion::Left | Motion::Right) {
        let ordered = range.normalized(doc);
        let edge = if motion == Motion::Left {
            ordered.start
        } else {
            ordered.end
        };
        place_caret(ctx, edge);
        return Ok(());
    }

    let focus = range.end;
    let Some(block) = block_of(doc, root, focus.node) else {
        return Ok(());
    };
    let local = text_offset_of(doc, block, &focus).unwrap_or(0);
    let len = text_length(doc, block);
    let (prev, next) = neighbours(doc, root, block);
    let at = |block: NodeId, offset: usize| {
        let bias = if offset == 0 { Bias::Forward } else { Bias::Backward };
        position_at_text_offset(doc, block, offset, bias)
    };

    let target = match motion {
        Motion::Left if local > 0 => at(block, local - 1),
        Motion::Left => prev.map_or(focus, |p| block_end(doc, p)),
        Motion::Right if local < len => at(block, local + 1),
        Motion::Right => next.map_or(focus, |n| block_start(doc, n)),
        Motion::Home => block_start(doc, block),
        Motion::End => block_end(doc, block),
        Motion::Up => prev.map_or(focus, |p| at(p, local.min(text_length(doc, p)))),
        Motion::Down => next.map_or(focus, |n| at(n, local.min(text_length(doc, n)))),
    };

    let moved = if extend {
        Range::new(range.start, target)
    } else {
        Range::collapsed(target)
    };
    ctx.set_selection(Some(moved));
    Ok(())
}
