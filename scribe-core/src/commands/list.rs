//! Ordered and unordered lists

use super::blocks::{block_coverage, selected_blocks, touched_blocks};
use super::{Command, CommandName, CommandState, ExecDef, Outcome, ProcessingOptions, SelectionDef};
use crate::dom::{Document, NodeId};
use anyhow::{Context, Result};

const LIST_TAGS: &[&str] = &["ul", "ol"];

/// Blocks that become list items by renaming; anything else is nested
const PLAIN_BLOCKS: &[&str] = &["p", "div"];

fn is_list(doc: &Document, node: NodeId) -> bool {
    doc.tag(node).is_some_and(|t| LIST_TAGS.contains(&t))
}

/// The list item holding `block`, if any
fn item_of(doc: &Document, root: NodeId, block: NodeId) -> Option<NodeId> {
    doc.closest(block, root, |d, n| n != root && d.has_tag(n, "li"))
        .filter(|&li| doc.parent(li).is_some_and(|p| is_list(doc, p)))
}

/// Move `item` out of its list, splitting the list around it
fn lift_item(doc: &mut Document, item: NodeId) -> Result<()> {
    let list = doc.parent(item).context("list item is detached")?;
    let index = doc.index_in_parent(item).context("list item is detached")?;
    let tail: Vec<NodeId> = doc.children(list)[index + 1..].to_vec();
    if !tail.is_empty() {
        let rest = doc.shallow_clone(list);
        for node in tail {
            doc.append_child(rest, node);
        }
        doc.insert_after(list, rest)?;
    }

    if doc.children(item).iter().any(|&c| doc.is_block(c)) {
        let children: Vec<NodeId> = doc.children(item).to_vec();
        for &child in children.iter().rev() {
            doc.insert_after(list, child)?;
        }
        doc.detach(item);
    } else {
        doc.rename(item, "p");
        doc.insert_after(list, item)?;
    }

    if doc.child_count(list) == 0 {
        doc.detach(list);
    }
    Ok(())
}

/// Group document-ordered blocks into runs of adjacent siblings
fn sibling_runs(doc: &Document, blocks: &[NodeId]) -> Vec<Vec<NodeId>> {
    let mut runs: Vec<Vec<NodeId>> = Vec::new();
    for &block in blocks {
        match runs.last_mut() {
            Some(run) if run.last().and_then(|&l| doc.next_sibling(l)) == Some(block) => {
                run.push(block)
            }
            _ => runs.push(vec![block]),
        }
    }
    runs
}

/// Fold `list` into equal-typed neighbours; returns the surviving list
fn merge_neighbours(doc: &mut Document, list: NodeId) -> NodeId {
    let tag = doc.tag(list).map(str::to_string);
    let same = |doc: &Document, n: NodeId| doc.tag(n).map(str::to_string) == tag;
    let mut current = list;
    if let Some(prev) = doc.prev_sibling(current).filter(|&p| same(doc, p)) {
        doc.move_children(current, prev);
        doc.detach(current);
        current = prev;
    }
    if let Some(next) = doc.next_sibling(current).filter(|&n| same(doc, n)) {
        doc.move_children(next, current);
        doc.detach(next);
    }
    current
}

/// Toggles an ordered or unordered list over the selected blocks
///
/// Items already in a list of the other type switch type; items of this
/// type are lifted out as paragraphs, splitting their list.
#[derive(Debug, Clone, Copy)]
pub struct ListToggle {
    name: CommandName,
    tag: &'static str,
}

impl ListToggle {
    pub fn ordered() -> Self {
        Self {
            name: CommandName::InsertOrderedList,
            tag: "ol",
        }
    }

    pub fn unordered() -> Self {
        Self {
            name: CommandName::InsertUnorderedList,
            tag: "ul",
        }
    }

    fn in_own_list(&self, doc: &Document, item: NodeId) -> bool {
        doc.parent(item).is_some_and(|l| doc.has_tag(l, self.tag))
    }

    fn create(&self, doc: &mut Document, blocks: &[NodeId]) -> Result<()> {
        for run in sibling_runs(doc, blocks) {
            let list = doc.create_element(self.tag);
            doc.insert_before(run[0], list)?;
            for block in run {
                let plain = doc.tag(block).is_some_and(|t| PLAIN_BLOCKS.contains(&t));
                if plain {
                    doc.rename(block, "li");
                    doc.append_child(list, block);
                } else {
                    let item = doc.create_element("li");
                    doc.append_child(list, item);
                    doc.append_child(item, block);
                }
            }
            merge_neighbours(doc, list);
        }
        Ok(())
    }
}

impl Command for ListToggle {
    fn name(&self) -> CommandName {
        self.name
    }

    fn processing_options(&self) -> ProcessingOptions {
        ProcessingOptions::SELECTION | ProcessingOptions::BOOKMARK
    }

    fn execute(&self, exec: &mut ExecDef<'_>) -> Result<Outcome> {
        let selection = exec.require_selection()?;
        let root = exec.ctx.root();
        let blocks = selected_blocks(exec.ctx, &selection.range())?;
        let doc = exec.ctx.doc_mut();

        let mut items = Vec::new();
        let mut loose = Vec::new();
        for &block in &blocks {
            match item_of(doc, root, block) {
                Some(item) if !items.contains(&item) => items.push(item),
                Some(_) => {}
                None => loose.push(block),
            }
        }

        let start_listed = blocks
            .first()
            .and_then(|&b| item_of(doc, root, b))
            .is_some_and(|item| self.in_own_list(doc, item));
        if start_listed {
            for item in items {
                if self.in_own_list(doc, item) {
                    lift_item(doc, item)?;
                }
            }
            return Ok(Outcome::Removed);
        }

        let mut switched = Vec::new();
        for &item in &items {
            let Some(list) = doc.parent(item) else { continue };
            if !doc.has_tag(list, self.tag) && !switched.contains(&list) {
                doc.rename(list, self.tag);
                switched.push(list);
            }
        }
        for list in switched {
            if doc.is_attached(list) {
                merge_neighbours(doc, list);
            }
        }
        self.create(doc, &loose)?;
        Ok(Outcome::Applied)
    }

    fn query_state(&self, def: &SelectionDef<'_>) -> CommandState {
        let Some(selection) = &def.selection else {
            return CommandState::Disabled;
        };
        let doc = def.ctx.doc();
        let root = def.ctx.root();
        let blocks = touched_blocks(doc, root, &selection.range());
        block_coverage(&blocks, |b| {
            item_of(doc, root, b).is_some_and(|item| self.in_own_list(doc, item))
        })
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{context, html, run, select, state};
    use crate::commands::CommandValue;

    #[test]
    fn test_paragraphs_become_list_and_back() -> Result<()> {
        let ordered = ListToggle::ordered();
        let mut ctx = context("<p>one</p><p>two</p>");
        select(&mut ctx, 1, 5);
        assert_eq!(run(&ordered, &mut ctx, CommandValue::None)?, Outcome::Applied);
        assert_eq!(html(&ctx), "<ol><li>one</li><li>two</li></ol>");
        assert_eq!(state(&ordered, &ctx, &CommandValue::None), CommandState::Active);

        assert_eq!(run(&ordered, &mut ctx, CommandValue::None)?, Outcome::Removed);
        assert_eq!(html(&ctx), "<p>one</p><p>two</p>");
        Ok(())
    }

    #[test]
    fn test_partly_listed_selection_follows_start() -> Result<()> {
        let unordered = ListToggle::unordered();
        let mut ctx = context("<ul><li>one</li></ul><p>two</p>");
        select(&mut ctx, 1, 5);
        assert_eq!(
            state(&unordered, &ctx, &CommandValue::None),
            CommandState::Indeterminate
        );
        assert_eq!(run(&unordered, &mut ctx, CommandValue::None)?, Outcome::Removed);
        assert_eq!(html(&ctx), "<p>one</p><p>two</p>");

        let mut ctx = context("<p>one</p><ul><li>two</li></ul>");
        select(&mut ctx, 1, 5);
        assert_eq!(run(&unordered, &mut ctx, CommandValue::None)?, Outcome::Applied);
        assert_eq!(html(&ctx), "<ul><li>one</li><li>two</li></ul>");
        Ok(())
    }

    #[test]
    fn test_switch_list_type() -> Result<()> {
        let mut ctx = context("<ul><li>a</li></ul>");
        select(&mut ctx, 1, 1);
        run(&ListToggle::ordered(), &mut ctx, CommandValue::None)?;
        assert_eq!(html(&ctx), "<ol><li>a</li></ol>");
        Ok(())
    }

    #[test]
    fn test_lifting_middle_item_splits_list() -> Result<()> {
        let mut ctx = context("<ul><li>a</li><li>b</li><li>c</li></ul>");
        select(&mut ctx, 2, 2);
        run(&ListToggle::unordered(), &mut ctx, CommandValue::None)?;
        assert_eq!(html(&ctx), "<ul><li>a</li></ul><p>b</p><ul><li>c</li></ul>");
        Ok(())
    }

    #[test]
    fn test_new_item_merges_with_adjacent_list() -> Result<()> {
        let mut ctx = context("<ul><li>a</li></ul><p>b</p>");
        select(&mut ctx, 2, 2);
        run(&ListToggle::unordered(), &mut ctx, CommandValue::None)?;
        assert_eq!(html(&ctx), "<ul><li>a</li><li>b</li></ul>");
        Ok(())
    }

    #[test]
    fn test_heading_is_nested_in_item() -> Result<()> {
        let mut ctx = context("<h2>head</h2>");
        select(&mut ctx, 1, 1);
        run(&ListToggle::unordered(), &mut ctx, CommandValue::None)?;
        assert_eq!(html(&ctx), "<ul><li><h2>head</h2></li></ul>");
        Ok(())
    }
}
