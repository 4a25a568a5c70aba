//! Table insertion and removal

use super::blocks::block_of;
use super::{
    Command, CommandName, CommandState, CommandValue, ExecDef, Outcome, ProcessingOptions,
    SelectionDef,
};
use crate::context::EditContext;
use crate::dom::{Document, NodeId};
use crate::range::{Position, Range};
use anyhow::{bail, Context, Result};

/// Upper bound on either dimension of an inserted table
pub const MAX_TABLE_SIZE: usize = 100;

const CELL_HOSTS: &[&str] = &["li", "td", "th"];

fn enclosing(ctx: &EditContext, node: NodeId, tag: &str) -> Option<NodeId> {
    let root = ctx.root();
    ctx.doc()
        .closest(node, root, |d, n| n != root && d.has_tag(n, tag))
}

fn selection_node(exec: &ExecDef<'_>) -> Result<NodeId> {
    Ok(exec.require_selection()?.start_node)
}

/// An empty cell shaped like `template`
fn empty_cell(doc: &mut Document, template: Option<NodeId>) -> NodeId {
    let cell = match template {
        Some(t) => doc.shallow_clone(t),
        None => doc.create_element("td"),
    };
    let filler = doc.create_element("br");
    doc.append_child(cell, filler);
    cell
}

fn caret_in(cell: NodeId) -> Range {
    Range::collapsed(Position::new(cell, 0))
}

fn in_table_state(def: &SelectionDef<'_>) -> CommandState {
    match &def.selection {
        Some(selection) if enclosing(def.ctx, selection.start_node, "table").is_some() => {
            CommandState::Inactive
        }
        _ => CommandState::Disabled,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InsertTable;

impl Command for InsertTable {
    fn name(&self) -> CommandName {
        CommandName::InsertTable
    }

    fn processing_options(&self) -> ProcessingOptions {
        ProcessingOptions::SELECTION | ProcessingOptions::BOOKMARK
    }

    fn execute(&self, exec: &mut ExecDef<'_>) -> Result<Outcome> {
        let spec = match &exec.value {
            CommandValue::Table(spec) => *spec,
            _ => bail!("inserttable needs a table size"),
        };
        for (what, n) in [("rows", spec.rows), ("columns", spec.cols)] {
            if !(1..=MAX_TABLE_SIZE).contains(&n) {
                bail!("table {} must be between 1 and {}, got {}", what, MAX_TABLE_SIZE, n);
            }
        }
        let selection = exec.require_selection()?;
        let root = exec.ctx.root();
        let doc = exec.ctx.doc_mut();

        let table = doc.create_element("table");
        let body = doc.create_element("tbody");
        doc.append_child(table, body);
        let mut first = None;
        for _ in 0..spec.rows {
            let row = doc.create_element("tr");
            doc.append_child(body, row);
            for _ in 0..spec.cols {
                let cell = empty_cell(doc, None);
                doc.append_child(row, cell);
                first.get_or_insert(cell);
            }
        }

        match block_of(doc, root, selection.end_node) {
            Some(block) if doc.tag(block).is_some_and(|t| CELL_HOSTS.contains(&t)) => {
                doc.append_child(block, table)
            }
            Some(block) => doc.insert_after(block, table)?,
            None => doc.append_child(root, table),
        }

        let first = first.context("table has no cells")?;
        exec.new_selection = Some(caret_in(first));
        Ok(Outcome::Applied)
    }

    fn query_state(&self, def: &SelectionDef<'_>) -> CommandState {
        if def.selection.is_some() {
            CommandState::Inactive
        } else {
            CommandState::Disabled
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteTable;

impl Command for DeleteTable {
    fn name(&self) -> CommandName {
        CommandName::DeleteTable
    }

    fn processing_options(&self) -> ProcessingOptions {
        ProcessingOptions::SELECTION | ProcessingOptions::BOOKMARK
    }

    fn execute(&self, exec: &mut ExecDef<'_>) -> Result<Outcome> {
        let node = selection_node(exec)?;
        let Some(table) = enclosing(exec.ctx, node, "table") else {
            return Ok(Outcome::Unchanged);
        };
        let doc = exec.ctx.doc_mut();
        let spot = Position::before(doc, table).context("table is detached")?;
        doc.detach(table);
        exec.new_selection = Some(Range::collapsed(spot));
        Ok(Outcome::Removed)
    }

    fn query_state(&self, def: &SelectionDef<'_>) -> CommandState {
        in_table_state(def)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InsertTableRow;

impl Command for InsertTableRow {
    fn name(&self) -> CommandName {
        CommandName::InsertTableRow
    }

    fn processing_options(&self) -> ProcessingOptions {
        ProcessingOptions::SELECTION | ProcessingOptions::BOOKMARK
    }

    fn execute(&self, exec: &mut ExecDef<'_>) -> Result<Outcome> {
        let node = selection_node(exec)?;
        let Some(row) = enclosing(exec.ctx, node, "tr") else {
            return Ok(Outcome::Unchanged);
        };
        let doc = exec.ctx.doc_mut();
        let new_row = doc.shallow_clone(row);
        let cells: Vec<NodeId> = doc.children(row).to_vec();
        let mut first = None;
        for cell in cells {
            let copy = empty_cell(doc, Some(cell));
            doc.append_child(new_row, copy);
            first.get_or_insert(copy);
        }
        doc.insert_after(row, new_row)?;
        if let Some(first) = first {
            exec.new_selection = Some(caret_in(first));
        }
        Ok(Outcome::Applied)
    }

    fn query_state(&self, def: &SelectionDef<'_>) -> CommandState {
        in_table_state(def)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteTableRow;

impl Command for DeleteTableRow {
    fn name(&self) -> CommandName {
        CommandName::DeleteTableRow
    }

    fn processing_options(&self) -> ProcessingOptions {
        ProcessingOptions::SELECTION | ProcessingOptions::BOOKMARK
    }

    fn execute(&self, exec: &mut ExecDef<'_>) -> Result<Outcome> {
        let node = selection_node(exec)?;
        let (Some(row), Some(table)) = (
            enclosing(exec.ctx, node, "tr"),
            enclosing(exec.ctx, node, "table"),
        ) else {
            return Ok(Outcome::Unchanged);
        };
        let doc = exec.ctx.doc_mut();
        let rows = doc
            .descendants(table)
            .into_iter()
            .filter(|&n| doc.has_tag(n, "tr"))
            .count();
        if rows <= 1 {
            let spot = Position::before(doc, table).context("table is detached")?;
            doc.detach(table);
            exec.new_selection = Some(Range::collapsed(spot));
            return Ok(Outcome::Removed);
        }
        let neighbour = doc.next_sibling(row).or_else(|| doc.prev_sibling(row));
        doc.detach(row);
        if let Some(cell) = neighbour.and_then(|r| doc.first_child(r)) {
            exec.new_selection = Some(caret_in(cell));
        }
        Ok(Outcome::Removed)
    }

    fn query_state(&self, def: &SelectionDef<'_>) -> CommandState {
        in_table_state(def)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{context, html, run, select, state};
    use crate::commands::TableSpec;

    fn size(rows: usize, cols: usize) -> CommandValue {
        CommandValue::Table(TableSpec { rows, cols })
    }

    #[test]
    fn test_insert_table_after_block() -> Result<()> {
        let mut ctx = context("<p>x</p>");
        select(&mut ctx, 1, 1);
        assert_eq!(run(&InsertTable, &mut ctx, size(2, 2))?, Outcome::Applied);
        assert_eq!(
            html(&ctx),
            "<p>x</p><table><tbody>\
             <tr><td><br></td><td><br></td></tr>\
             <tr><td><br></td><td><br></td></tr>\
             </tbody></table>"
        );
        let caret = ctx.selection_range().unwrap();
        assert_eq!(ctx.doc().tag(caret.start.node), Some("td"));
        assert_eq!(state(&DeleteTable, &ctx, &CommandValue::None), CommandState::Inactive);
        Ok(())
    }

    #[test]
    fn test_table_size_is_validated() {
        let mut ctx = context("<p>x</p>");
        select(&mut ctx, 0, 0);
        assert!(run(&InsertTable, &mut ctx, size(0, 3)).is_err());
        assert!(run(&InsertTable, &mut ctx, size(2, 101)).is_err());
        assert_eq!(html(&ctx), "<p>x</p>");
    }

    #[test]
    fn test_row_insert_and_delete() -> Result<()> {
        let mut ctx = context("<table><tbody><tr><th>h</th><td>d</td></tr></tbody></table>");
        select(&mut ctx, 0, 0);
        run(&InsertTableRow, &mut ctx, CommandValue::None)?;
        assert_eq!(
            html(&ctx),
            "<table><tbody><tr><th>h</th><td>d</td></tr>\
             <tr><th><br></th><td><br></td></tr></tbody></table>"
        );

        select(&mut ctx, 0, 0);
        run(&DeleteTableRow, &mut ctx, CommandValue::None)?;
        assert_eq!(
            html(&ctx),
            "<table><tbody><tr><th><br></th><td><br></td></tr></tbody></table>"
        );
        Ok(())
    }

    #[test]
    fn test_delete_table_outside_table_is_disabled() -> Result<()> {
        let mut ctx = context("<p>x</p><table><tbody><tr><td>y</td></tr></tbody></table>");
        select(&mut ctx, 0, 0);
        assert_eq!(state(&DeleteTable, &ctx, &CommandValue::None), CommandState::Disabled);
        assert_eq!(run(&DeleteTable, &mut ctx, CommandValue::None)?, Outcome::Unchanged);

        select(&mut ctx, 2, 2);
        assert_eq!(run(&DeleteTable, &mut ctx, CommandValue::None)?, Outcome::Removed);
        assert_eq!(html(&ctx), "<p>x</p>");
        Ok(())
    }
}
