//! Paragraph formats (headings, preformatted, ...)

use super::blocks::{block_coverage, selected_blocks, touched_blocks};
use super::{Command, CommandName, CommandState, ExecDef, Outcome, ProcessingOptions, SelectionDef};
use anyhow::{bail, Context, Result};

/// Blocks whose tag carries structure; the format goes inside them instead
const HOST_BLOCKS: &[&str] = &["li", "td", "th"];

#[derive(Debug, Clone, Copy, Default)]
pub struct FormatBlock;

impl Command for FormatBlock {
    fn name(&self) -> CommandName {
        CommandName::FormatBlock
    }

    fn processing_options(&self) -> ProcessingOptions {
        ProcessingOptions::SELECTION | ProcessingOptions::BOOKMARK
    }

    fn execute(&self, exec: &mut ExecDef<'_>) -> Result<Outcome> {
        let format = exec
            .value
            .name()
            .context("formatblock needs a format")?
            .trim()
            .to_ascii_lowercase();
        if !exec.catalog.has_format(&format) {
            bail!("paragraph format `{}` is not enabled", format);
        }
        let selection = exec.require_selection()?;
        let blocks = selected_blocks(exec.ctx, &selection.range())?;
        let doc = exec.ctx.doc_mut();

        let start_formatted = blocks.first().is_some_and(|&b| doc.has_tag(b, &format));
        if start_formatted && format != "p" {
            for &block in &blocks {
                if doc.has_tag(block, &format) {
                    doc.rename(block, "p");
                }
            }
            return Ok(Outcome::Removed);
        }
        if blocks.iter().all(|&b| doc.has_tag(b, &format)) {
            return Ok(Outcome::Unchanged);
        }

        for &block in &blocks {
            if doc.tag(block).is_some_and(|t| HOST_BLOCKS.contains(&t)) {
                let inner = doc.create_element(&format);
                doc.move_children(block, inner);
                doc.append_child(block, inner);
            } else {
                doc.rename(block, &format);
            }
        }
        Ok(Outcome::Applied)
    }

    fn query_state(&self, def: &SelectionDef<'_>) -> CommandState {
        let Some(selection) = &def.selection else {
            return CommandState::Disabled;
        };
        let Some(format) = def.value.name() else {
            return CommandState::Inactive;
        };
        if !def.catalog.has_format(format) {
            return CommandState::Disabled;
        }
        let doc = def.ctx.doc();
        let blocks = touched_blocks(doc, def.ctx.root(), &selection.range());
        block_coverage(&blocks, |b| doc.has_tag(b, format)).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{context, html, run, select, state};
    use crate::commands::CommandValue;

    fn format(tag: &str) -> CommandValue {
        CommandValue::Name(tag.to_string())
    }

    #[test]
    fn test_heading_toggles_back_to_paragraph() -> Result<()> {
        let mut ctx = context("<p>Title</p><p>body</p>");
        select(&mut ctx, 2, 2);
        assert_eq!(run(&FormatBlock, &mut ctx, format("h1"))?, Outcome::Applied);
        assert_eq!(html(&ctx), "<h1>Title</h1><p>body</p>");
        assert_eq!(state(&FormatBlock, &ctx, &format("h1")), CommandState::Active);
        assert_eq!(state(&FormatBlock, &ctx, &format("h2")), CommandState::Inactive);

        assert_eq!(run(&FormatBlock, &mut ctx, format("h1"))?, Outcome::Removed);
        assert_eq!(html(&ctx), "<p>Title</p><p>body</p>");
        Ok(())
    }

    #[test]
    fn test_mixed_formats_follow_start() -> Result<()> {
        let mut ctx = context("<h1>one</h1><p>two</p>");
        select(&mut ctx, 1, 5);
        assert_eq!(
            state(&FormatBlock, &ctx, &format("h1")),
            CommandState::Indeterminate
        );
        assert_eq!(run(&FormatBlock, &mut ctx, format("h1"))?, Outcome::Removed);
        assert_eq!(html(&ctx), "<p>one</p><p>two</p>");

        let mut ctx = context("<p>one</p><h1>two</h1>");
        select(&mut ctx, 1, 5);
        assert_eq!(run(&FormatBlock, &mut ctx, format("h1"))?, Outcome::Applied);
        assert_eq!(html(&ctx), "<h1>one</h1><h1>two</h1>");
        Ok(())
    }

    #[test]
    fn test_list_item_hosts_the_format() -> Result<()> {
        let mut ctx = context("<ul><li>item</li></ul>");
        select(&mut ctx, 1, 1);
        run(&FormatBlock, &mut ctx, format("pre"))?;
        assert_eq!(html(&ctx), "<ul><li><pre>item</pre></li></ul>");
        Ok(())
    }

    #[test]
    fn test_disabled_format_is_rejected() {
        let mut ctx = context("<p>x</p>");
        select(&mut ctx, 0, 1);
        assert!(run(&FormatBlock, &mut ctx, format("marquee")).is_err());
        assert_eq!(state(&FormatBlock, &ctx, &format("marquee")), CommandState::Disabled);
    }
}
