//! Strip inline formatting from the selection

use super::{
    word_range, Command, CommandName, CommandState, ExecDef, Outcome, ProcessingOptions,
    SelectionDef,
};
use crate::nodelist::{coverage, remove_in_range, Coverage, TagMatcher};
use anyhow::Result;

const FORMAT_TAGS: &[&str] = &[
    "b", "strong", "i", "em", "u", "s", "strike", "del", "sub", "sup", "span", "font", "code",
];

fn formatting() -> TagMatcher {
    TagMatcher::tags(FORMAT_TAGS)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveFormat;

impl Command for RemoveFormat {
    fn name(&self) -> CommandName {
        CommandName::RemoveFormat
    }

    fn processing_options(&self) -> ProcessingOptions {
        ProcessingOptions::SELECTION | ProcessingOptions::BOOKMARK
    }

    fn execute(&self, exec: &mut ExecDef<'_>) -> Result<Outcome> {
        let selection = exec.require_selection()?;
        let mut range = selection.range();
        if selection.is_collapsed {
            match word_range(exec.ctx.doc(), &range.start) {
                Some(word) => range = word,
                None => return Ok(Outcome::Unchanged),
            }
        }
        let removed = remove_in_range(exec.ctx, &range, &formatting(), true)?;
        Ok(if removed > 0 {
            Outcome::Removed
        } else {
            Outcome::Unchanged
        })
    }

    fn query_state(&self, def: &SelectionDef<'_>) -> CommandState {
        match &def.selection {
            Some(selection) if coverage(def.ctx, selection, &formatting()) != Coverage::None => {
                CommandState::Inactive
            }
            _ => CommandState::Disabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{context, html, run, select, state};
    use crate::commands::CommandValue;

    #[test]
    fn test_strips_nested_formatting_in_selection_only() -> Result<()> {
        let mut ctx = context("<p><b>bold <i>both</i></b> plain</p>");
        select(&mut ctx, 5, 9);
        assert_eq!(run(&RemoveFormat, &mut ctx, CommandValue::None)?, Outcome::Removed);
        assert_eq!(html(&ctx), "<p><b>bold </b>both plain</p>");
        Ok(())
    }

    #[test]
    fn test_plain_selection_is_disabled() {
        let mut ctx = context("<p>plain text</p>");
        select(&mut ctx, 0, 5);
        assert_eq!(
            state(&RemoveFormat, &ctx, &CommandValue::None),
            CommandState::Disabled
        );
    }

    #[test]
    fn test_caret_clears_word() -> Result<()> {
        let mut ctx = context("<p><u>under</u>line</p>");
        select(&mut ctx, 2, 2);
        run(&RemoveFormat, &mut ctx, CommandValue::None)?;
        assert_eq!(html(&ctx), "<p>underline</p>");
        Ok(())
    }
}
