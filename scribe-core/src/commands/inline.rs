//! Character formatting toggles (bold, italic, ...)

use super::{
    word_range, Command, CommandName, CommandState, ExecDef, Outcome, ProcessingOptions,
    SelectionDef,
};
use crate::bookmark::create_bookmark;
use crate::nodelist::{coverage, is_active_at_start, TagMatcher};
use anyhow::Result;
use log::debug;
use std::collections::BTreeMap;

/// Wraps or unwraps the selection in one inline tag
///
/// The tag is considered active when the selection start sits inside the
/// tag or one of its aliases; toggling off strips all of them.
#[derive(Debug, Clone)]
pub struct InlineToggle {
    name: CommandName,
    tag: &'static str,
    aliases: &'static [&'static str],
    /// Tag that cannot coexist with this one (sub/sup)
    exclusive: Option<&'static str>,
}

impl InlineToggle {
    pub fn bold() -> Self {
        Self::new(CommandName::Bold, "b", &["strong"], None)
    }

    pub fn italic() -> Self {
        Self::new(CommandName::Italic, "i", &["em"], None)
    }

    pub fn underline() -> Self {
        Self::new(CommandName::Underline, "u", &[], None)
    }

    pub fn strikethrough() -> Self {
        Self::new(CommandName::Strikethrough, "s", &["strike", "del"], None)
    }

    pub fn subscript() -> Self {
        Self::new(CommandName::Subscript, "sub", &[], Some("sup"))
    }

    pub fn superscript() -> Self {
        Self::new(CommandName::Superscript, "sup", &[], Some("sub"))
    }

    fn new(
        name: CommandName,
        tag: &'static str,
        aliases: &'static [&'static str],
        exclusive: Option<&'static str>,
    ) -> Self {
        Self {
            name,
            tag,
            aliases,
            exclusive,
        }
    }

    pub fn tag(&self) -> &str {
        self.tag
    }

    fn matcher(&self) -> TagMatcher {
        let mut tags = vec![self.tag];
        tags.extend_from_slice(self.aliases);
        TagMatcher::tags(&tags)
    }
}

impl Command for InlineToggle {
    fn name(&self) -> CommandName {
        self.name
    }

    fn processing_options(&self) -> ProcessingOptions {
        ProcessingOptions::SELECTION | ProcessingOptions::BOOKMARK | ProcessingOptions::NODE_LIST
    }

    fn execute(&self, exec: &mut ExecDef<'_>) -> Result<Outcome> {
        let mut selection = exec.require_selection()?;
        let mut list = exec.require_node_list()?.clone();

        // A caret toggles the word around it
        if selection.is_collapsed {
            let Some(word) = word_range(exec.ctx.doc(), &selection.start()) else {
                debug!("{}: caret is not inside a word", self.name);
                return Ok(Outcome::Unchanged);
            };
            (selection, list) = exec.reselect(word)?;
        }

        let matcher = self.matcher();
        if is_active_at_start(exec.ctx, &selection, &matcher) {
            let removed = list.remove_nodes_by_tag(exec.ctx, &matcher, true)?;
            return Ok(if removed > 0 {
                Outcome::Removed
            } else {
                Outcome::Unchanged
            });
        }

        if let Some(other) = self.exclusive {
            let mark = create_bookmark(exec.ctx);
            let removed = list.remove_nodes_by_tag(exec.ctx, &TagMatcher::tag(other), true)?;
            if removed > 0 {
                if let Some(mark) = mark {
                    (_, list) = exec.restore(&mark)?;
                }
            }
        }

        let wrappers = list.surround(exec.ctx, self.tag, &BTreeMap::new())?;
        Ok(if wrappers.is_empty() {
            Outcome::Unchanged
        } else {
            Outcome::Applied
        })
    }

    fn query_state(&self, def: &SelectionDef<'_>) -> CommandState {
        match &def.selection {
            Some(selection) => coverage(def.ctx, selection, &self.matcher()).into(),
            None => CommandState::Inactive,
        }
    }
}
