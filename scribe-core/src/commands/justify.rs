//! Paragraph alignment

use super::blocks::{block_coverage, selected_blocks, touched_blocks};
use super::css;
use super::{Command, CommandName, CommandState, ExecDef, Outcome, ProcessingOptions, SelectionDef};
use crate::dom::{Document, NodeId};
use anyhow::Result;

const TEXT_ALIGN: &str = "text-align";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Alignment {
    Left,
    Center,
    Right,
    Full,
}

impl Alignment {
    pub const ALL: [Alignment; 4] = [
        Alignment::Left,
        Alignment::Center,
        Alignment::Right,
        Alignment::Full,
    ];

    /// `text-align` value
    pub fn css_value(self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Full => "justify",
        }
    }

    /// Legacy `align` attribute value for a selected image; none for `Full`
    fn attribute_value(self) -> Option<&'static str> {
        match self {
            Alignment::Left => Some("left"),
            Alignment::Center => Some("middle"),
            Alignment::Right => Some("right"),
            Alignment::Full => None,
        }
    }

    fn command(self) -> CommandName {
        match self {
            Alignment::Left => CommandName::JustifyLeft,
            Alignment::Center => CommandName::JustifyCenter,
            Alignment::Right => CommandName::JustifyRight,
            Alignment::Full => CommandName::JustifyFull,
        }
    }
}

/// Toggles one alignment on the selected blocks
///
/// Blocks without an explicit alignment count as left-aligned, so toggling
/// an alignment off returns the blocks to the default.
#[derive(Debug, Clone, Copy)]
pub struct Justify {
    alignment: Alignment,
}

impl Justify {
    pub fn new(alignment: Alignment) -> Self {
        Self { alignment }
    }

    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    fn is_aligned(&self, doc: &Document, block: NodeId) -> bool {
        let current = css::property(doc, block, TEXT_ALIGN);
        current.as_deref().unwrap_or("left") == self.alignment.css_value()
    }
}

impl Command for Justify {
    fn name(&self) -> CommandName {
        self.alignment.command()
    }

    fn processing_options(&self) -> ProcessingOptions {
        ProcessingOptions::SELECTION | ProcessingOptions::BOOKMARK
    }

    fn accepts_element(&self, doc: &Document, element: NodeId) -> bool {
        doc.has_tag(element, "img") && self.alignment.attribute_value().is_some()
    }

    fn execute(&self, exec: &mut ExecDef<'_>) -> Result<Outcome> {
        if let Some(element) = exec.element {
            let Some(value) = self.alignment.attribute_value() else {
                return Ok(Outcome::Unchanged);
            };
            let doc = exec.ctx.doc_mut();
            if doc.attr(element, "align") == Some(value) {
                doc.remove_attr(element, "align");
                return Ok(Outcome::Removed);
            }
            doc.set_attr(element, "align", value);
            return Ok(Outcome::Applied);
        }

        let selection = exec.require_selection()?;
        let blocks = selected_blocks(exec.ctx, &selection.range())?;
        let doc = exec.ctx.doc_mut();
        let start_aligned = blocks.first().is_some_and(|&b| self.is_aligned(doc, b));
        let all_aligned = blocks.iter().all(|&b| self.is_aligned(doc, b));
        // Left is the default; only a uniformly left selection drops it
        let removes = match self.alignment {
            Alignment::Left => all_aligned,
            _ => start_aligned,
        };
        if removes {
            let mut changed = false;
            for &block in &blocks {
                if self.is_aligned(doc, block) && css::property(doc, block, TEXT_ALIGN).is_some() {
                    css::set_property(doc, block, TEXT_ALIGN, None);
                    changed = true;
                }
            }
            return Ok(if changed {
                Outcome::Removed
            } else {
                Outcome::Unchanged
            });
        }
        for &block in &blocks {
            css::set_property(doc, block, TEXT_ALIGN, Some(self.alignment.css_value()));
        }
        Ok(Outcome::Applied)
    }

    fn query_state(&self, def: &SelectionDef<'_>) -> CommandState {
        let Some(selection) = &def.selection else {
            return CommandState::Inactive;
        };
        let doc = def.ctx.doc();
        if let Some(element) = selection.selected_element(doc) {
            if doc.has_tag(element, "img") {
                return match self.alignment.attribute_value() {
                    Some(value) => CommandState::from_active(doc.attr(element, "align") == Some(value)),
                    None => CommandState::Disabled,
                };
            }
        }
        let blocks = touched_blocks(doc, def.ctx.root(), &selection.range());
        if blocks.is_empty() {
            return CommandState::from_active(self.alignment == Alignment::Left);
        }
        block_coverage(&blocks, |b| self.is_aligned(doc, b)).into()
    }
}
