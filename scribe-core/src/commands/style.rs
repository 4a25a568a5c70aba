//! Catalog-driven styles

use super::blocks::{block_coverage, selected_blocks, touched_blocks};
use super::css;
use super::{
    word_range, Command, CommandName, CommandState, ExecDef, Outcome, ProcessingOptions,
    SelectionDef,
};
use crate::config::{Catalog, StyleDef};
use crate::dom::{Document, NodeId};
use crate::nodelist::{coverage, is_active_at_start, TagMatcher};
use anyhow::{bail, Context, Result};

/// Blocks that keep their tag when a block style is applied
const STRUCTURAL_BLOCKS: &[&str] = &["li", "td", "th"];

fn lookup<'c>(catalog: &'c Catalog, name: Option<&str>) -> Result<&'c StyleDef> {
    let name = name.context("applystyle needs a style name")?;
    catalog
        .style(name)
        .with_context(|| format!("unknown style `{}`", name))
}

fn inline_matcher(style: &StyleDef) -> TagMatcher {
    let matcher = TagMatcher::tag(&style.element);
    match (&style.class, &style.style) {
        (Some(class), _) => matcher.with_class(class),
        (None, Some(inline)) => matcher.with_attr("style", Some(inline)),
        (None, None) => matcher,
    }
}

fn block_has_style(doc: &Document, block: NodeId, style: &StyleDef) -> bool {
    let structural = doc.tag(block).is_some_and(|t| STRUCTURAL_BLOCKS.contains(&t));
    let tag_ok = doc.has_tag(block, &style.element) || (structural && style.class.is_some());
    let class_ok = style
        .class
        .as_deref()
        .map_or(true, |class| css::has_class(doc, block, class));
    tag_ok && class_ok
}

/// Applies a named style from the catalog
///
/// Inline styles wrap the selection, block styles retag the selected
/// blocks, and a selected image or rule only toggles the style's class.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyStyle;

impl ApplyStyle {
    fn apply_to_blocks(&self, exec: &mut ExecDef<'_>, style: &StyleDef) -> Result<Outcome> {
        let selection = exec.require_selection()?;
        let blocks = selected_blocks(exec.ctx, &selection.range())?;
        let doc = exec.ctx.doc_mut();

        let start_styled = blocks.first().is_some_and(|&b| block_has_style(doc, b, style));
        if start_styled {
            for &block in &blocks {
                if !block_has_style(doc, block, style) {
                    continue;
                }
                if let Some(class) = &style.class {
                    css::set_class(doc, block, class, false);
                }
                if doc.has_tag(block, &style.element) {
                    doc.rename(block, "p");
                }
            }
            return Ok(Outcome::Removed);
        }

        for &block in &blocks {
            let structural = doc.tag(block).is_some_and(|t| STRUCTURAL_BLOCKS.contains(&t));
            if !structural {
                doc.rename(block, &style.element);
            }
            if let Some(class) = &style.class {
                css::set_class(doc, block, class, true);
            }
            if let Some(inline) = &style.style {
                doc.set_attr(block, "style", inline);
            }
        }
        Ok(Outcome::Applied)
    }

    fn apply_inline(&self, exec: &mut ExecDef<'_>, style: &StyleDef) -> Result<Outcome> {
        let mut selection = exec.require_selection()?;
        let mut list = exec.require_node_list()?.clone();
        if selection.is_collapsed {
            let Some(word) = word_range(exec.ctx.doc(), &selection.start()) else {
                return Ok(Outcome::Unchanged);
            };
            (selection, list) = exec.reselect(word)?;
        }

        let matcher = inline_matcher(style);
        if is_active_at_start(exec.ctx, &selection, &matcher) {
            list.remove_nodes_by_tag(exec.ctx, &matcher, true)?;
            return Ok(Outcome::Removed);
        }
        let wrappers = list.surround(exec.ctx, &style.element, &style.attributes())?;
        Ok(if wrappers.is_empty() {
            Outcome::Unchanged
        } else {
            Outcome::Applied
        })
    }
}

impl Command for ApplyStyle {
    fn name(&self) -> CommandName {
        CommandName::ApplyStyle
    }

    fn processing_options(&self) -> ProcessingOptions {
        ProcessingOptions::SELECTION | ProcessingOptions::BOOKMARK | ProcessingOptions::NODE_LIST
    }

    fn accepts_element(&self, doc: &Document, element: NodeId) -> bool {
        doc.is_void(element)
    }

    fn execute(&self, exec: &mut ExecDef<'_>) -> Result<Outcome> {
        let style = lookup(exec.catalog, exec.value.name())?.clone();

        if let Some(element) = exec.element {
            let Some(class) = &style.class else {
                bail!("style `{}` has no class to apply to an element", style.name);
            };
            let doc = exec.ctx.doc_mut();
            let present = css::has_class(doc, element, class);
            css::set_class(doc, element, class, !present);
            return Ok(if present {
                Outcome::Removed
            } else {
                Outcome::Applied
            });
        }

        if style.is_block() {
            self.apply_to_blocks(exec, &style)
        } else {
            self.apply_inline(exec, &style)
        }
    }

    fn query_state(&self, def: &SelectionDef<'_>) -> CommandState {
        let Some(selection) = &def.selection else {
            return CommandState::Disabled;
        };
        let Ok(style) = lookup(def.catalog, def.value.name()) else {
            return CommandState::Inactive;
        };
        let doc = def.ctx.doc();
        if let Some(element) = selection.selected_element(doc).filter(|&e| doc.is_void(e)) {
            return match &style.class {
                Some(class) => CommandState::from_active(css::has_class(doc, element, class)),
                None => CommandState::Disabled,
            };
        }
        if style.is_block() {
            let blocks = touched_blocks(doc, def.ctx.root(), &selection.range());
            return block_coverage(&blocks, |b| block_has_style(doc, b, style)).into();
        }
        coverage(def.ctx, selection, &inline_matcher(style)).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{context, html, run_with, select, state_with};
    use crate::commands::CommandValue;
    use crate::range::{Position, Range};

    fn catalog() -> Catalog {
        let style = |name: &str, element: &str, class: &str| StyleDef {
            name: name.to_string(),
            element: element.to_string(),
            class: Some(class.to_string()),
            style: None,
        };
        Catalog {
            styles: vec![
                style("Marker", "span", "marker"),
                style("Note", "div", "note"),
                style("Framed", "span", "framed"),
            ],
            ..Catalog::default()
        }
    }

    fn named(name: &str) -> CommandValue {
        CommandValue::Name(name.to_string())
    }

    #[test]
    fn test_inline_style_toggles() -> Result<()> {
        let catalog = catalog();
        let mut ctx = context("<p>mark this</p>");
        select(&mut ctx, 5, 9);
        run_with(&ApplyStyle, &mut ctx, named("Marker"), &catalog)?;
        assert_eq!(
            html(&ctx),
            "<p>mark <span class=\"marker\">this</span></p>"
        );
        assert_eq!(
            state_with(&ApplyStyle, &ctx, &named("Marker"), &catalog),
            CommandState::Active
        );
        run_with(&ApplyStyle, &mut ctx, named("Marker"), &catalog)?;
        assert_eq!(html(&ctx), "<p>mark this</p>");
        Ok(())
    }

    #[test]
    fn test_block_style_retags_and_reverts() -> Result<()> {
        let catalog = catalog();
        let mut ctx = context("<p>note</p>");
        select(&mut ctx, 1, 1);
        assert_eq!(
            run_with(&ApplyStyle, &mut ctx, named("Note"), &catalog)?,
            Outcome::Applied
        );
        assert_eq!(html(&ctx), "<div class=\"note\">note</div>");
        assert_eq!(
            run_with(&ApplyStyle, &mut ctx, named("Note"), &catalog)?,
            Outcome::Removed
        );
        assert_eq!(html(&ctx), "<p>note</p>");
        Ok(())
    }

    #[test]
    fn test_mixed_block_styles_follow_start() -> Result<()> {
        let catalog = catalog();
        let mut ctx = context("<div class=\"note\">one</div><p>two</p>");
        select(&mut ctx, 1, 5);
        assert_eq!(
            state_with(&ApplyStyle, &ctx, &named("Note"), &catalog),
            CommandState::Indeterminate
        );
        assert_eq!(
            run_with(&ApplyStyle, &mut ctx, named("Note"), &catalog)?,
            Outcome::Removed
        );
        assert_eq!(html(&ctx), "<p>one</p><p>two</p>");

        let mut ctx = context("<p>one</p><div class=\"note\">two</div>");
        select(&mut ctx, 1, 5);
        assert_eq!(
            run_with(&ApplyStyle, &mut ctx, named("Note"), &catalog)?,
            Outcome::Applied
        );
        assert_eq!(
            html(&ctx),
            "<div class=\"note\">one</div><div class=\"note\">two</div>"
        );
        Ok(())
    }

    #[test]
    fn test_selected_image_toggles_class() -> Result<()> {
        let catalog = catalog();
        let mut ctx = context("<p><img src=\"a.png\"></p>");
        let root = ctx.root();
        let p = ctx.doc().children(root)[0];
        let whole_image = Range::new(Position::new(p, 0), Position::new(p, 1));
        ctx.set_selection(Some(whole_image));
        run_with(&ApplyStyle, &mut ctx, named("Framed"), &catalog)?;
        assert_eq!(html(&ctx), "<p><img class=\"framed\" src=\"a.png\"></p>");
        ctx.set_selection(Some(whole_image));
        assert_eq!(
            run_with(&ApplyStyle, &mut ctx, named("Framed"), &catalog)?,
            Outcome::Removed
        );
        assert_eq!(html(&ctx), "<p><img src=\"a.png\"></p>");
        Ok(())
    }

    #[test]
    fn test_unknown_style_is_an_error() {
        let mut ctx = context("<p>text</p>");
        select(&mut ctx, 0, 4);
        assert!(run_with(&ApplyStyle, &mut ctx, named("Missing"), &catalog()).is_err());
        assert_eq!(html(&ctx), "<p>text</p>");
    }
}
