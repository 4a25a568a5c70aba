//! Link creation, editing and removal

use super::{
    Command, CommandName, CommandState, CommandValue, ExecDef, LinkValue, Outcome,
    ProcessingOptions, SelectionDef,
};
use crate::bookmark::create_bookmark;
use crate::config::Catalog;
use crate::html::is_external;
use crate::nodelist::{insert_at, is_active_at_start, Granularity, NodeList, TagMatcher};
use crate::range::{Position, Range};
use anyhow::{bail, Context, Result};
use log::debug;
use std::collections::BTreeMap;

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Attributes of the anchor for `link`, with catalog defaults filled in
fn anchor_attributes(link: &LinkValue, catalog: &Catalog) -> BTreeMap<String, String> {
    let mut attrs = BTreeMap::new();
    attrs.insert("href".to_string(), link.url.trim().to_string());
    let class = non_empty(&link.css_class).or(non_empty(&catalog.links.default_class));
    if let Some(class) = class {
        attrs.insert("class".to_string(), class.to_string());
    }
    let target = non_empty(&link.target).or_else(|| {
        is_external(&link.url)
            .then(|| non_empty(&catalog.links.external_target))
            .flatten()
    });
    if let Some(target) = target {
        attrs.insert("target".to_string(), target.to_string());
    }
    if let Some(title) = non_empty(&link.title) {
        attrs.insert("title".to_string(), title.to_string());
    }
    attrs
}

/// Creates a link around the selection, or edits the link under it
///
/// A caret outside any link inserts a new link whose text is the title (or
/// the URL) and leaves the caret after it.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateLink;

impl Command for CreateLink {
    fn name(&self) -> CommandName {
        CommandName::CreateLink
    }

    fn processing_options(&self) -> ProcessingOptions {
        ProcessingOptions::SELECTION | ProcessingOptions::BOOKMARK | ProcessingOptions::NODE_LIST
    }

    fn execute(&self, exec: &mut ExecDef<'_>) -> Result<Outcome> {
        let CommandValue::Link(link) = &exec.value else {
            bail!("createlink needs a link value");
        };
        let link = link.clone();
        exec.catalog
            .links
            .check(&link.url)
            .with_context(|| format!("rejected link `{}`", link.url))?;
        let attrs = anchor_attributes(&link, exec.catalog);
        let selection = exec.require_selection()?;
        let mut list = exec.require_node_list()?.clone();
        let anchors = list.get_anchors(exec.ctx, true);

        // Edit in place when the selection lies inside a single link
        let enclosing = anchors
            .iter()
            .copied()
            .find(|&a| exec.ctx.doc().contains(a, selection.common_ancestor));
        if let Some(anchor) = enclosing {
            let doc = exec.ctx.doc_mut();
            for name in ["href", "class", "target", "title"] {
                match attrs.get(name) {
                    Some(value) => doc.set_attr(anchor, name, value),
                    None if name == "target" => {
                        doc.remove_attr(anchor, name);
                    }
                    None => {}
                }
            }
            debug!("createlink: edited existing link");
            return Ok(Outcome::Applied);
        }

        if selection.is_collapsed {
            let text = non_empty(&link.title).unwrap_or(link.url.trim()).to_string();
            let doc = exec.ctx.doc_mut();
            let anchor = doc.create_element_with("a", attrs);
            let label = doc.create_text(&text);
            doc.append_child(anchor, label);
            insert_at(doc, &selection.start(), anchor)?;
            let after = Position::after(doc, anchor).context("inserted link is detached")?;
            exec.new_selection = Some(Range::collapsed(after));
            return Ok(Outcome::Applied);
        }

        if !anchors.is_empty() {
            let mark = create_bookmark(exec.ctx);
            for &anchor in &anchors {
                exec.ctx.doc_mut().unwrap(anchor)?;
            }
            if let Some(mark) = mark {
                (_, list) = exec.restore(&mark)?;
            }
        }
        let wrappers = list.surround(exec.ctx, "a", &attrs)?;
        Ok(if wrappers.is_empty() {
            Outcome::Unchanged
        } else {
            Outcome::Applied
        })
    }

    fn query_state(&self, def: &SelectionDef<'_>) -> CommandState {
        match &def.selection {
            Some(selection) => CommandState::from_active(is_active_at_start(
                def.ctx,
                selection,
                &TagMatcher::tag("a"),
            )),
            None => CommandState::Disabled,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Unlink;

impl Command for Unlink {
    fn name(&self) -> CommandName {
        CommandName::Unlink
    }

    fn processing_options(&self) -> ProcessingOptions {
        ProcessingOptions::SELECTION | ProcessingOptions::BOOKMARK | ProcessingOptions::NODE_LIST
    }

    fn execute(&self, exec: &mut ExecDef<'_>) -> Result<Outcome> {
        let anchors = exec.require_node_list()?.get_anchors(exec.ctx, true);
        if anchors.is_empty() {
            return Ok(Outcome::Unchanged);
        }
        let doc = exec.ctx.doc_mut();
        for anchor in anchors {
            doc.unwrap(anchor)?;
        }
        Ok(Outcome::Removed)
    }

    fn query_state(&self, def: &SelectionDef<'_>) -> CommandState {
        let Some(selection) = &def.selection else {
            return CommandState::Disabled;
        };
        let list = NodeList::build(def.ctx, selection, Granularity::Coarse);
        if list.get_anchors(def.ctx, true).is_empty() {
            CommandState::Disabled
        } else {
            CommandState::Inactive
        }
    }
}
