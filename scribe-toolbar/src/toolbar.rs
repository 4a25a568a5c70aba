//! Toolbar builder and model

use crate::plugins::{BuiltinPlugin, SharedState, ToolbarState, BUILTIN_IDS};
use anyhow::{Context, Result};
use log::debug;
use scribe_core::config::Catalog;
use scribe_core::plugin::{Plugin, ToolbarElement};
use scribe_core::surface::EditingSurface;
use scribe_core::{CommandName, CommandState, Config, Editor};
use std::cell::{Ref, RefCell};
use std::rc::Rc;

/// Elements contributed by one plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolbarGroup {
    pub plugin: String,
    pub elements: Vec<ToolbarElement>,
}

/// Toolbar layout plus the live state its plugins maintain
#[derive(Debug, Clone)]
pub struct Toolbar {
    groups: Vec<ToolbarGroup>,
    state: SharedState,
}

impl Toolbar {
    pub fn groups(&self) -> &[ToolbarGroup] {
        &self.groups
    }

    pub fn state(&self) -> Ref<'_, ToolbarState> {
        self.state.borrow()
    }

    pub fn button_state(&self, command: CommandName) -> CommandState {
        self.state.borrow().button(command)
    }

    /// Every element in display order, with separators between groups
    pub fn elements(&self) -> Vec<ToolbarElement> {
        let mut out = Vec::new();
        for group in &self.groups {
            if !out.is_empty() {
                out.push(ToolbarElement::Separator);
            }
            out.extend(group.elements.iter().cloned());
        }
        out
    }

    /// Commands reachable from the toolbar
    pub fn commands(&self) -> Vec<CommandName> {
        self.groups
            .iter()
            .flat_map(|g| g.elements.iter())
            .filter_map(ToolbarElement::command)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Assembles plugins, registers them on an editor and returns the toolbar
pub struct ToolbarBuilder {
    state: SharedState,
    plugins: Vec<Box<dyn Plugin>>,
}

impl Default for ToolbarBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolbarBuilder {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(ToolbarState::default())),
            plugins: Vec::new(),
        }
    }

    /// All built-in plugins, enabled as the configuration says
    pub fn from_config(config: &Config) -> Self {
        let catalog: Catalog = config.catalog();
        let mut builder = Self::new();
        for id in BUILTIN_IDS {
            let features = config.plugin_features(id);
            if let Some(plugin) = BuiltinPlugin::by_id(id, features, builder.shared_state(), &catalog) {
                builder = builder.plugin(Box::new(plugin));
            }
        }
        builder
    }

    /// State handle to pass to custom plugins that feed the same toolbar
    pub fn shared_state(&self) -> SharedState {
        Rc::clone(&self.state)
    }

    pub fn plugin(mut self, plugin: Box<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Register every plugin on `editor`
    ///
    /// Plugins whose features are all disabled are registered but get no
    /// toolbar group.
    pub fn install<S: EditingSurface>(self, editor: &mut Editor<S>) -> Result<Toolbar> {
        let mut groups = Vec::new();
        for plugin in self.plugins {
            let id = plugin.id().to_string();
            if !plugin.features().is_none() {
                let elements = plugin.toolbar_elements();
                if !elements.is_empty() {
                    groups.push(ToolbarGroup {
                        plugin: id.clone(),
                        elements,
                    });
                }
            }
            editor
                .register_plugin(plugin)
                .with_context(|| format!("failed to install plugin `{}`", id))?;
        }
        debug!("toolbar installed with {} groups", groups.len());
        Ok(Toolbar {
            groups,
            state: self.state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_core::plugin::FeatureSet;
    use scribe_core::{CommandValue, ContainerSurface, EnvOptions};

    fn editor(config: Config) -> Editor<ContainerSurface> {
        Editor::new(ContainerSurface::new(), config)
    }

    #[test]
    fn test_default_toolbar_groups() {
        let config = Config::default();
        let mut ed = editor(config.clone());
        let toolbar = ToolbarBuilder::from_config(&config).install(&mut ed).unwrap();
        let ids: Vec<_> = toolbar.groups().iter().map(|g| g.plugin.as_str()).collect();
        // No catalog styles, so no style group
        assert_eq!(ids, vec!["formatting", "alignment", "links", "structure", "history"]);
        assert!(toolbar.commands().contains(&CommandName::Bold));
        let separators = toolbar
            .elements()
            .iter()
            .filter(|e| **e == ToolbarElement::Separator)
            .count();
        assert_eq!(separators, 4);
    }

    #[test]
    fn test_disabled_plugin_has_no_group() {
        let mut config = Config::default();
        config.plugins.insert("history".to_string(), FeatureSet::None);
        config
            .plugins
            .insert("alignment".to_string(), FeatureSet::only(["center"]));
        let mut ed = editor(config.clone());
        let toolbar = ToolbarBuilder::from_config(&config).install(&mut ed).unwrap();
        assert!(toolbar.groups().iter().all(|g| g.plugin != "history"));
        let alignment = toolbar
            .groups()
            .iter()
            .find(|g| g.plugin == "alignment")
            .unwrap();
        assert_eq!(alignment.elements.len(), 1);
        assert!(!toolbar.commands().contains(&CommandName::Undo));
    }

    #[test]
    fn test_state_follows_editor() {
        let config = Config::default();
        let mut ed = editor(config.clone());
        let toolbar = ToolbarBuilder::from_config(&config).install(&mut ed).unwrap();
        ed.start("<h2>Title</h2>").unwrap();
        ed.focus();
        ed.select_text(0, 5);
        ed.execute(CommandName::Italic, CommandValue::None, EnvOptions::default());

        assert_eq!(toolbar.button_state(CommandName::Italic), CommandState::Active);
        assert_eq!(toolbar.button_state(CommandName::Bold), CommandState::Inactive);
        assert_eq!(toolbar.button_state(CommandName::Undo), CommandState::Inactive);
        assert_eq!(toolbar.button_state(CommandName::Redo), CommandState::Disabled);
        assert_eq!(toolbar.state().block_format.as_deref(), Some("h2"));
    }

    #[test]
    fn test_duplicate_plugin_fails_install() {
        let config = Config::default();
        let builder = ToolbarBuilder::from_config(&config);
        let extra = BuiltinPlugin::history(FeatureSet::All, builder.shared_state());
        let mut ed = editor(config);
        assert!(builder.plugin(Box::new(extra)).install(&mut ed).is_err());
    }
}
