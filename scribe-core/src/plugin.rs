//! Plugin seam: feature enablement, toolbar contributions and state updates
//!
//! Plugins are registered explicitly on a [`PluginRegistry`] owned by the
//! editor; there is no global registration.

use crate::commands::CommandName;
use crate::kernel::StateSnapshot;
use anyhow::{bail, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which features of a plugin are enabled
///
/// Serialized as `"all"`, `"none"` or a list of feature names.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "FeatureRepr", into = "FeatureRepr")]
pub enum FeatureSet {
    #[default]
    All,
    None,
    Only(BTreeSet<String>),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum FeatureRepr {
    Keyword(String),
    List(Vec<String>),
}

impl TryFrom<FeatureRepr> for FeatureSet {
    type Error = String;

    fn try_from(repr: FeatureRepr) -> Result<Self, Self::Error> {
        match repr {
            FeatureRepr::Keyword(word) => match word.to_ascii_lowercase().as_str() {
                "all" => Ok(FeatureSet::All),
                "none" => Ok(FeatureSet::None),
                other => Err(format!(
                    "unknown feature keyword `{}` (expected \"all\", \"none\" or a list)",
                    other
                )),
            },
            FeatureRepr::List(items) => Ok(FeatureSet::Only(items.into_iter().collect())),
        }
    }
}

impl From<FeatureSet> for FeatureRepr {
    fn from(set: FeatureSet) -> Self {
        match set {
            FeatureSet::All => FeatureRepr::Keyword("all".to_string()),
            FeatureSet::None => FeatureRepr::Keyword("none".to_string()),
            FeatureSet::Only(items) => FeatureRepr::List(items.into_iter().collect()),
        }
    }
}

impl FeatureSet {
    pub fn only<'a>(features: impl IntoIterator<Item = &'a str>) -> Self {
        FeatureSet::Only(features.into_iter().map(str::to_string).collect())
    }

    pub fn enables(&self, feature: &str) -> bool {
        match self {
            FeatureSet::All => true,
            FeatureSet::None => false,
            FeatureSet::Only(set) => set.contains(feature),
        }
    }

    pub fn is_none(&self) -> bool {
        match self {
            FeatureSet::None => true,
            FeatureSet::Only(set) => set.is_empty(),
            FeatureSet::All => false,
        }
    }
}

/// A toolbar affordance contributed by a plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolbarElement {
    Button {
        feature: String,
        command: CommandName,
        label: String,
    },
    /// Drop-down whose options are `(value, label)` pairs passed to `command`
    Select {
        feature: String,
        command: CommandName,
        label: String,
        options: Vec<(String, String)>,
    },
    Separator,
}

impl ToolbarElement {
    pub fn button(feature: &str, command: CommandName, label: &str) -> Self {
        ToolbarElement::Button {
            feature: feature.to_string(),
            command,
            label: label.to_string(),
        }
    }

    pub fn feature(&self) -> Option<&str> {
        match self {
            ToolbarElement::Button { feature, .. } | ToolbarElement::Select { feature, .. } => {
                Some(feature)
            }
            ToolbarElement::Separator => None,
        }
    }

    pub fn command(&self) -> Option<CommandName> {
        match self {
            ToolbarElement::Button { command, .. } | ToolbarElement::Select { command, .. } => {
                Some(*command)
            }
            ToolbarElement::Separator => None,
        }
    }
}

pub trait Plugin {
    fn id(&self) -> &str;

    fn features(&self) -> &FeatureSet;

    /// Toolbar elements of the enabled features, in display order
    fn toolbar_elements(&self) -> Vec<ToolbarElement>;

    /// Reflect the editor state; called after every command and selection change
    fn update_state(&mut self, snapshot: &StateSnapshot);
}

/// Summary of a registered plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDescriptor {
    pub id: String,
    pub features: FeatureSet,
    pub elements: Vec<ToolbarElement>,
}

#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn Plugin>>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.plugins.iter().map(|p| p.id()))
            .finish()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Box<dyn Plugin>) -> Result<()> {
        if self.get(plugin.id()).is_some() {
            bail!("plugin `{}` is already registered", plugin.id());
        }
        debug!("plugin `{}` registered", plugin.id());
        self.plugins.push(plugin);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&dyn Plugin> {
        self.plugins
            .iter()
            .find(|p| p.id() == id)
            .map(|p| p.as_ref())
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Plugins with at least one enabled feature
    pub fn active(&self) -> impl Iterator<Item = &dyn Plugin> {
        self.plugins
            .iter()
            .filter(|p| !p.features().is_none())
            .map(|p| p.as_ref())
    }

    pub fn descriptors(&self) -> Vec<PluginDescriptor> {
        self.plugins
            .iter()
            .map(|p| PluginDescriptor {
                id: p.id().to_string(),
                features: p.features().clone(),
                elements: if p.features().is_none() {
                    Vec::new()
                } else {
                    p.toolbar_elements()
                },
            })
            .collect()
    }

    /// Deliver a state snapshot to every active plugin
    pub fn notify(&mut self, snapshot: &StateSnapshot) {
        for plugin in self.plugins.iter_mut() {
            if !plugin.features().is_none() {
                plugin.update_state(snapshot);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, Serialize)]
    struct Holder {
        features: FeatureSet,
    }

    #[test]
    fn test_feature_set_serde() {
        let all: Holder = toml::from_str("features = \"all\"").unwrap();
        assert_eq!(all.features, FeatureSet::All);
        let none: Holder = toml::from_str("features = \"none\"").unwrap();
        assert!(none.features.is_none());
        let some: Holder = toml::from_str("features = [\"bold\", \"italic\"]").unwrap();
        assert!(some.features.enables("bold"));
        assert!(!some.features.enables("underline"));
        assert!(toml::from_str::<Holder>("features = \"most\"").is_err());

        let encoded = toml::to_string(&some).unwrap();
        assert!(encoded.contains("bold"));
    }

    struct Counter {
        features: FeatureSet,
        updates: usize,
    }

    impl Plugin for Counter {
        fn id(&self) -> &str {
            "counter"
        }

        fn features(&self) -> &FeatureSet {
            &self.features
        }

        fn toolbar_elements(&self) -> Vec<ToolbarElement> {
            vec![ToolbarElement::button("bold", CommandName::Bold, "B")]
        }

        fn update_state(&mut self, _snapshot: &StateSnapshot) {
            self.updates += 1;
        }
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = PluginRegistry::new();
        let plugin = || {
            Box::new(Counter {
                features: FeatureSet::All,
                updates: 0,
            })
        };
        assert!(registry.register(plugin()).is_ok());
        assert!(registry.register(plugin()).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_disabled_plugin_contributes_nothing() {
        let mut registry = PluginRegistry::new();
        registry
            .register(Box::new(Counter {
                features: FeatureSet::None,
                updates: 0,
            }))
            .unwrap();
        assert_eq!(registry.active().count(), 0);
        assert!(registry.descriptors()[0].elements.is_empty());
    }
}
