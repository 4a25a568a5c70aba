//! Built-in toolbar plugins
//!
//! Every built-in plugin writes the states of its own commands into a
//! [`ToolbarState`] shared with the [`Toolbar`](crate::Toolbar) that shows
//! them, so a UI reads one structure no matter how many plugins are active.

use scribe_core::config::Catalog;
use scribe_core::plugin::{FeatureSet, Plugin, ToolbarElement};
use scribe_core::{CommandName, CommandState, StateSnapshot};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// What the toolbar shows for the current selection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolbarState {
    pub buttons: BTreeMap<CommandName, CommandState>,
    /// Paragraph format of the block at the selection start
    pub block_format: Option<String>,
    pub active_styles: Vec<String>,
}

impl ToolbarState {
    pub fn button(&self, command: CommandName) -> CommandState {
        self.buttons
            .get(&command)
            .copied()
            .unwrap_or(CommandState::Disabled)
    }
}

pub type SharedState = Rc<RefCell<ToolbarState>>;

pub const FORMATTING: &str = "formatting";
pub const ALIGNMENT: &str = "alignment";
pub const LINKS: &str = "links";
pub const STYLES: &str = "styles";
pub const STRUCTURE: &str = "structure";
pub const HISTORY: &str = "history";

/// Ids of the built-in plugins in toolbar order
pub const BUILTIN_IDS: [&str; 6] = [FORMATTING, ALIGNMENT, LINKS, STYLES, STRUCTURE, HISTORY];

/// A plugin contributing a fixed set of toolbar elements
pub struct BuiltinPlugin {
    id: &'static str,
    features: FeatureSet,
    elements: Vec<ToolbarElement>,
    state: SharedState,
}

impl std::fmt::Debug for BuiltinPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinPlugin")
            .field("id", &self.id)
            .field("features", &self.features)
            .finish()
    }
}

impl BuiltinPlugin {
    fn new(id: &'static str, features: FeatureSet, elements: Vec<ToolbarElement>, state: SharedState) -> Self {
        Self {
            id,
            features,
            elements,
            state,
        }
    }

    /// Bold, italic, underline, strikethrough, sub/superscript, remove format
    pub fn formatting(features: FeatureSet, state: SharedState) -> Self {
        let elements = vec![
            ToolbarElement::button("bold", CommandName::Bold, "B"),
            ToolbarElement::button("italic", CommandName::Italic, "I"),
            ToolbarElement::button("underline", CommandName::Underline, "U"),
            ToolbarElement::button("strikethrough", CommandName::Strikethrough, "S"),
            ToolbarElement::button("subscript", CommandName::Subscript, "Sub"),
            ToolbarElement::button("superscript", CommandName::Superscript, "Sup"),
            ToolbarElement::button("removeformat", CommandName::RemoveFormat, "Clear"),
        ];
        Self::new(FORMATTING, features, elements, state)
    }

    pub fn alignment(features: FeatureSet, state: SharedState) -> Self {
        let elements = vec![
            ToolbarElement::button("left", CommandName::JustifyLeft, "Left"),
            ToolbarElement::button("center", CommandName::JustifyCenter, "Center"),
            ToolbarElement::button("right", CommandName::JustifyRight, "Right"),
            ToolbarElement::button("full", CommandName::JustifyFull, "Justify"),
        ];
        Self::new(ALIGNMENT, features, elements, state)
    }

    pub fn links(features: FeatureSet, state: SharedState) -> Self {
        let elements = vec![
            ToolbarElement::button("link", CommandName::CreateLink, "Link"),
            ToolbarElement::button("unlink", CommandName::Unlink, "Unlink"),
        ];
        Self::new(LINKS, features, elements, state)
    }

    /// Style drop-down built from the catalog; empty when the catalog has no styles
    pub fn styles(features: FeatureSet, state: SharedState, catalog: &Catalog) -> Self {
        let mut elements = Vec::new();
        if !catalog.styles.is_empty() {
            elements.push(ToolbarElement::Select {
                feature: "styles".to_string(),
                command: CommandName::ApplyStyle,
                label: "Style".to_string(),
                options: catalog
                    .styles
                    .iter()
                    .map(|style| (style.name.clone(), style.name.clone()))
                    .collect(),
            });
        }
        Self::new(STYLES, features, elements, state)
    }

    /// Paragraph formats, lists and tables
    pub fn structure(features: FeatureSet, state: SharedState, catalog: &Catalog) -> Self {
        let elements = vec![
            ToolbarElement::Select {
                feature: "formatblock".to_string(),
                command: CommandName::FormatBlock,
                label: "Format".to_string(),
                options: catalog
                    .paragraph_formats
                    .iter()
                    .map(|tag| (tag.clone(), format_label(tag)))
                    .collect(),
            },
            ToolbarElement::button("orderedlist", CommandName::InsertOrderedList, "1."),
            ToolbarElement::button("unorderedlist", CommandName::InsertUnorderedList, "*"),
            ToolbarElement::button("table", CommandName::InsertTable, "Table"),
            ToolbarElement::button("tablerows", CommandName::InsertTableRow, "Row+"),
            ToolbarElement::button("tablerows", CommandName::DeleteTableRow, "Row-"),
            ToolbarElement::button("table", CommandName::DeleteTable, "Table-"),
        ];
        Self::new(STRUCTURE, features, elements, state)
    }

    pub fn history(features: FeatureSet, state: SharedState) -> Self {
        let elements = vec![
            ToolbarElement::button("undo", CommandName::Undo, "Undo"),
            ToolbarElement::button("redo", CommandName::Redo, "Redo"),
        ];
        Self::new(HISTORY, features, elements, state)
    }

    /// Built-in plugin by id
    pub fn by_id(id: &str, features: FeatureSet, state: SharedState, catalog: &Catalog) -> Option<Self> {
        Some(match id {
            FORMATTING => Self::formatting(features, state),
            ALIGNMENT => Self::alignment(features, state),
            LINKS => Self::links(features, state),
            STYLES => Self::styles(features, state, catalog),
            STRUCTURE => Self::structure(features, state, catalog),
            HISTORY => Self::history(features, state),
            _ => return None,
        })
    }

    fn commands(&self) -> impl Iterator<Item = CommandName> + '_ {
        self.enabled().filter_map(ToolbarElement::command)
    }

    fn enabled(&self) -> impl Iterator<Item = &ToolbarElement> + '_ {
        self.elements
            .iter()
            .filter(|e| e.feature().is_some_and(|f| self.features.enables(f)))
    }
}

impl Plugin for BuiltinPlugin {
    fn id(&self) -> &str {
        self.id
    }

    fn features(&self) -> &FeatureSet {
        &self.features
    }

    fn toolbar_elements(&self) -> Vec<ToolbarElement> {
        self.enabled().cloned().collect()
    }

    fn update_state(&mut self, snapshot: &StateSnapshot) {
        let mut state = self.state.borrow_mut();
        for command in self.commands() {
            state.buttons.insert(command, snapshot.state(command));
        }
        match self.id {
            STRUCTURE => state.block_format = snapshot.block_format.clone(),
            STYLES => state.active_styles = snapshot.active_styles.clone(),
            _ => {}
        }
    }
}

/// Display name of a paragraph format
pub fn format_label(tag: &str) -> String {
    match tag {
        "p" => "Paragraph".to_string(),
        "pre" => "Preformatted".to_string(),
        "address" => "Address".to_string(),
        "div" => "Normal (DIV)".to_string(),
        "blockquote" => "Quote".to_string(),
        _ => match tag.strip_prefix('h').and_then(|n| n.parse::<u8>().ok()) {
            Some(level) => format!("Heading {}", level),
            None => tag.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_core::config::{Config, StyleDef};

    fn shared() -> SharedState {
        Rc::new(RefCell::new(ToolbarState::default()))
    }

    fn snapshot(states: &[(CommandName, CommandState)]) -> StateSnapshot {
        StateSnapshot {
            states: states.iter().copied().collect(),
            block_format: Some("h2".to_string()),
            active_styles: vec!["Note".to_string()],
            ..StateSnapshot::default()
        }
    }

    #[test]
    fn test_features_filter_elements() {
        let plugin = BuiltinPlugin::formatting(FeatureSet::only(["bold", "italic"]), shared());
        let commands: Vec<_> = plugin
            .toolbar_elements()
            .iter()
            .filter_map(ToolbarElement::command)
            .collect();
        assert_eq!(commands, vec![CommandName::Bold, CommandName::Italic]);

        let none = BuiltinPlugin::history(FeatureSet::None, shared());
        assert!(none.toolbar_elements().is_empty());
    }

    #[test]
    fn test_update_writes_only_own_commands() {
        let state = shared();
        let mut formatting = BuiltinPlugin::formatting(FeatureSet::only(["bold"]), Rc::clone(&state));
        let mut history = BuiltinPlugin::history(FeatureSet::All, Rc::clone(&state));
        let snap = snapshot(&[
            (CommandName::Bold, CommandState::Active),
            (CommandName::Italic, CommandState::Indeterminate),
            (CommandName::Undo, CommandState::Inactive),
        ]);
        formatting.update_state(&snap);
        history.update_state(&snap);

        let state = state.borrow();
        assert_eq!(state.button(CommandName::Bold), CommandState::Active);
        assert!(!state.buttons.contains_key(&CommandName::Italic));
        assert_eq!(state.button(CommandName::Undo), CommandState::Inactive);
        assert_eq!(state.button(CommandName::Redo), CommandState::Disabled);
        assert_eq!(state.block_format, None);
        assert!(state.active_styles.is_empty());
    }

    #[test]
    fn test_structure_and_styles_track_selects() {
        let mut config = Config::default();
        config.styles.push(StyleDef {
            name: "Note".to_string(),
            element: "span".to_string(),
            class: Some("note".to_string()),
            style: None,
        });
        let catalog = config.catalog();
        let state = shared();
        let mut structure = BuiltinPlugin::structure(FeatureSet::All, Rc::clone(&state), &catalog);
        let mut styles = BuiltinPlugin::styles(FeatureSet::All, Rc::clone(&state), &catalog);

        let format = &structure.toolbar_elements()[0];
        match format {
            ToolbarElement::Select { options, .. } => {
                assert_eq!(options[0], ("p".to_string(), "Paragraph".to_string()));
                assert_eq!(options.len(), catalog.paragraph_formats.len());
            }
            other => panic!("expected a select, got {:?}", other),
        }

        let snap = snapshot(&[]);
        structure.update_state(&snap);
        styles.update_state(&snap);
        assert_eq!(state.borrow().block_format.as_deref(), Some("h2"));
        assert_eq!(state.borrow().active_styles, vec!["Note".to_string()]);
    }

    #[test]
    fn test_empty_catalog_has_no_style_select() {
        let plugin = BuiltinPlugin::styles(FeatureSet::All, shared(), &Catalog::default());
        assert!(plugin.toolbar_elements().is_empty());
    }

    #[test]
    fn test_by_id_and_labels() {
        let catalog = Catalog::default();
        for id in BUILTIN_IDS {
            let plugin = BuiltinPlugin::by_id(id, FeatureSet::All, shared(), &catalog).unwrap();
            assert_eq!(plugin.id(), id);
        }
        assert!(BuiltinPlugin::by_id("spellcheck", FeatureSet::All, shared(), &catalog).is_none());
        assert_eq!(format_label("h3"), "Heading 3");
        assert_eq!(format_label("pre"), "Preformatted");
        assert_eq!(format_label("section"), "section");
    }
}
