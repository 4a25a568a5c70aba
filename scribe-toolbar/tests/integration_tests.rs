//! Integration tests for scribe-toolbar
//!
//! These tests configure toolbars from TOML files and drive an editor
//! through its buttons.

use scribe_core::plugin::ToolbarElement;
use scribe_core::{
    CommandName, CommandState, CommandValue, Config, ContainerSurface, Editor, EnvOptions,
};
use scribe_toolbar::render::render;
use scribe_toolbar::{Toolbar, ToolbarBuilder};
use std::io::Write as _;
use tempfile::NamedTempFile;

/// Helper to load a configuration from TOML text
fn load_config(toml: &str) -> Config {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(toml.as_bytes()).unwrap();
    file.flush().unwrap();
    let (config, events) = Config::load_from(file.path()).expect("Failed to load config");
    assert!(events.is_empty(), "unexpected config events: {:?}", events);
    config
}

/// Helper to create a started editor with the configured toolbar installed
fn create_editor(config: Config, html: &str) -> (Editor<ContainerSurface>, Toolbar) {
    let mut editor = Editor::new(ContainerSurface::new(), config.clone());
    let toolbar = ToolbarBuilder::from_config(&config)
        .install(&mut editor)
        .expect("Failed to install toolbar");
    editor.start(html).expect("Failed to start editor");
    editor.focus();
    (editor, toolbar)
}

/// Press a toolbar button by label
fn click(editor: &mut Editor<ContainerSurface>, toolbar: &Toolbar, label: &str) {
    let command = toolbar
        .elements()
        .into_iter()
        .find_map(|element| match element {
            ToolbarElement::Button {
                command, label: l, ..
            } if l == label => Some(command),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no button labelled {}", label));
    editor.execute(command, CommandValue::None, EnvOptions::default());
}

#[test]
fn integration_configured_features_shape_toolbar() {
    let config = load_config(
        r#"
[plugins]
formatting = ["bold", "italic", "underline"]
alignment = "none"
links = "none"
structure = ["formatblock", "unorderedlist"]
history = "all"
"#,
    );
    let (_editor, toolbar) = create_editor(config, "<p>text</p>");

    assert_eq!(
        toolbar.commands(),
        vec![
            CommandName::Bold,
            CommandName::Italic,
            CommandName::Underline,
            CommandName::FormatBlock,
            CommandName::InsertUnorderedList,
            CommandName::Undo,
            CommandName::Redo,
        ]
    );
}

#[test]
fn integration_buttons_drive_editor() {
    let (mut editor, toolbar) = create_editor(Config::default(), "<p>make this bold</p>");
    editor.select_text(10, 14);
    click(&mut editor, &toolbar, "B");
    assert_eq!(
        editor.content().as_deref(),
        Some("<p>make this <b>bold</b></p>")
    );
    assert_eq!(toolbar.button_state(CommandName::Bold), CommandState::Active);

    click(&mut editor, &toolbar, "Undo");
    assert_eq!(editor.content().as_deref(), Some("<p>make this bold</p>"));
    assert_eq!(toolbar.button_state(CommandName::Redo), CommandState::Inactive);
    assert_eq!(toolbar.button_state(CommandName::Undo), CommandState::Disabled);
}

#[test]
fn integration_style_select_shows_active_style() {
    let config = load_config(
        r#"
[[styles]]
name = "Marker"
class = "marker"

[[styles]]
name = "Red"
style = "color: red"
"#,
    );
    let (mut editor, toolbar) = create_editor(config, "<p>highlight me</p>");
    editor.select_text(0, 9);
    editor.execute(
        CommandName::ApplyStyle,
        CommandValue::Name("Marker".to_string()),
        EnvOptions::default(),
    );

    assert_eq!(toolbar.state().active_styles, vec!["Marker".to_string()]);
    let lines = render(&toolbar, 200);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("Style: Marker v"));
    assert!(lines[0].contains("Format: Paragraph v"));
}
