//! Plain-text toolbar rendering
//!
//! Buttons are drawn by state: `[B]` active, ` B ` inactive, `{B}` mixed
//! and `(B)` disabled. Selects show their current value. Lines wrap at the
//! requested display width.

use crate::plugins::ToolbarState;
use crate::toolbar::Toolbar;
use scribe_core::plugin::ToolbarElement;
use scribe_core::{CommandName, CommandState};
use unicode_width::UnicodeWidthStr;

const GAP: &str = " ";
const SEPARATOR: &str = "|";

/// Text for one button in the given state
pub fn button_text(label: &str, state: CommandState) -> String {
    match state {
        CommandState::Active => format!("[{}]", label),
        CommandState::Inactive => format!(" {} ", label),
        CommandState::Indeterminate => format!("{{{}}}", label),
        CommandState::Disabled => format!("({})", label),
    }
}

fn select_text(
    command: CommandName,
    label: &str,
    options: &[(String, String)],
    state: &ToolbarState,
) -> String {
    let current = match command {
        CommandName::FormatBlock => state.block_format.as_deref(),
        CommandName::ApplyStyle => state.active_styles.first().map(String::as_str),
        _ => None,
    };
    let shown = current
        .and_then(|value| options.iter().find(|(v, _)| v == value))
        .map_or("-", |(_, text)| text.as_str());
    format!("{}: {} v", label, shown)
}

fn element_text(element: &ToolbarElement, state: &ToolbarState) -> String {
    match element {
        ToolbarElement::Button { command, label, .. } => button_text(label, state.button(*command)),
        ToolbarElement::Select {
            command,
            label,
            options,
            ..
        } => select_text(*command, label, options, state),
        ToolbarElement::Separator => SEPARATOR.to_string(),
    }
}

/// Render the toolbar into lines no wider than `width` columns
///
/// A single item wider than `width` gets a line of its own.
pub fn render(toolbar: &Toolbar, width: usize) -> Vec<String> {
    let state = toolbar.state();
    let mut lines = Vec::new();
    let mut line = String::new();
    for element in toolbar.elements() {
        let text = element_text(&element, &state);
        if line.is_empty() && element == ToolbarElement::Separator {
            continue;
        }
        let needed = if line.is_empty() {
            text.width()
        } else {
            line.width() + GAP.width() + text.width()
        };
        if needed > width && !line.is_empty() {
            lines.push(std::mem::take(&mut line).trim_end().to_string());
            if element == ToolbarElement::Separator {
                continue;
            }
        }
        if !line.is_empty() {
            line.push_str(GAP);
        }
        line.push_str(&text);
    }
    if !line.is_empty() {
        lines.push(line.trim_end().to_string());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolbar::ToolbarBuilder;
    use scribe_core::plugin::FeatureSet;
    use scribe_core::{CommandValue, Config, ContainerSurface, Editor, EnvOptions};

    fn started(config: &Config, html: &str) -> (Editor<ContainerSurface>, Toolbar) {
        let mut editor = Editor::new(ContainerSurface::new(), config.clone());
        let toolbar = ToolbarBuilder::from_config(config).install(&mut editor).unwrap();
        editor.start(html).unwrap();
        editor.focus();
        (editor, toolbar)
    }

    #[test]
    fn test_button_states() {
        assert_eq!(button_text("B", CommandState::Active), "[B]");
        assert_eq!(button_text("B", CommandState::Inactive), " B ");
        assert_eq!(button_text("B", CommandState::Indeterminate), "{B}");
        assert_eq!(button_text("B", CommandState::Disabled), "(B)");
    }

    #[test]
    fn test_render_reflects_selection() {
        let mut config = Config::default();
        config.plugins.insert(
            "formatting".to_string(),
            FeatureSet::only(["bold", "italic"]),
        );
        config.plugins.insert("alignment".to_string(), FeatureSet::None);
        config.plugins.insert("links".to_string(), FeatureSet::None);
        config
            .plugins
            .insert("structure".to_string(), FeatureSet::only(["formatblock"]));
        config.plugins.insert("history".to_string(), FeatureSet::None);
        let (mut editor, toolbar) = started(&config, "<p><b>bold</b> plain</p>");

        editor.select_text(0, 10);
        let lines = render(&toolbar, 80);
        assert_eq!(lines, vec!["{B}  I  | Format: Paragraph v".to_string()]);

        // Bold at the selection start, so the toggle removes it everywhere
        editor.execute(CommandName::Bold, CommandValue::None, EnvOptions::default());
        let lines = render(&toolbar, 80);
        assert_eq!(lines, vec![" B   I  | Format: Paragraph v".to_string()]);

        editor.select_text(5, 10);
        editor.execute(CommandName::Italic, CommandValue::None, EnvOptions::default());
        let lines = render(&toolbar, 80);
        assert_eq!(lines, vec![" B  [I] | Format: Paragraph v".to_string()]);
    }

    #[test]
    fn test_render_wraps_at_width() {
        let config = Config::default();
        let (_editor, toolbar) = started(&config, "<p>text</p>");
        let lines = render(&toolbar, 24);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.width() <= 24, "line too wide: {:?}", line);
            assert!(!line.starts_with(SEPARATOR));
        }
    }
}
