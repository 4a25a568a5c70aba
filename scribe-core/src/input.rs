//! Keyboard model and keybindings
//!
//! Key events follow the shape of terminal key events (code plus modifier
//! flags) so hosts can forward them without translation tables.

use crate::commands::CommandName;
use crate::undo::InputClass;
use bitflags::bitflags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Char(char),
    Backspace,
    Delete,
    Enter,
    Tab,
    Esc,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    PageUp,
    PageDown,
    /// A modifier key pressed on its own
    Modifier,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct KeyModifiers: u8 {
        const SHIFT = 0b0001;
        const CONTROL = 0b0010;
        const ALT = 0b0100;
        const META = 0b1000;
        const NONE = 0b0000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyEvent {
    pub fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }

    /// An unmodified key
    pub fn plain(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::NONE)
    }

    pub fn ctrl(c: char) -> Self {
        Self::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn is_command(&self) -> bool {
        self.modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::META)
    }
}

/// Caret motions emulated by the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Left,
    Right,
    Home,
    End,
    Up,
    Down,
}

/// What a key press asks the editor to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Run a formatting command
    Command(CommandName),
    Undo,
    Redo,
    InsertText(String),
    Backspace,
    Delete,
    Enter,
    Move { motion: Motion, extend: bool },
    /// Nothing the engine handles; the host keeps the event
    Ignore,
}

/// Map a key press to an editor action
pub fn map_key(key: &KeyEvent) -> Action {
    // Ctrl+Shift+Z arrives as uppercase on most hosts
    if matches!(
        key,
        KeyEvent {
            code: KeyCode::Char('z' | 'Z'),
            modifiers,
        } if *modifiers == KeyModifiers::CONTROL | KeyModifiers::SHIFT
    ) {
        return Action::Redo;
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('b') => Action::Command(CommandName::Bold),
            KeyCode::Char('i') => Action::Command(CommandName::Italic),
            KeyCode::Char('u') => Action::Command(CommandName::Underline),
            KeyCode::Char('z') => Action::Undo,
            KeyCode::Char('y') => Action::Redo,
            _ => Action::Ignore,
        };
    }

    let extend = key.modifiers.contains(KeyModifiers::SHIFT);
    let motion = |motion| Action::Move { motion, extend };
    match key.code {
        KeyCode::Char(c) if !key.is_command() => Action::InsertText(c.to_string()),
        KeyCode::Backspace => Action::Backspace,
        KeyCode::Delete => Action::Delete,
        KeyCode::Enter => Action::Enter,
        KeyCode::Left => motion(Motion::Left),
        KeyCode::Right => motion(Motion::Right),
        KeyCode::Up => motion(Motion::Up),
        KeyCode::Down => motion(Motion::Down),
        KeyCode::Home => motion(Motion::Home),
        KeyCode::End => motion(Motion::End),
        _ => Action::Ignore,
    }
}

/// Undo-relevant category of a key
pub fn classify(key: &KeyEvent) -> InputClass {
    if key.is_command() {
        return InputClass::Other;
    }
    match key.code {
        KeyCode::Char(' ') | KeyCode::Enter => InputClass::Boundary,
        KeyCode::Char(_) => InputClass::Producing,
        KeyCode::Backspace | KeyCode::Delete => InputClass::Deletion,
        KeyCode::Left
        | KeyCode::Right
        | KeyCode::Up
        | KeyCode::Down
        | KeyCode::Home
        | KeyCode::End
        | KeyCode::PageUp
        | KeyCode::PageDown => InputClass::CaretMovement,
        _ => InputClass::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortcuts() {
        assert_eq!(map_key(&KeyEvent::ctrl('b')), Action::Command(CommandName::Bold));
        assert_eq!(map_key(&KeyEvent::ctrl('i')), Action::Command(CommandName::Italic));
        assert_eq!(map_key(&KeyEvent::ctrl('u')), Action::Command(CommandName::Underline));
        assert_eq!(map_key(&KeyEvent::ctrl('z')), Action::Undo);
        assert_eq!(map_key(&KeyEvent::ctrl('y')), Action::Redo);
        let shifted = KeyEvent::new(
            KeyCode::Char('Z'),
            KeyModifiers::CONTROL | KeyModifiers::SHIFT,
        );
        assert_eq!(map_key(&shifted), Action::Redo);
        assert_eq!(map_key(&KeyEvent::ctrl('q')), Action::Ignore);
    }

    #[test]
    fn test_typing_and_motion() {
        assert_eq!(
            map_key(&KeyEvent::plain(KeyCode::Char('a'))),
            Action::InsertText("a".to_string())
        );
        let upper = KeyEvent::new(KeyCode::Char('A'), KeyModifiers::SHIFT);
        assert_eq!(map_key(&upper), Action::InsertText("A".to_string()));
        let select_left = KeyEvent::new(KeyCode::Left, KeyModifiers::SHIFT);
        assert_eq!(
            map_key(&select_left),
            Action::Move {
                motion: Motion::Left,
                extend: true
            }
        );
        let alt_char = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::ALT);
        assert_eq!(map_key(&alt_char), Action::Ignore);
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(&KeyEvent::plain(KeyCode::Char('x'))), InputClass::Producing);
        assert_eq!(classify(&KeyEvent::plain(KeyCode::Char(' '))), InputClass::Boundary);
        assert_eq!(classify(&KeyEvent::plain(KeyCode::Enter)), InputClass::Boundary);
        assert_eq!(classify(&KeyEvent::plain(KeyCode::Backspace)), InputClass::Deletion);
        assert_eq!(classify(&KeyEvent::plain(KeyCode::End)), InputClass::CaretMovement);
        assert_eq!(classify(&KeyEvent::ctrl('b')), InputClass::Other);
        assert_eq!(classify(&KeyEvent::plain(KeyCode::Modifier)), InputClass::Other);
    }
}
