//! Command registry and the formatting commands
//!
//! Every command declares the preprocessing it needs through
//! [`ProcessingOptions`]; the kernel computes exactly that, hands it over in
//! an [`ExecDef`], and afterwards asks [`Command::query_state`] to refresh
//! toolbar state.

pub(crate) mod blocks;
mod css;
mod inline;
mod justify;
mod link;
mod list;
mod paragraph;
mod removeformat;
mod style;
mod table;

use crate::bookmark::{restore_bookmark, RangeBookmark};
use crate::config::Catalog;
use crate::context::EditContext;
use crate::dom::{Document, NodeId};
use crate::nodelist::{Coverage, Granularity, NodeList};
use crate::range::{capture_selection, Position, Range, Selection};
use anyhow::{anyhow, bail, Context, Result};
use bitflags::bitflags;
use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub use inline::InlineToggle;
pub use justify::{Alignment, Justify};
pub use link::{CreateLink, Unlink};
pub use list::ListToggle;
pub use paragraph::FormatBlock;
pub use removeformat::RemoveFormat;
pub use style::ApplyStyle;
pub use table::{DeleteTable, DeleteTableRow, InsertTable, InsertTableRow};

/// The closed set of commands the engine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommandName {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Subscript,
    Superscript,
    RemoveFormat,
    JustifyLeft,
    JustifyCenter,
    JustifyRight,
    JustifyFull,
    CreateLink,
    Unlink,
    ApplyStyle,
    FormatBlock,
    InsertOrderedList,
    InsertUnorderedList,
    InsertTable,
    DeleteTable,
    InsertTableRow,
    DeleteTableRow,
    Undo,
    Redo,
}

impl CommandName {
    pub const ALL: [CommandName; 23] = [
        CommandName::Bold,
        CommandName::Italic,
        CommandName::Underline,
        CommandName::Strikethrough,
        CommandName::Subscript,
        CommandName::Superscript,
        CommandName::RemoveFormat,
        CommandName::JustifyLeft,
        CommandName::JustifyCenter,
        CommandName::JustifyRight,
        CommandName::JustifyFull,
        CommandName::CreateLink,
        CommandName::Unlink,
        CommandName::ApplyStyle,
        CommandName::FormatBlock,
        CommandName::InsertOrderedList,
        CommandName::InsertUnorderedList,
        CommandName::InsertTable,
        CommandName::DeleteTable,
        CommandName::InsertTableRow,
        CommandName::DeleteTableRow,
        CommandName::Undo,
        CommandName::Redo,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CommandName::Bold => "bold",
            CommandName::Italic => "italic",
            CommandName::Underline => "underline",
            CommandName::Strikethrough => "strikethrough",
            CommandName::Subscript => "subscript",
            CommandName::Superscript => "superscript",
            CommandName::RemoveFormat => "removeformat",
            CommandName::JustifyLeft => "justifyleft",
            CommandName::JustifyCenter => "justifycenter",
            CommandName::JustifyRight => "justifyright",
            CommandName::JustifyFull => "justifyfull",
            CommandName::CreateLink => "createlink",
            CommandName::Unlink => "unlink",
            CommandName::ApplyStyle => "applystyle",
            CommandName::FormatBlock => "formatblock",
            CommandName::InsertOrderedList => "insertorderedlist",
            CommandName::InsertUnorderedList => "insertunorderedlist",
            CommandName::InsertTable => "inserttable",
            CommandName::DeleteTable => "deletetable",
            CommandName::InsertTableRow => "inserttablerow",
            CommandName::DeleteTableRow => "deletetablerow",
            CommandName::Undo => "undo",
            CommandName::Redo => "redo",
        }
    }

    /// Undo and redo are handled by the kernel, not the registry
    pub fn is_history(self) -> bool {
        matches!(self, CommandName::Undo | CommandName::Redo)
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        CommandName::ALL
            .into_iter()
            .find(|name| name.as_str() == wanted)
            .ok_or_else(|| anyhow!("unknown command `{}`", s))
    }
}

bitflags! {
    /// Preprocessing the kernel performs before `execute`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ProcessingOptions: u8 {
        const SELECTION = 0b001;
        const BOOKMARK = 0b010;
        const NODE_LIST = 0b100;
    }
}

/// Link attributes supplied by the caller (usually a link dialog)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkValue {
    pub url: String,
    pub css_class: Option<String>,
    pub target: Option<String>,
    pub title: Option<String>,
}

impl LinkValue {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    pub rows: usize,
    pub cols: usize,
}

/// Command-specific argument
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CommandValue {
    #[default]
    None,
    /// Style name or block format
    Name(String),
    Link(LinkValue),
    Table(TableSpec),
}

impl CommandValue {
    /// Interpret a textual argument for `name` (e.g. from the command line)
    pub fn parse_for(name: CommandName, raw: &str) -> Result<Self> {
        let raw = raw.trim();
        match name {
            CommandName::CreateLink => Ok(CommandValue::Link(LinkValue::new(raw))),
            CommandName::ApplyStyle | CommandName::FormatBlock => {
                Ok(CommandValue::Name(raw.to_string()))
            }
            CommandName::InsertTable => {
                let (rows, cols) = raw
                    .split_once(|c: char| c.eq_ignore_ascii_case(&'x'))
                    .with_context(|| format!("table size `{}` is not ROWSxCOLS", raw))?;
                Ok(CommandValue::Table(TableSpec {
                    rows: rows.trim().parse().context("invalid row count")?,
                    cols: cols.trim().parse().context("invalid column count")?,
                }))
            }
            _ if raw.is_empty() => Ok(CommandValue::None),
            _ => bail!("command `{}` takes no value", name),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            CommandValue::Name(name) => Some(name),
            _ => None,
        }
    }
}

/// Per-invocation options of the command API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvOptions {
    /// Record undo steps around the command
    pub record_undo: bool,
    /// Restore the bookmarked selection afterwards
    pub restore_selection: bool,
    pub granularity: Granularity,
}

impl Default for EnvOptions {
    fn default() -> Self {
        Self {
            record_undo: true,
            restore_selection: true,
            granularity: Granularity::Coarse,
        }
    }
}

/// Everything one command invocation works with
pub struct ExecDef<'a> {
    pub ctx: &'a mut EditContext,
    pub selection: Option<Selection>,
    pub bookmark: Option<RangeBookmark>,
    pub node_list: Option<NodeList>,
    /// Single selected element the command acts on directly
    pub element: Option<NodeId>,
    pub value: CommandValue,
    pub env: EnvOptions,
    pub catalog: &'a Catalog,
    /// Selection to establish afterwards instead of the bookmark
    pub new_selection: Option<Range>,
}

impl ExecDef<'_> {
    pub fn require_selection(&self) -> Result<Selection> {
        self.selection.clone().context("command needs a selection")
    }

    pub fn require_node_list(&self) -> Result<&NodeList> {
        self.node_list.as_ref().context("command needs a node list")
    }

    /// Restore the bookmark and recompute selection and node list
    ///
    /// Used by commands that run a second structural pass after mutating.
    pub fn refresh(&mut self) -> Result<(Selection, NodeList)> {
        if let Some(bookmark) = &self.bookmark {
            restore_bookmark(self.ctx, bookmark);
        }
        self.recapture()
    }

    /// Replace the selection with `range` and recompute the node list
    pub(crate) fn reselect(&mut self, range: Range) -> Result<(Selection, NodeList)> {
        self.ctx.set_selection(Some(range));
        self.recapture()
    }

    /// Restore `mark` (a bookmark taken mid-command) and recompute
    pub(crate) fn restore(&mut self, mark: &RangeBookmark) -> Result<(Selection, NodeList)> {
        restore_bookmark(self.ctx, mark);
        self.recapture()
    }

    fn recapture(&mut self) -> Result<(Selection, NodeList)> {
        let selection = capture_selection(self.ctx).context("range outside the editing root")?;
        let list = NodeList::build(self.ctx, &selection, self.env.granularity);
        self.selection = Some(selection.clone());
        self.node_list = Some(list.clone());
        Ok((selection, list))
    }
}

/// What [`Command::query_state`] sees
pub struct SelectionDef<'a> {
    pub ctx: &'a EditContext,
    pub selection: Option<Selection>,
    pub value: &'a CommandValue,
    pub catalog: &'a Catalog,
}

/// What a command did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Removed,
    Unchanged,
}

/// Toolbar-facing state of a command for the current selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandState {
    Active,
    Inactive,
    /// The selection mixes formatted and unformatted content
    Indeterminate,
    Disabled,
}

impl From<Coverage> for CommandState {
    fn from(coverage: Coverage) -> Self {
        match coverage {
            Coverage::All => CommandState::Active,
            Coverage::None => CommandState::Inactive,
            Coverage::Mixed => CommandState::Indeterminate,
        }
    }
}

impl CommandState {
    pub fn from_active(active: bool) -> Self {
        if active {
            CommandState::Active
        } else {
            CommandState::Inactive
        }
    }
}

pub trait Command {
    fn name(&self) -> CommandName;

    fn processing_options(&self) -> ProcessingOptions;

    /// Returns true if the command acts directly on `element` when it is the
    /// only thing selected, bypassing node-list construction
    fn accepts_element(&self, _doc: &Document, _element: NodeId) -> bool {
        false
    }

    fn execute(&self, exec: &mut ExecDef<'_>) -> Result<Outcome>;

    fn query_state(&self, def: &SelectionDef<'_>) -> CommandState;
}

/// Commands keyed by name, populated once at startup
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<CommandName, Box<dyn Command>>,
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in command
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        register_all(&mut registry);
        registry
    }

    /// Register a command, replacing any previous one of the same name
    pub fn register(&mut self, command: Box<dyn Command>) {
        let name = command.name();
        if self.commands.insert(name, command).is_some() {
            debug!("command `{}` replaced", name);
        }
    }

    pub fn get(&self, name: CommandName) -> Option<&dyn Command> {
        self.commands.get(&name).map(|c| c.as_ref())
    }

    pub fn contains(&self, name: CommandName) -> bool {
        self.commands.contains_key(&name)
    }

    pub fn names(&self) -> Vec<CommandName> {
        let mut names: Vec<CommandName> = self.commands.keys().copied().collect();
        names.sort();
        names
    }
}

/// Register every built-in command
pub fn register_all(registry: &mut CommandRegistry) {
    registry.register(Box::new(InlineToggle::bold()));
    registry.register(Box::new(InlineToggle::italic()));
    registry.register(Box::new(InlineToggle::underline()));
    registry.register(Box::new(InlineToggle::strikethrough()));
    registry.register(Box::new(InlineToggle::subscript()));
    registry.register(Box::new(InlineToggle::superscript()));
    registry.register(Box::new(RemoveFormat));
    for alignment in Alignment::ALL {
        registry.register(Box::new(Justify::new(alignment)));
    }
    registry.register(Box::new(CreateLink));
    registry.register(Box::new(Unlink));
    registry.register(Box::new(ApplyStyle));
    registry.register(Box::new(FormatBlock));
    registry.register(Box::new(ListToggle::ordered()));
    registry.register(Box::new(ListToggle::unordered()));
    registry.register(Box::new(InsertTable));
    registry.register(Box::new(DeleteTable));
    registry.register(Box::new(InsertTableRow));
    registry.register(Box::new(DeleteTableRow));
}

/// Word around a caret inside a text node
pub(crate) fn word_range(doc: &Document, pos: &Position) -> Option<Range> {
    let text = doc.text(pos.node)?;
    let chars: Vec<char> = text.chars().collect();
    let is_word = |c: &char| c.is_alphanumeric() || *c == '_' || *c == '\'';
    let mut start = pos.offset.min(chars.len());
    while start > 0 && is_word(&chars[start - 1]) {
        start -= 1;
    }
    let mut end = pos.offset.min(chars.len());
    while end < chars.len() && is_word(&chars[end]) {
        end += 1;
    }
    (start < end).then(|| {
        Range::new(
            Position::new(pos.node, start),
            Position::new(pos.node, end),
        )
    })
}
