//! Editor kernel: session lifecycle, command pipeline and input dispatch
//!
//! One [`Editor`] drives one editing session over an [`EditingSurface`].
//! Every user action runs in a fixed order: selection, bookmark and node
//! list are captured before the command executes, and the selection is
//! restored before plugins and listeners are notified.

use crate::bookmark::{create_bookmark, restore_bookmark, restore_bookmark_structural, RangeBookmark};
use crate::commands::blocks::block_of;
use crate::commands::{
    CommandName, CommandRegistry, CommandState, CommandValue, EnvOptions, ExecDef, Outcome,
    ProcessingOptions, SelectionDef,
};
use crate::config::{Catalog, Config};
use crate::context::EditContext;
use crate::html::HtmlProcessor;
use crate::input::{classify, map_key, Action, KeyEvent};
use crate::nodelist::NodeList;
use crate::plugin::{Plugin, PluginRegistry};
use crate::range::{capture_selection, position_at_text_offset, Bias, Range};
use crate::surface::{EditingSurface, WindowPosition};
use crate::typing;
use crate::undo::{UndoManager, UndoSignal, UndoTracker};
use anyhow::{bail, Context, Result};
use log::{debug, error, info, warn};
use std::collections::BTreeMap;

/// Lifecycle of an editing session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Initializing,
    /// Content loaded, focus elsewhere
    Idle,
    /// The surface holds focus
    Editing,
    /// A dialog owns focus; the selection is parked in a bookmark
    DialogOpen,
    Destroyed,
}

impl SessionState {
    /// Returns true if commands may run
    pub fn is_live(self) -> bool {
        matches!(
            self,
            SessionState::Idle | SessionState::Editing | SessionState::DialogOpen
        )
    }
}

/// Why a command did not run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NoSelection,
    Disabled,
    Failed,
    UnknownCommand,
    NotEditing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOutcome {
    Executed(Outcome),
    Ignored(IgnoreReason),
}

impl ExecOutcome {
    pub fn is_executed(self) -> bool {
        matches!(self, ExecOutcome::Executed(_))
    }
}

/// What triggered a UI update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateReason {
    Started,
    Command(CommandName),
    Edit,
    Selection,
    Focus,
    Blur,
    Dialog,
    Destroyed,
}

/// Toolbar-facing state of the whole editor
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StateSnapshot {
    pub session: SessionState,
    pub has_selection: bool,
    pub states: BTreeMap<CommandName, CommandState>,
    /// Paragraph format of the block holding the selection start
    pub block_format: Option<String>,
    /// Catalog styles active at the selection
    pub active_styles: Vec<String>,
    pub can_undo: bool,
    pub can_redo: bool,
}

impl StateSnapshot {
    pub fn state(&self, name: CommandName) -> CommandState {
        self.states
            .get(&name)
            .copied()
            .unwrap_or(CommandState::Disabled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiUpdate {
    pub reason: UpdateReason,
    pub snapshot: StateSnapshot,
}

type Listener = Box<dyn FnMut(&UiUpdate)>;

pub struct Editor<S: EditingSurface> {
    surface: S,
    ctx: Option<EditContext>,
    state: SessionState,
    config: Config,
    catalog: Catalog,
    commands: CommandRegistry,
    plugins: PluginRegistry,
    undo: UndoManager,
    tracker: UndoTracker,
    /// Lossless processor for undo snapshots
    snapshot: HtmlProcessor,
    /// Configured processor for loading and saving content
    output: HtmlProcessor,
    /// Caret placement waiting for the next focus event
    deferred_caret: Option<Range>,
    dialog_mark: Option<RangeBookmark>,
    listeners: Vec<Listener>,
}

impl<S: EditingSurface> Editor<S> {
    pub fn new(surface: S, config: Config) -> Self {
        let catalog = config.catalog();
        let output = HtmlProcessor::new(config.html.clone());
        let undo = UndoManager::new(config.undo.max_steps);
        Self {
            surface,
            ctx: None,
            state: SessionState::Uninitialized,
            config,
            catalog,
            commands: CommandRegistry::with_defaults(),
            plugins: PluginRegistry::new(),
            undo,
            tracker: UndoTracker::new(),
            snapshot: HtmlProcessor::permissive(),
            output,
            deferred_caret: None,
            dialog_mark: None,
            listeners: Vec::new(),
        }
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn Plugin>) -> Result<()> {
        self.plugins.register(plugin)
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Replace or add a command implementation
    pub fn commands_mut(&mut self) -> &mut CommandRegistry {
        &mut self.commands
    }

    /// Call `listener` after every command and selection change
    pub fn subscribe(&mut self, listener: impl FnMut(&UiUpdate) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn context(&self) -> Option<&EditContext> {
        self.ctx.as_ref()
    }

    pub fn context_mut(&mut self) -> Option<&mut EditContext> {
        self.ctx.as_mut()
    }

    pub fn undo_manager(&self) -> &UndoManager {
        &self.undo
    }

    pub fn deferred_caret(&self) -> Option<Range> {
        self.deferred_caret
    }

    /// Create the edit context, load `html` and place the caret
    pub fn start(&mut self, html: &str) -> Result<()> {
        if self.state != SessionState::Uninitialized {
            bail!("editor already started ({:?})", self.state);
        }
        self.state = SessionState::Initializing;
        let mut ctx = self
            .surface
            .initialize_context()
            .context("failed to initialize the editing surface")?;
        self.output
            .set_content(&mut ctx, html)
            .context("failed to load initial content")?;

        let root = ctx.root();
        let caret = Range::collapsed(position_at_text_offset(ctx.doc(), root, 0, Bias::Forward));
        let defer = self
            .config
            .surface
            .defer_caret_init
            .unwrap_or_else(|| self.surface.defers_caret_init());
        if defer {
            debug!("caret initialization deferred to the next focus event");
            self.deferred_caret = Some(caret);
        } else {
            ctx.set_selection(Some(caret));
        }

        self.undo.clear();
        self.undo
            .add_undo_step(self.snapshot.serialize(&ctx), create_bookmark(&ctx));
        self.ctx = Some(ctx);
        self.state = SessionState::Idle;
        info!("editing session started on {:?} surface", self.surface.kind());
        self.notify(UpdateReason::Started);
        Ok(())
    }

    /// Focus the surface; failures on a detached root are ignored
    pub fn focus(&mut self) {
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        match self.surface.focus(ctx) {
            Ok(()) => self.handle_focus_event(),
            Err(err) => debug!("focus ignored: {:#}", err),
        }
    }

    pub fn blur(&mut self) {
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        match self.surface.blur(ctx) {
            Ok(()) => self.handle_blur_event(),
            Err(err) => debug!("blur ignored: {:#}", err),
        }
    }

    /// The surface received focus
    ///
    /// Consumes a pending deferred caret placement.
    pub fn handle_focus_event(&mut self) {
        if self.state == SessionState::Idle {
            self.state = SessionState::Editing;
        }
        self.run_deferred();
        self.notify(UpdateReason::Focus);
    }

    pub fn handle_blur_event(&mut self) {
        let signals = self.tracker.interrupt();
        self.apply_signals(&signals);
        if self.state == SessionState::Editing {
            self.state = SessionState::Idle;
        }
        self.notify(UpdateReason::Blur);
    }

    /// Park a caret placement until the next focus event
    ///
    /// A pending placement is overwritten, never queued.
    pub fn defer_caret(&mut self, range: Range) {
        self.deferred_caret = Some(range);
    }

    /// Apply the pending caret placement now; returns false if none was pending
    pub fn run_deferred(&mut self) -> bool {
        let Some(range) = self.deferred_caret.take() else {
            return false;
        };
        match self.ctx.as_mut() {
            Some(ctx) => {
                ctx.set_selection(Some(range));
                true
            }
            None => false,
        }
    }

    /// End the session, returning the final content
    pub fn destroy(&mut self) -> Option<String> {
        if self.state == SessionState::Destroyed {
            return None;
        }
        let content = self.content();
        self.state = SessionState::Destroyed;
        self.deferred_caret = None;
        self.dialog_mark = None;
        self.notify(UpdateReason::Destroyed);
        self.listeners.clear();
        self.ctx = None;
        info!("editing session destroyed");
        content
    }

    /// Run a command against the current selection
    ///
    /// Never fails: commands that cannot run are reported as ignored.
    pub fn execute(&mut self, name: CommandName, value: CommandValue, env: EnvOptions) -> ExecOutcome {
        if !self.state.is_live() {
            debug!("{} ignored: session is {:?}", name, self.state);
            return ExecOutcome::Ignored(IgnoreReason::NotEditing);
        }
        if name.is_history() {
            return self.step_history(name);
        }

        let outcome = match self.run_command(name, value, env) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!("{} failed: {:#}", name, err);
                if let Some(ctx) = self.ctx.as_mut() {
                    let root = ctx.root();
                    ctx.doc_mut().normalize(root);
                }
                ExecOutcome::Ignored(IgnoreReason::Failed)
            }
        };
        if outcome.is_executed() {
            self.notify(UpdateReason::Command(name));
        }
        outcome
    }

    fn run_command(&mut self, name: CommandName, value: CommandValue, env: EnvOptions) -> Result<ExecOutcome> {
        let Some(command) = self.commands.get(name) else {
            return Ok(ExecOutcome::Ignored(IgnoreReason::UnknownCommand));
        };
        let Some(ctx) = self.ctx.as_mut() else {
            return Ok(ExecOutcome::Ignored(IgnoreReason::NotEditing));
        };

        if let Some(mark) = &self.dialog_mark {
            restore_bookmark(ctx, mark);
        }
        let Some(selection) = capture_selection(ctx) else {
            debug!("{} ignored: no selection in the editing root", name);
            return Ok(ExecOutcome::Ignored(IgnoreReason::NoSelection));
        };
        let state = command.query_state(&SelectionDef {
            ctx,
            selection: Some(selection.clone()),
            value: &value,
            catalog: &self.catalog,
        });
        if state == CommandState::Disabled {
            debug!("{} ignored: disabled for the selection", name);
            return Ok(ExecOutcome::Ignored(IgnoreReason::Disabled));
        }

        let signals = self.tracker.interrupt();
        for signal in signals {
            apply_signal(&mut self.undo, &self.snapshot, ctx, signal);
        }
        if env.record_undo {
            self.undo
                .add_undo_step(self.snapshot.serialize(ctx), create_bookmark(ctx));
        }

        let options = command.processing_options();
        let bookmark = if options.contains(ProcessingOptions::BOOKMARK) {
            create_bookmark(ctx)
        } else {
            None
        };
        let element = selection
            .selected_element(ctx.doc())
            .filter(|&e| command.accepts_element(ctx.doc(), e));
        let node_list = (element.is_none() && options.contains(ProcessingOptions::NODE_LIST))
            .then(|| NodeList::build(ctx, &selection, env.granularity));

        let mut exec = ExecDef {
            ctx: &mut *ctx,
            selection: Some(selection),
            bookmark,
            node_list,
            element,
            value,
            env,
            catalog: &self.catalog,
            new_selection: None,
        };
        let result = command.execute(&mut exec);
        let new_selection = exec.new_selection.take();
        let bookmark = exec.bookmark.take();
        let outcome = result?;

        let root = ctx.root();
        ctx.doc_mut().normalize(root);
        if let Err(err) = ctx.doc().check_well_formed(root) {
            error!("{} left malformed markup: {:#}", name, err);
        }

        match (new_selection, bookmark) {
            (Some(range), _) => ctx.set_selection(Some(range)),
            (None, Some(mark)) if env.restore_selection => {
                restore_bookmark(ctx, &mark);
            }
            _ => {}
        }
        if self.state == SessionState::DialogOpen {
            self.dialog_mark = create_bookmark(ctx);
        }

        if env.record_undo
            && self
                .undo
                .add_undo_step(self.snapshot.serialize(ctx), create_bookmark(ctx))
        {
            self.undo.clear_redo_history();
        }
        debug!("{} executed: {:?}", name, outcome);
        Ok(ExecOutcome::Executed(outcome))
    }

    fn step_history(&mut self, name: CommandName) -> ExecOutcome {
        let signals = self.tracker.interrupt();
        self.apply_signals(&signals);
        let Some(ctx) = self.ctx.as_mut() else {
            return ExecOutcome::Ignored(IgnoreReason::NotEditing);
        };

        let current = self.snapshot.serialize(ctx);
        let mark = create_bookmark(ctx);
        let step = if name == CommandName::Redo {
            self.undo.redo(current, mark)
        } else {
            self.undo.undo(current, mark)
        };
        let Some(step) = step else {
            debug!("{} ignored: history exhausted", name);
            return ExecOutcome::Ignored(IgnoreReason::Disabled);
        };

        if let Err(err) = self.snapshot.set_content(ctx, &step.content) {
            warn!("{} failed to restore step {}: {:#}", name, step.ordinal, err);
            return ExecOutcome::Ignored(IgnoreReason::Failed);
        }
        match &step.bookmark {
            Some(mark) => {
                restore_bookmark_structural(ctx, mark);
            }
            None => {
                let root = ctx.root();
                let start = position_at_text_offset(ctx.doc(), root, 0, Bias::Forward);
                ctx.set_selection(Some(Range::collapsed(start)));
            }
        }
        debug!("{} restored step {}", name, step.ordinal);
        self.notify(UpdateReason::Command(name));
        ExecOutcome::Executed(Outcome::Applied)
    }

    /// Current state of `name` for the live selection
    pub fn query_state(&self, name: CommandName, value: &CommandValue) -> CommandState {
        let Some(ctx) = &self.ctx else {
            return CommandState::Disabled;
        };
        match name {
            CommandName::Undo => {
                let current = self.snapshot.serialize(ctx);
                return enabled(self.state.is_live() && self.undo.can_undo(&current));
            }
            CommandName::Redo => return enabled(self.state.is_live() && self.undo.can_redo()),
            _ => {}
        }
        let Some(command) = self.commands.get(name) else {
            return CommandState::Disabled;
        };
        command.query_state(&SelectionDef {
            ctx,
            selection: capture_selection(ctx),
            value,
            catalog: &self.catalog,
        })
    }

    /// State of every command plus history and block information
    pub fn state_snapshot(&self) -> StateSnapshot {
        let mut snapshot = StateSnapshot {
            session: self.state,
            ..StateSnapshot::default()
        };
        let Some(ctx) = &self.ctx else {
            return snapshot;
        };
        let selection = capture_selection(ctx);
        snapshot.has_selection = selection.is_some();
        for name in CommandName::ALL {
            if name.is_history() || self.commands.contains(name) {
                snapshot
                    .states
                    .insert(name, self.query_state(name, &CommandValue::None));
            }
        }
        snapshot.can_undo = snapshot.state(CommandName::Undo) != CommandState::Disabled;
        snapshot.can_redo = snapshot.state(CommandName::Redo) != CommandState::Disabled;

        if let Some(selection) = &selection {
            let doc = ctx.doc();
            snapshot.block_format = block_of(doc, ctx.root(), selection.start_node)
                .and_then(|block| doc.tag(block))
                .filter(|tag| self.catalog.has_format(tag))
                .map(str::to_string);
        }
        snapshot.active_styles = self
            .catalog
            .styles
            .iter()
            .filter(|style| {
                let value = CommandValue::Name(style.name.clone());
                self.query_state(CommandName::ApplyStyle, &value) == CommandState::Active
            })
            .map(|style| style.name.clone())
            .collect();
        snapshot
    }

    /// Serialized content under the configured rules
    pub fn content(&self) -> Option<String> {
        self.ctx.as_ref().map(|ctx| self.output.serialize(ctx))
    }

    /// The whole hosting document, with its doctype
    pub fn document(&self) -> Option<String> {
        self.ctx
            .as_ref()
            .map(|ctx| self.output.serialize_document(ctx.doc()))
    }

    /// Select by character offsets into the text of the editing root
    pub fn select_text(&mut self, start: usize, end: usize) -> bool {
        let Some(ctx) = self.ctx.as_ref() else {
            return false;
        };
        let root = ctx.root();
        let doc = ctx.doc();
        let range = if start == end {
            Range::collapsed(position_at_text_offset(doc, root, start, Bias::Backward))
        } else {
            Range::new(
                position_at_text_offset(doc, root, start.min(end), Bias::Forward),
                position_at_text_offset(doc, root, start.max(end), Bias::Backward),
            )
        };
        self.set_selection(Some(range))
    }

    /// Replace the live selection; a pending deferred caret is dropped
    pub fn set_selection(&mut self, range: Option<Range>) -> bool {
        let Some(ctx) = self.ctx.as_mut() else {
            return false;
        };
        self.deferred_caret = None;
        ctx.set_selection(range);
        self.notify(UpdateReason::Selection);
        true
    }

    /// Handle a key press; returns true if the editor consumed it
    pub fn handle_key_down(&mut self, key: KeyEvent) -> bool {
        if !matches!(self.state, SessionState::Idle | SessionState::Editing) {
            return false;
        }
        let signals = self.tracker.key_down(classify(&key));
        self.apply_signals(&signals);

        match map_key(&key) {
            Action::Command(name) => {
                self.execute(name, CommandValue::None, EnvOptions::default());
                true
            }
            Action::Undo => {
                self.execute(CommandName::Undo, CommandValue::None, EnvOptions::default());
                true
            }
            Action::Redo => {
                self.execute(CommandName::Redo, CommandValue::None, EnvOptions::default());
                true
            }
            Action::InsertText(text) => self.edit(|ctx| typing::insert_text(ctx, &text)),
            Action::Backspace => self.edit(|ctx| typing::delete_backward(ctx).map(drop)),
            Action::Delete => self.edit(|ctx| typing::delete_forward(ctx).map(drop)),
            Action::Enter => self.edit(typing::insert_paragraph),
            Action::Move { motion, extend } => {
                let moved = match self.ctx.as_mut() {
                    Some(ctx) => typing::move_caret(ctx, motion, extend),
                    None => return false,
                };
                if let Err(err) = moved {
                    debug!("caret movement ignored: {:#}", err);
                }
                self.notify(UpdateReason::Selection);
                true
            }
            Action::Ignore => false,
        }
    }

    pub fn handle_key_up(&mut self, key: KeyEvent) {
        if !self.state.is_live() {
            return;
        }
        let signals = self.tracker.key_up(classify(&key));
        self.apply_signals(&signals);
    }

    /// Mouse released, optionally with the selection the click produced
    pub fn handle_mouse_up(&mut self, range: Option<Range>) {
        if !self.state.is_live() {
            return;
        }
        if let (Some(range), Some(ctx)) = (range, self.ctx.as_mut()) {
            self.deferred_caret = None;
            ctx.set_selection(Some(range));
        }
        let signals = self.tracker.mouse_up();
        self.apply_signals(&signals);
        self.notify(UpdateReason::Selection);
    }

    fn edit(&mut self, action: impl FnOnce(&mut EditContext) -> Result<()>) -> bool {
        let Some(ctx) = self.ctx.as_mut() else {
            return false;
        };
        if let Err(err) = action(ctx) {
            debug!("edit ignored: {:#}", err);
            return false;
        }
        let root = ctx.root();
        ctx.doc_mut().normalize(root);
        self.notify(UpdateReason::Edit);
        true
    }

    /// Park the selection for a dialog and return where to show it
    pub fn open_dialog(&mut self) -> Option<WindowPosition> {
        if !matches!(self.state, SessionState::Idle | SessionState::Editing) {
            return None;
        }
        let ctx = self.ctx.as_ref()?;
        let range = ctx.selection_range();
        self.dialog_mark = create_bookmark(ctx);
        let position = self.surface.calculate_window_position(ctx, range.as_ref());
        self.state = SessionState::DialogOpen;
        self.notify(UpdateReason::Dialog);
        Some(position)
    }

    /// Restore the parked selection and return to editing
    pub fn close_dialog(&mut self) {
        if self.state != SessionState::DialogOpen {
            return;
        }
        if let (Some(mark), Some(ctx)) = (self.dialog_mark.take(), self.ctx.as_mut()) {
            restore_bookmark(ctx, &mark);
        }
        self.state = SessionState::Editing;
        self.notify(UpdateReason::Dialog);
    }

    fn apply_signals(&mut self, signals: &[UndoSignal]) {
        let Some(ctx) = self.ctx.as_ref() else {
            return;
        };
        for &signal in signals {
            apply_signal(&mut self.undo, &self.snapshot, ctx, signal);
        }
    }

    fn notify(&mut self, reason: UpdateReason) {
        let update = UiUpdate {
            reason,
            snapshot: self.state_snapshot(),
        };
        self.plugins.notify(&update.snapshot);
        for listener in self.listeners.iter_mut() {
            listener(&update);
        }
    }
}

fn apply_signal(undo: &mut UndoManager, snapshot: &HtmlProcessor, ctx: &EditContext, signal: UndoSignal) {
    match signal {
        UndoSignal::RecordStep => {
            undo.add_undo_step(snapshot.serialize(ctx), create_bookmark(ctx));
        }
        UndoSignal::ClearRedo => undo.clear_redo_history(),
    }
}

fn enabled(available: bool) -> CommandState {
    if available {
        CommandState::Inactive
    } else {
        CommandState::Disabled
    }
}
