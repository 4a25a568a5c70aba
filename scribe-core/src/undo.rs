//! Undo history
//!
//! [`UndoManager`] keeps a bounded ring of snapshots plus a redo stack.
//! [`UndoTracker`] decides, from classified input events, when the kernel
//! should record a new snapshot: consecutive deletions or caret movements
//! coalesce into one step recorded at the start of the run, and a deletion
//! run gets one more snapshot when it ends.

use crate::bookmark::RangeBookmark;
use log::debug;
use std::collections::VecDeque;

pub const DEFAULT_MAX_STEPS: usize = 50;

/// One recorded snapshot: markup plus caret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoStep {
    pub content: String,
    pub bookmark: Option<RangeBookmark>,
    /// Monotonic record counter
    pub ordinal: u64,
}

#[derive(Debug, Clone)]
pub struct UndoManager {
    steps: VecDeque<UndoStep>,
    redo: Vec<UndoStep>,
    max_steps: usize,
    next_ordinal: u64,
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STEPS)
    }
}

impl UndoManager {
    pub fn new(max_steps: usize) -> Self {
        Self {
            steps: VecDeque::new(),
            redo: Vec::new(),
            max_steps: max_steps.max(1),
            next_ordinal: 0,
        }
    }

    /// Change the step limit, evicting the oldest steps if needed
    pub fn configure(&mut self, max_steps: usize) {
        self.max_steps = max_steps.max(1);
        self.evict();
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn undo_len(&self) -> usize {
        self.steps.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn steps(&self) -> impl Iterator<Item = &UndoStep> {
        self.steps.iter()
    }

    /// Returns true if `undo` would change the document from `current`
    pub fn can_undo(&self, current: &str) -> bool {
        self.steps.iter().any(|step| step.content != current)
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Record a snapshot
    ///
    /// A snapshot whose content equals the newest step only refreshes that
    /// step's bookmark. Returns true if a new step was added.
    pub fn add_undo_step(&mut self, content: String, bookmark: Option<RangeBookmark>) -> bool {
        if let Some(top) = self.steps.back_mut() {
            if top.content == content {
                top.bookmark = bookmark;
                return false;
            }
        }
        let step = self.make_step(content, bookmark);
        debug!("undo step {} recorded", step.ordinal);
        self.steps.push_back(step);
        self.evict();
        true
    }

    /// Step back from `current`, returning the snapshot to restore
    ///
    /// Steps equal to the current content are skipped; `current` is kept on
    /// the redo stack. Returns `None` when there is nothing to go back to.
    pub fn undo(&mut self, current: String, bookmark: Option<RangeBookmark>) -> Option<UndoStep> {
        let unchanged = self
            .steps
            .iter()
            .rev()
            .take_while(|step| step.content == current)
            .count();
        if unchanged == self.steps.len() {
            return None;
        }
        self.steps.truncate(self.steps.len() - unchanged);
        let target = self.steps.back().cloned()?;
        let step = self.make_step(current, bookmark);
        self.redo.push(step);
        Some(target)
    }

    /// Re-apply the most recently undone snapshot
    pub fn redo(&mut self, current: String, bookmark: Option<RangeBookmark>) -> Option<UndoStep> {
        let target = self.redo.pop()?;
        if self.steps.back().map_or(true, |top| top.content != current) {
            let step = self.make_step(current, bookmark);
            self.steps.push_back(step);
            self.evict();
        }
        Some(target)
    }

    pub fn clear_redo_history(&mut self) {
        if !self.redo.is_empty() {
            debug!("redo history cleared ({} steps)", self.redo.len());
        }
        self.redo.clear();
    }

    pub fn clear(&mut self) {
        self.steps.clear();
        self.redo.clear();
    }

    fn make_step(&mut self, content: String, bookmark: Option<RangeBookmark>) -> UndoStep {
        self.next_ordinal += 1;
        UndoStep {
            content,
            bookmark,
            ordinal: self.next_ordinal,
        }
    }

    fn evict(&mut self) {
        while self.steps.len() > self.max_steps {
            if let Some(old) = self.steps.pop_front() {
                debug!("undo step {} evicted", old.ordinal);
            }
        }
    }
}

/// Where the tracker is within a run of related keystrokes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    InDeleteRun,
    InCaretRun,
}

/// Input categories relevant to step recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputClass {
    /// Printable character
    Producing,
    /// Backspace or delete
    Deletion,
    /// Arrows, home/end, page keys
    CaretMovement,
    /// Space or enter; a step is recorded when released
    Boundary,
    /// Modifiers and anything else
    Other,
}

/// What the kernel must do to the undo history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoSignal {
    RecordStep,
    ClearRedo,
}

#[derive(Debug, Clone, Default)]
pub struct UndoTracker {
    state: RunState,
}

impl UndoTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn key_down(&mut self, class: InputClass) -> Vec<UndoSignal> {
        match class {
            InputClass::Deletion => {
                if self.state == RunState::InDeleteRun {
                    return Vec::new();
                }
                self.state = RunState::InDeleteRun;
                vec![UndoSignal::RecordStep, UndoSignal::ClearRedo]
            }
            InputClass::CaretMovement => {
                let mut signals = self.close_delete_run();
                if self.state != RunState::InCaretRun {
                    self.state = RunState::InCaretRun;
                    signals.push(UndoSignal::RecordStep);
                }
                signals
            }
            InputClass::Producing | InputClass::Boundary => {
                let mut signals = self.close_delete_run();
                self.state = RunState::Idle;
                signals.push(UndoSignal::ClearRedo);
                signals
            }
            InputClass::Other => Vec::new(),
        }
    }

    pub fn key_up(&mut self, class: InputClass) -> Vec<UndoSignal> {
        if class == InputClass::Boundary {
            self.state = RunState::Idle;
            return vec![UndoSignal::RecordStep];
        }
        Vec::new()
    }

    pub fn mouse_up(&mut self) -> Vec<UndoSignal> {
        self.state = RunState::Idle;
        vec![UndoSignal::RecordStep]
    }

    /// End any run before a command or undo/redo takes over
    pub fn interrupt(&mut self) -> Vec<UndoSignal> {
        let signals = self.close_delete_run();
        self.state = RunState::Idle;
        signals
    }

    fn close_delete_run(&mut self) -> Vec<UndoSignal> {
        if self.state == RunState::InDeleteRun {
            self.state = RunState::Idle;
            vec![UndoSignal::RecordStep]
        } else {
            Vec::new()
        }
    }
}
