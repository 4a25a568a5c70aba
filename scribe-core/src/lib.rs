//! Scribe Core - Rich-text editing engine
//!
//! This crate holds the editing engine, independent of any toolbar or host UI:
//! - In-memory DOM with an edit context describing one editing session
//! - Selection model, bookmarks and node lists over the DOM
//! - Formatting commands behind a command registry
//! - Editor kernel with undo history and editing surfaces
//! - HTML serialization and configuration management

pub mod bookmark;
pub mod commands;
pub mod config;
pub mod context;
pub mod dom;
pub mod event;
pub mod html;
pub mod input;
pub mod kernel;
pub mod nodelist;
pub mod plugin;
pub mod range;
pub mod surface;
pub mod typing;
pub mod undo;

// Re-export commonly used types
pub use commands::{CommandName, CommandState, CommandValue, EnvOptions, Outcome};
pub use config::Config;
pub use context::EditContext;
pub use dom::Document;
pub use kernel::{Editor, ExecOutcome, IgnoreReason, SessionState, StateSnapshot, UiUpdate};
pub use surface::{ContainerSurface, EditingSurface, FrameSurface};
