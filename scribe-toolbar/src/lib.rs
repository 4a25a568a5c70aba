//! Scribe toolbar - built-in plugins and the toolbar model
//!
//! This crate sits between the editing engine and a UI:
//! - Built-in plugins for formatting, alignment, links, styles, structure
//!   and history
//! - Toolbar builder and model with plain-text rendering
//! - Channel bridge forwarding UI updates to another thread

pub mod plugins;
pub mod render;
pub mod toolbar;

#[cfg(feature = "channel")]
pub mod bridge;

// Re-export main types
pub use plugins::{BuiltinPlugin, SharedState, ToolbarState};
pub use toolbar::{Toolbar, ToolbarBuilder, ToolbarGroup};

#[cfg(feature = "channel")]
pub use bridge::{attach, UpdateReceiver};
