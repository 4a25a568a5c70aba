//! Edit context: what is being edited during one session

use crate::dom::{Document, NodeId};
use crate::range::Range;

/// Which kind of editing surface produced the context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// Isolated document hosted in a frame
    Frame,
    /// Directly editable container element
    Container,
}

/// Placement of the hosting frame inside the outer page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    pub name: String,
    pub offset_x: i32,
    pub offset_y: i32,
}

/// Browser window state visible to the engine
#[derive(Debug, Clone, Default)]
pub struct Window {
    /// The live selection range, if any
    pub selection: Option<Range>,
    /// Node currently holding keyboard focus
    pub focused: Option<NodeId>,
    pub scroll_x: i32,
    pub scroll_y: i32,
}

/// The window/document/root bundle of one editing session
///
/// Root, frame and surface kind are fixed at construction; only the document
/// content and window state change during the session.
#[derive(Debug, Clone)]
pub struct EditContext {
    window: Window,
    document: Document,
    root: NodeId,
    frame: Option<FrameInfo>,
    surface: SurfaceKind,
}

impl EditContext {
    pub fn new(
        document: Document,
        root: NodeId,
        frame: Option<FrameInfo>,
        surface: SurfaceKind,
    ) -> Self {
        Self {
            window: Window::default(),
            document,
            root,
            frame,
            surface,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn frame(&self) -> Option<&FrameInfo> {
        self.frame.as_ref()
    }

    pub fn surface(&self) -> SurfaceKind {
        self.surface
    }

    pub fn doc(&self) -> &Document {
        &self.document
    }

    pub fn doc_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut Window {
        &mut self.window
    }

    /// Current live range
    pub fn selection_range(&self) -> Option<Range> {
        self.window.selection
    }

    pub fn set_selection(&mut self, range: Option<Range>) {
        self.window.selection = range;
    }

    /// Returns true if the root is still connected to its document
    pub fn root_attached(&self) -> bool {
        self.document.is_attached(self.root)
    }
}
