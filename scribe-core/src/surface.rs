//! Editing surfaces: where the editable root lives
//!
//! The kernel is generic over [`EditingSurface`]. A [`FrameSurface`] edits
//! the body of an isolated document hosted in a frame; a
//! [`ContainerSurface`] edits a container element of the page itself.

use crate::commands::blocks::text_blocks;
use crate::context::{EditContext, FrameInfo, SurfaceKind};
use crate::dom::{Document, NodeId};
use crate::range::{text_offset_of, Position, Range};
use anyhow::{bail, Result};

/// Approximate glyph box used to place dialogs next to the caret
pub const CHAR_WIDTH: i32 = 8;
pub const LINE_HEIGHT: i32 = 18;

/// Page coordinates for a dialog opened over the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowPosition {
    pub x: i32,
    pub y: i32,
}

pub trait EditingSurface {
    fn kind(&self) -> SurfaceKind;

    /// Create the document and editable root for a new session
    fn initialize_context(&self) -> Result<EditContext>;

    /// Give keyboard focus to the surface
    ///
    /// Fails when the editable root is no longer attached.
    fn focus(&self, ctx: &mut EditContext) -> Result<()> {
        if !ctx.root_attached() {
            bail!("cannot focus a detached editing root");
        }
        let target = self.focus_target(ctx);
        ctx.window_mut().focused = Some(target);
        Ok(())
    }

    fn blur(&self, ctx: &mut EditContext) -> Result<()> {
        if !ctx.root_attached() {
            bail!("cannot blur a detached editing root");
        }
        let target = self.focus_target(ctx);
        if ctx.window().focused == Some(target) {
            ctx.window_mut().focused = None;
        }
        Ok(())
    }

    /// Node that receives focus
    fn focus_target(&self, ctx: &EditContext) -> NodeId;

    /// Where to open a dialog for `range` (or the top of the surface)
    fn calculate_window_position(&self, ctx: &EditContext, range: Option<&Range>) -> WindowPosition;

    /// Returns true if caret placement has to wait for the next focus event
    fn defers_caret_init(&self) -> bool;
}

/// Line and column of the start of `range` within the editable root
///
/// Lines are counted in blocks; the column is the character offset inside
/// the block.
fn caret_line_column(ctx: &EditContext, range: &Range) -> (i32, i32) {
    let doc = ctx.doc();
    let root = ctx.root();
    let Some(offset) = text_offset_of(doc, root, &range.start) else {
        return (0, 0);
    };
    let mut line = 0;
    let mut line_start = 0;
    let mut seen = 0;
    for block in text_blocks(doc, root) {
        let Some(start) = text_offset_of(doc, root, &Position::new(block, 0)) else {
            continue;
        };
        if start > offset {
            break;
        }
        line = seen;
        line_start = start;
        seen += 1;
    }
    (line, (offset - line_start) as i32)
}

fn position_near(ctx: &EditContext, range: Option<&Range>, base_x: i32, base_y: i32) -> WindowPosition {
    let window = ctx.window();
    let (line, column) = range.map_or((0, 0), |r| caret_line_column(ctx, r));
    WindowPosition {
        x: base_x + column * CHAR_WIDTH - window.scroll_x,
        y: base_y + (line + 1) * LINE_HEIGHT - window.scroll_y,
    }
}

/// An isolated `html`/`head`/`body` document; the body is editable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSurface {
    pub info: FrameInfo,
    /// Caret placement must wait for the frame to take focus
    pub defer_caret: bool,
}

impl FrameSurface {
    pub fn new(name: &str) -> Self {
        Self {
            info: FrameInfo {
                name: name.to_string(),
                offset_x: 0,
                offset_y: 0,
            },
            defer_caret: true,
        }
    }

    pub fn at(mut self, offset_x: i32, offset_y: i32) -> Self {
        self.info.offset_x = offset_x;
        self.info.offset_y = offset_y;
        self
    }
}

impl EditingSurface for FrameSurface {
    fn kind(&self) -> SurfaceKind {
        SurfaceKind::Frame
    }

    fn initialize_context(&self) -> Result<EditContext> {
        let mut doc = Document::new();
        let html = doc.create_element("html");
        let head = doc.create_element("head");
        let body = doc.create_element("body");
        let document = doc.document_node();
        doc.append_child(document, html);
        doc.append_child(html, head);
        doc.append_child(html, body);
        doc.set_attr(body, "contenteditable", "true");
        Ok(EditContext::new(
            doc,
            body,
            Some(self.info.clone()),
            SurfaceKind::Frame,
        ))
    }

    fn focus_target(&self, ctx: &EditContext) -> NodeId {
        ctx.root()
    }

    fn calculate_window_position(&self, ctx: &EditContext, range: Option<&Range>) -> WindowPosition {
        position_near(ctx, range, self.info.offset_x, self.info.offset_y)
    }

    fn defers_caret_init(&self) -> bool {
        self.defer_caret
    }
}

/// A directly editable container element of the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSurface {
    pub tag: String,
    pub id: Option<String>,
}

impl Default for ContainerSurface {
    fn default() -> Self {
        Self {
            tag: "div".to_string(),
            id: None,
        }
    }
}

impl ContainerSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }
}

impl EditingSurface for ContainerSurface {
    fn kind(&self) -> SurfaceKind {
        SurfaceKind::Container
    }

    fn initialize_context(&self) -> Result<EditContext> {
        let mut doc = Document::new();
        let root = doc.create_element(&self.tag);
        if let Some(id) = &self.id {
            doc.set_attr(root, "id", id);
        }
        doc.set_attr(root, "contenteditable", "true");
        let document = doc.document_node();
        doc.append_child(document, root);
        Ok(EditContext::new(doc, root, None, SurfaceKind::Container))
    }

    fn focus_target(&self, ctx: &EditContext) -> NodeId {
        ctx.root()
    }

    fn calculate_window_position(&self, ctx: &EditContext, range: Option<&Range>) -> WindowPosition {
        position_near(ctx, range, 0, 0)
    }

    fn defers_caret_init(&self) -> bool {
        false
    }
}
