//! Render list and display items.
//!
//! Backends that execute draw calls through a command stream (the headless device) log
//! every executed primitive in a [`RenderList`]. The list is a record, not a queue:
//! items are appended after they ran, in submission order, so hosts and tests can
//! inspect what a frame consisted of.
//!
//! # Example
//!
//! ```rust
//! use pane_render::render::{Color, DisplayItem, RenderList};
//!
//! let mut list = RenderList::new();
//! list.add_command(DisplayItem::Clear { color: Color::from_u8(0, 0, 0, 255) });
//! assert_eq!(list.items.len(), 1);
//! ```

use crate::render::target::DrawState;
use crate::render::types::{Color, Rect};

/// A single executed drawing command.
#[derive(Clone, Debug, PartialEq)]
pub enum DisplayItem {
    /// Clear the entire surface with the given color.
    Clear {
        /// The color to clear the surface with.
        color: Color,
    },

    /// A filled rectangle.
    Rect {
        state: DrawState,
        rect: Rect,
        color: Color,
    },

    /// Part of a device texture stretched over a rectangle.
    TexturedQuad {
        state: DrawState,
        /// Device handle of the texture at the time of the draw
        texture_id: u64,
        src: Rect,
        dst: Rect,
        tint: Color,
    },
}

/// A list of executed display items.
#[derive(Clone, Debug, Default)]
pub struct RenderList {
    /// Sequence of drawing commands, oldest first.
    pub items: Vec<DisplayItem>,
}

impl RenderList {
    /// Creates a new, empty render list.
    pub fn new() -> Self {
        RenderList { items: Vec::new() }
    }

    /// Adds a new display item (drawing command) to the list.
    pub fn add_command(&mut self, command: DisplayItem) {
        self.items.push(command);
    }

    /// Clears all display items from the list.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}
