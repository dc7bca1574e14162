pub mod backend;
pub mod target;
pub mod texture;
pub mod types;

/// Rendering backends.
pub mod backends {
    /// Cairo image surface backend
    #[cfg(feature = "backend_cairo")]
    pub mod cairo;
    /// In-memory device backend
    pub mod headless;
    /// tiny-skia backend
    pub mod software;

    mod paint;
}

mod render_list;
pub use render_list::*;

pub use backend::{BackendRenderer, ErasedSurface};
pub use target::{DrawState, RenderTarget};
pub use texture::{BackendTexture, LoadedTexture, ReplaceInternal};
pub use types::{Color, Rect, RgbaImage, Transform, Vector2f, Vector2u};
