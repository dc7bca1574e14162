//! Backend context.
//!
//! The [`BackendContext`] holds the active backend renderer and the surfaces render
//! targets draw into. The application creates it once on the UI thread, calls
//! [`init`](BackendContext::init) when its first window (or backend context) exists and
//! [`shutdown`](BackendContext::shutdown) before exiting, and passes it by reference to
//! the code that builds widgets.
//!
//! Textures and render targets created while a renderer is active must not be used after
//! `shutdown`. For the headless backend such textures report
//! [`RenderError::BackendGone`]; for the other backends the textures simply keep their
//! own memory.

use std::collections::HashMap;

use uuid::Uuid;

use crate::config::RenderConfig;
use crate::errors::RenderError;
use crate::render::backend::{BackendRenderer, ErasedSurface};
use crate::render::target::RenderTarget;
use crate::render::texture::BackendTexture;
use crate::render::types::{RgbaImage, Vector2u};
use crate::svg::SvgImage;

/// Identifier of a surface registered with a [`BackendContext`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceId(Uuid);

impl SurfaceId {
    /// Create a new unique `SurfaceId` using a random UUID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SurfaceId {
    fn default() -> Self {
        Self::new()
    }
}

/// Holder of the active backend renderer.
pub struct BackendContext {
    /// Configuration for the whole context
    config: RenderConfig,
    /// Active renderer, `None` before init and after shutdown
    renderer: Option<Box<dyn BackendRenderer>>,
    /// Surfaces owned by the context, borrowed by render targets
    surfaces: HashMap<SurfaceId, Box<dyn ErasedSurface>>,
}

impl std::fmt::Debug for BackendContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendContext")
            .field("renderer", &self.renderer.as_ref().map(|r| r.name().to_string()))
            .field("surfaces", &self.surfaces.len())
            .finish()
    }
}

impl BackendContext {
    /// Creates an inactive context. If `config` is `None`, [`RenderConfig::default`] is
    /// used.
    pub fn new(config: Option<RenderConfig>) -> Self {
        Self {
            config: config.unwrap_or_default(),
            renderer: None,
            surfaces: HashMap::new(),
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Activates `renderer`. Only one renderer can be active at a time.
    pub fn init(&mut self, renderer: Box<dyn BackendRenderer>) -> Result<(), RenderError> {
        if let Some(active) = &self.renderer {
            log::warn!("init({}) refused: {} is still active", renderer.name(), active.name());
            return Err(RenderError::BackendAlreadyActive);
        }

        log::info!(
            "backend {} active (max texture size {})",
            renderer.name(),
            renderer.maximum_texture_size()
        );
        self.renderer = Some(renderer);
        Ok(())
    }

    /// Drops every surface and the active renderer. Calling it on an inactive context
    /// does nothing.
    pub fn shutdown(&mut self) {
        self.surfaces.clear();
        if let Some(renderer) = self.renderer.take() {
            log::info!("backend {} shut down", renderer.name());
        }
    }

    pub fn is_active(&self) -> bool {
        self.renderer.is_some()
    }

    /// The active renderer.
    pub fn renderer(&self) -> Result<&dyn BackendRenderer, RenderError> {
        self.renderer.as_deref().ok_or(RenderError::NoActiveBackend)
    }

    /// Creates an empty texture on the active renderer.
    pub fn create_texture(&self) -> Result<Box<dyn BackendTexture>, RenderError> {
        Ok(self.renderer()?.create_texture())
    }

    pub fn maximum_texture_size(&self) -> Result<u32, RenderError> {
        Ok(self.renderer()?.maximum_texture_size())
    }

    /// Uploads `image` into a new texture that keeps its pixels for transparency queries.
    pub fn texture_from_image(&self, image: &RgbaImage, smooth: bool) -> Result<Box<dyn BackendTexture>, RenderError> {
        let mut texture = self.create_texture()?;
        texture.load(image.size(), image.pixels.clone(), smooth)?;
        Ok(texture)
    }

    /// Rasterizes `svg` into a new texture of `size`, shrunk to fit the maximum texture
    /// size while keeping its aspect ratio.
    pub fn create_svg_texture(&self, svg: &SvgImage, size: Vector2u) -> Result<Box<dyn BackendTexture>, RenderError> {
        let size = clamp_to_maximum(size, self.maximum_texture_size()?);
        let mut texture = self.create_texture()?;
        texture.set_smooth(self.config.default_smooth);
        svg.rasterize(texture.as_mut(), size)?;
        Ok(texture)
    }

    /// Creates a surface on the active renderer and registers it.
    pub fn add_surface(&mut self, size: Vector2u) -> Result<SurfaceId, RenderError> {
        let surface = self.renderer()?.create_surface(size)?;
        let id = SurfaceId::new();
        self.surfaces.insert(id, surface);
        log::debug!("surface {id:?} added ({}x{})", size.x, size.y);
        Ok(id)
    }

    pub fn remove_surface(&mut self, id: SurfaceId) -> Result<(), RenderError> {
        self.surfaces.remove(&id).map(|_| ()).ok_or(RenderError::UnknownSurface)
    }

    pub fn surface_size(&self, id: SurfaceId) -> Result<Vector2u, RenderError> {
        self.surfaces.get(&id).map(|s| s.size()).ok_or(RenderError::UnknownSurface)
    }

    /// Starts drawing into surface `id`.
    pub fn render_target(&mut self, id: SurfaceId) -> Result<RenderTarget<'_>, RenderError> {
        let renderer = self.renderer.as_deref().ok_or(RenderError::NoActiveBackend)?;
        let surface = self.surfaces.get_mut(&id).ok_or(RenderError::UnknownSurface)?;
        renderer.create_render_target(surface.as_mut())
    }

    /// Reads surface `id` back as RGBA8.
    pub fn snapshot(&self, id: SurfaceId) -> Result<RgbaImage, RenderError> {
        let renderer = self.renderer()?;
        let surface = self.surfaces.get(&id).ok_or(RenderError::UnknownSurface)?;
        renderer.snapshot(surface.as_ref())
    }
}

impl Drop for BackendContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Scales `size` down so neither dimension exceeds `maximum`, keeping the aspect ratio.
fn clamp_to_maximum(size: Vector2u, maximum: u32) -> Vector2u {
    let largest = size.x.max(size.y);
    if largest <= maximum {
        return size;
    }

    let scale = maximum as f64 / largest as f64;
    Vector2u::new(
        ((size.x as f64 * scale).round() as u32).clamp(1, maximum),
        ((size.y as f64 * scale).round() as u32).clamp(1, maximum),
    )
}
