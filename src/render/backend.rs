use std::any::Any;

use crate::errors::RenderError;
use crate::render::target::RenderTarget;
use crate::render::texture::BackendTexture;
use crate::render::types::{RgbaImage, Vector2u};

/// Type-erased destination surface so the context can hold surfaces of any backend.
pub trait ErasedSurface: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn size(&self) -> Vector2u;
}

/// Core backend interface. Calls occur on the backend's owning thread.
///
/// The renderer is the only backend specific object widget code sees directly; it hands
/// out texture handles and render targets that all speak the backend independent
/// contracts in [`crate::render::texture`] and [`crate::render::target`].
pub trait BackendRenderer {
    /// Human readable backend name, used in logs and errors.
    fn name(&self) -> &str;

    /// Creates a new, empty texture handle bound to this backend.
    ///
    /// Never fails; allocation errors surface on the first load of the texture.
    fn create_texture(&self) -> Box<dyn BackendTexture>;

    /// Maximum width and height of a single texture.
    ///
    /// The value is queried from the backend, never clamped on behalf of the caller:
    /// callers must keep their requested sizes within it themselves.
    fn maximum_texture_size(&self) -> u32;

    /// Creates a new destination surface of the given size.
    fn create_surface(&self, size: Vector2u) -> Result<Box<dyn ErasedSurface>, RenderError>;

    /// Starts drawing into `surface`. The target borrows the surface for its lifetime.
    fn create_render_target<'s>(&self, surface: &'s mut dyn ErasedSurface) -> Result<RenderTarget<'s>, RenderError>;

    /// Reads the content of `surface` back as RGBA8.
    fn snapshot(&self, surface: &dyn ErasedSurface) -> Result<RgbaImage, RenderError>;
}

impl std::fmt::Debug for dyn BackendRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRenderer")
            .field("name", &self.name())
            .field("maximum_texture_size", &self.maximum_texture_size())
            .finish()
    }
}

/// Downcasts `surface` to the surface type of a backend.
pub(crate) fn downcast_surface<'s, S: ErasedSurface>(
    surface: &'s mut dyn ErasedSurface,
    backend: &str,
) -> Result<&'s mut S, RenderError> {
    surface
        .as_any_mut()
        .downcast_mut::<S>()
        .ok_or_else(|| RenderError::SurfaceMismatch(backend.to_string()))
}

pub(crate) fn downcast_surface_ref<'s, S: ErasedSurface>(
    surface: &'s dyn ErasedSurface,
    backend: &str,
) -> Result<&'s S, RenderError> {
    surface
        .as_any()
        .downcast_ref::<S>()
        .ok_or_else(|| RenderError::SurfaceMismatch(backend.to_string()))
}
