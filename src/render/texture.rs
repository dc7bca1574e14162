//! Texture handles.
//!
//! A texture handle owns exactly one backend-native image resource (a device handle, a
//! rasterizer pixmap or a cairo surface) and releases it when dropped. Every backend
//! implements [`BackendTexture`]; the state all of them share lives in [`TextureState`].
//!
//! There are two ways to upload pixels:
//!
//! - [`BackendTexture::load_texture_only`] uploads and forgets the pixels. It is the
//!   cheap path, used for blit destinations and rasterized vector images.
//! - [`BackendTexture::load`] uploads and keeps a copy of the pixels, so that
//!   [`BackendTexture::is_transparent_pixel`] can answer hit-test queries later.
//!
//! Both paths are kept apart on purpose: widgets that never hit-test their images rely on
//! the first one not holding a second copy of every texture in memory.

use std::any::Any;

use crate::errors::RenderError;
use crate::render::types::{expected_len, Vector2u};

/// Backend independent part of a texture handle.
#[derive(Debug, Default, Clone)]
pub struct TextureState {
    /// Size of the native resource, `(0, 0)` while nothing is loaded
    pub size: Vector2u,
    /// Sampling filter used when the texture is drawn
    pub smooth: bool,
    /// Copy of the pixels, only kept by [`BackendTexture::load`]
    pub pixels: Option<Box<[u8]>>,
}

impl TextureState {
    /// Records a successful (re)load of the native resource. Retained pixels no longer
    /// match the resource and are dropped.
    pub fn loaded(&mut self, size: Vector2u, smooth: bool) {
        self.size = size;
        self.smooth = smooth;
        self.pixels = None;
    }

    /// Resets everything, used when the native resource is released.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Checks the arguments of a load call against the backend limit.
///
/// Returns the expected byte length of the pixel buffer.
pub fn validate_load(size: Vector2u, pixels: Option<&[u8]>, maximum: u32) -> Result<usize, RenderError> {
    if size.x == 0 || size.y == 0 {
        return Err(RenderError::InvalidSize(size));
    }
    if size.x > maximum || size.y > maximum {
        return Err(RenderError::TextureTooLarge { requested: size, maximum });
    }

    let expected = expected_len(size).ok_or(RenderError::InvalidSize(size))?;
    if let Some(pixels) = pixels {
        if pixels.len() != expected {
            return Err(RenderError::InvalidPixelData { expected, actual: pixels.len() });
        }
    }

    Ok(expected)
}

/// Texture handle interface implemented by each backend.
///
/// Calls happen on the thread that owns the backend; handles of the headless backend
/// hold `Rc` references and are therefore neither `Send` nor `Sync`.
pub trait BackendTexture: Any {
    /// Shared state of this handle.
    fn state(&self) -> &TextureState;
    fn state_mut(&mut self) -> &mut TextureState;

    /// Allocates (or replaces) the native resource with `size`, optionally filled with
    /// RGBA8 `pixels` of exactly `size.x * size.y * 4` bytes. `None` creates a texture
    /// with undefined content.
    ///
    /// The pixels are not retained. On failure the previous resource is kept.
    fn load_texture_only(&mut self, size: Vector2u, pixels: Option<&[u8]>, smooth: bool) -> Result<(), RenderError>;

    /// Changes the sampling filter used when the texture is drawn. Stored pixels are
    /// not affected.
    fn set_smooth(&mut self, smooth: bool);

    /// True when a native resource is present.
    fn is_loaded(&self) -> bool;

    /// Reads the native resource back as RGBA8.
    fn read_pixels(&self) -> Result<Vec<u8>, RenderError>;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Uploads `pixels` and keeps them for [`is_transparent_pixel`](Self::is_transparent_pixel).
    fn load(&mut self, size: Vector2u, pixels: Vec<u8>, smooth: bool) -> Result<(), RenderError> {
        self.load_texture_only(size, Some(&pixels), smooth)?;
        self.state_mut().pixels = Some(pixels.into_boxed_slice());
        Ok(())
    }

    fn size(&self) -> Vector2u {
        self.state().size
    }

    fn is_smooth(&self) -> bool {
        self.state().smooth
    }

    /// True when the pixel at `pos` has an alpha of zero.
    ///
    /// Only works for textures loaded through [`load`](Self::load); there is no
    /// guessing from the native resource.
    fn is_transparent_pixel(&self, pos: Vector2u) -> Result<bool, RenderError> {
        let state = self.state();
        let pixels = state.pixels.as_ref().ok_or(RenderError::PixelsNotRetained)?;
        if pos.x >= state.size.x || pos.y >= state.size.y {
            return Err(RenderError::OutOfBounds(pos));
        }

        let i = ((pos.y as usize) * (state.size.x as usize) + pos.x as usize) * 4 + 3;
        Ok(pixels[i] == 0)
    }
}

impl std::fmt::Debug for dyn BackendTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendTexture")
            .field("size", &self.size())
            .field("smooth", &self.is_smooth())
            .field("loaded", &self.is_loaded())
            .field("retains_pixels", &self.state().pixels.is_some())
            .finish()
    }
}

/// Transfer of an already created native resource into a texture handle.
///
/// `Native` is a move-only owning wrapper, so once handed over the caller has no way to
/// release the resource a second time.
pub trait ReplaceInternal {
    type Native;

    /// Destroys the current resource (if any) and takes ownership of `native`.
    ///
    /// Size and smooth flag are re-derived from the new resource and retained pixels
    /// are dropped.
    fn replace_internal_texture(&mut self, native: Self::Native);

    /// Borrow of the native resource, `None` while nothing is loaded.
    fn internal_texture(&self) -> Option<&Self::Native>;
}

/// Proof that a texture handle has a native resource.
///
/// Render targets only accept this type, so drawing a texture that was never loaded
/// cannot be expressed.
#[derive(Clone, Copy)]
pub struct LoadedTexture<'t> {
    texture: &'t dyn BackendTexture,
}

impl<'t> LoadedTexture<'t> {
    /// `None` when `texture` has no native resource yet.
    pub fn new(texture: &'t dyn BackendTexture) -> Option<Self> {
        texture.is_loaded().then_some(Self { texture })
    }

    pub fn texture(&self) -> &'t dyn BackendTexture {
        self.texture
    }

    pub fn size(&self) -> Vector2u {
        self.texture.size()
    }

    pub fn is_smooth(&self) -> bool {
        self.texture.is_smooth()
    }

    /// Concrete backend texture, `None` if it belongs to another backend.
    pub fn downcast<T: BackendTexture>(&self) -> Option<&'t T> {
        self.texture.as_any().downcast_ref::<T>()
    }
}

impl std::fmt::Debug for LoadedTexture<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("LoadedTexture").field(&self.texture).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_load_checks_size_and_length() {
        assert_eq!(validate_load(Vector2u::new(2, 2), None, 8), Ok(16));
        assert_eq!(
            validate_load(Vector2u::new(0, 2), None, 8),
            Err(RenderError::InvalidSize(Vector2u::new(0, 2)))
        );
        assert_eq!(
            validate_load(Vector2u::new(9, 1), None, 8),
            Err(RenderError::TextureTooLarge { requested: Vector2u::new(9, 1), maximum: 8 })
        );
        assert_eq!(
            validate_load(Vector2u::new(2, 2), Some(&[0; 12]), 8),
            Err(RenderError::InvalidPixelData { expected: 16, actual: 12 })
        );
    }

    #[test]
    fn loaded_drops_stale_pixels() {
        let mut state = TextureState {
            size: Vector2u::new(1, 1),
            smooth: false,
            pixels: Some(vec![0, 0, 0, 0].into_boxed_slice()),
        };
        state.loaded(Vector2u::new(4, 4), true);
        assert_eq!(state.size, Vector2u::new(4, 4));
        assert!(state.smooth);
        assert!(state.pixels.is_none());
    }
}
