//! Software rasterizer backend built on top of `tiny-skia`.
//!
//! Textures own their pixel memory directly as a premultiplied [`Pixmap`]; surfaces are
//! pixmaps as well. Everything runs on the CPU, so there is no device that can go away.

use std::any::Any;

use tiny_skia::Pixmap;

use super::paint;
use crate::errors::RenderError;
use crate::render::backend::{downcast_surface, downcast_surface_ref, BackendRenderer, ErasedSurface};
use crate::render::target::{DrawState, RenderTarget, TargetBackend};
use crate::render::texture::{validate_load, BackendTexture, LoadedTexture, ReplaceInternal, TextureState};
use crate::render::types::{pixmap_from_rgba, rgba_from_pixmap, Color, Rect, RgbaImage, Vector2u};

const BACKEND_NAME: &str = "software";

/// CPU renderer that rasterizes into `tiny-skia` pixmaps.
#[derive(Debug, Clone)]
pub struct SoftwareRenderer {
    max_texture_size: u32,
}

impl SoftwareRenderer {
    /// Creates a renderer whose textures are limited to `max_texture_size` pixels in
    /// both directions.
    pub fn new(max_texture_size: u32) -> Self {
        Self {
            max_texture_size: max_texture_size.max(1),
        }
    }
}

impl BackendRenderer for SoftwareRenderer {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    fn create_texture(&self) -> Box<dyn BackendTexture> {
        Box::new(SoftwareTexture::new(self.max_texture_size))
    }

    fn maximum_texture_size(&self) -> u32 {
        self.max_texture_size
    }

    fn create_surface(&self, size: Vector2u) -> Result<Box<dyn ErasedSurface>, RenderError> {
        let pixmap = Pixmap::new(size.x, size.y).ok_or(RenderError::InvalidSize(size))?;
        Ok(Box::new(SoftwareSurface { pixmap, frame_id: 0 }))
    }

    fn create_render_target<'s>(&self, surface: &'s mut dyn ErasedSurface) -> Result<RenderTarget<'s>, RenderError> {
        let surface = downcast_surface::<SoftwareSurface>(surface, BACKEND_NAME)?;
        Ok(RenderTarget::new(Box::new(SoftwareTarget { surface })))
    }

    fn snapshot(&self, surface: &dyn ErasedSurface) -> Result<RgbaImage, RenderError> {
        let surface = downcast_surface_ref::<SoftwareSurface>(surface, BACKEND_NAME)?;
        let pixmap = &surface.pixmap;
        RgbaImage::from_raw(pixmap.width(), pixmap.height(), rgba_from_pixmap(pixmap))
    }
}

/// Owned native resource of a software texture: the pixmap plus the filter it is
/// sampled with.
#[derive(Debug)]
pub struct SoftwareImage {
    pub pixmap: Pixmap,
    pub smooth: bool,
}

/// Texture handle owning a `tiny-skia` pixmap.
#[derive(Debug)]
pub struct SoftwareTexture {
    image: Option<SoftwareImage>,
    max_size: u32,
    state: TextureState,
}

impl SoftwareTexture {
    fn new(max_size: u32) -> Self {
        Self {
            image: None,
            max_size,
            state: TextureState::default(),
        }
    }
}

impl BackendTexture for SoftwareTexture {
    fn state(&self) -> &TextureState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut TextureState {
        &mut self.state
    }

    fn load_texture_only(&mut self, size: Vector2u, pixels: Option<&[u8]>, smooth: bool) -> Result<(), RenderError> {
        validate_load(size, pixels, self.max_size)?;

        let pixmap = match pixels {
            Some(pixels) => pixmap_from_rgba(size, pixels),
            None => Pixmap::new(size.x, size.y),
        }
        .ok_or(RenderError::AllocationFailed(size))?;

        self.image = Some(SoftwareImage { pixmap, smooth });
        self.state.loaded(size, smooth);
        Ok(())
    }

    fn set_smooth(&mut self, smooth: bool) {
        self.state.smooth = smooth;
        if let Some(image) = &mut self.image {
            image.smooth = smooth;
        }
    }

    fn is_loaded(&self) -> bool {
        self.image.is_some()
    }

    fn read_pixels(&self) -> Result<Vec<u8>, RenderError> {
        let image = self.image.as_ref().ok_or(RenderError::NotLoaded)?;
        Ok(rgba_from_pixmap(&image.pixmap))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl ReplaceInternal for SoftwareTexture {
    type Native = SoftwareImage;

    fn replace_internal_texture(&mut self, native: SoftwareImage) {
        let size = Vector2u::new(native.pixmap.width(), native.pixmap.height());
        self.state.loaded(size, native.smooth);
        self.image = Some(native);
    }

    fn internal_texture(&self) -> Option<&SoftwareImage> {
        self.image.as_ref()
    }
}

/// Pixmap surface of the software backend.
#[derive(Debug)]
pub struct SoftwareSurface {
    pixmap: Pixmap,
    frame_id: u64,
}

impl SoftwareSurface {
    /// Returns a reference to the backing pixmap for presenting or copying.
    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }
}

impl ErasedSurface for SoftwareSurface {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
    fn size(&self) -> Vector2u {
        Vector2u::new(self.pixmap.width(), self.pixmap.height())
    }
}

struct SoftwareTarget<'s> {
    surface: &'s mut SoftwareSurface,
}

impl TargetBackend for SoftwareTarget<'_> {
    fn target_size(&self) -> Vector2u {
        self.surface.size()
    }

    fn clear(&mut self, color: Color) {
        paint::clear(&mut self.surface.pixmap, color);
    }

    fn fill_rect(&mut self, state: &DrawState, rect: Rect, color: Color) {
        paint::fill_rect(&mut self.surface.pixmap, state, rect, color);
    }

    fn draw_texture(&mut self, state: &DrawState, texture: LoadedTexture<'_>, src: Rect, dst: Rect, tint: Color) {
        let Some(image) = texture.downcast::<SoftwareTexture>().and_then(|t| t.image.as_ref()) else {
            log::warn!("software: skipping draw of a texture from another backend");
            return;
        };
        paint::draw_pixmap(&mut self.surface.pixmap, state, image.pixmap.as_ref(), image.smooth, src, dst, tint);
    }

    fn flush(&mut self) -> Result<(), RenderError> {
        self.surface.frame_id = self.surface.frame_id.wrapping_add(1);
        Ok(())
    }
}
