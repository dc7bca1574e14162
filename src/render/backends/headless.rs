//! Headless backend.
//!
//! Textures are opaque handles owned by an in-memory [`HeadlessDevice`], the way GPU
//! textures and `SDL_Texture`s are owned by their driver. Nothing is shown on screen;
//! surfaces are `tiny-skia` pixmaps that can be read back, which makes this the backend
//! used by tests and by hosts that composite the frames themselves.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Weak;

use tiny_skia::Pixmap;

use super::paint;
use crate::config::DeviceConfig;
use crate::errors::RenderError;
use crate::render::backend::{downcast_surface, downcast_surface_ref, BackendRenderer, ErasedSurface};
use crate::render::render_list::{DisplayItem, RenderList};
use crate::render::target::{DrawState, RenderTarget, TargetBackend};
use crate::render::texture::{validate_load, BackendTexture, LoadedTexture, ReplaceInternal, TextureState};
use crate::render::types::{pixmap_from_rgba, rgba_from_pixmap, Color, Rect, RgbaImage, Vector2u};

mod device;

pub use device::{DeviceTexture, HeadlessDevice};
use device::DeviceState;

const BACKEND_NAME: &str = "headless";

/// Backend renderer on top of a [`HeadlessDevice`].
#[derive(Debug)]
pub struct HeadlessRenderer {
    device: HeadlessDevice,
}

impl HeadlessRenderer {
    /// Creates a renderer with its own device.
    pub fn new(config: DeviceConfig) -> Self {
        Self::with_device(HeadlessDevice::new(config))
    }

    /// Creates a renderer drawing with an existing device.
    pub fn with_device(device: HeadlessDevice) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &HeadlessDevice {
        &self.device
    }
}

impl BackendRenderer for HeadlessRenderer {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    fn create_texture(&self) -> Box<dyn BackendTexture> {
        Box::new(HeadlessTexture::new(&self.device))
    }

    fn maximum_texture_size(&self) -> u32 {
        self.device.max_texture_size()
    }

    fn create_surface(&self, size: Vector2u) -> Result<Box<dyn ErasedSurface>, RenderError> {
        Ok(Box::new(HeadlessSurface::new(size)?))
    }

    fn create_render_target<'s>(&self, surface: &'s mut dyn ErasedSurface) -> Result<RenderTarget<'s>, RenderError> {
        let surface = downcast_surface::<HeadlessSurface>(surface, BACKEND_NAME)?;
        surface.display_list.clear();

        Ok(RenderTarget::new(Box::new(HeadlessTarget {
            surface,
            device: self.device.downgrade(),
        })))
    }

    fn snapshot(&self, surface: &dyn ErasedSurface) -> Result<RgbaImage, RenderError> {
        let surface = downcast_surface_ref::<HeadlessSurface>(surface, BACKEND_NAME)?;
        RgbaImage::from_raw(surface.size.x, surface.size.y, rgba_from_pixmap(&surface.pixmap))
    }
}

/// Texture handle owning a [`DeviceTexture`].
pub struct HeadlessTexture {
    device: Weak<RefCell<DeviceState>>,
    texture: Option<DeviceTexture>,
    max_size: u32,
    state: TextureState,
}

impl HeadlessTexture {
    fn new(device: &HeadlessDevice) -> Self {
        Self {
            device: device.downgrade(),
            texture: None,
            max_size: device.max_texture_size(),
            state: TextureState::default(),
        }
    }

    fn device(&self) -> Result<HeadlessDevice, RenderError> {
        self.device
            .upgrade()
            .map(HeadlessDevice::from_state)
            .ok_or(RenderError::BackendGone)
    }
}

impl BackendTexture for HeadlessTexture {
    fn state(&self) -> &TextureState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut TextureState {
        &mut self.state
    }

    /// A resize allocates the new device texture before the old one is released, so under
    /// a memory budget both must fit at once. In exchange a failed resize leaves the
    /// previous texture intact.
    fn load_texture_only(&mut self, size: Vector2u, pixels: Option<&[u8]>, smooth: bool) -> Result<(), RenderError> {
        validate_load(size, pixels, self.max_size)?;

        // Same size: update in place instead of reallocating.
        let reuse = match &self.texture {
            Some(texture) => texture.query()?.0 == size,
            None => false,
        };

        if reuse {
            if let Some(texture) = &self.texture {
                if let Some(pixels) = pixels {
                    texture.update(pixels)?;
                }
                texture.set_scale_mode(smooth)?;
            }
        } else {
            let texture = self.device()?.create_texture(size, smooth)?;
            if let Some(pixels) = pixels {
                texture.update(pixels)?;
            }
            // The old handle is dropped here, destroying its device texture.
            self.texture = Some(texture);
        }

        self.state.loaded(size, smooth);
        Ok(())
    }

    fn set_smooth(&mut self, smooth: bool) {
        self.state.smooth = smooth;
        if let Some(texture) = &self.texture {
            if let Err(e) = texture.set_scale_mode(smooth) {
                log::warn!("headless: cannot change scale mode of texture {}: {e}", texture.id());
            }
        }
    }

    fn is_loaded(&self) -> bool {
        self.texture.is_some()
    }

    fn read_pixels(&self) -> Result<Vec<u8>, RenderError> {
        self.texture.as_ref().ok_or(RenderError::NotLoaded)?.read()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl ReplaceInternal for HeadlessTexture {
    type Native = DeviceTexture;

    fn replace_internal_texture(&mut self, native: DeviceTexture) {
        match native.query() {
            Ok((size, smooth)) => self.state.loaded(size, smooth),
            Err(e) => {
                log::warn!("headless: replacement texture {} is not usable: {e}", native.id());
                self.state.reset();
            }
        }
        self.texture = Some(native);
    }

    fn internal_texture(&self) -> Option<&DeviceTexture> {
        self.texture.as_ref()
    }
}

/// Pixmap surface of the headless backend.
pub struct HeadlessSurface {
    size: Vector2u,
    pixmap: Pixmap,
    display_list: RenderList,
    frame_id: u64,
}

impl HeadlessSurface {
    pub fn new(size: Vector2u) -> Result<Self, RenderError> {
        let pixmap = Pixmap::new(size.x, size.y).ok_or(RenderError::InvalidSize(size))?;
        Ok(Self {
            size,
            pixmap,
            display_list: RenderList::new(),
            frame_id: 0,
        })
    }

    /// Commands executed by the most recent render target, in submission order.
    pub fn display_list(&self) -> &RenderList {
        &self.display_list
    }

    /// Number of flushed frames.
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }
}

impl ErasedSurface for HeadlessSurface {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
    fn size(&self) -> Vector2u {
        self.size
    }
}

/// Executes draw calls directly into the surface pixmap and logs them.
struct HeadlessTarget<'s> {
    surface: &'s mut HeadlessSurface,
    device: Weak<RefCell<DeviceState>>,
}

impl TargetBackend for HeadlessTarget<'_> {
    fn target_size(&self) -> Vector2u {
        self.surface.size
    }

    fn clear(&mut self, color: Color) {
        paint::clear(&mut self.surface.pixmap, color);
        self.surface.display_list.add_command(DisplayItem::Clear { color });
    }

    fn fill_rect(&mut self, state: &DrawState, rect: Rect, color: Color) {
        paint::fill_rect(&mut self.surface.pixmap, state, rect, color);
        self.surface.display_list.add_command(DisplayItem::Rect { state: *state, rect, color });
    }

    fn draw_texture(&mut self, state: &DrawState, texture: LoadedTexture<'_>, src: Rect, dst: Rect, tint: Color) {
        let Some(native) = texture.downcast::<HeadlessTexture>().and_then(|t| t.texture.as_ref()) else {
            log::warn!("headless: skipping draw of a texture from another backend");
            return;
        };
        if !native.belongs_to(&self.device) {
            log::warn!("headless: skipping draw of texture {} from another device", native.id());
            return;
        }
        let Some(device) = self.device.upgrade() else {
            log::warn!("headless: skipping draw, device is gone");
            return;
        };

        let device = device.borrow();
        let Some(data) = device.texture(native.id()) else {
            log::warn!("headless: skipping draw of destroyed texture {}", native.id());
            return;
        };
        let Some(source) = pixmap_from_rgba(data.size, &data.pixels) else {
            return;
        };

        paint::draw_pixmap(&mut self.surface.pixmap, state, source.as_ref(), data.smooth, src, dst, tint);
        self.surface.display_list.add_command(DisplayItem::TexturedQuad {
            state: *state,
            texture_id: native.id(),
            src,
            dst,
            tint,
        });
    }

    fn flush(&mut self) -> Result<(), RenderError> {
        self.surface.frame_id = self.surface.frame_id.wrapping_add(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::types::Transform;

    fn renderer() -> HeadlessRenderer {
        HeadlessRenderer::new(DeviceConfig {
            max_texture_size: 256,
            memory_budget: None,
        })
    }

    const QUAD: [u8; 16] = [255, 0, 0, 255, 0, 255, 0, 255, 0, 0, 255, 255, 255, 255, 255, 255];

    #[test]
    fn empty_then_filled_texture() {
        let r = renderer();
        let mut tex = r.create_texture();
        assert!(!tex.is_loaded());

        tex.load_texture_only(Vector2u::new(2, 2), None, false).unwrap();
        assert_eq!(tex.size(), Vector2u::new(2, 2));
        assert!(tex.is_loaded());

        tex.load_texture_only(Vector2u::new(2, 2), Some(&QUAD), true).unwrap();
        assert!(tex.is_smooth());
        assert_eq!(tex.read_pixels().unwrap(), QUAD.to_vec());
        assert_eq!(r.device().live_textures(), 1);
    }

    #[test]
    fn failed_load_keeps_previous_texture() {
        let r = renderer();
        let mut tex = r.create_texture();
        tex.load_texture_only(Vector2u::new(2, 2), Some(&QUAD), false).unwrap();

        let err = tex.load_texture_only(Vector2u::new(512, 1), None, false).unwrap_err();
        assert_eq!(err, RenderError::TextureTooLarge { requested: Vector2u::new(512, 1), maximum: 256 });
        assert_eq!(tex.size(), Vector2u::new(2, 2));
        assert_eq!(tex.read_pixels().unwrap(), QUAD.to_vec());
    }

    #[test]
    fn resize_reallocates_and_releases_old_texture() {
        let r = renderer();
        let mut tex = r.create_texture();
        tex.load_texture_only(Vector2u::new(2, 2), None, false).unwrap();
        tex.load_texture_only(Vector2u::new(4, 4), None, false).unwrap();
        assert_eq!(r.device().live_textures(), 1);
        assert_eq!(r.device().allocated_bytes(), 64);

        drop(tex);
        assert_eq!(r.device().live_textures(), 0);
    }

    #[test]
    fn replace_internal_texture_takes_device_properties() {
        let r = renderer();
        let mut tex = HeadlessTexture::new(r.device());
        tex.load(Vector2u::new(2, 2), QUAD.to_vec(), false).unwrap();
        assert_eq!(tex.is_transparent_pixel(Vector2u::new(0, 0)), Ok(false));

        let native = r.device().create_texture(Vector2u::new(8, 3), true).unwrap();
        let native_id = native.id();
        tex.replace_internal_texture(native);

        assert_eq!(tex.size(), Vector2u::new(8, 3));
        assert!(tex.is_smooth());
        assert_eq!(tex.internal_texture().map(DeviceTexture::id), Some(native_id));
        assert_eq!(tex.is_transparent_pixel(Vector2u::new(0, 0)), Err(RenderError::PixelsNotRetained));
        // the texture it owned before is gone, only the replacement is alive
        assert_eq!(r.device().live_textures(), 1);
    }

    #[test]
    fn draw_texture_into_surface_and_read_back() {
        let r = renderer();
        let mut tex = r.create_texture();
        tex.load_texture_only(Vector2u::new(2, 2), Some(&QUAD), false).unwrap();

        let mut surface = r.create_surface(Vector2u::new(2, 2)).unwrap();
        {
            let mut target = r.create_render_target(surface.as_mut()).unwrap();
            target.clear(Color::TRANSPARENT);
            target.draw_sprite(LoadedTexture::new(tex.as_ref()).unwrap(), Default::default());
            target.flush().unwrap();
        }

        let image = r.snapshot(surface.as_ref()).unwrap();
        assert_eq!(image.pixels, QUAD.to_vec());

        let headless = surface.as_any().downcast_ref::<HeadlessSurface>().unwrap();
        assert_eq!(headless.frame_id(), 1);
        assert_eq!(headless.display_list().items.len(), 2);
    }

    #[test]
    fn clip_protects_pixels_outside() {
        let r = renderer();
        let mut surface = r.create_surface(Vector2u::new(4, 4)).unwrap();
        {
            let mut target = r.create_render_target(surface.as_mut()).unwrap();
            target.clear(Color::BLACK);
            target.push_clip(Rect::new(0.0, 0.0, 2.0, 4.0));
            target.fill_rect(Rect::new(0.0, 0.0, 4.0, 4.0), Color::WHITE);
            target.pop_clip();
        }

        let image = r.snapshot(surface.as_ref()).unwrap();
        assert_eq!(image.pixel(1, 1), Some([255, 255, 255, 255]));
        assert_eq!(image.pixel(2, 1), Some([0, 0, 0, 255]));
    }

    #[test]
    fn transform_moves_draws() {
        let r = renderer();
        let mut surface = r.create_surface(Vector2u::new(4, 4)).unwrap();
        {
            let mut target = r.create_render_target(surface.as_mut()).unwrap();
            target.push_transform(Transform::from_translate(2.0, 2.0));
            target.fill_rect(Rect::new(0.0, 0.0, 1.0, 1.0), Color::WHITE);
        }

        let image = r.snapshot(surface.as_ref()).unwrap();
        assert_eq!(image.pixel(0, 0), Some([0, 0, 0, 0]));
        assert_eq!(image.pixel(2, 2), Some([255, 255, 255, 255]));
    }

    #[test]
    fn texture_from_another_device_is_skipped() {
        let a = renderer();
        let b = renderer();

        let mut red = a.create_texture();
        red.load_texture_only(Vector2u::new(1, 1), Some(&[255, 0, 0, 255]), false).unwrap();
        // same id on the other device
        let mut green = b.create_texture();
        green.load_texture_only(Vector2u::new(1, 1), Some(&[0, 255, 0, 255]), false).unwrap();

        let mut surface = b.create_surface(Vector2u::new(1, 1)).unwrap();
        {
            let mut target = b.create_render_target(surface.as_mut()).unwrap();
            target.clear(Color::BLACK);
            target.draw_sprite(LoadedTexture::new(red.as_ref()).unwrap(), Default::default());
            target.flush().unwrap();
        }

        let image = b.snapshot(surface.as_ref()).unwrap();
        assert_eq!(image.pixel(0, 0), Some([0, 0, 0, 255]));
        let headless = surface.as_any().downcast_ref::<HeadlessSurface>().unwrap();
        assert_eq!(headless.display_list().items.len(), 1);
    }

    #[test]
    fn resize_needs_room_for_both_textures_under_budget() {
        let r = HeadlessRenderer::new(DeviceConfig {
            max_texture_size: 64,
            memory_budget: Some(16 * 4),
        });
        let mut tex = r.create_texture();
        tex.load_texture_only(Vector2u::new(4, 4), None, false).unwrap();

        let err = tex.load_texture_only(Vector2u::new(2, 2), None, false).unwrap_err();
        assert_eq!(err, RenderError::AllocationFailed(Vector2u::new(2, 2)));
        assert_eq!(tex.size(), Vector2u::new(4, 4));
    }

    #[test]
    fn surface_from_other_backend_is_rejected() {
        struct Other;
        impl ErasedSurface for Other {
            fn as_any(&self) -> &dyn Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
            fn size(&self) -> Vector2u {
                Vector2u::new(1, 1)
            }
        }

        let r = renderer();
        let mut other = Other;
        let err = r.create_render_target(&mut other).unwrap_err();
        assert_eq!(err, RenderError::SurfaceMismatch("headless".to_string()));
    }
}
