use std::any::Any;

use anyhow::{anyhow, Result};

use crate::errors::RenderError;
use crate::render::backend::{downcast_surface, downcast_surface_ref, BackendRenderer, ErasedSurface};
use crate::render::target::{DrawState, RenderTarget, TargetBackend};
use crate::render::texture::{validate_load, BackendTexture, LoadedTexture, ReplaceInternal, TextureState};
use crate::render::types::{Color, Rect, RgbaImage, Transform, Vector2u};

const BACKEND_NAME: &str = "cairo";

/// Cairo refuses image surfaces with a width or height above this value.
const CAIRO_MAX_IMAGE_SIZE: u32 = 32767;

/// Cairo backend for rendering using cairo graphics library.
#[derive(Debug, Default)]
pub struct CairoBackend;

impl CairoBackend {
    pub fn new() -> Self {
        Self {}
    }
}

impl BackendRenderer for CairoBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    fn create_texture(&self) -> Box<dyn BackendTexture> {
        Box::new(CairoTexture::default())
    }

    fn maximum_texture_size(&self) -> u32 {
        CAIRO_MAX_IMAGE_SIZE
    }

    /// Will create a new Cairo image surface with the given size.
    fn create_surface(&self, size: Vector2u) -> Result<Box<dyn ErasedSurface>, RenderError> {
        let surface = create_image_surface(size)?;
        Ok(Box::new(CairoSurface { surface, size, frame_id: 0 }))
    }

    fn create_render_target<'s>(&self, surface: &'s mut dyn ErasedSurface) -> Result<RenderTarget<'s>, RenderError> {
        let surface = downcast_surface::<CairoSurface>(surface, BACKEND_NAME)?;
        let cr = cairo::Context::new(&surface.surface).map_err(|e| RenderError::Backend(e.to_string()))?;
        Ok(RenderTarget::new(Box::new(CairoTarget { surface, cr })))
    }

    fn snapshot(&self, surface: &dyn ErasedSurface) -> Result<RgbaImage, RenderError> {
        let s = downcast_surface_ref::<CairoSurface>(surface, BACKEND_NAME)?;
        let pixels = read_surface(&s.surface).map_err(|e| RenderError::Backend(e.to_string()))?;
        RgbaImage::from_raw(s.size.x, s.size.y, pixels)
    }
}

fn create_image_surface(size: Vector2u) -> Result<cairo::ImageSurface, RenderError> {
    cairo::ImageSurface::create(cairo::Format::ARgb32, size.x as i32, size.y as i32)
        .map_err(|_| RenderError::AllocationFailed(size))
}

/// Writes straight RGBA8 pixels into an ARGB32 surface (premultiplied, native endian).
fn write_surface(surface: &mut cairo::ImageSurface, rgba: &[u8]) -> Result<()> {
    let width = surface.width() as usize;
    let stride = surface.stride() as usize;
    surface.flush();

    let mut data = surface.data().map_err(|e| anyhow!("cannot borrow surface data: {e}"))?;
    for (y, row) in rgba.chunks_exact(width * 4).enumerate() {
        let line = &mut data[y * stride..y * stride + width * 4];
        for (dst, src) in line.chunks_exact_mut(4).zip(row.chunks_exact(4)) {
            let a = src[3] as u32;
            let pm = |c: u8| (c as u32 * a + 127) / 255;
            let argb = (a << 24) | (pm(src[0]) << 16) | (pm(src[1]) << 8) | pm(src[2]);
            dst.copy_from_slice(&argb.to_ne_bytes());
        }
    }
    Ok(())
}

/// Reads an ARGB32 surface back as straight RGBA8.
fn read_surface(surface: &cairo::ImageSurface) -> Result<Vec<u8>> {
    let width = surface.width() as usize;
    let height = surface.height() as usize;
    let stride = surface.stride() as usize;
    surface.flush();

    let mut out = Vec::with_capacity(width * height * 4);
    surface
        .with_data(|data| {
            for y in 0..height {
                let line = &data[y * stride..y * stride + width * 4];
                for px in line.chunks_exact(4) {
                    let argb = u32::from_ne_bytes([px[0], px[1], px[2], px[3]]);
                    let a = argb >> 24;
                    let unpm = |c: u32| if a == 0 { 0 } else { ((c * 255 + a / 2) / a).min(255) as u8 };
                    out.extend_from_slice(&[
                        unpm((argb >> 16) & 0xff),
                        unpm((argb >> 8) & 0xff),
                        unpm(argb & 0xff),
                        a as u8,
                    ]);
                }
            }
        })
        .map_err(|e| anyhow!("cannot read surface data: {e}"))?;

    Ok(out)
}

/// Owned native resource of a cairo texture: an image surface plus the filter it is
/// sampled with.
#[derive(Debug)]
pub struct CairoImage {
    pub surface: cairo::ImageSurface,
    pub filter: cairo::Filter,
}

impl CairoImage {
    fn is_smooth(&self) -> bool {
        !matches!(self.filter, cairo::Filter::Nearest | cairo::Filter::Fast)
    }
}

fn filter_for(smooth: bool) -> cairo::Filter {
    if smooth {
        cairo::Filter::Good
    } else {
        cairo::Filter::Nearest
    }
}

/// Texture handle owning a reference-counted cairo image surface.
#[derive(Debug, Default)]
pub struct CairoTexture {
    image: Option<CairoImage>,
    state: TextureState,
}

impl BackendTexture for CairoTexture {
    fn state(&self) -> &TextureState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut TextureState {
        &mut self.state
    }

    fn load_texture_only(&mut self, size: Vector2u, pixels: Option<&[u8]>, smooth: bool) -> Result<(), RenderError> {
        validate_load(size, pixels, CAIRO_MAX_IMAGE_SIZE)?;

        let mut surface = create_image_surface(size)?;
        if let Some(pixels) = pixels {
            write_surface(&mut surface, pixels).map_err(|e| RenderError::Backend(e.to_string()))?;
        }

        self.image = Some(CairoImage { surface, filter: filter_for(smooth) });
        self.state.loaded(size, smooth);
        Ok(())
    }

    fn set_smooth(&mut self, smooth: bool) {
        self.state.smooth = smooth;
        if let Some(image) = &mut self.image {
            image.filter = filter_for(smooth);
        }
    }

    fn is_loaded(&self) -> bool {
        self.image.is_some()
    }

    fn read_pixels(&self) -> Result<Vec<u8>, RenderError> {
        let image = self.image.as_ref().ok_or(RenderError::NotLoaded)?;
        read_surface(&image.surface).map_err(|e| RenderError::Backend(e.to_string()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl ReplaceInternal for CairoTexture {
    type Native = CairoImage;

    fn replace_internal_texture(&mut self, native: CairoImage) {
        let size = Vector2u::new(native.surface.width().max(0) as u32, native.surface.height().max(0) as u32);
        self.state.loaded(size, native.is_smooth());
        self.image = Some(native);
    }

    fn internal_texture(&self) -> Option<&CairoImage> {
        self.image.as_ref()
    }
}

/// Image surface of the cairo backend.
pub struct CairoSurface {
    surface: cairo::ImageSurface,
    size: Vector2u,
    frame_id: u64,
}

impl CairoSurface {
    /// The underlying image surface, for hosts that paint it themselves.
    pub fn image_surface(&self) -> &cairo::ImageSurface {
        &self.surface
    }

    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }
}

impl ErasedSurface for CairoSurface {
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

struct CairoTarget<'s> {
    surface: &'s mut CairoSurface,
    cr: cairo::Context,
}

fn matrix(t: &Transform) -> cairo::Matrix {
    cairo::Matrix::new(t.sx as f64, t.ky as f64, t.kx as f64, t.sy as f64, t.tx as f64, t.ty as f64)
}

/// Copy of `surface` with its color channels multiplied by the tint color.
fn tinted(surface: &cairo::ImageSurface, tint: Color) -> Result<cairo::ImageSurface> {
    let size = Vector2u::new(surface.width() as u32, surface.height() as u32);
    let mut rgba = read_surface(surface)?;
    for px in rgba.chunks_exact_mut(4) {
        px[0] = (px[0] as f32 * tint.r).round() as u8;
        px[1] = (px[1] as f32 * tint.g).round() as u8;
        px[2] = (px[2] as f32 * tint.b).round() as u8;
    }

    let mut out = create_image_surface(size)?;
    write_surface(&mut out, &rgba)?;
    Ok(out)
}

impl CairoTarget<'_> {
    /// Prepares the context: device-space clip first, then the draw transform.
    fn begin(&self, state: &DrawState) -> Result<()> {
        self.cr.save()?;
        self.cr.identity_matrix();
        self.cr.rectangle(
            state.clip.left as f64,
            state.clip.top as f64,
            state.clip.width as f64,
            state.clip.height as f64,
        );
        self.cr.clip();
        self.cr.set_matrix(matrix(&state.transform));
        Ok(())
    }

    fn fill(&self, state: &DrawState, rect: Rect, color: Color) -> Result<()> {
        self.begin(state)?;
        self.cr.set_source_rgba(color.r as f64, color.g as f64, color.b as f64, color.a as f64);
        self.cr.rectangle(rect.left as f64, rect.top as f64, rect.width as f64, rect.height as f64);
        self.cr.fill()?;
        self.cr.restore()?;
        Ok(())
    }

    fn blit(&self, state: &DrawState, image: &CairoImage, src: Rect, dst: Rect, tint: Color) -> Result<()> {
        let tinted_surface = if tint.is_white() {
            None
        } else {
            Some(tinted(&image.surface, tint)?)
        };
        let source = tinted_surface.as_ref().unwrap_or(&image.surface);

        self.begin(state)?;
        self.cr.rectangle(dst.left as f64, dst.top as f64, dst.width as f64, dst.height as f64);
        self.cr.clip();
        self.cr.translate(dst.left as f64, dst.top as f64);
        self.cr.scale((dst.width / src.width) as f64, (dst.height / src.height) as f64);
        self.cr.set_source_surface(source, -src.left as f64, -src.top as f64)?;
        self.cr.source().set_filter(image.filter);
        self.cr.paint_with_alpha(tint.a as f64)?;
        self.cr.restore()?;
        Ok(())
    }
}

impl TargetBackend for CairoTarget<'_> {
    fn target_size(&self) -> Vector2u {
        self.surface.size
    }

    fn clear(&mut self, color: Color) {
        // Clear the surface with the specified color.
        self.cr.set_operator(cairo::Operator::Source);
        self.cr.set_source_rgba(color.r as f64, color.g as f64, color.b as f64, color.a as f64);
        if let Err(e) = self.cr.paint() {
            log::warn!("cairo: clear failed: {e}");
        }
        self.cr.set_operator(cairo::Operator::Over);
    }

    fn fill_rect(&mut self, state: &DrawState, rect: Rect, color: Color) {
        if let Err(e) = self.fill(state, rect, color) {
            log::warn!("cairo: fill_rect failed: {e}");
        }
    }

    fn draw_texture(&mut self, state: &DrawState, texture: LoadedTexture<'_>, src: Rect, dst: Rect, tint: Color) {
        let Some(image) = texture.downcast::<CairoTexture>().and_then(|t| t.image.as_ref()) else {
            log::warn!("cairo: skipping draw of a texture from another backend");
            return;
        };
        if let Err(e) = self.blit(state, image, src, dst, tint) {
            log::warn!("cairo: draw_texture failed: {e}");
        }
    }

    fn flush(&mut self) -> Result<(), RenderError> {
        self.surface.surface.flush();
        self.surface.frame_id = self.surface.frame_id.wrapping_add(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: [u8; 16] = [255, 0, 0, 255, 0, 255, 0, 255, 0, 0, 255, 255, 255, 255, 255, 255];

    #[test]
    fn pixels_round_trip() {
        let backend = CairoBackend::new();
        let mut tex = backend.create_texture();
        tex.load_texture_only(Vector2u::new(2, 2), Some(&QUAD), true).unwrap();
        assert_eq!(tex.read_pixels().unwrap(), QUAD.to_vec());
    }

    #[test]
    fn replace_takes_surface_size_and_filter() {
        let mut tex = CairoTexture::default();
        tex.load(Vector2u::new(2, 2), QUAD.to_vec(), true).unwrap();

        let surface = cairo::ImageSurface::create(cairo::Format::ARgb32, 6, 3).unwrap();
        tex.replace_internal_texture(CairoImage { surface, filter: cairo::Filter::Nearest });

        assert_eq!(tex.size(), Vector2u::new(6, 3));
        assert!(!tex.is_smooth());
        assert!(tex.state().pixels.is_none());
    }

    #[test]
    fn sprite_draw_reproduces_texture() {
        let backend = CairoBackend::new();
        let mut tex = backend.create_texture();
        tex.load_texture_only(Vector2u::new(2, 2), Some(&QUAD), false).unwrap();

        let mut surface = backend.create_surface(Vector2u::new(2, 2)).unwrap();
        {
            let mut target = backend.create_render_target(surface.as_mut()).unwrap();
            target.draw_sprite(LoadedTexture::new(tex.as_ref()).unwrap(), Default::default());
            target.flush().unwrap();
        }

        let image = backend.snapshot(surface.as_ref()).unwrap();
        assert_eq!(image.pixels, QUAD.to_vec());
    }
}
