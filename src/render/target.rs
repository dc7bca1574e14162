//! Render targets.
//!
//! A [`RenderTarget`] draws into a surface it borrows from its owner. It keeps the
//! transient per-frame state (transform stack and clip stack) and turns the higher level
//! draw calls (nine-slice, repeated textures) into the two primitives every backend
//! implements through [`TargetBackend`]: filled rectangles and textured quads.
//!
//! Draw calls are executed in submission order. Textures are borrowed per call, the
//! target never keeps them.

use crate::errors::RenderError;
use crate::render::texture::LoadedTexture;
use crate::render::types::{Color, Rect, Transform, Vector2f, Vector2u};

/// State a primitive is drawn with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawState {
    /// Maps local coordinates to target pixels
    pub transform: Transform,
    /// Visible area in target pixels
    pub clip: Rect,
}

/// Primitive drawing operations supplied by each backend.
pub trait TargetBackend {
    /// Size of the surface being drawn into.
    fn target_size(&self) -> Vector2u;

    /// Replaces every pixel of the surface with `color`.
    fn clear(&mut self, color: Color);

    /// Fills `rect` (local coordinates) with `color`.
    fn fill_rect(&mut self, state: &DrawState, rect: Rect, color: Color);

    /// Draws the `src` part of `texture` (texture pixels) stretched over `dst` (local
    /// coordinates), with every texel multiplied by `tint`.
    ///
    /// A texture created by another backend cannot be drawn; implementations skip the
    /// call and log a warning.
    fn draw_texture(&mut self, state: &DrawState, texture: LoadedTexture<'_>, src: Rect, dst: Rect, tint: Color);

    /// Makes all previous draw calls visible on the surface.
    fn flush(&mut self) -> Result<(), RenderError> {
        Ok(())
    }
}

/// Records drawing commands against a borrowed destination surface.
pub struct RenderTarget<'s> {
    backend: Box<dyn TargetBackend + 's>,
    transforms: Vec<Transform>,
    clips: Vec<Rect>,
}

impl std::fmt::Debug for RenderTarget<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderTarget")
            .field("size", &self.backend.target_size())
            .field("transforms", &self.transforms.len())
            .field("clips", &self.clips.len())
            .finish()
    }
}

impl<'s> RenderTarget<'s> {
    pub fn new(backend: Box<dyn TargetBackend + 's>) -> Self {
        Self {
            backend,
            transforms: Vec::new(),
            clips: Vec::new(),
        }
    }

    pub fn size(&self) -> Vector2u {
        self.backend.target_size()
    }

    /// Current transform (all pushed transforms combined).
    pub fn transform(&self) -> Transform {
        self.transforms.last().copied().unwrap_or_default()
    }

    /// Current clip rectangle in target pixels.
    pub fn clip(&self) -> Rect {
        self.clips
            .last()
            .copied()
            .unwrap_or_else(|| Rect::from_size(self.size()))
    }

    fn draw_state(&self) -> DrawState {
        DrawState {
            transform: self.transform(),
            clip: self.clip(),
        }
    }

    /// Pushes `transform`, applied to coordinates before the current transform.
    pub fn push_transform(&mut self, transform: Transform) {
        let combined = self.transform().combine(&transform);
        self.transforms.push(combined);
    }

    pub fn pop_transform(&mut self) {
        if self.transforms.pop().is_none() {
            log::warn!("pop_transform called without matching push_transform");
        }
    }

    /// Restricts drawing to `rect` (local coordinates) within the current clip.
    ///
    /// Under a rotating transform the clip is the bounding box of the transformed rect.
    pub fn push_clip(&mut self, rect: Rect) {
        let transformed = self.transform().transform_rect(&rect);
        let clip = self.clip().intersection(&transformed).unwrap_or_default();
        self.clips.push(clip);
    }

    pub fn pop_clip(&mut self) {
        if self.clips.pop().is_none() {
            log::warn!("pop_clip called without matching push_clip");
        }
    }

    /// True when nothing drawn in `rect` (local coordinates) would be visible.
    fn is_clipped(&self, rect: &Rect) -> bool {
        if rect.is_empty() {
            return true;
        }
        let bounds = self.transform().transform_rect(rect);
        self.clip().intersection(&bounds).is_none()
    }

    pub fn clear(&mut self, color: Color) {
        self.backend.clear(color);
    }

    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        if self.is_clipped(&rect) {
            return;
        }
        let state = self.draw_state();
        self.backend.fill_rect(&state, rect, color);
    }

    /// Draws the `src` part of `texture` stretched over `dst`.
    ///
    /// Parts of `src` outside the texture are cut off together with the matching part of
    /// `dst`; a `src` entirely outside the texture draws nothing.
    pub fn draw_texture(&mut self, texture: LoadedTexture<'_>, src: Rect, dst: Rect, tint: Color) {
        if src.is_empty() || dst.is_empty() {
            return;
        }
        let Some(visible) = src.intersection(&Rect::from_size(texture.size())) else {
            return;
        };

        let scale_x = dst.width / src.width;
        let scale_y = dst.height / src.height;
        let dst = Rect::new(
            dst.left + (visible.left - src.left) * scale_x,
            dst.top + (visible.top - src.top) * scale_y,
            visible.width * scale_x,
            visible.height * scale_y,
        );
        if self.is_clipped(&dst) {
            return;
        }

        let state = self.draw_state();
        self.backend.draw_texture(&state, texture, visible, dst, tint);
    }

    /// Draws the whole texture at its own size with its top-left corner at `position`.
    pub fn draw_sprite(&mut self, texture: LoadedTexture<'_>, position: Vector2f) {
        let size = texture.size();
        let dst = Rect::new(position.x, position.y, size.x as f32, size.y as f32);
        self.draw_texture(texture, Rect::from_size(size), dst, Color::WHITE);
    }

    /// Draws `texture` over `dst` with its borders kept at their own size.
    ///
    /// `middle` is the stretchable centre part in texture pixels; the four borders
    /// around it only stretch along their edge. When `dst` is too small for the
    /// borders they shrink proportionally.
    pub fn draw_nine_slice(&mut self, texture: LoadedTexture<'_>, middle: Rect, dst: Rect, tint: Color) {
        let size = Vector2f::from(texture.size());
        let src_x = [0.0, middle.left, middle.right(), size.x];
        let src_y = [0.0, middle.top, middle.bottom(), size.y];

        let dst_x = nine_slice_stops(dst.left, dst.width, middle.left, size.x - middle.right());
        let dst_y = nine_slice_stops(dst.top, dst.height, middle.top, size.y - middle.bottom());

        for row in 0..3 {
            for col in 0..3 {
                let src = Rect::new(src_x[col], src_y[row], src_x[col + 1] - src_x[col], src_y[row + 1] - src_y[row]);
                let part = Rect::new(dst_x[col], dst_y[row], dst_x[col + 1] - dst_x[col], dst_y[row + 1] - dst_y[row]);
                self.draw_texture(texture, src, part, tint);
            }
        }
    }

    /// Tiles the `src` part of `texture` over `dst` at its own size. The last row and
    /// column are cut off at the edge of `dst`.
    pub fn draw_repeated(&mut self, texture: LoadedTexture<'_>, src: Rect, dst: Rect, tint: Color) {
        if src.is_empty() || self.is_clipped(&dst) {
            return;
        }

        let mut y = 0.0;
        while y < dst.height {
            let h = src.height.min(dst.height - y);
            let mut x = 0.0;
            while x < dst.width {
                let w = src.width.min(dst.width - x);
                let tile_src = Rect::new(src.left, src.top, w, h);
                let tile_dst = Rect::new(dst.left + x, dst.top + y, w, h);
                self.draw_texture(texture, tile_src, tile_dst, tint);
                x += src.width;
            }
            y += src.height;
        }
    }

    /// Makes all previous draw calls visible on the surface.
    pub fn flush(&mut self) -> Result<(), RenderError> {
        self.backend.flush()
    }
}

/// Edges of the three columns (or rows) of a nine-slice draw.
fn nine_slice_stops(start: f32, length: f32, first: f32, last: f32) -> [f32; 4] {
    let borders = first + last;
    let scale = if borders > length && borders > 0.0 { length / borders } else { 1.0 };
    let first = first * scale;
    let last = last * scale;

    [start, start + first, start + length - last, start + length]
}
