//! Geometry and pixel types shared by every backend.
//!
//! Raw pixels crossing the public API are always straight-alpha RGBA8, row-major and
//! without row padding, so a `width x height` image is exactly `width * height * 4`
//! bytes. Backends that store premultiplied or BGRA data convert at their own boundary.

use crate::errors::RenderError;

/// Unsigned 2D vector, used for texture and surface sizes and pixel positions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Vector2u {
    pub x: u32,
    pub y: u32,
}

impl Vector2u {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Floating point 2D vector.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vector2f {
    pub x: f32,
    pub y: f32,
}

impl Vector2f {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<Vector2u> for Vector2f {
    fn from(v: Vector2u) -> Self {
        Self::new(v.x as f32, v.y as f32)
    }
}

/// Number of bytes an RGBA8 buffer of `size` occupies, or `None` on overflow.
pub fn expected_len(size: Vector2u) -> Option<usize> {
    (size.x as usize)
        .checked_mul(size.y as usize)?
        .checked_mul(4)
}

/// Axis-aligned rectangle in floating point coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self { left, top, width, height }
    }

    /// Rectangle at the origin covering `size`.
    pub fn from_size(size: Vector2u) -> Self {
        Self::new(0.0, 0.0, size.x as f32, size.y as f32)
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left && x < self.right() && y >= self.top && y < self.bottom()
    }

    /// Overlapping part of both rectangles, `None` when they do not overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.left.max(other.left);
        let top = self.top.max(other.top);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        let r = Rect::new(left, top, right - left, bottom - top);
        (!r.is_empty()).then_some(r)
    }
}

/// RGBA color used for drawing commands.
///
/// Channels are represented as `f32` in the range `0.0 ..= 1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    /// Red channel
    pub r: f32,
    /// Green channel
    pub g: f32,
    /// Blue channel
    pub b: f32,
    /// Alpha channel (opacity)
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: Color = Color::new(0.0, 0.0, 0.0, 0.0);

    /// Creates a new color from `f32` channel values in the range `0.0 ..= 1.0`.
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Color {
        Color { r, g, b, a }
    }

    /// Creates a new color from `u8` channel values in the range `0 ..= 255`.
    pub fn from_u8(r: u8, g: u8, b: u8, a: u8) -> Color {
        Color {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: a as f32 / 255.0,
        }
    }

    /// Returns the color as straight RGBA8, rounding to the nearest value.
    pub fn to_rgba8(&self) -> [u8; 4] {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    /// True when tinting with this color leaves texture colors unchanged. Alpha is not
    /// considered, backends apply it as opacity.
    pub fn is_white(&self) -> bool {
        self.r >= 1.0 && self.g >= 1.0 && self.b >= 1.0
    }
}

/// 2D affine transform.
///
/// Maps `(x, y)` to `(sx * x + kx * y + tx, ky * x + sy * y + ty)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub sx: f32,
    pub ky: f32,
    pub kx: f32,
    pub sy: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform { sx: 1.0, ky: 0.0, kx: 0.0, sy: 1.0, tx: 0.0, ty: 0.0 };

    pub fn from_translate(tx: f32, ty: f32) -> Self {
        Self { tx, ty, ..Self::IDENTITY }
    }

    pub fn from_scale(sx: f32, sy: f32) -> Self {
        Self { sx, sy, ..Self::IDENTITY }
    }

    /// Clockwise rotation around the origin (y axis points down).
    pub fn from_rotate_degrees(degrees: f32) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self { sx: cos, ky: sin, kx: -sin, sy: cos, tx: 0.0, ty: 0.0 }
    }

    /// Returns `self * other`: points are mapped by `other` first, then by `self`.
    pub fn combine(&self, other: &Transform) -> Transform {
        Transform {
            sx: self.sx * other.sx + self.kx * other.ky,
            ky: self.ky * other.sx + self.sy * other.ky,
            kx: self.sx * other.kx + self.kx * other.sy,
            sy: self.ky * other.kx + self.sy * other.sy,
            tx: self.sx * other.tx + self.kx * other.ty + self.tx,
            ty: self.ky * other.tx + self.sy * other.ty + self.ty,
        }
    }

    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.sx * x + self.kx * y + self.tx,
            self.ky * x + self.sy * y + self.ty,
        )
    }

    /// Bounding box of `rect` after transformation.
    pub fn transform_rect(&self, rect: &Rect) -> Rect {
        let corners = [
            self.transform_point(rect.left, rect.top),
            self.transform_point(rect.right(), rect.top),
            self.transform_point(rect.left, rect.bottom()),
            self.transform_point(rect.right(), rect.bottom()),
        ];

        let (mut min_x, mut min_y) = corners[0];
        let (mut max_x, mut max_y) = corners[0];
        for (x, y) in &corners[1..] {
            min_x = min_x.min(*x);
            min_y = min_y.min(*y);
            max_x = max_x.max(*x);
            max_y = max_y.max(*y);
        }

        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    pub fn to_tiny_skia(&self) -> tiny_skia::Transform {
        tiny_skia::Transform::from_row(self.sx, self.ky, self.kx, self.sy, self.tx, self.ty)
    }
}

/// CPU side RGBA8 image (straight alpha, no row padding).
#[derive(Clone, PartialEq, Eq)]
pub struct RgbaImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RgbaImage {
    /// Wraps `pixels`, which must be exactly `width * height * 4` bytes.
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, RenderError> {
        let size = Vector2u::new(width, height);
        let expected = expected_len(size).ok_or(RenderError::InvalidSize(size))?;
        if pixels.len() != expected {
            return Err(RenderError::InvalidPixelData { expected, actual: pixels.len() });
        }

        Ok(Self { width, height, pixels })
    }

    /// Fully transparent image.
    pub fn transparent(width: u32, height: u32) -> Self {
        let len = expected_len(Vector2u::new(width, height)).unwrap_or(0);
        Self { width, height, pixels: vec![0; len] }
    }

    pub fn size(&self) -> Vector2u {
        Vector2u::new(self.width, self.height)
    }

    /// RGBA value at `(x, y)`, `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + x as usize) * 4;
        Some([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]])
    }
}

impl std::fmt::Debug for RgbaImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RgbaImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("len", &self.pixels.len())
            .finish()
    }
}

/// Converts straight RGBA8 pixels into a premultiplied tiny-skia pixmap.
pub(crate) fn pixmap_from_rgba(size: Vector2u, rgba: &[u8]) -> Option<tiny_skia::Pixmap> {
    let mut pixmap = tiny_skia::Pixmap::new(size.x, size.y)?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(rgba.chunks_exact(4)) {
        *dst = tiny_skia::ColorU8::from_rgba(src[0], src[1], src[2], src[3]).premultiply();
    }
    Some(pixmap)
}

/// Converts a premultiplied tiny-skia pixmap back into straight RGBA8 pixels.
pub(crate) fn rgba_from_pixmap(pixmap: &tiny_skia::Pixmap) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixmap.data().len());
    for px in pixmap.pixels() {
        let c = px.demultiply();
        out.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    out
}
