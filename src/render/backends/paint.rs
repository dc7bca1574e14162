//! `tiny-skia` drawing shared by the pixmap based backends.
//!
//! The software backend draws its own pixmap textures with these functions; the headless
//! backend wraps device texels in a pixmap first. Both end up with the same sampling,
//! blending and clipping.

use tiny_skia::{FillRule, FilterQuality, Mask, Paint, PathBuilder, Pattern, Pixmap, PixmapRef, SpreadMode};

use crate::render::target::DrawState;
use crate::render::types::{Color, Rect};

pub(crate) fn clear(pixmap: &mut Pixmap, color: Color) {
    if let Some(color) = tiny_skia::Color::from_rgba(color.r, color.g, color.b, color.a) {
        pixmap.fill(color);
    }
}

/// Mask for the clip rectangle, `None` when the clip covers the whole pixmap.
fn clip_mask(pixmap: &Pixmap, clip: &Rect) -> Option<Mask> {
    let (width, height) = (pixmap.width(), pixmap.height());
    if clip.left <= 0.0 && clip.top <= 0.0 && clip.right() >= width as f32 && clip.bottom() >= height as f32 {
        return None;
    }

    let mut mask = Mask::new(width, height)?;
    let rect = tiny_skia::Rect::from_xywh(clip.left, clip.top, clip.width, clip.height)?;
    mask.fill_path(&PathBuilder::from_rect(rect), FillRule::Winding, false, tiny_skia::Transform::identity());
    Some(mask)
}

/// Copy of `pixmap` with its color channels multiplied by the tint color.
fn tinted(pixmap: PixmapRef<'_>, tint: Color) -> Pixmap {
    let mut out = pixmap.to_owned();
    for px in out.pixels_mut() {
        let scale = |c: u8, t: f32| (c as f32 * t.clamp(0.0, 1.0)).round() as u8;
        if let Some(c) = tiny_skia::PremultipliedColorU8::from_rgba(
            scale(px.red(), tint.r),
            scale(px.green(), tint.g),
            scale(px.blue(), tint.b),
            px.alpha(),
        ) {
            *px = c;
        }
    }
    out
}

pub(crate) fn fill_rect(pixmap: &mut Pixmap, state: &DrawState, rect: Rect, color: Color) {
    let Some(ts_rect) = tiny_skia::Rect::from_xywh(rect.left, rect.top, rect.width, rect.height) else {
        return;
    };
    let Some(ts_color) = tiny_skia::Color::from_rgba(color.r, color.g, color.b, color.a) else {
        return;
    };

    let mut paint = Paint::default();
    paint.set_color(ts_color);
    let mask = clip_mask(pixmap, &state.clip);
    pixmap.fill_rect(ts_rect, &paint, state.transform.to_tiny_skia(), mask.as_ref());
}

/// Draws the `src` part of `source` stretched over `dst`. `src` must lie inside
/// `source`; pixels just outside it are padded from its edge.
pub(crate) fn draw_pixmap(
    pixmap: &mut Pixmap,
    state: &DrawState,
    source: PixmapRef<'_>,
    smooth: bool,
    src: Rect,
    dst: Rect,
    tint: Color,
) {
    let Some(ts_rect) = tiny_skia::Rect::from_xywh(dst.left, dst.top, dst.width, dst.height) else {
        return;
    };

    let tinted_pixmap = (!tint.is_white()).then(|| tinted(source, tint));
    let source = tinted_pixmap.as_ref().map(Pixmap::as_ref).unwrap_or(source);

    let quality = if smooth { FilterQuality::Bilinear } else { FilterQuality::Nearest };
    let pattern_transform = tiny_skia::Transform::from_translate(dst.left, dst.top)
        .pre_scale(dst.width / src.width, dst.height / src.height)
        .pre_translate(-src.left, -src.top);

    let mut paint = Paint::default();
    paint.shader = Pattern::new(source, SpreadMode::Pad, quality, tint.a.clamp(0.0, 1.0), pattern_transform);

    let mask = clip_mask(pixmap, &state.clip);
    pixmap.fill_rect(ts_rect, &paint, state.transform.to_tiny_skia(), mask.as_ref());
}
