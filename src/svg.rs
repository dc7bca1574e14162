//! Vector images.
//!
//! An [`SvgImage`] is parsed once and can then be rasterized any number of times, at any
//! size, into any backend's texture. Widgets keep the vector source around instead of a
//! fixed bitmap so that scaled images stay sharp.
//!
//! Parsing never fails loudly: malformed input produces an image for which
//! [`SvgImage::is_set`] returns `false`. Callers check it and fall back to a placeholder.

use std::path::Path;
use std::sync::Arc;

use resvg::usvg;
use tiny_skia::Pixmap;

use crate::errors::RenderError;
use crate::render::texture::BackendTexture;
use crate::render::types::{rgba_from_pixmap, RgbaImage, Vector2f, Vector2u};

/// Parsed vector image.
#[derive(Clone, Default)]
pub struct SvgImage {
    tree: Option<Arc<usvg::Tree>>,
}

impl std::fmt::Debug for SvgImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SvgImage")
            .field("set", &self.is_set())
            .field("size", &self.size())
            .finish()
    }
}

impl SvgImage {
    /// Parses SVG data.
    pub fn from_data(data: &[u8]) -> Self {
        match usvg::Tree::from_data(data, &usvg::Options::default()) {
            Ok(tree) => Self { tree: Some(Arc::new(tree)) },
            Err(e) => {
                log::debug!("svg: cannot parse image: {e}");
                Self::default()
            }
        }
    }

    pub fn from_str(text: &str) -> Self {
        Self::from_data(text.as_bytes())
    }

    /// Reads and parses an SVG file. Unreadable files give an image that is not set.
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read(path) {
            Ok(data) => Self::from_data(&data),
            Err(e) => {
                log::debug!("svg: cannot read {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// True when the image was parsed successfully.
    pub fn is_set(&self) -> bool {
        self.tree.is_some()
    }

    /// Width and height declared by the image, `(0, 0)` when not set.
    pub fn size(&self) -> Vector2f {
        match &self.tree {
            Some(tree) => Vector2f::new(tree.size().width(), tree.size().height()),
            None => Vector2f::default(),
        }
    }

    /// Renders the image scaled to exactly `size` pixels. `None` when not set or when
    /// `size` has a zero dimension.
    pub fn rasterize_to_image(&self, size: Vector2u) -> Option<RgbaImage> {
        let pixmap = self.render_pixmap(size)?;
        RgbaImage::from_raw(size.x, size.y, rgba_from_pixmap(&pixmap)).ok()
    }

    fn render_pixmap(&self, size: Vector2u) -> Option<Pixmap> {
        let tree = self.tree.as_ref()?;
        let mut pixmap = Pixmap::new(size.x, size.y)?;

        let natural = tree.size();
        let transform = tiny_skia::Transform::from_scale(
            size.x as f32 / natural.width(),
            size.y as f32 / natural.height(),
        );
        resvg::render(tree, transform, &mut pixmap.as_mut());
        Some(pixmap)
    }

    /// Draws the image into `texture`, which is resized to `size` and fully overwritten.
    /// The texture keeps its smooth flag.
    ///
    /// Does nothing when the image is not set. Fails when `size` has a zero dimension or
    /// when the texture cannot hold `size`.
    pub fn rasterize(&self, texture: &mut dyn BackendTexture, size: Vector2u) -> Result<(), RenderError> {
        if !self.is_set() {
            log::debug!("svg: rasterize called on an image that is not set");
            return Ok(());
        }

        // Let the texture reject the size before anything of that size is rendered.
        let smooth = texture.is_smooth();
        texture.load_texture_only(size, None, smooth)?;

        let image = self.rasterize_to_image(size).ok_or(RenderError::InvalidSize(size))?;
        texture.load_texture_only(size, Some(&image.pixels), smooth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::render::backend::BackendRenderer;
    use crate::render::backends::headless::HeadlessRenderer;
    use crate::render::backends::software::SoftwareRenderer;
    use std::io::Write;

    const RED_SQUARE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100">
        <rect x="0" y="0" width="100" height="100" fill="#ff0000"/>
    </svg>"##;

    const CIRCLE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="20" viewBox="0 0 40 20">
        <circle cx="10" cy="10" r="8" fill="#0080ff"/>
        <rect x="24" y="4" width="12" height="12" fill="#00ff00" fill-opacity="0.5"/>
    </svg>"##;

    #[test]
    fn malformed_input_is_not_set() {
        crate::logging::init_for_tests();
        let svg = SvgImage::from_str("not-an-svg");
        assert!(!svg.is_set());
        assert_eq!(svg.size(), Vector2f::new(0.0, 0.0));
        assert!(svg.rasterize_to_image(Vector2u::new(4, 4)).is_none());
    }

    #[test]
    fn natural_size_is_read_from_source() {
        let svg = SvgImage::from_str(CIRCLE);
        assert!(svg.is_set());
        assert_eq!(svg.size(), Vector2f::new(40.0, 20.0));
    }

    #[test]
    fn rasterize_resizes_target() {
        let renderer = SoftwareRenderer::new(256);
        let mut tex = renderer.create_texture();
        tex.load_texture_only(Vector2u::new(100, 100), None, true).unwrap();

        let svg = SvgImage::from_str(RED_SQUARE);
        svg.rasterize(tex.as_mut(), Vector2u::new(50, 50)).unwrap();

        assert_eq!(tex.size(), Vector2u::new(50, 50));
        assert!(tex.is_smooth());
        let pixels = tex.read_pixels().unwrap();
        assert_eq!(&pixels[..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn rasterize_is_deterministic() {
        let svg = SvgImage::from_str(CIRCLE);
        let a = svg.rasterize_to_image(Vector2u::new(37, 19)).unwrap();
        let b = svg.rasterize_to_image(Vector2u::new(37, 19)).unwrap();
        assert_eq!(a.pixels, b.pixels);
    }

    #[test]
    fn different_sizes_do_not_contaminate() {
        let renderer = HeadlessRenderer::new(DeviceConfig {
            max_texture_size: 512,
            memory_budget: None,
        });
        let mut tex = renderer.create_texture();
        let svg = SvgImage::from_str(CIRCLE);

        svg.rasterize(tex.as_mut(), Vector2u::new(80, 40)).unwrap();
        assert_eq!(tex.read_pixels().unwrap().len(), 80 * 40 * 4);

        svg.rasterize(tex.as_mut(), Vector2u::new(10, 5)).unwrap();
        assert_eq!(tex.size(), Vector2u::new(10, 5));
        assert_eq!(tex.read_pixels().unwrap().len(), 10 * 5 * 4);
    }

    #[test]
    fn unset_image_leaves_texture_alone() {
        let renderer = SoftwareRenderer::new(64);
        let mut tex = renderer.create_texture();
        tex.load_texture_only(Vector2u::new(3, 3), None, false).unwrap();

        SvgImage::default().rasterize(tex.as_mut(), Vector2u::new(8, 8)).unwrap();
        assert_eq!(tex.size(), Vector2u::new(3, 3));
    }

    #[test]
    fn zero_size_is_rejected() {
        let renderer = SoftwareRenderer::new(64);
        let mut tex = renderer.create_texture();
        let svg = SvgImage::from_str(RED_SQUARE);
        assert_eq!(
            svg.rasterize(tex.as_mut(), Vector2u::new(0, 8)),
            Err(RenderError::InvalidSize(Vector2u::new(0, 8)))
        );
    }

    #[test]
    fn oversized_target_is_rejected_before_rendering() {
        let renderer = SoftwareRenderer::new(64);
        let mut tex = renderer.create_texture();
        tex.load_texture_only(Vector2u::new(3, 3), None, false).unwrap();

        let svg = SvgImage::from_str(RED_SQUARE);
        let huge = Vector2u::new(100_000, 100_000);
        assert_eq!(
            svg.rasterize(tex.as_mut(), huge),
            Err(RenderError::TextureTooLarge { requested: huge, maximum: 64 })
        );
        assert_eq!(tex.size(), Vector2u::new(3, 3));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(RED_SQUARE.as_bytes()).unwrap();

        let svg = SvgImage::from_file(file.path());
        assert!(svg.is_set());
        assert_eq!(svg.size(), Vector2f::new(100.0, 100.0));

        assert!(!SvgImage::from_file(file.path().with_extension("missing")).is_set());
    }
}
