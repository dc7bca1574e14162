use pane_render::config::{DeviceConfig, RenderConfig};
use pane_render::render::backends::headless::HeadlessRenderer;
use pane_render::render::backends::software::SoftwareRenderer;
use pane_render::render::{BackendRenderer, BackendTexture, Color, LoadedTexture, Rect, Vector2u};
use pane_render::{BackendContext, RenderError, SvgImage};

fn renderers() -> Vec<Box<dyn BackendRenderer>> {
    #[allow(unused_mut)]
    let mut renderers: Vec<Box<dyn BackendRenderer>> = vec![
        Box::new(HeadlessRenderer::new(DeviceConfig {
            max_texture_size: 256,
            memory_budget: None,
        })),
        Box::new(SoftwareRenderer::new(256)),
    ];
    #[cfg(feature = "backend_cairo")]
    renderers.push(Box::new(pane_render::render::backends::cairo::CairoBackend::new()));
    renderers
}

/// Opaque test pattern, so premultiplying backends read back exact values.
fn pattern(size: Vector2u) -> Vec<u8> {
    (0..size.x * size.y)
        .flat_map(|i| [(i * 37 % 251) as u8, (i * 11 % 256) as u8, (255 - i % 256) as u8, 255])
        .collect()
}

fn checksum(pixels: &[u8]) -> u64 {
    pixels
        .iter()
        .enumerate()
        .fold(0u64, |acc, (i, &b)| acc.wrapping_mul(31).wrapping_add(b as u64 ^ i as u64))
}

#[test]
fn pixels_survive_load_draw_and_readback() {
    for renderer in renderers() {
        for size in [Vector2u::new(1, 1), Vector2u::new(3, 2), Vector2u::new(7, 5)] {
            let pixels = pattern(size);
            let mut texture = renderer.create_texture();
            texture.load_texture_only(size, Some(&pixels), false).unwrap();
            assert_eq!(texture.read_pixels().unwrap(), pixels, "{} readback", renderer.name());

            let mut surface = renderer.create_surface(size).unwrap();
            {
                let mut target = renderer.create_render_target(surface.as_mut()).unwrap();
                target.clear(Color::TRANSPARENT);
                target.draw_sprite(LoadedTexture::new(texture.as_ref()).unwrap(), Default::default());
                target.flush().unwrap();
            }

            let frame = renderer.snapshot(surface.as_ref()).unwrap();
            assert_eq!(frame.pixels, pixels, "{} at {:?}", renderer.name(), size);
        }
    }
}

#[test]
fn smooth_flag_does_not_touch_content() {
    for renderer in renderers() {
        let size = Vector2u::new(4, 3);
        let mut texture = renderer.create_texture();
        texture.load_texture_only(size, Some(&pattern(size)), false).unwrap();
        let before = checksum(&texture.read_pixels().unwrap());

        texture.set_smooth(true);
        assert!(texture.is_smooth());
        texture.set_smooth(false);
        assert!(!texture.is_smooth());

        assert_eq!(checksum(&texture.read_pixels().unwrap()), before, "{}", renderer.name());
    }
}

#[test]
fn two_by_two_scenario() {
    let quad = [255, 0, 0, 255, 0, 255, 0, 255, 0, 0, 255, 255, 255, 255, 255, 255];

    for renderer in renderers() {
        let mut texture = renderer.create_texture();
        texture.load_texture_only(Vector2u::new(2, 2), None, false).unwrap();
        assert_eq!(texture.size(), Vector2u::new(2, 2));

        texture.load_texture_only(Vector2u::new(2, 2), Some(&quad), true).unwrap();
        assert!(texture.is_smooth());
        assert_eq!(texture.read_pixels().unwrap(), quad.to_vec(), "{}", renderer.name());
    }
}

#[test]
fn only_load_keeps_pixels_for_transparency() {
    for renderer in renderers() {
        let size = Vector2u::new(2, 1);
        let pixels = vec![0, 0, 0, 0, 1, 2, 3, 255];

        let mut cheap = renderer.create_texture();
        cheap.load_texture_only(size, Some(&pixels), false).unwrap();
        assert_eq!(cheap.is_transparent_pixel(Vector2u::new(0, 0)), Err(RenderError::PixelsNotRetained));

        let mut kept = renderer.create_texture();
        kept.load(size, pixels, false).unwrap();
        assert_eq!(kept.is_transparent_pixel(Vector2u::new(0, 0)), Ok(true));
        assert_eq!(kept.is_transparent_pixel(Vector2u::new(1, 0)), Ok(false));
        assert_eq!(kept.is_transparent_pixel(Vector2u::new(2, 0)), Err(RenderError::OutOfBounds(Vector2u::new(2, 0))));

        // reloading through the cheap path drops what was kept
        kept.load_texture_only(size, None, false).unwrap();
        assert_eq!(kept.is_transparent_pixel(Vector2u::new(0, 0)), Err(RenderError::PixelsNotRetained));
    }
}

#[test]
fn maximum_texture_size_is_enforced() {
    for renderer in renderers() {
        let max = renderer.maximum_texture_size();
        assert!(max >= 1);
        assert_eq!(renderer.maximum_texture_size(), max);

        let mut texture = renderer.create_texture();
        let too_large = Vector2u::new(max + 1, 1);
        assert_eq!(
            texture.load_texture_only(too_large, None, false),
            Err(RenderError::TextureTooLarge { requested: too_large, maximum: max })
        );
        assert!(!texture.is_loaded());
    }
}

#[test]
fn nine_slice_keeps_corner_pixels() {
    let size = Vector2u::new(4, 4);
    let pixels = pattern(size);

    for renderer in renderers() {
        let mut texture = renderer.create_texture();
        texture.load_texture_only(size, Some(&pixels), false).unwrap();

        let mut surface = renderer.create_surface(Vector2u::new(8, 8)).unwrap();
        {
            let mut target = renderer.create_render_target(surface.as_mut()).unwrap();
            target.clear(Color::TRANSPARENT);
            target.draw_nine_slice(
                LoadedTexture::new(texture.as_ref()).unwrap(),
                Rect::new(1.0, 1.0, 2.0, 2.0),
                Rect::new(0.0, 0.0, 8.0, 8.0),
                Color::WHITE,
            );
            target.flush().unwrap();
        }

        let frame = renderer.snapshot(surface.as_ref()).unwrap();
        let texel = |x: u32, y: u32| {
            let i = ((y * size.x + x) * 4) as usize;
            Some([pixels[i], pixels[i + 1], pixels[i + 2], pixels[i + 3]])
        };
        assert_eq!(frame.pixel(0, 0), texel(0, 0), "{}", renderer.name());
        assert_eq!(frame.pixel(7, 0), texel(3, 0), "{}", renderer.name());
        assert_eq!(frame.pixel(0, 7), texel(0, 3), "{}", renderer.name());
        assert_eq!(frame.pixel(7, 7), texel(3, 3), "{}", renderer.name());
    }
}

#[test]
fn source_outside_texture_draws_nothing() {
    for renderer in renderers() {
        let size = Vector2u::new(4, 4);
        let mut texture = renderer.create_texture();
        texture.load_texture_only(size, Some(&pattern(size)), false).unwrap();

        let mut surface = renderer.create_surface(Vector2u::new(8, 8)).unwrap();
        {
            let mut target = renderer.create_render_target(surface.as_mut()).unwrap();
            target.clear(Color::BLACK);
            let loaded = LoadedTexture::new(texture.as_ref()).unwrap();
            target.draw_texture(loaded, Rect::new(10.0, 10.0, 2.0, 2.0), Rect::new(0.0, 0.0, 8.0, 8.0), Color::WHITE);
            target.draw_nine_slice(loaded, Rect::new(6.0, 6.0, 2.0, 2.0), Rect::new(0.0, 0.0, 8.0, 8.0), Color::WHITE);
            target.flush().unwrap();
        }

        let frame = renderer.snapshot(surface.as_ref()).unwrap();
        assert_eq!(frame.pixel(7, 7), Some([0, 0, 0, 255]), "{}", renderer.name());
    }
}

#[test]
fn draws_outside_clip_leave_pixels_untouched() {
    for renderer in renderers() {
        let mut surface = renderer.create_surface(Vector2u::new(6, 6)).unwrap();
        {
            let mut target = renderer.create_render_target(surface.as_mut()).unwrap();
            target.clear(Color::BLACK);
            target.push_clip(Rect::new(2.0, 2.0, 2.0, 2.0));
            target.fill_rect(Rect::new(0.0, 0.0, 6.0, 6.0), Color::WHITE);
            target.pop_clip();
            target.flush().unwrap();
        }

        let frame = renderer.snapshot(surface.as_ref()).unwrap();
        assert_eq!(frame.pixel(2, 2), Some([255, 255, 255, 255]), "{}", renderer.name());
        assert_eq!(frame.pixel(3, 3), Some([255, 255, 255, 255]), "{}", renderer.name());
        assert_eq!(frame.pixel(1, 1), Some([0, 0, 0, 255]), "{}", renderer.name());
        assert_eq!(frame.pixel(4, 4), Some([0, 0, 0, 255]), "{}", renderer.name());
    }
}

#[test]
fn svg_scenario_through_context() {
    let svg = SvgImage::from_str("not-an-svg");
    assert!(!svg.is_set());
    assert_eq!(svg.size().x, 0.0);
    assert_eq!(svg.size().y, 0.0);

    let mut ctx = BackendContext::new(None);
    ctx.init(Box::new(SoftwareRenderer::new(1024))).unwrap();

    let svg = SvgImage::from_str(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100"><rect width="100" height="100" fill="#00ff00"/></svg>"##,
    );
    let texture = ctx.create_svg_texture(&svg, Vector2u::new(50, 50)).unwrap();
    assert_eq!(texture.size(), Vector2u::new(50, 50));

    let first = texture.read_pixels().unwrap();
    let again = ctx.create_svg_texture(&svg, Vector2u::new(50, 50)).unwrap();
    assert_eq!(again.read_pixels().unwrap(), first);
}

#[test]
fn device_budget_is_reported_through_context() {
    let config = RenderConfig {
        device: DeviceConfig {
            max_texture_size: 64,
            memory_budget: Some(16 * 16 * 4),
        },
        ..RenderConfig::default()
    };

    let mut ctx = BackendContext::new(Some(config.clone()));
    ctx.init(Box::new(HeadlessRenderer::new(config.device))).unwrap();

    let mut first = ctx.create_texture().unwrap();
    first.load_texture_only(Vector2u::new(16, 16), None, false).unwrap();

    let mut second = ctx.create_texture().unwrap();
    assert_eq!(
        second.load_texture_only(Vector2u::new(2, 2), None, false),
        Err(RenderError::AllocationFailed(Vector2u::new(2, 2)))
    );
    assert!(!second.is_loaded());

    drop(first);
    second.load_texture_only(Vector2u::new(2, 2), None, false).unwrap();
}

#[test]
fn texture_from_another_backend_is_skipped() {
    let headless = HeadlessRenderer::new(DeviceConfig {
        max_texture_size: 16,
        memory_budget: None,
    });
    let software = SoftwareRenderer::new(16);

    let mut foreign: Box<dyn BackendTexture> = software.create_texture();
    foreign.load_texture_only(Vector2u::new(1, 1), Some(&[255, 255, 255, 255]), false).unwrap();

    let mut surface = headless.create_surface(Vector2u::new(1, 1)).unwrap();
    {
        let mut target = headless.create_render_target(surface.as_mut()).unwrap();
        target.clear(Color::BLACK);
        target.draw_sprite(LoadedTexture::new(foreign.as_ref()).unwrap(), Default::default());
        target.flush().unwrap();
    }

    let frame = headless.snapshot(surface.as_ref()).unwrap();
    assert_eq!(frame.pixel(0, 0), Some([0, 0, 0, 255]));
}
