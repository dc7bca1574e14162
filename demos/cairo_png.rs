use pane_render::render::backends::cairo::CairoBackend;
use pane_render::render::{Color, LoadedTexture, Rect, Vector2u};
use pane_render::{BackendContext, SvgImage};

const LOGO: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="64" height="64">
    <rect x="4" y="4" width="56" height="56" rx="10" fill="#d04030"/>
    <circle cx="32" cy="32" r="14" fill="#ffffff"/>
</svg>"##;

fn main() -> anyhow::Result<()> {
    pane_render::logging::init(log::LevelFilter::Info);

    let path = std::env::args().nth(1).unwrap_or_else(|| "pane-render.png".to_string());

    let mut ctx = BackendContext::new(None);
    ctx.init(Box::new(CairoBackend::new()))?;

    let logo = ctx.create_svg_texture(&SvgImage::from_str(LOGO), Vector2u::new(128, 128))?;
    let surface = ctx.add_surface(Vector2u::new(256, 256))?;
    {
        let mut target = ctx.render_target(surface)?;
        target.clear(Color::from_u8(32, 32, 40, 255));
        target.fill_rect(Rect::new(16.0, 16.0, 224.0, 224.0), Color::from_u8(60, 60, 72, 255));
        if let Some(logo) = LoadedTexture::new(logo.as_ref()) {
            target.draw_texture(logo, Rect::from_size(logo.size()), Rect::new(64.0, 64.0, 128.0, 128.0), Color::WHITE);
        }
        target.flush()?;
    }

    // Re-encode the frame through a fresh cairo surface, cairo knows how to write PNG
    let frame = ctx.snapshot(surface)?;
    let mut png = cairo::ImageSurface::create(cairo::Format::ARgb32, frame.width as i32, frame.height as i32)?;
    let stride = png.stride() as usize;
    {
        let mut data = png.data()?;
        for y in 0..frame.height as usize {
            for x in 0..frame.width as usize {
                let src = (y * frame.width as usize + x) * 4;
                let [r, g, b, a] = [
                    frame.pixels[src] as u32,
                    frame.pixels[src + 1] as u32,
                    frame.pixels[src + 2] as u32,
                    frame.pixels[src + 3] as u32,
                ];
                let premul = |c: u32| (c * a + 127) / 255;
                let argb = (a << 24) | (premul(r) << 16) | (premul(g) << 8) | premul(b);
                let dst = y * stride + x * 4;
                data[dst..dst + 4].copy_from_slice(&argb.to_ne_bytes());
            }
        }
    }

    let mut file = std::fs::File::create(&path)?;
    png.write_to_png(&mut file)?;
    println!("wrote {path}");

    ctx.shutdown();
    Ok(())
}
