use pane_render::config::RenderConfig;
use pane_render::icons::{FileInfo, IconLoader};
use pane_render::render::backends::headless::HeadlessRenderer;
use pane_render::render::{Color, LoadedTexture, Rect, Transform, Vector2u};
use pane_render::{BackendContext, SvgImage};
use std::time::Duration;

const BADGE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="16" height="16">
    <circle cx="8" cy="8" r="7" fill="#3070d0"/>
</svg>"##;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configuration comes from the environment (PANE_LOG, PANE_MAX_TEXTURE_SIZE), on top of
    // the defaults.
    let config = RenderConfig::from_env();
    pane_render::logging::init(config.log_level);

    // Activate the headless backend. Nothing ends up on screen; frames are read back from
    // the surface instead.
    let mut ctx = BackendContext::new(Some(config.clone()));
    ctx.init(Box::new(HeadlessRenderer::new(config.device.clone())))?;
    log::info!("maximum texture size: {}", ctx.maximum_texture_size()?);

    // A vector badge, rasterized at twice its natural size
    let badge = ctx.create_svg_texture(&SvgImage::from_str(BADGE), Vector2u::new(32, 32))?;

    // Load some file icons in the background while the first frame is drawn
    let mut icons = IconLoader::new(tokio::runtime::Handle::current(), config.icon_size);
    icons.request_file_icons(vec![
        FileInfo::directory("src"),
        FileInfo::file("Cargo.toml"),
        FileInfo::file("logo.png"),
    ]);

    let surface = ctx.add_surface(Vector2u::new(200, 120))?;
    {
        let mut target = ctx.render_target(surface)?;
        target.clear(Color::from_u8(240, 240, 240, 255));
        target.fill_rect(Rect::new(10.0, 10.0, 180.0, 100.0), Color::WHITE);

        if let Some(badge) = LoadedTexture::new(badge.as_ref()) {
            target.push_transform(Transform::from_translate(20.0, 20.0));
            target.draw_sprite(badge, Default::default());
            target.pop_transform();
        }
        target.flush()?;
    }

    // Poll the loader like a UI thread would on every frame
    while !icons.update() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let icon_textures = icons
        .retrieve_file_icons()
        .iter()
        .map(|icon| ctx.texture_from_image(icon, true))
        .collect::<Result<Vec<_>, _>>()?;

    {
        let mut target = ctx.render_target(surface)?;
        for (i, texture) in icon_textures.iter().enumerate() {
            if let Some(texture) = LoadedTexture::new(texture.as_ref()) {
                let x = 60.0 + i as f32 * 40.0;
                let dst = Rect::new(x, 60.0, 32.0, 32.0);
                target.draw_texture(texture, Rect::from_size(texture.size()), dst, Color::WHITE);
            }
        }
        target.flush()?;
    }

    let frame = ctx.snapshot(surface)?;
    let opaque = frame.pixels.chunks_exact(4).filter(|p| p[3] == 255).count();
    println!(
        "rendered {}x{} frame, {} opaque pixels, {} icons",
        frame.width,
        frame.height,
        opaque,
        icon_textures.len()
    );

    ctx.shutdown();
    Ok(())
}
