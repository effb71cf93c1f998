//! Simple render example.
//!
//! Renders a floor and a colored wall lit by a rect light on the render
//! thread, then saves the color AOV as a PNG.
//!
//! Usage: cargo run --example simple_render [settings.json]

use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use ember_math::{Mat4, Vec3, Vec4};
use ember_renderer::{
    AovBinding, ClearValue, Format, Light, LightDesc, Mesh, MeshScene, OutputBuffer, RenderBuffer,
    RenderParam, RenderSettings, Renderer, TextureCache,
};

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading settings from {}", path))?;
            RenderSettings::from_json(&json)?
        }
        None => RenderSettings {
            samples_to_convergence: 64,
            ..RenderSettings::default()
        },
    };

    let renderer = Arc::new(Renderer::new());
    renderer.apply_settings(&settings);
    renderer.set_scene(Arc::new(build_scene()));
    renderer.set_camera(
        Mat4::look_at_rh(Vec3::new(0.0, 2.0, 6.0), Vec3::new(0.0, 0.5, 0.0), Vec3::Y),
        Mat4::perspective_rh_gl(45f32.to_radians(), WIDTH as f32 / HEIGHT as f32, 0.1, 100.0),
    );

    let mut textures = TextureCache::new();
    let key = LightDesc::rect(1.5, 1.5)
        .with_transform(
            Mat4::from_translation(Vec3::new(0.0, 3.0, 1.0)) * Mat4::from_rotation_x(-FRAC_PI_2),
        )
        .with_emission(Vec3::ONE, 4.0, 0.0)
        .with_color_temperature(4500.0);
    renderer.add_light("/World/Key", Light::from_desc(&key, &mut textures));

    let color = Arc::new(RenderBuffer::new(WIDTH, HEIGHT, Format::Float32Vec4, true));
    renderer.set_aov_bindings(vec![AovBinding::new(
        "color",
        color.clone(),
        ClearValue::Vec4(Vec4::new(0.05, 0.05, 0.08, 1.0)),
    )]);
    if let Some(problem) = renderer.validate_aov_bindings().into_iter().next() {
        anyhow::bail!("bad AOV setup: {}", problem);
    }

    let param = RenderParam::new(renderer.clone());
    let start = Instant::now();
    param.start_render();
    while param.is_rendering() {
        thread::sleep(Duration::from_millis(50));
    }
    log::info!(
        "Rendered {}x{} with {} samples in {:?}",
        WIDTH,
        HEIGHT,
        renderer.completed_samples(),
        start.elapsed()
    );

    let filename = "output.png";
    save_png(&color, filename)?;
    log::info!("Saved to {}", filename);
    Ok(())
}

fn build_scene() -> MeshScene {
    let mut scene = MeshScene::new();

    scene.add_mesh(
        Mesh::quad(8.0, 8.0)
            .with_transform(Mat4::from_rotation_x(-FRAC_PI_2))
            .with_prim_id(0)
            .with_color(Vec3::splat(0.8)),
    );
    scene.add_mesh(
        Mesh::quad(4.0, 2.0)
            .with_transform(Mat4::from_translation(Vec3::new(0.0, 1.0, -1.5)))
            .with_prim_id(1)
            .with_color(Vec3::new(0.8, 0.3, 0.2)),
    );

    scene
}

fn save_png(buffer: &RenderBuffer, filename: &str) -> Result<()> {
    let to_u8 = |v: f32| (v.clamp(0.0, 1.0).powf(1.0 / 2.2) * 255.0).round() as u8;

    let image = image::RgbaImage::from_fn(buffer.width(), buffer.height(), |x, y| {
        let pixel = buffer.read_f32(x, y);
        let channel = |c: usize| pixel.get(c).copied().unwrap_or(1.0);
        image::Rgba([
            to_u8(channel(0)),
            to_u8(channel(1)),
            to_u8(channel(2)),
            (channel(3).clamp(0.0, 1.0) * 255.0).round() as u8,
        ])
    });
    image
        .save(filename)
        .with_context(|| format!("writing {}", filename))?;
    Ok(())
}
