//! The render engine: a tile-parallel, progressive sampling loop.
//!
//! Each call to `Renderer::render` runs up to `samples_to_convergence`
//! passes. A pass splits the data window into tiles, renders them in
//! parallel with rayon, and adds one sample to every pixel of every AOV
//! that has not converged yet.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread;
use std::time::Duration;

use ember_core::{
    AovBinding, AovName, ClearValue, EmberError, Format, GeometryProvider, Hit, Light, LightMap,
    LightTable, OutputBuffer, RayMask, RenderSettings,
};
use ember_math::{hash_u64, Interval, Mat4, Ray, Vec2, Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::camera::Camera;
use crate::render_thread::RenderControl;
use crate::shading::{shading_normal, ShadingContext};
use crate::tile::{generate_tiles, DataWindow, Tile};

/// How long a paused render sleeps between checks.
const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Everything the host configures between renders.
#[derive(Default)]
struct RenderConfig {
    scene: Option<Arc<dyn GeometryProvider>>,
    camera: Camera,
    data_window: DataWindow,
    aov_bindings: Vec<AovBinding>,
    settings: RenderSettings,
}

/// One AOV binding resolved for a render.
struct ActiveAov {
    name: AovName,
    buffer: Arc<dyn OutputBuffer>,
    clear_color: Vec4,
}

/// Per-render state shared by every tile task.
struct PassContext<'a> {
    camera: &'a Camera,
    window: DataWindow,
    aovs: &'a [ActiveAov],
    scene: Option<&'a dyn GeometryProvider>,
    lights: &'a LightTable,
    settings: &'a RenderSettings,
    seed: u64,
    /// Set when any camera ray hits geometry
    any_hit: AtomicBool,
}

/// Tile-parallel ray tracer writing into host-provided AOV buffers.
///
/// Configuration lives behind a readers-writer lock: `render` holds the
/// read side for its whole duration, so setters called during a render
/// wait for it to return. Stop the render first (see `RenderParam`).
pub struct Renderer {
    config: RwLock<RenderConfig>,
    lights: Arc<LightMap>,
    /// Memoized AOV validation result; `None` until the bindings are checked
    aov_bindings_valid: Mutex<Option<bool>>,
    completed_samples: AtomicU32,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self::with_light_map(Arc::new(LightMap::new()))
    }

    /// Create a renderer that reads lights from a shared map.
    pub fn with_light_map(lights: Arc<LightMap>) -> Self {
        Self {
            config: RwLock::new(RenderConfig::default()),
            lights,
            aov_bindings_valid: Mutex::new(None),
            completed_samples: AtomicU32::new(0),
        }
    }

    fn read_config(&self) -> RwLockReadGuard<'_, RenderConfig> {
        self.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_config(&self) -> RwLockWriteGuard<'_, RenderConfig> {
        self.config.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn invalidate_aov_bindings(&self) {
        *self
            .aov_bindings_valid
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn set_scene(&self, scene: Arc<dyn GeometryProvider>) {
        self.write_config().scene = Some(scene);
    }

    /// Pixel rectangle to render. An empty window renders the whole buffer.
    pub fn set_data_window(&self, data_window: DataWindow) {
        self.write_config().data_window = data_window;
        self.invalidate_aov_bindings();
    }

    /// Set the world-to-eye view and eye-to-clip projection matrices.
    pub fn set_camera(&self, view: Mat4, projection: Mat4) {
        self.write_config().camera = Camera::new(view, projection);
    }

    pub fn set_aov_bindings(&self, aov_bindings: Vec<AovBinding>) {
        self.write_config().aov_bindings = aov_bindings;
        self.invalidate_aov_bindings();
    }

    pub fn aov_bindings(&self) -> Vec<AovBinding> {
        self.read_config().aov_bindings.clone()
    }

    pub fn set_samples_to_convergence(&self, samples: u32) {
        self.write_config().settings.samples_to_convergence = samples;
    }

    pub fn set_ambient_occlusion_samples(&self, samples: u32) {
        self.write_config().settings.ambient_occlusion_samples = samples;
    }

    pub fn set_enable_scene_colors(&self, enable: bool) {
        self.write_config().settings.use_scene_colors = enable;
    }

    /// Seed for the sample RNG; -1 draws a fresh seed for every render.
    pub fn set_random_seed(&self, seed: i64) {
        self.write_config().settings.random_seed = seed;
    }

    /// Replace every tunable at once.
    pub fn apply_settings(&self, settings: &RenderSettings) {
        self.write_config().settings = settings.clone();
    }

    pub fn settings(&self) -> RenderSettings {
        self.read_config().settings.clone()
    }

    /// The light map this renderer reads.
    pub fn lights(&self) -> &Arc<LightMap> {
        &self.lights
    }

    /// Register a light; an existing light with the same id is replaced.
    pub fn add_light(&self, id: impl Into<String>, light: Arc<Light>) {
        self.lights.add_light(id, light);
    }

    /// Unregister a light. No-op if the id is absent.
    pub fn remove_light(&self, id: &str) {
        self.lights.remove_light(id);
    }

    /// Number of sample passes finished by the current or last render.
    pub fn completed_samples(&self) -> u32 {
        self.completed_samples.load(Ordering::Relaxed)
    }

    /// Mark every bound buffer as needing more samples.
    pub fn mark_aov_buffers_unconverged(&self) {
        for buffer in self.read_config().aov_bindings.iter().filter_map(|b| b.buffer.as_ref()) {
            buffer.set_converged(false);
        }
    }

    /// Problems with the current AOV bindings, one per invalid binding.
    ///
    /// Bindings with a name this renderer cannot produce are not errors;
    /// they are logged and left untouched by rendering.
    pub fn validate_aov_bindings(&self) -> Vec<EmberError> {
        validate_bindings(&self.read_config().aov_bindings)
    }

    /// Memoized validation; logs the problems the first time it runs.
    fn aov_bindings_valid(&self, config: &RenderConfig) -> bool {
        let mut valid = self
            .aov_bindings_valid
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(valid) = *valid {
            return valid;
        }

        let problems = validate_bindings(&config.aov_bindings);
        for problem in &problems {
            log::warn!("{}", problem);
        }
        *valid = Some(problems.is_empty());
        problems.is_empty()
    }

    /// Fill every bound buffer that has a clear value and mark it unconverged.
    pub fn clear(&self) {
        let config = self.read_config();
        if !self.aov_bindings_valid(&config) {
            return;
        }

        for binding in &config.aov_bindings {
            let Some(buffer) = &binding.buffer else {
                continue;
            };
            if binding.clear_value.is_none() {
                continue;
            }
            buffer.map();
            if binding.aov_name() == AovName::Color {
                buffer.clear_f32(&binding.clear_value.as_color().to_array());
            } else {
                binding.clear_value.clear(buffer.as_ref());
            }
            buffer.unmap();
            buffer.set_converged(false);
        }
    }

    /// Render until every AOV converges or a stop is requested.
    ///
    /// Runs on the render thread; `control` is polled for pause and stop
    /// between passes. A pass that has started always finishes.
    pub fn render(&self, control: &RenderControl) {
        self.completed_samples.store(0, Ordering::Relaxed);
        let config = self.read_config();

        if !self.aov_bindings_valid(&config) {
            for buffer in config.aov_bindings.iter().filter_map(|b| b.buffer.as_ref()) {
                buffer.set_converged(true);
            }
            log::debug!("Could not validate AOVs; render will not complete");
            return;
        }

        let aovs: Vec<ActiveAov> = config
            .aov_bindings
            .iter()
            .filter_map(|binding| {
                Some(ActiveAov {
                    name: binding.aov_name(),
                    buffer: binding.buffer.clone()?,
                    clear_color: binding.clear_value.as_color(),
                })
            })
            .collect();
        let Some(first) = aovs.first() else {
            log::debug!("No AOVs bound; nothing to render");
            return;
        };
        let window = config
            .data_window
            .fit_to(first.buffer.width(), first.buffer.height());

        for aov in &aovs {
            aov.buffer.map();
        }

        let lights = self.lights.read();
        let scene = config.scene.as_deref();
        let scene_is_empty = scene.map_or(true, |scene| scene.is_empty());
        let settings = &config.settings;
        let seed = settings.fixed_seed().unwrap_or_else(rand::random);
        let multisampled = aovs.iter().any(|aov| aov.buffer.is_multisampled());

        let pass = PassContext {
            camera: &config.camera,
            window,
            aovs: &aovs,
            scene,
            lights: &lights,
            settings,
            seed,
            any_hit: AtomicBool::new(false),
        };
        let tiles = generate_tiles(window, settings.tile_size);
        log::debug!(
            "Rendering {}x{} in {} tiles, up to {} samples",
            window.width,
            window.height,
            tiles.len(),
            settings.samples_to_convergence
        );

        for sample in 0..settings.samples_to_convergence {
            while control.is_pause_requested() {
                if control.is_stop_requested() {
                    break;
                }
                thread::sleep(PAUSE_POLL_INTERVAL);
            }
            if control.is_stop_requested() {
                break;
            }

            tiles
                .par_iter()
                .for_each(|tile| pass.render_tile(tile, sample));

            if sample == 0 {
                // Single-sampled AOVs are done after one pass
                for aov in aovs.iter().filter(|aov| !aov.buffer.is_multisampled()) {
                    aov.buffer.set_converged(true);
                }
                // Nothing hit: more samples would only repeat the clear color
                let missed_everything = !pass.any_hit.load(Ordering::Relaxed);
                if !multisampled || scene_is_empty || missed_everything {
                    self.completed_samples.store(1, Ordering::Relaxed);
                    break;
                }
            }

            self.completed_samples.store(sample + 1, Ordering::Relaxed);
            if control.is_stop_requested() {
                break;
            }
        }

        for aov in &aovs {
            aov.buffer.unmap();
            aov.buffer.set_converged(true);
        }
        log::debug!("Render finished after {} samples", self.completed_samples());
    }
}

impl PassContext<'_> {
    /// Deterministic RNG for one tile in one pass.
    fn tile_rng(&self, tile: &Tile, sample: u32) -> StdRng {
        let tile_seed = hash_u64(tile.index as u64, self.seed);
        StdRng::seed_from_u64(hash_u64(sample as u64, tile_seed))
    }

    fn render_tile(&self, tile: &Tile, sample: u32) {
        let mut rng = self.tile_rng(tile, sample);

        for (x, y) in tile.pixels() {
            let jitter = if self.settings.jitter_camera {
                Vec2::new(rng.gen(), rng.gen())
            } else {
                Vec2::splat(0.5)
            };
            let ray = self.camera.generate_ray(x, y, jitter, &self.window);
            self.trace_ray(x, y, &ray, &mut rng);
        }
    }

    /// Trace one camera ray and write every AOV that has not converged.
    fn trace_ray(&self, x: u32, y: u32, ray: &Ray, rng: &mut StdRng) {
        let hit = self.scene.and_then(|scene| {
            scene.trace_nearest_hit(ray, Interval::from_min(0.0), RayMask::CAMERA)
        });
        if hit.is_some() {
            self.any_hit.store(true, Ordering::Relaxed);
        }

        for aov in self.aovs {
            if aov.buffer.is_converged() {
                continue;
            }

            if aov.name == AovName::Color {
                let color = match (&hit, self.scene) {
                    (Some(hit), Some(scene)) => self.shading(scene).shade(ray, hit, rng),
                    _ => aov.clear_color,
                };
                aov.buffer.write_f32(x, y, &color.to_array());
                continue;
            }

            // Other AOVs keep their clear value where nothing was hit
            let Some(hit) = &hit else {
                continue;
            };
            match &aov.name {
                AovName::Depth => aov.buffer.write_f32(x, y, &[self.camera.depth(hit.position)]),
                AovName::CameraDepth => aov.buffer.write_f32(x, y, &[hit.t]),
                AovName::PrimId => aov.buffer.write_i32(x, y, &[hit.context.prim_id()]),
                AovName::InstanceId => aov.buffer.write_i32(x, y, &[hit.context.instance_id()]),
                AovName::ElementId => {
                    aov.buffer
                        .write_i32(x, y, &[hit.context.element_id(hit.prim_index)])
                }
                AovName::Normal => {
                    let n = shading_normal(hit, ray.direction());
                    aov.buffer.write_f32(x, y, &n.to_array());
                }
                AovName::NormalEye => {
                    let n = self.camera.normal_to_eye(shading_normal(hit, ray.direction()));
                    aov.buffer.write_f32(x, y, &n.to_array());
                }
                AovName::Primvar(name) => {
                    if let Some(value) = sample_primvar(hit, name) {
                        aov.buffer.write_f32(x, y, &value.to_array());
                    }
                }
                AovName::Color | AovName::Other(_) => {}
            }
        }
    }

    fn shading<'s>(&'s self, scene: &'s dyn GeometryProvider) -> ShadingContext<'s> {
        ShadingContext {
            scene,
            lights: self.lights,
            ambient_occlusion_samples: self.settings.ambient_occlusion_samples,
            camera_light_intensity: self.settings.camera_light_intensity,
            use_scene_colors: self.settings.use_scene_colors,
        }
    }
}

/// Sample a primvar as a vec3, widening vec2 and scalar values with zeros.
fn sample_primvar(hit: &Hit<'_>, name: &str) -> Option<Vec3> {
    let sampler = hit.context.attribute(name)?;
    let (prim, u, v) = (hit.prim_index, hit.u, hit.v);
    sampler
        .sample_vec3(prim, u, v)
        .or_else(|| sampler.sample_vec2(prim, u, v).map(|st| st.extend(0.0)))
        .or_else(|| sampler.sample_scalar(prim, u, v).map(|s| Vec3::new(s, 0.0, 0.0)))
}

/// Check every binding against the formats its AOV supports.
fn validate_bindings(bindings: &[AovBinding]) -> Vec<EmberError> {
    let size = bindings
        .iter()
        .find_map(|b| b.buffer.as_ref())
        .map(|buffer| (buffer.width(), buffer.height()));

    bindings
        .iter()
        .filter_map(|binding| {
            binding_problem(binding, size)
                .map(|reason| EmberError::invalid_aov(&binding.name, reason))
        })
        .collect()
}

/// The first thing wrong with a binding, if any.
fn binding_problem(binding: &AovBinding, size: Option<(u32, u32)>) -> Option<String> {
    let Some(buffer) = &binding.buffer else {
        return Some("no render buffer is bound".to_string());
    };
    let name = binding.aov_name();
    let format = buffer.format();

    let format_ok = match &name {
        AovName::Color => matches!(
            format,
            Format::Float32Vec3 | Format::Float32Vec4 | Format::UNorm8Vec4
        ),
        AovName::Depth | AovName::CameraDepth => format == Format::Float32,
        AovName::PrimId | AovName::InstanceId | AovName::ElementId => format == Format::Int32,
        AovName::Normal | AovName::NormalEye | AovName::Primvar(_) => format == Format::Float32Vec3,
        AovName::Other(token) => {
            log::warn!("Unsupported AOV '{}' won't be rendered to", token);
            true
        }
    };
    if !format_ok {
        return Some(format!("unsupported format {:?}", format));
    }

    let clear_ok = match (&name, binding.clear_value) {
        (_, ClearValue::None) => true,
        (AovName::Color, ClearValue::Vec3(_) | ClearValue::Vec4(_)) => true,
        (AovName::Color, _) => false,
        (_, clear) => match format {
            Format::Float32 => matches!(clear, ClearValue::Float(_)),
            Format::Int32 => matches!(clear, ClearValue::Int(_)),
            Format::Float32Vec3 => matches!(clear, ClearValue::Vec3(_)),
            Format::Float32Vec4 | Format::UNorm8Vec4 => {
                matches!(clear, ClearValue::Vec3(_) | ClearValue::Vec4(_))
            }
        },
    };
    if !clear_ok {
        return Some(format!(
            "clear value {:?} isn't compatible with format {:?}",
            binding.clear_value, format
        ));
    }

    match size {
        Some((width, height)) if (buffer.width(), buffer.height()) != (width, height) => {
            Some(format!(
                "size {}x{} doesn't match the other AOVs ({}x{})",
                buffer.width(),
                buffer.height(),
                width,
                height
            ))
        }
        _ => None,
    }
}
