//! Ember Renderer - tile-parallel CPU ray tracing for interactive hosts.
//!
//! A `Renderer` traces camera rays against a host-supplied
//! `GeometryProvider`, shades hits with the registered area and dome
//! lights (or a camera headlight with ambient occlusion when there are
//! none), and writes color, depth, id, normal and primvar AOVs into the
//! host's buffers. Rendering is progressive: every pass adds one sample
//! per pixel until the AOVs converge.
//!
//! Renders run on a `RenderThread`, which the host can start, stop, pause
//! and resume at any time. `RenderParam` bundles the two and stops the
//! render before every scene edit.
//!
//! `MeshScene` is a small brute-force geometry provider for tests and demos.

mod camera;
mod light_sampler;
mod lighting;
mod mesh_scene;
mod render_param;
mod render_thread;
mod renderer;
mod shading;
mod tile;

pub use camera::Camera;
pub use light_sampler::{sample_area_light, ShapeSample};
pub use lighting::{
    base_radiance, blackbody_rgb, eval_area_light, eval_dome_light, eval_shaping, sample_light,
    LightSample,
};
pub use mesh_scene::{Interpolation, Mesh, MeshScene, PrimvarData};
pub use render_param::{RenderParam, SceneEdit};
pub use render_thread::{RenderCallback, RenderControl, RenderState, RenderThread};
pub use renderer::Renderer;
pub use shading::{ambient_occlusion, shading_normal, ShadingContext, SHADOW_RAY_EPSILON};
pub use tile::{generate_tiles, DataWindow, Tile, DEFAULT_TILE_SIZE};

/// Re-export the core data model used throughout the renderer API
pub use ember_core::{
    AovBinding, AovName, ClearValue, EmberError, EmberResult, Format, GeometryProvider, Light,
    LightDesc, LightMap, OutputBuffer, RenderBuffer, RenderSettings, TextureCache,
};
