//! Ember Core - the data model shared between a scene host and the renderer.
//!
//! This crate provides:
//!
//! - **Lights**: `Light`, the `LightShape` sum type, radiance and shaping
//!   parameters, light textures, and the lock-guarded `LightMap`
//! - **AOVs**: `AovName`, `AovBinding`, `ClearValue` and the `OutputBuffer`
//!   trait with an in-memory `RenderBuffer`
//! - **Geometry queries**: the `GeometryProvider`, `HitContext` and
//!   `AttributeSampler` traits the renderer traces against
//! - **Settings**: `RenderSettings`, loadable from JSON
//!
//! # Example
//!
//! ```ignore
//! use ember_core::{Light, LightDesc, LightMap, TextureCache};
//!
//! let lights = LightMap::new();
//! let mut textures = TextureCache::new();
//! let key = Light::from_desc(&LightDesc::rect(2.0, 1.0), &mut textures);
//! lights.add_light("/World/Key", key);
//! ```

pub mod aov;
pub mod buffer;
pub mod error;
pub mod geometry;
pub mod light;
pub mod light_map;
pub mod settings;
pub mod texture;

// Re-export commonly used types
pub use aov::{AovBinding, AovName, ClearValue, PRIMVAR_PREFIX};
pub use buffer::{Format, OutputBuffer, RenderBuffer};
pub use error::{EmberError, EmberResult};
pub use geometry::{
    AttributeSampler, GeometryProvider, Hit, HitContext, RayMask, COLOR_ATTRIBUTE, NORMAL_ATTRIBUTE,
};
pub use light::{Light, LightDesc, LightKind, LightShape, LightShaping};
pub use light_map::{LightMap, LightTable};
pub use settings::RenderSettings;
pub use texture::{LightTexture, TextureCache};
