//! The registry of lights shared between scene sync and render tiles.
//!
//! Many tile tasks read the map concurrently during a pass; the scene-sync
//! thread adds and removes entries between passes. A readers-writer lock
//! keeps readers from contending with each other.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use crate::light::Light;

/// Lights keyed by scene path.
pub type LightTable = HashMap<String, Arc<Light>>;

/// Thread-safe map from scene path to light.
#[derive(Default)]
pub struct LightMap {
    lights: RwLock<LightTable>,
}

impl LightMap {
    /// Create an empty light map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a light. A light already stored under `id` is replaced.
    pub fn add_light(&self, id: impl Into<String>, light: Arc<Light>) {
        let id = id.into();
        let mut lights = self.lights.write().unwrap_or_else(PoisonError::into_inner);
        if lights.insert(id.clone(), light).is_some() {
            log::debug!("Replaced light {}", id);
        } else {
            log::debug!("Added light {}", id);
        }
    }

    /// Unregister the light stored under `id`. No-op if absent.
    pub fn remove_light(&self, id: &str) -> Option<Arc<Light>> {
        let removed = self
            .lights
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        if removed.is_some() {
            log::debug!("Removed light {}", id);
        }
        removed
    }

    /// Shared read access for the duration of a render pass.
    ///
    /// Hold the guard once per pass and hand `&LightTable` to tile tasks;
    /// do not re-acquire it from inside them.
    pub fn read(&self) -> RwLockReadGuard<'_, LightTable> {
        self.lights.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a single light.
    pub fn get(&self, id: &str) -> Option<Arc<Light>> {
        self.read().get(id).cloned()
    }

    /// Number of registered lights.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// True when no lights are registered.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
