//! Renderer tunables.
//!
//! Hosts construct these directly or load them from JSON; the libraries
//! never read the process environment themselves.

use serde::{Deserialize, Serialize};

use crate::EmberResult;

/// Renderer configuration applied between render passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Number of sample passes before multisampled AOVs are converged
    pub samples_to_convergence: u32,
    /// Hemisphere samples per ambient occlusion estimate (0 disables it)
    pub ambient_occlusion_samples: u32,
    /// Edge length of the square tiles dispatched in parallel
    pub tile_size: u32,
    /// Jitter camera rays within the pixel (otherwise rays go through centers)
    pub jitter_camera: bool,
    /// Use the scene's `displayColor` as surface albedo
    pub use_scene_colors: bool,
    /// Strength of the headlight used when the scene has no lights
    pub camera_light_intensity: f32,
    /// RNG seed; -1 picks a new seed for every render
    pub random_seed: i64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            samples_to_convergence: 100,
            ambient_occlusion_samples: 16,
            tile_size: 8,
            jitter_camera: true,
            use_scene_colors: true,
            camera_light_intensity: 3.0,
            random_seed: -1,
        }
    }
}

impl RenderSettings {
    /// Parse settings from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> EmberResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize settings to pretty-printed JSON.
    pub fn to_json(&self) -> EmberResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The fixed seed, if one was configured.
    pub fn fixed_seed(&self) -> Option<u64> {
        (self.random_seed >= 0).then_some(self.random_seed as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = RenderSettings::default();
        assert_eq!(settings.samples_to_convergence, 100);
        assert_eq!(settings.ambient_occlusion_samples, 16);
        assert_eq!(settings.tile_size, 8);
        assert_eq!(settings.fixed_seed(), None);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings =
            RenderSettings::from_json(r#"{ "samples_to_convergence": 4, "random_seed": 7 }"#)
                .unwrap();
        assert_eq!(settings.samples_to_convergence, 4);
        assert_eq!(settings.fixed_seed(), Some(7));
        assert_eq!(settings.tile_size, 8);
        assert!(settings.jitter_camera);
    }

    #[test]
    fn test_json_round_trip() {
        let settings = RenderSettings {
            ambient_occlusion_samples: 0,
            use_scene_colors: false,
            ..Default::default()
        };
        let json = settings.to_json().unwrap();
        assert_eq!(RenderSettings::from_json(&json).unwrap(), settings);
    }

    #[test]
    fn test_bad_json() {
        assert!(RenderSettings::from_json("{ not json").is_err());
        assert!(RenderSettings::from_json(r#"{ "tile_size": "big" }"#).is_err());
    }
}
