//! Light texture loading and caching.
//!
//! Area lights look their textures up by the sampled shape's parametric
//! coordinate, dome lights by a lat-long direction. Lookups are nearest-pixel.

use std::collections::HashMap;
use std::f32::consts::{PI, TAU};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ember_math::Vec3;

use crate::{EmberError, EmberResult};

/// A loaded light texture in linear RGB.
#[derive(Clone, Debug)]
pub struct LightTexture {
    /// Texture width in pixels
    pub width: u32,

    /// Texture height in pixels
    pub height: u32,

    /// Linear RGB, row-major, row 0 at the top of the image
    pub pixels: Vec<Vec3>,

    /// Original file path (for debugging)
    pub path: String,
}

impl LightTexture {
    /// Create a new texture from pixel data.
    pub fn new(width: u32, height: u32, pixels: Vec<Vec3>, path: impl Into<String>) -> Self {
        Self {
            width,
            height,
            pixels,
            path: path.into(),
        }
    }

    /// Create a solid color texture (1x1).
    pub fn solid_color(color: Vec3) -> Self {
        Self::new(1, 1, vec![color], "<solid>")
    }

    /// The fallback used when a texture file cannot be loaded.
    pub fn black() -> Self {
        Self::new(1, 1, vec![Vec3::ZERO], "<missing>")
    }

    /// Nearest-pixel lookup at parametric coordinates `(s, t)` in `[0, 1]`,
    /// with `t = 0` at the bottom of the image.
    pub fn sample(&self, s: f32, t: f32) -> Vec3 {
        if self.width == 0 || self.height == 0 {
            return Vec3::ZERO;
        }
        let x = ((s * self.width as f32) as i64).clamp(0, self.width as i64 - 1) as u32;
        let y = (((1.0 - t) * self.height as f32) as i64).clamp(0, self.height as i64 - 1) as u32;
        self.get_pixel(x, y)
    }

    /// Lat-long lookup of a unit direction (+Y up, -Z at the image center).
    pub fn sample_direction(&self, dir: Vec3) -> Vec3 {
        let s = 0.5 + dir.x.atan2(-dir.z) / TAU;
        let t = 0.5 + dir.y.clamp(-1.0, 1.0).asin() / PI;
        self.sample(s, t)
    }

    fn get_pixel(&self, x: u32, y: u32) -> Vec3 {
        let idx = (y * self.width + x) as usize;
        self.pixels.get(idx).copied().unwrap_or(Vec3::ZERO)
    }

    /// Get total size in bytes (approximate).
    pub fn size_bytes(&self) -> usize {
        self.pixels.len() * std::mem::size_of::<Vec3>()
    }
}

/// Cache for loaded light textures.
///
/// Several lights commonly share one texture file; each file is decoded once.
pub struct TextureCache {
    /// Cached textures by file path
    textures: HashMap<String, Arc<LightTexture>>,

    /// Base directory for resolving relative paths
    base_dir: Option<PathBuf>,
}

impl TextureCache {
    /// Create a new empty texture cache.
    pub fn new() -> Self {
        Self {
            textures: HashMap::new(),
            base_dir: None,
        }
    }

    /// Create a texture cache with a base directory for relative paths.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            textures: HashMap::new(),
            base_dir: Some(base_dir.into()),
        }
    }

    /// Load a texture from file, using cache if available.
    pub fn load(&mut self, path: &str) -> EmberResult<Arc<LightTexture>> {
        if let Some(texture) = self.textures.get(path) {
            return Ok(texture.clone());
        }

        let full_path = self.resolve_path(path);
        let texture = Arc::new(load_texture_file(&full_path)?);
        self.textures.insert(path.to_string(), texture.clone());

        log::debug!(
            "Loaded light texture: {} ({}x{}, {:.1} KB)",
            path,
            texture.width,
            texture.height,
            texture.size_bytes() as f32 / 1024.0
        );

        Ok(texture)
    }

    /// Load a texture, substituting black on failure.
    ///
    /// The failure is logged once here; lookups never report it.
    pub fn load_or_black(&mut self, path: &str) -> Arc<LightTexture> {
        match self.load(path) {
            Ok(texture) => texture,
            Err(err) => {
                log::warn!("{}; using black", err);
                let black = Arc::new(LightTexture::black());
                self.textures.insert(path.to_string(), black.clone());
                black
            }
        }
    }

    /// Get the number of cached textures.
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Clear all cached textures.
    pub fn clear(&mut self) {
        self.textures.clear();
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        match &self.base_dir {
            Some(base) if p.is_relative() => base.join(p),
            _ => p.to_path_buf(),
        }
    }
}

impl Default for TextureCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Load a texture from a file path.
fn load_texture_file(path: &Path) -> EmberResult<LightTexture> {
    let img = image::open(path).map_err(|e| {
        EmberError::TextureLoad(format!("Failed to open {}: {}", path.display(), e))
    })?;

    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    let pixels = rgb
        .pixels()
        .map(|p| {
            Vec3::new(
                srgb_to_linear(p[0]),
                srgb_to_linear(p[1]),
                srgb_to_linear(p[2]),
            )
        })
        .collect();

    Ok(LightTexture::new(
        width,
        height,
        pixels,
        path.to_string_lossy().to_string(),
    ))
}

/// Convert sRGB byte value to linear float.
fn srgb_to_linear(value: u8) -> f32 {
    let v = value as f32 / 255.0;
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quadrants() -> LightTexture {
        // Top row: red, green. Bottom row: blue, white.
        LightTexture::new(
            2,
            2,
            vec![Vec3::X, Vec3::Y, Vec3::Z, Vec3::ONE],
            "<test>",
        )
    }

    #[test]
    fn test_nearest_lookup() {
        let tex = quadrants();
        assert_eq!(tex.sample(0.25, 0.75), Vec3::X);
        assert_eq!(tex.sample(0.75, 0.75), Vec3::Y);
        assert_eq!(tex.sample(0.25, 0.25), Vec3::Z);
        assert_eq!(tex.sample(0.75, 0.25), Vec3::ONE);
    }

    #[test]
    fn test_lookup_clamps_edges() {
        let tex = quadrants();
        assert_eq!(tex.sample(1.0, 1.0), Vec3::Y);
        assert_eq!(tex.sample(0.0, 0.0), Vec3::Z);
        assert_eq!(tex.sample(-3.0, 7.0), Vec3::X);
    }

    #[test]
    fn test_direction_lookup() {
        let tex = quadrants();
        // Straight up lands in the top row, straight down in the bottom row
        let up = tex.sample_direction(Vec3::Y);
        let down = tex.sample_direction(-Vec3::Y);
        assert!(up == Vec3::X || up == Vec3::Y);
        assert!(down == Vec3::Z || down == Vec3::ONE);
    }

    #[test]
    fn test_missing_file_falls_back_to_black() {
        let mut cache = TextureCache::new();
        assert!(cache.load("/definitely/not/here.png").is_err());

        let tex = cache.load_or_black("/definitely/not/here.png");
        assert_eq!(tex.sample(0.5, 0.5), Vec3::ZERO);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_relative_paths_use_base_dir() {
        let dir = std::env::temp_dir().join(format!("ember_textures_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        image::RgbImage::from_pixel(2, 1, image::Rgb([255, 255, 255]))
            .save(dir.join("white.png"))
            .unwrap();

        let mut cache = TextureCache::with_base_dir(&dir);
        let tex = cache.load("white.png").unwrap();
        assert_eq!((tex.width, tex.height), (2, 1));
        assert!((tex.sample(0.5, 0.5) - Vec3::ONE).length() < 1e-3);
        assert!(TextureCache::new().load("white.png").is_err());

        cache.clear();
        assert!(cache.is_empty());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_srgb_to_linear() {
        assert!((srgb_to_linear(0) - 0.0).abs() < 0.001);
        assert!((srgb_to_linear(255) - 1.0).abs() < 0.001);

        let mid = srgb_to_linear(128);
        assert!(mid < 0.5);
        assert!(mid > 0.1);
    }
}
