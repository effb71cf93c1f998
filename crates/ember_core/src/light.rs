//! Light definitions.
//!
//! Lights follow the UsdLux conventions: area lights emit along their local
//! -Z axis, cylinders lie along local X, and shapes are centered at the
//! origin of light space. The shape is a closed sum type so both the sampler
//! and the sync-time update are exhaustive matches.

use std::sync::Arc;

use ember_math::{Mat4, Vec3};

use crate::texture::{LightTexture, TextureCache};

/// Geometric shape of a light, in light space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightShape {
    /// Rectangle in the XY plane spanning `[-w/2, w/2] x [-h/2, h/2]`
    Rect { width: f32, height: f32 },
    /// Disk in the XY plane
    Disk { radius: f32 },
    /// Sphere around the origin
    Sphere { radius: f32 },
    /// Open cylinder whose axis is local X
    Cylinder { radius: f32, length: f32 },
    /// Infinitely distant environment
    Dome,
    /// A light type this renderer does not sample; contributes nothing
    Unknown,
}

/// Light type tokens understood by `LightShape::from_desc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Rect,
    Disk,
    Sphere,
    Cylinder,
    Dome,
}

impl LightKind {
    /// Parse a scene light type token (`"RectLight"`, `"rectLight"`, ...).
    pub fn from_token(token: &str) -> Option<LightKind> {
        match token.to_ascii_lowercase().as_str() {
            "rectlight" => Some(LightKind::Rect),
            "disklight" => Some(LightKind::Disk),
            "spherelight" => Some(LightKind::Sphere),
            "cylinderlight" => Some(LightKind::Cylinder),
            "domelight" => Some(LightKind::Dome),
            _ => None,
        }
    }
}

impl LightShape {
    /// Build the shape for a light description.
    pub fn from_desc(desc: &LightDesc) -> LightShape {
        match LightKind::from_token(&desc.kind) {
            Some(LightKind::Rect) => LightShape::Rect {
                width: desc.width,
                height: desc.height,
            },
            Some(LightKind::Disk) => LightShape::Disk {
                radius: desc.radius,
            },
            Some(LightKind::Sphere) => LightShape::Sphere {
                radius: desc.radius,
            },
            Some(LightKind::Cylinder) => LightShape::Cylinder {
                radius: desc.radius,
                length: desc.length,
            },
            Some(LightKind::Dome) => LightShape::Dome,
            None => {
                log::warn!("Unsupported light type '{}'; it will not illuminate", desc.kind);
                LightShape::Unknown
            }
        }
    }

    /// True for shapes with a finite surface that can be sampled by area.
    pub fn is_area(&self) -> bool {
        match self {
            LightShape::Rect { .. }
            | LightShape::Disk { .. }
            | LightShape::Sphere { .. }
            | LightShape::Cylinder { .. } => true,
            LightShape::Dome | LightShape::Unknown => false,
        }
    }
}

/// Directional shaping of emitted radiance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightShaping {
    /// Exponent on the cosine to the emission axis
    pub focus: f32,
    /// Color reached away from the emission axis as focus increases
    pub focus_tint: Vec3,
    /// Half angle of the emission cone in degrees (90 = unshaped)
    pub cone_angle: f32,
    /// Fraction of the cone over which emission fades out
    pub cone_softness: f32,
}

impl Default for LightShaping {
    fn default() -> Self {
        Self {
            focus: 0.0,
            focus_tint: Vec3::ZERO,
            cone_angle: 90.0,
            cone_softness: 0.0,
        }
    }
}

/// Host-side description of a light, as delivered by scene sync.
#[derive(Debug, Clone)]
pub struct LightDesc {
    /// Light type token, e.g. `"RectLight"`
    pub kind: String,
    /// Light-to-world transform
    pub transform: Mat4,
    pub width: f32,
    pub height: f32,
    pub radius: f32,
    pub length: f32,
    pub color: Vec3,
    pub intensity: f32,
    pub exposure: f32,
    pub enable_color_temperature: bool,
    /// Kelvin
    pub color_temperature: f32,
    /// Divide emission by the light's area so brightness is scale independent
    pub normalize: bool,
    pub shaping: LightShaping,
    /// Optional texture file modulating emission
    pub texture_file: Option<String>,
    pub visible: bool,
}

impl LightDesc {
    /// Description with UsdLux defaults for the given type token.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            transform: Mat4::IDENTITY,
            width: 1.0,
            height: 1.0,
            radius: 0.5,
            length: 1.0,
            color: Vec3::ONE,
            intensity: 1.0,
            exposure: 0.0,
            enable_color_temperature: false,
            color_temperature: 6500.0,
            normalize: false,
            shaping: LightShaping::default(),
            texture_file: None,
            visible: true,
        }
    }

    pub fn rect(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            ..Self::new("RectLight")
        }
    }

    pub fn disk(radius: f32) -> Self {
        Self {
            radius,
            ..Self::new("DiskLight")
        }
    }

    pub fn sphere(radius: f32) -> Self {
        Self {
            radius,
            ..Self::new("SphereLight")
        }
    }

    pub fn cylinder(radius: f32, length: f32) -> Self {
        Self {
            radius,
            length,
            ..Self::new("CylinderLight")
        }
    }

    pub fn dome() -> Self {
        Self::new("DomeLight")
    }

    /// Set the light-to-world transform.
    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    /// Set color, intensity and exposure.
    pub fn with_emission(mut self, color: Vec3, intensity: f32, exposure: f32) -> Self {
        self.color = color;
        self.intensity = intensity;
        self.exposure = exposure;
        self
    }

    /// Enable black-body tinting at the given temperature in Kelvin.
    pub fn with_color_temperature(mut self, kelvin: f32) -> Self {
        self.enable_color_temperature = true;
        self.color_temperature = kelvin;
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn with_shaping(mut self, shaping: LightShaping) -> Self {
        self.shaping = shaping;
        self
    }

    pub fn with_texture(mut self, path: impl Into<String>) -> Self {
        self.texture_file = Some(path.into());
        self
    }
}

/// A light ready for sampling.
#[derive(Debug, Clone)]
pub struct Light {
    pub shape: LightShape,
    pub light_to_world: Mat4,
    pub world_to_light: Mat4,
    pub color: Vec3,
    pub intensity: f32,
    pub exposure: f32,
    pub enable_color_temperature: bool,
    pub color_temperature: f32,
    pub normalize: bool,
    pub shaping: LightShaping,
    pub texture: Option<Arc<LightTexture>>,
    pub visible: bool,
}

impl Light {
    /// Build a light from its description, loading any texture through `textures`.
    pub fn from_desc(desc: &LightDesc, textures: &mut TextureCache) -> Arc<Light> {
        let mut light = Light {
            shape: LightShape::Unknown,
            light_to_world: Mat4::IDENTITY,
            world_to_light: Mat4::IDENTITY,
            color: Vec3::ONE,
            intensity: 1.0,
            exposure: 0.0,
            enable_color_temperature: false,
            color_temperature: 6500.0,
            normalize: false,
            shaping: LightShaping::default(),
            texture: None,
            visible: true,
        };
        light.sync(desc, textures);
        Arc::new(light)
    }

    /// Pull every parameter from `desc`.
    pub fn sync(&mut self, desc: &LightDesc, textures: &mut TextureCache) {
        self.shape = LightShape::from_desc(desc);
        self.light_to_world = desc.transform;
        self.world_to_light = desc.transform.inverse();
        self.color = desc.color;
        self.intensity = desc.intensity;
        self.exposure = desc.exposure;
        self.enable_color_temperature = desc.enable_color_temperature;
        self.color_temperature = desc.color_temperature;
        self.normalize = desc.normalize;
        self.shaping = desc.shaping;
        self.texture = desc
            .texture_file
            .as_deref()
            .filter(|path| !path.is_empty())
            .map(|path| textures.load_or_black(path));
        self.visible = desc.visible;
    }

    /// World-space direction of the light's local -Z (emission) axis.
    pub fn emission_axis(&self) -> Vec3 {
        self.light_to_world
            .transform_vector3(Vec3::NEG_Z)
            .normalize_or_zero()
    }
}
