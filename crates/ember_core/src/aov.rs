//! AOV (arbitrary output variable) descriptors.

use std::fmt;
use std::sync::Arc;

use ember_math::{Vec3, Vec4};

use crate::buffer::OutputBuffer;

/// Prefix marking an AOV that outputs a named primvar.
pub const PRIMVAR_PREFIX: &str = "primvars:";

/// The semantic channel an AOV binding asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AovName {
    Color,
    /// Hit depth through view and projection, remapped to [0, 1]
    Depth,
    /// Ray distance to the hit
    CameraDepth,
    PrimId,
    InstanceId,
    ElementId,
    /// World-space shading normal
    Normal,
    /// Eye-space shading normal
    NormalEye,
    /// An interpolated primvar, by name without the `primvars:` prefix
    Primvar(String),
    /// Anything this renderer cannot produce
    Other(String),
}

impl AovName {
    /// Parse an AOV token such as `"color"`, `"Neye"` or `"primvars:st"`.
    pub fn parse(token: &str) -> AovName {
        match token {
            "color" => AovName::Color,
            "depth" => AovName::Depth,
            "cameraDepth" => AovName::CameraDepth,
            "primId" => AovName::PrimId,
            "instanceId" => AovName::InstanceId,
            "elementId" => AovName::ElementId,
            "normal" => AovName::Normal,
            "Neye" => AovName::NormalEye,
            _ => match token.strip_prefix(PRIMVAR_PREFIX) {
                Some(primvar) if !primvar.is_empty() => AovName::Primvar(primvar.to_string()),
                _ => AovName::Other(token.to_string()),
            },
        }
    }
}

impl fmt::Display for AovName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AovName::Color => write!(f, "color"),
            AovName::Depth => write!(f, "depth"),
            AovName::CameraDepth => write!(f, "cameraDepth"),
            AovName::PrimId => write!(f, "primId"),
            AovName::InstanceId => write!(f, "instanceId"),
            AovName::ElementId => write!(f, "elementId"),
            AovName::Normal => write!(f, "normal"),
            AovName::NormalEye => write!(f, "Neye"),
            AovName::Primvar(name) => write!(f, "{}{}", PRIMVAR_PREFIX, name),
            AovName::Other(name) => write!(f, "{}", name),
        }
    }
}

/// The value a buffer is filled with on clear.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ClearValue {
    /// Do not clear
    #[default]
    None,
    Float(f32),
    Int(i32),
    Vec3(Vec3),
    Vec4(Vec4),
}

impl ClearValue {
    pub fn is_none(&self) -> bool {
        matches!(self, ClearValue::None)
    }

    /// Interpret the clear value as an RGBA color (missing alpha is 1).
    pub fn as_color(&self) -> Vec4 {
        match *self {
            ClearValue::Vec4(c) => c,
            ClearValue::Vec3(c) => c.extend(1.0),
            ClearValue::Float(f) => Vec4::new(f, f, f, 1.0),
            ClearValue::Int(i) => {
                let f = i as f32;
                Vec4::new(f, f, f, 1.0)
            }
            ClearValue::None => Vec4::new(0.0, 0.0, 0.0, 1.0),
        }
    }

    /// Write this value into every pixel of `buffer`, dispatching on type.
    pub fn clear(&self, buffer: &dyn OutputBuffer) {
        match *self {
            ClearValue::None => {}
            ClearValue::Float(f) => buffer.clear_f32(&[f]),
            ClearValue::Int(i) => buffer.clear_i32(&[i]),
            ClearValue::Vec3(v) => buffer.clear_f32(&v.to_array()),
            ClearValue::Vec4(v) => buffer.clear_f32(&v.to_array()),
        }
    }
}

/// One AOV the renderer writes per pixel.
#[derive(Clone)]
pub struct AovBinding {
    /// AOV token, e.g. `"color"` or `"primvars:st"`
    pub name: String,
    pub buffer: Option<Arc<dyn OutputBuffer>>,
    pub clear_value: ClearValue,
}

impl AovBinding {
    pub fn new(
        name: impl Into<String>,
        buffer: Arc<dyn OutputBuffer>,
        clear_value: ClearValue,
    ) -> Self {
        Self {
            name: name.into(),
            buffer: Some(buffer),
            clear_value,
        }
    }

    /// Parsed semantic channel of this binding.
    pub fn aov_name(&self) -> AovName {
        AovName::parse(&self.name)
    }
}

impl fmt::Debug for AovBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AovBinding")
            .field("name", &self.name)
            .field("format", &self.buffer.as_ref().map(|b| b.format()))
            .field("clear_value", &self.clear_value)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Format, RenderBuffer};

    #[test]
    fn test_parse_names() {
        assert_eq!(AovName::parse("color"), AovName::Color);
        assert_eq!(AovName::parse("Neye"), AovName::NormalEye);
        assert_eq!(AovName::parse("cameraDepth"), AovName::CameraDepth);
        assert_eq!(
            AovName::parse("primvars:st"),
            AovName::Primvar("st".to_string())
        );
        assert_eq!(
            AovName::parse("primvars:"),
            AovName::Other("primvars:".to_string())
        );
        assert_eq!(
            AovName::parse("beauty"),
            AovName::Other("beauty".to_string())
        );
    }

    #[test]
    fn test_display_round_trips_tokens() {
        for token in ["color", "depth", "primId", "Neye", "primvars:displayColor"] {
            assert_eq!(AovName::parse(token).to_string(), token);
        }
    }

    #[test]
    fn test_clear_value_as_color() {
        assert_eq!(
            ClearValue::Vec3(Vec3::new(0.1, 0.2, 0.3)).as_color(),
            Vec4::new(0.1, 0.2, 0.3, 1.0)
        );
        assert_eq!(ClearValue::Float(0.5).as_color(), Vec4::new(0.5, 0.5, 0.5, 1.0));
        assert_eq!(ClearValue::None.as_color(), Vec4::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_clear_dispatch() {
        let depth = RenderBuffer::new(2, 2, Format::Float32, false);
        ClearValue::Float(1.0).clear(&depth);
        assert_eq!(depth.read_f32(1, 1), vec![1.0]);

        let ids = RenderBuffer::new(2, 2, Format::Int32, false);
        ClearValue::Int(-1).clear(&ids);
        assert_eq!(ids.read_i32(0, 1), vec![-1]);

        let color = RenderBuffer::new(2, 2, Format::Float32Vec4, false);
        ClearValue::Vec4(Vec4::new(0.0, 0.0, 1.0, 1.0)).clear(&color);
        assert_eq!(color.read_f32(0, 0), vec![0.0, 0.0, 1.0, 1.0]);
    }
}
