//! The geometry queries the renderer traces against.
//!
//! The intersection engine itself lives outside this crate. It must answer
//! nearest-hit and occlusion queries from many tile tasks at once.

use std::ops::BitAnd;

use ember_math::{Interval, Mat4, Ray, Vec2, Vec3};

/// Attribute name used for surface albedo.
pub const COLOR_ATTRIBUTE: &str = "displayColor";
/// Attribute name used for smooth shading normals (object space).
pub const NORMAL_ATTRIBUTE: &str = "normals";

/// Which kinds of rays a query is for; geometry may opt out of some.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RayMask(pub u32);

impl RayMask {
    pub const CAMERA: RayMask = RayMask(1 << 0);
    pub const SHADOW: RayMask = RayMask(1 << 1);
    pub const ALL: RayMask = RayMask(u32::MAX);

    /// True if the two masks share a bit.
    pub fn intersects(self, other: RayMask) -> bool {
        (self & other).0 != 0
    }
}

impl BitAnd for RayMask {
    type Output = RayMask;

    fn bitand(self, rhs: RayMask) -> RayMask {
        RayMask(self.0 & rhs.0)
    }
}

/// Interpolated per-vertex, per-face or constant data on a primitive.
///
/// A sampler answers only for the value type it stores; the other
/// accessors return `None`.
pub trait AttributeSampler: Send + Sync {
    fn sample_vec3(&self, prim_index: u32, u: f32, v: f32) -> Option<Vec3>;

    fn sample_vec2(&self, _prim_index: u32, _u: f32, _v: f32) -> Option<Vec2> {
        None
    }

    fn sample_scalar(&self, _prim_index: u32, _u: f32, _v: f32) -> Option<f32> {
        None
    }
}

/// Opaque per-instance data attached to a hit.
pub trait HitContext: Send + Sync {
    /// Scene-level id of the hit prim.
    fn prim_id(&self) -> i32;

    /// Index of the hit instance, or -1 if the prim is not instanced.
    fn instance_id(&self) -> i32 {
        -1
    }

    /// Authored face (element) id for a traced primitive index.
    fn element_id(&self, prim_index: u32) -> i32 {
        prim_index as i32
    }

    /// Object-to-world transform of the hit instance.
    fn object_to_world(&self) -> Mat4 {
        Mat4::IDENTITY
    }

    /// Look up a named attribute.
    fn attribute(&self, name: &str) -> Option<&dyn AttributeSampler>;
}

/// A nearest-hit result.
#[derive(Clone, Copy)]
pub struct Hit<'a> {
    /// Ray parameter of the hit
    pub t: f32,
    /// World-space hit position
    pub position: Vec3,
    /// World-space geometric normal, as authored (not flipped toward the ray)
    pub geometric_normal: Vec3,
    /// Parametric coordinates within the primitive
    pub u: f32,
    pub v: f32,
    /// Index of the traced primitive within its mesh
    pub prim_index: u32,
    pub context: &'a dyn HitContext,
}

/// An intersectable scene.
pub trait GeometryProvider: Send + Sync {
    /// Closest hit within `t_range`, if any.
    fn trace_nearest_hit(&self, ray: &Ray, t_range: Interval, mask: RayMask) -> Option<Hit<'_>>;

    /// True if anything blocks the ray within `t_range`.
    fn trace_occlusion(&self, ray: &Ray, t_range: Interval, mask: RayMask) -> bool;

    /// True if no query can ever hit; lets the renderer converge after one pass.
    fn is_empty(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant(Vec3);

    impl AttributeSampler for Constant {
        fn sample_vec3(&self, _prim_index: u32, _u: f32, _v: f32) -> Option<Vec3> {
            Some(self.0)
        }
    }

    struct Nothing;

    impl GeometryProvider for Nothing {
        fn trace_nearest_hit(&self, _ray: &Ray, _t: Interval, _mask: RayMask) -> Option<Hit<'_>> {
            None
        }

        fn trace_occlusion(&self, _ray: &Ray, _t: Interval, _mask: RayMask) -> bool {
            false
        }
    }

    #[test]
    fn test_ray_mask() {
        assert!(RayMask::ALL.intersects(RayMask::CAMERA));
        assert!(!RayMask::CAMERA.intersects(RayMask::SHADOW));
        assert_eq!(RayMask::ALL & RayMask::SHADOW, RayMask::SHADOW);
    }

    #[test]
    fn test_sampler_defaults() {
        let sampler = Constant(Vec3::ONE);
        assert_eq!(sampler.sample_vec3(0, 0.0, 0.0), Some(Vec3::ONE));
        assert_eq!(sampler.sample_vec2(0, 0.0, 0.0), None);
        assert_eq!(sampler.sample_scalar(0, 0.0, 0.0), None);
    }

    #[test]
    fn test_provider_defaults() {
        let scene = Nothing;
        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        assert!(scene.trace_nearest_hit(&ray, Interval::from_min(0.0), RayMask::CAMERA).is_none());
        assert!(!scene.is_empty());
    }
}
