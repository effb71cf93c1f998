//! Closed-form area sampling of light shapes.
//!
//! Each sampler maps two uniform numbers onto the light's surface and
//! reports the world-space point and normal, a parametric coordinate for
//! texture lookup, and the surface area (the inverse of the uniform area pdf).
//! Areas are measured after the light's transform, so scale changes them
//! and rotation does not.

use std::f32::consts::{PI, TAU};

use ember_core::{Light, LightShape};
use ember_math::{concentric_disk, lerp, uniform_sphere, Mat4, Mat4Ext, Vec2, Vec3};

/// Exponent of the Knud Thomsen ellipsoid surface area approximation.
const ELLIPSOID_P: f32 = 1.6075;

/// A point sampled on a light's surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeSample {
    pub p_world: Vec3,
    pub n_world: Vec3,
    pub uv: Vec2,
    /// Inverse of the area-measure pdf, i.e. the surface area
    pub inv_pdf_a: f32,
}

/// Sample the shape of `light`. Returns `None` for dome and unknown lights,
/// which have no finite surface.
pub fn sample_area_light(light: &Light, u1: f32, u2: f32) -> Option<ShapeSample> {
    let xf = &light.light_to_world;
    match light.shape {
        LightShape::Rect { width, height } => Some(sample_rect(xf, width, height, u1, u2)),
        LightShape::Disk { radius } => Some(sample_disk(xf, radius, u1, u2)),
        LightShape::Sphere { radius } => Some(sample_sphere(xf, radius, u1, u2)),
        LightShape::Cylinder { radius, length } => {
            Some(sample_cylinder(xf, radius, length, u1, u2))
        }
        LightShape::Dome | LightShape::Unknown => None,
    }
}

/// Uniform sample of the rectangle `[-w/2, w/2] x [-h/2, h/2]`, facing -Z.
pub fn sample_rect(xf: &Mat4, width: f32, height: f32, u1: f32, u2: f32) -> ShapeSample {
    let p_light = Vec3::new((u1 - 0.5) * width, (u2 - 0.5) * height, 0.0);

    let edge_u = xf.transform_vector3(Vec3::new(width, 0.0, 0.0));
    let edge_v = xf.transform_vector3(Vec3::new(0.0, height, 0.0));
    let area = edge_u.cross(edge_v).length();

    ShapeSample {
        p_world: xf.transform_point3(p_light),
        n_world: xf.transform_normal(Vec3::NEG_Z),
        uv: Vec2::new(u1, u2),
        inv_pdf_a: area,
    }
}

/// Uniform sample of a disk in the XY plane, facing -Z.
pub fn sample_disk(xf: &Mat4, radius: f32, u1: f32, u2: f32) -> ShapeSample {
    let d = concentric_disk(u1, u2) * radius;
    let p_light = Vec3::new(d.x, d.y, 0.0);

    let a = xf.transformed_length(Vec3::new(radius, 0.0, 0.0));
    let b = xf.transformed_length(Vec3::new(0.0, radius, 0.0));

    ShapeSample {
        p_world: xf.transform_point3(p_light),
        n_world: xf.transform_normal(Vec3::NEG_Z),
        uv: Vec2::new(u1, u2),
        inv_pdf_a: PI * a * b,
    }
}

/// Uniform sample of a sphere; the normal is the radial direction.
pub fn sample_sphere(xf: &Mat4, radius: f32, u1: f32, u2: f32) -> ShapeSample {
    let n_light = uniform_sphere(u1, u2);
    let p_light = n_light * radius;

    let a = xf.transformed_length(Vec3::new(radius, 0.0, 0.0));
    let b = xf.transformed_length(Vec3::new(0.0, radius, 0.0));
    let c = xf.transformed_length(Vec3::new(0.0, 0.0, radius));
    let mean = ((a * b).powf(ELLIPSOID_P) + (a * c).powf(ELLIPSOID_P) + (b * c).powf(ELLIPSOID_P))
        / 3.0;
    let area = 4.0 * PI * mean.powf(1.0 / ELLIPSOID_P);

    ShapeSample {
        p_world: xf.transform_point3(p_light),
        n_world: xf.transform_normal(n_light),
        uv: Vec2::new(u1, u2),
        inv_pdf_a: area,
    }
}

/// Uniform sample of the lateral surface of a cylinder along local X.
pub fn sample_cylinder(xf: &Mat4, radius: f32, length: f32, u1: f32, u2: f32) -> ShapeSample {
    let x = lerp(u1, -0.5 * length, 0.5 * length);
    let phi = TAU * u2;
    let n_light = Vec3::new(0.0, phi.cos(), phi.sin());
    let p_light = Vec3::new(x, radius * n_light.y, radius * n_light.z);

    // Ramanujan's approximation of the (possibly elliptical) cross-section perimeter
    let a = xf.transformed_length(Vec3::new(0.0, radius, 0.0));
    let b = xf.transformed_length(Vec3::new(0.0, 0.0, radius));
    let c = xf.transformed_length(Vec3::new(length, 0.0, 0.0));
    let perimeter = PI * (3.0 * (a + b) - ((3.0 * a + b) * (a + 3.0 * b)).sqrt());

    ShapeSample {
        p_world: xf.transform_point3(p_light),
        n_world: xf.transform_normal(n_light),
        uv: Vec2::new(u1, u2),
        inv_pdf_a: perimeter * c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::{LightDesc, TextureCache};

    const EPS: f32 = 1e-4;

    fn sample_grid() -> Vec<(f32, f32)> {
        let mut samples = Vec::new();
        for i in 0..8 {
            for j in 0..8 {
                let u1 = i as f32 / 8.0 + 0.03;
                let u2 = j as f32 / 8.0 + 0.07;
                samples.push((u1, u2));
                samples.push((1.0 - u1, 1.0 - u2));
            }
        }
        samples.push((0.0, 0.0));
        samples.push((1.0, 1.0));
        samples
    }

    fn placed() -> Mat4 {
        Mat4::from_translation(Vec3::new(1.0, 2.0, -3.0))
            * Mat4::from_rotation_y(0.7)
            * Mat4::from_rotation_x(-0.3)
            * Mat4::from_scale(Vec3::new(2.0, 0.5, 1.5))
    }

    fn to_local(xf: &Mat4, p: Vec3) -> Vec3 {
        xf.inverse().transform_point3(p)
    }

    #[test]
    fn test_rect_samples_in_bounds() {
        let xf = placed();
        for (u1, u2) in sample_grid() {
            let s = sample_rect(&xf, 2.0, 3.0, u1, u2);
            let p = to_local(&xf, s.p_world);
            assert!(p.x.abs() <= 1.0 + EPS && p.y.abs() <= 1.5 + EPS, "{:?}", p);
            assert!(p.z.abs() < EPS);
            assert!((s.n_world.length() - 1.0).abs() < EPS);
        }
    }

    #[test]
    fn test_disk_samples_in_bounds() {
        let xf = placed();
        for (u1, u2) in sample_grid() {
            let s = sample_disk(&xf, 0.75, u1, u2);
            let p = to_local(&xf, s.p_world);
            assert!(p.truncate().length() <= 0.75 + EPS, "{:?}", p);
            assert!(p.z.abs() < EPS);
        }
    }

    #[test]
    fn test_sphere_samples_on_surface() {
        let xf = placed();
        for (u1, u2) in sample_grid() {
            let s = sample_sphere(&xf, 0.5, u1, u2);
            let p = to_local(&xf, s.p_world);
            assert!((p.length() - 0.5).abs() < EPS, "{:?}", p);
        }

        // Unscaled: the normal points away from the center
        let s = sample_sphere(&Mat4::IDENTITY, 2.0, 0.3, 0.6);
        assert!((s.n_world - s.p_world / 2.0).length() < EPS);
    }

    #[test]
    fn test_cylinder_samples_on_surface() {
        let xf = placed();
        for (u1, u2) in sample_grid() {
            let s = sample_cylinder(&xf, 0.25, 4.0, u1, u2);
            let p = to_local(&xf, s.p_world);
            assert!(p.x.abs() <= 2.0 + EPS, "{:?}", p);
            assert!((Vec2::new(p.y, p.z).length() - 0.25).abs() < EPS, "{:?}", p);
        }

        let s = sample_cylinder(&Mat4::IDENTITY, 1.0, 1.0, 0.5, 0.25);
        assert!((s.n_world - Vec3::Z).length() < EPS);
    }

    #[test]
    fn test_rect_normal_faces_neg_z() {
        let s = sample_rect(&Mat4::IDENTITY, 1.0, 1.0, 0.5, 0.5);
        assert_eq!(s.n_world, Vec3::NEG_Z);
        assert_eq!(s.p_world, Vec3::ZERO);
        assert_eq!(s.uv, Vec2::new(0.5, 0.5));
    }

    #[test]
    fn test_areas_of_unscaled_shapes() {
        let id = Mat4::IDENTITY;
        assert!((sample_rect(&id, 2.0, 3.0, 0.5, 0.5).inv_pdf_a - 6.0).abs() < EPS);
        assert!((sample_disk(&id, 1.0, 0.5, 0.5).inv_pdf_a - PI).abs() < EPS);
        assert!((sample_sphere(&id, 2.0, 0.5, 0.5).inv_pdf_a - 16.0 * PI).abs() < 1e-3);
        assert!((sample_cylinder(&id, 1.0, 3.0, 0.5, 0.5).inv_pdf_a - 6.0 * PI).abs() < 1e-3);
    }

    #[test]
    fn test_area_scales_with_transform() {
        let xf = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        assert!((sample_rect(&xf, 2.0, 3.0, 0.1, 0.9).inv_pdf_a - 12.0).abs() < EPS);
        assert!((sample_disk(&xf, 1.0, 0.1, 0.9).inv_pdf_a - 2.0 * PI).abs() < EPS);
    }

    #[test]
    fn test_area_invariant_to_rotation() {
        let scale = Mat4::from_scale(Vec3::new(2.0, 0.5, 1.5));
        let rotations = [
            Mat4::from_rotation_x(1.1),
            Mat4::from_rotation_y(-2.3),
            Mat4::from_rotation_z(0.4) * Mat4::from_rotation_x(0.9),
        ];
        let areas = |xf: &Mat4| {
            [
                sample_rect(xf, 2.0, 3.0, 0.2, 0.4).inv_pdf_a,
                sample_disk(xf, 0.5, 0.2, 0.4).inv_pdf_a,
                sample_sphere(xf, 0.5, 0.2, 0.4).inv_pdf_a,
                sample_cylinder(xf, 0.5, 2.0, 0.2, 0.4).inv_pdf_a,
            ]
        };

        let reference = areas(&scale);
        for rotation in rotations {
            let xf = Mat4::from_translation(Vec3::new(5.0, -1.0, 2.0)) * rotation * scale;
            for (a, b) in areas(&xf).iter().zip(reference.iter()) {
                assert!((a - b).abs() < 1e-3 * b, "{} != {}", a, b);
            }
        }
    }

    #[test]
    fn test_dispatch_by_shape() {
        let mut textures = TextureCache::new();
        let rect = Light::from_desc(&LightDesc::rect(1.0, 1.0), &mut textures);
        let dome = Light::from_desc(&LightDesc::dome(), &mut textures);
        let unknown = Light::from_desc(&LightDesc::new("PortalLight"), &mut textures);

        assert!(sample_area_light(&rect, 0.5, 0.5).is_some());
        assert!(sample_area_light(&dome, 0.5, 0.5).is_none());
        assert!(sample_area_light(&unknown, 0.5, 0.5).is_none());
    }
}
