//! Surface shading: direct lighting from registered lights, or a camera
//! light modulated by ambient occlusion when the scene has none.

use std::f32::consts::FRAC_1_PI;

use ember_core::{
    GeometryProvider, Hit, LightTable, RayMask, COLOR_ATTRIBUTE, NORMAL_ATTRIBUTE,
};
use ember_math::{
    cosine_hemisphere, orthonormal_basis, Interval, Mat4Ext, Ray, Vec2, Vec3, Vec4,
};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::lighting::sample_light;

/// Offset along shadow rays that keeps them from hitting their own surface.
pub const SHADOW_RAY_EPSILON: f32 = 1e-3;

/// Albedo used for unlit (ambient occlusion) shading without scene colors.
const UNLIT_ALBEDO: f32 = 0.5;

/// Per-render shading parameters shared by all tiles.
pub struct ShadingContext<'a> {
    pub scene: &'a dyn GeometryProvider,
    pub lights: &'a LightTable,
    pub ambient_occlusion_samples: u32,
    pub camera_light_intensity: f32,
    pub use_scene_colors: bool,
}

impl ShadingContext<'_> {
    /// RGBA color seen along `ray` at `hit`. Alpha is always 1 and negative
    /// components are clamped to zero.
    pub fn shade<R: Rng + ?Sized>(&self, ray: &Ray, hit: &Hit<'_>, rng: &mut R) -> Vec4 {
        let normal = shading_normal(hit, ray.direction());
        let scene_color = if self.use_scene_colors {
            hit.context
                .attribute(COLOR_ATTRIBUTE)
                .and_then(|color| color.sample_vec3(hit.prim_index, hit.u, hit.v))
        } else {
            None
        };

        let has_lights = self.lights.values().any(|light| light.visible);
        let color = if has_lights {
            let albedo = scene_color.unwrap_or(Vec3::ONE);
            self.direct_lighting(hit.position, normal, albedo, rng)
        } else {
            let albedo = scene_color.unwrap_or(Vec3::splat(UNLIT_ALBEDO));
            let diffuse = (-ray.direction()).dot(normal).abs() * self.camera_light_intensity;
            let ao = ambient_occlusion(
                self.scene,
                hit.position,
                normal,
                self.ambient_occlusion_samples,
                rng,
            );
            albedo * diffuse * ao
        };

        color.max(Vec3::ZERO).extend(1.0)
    }

    /// One sample per visible light, shadowed by an occlusion ray.
    pub fn direct_lighting<R: Rng + ?Sized>(
        &self,
        p: Vec3,
        n: Vec3,
        albedo: Vec3,
        rng: &mut R,
    ) -> Vec3 {
        let mut total = Vec3::ZERO;

        for light in self.lights.values() {
            if !light.visible {
                continue;
            }
            let (u1, u2) = (rng.gen::<f32>(), rng.gen::<f32>());
            let Some(sample) = sample_light(light, p, n, u1, u2) else {
                continue;
            };

            let cos_theta = sample.w_i.dot(n);
            if cos_theta <= 0.0 || sample.li == Vec3::ZERO {
                continue;
            }

            let t_max = if sample.dist.is_finite() {
                sample.dist * 0.99
            } else {
                f32::INFINITY
            };
            let shadow = Ray::new(p, sample.w_i);
            let t_range = Interval::new(SHADOW_RAY_EPSILON, t_max);
            if self.scene.trace_occlusion(&shadow, t_range, RayMask::SHADOW) {
                continue;
            }

            total += sample.li * cos_theta * FRAC_1_PI * sample.inv_pdf_w;
        }

        albedo * total
    }
}

/// World-space shading normal at a hit, facing against `ray_dir`.
///
/// Uses the interpolated `normals` attribute when present, else the
/// geometric normal.
pub fn shading_normal(hit: &Hit<'_>, ray_dir: Vec3) -> Vec3 {
    let n = hit
        .context
        .attribute(NORMAL_ATTRIBUTE)
        .and_then(|normals| normals.sample_vec3(hit.prim_index, hit.u, hit.v))
        .map(|n| hit.context.object_to_world().transform_normal(n))
        .filter(|n| *n != Vec3::ZERO)
        .unwrap_or_else(|| hit.geometric_normal.normalize_or_zero());

    if n.dot(ray_dir) > 0.0 {
        -n
    } else {
        n
    }
}

/// Fraction of the cosine-weighted hemisphere around `n` that is unoccluded.
///
/// Returns 1 when `samples` is zero. Samples are stratified with a
/// Latin hypercube so they spread evenly over the hemisphere.
pub fn ambient_occlusion<R: Rng + ?Sized>(
    scene: &dyn GeometryProvider,
    p: Vec3,
    n: Vec3,
    samples: u32,
    rng: &mut R,
) -> f32 {
    if samples == 0 {
        return 1.0;
    }

    let count = samples as usize;
    let strata = samples as f32;
    let mut points = vec![Vec2::ZERO; count];
    for (i, point) in points.iter_mut().enumerate() {
        point.x = (i as f32 + rng.gen::<f32>()) / strata;
    }
    points.shuffle(rng);
    for (i, point) in points.iter_mut().enumerate() {
        point.y = (i as f32 + rng.gen::<f32>()) / strata;
    }

    let basis = orthonormal_basis(n);
    let mut unoccluded = 0.0;
    for point in &points {
        let dir = basis * cosine_hemisphere(point.x, point.y);
        let ray = Ray::new(p, dir);
        let t_range = Interval::new(SHADOW_RAY_EPSILON, f32::INFINITY);
        if !scene.trace_occlusion(&ray, t_range, RayMask::SHADOW) {
            unoccluded += dir.dot(n);
        }
    }

    unoccluded / strata
}
