//! Lighting evaluation: turns a point on a light into incident radiance.
//!
//! Area lights are sampled by area and converted to solid angle at the
//! receiver. Dome lights are sampled with a cosine-weighted hemisphere
//! around the receiving normal.

use std::f32::consts::PI;

use ember_core::{Light, LightShape, LightShaping};
use ember_math::{cosine_hemisphere, orthonormal_basis, smoothstep, Vec3};

use crate::light_sampler::{sample_area_light, ShapeSample};

/// Incident radiance arriving at a receiving point from one light sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSample {
    /// Radiance arriving along `w_i` (zero if the light faces away)
    pub li: Vec3,
    /// Unit direction from the receiver toward the light
    pub w_i: Vec3,
    /// Distance to the sampled point; infinite for dome lights
    pub dist: f32,
    /// Inverse of the solid-angle pdf of `w_i`
    pub inv_pdf_w: f32,
}

impl LightSample {
    fn black(w_i: Vec3, dist: f32) -> Self {
        Self {
            li: Vec3::ZERO,
            w_i,
            dist,
            inv_pdf_w: 0.0,
        }
    }
}

/// Draw one incident radiance sample from `light` for a receiver at `p`
/// with unit normal `n`. Returns `None` for lights that cannot be sampled.
pub fn sample_light(light: &Light, p: Vec3, n: Vec3, u1: f32, u2: f32) -> Option<LightSample> {
    match light.shape {
        LightShape::Dome => Some(eval_dome_light(light, n, u1, u2)),
        LightShape::Unknown => None,
        _ => sample_area_light(light, u1, u2).map(|ss| eval_area_light(light, &ss, p)),
    }
}

/// Evaluate an area light sample as seen from `p`.
pub fn eval_area_light(light: &Light, ss: &ShapeSample, p: Vec3) -> LightSample {
    let to_light = ss.p_world - p;
    let dist = to_light.length();
    if dist <= 0.0 {
        return LightSample::black(Vec3::ZERO, 0.0);
    }
    let w_i = to_light / dist;

    let cos_theta_off_normal = (-w_i).dot(ss.n_world);
    if cos_theta_off_normal <= 0.0 {
        return LightSample::black(w_i, dist);
    }

    // Area measure to solid angle
    let inv_pdf_w = cos_theta_off_normal / (dist * dist) * ss.inv_pdf_a;

    let mut le = base_radiance(light);
    if let Some(texture) = &light.texture {
        le *= texture.sample(ss.uv.x, ss.uv.y);
    }
    if light.normalize && ss.inv_pdf_a > 0.0 {
        le /= ss.inv_pdf_a;
    }

    let cos_theta_off_z = (-w_i).dot(light.emission_axis());
    le *= eval_shaping(&light.shaping, cos_theta_off_z);

    LightSample {
        li: le,
        w_i,
        dist,
        inv_pdf_w,
    }
}

/// Cosine-sample the hemisphere around `n` and look up the dome's radiance.
pub fn eval_dome_light(light: &Light, n: Vec3, u1: f32, u2: f32) -> LightSample {
    let w_i = orthonormal_basis(n) * cosine_hemisphere(u1, u2);
    let cos_theta = w_i.dot(n);
    if cos_theta <= 0.0 {
        return LightSample::black(w_i, f32::INFINITY);
    }

    let mut le = base_radiance(light);
    if let Some(texture) = &light.texture {
        let dir = light.world_to_light.transform_vector3(w_i).normalize_or_zero();
        le *= texture.sample_direction(dir);
    }

    LightSample {
        li: le,
        w_i,
        dist: f32::INFINITY,
        inv_pdf_w: PI / cos_theta,
    }
}

/// `color * intensity * 2^exposure`, tinted by the black-body color when enabled.
pub fn base_radiance(light: &Light) -> Vec3 {
    let mut le = light.color * light.intensity * light.exposure.exp2();
    if light.enable_color_temperature {
        le *= blackbody_rgb(light.color_temperature);
    }
    le
}

/// Directional falloff for a direction making `cos_theta_off_z` with the
/// emission axis.
///
/// Focus blends toward the tint away from the axis. The cone only cuts
/// off emission when narrowed below a hemisphere, so unshaped sphere and
/// cylinder lights still emit all around.
pub fn eval_shaping(shaping: &LightShaping, cos_theta_off_z: f32) -> Vec3 {
    let focus = cos_theta_off_z.abs().powf(shaping.focus.max(0.0));
    let focus_shaping = shaping.focus_tint + (Vec3::ONE - shaping.focus_tint) * focus;

    if shaping.cone_angle >= 90.0 {
        return focus_shaping;
    }
    let half_angle = shaping.cone_angle.max(0.0).to_radians();
    let cos_cone = half_angle.cos();
    let cos_soft = (half_angle * (1.0 - shaping.cone_softness.clamp(0.0, 1.0))).cos();
    focus_shaping * smoothstep(cos_theta_off_z, cos_cone, cos_soft)
}

/// Linear sRGB color of a black body at `kelvin`, normalized to unit luminance.
///
/// Follows the Planckian locus with the Kim et al. cubic fit; temperatures
/// outside 1667K to 25000K are clamped to that range.
pub fn blackbody_rgb(kelvin: f32) -> Vec3 {
    let t = kelvin.clamp(1667.0, 25000.0);
    let (t2, t3) = (t * t, t * t * t);

    let x = if t < 4000.0 {
        -0.266_123_9e9 / t3 - 0.234_358_9e6 / t2 + 0.877_695_6e3 / t + 0.179_910
    } else {
        -3.025_846_9e9 / t3 + 2.107_037_9e6 / t2 + 0.222_634_7e3 / t + 0.240_390
    };
    let (x2, x3) = (x * x, x * x * x);
    let y = if t < 2222.0 {
        -1.106_381_4 * x3 - 1.348_110_2 * x2 + 2.185_558_3 * x - 0.202_196_83
    } else if t < 4000.0 {
        -0.954_947_6 * x3 - 1.374_185_9 * x2 + 2.091_370_2 * x - 0.167_488_67
    } else {
        3.081_758 * x3 - 5.873_386_7 * x2 + 3.751_13 * x - 0.370_014_83
    };

    // xyY with Y = 1 to XYZ, then to linear sRGB (D65)
    let xyz = Vec3::new(x / y, 1.0, (1.0 - x - y) / y);
    let rgb = Vec3::new(
        3.240_454_2 * xyz.x - 1.537_138_5 * xyz.y - 0.498_531_4 * xyz.z,
        -0.969_266 * xyz.x + 1.876_010_8 * xyz.y + 0.041_556 * xyz.z,
        0.055_643_4 * xyz.x - 0.204_025_9 * xyz.y + 1.057_225_2 * xyz.z,
    )
    .max(Vec3::ZERO);

    let luminance = rgb.dot(Vec3::new(0.2126, 0.7152, 0.0722));
    if luminance > 0.0 {
        rgb / luminance
    } else {
        Vec3::ONE
    }
}
