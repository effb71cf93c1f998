//! Warps from the unit square onto sampling domains, plus small scalar helpers.
//!
//! All warps take two uniform numbers in `[0, 1]` and are area preserving
//! (or cosine weighted where noted), so their pdfs are constant on the domain.

use std::f32::consts::{FRAC_PI_4, PI, TAU};

use glam::{Mat3, Vec2, Vec3};

/// Shirley-Chiu concentric mapping of the unit square onto the unit disk.
pub fn concentric_disk(u1: f32, u2: f32) -> Vec2 {
    let a = 2.0 * u1 - 1.0;
    let b = 2.0 * u2 - 1.0;

    if a == 0.0 && b == 0.0 {
        return Vec2::ZERO;
    }

    let (r, phi) = if a.abs() > b.abs() {
        (a, FRAC_PI_4 * (b / a))
    } else {
        (b, 0.5 * PI - FRAC_PI_4 * (a / b))
    };

    Vec2::new(r * phi.cos(), r * phi.sin())
}

/// Uniform direction on the unit sphere.
pub fn uniform_sphere(u1: f32, u2: f32) -> Vec3 {
    let z = 1.0 - 2.0 * u1;
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = TAU * u2;
    Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

/// Cosine-weighted direction on the +Z hemisphere (pdf = cos(theta) / pi).
pub fn cosine_hemisphere(u1: f32, u2: f32) -> Vec3 {
    let phi = TAU * u1;
    let r = (1.0 - u2).max(0.0).sqrt();
    Vec3::new(phi.cos() * r, phi.sin() * r, u2.sqrt())
}

/// Orthonormal frame whose third column is `n`.
///
/// Multiplying a local +Z-up direction by the result takes it to the
/// hemisphere around `n`. Branchless construction from Duff et al. 2017.
pub fn orthonormal_basis(n: Vec3) -> Mat3 {
    let sign = 1.0_f32.copysign(n.z);
    let a = -1.0 / (sign + n.z);
    let b = n.x * n.y * a;
    let tangent = Vec3::new(1.0 + sign * n.x * n.x * a, sign * b, -sign * n.x);
    let bitangent = Vec3::new(b, sign + n.y * n.y * a, -n.y);
    Mat3::from_cols(tangent, bitangent, n)
}

/// Hermite smoothstep of `x` between `edge0` and `edge1`.
///
/// Degenerates to a hard step when the edges coincide.
pub fn smoothstep(x: f32, edge0: f32, edge1: f32) -> f32 {
    if edge0 == edge1 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Linear interpolation from `a` (t = 0) to `b` (t = 1).
#[inline]
pub fn lerp(t: f32, a: f32, b: f32) -> f32 {
    a + (b - a) * t
}

/// Integer hash of `n` mixed with `seed`. Stable across platforms and
/// toolchains, so it can seed reproducible random streams.
#[inline]
pub fn hash_u64(n: u64, seed: u64) -> u64 {
    let mut hash = n;
    for _ in 0..4 {
        hash = hash.wrapping_mul(32416190071 * 314604959);
        hash ^= hash.wrapping_shr(32);
        hash = hash.wrapping_add(seed);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concentric_disk_stays_in_disk() {
        for i in 0..=16 {
            for j in 0..=16 {
                let p = concentric_disk(i as f32 / 16.0, j as f32 / 16.0);
                assert!(p.length() <= 1.0 + 1e-5, "{:?} outside unit disk", p);
            }
        }
        assert_eq!(concentric_disk(0.5, 0.5), Vec2::ZERO);
        // Corners map onto the rim
        assert!((concentric_disk(1.0, 1.0).length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_uniform_sphere_unit_length() {
        for i in 0..=8 {
            for j in 0..=8 {
                let d = uniform_sphere(i as f32 / 8.0, j as f32 / 8.0);
                assert!((d.length() - 1.0).abs() < 1e-5);
            }
        }
        assert!((uniform_sphere(0.0, 0.3) - Vec3::Z).length() < 1e-5);
        assert!((uniform_sphere(1.0, 0.3) + Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn test_cosine_hemisphere_upper() {
        for i in 0..8 {
            for j in 0..8 {
                let d = cosine_hemisphere(i as f32 / 8.0, j as f32 / 8.0);
                assert!(d.z >= 0.0);
                assert!((d.length() - 1.0).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_orthonormal_basis() {
        let normals = [
            Vec3::Z,
            -Vec3::Z,
            Vec3::X,
            Vec3::new(1.0, 2.0, -3.0).normalize(),
        ];
        for n in normals {
            let m = orthonormal_basis(n);
            assert!((m.z_axis - n).length() < 1e-6);
            assert!(m.x_axis.dot(n).abs() < 1e-5);
            assert!(m.y_axis.dot(n).abs() < 1e-5);
            assert!(m.x_axis.dot(m.y_axis).abs() < 1e-5);
            assert!(((m * Vec3::Z) - n).length() < 1e-5);
        }
    }

    #[test]
    fn test_smoothstep() {
        assert_eq!(smoothstep(-1.0, 0.0, 1.0), 0.0);
        assert_eq!(smoothstep(2.0, 0.0, 1.0), 1.0);
        assert!((smoothstep(0.5, 0.0, 1.0) - 0.5).abs() < 1e-6);

        // Coincident edges act as a step
        assert_eq!(smoothstep(0.2, 0.5, 0.5), 0.0);
        assert_eq!(smoothstep(0.5, 0.5, 0.5), 1.0);
    }

    #[test]
    fn test_lerp() {
        assert_eq!(lerp(0.0, -2.0, 2.0), -2.0);
        assert_eq!(lerp(1.0, -2.0, 2.0), 2.0);
        assert_eq!(lerp(0.5, -2.0, 2.0), 0.0);
    }

    #[test]
    fn test_hash_u64() {
        assert_eq!(hash_u64(7, 3), hash_u64(7, 3));
        assert_ne!(hash_u64(7, 3), hash_u64(8, 3));
        assert_ne!(hash_u64(7, 3), hash_u64(7, 4));
        // Pinned so fixed-seed renders stay reproducible
        assert_eq!(hash_u64(7, 3), 14289092710646259807);
    }
}
