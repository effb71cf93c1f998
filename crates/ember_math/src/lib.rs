// Re-export glam for convenience
pub use glam::*;

// Ember math types
mod interval;
mod ray;
mod sampling;
mod transform;

pub use interval::Interval;
pub use ray::Ray;
pub use sampling::{
    concentric_disk, cosine_hemisphere, hash_u64, lerp, orthonormal_basis, smoothstep,
    uniform_sphere,
};
pub use transform::Mat4Ext;
