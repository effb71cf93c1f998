// Transform utilities for Mat4
//
// Extends glam::Mat4 with the handful of operations the renderer needs on
// top of transform_point3/transform_vector3/project_point3.

use glam::{Mat3, Mat4, Vec3};

/// Extension trait for Mat4 to provide additional transform utilities
pub trait Mat4Ext {
    /// Transform a surface normal (inverse transpose of the upper 3x3).
    /// The result is normalized; degenerate matrices yield zero.
    fn transform_normal(&self, normal: Vec3) -> Vec3;

    /// Length of a local-space vector after transformation.
    /// Used to measure how a light's local extents scale into world space.
    fn transformed_length(&self, vector: Vec3) -> f32;

    /// True if this is an orthographic projection matrix.
    ///
    /// Perspective projections put -1 in the bottom-right of the w column
    /// and 0 in the corner; orthographic ones keep the corner at 1.
    fn is_orthographic(&self) -> bool;
}

impl Mat4Ext for Mat4 {
    fn transform_normal(&self, normal: Vec3) -> Vec3 {
        let normal_matrix = Mat3::from_mat4(*self).inverse().transpose();
        (normal_matrix * normal).normalize_or_zero()
    }

    fn transformed_length(&self, vector: Vec3) -> f32 {
        self.transform_vector3(vector).length()
    }

    fn is_orthographic(&self) -> bool {
        self.w_axis.w == 1.0
    }
}
