//! Camera ray generation from host view and projection matrices.

use ember_math::{Mat4, Mat4Ext, Ray, Vec2, Vec3};

use crate::tile::DataWindow;

/// Camera described by the host's view and projection matrices.
///
/// View is world-to-eye, projection is eye-to-clip with OpenGL depth
/// conventions (near plane at NDC z = -1). Inverses are cached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    view: Mat4,
    projection: Mat4,
    inverse_view: Mat4,
    inverse_projection: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY)
    }
}

impl Camera {
    pub fn new(view: Mat4, projection: Mat4) -> Self {
        Self {
            view,
            projection,
            inverse_view: view.inverse(),
            inverse_projection: projection.inverse(),
        }
    }

    pub fn is_orthographic(&self) -> bool {
        self.projection.is_orthographic()
    }

    /// World-space ray through pixel `(x, y)` of `window`, offset by
    /// `jitter` in `[0, 1)^2` (0.5 is the pixel center).
    pub fn generate_ray(&self, x: u32, y: u32, jitter: Vec2, window: &DataWindow) -> Ray {
        let width = window.width.max(1) as f32;
        let height = window.height.max(1) as f32;

        // NDC is y-up; the data window is y-down
        let ndc = Vec2::new(
            2.0 * ((x as f32 + jitter.x - window.x as f32) / width) - 1.0,
            -(2.0 * ((y as f32 + jitter.y - window.y as f32) / height) - 1.0),
        );
        let near = self
            .inverse_projection
            .project_point3(Vec3::new(ndc.x, ndc.y, -1.0));

        let eye_ray = if self.is_orthographic() {
            Ray::new(Vec3::new(near.x, near.y, 0.0), Vec3::NEG_Z)
        } else {
            Ray::new(Vec3::ZERO, near)
        };

        eye_ray.transformed(&self.inverse_view)
    }

    /// Depth of a world-space point through view and projection, in [0, 1].
    pub fn depth(&self, p_world: Vec3) -> f32 {
        let clip = self
            .projection
            .project_point3(self.view.transform_point3(p_world));
        (clip.z + 1.0) * 0.5
    }

    /// World-space normal expressed in eye space.
    pub fn normal_to_eye(&self, n_world: Vec3) -> Vec3 {
        self.view.transform_vector3(n_world).normalize_or_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    fn ortho_camera() -> Camera {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let projection = Mat4::orthographic_rh_gl(-1.0, 1.0, -1.0, 1.0, 0.1, 100.0);
        Camera::new(view, projection)
    }

    fn perspective_camera() -> Camera {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let projection = Mat4::perspective_rh_gl(60f32.to_radians(), 1.0, 0.1, 100.0);
        Camera::new(view, projection)
    }

    #[test]
    fn test_orthographic_rays_are_parallel() {
        let camera = ortho_camera();
        let window = DataWindow::full(2, 2);
        let center = Vec2::splat(0.5);

        let a = camera.generate_ray(0, 0, center, &window);
        let b = camera.generate_ray(1, 1, center, &window);

        assert!((a.direction() - Vec3::NEG_Z).length() < EPS);
        assert!((b.direction() - Vec3::NEG_Z).length() < EPS);
        // Pixel (0, 0) is top-left
        assert!((a.origin() - Vec3::new(-0.5, 0.5, 5.0)).length() < EPS);
        assert!((b.origin() - Vec3::new(0.5, -0.5, 5.0)).length() < EPS);
    }

    #[test]
    fn test_perspective_rays_leave_the_eye() {
        let camera = perspective_camera();
        let window = DataWindow::full(4, 4);

        let corner = camera.generate_ray(0, 0, Vec2::ZERO, &window);
        let middle = camera.generate_ray(2, 2, Vec2::ZERO, &window);

        assert!((corner.origin() - Vec3::new(0.0, 0.0, 5.0)).length() < EPS);
        assert!((middle.direction() - Vec3::NEG_Z).length() < EPS);
        assert!(corner.direction().x < 0.0 && corner.direction().y > 0.0);
        assert!((corner.direction().length() - 1.0).abs() < EPS);
    }

    #[test]
    fn test_data_window_offset() {
        let camera = ortho_camera();
        let window = DataWindow::new(10, 20, 2, 2);
        let offset = camera.generate_ray(10, 20, Vec2::splat(0.5), &window);
        let origin = camera.generate_ray(0, 0, Vec2::splat(0.5), &DataWindow::full(2, 2));
        assert!((offset.origin() - origin.origin()).length() < EPS);
    }

    #[test]
    fn test_depth_range() {
        let camera = perspective_camera();
        let near = camera.depth(Vec3::new(0.0, 0.0, 4.9));
        let far = camera.depth(Vec3::new(0.0, 0.0, -95.0));
        let mid = camera.depth(Vec3::ZERO);

        assert!(near.abs() < 1e-3);
        assert!((far - 1.0).abs() < 1e-3);
        assert!(mid > near && mid < far);
    }

    #[test]
    fn test_normal_to_eye() {
        let view = Mat4::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let camera = Camera::new(view, Mat4::IDENTITY);
        let n = camera.normal_to_eye(Vec3::X);
        assert!((n - Vec3::NEG_Z).length() < EPS);
    }
}
