//! A brute-force triangle mesh scene.
//!
//! `MeshScene` answers nearest-hit and occlusion queries by testing every
//! triangle with the Möller-Trumbore algorithm. It has no acceleration
//! structure and is meant for small scenes, tests and demos; hosts with
//! real scenes plug in their own `GeometryProvider`.

use std::collections::HashMap;
use std::ops::{Add, Mul};
use std::sync::Arc;

use ember_core::{
    AttributeSampler, GeometryProvider, Hit, HitContext, RayMask, COLOR_ATTRIBUTE,
    NORMAL_ATTRIBUTE,
};
use ember_math::{Interval, Mat4, Ray, Vec2, Vec3};

/// How a primvar's values map onto a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// One value for the whole mesh
    Constant,
    /// One value per face (authored element)
    Uniform,
    /// One value per vertex, blended barycentrically
    Vertex,
}

/// Primvar values of one type.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimvarData {
    Vec3(Vec<Vec3>),
    Vec2(Vec<Vec2>),
    Scalar(Vec<f32>),
}

/// A named attribute attached to a mesh.
#[derive(Debug, Clone)]
struct Primvar {
    interpolation: Interpolation,
    data: PrimvarData,
    indices: Arc<[u32]>,
    face_ids: Option<Arc<[i32]>>,
}

impl Primvar {
    fn interpolate<T>(&self, values: &[T], prim_index: u32, u: f32, v: f32) -> Option<T>
    where
        T: Copy + Add<Output = T> + Mul<f32, Output = T>,
    {
        match self.interpolation {
            Interpolation::Constant => values.first().copied(),
            Interpolation::Uniform => {
                let face = match &self.face_ids {
                    Some(ids) => usize::try_from(*ids.get(prim_index as usize)?).ok()?,
                    None => prim_index as usize,
                };
                values.get(face).copied()
            }
            Interpolation::Vertex => {
                let base = prim_index as usize * 3;
                let corner = |i: usize| -> Option<T> {
                    let index = *self.indices.get(base + i)?;
                    values.get(index as usize).copied()
                };
                let w = 1.0 - u - v;
                Some(corner(0)? * w + corner(1)? * u + corner(2)? * v)
            }
        }
    }
}

impl AttributeSampler for Primvar {
    fn sample_vec3(&self, prim_index: u32, u: f32, v: f32) -> Option<Vec3> {
        match &self.data {
            PrimvarData::Vec3(values) => self.interpolate(values, prim_index, u, v),
            _ => None,
        }
    }

    fn sample_vec2(&self, prim_index: u32, u: f32, v: f32) -> Option<Vec2> {
        match &self.data {
            PrimvarData::Vec2(values) => self.interpolate(values, prim_index, u, v),
            _ => None,
        }
    }

    fn sample_scalar(&self, prim_index: u32, u: f32, v: f32) -> Option<f32> {
        match &self.data {
            PrimvarData::Scalar(values) => self.interpolate(values, prim_index, u, v),
            _ => None,
        }
    }
}

/// A triangle mesh with its transform, ids and primvars.
#[derive(Debug, Clone)]
pub struct Mesh {
    /// Object-space vertex positions
    positions: Vec<Vec3>,
    /// Triangle indices (every 3 indices form a triangle)
    indices: Arc<[u32]>,
    object_to_world: Mat4,
    /// World-space positions, kept in sync with the transform
    world_positions: Vec<Vec3>,
    prim_id: i32,
    instance_id: i32,
    /// Authored face for each triangle, when faces were triangulated
    face_ids: Option<Arc<[i32]>>,
    primvars: HashMap<String, Primvar>,
    visibility: RayMask,
}

impl Mesh {
    /// Create a mesh from object-space positions and triangle indices.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        Self {
            world_positions: positions.clone(),
            positions,
            indices: indices.into(),
            object_to_world: Mat4::IDENTITY,
            prim_id: 0,
            instance_id: -1,
            face_ids: None,
            primvars: HashMap::new(),
            visibility: RayMask::ALL,
        }
    }

    /// A `width` x `height` quad in the XY plane facing +Z, as one face of
    /// two triangles.
    pub fn quad(width: f32, height: f32) -> Self {
        let (hw, hh) = (0.5 * width, 0.5 * height);
        let positions = vec![
            Vec3::new(-hw, -hh, 0.0),
            Vec3::new(hw, -hh, 0.0),
            Vec3::new(hw, hh, 0.0),
            Vec3::new(-hw, hh, 0.0),
        ];
        Self::new(positions, vec![0, 1, 2, 0, 2, 3]).with_face_ids(vec![0, 0])
    }

    pub fn with_transform(mut self, object_to_world: Mat4) -> Self {
        self.object_to_world = object_to_world;
        self.world_positions = self
            .positions
            .iter()
            .map(|p| object_to_world.transform_point3(*p))
            .collect();
        self
    }

    pub fn with_prim_id(mut self, prim_id: i32) -> Self {
        self.prim_id = prim_id;
        self
    }

    pub fn with_instance_id(mut self, instance_id: i32) -> Self {
        self.instance_id = instance_id;
        self
    }

    /// Map each triangle to the authored face it came from.
    pub fn with_face_ids(mut self, face_ids: Vec<i32>) -> Self {
        let face_ids: Arc<[i32]> = face_ids.into();
        for primvar in self.primvars.values_mut() {
            primvar.face_ids = Some(face_ids.clone());
        }
        self.face_ids = Some(face_ids);
        self
    }

    /// Restrict which ray kinds can hit this mesh.
    pub fn with_visibility(mut self, visibility: RayMask) -> Self {
        self.visibility = visibility;
        self
    }

    /// Attach a named primvar. An existing primvar of the same name is replaced.
    pub fn with_primvar(
        mut self,
        name: impl Into<String>,
        interpolation: Interpolation,
        data: PrimvarData,
    ) -> Self {
        let primvar = Primvar {
            interpolation,
            data,
            indices: self.indices.clone(),
            face_ids: self.face_ids.clone(),
        };
        self.primvars.insert(name.into(), primvar);
        self
    }

    /// Per-vertex object-space shading normals.
    pub fn with_normals(self, normals: Vec<Vec3>) -> Self {
        self.with_primvar(NORMAL_ATTRIBUTE, Interpolation::Vertex, PrimvarData::Vec3(normals))
    }

    /// A constant display color.
    pub fn with_color(self, color: Vec3) -> Self {
        self.with_primvar(COLOR_ATTRIBUTE, Interpolation::Constant, PrimvarData::Vec3(vec![color]))
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn triangle(&self, index: usize) -> Option<[Vec3; 3]> {
        let base = index * 3;
        let corner = |i: usize| {
            self.indices
                .get(base + i)
                .and_then(|&v| self.world_positions.get(v as usize))
                .copied()
        };
        Some([corner(0)?, corner(1)?, corner(2)?])
    }

    /// Nearest triangle hit within `ray_t`.
    fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<Hit<'_>> {
        let mut closest: Option<Hit<'_>> = None;
        let mut range = ray_t;

        for index in 0..self.triangle_count() {
            let Some(triangle) = self.triangle(index) else {
                continue;
            };
            if let Some((t, u, v)) = intersect_triangle(ray, &triangle, range) {
                let [v0, v1, v2] = triangle;
                range = range.with_max(t);
                closest = Some(Hit {
                    t,
                    position: ray.at(t),
                    geometric_normal: (v1 - v0).cross(v2 - v0).normalize_or_zero(),
                    u,
                    v,
                    prim_index: index as u32,
                    context: self,
                });
            }
        }

        closest
    }

    fn occluded(&self, ray: &Ray, ray_t: Interval) -> bool {
        (0..self.triangle_count())
            .filter_map(|index| self.triangle(index))
            .any(|triangle| intersect_triangle(ray, &triangle, ray_t).is_some())
    }
}

impl HitContext for Mesh {
    fn prim_id(&self) -> i32 {
        self.prim_id
    }

    fn instance_id(&self) -> i32 {
        self.instance_id
    }

    fn element_id(&self, prim_index: u32) -> i32 {
        self.face_ids
            .as_ref()
            .and_then(|ids| ids.get(prim_index as usize).copied())
            .unwrap_or(prim_index as i32)
    }

    fn object_to_world(&self) -> Mat4 {
        self.object_to_world
    }

    fn attribute(&self, name: &str) -> Option<&dyn AttributeSampler> {
        self.primvars
            .get(name)
            .map(|primvar| primvar as &dyn AttributeSampler)
    }
}

/// Möller-Trumbore ray-triangle intersection.
///
/// Returns `(t, u, v)` where `u` and `v` weight the second and third vertex.
fn intersect_triangle(ray: &Ray, triangle: &[Vec3; 3], ray_t: Interval) -> Option<(f32, f32, f32)> {
    let [v0, v1, v2] = *triangle;
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;

    let h = ray.direction().cross(edge2);
    let a = edge1.dot(h);

    // Ray is parallel to triangle
    if a.abs() < 1e-8 {
        return None;
    }

    let f = 1.0 / a;
    let s = ray.origin() - v0;
    let u = f * s.dot(h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * ray.direction().dot(q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(q);
    ray_t.surrounds(t).then_some((t, u, v))
}

/// A list of meshes traced by brute force.
#[derive(Debug, Clone, Default)]
pub struct MeshScene {
    meshes: Vec<Mesh>,
}

impl MeshScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mesh and return its index.
    pub fn add_mesh(&mut self, mesh: Mesh) -> usize {
        self.meshes.push(mesh);
        self.meshes.len() - 1
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(Mesh::triangle_count).sum()
    }
}

impl GeometryProvider for MeshScene {
    fn trace_nearest_hit(&self, ray: &Ray, t_range: Interval, mask: RayMask) -> Option<Hit<'_>> {
        let mut closest: Option<Hit<'_>> = None;
        let mut range = t_range;

        for mesh in self.meshes.iter().filter(|m| m.visibility.intersects(mask)) {
            if let Some(hit) = mesh.hit(ray, range) {
                range = range.with_max(hit.t);
                closest = Some(hit);
            }
        }

        closest
    }

    fn trace_occlusion(&self, ray: &Ray, t_range: Interval, mask: RayMask) -> bool {
        self.meshes
            .iter()
            .filter(|m| m.visibility.intersects(mask))
            .any(|mesh| mesh.occluded(ray, t_range))
    }

    fn is_empty(&self) -> bool {
        self.triangle_count() == 0
    }
}
