//! Turning track geometry into Bevy meshes, plus the shared mesh table.

use std::collections::HashMap;

use bevy::prelude::*;
use bevy::render::mesh::{Indices, PrimitiveTopology};

use crate::track::TrackMesh;

/// Sphere tessellation, matching the marble look
const SPHERE_SECTORS: u32 = 36;
const SPHERE_STACKS: u32 = 18;

/// Upload-ready mesh for a segment strip
pub fn track_mesh(mesh: &TrackMesh) -> Mesh {
    let positions: Vec<[f32; 3]> = mesh.positions.iter().map(|p| p.to_array()).collect();
    let normals: Vec<[f32; 3]> = mesh.normals.iter().map(|n| n.to_array()).collect();

    // u runs along the path, v across it
    let row = (mesh.seg_v + 1) as usize;
    let uvs: Vec<[f32; 2]> = (0..positions.len())
        .map(|i| {
            let u = (i / row) as f32 / mesh.seg_u.max(1) as f32;
            let v = (i % row) as f32 / mesh.seg_v.max(1) as f32;
            [v, u]
        })
        .collect();

    let mut out = Mesh::new(PrimitiveTopology::TriangleList, default());
    out.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    out.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
    out.insert_attribute(Mesh::ATTRIBUTE_UV_0, uvs);
    out.insert_indices(Indices::U32(mesh.indices.clone()));
    out
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum ShapeKey {
    Sphere(u32),
    Box([u32; 3]),
}

impl ShapeKey {
    fn sphere(radius: f32) -> Self {
        ShapeKey::Sphere(radius.to_bits())
    }

    fn cuboid(half_extents: Vec3) -> Self {
        ShapeKey::Box(half_extents.to_array().map(f32::to_bits))
    }
}

/// Primitive meshes shared by every marble and obstacle, built during scene
/// setup and only looked up afterwards
#[derive(Resource, Default)]
pub struct MeshAssets {
    handles: HashMap<ShapeKey, Handle<Mesh>>,
}

impl MeshAssets {
    /// Build the sphere mesh for `radius` unless it already exists
    pub fn insert_sphere(&mut self, meshes: &mut Assets<Mesh>, radius: f32) -> Handle<Mesh> {
        self.handles
            .entry(ShapeKey::sphere(radius))
            .or_insert_with(|| {
                meshes.add(Sphere::new(radius).mesh().uv(SPHERE_SECTORS, SPHERE_STACKS))
            })
            .clone()
    }

    /// Build the box mesh for `half_extents` unless it already exists
    pub fn insert_box(&mut self, meshes: &mut Assets<Mesh>, half_extents: Vec3) -> Handle<Mesh> {
        self.handles
            .entry(ShapeKey::cuboid(half_extents))
            .or_insert_with(|| meshes.add(Cuboid::from_size(half_extents * 2.0)))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::CurvedParams;

    #[test]
    fn test_track_mesh_carries_every_buffer() {
        let params = CurvedParams {
            seg_u: 6,
            seg_v: 4,
            ..default()
        };
        let segment = params.build().unwrap();
        let mesh = track_mesh(segment.mesh());

        assert_eq!(mesh.count_vertices(), 7 * 5);
        assert!(mesh.attribute(Mesh::ATTRIBUTE_NORMAL).is_some());
        assert!(mesh.attribute(Mesh::ATTRIBUTE_UV_0).is_some());
        assert_eq!(mesh.indices().map(|i| i.len()), Some(6 * 6 * 4));
    }

    #[test]
    fn test_shapes_are_built_once() {
        let mut meshes = Assets::<Mesh>::default();
        let mut table = MeshAssets::default();

        let a = table.insert_sphere(&mut meshes, 0.5);
        let b = table.insert_sphere(&mut meshes, 0.5);
        table.insert_box(&mut meshes, Vec3::ONE);

        let c = table.insert_sphere(&mut meshes, 0.25);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(meshes.len(), 3);
    }
}
