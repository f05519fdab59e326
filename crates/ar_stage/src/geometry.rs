//! Plane geometry helpers and the GPU vertex layouts they fill.

use glam::{Mat4, Vec2, Vec3};

/// Per-vertex position uploaded to vertex slot 0 (`FLOAT4`, w = 1).
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, Debug, PartialEq)]
pub struct PlaneVertex {
    pub position: [f32; 4],
}

impl PlaneVertex {
    #[inline]
    pub fn from_world(p: Vec3) -> Self {
        Self {
            position: [p.x, p.y, p.z, 1.0],
        }
    }
}

/// Per-vertex texture coordinate uploaded to vertex slot 1 (`FLOAT2`).
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, Debug, PartialEq)]
pub struct PlaneUv {
    pub uv: [f32; 2],
}

/// Lifts a local X/Z boundary polygon into world space through `pose`.
pub fn polygon_to_world<'a>(
    boundary: &'a [Vec2],
    pose: &'a Mat4,
) -> impl Iterator<Item = Vec3> + 'a {
    boundary
        .iter()
        .map(move |p| pose.transform_point3(Vec3::new(p.x, 0.0, p.y)))
}

/// Number of indices a fan over `vertex_count` points emits.
#[inline]
pub fn fan_index_count(vertex_count: usize) -> usize {
    vertex_count.saturating_sub(2) * 3
}

/// Triangle fan over a convex polygon of `vertex_count` points, anchored at
/// its first vertex: `(0, k+1, k+2)` for every k, shifted by `base`.
///
/// Yields nothing for fewer than three points.
pub fn fan_indices(vertex_count: usize, base: u16) -> impl Iterator<Item = u16> {
    let triangles = vertex_count.saturating_sub(2) as u16;
    (0..triangles).flat_map(move |k| [base, base + k + 1, base + k + 2])
}

/// Model-space mapping: texture coordinates straight from the untransformed
/// boundary polygon.
pub fn polygon_uvs(boundary: &[Vec2]) -> impl Iterator<Item = PlaneUv> + '_ {
    boundary.iter().map(|p| PlaneUv { uv: [p.x, p.y] })
}

/// Planar world-space mapping: texture coordinates from world X/Z, so adjacent
/// horizontal planes tile seamlessly.
pub fn world_uvs(vertices: &[Vec3]) -> impl Iterator<Item = PlaneUv> + '_ {
    vertices.iter().map(|v| PlaneUv { uv: [v.x, v.z] })
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn fan_over_square_emits_two_triangles() {
        let indices: Vec<u16> = fan_indices(4, 0).collect();
        assert_eq!(indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(fan_index_count(4), indices.len());
    }

    #[test]
    fn fan_is_offset_by_base() {
        let indices: Vec<u16> = fan_indices(3, 4).collect();
        assert_eq!(indices, vec![4, 5, 6]);
    }

    #[test]
    fn degenerate_polygons_produce_no_triangles() {
        assert_eq!(fan_indices(0, 0).count(), 0);
        assert_eq!(fan_indices(2, 10).count(), 0);
        assert_eq!(fan_index_count(1), 0);
    }

    #[test]
    fn polygon_is_lifted_onto_the_pose_plane() {
        let pose = Mat4::from_rotation_translation(Quat::IDENTITY, Vec3::new(0.0, 1.5, 0.0));
        let boundary = [Vec2::new(1.0, 2.0)];
        let world: Vec<Vec3> = polygon_to_world(&boundary, &pose).collect();
        assert_eq!(world, vec![Vec3::new(1.0, 1.5, 2.0)]);
    }

    #[test]
    fn world_uvs_use_x_and_z() {
        let uvs: Vec<_> = world_uvs(&[Vec3::new(3.0, 9.0, -1.0)]).collect();
        assert_eq!(uvs, vec![PlaneUv { uv: [3.0, -1.0] }]);
    }
}
