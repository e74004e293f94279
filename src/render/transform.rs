use crate::math::{linear_part, normal_matrix, normalize_or_zero, to_hom_point, Mat4, Point3, Vec2, Vec3, Vec4};
use crate::scene::Vertex;

/// Vertex after the transform stage: clip-space position plus the attributes interpolated per
/// fragment. Lives only for the frame it was produced in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformedVertex {
    pub position: Vec4, // Homogeneous clip-space position.
    pub world_position: Point3,
    pub normal: Vec3, // World space.
    pub tangent: Vec3, // World space.
    pub uv: Vec2,
}

impl TransformedVertex {
    /// Linear interpolation of every component, `t = 0` gives `self`.
    pub fn lerp(&self, other: &TransformedVertex, t: f32) -> TransformedVertex {
        return TransformedVertex {
            position: self.position.lerp(&other.position, t),
            world_position: Point3::from(self.world_position.coords.lerp(&other.world_position.coords, t)),
            normal: self.normal.lerp(&other.normal, t),
            tangent: self.tangent.lerp(&other.tangent, t),
            uv: self.uv.lerp(&other.uv, t),
        };
    }
}

/// Transforms a whole vertex buffer into `out`, keeping the source order so the mesh index
/// buffer can be used as is. `out` is cleared first and its allocation reused.
pub fn transform_vertices(
    vertices: &[Vertex],
    world: &Mat4,
    view_projection: &Mat4,
    out: &mut Vec<TransformedVertex>,
) {
    out.clear();
    out.reserve(vertices.len());

    let world_view_projection = view_projection * world;
    let normal_transform = normal_matrix(world);
    let tangent_transform = linear_part(world);
    for vertex in vertices {
        let world_position = world * to_hom_point(vertex.position);
        out.push(TransformedVertex {
            position: world_view_projection * to_hom_point(vertex.position),
            world_position: Point3::from(world_position.xyz()),
            normal: normalize_or_zero(normal_transform * vertex.normal),
            tangent: normalize_or_zero(tangent_transform * vertex.tangent),
            uv: vertex.uv,
        });
    }
}
