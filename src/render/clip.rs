use serde::{Deserialize, Serialize};

use crate::math::Vec4;

use super::transform::TransformedVertex;

/// Acceptance filter applied to every triangle before rasterization. No geometry is cut here,
/// triangles are either kept whole or dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrustumCulling {
    /// Keeps a triangle as long as one vertex is inside the view volume.
    #[default]
    AnyVertexInside,
    /// Keeps a triangle only if all of its vertices are inside the view volume.
    AllVerticesInside,
}

impl FrustumCulling {
    pub fn accepts(&self, triangle: &[TransformedVertex; 3]) -> bool {
        return match self {
            FrustumCulling::AnyVertexInside => triangle.iter().any(|v| is_inside_frustum(&v.position)),
            FrustumCulling::AllVerticesInside => triangle.iter().all(|v| is_inside_frustum(&v.position)),
        };
    }
}

/// Canonical view volume test in clip space: |x| <= w, |y| <= w and 0 <= z <= w.
pub fn is_inside_frustum(p: &Vec4) -> bool {
    return p.w > 0.0 && p.x.abs() <= p.w && p.y.abs() <= p.w && p.z >= 0.0 && p.z <= p.w;
}

/// Clips a triangle against the near plane (z >= 0 in clip space) and pushes the pieces into
/// `out` as a fan with the winding of the input.
///
/// Pushes nothing if the triangle is completely behind the plane, the triangle itself if it is
/// completely in front, and one or two triangles otherwise. Returns true if the triangle was cut.
pub fn clip_near(triangle: &[TransformedVertex; 3], out: &mut Vec<[TransformedVertex; 3]>) -> bool {
    let inside = triangle.map(|v| v.position.z >= 0.0);
    if inside.iter().all(|i| *i) {
        out.push(*triangle);
        return false;
    }
    if inside.iter().all(|i| !*i) {
        return true;
    }

    // Sutherland-Hodgman against a single plane, at most 4 vertices come out.
    let mut polygon: Vec<TransformedVertex> = Vec::with_capacity(4);
    for i in 0..3 {
        let current = &triangle[i];
        let next = &triangle[(i + 1) % 3];
        if inside[i] {
            polygon.push(*current);
        }
        if inside[i] != inside[(i + 1) % 3] {
            let t = current.position.z / (current.position.z - next.position.z);
            let mut crossing = current.lerp(next, t);
            // Exactly on the plane, whatever rounding says.
            crossing.position.z = crossing.position.z.max(0.0);
            polygon.push(crossing);
        }
    }

    for i in 1..polygon.len() - 1 {
        out.push([polygon[0], polygon[i], polygon[i + 1]]);
    }
    return true;
}
