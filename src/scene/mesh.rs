use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use nalgebra::vector;
use obj::{load_obj, Obj, TexturedVertex};
use tracing::info;

use crate::error::RenderError;
use crate::math::{cross2, guard_nonzero, normalize_or_zero, Point3, Vec2, Vec3};

/// Model-space vertex as stored in a mesh vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Point3,
    pub normal: Vec3,
    pub tangent: Vec3,
    pub uv: Vec2,
}

impl Vertex {
    pub fn new(position: Point3, normal: Vec3, uv: Vec2) -> Self {
        return Self {
            position,
            normal,
            tangent: Vec3::zeros(),
            uv,
        };
    }
}

/// How consecutive indices form triangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    TriangleList,
    TriangleStrip,
}

/// Vertex and index buffers of one mesh. Front faces wind counter-clockwise as seen by the
/// viewer.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub topology: Topology,
}

impl Mesh {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>, topology: Topology) -> Self {
        return Self {
            vertices,
            indices,
            topology,
        };
    }

    pub fn triangle_count(&self) -> usize {
        return match self.topology {
            Topology::TriangleList => self.indices.len() / 3,
            Topology::TriangleStrip => self.indices.len().saturating_sub(2),
        };
    }

    /// Index triples of every triangle. Odd triangles of a strip swap their last two indices so
    /// the whole strip keeps one winding.
    pub fn triangles(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        let step = match self.topology {
            Topology::TriangleList => 3,
            Topology::TriangleStrip => 1,
        };
        let strip = self.topology == Topology::TriangleStrip;
        return (0..self.triangle_count()).map(move |n| {
            let i = n * step;
            let odd = if strip { i % 2 } else { 0 };
            [
                self.indices[i] as usize,
                self.indices[i + 1 + odd] as usize,
                self.indices[i + 2 - odd] as usize,
            ]
        });
    }

    /// Loads a triangulated OBJ file with positions, normals and texture coordinates.
    ///
    /// OBJ data is right-handed, so z is mirrored into the left-handed world of the renderer.
    pub fn load_obj(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let model: Obj<TexturedVertex, u32> = load_obj(BufReader::new(File::open(path)?))?;
        let mesh = Mesh::from_obj(&model);
        info!(
            path = %path.display(),
            vertices = mesh.vertices.len(),
            triangles = mesh.triangle_count(),
            "loaded OBJ mesh"
        );
        return Ok(mesh);
    }

    pub fn from_obj(model: &Obj<TexturedVertex, u32>) -> Self {
        let vertices = model
            .vertices
            .iter()
            .map(|v| {
                Vertex::new(
                    Point3::new(v.position[0], v.position[1], -v.position[2]),
                    vector![v.normal[0], v.normal[1], -v.normal[2]],
                    vector![v.texture[0], 1.0 - v.texture[1]],
                )
            })
            .collect();
        let mut mesh = Mesh::new(vertices, model.indices.clone(), Topology::TriangleList);
        mesh.generate_tangents();
        return mesh;
    }

    /// Square of side `size` in the xy plane, facing -z.
    pub fn quad(size: f32) -> Self {
        let h = size / 2.0;
        let normal = vector![0.0, 0.0, -1.0];
        let mut vertices = vec![
            Vertex::new(Point3::new(-h, -h, 0.0), normal, vector![0.0, 1.0]),
            Vertex::new(Point3::new(h, -h, 0.0), normal, vector![1.0, 1.0]),
            Vertex::new(Point3::new(h, h, 0.0), normal, vector![1.0, 0.0]),
            Vertex::new(Point3::new(-h, h, 0.0), normal, vector![0.0, 0.0]),
        ];
        for v in &mut vertices {
            v.tangent = Vec3::x();
        }
        return Mesh::new(vertices, vec![0, 1, 2, 0, 2, 3], Topology::TriangleList);
    }

    /// Axis aligned cube of side `size` centered at the origin, with per-face normals.
    pub fn cube(size: f32) -> Self {
        let h = size / 2.0;
        // (outward normal, face right, face up) with right x up = -normal, so faces wind
        // counter-clockwise when seen from outside.
        let faces: [(Vec3, Vec3, Vec3); 6] = [
            (-Vec3::z(), Vec3::x(), Vec3::y()),
            (Vec3::z(), -Vec3::x(), Vec3::y()),
            (Vec3::x(), Vec3::z(), Vec3::y()),
            (-Vec3::x(), -Vec3::z(), Vec3::y()),
            (Vec3::y(), Vec3::x(), Vec3::z()),
            (-Vec3::y(), Vec3::x(), -Vec3::z()),
        ];
        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, right, up) in faces {
            let base = vertices.len() as u32;
            let center = normal * h;
            let corners = [
                (-right - up, vector![0.0, 1.0]),
                (right - up, vector![1.0, 1.0]),
                (right + up, vector![1.0, 0.0]),
                (-right + up, vector![0.0, 0.0]),
            ];
            for (offset, uv) in corners {
                vertices.push(Vertex {
                    position: Point3::from(center + offset * h),
                    normal,
                    tangent: right,
                    uv,
                });
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        return Mesh::new(vertices, indices, Topology::TriangleList);
    }

    /// Per-vertex tangents from uv derivatives, accumulated over adjacent triangles and
    /// orthogonalized against the vertex normal.
    pub fn generate_tangents(&mut self) {
        let mut accumulated = vec![Vec3::zeros(); self.vertices.len()];
        let triangles: Vec<[usize; 3]> = self.triangles().collect();
        for [i0, i1, i2] in triangles {
            let (Some(v0), Some(v1), Some(v2)) =
                (self.vertices.get(i0), self.vertices.get(i1), self.vertices.get(i2))
            else {
                continue;
            };
            let edge_1 = v1.position - v0.position;
            let edge_2 = v2.position - v0.position;
            let duv_1 = v1.uv - v0.uv;
            let duv_2 = v2.uv - v0.uv;
            let r = 1.0 / guard_nonzero(cross2(duv_1, duv_2));
            let tangent = (edge_1 * duv_2.y - edge_2 * duv_1.y) * r;
            if !tangent.iter().all(|c| c.is_finite()) {
                continue;
            }
            for i in [i0, i1, i2] {
                accumulated[i] += tangent;
            }
        }

        for (vertex, tangent) in self.vertices.iter_mut().zip(accumulated) {
            let n = vertex.normal;
            let mut t = normalize_or_zero(tangent - n * n.dot(&tangent));
            if t == Vec3::zeros() {
                // No usable uv gradient, any vector perpendicular to the normal will do.
                let helper = if n.x.abs() < 0.9 { Vec3::x() } else { Vec3::y() };
                t = normalize_or_zero(helper - n * n.dot(&helper));
            }
            vertex.tangent = t;
        }
    }
}
