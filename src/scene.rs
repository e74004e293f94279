//! Inputs handed to the rasterizer by the scene collaborator: meshes, materials and draw calls.

mod material;
mod mesh;
mod primitive;

pub use material::{
    lambert, phong, schlick, schlick_ggx, smith, trowbridge_reitz_ggx, CookTorrance, Lambert,
    LambertPhong, Material, MaterialDesc, MaterialLibrary, RoughnessPreset, DIELECTRIC_REFLECTIVITY,
};
pub use mesh::{Mesh, Topology, Vertex};
pub use primitive::{CullMode, DirectionalLight, Lighting, Primitive, Scene};
