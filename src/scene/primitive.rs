use std::sync::Arc;

use nalgebra::vector;

use crate::math::{normalize_or_zero, Color, Mat4, Vec3};

use super::material::Material;
use super::mesh::Mesh;

/// Which winding gets rejected before rasterization.
///
/// Front faces are the ones winding counter-clockwise on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    Back,
    Front,
    None,
}

/// One draw call. Mesh and material are shared with other primitives and only borrowed while
/// drawing.
#[derive(Debug, Clone)]
pub struct Primitive {
    pub mesh: Arc<Mesh>,
    pub material: Arc<Material>,
    pub world: Mat4,
    pub cull_mode: CullMode,
    pub write_depth: bool,
    /// Blend with the color already in the frame buffer using `opacity`.
    pub blend: bool,
    pub opacity: f32,
}

impl Primitive {
    pub fn new(mesh: Arc<Mesh>, material: Arc<Material>) -> Self {
        return Self {
            mesh,
            material,
            world: Mat4::identity(),
            cull_mode: CullMode::Back,
            write_depth: true,
            blend: false,
            opacity: 1.0,
        };
    }

    pub fn with_world(mut self, world: Mat4) -> Self {
        self.world = world;
        return self;
    }

    pub fn with_cull_mode(mut self, cull_mode: CullMode) -> Self {
        self.cull_mode = cull_mode;
        return self;
    }

    pub fn with_depth_write(mut self, write_depth: bool) -> Self {
        self.write_depth = write_depth;
        return self;
    }

    /// Enables blending with the back buffer, `opacity` is clamped to [0, 1].
    pub fn with_blend(mut self, opacity: f32) -> Self {
        self.blend = true;
        self.opacity = opacity.clamp(0.0, 1.0);
        return self;
    }
}

/// Light arriving from infinitely far away along `direction`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Direction the light travels in.
    pub direction: Vec3,
    pub color: Color,
    pub intensity: f32,
}

impl DirectionalLight {
    pub fn new(direction: Vec3, color: Color, intensity: f32) -> Self {
        return Self {
            direction,
            color,
            intensity,
        };
    }

    /// Unit vector from the surface towards the light.
    pub fn to_light(&self) -> Vec3 {
        return normalize_or_zero(-self.direction);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lighting {
    pub lights: Vec<DirectionalLight>,
    pub ambient: Color,
}

impl Default for Lighting {
    fn default() -> Self {
        return Self {
            lights: vec![DirectionalLight::new(
                vector![0.577, -0.577, 0.577],
                vector![1.0, 1.0, 1.0],
                3.0,
            )],
            ambient: Color::repeat(0.03),
        };
    }
}

/// Everything drawn in one frame, in submission order.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub primitives: Vec<Primitive>,
    pub lighting: Lighting,
    pub clear_color: Color,
}

impl Scene {
    pub fn new(lighting: Lighting) -> Self {
        return Self {
            primitives: Vec::new(),
            lighting,
            clear_color: Color::zeros(),
        };
    }

    pub fn add(&mut self, primitive: Primitive) {
        self.primitives.push(primitive);
    }
}
