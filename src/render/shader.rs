use crate::math::{color_blend, normalize_or_zero, Color, Point3};
use crate::scene::{Lighting, Material, Primitive};

use super::raster::Fragment;

/// Per-frame constants every fragment of the frame is shaded with.
#[derive(Debug, Clone, Copy)]
pub struct ShadingContext<'a> {
    pub camera_position: Point3,
    pub lighting: &'a Lighting,
}

/// Outgoing radiance of a fragment: ambient term plus the BRDF of `material` evaluated for every
/// directional light, weighted by the cosine of the incident angle.
///
/// Surfaces are two-sided, a normal pointing away from the viewer is flipped before lighting.
pub fn shade_fragment(fragment: &Fragment, material: &Material, context: &ShadingContext) -> Color {
    let mut color = context.lighting.ambient.component_mul(&material.albedo());
    let view_dir = normalize_or_zero(context.camera_position - fragment.world_position);
    let mut normal = fragment.normal;
    if normal == Color::zeros() {
        return color;
    }
    if normal.dot(&view_dir) < 0.0 {
        normal = -normal;
    }

    for light in &context.lighting.lights {
        let light_dir = light.to_light();
        let n_dot_l = normal.dot(&light_dir);
        if n_dot_l <= 0.0 {
            continue;
        }
        let brdf = material.shade(normal, light_dir, view_dir);
        color += brdf.component_mul(&light.color) * (light.intensity * n_dot_l);
    }
    return color;
}

/// Final color of a fragment given the color already stored in the frame buffer.
pub fn blend(source: Color, destination: Color, primitive: &Primitive) -> Color {
    if !primitive.blend {
        return source;
    }
    return color_blend(source, destination, primitive.opacity);
}
