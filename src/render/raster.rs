use std::ops::{Add, Mul};

use nalgebra::vector;

use crate::math::{cross2, guard_nonzero, normalize_or_zero, Color, Point3, Vec2, Vec3, Vec4};
use crate::scene::CullMode;

use super::buffer::FrameBuffer;
use super::transform::TransformedVertex;

/// Perspective division followed by the viewport transform. Raster origin is the top left
/// corner, so y gets flipped.
pub fn clip_to_raster(clip: &Vec4, width: u32, height: u32) -> Vec2 {
    let w = guard_nonzero(clip.w);
    let ndc_x = clip.x / w;
    let ndc_y = clip.y / w;
    return vector![
        (ndc_x + 1.0) / 2.0 * width as f32,
        (1.0 - ndc_y) / 2.0 * height as f32
    ];
}

/// Signed area of the parallelogram spanned by the edge `a -> b` and the point `p`.
pub fn edge_weight(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    return cross2(p - a, b - a);
}

/// Signed parallelogram area of a raster triangle. Negative for triangles winding clockwise on
/// screen, positive for counter-clockwise ones.
pub fn signed_area(raster: &[Vec2; 3]) -> f32 {
    return cross2(raster[2] - raster[0], raster[1] - raster[0]);
}

/// Pixel range covered by a triangle, already clamped to the target. Max bounds are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl BoundingBox {
    /// None if the triangle does not overlap the `width` x `height` target at all.
    pub fn of_triangle(raster: &[Vec2; 3], width: u32, height: u32) -> Option<Self> {
        let lo = raster.iter().fold(vector![f32::MAX, f32::MAX], |acc, v| acc.inf(v));
        let hi = raster.iter().fold(vector![f32::MIN, f32::MIN], |acc, v| acc.sup(v));
        let min_x = lo.x.floor().max(0.0);
        let min_y = lo.y.floor().max(0.0);
        let max_x = hi.x.ceil().min(width as f32);
        let max_y = hi.y.ceil().min(height as f32);
        if min_x >= max_x || min_y >= max_y {
            return None;
        }
        return Some(Self {
            min_x: min_x as u32,
            min_y: min_y as u32,
            max_x: max_x as u32,
            max_y: max_y as u32,
        });
    }

    pub fn pixel_count(&self) -> u64 {
        return (self.max_x - self.min_x) as u64 * (self.max_y - self.min_y) as u64;
    }
}

/// Interpolated attributes of one pixel that passed the inside and depth tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fragment {
    pub x: u32,
    pub y: u32,
    /// Normalized device depth in [0, 1].
    pub depth: f32,
    /// Interpolated clip-space w, the view depth of the fragment.
    pub w: f32,
    /// Screen-space barycentric coordinates, summing to 1.
    pub barycentric: Vec3,
    pub world_position: Point3,
    pub normal: Vec3,
    pub tangent: Vec3,
    pub uv: Vec2,
}

/// What happened to a triangle handed to the rasterizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriangleOutcome {
    /// Zero area or a vertex that projects to infinity.
    Degenerate,
    /// Rejected by the cull mode.
    Culled,
    /// Went through the pixel loop. `tested` is the number of pixel centers visited, `written`
    /// the number of fragments that reached the frame buffer.
    Rasterized { tested: u64, written: u64 },
}

/// Perspective-correct interpolation: sum(value_i * weight_i) * w, with weight_i the barycentric
/// coordinate over clip w of vertex i.
fn perspective<T>(values: [T; 3], weights: &[f32; 3], w: f32) -> T
where
    T: Mul<f32, Output = T> + Add<Output = T> + Copy,
{
    return (values[0] * weights[0] + values[1] * weights[1] + values[2] * weights[2]) * w;
}

/// Rasterizes one clip-space triangle into `target`.
///
/// Pixels are sampled at their centers. A pixel is inside if all three edge weights share the
/// sign of the triangle area (edges included). Surviving fragments are depth tested with a strict
/// less-than against the depth buffer, so on equal depth the first writer wins. `shade` receives
/// the fragment and the color currently stored at its pixel and returns the color to store.
pub fn rasterize_triangle<F>(
    triangle: &[TransformedVertex; 3],
    cull_mode: CullMode,
    write_depth: bool,
    target: &mut FrameBuffer,
    mut shade: F,
) -> TriangleOutcome
where
    F: FnMut(&Fragment, Color) -> Color,
{
    // A vertex on the eye plane has no raster position.
    if triangle.iter().any(|v| v.position.w == 0.0) {
        return TriangleOutcome::Degenerate;
    }
    let (width, height) = (target.width(), target.height());
    let raster = triangle.map(|v| clip_to_raster(&v.position, width, height));
    if raster.iter().any(|r| !r.x.is_finite() || !r.y.is_finite()) {
        return TriangleOutcome::Degenerate;
    }

    let area = signed_area(&raster);
    if !area.is_finite() || area.abs() < f32::EPSILON {
        return TriangleOutcome::Degenerate;
    }
    match cull_mode {
        CullMode::Back if area < 0.0 => return TriangleOutcome::Culled,
        CullMode::Front if area > 0.0 => return TriangleOutcome::Culled,
        _ => (),
    }

    let bbox = match BoundingBox::of_triangle(&raster, width, height) {
        Some(bbox) => bbox,
        None => return TriangleOutcome::Rasterized { tested: 0, written: 0 },
    };

    let inv_w = triangle.map(|v| 1.0 / guard_nonzero(v.position.w));
    let [v0, v1, v2] = triangle;
    let mut written = 0;
    // @OPTI edge weights are affine in x and y, they could be stepped instead of recomputed.
    for y in bbox.min_y..bbox.max_y {
        for x in bbox.min_x..bbox.max_x {
            let pixel = vector![x as f32 + 0.5, y as f32 + 0.5];
            let weight_0 = edge_weight(raster[1], raster[2], pixel);
            let weight_1 = edge_weight(raster[2], raster[0], pixel);
            let weight_2 = edge_weight(raster[0], raster[1], pixel);
            if weight_0 * area < 0.0 || weight_1 * area < 0.0 || weight_2 * area < 0.0 {
                continue;
            }
            let barycentric = vector![weight_0, weight_1, weight_2] / area;

            let weights = [barycentric.x * inv_w[0], barycentric.y * inv_w[1], barycentric.z * inv_w[2]];
            let w_interpolated = 1.0 / guard_nonzero(weights[0] + weights[1] + weights[2]);
            let z = [v0.position.z, v1.position.z, v2.position.z];
            let depth = perspective(z, &weights, w_interpolated) / guard_nonzero(w_interpolated);
            if !(0.0..=1.0).contains(&depth) {
                continue;
            }

            let index = target.index(x, y);
            if depth >= target.depth_at_index(index) {
                continue;
            }
            if write_depth {
                target.set_depth_at_index(index, depth);
            }

            let world = [v0.world_position.coords, v1.world_position.coords, v2.world_position.coords];
            let fragment = Fragment {
                x,
                y,
                depth,
                w: w_interpolated,
                barycentric,
                world_position: Point3::from(perspective(world, &weights, w_interpolated)),
                normal: normalize_or_zero(perspective([v0.normal, v1.normal, v2.normal], &weights, w_interpolated)),
                tangent: normalize_or_zero(perspective([v0.tangent, v1.tangent, v2.tangent], &weights, w_interpolated)),
                uv: perspective([v0.uv, v1.uv, v2.uv], &weights, w_interpolated),
            };
            let existing = target.linear_color_at_index(index);
            let color = shade(&fragment, existing);
            target.set_color_at_index(index, color);
            written += 1;
        }
    }

    return TriangleOutcome::Rasterized {
        tested: bbox.pixel_count(),
        written,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Camera, Handedness};
    use crate::math::{from_hom_point, to_hom_point};
    use crate::render::buffer::CLEARED_DEPTH;
    use std::f32::consts::FRAC_PI_2;

    const WHITE: Color = Color::new(1.0, 1.0, 1.0);

    fn vertex(x: f32, y: f32, z: f32, w: f32) -> TransformedVertex {
        return TransformedVertex {
            position: vector![x, y, z, w],
            world_position: Point3::new(x, y, z),
            normal: Vec3::z(),
            tangent: Vec3::x(),
            uv: vector![x, y],
        };
    }

    /// Clockwise on screen: top left, top right, bottom left.
    fn clockwise() -> [TransformedVertex; 3] {
        return [vertex(-0.5, 0.5, 0.5, 1.0), vertex(0.5, 0.5, 0.5, 1.0), vertex(-0.5, -0.5, 0.5, 1.0)];
    }

    fn counter_clockwise() -> [TransformedVertex; 3] {
        let [a, b, c] = clockwise();
        return [a, c, b];
    }

    fn draw(triangle: &[TransformedVertex; 3], cull_mode: CullMode, frame: &mut FrameBuffer) -> TriangleOutcome {
        return rasterize_triangle(triangle, cull_mode, true, frame, |_, _| WHITE);
    }

    #[test]
    fn raster_mapping_flips_y() {
        assert_eq!(clip_to_raster(&vector![-1.0, 1.0, 0.0, 1.0], 100, 50), vector![0.0, 0.0]);
        assert_eq!(clip_to_raster(&vector![2.0, -2.0, 0.0, 2.0], 100, 50), vector![100.0, 50.0]);
        assert_eq!(clip_to_raster(&vector![0.0, 0.0, 0.0, 1.0], 100, 50), vector![50.0, 25.0]);
    }

    #[test]
    fn winding_sign_of_area() {
        let frame = (16, 16);
        let cw = clockwise().map(|v| clip_to_raster(&v.position, frame.0, frame.1));
        let ccw = counter_clockwise().map(|v| clip_to_raster(&v.position, frame.0, frame.1));
        assert!(signed_area(&cw) < 0.0);
        assert!(signed_area(&ccw) > 0.0);
    }

    #[test]
    fn collinear_triangle_touches_no_pixels() {
        let mut frame = FrameBuffer::new(16, 16).unwrap();
        let line = [vertex(-0.5, -0.5, 0.5, 1.0), vertex(0.0, 0.0, 0.5, 1.0), vertex(0.5, 0.5, 0.5, 1.0)];
        let mut visited = 0;
        let outcome = rasterize_triangle(&line, CullMode::None, true, &mut frame, |_, c| {
            visited += 1;
            c
        });
        assert_eq!(outcome, TriangleOutcome::Degenerate);
        assert_eq!(visited, 0);
        assert!(frame.depth().iter().all(|d| *d == CLEARED_DEPTH));
    }

    #[test]
    fn unprojectable_vertices_are_degenerate() {
        let eye_plane = [vertex(0.5, 0.5, 0.5, 0.0), vertex(-0.5, -0.5, 0.5, 1.0), vertex(0.5, -0.5, 0.5, 1.0)];
        let collapsed = [vertex(0.0, 0.0, 0.0, 0.0), vertex(-0.5, -0.5, 0.5, 1.0), vertex(0.5, 0.5, 0.5, 1.0)];
        let infinite = [
            vertex(f32::INFINITY, 0.5, 0.5, 1.0),
            vertex(-0.5, -0.5, 0.5, 1.0),
            vertex(0.5, -0.5, 0.5, 1.0),
        ];
        let not_a_number = [vertex(0.0, f32::NAN, 0.5, 1.0), vertex(-0.5, -0.5, 0.5, 1.0), vertex(0.5, -0.5, 0.5, 1.0)];
        // Finite raster positions whose area overflows.
        let far_away = [vertex(1e19, 0.0, 0.5, 1.0), vertex(-1e19, 0.0, 0.5, 1.0), vertex(0.0, 1e19, 0.5, 1.0)];

        for triangle in [eye_plane, collapsed, infinite, not_a_number, far_away] {
            let mut frame = FrameBuffer::new(64, 64).unwrap();
            let mut shaded = 0;
            let outcome = rasterize_triangle(&triangle, CullMode::None, true, &mut frame, |_, c| {
                shaded += 1;
                c
            });
            assert_eq!(outcome, TriangleOutcome::Degenerate, "{:?}", triangle.map(|v| v.position));
            assert_eq!(shaded, 0);
            assert!(frame.depth().iter().all(|d| *d == CLEARED_DEPTH));
        }

        // Negative w mirrors the triangle through the eye, still a regular triangle.
        let mut frame = FrameBuffer::new(64, 64).unwrap();
        let behind = [vertex(0.5, -0.5, 0.5, -1.0), vertex(-0.5, -0.5, 0.5, -1.0), vertex(0.5, 0.5, 0.5, -1.0)];
        assert!(matches!(draw(&behind, CullMode::None, &mut frame), TriangleOutcome::Rasterized { .. }));
    }

    #[test]
    fn barycentric_coordinates_sum_to_one() {
        let mut frame = FrameBuffer::new(64, 48).unwrap();
        let triangle = [vertex(-0.9, -0.7, 0.2, 1.0), vertex(0.8, -0.2, 0.5, 2.0), vertex(-0.1, 0.9, 0.9, 1.5)];
        let mut count = 0;
        rasterize_triangle(&triangle, CullMode::None, true, &mut frame, |fragment, c| {
            let b = fragment.barycentric;
            assert!((b.x + b.y + b.z - 1.0).abs() < 1e-4, "{}", b);
            assert!(b.iter().all(|v| *v >= -1e-6));
            count += 1;
            c
        });
        assert!(count > 0);
    }

    #[test]
    fn cull_modes_follow_winding() {
        for (triangle, back_rejects) in [(clockwise(), true), (counter_clockwise(), false)] {
            let mut frame = FrameBuffer::new(16, 16).unwrap();
            let back = draw(&triangle, CullMode::Back, &mut frame);
            frame.reset_depth();
            let front = draw(&triangle, CullMode::Front, &mut frame);
            frame.reset_depth();
            let none = draw(&triangle, CullMode::None, &mut frame);

            assert_eq!(back == TriangleOutcome::Culled, back_rejects);
            assert_eq!(front == TriangleOutcome::Culled, !back_rejects);
            assert!(matches!(none, TriangleOutcome::Rasterized { written, .. } if written > 0));
        }
    }

    #[test]
    fn redrawing_same_triangle_leaves_depth_unchanged() {
        let mut frame = FrameBuffer::new(32, 32).unwrap();
        let triangle = [vertex(-0.8, -0.8, 0.1, 1.0), vertex(0.8, -0.6, 0.7, 1.0), vertex(0.0, 0.8, 0.4, 1.0)];
        let first = rasterize_triangle(&triangle, CullMode::None, true, &mut frame, |_, _| WHITE);
        let depth = frame.depth().to_vec();
        let second = rasterize_triangle(&triangle, CullMode::None, true, &mut frame, |_, _| Color::zeros());

        assert!(matches!(first, TriangleOutcome::Rasterized { written, .. } if written > 0));
        assert!(matches!(second, TriangleOutcome::Rasterized { written: 0, .. }));
        assert_eq!(frame.depth(), &depth[..]);
        // First writer kept its color.
        assert!(frame.as_render_data().chunks(3).any(|p| p == [255, 255, 255]));
    }

    #[test]
    fn closer_fragment_wins() {
        let mut frame = FrameBuffer::new(8, 8).unwrap();
        let far = [vertex(-1.0, -1.0, 0.8, 1.0), vertex(3.0, -1.0, 0.8, 1.0), vertex(-1.0, 3.0, 0.8, 1.0)];
        let near = far.map(|mut v| {
            v.position.z = 0.2;
            v
        });
        rasterize_triangle(&near, CullMode::None, true, &mut frame, |_, _| WHITE);
        rasterize_triangle(&far, CullMode::None, true, &mut frame, |_, _| Color::x());
        assert_eq!(frame.color_at(4, 4), [255, 255, 255]);
        assert!((frame.depth_at(4, 4) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn depth_write_can_be_disabled() {
        let mut frame = FrameBuffer::new(8, 8).unwrap();
        let triangle = [vertex(-1.0, -1.0, 0.5, 1.0), vertex(3.0, -1.0, 0.5, 1.0), vertex(-1.0, 3.0, 0.5, 1.0)];
        rasterize_triangle(&triangle, CullMode::None, false, &mut frame, |_, _| WHITE);
        assert_eq!(frame.color_at(4, 4), [255, 255, 255]);
        assert_eq!(frame.depth_at(4, 4), CLEARED_DEPTH);
    }

    #[test]
    fn fragments_outside_depth_range_are_dropped() {
        let mut frame = FrameBuffer::new(8, 8).unwrap();
        let beyond_far = [vertex(-1.0, -1.0, 1.5, 1.0), vertex(3.0, -1.0, 1.5, 1.0), vertex(-1.0, 3.0, 1.5, 1.0)];
        let outcome = draw(&beyond_far, CullMode::None, &mut frame);
        assert!(matches!(outcome, TriangleOutcome::Rasterized { written: 0, .. }));
    }

    #[test]
    fn triangle_off_screen_visits_nothing() {
        let mut frame = FrameBuffer::new(8, 8).unwrap();
        let off = [vertex(2.0, 2.0, 0.5, 1.0), vertex(3.0, 2.0, 0.5, 1.0), vertex(2.0, 3.0, 0.5, 1.0)];
        assert_eq!(
            draw(&off, CullMode::None, &mut frame),
            TriangleOutcome::Rasterized { tested: 0, written: 0 }
        );
    }

    #[test]
    fn bounding_box_is_clamped() {
        let raster = [vector![-5.0, 2.2], vector![20.0, 3.0], vector![4.5, 30.0]];
        let bbox = BoundingBox::of_triangle(&raster, 10, 10).unwrap();
        assert_eq!(bbox, BoundingBox { min_x: 0, min_y: 2, max_x: 10, max_y: 10 });
        assert_eq!(bbox.pixel_count(), 80);
        let away = [vector![-5.0, -5.0], vector![-1.0, -5.0], vector![-3.0, -1.0]];
        assert_eq!(BoundingBox::of_triangle(&away, 10, 10), None);
    }

    #[test]
    fn interpolation_is_perspective_correct() {
        let camera = Camera::new(Point3::origin(), FRAC_PI_2, 1.0, 0.1, 100.0, Handedness::Left).unwrap();
        let view_projection = camera.view_projection();
        // Strongly slanted triangle, near corner at z = 1, far ones at z = 20.
        let corners = [Point3::new(-1.0, -1.0, 1.0), Point3::new(10.0, -10.0, 20.0), Point3::new(0.0, 15.0, 20.0)];
        let triangle = corners.map(|p| TransformedVertex {
            position: view_projection * to_hom_point(p),
            world_position: p,
            normal: Vec3::z(),
            tangent: Vec3::x(),
            uv: Vec2::zeros(),
        });

        let mut frame = FrameBuffer::new(64, 64).unwrap();
        let mut checked = 0;
        rasterize_triangle(&triangle, CullMode::None, true, &mut frame, |fragment, c| {
            // The interpolated world position has to project back onto the pixel center.
            let ndc = from_hom_point(view_projection * to_hom_point(fragment.world_position));
            let raster = clip_to_raster(&ndc.to_homogeneous(), 64, 64);
            let center = vector![fragment.x as f32 + 0.5, fragment.y as f32 + 0.5];
            assert!((raster - center).norm() < 1e-2, "{} vs {}", raster, center);
            assert!((ndc.z - fragment.depth).abs() < 1e-3);
            checked += 1;
            c
        });
        assert!(checked > 100);
    }
}
