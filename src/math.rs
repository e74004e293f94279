//! Small math kernel on top of nalgebra.
//!
//! All matrices follow the column-vector convention: `clip = projection * view * world * p`.

use nalgebra as na;
use na::{vector, Matrix3};

pub type Vec2 = na::Vector2<f32>;
pub type Vec3 = na::Vector3<f32>;
pub type Vec4 = na::Vector4<f32>;
pub type Point3 = na::Point3<f32>;
pub type Mat4 = na::Matrix4<f32>;

/// Linear rgb color with channels nominally in [0, 1].
pub type Color = na::Vector3<f32>;

/// Smallest positive normal f32. Used wherever a denominator or a clamped dot product must never
/// reach zero.
pub const MIN_POSITIVE: f32 = f32::MIN_POSITIVE;

/// Transformation of a point to homogenous coordinates.
pub fn to_hom_point(p: Point3) -> Vec4 {
    return p.to_homogeneous();
}

/// Transformation of a vector to homogenous coordinates.
pub fn to_hom_vector(v: Vec3) -> Vec4 {
    return v.to_homogeneous();
}

/// Transformation of a point from homogenous coordinates, guarding the division by w.
pub fn from_hom_point(v: Vec4) -> Point3 {
    let w = guard_nonzero(v.w);
    return Point3::new(v.x / w, v.y / w, v.z / w);
}

/// 2D cross product, the signed area of the parallelogram spanned by `a` and `b`.
pub fn cross2(a: Vec2, b: Vec2) -> f32 {
    return a.x * b.y - a.y * b.x;
}

/// Substitutes the smallest positive float for an exact zero, keeps everything else untouched.
pub fn guard_nonzero(x: f32) -> f32 {
    if x == 0.0 {
        return MIN_POSITIVE;
    }
    return x;
}

/// Clamps a dot product so it can safely enter a division or exponentiation.
pub fn clamp_dot(x: f32) -> f32 {
    return x.max(MIN_POSITIVE);
}

/// Upper-left 3x3 block of a transform, i.e. everything but translation.
pub fn linear_part(m: &Mat4) -> Matrix3<f32> {
    return m.fixed_slice::<3, 3>(0, 0).into_owned();
}

/// Matrix used to carry normals through a transform: inverse transpose of its linear part.
/// Falls back to the linear part itself for singular transforms.
pub fn normal_matrix(m: &Mat4) -> Matrix3<f32> {
    let linear = linear_part(m);
    return match linear.try_inverse() {
        Some(inverse) => inverse.transpose(),
        None => linear,
    };
}

/// Normalizes, returning zero vector instead of NaNs for zero-length input.
pub fn normalize_or_zero(v: Vec3) -> Vec3 {
    return v.try_normalize(MIN_POSITIVE).unwrap_or_else(Vec3::zeros);
}

/// Convex combination of two colors: t * a + (1 - t) * b.
pub fn color_blend(a: Color, b: Color, t: f32) -> Color {
    return a * t + b * (1.0 - t);
}

/// Brings an overexposed color back into range by dividing by its largest channel.
pub fn max_to_one(c: Color) -> Color {
    let max = c.max();
    if max > 1.0 {
        return c / max;
    }
    return c;
}

/// Quantization of a linear color to rgb8.
pub fn to_rgb8(c: Color) -> [u8; 3] {
    let c = max_to_one(c);
    let q = |x: f32| (x.clamp(0.0, 1.0) * 255.0).round() as u8;
    return [q(c.x), q(c.y), q(c.z)];
}

/// Inverse of [`to_rgb8`] for reading back the frame buffer.
pub fn from_rgb8(c: [u8; 3]) -> Color {
    return vector![c[0] as f32, c[1] as f32, c[2] as f32] / 255.0;
}

/// Quantization with gamma encoding, each channel raised to `1 / gamma` after range reduction.
pub fn to_rgb8_gamma(c: Color, gamma: f32) -> [u8; 3] {
    if gamma == 1.0 {
        return to_rgb8(c);
    }
    let encoded = max_to_one(c).map(|x| x.clamp(0.0, 1.0).powf(1.0 / gamma));
    return to_rgb8(encoded);
}

/// Inverse of [`to_rgb8_gamma`].
pub fn from_rgb8_gamma(c: [u8; 3], gamma: f32) -> Color {
    if gamma == 1.0 {
        return from_rgb8(c);
    }
    return from_rgb8(c).map(|x| x.powf(gamma));
}
