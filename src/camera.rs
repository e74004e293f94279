use std::f32::consts::PI;

use nalgebra as na;
use na::{matrix, vector};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::RenderError;
use crate::input::{CameraInput, Key};
use crate::math::{Mat4, Point3, Vec3};

/// Largest pitch the camera can reach. Keeps forward away from world up so the cross products
/// building the basis never degenerate.
const MAX_PITCH: f32 = 89.0 * PI / 180.0;

/// Key presses are converted to the same units as mouse movement with this factor.
const KEY_ROTATION_RATE: f32 = 4.0;

/// Depth sign convention of the camera-local frame.
///
/// `Left` looks along camera-local +z, `Right` along camera-local -z. The projection is adapted
/// together with the basis, so both conventions map a world point to the same clip coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub fn flipped(self) -> Self {
        return match self {
            Handedness::Left => Handedness::Right,
            Handedness::Right => Handedness::Left,
        };
    }

    /// Sign applied to forward to get the third basis column.
    fn sign(self) -> f32 {
        return match self {
            Handedness::Left => 1.0,
            Handedness::Right => -1.0,
        };
    }
}

/// First person camera producing projection, basis (ONB) and view matrices.
///
/// The view matrix is always the inverse of the current basis matrix, every mutation of position
/// or orientation goes through a path that recomputes it.
#[derive(Debug, Clone)]
pub struct Camera {
    position: Point3,
    world_up: Vec3,
    forward: Vec3,
    right: Vec3,
    up: Vec3,
    yaw: f32,
    pitch: f32,
    tan_half_fov: f32,
    aspect_ratio: f32,
    near: f32,
    far: f32,
    speed: f32,
    rotation_speed: f32,
    handedness: Handedness,
    projection: Mat4,
    basis: Mat4,
    view: Mat4,
}

fn validate_aspect_ratio(aspect_ratio: f32) -> Result<(), RenderError> {
    if !aspect_ratio.is_finite() || aspect_ratio <= 0.0 {
        return Err(RenderError::invalid("aspect_ratio", aspect_ratio, "must be finite and positive"));
    }
    return Ok(());
}

impl Camera {
    /// Creates a camera at `position` looking along world +z.
    ///
    /// `fov` is the vertical field of view in radians. Fails with `InvalidParameter` for a
    /// degenerate field of view, non positive aspect ratio or near plane, and a far plane that is
    /// not strictly behind the near one.
    pub fn new(
        position: Point3,
        fov: f32,
        aspect_ratio: f32,
        near: f32,
        far: f32,
        handedness: Handedness,
    ) -> Result<Self, RenderError> {
        if !fov.is_finite() || fov <= 0.0 || fov >= PI {
            return Err(RenderError::invalid("fov", fov, "must lie strictly between 0 and pi"));
        }
        let tan_half_fov = (fov / 2.0).tan();
        if !tan_half_fov.is_finite() || tan_half_fov <= 0.0 {
            return Err(RenderError::invalid("fov", fov, "tan(fov / 2) is not finite"));
        }
        validate_aspect_ratio(aspect_ratio)?;
        if !near.is_finite() || near <= 0.0 {
            return Err(RenderError::invalid("near", near, "must be finite and positive"));
        }
        if !far.is_finite() || far - near <= 0.0 {
            return Err(RenderError::invalid("far", far, "must lie strictly behind the near plane"));
        }
        if !(position.x.is_finite() && position.y.is_finite() && position.z.is_finite()) {
            return Err(RenderError::invalid("position", position.coords.norm(), "must be finite"));
        }

        let mut camera = Self {
            position,
            world_up: Vec3::y(),
            forward: Vec3::z(),
            right: Vec3::x(),
            up: Vec3::y(),
            yaw: 0.0,
            pitch: 0.0,
            tan_half_fov,
            aspect_ratio,
            near,
            far,
            speed: 10.0,
            rotation_speed: 0.5,
            handedness,
            projection: Mat4::identity(),
            basis: Mat4::identity(),
            view: Mat4::identity(),
        };
        camera.calculate_projection_matrix();
        camera.rotation_update();
        return Ok(camera);
    }

    /// Sets translation speed (units per second) and rotation speed (radians per unit of mouse
    /// movement per second).
    pub fn with_speed(mut self, speed: f32, rotation_speed: f32) -> Self {
        self.speed = speed;
        self.rotation_speed = rotation_speed;
        return self;
    }

    /// Sets absolute orientation angles in radians. Pitch is clamped.
    pub fn with_orientation(mut self, yaw: f32, pitch: f32) -> Self {
        self.yaw = 0.0;
        self.pitch = 0.0;
        self.rotate(yaw, pitch);
        return self;
    }

    /// Applies one frame worth of input. Returns true if position or orientation changed.
    pub fn update(&mut self, delta_time: f32, input: &CameraInput) -> bool {
        let rotated = self.mouse_movement(delta_time, input);
        let moved = self.translation(delta_time, input);
        if moved {
            self.movement_update();
        }
        return moved || rotated;
    }

    fn mouse_movement(&mut self, delta_time: f32, input: &CameraInput) -> bool {
        let keys = &input.keys;
        let dx = input.mouse_delta.x + KEY_ROTATION_RATE * keys.axis(Key::YawLeft, Key::YawRight);
        // Mouse y grows downwards, pitch grows upwards.
        let dy = input.mouse_delta.y + KEY_ROTATION_RATE * keys.axis(Key::PitchUp, Key::PitchDown);
        if dx == 0.0 && dy == 0.0 {
            return false;
        }
        let step = self.rotation_speed * delta_time;
        self.rotate(dx * step, -dy * step);
        return true;
    }

    fn translation(&mut self, delta_time: f32, input: &CameraInput) -> bool {
        let keys = &input.keys;
        let direction = self.forward * keys.axis(Key::Backward, Key::Forward)
            + self.right * keys.axis(Key::Left, Key::Right)
            + self.world_up * keys.axis(Key::Down, Key::Up);
        if direction == Vec3::zeros() {
            return false;
        }
        self.position += direction * self.speed * delta_time;
        return true;
    }

    /// Turns the camera by the given yaw and pitch deltas in radians.
    pub fn rotate(&mut self, yaw_delta: f32, pitch_delta: f32) {
        self.yaw += yaw_delta;
        self.pitch = (self.pitch + pitch_delta).clamp(-MAX_PITCH, MAX_PITCH);
        self.forward = vector![
            self.yaw.sin() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.cos() * self.pitch.cos()
        ]
        .normalize();
        self.rotation_update();
    }

    pub fn set_position(&mut self, position: Point3) {
        self.position = position;
        self.movement_update();
    }

    /// Rebuilds the projection for a new viewport shape.
    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) -> Result<(), RenderError> {
        validate_aspect_ratio(aspect_ratio)?;
        self.aspect_ratio = aspect_ratio;
        self.calculate_projection_matrix();
        return Ok(());
    }

    /// Moves the camera to another depth sign convention.
    ///
    /// Negates the depth column of the projection and the forward column of the basis, then
    /// rederives the view matrix. Switching to the current convention is a no-op, switching away
    /// and back restores every matrix exactly. Returns true if anything changed.
    pub fn switch_render_mode(&mut self, handedness: Handedness) -> bool {
        if handedness == self.handedness {
            return false;
        }
        self.handedness = handedness;
        self.projection[(2, 2)] = -self.projection[(2, 2)];
        self.projection[(3, 2)] = -self.projection[(3, 2)];
        for row in 0..3 {
            self.basis[(row, 2)] = -self.basis[(row, 2)];
        }
        self.calculate_view_matrix();
        debug!(?handedness, "camera switched depth convention");
        return true;
    }

    /// Perspective projection with a [0, 1] depth range.
    fn calculate_projection_matrix(&mut self) {
        let (n, f) = (self.near, self.far);
        let depth_scale = f / (f - n);
        self.projection = matrix![
            1.0 / (self.aspect_ratio * self.tan_half_fov), 0.0, 0.0, 0.0;
            0.0, 1.0 / self.tan_half_fov, 0.0, 0.0;
            0.0, 0.0, depth_scale, -n * depth_scale;
            0.0, 0.0, 1.0, 0.0
        ];
        if self.handedness == Handedness::Right {
            self.projection[(2, 2)] = -self.projection[(2, 2)];
            self.projection[(3, 2)] = -self.projection[(3, 2)];
        }
    }

    /// Rederives right and up from forward and world up, then the whole basis.
    fn rotation_update(&mut self) {
        self.right = self.world_up.cross(&self.forward).normalize();
        self.up = self.forward.cross(&self.right).normalize();
        let depth_axis = self.forward * self.handedness.sign();
        self.basis = Mat4::from_columns(&[
            self.right.to_homogeneous(),
            self.up.to_homogeneous(),
            depth_axis.to_homogeneous(),
            self.position.to_homogeneous(),
        ]);
        self.calculate_view_matrix();
    }

    /// Only the translation column changes when the camera moves.
    fn movement_update(&mut self) {
        self.basis.set_column(3, &self.position.to_homogeneous());
        self.calculate_view_matrix();
    }

    fn calculate_view_matrix(&mut self) {
        match self.basis.try_inverse() {
            Some(view) => self.view = view,
            // Basis columns are orthonormal by construction, this would be a bug upstream.
            None => error!(basis = ?self.basis, "camera basis is not invertible, keeping previous view"),
        }
    }

    pub fn projection(&self) -> &Mat4 {
        return &self.projection;
    }

    pub fn basis(&self) -> &Mat4 {
        return &self.basis;
    }

    pub fn view(&self) -> &Mat4 {
        return &self.view;
    }

    pub fn view_projection(&self) -> Mat4 {
        return self.projection * self.view;
    }

    pub fn position(&self) -> Point3 {
        return self.position;
    }

    pub fn forward(&self) -> Vec3 {
        return self.forward;
    }

    pub fn right(&self) -> Vec3 {
        return self.right;
    }

    pub fn up(&self) -> Vec3 {
        return self.up;
    }

    pub fn handedness(&self) -> Handedness {
        return self.handedness;
    }

    pub fn aspect_ratio(&self) -> f32 {
        return self.aspect_ratio;
    }

    pub fn near(&self) -> f32 {
        return self.near;
    }

    pub fn far(&self) -> f32 {
        return self.far;
    }
}
