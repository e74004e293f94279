use crate::math::Vec2;

/// Camera actions that can be bound to physical keys by the platform layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
    YawLeft,
    YawRight,
    PitchUp,
    PitchDown,
}

impl Key {
    pub const COUNT: usize = 10;

    fn index(self) -> usize {
        return self as usize;
    }
}

/// Raw sampled keyboard state, one pressed flag per [`Key`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyboardState {
    pressed: [bool; Key::COUNT],
}

impl KeyboardState {
    pub fn new() -> Self {
        return Self::default();
    }

    pub fn set(&mut self, key: Key, pressed: bool) {
        self.pressed[key.index()] = pressed;
    }

    pub fn press(&mut self, key: Key) {
        self.set(key, true);
    }

    pub fn release(&mut self, key: Key) {
        self.set(key, false);
    }

    pub fn is_pressed(&self, key: Key) -> bool {
        return self.pressed[key.index()];
    }

    /// -1, 0 or 1 depending on which of the two opposing keys is held. If both are held the
    /// positive one loses, same as the first-match key handling of the platform layer.
    pub fn axis(&self, negative: Key, positive: Key) -> f32 {
        if self.is_pressed(negative) {
            return -1.0;
        }
        if self.is_pressed(positive) {
            return 1.0;
        }
        return 0.0;
    }
}

/// Everything the camera samples from the platform in one frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct CameraInput {
    pub keys: KeyboardState,
    /// Mouse movement since the last frame, x to the right, y downwards.
    pub mouse_delta: Vec2,
}

impl CameraInput {
    pub fn from_keys(keys: KeyboardState) -> Self {
        return Self {
            keys,
            mouse_delta: Vec2::zeros(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_and_release() {
        let mut keys = KeyboardState::new();
        assert!(!keys.is_pressed(Key::Forward));
        keys.press(Key::Forward);
        assert!(keys.is_pressed(Key::Forward));
        assert!(!keys.is_pressed(Key::Backward));
        keys.release(Key::Forward);
        assert!(!keys.is_pressed(Key::Forward));
    }

    #[test]
    fn axis_prefers_negative_key() {
        let mut keys = KeyboardState::new();
        assert_eq!(keys.axis(Key::Backward, Key::Forward), 0.0);
        keys.press(Key::Forward);
        assert_eq!(keys.axis(Key::Backward, Key::Forward), 1.0);
        keys.press(Key::Backward);
        assert_eq!(keys.axis(Key::Backward, Key::Forward), -1.0);
    }
}
