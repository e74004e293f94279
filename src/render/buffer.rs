use std::path::Path;

use image::RgbImage;

use crate::error::RenderError;
use crate::math::{from_rgb8_gamma, to_rgb8_gamma, Color};

/// Value every depth slot holds before anything was drawn over it.
pub const CLEARED_DEPTH: f32 = f32::MAX;

/// Color and depth targets of the software rasterizer.
///
/// Both buffers are row-major with (0, 0) at the top left. Color is stored as raw rgb8 so it can
/// be handed to the presentation layer without conversion. Linear colors are gamma encoded on
/// the way in and decoded when read back for blending.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    gamma: f32,
    depth: Vec<f32>,      // Depth of the closest fragment so far, CLEARED_DEPTH where untouched.
    render_data: Vec<u8>, // Flat rgb8 triples.
    depth_data: Vec<u8>,  // Normalized depth for visualization, filled on demand.
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        if width == 0 {
            return Err(RenderError::invalid("width", 0.0, "frame buffer needs at least one column"));
        }
        if height == 0 {
            return Err(RenderError::invalid("height", 0.0, "frame buffer needs at least one row"));
        }
        let n_pixels = (width as usize) * (height as usize);
        return Ok(Self {
            width,
            height,
            gamma: 1.0,
            depth: vec![CLEARED_DEPTH; n_pixels],
            render_data: vec![0; 3 * n_pixels],
            depth_data: vec![0; 3 * n_pixels],
        });
    }

    pub fn width(&self) -> u32 {
        return self.width;
    }

    pub fn height(&self) -> u32 {
        return self.height;
    }

    pub fn gamma(&self) -> f32 {
        return self.gamma;
    }

    /// Sets the output gamma. Already written pixels keep their encoding.
    pub fn set_gamma(&mut self, gamma: f32) -> Result<(), RenderError> {
        if !gamma.is_finite() || gamma <= 0.0 {
            return Err(RenderError::invalid("gamma", gamma, "must be finite and positive"));
        }
        self.gamma = gamma;
        return Ok(());
    }

    /// Row-major index of a pixel.
    pub fn index(&self, x: u32, y: u32) -> usize {
        return x as usize + (y as usize) * (self.width as usize);
    }

    /// Sets all pixels to `color`. Depth is untouched.
    pub fn clear_color(&mut self, color: Color) {
        let rgb = to_rgb8_gamma(color, self.gamma);
        for pixel in self.render_data.chunks_exact_mut(3) {
            pixel.copy_from_slice(&rgb);
        }
    }

    /// Resets every depth slot to the cleared value.
    pub fn reset_depth(&mut self) {
        self.depth.fill(CLEARED_DEPTH);
    }

    pub fn depth(&self) -> &[f32] {
        return &self.depth[..];
    }

    pub fn depth_at(&self, x: u32, y: u32) -> f32 {
        return self.depth[self.index(x, y)];
    }

    pub(crate) fn depth_at_index(&self, index: usize) -> f32 {
        return self.depth[index];
    }

    pub(crate) fn set_depth_at_index(&mut self, index: usize, depth: f32) {
        self.depth[index] = depth;
    }

    pub fn color_at(&self, x: u32, y: u32) -> [u8; 3] {
        return self.color_at_index(self.index(x, y));
    }

    pub(crate) fn color_at_index(&self, index: usize) -> [u8; 3] {
        let i = 3 * index;
        return [self.render_data[i], self.render_data[i + 1], self.render_data[i + 2]];
    }

    /// Stored color decoded back to linear.
    pub(crate) fn linear_color_at_index(&self, index: usize) -> Color {
        return from_rgb8_gamma(self.color_at_index(index), self.gamma);
    }

    pub(crate) fn set_color_at_index(&mut self, index: usize, color: Color) {
        let i = 3 * index;
        self.render_data[i..i + 3].copy_from_slice(&to_rgb8_gamma(color, self.gamma));
    }

    /// Sets a pixel to a color. Coordinates outside of the buffer are ignored.
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        if x >= self.width || y >= self.height {
            return;
        }
        let index = self.index(x, y);
        self.set_color_at_index(index, color);
    }

    /// Rendered image as a slice of rgb8 values, 3 * (number of pixels) long.
    pub fn as_render_data(&self) -> &[u8] {
        return &self.render_data[..];
    }

    /// Image of the depth buffer, near fragments bright, untouched pixels black.
    /// Lazy in a sense, that color data for the image is calculated only if this call is made.
    pub fn as_depth_data(&mut self) -> &[u8] {
        let written = self.depth.iter().filter(|d| **d != CLEARED_DEPTH);
        let (z_min, z_max) = written.fold((f32::MAX, f32::MIN), |(lo, hi), d| (lo.min(*d), hi.max(*d)));
        let scale = (z_max - z_min).max(f32::EPSILON);
        for (i, d) in self.depth.iter().enumerate() {
            let value = if *d == CLEARED_DEPTH {
                0
            } else {
                (255.0 * (1.0 - (d - z_min) / scale)).round().clamp(1.0, 255.0) as u8
            };
            self.depth_data[3 * i..3 * i + 3].fill(value);
        }
        return &self.depth_data[..];
    }

    pub fn to_image(&self) -> RgbImage {
        // Sizes always match, the buffer is allocated from width and height.
        return RgbImage::from_fn(self.width, self.height, |x, y| image::Rgb(self.color_at(x, y)));
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), RenderError> {
        self.to_image().save_with_format(path, image::ImageFormat::Png)?;
        return Ok(());
    }
}
