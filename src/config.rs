use std::collections::BTreeMap;
use std::path::Path;

use nalgebra::vector;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::camera::Camera;
use crate::error::RenderError;
use crate::math::{Color, Point3};
use crate::render::{FrustumCulling, RasterizerSettings, RenderMode};
use crate::scene::{DirectionalLight, Lighting, MaterialDesc, MaterialLibrary, RoughnessPreset};

/// Startup parameters of the renderer, read from a YAML file. Missing keys take their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub camera_position: [f32; 3],
    pub yaw_degrees: f32,
    pub pitch_degrees: f32,
    pub speed: f32,          // Units per second.
    pub rotation_speed: f32, // Radians per unit of mouse movement per second.
    pub render_mode: RenderMode,
    pub frustum_culling: FrustumCulling,
    pub near_clipping: bool,
    pub light_direction: [f32; 3],
    pub light_color: [f32; 3],
    pub light_intensity: f32,
    pub ambient: f32,
    pub clear_color: [f32; 3],
    pub gamma: f32,
    /// Added to the built-in palette, same names replace the built-in entry.
    pub materials: BTreeMap<String, MaterialDesc>,
    pub asset_material: String, // Used for meshes loaded from OBJ files.
}

impl Default for RenderConfig {
    fn default() -> Self {
        return Self {
            width: 800,
            height: 800,
            fov_degrees: 60.0,
            near: 0.1,
            far: 100.0,
            camera_position: [0.0, 0.0, -3.0],
            yaw_degrees: 0.0,
            pitch_degrees: 0.0,
            speed: 10.0,
            rotation_speed: 0.5,
            render_mode: RenderMode::Software,
            frustum_culling: FrustumCulling::AnyVertexInside,
            near_clipping: true,
            light_direction: [0.577, -0.577, 0.577],
            light_color: [1.0, 1.0, 1.0],
            light_intensity: 3.0,
            ambient: 0.03,
            clear_color: [0.05, 0.05, 0.08],
            gamma: 0.9,
            materials: BTreeMap::new(),
            asset_material: String::from("clay"),
        };
    }
}

impl RenderConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let config = Self::from_yaml_str(&std::fs::read_to_string(path)?)?;
        info!(path = %path.display(), "loaded render config");
        return Ok(config);
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, RenderError> {
        return Ok(serde_yaml::from_str(yaml)?);
    }

    pub fn aspect_ratio(&self) -> f32 {
        return self.width as f32 / self.height as f32;
    }

    /// Builds the camera described by this config, with the depth convention of the initial
    /// render mode.
    pub fn camera(&self) -> Result<Camera, RenderError> {
        let [x, y, z] = self.camera_position;
        let camera = Camera::new(
            Point3::new(x, y, z),
            self.fov_degrees.to_radians(),
            self.aspect_ratio(),
            self.near,
            self.far,
            self.render_mode.handedness(),
        )?;
        return Ok(camera
            .with_speed(self.speed, self.rotation_speed)
            .with_orientation(self.yaw_degrees.to_radians(), self.pitch_degrees.to_radians()));
    }

    pub fn rasterizer_settings(&self) -> RasterizerSettings {
        return RasterizerSettings {
            frustum_culling: self.frustum_culling,
            near_clipping: self.near_clipping,
            gamma: self.gamma,
        };
    }

    pub fn lighting(&self) -> Lighting {
        let [dx, dy, dz] = self.light_direction;
        let [r, g, b] = self.light_color;
        return Lighting {
            lights: vec![DirectionalLight::new(vector![dx, dy, dz], vector![r, g, b], self.light_intensity)],
            ambient: Color::repeat(self.ambient),
        };
    }

    pub fn clear_color(&self) -> Color {
        let [r, g, b] = self.clear_color;
        return vector![r, g, b];
    }

    /// Built-in palette overlaid with the materials of this config.
    pub fn material_library(&self) -> MaterialLibrary {
        let mut library = MaterialLibrary::new();
        for (name, desc) in builtin_materials() {
            library.insert(name, desc);
        }
        for (name, desc) in &self.materials {
            library.insert(name.clone(), desc.clone());
        }
        return library;
    }
}

fn builtin_materials() -> [(&'static str, MaterialDesc); 5] {
    let cook_torrance = |color: [f32; 3], metal: bool, roughness: RoughnessPreset| MaterialDesc::CookTorrance {
        color,
        metal,
        roughness,
    };
    return [
        ("gold", cook_torrance([1.0, 0.78, 0.34], true, RoughnessPreset::HalfRough)),
        (
            "green_plastic",
            MaterialDesc::LambertPhong {
                color: [0.2, 0.6, 0.25],
                diffuse_reflectance: 0.9,
                specular_reflectance: 0.5,
                phong_exponent: 32.0,
            },
        ),
        ("stone", cook_torrance([0.6, 0.6, 0.65], false, RoughnessPreset::Rough)),
        ("sky_blue_glass", cook_torrance([0.3, 0.5, 1.0], false, RoughnessPreset::Smooth)),
        ("clay", cook_torrance([0.8, 0.8, 0.8], false, RoughnessPreset::HalfRough)),
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Handedness;
    use crate::scene::Material;

    #[test]
    fn empty_mapping_gives_defaults() {
        assert_eq!(RenderConfig::from_yaml_str("{}").unwrap(), RenderConfig::default());
    }

    #[test]
    fn partial_config_overrides_some_keys() {
        let yaml = "
width: 320
height: 240
render_mode: hardware
frustum_culling: all_vertices_inside
near_clipping: false
camera_position: [1.0, 2.0, 3.0]
";
        let config = RenderConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.width, 320);
        assert_eq!(config.height, 240);
        assert_eq!(config.render_mode, RenderMode::Hardware);
        assert_eq!(config.fov_degrees, 60.0);
        assert_eq!(
            config.rasterizer_settings(),
            RasterizerSettings {
                frustum_culling: FrustumCulling::AllVerticesInside,
                near_clipping: false,
                gamma: 0.9,
            }
        );

        let camera = config.camera().unwrap();
        assert_eq!(camera.handedness(), Handedness::Left);
        assert_eq!(camera.position(), Point3::new(1.0, 2.0, 3.0));
        assert!((camera.aspect_ratio() - 320.0 / 240.0).abs() < 1e-6);
    }

    #[test]
    fn malformed_yaml_is_a_config_error() {
        let result = RenderConfig::from_yaml_str("width: wide");
        assert!(matches!(result, Err(RenderError::Config(_))));
    }

    #[test]
    fn invalid_camera_is_rejected() {
        let config = RenderConfig {
            fov_degrees: 0.0,
            ..RenderConfig::default()
        };
        assert!(matches!(config.camera(), Err(RenderError::InvalidParameter { name: "fov", .. })));

        let config = RenderConfig {
            near: 5.0,
            far: 5.0,
            ..RenderConfig::default()
        };
        assert!(matches!(config.camera(), Err(RenderError::InvalidParameter { name: "far", .. })));
    }

    #[test]
    fn lighting_from_config() {
        let config = RenderConfig::default();
        let lighting = config.lighting();
        assert_eq!(lighting.lights.len(), 1);
        assert_eq!(lighting.lights[0].intensity, 3.0);
        assert_eq!(lighting.ambient, Color::repeat(0.03));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = RenderConfig::load("definitely/not/here.yaml");
        assert!(matches!(result, Err(RenderError::Io(_))));
    }

    #[test]
    fn gamma_reaches_the_rasterizer() {
        assert_eq!(RenderConfig::default().rasterizer_settings().gamma, 0.9);
        let config = RenderConfig::from_yaml_str("gamma: 2.2").unwrap();
        assert_eq!(config.rasterizer_settings().gamma, 2.2);
    }

    #[test]
    fn materials_from_config_extend_the_palette() {
        let yaml = "
asset_material: copper
materials:
  copper:
    kind: cook_torrance
    color: [0.95, 0.64, 0.54]
    metal: true
    roughness: smooth
  gold:
    kind: lambert
    color: [1.0, 0.84, 0.0]
";
        let config = RenderConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.asset_material, "copper");
        let mut library = config.material_library();
        assert!(library.contains("copper"));
        assert!(library.contains("stone"));
        assert!(matches!(*library.get("copper").unwrap(), Material::CookTorrance(_)));
        // Replaced built-in.
        assert!(matches!(*library.get("gold").unwrap(), Material::Lambert(_)));
    }

    #[test]
    fn builtin_palette_is_valid() {
        let mut library = RenderConfig::default().material_library();
        let names: Vec<String> = library.names().map(String::from).collect();
        assert_eq!(names.len(), 5);
        for name in &names {
            library.get(name).unwrap();
        }
        assert!(library.contains(&RenderConfig::default().asset_material));
    }

    #[test]
    fn unknown_material_kind_is_a_config_error() {
        let yaml = "materials:\n  odd:\n    kind: velvet\n    color: [1.0, 1.0, 1.0]\n";
        assert!(matches!(RenderConfig::from_yaml_str(yaml), Err(RenderError::Config(_))));
    }
}
