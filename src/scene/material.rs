//! BRDF materials.
//!
//! All shading directions point away from the surface: `light_dir` towards the light, `view_dir`
//! towards the eye. Every dot product that ends up in a division or a power is clamped to the
//! smallest positive float first, so grazing angles give finite colors.

use std::collections::{BTreeMap, HashMap};
use std::f32::consts::PI;
use std::sync::Arc;

use nalgebra::vector;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::RenderError;
use crate::math::{clamp_dot, normalize_or_zero, Color, Vec3, MIN_POSITIVE};

/// Base reflectivity used for all non-metals.
pub const DIELECTRIC_REFLECTIVITY: f32 = 0.04;

fn validate_unit(name: &'static str, value: f32) -> Result<f32, RenderError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(RenderError::invalid(name, value, "must lie in [0, 1]"));
    }
    return Ok(value);
}

fn validate_color(name: &'static str, color: Color) -> Result<Color, RenderError> {
    for c in color.iter() {
        if !c.is_finite() || *c < 0.0 {
            return Err(RenderError::invalid(name, *c, "channels must be finite and non negative"));
        }
    }
    return Ok(color);
}

/// Lambert diffuse BRDF: all incident radiance is scattered equally over the hemisphere.
pub fn lambert(diffuse_color: Color, diffuse_reflectance: Color) -> Color {
    return diffuse_color.component_mul(&diffuse_reflectance) / PI;
}

/// Phong specular lobe around the mirrored light direction.
pub fn phong(specular_reflectance: f32, exponent: f32, light_dir: Vec3, view_dir: Vec3, normal: Vec3) -> f32 {
    let reflected = -light_dir + normal * (2.0 * light_dir.dot(&normal));
    let cos_angle = normalize_or_zero(reflected).dot(&view_dir);
    if cos_angle > 0.0 {
        return specular_reflectance * cos_angle.powf(exponent);
    }
    return 0.0;
}

/// Trowbridge-Reitz (GGX) normal distribution, the share of microfacets aligned with `half`.
/// Alpha is roughness squared.
pub fn trowbridge_reitz_ggx(normal: Vec3, half: Vec3, roughness: f32) -> f32 {
    let alpha_sq = roughness.powi(4);
    let n_dot_h = clamp_dot(normal.dot(&half));
    let d = n_dot_h * n_dot_h * (alpha_sq - 1.0) + 1.0;
    return alpha_sq / (PI * d * d).max(MIN_POSITIVE);
}

/// Schlick approximation of the Fresnel term.
pub fn schlick(half: Vec3, view_dir: Vec3, base_reflectivity: Color) -> Color {
    let h_dot_v = clamp_dot(half.dot(&view_dir));
    let one = vector![1.0, 1.0, 1.0];
    return base_reflectivity + (one - base_reflectivity) * (1.0 - h_dot_v).powi(5);
}

/// Schlick-GGX geometry term for a single direction with remapped roughness `k`.
pub fn schlick_ggx(normal: Vec3, dir: Vec3, k: f32) -> f32 {
    let n_dot_v = clamp_dot(normalize_or_zero(normal).dot(&normalize_or_zero(dir)));
    return n_dot_v / (n_dot_v * (1.0 - k) + k).max(MIN_POSITIVE);
}

/// Smith geometry term: masking along the view direction times shadowing along the light one.
pub fn smith(normal: Vec3, view_dir: Vec3, light_dir: Vec3, k: f32) -> f32 {
    return schlick_ggx(normal, view_dir, k) * schlick_ggx(normal, light_dir, k);
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lambert {
    diffuse_color: Color,
    diffuse_reflectance: f32,
}

impl Lambert {
    pub fn new(diffuse_color: Color, diffuse_reflectance: f32) -> Result<Self, RenderError> {
        return Ok(Self {
            diffuse_color: validate_color("diffuse_color", diffuse_color)?,
            diffuse_reflectance: validate_unit("diffuse_reflectance", diffuse_reflectance)?,
        });
    }

    pub fn shade(&self) -> Color {
        return lambert(self.diffuse_color, Color::repeat(self.diffuse_reflectance));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LambertPhong {
    diffuse_color: Color,
    diffuse_reflectance: f32,
    specular_reflectance: f32,
    phong_exponent: f32,
}

impl LambertPhong {
    pub fn new(
        diffuse_color: Color,
        diffuse_reflectance: f32,
        specular_reflectance: f32,
        phong_exponent: f32,
    ) -> Result<Self, RenderError> {
        if !phong_exponent.is_finite() || phong_exponent < 1.0 {
            return Err(RenderError::invalid("phong_exponent", phong_exponent, "must be at least 1"));
        }
        return Ok(Self {
            diffuse_color: validate_color("diffuse_color", diffuse_color)?,
            diffuse_reflectance: validate_unit("diffuse_reflectance", diffuse_reflectance)?,
            specular_reflectance: validate_unit("specular_reflectance", specular_reflectance)?,
            phong_exponent,
        });
    }

    pub fn shade(&self, normal: Vec3, light_dir: Vec3, view_dir: Vec3) -> Color {
        let diffuse = lambert(self.diffuse_color, Color::repeat(self.diffuse_reflectance));
        let specular = phong(self.specular_reflectance, self.phong_exponent, light_dir, view_dir, normal);
        return diffuse + Color::repeat(specular);
    }
}

/// Cook-Torrance microfacet BRDF with a Lambert diffuse lobe for dielectrics.
#[derive(Debug, Clone, PartialEq)]
pub struct CookTorrance {
    diffuse_color: Color,
    diffuse_reflectance: f32,
    roughness: f32,
    metalness: bool,
    base_reflectivity: Color,
}

impl CookTorrance {
    pub fn new(
        diffuse_color: Color,
        diffuse_reflectance: f32,
        roughness: f32,
        metalness: bool,
        base_reflectivity: Color,
    ) -> Result<Self, RenderError> {
        return Ok(Self {
            diffuse_color: validate_color("diffuse_color", diffuse_color)?,
            diffuse_reflectance: validate_unit("diffuse_reflectance", diffuse_reflectance)?,
            roughness: validate_unit("roughness", roughness)?,
            metalness,
            base_reflectivity: validate_color("base_reflectivity", base_reflectivity)?,
        });
    }

    /// Metals reflect with their own color.
    pub fn metal(albedo: Color, roughness: f32) -> Result<Self, RenderError> {
        return Self::new(albedo, 1.0, roughness, true, albedo);
    }

    pub fn dielectric(albedo: Color, roughness: f32) -> Result<Self, RenderError> {
        return Self::new(albedo, 1.0, roughness, false, Color::repeat(DIELECTRIC_REFLECTIVITY));
    }

    pub fn shade(&self, normal: Vec3, light_dir: Vec3, view_dir: Vec3) -> Color {
        let mut half = normalize_or_zero(view_dir + light_dir);
        if half == Vec3::zeros() {
            half = normal;
        }
        let f = schlick(half, view_dir, self.base_reflectivity);
        let d = trowbridge_reitz_ggx(normal, half, self.roughness);
        let k = (self.roughness + 1.0).powi(2) / 8.0;
        let g = smith(normal, view_dir, light_dir, k);

        let denominator = 4.0 * clamp_dot(view_dir.dot(&normal)) * clamp_dot(light_dir.dot(&normal));
        let specular = f * (d * g) / denominator.max(MIN_POSITIVE);

        let kd = if self.metalness {
            Color::zeros()
        } else {
            vector![1.0, 1.0, 1.0] - f
        };
        let diffuse = lambert(self.diffuse_color, kd * self.diffuse_reflectance);
        return specular + diffuse;
    }

    pub fn roughness(&self) -> f32 {
        return self.roughness;
    }

    pub fn is_metal(&self) -> bool {
        return self.metalness;
    }
}

/// Surface description shared by every primitive that references it.
#[derive(Debug, Clone, PartialEq)]
pub enum Material {
    Lambert(Lambert),
    LambertPhong(LambertPhong),
    CookTorrance(CookTorrance),
}

impl Material {
    pub fn lambert(diffuse_color: Color, diffuse_reflectance: f32) -> Result<Self, RenderError> {
        return Ok(Material::Lambert(Lambert::new(diffuse_color, diffuse_reflectance)?));
    }

    pub fn lambert_phong(
        diffuse_color: Color,
        diffuse_reflectance: f32,
        specular_reflectance: f32,
        phong_exponent: f32,
    ) -> Result<Self, RenderError> {
        return Ok(Material::LambertPhong(LambertPhong::new(
            diffuse_color,
            diffuse_reflectance,
            specular_reflectance,
            phong_exponent,
        )?));
    }

    pub fn metal(albedo: Color, roughness: f32) -> Result<Self, RenderError> {
        return Ok(Material::CookTorrance(CookTorrance::metal(albedo, roughness)?));
    }

    pub fn dielectric(albedo: Color, roughness: f32) -> Result<Self, RenderError> {
        return Ok(Material::CookTorrance(CookTorrance::dielectric(albedo, roughness)?));
    }

    /// Evaluates the BRDF for one light and view direction pair.
    pub fn shade(&self, normal: Vec3, light_dir: Vec3, view_dir: Vec3) -> Color {
        return match self {
            Material::Lambert(m) => m.shade(),
            Material::LambertPhong(m) => m.shade(normal, light_dir, view_dir),
            Material::CookTorrance(m) => m.shade(normal, light_dir, view_dir),
        };
    }

    /// Color used for the ambient term.
    pub fn albedo(&self) -> Color {
        return match self {
            Material::Lambert(m) => m.diffuse_color,
            Material::LambertPhong(m) => m.diffuse_color,
            Material::CookTorrance(m) => m.diffuse_color,
        };
    }
}

/// Named roughness steps for Cook-Torrance materials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoughnessPreset {
    Smooth,
    HalfRough,
    Rough,
}

impl RoughnessPreset {
    pub fn value(self) -> f32 {
        return match self {
            RoughnessPreset::Smooth => 0.1,
            RoughnessPreset::HalfRough => 0.5,
            RoughnessPreset::Rough => 1.0,
        };
    }
}

fn full_reflectance() -> f32 {
    return 1.0;
}

/// Serializable recipe for a [`Material`], as written in the render config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MaterialDesc {
    Lambert {
        color: [f32; 3],
        #[serde(default = "full_reflectance")]
        reflectance: f32,
    },
    LambertPhong {
        color: [f32; 3],
        diffuse_reflectance: f32,
        specular_reflectance: f32,
        phong_exponent: f32,
    },
    CookTorrance {
        color: [f32; 3],
        metal: bool,
        roughness: RoughnessPreset,
    },
}

impl MaterialDesc {
    pub fn build(&self) -> Result<Material, RenderError> {
        return match self {
            MaterialDesc::Lambert { color, reflectance } => Material::lambert(Color::from(*color), *reflectance),
            MaterialDesc::LambertPhong {
                color,
                diffuse_reflectance,
                specular_reflectance,
                phong_exponent,
            } => Material::lambert_phong(
                Color::from(*color),
                *diffuse_reflectance,
                *specular_reflectance,
                *phong_exponent,
            ),
            MaterialDesc::CookTorrance { color, metal: true, roughness } => {
                Material::metal(Color::from(*color), roughness.value())
            }
            MaterialDesc::CookTorrance { color, metal: false, roughness } => {
                Material::dielectric(Color::from(*color), roughness.value())
            }
        };
    }
}

/// Named materials, built on first lookup and shared afterwards.
///
/// Names with identical recipes resolve to the same instance.
#[derive(Debug, Default)]
pub struct MaterialLibrary {
    descriptions: BTreeMap<String, MaterialDesc>,
    built: HashMap<String, Arc<Material>>,
    instances: Vec<(MaterialDesc, Arc<Material>)>,
}

impl MaterialLibrary {
    pub fn new() -> Self {
        return Self::default();
    }

    /// Adds or replaces a recipe. A replaced name is rebuilt on its next lookup.
    pub fn insert(&mut self, name: impl Into<String>, desc: MaterialDesc) {
        let name = name.into();
        self.built.remove(&name);
        self.descriptions.insert(name, desc);
    }

    pub fn contains(&self, name: &str) -> bool {
        return self.descriptions.contains_key(name);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        return self.descriptions.keys().map(String::as_str);
    }

    /// Number of distinct material instances built so far.
    pub fn instance_count(&self) -> usize {
        return self.instances.len();
    }

    pub fn get(&mut self, name: &str) -> Result<Arc<Material>, RenderError> {
        if let Some(material) = self.built.get(name) {
            return Ok(material.clone());
        }
        let Some(desc) = self.descriptions.get(name) else {
            warn!(material = name, "material not found in library");
            return Err(RenderError::invalid("material", f32::NAN, "no material with this name"));
        };

        let material = match self.instances.iter().find(|(d, _)| d == desc) {
            Some((_, material)) => material.clone(),
            None => {
                let material = Arc::new(desc.build()?);
                debug!(material = name, "built material");
                self.instances.push((desc.clone(), material.clone()));
                material
            }
        };
        self.built.insert(name.to_string(), material.clone());
        return Ok(material);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_finite(c: Color) {
        assert!(c.iter().all(|x| x.is_finite()), "not finite: {}", c);
    }

    #[test]
    fn lambert_is_constant() {
        let m = Material::lambert(vector![0.5, 1.0, 0.0], 0.8).unwrap();
        let a = m.shade(Vec3::z(), Vec3::z(), Vec3::z());
        let b = m.shade(Vec3::z(), Vec3::x(), Vec3::y());
        assert_eq!(a, b);
        assert!((a - vector![0.4, 0.8, 0.0] / PI).norm() < 1e-6);
    }

    #[test]
    fn ggx_peaks_at_one_over_pi_for_full_roughness() {
        let d = trowbridge_reitz_ggx(Vec3::z(), Vec3::z(), 1.0);
        assert!((d - 1.0 / PI).abs() < 1e-6);
    }

    #[test]
    fn schlick_goes_from_base_to_white() {
        let f0 = Color::repeat(0.04);
        assert!((schlick(Vec3::z(), Vec3::z(), f0) - f0).norm() < 1e-6);
        let grazing = schlick(Vec3::z(), Vec3::x(), f0);
        assert!(grazing.iter().all(|c| *c > 0.99));
    }

    #[test]
    fn smith_is_one_at_normal_incidence() {
        let g = smith(Vec3::z(), Vec3::z(), Vec3::z(), 0.5);
        assert!((g - 1.0).abs() < 1e-6);
    }

    #[test]
    fn phong_only_inside_lobe() {
        let l = vector![1.0, 0.0, 1.0].normalize();
        let mirrored = vector![-1.0, 0.0, 1.0].normalize();
        assert!((phong(0.5, 10.0, l, mirrored, Vec3::z()) - 0.5).abs() < 1e-5);
        assert_eq!(phong(0.5, 10.0, l, l * -1.0, Vec3::z()), 0.0);
    }

    #[test]
    fn grazing_angles_stay_finite() {
        let materials = [
            Material::dielectric(vector![0.8, 0.2, 0.2], 0.0).unwrap(),
            Material::dielectric(vector![0.8, 0.2, 0.2], 1.0).unwrap(),
            Material::metal(vector![0.95, 0.93, 0.88], 0.0).unwrap(),
            Material::lambert_phong(vector![0.1, 0.1, 0.9], 1.0, 0.5, 60.0).unwrap(),
        ];
        let directions = [Vec3::x(), -Vec3::z(), vector![1.0, 0.0, 1e-8].normalize(), Vec3::z()];
        for m in &materials {
            for l in directions {
                for v in directions {
                    assert_finite(m.shade(Vec3::z(), l, v));
                }
            }
        }
    }

    #[test]
    fn rough_dielectric_does_not_amplify_energy() {
        let albedo = vector![0.8, 0.6, 0.4];
        let m = Material::dielectric(albedo, 1.0).unwrap();
        let out = m.shade(Vec3::z(), Vec3::z(), Vec3::z());
        for i in 0..3 {
            assert!(out[i] <= albedo[i] * 1.05, "channel {} = {}", i, out[i]);
            assert!(out[i] > 0.0);
        }
    }

    #[test]
    fn metals_have_no_diffuse_lobe() {
        let m = CookTorrance::metal(vector![1.0, 0.0, 0.0], 1.0).unwrap();
        let out = m.shade(Vec3::z(), Vec3::z(), Vec3::z());
        // Only the Fresnel tinted specular remains: F0 * D * G / 4 with D = 1 / pi and G = 1.
        assert!((out - vector![1.0, 0.0, 0.0] / (4.0 * PI)).norm() < 1e-5);
        assert!(m.is_metal());
    }

    #[test]
    fn constructors_validate_parameters() {
        assert!(Material::dielectric(Color::repeat(0.5), 1.5).is_err());
        assert!(Material::dielectric(Color::repeat(0.5), -0.1).is_err());
        assert!(Material::lambert(vector![f32::NAN, 0.0, 0.0], 1.0).is_err());
        assert!(Material::lambert(Color::repeat(0.5), 2.0).is_err());
        assert!(Material::lambert_phong(Color::repeat(0.5), 1.0, 0.5, 0.0).is_err());
        assert!(matches!(
            Material::metal(Color::repeat(0.5), 7.0),
            Err(RenderError::InvalidParameter { name: "roughness", .. })
        ));
    }

    #[test]
    fn descriptions_parse_from_yaml() {
        let yaml = "
gold:
  kind: cook_torrance
  color: [1.0, 0.78, 0.34]
  metal: true
  roughness: half_rough
white:
  kind: lambert
  color: [1.0, 1.0, 1.0]
blue:
  kind: lambert_phong
  color: [0.1, 0.2, 0.9]
  diffuse_reflectance: 0.9
  specular_reflectance: 0.5
  phong_exponent: 32.0
";
        let descs: BTreeMap<String, MaterialDesc> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            descs["gold"],
            MaterialDesc::CookTorrance {
                color: [1.0, 0.78, 0.34],
                metal: true,
                roughness: RoughnessPreset::HalfRough,
            }
        );
        assert_eq!(
            descs["white"],
            MaterialDesc::Lambert {
                color: [1.0, 1.0, 1.0],
                reflectance: 1.0,
            }
        );
        match descs["gold"].build().unwrap() {
            Material::CookTorrance(m) => {
                assert!(m.is_metal());
                assert_eq!(m.roughness(), 0.5);
            }
            other => panic!("unexpected material {:?}", other),
        }
        assert!(matches!(descs["blue"].build().unwrap(), Material::LambertPhong(_)));
    }

    #[test]
    fn unknown_roughness_preset_is_rejected() {
        let yaml = "kind: cook_torrance\ncolor: [1.0, 1.0, 1.0]\nmetal: false\nroughness: sandy\n";
        assert!(serde_yaml::from_str::<MaterialDesc>(yaml).is_err());
    }

    #[test]
    fn library_shares_instances() {
        let sky_blue = MaterialDesc::CookTorrance {
            color: [0.53, 0.81, 0.92],
            metal: false,
            roughness: RoughnessPreset::Rough,
        };
        let mut library = MaterialLibrary::new();
        library.insert("sky_blue", sky_blue.clone());
        library.insert("sky_blue_again", sky_blue);
        library.insert(
            "grey",
            MaterialDesc::Lambert {
                color: [0.5, 0.5, 0.5],
                reflectance: 1.0,
            },
        );

        let a = library.get("sky_blue").unwrap();
        let b = library.get("sky_blue").unwrap();
        let c = library.get("sky_blue_again").unwrap();
        let grey = library.get("grey").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &c));
        assert!(!Arc::ptr_eq(&a, &grey));
        assert_eq!(library.instance_count(), 2);
    }

    #[test]
    fn library_rejects_unknown_and_invalid_materials() {
        let mut library = MaterialLibrary::new();
        assert!(matches!(
            library.get("missing"),
            Err(RenderError::InvalidParameter { name: "material", .. })
        ));

        library.insert(
            "too_bright",
            MaterialDesc::Lambert {
                color: [0.5, 0.5, 0.5],
                reflectance: 3.0,
            },
        );
        assert!(matches!(
            library.get("too_bright"),
            Err(RenderError::InvalidParameter { name: "diffuse_reflectance", .. })
        ));
        assert_eq!(library.instance_count(), 0);
    }

    #[test]
    fn replaced_recipe_is_rebuilt() {
        let mut library = MaterialLibrary::new();
        let red = MaterialDesc::Lambert {
            color: [1.0, 0.0, 0.0],
            reflectance: 1.0,
        };
        library.insert("paint", red);
        let first = library.get("paint").unwrap();
        library.insert(
            "paint",
            MaterialDesc::Lambert {
                color: [0.0, 0.0, 1.0],
                reflectance: 1.0,
            },
        );
        let second = library.get("paint").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.albedo(), vector![0.0, 0.0, 1.0]);
    }
}
