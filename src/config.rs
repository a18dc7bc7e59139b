//! Literal scene data.
//!
//! [`SceneConfig::default`] is the chocolate-bar variant. Other variants are
//! described as JSON documents; any field left out keeps its default value.

use std::f32::consts::{FRAC_PI_2, PI};
use serde::{Deserialize, Serialize};
use three_d::{vec3, Vec3};

use crate::error::ConfigError;


#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub model: ModelConfig,
    pub font: FontConfig,
    pub plane: PlaneConfig,
    pub labels: Vec<LabelSpec>,
    pub lights: Vec<LightConfig>,
    pub camera: CameraConfig,
    pub controls: ControlsConfig,
    pub renderer: RendererConfig,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            font: FontConfig::default(),
            plane: PlaneConfig::default(),
            labels: default_labels(),
            lights: vec![
                LightConfig::directional([5.0, 5.0, 5.0]),
                LightConfig::directional([5.0, 5.0, -5.0]),
            ],
            camera: CameraConfig::default(),
            controls: ControlsConfig::default(),
            renderer: RendererConfig::default(),
        }
    }
}

impl SceneConfig {
    /// Parses a JSON override on top of the default variant
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SceneConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.renderer.max_pixel_ratio > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "renderer.max_pixel_ratio must be positive, got {}",
                self.renderer.max_pixel_ratio
            )));
        }
        if !(self.plane.width > 0.0 && self.plane.height > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "plane size must be positive, got {}x{}",
                self.plane.width, self.plane.height
            )));
        }
        if self.font.curve_segments == 0 {
            return Err(ConfigError::Invalid("font.curve_segments must be at least 1".into()));
        }
        if self.font.depth < 0.0 {
            return Err(ConfigError::Invalid(format!("font.depth must not be negative, got {}", self.font.depth)));
        }
        if let Some(label) = self.labels.iter().find(|l| !(l.size > 0.0)) {
            return Err(ConfigError::Invalid(format!("label {:?} has a non-positive size", label.text)));
        }
        if !(self.camera.near > 0.0 && self.camera.far > self.camera.near) {
            return Err(ConfigError::Invalid(format!(
                "camera clip planes must satisfy 0 < near < far, got {} and {}",
                self.camera.near, self.camera.far
            )));
        }
        let damping = self.controls.damping_factor;
        if self.controls.enable_damping && !(damping > 0.0 && damping <= 1.0) {
            return Err(ConfigError::Invalid(format!("controls.damping_factor must be in (0, 1], got {}", damping)));
        }
        Ok(())
    }
}


#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: String,
    /// Directory holding the compressed-geometry decoder files
    pub decoder_path: String,
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub receive_shadow: bool,
    pub cast_shadow: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: "models/chocolateBar.glb".to_string(),
            decoder_path: "draco/".to_string(),
            position: [5.0, 5.0, -5.0],
            rotation: [0.0, FRAC_PI_2, FRAC_PI_2],
            receive_shadow: true,
            cast_shadow: true,
        }
    }
}


#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    pub url: String,
    /// Extrusion depth of the text
    pub depth: f32,
    pub curve_segments: u32,
    pub material: MaterialConfig,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            url: "https://threejs.org/examples/fonts/helvetiker_regular.typeface.json".to_string(),
            depth: 0.2,
            curve_segments: 12,
            material: MaterialConfig {
                color: 0x000000,
                ..MaterialConfig::default()
            },
        }
    }
}


#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaneConfig {
    pub width: f32,
    pub height: f32,
    pub material: MaterialConfig,
    pub receive_shadow: bool,
    /// Transform applied once the labels are attached
    pub final_position: [f32; 3],
    pub final_rotation: [f32; 3],
}

impl Default for PlaneConfig {
    fn default() -> Self {
        Self {
            width: 6.0,
            height: 5.5,
            material: MaterialConfig {
                color: 0xEEE6D9,
                double_sided: true,
                ..MaterialConfig::default()
            },
            receive_shadow: true,
            final_position: [0.0, -1.0, -6.5],
            final_rotation: [0.0, PI, 0.0],
        }
    }
}


#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialKind {
    /// Diffuse only
    Lambert,
    /// Metalness/roughness
    Standard,
}


#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialConfig {
    pub kind: MaterialKind,
    /// 0xRRGGBB
    pub color: u32,
    pub roughness: f32,
    pub metalness: f32,
    pub double_sided: bool,
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            kind: MaterialKind::Lambert,
            color: 0xFFFFFF,
            roughness: 1.0,
            metalness: 0.0,
            double_sided: false,
        }
    }
}

impl MaterialConfig {
    pub fn rgb(&self) -> [u8; 3] {
        hex_to_rgb(self.color)
    }
}


#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabelSpec {
    pub text: String,
    pub position: [f32; 3],
    pub size: f32,
}

impl LabelSpec {
    pub fn new(text: &str, position: [f32; 3], size: f32) -> Self {
        Self {
            text: text.to_string(),
            position,
            size,
        }
    }
}

fn default_labels() -> Vec<LabelSpec> {
    vec![
        LabelSpec::new("Nutrition Facts", [-2.5, 1.5, 0.0], 0.4),
        LabelSpec::new("Serving Size 1 Bar (94g)", [-2.5, 1.0, 0.0], 0.2),
        LabelSpec::new("Calories 190", [-2.5, 0.5, 0.0], 0.2),
        LabelSpec::new("Total Fat 11g", [-2.5, 0.0, 0.0], 0.2),
        LabelSpec::new("Sodium 25mg", [-2.5, -0.5, 0.0], 0.2),
        LabelSpec::new("Total Carbohydrate 22g", [-2.5, -1.0, 0.0], 0.2),
        LabelSpec::new("Dietary Fiber 4g", [-2.5, -1.5, 0.0], 0.2),
        LabelSpec::new("Sugars 12g", [-2.5, -2.0, 0.0], 0.2),
        LabelSpec::new("Protein 5.5g", [-2.5, -2.5, 0.0], 0.2),
    ]
}


#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LightConfig {
    Directional {
        color: u32,
        intensity: f32,
        position: [f32; 3],
        cast_shadow: bool,
        #[serde(default)]
        shadow: ShadowConfig,
    },
    Ambient {
        color: u32,
        intensity: f32,
    },
}

impl LightConfig {
    fn directional(position: [f32; 3]) -> Self {
        LightConfig::Directional {
            color: 0xFFFFFF,
            intensity: 1.8,
            position,
            cast_shadow: true,
            shadow: ShadowConfig::default(),
        }
    }
}


/// Shadow map resolution. three-d fits the shadow frustum to the casters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    pub map_size: u32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self { map_size: 1024 }
    }
}


#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: 75.0,
            near: 0.1,
            far: 100.0,
            position: [0.0, 25.0, -5.0],
        }
    }
}


#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    pub target: [f32; 3],
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    pub min_distance: f32,
    /// `None` leaves the distance unbounded
    pub max_distance: Option<f32>,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            target: [0.0, 0.75, 0.0],
            enable_damping: true,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
            min_distance: 0.0,
            max_distance: None,
        }
    }
}


#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub title: String,
    pub shadows: bool,
    pub max_pixel_ratio: f64,
    pub clear_color: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            title: "Chocobar".to_string(),
            shadows: true,
            max_pixel_ratio: 2.0,
            clear_color: 0x000000,
        }
    }
}


#[inline(always)]
pub fn to_vec3(v: [f32; 3]) -> Vec3 {
    vec3(v[0], v[1], v[2])
}


pub fn hex_to_rgb(hex: u32) -> [u8; 3] {
    [
        ((hex >> 16) & 0xFF) as u8,
        ((hex >> 8) & 0xFF) as u8,
        (hex & 0xFF) as u8,
    ]
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_variant_keeps_chocolate_bar_literals() {
        let config = SceneConfig::default();
        assert_eq!(config.labels.len(), 9);
        assert_eq!(config.labels[0].text, "Nutrition Facts");
        assert_eq!(config.labels[0].size, 0.4);
        assert_eq!(config.labels[8].text, "Protein 5.5g");
        assert_eq!(config.labels[8].position, [-2.5, -2.5, 0.0]);
        assert_eq!(config.model.position, [5.0, 5.0, -5.0]);
        assert_eq!(config.plane.material.color, 0xEEE6D9);
        assert_eq!(config.lights.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn json_overrides_merge_over_defaults() {
        let json = r#"{
            "lights": [
                { "kind": "ambient", "color": 16777215, "intensity": 0.5 },
                { "kind": "directional", "color": 16777215, "intensity": 1.0,
                  "position": [1.0, 2.0, 3.0], "cast_shadow": false }
            ],
            "plane": { "material": { "kind": "standard", "color": 255, "roughness": 0.4 } },
            "labels": [ { "text": "Calories 120", "position": [0.0, 0.0, 0.0], "size": 0.3 } ]
        }"#;
        let config = SceneConfig::from_json(json).unwrap();
        assert_eq!(config.lights.len(), 2);
        assert!(matches!(config.lights[0], LightConfig::Ambient { .. }));
        match &config.lights[1] {
            LightConfig::Directional { shadow, cast_shadow, .. } => {
                assert!(!cast_shadow);
                assert_eq!(shadow.map_size, 1024);
            }
            other => panic!("unexpected light {:?}", other),
        }
        assert_eq!(config.plane.material.kind, MaterialKind::Standard);
        assert_eq!(config.plane.material.roughness, 0.4);
        assert_eq!(config.plane.width, 6.0);
        assert_eq!(config.labels.len(), 1);
        assert_eq!(config.model, ModelConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = SceneConfig::from_json(r#"{ "renderer": { "max_pixel_ratio": 0.0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = SceneConfig::from_json(r#"{ "labels": [ { "text": "x", "position": [0,0,0], "size": 0 } ] }"#)
            .unwrap_err();
        assert!(err.to_string().contains("non-positive size"));

        let err = SceneConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn hex_colors_split_into_channels() {
        assert_eq!(hex_to_rgb(0xEEE6D9), [0xEE, 0xE6, 0xD9]);
        assert_eq!(hex_to_rgb(0x000000), [0, 0, 0]);
    }
}
