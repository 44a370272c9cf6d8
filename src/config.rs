use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub static CONFIG_PATH: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(option_env!("CROWNAR_CONFIG_PATH").unwrap_or("/usr/local/etc/crownar/config.toml"))
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub camera: String,
    pub frame_width: u32,
    pub frame_height: u32,
    pub crown_asset: PathBuf,
    pub detector_model: PathBuf,
    pub landmark_model: PathBuf,
    pub landmark_model_refined: PathBuf,
    pub refine_landmarks: bool,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera: "/dev/video0".to_string(),
            frame_width: 640,
            frame_height: 480,
            crown_asset: PathBuf::from("assets/crown.glb"),
            detector_model: PathBuf::from("models/face_detection_short_range.onnx"),
            landmark_model: PathBuf::from("models/face_landmark.onnx"),
            landmark_model_refined: PathBuf::from("models/face_landmark_with_attention.onnx"),
            refine_landmarks: true,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_setup() {
        let cfg = Config::default();
        assert_eq!(cfg.frame_width, 640);
        assert_eq!(cfg.frame_height, 480);
        assert_eq!(cfg.min_detection_confidence, 0.5);
        assert_eq!(cfg.min_tracking_confidence, 0.5);
        assert!(cfg.refine_landmarks);
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let cfg = Config::default();
        let raw = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&raw).unwrap();
        assert_eq!(parsed.camera, cfg.camera);
        assert_eq!(parsed.crown_asset, cfg.crown_asset);
    }
}
