// src/config.rs - Typed configuration, defaults mirror the original constants
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub labels_path: PathBuf,
    pub model_path: PathBuf,
    pub smoothing: SmoothingConfig,
    pub detector: DetectorConfig,
    pub camera: CameraConfig,
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Below this the history is cleared
    pub suppression_threshold: f64,
    /// Above this a frame enters the history
    pub admission_threshold: f64,
    pub history_capacity: usize,
    pub min_stable_frames: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// argv of the landmark sidecar process
    pub command: Vec<String>,
    pub max_num_hands: u32,
    pub min_detection_confidence: f64,
    pub min_tracking_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub mirror: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub jpeg_quality: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            labels_path: PathBuf::from("labels.txt"),
            model_path: PathBuf::from("model/static_sign_model.json"),
            smoothing: SmoothingConfig::default(),
            detector: DetectorConfig::default(),
            camera: CameraConfig::default(),
            stream: StreamConfig::default(),
        }
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            suppression_threshold: 0.5,
            admission_threshold: 0.7,
            history_capacity: 5,
            min_stable_frames: 3,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            max_num_hands: 1,
            min_detection_confidence: 0.6,
            min_tracking_confidence: 0.6,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: 640,
            height: 480,
            fps: 30,
            mirror: true,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { jpeg_quality: 85 }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        let s = &self.smoothing;
        if !(0.0..=1.0).contains(&s.suppression_threshold)
            || !(0.0..=1.0).contains(&s.admission_threshold)
        {
            return Err(Error::Config(format!(
                "thresholds must be in [0, 1], got suppression {} admission {}",
                s.suppression_threshold, s.admission_threshold
            )));
        }
        if s.suppression_threshold > s.admission_threshold {
            return Err(Error::Config(format!(
                "suppression_threshold {} exceeds admission_threshold {}",
                s.suppression_threshold, s.admission_threshold
            )));
        }
        if s.min_stable_frames == 0 || s.min_stable_frames > s.history_capacity {
            return Err(Error::Config(format!(
                "min_stable_frames must be in [1, {}], got {}",
                s.history_capacity, s.min_stable_frames
            )));
        }

        let d = &self.detector;
        if d.max_num_hands == 0 {
            return Err(Error::Config("max_num_hands must be > 0".to_string()));
        }
        for (name, value) in [
            ("min_detection_confidence", d.min_detection_confidence),
            ("min_tracking_confidence", d.min_tracking_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!("{} must be in [0, 1], got {}", name, value)));
            }
        }

        if self.camera.width == 0 || self.camera.height == 0 || self.camera.fps == 0 {
            return Err(Error::Config("camera width, height and fps must be > 0".to_string()));
        }
        if !(1..=100).contains(&self.stream.jpeg_quality) {
            return Err(Error::Config(format!(
                "jpeg_quality must be in [1, 100], got {}",
                self.stream.jpeg_quality
            )));
        }
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        info!("Loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }

    /// Loads the platform config file when present, otherwise defaults.
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "gesturemate", "GestureMate")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.smoothing.suppression_threshold, 0.5);
        assert_eq!(config.smoothing.admission_threshold, 0.7);
        assert_eq!(config.smoothing.history_capacity, 5);
        assert_eq!(config.smoothing.min_stable_frames, 3);
        assert_eq!(config.detector.max_num_hands, 1);
        assert_eq!(config.stream.jpeg_quality, 85);
        assert!(config.camera.mirror);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"smoothing": {"admission_threshold": 0.8}, "camera": {"index": 2}}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.smoothing.admission_threshold, 0.8);
        assert_eq!(config.smoothing.suppression_threshold, 0.5);
        assert_eq!(config.camera.index, 2);
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.labels_path, PathBuf::from("labels.txt"));
    }

    #[test]
    fn test_roundtrip() {
        let config = Config::default();
        let parsed: Config = serde_json::from_str(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let mut config = Config::default();
        config.smoothing.suppression_threshold = 0.8;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_unreachable_stability() {
        let mut config = Config::default();
        config.smoothing.min_stable_frames = 6;
        assert!(config.validate().is_err());
        config.smoothing.min_stable_frames = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_quality() {
        let mut config = Config::default();
        config.stream.jpeg_quality = 0;
        assert!(config.validate().is_err());
    }
}
