use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlimpseConfig {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub enrollment: EnrollmentConfig,
    #[serde(default)]
    pub recognizer: RecognizerConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default = "default_version")]
    pub version: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default)]
    pub device_index: i32,
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,
    #[serde(default = "default_frame_height")]
    pub frame_height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentConfig {
    #[serde(default = "default_num_pictures")]
    pub num_pictures: usize,
    #[serde(default = "default_capture_interval_ms")]
    pub capture_interval_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_dataset_dir")]
    pub dataset_dir: PathBuf,
}

/// The external program that encodes and matches faces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizerConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_script")]
    pub script: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_render_interval_ms")]
    pub render_interval_ms: u64,
}

fn default_version() -> u32 { 1 }
fn default_frame_width() -> u32 { 1280 }
fn default_frame_height() -> u32 { 720 }
fn default_num_pictures() -> usize { 5 }
fn default_capture_interval_ms() -> u64 { 1000 }
fn default_poll_interval_ms() -> u64 { 20 }
fn default_dataset_dir() -> PathBuf { PathBuf::from("dataset") }
fn default_program() -> String { "python3".to_string() }
fn default_script() -> String { "face_app.py".to_string() }
fn default_render_interval_ms() -> u64 { 33 }

impl Default for GlimpseConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            enrollment: EnrollmentConfig::default(),
            recognizer: RecognizerConfig::default(),
            ui: UiConfig::default(),
            version: default_version(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            frame_width: default_frame_width(),
            frame_height: default_frame_height(),
        }
    }
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            num_pictures: default_num_pictures(),
            capture_interval_ms: default_capture_interval_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            dataset_dir: default_dataset_dir(),
        }
    }
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            script: default_script(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            render_interval_ms: default_render_interval_ms(),
        }
    }
}

impl RecognizerConfig {
    fn base_command(&self) -> Vec<String> {
        let mut command = vec![self.program.clone()];
        if !self.script.is_empty() {
            command.push(self.script.clone());
        }
        command
    }

    pub fn enroll_command(&self, username: &str) -> Vec<String> {
        let mut command = self.base_command();
        command.extend(["enroll".to_string(), username.to_string()]);
        command
    }

    pub fn login_command(&self) -> Vec<String> {
        let mut command = self.base_command();
        command.push("login".to_string());
        command
    }
}

impl GlimpseConfig {
    /// Defaults when `path` does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// User config, then system config, then defaults.
    pub fn load_default() -> Self {
        for path in Self::search_paths() {
            if !path.exists() {
                continue;
            }
            match Self::load(&path) {
                Ok(config) => {
                    debug!("Loaded config from {:?}", path);
                    return config;
                }
                Err(e) => warn!("Ignoring {:?}: {}", path, e),
            }
        }
        Self::default()
    }

    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("glimpse").join("config.json"));
        }
        paths.push(PathBuf::from("/etc/glimpse/config.json"));
        paths
    }
}
