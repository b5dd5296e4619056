//! Configuration for the scene player
//!
//! Scene location, library folder and audio preferences are read from a
//! JSON file so a host can change them without rebuilding.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::host::Scene;
use crate::remote::{AudioRequest, IMAGE_TOPIC, TEXT_TOPIC};

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scene: SceneConfig,
    /// Unpacked shared abstraction library, added to the engine search path
    pub library_dir: PathBuf,
    pub audio: AudioRequest,
    pub topics: TopicConfig,
    pub startup: StartupConfig,
    /// Name used for the engine in user-visible notices
    pub engine_name: String,
    /// Capacity of the in-memory log history
    pub log_history: usize,
}

/// Default scene used when the host does not name one
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub common_path: PathBuf,
    pub name: String,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            common_path: PathBuf::from("/sdcard/pd/scenes"),
            name: "default".to_string(),
        }
    }
}

/// Topics the overlay registry subscribes to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    pub image: String,
    pub text: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            image: IMAGE_TOPIC.to_string(),
            text: TEXT_TOPIC.to_string(),
        }
    }
}

impl TopicConfig {
    pub fn all(&self) -> [&str; 2] {
        [self.image.as_str(), self.text.as_str()]
    }
}

/// Commands sent once audio is granted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    pub volume: f32,
    pub autoplay: bool,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            volume: 1.0,
            autoplay: true,
        }
    }
}

impl Default for AppConfig {
    /// Default configuration values (fallback if config file not found)
    fn default() -> Self {
        Self {
            scene: SceneConfig::default(),
            library_dir: PathBuf::from("/sdcard/pd/.scenes"),
            audio: AudioRequest::default(),
            topics: TopicConfig::default(),
            startup: StartupConfig::default(),
            engine_name: "Pure Data".to_string(),
            log_history: 256,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// Falls back to defaults (with a warning) when the file is missing or
    /// does not parse.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    pub fn load() -> Self {
        Self::load_from_file("assets/scene_config.json")
    }

    /// Scene to play: the host's explicit folder, else the configured one.
    pub fn scene(&self, explicit: Option<&Path>) -> Scene {
        match explicit {
            Some(folder) => Scene::new(folder),
            None => Scene::new(self.scene.common_path.join(&self.scene.name)),
        }
    }
}
