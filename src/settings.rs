use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tokio::time::Duration;

use crate::sensing::DriverConfig;

pub const SETTINGS_ENV: &str = "WRISTGUARD_SETTINGS";
pub const DEFAULT_SETTINGS_FILE: &str = "wristguard.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CameraSettings {
    pub device_id: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            device_id: 0,
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HandsSettings {
    pub max_num_hands: u32,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl Default for HandsSettings {
    fn default() -> Self {
        Self {
            max_num_hands: 1,
            min_detection_confidence: 0.7,
            min_tracking_confidence: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoseSettings {
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl Default for PoseSettings {
    fn default() -> Self {
        Self {
            min_detection_confidence: 0.7,
            min_tracking_confidence: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SoundSettings {
    pub enabled: bool,
}

impl Default for SoundSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Runtime options. The posture threshold and alert timings are constants
/// in [`crate::posture`] and deliberately not part of this file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitorSettings {
    pub camera: CameraSettings,
    pub frame_interval_ms: u64,
    pub detection_timeout_ms: u64,
    pub hands: HandsSettings,
    pub pose: PoseSettings,
    pub sound: SoundSettings,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            camera: CameraSettings::default(),
            frame_interval_ms: 16,
            detection_timeout_ms: 1000,
            hands: HandsSettings::default(),
            pose: PoseSettings::default(),
            sound: SoundSettings::default(),
        }
    }
}

impl MonitorSettings {
    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            frame_interval: Duration::from_millis(self.frame_interval_ms.max(1)),
            detection_timeout: Duration::from_millis(self.detection_timeout_ms.max(1)),
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: MonitorSettings,
}

impl SettingsStore {
    /// `$WRISTGUARD_SETTINGS`, falling back to `./wristguard.json`.
    pub fn default_path() -> PathBuf {
        std::env::var_os(SETTINGS_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE))
    }

    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring unreadable settings in {}: {err}", path.display());
                MonitorSettings::default()
            })
        } else {
            MonitorSettings::default()
        };

        Ok(Self { path, data })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn monitor(&self) -> MonitorSettings {
        self.data.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("wristguard-{}-{name}.json", std::process::id()))
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let store = SettingsStore::new(temp_path("missing")).unwrap();
        assert_eq!(store.monitor(), MonitorSettings::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let path = temp_path("partial");
        fs::write(&path, r#"{ "frameIntervalMs": 33, "sound": { "enabled": false } }"#).unwrap();

        let settings = SettingsStore::new(path.clone()).unwrap().monitor();
        assert_eq!(settings.frame_interval_ms, 33);
        assert!(!settings.sound.enabled);
        assert_eq!(settings.camera, CameraSettings::default());
        assert_eq!(settings.hands.max_num_hands, 1);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_garbage_file_gives_defaults() {
        let path = temp_path("garbage");
        fs::write(&path, "not json").unwrap();
        let store = SettingsStore::new(path.clone()).unwrap();
        assert_eq!(store.monitor(), MonitorSettings::default());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_driver_config_never_zero() {
        let settings = MonitorSettings {
            frame_interval_ms: 0,
            ..MonitorSettings::default()
        };
        assert_eq!(settings.driver_config().frame_interval, Duration::from_millis(1));
    }
}
