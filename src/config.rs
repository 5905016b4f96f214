use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Direction thresholds for the ratio-based gaze classifier. The defaults
/// are empirically tuned and deliberately kept adjustable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Ratios strictly above this classify as Left.
    pub left_ratio: f64,
    /// Ratios strictly below this classify as Right.
    pub right_ratio: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            left_ratio: 1.5,
            right_ratio: 0.33,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub camera_index: u32,
    /// Stillness duration that fires the configured dwell action.
    pub dwell_threshold_secs: f64,
    /// Controller sampling cadence.
    pub tick_hz: u32,
    pub classifier: ClassifierConfig,
    /// External tracker executable. When present on a Windows host it
    /// replaces the in-process vision pipeline as the gaze source.
    pub vendor_exe: Option<PathBuf>,
    /// Key held down by the Move dwell action.
    pub forward_key: char,
    /// Directory for gaze trace files; the working directory when unset.
    pub trace_dir: Option<PathBuf>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            dwell_threshold_secs: 3.0,
            tick_hz: 60,
            classifier: ClassifierConfig::default(),
            vendor_exe: None,
            forward_key: 'w',
            trace_dir: None,
        }
    }
}

fn config_path() -> Result<PathBuf> {
    let config_root = dirs::config_dir()
        .ok_or_else(|| Error::Config("could not find config directory".to_string()))?;
    let app_dir = config_root.join("gazerbeam");

    if !app_dir.exists() {
        fs::create_dir_all(&app_dir)
            .map_err(|e| Error::Config(format!("failed to create config directory: {}", e)))?;
    }

    Ok(app_dir.join("config.json"))
}

impl TrackerConfig {
    /// Loads the saved configuration, falling back to defaults when the file
    /// is missing or unreadable. A malformed file is reported but never
    /// blocks startup.
    pub fn load() -> Self {
        let path = match config_path() {
            Ok(path) => path,
            Err(e) => {
                log::warn!("using default config: {}", e);
                return Self::default();
            }
        };

        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(json) => Self::parse(&json),
            Err(e) => {
                log::warn!("failed to read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = config_path()?;
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(&path, json)
            .map_err(|e| Error::Config(format!("failed to write {}: {}", path.display(), e)))?;
        log::info!("config saved to {}", path.display());
        Ok(())
    }

    fn parse(json: &str) -> Self {
        serde_json::from_str(json).unwrap_or_else(|e| {
            log::warn!("malformed config, using defaults: {}", e);
            Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_tuned_thresholds() {
        let config = TrackerConfig::default();
        assert_eq!(config.dwell_threshold_secs, 3.0);
        assert_eq!(config.tick_hz, 60);
        assert_eq!(config.classifier.left_ratio, 1.5);
        assert_eq!(config.classifier.right_ratio, 0.33);
        assert_eq!(config.forward_key, 'w');
        assert!(config.vendor_exe.is_none());
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config = TrackerConfig::parse(r#"{"camera_index": 2, "tick_hz": 30}"#);
        assert_eq!(config.camera_index, 2);
        assert_eq!(config.tick_hz, 30);
        assert_eq!(config.dwell_threshold_secs, 3.0);
    }

    #[test]
    fn malformed_json_falls_back_to_defaults() {
        let config = TrackerConfig::parse("{not json");
        assert_eq!(config.camera_index, 0);
        assert_eq!(config.forward_key, 'w');
    }

    #[test]
    fn config_round_trips_through_json() {
        let mut config = TrackerConfig::default();
        config.vendor_exe = Some(PathBuf::from("tracker/Interaction_Streams_101.exe"));
        config.classifier.right_ratio = 0.25;
        let json = serde_json::to_string(&config).unwrap();
        let restored = TrackerConfig::parse(&json);
        assert_eq!(restored.vendor_exe, config.vendor_exe);
        assert_eq!(restored.classifier.right_ratio, 0.25);
    }
}
