//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Default recording settings.
    pub recording: RecordingDefaults,

    /// Encoder/muxer settings.
    pub encoder: EncoderDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default recording parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingDefaults {
    /// Output file used when none is given on the command line.
    pub output: PathBuf,

    /// Capture frame rate.
    pub fps: u32,

    /// Depth of the capture frame queue.
    ///
    /// Deeper queues keep the frame rate up at the cost of memory held
    /// by the capture subsystem.
    pub queue_depth: u32,
}

/// Output container and video encoder parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderDefaults {
    /// Container format. Only "mp4" is supported.
    pub container: String,

    /// Video codec. Only "h264" is supported.
    pub codec: String,

    /// x264 speed preset.
    pub speed_preset: String,

    /// Seconds between forced keyframes.
    pub keyframe_interval_secs: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "pidrec=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for RecordingDefaults {
    fn default() -> Self {
        Self {
            output: PathBuf::from("output.mp4"),
            fps: 60,
            queue_depth: 6,
        }
    }
}

impl Default for EncoderDefaults {
    fn default() -> Self {
        Self {
            container: "mp4".to_string(),
            codec: "h264".to_string(),
            speed_preset: "veryfast".to_string(),
            keyframe_interval_secs: 2,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &std::path::Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("pidrec").join("config.json")
}
