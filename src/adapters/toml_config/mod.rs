// TOML config adapter - Configuration management using TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::model::Time;
use crate::domain::rules::{MarkingPolicy, DEFAULT_MIN_MARK_DURATION, DEFAULT_PRELOAD};
use crate::engine::EncoderSettings;
use crate::error::{ClipMarkError, ClipMarkResult};
use crate::utils::logging::{parse_logging, LoggingConfig};

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "clipmark.toml";

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "CLIPMARK_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderSection {
    pub ffmpeg_path: PathBuf,
    pub video_codec: String,
    pub audio_codec: String,
    pub preload_ms: i64,
    pub loop_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_timeout_secs: Option<u64>,
}

impl Default for EncoderSection {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            preload_ms: DEFAULT_PRELOAD.ms(),
            loop_count: 2,
            stage_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkingSection {
    pub min_duration_ms: i64,
}

impl Default for MarkingSection {
    fn default() -> Self {
        Self {
            min_duration_ms: DEFAULT_MIN_MARK_DURATION.ms(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    /// Export folder; the source video's folder when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub format: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub encoder: EncoderSection,
    pub marking: MarkingSection,
    pub output: OutputSection,
    pub logging: LoggingSection,
}

impl AppConfig {
    /// Reject values no component can work with
    pub fn validate(&self) -> ClipMarkResult<()> {
        let invalid = |message: &str| ClipMarkError::Config {
            message: message.to_string(),
        };

        if self.encoder.loop_count == 0 {
            return Err(invalid("encoder.loop_count must be at least 1"));
        }
        if self.encoder.video_codec.trim().is_empty() {
            return Err(invalid("encoder.video_codec must not be empty"));
        }
        if self.encoder.audio_codec.trim().is_empty() {
            return Err(invalid("encoder.audio_codec must not be empty"));
        }
        if self.encoder.ffmpeg_path.as_os_str().is_empty() {
            return Err(invalid("encoder.ffmpeg_path must not be empty"));
        }
        if self.encoder.preload_ms < 0 {
            return Err(invalid("encoder.preload_ms must not be negative"));
        }
        if self.encoder.stage_timeout_secs == Some(0) {
            return Err(invalid("encoder.stage_timeout_secs must be positive"));
        }
        if self.marking.min_duration_ms < 0 {
            return Err(invalid("marking.min_duration_ms must not be negative"));
        }
        parse_logging(&self.logging.level, &self.logging.format)?;
        Ok(())
    }

    pub fn encoder_settings(&self) -> EncoderSettings {
        EncoderSettings {
            ffmpeg_path: self.encoder.ffmpeg_path.clone(),
            video_codec: self.encoder.video_codec.clone(),
            audio_codec: self.encoder.audio_codec.clone(),
            preload: Time::from_ms(self.encoder.preload_ms),
            loop_count: self.encoder.loop_count,
            stage_timeout: self.encoder.stage_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn marking_policy(&self) -> MarkingPolicy {
        MarkingPolicy::new(Time::from_ms(self.marking.min_duration_ms))
    }

    pub fn logging_config(&self) -> ClipMarkResult<LoggingConfig> {
        parse_logging(&self.logging.level, &self.logging.format)
    }

    pub fn to_toml(&self) -> ClipMarkResult<String> {
        toml::to_string_pretty(self).map_err(|e| ClipMarkError::Config {
            message: format!("cannot serialize configuration: {}", e),
        })
    }
}

/// Loads [`AppConfig`] from TOML files and `CLIPMARK_*` environment variables
#[derive(Debug, Default)]
pub struct TomlConfigAdapter {
    config: AppConfig,
    source: Option<PathBuf>,
}

impl TomlConfigAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }

    pub fn into_config(self) -> AppConfig {
        self.config
    }

    /// File the configuration was read from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Parse TOML text on top of the defaults
    pub fn load_str(&mut self, content: &str) -> ClipMarkResult<()> {
        self.config = toml::from_str(content)?;
        Ok(())
    }

    pub fn load_file(&mut self, path: &Path) -> ClipMarkResult<()> {
        let content = std::fs::read_to_string(path).map_err(|e| ClipMarkError::Config {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        self.load_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        self.source = Some(path.to_path_buf());
        Ok(())
    }

    /// Config file to use: the explicit path, else `CLIPMARK_CONFIG`, else
    /// `clipmark.toml` in the working directory if it exists
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        local.exists().then_some(local)
    }

    /// Apply `CLIPMARK_*` overrides from the process environment
    pub fn apply_env(&mut self) -> ClipMarkResult<usize> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply `CLIPMARK_*` overrides using `lookup` for variable values
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ClipMarkResult<usize> {
        let mut applied = 0;
        let config = &mut self.config;

        if let Some(value) = lookup("CLIPMARK_FFMPEG") {
            config.encoder.ffmpeg_path = PathBuf::from(value);
            applied += 1;
        }
        if let Some(value) = lookup("CLIPMARK_VIDEO_CODEC") {
            config.encoder.video_codec = value;
            applied += 1;
        }
        if let Some(value) = lookup("CLIPMARK_LOOP_COUNT") {
            config.encoder.loop_count = parse_env("CLIPMARK_LOOP_COUNT", &value)?;
            applied += 1;
        }
        if let Some(value) = lookup("CLIPMARK_STAGE_TIMEOUT") {
            config.encoder.stage_timeout_secs = Some(parse_env("CLIPMARK_STAGE_TIMEOUT", &value)?);
            applied += 1;
        }
        if let Some(value) = lookup("CLIPMARK_OUTPUT_DIR") {
            config.output.directory = Some(PathBuf::from(value));
            applied += 1;
        }
        if let Some(value) = lookup("CLIPMARK_LOG_LEVEL") {
            config.logging.level = value;
            applied += 1;
        }

        if applied > 0 {
            debug!("Applied {} environment overrides", applied);
        }
        Ok(applied)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> ClipMarkResult<T> {
    value.trim().parse().map_err(|_| ClipMarkError::Config {
        message: format!("invalid value for {}: '{}'", key, value),
    })
}
