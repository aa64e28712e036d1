//! Configuration for the engine.
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. Environment variables (SNOWFLAKE_*)
//! 2. Config file (`<data_dir>/config.toml`, or `SNOWFLAKE_CONFIG`)
//! 3. Default values

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const CONFIG_ENV: &str = "SNOWFLAKE_CONFIG";
pub const DATA_DIR_ENV: &str = "SNOWFLAKE_DATA_DIR";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding the database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Database file name inside `data_dir`
    #[serde(default = "default_database_file")]
    pub database_file: String,

    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,

    #[serde(default)]
    pub context: ContextConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Words per scene used to recommend a scene count
    #[serde(default = "default_words_per_scene")]
    pub words_per_scene: u32,

    /// Accepted deviation from the recommended scene count, as a fraction
    #[serde(default = "default_scene_count_tolerance")]
    pub scene_count_tolerance: f64,

    /// Completion weight of each stage, stage 1 first. Sums to 100.
    #[serde(default = "default_stage_weights")]
    pub stage_weights: [u32; 10],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Attributes a POV character must carry before drafting
    #[serde(default = "default_character_bible_fields")]
    pub character_bible_fields: Vec<String>,

    /// Style samples requested per drafted scene
    #[serde(default = "default_style_sample_count")]
    pub style_sample_count: usize,
}

// Default value functions
fn default_data_dir() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("dev", "snowflake", "snowflake") {
        proj_dirs.data_dir().to_path_buf()
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".snowflake")
    }
}

fn default_database_file() -> String {
    "snowflake.db".to_string()
}

fn default_words_per_scene() -> u32 {
    1500
}

fn default_scene_count_tolerance() -> f64 {
    0.3
}

fn default_stage_weights() -> [u32; 10] {
    [5, 5, 10, 10, 10, 15, 15, 10, 10, 10]
}

fn default_character_bible_fields() -> Vec<String> {
    vec!["role".to_string(), "eyeColor".to_string()]
}

fn default_style_sample_count() -> usize {
    3
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            words_per_scene: default_words_per_scene(),
            scene_count_tolerance: default_scene_count_tolerance(),
            stage_weights: default_stage_weights(),
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            character_bible_fields: default_character_bible_fields(),
            style_sample_count: default_style_sample_count(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_file: default_database_file(),
            diagnostics: DiagnosticsConfig::default(),
            context: ContextConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load using the given environment lookup.
    pub fn load_with(env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config_path = env(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                env(DATA_DIR_ENV)
                    .map(PathBuf::from)
                    .unwrap_or_else(default_data_dir)
                    .join("config.toml")
            });

        let mut config = if config_path.exists() {
            Self::from_file(&config_path)?
        } else {
            Self::default()
        };

        if let Some(dir) = env(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Defaults rooted at `dir`. Used by tests and embedders.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: dir.into(),
            ..Self::default()
        }
    }

    pub fn with_words_per_scene(mut self, words: u32) -> Self {
        self.diagnostics.words_per_scene = words;
        self
    }

    pub fn with_character_bible_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context.character_bible_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Full path of the database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    /// Ensure the data directory exists.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        let weight_sum: u64 = self
            .diagnostics
            .stage_weights
            .iter()
            .map(|&w| u64::from(w))
            .sum();
        if weight_sum != 100 {
            return Err(ConfigValidationError::InvalidValue {
                field: "diagnostics.stage_weights".into(),
                message: format!("must sum to 100, got {weight_sum}"),
            });
        }

        if self.diagnostics.words_per_scene == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "diagnostics.words_per_scene".into(),
                message: "must be greater than 0".into(),
            });
        }

        let tolerance = self.diagnostics.scene_count_tolerance;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "diagnostics.scene_count_tolerance".into(),
                message: "must be a non-negative number".into(),
            });
        }

        if self.context.style_sample_count == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "context.style_sample_count".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.database_file.trim().is_empty() {
            return Err(ConfigValidationError::InvalidValue {
                field: "database_file".into(),
                message: "must not be empty".into(),
            });
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env_from(pairs: &[(&str, String)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();

        assert_eq!(config.database_file, "snowflake.db");
        assert_eq!(config.diagnostics.words_per_scene, 1500);
        assert_eq!(config.diagnostics.stage_weights.iter().sum::<u32>(), 100);
        assert_eq!(config.context.character_bible_fields, vec!["role", "eyeColor"]);
        assert_eq!(config.context.style_sample_count, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_weights() {
        let mut config = EngineConfig::default();
        config.diagnostics.stage_weights[0] = 50;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("diagnostics.stage_weights"));
    }

    #[test]
    fn test_validate_rejects_weights_that_wrap() {
        let mut config = EngineConfig::default();
        config.diagnostics.stage_weights = [u32::MAX, 101, 0, 0, 0, 0, 0, 0, 0, 0];

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("got 4294967396"));
    }

    #[test]
    fn test_validate_rejects_zero_words_per_scene() {
        let config = EngineConfig::default().with_words_per_scene(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_partial_file_and_env_override() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("custom.toml");
        std::fs::write(
            &file,
            "database_file = \"novel.db\"\n\n[diagnostics]\nwords_per_scene = 2000\n",
        )
        .unwrap();

        let data_dir = dir.path().join("data");
        let env = env_from(&[
            (CONFIG_ENV, file.display().to_string()),
            (DATA_DIR_ENV, data_dir.display().to_string()),
        ]);
        let config = EngineConfig::load_with(env).unwrap();

        assert_eq!(config.database_file, "novel.db");
        assert_eq!(config.diagnostics.words_per_scene, 2000);
        assert_eq!(config.diagnostics.scene_count_tolerance, 0.3);
        assert_eq!(config.data_dir, data_dir);
        assert_eq!(config.database_path(), data_dir.join("novel.db"));
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let env = env_from(&[(DATA_DIR_ENV, dir.path().display().to_string())]);
        let config = EngineConfig::load_with(env).unwrap();

        assert_eq!(config.data_dir, dir.path());
        assert_eq!(config.database_file, "snowflake.db");
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "[diagnostics]\nstage_weights = [10, 10, 10, 10, 10, 10, 10, 10, 10, 0]\n",
        )
        .unwrap();

        let env = env_from(&[(DATA_DIR_ENV, dir.path().display().to_string())]);
        let err = EngineConfig::load_with(env).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }
}
