use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Serialize, Deserialize};

use crate::cache::CacheConfig;
use crate::engine::EngineConfig;

/// Which artifacts to run
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ArtifactSelection {
    /// Artifact names to select; empty selects every non-long-running artifact
    #[serde(default)]
    pub selected: Vec<String>,
    #[serde(default)]
    pub include_long_running: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StagingConfig {
    /// Leave files extracted from containers in place after the run
    #[serde(default)]
    pub keep_staged_files: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExtractorConfig {
    pub version: String,
    pub description: String,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub artifacts: ArtifactSelection,
    #[serde(default)]
    pub staging: StagingConfig,
    /// Record the SHA-256 of the input evidence in the run summary
    #[serde(default)]
    pub hash_input: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        ExtractorConfig {
            version: "1.0".to_string(),
            description: "Default artifact extraction configuration".to_string(),
            cache: CacheConfig::default(),
            engine: EngineConfig::default(),
            artifacts: ArtifactSelection::default(),
            staging: StagingConfig::default(),
            hash_input: false,
        }
    }
}

impl ExtractorConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: ExtractorConfig = serde_yaml::from_str(&content)
            .context("Failed to parse YAML config")?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)
            .context("Failed to serialize config to YAML")?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .context(format!("Failed to create config directory: {}", parent.display()))?;
        }

        fs::write(path, yaml)
            .context(format!("Failed to write config to {}", path.display()))?;

        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    pub fn create_default_config_file(path: &Path) -> Result<()> {
        Self::default().save_to_yaml_file(path)
    }
}

/// Load the configuration at `config_path`, writing the defaults there if
/// the file does not exist yet. Without a path the defaults are used.
pub fn load_or_create_config(config_path: Option<&Path>) -> Result<ExtractorConfig> {
    match config_path {
        Some(path) if path.exists() => ExtractorConfig::from_yaml_file(path),
        Some(path) => {
            info!("Creating default config at {}", path.display());
            let default_config = ExtractorConfig::default();
            default_config.save_to_yaml_file(path)?;
            Ok(default_config)
        }
        None => {
            debug!("No config path provided, using default configuration");
            Ok(ExtractorConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_HANDLE_LIMIT;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_defaults() {
        let config = ExtractorConfig::default();
        assert_eq!(config.cache.handle_limit, DEFAULT_HANDLE_LIMIT);
        assert!(!config.cache.strict_pattern_options);
        assert!(config.engine.artifact_timeout_secs.is_none());
        assert!(config.artifacts.selected.is_empty());
        assert!(!config.staging.keep_staged_files);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "version: '2.0'\ndescription: Lab\nengine:\n  artifact_timeout_secs: 30\n";
        let config: ExtractorConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.version, "2.0");
        assert_eq!(config.engine.artifact_timeout_secs, Some(30));
        assert_eq!(config.cache.handle_limit, DEFAULT_HANDLE_LIMIT);
        assert!(!config.hash_input);
    }

    #[test]
    fn test_save_and_load_yaml_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("extractor.yaml");

        let mut config = ExtractorConfig::default();
        config.artifacts.selected = vec!["sms_messages".to_string()];
        config.cache.case_insensitive = true;
        config.save_to_yaml_file(&config_path).unwrap();

        let loaded = ExtractorConfig::from_yaml_file(&config_path).unwrap();
        assert_eq!(loaded.artifacts.selected, vec!["sms_messages".to_string()]);
        assert!(loaded.cache.case_insensitive);
    }

    #[test]
    fn test_load_or_create_config_new_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested/new.yaml");

        let loaded = load_or_create_config(Some(&config_path)).unwrap();
        assert!(config_path.exists());
        assert_eq!(loaded.version, "1.0");
    }

    #[test]
    fn test_load_or_create_config_no_path() {
        let loaded = load_or_create_config(None).unwrap();
        assert_eq!(loaded.version, "1.0");
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "invalid: yaml: content:").unwrap();

        let result = ExtractorConfig::from_yaml_file(temp_file.path());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Failed to parse YAML"));
    }
}
