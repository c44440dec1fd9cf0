//! Dashboard configuration
//!
//! Read from `<data_root>/config.yaml` (see `utils::paths::get_data_root`).
//! Every section is optional and falls back to defaults if the file doesn't
//! exist.
//!
//! Environment Variable Overrides:
//! - SESSIONSCOPE_API_HOST: Override server.host
//! - SESSIONSCOPE_API_PORT: Override server.port

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::MAX_CONFIG_SIZE;
use crate::error::AppError;
use crate::pricing::{ModelRates, PricingTable};
use crate::utils::paths;

/// HTTP bind settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3040,
        }
    }
}

impl ServerConfig {
    /// Apply environment variable overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(host) = env::var("SESSIONSCOPE_API_HOST") {
            self.host = host;
        }
        if let Some(port) = env::var("SESSIONSCOPE_API_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
        {
            self.port = port;
        }
        self
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Where each assistant CLI keeps its transcripts.
/// Unset entries use the CLI's default location; `~/` is expanded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub claude_dir: Option<String>,
    pub codex_dir: Option<String>,
    pub gemini_dir: Option<String>,
}

impl SourcesConfig {
    fn resolve(
        configured: Option<&str>,
        default: fn() -> Result<PathBuf, String>,
    ) -> Option<PathBuf> {
        let resolved = match configured {
            Some(dir) => paths::expand_home(dir),
            None => default(),
        };
        match resolved {
            Ok(dir) => Some(dir),
            Err(e) => {
                tracing::warn!("Skipping transcript source: {}", e);
                None
            }
        }
    }

    pub fn claude_dir(&self) -> Option<PathBuf> {
        Self::resolve(self.claude_dir.as_deref(), paths::default_claude_projects_dir)
    }

    pub fn codex_dir(&self) -> Option<PathBuf> {
        Self::resolve(self.codex_dir.as_deref(), paths::default_codex_sessions_dir)
    }

    pub fn gemini_dir(&self) -> Option<PathBuf> {
        Self::resolve(self.gemini_dir.as_deref(), paths::default_gemini_tmp_dir)
    }
}

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub server: ServerConfig,
    pub sources: SourcesConfig,
    /// Extra or replacement model rates, USD per million tokens
    pub pricing: HashMap<String, ModelRates>,
}

impl DashboardConfig {
    /// Load from the default config path
    pub fn load() -> Result<Self, AppError> {
        let path = paths::get_config_path().map_err(AppError::config_error)?;
        Self::load_from(&path)
    }

    /// Load from `path`, returning defaults if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self, AppError> {
        let config = if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            DashboardConfig::default()
        } else {
            // Size limit (DoS protection)
            let metadata = fs::metadata(path).map_err(|e| {
                AppError::config_error(format!("Failed to read config metadata: {}", e))
            })?;
            if metadata.len() > MAX_CONFIG_SIZE {
                return Err(AppError::config_error("Config file exceeds 1MB limit"));
            }

            let content = fs::read_to_string(path)
                .map_err(|e| AppError::config_error(format!("Failed to read config: {}", e)))?;
            Self::from_yaml(&content)?
        };

        Ok(config.with_env_overrides())
    }

    /// Apply environment variable overrides
    pub fn with_env_overrides(self) -> Self {
        DashboardConfig {
            server: self.server.with_env_overrides(),
            ..self
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self, AppError> {
        if content.trim().is_empty() {
            return Ok(DashboardConfig::default());
        }
        serde_yaml::from_str(content)
            .map_err(|e| AppError::config_error(format!("Failed to parse config YAML: {}", e)))
    }

    /// Built-in rates with this config's overrides applied
    pub fn pricing_table(&self) -> PricingTable {
        PricingTable::builtin().with_overrides(&self.pricing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = DashboardConfig::default();
        assert_eq!(config.server.port, 3040);
        assert_eq!(config.server.bind_addr(), "127.0.0.1:3040");
        assert!(config.pricing.is_empty());
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
sources:
  codex_dir: /data/codex
pricing:
  my-finetune:
    input: 0.5
    output: 1.5
"#;
        let config = DashboardConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.server, ServerConfig::default());
        assert_eq!(config.sources.codex_dir(), Some(PathBuf::from("/data/codex")));
        assert!(config.pricing_table().lookup("my-finetune").is_some());
        assert_eq!(config.pricing["my-finetune"].cache_read, None);
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = DashboardConfig::from_yaml("server: [not, a, map]").unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigError);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = DashboardConfig::load_from(&dir.path().join("config.yaml")).unwrap();
        assert_eq!(config.sources, SourcesConfig::default());
    }

    #[test]
    fn test_oversized_file_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let line = "# padding padding padding padding padding padding padding\n";
        for _ in 0..(MAX_CONFIG_SIZE as usize / line.len() + 1) {
            file.write_all(line.as_bytes()).unwrap();
        }
        file.flush().unwrap();
        let err = DashboardConfig::load_from(file.path()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigError);
    }
}
