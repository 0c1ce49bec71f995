//! Configuration management
//!
//! Captured at module construction and treated as read-only thereafter.

use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Container runtime binary ("docker" or "podman")
    pub runtime: String,
    /// Default base image for utility steps
    pub default_image: String,
    /// Workspace mount path inside step containers
    pub workspace_dir: String,
    /// Log level
    pub log_level: String,
}

impl Config {
    /// Reads configuration from `STEPLINE_*` environment variables
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            runtime: env_or("STEPLINE_RUNTIME", defaults.runtime),
            default_image: env_or("STEPLINE_DEFAULT_IMAGE", defaults.default_image),
            workspace_dir: env_or("STEPLINE_WORKSPACE_DIR", defaults.workspace_dir),
            log_level: env_or("STEPLINE_LOG", defaults.log_level),
        }
    }
}

fn env_or(var: &str, default: String) -> String {
    std::env::var(var).unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            runtime: "docker".to_string(),
            default_image: "alpine:3.20".to_string(),
            workspace_dir: "/workspace".to_string(),
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.runtime, "docker");
        assert_eq!(config.workspace_dir, "/workspace");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_config_from_env_override() {
        std::env::set_var("STEPLINE_RUNTIME", "podman");
        let config = Config::from_env();
        std::env::remove_var("STEPLINE_RUNTIME");
        assert_eq!(config.runtime, "podman");
    }
}
