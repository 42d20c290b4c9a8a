//! Engine configuration.
//!
//! TOML-based, with a small search order so deployments can tune the engine
//! without code changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HtnqlError, Result};
use crate::planner::DEFAULT_AGENT;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct HtnqlConfig {
    pub planner: PlannerConfig,
    pub query: QueryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Agent catalog used when a request does not name one.
    pub default_agent: String,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            default_agent: DEFAULT_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Largest LIMIT a spec may request (0 = unlimited). Specs above the cap
    /// are rejected rather than clamped.
    pub max_row_limit: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { max_row_limit: 0 }
    }
}

impl HtnqlConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| HtnqlError::Config(format!("failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| HtnqlError::Config(format!("failed to parse config: {e}")))
    }

    /// Load from default locations (env var, cwd, user config dir, defaults).
    ///
    /// Search order:
    /// 1. `HTNQL_CONFIG` environment variable
    /// 2. `./htnql.toml` (current directory)
    /// 3. `~/.config/htnql/config.toml` (user config dir)
    /// 4. Built-in defaults
    pub fn load_default() -> Self {
        if let Ok(path) = std::env::var("HTNQL_CONFIG") {
            if let Ok(cfg) = Self::from_file(&path) {
                tracing::info!(path = %path, "loaded config from HTNQL_CONFIG");
                return cfg;
            }
        }

        if let Ok(cfg) = Self::from_file("htnql.toml") {
            tracing::info!("loaded config from ./htnql.toml");
            return cfg;
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("htnql").join("config.toml");
            if let Ok(cfg) = Self::from_file(&user_config) {
                tracing::info!(path = %user_config.display(), "loaded config from user config dir");
                return cfg;
            }
        }

        tracing::debug!("no config file found, using defaults");
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let cfg = HtnqlConfig::default();
        assert_eq!(cfg.planner.default_agent, "default");
        assert_eq!(cfg.query.max_row_limit, 0);
    }

    #[test]
    fn parse_toml() {
        let toml = r#"
[planner]
default_agent = "strict"

[query]
max_row_limit = 50000
"#;
        let cfg = HtnqlConfig::from_toml(toml).unwrap();
        assert_eq!(cfg.planner.default_agent, "strict");
        assert_eq!(cfg.query.max_row_limit, 50_000);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = HtnqlConfig::from_toml("[query]\nmax_row_limit = 10\n").unwrap();
        assert_eq!(cfg.planner.default_agent, "default");
        assert_eq!(cfg.query.max_row_limit, 10);
    }
}
