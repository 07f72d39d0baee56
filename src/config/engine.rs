use std::path::Path;

use serde::Deserialize;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Tunables of the authorization engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Upper bound on credentials accepted in one request.
    pub max_credentials: usize,
    /// Groups a user may own when no per-user limit is recorded.
    pub default_group_limit: i64,
    /// Permission names a restricted token may still exercise.
    pub read_only_permissions: Vec<String>,
    /// Ancestor walk bound used by the re-parent cycle check.
    pub max_group_depth: usize,
    /// Plan type whose units cap group membership.
    pub seat_plan_type: String,
    /// Plan subscribed to every new top-level group, if any.
    pub free_plan_id: Option<Uuid>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_credentials: 10,
            default_group_limit: 15,
            read_only_permissions: vec!["read".to_string(), "view".to_string()],
            max_group_depth: 32,
            seat_plan_type: "seats".to_string(),
            free_plan_id: None,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    fn validate(&self) -> Result<()> {
        if self.max_credentials == 0 {
            return Err(Error::Config("max_credentials must be at least 1".to_string()));
        }
        if self.default_group_limit < 0 {
            return Err(Error::Config(
                "default_group_limit cannot be negative".to_string(),
            ));
        }
        if self.max_group_depth == 0 {
            return Err(Error::Config("max_group_depth must be at least 1".to_string()));
        }
        Ok(())
    }
}
