use std::env;
use std::path::{Path, PathBuf};

use runtime::IdlePolicy;
use scene::DEFAULT_MAX_SECONDARY;
use serde::{Deserialize, Serialize};
use streaming::{GlobeWindow, QuerySettings};

pub const ENV_PREFIX: &str = "GEOPORTAL_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path:?}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value {value:?} for {key}")]
    InvalidEnv { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// More candidates than this collapse into a "too many" notice.
    pub max_secondary: usize,
    pub feature_count: u32,
    pub structured_info_format: String,
    pub legacy_info_format: String,
    pub srs: String,
    pub idle: IdlePolicy,
    pub globe_window: GlobeWindow,
    /// Delay before the selection is re-read after a layer-stack change.
    pub settle_delay_ms: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        let query = QuerySettings::default();
        Self {
            max_secondary: DEFAULT_MAX_SECONDARY,
            feature_count: query.feature_count,
            structured_info_format: query.structured_info_format,
            legacy_info_format: query.legacy_info_format,
            srs: query.srs,
            idle: IdlePolicy::default(),
            globe_window: query.globe_window,
            settle_delay_ms: 50,
        }
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>, ConfigError> {
    let key = format!("{ENV_PREFIX}{name}");
    match lookup(&key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { key, value }),
    }
}

fn env_var_u32(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    slot: &mut u32,
) -> Result<(), ConfigError> {
    if let Some(v) = parse_var(lookup, name)? {
        *slot = v;
    }
    Ok(())
}

fn env_var_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    slot: &mut u64,
) -> Result<(), ConfigError> {
    if let Some(v) = parse_var(lookup, name)? {
        *slot = v;
    }
    Ok(())
}

fn env_var_usize(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    slot: &mut usize,
) -> Result<(), ConfigError> {
    if let Some(v) = parse_var(lookup, name)? {
        *slot = v;
    }
    Ok(())
}

fn env_var_f64(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    slot: &mut f64,
) -> Result<(), ConfigError> {
    if let Some(v) = parse_var(lookup, name)? {
        *slot = v;
    }
    Ok(())
}

fn env_var_string(lookup: &impl Fn(&str) -> Option<String>, name: &str, slot: &mut String) {
    if let Some(v) = lookup(&format!("{ENV_PREFIX}{name}")) {
        *slot = v;
    }
}

impl PortalConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies `GEOPORTAL_*` variables from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| env::var(key).ok())
    }

    pub fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        env_var_usize(&lookup, "MAX_SECONDARY", &mut self.max_secondary)?;
        env_var_u32(&lookup, "FEATURE_COUNT", &mut self.feature_count)?;
        env_var_string(&lookup, "STRUCTURED_INFO_FORMAT", &mut self.structured_info_format);
        env_var_string(&lookup, "LEGACY_INFO_FORMAT", &mut self.legacy_info_format);
        env_var_string(&lookup, "SRS", &mut self.srs);
        env_var_u64(&lookup, "IDLE_INITIAL_DELAY_MS", &mut self.idle.initial_delay_ms)?;
        env_var_u64(&lookup, "IDLE_MAX_DELAY_MS", &mut self.idle.max_delay_ms)?;
        env_var_f64(&lookup, "IDLE_MULTIPLIER", &mut self.idle.multiplier)?;
        env_var_u32(&lookup, "IDLE_MAX_ATTEMPTS", &mut self.idle.max_attempts)?;
        env_var_f64(&lookup, "GLOBE_HALF_EXTENT_M", &mut self.globe_window.half_extent_m)?;
        env_var_u32(&lookup, "GLOBE_SIZE_PX", &mut self.globe_window.size_px)?;
        env_var_u64(&lookup, "SETTLE_DELAY_MS", &mut self.settle_delay_ms)?;
        Ok(())
    }

    pub fn query_settings(&self) -> QuerySettings {
        QuerySettings {
            srs: self.srs.clone(),
            structured_info_format: self.structured_info_format.clone(),
            legacy_info_format: self.legacy_info_format.clone(),
            feature_count: self.feature_count,
            globe_window: self.globe_window,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{ConfigError, PortalConfig};

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_portal_behaviour() {
        let config = PortalConfig::default();
        assert_eq!(config.max_secondary, 4);
        assert_eq!(config.feature_count, 99);
        assert_eq!(config.srs, "EPSG:25832");
        assert_eq!(config.legacy_info_format, "text/html");
        assert_eq!(config.idle.initial_delay_ms, 20);
        assert_eq!(config.globe_window.size_px, 101);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: PortalConfig =
            serde_json::from_str(r#"{ "max_secondary": 6, "idle": { "max_attempts": 3 } }"#)
                .expect("config");
        assert_eq!(config.max_secondary, 6);
        assert_eq!(config.idle.max_attempts, 3);
        assert_eq!(config.idle.initial_delay_ms, 20);
        assert_eq!(config.feature_count, 99);
    }

    #[test]
    fn env_overrides_apply() {
        let env = vars(&[
            ("GEOPORTAL_FEATURE_COUNT", "10"),
            ("GEOPORTAL_SRS", "EPSG:3857"),
            ("GEOPORTAL_IDLE_MAX_ATTEMPTS", "7"),
            ("OTHER", "x"),
        ]);
        let mut config = PortalConfig::default();
        config
            .apply_env_from(|k| env.get(k).cloned())
            .expect("env");
        assert_eq!(config.feature_count, 10);
        assert_eq!(config.srs, "EPSG:3857");
        assert_eq!(config.idle.max_attempts, 7);
        assert_eq!(config.query_settings().feature_count, 10);
    }

    #[test]
    fn malformed_env_value_is_rejected() {
        let env = vars(&[("GEOPORTAL_MAX_SECONDARY", "many")]);
        let err = PortalConfig::default()
            .apply_env_from(|k| env.get(k).cloned())
            .expect_err("invalid");
        assert!(matches!(
            err,
            ConfigError::InvalidEnv { key, .. } if key == "GEOPORTAL_MAX_SECONDARY"
        ));
    }
}
