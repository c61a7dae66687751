use std::env;
use std::path::{Path, PathBuf};

use figment::{
    Figment, Provider,
    providers::{Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

/// Name of the profile file inside the tests directory.
pub const PROFILES_FILE: &str = "test_profiles.toml";

/// Environment variable that selects the profile when none is given.
pub const PROFILE_ENV: &str = "TEST_PROFILE";

pub const DEFAULT_PROFILE: &str = "docker";

/// Connection settings for one deployment of the stack.
///
/// Every field can be overridden by an environment variable with the same
/// name in uppercase, e.g. `CH_PORT=9440`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestConfig {
    pub ch_host: String,
    /// Native protocol port
    pub ch_port: u16,
    /// HTTP interface port
    #[serde(default = "default_ch_http_port")]
    pub ch_http_port: u16,
    pub ch_user: String,
    pub ch_password: String,

    pub ice_rest_host: String,
    pub ice_rest_port: u16,
    /// Bearer token for the catalog REST API
    #[serde(default = "default_ice_rest_token")]
    pub ice_rest_token: String,
    /// ice CLI config file, relative to the tests directory
    pub ice_config: String,
    /// Catalog URL as seen by ClickHouse from inside the stack network
    #[serde(default = "default_ice_catalog_endpoint")]
    pub ice_catalog_endpoint: String,
    pub ice_setting_auth_header: String,
    pub ice_setting_storage_endpoint: String,
    pub ice_setting_warehouse: String,

    /// Whether the stack runs under docker compose on this host
    pub use_docker: bool,
}

fn default_ch_http_port() -> u16 {
    8123
}

fn default_ice_rest_token() -> String {
    "foo".to_string()
}

fn default_ice_catalog_endpoint() -> String {
    "http://ice-rest-catalog:5000".to_string()
}

impl TestConfig {
    pub fn catalog_base_url(&self) -> String {
        format!("http://{}:{}", self.ice_rest_host, self.ice_rest_port)
    }

    pub fn clickhouse_http_url(&self) -> String {
        format!("http://{}:{}", self.ch_host, self.ch_http_port)
    }
}

/// How an environment override is converted before it replaces a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Int,
    Text,
}

/// Every [`TestConfig`] field with its override conversion.
pub const FIELDS: &[(&str, FieldKind)] = &[
    ("ch_host", FieldKind::Text),
    ("ch_port", FieldKind::Int),
    ("ch_http_port", FieldKind::Int),
    ("ch_user", FieldKind::Text),
    ("ch_password", FieldKind::Text),
    ("ice_rest_host", FieldKind::Text),
    ("ice_rest_port", FieldKind::Int),
    ("ice_rest_token", FieldKind::Text),
    ("ice_config", FieldKind::Text),
    ("ice_catalog_endpoint", FieldKind::Text),
    ("ice_setting_auth_header", FieldKind::Text),
    ("ice_setting_storage_endpoint", FieldKind::Text),
    ("ice_setting_warehouse", FieldKind::Text),
    ("use_docker", FieldKind::Bool),
];

impl FieldKind {
    /// Converts a raw environment value; `None` if it cannot be converted.
    pub fn coerce(self, raw: &str) -> Option<serde_json::Value> {
        match self {
            FieldKind::Bool => Some(serde_json::Value::Bool(is_truthy(raw))),
            FieldKind::Int => raw.trim().parse::<i64>().ok().map(serde_json::Value::from),
            FieldKind::Text => Some(serde_json::Value::String(raw.to_string())),
        }
    }
}

/// `true`, `1` and `yes` in any case; everything else is false.
pub fn is_truthy(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Profile file {} not found", .0.display())]
    MissingFile(PathBuf),

    #[error("Unknown profile name: {name}. Available: {available:?}")]
    UnknownProfile {
        name: String,
        available: Vec<String>,
    },

    #[error("Invalid value '{value}' in {variable}: expected an integer")]
    InvalidOverride { variable: String, value: String },

    #[error("Failed to read profile '{profile}': {source}")]
    Extract {
        profile: String,
        #[source]
        source: Box<figment::Error>,
    },
}

/// A profile's settings after environment overrides.
#[derive(Clone, Debug)]
pub struct LoadedConfig {
    pub profile: String,
    pub config: TestConfig,
}

/// Loads a profile from `<tests_dir>/test_profiles.toml`.
///
/// The profile is `profile` if given, else `$TEST_PROFILE`, else `docker`.
/// Each top-level table of the file is one profile; `[default]` and
/// `[global]` follow figment's usual meaning and are not selectable.
pub fn load(tests_dir: &Path, profile: Option<&str>) -> Result<LoadedConfig, ConfigError> {
    let profile = profile
        .map(str::to_string)
        .or_else(|| env::var(PROFILE_ENV).ok())
        .unwrap_or_else(|| DEFAULT_PROFILE.to_string());

    let path = tests_dir.join(PROFILES_FILE);
    if !path.is_file() {
        return Err(ConfigError::MissingFile(path));
    }

    let figment = Figment::from(Toml::file(&path).nested());
    let available: Vec<String> = figment
        .data()
        .map_err(|source| extract_error(&profile, source))?
        .keys()
        .map(|p| p.to_string())
        .filter(|p| !p.eq_ignore_ascii_case("default") && !p.eq_ignore_ascii_case("global"))
        .collect();
    if !available.iter().any(|p| p.eq_ignore_ascii_case(&profile)) {
        return Err(ConfigError::UnknownProfile {
            name: profile,
            available,
        });
    }

    let overrides = env_overrides()?;
    let config = figment
        .merge(Serialized::globals(overrides))
        .select(profile.as_str())
        .extract::<TestConfig>()
        .map_err(|source| extract_error(&profile, source))?;

    log::info!("Loaded test profile: {profile}");
    Ok(LoadedConfig { profile, config })
}

fn extract_error(profile: &str, source: figment::Error) -> ConfigError {
    ConfigError::Extract {
        profile: profile.to_string(),
        source: Box::new(source),
    }
}

fn env_overrides() -> Result<serde_json::Map<String, serde_json::Value>, ConfigError> {
    let mut overrides = serde_json::Map::new();
    for (field, kind) in FIELDS {
        let variable = field.to_ascii_uppercase();
        let Ok(raw) = env::var(&variable) else {
            continue;
        };
        let value = kind
            .coerce(&raw)
            .ok_or_else(|| ConfigError::InvalidOverride {
                variable: variable.clone(),
                value: raw.clone(),
            })?;
        log::info!("Override {field} from environment variable {variable}");
        overrides.insert(field.to_string(), value);
    }
    Ok(overrides)
}
