//! # spnegosoap configuration
//!
//! Configuration management for the SPNEGO SOAP client:
//! - Embedded default configuration (`spnegosoap.yaml`)
//! - Optional `config.yaml` merged over the defaults
//! - Environment variable overrides
//! - Typed getters for the connection, security, HTTP and logging settings
//!
//! ## Usage
//!
//! ```no_run
//! use spnegoconfig::Config;
//!
//! let config = Config::load_config("")?;
//! let module = config.get_login_module();
//! let timeout = config.get_http_timeout_secs();
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! Any value can be overridden from the environment with
//! `SPNEGOSOAP_CONFIG__<SECTION>__<KEY>=<yaml value>`, for instance
//! `SPNEGOSOAP_CONFIG__SECURITY__CONFIDENTIALITY=true`.

use anyhow::{anyhow, Result};
use dirs::home_dir;
use serde_yaml::{Mapping, Value};
use std::{
    env, fs,
    path::Path,
    sync::{Mutex, MutexGuard},
};
use tracing::{info, warn};

// Embedded defaults
const DEFAULT_CONFIG: &str = include_str!("spnegosoap.yaml");

const ENV_CONFIG_DIR: &str = "SPNEGOSOAP_CONFIG";
const ENV_PREFIX: &str = "SPNEGOSOAP_CONFIG__";
const LOCAL_CONFIG_DIR: &str = ".spnegosoap";
const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_LOGIN_MODULE: &str = "spnego-client";
const DEFAULT_SOAP_VERSION: &str = "1.1";
const DEFAULT_CONFIDENTIALITY: bool = false;
const DEFAULT_INTEGRITY: bool = false;
const DEFAULT_DISPOSE_CREDENTIALS: bool = true;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PROXY_FROM_ENV: bool = true;
const DEFAULT_MAX_RESPONSE_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_USER_AGENT: &str = "spnegosoap";
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";

/// Generates a getter for a bool value with default
macro_rules! impl_bool_config {
    ($getter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> bool {
            match self.get_value($path) {
                Ok(Value::Bool(b)) => b,
                Ok(other) => {
                    warn!(path = %$path.join("."), value = ?other, "Expected a boolean, using default {}", $default);
                    $default
                }
                Err(_) => $default,
            }
        }
    };
}

/// Generates a getter for an unsigned integer value with default
macro_rules! impl_u64_config {
    ($getter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> u64 {
            match self.get_value($path) {
                Ok(Value::Number(n)) if n.is_u64() => n.as_u64().unwrap_or($default),
                Ok(Value::String(s)) => s.trim().parse::<u64>().unwrap_or_else(|_| {
                    warn!(path = %$path.join("."), value = %s, "Invalid number, using default {}", $default);
                    $default
                }),
                Ok(other) => {
                    warn!(path = %$path.join("."), value = ?other, "Expected a number, using default {}", $default);
                    $default
                }
                Err(_) => $default,
            }
        }
    };
}

/// Generates a getter for a string value with default
macro_rules! impl_string_config {
    ($getter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> String {
            match self.get_value($path) {
                Ok(Value::String(s)) => s,
                Ok(Value::Number(n)) => n.to_string(),
                _ => $default.to_string(),
            }
        }
    };
}

/// Configuration of the SPNEGO SOAP client
///
/// Holds the merged YAML tree (embedded defaults, optional `config.yaml`,
/// environment overrides). Keys are case-insensitive: they are lower-cased
/// when loaded and when looked up.
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    data: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        let data = self.lock().clone();
        Self {
            config_dir: self.config_dir.clone(),
            data: Mutex::new(data),
        }
    }
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> String {
        if !directory.is_empty() {
            return directory.to_string();
        }

        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return env_path;
        }

        if Path::new(LOCAL_CONFIG_DIR).exists() {
            return LOCAL_CONFIG_DIR.to_string();
        }

        if let Some(home) = home_dir() {
            let home_config = home.join(LOCAL_CONFIG_DIR);
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        LOCAL_CONFIG_DIR.to_string()
    }

    /// Loads the configuration
    ///
    /// The directory holding `config.yaml` is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `SPNEGOSOAP_CONFIG` environment variable
    /// 3. `.spnegosoap` in the current directory
    /// 4. `.spnegosoap` in the user's home directory
    ///
    /// A missing directory or file is not an error: the embedded defaults are
    /// used. The file is never written back.
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::find_config_dir(directory);
        let path = Path::new(&config_dir).join(CONFIG_FILE);

        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        match fs::read(&path) {
            Ok(data) => {
                info!(config_file = %path.display(), "Loaded config file");
                let external: Value = serde_yaml::from_slice(&data)
                    .map_err(|e| anyhow!("Invalid YAML in {}: {}", path.display(), e))?;
                merge_yaml(&mut value, &lower_keys_value(external));
            }
            Err(_) => {
                info!(config_file = %path.display(), "Config file not found, using default embedded config");
            }
        }

        let mut value = lower_keys_value(value);
        apply_overrides(&mut value, env::vars());

        Ok(Config {
            config_dir,
            data: Mutex::new(value),
        })
    }

    /// Builds a configuration from the embedded defaults merged with `yaml`
    ///
    /// Environment variables are not consulted.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        let external: Value = serde_yaml::from_str(yaml)?;
        merge_yaml(&mut value, &lower_keys_value(external));

        Ok(Config {
            config_dir: String::new(),
            data: Mutex::new(lower_keys_value(value)),
        })
    }

    /// Directory the configuration was looked up in
    pub fn config_dir(&self) -> &str {
        &self.config_dir
    }

    fn lock(&self) -> MutexGuard<'_, Value> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sets a configuration value at the specified path (in memory only)
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["http", "timeout_secs"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        let mut data = self.lock();
        set_value_internal(&mut data, path, value)
    }

    /// Gets a configuration value at the specified path
    ///
    /// Returns an error if the path doesn't exist.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.lock();
        get_value_internal(&data, path)
    }

    impl_string_config!(get_login_module, &["client", "login_module"], DEFAULT_LOGIN_MODULE);

    /// Username for a password based login, if configured
    pub fn get_username(&self) -> Option<String> {
        self.get_optional_string(&["client", "username"])
    }

    /// Password for a password based login, if configured
    pub fn get_password(&self) -> Option<String> {
        self.get_optional_string(&["client", "password"])
    }

    impl_string_config!(get_soap_version, &["client", "soap_version"], DEFAULT_SOAP_VERSION);

    impl_bool_config!(get_confidentiality, &["security", "confidentiality"], DEFAULT_CONFIDENTIALITY);

    impl_bool_config!(get_integrity, &["security", "integrity"], DEFAULT_INTEGRITY);

    impl_bool_config!(
        get_dispose_credentials,
        &["security", "dispose_credentials"],
        DEFAULT_DISPOSE_CREDENTIALS
    );

    impl_u64_config!(get_http_timeout_secs, &["http", "timeout_secs"], DEFAULT_HTTP_TIMEOUT_SECS);

    impl_bool_config!(get_proxy_from_env, &["http", "proxy_from_env"], DEFAULT_PROXY_FROM_ENV);

    impl_u64_config!(
        get_max_response_bytes,
        &["http", "max_response_bytes"],
        DEFAULT_MAX_RESPONSE_BYTES
    );

    impl_string_config!(get_user_agent, &["http", "user_agent"], DEFAULT_USER_AGENT);

    impl_string_config!(get_log_min_level, &["log", "min_level"], DEFAULT_LOG_MIN_LEVEL);

    fn get_optional_string(&self, path: &[&str]) -> Option<String> {
        match self.get_value(path) {
            Ok(Value::String(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }
}

fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
    if path.is_empty() {
        *data = value;
        return Ok(());
    }
    if let Value::Mapping(map) = data {
        let key_value = Value::String(path[0].to_lowercase());
        if path.len() == 1 {
            map.insert(key_value, value);
        } else {
            let entry = map
                .entry(key_value)
                .or_insert(Value::Mapping(Mapping::new()));
            set_value_internal(entry, &path[1..], value)?;
        }
        Ok(())
    } else {
        Err(anyhow!("Current node is not a map"))
    }
}

fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
    let mut current = data;
    for (i, key) in path.iter().enumerate() {
        if let Value::Mapping(map) = current {
            match map.get(&Value::String(key.to_lowercase())) {
                Some(next) => current = next,
                None => return Err(anyhow!("Path {} does not exist", path[..=i].join("."))),
            }
        } else {
            return Err(anyhow!("Path {} is not a mapping", path[..i].join(".")));
        }
    }
    Ok(current.clone())
}

fn apply_overrides<I>(config: &mut Value, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
            let key_path = stripped.split("__").collect::<Vec<_>>();
            let yaml_value = convert_env_value(&value);
            if let Err(err) = set_value_internal(config, &key_path, yaml_value) {
                warn!(variable = %key, "Ignoring environment override: {}", err);
            }
        }
    }
}

fn convert_env_value(value: &str) -> Value {
    serde_yaml::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

fn lower_keys_value(value: Value) -> Value {
    match value {
        Value::Mapping(map) => {
            let mut new_map = Mapping::new();
            for (k, v) in map {
                let key = match k {
                    Value::String(s) => Value::String(s.to_lowercase()),
                    other => other,
                };
                new_map.insert(key, lower_keys_value(v));
            }
            Value::Mapping(new_map)
        }
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(lower_keys_value).collect()),
        _ => value,
    }
}

/// Merges external YAML configuration into default configuration
///
/// Mappings are merged key by key; scalars and sequences from `external`
/// replace the default value.
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults() {
        let config = Config::from_yaml_str("{}").unwrap();
        assert_eq!(config.get_login_module(), "spnego-client");
        assert_eq!(config.get_soap_version(), "1.1");
        assert!(!config.get_confidentiality());
        assert!(!config.get_integrity());
        assert!(config.get_dispose_credentials());
        assert_eq!(config.get_http_timeout_secs(), 30);
        assert_eq!(config.get_max_response_bytes(), 10 * 1024 * 1024);
        assert_eq!(config.get_log_min_level(), "INFO");
        assert_eq!(config.get_username(), None);
        assert_eq!(config.get_password(), None);
    }

    #[test]
    fn test_merge_keeps_untouched_defaults() {
        let config = Config::from_yaml_str(
            "Client:\n  Login_Module: custom-client\n  username: alice\nhttp:\n  timeout_secs: 5\n",
        )
        .unwrap();
        assert_eq!(config.get_login_module(), "custom-client");
        assert_eq!(config.get_username(), Some("alice".to_string()));
        assert_eq!(config.get_http_timeout_secs(), 5);
        assert_eq!(config.get_user_agent(), "spnegosoap");
    }

    #[test]
    fn test_env_overrides_are_yaml_typed() {
        let mut value = lower_keys_value(serde_yaml::from_str(DEFAULT_CONFIG).unwrap());
        apply_overrides(
            &mut value,
            vec![
                ("SPNEGOSOAP_CONFIG__SECURITY__CONFIDENTIALITY".to_string(), "true".to_string()),
                ("SPNEGOSOAP_CONFIG__HTTP__TIMEOUT_SECS".to_string(), "12".to_string()),
                ("UNRELATED".to_string(), "x".to_string()),
            ],
        );
        let config = Config {
            config_dir: String::new(),
            data: Mutex::new(value),
        };
        assert!(config.get_confidentiality());
        assert_eq!(config.get_http_timeout_secs(), 12);
        assert!(config.get_value(&["unrelated"]).is_err());
    }

    #[test]
    fn test_wrong_type_falls_back_to_default() {
        let config = Config::from_yaml_str("security:\n  integrity: maybe\n").unwrap();
        assert!(!config.get_integrity());
    }

    #[test]
    fn test_set_and_get_value() {
        let config = Config::from_yaml_str("{}").unwrap();
        config
            .set_value(&["HTTP", "user_agent"], Value::String("probe".to_string()))
            .unwrap();
        assert_eq!(config.get_user_agent(), "probe");
        assert!(config.get_value(&["http", "missing"]).is_err());
    }

    #[test]
    fn test_load_config_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "security:\n  integrity: true\nclient:\n  soap_version: \"1.2\"\n",
        )
        .unwrap();

        let config = Config::load_config(&dir.path().to_string_lossy()).unwrap();
        assert!(config.get_integrity());
        assert_eq!(config.get_soap_version(), "1.2");
        assert_eq!(config.config_dir(), dir.path().to_string_lossy());
    }

    #[test]
    fn test_load_config_without_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_config(&dir.path().to_string_lossy()).unwrap();
        assert_eq!(config.get_login_module(), "spnego-client");
    }
}
