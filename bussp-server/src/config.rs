//! Server configuration read from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::cache::CacheConfig;
use crate::olhovivo::OlhoVivoConfig;

pub const ENV_API_TOKEN: &str = "SPTRANS_API_TOKEN";
pub const ENV_BASE_URL: &str = "SPTRANS_BASE_URL";
pub const ENV_DATA_FILE: &str = "BUSSP_DATA_FILE";
pub const ENV_LISTEN_ADDR: &str = "BUSSP_LISTEN_ADDR";
pub const ENV_CACHE_MAX_ENTRIES: &str = "BUSSP_CACHE_MAX_ENTRIES";

const DEFAULT_DATA_FILE: &str = "bussp_data.json";
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3000";

/// Errors from reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{name} has invalid value {value:?}: {message}")]
    Invalid {
        name: &'static str,
        value: String,
        message: String,
    },
}

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub olhovivo: OlhoVivoConfig,
    pub cache: CacheConfig,
    pub data_file: PathBuf,
    pub listen_addr: SocketAddr,
}

impl AppConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let token = get(ENV_API_TOKEN).ok_or(ConfigError::Missing(ENV_API_TOKEN))?;
        let mut olhovivo = OlhoVivoConfig::new(token.trim());
        if let Some(url) = get(ENV_BASE_URL) {
            olhovivo = olhovivo.with_base_url(url);
        }

        let mut cache = CacheConfig::default();
        if let Some(raw) = get(ENV_CACHE_MAX_ENTRIES) {
            let n = raw.trim().parse::<usize>().map_err(|e| ConfigError::Invalid {
                name: ENV_CACHE_MAX_ENTRIES,
                value: raw.clone(),
                message: e.to_string(),
            })?;
            cache = cache.with_max_entries(n);
        }

        let data_file = get(ENV_DATA_FILE)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE));

        let raw_addr = get(ENV_LISTEN_ADDR).unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = raw_addr.trim().parse().map_err(|e: std::net::AddrParseError| {
            ConfigError::Invalid {
                name: ENV_LISTEN_ADDR,
                value: raw_addr.clone(),
                message: e.to_string(),
            }
        })?;

        Ok(Self {
            olhovivo,
            cache,
            data_file,
            listen_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = AppConfig::from_lookup(lookup(&[(ENV_API_TOKEN, "secret")])).unwrap();

        assert_eq!(config.olhovivo.api_token, "secret");
        assert_eq!(config.data_file, PathBuf::from("bussp_data.json"));
        assert_eq!(config.listen_addr, "127.0.0.1:3000".parse().unwrap());
        assert_eq!(config.cache.max_entries, CacheConfig::default().max_entries);
    }

    #[test]
    fn token_is_required() {
        let err = AppConfig::from_lookup(lookup(&[(ENV_API_TOKEN, "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ENV_API_TOKEN)));
    }

    #[test]
    fn overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            (ENV_API_TOKEN, "secret"),
            (ENV_BASE_URL, "http://localhost:9999/"),
            (ENV_DATA_FILE, "/tmp/data.json"),
            (ENV_LISTEN_ADDR, "0.0.0.0:8080"),
            (ENV_CACHE_MAX_ENTRIES, "25"),
        ]))
        .unwrap();

        assert_eq!(config.olhovivo.base_url, "http://localhost:9999");
        assert_eq!(config.data_file, PathBuf::from("/tmp/data.json"));
        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(config.cache.max_entries, 25);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = AppConfig::from_lookup(lookup(&[
            (ENV_API_TOKEN, "secret"),
            (ENV_CACHE_MAX_ENTRIES, "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: ENV_CACHE_MAX_ENTRIES, .. }));

        let err = AppConfig::from_lookup(lookup(&[
            (ENV_API_TOKEN, "secret"),
            (ENV_LISTEN_ADDR, "nowhere"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: ENV_LISTEN_ADDR, .. }));
    }
}
