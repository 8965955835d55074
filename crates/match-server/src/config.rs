//! Server configuration from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_ADDR: &str = "0.0.0.0:8080";

/// Runtime settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// `SERVER_ADDR`, default `0.0.0.0:8080`
    pub addr: SocketAddr,
    /// `PROGRESS_PATH`; progress stays in memory when unset
    pub progress_path: Option<PathBuf>,
}

impl ServerConfig {
    /// Read settings from the process environment
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let addr = lookup("SERVER_ADDR")
            .unwrap_or_else(|| DEFAULT_ADDR.into())
            .parse()?;
        let progress_path = lookup("PROGRESS_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            addr,
            progress_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.progress_path, None);
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("SERVER_ADDR", "127.0.0.1:9000"),
            ("PROGRESS_PATH", "/tmp/progress.json"),
        ]))
        .unwrap();

        assert_eq!(config.addr.port(), 9000);
        assert_eq!(config.progress_path, Some(PathBuf::from("/tmp/progress.json")));
    }

    #[test]
    fn test_bad_address_is_an_error() {
        assert!(ServerConfig::from_lookup(lookup_from(&[("SERVER_ADDR", "not an addr")])).is_err());
    }

    #[test]
    fn test_blank_progress_path_is_ignored() {
        let config = ServerConfig::from_lookup(lookup_from(&[("PROGRESS_PATH", "  ")])).unwrap();
        assert_eq!(config.progress_path, None);
    }
}
