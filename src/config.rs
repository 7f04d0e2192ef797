// Runtime configuration read from the environment.
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str =
    "https://raw.githubusercontent.com/MutuaNdunda/smartdash_mvp/refs/heads/main/data";
pub const DEFAULT_EXPORT_PATH: &str = "dashboard.json";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Remote location the CSV resources are fetched from.
    pub base_url: String,
    /// When set, datasets are read from this directory instead of `base_url`.
    pub data_dir: Option<PathBuf>,
    /// Cached tables older than this are reloaded on next access.
    pub cache_ttl: Option<Duration>,
    pub http_timeout: Duration,
    pub export_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: DEFAULT_BASE_URL.to_string(),
            data_dir: None,
            cache_ttl: None,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            export_path: PathBuf::from(DEFAULT_EXPORT_PATH),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup, so tests need not touch
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Config::default();
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(url) = get("SMARTDASH_BASE_URL") {
            cfg.base_url = url.trim_end_matches('/').to_string();
        }
        cfg.data_dir = get("SMARTDASH_DATA_DIR").map(PathBuf::from);
        if let Some(secs) = get("SMARTDASH_CACHE_TTL_SECS") {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("SMARTDASH_CACHE_TTL_SECS must be seconds, got {secs:?}"))?;
            cfg.cache_ttl = Some(Duration::from_secs(secs));
        }
        if let Some(secs) = get("SMARTDASH_HTTP_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().with_context(|| {
                format!("SMARTDASH_HTTP_TIMEOUT_SECS must be seconds, got {secs:?}")
            })?;
            cfg.http_timeout = Duration::from_secs(secs);
        }
        if let Some(path) = get("SMARTDASH_EXPORT_PATH") {
            cfg.export_path = PathBuf::from(path);
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn reads_overrides() {
        let cfg = Config::from_lookup(lookup(&[
            ("SMARTDASH_BASE_URL", "http://localhost:8000/data/"),
            ("SMARTDASH_DATA_DIR", "./data"),
            ("SMARTDASH_CACHE_TTL_SECS", "600"),
            ("SMARTDASH_HTTP_TIMEOUT_SECS", "5"),
            ("SMARTDASH_EXPORT_PATH", "out.json"),
        ]))
        .unwrap();
        assert_eq!(cfg.base_url, "http://localhost:8000/data");
        assert_eq!(cfg.data_dir, Some(PathBuf::from("./data")));
        assert_eq!(cfg.cache_ttl, Some(Duration::from_secs(600)));
        assert_eq!(cfg.http_timeout, Duration::from_secs(5));
        assert_eq!(cfg.export_path, PathBuf::from("out.json"));
    }

    #[test]
    fn rejects_non_numeric_ttl() {
        let err = Config::from_lookup(lookup(&[("SMARTDASH_CACHE_TTL_SECS", "soon")]));
        assert!(err.is_err());
    }
}
