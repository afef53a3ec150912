//! Process configuration consumed by the server.
//!
//! | Variable   | Field      | Default   |
//! |------------|------------|-----------|
//! | `HOST`     | `host`     | `0.0.0.0` |
//! | `PORT`     | `port`     | `3000`    |
//! | `API_BASE` | `api_base` | *(empty)* |

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Where the server listens and which prefix every route path gets.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Prefix placed before every controller's route base, e.g. `/api`.
    pub api_base: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 3000,
            api_base: String::new(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port, ..Self::default() }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Reads `HOST`, `PORT` and `API_BASE` from the process environment.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let defaults = Self::default();

        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| Error::Config {
                field: "port",
                message: format!("`{raw}` is not a valid port: {e}"),
            })?,
            None => defaults.port,
        };

        let config = Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port,
            api_base: lookup("API_BASE").unwrap_or(defaults.api_base),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.host.trim().is_empty() {
            return Err(Error::Config { field: "host", message: "must not be empty".into() });
        }
        if !self.api_base.is_empty() && !self.api_base.starts_with('/') {
            return Err(Error::Config {
                field: "api_base",
                message: format!("`{}` must start with '/'", self.api_base),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = ServerConfig::from_lookup(env(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn reads_all_variables() {
        let config = ServerConfig::from_lookup(env(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("API_BASE", "/api"),
        ]))
        .unwrap();
        assert_eq!(config, ServerConfig::new("127.0.0.1", 8080).with_api_base("/api"));
    }

    #[test]
    fn rejects_bad_port_and_api_base() {
        let err = ServerConfig::from_lookup(env(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, Error::Config { field: "port", .. }));

        let err = ServerConfig::from_lookup(env(&[("API_BASE", "api")])).unwrap_err();
        assert!(matches!(err, Error::Config { field: "api_base", .. }));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: ServerConfig = serde_json::from_str(r#"{ "port": 9000 }"#).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "0.0.0.0");
    }
}
