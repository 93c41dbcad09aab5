use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::ConfigError;

/// Read-only worker configuration.
///
/// This is a plain value: loading it from a config file, environment
/// variables, or an interactive prompt is the caller's job (out of scope for
/// this crate). `Config` exists so the rest of the system has one immutable
/// thing to build workers from instead of a process-global.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the job server, e.g. `https://example.org/fishnet/`.
    pub endpoint: String,
    pub api_key: String,
    pub engine_dir: Option<PathBuf>,
    /// Argv used to spawn the engine subprocess; `engine_command[0]` is the
    /// executable.
    pub engine_command: Vec<String>,
    pub cores: u32,
    pub threads_per_process: u32,
    pub memory_mb: u32,
    pub fixed_backoff: bool,
    /// Custom UCI options from the `[Stockfish]` config section, applied on
    /// top of `Threads`/`Hash` after every engine start.
    pub custom_options: BTreeMap<String, String>,
}

impl Config {
    /// Build a config from already-validated parts. Prefer this over
    /// constructing the struct literal directly so new fields get a single
    /// call site to update.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        engine_command: Vec<String>,
        cores: u32,
        threads_per_process: u32,
        memory_mb: u32,
    ) -> Result<Self, ConfigError> {
        let endpoint = endpoint.into();
        if endpoint.is_empty() {
            return Err(ConfigError::Missing("endpoint"));
        }
        if engine_command.is_empty() {
            return Err(ConfigError::Missing("engine_command"));
        }
        if cores == 0 {
            return Err(ConfigError::Invalid {
                field: "cores",
                reason: "must be >= 1".to_string(),
            });
        }
        if threads_per_process == 0 {
            return Err(ConfigError::Invalid {
                field: "threads_per_process",
                reason: "must be >= 1".to_string(),
            });
        }

        Ok(Self {
            endpoint: normalize_endpoint(&endpoint),
            api_key: api_key.into(),
            engine_dir: None,
            engine_command,
            cores,
            threads_per_process,
            memory_mb,
            fixed_backoff: false,
            custom_options: BTreeMap::new(),
        })
    }

    /// Number of engine instances this config spreads `cores` across.
    pub fn instances(&self) -> u32 {
        (self.cores / self.threads_per_process).max(1)
    }

    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }
}

/// The job protocol requires a trailing slash on the endpoint.
fn normalize_endpoint(endpoint: &str) -> String {
    if endpoint.ends_with('/') {
        endpoint.to_string()
    } else {
        format!("{endpoint}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instances_round_robin_budget() {
        let cfg = Config::new("https://example.org", "key", vec!["stockfish".into()], 7, 2, 512)
            .unwrap();
        assert_eq!(cfg.instances(), 3);
    }

    #[test]
    fn endpoint_gets_trailing_slash() {
        let cfg = Config::new("https://example.org", "key", vec!["stockfish".into()], 1, 1, 16)
            .unwrap();
        assert_eq!(cfg.endpoint, "https://example.org/");
        assert_eq!(cfg.endpoint_url("acquire"), "https://example.org/acquire");
    }

    #[test]
    fn rejects_empty_engine_command() {
        let err = Config::new("https://example.org", "key", vec![], 1, 1, 16).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("engine_command")));
    }
}
