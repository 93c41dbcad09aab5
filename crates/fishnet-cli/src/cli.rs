use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Parser;

/// Command-line surface for the fishnet worker binary.
///
/// Parsing, validation of engine paths, and interactive setup are out of
/// scope for this crate (see `fishnet_core::Config` for the contract this
/// is assembled into); this is a thin, non-interactive mapping from flags
/// and environment variables onto that contract.
#[derive(Debug, Parser)]
#[command(name = "fishnet", version, about = "Distributed chess analysis worker")]
pub struct Cli {
    /// Base URL of the job server.
    #[arg(long, env = "FISHNET_ENDPOINT", default_value = "https://lichess.org/fishnet/")]
    pub endpoint: String,

    /// Personal API key issued by the job server.
    #[arg(long, env = "FISHNET_KEY")]
    pub api_key: String,

    /// Directory the engine binary is installed in (discovery and download
    /// are out of scope; this only sets the engine subprocess's cwd).
    #[arg(long, env = "FISHNET_ENGINE_DIR")]
    pub engine_dir: Option<PathBuf>,

    /// Argv used to spawn the engine, e.g. `--engine-command stockfish`.
    #[arg(long = "engine-command", env = "FISHNET_ENGINE_COMMAND", default_value = "stockfish")]
    pub engine_command: String,

    /// Total CPU cores to spread across worker instances.
    #[arg(long, env = "FISHNET_CORES", default_value_t = default_cores())]
    pub cores: u32,

    /// Engine threads per worker instance.
    #[arg(long, env = "FISHNET_THREADS", default_value_t = 1)]
    pub threads_per_process: u32,

    /// Total hash memory (MB) to spread across worker instances.
    #[arg(long, env = "FISHNET_MEMORY", default_value_t = 256)]
    pub memory_mb: u32,

    /// Use uniform-random backoff instead of exponential-with-jitter.
    #[arg(long, env = "FISHNET_FIXED_BACKOFF", default_value_t = false)]
    pub fixed_backoff: bool,

    /// Extra UCI option, `Name=Value`; may be repeated.
    #[arg(long = "option", value_name = "NAME=VALUE")]
    pub options: Vec<String>,
}

fn default_cores() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}

impl Cli {
    pub fn engine_command_argv(&self) -> Vec<String> {
        self.engine_command
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Parse `--option NAME=VALUE` pairs; malformed entries are rejected
    /// up front rather than silently dropped.
    pub fn custom_options(&self) -> anyhow::Result<BTreeMap<String, String>> {
        let mut map = BTreeMap::new();
        for raw in &self.options {
            let (name, value) = raw
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("invalid --option {raw:?}, expected NAME=VALUE"))?;
            map.insert(name.trim().to_string(), value.trim().to_string());
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_command_splits_on_whitespace() {
        let cli = Cli::parse_from(["fishnet", "--api-key", "k", "--engine-command", "stockfish --uci"]);
        assert_eq!(cli.engine_command_argv(), vec!["stockfish", "--uci"]);
    }

    #[test]
    fn custom_options_parses_name_value_pairs() {
        let cli = Cli::parse_from([
            "fishnet",
            "--api-key",
            "k",
            "--option",
            "Move Overhead=100",
            "--option",
            "Ponder=false",
        ]);
        let opts = cli.custom_options().unwrap();
        assert_eq!(opts.get("Move Overhead").map(String::as_str), Some("100"));
        assert_eq!(opts.get("Ponder").map(String::as_str), Some("false"));
    }

    #[test]
    fn custom_options_rejects_missing_equals() {
        let cli = Cli::parse_from(["fishnet", "--api-key", "k", "--option", "garbage"]);
        assert!(cli.custom_options().is_err());
    }
}
