//! Supervisor (C7): spawns workers with disjoint thread/memory budgets,
//! aggregates stats, and coordinates shutdown / update-required exits.

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;
use std::time::Duration;

use fishnet_core::Config;
use log::info;
use rand::Rng;

use crate::http_client::JobClient;
use crate::worker::{Worker, WorkerConfig, WorkerHandle};

/// Why [`Supervisor::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Shutdown,
    UpdateRequired,
}

/// How often the supervisor logs an aggregate stats line.
pub const STAT_INTERVAL: Duration = Duration::from_secs(60);

/// Per-tick probability of checking whether a newer client version is
/// available, mirroring the source's `CHECK_PYPI_CHANCE`.
const VERSION_CHECK_CHANCE: f64 = 0.01;

struct RunningWorker {
    handle: WorkerHandle,
    join: JoinHandle<()>,
}

/// Out-of-scope update mechanism, in-scope trigger: callers may supply a
/// closure answering "is a newer version available?" (e.g. a registry
/// lookup); `Supervisor` only needs the yes/no to raise
/// [`ExitReason::UpdateRequired`]. Left unset, the check never fires.
pub type VersionCheck = Box<dyn Fn() -> bool + Send>;

pub struct Supervisor {
    version: String,
    workers: Vec<RunningWorker>,
    version_check: Option<VersionCheck>,
}

/// Split `cores` round-robin across `instances` buckets, each differing by
/// at most 1.
fn bucket_sizes(cores: u32, instances: u32) -> Vec<u32> {
    let instances = instances.max(1);
    let mut buckets = vec![0u32; instances as usize];
    for i in 0..cores {
        buckets[(i % instances) as usize] += 1;
    }
    buckets
}

impl Supervisor {
    /// Build and start `instances = max(1, cores / threads_per_process)`
    /// workers from `config`.
    pub fn start(config: &Config, version: &str) -> anyhow::Result<Self> {
        let instances = config.instances();
        let buckets = bucket_sizes(config.cores, instances);
        let memory_per_instance = config.memory_mb / instances.max(1);

        let mut workers = Vec::with_capacity(buckets.len());
        for (idx, threads) in buckets.into_iter().enumerate() {
            let worker_cfg = WorkerConfig {
                name: format!("worker-{idx}"),
                engine_command: config.engine_command.clone(),
                engine_dir: config.engine_dir.clone(),
                threads,
                memory_mb: memory_per_instance,
                custom_options: config.custom_options.clone(),
                fixed_backoff: config.fixed_backoff,
                version: version.to_string(),
                api_key: config.api_key.clone(),
            };

            let client = JobClient::new(
                config.endpoint.clone(),
                format!("fishnet {version}"),
            )?;
            let worker = Worker::new(worker_cfg, client);
            let handle = worker.handle();

            let join = std::thread::Builder::new()
                .name(format!("fishnet-worker-{idx}"))
                .spawn(move || worker.run())?;

            workers.push(RunningWorker { handle, join });
        }

        Ok(Self {
            version: version.to_string(),
            workers,
            version_check: None,
        })
    }

    /// Enable the per-tick "is a newer version available?" roll; disabled
    /// by default.
    pub fn with_version_check(mut self, check: VersionCheck) -> Self {
        self.version_check = Some(check);
        self
    }

    fn aggregate(&self) -> (u64, u64) {
        let positions: u64 = self
            .workers
            .iter()
            .map(|w| w.handle.positions.load(Ordering::Relaxed))
            .sum();
        let nodes: u64 = self
            .workers
            .iter()
            .map(|w| w.handle.nodes.load(Ordering::Relaxed))
            .sum();
        (positions, nodes)
    }

    fn first_fatal_error(&self) -> Option<String> {
        self.workers
            .iter()
            .find_map(|w| w.handle.fatal_error.lock().unwrap().clone())
    }

    /// Poll workers until one reports a fatal error, or `should_stop` (fed
    /// by the signal handler) asks for shutdown.
    pub fn run(self, mut should_stop: impl FnMut() -> Option<ExitReason>) -> ExitReason {
        info!(target: "fishnet::supervisor", "fishnet {} running {} worker(s)", self.version, self.workers.len());

        let tick = STAT_INTERVAL / self.workers.len().max(1) as u32;
        let reason = loop {
            if let Some(reason) = should_stop() {
                break reason;
            }
            if let Some(err) = self.first_fatal_error() {
                info!(target: "fishnet::supervisor", "worker reported fatal error: {err}");
                break ExitReason::UpdateRequired;
            }
            std::thread::sleep(tick);

            let (positions, nodes) = self.aggregate();
            info!(
                target: "fishnet::supervisor",
                "stats: positions={positions} nodes={:.1}M",
                nodes as f64 / 1_000_000.0
            );

            if let Some(check) = &self.version_check {
                if rand::thread_rng().gen_bool(VERSION_CHECK_CHANCE) && check() {
                    info!(target: "fishnet::supervisor", "newer fishnet version available");
                    break ExitReason::UpdateRequired;
                }
            }
        };

        self.shutdown();
        reason
    }

    fn shutdown(self) {
        for worker in &self.workers {
            worker.handle.stop();
        }
        for worker in self.workers {
            let _ = worker.join.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_sizes_differ_by_at_most_one() {
        let buckets = bucket_sizes(7, 3);
        assert_eq!(buckets.iter().sum::<u32>(), 7);
        let max = *buckets.iter().max().unwrap();
        let min = *buckets.iter().min().unwrap();
        assert!(max - min <= 1);
    }

    #[test]
    fn bucket_sizes_even_split() {
        assert_eq!(bucket_sizes(8, 4), vec![2, 2, 2, 2]);
    }

    #[test]
    fn single_instance_gets_all_cores() {
        assert_eq!(bucket_sizes(5, 1), vec![5]);
    }

    #[test]
    fn version_check_chance_is_small_but_nonzero() {
        assert!(VERSION_CHECK_CHANCE > 0.0);
        assert!(VERSION_CHECK_CHANCE < 0.1);
    }

    #[test]
    fn unset_version_check_never_fires() {
        // With no closure installed the `if let Some(check)` branch in
        // `run()` is simply skipped; nothing to roll against.
        let check: Option<VersionCheck> = None;
        assert!(check.is_none());
    }
}
