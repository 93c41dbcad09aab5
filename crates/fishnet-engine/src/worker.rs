//! One worker: owns an engine subprocess, loops {ensure engine alive →
//! acquire-or-report → execute → repeat}, and classifies failures.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use fishnet_core::{AnalysisRequest, Envelope, FishnetMeta, Job, MoveRequest, MoveResult, WorkType};
use log::{error, info, warn};

use crate::backoff::Backoff;
use crate::error::{DeadEngine, WorkerError};
use crate::executor;
use crate::http_client::{Acquired, JobClient};
use crate::uci::EngineDriver;

/// Static per-worker configuration; shared, never mutated after the
/// supervisor builds it.
#[derive(Clone)]
pub struct WorkerConfig {
    pub name: String,
    pub engine_command: Vec<String>,
    pub engine_dir: Option<PathBuf>,
    pub threads: u32,
    pub memory_mb: u32,
    pub custom_options: BTreeMap<String, String>,
    pub fixed_backoff: bool,
    pub version: String,
    pub api_key: String,
}

/// Interruptible sleep primitive: either the timeout elapses or
/// [`SleepSignal::wake`] is called, whichever comes first.
#[derive(Default)]
pub struct SleepSignal {
    state: Mutex<bool>,
    cv: Condvar,
}

impl SleepSignal {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    pub fn wake(&self) {
        let mut woken = self.state.lock().unwrap();
        *woken = true;
        self.cv.notify_all();
    }

    fn sleep(&self, duration: Duration) {
        let guard = self.state.lock().unwrap();
        let (mut guard, _) = self
            .cv
            .wait_timeout_while(guard, duration, |woken| !*woken)
            .unwrap();
        *guard = false;
    }
}

/// Shared handle a supervisor uses to stop a worker and read its stats.
pub struct WorkerHandle {
    pub alive: Arc<AtomicBool>,
    pub sleep_signal: Arc<SleepSignal>,
    pub positions: Arc<AtomicU64>,
    pub nodes: Arc<AtomicU64>,
    pub fatal_error: Arc<Mutex<Option<String>>>,
    engine_pid: Arc<Mutex<Option<u32>>>,
}

impl WorkerHandle {
    /// Clears the alive flag, force-kills the engine if one is currently
    /// running (unblocking any read the worker thread is parked in), and
    /// wakes a pending backoff sleep. All three cancellation points from the
    /// concurrency model are covered by this one call.
    pub fn stop(&self) {
        self.alive.store(false, Ordering::SeqCst);
        if let Some(pid) = *self.engine_pid.lock().unwrap() {
            crate::uci::kill_pid(pid);
        }
        self.sleep_signal.wake();
    }
}

pub struct Worker {
    cfg: WorkerConfig,
    client: JobClient,
    engine: Option<EngineDriver>,
    /// `id`-derived fields from the last handshake (`author` discarded per
    /// spec.md 4.3 step 1); feeds `stockfish.name`/other fields in every
    /// envelope until the engine is restarted.
    engine_info: fishnet_core::EngineInfo,
    current_job: Option<Job>,
    backoff: Backoff,
    alive: Arc<AtomicBool>,
    sleep_signal: Arc<SleepSignal>,
    positions: Arc<AtomicU64>,
    nodes: Arc<AtomicU64>,
    fatal_error: Arc<Mutex<Option<String>>>,
    engine_pid: Arc<Mutex<Option<u32>>>,
}

impl Worker {
    pub fn new(cfg: WorkerConfig, client: JobClient) -> Self {
        let backoff = Backoff::new(cfg.fixed_backoff);
        Self {
            cfg,
            client,
            engine: None,
            engine_info: fishnet_core::EngineInfo::default(),
            current_job: None,
            backoff,
            alive: Arc::new(AtomicBool::new(true)),
            sleep_signal: Arc::new(SleepSignal::new()),
            positions: Arc::new(AtomicU64::new(0)),
            nodes: Arc::new(AtomicU64::new(0)),
            fatal_error: Arc::new(Mutex::new(None)),
            engine_pid: Arc::new(Mutex::new(None)),
        }
    }

    pub fn handle(&self) -> WorkerHandle {
        WorkerHandle {
            alive: self.alive.clone(),
            sleep_signal: self.sleep_signal.clone(),
            positions: self.positions.clone(),
            nodes: self.nodes.clone(),
            fatal_error: self.fatal_error.clone(),
            engine_pid: self.engine_pid.clone(),
        }
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn sleep_backoff(&mut self) {
        let duration = self.backoff.next();
        self.sleep_signal.sleep(duration);
    }

    fn envelope(&self) -> Envelope {
        let mut stockfish = self.engine_info.clone();
        stockfish.options.clear();
        stockfish
            .options
            .insert("threads".to_string(), self.cfg.threads.to_string());
        stockfish
            .options
            .insert("hash".to_string(), self.cfg.memory_mb.to_string());
        for (k, v) in &self.cfg.custom_options {
            stockfish.options.insert(k.clone(), v.clone());
        }

        Envelope {
            fishnet: FishnetMeta {
                version: self.cfg.version.clone(),
                python: self.cfg.version.clone(),
                apikey: self.cfg.api_key.clone(),
            },
            stockfish,
        }
    }

    /// Start a fresh engine, handshake, install options, and sync.
    fn ensure_engine(&mut self) -> Result<(), DeadEngine> {
        if self.engine.is_some() {
            return Ok(());
        }

        info!(target: "fishnet::worker", "[{}] starting engine", self.cfg.name);
        let mut driver =
            EngineDriver::spawn(&self.cfg.engine_command, self.cfg.engine_dir.as_deref())?;
        let (mut info, _options) = driver.handshake()?;
        info.fields.remove("author");
        info!(target: "fishnet::worker", "[{}] engine handshake: {}", self.cfg.name, info.name());
        self.engine_info = info;

        driver.set_option("Threads", &self.cfg.threads.to_string())?;
        driver.set_option("Hash", &self.cfg.memory_mb.to_string())?;
        for (name, value) in &self.cfg.custom_options {
            driver.set_option(name, value)?;
        }
        driver.sync()?;

        *self.engine_pid.lock().unwrap() = Some(driver.pid());
        self.engine = Some(driver);
        Ok(())
    }

    fn kill_engine(&mut self) {
        *self.engine_pid.lock().unwrap() = None;
        if let Some(mut engine) = self.engine.take() {
            engine.kill();
        }
    }

    fn abort_current_job(&self) {
        if let Some(job) = &self.current_job {
            let envelope = self.envelope();
            if let Err(err) = self.client.abort(job.id(), &envelope) {
                warn!(target: "fishnet::worker", "[{}] abort of job {} failed: {err:#}", self.cfg.name, job.id());
            }
        }
    }

    /// Run until [`WorkerHandle::stop`] is called or a fatal error escapes.
    pub fn run(mut self) {
        while self.is_alive() {
            match self.iterate() {
                Ok(()) => {}
                Err(WorkerError::Shutdown) => break,
                Err(WorkerError::UpdateRequired) => {
                    *self.fatal_error.lock().unwrap() = Some("update required".to_string());
                    break;
                }
                Err(other) => {
                    error!(target: "fishnet::worker", "[{}] {other:#}", self.cfg.name);
                }
            }
        }
        self.kill_engine();
    }

    fn iterate(&mut self) -> Result<(), WorkerError> {
        if let Err(dead) = self.ensure_engine() {
            return self.handle_dead_engine(dead);
        }

        let (path, outcome) = match self.current_job.take() {
            Some(job) if job.work.kind == WorkType::Analysis => {
                let path = format!("analysis/{}", job.id());
                let result = self.run_analysis(job);
                (path, result)
            }
            Some(job) => {
                let path = format!("move/{}", job.id());
                let result = self.run_move(job);
                (path, result)
            }
            None => ("acquire".to_string(), Ok(self.envelope_request())),
        };

        let body = match outcome {
            Ok(body) => body,
            Err(dead) => return self.handle_dead_engine(dead),
        };

        match self.client.submit(&path, &body) {
            Ok(Acquired::None) => {
                self.current_job = None;
                self.sleep_backoff();
                Ok(())
            }
            Ok(Acquired::Job(job)) => {
                self.backoff.reset();
                self.current_job = Some(job);
                Ok(())
            }
            Err(WorkerError::UpdateRequired) => Err(WorkerError::UpdateRequired),
            Err(err) => {
                warn!(target: "fishnet::worker", "[{}] {err:#}", self.cfg.name);
                self.current_job = None;
                self.sleep_backoff();
                Ok(())
            }
        }
    }

    fn envelope_request(&self) -> serde_json::Value {
        serde_json::to_value(self.envelope()).expect("envelope always serializes")
    }

    fn run_move(&mut self, job: Job) -> Result<serde_json::Value, DeadEngine> {
        self.current_job = Some(job.clone());
        let driver = self.engine.as_mut().expect("engine ensured");
        let outcome = executor::run_move(driver, &job, self.cfg.threads)?;
        self.nodes.fetch_add(outcome.nodes, Ordering::Relaxed);

        let request = MoveRequest {
            envelope: self.envelope(),
            bestmove: MoveResult {
                bestmove: outcome.bestmove,
            },
        };
        Ok(serde_json::to_value(&request).expect("move request always serializes"))
    }

    fn run_analysis(&mut self, job: Job) -> Result<serde_json::Value, DeadEngine> {
        self.current_job = Some(job.clone());
        let envelope = self.envelope();
        let client = &self.client;
        let job_id = job.id().to_string();
        let worker_name = self.cfg.name.clone();
        let driver = self.engine.as_mut().expect("engine ensured");

        let outcome = executor::run_analysis(driver, &job, |partial| {
            let request = AnalysisRequest {
                envelope: envelope.clone(),
                analysis: partial.to_vec(),
            };
            if let Err(err) = client.submit(&format!("analysis/{job_id}"), &request) {
                warn!(target: "fishnet::worker", "[{worker_name}] progress report for job {job_id} failed: {err:#}");
            }
        })?;

        self.positions.fetch_add(outcome.positions as u64, Ordering::Relaxed);
        self.nodes.fetch_add(outcome.nodes, Ordering::Relaxed);

        let request = AnalysisRequest {
            envelope,
            analysis: outcome.analysis,
        };
        Ok(serde_json::to_value(&request).expect("analysis request always serializes"))
    }

    fn handle_dead_engine(&mut self, dead: DeadEngine) -> Result<(), WorkerError> {
        warn!(target: "fishnet::worker", "[{}] engine died: {dead}", self.cfg.name);
        if self.is_alive() {
            self.sleep_backoff();
        }
        self.kill_engine();
        self.abort_current_job();
        self.current_job = None;
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::AtomicUsize;

    /// A minimal `sh`-scripted UCI engine that answers the handshake and
    /// `isready` immediately and never receives a `go` (idle-cycle tests
    /// never reach the search step).
    fn fake_idle_engine() -> Vec<String> {
        let script = r#"
echo "id name FakeFish 1.0"
echo "uciok"
while IFS= read -r line; do
  case "$line" in
    isready) echo "readyok" ;;
    quit) exit 0 ;;
  esac
done
"#;
        vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
    }

    /// Local HTTP server that answers every request with 204 No Content and
    /// counts how many requests it received. Stands in for the job server
    /// returning "no work available" repeatedly (S1 in the spec).
    fn serve_204_forever() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();

        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf);
                count_clone.fetch_add(1, Ordering::SeqCst);
                let _ = stream.write_all(b"HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n");
            }
        });

        (format!("http://{addr}/"), count)
    }

    fn test_worker(endpoint: String) -> Worker {
        let cfg = WorkerConfig {
            name: "worker-test".to_string(),
            engine_command: fake_idle_engine(),
            engine_dir: None,
            threads: 1,
            memory_mb: 16,
            custom_options: BTreeMap::new(),
            fixed_backoff: true,
            version: "test".to_string(),
            api_key: "secret".to_string(),
        };
        let client = JobClient::new(endpoint, "fishnet test".to_string()).unwrap();
        Worker::new(cfg, client)
    }

    #[test]
    fn idle_cycle_acquires_repeatedly_on_204() {
        let (endpoint, count) = serve_204_forever();
        let mut worker = test_worker(endpoint);

        for _ in 0..3 {
            worker.iterate().expect("idle iteration never errors");
            assert!(worker.current_job.is_none());
        }

        assert_eq!(count.load(Ordering::SeqCst), 3);
        worker.kill_engine();
    }
}
