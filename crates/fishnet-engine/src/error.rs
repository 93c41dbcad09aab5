use thiserror::Error;

/// Failures a worker's run loop can hit in one iteration.
///
/// Every variant here is caught and converted into a backoff sleep by the
/// worker, except [`WorkerError::UpdateRequired`] and
/// [`WorkerError::Shutdown`], which propagate to the supervisor.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("engine process is dead: {0}")]
    DeadEngine(#[from] DeadEngine),

    #[error("server error ({status}): {body}")]
    HttpServer { status: u16, body: String },

    #[error("client error ({status}): {body}")]
    HttpClient { status: u16, body: String },

    #[error("server requested a client update")]
    UpdateRequired,

    #[error("shutdown requested")]
    Shutdown,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The engine's stdout closed, or I/O on its pipes failed.
///
/// Distinct from [`WorkerError::Other`] because the worker's recovery action
/// differs: a dead engine means "force-kill and restart the subprocess",
/// not just "sleep and retry".
#[derive(Debug, Error)]
pub enum DeadEngine {
    #[error("engine closed its stdout")]
    Eof,
    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected line from engine while waiting for {expected}: {line:?}")]
    Protocol { expected: &'static str, line: String },
}
