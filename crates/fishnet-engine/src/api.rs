//! Public surface of the engine crate: build a [`Supervisor`] from a
//! [`fishnet_core::Config`] and run it to completion.

pub use crate::backoff::Backoff;
pub use crate::error::{DeadEngine, WorkerError};
pub use crate::http_client::{Acquired, JobClient};
pub use crate::logging::{install as install_logger, redact};
pub use crate::supervisor::{ExitReason, Supervisor, STAT_INTERVAL};
pub use crate::uci::{EngineDriver, SearchBudget};
pub use crate::worker::{SleepSignal, Worker, WorkerConfig, WorkerHandle};
