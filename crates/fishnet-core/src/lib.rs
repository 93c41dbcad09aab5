//! Shared domain types for the fishnet worker: jobs, engine identification,
//! search results and the wire envelope sent with every request to the job
//! server, plus the read-only [`Config`] contract workers are built from.

pub mod config;
pub mod envelope;
pub mod error;
pub mod info;
pub mod job;

pub use config::Config;
pub use envelope::{Envelope, FishnetMeta};
pub use error::ConfigError;
pub use info::{EngineInfo, InfoRecord, Score};
pub use job::{Clock, Job, JobId, WorkSpec, WorkType, DEFAULT_ANALYSIS_NODES};
