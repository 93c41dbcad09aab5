//! Signal handler (C8): translates process signals into application-level
//! shutdown / update-required events for the supervisor to poll.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fishnet_engine::ExitReason;

/// Installed once; subsequent signals during shutdown are ignored so
/// teardown isn't interrupted by an impatient second Ctrl-C.
pub struct SignalHandler {
    shutdown: Arc<AtomicBool>,
    update_required: Arc<AtomicBool>,
    ignore: AtomicBool,
}

impl SignalHandler {
    /// Register handlers for SIGTERM/SIGINT (shutdown) and, on Unix, SIGUSR1
    /// (update required).
    pub fn install() -> anyhow::Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let update_required = Arc::new(AtomicBool::new(false));

        signal_hook::flag::register(signal_hook::consts::SIGTERM, shutdown.clone())?;
        signal_hook::flag::register(signal_hook::consts::SIGINT, shutdown.clone())?;
        register_usr1(&update_required)?;

        Ok(Self {
            shutdown,
            update_required,
            ignore: AtomicBool::new(false),
        })
    }

    /// Poll for a pending shutdown/update-required event. Returns `None`
    /// while nothing has fired or teardown is already underway.
    pub fn poll(&self) -> Option<ExitReason> {
        if self.ignore.load(Ordering::SeqCst) {
            return None;
        }
        if self.update_required.load(Ordering::SeqCst) {
            self.ignore.store(true, Ordering::SeqCst);
            return Some(ExitReason::UpdateRequired);
        }
        if self.shutdown.load(Ordering::SeqCst) {
            self.ignore.store(true, Ordering::SeqCst);
            return Some(ExitReason::Shutdown);
        }
        None
    }
}

#[cfg(unix)]
fn register_usr1(flag: &Arc<AtomicBool>) -> anyhow::Result<()> {
    signal_hook::flag::register(signal_hook::consts::SIGUSR1, flag.clone())?;
    Ok(())
}

#[cfg(not(unix))]
fn register_usr1(_flag: &Arc<AtomicBool>) -> anyhow::Result<()> {
    Ok(())
}
