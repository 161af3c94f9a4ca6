//! Shutdown signal handling.
//!
//! SIGINT and SIGUSR1 both request graceful shutdown; the session loop
//! polls a process-wide atomic flag rather than reacting inside a signal
//! handler. The flag is one-shot: once raised it is never cleared within
//! a run. SIGPIPE and SIGHUP are ignored at the session level so a
//! disconnected peer's socket error surfaces through normal I/O instead
//! of terminating the process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

/// Process-wide one-shot terminate flag, set by [`install`] and polled by
/// the session loop between iterations.
#[derive(Clone)]
pub struct TerminateFlag(Arc<AtomicBool>);

impl TerminateFlag {
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl Default for TerminateFlag {
    fn default() -> Self {
        TerminateFlag(Arc::new(AtomicBool::new(false)))
    }
}

/// Install handlers for SIGINT and SIGUSR1 that raise `flag`, and ignore
/// SIGPIPE/SIGHUP. Spawns a background task; returns immediately.
#[cfg(unix)]
pub fn install(flag: TerminateFlag) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt()).expect("register SIGINT handler");
    let mut sigusr1 = signal(SignalKind::user_defined1()).expect("register SIGUSR1 handler");
    // Registering handlers for SIGPIPE/SIGHUP is enough to make the
    // default "terminate the process" disposition a no-op; the session
    // never polls these signals so they are effectively ignored.
    let mut sigpipe = signal(SignalKind::pipe()).expect("register SIGPIPE handler");
    let mut sighup = signal(SignalKind::hangup()).expect("register SIGHUP handler");

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sigint.recv() => {
                    info!("received SIGINT, shutting down");
                    flag.set();
                    break;
                }
                _ = sigusr1.recv() => {
                    info!("received SIGUSR1, shutting down");
                    flag.set();
                    break;
                }
                _ = sigpipe.recv() => {}
                _ = sighup.recv() => {}
            }
        }
    });
}

#[cfg(not(unix))]
pub fn install(flag: TerminateFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down");
            flag.set();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_is_one_shot_and_starts_clear() {
        let flag = TerminateFlag::default();
        assert!(!flag.is_set());
        flag.set();
        assert!(flag.is_set());
    }

    #[test]
    fn clones_share_the_same_underlying_flag() {
        let flag = TerminateFlag::default();
        let clone = flag.clone();
        clone.set();
        assert!(flag.is_set());
    }
}
