//! Service lifecycle
//!
//! Tracks whether the long-running node service is active. A [`Lifecycle`] is
//! an explicit object shared by the operations that start, stop and query the
//! service; there is no ambient global. At most one shutdown token is live at
//! a time: `begin_start` refuses while the service is starting or running.
//!
//! ```text
//!   Stopped ──begin_start──▶ Starting ──mark_running──▶ Running
//!      ▲                        │                          │
//!      └────────abort_start─────┘◀──────────stop───────────┘
//! ```

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Stopped,
    Starting,
    Running,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceState::Stopped => "stopped",
            ServiceState::Starting => "starting",
            ServiceState::Running => "running",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LifecycleError {
    #[error("service is already {0}")]
    AlreadyActive(ServiceState),
}

/// Receiving half of the shutdown token, handed to the running service.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// `true` once shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until shutdown is requested. Also returns if the lifecycle that
    /// issued this signal is dropped.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}

/// Proof of a successful `begin_start`. Later transitions only apply while
/// the ticket is current, so a slow start that finishes after a stop (and
/// maybe a new start) cannot flip the newer state.
#[derive(Debug)]
pub struct StartTicket {
    generation: u64,
    signal: ShutdownSignal,
}

impl StartTicket {
    pub fn signal(&self) -> ShutdownSignal {
        self.signal.clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

struct Inner {
    state: ServiceState,
    generation: u64,
    shutdown: Option<watch::Sender<bool>>,
}

pub struct Lifecycle {
    inner: Mutex<Inner>,
    state_tx: watch::Sender<ServiceState>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(ServiceState::Stopped);
        Self {
            inner: Mutex::new(Inner {
                state: ServiceState::Stopped,
                generation: 0,
                shutdown: None,
            }),
            state_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, inner: &mut Inner, state: ServiceState) {
        inner.state = state;
        self.state_tx.send_replace(state);
    }

    /// Current state. No side effects.
    pub fn state(&self) -> ServiceState {
        self.lock().state
    }

    /// `true` while a shutdown token is live (starting or running).
    pub fn is_active(&self) -> bool {
        self.state() != ServiceState::Stopped
    }

    /// `Stopped → Starting`. Issues a fresh shutdown token.
    pub fn begin_start(&self) -> Result<StartTicket, LifecycleError> {
        let mut inner = self.lock();
        if inner.state != ServiceState::Stopped {
            return Err(LifecycleError::AlreadyActive(inner.state));
        }

        let (tx, rx) = watch::channel(false);
        inner.generation += 1;
        inner.shutdown = Some(tx);
        self.set(&mut inner, ServiceState::Starting);
        tracing::info!(generation = inner.generation, "service starting");

        Ok(StartTicket {
            generation: inner.generation,
            signal: ShutdownSignal { rx },
        })
    }

    /// `Starting → Running`. Returns `false` if the ticket is stale.
    pub fn mark_running(&self, ticket: &StartTicket) -> bool {
        let mut inner = self.lock();
        if inner.generation != ticket.generation || inner.state != ServiceState::Starting {
            return false;
        }
        self.set(&mut inner, ServiceState::Running);
        tracing::info!(generation = inner.generation, "service running");
        true
    }

    /// `Starting → Stopped` after a failed start. Returns `false` if the
    /// ticket is stale.
    pub fn abort_start(&self, ticket: &StartTicket) -> bool {
        let mut inner = self.lock();
        if inner.generation != ticket.generation || inner.state != ServiceState::Starting {
            return false;
        }
        if let Some(tx) = inner.shutdown.take() {
            tx.send_replace(true);
        }
        self.set(&mut inner, ServiceState::Stopped);
        tracing::info!(generation = inner.generation, "service start aborted");
        true
    }

    /// Signal the service to terminate and return to `Stopped`.
    ///
    /// Stopping a stopped service is a no-op; both cases report `true`.
    pub fn stop(&self) -> bool {
        let mut inner = self.lock();
        if let Some(tx) = inner.shutdown.take() {
            tx.send_replace(true);
        }
        if inner.state != ServiceState::Stopped {
            self.set(&mut inner, ServiceState::Stopped);
            tracing::info!(generation = inner.generation, "service stopped");
        }
        true
    }

    /// Observe state changes.
    pub fn subscribe(&self) -> watch::Receiver<ServiceState> {
        self.state_tx.subscribe()
    }

    /// Wait until the service reaches `state`.
    pub async fn wait_for(&self, state: ServiceState) {
        let mut rx = self.subscribe();
        let _ = rx.wait_for(|current| *current == state).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redundant_start_is_rejected() {
        let lifecycle = Lifecycle::new();
        let _ticket = lifecycle.begin_start().expect("first start");
        assert_eq!(
            lifecycle.begin_start().unwrap_err(),
            LifecycleError::AlreadyActive(ServiceState::Starting)
        );
    }

    #[test]
    fn test_stale_ticket_cannot_mark_running() {
        let lifecycle = Lifecycle::new();
        let old = lifecycle.begin_start().expect("start");
        lifecycle.stop();
        let new = lifecycle.begin_start().expect("restart");

        assert!(!lifecycle.mark_running(&old));
        assert!(!lifecycle.abort_start(&old));
        assert_eq!(lifecycle.state(), ServiceState::Starting);
        assert!(lifecycle.mark_running(&new));
        assert_eq!(lifecycle.state(), ServiceState::Running);
    }

    #[test]
    fn test_stop_fires_signal() {
        let lifecycle = Lifecycle::new();
        let ticket = lifecycle.begin_start().expect("start");
        let signal = ticket.signal();
        assert!(!signal.is_shutdown());
        assert!(lifecycle.stop());
        assert!(signal.is_shutdown());
        assert!(lifecycle.stop());
    }

    #[test]
    fn test_abort_start_returns_to_stopped() {
        let lifecycle = Lifecycle::new();
        let ticket = lifecycle.begin_start().expect("start");
        assert!(lifecycle.abort_start(&ticket));
        assert!(!lifecycle.is_active());
        assert!(ticket.signal().is_shutdown());
    }
}
