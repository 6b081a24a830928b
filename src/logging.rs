//! Logging setup and the debug switch
//!
//! [`LogControl::init`] installs a `tracing` subscriber whose filter can be
//! swapped at runtime; `SetDebug` flips it between `debug` and the base level.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

const DEBUG_FILTER: &str = "debug";

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("invalid log filter '{filter}': {reason}")]
    Filter { filter: String, reason: String },

    #[error("failed to install subscriber: {0}")]
    Init(String),
}

/// Handle to the process's log verbosity. Cheap to clone.
#[derive(Clone)]
pub struct LogControl {
    debug: Arc<AtomicBool>,
    base: String,
    handle: Option<reload::Handle<EnvFilter, Registry>>,
}

impl LogControl {
    /// Install the global subscriber, logging to stderr.
    pub fn init(base: &str, debug: bool) -> Result<Self, LoggingError> {
        let initial = if debug { DEBUG_FILTER } else { base };
        let filter = EnvFilter::try_new(initial).map_err(|e| LoggingError::Filter {
            filter: initial.to_string(),
            reason: e.to_string(),
        })?;
        let (filter, handle) = reload::Layer::new(filter);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| LoggingError::Init(e.to_string()))?;

        Ok(Self {
            debug: Arc::new(AtomicBool::new(debug)),
            base: base.to_string(),
            handle: Some(handle),
        })
    }

    /// Track the flag without a subscriber.
    pub fn detached(debug: bool) -> Self {
        Self {
            debug: Arc::new(AtomicBool::new(debug)),
            base: "info".to_string(),
            handle: None,
        }
    }

    pub fn is_debug(&self) -> bool {
        self.debug.load(Ordering::SeqCst)
    }

    pub fn set_debug(&self, enable: bool) {
        let previous = self.debug.swap(enable, Ordering::SeqCst);
        if previous == enable {
            return;
        }
        if let Some(handle) = &self.handle {
            let directives = if enable { DEBUG_FILTER } else { self.base.as_str() };
            if let Err(err) = handle.reload(EnvFilter::new(directives)) {
                tracing::warn!(%err, "failed to swap log filter");
            }
        }
        tracing::info!(debug = enable, "log verbosity changed");
    }
}

impl std::fmt::Debug for LogControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogControl")
            .field("debug", &self.is_debug())
            .field("base", &self.base)
            .field("installed", &self.handle.is_some())
            .finish()
    }
}
