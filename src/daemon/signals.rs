//! Signal handling: SIGTERM/SIGINT request a clean stop of the update loop.
//!
//! Registered through `signal-hook`; the loop polls the flag once per
//! iteration instead of blocking on signals.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::{SIGINT, SIGTERM};

/// Shutdown flag shared between OS signal hooks and the update loop.
#[derive(Debug, Clone)]
pub struct SignalHandler {
    shutdown_flag: Arc<AtomicBool>,
}

impl SignalHandler {
    /// Register SIGTERM and SIGINT. Registration failures are reported, not fatal.
    #[must_use]
    pub fn new() -> Self {
        let handler = Self::unregistered();
        for (signal, name) in [(SIGTERM, "SIGTERM"), (SIGINT, "SIGINT")] {
            if let Err(e) = signal_hook::flag::register(signal, Arc::clone(&handler.shutdown_flag))
            {
                eprintln!("[LG-SIGNAL] failed to register {name}: {e}");
            }
        }
        handler
    }

    /// A handler with no OS hooks; only `request_shutdown` sets it.
    #[must_use]
    pub fn unregistered() -> Self {
        Self {
            shutdown_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn should_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::Relaxed)
    }

    pub fn request_shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}
