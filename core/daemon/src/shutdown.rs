//! Termination signals flip a shared flag; the monitor loop polls it and
//! returns, so the sleep-assertion helper is released on the way out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
use tracing::warn;

const HANDLED: [i32; 3] = [SIGTERM, SIGINT, SIGHUP];

/// Registers the handlers. A signal that cannot be hooked keeps its default
/// disposition and is logged.
pub fn install() -> Arc<AtomicBool> {
    let stop = Arc::new(AtomicBool::new(false));
    for signal in HANDLED {
        if let Err(err) = signal_hook::flag::register(signal, Arc::clone(&stop)) {
            warn!(signal, error = %err, "Failed to install signal handler");
        }
    }
    stop
}

pub fn requested(stop: &AtomicBool) -> bool {
    stop.load(Ordering::Relaxed)
}
