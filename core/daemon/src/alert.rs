//! Operator alert hook for the 0 → waiting transition.
//!
//! The monitor only decides *when* to alert. What an alert looks like (a
//! sound, a notification) is whatever `alert_command` in the config runs.

use std::process::{Command, Stdio};
use std::thread;

use pulse_core::AlertEvent;
use tracing::{debug, info, warn};

/// Spawns `argv` without blocking the poll loop. An empty argv only logs.
pub fn fire(argv: &[String], event: AlertEvent) {
    info!(waiting = event.waiting_count, "Alert: sessions need input");

    let Some((program, args)) = argv.split_first() else {
        return;
    };

    match Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(mut child) => {
            // Reap off-thread so finished alert commands don't linger as zombies.
            thread::spawn(move || match child.wait() {
                Ok(status) => debug!(%status, "Alert command finished"),
                Err(err) => debug!(error = %err, "Alert command wait failed"),
            });
        }
        Err(err) => warn!(error = %err, program = %program, "Failed to run alert command"),
    }
}
