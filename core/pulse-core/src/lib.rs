//! # pulse-core
//!
//! Session-state reconciliation for claude-pulse: which Claude agents are
//! running and busy, which sessions are blocked on the user, and whether the
//! machine should be kept awake.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime. One [`Monitor::tick`] runs to completion
//!   before the next starts.
//! - **Single owner**: Cross-poll state (alert register, sleep assertion) lives
//!   in [`Monitor`] and is mutated only through `&mut self`. No globals.
//! - **Graceful degradation**: Failed commands and missing files read as "no
//!   sessions", never as errors. Zero sessions and a failed observation look
//!   the same to callers.
//! - **Seams as traits**: [`CommandExecutor`], [`PowerAssertion`],
//!   [`ProcessTree`] and [`ForegroundApps`] let tests drive every component
//!   without touching the host.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pulse_core::{load_config, Monitor};
//!
//! let config = load_config(None)?;
//! let mut monitor = Monitor::from_config(&config)?;
//! let report = monitor.tick();
//! println!("{}", report.view.summary_line(&config.status_glyph));
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod foreground;
pub mod markers;
pub mod monitor;
pub mod process;
pub mod reconcile;
pub mod sleep;
pub mod transition;

pub use command::{CommandExecutor, SystemCommand};
pub use config::{load_config, PulseConfig};
pub use error::{PulseError, Result};
pub use foreground::{
    ForegroundApp, ForegroundApps, ForegroundResolver, ProcessTree, SysinfoProcessTree,
    SystemEventsApps, MAX_PARENT_HOPS,
};
pub use markers::{MarkerStats, MarkerStore, WaitingKind, WaitingMarker};
pub use monitor::{Monitor, TickReport};
pub use process::{ProcessScanner, RunningProcess, ACTIVE_CPU_THRESHOLD};
pub use reconcile::{reconcile, ReconciledView, WaitingSession};
pub use sleep::{CaffeinateAssertion, PowerAssertion, SleepAssertionManager};
pub use transition::{AlertEvent, TransitionTracker};
