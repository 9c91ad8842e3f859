//! Waiting-session markers dropped by the agent's hook scripts.
//!
//! # File Format
//!
//! One plain-text file per blocked session, named by session id:
//!
//! ```text
//! /absolute/working/directory
//! permission_prompt
//! ```
//!
//! Line 1 is required; line 2 is optional and defaults to `unknown`. Anything
//! after line 2 is ignored.
//!
//! # Self-cleaning
//!
//! Markers whose mtime is older than the retention window are deleted while
//! listing. Deletion is best-effort: a file that cannot be removed is skipped
//! and retried on the next listing. This is the only write the monitor ever
//! performs against agent-owned state.

use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, Duration, Utc};
use fs_err as fs;
use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::process::project_name;

/// Prompt type a session is blocked on. Unrecognised tags are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitingKind {
    PermissionPrompt,
    IdlePrompt,
    ElicitationDialog,
    Other(String),
    Unknown,
}

impl WaitingKind {
    pub fn parse(tag: Option<&str>) -> Self {
        match tag.map(str::trim) {
            None | Some("") | Some("unknown") => Self::Unknown,
            Some("permission_prompt") => Self::PermissionPrompt,
            Some("idle_prompt") => Self::IdlePrompt,
            Some("elicitation_dialog") => Self::ElicitationDialog,
            Some(other) => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::PermissionPrompt => "permission_prompt",
            Self::IdlePrompt => "idle_prompt",
            Self::ElicitationDialog => "elicitation_dialog",
            Self::Other(tag) => tag,
            Self::Unknown => "unknown",
        }
    }

    /// Short operator-facing label, e.g. `projA (approval)`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::PermissionPrompt => "approval",
            Self::IdlePrompt => "done",
            Self::ElicitationDialog => "question",
            Self::Other(_) | Self::Unknown => "waiting",
        }
    }
}

impl fmt::Display for WaitingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for WaitingKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaitingMarker {
    /// The marker's filename.
    pub session_id: String,
    pub working_directory: String,
    pub kind: WaitingKind,
    pub project: String,
}

impl WaitingMarker {
    pub fn new(
        session_id: impl Into<String>,
        working_directory: impl Into<String>,
        kind: WaitingKind,
    ) -> Self {
        let working_directory = working_directory.into();
        let project = project_name(&working_directory);
        Self {
            session_id: session_id.into(),
            working_directory,
            kind,
            project,
        }
    }
}

/// Parses marker content into `(working_directory, kind)`.
///
/// Returns `None` when the working directory line is empty.
pub fn parse_marker_content(content: &str) -> Option<(String, WaitingKind)> {
    let mut lines = content.lines();
    let working_directory = lines.next().map(str::trim).unwrap_or_default();
    if working_directory.is_empty() {
        return None;
    }
    let kind = WaitingKind::parse(lines.next());
    Some((working_directory.to_string(), kind))
}

/// Bookkeeping for one listing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MarkerStats {
    pub returned: usize,
    /// Past the retention window; excluded whether or not deletion succeeded.
    pub expired: usize,
    pub removed: usize,
    /// Unreadable, or empty working directory.
    pub invalid: usize,
    /// No readable mtime, so the retention check could not run.
    pub undated: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkerAge {
    Fresh,
    Expired(Duration),
    Undated,
}

fn classify_age(
    modified: std::io::Result<SystemTime>,
    now: DateTime<Utc>,
    retention: Duration,
) -> MarkerAge {
    match modified {
        Ok(modified) => {
            let age = now.signed_duration_since(DateTime::<Utc>::from(modified));
            if age > retention {
                MarkerAge::Expired(age)
            } else {
                MarkerAge::Fresh
            }
        }
        Err(_) => MarkerAge::Undated,
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarkerScan {
    pub markers: Vec<WaitingMarker>,
    pub stats: MarkerStats,
}

pub struct MarkerStore {
    dir: PathBuf,
    retention: Duration,
}

impl MarkerStore {
    pub fn new(dir: impl Into<PathBuf>, retention: Duration) -> Self {
        Self {
            dir: dir.into(),
            retention,
        }
    }

    pub fn list_waiting(&self) -> Vec<WaitingMarker> {
        self.list_waiting_at(Utc::now())
    }

    pub fn list_waiting_at(&self, now: DateTime<Utc>) -> Vec<WaitingMarker> {
        self.scan_at(now).markers
    }

    /// Lists live markers as of `now`, deleting expired ones.
    ///
    /// A missing directory is zero markers. Order follows the directory
    /// listing and carries no meaning.
    pub fn scan_at(&self, now: DateTime<Utc>) -> MarkerScan {
        let mut scan = MarkerScan::default();

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return scan,
            Err(err) => {
                warn!(error = %err, dir = %self.dir.display(), "Failed to list marker directory");
                return scan;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(metadata) = fs::metadata(&path) else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let session_id = entry.file_name().to_string_lossy().into_owned();

            match classify_age(metadata.modified(), now, self.retention) {
                MarkerAge::Fresh => {}
                MarkerAge::Expired(age) => {
                    scan.stats.expired += 1;
                    match fs::remove_file(&path) {
                        Ok(()) => {
                            scan.stats.removed += 1;
                            debug!(session_id = %session_id, age_secs = age.num_seconds(), "Removed stale marker");
                        }
                        Err(err) => {
                            debug!(error = %err, session_id = %session_id, "Failed to remove stale marker");
                        }
                    }
                    continue;
                }
                MarkerAge::Undated => {
                    scan.stats.undated += 1;
                    debug!(session_id = %session_id, "Marker mtime unavailable; skipping retention check");
                }
            }

            let parsed = fs::read_to_string(&path)
                .ok()
                .and_then(|content| parse_marker_content(&content));
            match parsed {
                Some((working_directory, kind)) => {
                    scan.markers
                        .push(WaitingMarker::new(session_id, working_directory, kind));
                }
                None => {
                    scan.stats.invalid += 1;
                    debug!(session_id = %session_id, "Ignoring marker without working directory");
                }
            }
        }

        scan.stats.returned = scan.markers.len();
        scan
    }
}
