//! Merges the process view and the marker view into one session list.
//!
//! The two inputs are independent observations: a process can be active and
//! also be the process behind a waiting marker. Nothing is deduplicated
//! across the two lists.
//!
//! Markers are matched to processes by exact working-directory string
//! equality. `/repo` and `/repo/` do not match, and symlinks are not
//! resolved; the hook scripts and `lsof` both report the shell's literal cwd.

use serde::Serialize;

use crate::markers::WaitingMarker;
use crate::process::RunningProcess;

/// A waiting marker plus the pid to focus for it, if any process shares its cwd.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaitingSession {
    #[serde(flatten)]
    pub marker: WaitingMarker,
    pub pid: Option<u32>,
}

impl WaitingSession {
    /// Menu-style title, e.g. `projA (approval)`.
    pub fn title(&self) -> String {
        format!("{} ({})", self.marker.project, self.marker.kind.label())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconciledView {
    /// Processes above the activity threshold, in scan order.
    pub active: Vec<RunningProcess>,
    /// Every live marker, active or not.
    pub waiting: Vec<WaitingSession>,
}

impl ReconciledView {
    pub fn has_active(&self) -> bool {
        !self.active.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.waiting.is_empty()
    }

    /// Status-bar title: `{active}{glyph}{waiting}`.
    pub fn summary_line(&self, glyph: &str) -> String {
        format!("{}{}{}", self.active.len(), glyph, self.waiting.len())
    }
}

pub fn reconcile(
    processes: &[RunningProcess],
    markers: Vec<WaitingMarker>,
    active_threshold: f64,
) -> ReconciledView {
    let active = processes
        .iter()
        .filter(|process| process.is_active(active_threshold))
        .cloned()
        .collect();

    let waiting = markers
        .into_iter()
        .map(|marker| {
            let pid = processes
                .iter()
                .find(|process| process.working_directory == marker.working_directory)
                .map(|process| process.pid);
            WaitingSession { marker, pid }
        })
        .collect();

    ReconciledView { active, waiting }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::WaitingKind;
    use crate::process::ACTIVE_CPU_THRESHOLD;

    fn marker(id: &str, cwd: &str) -> WaitingMarker {
        WaitingMarker::new(id, cwd, WaitingKind::PermissionPrompt)
    }

    #[test]
    fn active_keeps_scan_order_and_drops_idle() {
        let processes = vec![
            RunningProcess::new(30, 50.0, "/c"),
            RunningProcess::new(10, 3.0, "/a"),
            RunningProcess::new(20, 3.01, "/b"),
        ];
        let view = reconcile(&processes, Vec::new(), ACTIVE_CPU_THRESHOLD);
        let pids: Vec<u32> = view.active.iter().map(|process| process.pid).collect();
        assert_eq!(pids, vec![30, 20]);
    }

    #[test]
    fn waiting_matches_idle_process_by_cwd() {
        let processes = vec![RunningProcess::new(42, 0.1, "/home/u/projA")];
        let view = reconcile(
            &processes,
            vec![marker("s1", "/home/u/projA")],
            ACTIVE_CPU_THRESHOLD,
        );
        assert!(view.active.is_empty());
        assert_eq!(view.waiting.len(), 1);
        assert_eq!(view.waiting[0].pid, Some(42));
    }

    #[test]
    fn unmatched_marker_keeps_none_pid() {
        let processes = vec![RunningProcess::new(42, 9.0, "/home/u/projA")];
        let view = reconcile(
            &processes,
            vec![marker("s1", "/home/u/projB")],
            ACTIVE_CPU_THRESHOLD,
        );
        assert_eq!(view.waiting[0].pid, None);
    }

    #[test]
    fn matching_is_exact_string_equality() {
        let processes = vec![RunningProcess::new(42, 9.0, "/home/u/projA")];
        let view = reconcile(
            &processes,
            vec![marker("s1", "/home/u/projA/")],
            ACTIVE_CPU_THRESHOLD,
        );
        assert_eq!(view.waiting[0].pid, None);
    }

    #[test]
    fn active_process_can_also_back_a_waiting_session() {
        let processes = vec![RunningProcess::new(7, 25.0, "/w")];
        let view = reconcile(&processes, vec![marker("s1", "/w")], ACTIVE_CPU_THRESHOLD);
        assert_eq!(view.active.len(), 1);
        assert_eq!(view.waiting[0].pid, Some(7));
    }

    #[test]
    fn first_process_with_same_cwd_wins() {
        let processes = vec![
            RunningProcess::new(1, 0.0, "/same"),
            RunningProcess::new(2, 99.0, "/same"),
        ];
        let view = reconcile(&processes, vec![marker("s1", "/same")], ACTIVE_CPU_THRESHOLD);
        assert_eq!(view.waiting[0].pid, Some(1));
    }

    #[test]
    fn summary_line_and_titles() {
        let processes = vec![RunningProcess::new(1, 10.0, "/home/u/projA")];
        let view = reconcile(
            &processes,
            vec![marker("s1", "/home/u/projA"), marker("s2", "/home/u/projB")],
            ACTIVE_CPU_THRESHOLD,
        );
        assert_eq!(view.summary_line("\u{26A1}"), "1\u{26A1}2");
        assert_eq!(view.waiting[1].title(), "projB (approval)");
        assert!(!ReconciledView::default().has_active());
        assert!(ReconciledView::default().is_empty());
    }
}
