//! Plain-text rendering for `claude-pulse status`.

use pulse_core::ReconciledView;

pub fn status_text(view: &ReconciledView, glyph: &str) -> String {
    let mut out = format!("{}\n", view.summary_line(glyph));

    if !view.active.is_empty() {
        out.push_str("\u{2014} Active \u{2014}\n");
        for process in &view.active {
            out.push_str(&format!("  {} (PID {})\n", process.project, process.pid));
        }
    }
    if !view.waiting.is_empty() {
        out.push_str("\u{2014} Waiting \u{2014}\n");
        for session in &view.waiting {
            match session.pid {
                Some(pid) => out.push_str(&format!("  {} [PID {}]\n", session.title(), pid)),
                None => out.push_str(&format!("  {}\n", session.title())),
            }
        }
    }
    if view.is_empty() {
        out.push_str("No sessions\n");
    }
    out
}
