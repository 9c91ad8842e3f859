//! Process-table scanning for running agent instances.
//!
//! A scan is two kinds of command: one `ps` snapshot of the whole table, then
//! one `lsof` per agent row to resolve its working directory. Rows are run
//! through [`parse_process_row`], which says why a row was dropped instead of
//! silently discarding it.
//!
//! The scanner never classifies activity. "Present" and "active" stay
//! separate: callers compare [`RunningProcess::cpu_percent`] against a
//! threshold (see [`RunningProcess::is_active`]).

use serde::Serialize;
use tracing::{debug, trace};

use crate::command::CommandExecutor;

/// CPU percent above which an agent counts as working rather than idle.
pub const ACTIVE_CPU_THRESHOLD: f64 = 3.0;

/// Display name for a session whose working directory could not be resolved.
pub const UNKNOWN_PROJECT: &str = "unknown";

const PS_ARGS: [&str; 2] = ["-eo", "pid=,%cpu=,command="];

/// Returns the last path component of `working_directory`, or [`UNKNOWN_PROJECT`].
pub fn project_name(working_directory: &str) -> String {
    working_directory
        .split('/')
        .filter(|component| !component.is_empty())
        .last()
        .unwrap_or(UNKNOWN_PROJECT)
        .to_string()
}

/// One OS process believed to be an agent instance. Rebuilt on every scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunningProcess {
    pub pid: u32,
    pub cpu_percent: f64,
    /// Empty when the cwd lookup failed.
    pub working_directory: String,
    pub project: String,
}

impl RunningProcess {
    pub fn new(pid: u32, cpu_percent: f64, working_directory: impl Into<String>) -> Self {
        let working_directory = working_directory.into();
        let project = project_name(&working_directory);
        Self {
            pid,
            cpu_percent,
            working_directory,
            project,
        }
    }

    /// Strictly greater than: a process sitting exactly at the threshold is idle.
    pub fn is_active(&self, threshold: f64) -> bool {
        self.cpu_percent > threshold
    }
}

/// A well-formed `<pid> <cpu> <command...>` row.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRow {
    pub pid: u32,
    pub cpu_percent: f64,
    pub command: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    Blank,
    MissingColumns,
    InvalidPid(String),
    InvalidCpu(String),
    /// Well-formed, but the command line is not an agent invocation.
    NotAgent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowParse {
    Row(ProcessRow),
    Skip(SkipReason),
}

/// Parses one process-table row, keeping it only if its command contains `pattern`.
///
/// Columns are whitespace-separated, with arbitrary padding; everything after
/// the cpu column is the command. A decimal comma in the cpu column (some
/// locales) is accepted.
pub fn parse_process_row(line: &str, pattern: &str) -> RowParse {
    let line = line.trim();
    if line.is_empty() {
        return RowParse::Skip(SkipReason::Blank);
    }

    let Some((pid_field, rest)) = line.split_once(char::is_whitespace) else {
        return RowParse::Skip(SkipReason::MissingColumns);
    };
    let Some((cpu_field, command)) = rest.trim_start().split_once(char::is_whitespace) else {
        return RowParse::Skip(SkipReason::MissingColumns);
    };
    let command = command.trim();
    if command.is_empty() {
        return RowParse::Skip(SkipReason::MissingColumns);
    }

    let pid = match pid_field.parse::<u32>() {
        Ok(pid) if pid > 0 => pid,
        _ => return RowParse::Skip(SkipReason::InvalidPid(pid_field.to_string())),
    };
    let cpu_percent = match cpu_field.replace(',', ".").parse::<f64>() {
        Ok(cpu) if cpu.is_finite() && cpu >= 0.0 => cpu,
        _ => return RowParse::Skip(SkipReason::InvalidCpu(cpu_field.to_string())),
    };

    if !command.contains(pattern) {
        return RowParse::Skip(SkipReason::NotAgent);
    }

    RowParse::Row(ProcessRow {
        pid,
        cpu_percent,
        command: command.to_string(),
    })
}

/// Extracts the cwd from `lsof -Fn` output: the first `n`-prefixed line.
pub fn parse_lsof_cwd(output: &str) -> String {
    output
        .lines()
        .find_map(|line| line.strip_prefix('n'))
        .map(|path| path.trim().to_string())
        .unwrap_or_default()
}

pub struct ProcessScanner<E: CommandExecutor> {
    executor: E,
    pattern: String,
}

impl<E: CommandExecutor> ProcessScanner<E> {
    pub fn new(executor: E, pattern: impl Into<String>) -> Self {
        Self {
            executor,
            pattern: pattern.into(),
        }
    }

    /// Returns every agent process in scan order. Command failure yields an empty vec.
    pub fn scan(&self) -> Vec<RunningProcess> {
        let table = self.executor.run("ps", &PS_ARGS);
        let mut processes = Vec::new();

        for line in table.lines() {
            match parse_process_row(line, &self.pattern) {
                RowParse::Row(row) => {
                    let working_directory = self.working_directory(row.pid);
                    trace!(
                        pid = row.pid,
                        cpu = row.cpu_percent,
                        cwd = %working_directory,
                        "Agent process found"
                    );
                    processes.push(RunningProcess::new(
                        row.pid,
                        row.cpu_percent,
                        working_directory,
                    ));
                }
                RowParse::Skip(SkipReason::Blank | SkipReason::NotAgent) => {}
                RowParse::Skip(reason) => {
                    debug!(?reason, line, "Skipping malformed process-table row");
                }
            }
        }

        processes
    }

    fn working_directory(&self, pid: u32) -> String {
        let pid = pid.to_string();
        let output = self
            .executor
            .run("lsof", &["-p", pid.as_str(), "-a", "-d", "cwd", "-Fn"]);
        parse_lsof_cwd(&output)
    }
}
