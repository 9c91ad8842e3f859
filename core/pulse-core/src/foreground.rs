//! Finds the user-facing application that hosts an agent process.
//!
//! Agents run inside a terminal (or an editor's integrated terminal), several
//! processes below the app itself. Focusing a session means walking up the
//! parent chain until a pid belongs to a regular, user-facing application.

use serde::Serialize;
use sysinfo::{Pid, ProcessRefreshKind, System};
use tracing::debug;

use crate::command::CommandExecutor;
use crate::error::Result;

/// Upper bound on parent hops; a cyclic or corrupt process view still terminates.
pub const MAX_PARENT_HOPS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForegroundApp {
    pub pid: u32,
    pub name: String,
}

pub trait ProcessTree {
    fn parent_pid(&self, pid: u32) -> Option<u32>;
}

pub trait ForegroundApps {
    /// Currently running regular (dock-visible) applications.
    fn regular_apps(&self) -> Vec<ForegroundApp>;

    fn activate(&self, app: &ForegroundApp) -> Result<()>;
}

pub struct ForegroundResolver<T: ProcessTree, A: ForegroundApps> {
    tree: T,
    apps: A,
}

impl<T: ProcessTree, A: ForegroundApps> ForegroundResolver<T, A> {
    pub fn new(tree: T, apps: A) -> Self {
        Self { tree, apps }
    }

    /// Returns the nearest ancestor of `pid` that is a regular application.
    pub fn resolve_foreground_owner(&self, pid: u32) -> Option<ForegroundApp> {
        if pid == 0 {
            return None;
        }

        let apps = self.apps.regular_apps();
        let mut current = pid;
        for _ in 0..MAX_PARENT_HOPS {
            let Some(parent) = self.tree.parent_pid(current) else {
                break;
            };
            if parent <= 1 {
                break;
            }
            if let Some(app) = apps.iter().find(|app| app.pid == parent) {
                return Some(app.clone());
            }
            current = parent;
        }

        debug!(pid, "No foreground application owns this process");
        None
    }

    /// Brings the owning application to the front. `Ok(false)` when none was found.
    pub fn focus(&self, pid: u32) -> Result<bool> {
        match self.resolve_foreground_owner(pid) {
            Some(app) => {
                self.apps.activate(&app)?;
                debug!(pid, app = %app.name, app_pid = app.pid, "Focused application");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Parent lookups through sysinfo, refreshing one process at a time.
#[derive(Debug, Default)]
pub struct SysinfoProcessTree;

impl ProcessTree for SysinfoProcessTree {
    fn parent_pid(&self, pid: u32) -> Option<u32> {
        let mut sys = System::new();
        let sys_pid = Pid::from_u32(pid);
        sys.refresh_process_specifics(sys_pid, ProcessRefreshKind::new());
        sys.process(sys_pid)
            .and_then(|process| process.parent())
            .map(|parent| parent.as_u32())
    }
}

const LIST_APPS_SCRIPT: [&str; 7] = [
    "set out to \"\"",
    "tell application \"System Events\"",
    "repeat with p in (every application process whose background only is false)",
    "set out to out & (unix id of p) & tab & (name of p) & linefeed",
    "end repeat",
    "end tell",
    "return out",
];

/// macOS application registry via `osascript` and System Events.
pub struct SystemEventsApps<E: CommandExecutor> {
    executor: E,
}

impl<E: CommandExecutor> SystemEventsApps<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }
}

impl<E: CommandExecutor> ForegroundApps for SystemEventsApps<E> {
    fn regular_apps(&self) -> Vec<ForegroundApp> {
        let mut args = Vec::with_capacity(LIST_APPS_SCRIPT.len() * 2);
        for line in LIST_APPS_SCRIPT {
            args.push("-e");
            args.push(line);
        }
        parse_app_list(&self.executor.run("osascript", &args))
    }

    fn activate(&self, app: &ForegroundApp) -> Result<()> {
        let script = format!(
            "tell application \"System Events\" to set frontmost of (first application process whose unix id is {}) to true",
            app.pid
        );
        self.executor.output("osascript", &["-e", script.as_str()])?;
        Ok(())
    }
}

/// Parses `pid<TAB>name` lines; lines without a valid pid are dropped.
pub fn parse_app_list(output: &str) -> Vec<ForegroundApp> {
    output
        .lines()
        .filter_map(|line| {
            let (pid, name) = line.split_once('\t')?;
            let pid = pid.trim().parse::<u32>().ok().filter(|pid| *pid > 0)?;
            Some(ForegroundApp {
                pid,
                name: name.trim().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::fake::ScriptedCommands;
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    struct MapTree {
        parents: HashMap<u32, u32>,
        lookups: Cell<usize>,
    }

    impl MapTree {
        fn new(edges: &[(u32, u32)]) -> Self {
            Self {
                parents: edges.iter().copied().collect(),
                lookups: Cell::new(0),
            }
        }
    }

    impl ProcessTree for MapTree {
        fn parent_pid(&self, pid: u32) -> Option<u32> {
            self.lookups.set(self.lookups.get() + 1);
            self.parents.get(&pid).copied()
        }
    }

    #[derive(Clone, Default)]
    struct FakeApps {
        apps: Vec<ForegroundApp>,
        activated: Arc<Mutex<Vec<u32>>>,
    }

    impl FakeApps {
        fn with(apps: &[(u32, &str)]) -> Self {
            Self {
                apps: apps
                    .iter()
                    .map(|(pid, name)| ForegroundApp {
                        pid: *pid,
                        name: name.to_string(),
                    })
                    .collect(),
                activated: Arc::default(),
            }
        }
    }

    impl ForegroundApps for FakeApps {
        fn regular_apps(&self) -> Vec<ForegroundApp> {
            self.apps.clone()
        }

        fn activate(&self, app: &ForegroundApp) -> Result<()> {
            self.activated.lock().expect("lock").push(app.pid);
            Ok(())
        }
    }

    #[test]
    fn finds_nearest_regular_ancestor() {
        // claude(500) -> zsh(400) -> login(300) -> Terminal(200) -> launchd(1)
        let tree = MapTree::new(&[(500, 400), (400, 300), (300, 200), (200, 1)]);
        let apps = FakeApps::with(&[(200, "Terminal"), (300, "Ghostty")]);
        let resolver = ForegroundResolver::new(tree, apps);

        let owner = resolver.resolve_foreground_owner(500).expect("owner");
        assert_eq!(owner.pid, 300);
    }

    #[test]
    fn pid_itself_is_not_considered() {
        let tree = MapTree::new(&[(500, 1)]);
        let apps = FakeApps::with(&[(500, "Self")]);
        let resolver = ForegroundResolver::new(tree, apps);
        assert_eq!(resolver.resolve_foreground_owner(500), None);
    }

    #[test]
    fn stops_at_init() {
        let tree = MapTree::new(&[(500, 1)]);
        let apps = FakeApps::with(&[(1, "launchd")]);
        let resolver = ForegroundResolver::new(tree, apps);
        assert_eq!(resolver.resolve_foreground_owner(500), None);
    }

    #[test]
    fn cyclic_tree_terminates_within_hop_limit() {
        let tree = MapTree::new(&[(10, 20), (20, 30), (30, 10)]);
        let resolver = ForegroundResolver::new(tree, FakeApps::default());

        assert_eq!(resolver.resolve_foreground_owner(10), None);
        assert_eq!(resolver.tree.lookups.get(), MAX_PARENT_HOPS);
    }

    #[test]
    fn missing_parent_is_not_found() {
        let resolver = ForegroundResolver::new(MapTree::new(&[]), FakeApps::default());
        assert_eq!(resolver.resolve_foreground_owner(999), None);
        assert_eq!(resolver.resolve_foreground_owner(0), None);
    }

    #[test]
    fn focus_activates_owner() {
        let tree = MapTree::new(&[(500, 200)]);
        let apps = FakeApps::with(&[(200, "iTerm2")]);
        let activated = Arc::clone(&apps.activated);
        let resolver = ForegroundResolver::new(tree, apps);

        assert!(resolver.focus(500).expect("focus"));
        assert!(!resolver.focus(0).expect("focus"));
        assert_eq!(*activated.lock().expect("lock"), vec![200]);
    }

    #[test]
    fn parses_app_list_lines() {
        let apps = parse_app_list("412\tTerminal\n97\tFinder\nbogus\n0\tkernel\n\n");
        assert_eq!(
            apps,
            vec![
                ForegroundApp {
                    pid: 412,
                    name: "Terminal".to_string()
                },
                ForegroundApp {
                    pid: 97,
                    name: "Finder".to_string()
                },
            ]
        );
    }

    #[test]
    fn system_events_activate_reports_failure() {
        let apps = SystemEventsApps::new(ScriptedCommands::default());
        let app = ForegroundApp {
            pid: 412,
            name: "Terminal".to_string(),
        };
        assert!(apps.activate(&app).is_err());
        assert!(apps.regular_apps().is_empty());
    }
}
