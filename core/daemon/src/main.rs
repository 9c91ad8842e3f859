//! claude-pulse: polling monitor for Claude agent sessions.
//!
//! Every few seconds it scans for running `claude` processes, reads the
//! waiting markers the hook scripts drop, logs the reconciled view, raises an
//! alert when sessions start waiting, and keeps the machine awake while any
//! agent is busy.
//!
//! ## Subcommands
//!
//! - `run`: The poll loop (default when no subcommand is given)
//! - `status`: One observation, printed as text or JSON; no assertion, no alert
//! - `focus`: Bring the application hosting a session's process to the front

mod alert;
mod logging;
mod render;
mod shutdown;

use std::ops::ControlFlow;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pulse_core::{
    load_config, ForegroundResolver, Monitor, PulseConfig, SysinfoProcessTree, SystemCommand,
    SystemEventsApps,
};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "claude-pulse")]
#[command(about = "Claude session monitor: activity, waiting prompts and idle-sleep")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.claude/monitor/pulse.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll until interrupted
    Run {
        /// Run a single tick and exit
        #[arg(long)]
        once: bool,
    },

    /// Print the current sessions without alerting or holding an assertion
    Status {
        /// Emit the full observation as JSON
        #[arg(long)]
        json: bool,
    },

    /// Focus the application that hosts an agent process
    Focus {
        /// Agent process ID
        #[arg(value_name = "PID")]
        pid: u32,
    },
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();
    let config = resolve_config(cli.config.as_deref());

    let exit_code = match cli.command.unwrap_or(Commands::Run { once: false }) {
        Commands::Run { once } => run(&config, once),
        Commands::Status { json } => status(&config, json),
        Commands::Focus { pid } => focus(&config, pid),
    };
    std::process::exit(exit_code);
}

fn resolve_config(path: Option<&std::path::Path>) -> PulseConfig {
    match load_config(path) {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "Failed to load config; using defaults");
            PulseConfig::default()
        }
    }
}

fn run(config: &PulseConfig, once: bool) -> i32 {
    let mut monitor = match Monitor::from_config(config) {
        Ok(monitor) => monitor,
        Err(err) => {
            error!(error = %err, "Failed to initialize monitor");
            return 1;
        }
    };

    info!(
        interval_secs = config.poll_interval().as_secs(),
        threshold = config.active_cpu_threshold,
        pattern = %config.process_pattern,
        "claude-pulse started"
    );

    let stop = shutdown::install();
    let mut last_summary = String::new();
    monitor.run(config.poll_interval(), &stop, |report| {
        let summary = report.view.summary_line(&config.status_glyph);
        if summary != last_summary {
            info!(
                summary = %summary,
                active = report.view.active.len(),
                waiting = report.view.waiting.len(),
                assertion_held = report.assertion_held,
                "Sessions changed"
            );
            last_summary = summary;
        }
        if let Some(event) = report.alert {
            alert::fire(&config.alert_command, event);
        }
        if once || shutdown::requested(&stop) {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });

    if shutdown::requested(&stop) {
        info!("Shutdown signal received; releasing sleep assertion");
    }
    drop(monitor);
    0
}

fn status(config: &PulseConfig, json: bool) -> i32 {
    let monitor = match Monitor::from_config(config) {
        Ok(monitor) => monitor,
        Err(err) => {
            error!(error = %err, "Failed to initialize monitor");
            return 1;
        }
    };

    let report = monitor.observe();
    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{}", text),
            Err(err) => {
                error!(error = %err, "Failed to serialize status");
                return 1;
            }
        }
    } else {
        print!("{}", render::status_text(&report.view, &config.status_glyph));
    }
    0
}

fn focus(config: &PulseConfig, pid: u32) -> i32 {
    let apps = SystemEventsApps::new(SystemCommand::new(config.command_timeout()));
    let resolver = ForegroundResolver::new(SysinfoProcessTree, apps);

    match resolver.focus(pid) {
        Ok(true) => 0,
        Ok(false) => {
            eprintln!("No foreground application found for PID {}", pid);
            1
        }
        Err(err) => {
            error!(error = %err, pid, "Failed to focus application");
            1
        }
    }
}
