//! Idle-sleep assertion lifecycle.
//!
//! [`SleepAssertionManager`] holds at most one assertion at a time and only
//! talks to the backend on a state change, so it can be fed the activity bit
//! on every poll. The default backend keeps a helper process alive for as
//! long as the assertion is held (`caffeinate` on macOS, `systemd-inhibit`
//! elsewhere); releasing the assertion kills the helper.

use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{PulseError, Result};

pub const DEFAULT_ASSERTION_REASON: &str = "Claude Code agent is working";

/// How long a freshly spawned helper gets to fail before we call it held.
const HELPER_STARTUP_GRACE: Duration = Duration::from_millis(50);

pub trait PowerAssertion {
    type Handle;

    fn acquire(&mut self, reason: &str) -> Result<Self::Handle>;

    fn release(&mut self, handle: Self::Handle);
}

pub struct SleepAssertionManager<P: PowerAssertion> {
    backend: P,
    held: Option<P::Handle>,
    reason: String,
}

impl<P: PowerAssertion> SleepAssertionManager<P> {
    pub fn new(backend: P) -> Self {
        Self::with_reason(backend, DEFAULT_ASSERTION_REASON)
    }

    pub fn with_reason(backend: P, reason: impl Into<String>) -> Self {
        Self {
            backend,
            held: None,
            reason: reason.into(),
        }
    }

    pub fn is_held(&self) -> bool {
        self.held.is_some()
    }

    /// Acquires on released→active, releases on held→inactive, otherwise no-op.
    ///
    /// A failed acquisition leaves the manager released; the next call with
    /// `has_active == true` tries again.
    pub fn update(&mut self, has_active: bool) {
        match (has_active, self.held.take()) {
            (true, None) => match self.backend.acquire(&self.reason) {
                Ok(handle) => {
                    info!("Idle-sleep assertion acquired");
                    self.held = Some(handle);
                }
                Err(err) => {
                    warn!(error = %err, "Failed to acquire idle-sleep assertion; will retry");
                }
            },
            (false, Some(handle)) => {
                self.backend.release(handle);
                info!("Idle-sleep assertion released");
            }
            (_, held) => self.held = held,
        }
    }
}

impl<P: PowerAssertion> Drop for SleepAssertionManager<P> {
    fn drop(&mut self) {
        if let Some(handle) = self.held.take() {
            self.backend.release(handle);
            debug!("Idle-sleep assertion released on shutdown");
        }
    }
}

/// Holds the assertion through a long-lived helper process.
#[derive(Debug, Default)]
pub struct CaffeinateAssertion;

impl CaffeinateAssertion {
    pub fn new() -> Self {
        Self
    }
}

/// Helper invocation for this platform. `owner_pid` bounds the helper's
/// lifetime where the platform supports it.
pub fn assertion_command(reason: &str, owner_pid: u32) -> (&'static str, Vec<String>) {
    if cfg!(target_os = "macos") {
        (
            "caffeinate",
            vec!["-i".to_string(), "-w".to_string(), owner_pid.to_string()],
        )
    } else {
        (
            "systemd-inhibit",
            vec![
                "--what=idle".to_string(),
                "--who=claude-pulse".to_string(),
                format!("--why={}", reason),
                "--mode=block".to_string(),
                "sleep".to_string(),
                "infinity".to_string(),
            ],
        )
    }
}

impl PowerAssertion for CaffeinateAssertion {
    type Handle = Child;

    fn acquire(&mut self, reason: &str) -> Result<Child> {
        let (program, args) = assertion_command(reason, std::process::id());
        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| PulseError::AssertionFailed(format!("{}: {}", program, err)))?;

        thread::sleep(HELPER_STARTUP_GRACE);
        match child.try_wait() {
            Ok(None) => {
                debug!(helper_pid = child.id(), program, "Assertion helper running");
                Ok(child)
            }
            Ok(Some(status)) => Err(PulseError::AssertionFailed(format!(
                "{} exited immediately with {}",
                program, status
            ))),
            Err(err) => {
                let _ = child.kill();
                Err(PulseError::AssertionFailed(format!("{}: {}", program, err)))
            }
        }
    }

    fn release(&mut self, mut handle: Child) {
        if let Err(err) = handle.kill() {
            debug!(error = %err, "Assertion helper already gone");
        }
        let _ = handle.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Acquire(u32),
        Release(u32),
    }

    #[derive(Clone, Default)]
    struct FakeAssertion {
        calls: Arc<Mutex<Vec<Call>>>,
        failures_remaining: Arc<Mutex<u32>>,
        next_handle: u32,
    }

    impl FakeAssertion {
        fn failing(times: u32) -> Self {
            let fake = Self::default();
            *fake.failures_remaining.lock().expect("lock") = times;
            fake
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().expect("lock calls").clone()
        }
    }

    impl PowerAssertion for FakeAssertion {
        type Handle = u32;

        fn acquire(&mut self, _reason: &str) -> Result<u32> {
            let mut failures = self.failures_remaining.lock().expect("lock");
            if *failures > 0 {
                *failures -= 1;
                return Err(PulseError::AssertionFailed("denied".to_string()));
            }
            drop(failures);
            self.next_handle += 1;
            self.calls
                .lock()
                .expect("lock calls")
                .push(Call::Acquire(self.next_handle));
            Ok(self.next_handle)
        }

        fn release(&mut self, handle: u32) {
            self.calls
                .lock()
                .expect("lock calls")
                .push(Call::Release(handle));
        }
    }

    #[test]
    fn repeated_updates_are_idempotent() {
        let fake = FakeAssertion::default();
        let mut manager = SleepAssertionManager::new(fake.clone());

        manager.update(false);
        manager.update(true);
        manager.update(true);
        assert!(manager.is_held());
        manager.update(false);
        manager.update(false);
        assert!(!manager.is_held());

        assert_eq!(fake.calls(), vec![Call::Acquire(1), Call::Release(1)]);
    }

    #[test]
    fn never_holds_two_assertions() {
        let fake = FakeAssertion::default();
        let mut manager = SleepAssertionManager::new(fake.clone());
        let pattern = [
            true, true, false, true, false, false, true, true, true, false, true,
        ];
        for has_active in pattern {
            manager.update(has_active);
        }

        let mut live: Option<u32> = None;
        for call in fake.calls() {
            match call {
                Call::Acquire(handle) => {
                    assert!(live.is_none(), "acquired while holding {:?}", live);
                    live = Some(handle);
                }
                Call::Release(handle) => {
                    assert_eq!(live, Some(handle), "released a handle that was not held");
                    live = None;
                }
            }
        }
        assert!(manager.is_held());
    }

    #[test]
    fn failed_acquire_stays_released_and_retries() {
        let fake = FakeAssertion::failing(1);
        let mut manager = SleepAssertionManager::new(fake.clone());

        manager.update(true);
        assert!(!manager.is_held());
        assert!(fake.calls().is_empty());

        manager.update(false);
        assert!(fake.calls().is_empty(), "must not release when nothing is held");

        manager.update(true);
        assert!(manager.is_held());
        assert_eq!(fake.calls(), vec![Call::Acquire(1)]);
    }

    #[test]
    fn drop_releases_held_assertion() {
        let fake = FakeAssertion::default();
        {
            let mut manager = SleepAssertionManager::new(fake.clone());
            manager.update(true);
        }
        assert_eq!(fake.calls(), vec![Call::Acquire(1), Call::Release(1)]);
    }

    #[test]
    fn helper_command_ties_to_owner() {
        let (program, args) = assertion_command("busy", 4242);
        if cfg!(target_os = "macos") {
            assert_eq!(program, "caffeinate");
            assert_eq!(args, vec!["-i", "-w", "4242"]);
        } else {
            assert_eq!(program, "systemd-inhibit");
            assert!(args.contains(&"--why=busy".to_string()));
            assert!(args.contains(&"--what=idle".to_string()));
        }
    }
}
