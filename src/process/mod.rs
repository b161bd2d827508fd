//! Process lifecycle: stopping the old main application and starting the new one.
//!
//! Both operations are fire-and-forget from the updater's point of view. It does
//! not wait for the relaunched application to become ready before exiting.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};
use tracing::{debug, info, warn};

use crate::constants::PROCESS_EXIT_TIMEOUT;
use crate::core::UpdaterError;

#[cfg(windows)]
use std::os::windows::process::CommandExt;

#[cfg(windows)]
const DETACHED_PROCESS: u32 = 0x0000_0008;
#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

/// OS-level process primitives used by the update strategies.
#[async_trait]
pub trait ProcessControl: Send + Sync {
    /// Ask process `pid` to exit. A process that is already gone is not an error.
    async fn terminate(&self, pid: u32) -> Result<()>;

    /// Start `executable` as an independent process without waiting for it.
    async fn launch(&self, executable: &Path) -> Result<()>;
}

/// [`ProcessControl`] backed by `sysinfo` for termination and `std::process` for launch.
#[derive(Debug, Clone)]
pub struct SystemProcessControl {
    exit_timeout: Duration,
}

impl Default for SystemProcessControl {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemProcessControl {
    pub fn new() -> Self {
        Self {
            exit_timeout: PROCESS_EXIT_TIMEOUT,
        }
    }

    /// How long [`terminate`](ProcessControl::terminate) waits for the process to disappear.
    #[must_use]
    pub fn with_exit_timeout(mut self, timeout: Duration) -> Self {
        self.exit_timeout = timeout;
        self
    }
}

fn has_exited(system: &System, pid: Pid) -> bool {
    // An unreaped child shows up as a zombie; it no longer holds any files.
    system.process(pid).is_none_or(|p| p.status() == ProcessStatus::Zombie)
}

fn kill_and_wait(pid: u32, exit_timeout: Duration) -> Result<()> {
    let sys_pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[sys_pid]), true);

    let Some(process) = system.process(sys_pid) else {
        debug!("Process {pid} is not running");
        return Ok(());
    };

    info!("Terminating process {pid} ({})", process.name().to_string_lossy());
    if !process.kill() {
        // It may have exited between the refresh and the kill.
        system.refresh_processes(ProcessesToUpdate::Some(&[sys_pid]), true);
        if has_exited(&system, sys_pid) {
            return Ok(());
        }
        return Err(UpdaterError::ProcessError {
            operation: format!("terminate process {pid}"),
            reason: "the operating system refused the kill request".to_string(),
        }
        .into());
    }

    let deadline = Instant::now() + exit_timeout;
    loop {
        system.refresh_processes(ProcessesToUpdate::Some(&[sys_pid]), true);
        if has_exited(&system, sys_pid) {
            debug!("Process {pid} exited");
            return Ok(());
        }
        if Instant::now() >= deadline {
            warn!("Process {pid} still present {}s after kill", exit_timeout.as_secs());
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(100));
    }
}

#[async_trait]
impl ProcessControl for SystemProcessControl {
    async fn terminate(&self, pid: u32) -> Result<()> {
        if pid == 0 {
            warn!("No main process id was given, skipping termination");
            return Ok(());
        }
        if pid == std::process::id() {
            return Err(UpdaterError::ProcessError {
                operation: format!("terminate process {pid}"),
                reason: "refusing to terminate the updater itself".to_string(),
            }
            .into());
        }

        let exit_timeout = self.exit_timeout;
        tokio::task::spawn_blocking(move || kill_and_wait(pid, exit_timeout))
            .await
            .map_err(|e| UpdaterError::ProcessError {
                operation: format!("terminate process {pid}"),
                reason: e.to_string(),
            })?
    }

    async fn launch(&self, executable: &Path) -> Result<()> {
        if !executable.is_file() {
            return Err(UpdaterError::ProcessError {
                operation: format!("launch {}", executable.display()),
                reason: "executable does not exist".to_string(),
            }
            .into());
        }

        let mut cmd = Command::new(executable);
        cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
        if let Some(parent) = executable.parent().filter(|p| !p.as_os_str().is_empty()) {
            cmd.current_dir(parent);
        }

        #[cfg(windows)]
        cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let child = cmd.spawn().map_err(|e| UpdaterError::ProcessError {
            operation: format!("launch {}", executable.display()),
            reason: e.to_string(),
        })?;
        info!("Started {} (pid {})", executable.display(), child.id());
        Ok(())
    }
}

/// The main application process that launched the updater.
///
/// Terminating goes through this handle so that, whichever strategies run, the
/// underlying [`ProcessControl::terminate`] is called at most once per run.
#[derive(Debug)]
pub struct MainProcess {
    pid: u32,
    terminated: AtomicBool,
}

impl MainProcess {
    pub fn new(pid: u32) -> Self {
        Self {
            pid,
            terminated: AtomicBool::new(false),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Whether a termination has been requested.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Terminate the main process unless that was already requested.
    ///
    /// The handle is marked before the request is sent, so a failed request is
    /// not retried by a later strategy.
    pub async fn terminate(&self, control: &dyn ProcessControl) -> Result<()> {
        if self.terminated.swap(true, Ordering::SeqCst) {
            debug!("Main process {} already terminated", self.pid);
            return Ok(());
        }
        control.terminate(self.pid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingControl {
        terminations: AtomicUsize,
    }

    #[async_trait]
    impl ProcessControl for CountingControl {
        async fn terminate(&self, _pid: u32) -> Result<()> {
            self.terminations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn launch(&self, _executable: &Path) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_main_process_terminates_once() {
        let control = CountingControl::default();
        let main = MainProcess::new(4242);
        assert!(!main.is_terminated());

        main.terminate(&control).await.unwrap();
        main.terminate(&control).await.unwrap();

        assert!(main.is_terminated());
        assert_eq!(control.terminations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_terminate_pid_zero_is_skipped() {
        SystemProcessControl::new().terminate(0).await.unwrap();
    }

    #[tokio::test]
    async fn test_terminate_self_is_refused() {
        let result = SystemProcessControl::new().terminate(std::process::id()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_terminate_missing_process_is_ok() {
        // PIDs this large are never handed out on the platforms we test on.
        SystemProcessControl::new().terminate(u32::MAX - 7).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_running_process() {
        let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        let control = SystemProcessControl::new().with_exit_timeout(Duration::from_secs(2));

        control.terminate(child.id()).await.unwrap();

        let status = child.wait().unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    async fn test_launch_missing_executable() {
        let temp = tempfile::tempdir().unwrap();
        let err = SystemProcessControl::new()
            .launch(&temp.path().join("missing.exe"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<UpdaterError>(),
            Some(UpdaterError::ProcessError { .. })
        ));
    }
}
