// LOADSWEEP PROCESS LIFECYCLE
// START: SPAWN THE SERVER-UNDER-TEST, SLEEP THE SETTLE DELAY, HAND BACK A HANDLE.
// STOP: SIGTERM, WAIT UP TO THE STOP TIMEOUT, THEN SIGKILL. NEVER BLOCKS FOREVER.
//
// OS ACCESS GOES THROUGH ProcessControl SO THE SWEEP CAN RUN AGAINST FAKES.

use std::io;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::error::TrialError;

// HOW LONG TO WAIT FOR THE KERNEL TO REAP AFTER SIGKILL
const KILL_REAP_TIMEOUT: Duration = Duration::from_millis(500);
const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Signal {
    Terminate,
    Kill,
}

impl Signal {
    fn raw(self) -> libc::c_int {
        match self {
            Self::Terminate => libc::SIGTERM,
            Self::Kill => libc::SIGKILL,
        }
    }
}

pub trait ProcessControl {
    type Child;

    fn spawn(&mut self, program: &Path, args: &[String]) -> io::Result<Self::Child>;

    fn id(&self, child: &Self::Child) -> u32;

    // SIGNALLING A PROCESS THAT ALREADY EXITED IS NOT AN ERROR
    fn signal(&mut self, child: &mut Self::Child, signal: Signal) -> io::Result<()>;

    // true ONCE THE PROCESS HAS EXITED AND BEEN REAPED.
    // Duration::ZERO POLLS ONCE WITHOUT SLEEPING.
    fn wait(&mut self, child: &mut Self::Child, timeout: Duration) -> io::Result<bool>;
}

// ---------------------------------------------------------------------------
// REAL PROCESSES
// ---------------------------------------------------------------------------

pub struct SystemProcesses;

pub struct SystemChild {
    child: Child,
    pgid: i32,
    reaped: bool,
}

impl SystemChild {
    fn try_reap(&mut self) -> io::Result<bool> {
        if self.reaped {
            return Ok(true);
        }
        if let Some(status) = self.child.try_wait()? {
            debug!(pid = self.child.id(), code = ?status.code(), signal = ?status.signal(), "server reaped");
            self.reaped = true;
            self.kill_stragglers();
        }
        Ok(self.reaped)
    }

    // WORKERS CAN OUTLIVE THE LEADER. THE PGID CANNOT BE REUSED WHILE ANY
    // MEMBER REMAINS, AND ESRCH MEANS THE GROUP IS ALREADY EMPTY.
    fn kill_stragglers(&self) {
        let rc = unsafe { libc::killpg(self.pgid, libc::SIGKILL) };
        if rc == 0 {
            debug!(pgid = self.pgid, "killed workers left in server group");
        }
    }
}

impl Drop for SystemChild {
    // A HANDLE DROPPED WITHOUT stop() (PANIC, EARLY RETURN) MUST NOT ORPHAN THE SERVER
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        if let Ok(true) = self.try_reap() {
            return;
        }
        unsafe { libc::killpg(self.pgid, libc::SIGKILL); }
        let deadline = Instant::now() + KILL_REAP_TIMEOUT;
        while Instant::now() < deadline {
            match self.child.try_wait() {
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                _ => return,
            }
        }
    }
}

impl ProcessControl for SystemProcesses {
    type Child = SystemChild;

    fn spawn(&mut self, program: &Path, args: &[String]) -> io::Result<SystemChild> {
        // OWN PROCESS GROUP: SIGNALS REACH THE SERVER'S WORKERS TOO, AND A
        // TERMINAL CTRL-C DOES NOT KILL THE SERVER BEHIND OUR BACK.
        let child = unsafe {
            Command::new(program)
                .args(args)
                .process_group(0)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .pre_exec(|| {
                    libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM as libc::c_ulong);
                    Ok(())
                })
                .spawn()?
        };
        let pgid = child.id() as i32;
        Ok(SystemChild { child, pgid, reaped: false })
    }

    fn id(&self, child: &SystemChild) -> u32 {
        child.child.id()
    }

    fn signal(&mut self, child: &mut SystemChild, signal: Signal) -> io::Result<()> {
        // NEVER SIGNAL A REAPED PID: IT MAY ALREADY BELONG TO SOMEONE ELSE
        if child.try_reap()? {
            return Ok(());
        }
        let rc = unsafe { libc::killpg(child.pgid, signal.raw()) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Ok(());
        }
        Err(err)
    }

    fn wait(&mut self, child: &mut SystemChild, timeout: Duration) -> io::Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if child.try_reap()? {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            std::thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}

// ---------------------------------------------------------------------------
// LIFECYCLE
// ---------------------------------------------------------------------------

// ONE RUNNING SERVER-UNDER-TEST. CONSUMED BY Lifecycle::stop, SO A HANDLE
// CAN BE STOPPED AT MOST ONCE.
pub struct ServerHandle<C> {
    child: C,
    pid: u32,
    port: u16,
    started_at: Instant,
}

impl<C> ServerHandle<C> {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StopOutcome {
    // EXITED ON ITS OWN BEFORE WE SIGNALLED
    AlreadyExited,
    // EXITED WITHIN THE STOP TIMEOUT AFTER SIGTERM
    Graceful,
    // NEEDED SIGKILL
    Killed,
    // SIGKILL SENT BUT NOT REAPED IN TIME, OR SIGNALLING FAILED
    Unreaped,
}

impl StopOutcome {
    pub fn label(self) -> &'static str {
        match self {
            Self::AlreadyExited => "ALREADY EXITED",
            Self::Graceful => "GRACEFUL",
            Self::Killed => "KILLED",
            Self::Unreaped => "UNREAPED",
        }
    }
}

pub struct Lifecycle<P> {
    control: P,
    config: ServerConfig,
}

impl<P: ProcessControl> Lifecycle<P> {
    pub fn new(control: P, config: ServerConfig) -> Self {
        Self { control, config }
    }

    pub fn control(&self) -> &P {
        &self.control
    }

    pub fn start(&mut self, port: u16) -> Result<ServerHandle<P::Child>, TrialError> {
        let args = self.config.args(port);
        let child = self
            .control
            .spawn(&self.config.binary, &args)
            .map_err(|source| TrialError::Spawn {
                binary: self.config.binary.clone(),
                source,
            })?;
        let pid = self.control.id(&child);
        let started_at = Instant::now();
        debug!(pid, port, binary = %self.config.binary.display(), "server spawned");

        // HEURISTIC, NOT A HANDSHAKE
        if !self.config.settle_delay.is_zero() {
            std::thread::sleep(self.config.settle_delay);
        }

        Ok(ServerHandle { child, pid, port, started_at })
    }

    pub fn stop(&mut self, handle: ServerHandle<P::Child>) -> StopOutcome {
        let ServerHandle { mut child, pid, port, started_at } = handle;
        let outcome = self.terminate(&mut child, pid);
        match outcome {
            StopOutcome::Killed => warn!(pid, port, "SIGTERM ignored, server killed"),
            StopOutcome::Unreaped => warn!(pid, port, "server could not be reaped"),
            _ => debug!(
                pid,
                port,
                outcome = outcome.label(),
                uptime_ms = started_at.elapsed().as_millis() as u64,
                "server stopped"
            ),
        }
        outcome
    }

    fn terminate(&mut self, child: &mut P::Child, pid: u32) -> StopOutcome {
        match self.control.wait(child, Duration::ZERO) {
            Ok(true) => return StopOutcome::AlreadyExited,
            Ok(false) => {}
            Err(e) => warn!(pid, error = %e, "failed to poll server"),
        }

        if let Err(e) = self.control.signal(child, Signal::Terminate) {
            warn!(pid, error = %e, "SIGTERM failed");
        }
        match self.control.wait(child, self.config.stop_timeout) {
            Ok(true) => return StopOutcome::Graceful,
            Ok(false) => {}
            Err(e) => warn!(pid, error = %e, "failed waiting for server"),
        }

        if let Err(e) = self.control.signal(child, Signal::Kill) {
            warn!(pid, error = %e, "SIGKILL failed");
            return StopOutcome::Unreaped;
        }
        match self.control.wait(child, KILL_REAP_TIMEOUT) {
            Ok(true) => StopOutcome::Killed,
            _ => StopOutcome::Unreaped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    // SCRIPTED CHILD: EXITS AFTER THE GIVEN SIGNAL (OR ON ITS OWN)
    struct FakeChild {
        exited: bool,
        honours_term: bool,
    }

    #[derive(Default)]
    struct FakeControl {
        honours_term: bool,
        exit_immediately: bool,
        fail_spawn: bool,
        signals: Vec<Signal>,
        spawned: Vec<Vec<String>>,
    }

    impl ProcessControl for FakeControl {
        type Child = FakeChild;

        fn spawn(&mut self, _program: &Path, args: &[String]) -> io::Result<FakeChild> {
            if self.fail_spawn {
                return Err(io::Error::new(io::ErrorKind::NotFound, "no such binary"));
            }
            self.spawned.push(args.to_vec());
            Ok(FakeChild { exited: self.exit_immediately, honours_term: self.honours_term })
        }

        fn id(&self, _child: &FakeChild) -> u32 {
            4242
        }

        fn signal(&mut self, child: &mut FakeChild, signal: Signal) -> io::Result<()> {
            self.signals.push(signal);
            if signal == Signal::Kill || child.honours_term {
                child.exited = true;
            }
            Ok(())
        }

        fn wait(&mut self, child: &mut FakeChild, _timeout: Duration) -> io::Result<bool> {
            Ok(child.exited)
        }
    }

    fn config() -> ServerConfig {
        ServerConfig {
            binary: PathBuf::from("/opt/server"),
            settle_delay: Duration::ZERO,
            ..ServerConfig::default()
        }
    }

    #[test]
    fn start_passes_port_and_flags() {
        let mut lc = Lifecycle::new(FakeControl::default(), config());
        let h = lc.start(23000).unwrap();
        assert_eq!(h.port(), 23000);
        assert_eq!(h.pid(), 4242);
        assert_eq!(lc.control().spawned[0], ["-l", "error", "-w", "8", "-p", "23000"]);
    }

    #[test]
    fn graceful_stop_sends_only_term() {
        let ctl = FakeControl { honours_term: true, ..FakeControl::default() };
        let mut lc = Lifecycle::new(ctl, config());
        let h = lc.start(23001).unwrap();
        assert_eq!(lc.stop(h), StopOutcome::Graceful);
        assert_eq!(lc.control().signals, [Signal::Terminate]);
    }

    #[test]
    fn stubborn_server_is_killed() {
        let mut lc = Lifecycle::new(FakeControl::default(), config());
        let h = lc.start(23002).unwrap();
        assert_eq!(lc.stop(h), StopOutcome::Killed);
        assert_eq!(lc.control().signals, [Signal::Terminate, Signal::Kill]);
    }

    #[test]
    fn exited_server_is_not_signalled() {
        let ctl = FakeControl { exit_immediately: true, ..FakeControl::default() };
        let mut lc = Lifecycle::new(ctl, config());
        let h = lc.start(23003).unwrap();
        assert_eq!(lc.stop(h), StopOutcome::AlreadyExited);
        assert!(lc.control().signals.is_empty());
    }

    #[test]
    fn spawn_failure_is_trial_error() {
        let ctl = FakeControl { fail_spawn: true, ..FakeControl::default() };
        let mut lc = Lifecycle::new(ctl, config());
        match lc.start(23004) {
            Err(TrialError::Spawn { binary, .. }) => assert_eq!(binary, PathBuf::from("/opt/server")),
            Err(e) => panic!("wrong error: {}", e),
            Ok(_) => panic!("spawn should fail"),
        }
    }
}
