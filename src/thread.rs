use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::{debug, warn};

use crate::{PoolError, Result};

/// Longest thread name kept by [`ThreadHandle`], in bytes.
pub const MAX_NAME_LEN: usize = 63;

/// Name given to a [`ThreadHandle`] created without one.
pub const DEFAULT_NAME: &str = "Thread";

type Job = Box<dyn FnOnce(KillSwitch) + Send + 'static>;

/// Lifecycle stage of a [`ThreadHandle`].
///
/// `Idle -> Running -> {Joined | Killed}`. Only a successful
/// [`ThreadHandle::start`] leaves `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Created but not started, or the last start attempt failed.
    Idle,
    /// The OS thread was spawned and has not been joined or killed.
    Running,
    /// The thread was joined.
    Joined,
    /// The thread was killed and detached.
    Killed,
}

/// Cooperative cancellation flag handed to closures created with
/// [`ThreadHandle::with_kill_switch`].
///
/// Raised by [`ThreadHandle::kill`]; long-running closures should poll it
/// and return once it is set.
#[derive(Debug, Clone, Default)]
pub struct KillSwitch {
    killed: Arc<AtomicBool>,
}

impl KillSwitch {
    /// Returns whether the owning handle has been killed.
    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::Acquire)
    }

    fn raise(&self) {
        self.killed.store(true, Ordering::Release);
    }
}

struct Lifecycle {
    state: ThreadState,
    handle: Option<JoinHandle<()>>,
}

/// A named OS thread that runs one closure, with explicit start, join
/// and kill steps.
///
/// All operations take `&self`, so a handle can be shared while one
/// thread blocks in [`join`](ThreadHandle::join) and others poll
/// [`is_alive`](ThreadHandle::is_alive).
pub struct ThreadHandle {
    name: String,
    job: Arc<Mutex<Option<Job>>>,
    alive: Arc<AtomicBool>,
    kill_switch: KillSwitch,
    lifecycle: Mutex<Lifecycle>,
}

impl ThreadHandle {
    /// Binds `job` to a new, not yet started handle.
    ///
    /// The name is copied and cut to [`MAX_NAME_LEN`] bytes; `None`
    /// gives [`DEFAULT_NAME`].
    pub fn new<F>(name: Option<&str>, job: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::with_kill_switch(name, move |_| job())
    }

    /// Like [`new`](ThreadHandle::new), but the closure receives the
    /// handle's [`KillSwitch`].
    pub fn with_kill_switch<F>(name: Option<&str>, job: F) -> Self
    where
        F: FnOnce(KillSwitch) + Send + 'static,
    {
        ThreadHandle {
            name: bounded_name(name.unwrap_or(DEFAULT_NAME)),
            job: Arc::new(Mutex::new(Some(Box::new(job)))),
            alive: Arc::new(AtomicBool::new(false)),
            kill_switch: KillSwitch::default(),
            lifecycle: Mutex::new(Lifecycle {
                state: ThreadState::Idle,
                handle: None,
            }),
        }
    }

    /// Spawns the OS thread running the bound closure.
    ///
    /// Does nothing unless the handle is idle.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Spawn`] if the OS refuses to create the
    /// thread. The handle then stays idle with its closure intact.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().unwrap();
        if lifecycle.state != ThreadState::Idle {
            return Ok(());
        }

        let job = Arc::clone(&self.job);
        let alive = Arc::clone(&self.alive);
        let switch = self.kill_switch.clone();
        let spawned = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                let job = job.lock().unwrap().take();
                if let Some(job) = job {
                    // Raise first so a racing kill's clear is never overwritten.
                    let _alive = AliveGuard::raise(&alive);
                    if switch.is_killed() {
                        return;
                    }
                    job(switch);
                }
            });

        match spawned {
            Ok(handle) => {
                lifecycle.state = ThreadState::Running;
                lifecycle.handle = Some(handle);
                debug!("Started thread `{}`", self.name);
                Ok(())
            }
            Err(source) => {
                warn!("Failed to spawn thread `{}`: {}", self.name, source);
                Err(PoolError::Spawn {
                    name: self.name.clone(),
                    source,
                })
            }
        }
    }

    /// Blocks until the closure has returned.
    ///
    /// Does nothing if the handle was never started or is already joined
    /// or killed. The handle counts as joined as soon as this is called,
    /// so a concurrent second `join` returns at once.
    ///
    /// Called from the handle's own thread, it returns at once and leaves
    /// the handle running so another thread can still join it.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Panicked`] if the closure panicked.
    pub fn join(&self) -> Result<()> {
        let handle = {
            let mut lifecycle = self.lifecycle.lock().unwrap();
            if lifecycle.state != ThreadState::Running {
                return Ok(());
            }
            if is_current(&lifecycle) {
                debug!("Thread `{}` asked to join itself, ignoring", self.name);
                return Ok(());
            }
            lifecycle.state = ThreadState::Joined;
            lifecycle.handle.take()
        };

        match handle {
            Some(handle) => {
                let joined = handle
                    .join()
                    .map_err(|_| PoolError::Panicked(self.name.clone()));
                debug!("Joined thread `{}`", self.name);
                joined
            }
            None => Ok(()),
        }
    }

    /// Marks a running thread as killed and detaches it.
    ///
    /// The alive flag drops immediately and the [`KillSwitch`] is raised,
    /// but safe Rust cannot stop a thread from the outside: the closure
    /// keeps running until it checks the switch or returns. Nothing is
    /// cleaned up on its behalf, and it can never be joined afterwards.
    /// Never kill a thread whose progress another thread waits on.
    pub fn kill(&self) {
        let mut lifecycle = self.lifecycle.lock().unwrap();
        if lifecycle.state != ThreadState::Running {
            return;
        }
        lifecycle.state = ThreadState::Killed;
        self.kill_switch.raise();
        self.alive.store(false, Ordering::Release);
        lifecycle.handle = None;
        warn!("Killed thread `{}`, detaching it", self.name);
    }

    /// Runs the bound closure on the calling thread.
    ///
    /// Does nothing unless the handle is idle. The handle is marked
    /// joined before the closure starts, since there is no OS thread
    /// left to start or join; the alive flag is up while it runs.
    pub fn run(&self) {
        let job = {
            let mut lifecycle = self.lifecycle.lock().unwrap();
            if lifecycle.state != ThreadState::Idle {
                return;
            }
            lifecycle.state = ThreadState::Joined;
            self.job.lock().unwrap().take()
        };

        if let Some(job) = job {
            let _alive = AliveGuard::raise(&self.alive);
            job(self.kill_switch.clone());
        }
    }

    /// Returns whether the closure is executing right now.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Returns whether the calling thread is this handle's OS thread.
    pub fn is_current(&self) -> bool {
        is_current(&self.lifecycle.lock().unwrap())
    }

    /// Returns whether a started thread has exited, so joining it will
    /// not block. Terminal handles count as finished, idle ones do not.
    pub fn is_finished(&self) -> bool {
        let lifecycle = self.lifecycle.lock().unwrap();
        match lifecycle.state {
            ThreadState::Idle => false,
            ThreadState::Running => lifecycle
                .handle
                .as_ref()
                .map_or(true, JoinHandle::is_finished),
            ThreadState::Joined | ThreadState::Killed => true,
        }
    }

    /// Returns the handle's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the handle, with the same truncation as at creation.
    ///
    /// Does nothing once the handle has left the idle state.
    pub fn set_name(&mut self, name: &str) {
        if self.state() == ThreadState::Idle {
            self.name = bounded_name(name);
        }
    }

    /// Returns the current lifecycle stage.
    pub fn state(&self) -> ThreadState {
        self.lifecycle.lock().unwrap().state
    }
}

impl fmt::Debug for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadHandle")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Holds the alive flag up for as long as the closure runs, unwinding
/// included.
struct AliveGuard<'a>(&'a AtomicBool);

impl<'a> AliveGuard<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        AliveGuard(flag)
    }
}

impl Drop for AliveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn is_current(lifecycle: &Lifecycle) -> bool {
    lifecycle
        .handle
        .as_ref()
        .is_some_and(|handle| handle.thread().id() == thread::current().id())
}

/// Copies `name` up to its first NUL, cut to `MAX_NAME_LEN` bytes on a
/// char boundary.
fn bounded_name(name: &str) -> String {
    let name = name.split('\0').next().unwrap_or_default();
    let mut end = name.len().min(MAX_NAME_LEN);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_owned()
}
