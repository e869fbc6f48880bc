use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// User-visible execution state of the emulated CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Paused,
}

#[derive(Debug)]
struct CpuThreadState {
    run_state: RunState,
    /// An emulation thread is attached and will eventually reach a safe point.
    attached: bool,
    /// The emulation thread is blocked inside `safe_point`.
    parked: bool,
    pause_requests: u32,
}

/// Pause controller shared between the control thread and the CPU emulation thread.
///
/// The emulation thread attaches itself with [`CpuThread::attach`] and calls
/// [`CpuThreadAttachment::safe_point`] between blocks. Control-side code takes a
/// [`CpuThreadGuard`] before touching the JIT cache; the guard blocks until the emulation thread is
/// parked (or no emulation thread exists) and keeps it parked until the guard is dropped.
///
/// The guard does not change [`RunState`]: a running CPU resumes as soon as the last guard goes
/// away.
#[derive(Debug)]
pub struct CpuThread {
    state: Mutex<CpuThreadState>,
    cond: Condvar,
}

impl CpuThread {
    /// A paused CPU with no emulation thread attached.
    pub fn new() -> Self {
        Self::with_run_state(RunState::Paused)
    }

    pub fn with_run_state(run_state: RunState) -> Self {
        Self {
            state: Mutex::new(CpuThreadState {
                run_state,
                attached: false,
                parked: false,
                pause_requests: 0,
            }),
            cond: Condvar::new(),
        }
    }

    pub fn run_state(&self) -> RunState {
        self.lock().run_state
    }

    pub fn is_paused(&self) -> bool {
        self.run_state() == RunState::Paused
    }

    pub fn pause(&self) {
        self.lock().run_state = RunState::Paused;
        tracing::debug!("cpu paused");
    }

    pub fn resume(&self) {
        self.lock().run_state = RunState::Running;
        self.cond.notify_all();
        tracing::debug!("cpu resumed");
    }

    /// Park the CPU thread for the lifetime of the returned guard.
    pub fn guard(&self) -> CpuThreadGuard<'_> {
        CpuThreadGuard::new(self)
    }

    /// Register the calling thread as the CPU emulation thread.
    pub fn attach(&self) -> CpuThreadAttachment<'_> {
        let mut state = self.lock();
        state.attached = true;
        state.parked = false;
        CpuThreadAttachment { cpu: self }
    }

    pub fn pending_pause_requests(&self) -> u32 {
        self.lock().pause_requests
    }

    fn lock(&self) -> MutexGuard<'_, CpuThreadState> {
        // A panic while holding the lock never leaves the state half-written; keep going so a
        // guard dropped during unwinding can still release its request.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, CpuThreadState>) -> MutexGuard<'a, CpuThreadState> {
        self.cond
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CpuThread {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped CPU pause. Holding one is the precondition for reading or mutating the JIT cache.
#[derive(Debug)]
pub struct CpuThreadGuard<'a> {
    cpu: &'a CpuThread,
}

impl<'a> CpuThreadGuard<'a> {
    pub fn new(cpu: &'a CpuThread) -> Self {
        let mut state = cpu.lock();
        state.pause_requests += 1;
        cpu.cond.notify_all();
        while state.attached && !state.parked {
            state = cpu.wait(state);
        }
        drop(state);
        Self { cpu }
    }
}

impl Drop for CpuThreadGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.cpu.lock();
        state.pause_requests = state.pause_requests.saturating_sub(1);
        drop(state);
        self.cpu.cond.notify_all();
    }
}

/// Handle held by the CPU emulation thread. Detaches on drop.
#[derive(Debug)]
pub struct CpuThreadAttachment<'a> {
    cpu: &'a CpuThread,
}

impl CpuThreadAttachment<'_> {
    /// Block while the CPU is paused or any guard is held.
    pub fn safe_point(&self) {
        let mut state = self.cpu.lock();
        if state.pause_requests == 0 && state.run_state == RunState::Running {
            return;
        }
        state.parked = true;
        self.cpu.cond.notify_all();
        while state.pause_requests > 0 || state.run_state == RunState::Paused {
            state = self.cpu.wait(state);
        }
        state.parked = false;
    }
}

impl Drop for CpuThreadAttachment<'_> {
    fn drop(&mut self) {
        let mut state = self.cpu.lock();
        state.attached = false;
        state.parked = false;
        drop(state);
        self.cpu.cond.notify_all();
    }
}
