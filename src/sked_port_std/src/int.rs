//! Simulated interrupt controller
//!
//! There's a single interrupt source, the tick. CPU Lock is a lock owned by
//! at most one thread at a time. A tick is taken by one of the interrupt
//! context threads when it's pended, the tick interrupt is enabled, and
//! nobody owns CPU Lock.
//!
//! Tick handlers taken by different threads form a nesting stack. A thread
//! can only (re)acquire CPU Lock while no handler is active above its own
//! level, so an interrupted context never resumes before the handlers that
//! interrupted it have returned.
use std::{
    sync::{Condvar, Mutex, MutexGuard, PoisonError},
    thread::{self, ThreadId},
};

/// The maximum number of ticks that can be pending at the same time. Ticks
/// fired beyond this are lost.
pub const MAX_PENDING_TICKS: u32 = 64;

pub(crate) struct IntCtrl {
    st: Mutex<IntState>,
    cond: Condvar,
}

struct IntState {
    /// The thread owning CPU Lock.
    owner: Option<ThreadId>,
    /// The threads running a tick handler, from the outermost to the
    /// innermost one.
    nest: Vec<ThreadId>,
    /// The number of pending ticks.
    pended: u32,
    /// The tick interrupt is enabled.
    enabled: bool,
    /// Interrupt context threads should exit.
    shutdown: bool,
}

/// Returned by [`IntCtrl::wait_tick`].
pub(crate) enum Wakeup {
    /// The caller took a tick and now owns CPU Lock.
    Tick,
    Shutdown,
}

impl IntCtrl {
    pub(crate) const fn new() -> Self {
        Self {
            st: Mutex::new(IntState {
                owner: None,
                nest: Vec::new(),
                pended: 0,
                enabled: false,
                shutdown: false,
            }),
            cond: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, IntState> {
        // A panicking action can't leave `IntState` inconsistent
        self.st.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, IntState>) -> MutexGuard<'a, IntState> {
        self.cond
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquire CPU Lock, blocking while another thread owns it or a tick
    /// handler nested above the current thread is active. Return `true` if
    /// the current thread already owned it.
    pub(crate) fn enter_cpu_lock(&self) -> bool {
        let me = thread::current().id();
        let mut st = self.lock();
        if st.owner == Some(me) {
            return true;
        }

        while st.owner.is_some() || !st.is_innermost(me) {
            st = self.wait(st);
        }

        st.owner = Some(me);
        false
    }

    pub(crate) fn leave_cpu_lock(&self) {
        let mut st = self.lock();
        debug_assert_eq!(st.owner, Some(thread::current().id()));
        st.owner = None;
        drop(st);
        self.cond.notify_all();
    }

    /// Return a flag indicating whether the current thread owns CPU Lock.
    pub(crate) fn is_cpu_lock_active(&self) -> bool {
        self.lock().owner == Some(thread::current().id())
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.lock().enabled = enabled;
        self.cond.notify_all();
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    pub(crate) fn clear(&self) {
        self.lock().pended = 0;
    }

    pub(crate) fn pended(&self) -> u32 {
        self.lock().pended
    }

    pub(crate) fn pend(&self, count: u32) {
        let mut st = self.lock();
        let pended = st.pended.saturating_add(count);
        if pended > MAX_PENDING_TICKS {
            log::trace!("{} tick(s) lost", pended - MAX_PENDING_TICKS);
        }
        st.pended = pended.min(MAX_PENDING_TICKS);
        drop(st);
        self.cond.notify_all();
    }

    /// Get the number of active tick handlers.
    pub(crate) fn nesting(&self) -> usize {
        self.lock().nest.len()
    }

    /// Block until a tick can be taken or a shutdown is requested. Taking a
    /// tick activates CPU Lock for the current thread, just like a real
    /// interrupt entry sequence masks interrupts.
    pub(crate) fn wait_tick(&self) -> Wakeup {
        let mut st = self.lock();
        loop {
            if st.shutdown {
                return Wakeup::Shutdown;
            }
            if st.enabled && st.pended > 0 && st.owner.is_none() {
                break;
            }
            st = self.wait(st);
        }

        let me = thread::current().id();
        st.pended -= 1;
        st.owner = Some(me);
        st.nest.push(me);
        Wakeup::Tick
    }

    /// Return from the tick handler taken by the current thread by
    /// [`Self::wait_tick`], releasing CPU Lock if it's held.
    pub(crate) fn return_from_tick(&self) {
        let me = thread::current().id();
        let mut st = self.lock();
        st.nest.retain(|&id| id != me);
        if st.owner == Some(me) {
            st.owner = None;
        }
        drop(st);
        self.cond.notify_all();
    }

    pub(crate) fn set_shutdown(&self, shutdown: bool) {
        self.lock().shutdown = shutdown;
        self.cond.notify_all();
    }
}

impl IntState {
    /// Return whether `thread` runs at the innermost active level. A thread
    /// not running a tick handler is at the base level.
    fn is_innermost(&self, thread: ThreadId) -> bool {
        match self.nest.iter().position(|&id| id == thread) {
            Some(level) => level + 1 == self.nest.len(),
            None => self.nest.is_empty(),
        }
    }
}
