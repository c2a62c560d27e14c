//! Scheduler state locking mechanism
use core::{mem, ops};
use spin::{Mutex as SpinMutex, MutexGuard as SpinMutexGuard};

use crate::{sched::SchedState, Port};

/// Enter a CPU Lock state (or stay in it if it's already active) and borrow
/// the scheduler state.
///
/// `state` is only ever locked by this function, so it's never contended as
/// long as no guard is held across an action window.
pub(crate) fn lock_cpu<'a, P: Port>(
    port: &'a P,
    state: &'a SpinMutex<SchedState>,
) -> CpuLockGuard<'a, P> {
    // Safety: We are the scheduler
    let was_active = unsafe { port.enter_cpu_lock() };
    let lock = CpuLock { port, was_active };
    CpuLockGuard {
        state: borrow_state(state),
        cell: state,
        lock,
    }
}

fn borrow_state(cell: &SpinMutex<SchedState>) -> SpinMutexGuard<'_, SchedState> {
    debug_assert!(!cell.is_locked(), "scheduler state is already borrowed");
    cell.lock()
}

/// RAII guard for a CPU Lock state. Restores the previous CPU Lock state when
/// dropped.
struct CpuLock<'a, P: Port> {
    port: &'a P,
    was_active: bool,
}

impl<P: Port> Drop for CpuLock<'_, P> {
    fn drop(&mut self) {
        if !self.was_active {
            // Safety: CPU Lock is active, and it's us who activated it
            unsafe { self.port.leave_cpu_lock() };
        }
    }
}

/// RAII guard for a CPU Lock state with mutable access to the scheduler
/// state.
pub(crate) struct CpuLockGuard<'a, P: Port> {
    // Field order matters: the state is released before CPU Lock
    state: SpinMutexGuard<'a, SchedState>,
    cell: &'a SpinMutex<SchedState>,
    lock: CpuLock<'a, P>,
}

impl<'a, P: Port> CpuLockGuard<'a, P> {
    /// Deactivate CPU Lock, call `f`, and then reactivate CPU Lock.
    ///
    /// CPU Lock is deactivated even if it was already active when this guard
    /// was created. This is what lets a tick interrupt nest inside an action
    /// invoked by the tick handler.
    pub(crate) fn unlock_while<R>(self, f: impl FnOnce() -> R) -> (Self, R) {
        let Self { state, cell, lock } = self;
        drop(state);

        let port = lock.port;
        let was_active = lock.was_active;
        // `CpuLock::drop` might not deactivate CPU Lock, so do it by ourselves
        mem::forget(lock);

        debug_assert!(port.is_cpu_lock_active());
        // Safety: CPU Lock is active
        unsafe { port.leave_cpu_lock() };

        let output = f();

        // Safety: We are the scheduler
        let reentered = unsafe { port.enter_cpu_lock() };
        debug_assert!(!reentered, "the action returned with CPU Lock active");

        let guard = Self {
            state: borrow_state(cell),
            cell,
            lock: CpuLock { port, was_active },
        };
        (guard, output)
    }
}

impl<P: Port> ops::Deref for CpuLockGuard<'_, P> {
    type Target = SchedState;
    fn deref(&self) -> &Self::Target {
        &self.state
    }
}

impl<P: Port> ops::DerefMut for CpuLockGuard<'_, P> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.state
    }
}
