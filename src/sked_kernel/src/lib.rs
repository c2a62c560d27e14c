//! A fixed-capacity, priority-ordered periodic task scheduler for single-core,
//! interrupt-driven targets.
//!
//! All tasks share one call stack. A periodic tick advances every task's
//! countdown; depending on [`Mode`], the tick handler either runs the highest
//! priority ready task on the spot (preempting whatever it interrupted) or
//! leaves ready tasks for a main loop calling [`Scheduler::run_ready`].
//!
//! The hardware (or a simulation of it) is supplied through the [`Port`]
//! trait.
#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod error;
mod klock;
mod sched;
pub mod task;
pub mod tick;

pub use self::{
    error::*,
    sched::{Mode, Scheduler, TaskDefiner},
    task::{Priority, Stagger, StaggerKind, TaskFn, TaskId, TaskInfo, TaskSt, Ticks},
    tick::{CfgError, ClockSource, TickCfg, TickOptions},
};

/// The maximum number of tasks a scheduler can hold.
pub const MAX_TASKS: usize = 16;

/// The reserved priority meaning "lower than any task". It's the value of
/// [`Scheduler::running_priority`] while no task is running, and it can't be
/// assigned to a task.
pub const PRIORITY_IDLE: Priority = -127;

/// The value at which [`TaskInfo::misses`] stops counting.
pub const MISSES_MAX: u8 = u8::MAX;

/// The value at which [`TaskInfo::overruns`] stops counting.
pub const OVERRUNS_MAX: u8 = u8::MAX;

/// Implemented by a port. This is the only contract between the scheduler and
/// the hardware.
///
/// # Safety
///
/// These methods are only meant to be called by the scheduler.
///
/// While CPU Lock is active, [`Scheduler::on_tick`] must not be entered from
/// an asynchronous context (i.e., the tick interrupt must be masked).
pub unsafe trait Port: Sync {
    /// The tick source this port drives.
    const CLOCK_SOURCE: ClockSource;

    /// The characteristics of the tick source.
    const TICK_CFG: TickCfg;

    /// Activate CPU Lock. Return `true` if it was already active, in which
    /// case this is a no-op.
    ///
    /// # Safety
    ///
    /// Only meant to be called by the scheduler.
    unsafe fn enter_cpu_lock(&self) -> bool;

    /// Deactivate CPU Lock.
    ///
    /// # Safety
    ///
    /// CPU Lock must be active.
    unsafe fn leave_cpu_lock(&self);

    /// Return a flag indicating whether CPU Lock is active.
    fn is_cpu_lock_active(&self) -> bool;

    /// Arm the periodic tick generator with its interrupt disabled.
    ///
    /// # Safety
    ///
    /// Only meant to be called by the scheduler.
    unsafe fn configure_tick(&self);

    /// Enable the tick interrupt.
    ///
    /// # Safety
    ///
    /// Only meant to be called by the scheduler.
    unsafe fn enable_tick(&self);

    /// Disable the tick interrupt.
    ///
    /// # Safety
    ///
    /// Only meant to be called by the scheduler.
    unsafe fn disable_tick(&self);

    /// Discard a pending tick interrupt, if any.
    ///
    /// # Safety
    ///
    /// Only meant to be called by the scheduler.
    unsafe fn clear_tick(&self);

    /// Get a monotonic timestamp in microseconds. The scheduler itself
    /// doesn't use this.
    fn micros(&self) -> u64;
}
