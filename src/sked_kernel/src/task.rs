//! Tasks
use core::fmt;

use crate::{MISSES_MAX, OVERRUNS_MAX};

pub(crate) mod table;

/// Task priority. A larger value means a higher priority.
pub type Priority = i8;

/// A duration measured in ticks.
pub type Ticks = u32;

/// The entry point of a task.
pub type TaskFn = &'static (dyn Fn() + Sync);

/// Identifies a task within a scheduler. Assigned in scheduling order and
/// not reused, even across resets.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u32);

impl TaskId {
    pub const fn get(self) -> u32 {
        self.0
    }
}

/// Task state machine
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TaskSt {
    /// Waiting for its countdown to reach zero.
    Idle,
    /// Activated but not started yet.
    Ready,
    /// Executing its entry point.
    Running,
}

/// The one-time delay before a task's first activation, measured in
/// microseconds.
///
/// The variants differ only in how the value is validated.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Stagger {
    /// Must be zero or within the scheduler's legal period range.
    Offset(u32),
    /// Must not exceed the task's own period.
    Phase(u32),
}

impl Stagger {
    pub const fn kind(self) -> StaggerKind {
        match self {
            Self::Offset(_) => StaggerKind::Offset,
            Self::Phase(_) => StaggerKind::Phase,
        }
    }

    pub const fn micros(self) -> u32 {
        match self {
            Self::Offset(x) | Self::Phase(x) => x,
        }
    }
}

impl Default for Stagger {
    fn default() -> Self {
        Self::Offset(0)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum StaggerKind {
    Offset,
    Phase,
}

/// *Task control block* - the state data of a task.
#[derive(Clone, Copy)]
pub(crate) struct TaskCb {
    pub(crate) id: TaskId,
    pub(crate) action: TaskFn,
    pub(crate) period: Ticks,
    pub(crate) stagger: Ticks,
    pub(crate) stagger_kind: StaggerKind,
    pub(crate) priority: Priority,
    pub(crate) countdown: Ticks,
    pub(crate) st: TaskSt,
    pub(crate) misses: u8,
    pub(crate) overruns: u8,
}

impl TaskCb {
    /// Construct a `TaskCb` in the `Idle` state. The countdown starts at the
    /// stagger value.
    pub(crate) fn new(
        id: TaskId,
        action: TaskFn,
        period: Ticks,
        stagger: Ticks,
        stagger_kind: StaggerKind,
        priority: Priority,
    ) -> Self {
        Self {
            id,
            action,
            period,
            stagger,
            stagger_kind,
            priority,
            countdown: stagger,
            st: TaskSt::Idle,
            misses: 0,
            overruns: 0,
        }
    }

    /// Advance the countdown by one tick. Return `true` if the countdown
    /// expired.
    ///
    /// An expiry activates an idle task. If the previous activation is still
    /// running, it's an overrun; if it hasn't started yet, it's a miss. Either
    /// way the countdown is re-armed with the period, never with the stagger.
    pub(crate) fn tick(&mut self) -> bool {
        if self.countdown > 0 {
            self.countdown -= 1;
        }

        if self.countdown != 0 {
            return false;
        }

        match self.st {
            TaskSt::Idle => self.st = TaskSt::Ready,
            TaskSt::Running => {
                if self.overruns < OVERRUNS_MAX {
                    self.overruns += 1;
                }
            }
            TaskSt::Ready => {
                if self.misses < MISSES_MAX {
                    self.misses += 1;
                }
            }
        }

        self.countdown = self.period;
        true
    }

    pub(crate) fn info(&self) -> TaskInfo {
        TaskInfo {
            id: self.id,
            priority: self.priority,
            period: self.period,
            stagger: self.stagger,
            stagger_kind: self.stagger_kind,
            countdown: self.countdown,
            st: self.st,
            misses: self.misses,
            overruns: self.overruns,
        }
    }
}

impl fmt::Debug for TaskCb {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TaskCb")
            .field("self", &(self as *const _))
            .field("action", &(self.action as *const (dyn Fn() + Sync)))
            .field("info", &self.info())
            .finish()
    }
}

/// A snapshot of a task's state.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TaskInfo {
    pub id: TaskId,
    pub priority: Priority,
    /// The period in ticks.
    pub period: Ticks,
    /// The initial countdown in ticks.
    pub stagger: Ticks,
    pub stagger_kind: StaggerKind,
    /// The number of ticks until the next activation.
    pub countdown: Ticks,
    pub st: TaskSt,
    /// The number of activations that expired before the task got to run.
    /// Saturates at [`MISSES_MAX`].
    pub misses: u8,
    /// The number of activations that expired while the task was still
    /// running. Saturates at [`OVERRUNS_MAX`].
    pub overruns: u8,
}
