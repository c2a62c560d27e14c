//! The scheduler
use core::fmt;
use spin::Mutex as SpinMutex;

use crate::{
    error::{InitError, RunReadyError, ScheduleError, StartError},
    klock::{lock_cpu, CpuLockGuard},
    task::{table::TaskTable, Priority, Stagger, TaskCb, TaskFn, TaskId, TaskInfo, TaskSt},
    tick::ClockSource,
    Port, MAX_TASKS, PRIORITY_IDLE,
};


/// Specifies how ready tasks are executed.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Mode {
    /// The tick handler runs ready tasks itself. A task preempts any running
    /// task with a lower priority.
    Preemptive,
    /// The tick handler only marks tasks as ready. They are run to
    /// completion, one by one, by [`Scheduler::run_ready`].
    NonPreemptive,
}

/// A periodic task scheduler.
///
/// A port delivers ticks by calling [`Self::on_tick`]. The scheduler is owned
/// by the application; a port that needs to reach it from an interrupt
/// handler obtains a reference through an explicit binding step.
pub struct Scheduler<P> {
    port: P,
    /// Only borrowed under CPU Lock (see [`crate::klock`]).
    state: SpinMutex<SchedState>,
}

/// The mutable state of [`Scheduler`].
pub(crate) struct SchedState {
    pub(crate) initialized: bool,
    pub(crate) mode: Mode,
    pub(crate) clock: Option<ClockSource>,
    pub(crate) min_period_us: u32,
    pub(crate) max_period_us: u32,
    /// The priority of the task being run by the scheduler, or
    /// [`PRIORITY_IDLE`].
    pub(crate) ceiling: Priority,
    pub(crate) tasks: TaskTable,
    pub(crate) next_id: u32,
}

impl SchedState {
    const fn new() -> Self {
        Self {
            initialized: false,
            mode: Mode::Preemptive,
            clock: None,
            min_period_us: 0,
            max_period_us: 0,
            ceiling: PRIORITY_IDLE,
            tasks: TaskTable::new(),
            next_id: 0,
        }
    }

    fn reset(&mut self) {
        self.initialized = false;
        self.mode = Mode::Preemptive;
        self.clock = None;
        self.min_period_us = 0;
        self.max_period_us = 0;
        self.ceiling = PRIORITY_IDLE;
        self.tasks.clear();
        // `next_id` is kept so that a task running across a reset can't be
        // mistaken for a new one
    }
}

impl<P: Port> Scheduler<P> {
    /// Construct a `Scheduler` in the reset state. The hardware is left
    /// untouched until [`Self::init`].
    pub const fn new(port: P) -> Self {
        Self {
            port,
            state: SpinMutex::new(SchedState::new()),
        }
    }

    /// Get the port.
    #[inline]
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Prepare the scheduler for use.
    ///
    /// Computes the legal period range from [`Port::TICK_CFG`] and arms the
    /// tick generator with its interrupt disabled. Call [`Self::start`] to
    /// enable it.
    ///
    /// Calling this on an initialized scheduler changes the mode and keeps
    /// the scheduled tasks. The tick interrupt is disabled again in that case.
    pub fn init(&self, mode: Mode, clock_source: ClockSource) -> Result<(), InitError> {
        if clock_source != P::CLOCK_SOURCE {
            log::debug!(
                "init: {clock_source:?} is not supported (the port provides {:?})",
                P::CLOCK_SOURCE
            );
            return Err(InitError::NotImplemented);
        }

        let mut lock = lock_cpu(&self.port, &self.state);
        let cfg = P::TICK_CFG;
        lock.mode = mode;
        lock.clock = Some(clock_source);
        lock.min_period_us = cfg.min_period_micros();
        lock.max_period_us = cfg.max_period_micros();

        // Safety: We are the scheduler
        unsafe { self.port.configure_tick() };

        lock.initialized = true;
        log::debug!(
            "init: mode = {mode:?}, periods = {}..={} us",
            lock.min_period_us,
            lock.max_period_us
        );
        Ok(())
    }

    /// Remove all tasks, disable the tick interrupt, and return to the
    /// uninitialized state. Can be called at any time.
    pub fn reset(&self) {
        let mut lock = lock_cpu(&self.port, &self.state);

        // Safety: We are the scheduler
        unsafe {
            self.port.disable_tick();
            self.port.clear_tick();
        }

        lock.reset();
        log::debug!("reset");
    }

    /// Discard any pending tick and enable the tick interrupt.
    pub fn start(&self) -> Result<(), StartError> {
        let lock = lock_cpu(&self.port, &self.state);
        if !lock.initialized {
            return Err(StartError::NotInitialized);
        }

        // Safety: We are the scheduler
        unsafe {
            self.port.clear_tick();
            self.port.enable_tick();
        }

        log::debug!("start");
        Ok(())
    }

    /// Add a task.
    ///
    /// `period_us` and the value of `stagger` are converted to ticks,
    /// discarding any remainder. The first activation happens after
    /// `stagger`; after that, the task is activated every `period_us`.
    ///
    /// The checks are made in the order of [`ScheduleError`]'s variants. A
    /// rejected task leaves the scheduler unchanged.
    pub fn schedule(
        &self,
        period_us: u32,
        stagger: Stagger,
        priority: Priority,
        action: Option<TaskFn>,
    ) -> Result<(), ScheduleError> {
        let mut lock = lock_cpu(&self.port, &self.state);

        if !lock.initialized {
            return Err(ScheduleError::NotInitialized);
        }

        if lock.tasks.len() >= MAX_TASKS {
            return Err(ScheduleError::TooManyTasks);
        }

        let (min, max) = (lock.min_period_us, lock.max_period_us);
        if period_us == 0 || period_us < min || period_us > max {
            return Err(ScheduleError::InvalidPeriod);
        }

        match stagger {
            Stagger::Offset(offset_us) => {
                if offset_us > max || (offset_us != 0 && offset_us < min) {
                    return Err(ScheduleError::InvalidOffset);
                }
            }
            Stagger::Phase(phase_us) => {
                if phase_us > period_us {
                    return Err(ScheduleError::InvalidPhase);
                }
            }
        }

        if priority <= PRIORITY_IDLE {
            return Err(ScheduleError::InvalidPriority);
        }

        let action = action.ok_or(ScheduleError::InvalidFunction)?;

        let cfg = P::TICK_CFG;
        let id = TaskId(lock.next_id);
        let cb = TaskCb::new(
            id,
            action,
            cfg.micros_to_ticks(period_us),
            cfg.micros_to_ticks(stagger.micros()),
            stagger.kind(),
            priority,
        );

        let index = lock.tasks.insert(cb)?;
        lock.next_id = lock.next_id.wrapping_add(1);

        log::debug!(
            "scheduled {id:?} at index {index}: period = {period_us} us, \
            {stagger:?}, priority = {priority}"
        );
        Ok(())
    }

    /// Start defining a task. This is a builder-style alternative to
    /// [`Self::schedule`].
    pub const fn define_task(&self) -> TaskDefiner<'_, P> {
        TaskDefiner::new(self)
    }

    /// The tick handler. The port calls this once per tick.
    ///
    /// Advances every task's countdown. In [`Mode::Preemptive`], it then runs
    /// every ready task whose priority exceeds that of the task being run (if
    /// any), in priority order. CPU Lock is released while a task runs, so
    /// another tick can preempt it.
    pub fn on_tick(&self) {
        let mut lock = lock_cpu(&self.port, &self.state);
        if !lock.initialized {
            log::trace!("on_tick: ignored (not initialized)");
            return;
        }

        if lock.tasks.is_empty() {
            return;
        }

        lock.tasks.tick_all();

        if lock.mode != Mode::Preemptive {
            return;
        }

        let mut i = 0;
        loop {
            let ceiling = lock.ceiling;
            let Some(cb) = lock.tasks.get(i) else { break };

            if cb.st != TaskSt::Ready || cb.priority <= ceiling {
                i += 1;
                continue;
            }

            let next;
            (lock, next) = self.run_task(lock, i);
            match next {
                Some(next) => i = next,
                None => break,
            }
        }
    }

    /// Run every ready task once, in priority order, to completion. Intended
    /// to be called repeatedly from a main loop in [`Mode::NonPreemptive`].
    pub fn run_ready(&self) -> Result<(), RunReadyError> {
        let mut lock = lock_cpu(&self.port, &self.state);

        if !lock.initialized {
            return Err(RunReadyError::NotInitialized);
        }

        if lock.mode == Mode::Preemptive {
            return Err(RunReadyError::WrongMode);
        }

        let mut i = 0;
        while let Some(cb) = lock.tasks.get(i) {
            if cb.st != TaskSt::Ready {
                i += 1;
                continue;
            }

            let next;
            (lock, next) = self.run_task(lock, i);
            match next {
                Some(next) => i = next,
                None => break,
            }
        }

        Ok(())
    }

    /// Run the ready task at index `i` with CPU Lock released.
    ///
    /// Returns the index to resume the scan from, which is past the task's
    /// current position because the table might have been modified while the
    /// task was running. Returns `None` if the task is gone, i.e., the
    /// scheduler was reset.
    fn run_task<'a>(
        &'a self,
        mut lock: CpuLockGuard<'a, P>,
        i: usize,
    ) -> (CpuLockGuard<'a, P>, Option<usize>) {
        let Some(cb) = lock.tasks.get_mut(i) else {
            return (lock, None);
        };
        debug_assert_eq!(cb.st, TaskSt::Ready);

        cb.st = TaskSt::Running;
        let (id, action, priority) = (cb.id, cb.action, cb.priority);
        lock.ceiling = priority;
        log::trace!("running {id:?} (priority = {priority})");

        let (mut lock, ()) = lock.unlock_while(|| action());

        lock.ceiling = PRIORITY_IDLE;
        log::trace!("{id:?} completed");

        let Some(i) = lock.tasks.position(id) else {
            log::trace!("{id:?} was removed while running");
            return (lock, None);
        };

        if let Some(cb) = lock.tasks.get_mut(i) {
            cb.st = TaskSt::Idle;
        }

        (lock, Some(i + 1))
    }

    /// Get the number of scheduled tasks.
    pub fn task_count(&self) -> usize {
        lock_cpu(&self.port, &self.state).tasks.len()
    }

    /// Get a snapshot of the task at the specified position. The position
    /// reflects the scheduling order: a smaller index means a higher
    /// priority.
    pub fn task_info(&self, index: usize) -> Option<TaskInfo> {
        lock_cpu(&self.port, &self.state)
            .tasks
            .get(index)
            .map(TaskCb::info)
    }

    pub fn mode(&self) -> Mode {
        lock_cpu(&self.port, &self.state).mode
    }

    pub fn is_initialized(&self) -> bool {
        lock_cpu(&self.port, &self.state).initialized
    }

    /// Get the selected tick source. Returns `None` if the scheduler isn't
    /// initialized.
    pub fn clock_source(&self) -> Option<ClockSource> {
        lock_cpu(&self.port, &self.state).clock
    }

    /// Get the legal range of task periods in microseconds. Both values are
    /// zero if the scheduler isn't initialized.
    pub fn period_bounds(&self) -> (u32, u32) {
        let lock = lock_cpu(&self.port, &self.state);
        (lock.min_period_us, lock.max_period_us)
    }

    /// Get the priority of the task being run by the scheduler, or
    /// [`PRIORITY_IDLE`] if there's none.
    pub fn running_priority(&self) -> Priority {
        lock_cpu(&self.port, &self.state).ceiling
    }
}

impl<P: Port> fmt::Debug for Scheduler<P> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let lock = lock_cpu(&self.port, &self.state);
        f.debug_struct("Scheduler")
            .field("initialized", &lock.initialized)
            .field("mode", &lock.mode)
            .field("clock_source", &lock.clock)
            .field("tick_cfg", &P::TICK_CFG)
            .field("min_period_us", &lock.min_period_us)
            .field("max_period_us", &lock.max_period_us)
            .field("running_priority", &lock.ceiling)
            .field("now_us", &self.port.micros())
            .field("tasks", &lock.tasks)
            .finish()
    }
}

/// A builder for a task, created by [`Scheduler::define_task`].
#[must_use = "call `finish` to schedule the task"]
pub struct TaskDefiner<'a, P> {
    sched: &'a Scheduler<P>,
    start: Option<TaskFn>,
    period_us: u32,
    stagger: Stagger,
    priority: Priority,
}

impl<'a, P: Port> TaskDefiner<'a, P> {
    const fn new(sched: &'a Scheduler<P>) -> Self {
        Self {
            sched,
            start: None,
            period_us: 0,
            stagger: Stagger::Offset(0),
            priority: 0,
        }
    }

    /// \[**Required**\] Specify the task's entry point.
    pub const fn start(self, start: TaskFn) -> Self {
        Self {
            start: Some(start),
            ..self
        }
    }

    /// \[**Required**\] Specify the task's period in microseconds.
    pub const fn period_micros(self, period_us: u32) -> Self {
        Self { period_us, ..self }
    }

    /// Delay the first activation by the specified duration, which is
    /// validated against the scheduler's period range. Defaults to no delay.
    pub const fn offset_micros(self, offset_us: u32) -> Self {
        Self {
            stagger: Stagger::Offset(offset_us),
            ..self
        }
    }

    /// Delay the first activation by the specified duration, which is
    /// validated against the task's own period.
    pub const fn phase_micros(self, phase_us: u32) -> Self {
        Self {
            stagger: Stagger::Phase(phase_us),
            ..self
        }
    }

    /// Specify the task's priority. Defaults to `0`.
    pub const fn priority(self, priority: Priority) -> Self {
        Self { priority, ..self }
    }

    /// Complete the definition and schedule the task.
    pub fn finish(self) -> Result<(), ScheduleError> {
        self.sched
            .schedule(self.period_us, self.stagger, self.priority, self.start)
    }
}
