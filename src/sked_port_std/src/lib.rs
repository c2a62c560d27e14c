//! Simulation environment for running the sked scheduler on a hosted
//! environment.
//!
//! # Simulation model
//!
//!  - CPU Lock is a lock owned by a single thread at a time.
//!  - A timer thread pends a tick every [`TICK_PERIOD_MICROS`] microseconds
//!    while the tick is running.
//!  - A pool of interrupt context threads takes pending ticks. Taking a tick
//!    activates CPU Lock (like a real interrupt entry sequence would) and calls
//!    [`Scheduler::on_tick`]. When a task's action releases CPU Lock, another
//!    pending tick can be taken by another interrupt context thread, which is
//!    how a nested tick interrupt is simulated.
//!  - A context can't reacquire CPU Lock while a tick handler nested above
//!    it is active. This includes the main thread, which is below every
//!    tick handler.
//!
//! A preempted action keeps running on its own thread instead of being
//! frozen. Its completion is only observed by the scheduler after every
//! handler that preempted it has returned.
//!
//! # Usage
//!
//! ```rust,no_run
//! use sked_kernel::{ClockSource, Mode, Scheduler, Stagger};
//! use sked_port_std::StdPort;
//!
//! static SCHED: Scheduler<StdPort> = Scheduler::new(StdPort::new());
//!
//! fn blink() {}
//!
//! sked_port_std::bind(&SCHED).unwrap();
//! SCHED.init(Mode::Preemptive, ClockSource::Timer1).unwrap();
//! SCHED.schedule(500_000, Stagger::Offset(0), 1, Some(&blink)).unwrap();
//! SCHED.start().unwrap();
//! std::thread::sleep(std::time::Duration::from_secs(1));
//! sked_port_std::shutdown(&SCHED);
//! ```
#![deny(unsafe_op_in_unsafe_fn)]
use atomic_ref::AtomicRef;
use once_cell::sync::OnceCell;
use sked_kernel::{ClockSource, Port, Scheduler, TickCfg, TickOptions, MAX_TASKS};
use spin::Mutex as SpinMutex;
use std::{
    fmt, mem,
    sync::{
        atomic::{AtomicU64, Ordering},
        mpsc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

mod int;
mod timer;

pub use int::MAX_PENDING_TICKS;

use int::{IntCtrl, Wakeup};
use timer::TimerCmd;

/// The tick period.
pub const TICK_PERIOD_MICROS: u32 = 100;

/// The number of interrupt context threads. Each nesting level of the tick
/// handler occupies one.
pub const NUM_INTERRUPT_THREADS: usize = MAX_TASKS + 1;

/// The port. Each instance simulates its own timer and interrupt controller.
pub struct StdPort {
    int: IntCtrl,
    sched: AtomicRef<'static, Scheduler<StdPort>>,
    timer_cmd_send: SpinMutex<Option<mpsc::Sender<TimerCmd>>>,
    threads: SpinMutex<Vec<JoinHandle<()>>>,
    origin: OnceCell<Instant>,
    tick_count: AtomicU64,
}

/// Error type for [`bind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindError {
    /// The port is already bound to a scheduler.
    AlreadyBound,
    /// The operating system refused to create a thread.
    Spawn,
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::AlreadyBound => "the port is already bound to a scheduler",
            Self::Spawn => "could not spawn a port thread",
        })
    }
}

impl std::error::Error for BindError {}

impl StdPort {
    pub const fn new() -> Self {
        Self {
            int: IntCtrl::new(),
            sched: AtomicRef::new(None),
            timer_cmd_send: SpinMutex::new(None),
            threads: SpinMutex::new(Vec::new()),
            origin: OnceCell::new(),
            tick_count: AtomicU64::new(0),
        }
    }

    /// Get the number of ticks delivered to the scheduler so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count.load(Ordering::Relaxed)
    }

    /// Pend a tick from outside, as if the timer had fired.
    pub fn pend_tick(&self) {
        log::trace!("external-pend_tick");
        self.int.pend(1);
    }

    fn send_timer_cmd(&self, cmd: TimerCmd) {
        let timer_cmd_send = self.timer_cmd_send.lock();
        if let Some(timer_cmd_send) = &*timer_cmd_send {
            // The timer thread only exits when the sender is dropped
            let _ = timer_cmd_send.send(cmd);
        } else {
            log::trace!("{cmd:?} ignored (no timer thread)");
        }
    }

    fn interrupt_thread(&'static self) {
        loop {
            match self.int.wait_tick() {
                Wakeup::Shutdown => break,
                Wakeup::Tick => {}
            }

            // Return from the interrupt handler even if an action panics
            let _handler = TickHandler(&self.int);

            self.tick_count.fetch_add(1, Ordering::Relaxed);

            if let Some(sched) = self.sched.load(Ordering::Acquire) {
                log::trace!("tick");
                sched.on_tick();
            } else {
                log::warn!("a tick was taken, but no scheduler is bound");
            }
        }
        log::trace!("an interrupt thread is exiting");
    }
}

/// Marks the extent of a tick handler on an interrupt context thread.
struct TickHandler<'a>(&'a IntCtrl);

impl Drop for TickHandler<'_> {
    fn drop(&mut self) {
        self.0.return_from_tick();
    }
}

impl Default for StdPort {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdPort {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("StdPort")
            .field("tick_count", &self.tick_count())
            .field("tick_enabled", &self.int.is_enabled())
            .field("pended", &self.int.pended())
            .field("bound", &self.sched.load(Ordering::Relaxed).is_some())
            .finish()
    }
}

unsafe impl Port for StdPort {
    const CLOCK_SOURCE: ClockSource = ClockSource::Timer1;

    const TICK_CFG: TickCfg = match TickCfg::new(TickOptions {
        tick_period_micros: TICK_PERIOD_MICROS,
        counter_max: 0xffff,
    }) {
        Ok(x) => x,
        Err(e) => e.panic(),
    };

    unsafe fn enter_cpu_lock(&self) -> bool {
        log::trace!("enter_cpu_lock");
        self.int.enter_cpu_lock()
    }

    unsafe fn leave_cpu_lock(&self) {
        log::trace!("leave_cpu_lock");
        self.int.leave_cpu_lock();
    }

    fn is_cpu_lock_active(&self) -> bool {
        self.int.is_cpu_lock_active()
    }

    unsafe fn configure_tick(&self) {
        log::trace!("configure_tick");
        self.int.set_enabled(false);
        self.send_timer_cmd(TimerCmd::Configure {
            period: Duration::from_micros(TICK_PERIOD_MICROS.into()),
        });
    }

    unsafe fn enable_tick(&self) {
        log::trace!("enable_tick");
        self.int.set_enabled(true);
        self.send_timer_cmd(TimerCmd::Enable);
    }

    unsafe fn disable_tick(&self) {
        log::trace!("disable_tick");
        self.int.set_enabled(false);
        self.send_timer_cmd(TimerCmd::Disable);
    }

    unsafe fn clear_tick(&self) {
        log::trace!("clear_tick");
        self.int.clear();
    }

    fn micros(&self) -> u64 {
        let origin = self.origin.get_or_init(Instant::now);
        origin.elapsed().as_micros() as u64
    }
}

/// Bind `sched` to its port and start the port's threads. Ticks are delivered
/// to `sched` once it's started by [`Scheduler::start`].
///
/// This also installs `env_logger` unless a logger is already installed.
pub fn bind(sched: &'static Scheduler<StdPort>) -> Result<(), BindError> {
    let _ = env_logger::try_init();

    let port = sched.port();

    port.sched
        .compare_exchange(None, Some(sched), Ordering::AcqRel, Ordering::Acquire)
        .map_err(|_| BindError::AlreadyBound)?;

    // Establish the origin of `micros`
    port.micros();
    port.int.set_shutdown(false);

    let (timer_cmd_send, timer_join_handle) =
        match timer::spawn(&port.int, Duration::from_micros(TICK_PERIOD_MICROS.into())) {
            Ok(x) => x,
            Err(e) => {
                log::warn!("could not start the timer thread: {e}");
                port.sched.store(None, Ordering::Release);
                return Err(BindError::Spawn);
            }
        };

    // The scheduler might have been started before binding
    if port.int.is_enabled() {
        let _ = timer_cmd_send.send(TimerCmd::Enable);
    }
    *port.timer_cmd_send.lock() = Some(timer_cmd_send);

    let mut threads = vec![timer_join_handle];
    for i in 0..NUM_INTERRUPT_THREADS {
        let spawn_result = thread::Builder::new()
            .name(format!("sked-int-{i}"))
            .spawn(move || port.interrupt_thread());
        match spawn_result {
            Ok(jh) => threads.push(jh),
            Err(e) => {
                log::warn!("could not start an interrupt thread: {e}");
                *port.threads.lock() = threads;
                shutdown(sched);
                return Err(BindError::Spawn);
            }
        }
    }
    *port.threads.lock() = threads;

    log::debug!("bound {sched:p} to the port");
    Ok(())
}

/// Stop the port's threads and unbind `sched`. Blocks until all actions being
/// run by the port's threads complete.
///
/// Must not be called by a task's action.
pub fn shutdown(sched: &Scheduler<StdPort>) {
    let port = sched.port();

    log::trace!("stopping the interrupt threads");
    port.int.set_shutdown(true);

    // `timer_cmd_recv.recv` will return `Err(_)` when we drop the
    // corresponding sender
    log::trace!("stopping the timer thread");
    *port.timer_cmd_send.lock() = None;

    let threads = mem::take(&mut *port.threads.lock());
    for jh in threads {
        let name = jh.thread().name().map(str::to_owned);
        if jh.join().is_err() {
            log::warn!("{name:?} panicked");
        }
    }

    port.sched.store(None, Ordering::Release);
    log::debug!("the port is shut down");
}
