//! The tick generator thread
use std::{
    sync::mpsc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crate::int::IntCtrl;

#[derive(Debug)]
pub(crate) enum TimerCmd {
    /// Set the tick period and stop generating ticks.
    Configure { period: Duration },
    /// Start generating ticks, the first one a period from now.
    Enable,
    /// Stop generating ticks.
    Disable,
}

/// Start a timer thread that pends ticks in `int`. The thread exits when the
/// returned sender is dropped.
pub(crate) fn spawn(
    int: &'static IntCtrl,
    period: Duration,
) -> std::io::Result<(mpsc::Sender<TimerCmd>, JoinHandle<()>)> {
    let (timer_cmd_send, timer_cmd_recv) = mpsc::channel();
    log::trace!("starting the timer thread");

    let join_handle = thread::Builder::new()
        .name("sked-timer".to_owned())
        .spawn(move || {
            let mut period = period;
            let mut next_deadline: Option<Instant> = None;
            loop {
                let recv_result = if let Some(next_deadline) = next_deadline {
                    timer_cmd_recv
                        .recv_timeout(next_deadline.saturating_duration_since(Instant::now()))
                } else {
                    timer_cmd_recv
                        .recv()
                        .map_err(|_| mpsc::RecvTimeoutError::Disconnected)
                };
                match recv_result {
                    Err(mpsc::RecvTimeoutError::Disconnected) => {
                        break;
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        if let Some(deadline) = &mut next_deadline {
                            let count = advance_deadline(deadline, Instant::now(), period);
                            if count > 0 {
                                int.pend(count);
                            }
                        }
                    }
                    Ok(cmd) => {
                        log::trace!("timer: {cmd:?}");
                        match cmd {
                            TimerCmd::Configure { period: new_period } => {
                                period = new_period;
                                next_deadline = None;
                            }
                            TimerCmd::Enable => next_deadline = Some(Instant::now() + period),
                            TimerCmd::Disable => next_deadline = None,
                        }
                    }
                }
            }
            log::trace!("the timer thread is exiting");
        })?;

    Ok((timer_cmd_send, join_handle))
}

/// Move `deadline` past `now` in steps of `period`. Return the number of
/// steps, i.e., the number of ticks that became due.
///
/// Firing on absolute deadlines keeps the tick rate exact on average even
/// though the thread often wakes up late.
fn advance_deadline(deadline: &mut Instant, now: Instant, period: Duration) -> u32 {
    let mut count = 0u32;
    while *deadline <= now {
        *deadline += period;
        count = count.saturating_add(1);
    }
    count
}
