use sked_kernel::Scheduler;
use sked_port_std::StdPort;
use std::{
    sync::mpsc,
    thread,
    time::{Duration, Instant},
};

mod non_preemptive;
mod periodic;
mod port;
mod preemption;

/// The time limit of a single test case.
const TIMEOUT: Duration = Duration::from_secs(30);

/// Create a scheduler with its own port and bind it.
fn new_sched() -> &'static Scheduler<StdPort> {
    let _ = env_logger::builder().is_test(true).try_init();
    let sched = Box::leak(Box::new(Scheduler::new(StdPort::new())));
    sked_port_std::bind(sched).unwrap();
    sched
}

/// Run `f` on a new thread and fail if it doesn't complete within
/// [`TIMEOUT`]. A panic in `f` is propagated.
fn run_with_timeout(name: &str, f: impl FnOnce() + Send + 'static) {
    let (send, recv) = mpsc::channel();
    let jh = thread::Builder::new()
        .name(name.to_owned())
        .spawn(move || {
            f();
            let _ = send.send(());
        })
        .unwrap();

    match recv.recv_timeout(TIMEOUT) {
        Ok(()) => jh.join().unwrap(),
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            // `f` panicked
            if let Err(e) = jh.join() {
                std::panic::resume_unwind(e);
            }
        }
        Err(mpsc::RecvTimeoutError::Timeout) => panic!("{name} timed out"),
    }
}

/// Keep the current thread busy for `duration` without sleeping, like a task
/// doing real work would.
fn busy_wait(duration: Duration) {
    let start = Instant::now();
    while start.elapsed() < duration {
        std::hint::spin_loop();
    }
}
