//! Ready tasks are run by a main loop.
use sked_kernel::{ClockSource, Mode, RunReadyError, Stagger};
use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use super::{new_sched, run_with_timeout};

#[test]
fn main_loop_runs_ready_tasks() {
    run_with_timeout("main_loop_runs_ready_tasks", || {
        let sched = new_sched();
        let count: &'static AtomicU32 = Box::leak(Box::new(AtomicU32::new(0)));
        let runner: &'static Mutex<Vec<String>> = Box::leak(Box::new(Mutex::new(Vec::new())));

        sched.init(Mode::NonPreemptive, ClockSource::Timer1).unwrap();
        sched
            .schedule(
                2_000,
                Stagger::Phase(1_000),
                1,
                Some(Box::leak(Box::new(move || {
                    count.fetch_add(1, Ordering::Relaxed);
                    let name = thread::current().name().unwrap_or("?").to_owned();
                    let mut runner = runner.lock().unwrap();
                    if !runner.contains(&name) {
                        runner.push(name);
                    }
                }))),
            )
            .unwrap();
        sched.start().unwrap();

        let start = Instant::now();
        while start.elapsed() < Duration::from_millis(200) {
            sched.run_ready().unwrap();
            thread::sleep(Duration::from_micros(200));
        }
        sked_port_std::shutdown(sched);

        // Ideally 100 runs
        let count = count.load(Ordering::Relaxed);
        log::debug!("count = {count}");
        assert!((40..=110).contains(&count), "count = {count}");

        // Only the main loop runs tasks
        assert_eq!(*runner.lock().unwrap(), ["main_loop_runs_ready_tasks"]);
    });
}

#[test]
fn tick_does_not_run_tasks() {
    run_with_timeout("tick_does_not_run_tasks", || {
        let sched = new_sched();
        let count: &'static AtomicU32 = Box::leak(Box::new(AtomicU32::new(0)));

        sched.init(Mode::NonPreemptive, ClockSource::Timer1).unwrap();
        sched
            .define_task()
            .start(Box::leak(Box::new(move || {
                count.fetch_add(1, Ordering::Relaxed);
            })))
            .period_micros(1_000)
            .finish()
            .unwrap();
        sched.start().unwrap();

        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::Relaxed), 0);
        let info = sched.task_info(0).unwrap();
        assert!(info.misses > 0, "{info:?}");

        sched.run_ready().unwrap();
        assert_eq!(count.load(Ordering::Relaxed), 1);

        sked_port_std::shutdown(sched);
    });
}

#[test]
fn run_ready_is_rejected_in_preemptive_mode() {
    run_with_timeout("run_ready_is_rejected_in_preemptive_mode", || {
        let sched = new_sched();
        assert_eq!(sched.run_ready(), Err(RunReadyError::NotInitialized));
        sched.init(Mode::Preemptive, ClockSource::Timer1).unwrap();
        assert_eq!(sched.run_ready(), Err(RunReadyError::WrongMode));
        sked_port_std::shutdown(sched);
    });
}
