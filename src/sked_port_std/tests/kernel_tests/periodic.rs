//! Periodic activation in real time.
use sked_kernel::{ClockSource, Mode, Stagger, PRIORITY_IDLE};
use std::{
    sync::atomic::{AtomicU32, Ordering},
    thread,
    time::Duration,
};

use super::{new_sched, run_with_timeout};

#[test]
fn tasks_run_at_their_rates() {
    run_with_timeout("tasks_run_at_their_rates", || {
        let sched = new_sched();
        let fast: &'static AtomicU32 = Box::leak(Box::new(AtomicU32::new(0)));
        let slow: &'static AtomicU32 = Box::leak(Box::new(AtomicU32::new(0)));

        sched.init(Mode::Preemptive, ClockSource::Timer1).unwrap();
        sched
            .schedule(
                2_000,
                Stagger::Offset(0),
                2,
                Some(Box::leak(Box::new(move || {
                    fast.fetch_add(1, Ordering::Relaxed);
                }))),
            )
            .unwrap();
        sched
            .schedule(
                20_000,
                Stagger::Offset(10_000),
                1,
                Some(Box::leak(Box::new(move || {
                    slow.fetch_add(1, Ordering::Relaxed);
                }))),
            )
            .unwrap();

        sched.start().unwrap();
        thread::sleep(Duration::from_millis(200));
        sched.reset();

        let ticks = sched.port().tick_count();
        let fast = fast.load(Ordering::Relaxed);
        let slow = slow.load(Ordering::Relaxed);
        log::debug!("ticks = {ticks}, fast = {fast}, slow = {slow}");

        // Ideally 2000 ticks, 100 and 10 runs
        assert!((800..=2100).contains(&ticks), "ticks = {ticks}");
        assert!((40..=105).contains(&fast), "fast = {fast}");
        assert!((4..=11).contains(&slow), "slow = {slow}");
        assert!(fast > slow * 5);

        // No more ticks are delivered after a reset
        thread::sleep(Duration::from_millis(20));
        let ticks = sched.port().tick_count();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(sched.port().tick_count(), ticks);

        assert_eq!(sched.task_count(), 0);
        assert_eq!(sched.running_priority(), PRIORITY_IDLE);
        sked_port_std::shutdown(sched);
    });
}

#[test]
fn restart_after_reset() {
    run_with_timeout("restart_after_reset", || {
        let sched = new_sched();
        let count: &'static AtomicU32 = Box::leak(Box::new(AtomicU32::new(0)));
        let task = move || {
            count.fetch_add(1, Ordering::Relaxed);
        };
        let task: &'static (dyn Fn() + Sync) = Box::leak(Box::new(task));

        for _ in 0..2 {
            count.store(0, Ordering::Relaxed);
            sched.init(Mode::Preemptive, ClockSource::Timer1).unwrap();
            sched
                .schedule(1_000, Stagger::Offset(0), 0, Some(task))
                .unwrap();
            sched.start().unwrap();
            thread::sleep(Duration::from_millis(50));
            sched.reset();
            thread::sleep(Duration::from_millis(5));

            let count = count.load(Ordering::Relaxed);
            assert!((10..=55).contains(&count), "count = {count}");
        }

        sked_port_std::shutdown(sched);
    });
}
