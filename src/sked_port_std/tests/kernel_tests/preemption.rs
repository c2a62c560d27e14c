//! A long task is preempted by a short-period task.
use sked_kernel::{ClockSource, Mode, Port, Stagger, TaskFn, TaskSt, PRIORITY_IDLE};
use std::{sync::Mutex, thread, time::Duration};

use super::{busy_wait, new_sched, run_with_timeout};

#[derive(Default)]
struct Trace {
    /// When the long task started and completed
    a: Vec<(u64, u64)>,
    /// When the short task ran
    b: Vec<u64>,
}

#[test]
fn long_task_is_preempted() {
    run_with_timeout("long_task_is_preempted", || {
        let sched = new_sched();
        let trace: &'static Mutex<Trace> = Box::leak(Box::new(Mutex::new(Trace::default())));

        sched.init(Mode::Preemptive, ClockSource::Timer1).unwrap();

        // Activated on the first tick, then busy for 100 ms
        sched
            .define_task()
            .start(Box::leak(Box::new(move || {
                let start = sched.port().micros();
                busy_wait(Duration::from_millis(100));
                let end = sched.port().micros();
                trace.lock().unwrap().a.push((start, end));
            })))
            .period_micros(1_000_000)
            .priority(0)
            .finish()
            .unwrap();

        // Activated every 5 ms, starting after the long task
        sched
            .define_task()
            .start(Box::leak(Box::new(move || {
                let now = sched.port().micros();
                trace.lock().unwrap().b.push(now);
            })))
            .period_micros(5_000)
            .offset_micros(1_000)
            .priority(127)
            .finish()
            .unwrap();

        sched.start().unwrap();
        thread::sleep(Duration::from_millis(150));
        sked_port_std::shutdown(sched);

        let trace = trace.lock().unwrap();
        log::debug!("a = {:?}, b = {:?}", trace.a, trace.b);

        assert_eq!(trace.a.len(), 1, "{:?}", trace.a);
        let (a_start, a_end) = trace.a[0];
        let b_first = *trace.b.first().expect("the short task never ran");
        assert!(b_first > a_start, "{b_first} <= {a_start}");

        // Ideally 20 runs
        let during_a = trace
            .b
            .iter()
            .filter(|&&t| (a_start..=a_end).contains(&t))
            .count();
        assert!((8..=25).contains(&during_a), "during_a = {during_a}");

        log::debug!("{sched:?}");
        let high = sched.task_info(0).unwrap();
        assert_eq!(high.priority, 127);
        let low = sched.task_info(1).unwrap();
        assert_eq!(low.st, TaskSt::Idle);
        assert_eq!(low.overruns, 0);
    });
}

#[test]
fn lower_priority_is_not_preempting() {
    run_with_timeout("lower_priority_is_not_preempting", || {
        let sched = new_sched();
        let trace: &'static Mutex<Trace> = Box::leak(Box::new(Mutex::new(Trace::default())));

        sched.init(Mode::Preemptive, ClockSource::Timer1).unwrap();

        sched
            .schedule(
                1_000_000,
                Stagger::Offset(0),
                127,
                Some(Box::leak(Box::new(move || {
                    let start = sched.port().micros();
                    busy_wait(Duration::from_millis(50));
                    let end = sched.port().micros();
                    trace.lock().unwrap().a.push((start, end));
                }))),
            )
            .unwrap();

        sched
            .schedule(
                5_000,
                Stagger::Offset(0),
                0,
                Some(Box::leak(Box::new(move || {
                    let now = sched.port().micros();
                    trace.lock().unwrap().b.push(now);
                }))),
            )
            .unwrap();

        sched.start().unwrap();
        thread::sleep(Duration::from_millis(80));
        sked_port_std::shutdown(sched);

        let trace = trace.lock().unwrap();
        assert_eq!(trace.a.len(), 1);
        let (a_start, a_end) = trace.a[0];
        assert!(!trace.b.is_empty());
        // The short task never runs inside the long task's window
        assert!(
            trace.b.iter().all(|&t| t < a_start || t >= a_end),
            "a = {:?}, b = {:?}",
            trace.a,
            trace.b
        );
        // ...so its activations during the window are missed
        assert!(sched.task_info(1).unwrap().misses >= 5);
    });
}

#[test]
fn preempted_task_resumes_after_preempting_task() {
    run_with_timeout("preempted_task_resumes_after_preempting_task", || {
        let sched = new_sched();
        let windows: &'static Mutex<Vec<(&'static str, u64, u64)>> =
            Box::leak(Box::new(Mutex::new(Vec::new())));

        let busy_task = move |name: &'static str, duration: Duration| -> TaskFn {
            Box::leak(Box::new(move || {
                let start = sched.port().micros();
                busy_wait(duration);
                let end = sched.port().micros();
                windows.lock().unwrap().push((name, start, end));
            }))
        };

        sched.init(Mode::Preemptive, ClockSource::Timer1).unwrap();

        // `low` finishes its work while `high` is still running
        sched
            .schedule(
                1_000_000,
                Stagger::Offset(0),
                0,
                Some(busy_task("low", Duration::from_millis(30))),
            )
            .unwrap();
        sched
            .schedule(
                1_000_000,
                Stagger::Offset(10_000),
                127,
                Some(busy_task("high", Duration::from_millis(60))),
            )
            .unwrap();
        // Becomes ready while `high` is running
        sched
            .schedule(
                1_000_000,
                Stagger::Offset(45_000),
                50,
                Some(busy_task("middle", Duration::ZERO)),
            )
            .unwrap();

        sched.start().unwrap();
        thread::sleep(Duration::from_millis(150));
        sked_port_std::shutdown(sched);

        let windows = windows.lock().unwrap();
        log::debug!("windows = {windows:?}");
        let find = |name: &str| {
            let found: Vec<_> = windows.iter().filter(|w| w.0 == name).collect();
            assert_eq!(found.len(), 1, "{name}: {windows:?}");
            (found[0].1, found[0].2)
        };
        let (low_start, _) = find("low");
        let (high_start, high_end) = find("high");
        let (middle_start, _) = find("middle");

        assert!(high_start > low_start, "{windows:?}");
        // `middle` must wait until `high` completes even though `low` has
        // already returned
        assert!(middle_start >= high_end, "{windows:?}");

        for i in 0..3 {
            assert_eq!(sched.task_info(i).unwrap().st, TaskSt::Idle);
        }
        assert_eq!(sched.running_priority(), PRIORITY_IDLE);
    });
}
