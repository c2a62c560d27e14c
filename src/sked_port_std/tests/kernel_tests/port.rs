//! Behavior of the port itself.
use sked_kernel::{ClockSource, InitError, Mode, Port, Scheduler};
use sked_port_std::{BindError, StdPort};
use std::{thread, time::Duration};

use super::{new_sched, run_with_timeout};

#[test]
fn bind_twice() {
    run_with_timeout("bind_twice", || {
        let sched = new_sched();
        assert_eq!(sked_port_std::bind(sched), Err(BindError::AlreadyBound));

        sked_port_std::shutdown(sched);
        // Can be bound again after a shutdown
        sked_port_std::bind(sched).unwrap();
        sked_port_std::shutdown(sched);
    });
}

#[test]
fn only_timer1_is_provided() {
    run_with_timeout("only_timer1_is_provided", || {
        let sched = new_sched();
        assert_eq!(
            sched.init(Mode::Preemptive, ClockSource::Timer0),
            Err(InitError::NotImplemented)
        );
        assert_eq!(
            sched.init(Mode::Preemptive, ClockSource::Timer2),
            Err(InitError::NotImplemented)
        );
        sched.init(Mode::Preemptive, ClockSource::Timer1).unwrap();
        assert_eq!(sched.period_bounds(), (100, 6_553_500));
        sked_port_std::shutdown(sched);
    });
}

#[test]
fn no_ticks_before_start() {
    run_with_timeout("no_ticks_before_start", || {
        let sched = new_sched();
        sched.init(Mode::Preemptive, ClockSource::Timer1).unwrap();

        // Ticks pended by hand stay pending while the tick is disabled
        sched.port().pend_tick();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(sched.port().tick_count(), 0);

        sched.start().unwrap();
        thread::sleep(Duration::from_millis(20));
        assert!(sched.port().tick_count() > 0);

        sked_port_std::shutdown(sched);
    });
}

#[test]
fn micros_is_monotonic() {
    run_with_timeout("micros_is_monotonic", || {
        let sched: &'static Scheduler<StdPort> =
            Box::leak(Box::new(Scheduler::new(StdPort::new())));
        let t0 = sched.port().micros();
        thread::sleep(Duration::from_millis(10));
        let t1 = sched.port().micros();
        assert!(t1 >= t0 + 10_000, "{t0} -> {t1}");
    });
}
