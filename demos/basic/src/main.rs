#![deny(unsafe_op_in_unsafe_fn)]
use sked_kernel::{ClockSource, Mode, Port, Scheduler, Stagger};
use sked_port_std::StdPort;
use std::{
    sync::atomic::{AtomicBool, AtomicU32, Ordering},
    thread,
    time::Duration,
};

static SCHED: Scheduler<StdPort> = Scheduler::new(StdPort::new());

static LED: AtomicBool = AtomicBool::new(false);
static HEARTBEATS: AtomicU32 = AtomicU32::new(0);

/// Toggles a simulated LED twice a second.
fn blink() {
    let on = !LED.fetch_xor(true, Ordering::Relaxed);
    log::info!(
        "[{:>8} us] led {}",
        SCHED.port().micros(),
        if on { "on" } else { "off" }
    );
}

fn heartbeat() {
    let n = HEARTBEATS.fetch_add(1, Ordering::Relaxed) + 1;
    log::debug!("[{:>8} us] heartbeat #{n}", SCHED.port().micros());
}

fn main() {
    env_logger::init();

    sked_port_std::bind(&SCHED).unwrap();
    SCHED.init(Mode::Preemptive, ClockSource::Timer1).unwrap();

    SCHED
        .define_task()
        .start(&blink)
        .period_micros(500_000)
        .priority(1)
        .finish()
        .unwrap();

    SCHED
        .schedule(100_000, Stagger::Offset(50_000), 2, Some(&heartbeat))
        .unwrap();

    log::trace!("SCHED = {:#?}", SCHED);

    SCHED.start().unwrap();
    thread::sleep(Duration::from_secs(1));

    println!("{:#?}", SCHED);
    println!(
        "heartbeats = {}, ticks = {}",
        HEARTBEATS.load(Ordering::Relaxed),
        SCHED.port().tick_count()
    );

    SCHED.reset();
    sked_port_std::shutdown(&SCHED);
}
