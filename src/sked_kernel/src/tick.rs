//! Tick source characteristics.
//!
//! A port describes its periodic tick with [`TickOptions`]. The scheduler
//! derives the legal range of task periods from it: a period can't be shorter
//! than one tick, and it can't be longer than what the countdown counter of
//! the underlying hardware timer can hold.
use core::fmt;

/// Identifies a hardware timer that can drive the tick.
///
/// A port implements exactly one of these (see [`Port::CLOCK_SOURCE`]).
/// Passing any other value to [`Scheduler::init`] fails with
/// [`InitError::NotImplemented`].
///
/// [`Port::CLOCK_SOURCE`]: crate::Port::CLOCK_SOURCE
/// [`Scheduler::init`]: crate::Scheduler::init
/// [`InitError::NotImplemented`]: crate::InitError::NotImplemented
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ClockSource {
    Timer0,
    Timer1,
    Timer2,
}

/// The parameters of a periodic tick.
///
/// It can be passed to [`TickCfg::new`] to construct [`TickCfg`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TickOptions {
    /// The tick period measured in microseconds. [`Scheduler::on_tick`]
    /// should be called in this period.
    ///
    /// [`Scheduler::on_tick`]: crate::Scheduler::on_tick
    pub tick_period_micros: u32,
    /// The largest value the hardware countdown counter can hold, e.g.,
    /// `0xffff` for a 16-bit timer.
    pub counter_max: u32,
}

/// Error type for [`TickCfg::new`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CfgError {
    /// The tick period is zero.
    PeriodZero,
    /// The counter can't hold a single tick.
    CounterZero,
    /// The longest task period does not fit in 32 bits when measured in
    /// microseconds.
    MaxPeriodOverflowsU32,
}

impl CfgError {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PeriodZero => "the tick period must not be zero",
            Self::CounterZero => "the counter maximum must not be zero",
            Self::MaxPeriodOverflowsU32 => {
                "the longest task period is too long and \
                does not fit in 32 bits when measured in microseconds"
            }
        }
    }

    pub const fn panic(self) -> ! {
        panic!("{}", self.as_str());
    }
}

impl fmt::Display for CfgError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The precomputed tick parameters.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TickCfg {
    tick_period_micros: u32,
    counter_max: u32,
    max_period_micros: u32,
}

impl TickCfg {
    /// Construct a `TickCfg`.
    pub const fn new(
        TickOptions {
            tick_period_micros,
            counter_max,
        }: TickOptions,
    ) -> Result<TickCfg, CfgError> {
        if tick_period_micros == 0 {
            return Err(CfgError::PeriodZero);
        } else if counter_max == 0 {
            return Err(CfgError::CounterZero);
        }

        let max_period_micros = match tick_period_micros.checked_mul(counter_max) {
            Some(x) => x,
            None => return Err(CfgError::MaxPeriodOverflowsU32),
        };

        Ok(TickCfg {
            tick_period_micros,
            counter_max,
            max_period_micros,
        })
    }

    #[inline]
    pub const fn tick_period_micros(&self) -> u32 {
        self.tick_period_micros
    }

    #[inline]
    pub const fn counter_max(&self) -> u32 {
        self.counter_max
    }

    /// The shortest legal task period. Equal to one tick.
    #[inline]
    pub const fn min_period_micros(&self) -> u32 {
        self.tick_period_micros
    }

    /// The longest legal task period.
    #[inline]
    pub const fn max_period_micros(&self) -> u32 {
        self.max_period_micros
    }

    /// Convert a duration to a tick count, discarding any remainder.
    #[inline]
    pub const fn micros_to_ticks(&self, micros: u32) -> u32 {
        micros / self.tick_period_micros
    }
}
