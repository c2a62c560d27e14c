//! Result codes and error types
use core::fmt;

/// All result codes (including success) that the scheduler can report.
///
/// The numeric values are stable and can be handed to C code or printed over a
/// serial line as-is.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(i8)]
pub enum ResultCode {
    /// The operation was successful.
    Success = 0,
    /// The scheduler hasn't been initialized by [`Scheduler::init`] yet.
    ///
    /// [`Scheduler::init`]: crate::Scheduler::init
    NotInitialized = -1,
    /// The task table is full.
    TooManyTasks = -2,
    /// The period is zero or lies outside the range supported by the tick
    /// source.
    InvalidPeriod = -3,
    /// No task entry point was supplied.
    InvalidFunction = -4,
    /// The offset is longer than the maximum period or is shorter than one
    /// tick without being zero.
    InvalidOffset = -5,
    /// The priority is not greater than [`PRIORITY_IDLE`].
    ///
    /// [`PRIORITY_IDLE`]: crate::PRIORITY_IDLE
    InvalidPriority = -6,
    /// The operation is not available in the current scheduling mode.
    WrongMode = -7,
    /// The phase is longer than the task's own period.
    InvalidPhase = -8,
    /// The requested tick source is not provided by the port.
    NotImplemented = -99,
}

impl ResultCode {
    /// Get the short name of the result code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::NotInitialized => "NotInitialized",
            Self::TooManyTasks => "TooManyTasks",
            Self::InvalidPeriod => "InvalidPeriod",
            Self::InvalidFunction => "InvalidFunction",
            Self::InvalidOffset => "InvalidOffset",
            Self::InvalidPriority => "InvalidPriority",
            Self::WrongMode => "WrongMode",
            Self::InvalidPhase => "InvalidPhase",
            Self::NotImplemented => "NotImplemented",
        }
    }
}

impl fmt::Debug for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ResultCode {
    /// Get a flag indicating whether the code represents a failure.
    ///
    /// Failure codes have negative values.
    #[inline]
    pub fn is_err(self) -> bool {
        (self as i8) < 0
    }

    /// Get a flag indicating whether the code represents a success.
    ///
    /// Success codes have non-negative values.
    #[inline]
    pub fn is_ok(self) -> bool {
        !self.is_err()
    }
}

macro_rules! define_error {
    (
        mod $mod_name:ident {}
        $( #[$meta:meta] )*
        $vis:vis enum $name:ident {
            $(
                $( #[$vmeta:meta] )*
                $vname:ident
            ),* $(,)*
        }
    ) => {
        $( #[$meta] )*
        ///
        /// See [`ResultCode`] for all result codes and generic descriptions.
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(i8)]
        $vis enum $name {
            $(
                $( #[$vmeta] )*
                $vname = ResultCode::$vname as i8
            ),*
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                fmt::Debug::fmt(&ResultCode::from(*self), f)
            }
        }

        impl From<$name> for ResultCode {
            #[inline]
            fn from(x: $name) -> Self {
                match x {
                    $( $name::$vname => Self::$vname, )*
                }
            }
        }

        impl From<Result<(), $name>> for ResultCode {
            #[inline]
            fn from(x: Result<(), $name>) -> Self {
                match x {
                    Ok(()) => Self::Success,
                    Err(e) => Self::from(e),
                }
            }
        }

        #[cfg(test)]
        mod $mod_name {
            use super::*;

            #[test]
            fn to_result_code() {
                $(
                    assert_eq!(
                        ResultCode::$vname,
                        ResultCode::from($name::$vname),
                    );
                    assert_eq!(ResultCode::$vname as i8, $name::$vname as i8);
                )*
            }

            #[test]
            fn result_to_result_code() {
                $(
                    assert_eq!(
                        ResultCode::$vname,
                        ResultCode::from(Err($name::$vname)),
                    );
                )*
                assert_eq!(
                    ResultCode::Success,
                    ResultCode::from(Result::<(), $name>::Ok(())),
                );
            }
        }
    };
}

define_error! {
    mod init_error {}
    /// Error type for [`Scheduler::init`].
    ///
    /// [`Scheduler::init`]: crate::Scheduler::init
    pub enum InitError {
        /// The port doesn't provide the requested tick source.
        NotImplemented,
    }
}

define_error! {
    mod schedule_error {}
    /// Error type for [`Scheduler::schedule`].
    ///
    /// A rejected call leaves the task table unchanged.
    ///
    /// [`Scheduler::schedule`]: crate::Scheduler::schedule
    pub enum ScheduleError {
        /// The scheduler isn't initialized.
        NotInitialized,
        /// The task table already holds [`MAX_TASKS`] tasks.
        ///
        /// [`MAX_TASKS`]: crate::MAX_TASKS
        TooManyTasks,
        /// The period is out of range.
        InvalidPeriod,
        /// The offset is out of range.
        InvalidOffset,
        /// The phase is longer than the period.
        InvalidPhase,
        /// The priority is reserved.
        InvalidPriority,
        /// The entry point is missing.
        InvalidFunction,
    }
}

define_error! {
    mod start_error {}
    /// Error type for [`Scheduler::start`].
    ///
    /// [`Scheduler::start`]: crate::Scheduler::start
    pub enum StartError {
        /// The scheduler isn't initialized.
        NotInitialized,
    }
}

define_error! {
    mod run_ready_error {}
    /// Error type for [`Scheduler::run_ready`].
    ///
    /// [`Scheduler::run_ready`]: crate::Scheduler::run_ready
    pub enum RunReadyError {
        /// The scheduler isn't initialized.
        NotInitialized,
        /// The scheduler is in [`Mode::Preemptive`], where ready tasks are run
        /// by the tick handler instead.
        ///
        /// [`Mode::Preemptive`]: crate::Mode::Preemptive
        WrongMode,
    }
}

/// Error type for the insertion into a task table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertTaskError {
    /// The table is at capacity.
    Full,
}

impl From<InsertTaskError> for ScheduleError {
    #[inline]
    fn from(x: InsertTaskError) -> Self {
        match x {
            InsertTaskError::Full => Self::TooManyTasks,
        }
    }
}
