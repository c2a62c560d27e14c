//! The task table
use arrayvec::ArrayVec;
use core::fmt;

use super::{TaskCb, TaskId};
use crate::{error::InsertTaskError, MAX_TASKS};

/// Fixed-capacity task storage, ordered by priority (descending) and then by
/// period (ascending). Tasks with identical keys keep their insertion order.
///
/// The order lets the tick handler honor priorities with a single linear
/// scan.
pub(crate) struct TaskTable {
    tasks: ArrayVec<TaskCb, MAX_TASKS>,
}

impl TaskTable {
    pub(crate) const fn new() -> Self {
        Self {
            tasks: ArrayVec::new_const(),
        }
    }

    /// Insert a task at the position that maintains the table order. Return
    /// the index of the inserted task.
    ///
    /// Tasks at or after the returned index are shifted by one. The table is
    /// left unchanged on failure.
    pub(crate) fn insert(&mut self, cb: TaskCb) -> Result<usize, InsertTaskError> {
        let i = self
            .tasks
            .iter()
            .position(|e| {
                e.priority < cb.priority || (e.priority == cb.priority && e.period > cb.period)
            })
            .unwrap_or(self.tasks.len());

        self.tasks
            .try_insert(i, cb)
            .map_err(|_| InsertTaskError::Full)?;

        Ok(i)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    #[inline]
    pub(crate) fn get(&self, i: usize) -> Option<&TaskCb> {
        self.tasks.get(i)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, i: usize) -> Option<&mut TaskCb> {
        self.tasks.get_mut(i)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &TaskCb> + '_ {
        self.tasks.iter()
    }

    /// Find the current index of the task identified by `id`.
    pub(crate) fn position(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|cb| cb.id == id)
    }

    pub(crate) fn clear(&mut self) {
        self.tasks.clear();
    }

    /// Advance every task's countdown by one tick, in table order.
    pub(crate) fn tick_all(&mut self) {
        for cb in self.tasks.iter_mut() {
            cb.tick();
        }
    }
}

impl fmt::Debug for TaskTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list()
            .entries(self.iter().map(TaskCb::info))
            .finish()
    }
}
