use crate::{
    MAX_TICK_ROUNDS,
    value::{Callable, Value},
};
use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
};
use thiserror::Error as ThisError;

///
/// SchedulerError
///

#[derive(Debug, ThisError)]
pub enum SchedulerError {
    #[error("pending callbacks did not settle within {rounds} tick rounds")]
    TickOverflow { rounds: usize },
}

///
/// Scheduler
///
/// Shim over the host's deferred-callback primitive. In normal operation a
/// deferred task runs immediately; with the manual flag enabled (test-time
/// determinism), tasks queue until [`Scheduler::tick`] drains them.
///
/// Cheap to clone; all clones share one queue, so the root registry and its
/// derived children see the same pending work.
///

#[derive(Clone, Default)]
pub struct Scheduler(Rc<SchedulerInner>);

#[derive(Default)]
struct SchedulerInner {
    queue: RefCell<VecDeque<(Callable, Vec<Value>)>>,
    manual: Cell<bool>,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle manual draining. Intended for tests that need deterministic
    /// control over deferred work.
    pub fn set_manual(&self, enabled: bool) {
        self.0.manual.set(enabled);
    }

    #[must_use]
    pub fn is_manual(&self) -> bool {
        self.0.manual.get()
    }

    /// Defer a task. Runs immediately unless manual draining is enabled.
    pub fn defer(&self, task: Callable, args: Vec<Value>) {
        if self.0.manual.get() {
            self.0.queue.borrow_mut().push_back((task, args));
        } else {
            task.call(&args);
        }
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.0.queue.borrow().len()
    }

    /// Drain pending callbacks to a fixed point.
    ///
    /// Each round takes the whole queue and executes it in enqueue order;
    /// callbacks enqueued during a round run in the next round of the same
    /// tick. A queue that keeps refilling past [`MAX_TICK_ROUNDS`] rounds
    /// fails with [`SchedulerError::TickOverflow`].
    pub fn tick(&self) -> Result<usize, SchedulerError> {
        let mut executed = 0;

        for _ in 0..MAX_TICK_ROUNDS {
            let batch: Vec<(Callable, Vec<Value>)> =
                self.0.queue.borrow_mut().drain(..).collect();
            if batch.is_empty() {
                return Ok(executed);
            }

            for (task, args) in batch {
                task.call(&args);
                executed += 1;
            }
        }

        if self.0.queue.borrow().is_empty() {
            Ok(executed)
        } else {
            Err(SchedulerError::TickOverflow {
                rounds: MAX_TICK_ROUNDS,
            })
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("manual", &self.is_manual())
            .field("pending", &self.pending())
            .finish()
    }
}
