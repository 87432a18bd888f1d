//! Named rendezvous events
//!
//! An event accumulates task references over time and "fires" on demand:
//! `set_pending` snapshots the task count, then each `get_task` yields
//! one task until the pending count drains to zero and the event goes
//! inert until re-armed.

use crank_core::config::MAX_EVENT_TASKS;
use crank_core::fault::{die, Fault};
use crank_core::{Error, Result, Task};
use heapless::Vec;

/// A named, bounded set of tasks with a firing counter
pub struct Event {
    name: &'static str,
    tasks: Vec<Task, MAX_EVENT_TASKS>,
    limit: usize,
    pending: usize,
    cursor: usize,
}

impl Event {
    /// Create an event with a per-event task limit
    ///
    /// The limit is fixed for the event's lifetime and must fit the hard
    /// bound; violating that at creation is fatal.
    pub fn new(name: &'static str, limit: usize) -> Self {
        if limit == 0 || limit > MAX_EVENT_TASKS {
            die(Fault::EventLimit);
        }
        Self {
            name,
            tasks: Vec::new(),
            limit,
            pending: 0,
            cursor: 0,
        }
    }

    /// Register another task with the event
    ///
    /// A task appended while the event is firing joins the current round:
    /// the pending count grows with the task set. Appended after the
    /// round completes, it waits for the next `set_pending`.
    // NOTE: the join-late increment means an event never reaches
    // pending == 0 if tasks arrive faster than get_task drains them.
    // Kept as observed behavior; flagged for design review in DESIGN.md.
    pub fn append_task(&mut self, task: Task) -> Result<()> {
        if self.tasks.len() >= self.limit {
            return Err(Error::EventFull);
        }
        // Limit <= MAX_EVENT_TASKS, so the push cannot fail.
        let _ = self.tasks.push(task);
        if self.pending > 0 {
            self.pending += 1;
        }
        Ok(())
    }

    /// Arm the event: snapshot the task count into the pending counter
    ///
    /// Returns false (and stays inert) when no tasks are registered.
    pub fn set_pending(&mut self) -> bool {
        if self.tasks.is_empty() {
            return false;
        }
        self.pending = self.tasks.len();
        true
    }

    /// Take the next task of the current firing round
    ///
    /// Calling this on an event that is not firing is a usage fault.
    /// Tasks come out in registration order under a wrapping cursor, so
    /// successive rounds continue where the previous one left off.
    pub fn get_task(&mut self) -> Task {
        if self.pending == 0 {
            die(Fault::EventNotArmed);
        }
        self.pending -= 1;
        let i = self.cursor % self.tasks.len();
        self.cursor = (i + 1) % self.tasks.len();
        self.tasks[i]
    }

    /// Abort the current firing round (emergency-stop recovery)
    pub fn disarm(&mut self) {
        self.pending = 0;
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Tasks remaining in the current firing round
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Number of registered tasks
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Per-event task limit
    pub fn limit(&self) -> usize {
        self.limit
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Event {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "Event{{name: {}, tasks: {}, pending: {}}}",
            self.name,
            self.tasks.len(),
            self.pending
        );
    }
}
