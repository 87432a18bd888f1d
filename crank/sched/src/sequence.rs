//! Fixed-capacity task FIFOs: the pool and the ordered sequences
//!
//! A sequence is strict FIFO storage for deferred work. Ordered sequences
//! (index 1 and up) lock themselves when a task is taken, so at most one
//! task per sequence is in flight until downstream code unlocks it —
//! later tasks in a sequence encode dependent multi-step operations. The
//! pool (index 0) is unordered background work and never locks.

use crank_core::config::{NUM_ORDERED_SEQUENCES, SEQUENCE_DEPTH};
use crank_core::fault::{die, Fault};
use crank_core::{Error, Result, SeqId, Task};
use heapless::Deque;

/// Gate state of an ordered sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqState {
    /// The head task may be taken
    Unlocked,
    /// Yields nothing until explicitly unlocked
    Locked,
}

#[cfg(feature = "defmt")]
impl defmt::Format for SeqState {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            SeqState::Unlocked => defmt::write!(fmt, "Unlocked"),
            SeqState::Locked => defmt::write!(fmt, "Locked"),
        }
    }
}

/// One fixed-capacity FIFO of tasks
pub struct Sequence<const N: usize> {
    fifo: Deque<Task, N>,
    state: SeqState,
    lockable: bool,
}

impl<const N: usize> Sequence<N> {
    /// Create the unordered pool variant (never locks)
    pub const fn pool() -> Self {
        Self {
            fifo: Deque::new(),
            state: SeqState::Unlocked,
            lockable: false,
        }
    }

    /// Create an ordered, lockable sequence
    pub const fn ordered() -> Self {
        Self {
            fifo: Deque::new(),
            state: SeqState::Unlocked,
            lockable: true,
        }
    }

    /// Append a task; full FIFOs fail without touching state
    pub fn add(&mut self, task: Task) -> Result<()> {
        self.fifo.push_back(task).map_err(|_| Error::SequenceFull)
    }

    /// Pop the head task
    ///
    /// A locked sequence yields nothing. Taking from an ordered sequence
    /// locks it as a side effect.
    pub fn take(&mut self) -> Option<Task> {
        if self.state == SeqState::Locked {
            return None;
        }
        let task = self.fifo.pop_front()?;
        if self.lockable {
            self.state = SeqState::Locked;
        }
        Some(task)
    }

    /// Put a task back at the head (reprogram support)
    ///
    /// Re-opens an ordered sequence so the retry is reachable.
    pub fn put_back(&mut self, task: Task) -> Result<()> {
        self.fifo.push_front(task).map_err(|_| Error::SequenceFull)?;
        self.state = SeqState::Unlocked;
        Ok(())
    }

    /// Re-open the sequence
    pub fn unlock(&mut self) {
        self.state = SeqState::Unlocked;
    }

    /// Drop all queued tasks and unlock
    pub fn clear(&mut self) {
        self.fifo.clear();
        self.state = SeqState::Unlocked;
    }

    /// Whether a task can be taken right now
    pub fn has_ready(&self) -> bool {
        self.state == SeqState::Unlocked && !self.fifo.is_empty()
    }

    /// Number of queued tasks
    pub fn len(&self) -> usize {
        self.fifo.len()
    }

    /// Whether the FIFO is empty
    pub fn is_empty(&self) -> bool {
        self.fifo.is_empty()
    }

    /// Free slots remaining
    pub fn spaces(&self) -> usize {
        N - self.fifo.len()
    }

    /// Total capacity
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Current gate state
    pub fn state(&self) -> SeqState {
        self.state
    }
}

/// The pool plus all ordered sequences, with the scan policy
pub struct SequenceSet {
    pool: Sequence<SEQUENCE_DEPTH>,
    ordered: [Sequence<SEQUENCE_DEPTH>; NUM_ORDERED_SEQUENCES],
}

impl SequenceSet {
    /// Create the full set, everything empty and unlocked
    pub const fn new() -> Self {
        const ORDERED: Sequence<SEQUENCE_DEPTH> = Sequence::ordered();
        Self {
            pool: Sequence::pool(),
            ordered: [ORDERED; NUM_ORDERED_SEQUENCES],
        }
    }

    fn get(&self, id: SeqId) -> Option<&Sequence<SEQUENCE_DEPTH>> {
        if id.is_pool() {
            Some(&self.pool)
        } else {
            self.ordered.get(id.index() - 1)
        }
    }

    fn get_mut(&mut self, id: SeqId) -> Option<&mut Sequence<SEQUENCE_DEPTH>> {
        if id.is_pool() {
            Some(&mut self.pool)
        } else {
            self.ordered.get_mut(id.index() - 1)
        }
    }

    /// Append a task to the named sequence
    pub fn add(&mut self, id: SeqId, task: Task) -> Result<()> {
        self.get_mut(id).ok_or(Error::BadSequence)?.add(task)
    }

    /// Free slots in the named sequence
    pub fn spaces(&self, id: SeqId) -> Result<usize> {
        Ok(self.get(id).ok_or(Error::BadSequence)?.spaces())
    }

    /// Whether the named sequence would yield a task right now
    pub fn has_ready(&self, id: SeqId) -> bool {
        self.get(id).is_some_and(|seq| seq.has_ready())
    }

    /// Pop the head task of the named sequence (locking it if ordered)
    pub fn take(&mut self, id: SeqId) -> Option<Task> {
        self.get_mut(id)?.take()
    }

    /// Put a task back at the head of its home sequence
    pub fn put_back(&mut self, id: SeqId, task: Task) -> Result<()> {
        self.get_mut(id).ok_or(Error::BadSequence)?.put_back(task)
    }

    /// Re-open an ordered sequence
    ///
    /// The pool is never lockable; unlocking it (or a sequence that does
    /// not exist) is a usage fault.
    pub fn unlock(&mut self, id: SeqId) {
        if id.is_pool() {
            die(Fault::BadUnlock);
        }
        match self.get_mut(id) {
            Some(seq) => seq.unlock(),
            None => die(Fault::BadUnlock),
        }
    }

    /// Scan policy: ordered sequences in increasing index order first,
    /// the pool only when no ordered sequence is ready
    pub fn take_next(&mut self) -> Option<(SeqId, Task)> {
        for (i, seq) in self.ordered.iter_mut().enumerate() {
            if let Some(task) = seq.take() {
                return Some((SeqId::new(i as u8 + 1), task));
            }
        }
        self.pool.take().map(|task| (SeqId::POOL, task))
    }

    /// Emergency-stop support: empty and unlock every sequence
    pub fn clear_all(&mut self) {
        self.pool.clear();
        for seq in self.ordered.iter_mut() {
            seq.clear();
        }
    }
}

impl Default for SequenceSet {
    fn default() -> Self {
        Self::new()
    }
}
