//! Kernel integration tests: rotation, preemption, semaphores, dispatch

use crank_core::{SoftPlatform, TaskArg, TaskOutcome};
use crank_sched::{CtxState, Kernel, SeqId, StackRegion};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

fn entry(_: TaskArg) {}

fn stack(n: usize) -> StackRegion {
    StackRegion::new(0x2000_0000 + n * 0x400, 0x400)
}

fn three_contexts(kernel: &Kernel) -> [crank_core::ContextId; 3] {
    [
        kernel.spawn(entry, TaskArg::NONE, None, stack(0), 4),
        kernel.spawn(entry, TaskArg::NONE, None, stack(1), 4),
        kernel.spawn(entry, TaskArg::NONE, None, stack(2), 4),
    ]
}

#[test]
fn test_round_robin_rotation() {
    let kernel = Kernel::new();
    let [a, b, c] = three_contexts(&kernel);

    // First switch starts from idle.
    let sw = kernel.switch_service().unwrap();
    assert_eq!(sw.from, None);
    assert_eq!(sw.to, a);
    assert_eq!(kernel.context_state(a), Some(CtxState::Active));

    // Preempted contexts go to the tail: a full lap comes back to A.
    let sw = kernel.switch_service().unwrap();
    assert_eq!(sw.from, Some(a));
    assert_eq!(sw.to, b);
    assert_eq!(kernel.context_state(a), Some(CtxState::Pending));

    assert_eq!(kernel.switch_service().unwrap().to, c);
    assert_eq!(kernel.switch_service().unwrap().to, a);
}

#[test]
fn test_switch_with_no_contexts_means_idle() {
    let kernel = Kernel::new();
    assert!(kernel.switch_service().is_none());
    assert_eq!(kernel.current(), None);
}

#[test]
fn test_tick_pends_switch_on_slice_expiry() {
    static PLAT: SoftPlatform = SoftPlatform::new();
    let kernel = Kernel::new();
    kernel.bind_platform(&PLAT);
    kernel.spawn(entry, TaskArg::NONE, None, stack(0), 2);
    kernel.switch_service();

    kernel.tick();
    assert!(!kernel.switch_is_pending());
    assert_eq!(PLAT.switch_requests(), 0);

    kernel.tick(); // slice of 2 expires here
    assert!(kernel.switch_is_pending());
    assert_eq!(PLAT.switch_requests(), 1);
    assert_eq!(kernel.now().raw(), 2);
}

#[test]
fn test_semaphore_blocks_exactly_the_third_context() {
    let kernel = Kernel::new();
    let [a, b, c] = three_contexts(&kernel);
    let sem = kernel.semaphore_create(2);

    kernel.switch_service(); // A active
    kernel.semaphore_p(sem).unwrap();
    kernel.switch_service(); // B active
    kernel.semaphore_p(sem).unwrap();
    kernel.switch_service(); // C active
    kernel.semaphore_p(sem).unwrap(); // exhausted: C blocks

    assert_eq!(kernel.context_state(a), Some(CtxState::Pending));
    assert_eq!(kernel.context_state(b), Some(CtxState::Pending));
    assert_eq!(kernel.context_state(c), Some(CtxState::Stopped));
    assert_eq!(kernel.semaphore_count(sem), 0);

    // C is out of the rotation until V.
    assert_eq!(kernel.switch_service().unwrap().to, a);
    kernel.semaphore_v(sem);
    assert_eq!(kernel.context_state(c), Some(CtxState::Pending));
    // Woke a waiter, did not bank the allocation.
    assert_eq!(kernel.semaphore_count(sem), 0);
}

#[test]
fn test_semaphore_fifo_fairness() {
    let kernel = Kernel::new();
    let [a, b, _] = three_contexts(&kernel);
    let sem = kernel.semaphore_create(0);

    kernel.switch_service(); // A active
    kernel.semaphore_p(sem).unwrap(); // A blocks
    kernel.switch_service(); // B active
    kernel.semaphore_p(sem).unwrap(); // B blocks

    kernel.semaphore_v(sem);
    assert_eq!(kernel.context_state(a), Some(CtxState::Pending));
    assert_eq!(kernel.context_state(b), Some(CtxState::Stopped));
    kernel.semaphore_v(sem);
    assert_eq!(kernel.context_state(b), Some(CtxState::Pending));
}

#[test]
fn test_semaphore_ops_ignored_in_interrupt_context() {
    static PLAT: SoftPlatform = SoftPlatform::new();
    let kernel = Kernel::new();
    kernel.bind_platform(&PLAT);
    let [a, _, _] = three_contexts(&kernel);
    let sem = kernel.semaphore_create(0);
    kernel.switch_service(); // A active

    PLAT.set_in_interrupt(true);
    kernel.semaphore_p(sem).unwrap(); // ignored, A must not block
    assert_eq!(kernel.context_state(a), Some(CtxState::Active));
    kernel.semaphore_v(sem); // ignored, no allocation banked
    PLAT.set_in_interrupt(false);
    assert_eq!(kernel.semaphore_count(sem), 0);
}

static DISPATCH_ORDER: Mutex<Vec<usize>> = Mutex::new(Vec::new());

fn record_dispatch(arg: TaskArg) -> TaskOutcome {
    DISPATCH_ORDER.lock().unwrap().push(arg.raw());
    TaskOutcome::Done
}

#[test]
fn test_dispatch_prefers_ordered_work_over_pool() {
    let kernel = Kernel::new();
    kernel.task_pool_enqueue(record_dispatch, TaskArg::new(100)).unwrap();
    kernel
        .task_enqueue(SeqId::new(2), record_dispatch, TaskArg::new(2))
        .unwrap();

    assert!(kernel.dispatch_once());
    assert!(kernel.dispatch_once());
    assert!(!kernel.dispatch_once());

    let order = DISPATCH_ORDER.lock().unwrap().clone();
    assert_eq!(order, vec![2, 100]);
}

#[test]
fn test_ordered_sequence_stays_locked_across_dispatch() {
    let kernel = Kernel::new();
    let seq = SeqId::new(1);
    kernel.task_enqueue(seq, |_| TaskOutcome::Done, TaskArg::NONE).unwrap();
    kernel.task_enqueue(seq, |_| TaskOutcome::Done, TaskArg::NONE).unwrap();

    assert!(kernel.dispatch_once()); // locks the sequence
    assert!(!kernel.sequence_ready(seq));
    assert!(!kernel.dispatch_once()); // second task is gated

    kernel.sequence_unlock(seq);
    assert!(kernel.sequence_ready(seq));
    assert!(kernel.dispatch_once());
}

static RETRIES: AtomicUsize = AtomicUsize::new(0);

fn retry_once(_: TaskArg) -> TaskOutcome {
    if RETRIES.fetch_add(1, Ordering::Relaxed) == 0 {
        TaskOutcome::Reprogram
    } else {
        TaskOutcome::Done
    }
}

#[test]
fn test_reprogram_runs_again_before_successors() {
    static SEEN_AFTER: AtomicUsize = AtomicUsize::new(0);
    let kernel = Kernel::new();
    let seq = SeqId::new(1);
    kernel.task_enqueue(seq, retry_once, TaskArg::NONE).unwrap();
    kernel
        .task_enqueue(
            seq,
            |_| {
                SEEN_AFTER.store(1, Ordering::Relaxed);
                TaskOutcome::Done
            },
            TaskArg::NONE,
        )
        .unwrap();

    assert!(kernel.dispatch_once()); // first run, reprogrammed
    assert_eq!(RETRIES.load(Ordering::Relaxed), 1);
    assert_eq!(SEEN_AFTER.load(Ordering::Relaxed), 0);

    assert!(kernel.dispatch_once()); // retry completes
    assert_eq!(RETRIES.load(Ordering::Relaxed), 2);
    // Successor still gated until the chain unlocks its sequence.
    assert_eq!(SEEN_AFTER.load(Ordering::Relaxed), 0);
    kernel.sequence_unlock(seq);
    assert!(kernel.dispatch_once());
    assert_eq!(SEEN_AFTER.load(Ordering::Relaxed), 1);
}

#[test]
fn test_enqueue_backpressure_reports_full() {
    let kernel = Kernel::new();
    let seq = SeqId::new(1);
    let depth = kernel.sequence_spaces(seq).unwrap();
    for _ in 0..depth {
        kernel.task_enqueue(seq, |_| TaskOutcome::Done, TaskArg::NONE).unwrap();
    }
    assert!(kernel.task_enqueue(seq, |_| TaskOutcome::Done, TaskArg::NONE).is_err());
    assert_eq!(kernel.sequence_spaces(seq).unwrap(), 0);
}

#[test]
fn test_retire_current_frees_the_slot() {
    static EXITED: AtomicUsize = AtomicUsize::new(0);
    let kernel = Kernel::new();
    let a = kernel.spawn(
        entry,
        TaskArg::NONE,
        Some(|| {
            EXITED.store(1, Ordering::Relaxed);
        }),
        stack(0),
        4,
    );
    let b = kernel.spawn(entry, TaskArg::NONE, None, stack(1), 4);

    kernel.switch_service(); // A active
    kernel.retire_current();
    assert_eq!(EXITED.load(Ordering::Relaxed), 1);
    assert_eq!(kernel.context_state(a), None); // slot reclaimed
    assert!(kernel.switch_is_pending());
    assert_eq!(kernel.switch_service().unwrap().to, b);
}

#[test]
fn test_event_round_trip_through_kernel() {
    static FIRED: Mutex<Vec<usize>> = Mutex::new(Vec::new());
    fn record(arg: TaskArg) -> TaskOutcome {
        FIRED.lock().unwrap().push(arg.raw());
        TaskOutcome::Done
    }

    let kernel = Kernel::new();
    let ev = kernel.event_create("line-done", 4);
    for i in 1..=3 {
        kernel.event_append_task(ev, record, TaskArg::new(i)).unwrap();
    }
    assert!(kernel.event_set_pending(ev));

    // Drain the firing round into the pool, then dispatch.
    while kernel.event_pending(ev) > 0 {
        let task = kernel.event_get_task(ev);
        kernel.enqueue(SeqId::POOL, task).unwrap();
    }
    while kernel.dispatch_once() {}

    assert_eq!(FIRED.lock().unwrap().clone(), vec![1, 2, 3]);
}
