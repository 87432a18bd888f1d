//! Emergency stop and supervisor recovery tests

use crank_core::{TaskArg, TaskOutcome};
use crank_sched::{CtxState, Kernel, Recovery, SeqId, Supervisor};
use crank_sync::critical::{Critical, IntGate};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

fn entry(_: TaskArg) {}

fn stack(n: usize) -> crank_sched::StackRegion {
    crank_sched::StackRegion::new(0x2000_0000 + n * 0x400, 0x400)
}

static GATE_MASKED: AtomicBool = AtomicBool::new(false);
struct TestGate;
impl IntGate for TestGate {
    fn mask() {
        GATE_MASKED.store(true, Ordering::Relaxed);
    }
    fn unmask() {
        GATE_MASKED.store(false, Ordering::Relaxed);
    }
}

static INIT_RUNS: AtomicUsize = AtomicUsize::new(0);
fn init_hook() {
    INIT_RUNS.fetch_add(1, Ordering::Relaxed);
}

#[test]
fn test_emergency_stop_recovery_cycle() {
    let kernel = Kernel::new();
    let critical: Critical<TestGate> = Critical::new();
    let supervisor = Supervisor::new(&kernel, &critical, init_hook);

    let a = kernel.spawn(entry, TaskArg::NONE, None, stack(0), 4);
    let b = kernel.spawn(entry, TaskArg::NONE, None, stack(1), 4);
    let sem = kernel.semaphore_create(0);
    let ev = kernel.event_create("recovery", 2);

    // Build up mid-flight state: a locked sequence, a firing event,
    // a blocked context, and an open critical section.
    let seq = SeqId::new(1);
    kernel.task_enqueue(seq, |_| TaskOutcome::Done, TaskArg::NONE).unwrap();
    kernel.task_enqueue(seq, |_| TaskOutcome::Done, TaskArg::NONE).unwrap();
    assert!(kernel.dispatch_once()); // locks sequence 1

    kernel.event_append_task(ev, |_| TaskOutcome::Done, TaskArg::NONE).unwrap();
    assert!(kernel.event_set_pending(ev));

    kernel.switch_service(); // A active
    kernel.semaphore_p(sem).unwrap(); // A blocks
    assert_eq!(kernel.context_state(a), Some(CtxState::Stopped));

    critical.enter();
    critical.enter();
    kernel.emergency_stop();

    // Stop takes effect immediately: queues drained, events disarmed.
    assert!(!kernel.sequence_ready(seq));
    assert_eq!(kernel.event_pending(ev), 0);
    assert!(kernel.estop_pending());

    assert_eq!(supervisor.poll(), Recovery::Recovered);
    assert_eq!(INIT_RUNS.load(Ordering::Relaxed), 1);
    assert!(!kernel.estop_pending());
    // The recovery point reopened the critical section...
    assert_eq!(critical.depth(), 0);
    assert!(!GATE_MASKED.load(Ordering::Relaxed));
    // ...and returned every surviving context to the rotation.
    assert_eq!(kernel.context_state(a), Some(CtxState::Pending));
    assert_eq!(kernel.context_state(b), Some(CtxState::Pending));
    assert_eq!(kernel.current(), None);

    // Normal service resumes.
    kernel.task_pool_enqueue(|_| TaskOutcome::Done, TaskArg::NONE).unwrap();
    assert_eq!(supervisor.poll(), Recovery::Dispatched);
    assert_eq!(supervisor.poll(), Recovery::Idle);
    assert_eq!(kernel.switch_service().unwrap().to, a);
}

#[test]
fn test_unlocked_after_recovery() {
    let kernel = Kernel::new();
    let critical: Critical<TestGate> = Critical::new();
    let supervisor = Supervisor::new(&kernel, &critical, || {});

    let seq = SeqId::new(2);
    kernel.task_enqueue(seq, |_| TaskOutcome::Done, TaskArg::NONE).unwrap();
    assert!(kernel.dispatch_once()); // sequence now locked
    kernel.emergency_stop();
    supervisor.poll();

    // A fresh chain on the same sequence is reachable again.
    kernel.task_enqueue(seq, |_| TaskOutcome::Done, TaskArg::NONE).unwrap();
    assert!(kernel.sequence_ready(seq));
    assert_eq!(supervisor.poll(), Recovery::Dispatched);
}
