//! Acquisitions made beneath an ignored stack frame must not feed the lock
//! graph: no edges, no inversion reports.
//!
//! Runs as its own process so the ignore-list environment can be staged
//! before the validator's first use.

use std::sync::{Mutex, MutexGuard};

use lksmith::{LockError, LockToken, Report};

static RECORDED: Mutex<Vec<LockError>> = Mutex::new(Vec::new());

fn record(report: &Report<'_>) {
    RECORDED
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .push(report.kind);
}

fn recorded() -> MutexGuard<'static, Vec<LockError>> {
    RECORDED.lock().unwrap_or_else(|e| e.into_inner())
}

fn acquire(token: LockToken, sleeper: bool) {
    let _ = lksmith::prelock(token, sleeper);
    lksmith::postlock(token, true);
}

fn release(token: LockToken) {
    assert_eq!(lksmith::preunlock(token), Ok(()));
    lksmith::postunlock(token);
}

/// Takes the two locks in reverse of the canonical order. The exported name
/// is on the exact-match ignore list; the pattern list covers symbolizers
/// that decorate it.
#[unsafe(no_mangle)]
#[inline(never)]
extern "Rust" fn lksmith_test_reversed_pair(first: LockToken, second: LockToken) {
    acquire(second, true);
    acquire(first, true);
    release(first);
    release(second);
}

#[test]
fn ignored_frames_suppress_dependency_processing() {
    // Staged before any validator call in this process.
    unsafe {
        std::env::set_var("LKSMITH_IGNORED_FRAMES", "lksmith_test_reversed_pair");
        std::env::set_var(
            "LKSMITH_IGNORED_FRAME_PATTERNS",
            "*lksmith_test_reversed_pair*",
        );
    }
    lksmith::set_report_hook(Some(record));

    assert_eq!(
        lksmith::ignored_frames(),
        ["lksmith_test_reversed_pair".to_string()]
    );
    assert_eq!(
        lksmith::ignored_frame_patterns(),
        ["*lksmith_test_reversed_pair*".to_string()]
    );

    let a = LockToken::from_raw(0x1910_0010);
    let b = LockToken::from_raw(0x1910_0020);

    // Canonical order, from a frame nobody ignores: A before B.
    std::thread::spawn(move || {
        acquire(a, true);
        acquire(b, true);
        release(b);
        release(a);
    })
    .join()
    .unwrap();

    let snap = lksmith::snapshot();
    assert!(
        snap.lock(b.as_raw() as u64)
            .unwrap()
            .before
            .contains(&(a.as_raw() as u64))
    );

    // Reversed order beneath the ignored frame: nothing may come of it.
    std::thread::spawn(move || lksmith_test_reversed_pair(a, b))
        .join()
        .unwrap();

    assert!(
        !recorded().contains(&LockError::Deadlock),
        "ignored frame still produced a deadlock report"
    );
    let snap = lksmith::snapshot();
    assert!(
        !snap
            .lock(a.as_raw() as u64)
            .unwrap()
            .before
            .contains(&(b.as_raw() as u64)),
        "ignored frame still added a reversed edge"
    );

    // Holder bookkeeping still ran for the ignored acquisitions.
    assert_eq!(snap.lock(b.as_raw() as u64).unwrap().nlock, 2);

    assert_eq!(lksmith::destroy(a), Ok(()));
    assert_eq!(lksmith::destroy(b), Ok(()));
}
