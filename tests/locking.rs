mod common;

use std::error::Error;
use std::sync::Barrier;

use tempfile::tempdir;

use exprun::coord;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn exactly_one_concurrent_acquirer_wins() -> TestResult {
    let dir = tempdir()?;
    let m = common::manifest(dir.path(), &["true"]);
    coord::ensure_directories(&m)?;

    const ACQUIRERS: usize = 16;
    let barrier = Barrier::new(ACQUIRERS);

    let winners: usize = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..ACQUIRERS)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    coord::acquire_lock(&m).expect("lock attempt should not error")
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("acquirer thread panicked"))
            .filter(|&won| won)
            .count()
    });

    assert_eq!(winners, 1);
    Ok(())
}

#[test]
fn contended_lock_is_not_an_error() -> TestResult {
    let dir = tempdir()?;
    let m = common::manifest(dir.path(), &["true"]);
    coord::ensure_directories(&m)?;

    assert!(coord::acquire_lock(&m)?);
    // Repeated attempts keep reporting contention, never failure.
    for _ in 0..3 {
        assert!(!coord::acquire_lock(&m)?);
    }
    Ok(())
}

#[test]
fn distinct_repetitions_have_independent_locks() -> TestResult {
    let dir = tempdir()?;
    let first = common::manifest(dir.path(), &["true"]);
    let mut second = common::manifest(dir.path(), &["true"]);
    second.repetition = 1;

    coord::ensure_directories(&first)?;
    assert!(coord::acquire_lock(&first)?);
    assert!(coord::acquire_lock(&second)?);
    Ok(())
}
