//! End-to-end tests of every execution mode.
//!
//! Isolated modes start the compiled `parchunk` binary as their worker
//! program, and shared segments live in a per-test temp directory so runs
//! never touch `/dev/shm`.

use std::path::Path;

use parchunk::{
    Executor, ExecutorConfig, Kernel, Mode, ParchunkError, SharedBuffer, WorkerProgram,
};

// =============================================================================
// Helpers
// =============================================================================

fn executor(shm_dir: &Path) -> Executor {
    Executor::new(
        ExecutorConfig::default()
            .with_worker_program(WorkerProgram::new(env!("CARGO_BIN_EXE_parchunk")))
            .with_shm_dir(shm_dir),
    )
}

fn executor_with_name(shm_dir: &Path, name: &str) -> Executor {
    Executor::new(
        ExecutorConfig::default()
            .with_worker_program(WorkerProgram::new(env!("CARGO_BIN_EXE_parchunk")))
            .with_shm_dir(shm_dir)
            .with_shm_name(name),
    )
}

fn ramp(n: usize) -> Vec<f64> {
    (0..n).map(|i| i as f64).collect()
}

fn assert_segment_dir_empty(dir: &Path) {
    let left: Vec<_> = std::fs::read_dir(dir).unwrap().collect();
    assert!(left.is_empty(), "segments left behind: {:?}", left);
}

// =============================================================================
// Results
// =============================================================================

#[test]
fn test_square_every_mode() {
    let dir = tempfile::tempdir().unwrap();
    let exec = executor(dir.path());
    let input = ramp(10);
    let expected = vec![0.0, 1.0, 4.0, 9.0, 16.0, 25.0, 36.0, 49.0, 64.0, 81.0];

    for mode in Mode::ALL {
        let out = exec.transform(&input, &Kernel::Square, 3, mode).unwrap();
        assert_eq!(out, expected, "mode {}", mode);
    }
    assert_segment_dir_empty(dir.path());
}

#[test]
fn test_every_mode_matches_sequential() {
    let dir = tempfile::tempdir().unwrap();
    let exec = executor(dir.path());
    let input = parchunk::bench::synthetic_input(50_003, 11);
    let baseline = exec
        .transform(&input, &Kernel::SinCosIdentity, 1, Mode::Sequential)
        .unwrap();

    for mode in [Mode::SharedSpace, Mode::IsolatedSpace, Mode::IsolatedSharedBuffer] {
        for workers in [1, 4, 7] {
            let out = exec
                .transform(&input, &Kernel::SinCosIdentity, workers, mode)
                .unwrap();
            // Same kernel, same element order: identical bits.
            assert_eq!(out, baseline, "mode {} workers {}", mode, workers);
        }
    }
}

#[test]
fn test_more_workers_than_elements_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let exec = executor(dir.path());
    let input = vec![1.5, -2.0, 4.0];

    for mode in [Mode::IsolatedSpace, Mode::IsolatedSharedBuffer] {
        let out = exec.transform(&input, &Kernel::Scale(2.0), 8, mode).unwrap();
        assert_eq!(out, vec![3.0, -4.0, 8.0], "mode {}", mode);
    }
}

#[test]
fn test_far_more_workers_than_elements_every_mode() {
    let dir = tempfile::tempdir().unwrap();
    let exec = executor(dir.path());
    let input = vec![1.0, 2.0, 3.0];

    for mode in Mode::ALL {
        for workers in [1000, 100_000] {
            let out = exec.transform(&input, &Kernel::Square, workers, mode).unwrap();
            assert_eq!(out, vec![1.0, 4.0, 9.0], "mode {} workers {}", mode, workers);
        }
        assert!(exec
            .transform(&[], &Kernel::Square, usize::MAX, mode)
            .unwrap()
            .is_empty());
    }
    assert_segment_dir_empty(dir.path());
}

#[test]
fn test_failure_past_empty_chunks_names_last_worker() {
    let dir = tempfile::tempdir().unwrap();
    let exec = executor(dir.path());
    let input = vec![4.0, -1.0, 9.0];

    for mode in [Mode::IsolatedSpace, Mode::IsolatedSharedBuffer] {
        let err = exec
            .transform(&input, &Kernel::CheckedSqrt, 1000, mode)
            .unwrap_err();
        assert!(
            matches!(err, ParchunkError::Worker { chunk: 999, start: 0, end: 3, .. }),
            "{}",
            err
        );
    }
    assert_segment_dir_empty(dir.path());
}

#[test]
fn test_empty_input_every_mode() {
    let dir = tempfile::tempdir().unwrap();
    let exec = executor(dir.path());
    for mode in Mode::ALL {
        assert!(exec.transform(&[], &Kernel::Square, 3, mode).unwrap().is_empty());
    }
    assert_segment_dir_empty(dir.path());
}

#[test]
fn test_zero_workers_spawns_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let exec = executor_with_name(dir.path(), "never-created");
    let err = exec
        .transform(&[1.0, 2.0], &Kernel::Square, 0, Mode::IsolatedSharedBuffer)
        .unwrap_err();
    assert!(matches!(err, ParchunkError::InvalidWorkerCount { workers: 0 }));
    assert_segment_dir_empty(dir.path());
}

// =============================================================================
// Shared segment lifecycle
// =============================================================================

#[test]
fn test_segment_released_after_success() {
    let dir = tempfile::tempdir().unwrap();
    let exec = executor_with_name(dir.path(), "fixed-seg");

    let out = exec
        .transform(&ramp(100), &Kernel::Square, 4, Mode::IsolatedSharedBuffer)
        .unwrap();
    assert_eq!(out[99], 9801.0);

    // Same name is free again
    let again = SharedBuffer::create(dir.path(), "fixed-seg", 100).unwrap();
    again.release().unwrap();

    // And a second run with the fixed name succeeds too
    exec.transform(&ramp(100), &Kernel::Square, 4, Mode::IsolatedSharedBuffer)
        .unwrap();
    assert_segment_dir_empty(dir.path());
}

#[test]
fn test_segment_released_after_worker_failure() {
    let dir = tempfile::tempdir().unwrap();
    let exec = executor_with_name(dir.path(), "failing-seg");
    let mut input = ramp(12);
    input[10] = -4.0;

    let err = exec
        .transform(&input, &Kernel::CheckedSqrt, 3, Mode::IsolatedSharedBuffer)
        .unwrap_err();
    match err {
        ParchunkError::Worker { chunk, start, end, message } => {
            assert_eq!((chunk, start, end), (2, 8, 12));
            assert!(message.contains("index 10"), "{}", message);
        }
        other => panic!("unexpected error: {other}"),
    }

    SharedBuffer::create(dir.path(), "failing-seg", 12)
        .unwrap()
        .release()
        .unwrap();
}

#[test]
fn test_isolated_failure_names_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let exec = executor(dir.path());
    let mut input = ramp(9);
    input[4] = f64::NAN;

    let err = exec
        .transform(&input, &Kernel::CheckedSqrt, 3, Mode::IsolatedSpace)
        .unwrap_err();
    assert!(
        matches!(err, ParchunkError::Worker { chunk: 1, start: 3, end: 6, .. }),
        "{}",
        err
    );
}

#[test]
fn test_missing_worker_program() {
    let dir = tempfile::tempdir().unwrap();
    let exec = Executor::new(
        ExecutorConfig::default()
            .with_worker_program(WorkerProgram::new(dir.path().join("no-such-binary")))
            .with_shm_dir(dir.path()),
    );
    for mode in [Mode::IsolatedSpace, Mode::IsolatedSharedBuffer] {
        let err = exec.transform(&ramp(4), &Kernel::Square, 2, mode).unwrap_err();
        assert!(matches!(err, ParchunkError::Spawn { .. }), "{}", err);
        assert_eq!(err.failed_chunk(), Some(0));
    }
    // The shared-buffer run created a segment before spawning; it is gone.
    assert_segment_dir_empty(dir.path());
}

// =============================================================================
// In-place transforms
// =============================================================================

#[test]
fn test_transform_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let exec = executor(dir.path());
    let mut buffer = exec.create_segment(&ramp(1000)).unwrap();

    exec.transform_in_place(&mut buffer, &Kernel::Square, 4).unwrap();
    assert_eq!(buffer.as_slice()[0], 0.0);
    assert_eq!(buffer.as_slice()[999], 998_001.0);

    // Excess workers get empty ranges and are never started
    exec.transform_in_place(&mut buffer, &Kernel::Scale(0.5), 50_000).unwrap();
    assert_eq!(buffer.as_slice()[999], 499_000.5);

    // Caller still owns the segment
    assert!(buffer.path().exists());
    buffer.release().unwrap();
    assert_segment_dir_empty(dir.path());
}

#[test]
fn test_transform_in_place_failure_keeps_segment() {
    let dir = tempfile::tempdir().unwrap();
    let exec = executor(dir.path());
    let mut data = ramp(8);
    data[1] = -1.0;
    let mut buffer = exec.create_segment(&data).unwrap();

    let err = exec
        .transform_in_place(&mut buffer, &Kernel::CheckedSqrt, 2)
        .unwrap_err();
    assert!(matches!(err, ParchunkError::Worker { chunk: 0, .. }), "{}", err);
    assert!(buffer.path().exists());
}
