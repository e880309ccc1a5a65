//! Concurrency tests for hot reload.
//!
//! Readers on plain OS threads hammer `decide` while the async side swaps
//! rule sets. Every observation must come from exactly one rule set.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use access_policy::loader::{FileLoader, MemoryLoader};
use access_policy::rules::{PolicyEngine, PolicyKind};

const SET_A: [&str; 3] = ["a.com", "10.0.0.0/8", "*.shared.net"];
const SET_B: [&str; 3] = ["b.com", "10.0.0.0/8", "*.shared.net"];

fn spawn_readers(
    engine: &Arc<PolicyEngine>,
    stop: &Arc<AtomicBool>,
    count: usize,
) -> (Vec<thread::JoinHandle<()>>, Arc<AtomicUsize>) {
    let decisions = Arc::new(AtomicUsize::new(0));
    let handles = (0..count)
        .map(|_| {
            let engine = Arc::clone(engine);
            let stop = Arc::clone(stop);
            let decisions = Arc::clone(&decisions);
            thread::spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    // Present in both sets
                    assert!(engine.decide("10.20.30.40:443"));
                    assert!(engine.decide("x.shared.net"));

                    // Exactly one of a.com / b.com per snapshot
                    let snapshot = engine.snapshot();
                    assert_ne!(snapshot.matches("a.com"), snapshot.matches("b.com"));

                    decisions.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();
    (handles, decisions)
}

/// Replace a rule file atomically so a reload never reads a partial write
fn replace_file(path: &Path, contents: &str) {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, contents).unwrap();
    std::fs::rename(&tmp, path).unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_decisions_during_manual_reloads() {
    let source = MemoryLoader::default();
    source.set(SET_A);

    let engine = Arc::new(
        PolicyEngine::builder(PolicyKind::Bypass)
            .loader(source.clone())
            .build()
            .await,
    );

    let stop = Arc::new(AtomicBool::new(false));
    let (readers, decisions) = spawn_readers(&engine, &stop, 4);

    for i in 0..200 {
        if i % 2 == 0 {
            source.set(SET_B);
        } else {
            source.set(SET_A);
        }
        engine.reload().await;
    }

    stop.store(true, Ordering::Release);
    for reader in readers {
        reader.join().expect("reader thread panicked");
    }

    assert_eq!(engine.version(), 201);
    assert!(decisions.load(Ordering::Relaxed) > 0);
    engine.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reloads_are_serialized() {
    let source = MemoryLoader::new("a.com");
    let engine = Arc::new(
        PolicyEngine::builder(PolicyKind::Admission)
            .loader(source)
            .build()
            .await,
    );

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                for _ in 0..10 {
                    engine.reload().await;
                }
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    // One snapshot per cycle, none lost
    assert_eq!(engine.version(), 1 + 16 * 10);
    assert!(engine.decide("a.com"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_periodic_reload_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rules.txt");
    replace_file(&path, &SET_A.join("\n"));

    let engine = Arc::new(
        PolicyEngine::builder(PolicyKind::Bypass)
            .loader(FileLoader::new(&path))
            .reload_period(Duration::from_secs(1))
            .build()
            .await,
    );
    assert!(engine.decide("a.com"));

    let stop = Arc::new(AtomicBool::new(false));
    let (readers, _) = spawn_readers(&engine, &stop, 2);

    replace_file(&path, &SET_B.join("\n"));

    let mut switched = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if engine.decide("b.com") {
            switched = true;
            break;
        }
    }

    stop.store(true, Ordering::Release);
    for reader in readers {
        reader.join().expect("reader thread panicked");
    }

    assert!(switched, "periodic reload did not pick up the file change");
    assert!(!engine.decide("a.com"));

    engine.close().await.unwrap();
    let version = engine.version();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(engine.version(), version);
}

#[tokio::test]
async fn test_source_outage_and_recovery() {
    let source = MemoryLoader::new("dynamic.example");
    let engine = PolicyEngine::builder(PolicyKind::Admission)
        .matchers(["static.example"])
        .loader(source.clone())
        .build()
        .await;

    assert!(engine.decide("dynamic.example"));

    source.set_failing(true);
    engine.reload().await;
    assert!(engine.decide("static.example"));
    assert!(!engine.decide("dynamic.example"));

    source.set_failing(false);
    engine.reload().await;
    assert!(engine.decide("dynamic.example"));

    engine.close().await.unwrap();
    assert!(source.is_closed());
    assert!(engine.decide("dynamic.example"));
}
