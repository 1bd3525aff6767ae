//! Restart scenarios against the on-disk backends.

use storage::{
    Event, EventKind, EventLogBackend, EventLogWriter, FileBackend, LogConfig, Store, replay,
};
use tempfile::tempdir;

enum Op {
    Put(String, String),
    Delete(String),
}

/// Applies ops to the store and the writer the way the service does.
async fn run_session(config: &LogConfig, ops: &[Op]) -> Store {
    let store = Store::new();
    let mut writer = EventLogWriter::new();
    replay(config, &store, &mut writer).await.unwrap();

    for op in ops {
        match op {
            Op::Put(k, v) => {
                store.put(k.as_str(), v.as_str());
                writer.write_put(k.as_str(), v.as_str()).await.unwrap();
            }
            Op::Delete(k) => {
                store.delete(k);
                writer.write_delete(k.as_str()).await.unwrap();
            }
        }
    }
    writer.close().await.unwrap();
    store
}

async fn restart(config: &LogConfig) -> Store {
    run_session(config, &[]).await
}

fn put(k: &str, v: &str) -> Op {
    Op::Put(k.to_string(), v.to_string())
}

fn delete(k: &str) -> Op {
    Op::Delete(k.to_string())
}

fn configs(dir: &std::path::Path) -> Vec<LogConfig> {
    vec![
        LogConfig::file(dir.join("transaction.log")),
        LogConfig::table(dir.join("transactions.db").to_str().unwrap()),
    ]
}

#[tokio::test]
async fn overwrite_and_absent_delete_survive_restart() {
    let dir = tempdir().unwrap();
    for config in configs(dir.path()) {
        run_session(&config, &[put("x", "1"), put("x", "2"), delete("y")]).await;

        let store = restart(&config).await;
        assert_eq!(store.get("x").unwrap(), "2");
        assert!(store.get("y").unwrap_err().is_not_found());
    }
}

#[tokio::test]
async fn replay_matches_direct_application() {
    let dir = tempdir().unwrap();

    let ops: Vec<Op> = (0..200)
        .map(|i| {
            let key = format!("key-{}", i % 17);
            if i % 5 == 3 {
                delete(&key)
            } else {
                put(&key, &format!("value-{i}"))
            }
        })
        .collect();

    for config in configs(dir.path()) {
        let live = run_session(&config, &ops).await;
        let replayed = restart(&config).await;
        assert_eq!(live.snapshot(), replayed.snapshot());
    }
}

#[tokio::test]
async fn sequences_stay_unique_across_restarts() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("transaction.log");
    let config = LogConfig::file(&path);

    run_session(&config, &[put("a", "1"), put("b", "2")]).await;
    run_session(&config, &[put("c", "3"), delete("a")]).await;

    let mut backend = FileBackend::open(&path).unwrap();
    let mut events = Vec::new();
    backend
        .read_all(&mut |event| {
            events.push(event);
            true
        })
        .unwrap();

    let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4]);
    assert_eq!(events[3], Event::delete(4, "a"));
}

#[tokio::test]
async fn events_read_back_in_enqueue_order() {
    let dir = tempdir().unwrap();
    let config = LogConfig::table(dir.path().join("order.db").to_str().unwrap());

    let ops: Vec<Op> = (0..50).map(|i| put("k", &i.to_string())).collect();
    run_session(&config, &ops).await;

    let mut backend = config.open().unwrap();
    let mut values = Vec::new();
    backend
        .read_all(&mut |event| {
            assert_eq!(event.kind, EventKind::Put);
            values.push(event.value);
            true
        })
        .unwrap();

    let expected: Vec<String> = (0..50).map(|i| i.to_string()).collect();
    assert_eq!(values, expected);
}

#[tokio::test]
async fn corrupt_file_blocks_startup() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("transaction.log");
    std::fs::write(&path, "1\t2\tx\t1\ngarbage\n").unwrap();

    let store = Store::new();
    let mut writer = EventLogWriter::new();
    let err = replay(&LogConfig::file(&path), &store, &mut writer)
        .await
        .unwrap_err();

    assert!(matches!(err, storage::Error::ReplayFailed(_)));
    assert!(matches!(
        writer.write_put("x", "2").await,
        Err(storage::Error::NotLive)
    ));
}

#[tokio::test]
async fn append_without_replay_keeps_log_replayable() {
    let dir = tempdir().unwrap();
    for config in configs(dir.path()) {
        run_session(&config, &[put("a", "1"), put("b", "2")]).await;

        let mut backend = config.open().unwrap();
        assert_eq!(backend.append(EventKind::Put, "c", "3").unwrap(), 3);
        drop(backend);

        let store = restart(&config).await;
        assert_eq!(store.get("a").unwrap(), "1");
        assert_eq!(store.get("b").unwrap(), "2");
        assert_eq!(store.get("c").unwrap(), "3");
    }
}
