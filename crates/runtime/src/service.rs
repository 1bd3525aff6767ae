//! Service lifecycle.

use crate::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use storage::{
    ErrorSignal, EventLogBackend, EventLogWriter, LogConfig, ReplayReport, Store, WriterMode,
};
use tokio::sync::RwLock;

/// Durability status reported to operators.
#[derive(Debug, Clone)]
pub enum Health {
    /// Every accepted mutation is being persisted.
    Healthy,
    /// The writer stopped after a backend failure; reads and writes still
    /// work but nothing new reaches the log.
    Degraded(Arc<storage::Error>),
}

impl Health {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Health::Healthy)
    }
}

/// A running key-value service: one store, one event log writer.
///
/// Mutations are applied to the store first and then queued for the log, so
/// a crash can lose the most recent writes. [`Service::shutdown`] drains the
/// queue.
pub struct Service {
    store: Store,
    writer: RwLock<EventLogWriter>,
    errors: ErrorSignal,
    replayed: ReplayReport,
    degraded_reported: AtomicBool,
}

impl Service {
    /// Open the configured log, replay it and start accepting writes.
    pub async fn start(config: &LogConfig) -> Result<Self> {
        let store = Store::new();
        let mut writer = EventLogWriter::new();
        let replayed = storage::replay(config, &store, &mut writer).await?;
        Ok(Self::live(store, writer, replayed))
    }

    /// Like [`Service::start`] with an already opened backend.
    pub async fn with_backend(backend: Box<dyn EventLogBackend>) -> Result<Self> {
        let store = Store::new();
        let mut writer = EventLogWriter::new();
        let replayed = storage::replay_backend(backend, &store, &mut writer).await?;
        Ok(Self::live(store, writer, replayed))
    }

    fn live(store: Store, writer: EventLogWriter, replayed: ReplayReport) -> Self {
        Self {
            store,
            errors: writer.errors(),
            writer: RwLock::new(writer),
            replayed,
            degraded_reported: AtomicBool::new(false),
        }
    }

    /// Set `key` to `value` and queue the event.
    pub async fn put(&self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let (key, value) = (key.into(), value.into());
        storage::validate_key(&key)?;

        let writer = self.writer.read().await;
        if writer.mode() == WriterMode::Closed {
            return Err(Error::ShutDown);
        }

        self.store.put(key.as_str(), value.as_str());
        tracing::debug!(%key, "put");
        let queued = writer.write_put(key, value).await;
        self.note_durability(queued)
    }

    /// Look up `key`.
    pub fn get(&self, key: &str) -> Result<String> {
        Ok(self.store.get(key)?)
    }

    /// Remove `key` and queue the event. Removing an absent key still
    /// records a delete.
    pub async fn delete(&self, key: impl Into<String>) -> Result<()> {
        let key = key.into();
        storage::validate_key(&key)?;

        let writer = self.writer.read().await;
        if writer.mode() == WriterMode::Closed {
            return Err(Error::ShutDown);
        }

        self.store.delete(&key);
        tracing::debug!(%key, "delete");
        let queued = writer.write_delete(key).await;
        self.note_durability(queued)
    }

    fn note_durability(&self, queued: storage::Result<()>) -> Result<()> {
        match queued {
            Ok(()) => Ok(()),
            // The store already holds the mutation; surface the lost
            // durability through health instead of failing the call.
            Err(storage::Error::WriterStopped) => {
                if !self.degraded_reported.swap(true, Ordering::Relaxed) {
                    let reason = self
                        .errors
                        .try_get()
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "writer stopped".to_string());
                    tracing::warn!(%reason, "event log writer stopped, serving without durability");
                }
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Current durability status.
    pub fn health(&self) -> Health {
        match self.errors.try_get() {
            Some(e) => Health::Degraded(e),
            None => Health::Healthy,
        }
    }

    /// Fail with [`Error::Degraded`] if durable writes have stopped.
    pub fn ensure_healthy(&self) -> Result<()> {
        match self.health() {
            Health::Healthy => Ok(()),
            Health::Degraded(e) => Err(Error::Degraded(e.to_string())),
        }
    }

    /// What startup replay restored.
    pub fn replayed(&self) -> ReplayReport {
        self.replayed
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Stop accepting writes and flush every queued event.
    ///
    /// Returns the number of events appended since startup.
    pub async fn shutdown(&self) -> Result<u64> {
        let appended = self.writer.write().await.close().await?;
        tracing::info!(appended, "event log writer closed");
        Ok(appended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::{Event, MemoryBackend};

    #[tokio::test]
    async fn put_get_delete() {
        let service = Service::with_backend(Box::new(MemoryBackend::new()))
            .await
            .unwrap();

        service.put("test-key", "test-value").await.unwrap();
        assert_eq!(service.get("test-key").unwrap(), "test-value");

        service.delete("test-key").await.unwrap();
        assert!(service.get("test-key").unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn records_every_mutation() {
        let backend = MemoryBackend::new();
        let service = Service::with_backend(Box::new(backend.clone()))
            .await
            .unwrap();

        service.put("x", "1").await.unwrap();
        service.put("x", "2").await.unwrap();
        service.delete("y").await.unwrap();
        assert_eq!(service.shutdown().await.unwrap(), 3);

        assert_eq!(
            backend.events(),
            vec![Event::put(1, "x", "1"), Event::put(2, "x", "2"), Event::delete(3, "y")]
        );
    }

    #[tokio::test]
    async fn restores_state_on_start() {
        let backend = MemoryBackend::with_events([Event::put(1, "x", "1"), Event::delete(2, "x")]);
        let service = Service::with_backend(Box::new(backend)).await.unwrap();

        assert_eq!(service.replayed().events, 2);
        assert!(service.store().is_empty());
    }

    #[tokio::test]
    async fn restart_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig::file(dir.path().join("transaction.log"));

        let service = Service::start(&config).await.unwrap();
        service.put("x", "1").await.unwrap();
        service.put("x", "2").await.unwrap();
        service.delete("y").await.unwrap();
        service.shutdown().await.unwrap();

        let restarted = Service::start(&config).await.unwrap();
        assert_eq!(restarted.replayed().last_sequence, Some(3));
        assert_eq!(restarted.get("x").unwrap(), "2");
        assert!(restarted.get("y").unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn rejects_empty_key() {
        let backend = MemoryBackend::new();
        let service = Service::with_backend(Box::new(backend.clone()))
            .await
            .unwrap();

        let err = service.put("", "v").await.unwrap_err();
        assert!(matches!(err, Error::Storage(storage::Error::InvalidKey(_))));
        assert!(service.store().is_empty());

        service.shutdown().await.unwrap();
        assert!(backend.events().is_empty());
    }

    #[tokio::test]
    async fn degrades_after_append_failure() {
        let backend = MemoryBackend::new().fail_append_at(1);
        let service = Service::with_backend(Box::new(backend.clone()))
            .await
            .unwrap();
        assert!(service.health().is_healthy());

        service.put("a", "1").await.unwrap();
        let mut errors = service.errors.clone();
        errors.wait().await.unwrap();

        // Still serving from memory.
        service.put("b", "2").await.unwrap();
        assert_eq!(service.get("b").unwrap(), "2");

        assert!(matches!(service.health(), Health::Degraded(_)));
        assert!(matches!(service.ensure_healthy(), Err(Error::Degraded(_))));
        assert!(backend.events().is_empty());
    }

    #[tokio::test]
    async fn rejects_writes_after_shutdown() {
        let service = Service::with_backend(Box::new(MemoryBackend::new()))
            .await
            .unwrap();
        service.shutdown().await.unwrap();

        assert!(matches!(service.put("k", "v").await, Err(Error::ShutDown)));
        assert!(matches!(service.delete("k").await, Err(Error::ShutDown)));
        assert!(service.get("k").unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn startup_fails_on_unreadable_log() {
        let backend = MemoryBackend::with_events([Event::put(1, "x", "1")]).fail_read_at(0);
        let err = Service::with_backend(Box::new(backend)).await.err().unwrap();
        assert!(matches!(
            err,
            Error::Storage(storage::Error::ReplayFailed(_))
        ));
    }
}
