//! Concurrent delivery of one record to every storage target.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::platform::short_error_message;
use crate::record::Record;
use crate::store::{StorageTarget, StoreError};

/// Outcome of delivering one record.
#[derive(Debug, Default)]
pub struct DeliveryReport {
    /// Targets that accepted the record.
    pub delivered: usize,
    /// `(target, error)` for every target that failed or panicked.
    pub failures: Vec<(String, String)>,
}

impl DeliveryReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Default worker count: the machine's available parallelism.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn panic_message(err: tokio::task::JoinError) -> String {
    if err.is_panic() {
        let payload = err.into_panic();
        if let Some(s) = payload.downcast_ref::<&str>() {
            format!("panicked: {s}")
        } else if let Some(s) = payload.downcast_ref::<String>() {
            format!("panicked: {s}")
        } else {
            "panicked".to_string()
        }
    } else {
        format!("task failed: {err}")
    }
}

/// Writes each record to every target, independently and concurrently.
///
/// Each target gets its own clone of the record on its own task. Concurrency
/// across all in-flight deliveries (walk and webhook alike) is bounded by one
/// shared semaphore. A failing target never affects the others and never
/// surfaces to the caller beyond the returned report.
#[derive(Clone)]
pub struct FanoutWriter {
    targets: Vec<Arc<dyn StorageTarget>>,
    semaphore: Arc<Semaphore>,
    workers: usize,
}

impl FanoutWriter {
    /// `workers == 0` selects [`default_workers`].
    pub fn new(targets: Vec<Arc<dyn StorageTarget>>, workers: usize) -> Self {
        let workers = if workers == 0 { default_workers() } else { workers };
        Self {
            targets,
            semaphore: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    pub fn targets(&self) -> &[Arc<dyn StorageTarget>] {
        &self.targets
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Deliver `record` to every target and wait for all of them to settle.
    pub async fn deliver(&self, record: &Record) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let mut handles = Vec::with_capacity(self.targets.len());

        for target in &self.targets {
            let target = Arc::clone(target);
            let semaphore = Arc::clone(&self.semaphore);
            let record = record.clone();
            let name = target.name().to_string();

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.map_err(|_| {
                    StoreError::Unavailable("delivery semaphore closed".into())
                })?;
                target.insert_message(record).await
            });
            handles.push((name, handle));
        }

        for (name, handle) in handles {
            let failure = match handle.await {
                Ok(Ok(())) => {
                    report.delivered += 1;
                    continue;
                }
                Ok(Err(e)) => short_error_message(&e),
                Err(join_err) => panic_message(join_err),
            };

            tracing::warn!(
                store = %name,
                record_id = %record.id(),
                error = %failure,
                "Failed to deliver record"
            );
            report.failures.push((name, failure));
        }

        report
    }
}

impl std::fmt::Debug for FanoutWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.targets.iter().map(|t| t.name()).collect();
        f.debug_struct("FanoutWriter")
            .field("targets", &names)
            .field("workers", &self.workers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::key::KeyAlgorithm;
    use crate::record::{Attributes, EventPayload};
    use crate::store::{IssueStatus, MemoryStore};

    struct BrokenStore {
        panic: bool,
    }

    #[async_trait]
    impl StorageTarget for BrokenStore {
        fn name(&self) -> &str {
            if self.panic { "panicky" } else { "broken" }
        }

        async fn insert_message(&self, _record: Record) -> crate::store::Result<()> {
            if self.panic {
                panic!("disk on fire");
            }
            Err(StoreError::Unavailable(
                "connection refused\nserver said: too many clients".into(),
            ))
        }

        async fn check_issue_in_db(&self, _issue: &Attributes) -> crate::store::Result<IssueStatus> {
            Ok(IssueStatus::NotFound)
        }
    }

    fn record() -> Record {
        let payload: EventPayload = serde_json::from_value(json!({
            "issue": {"id": 42, "updated_at": "2020-01-03T00:00:00Z"}
        }))
        .unwrap();
        Record::from_event(payload, KeyAlgorithm::Sha1)
    }

    #[tokio::test]
    async fn test_failing_target_does_not_block_healthy_ones() {
        let healthy = Arc::new(MemoryStore::new("healthy"));
        let writer = FanoutWriter::new(
            vec![
                Arc::new(BrokenStore { panic: false }),
                Arc::new(BrokenStore { panic: true }),
                healthy.clone(),
            ],
            2,
        );

        let record = record();
        let report = writer.deliver(&record).await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.failures.len(), 2);
        assert!(report.failures.iter().any(|(name, e)| name == "panicky" && e.contains("disk on fire")));
        assert!(report.failures.iter().any(|(name, e)| {
            name == "broken" && e == "Target unavailable: connection refused"
        }));
        assert_eq!(healthy.get(record.id()), Some(record));
    }

    #[tokio::test]
    async fn test_every_target_receives_the_record() {
        let a = Arc::new(MemoryStore::new("a"));
        let b = Arc::new(MemoryStore::new("b"));
        let writer = FanoutWriter::new(vec![a.clone(), b.clone()], 1);

        let report = writer.deliver(&record()).await;

        assert!(report.is_complete());
        assert_eq!(report.delivered, 2);
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn test_zero_workers_uses_default() {
        let writer = FanoutWriter::new(Vec::new(), 0);
        assert_eq!(writer.workers(), default_workers());
        assert!(writer.workers() >= 1);
    }
}
