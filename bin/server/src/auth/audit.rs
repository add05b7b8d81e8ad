//! Background recording of login metadata.
//!
//! A successful login enqueues its ip, ip source, and timestamp without
//! waiting for the write. Delivery is at most once: a full queue or a failed
//! write is logged and the update is dropped.

use async_trait::async_trait;
use gatehouse_platform_access::LoginMetadata;
use rootcause::prelude::Report;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::AuditError;

/// Destination for last-login updates.
#[async_trait]
pub trait LoginAuditSink: Send + Sync {
    async fn record_login(&self, metadata: &LoginMetadata) -> Result<(), Report<AuditError>>;
}

/// Handle for enqueueing last-login updates.
#[derive(Clone)]
pub struct LoginAuditor {
    sender: mpsc::Sender<LoginMetadata>,
}

impl LoginAuditor {
    /// Starts the worker draining into `sink` and returns the handle for it.
    ///
    /// The worker stops once every handle is dropped.
    pub fn spawn(sink: Arc<dyn LoginAuditSink>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<LoginMetadata>(capacity.max(1));
        let worker = tokio::spawn(async move {
            while let Some(metadata) = receiver.recv().await {
                match sink.record_login(&metadata).await {
                    Ok(()) => debug!(user_id = %metadata.user_id, "login metadata recorded"),
                    Err(e) => {
                        warn!(user_id = %metadata.user_id, error = %e, "failed to record login metadata");
                    }
                }
            }
        });
        (Self { sender }, worker)
    }

    /// Enqueues an update without waiting. Never fails the caller.
    pub fn submit(&self, metadata: LoginMetadata) {
        match self.sender.try_send(metadata) {
            Ok(()) => {}
            Err(TrySendError::Full(metadata)) => {
                warn!(user_id = %metadata.user_id, "login audit queue full; dropping update");
            }
            Err(TrySendError::Closed(metadata)) => {
                warn!(user_id = %metadata.user_id, "login audit worker stopped; dropping update");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::UserId;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct RecordingSink {
        recorded: Mutex<Vec<LoginMetadata>>,
    }

    #[async_trait]
    impl LoginAuditSink for RecordingSink {
        async fn record_login(&self, metadata: &LoginMetadata) -> Result<(), Report<AuditError>> {
            self.recorded.lock().unwrap().push(metadata.clone());
            Ok(())
        }
    }

    /// Sink that blocks until released, then fails.
    #[derive(Default)]
    struct GatedSink {
        release: Notify,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl LoginAuditSink for GatedSink {
        async fn record_login(&self, _metadata: &LoginMetadata) -> Result<(), Report<AuditError>> {
            *self.calls.lock().unwrap() += 1;
            self.release.notified().await;
            Err(AuditError::DatabaseError {
                details: "connection reset".to_string(),
            }
            .into())
        }
    }

    fn metadata(id: i64) -> LoginMetadata {
        LoginMetadata {
            user_id: UserId::new(id),
            ip_address: Some("10.0.0.1".to_string()),
            ip_source: Some("intranet".to_string()),
            last_login_time: None,
        }
    }

    #[tokio::test]
    async fn submitted_updates_reach_sink() {
        let sink = Arc::new(RecordingSink::default());
        let (auditor, worker) = LoginAuditor::spawn(sink.clone(), 8);

        auditor.submit(metadata(1));
        auditor.submit(metadata(2));
        drop(auditor);
        worker.await.unwrap();

        let recorded = sink.recorded.lock().unwrap();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].user_id, UserId::new(1));
        assert_eq!(recorded[1].user_id, UserId::new(2));
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking() {
        let sink = Arc::new(GatedSink::default());
        let (auditor, worker) = LoginAuditor::spawn(sink.clone(), 1);

        // One in flight, one queued, the rest dropped.
        for id in 0..10 {
            auditor.submit(metadata(id));
            tokio::task::yield_now().await;
        }
        drop(auditor);

        // Release the writes; failures are swallowed by the worker.
        for _ in 0..10 {
            sink.release.notify_one();
            tokio::task::yield_now().await;
        }
        worker.await.unwrap();

        assert!(*sink.calls.lock().unwrap() <= 2);
    }
}
