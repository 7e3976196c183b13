// SPDX-License-Identifier: MIT OR Apache-2.0
//! The async security event logger: a bounded queue drained by a single
//! background consumer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use conduit_core::{AuditEvent, SecurityEventSink};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::exporter::AuditExporter;
use crate::store::AuditStore;

/// Tuning knobs for [`SecurityEventLogger`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEventLoggerConfig {
    /// Maximum number of events buffered between the caller and the
    /// consumer before `record` starts dropping events.
    pub queue_capacity: usize,
    /// Maximum number of events drained into a single store call.
    pub batch_size: usize,
    /// Maximum time to wait for a batch to fill before flushing whatever
    /// has accumulated.
    #[serde(with = "millis")]
    pub batch_interval: Duration,
    /// Bound on how long `stop` waits for the consumer to drain.
    #[serde(with = "millis")]
    pub shutdown_timeout: Duration,
}

mod millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(val: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        val.as_millis().serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        let ms: u64 = u64::deserialize(de)?;
        Ok(Duration::from_millis(ms))
    }
}

impl Default for SecurityEventLoggerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            batch_size: 64,
            batch_interval: Duration::from_millis(200),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

/// Enqueues security events without blocking the caller and drains them
/// through a single background consumer in size- and time-bounded
/// micro-batches.
pub struct SecurityEventLogger {
    sender: Mutex<Option<mpsc::Sender<AuditEvent>>>,
    receiver: Mutex<Option<mpsc::Receiver<AuditEvent>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
    store: Arc<dyn AuditStore>,
    exporter: Option<Arc<dyn AuditExporter>>,
    config: SecurityEventLoggerConfig,
}

impl SecurityEventLogger {
    /// Build a logger over `store`, optionally forwarding drained batches
    /// to `exporter`. The background consumer is not running until
    /// [`Self::start`] is called.
    #[must_use]
    pub fn new(store: Arc<dyn AuditStore>, exporter: Option<Arc<dyn AuditExporter>>, config: SecurityEventLoggerConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        Self {
            sender: Mutex::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
            worker: Mutex::new(None),
            stopped: AtomicBool::new(false),
            store,
            exporter,
            config,
        }
    }

    /// Spawn the background consumer. Calling this more than once is a
    /// no-op.
    pub async fn start(self: &Arc<Self>) {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            return;
        }
        let Some(receiver) = self.receiver.lock().await.take() else {
            return;
        };
        let store = self.store.clone();
        let exporter = self.exporter.clone();
        let batch_size = self.config.batch_size;
        let batch_interval = self.config.batch_interval;
        *worker = Some(tokio::spawn(Self::run(receiver, store, exporter, batch_size, batch_interval)));
    }

    async fn run(
        mut receiver: mpsc::Receiver<AuditEvent>,
        store: Arc<dyn AuditStore>,
        exporter: Option<Arc<dyn AuditExporter>>,
        batch_size: usize,
        batch_interval: Duration,
    ) {
        loop {
            let Some(first) = receiver.recv().await else {
                break;
            };
            let mut batch = Vec::with_capacity(batch_size);
            batch.push(first);

            let deadline = Instant::now() + batch_interval;
            while batch.len() < batch_size {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                match tokio::time::timeout(remaining, receiver.recv()).await {
                    Ok(Some(event)) => batch.push(event),
                    Ok(None) => break,
                    Err(_) => break,
                }
            }

            Self::process_batch(&store, exporter.as_deref(), batch).await;
        }
        debug!(target: "conduit.audit", "consumer loop drained, channel closed");
    }

    async fn process_batch(store: &Arc<dyn AuditStore>, exporter: Option<&dyn AuditExporter>, batch: Vec<AuditEvent>) {
        if batch.is_empty() {
            return;
        }
        if let Err(err) = store.store_events(&batch).await {
            warn!(target: "conduit.audit", error = %err, batch_len = batch.len(), "batch store failed, falling back to individual stores");
            for event in &batch {
                if let Err(err) = store.store_events(std::slice::from_ref(event)).await {
                    error!(target: "conduit.audit", error = %err, event_id = %event.id, "individual event store failed, dropping event");
                }
            }
        }
        if let Some(exporter) = exporter {
            if let Err(err) = exporter.export(&batch) {
                warn!(target: "conduit.audit", error = %err, "export failed");
            }
        }
    }

    /// Close the queue and wait (bounded by `shutdown_timeout`) for the
    /// consumer to drain remaining events. Idempotent: calling this more
    /// than once after the first call returns immediately.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.sender.lock().await.take();
        if let Some(handle) = self.worker.lock().await.take() {
            if tokio::time::timeout(self.config.shutdown_timeout, handle).await.is_err() {
                warn!(target: "conduit.audit", "consumer did not drain within shutdown_timeout");
            }
        }
    }

    /// Alias for [`Self::stop`]; releases the consumer and is idempotent.
    pub async fn dispose(&self) {
        self.stop().await;
    }
}

#[async_trait]
impl SecurityEventSink for SecurityEventLogger {
    async fn record(&self, event: AuditEvent) {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }
        let sender = self.sender.lock().await;
        if let Some(tx) = sender.as_ref() {
            if let Err(err) = tx.try_send(event) {
                warn!(target: "conduit.audit", error = %err, "audit queue full or closed, dropping event");
            }
        }
    }
}
