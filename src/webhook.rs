//! Outbound webhook notifications.
//!
//! The sweeper puts notifications on a bounded queue with [WebhookQueue::enqueue], which never
//! waits. [run_webhook_worker] takes them off the queue and delivers each one on its own task,
//! retrying failed attempts according to a [RetryPolicy].

use std::{future::Future, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::{JoinError, JoinSet},
};

use crate::transaction::{TransactionId, TransactionStatus};

/// The default number of notifications that can wait in the queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// The default time limit for a single delivery attempt.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// The JSON body sent to a user's webhook URL.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// The transaction whose status changed.
    pub transaction_id: TransactionId,
    /// The transaction's new status.
    pub status: TransactionStatus,
}

/// A payload and where to send it.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookNotification {
    /// The URL the payload is POSTed to.
    pub url: String,
    /// The body of the request.
    pub payload: WebhookPayload,
}

/// Why a single delivery attempt failed.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DeliveryError {
    /// The request could not be sent or timed out.
    #[error("request failed: {0}")]
    Request(String),

    /// The receiver responded with a status code outside 200-299.
    #[error("receiver responded with status {0}")]
    Status(u16),
}

/// Sends a single webhook request.
pub trait WebhookSender: Clone + Send + Sync + 'static {
    /// POST `payload` as JSON to `url`.
    fn send(
        &self,
        url: &str,
        payload: &WebhookPayload,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

impl WebhookSender for reqwest::Client {
    async fn send(&self, url: &str, payload: &WebhookPayload) -> Result<(), DeliveryError> {
        let response = self
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|error| DeliveryError::Request(error.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Status(status.as_u16()))
        }
    }
}

/// Create the HTTP client used to deliver webhooks.
///
/// `timeout` limits both connecting and the whole request.
///
/// # Errors
/// Returns an error if the TLS backend cannot be initialized.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()
}

/// How many times to attempt a delivery and how long to wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// The total number of attempts, including the first.
    pub max_attempts: u32,
    /// The pause after each failed attempt.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

/// How a delivery ended.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    /// The receiver accepted the notification.
    Delivered {
        /// The number of attempts it took.
        attempts: u32,
    },
    /// Every attempt failed.
    Failed {
        /// The number of attempts made.
        attempts: u32,
        /// The error from the last attempt.
        error: String,
    },
}

/// Deliver `notification` with `sender`, retrying according to `policy`.
pub async fn deliver_with_retries<S: WebhookSender>(
    sender: &S,
    notification: &WebhookNotification,
    policy: RetryPolicy,
) -> DeliveryOutcome {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match sender.send(&notification.url, &notification.payload).await {
            Ok(()) => {
                tracing::info!(
                    "Delivered webhook for transaction {} to {} (attempt {attempt}/{max_attempts})",
                    notification.payload.transaction_id,
                    notification.url
                );
                return DeliveryOutcome::Delivered { attempts: attempt };
            }
            Err(error) if attempt >= max_attempts => {
                tracing::error!(
                    "Giving up on webhook for transaction {} to {} after {attempt} attempts: {error}",
                    notification.payload.transaction_id,
                    notification.url
                );
                return DeliveryOutcome::Failed {
                    attempts: attempt,
                    error: error.to_string(),
                };
            }
            Err(error) => {
                tracing::warn!(
                    "Webhook for transaction {} to {} failed (attempt {attempt}/{max_attempts}): {error}",
                    notification.payload.transaction_id,
                    notification.url
                );
                tokio::time::sleep(policy.backoff).await;
                attempt += 1;
            }
        }
    }
}

/// What happened to a notification handed to [WebhookQueue::enqueue].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The notification is waiting for the worker.
    Queued,
    /// The queue was full and the notification was dropped.
    QueueFull,
    /// The worker has stopped and the notification was dropped.
    Closed,
}

/// The sending half of the notification queue.
#[derive(Debug, Clone)]
pub struct WebhookQueue {
    sender: mpsc::Sender<WebhookNotification>,
}

impl WebhookQueue {
    /// Add `notification` to the queue without waiting for space.
    pub fn enqueue(&self, notification: WebhookNotification) -> EnqueueOutcome {
        match self.sender.try_send(notification) {
            Ok(()) => EnqueueOutcome::Queued,
            Err(TrySendError::Full(notification)) => {
                tracing::warn!(
                    "Webhook queue is full, dropping notification for transaction {}",
                    notification.payload.transaction_id
                );
                EnqueueOutcome::QueueFull
            }
            Err(TrySendError::Closed(notification)) => {
                tracing::warn!(
                    "Webhook queue is closed, dropping notification for transaction {}",
                    notification.payload.transaction_id
                );
                EnqueueOutcome::Closed
            }
        }
    }
}

/// The receiving half of the notification queue, consumed by [run_webhook_worker].
#[derive(Debug)]
pub struct WebhookReceiver {
    receiver: mpsc::Receiver<WebhookNotification>,
}

#[cfg(test)]
impl WebhookReceiver {
    /// Take the next notification if one is waiting.
    pub fn try_recv(&mut self) -> Option<WebhookNotification> {
        self.receiver.try_recv().ok()
    }
}

/// Create a notification queue that holds up to `capacity` notifications.
///
/// The queue closes once every [WebhookQueue] clone has been dropped.
pub fn webhook_channel(capacity: usize) -> (WebhookQueue, WebhookReceiver) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));

    (WebhookQueue { sender }, WebhookReceiver { receiver })
}

/// The number of deliveries the worker completed before it stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    /// Deliveries the receiver accepted.
    pub delivered: u64,
    /// Deliveries that ran out of attempts.
    pub failed: u64,
}

impl WorkerSummary {
    fn record(&mut self, result: Result<DeliveryOutcome, JoinError>) {
        match result {
            Ok(DeliveryOutcome::Delivered { .. }) => self.delivered += 1,
            Ok(DeliveryOutcome::Failed { .. }) => self.failed += 1,
            Err(error) => {
                tracing::error!("Webhook delivery task did not finish: {error}");
                self.failed += 1;
            }
        }
    }
}

/// Deliver notifications from `receiver` until the queue is closed.
///
/// Each notification is delivered on its own task. Once the queue is closed and empty, the
/// worker waits for in-flight deliveries and returns how many succeeded and failed.
pub async fn run_webhook_worker<S: WebhookSender>(
    sender: S,
    mut receiver: WebhookReceiver,
    policy: RetryPolicy,
) -> WorkerSummary {
    let mut deliveries = JoinSet::new();
    let mut summary = WorkerSummary::default();

    loop {
        tokio::select! {
            notification = receiver.receiver.recv() => match notification {
                Some(notification) => {
                    let sender = sender.clone();
                    deliveries.spawn(async move {
                        deliver_with_retries(&sender, &notification, policy).await
                    });
                }
                None => break,
            },
            Some(result) = deliveries.join_next(), if !deliveries.is_empty() => {
                summary.record(result);
            }
        }
    }

    tracing::info!(
        "Webhook queue closed, waiting for {} in-flight deliveries",
        deliveries.len()
    );

    while let Some(result) = deliveries.join_next().await {
        summary.record(result);
    }

    tracing::info!(
        "Webhook worker stopped: {} delivered, {} failed",
        summary.delivered,
        summary.failed
    );

    summary
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc, Mutex,
            atomic::{AtomicU32, Ordering},
        },
        time::Duration,
    };

    use axum::{Json, Router, http::StatusCode, routing::post};
    use tokio::net::TcpListener;

    use crate::transaction::TransactionStatus;

    use super::{
        DeliveryError, DeliveryOutcome, EnqueueOutcome, RetryPolicy, WebhookNotification,
        WebhookPayload, WebhookSender, WorkerSummary, build_http_client, deliver_with_retries,
        run_webhook_worker, webhook_channel,
    };

    /// Fails the first `failures` calls and any call to a URL containing "unreachable".
    #[derive(Clone, Default)]
    struct FakeSender {
        failures: u32,
        calls: Arc<AtomicU32>,
    }

    impl WebhookSender for FakeSender {
        async fn send(&self, url: &str, _payload: &WebhookPayload) -> Result<(), DeliveryError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

            if url.contains("unreachable") || call <= self.failures {
                Err(DeliveryError::Status(503))
            } else {
                Ok(())
            }
        }
    }

    const NO_BACKOFF: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        backoff: Duration::ZERO,
    };

    fn notification(url: &str, transaction_id: i64) -> WebhookNotification {
        WebhookNotification {
            url: url.to_owned(),
            payload: WebhookPayload {
                transaction_id,
                status: TransactionStatus::Expired,
            },
        }
    }

    #[tokio::test]
    async fn delivers_on_first_attempt() {
        let sender = FakeSender::default();

        let outcome =
            deliver_with_retries(&sender, &notification("http://hook.test", 1), NO_BACKOFF).await;

        assert_eq!(outcome, DeliveryOutcome::Delivered { attempts: 1 });
        assert_eq!(sender.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_delivered() {
        let sender = FakeSender {
            failures: 2,
            ..Default::default()
        };

        let outcome =
            deliver_with_retries(&sender, &notification("http://hook.test", 1), NO_BACKOFF).await;

        assert_eq!(outcome, DeliveryOutcome::Delivered { attempts: 3 });
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let sender = FakeSender::default();

        let outcome = deliver_with_retries(
            &sender,
            &notification("http://unreachable.test", 1),
            NO_BACKOFF,
        )
        .await;

        assert_eq!(
            outcome,
            DeliveryOutcome::Failed {
                attempts: 3,
                error: DeliveryError::Status(503).to_string(),
            }
        );
        assert_eq!(sender.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn full_queue_drops_notification() {
        let (queue, _receiver) = webhook_channel(1);

        assert_eq!(
            queue.enqueue(notification("http://hook.test", 1)),
            EnqueueOutcome::Queued
        );
        assert_eq!(
            queue.enqueue(notification("http://hook.test", 2)),
            EnqueueOutcome::QueueFull
        );
    }

    #[tokio::test]
    async fn closed_queue_drops_notification() {
        let (queue, receiver) = webhook_channel(1);
        drop(receiver);

        assert_eq!(
            queue.enqueue(notification("http://hook.test", 1)),
            EnqueueOutcome::Closed
        );
    }

    #[tokio::test]
    async fn worker_drains_queue_before_stopping() {
        let (queue, receiver) = webhook_channel(8);
        queue.enqueue(notification("http://hook.test/a", 1));
        queue.enqueue(notification("http://unreachable.test", 2));
        queue.enqueue(notification("http://hook.test/b", 3));
        drop(queue);

        let summary = run_webhook_worker(FakeSender::default(), receiver, NO_BACKOFF).await;

        assert_eq!(
            summary,
            WorkerSummary {
                delivered: 2,
                failed: 1
            }
        );
    }

    async fn spawn_receiver(status: StatusCode) -> (String, Arc<Mutex<Vec<WebhookPayload>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new().route(
            "/hook",
            post({
                let received = received.clone();
                move |Json(payload): Json<WebhookPayload>| {
                    received.lock().unwrap().push(payload);
                    async move { status }
                }
            }),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{address}/hook"), received)
    }

    #[tokio::test]
    async fn http_client_posts_json_payload() {
        let (url, received) = spawn_receiver(StatusCode::NO_CONTENT).await;
        let client = build_http_client(Duration::from_secs(5)).unwrap();

        let outcome = deliver_with_retries(&client, &notification(&url, 42), NO_BACKOFF).await;

        assert_eq!(outcome, DeliveryOutcome::Delivered { attempts: 1 });
        assert_eq!(
            *received.lock().unwrap(),
            vec![WebhookPayload {
                transaction_id: 42,
                status: TransactionStatus::Expired,
            }]
        );
    }

    #[tokio::test]
    async fn http_client_treats_error_status_as_failure() {
        let (url, received) = spawn_receiver(StatusCode::INTERNAL_SERVER_ERROR).await;
        let client = build_http_client(Duration::from_secs(5)).unwrap();

        let outcome = deliver_with_retries(&client, &notification(&url, 7), NO_BACKOFF).await;

        assert_eq!(
            outcome,
            DeliveryOutcome::Failed {
                attempts: 3,
                error: DeliveryError::Status(500).to_string(),
            }
        );
        assert_eq!(received.lock().unwrap().len(), 3);
    }
}
