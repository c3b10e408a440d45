//! The background job that expires transactions left pending for too long.

use std::time::Duration;

use rusqlite::Connection;
use time::OffsetDateTime;
use tokio::{sync::watch, time::MissedTickBehavior};

use crate::{
    AppState, Error,
    transaction::{
        TransactionId, TransactionStatus, get_transactions_by_status, transition_status,
    },
    user::{UserID, get_user_by_id},
    webhook::{EnqueueOutcome, WebhookNotification, WebhookPayload},
};

/// How often the sweeper runs and how old a pending transaction must be to expire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweeperConfig {
    /// The time between sweeps.
    pub interval: Duration,
    /// Pending transactions older than this are expired.
    pub pending_ttl: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            pending_ttl: Duration::from_secs(15 * 60),
        }
    }
}

/// What a single sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// The number of transactions moved from pending to expired.
    pub expired: usize,
    /// The number of expiry notifications handed to the webhook worker.
    pub notifications_queued: usize,
    /// The number of expiry notifications dropped because the queue was full or closed.
    pub notifications_dropped: usize,
}

#[derive(Debug, Clone, PartialEq)]
struct ExpiredTransaction {
    transaction_id: TransactionId,
    user_id: UserID,
    webhook_url: Option<String>,
}

/// Expire every pending transaction created more than `pending_ttl` before `now`.
///
/// Each row is updated on its own, so a failure part way through keeps the rows already
/// expired. Rows that stopped being pending since they were read are skipped.
fn expire_stale_transactions(
    now: OffsetDateTime,
    pending_ttl: Duration,
    connection: &Connection,
) -> Result<Vec<ExpiredTransaction>, Error> {
    let mut expired = Vec::new();

    for transaction in get_transactions_by_status(TransactionStatus::Pending, connection)? {
        if now - transaction.created_at <= pending_ttl {
            continue;
        }

        match transition_status(
            transaction.id,
            TransactionStatus::Pending,
            TransactionStatus::Expired,
            connection,
        ) {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(
                    "Transaction {} left pending before it could be expired",
                    transaction.id
                );
                continue;
            }
            Err(error) => {
                tracing::error!("Could not expire transaction {}: {error}", transaction.id);
                continue;
            }
        }

        tracing::info!("Expired transaction {}", transaction.id);

        let webhook_url = match get_user_by_id(transaction.user_id, connection) {
            Ok(user) => user.webhook_url,
            Err(error) => {
                tracing::warn!(
                    "Could not look up the owner of expired transaction {}: {error}",
                    transaction.id
                );
                None
            }
        };

        expired.push(ExpiredTransaction {
            transaction_id: transaction.id,
            user_id: transaction.user_id,
            webhook_url,
        });
    }

    Ok(expired)
}

/// Run one sweep at time `now`.
///
/// Stale transactions are expired first. Then, with the database lock released, a notification
/// is queued for each expired transaction whose owner has a webhook URL.
///
/// # Errors
/// Returns an error if the database lock cannot be acquired or the pending transactions cannot
/// be read.
pub fn sweep_once(
    state: &AppState,
    pending_ttl: Duration,
    now: OffsetDateTime,
) -> Result<SweepReport, Error> {
    let expired = {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        expire_stale_transactions(now, pending_ttl, &connection)?
    };

    let mut report = SweepReport {
        expired: expired.len(),
        ..Default::default()
    };

    for transaction in expired {
        let Some(url) = transaction.webhook_url else {
            tracing::debug!(
                "User {} has no webhook for transaction {}",
                transaction.user_id,
                transaction.transaction_id
            );
            continue;
        };

        let notification = WebhookNotification {
            url,
            payload: WebhookPayload {
                transaction_id: transaction.transaction_id,
                status: TransactionStatus::Expired,
            },
        };

        match state.webhook_queue.enqueue(notification) {
            EnqueueOutcome::Queued => report.notifications_queued += 1,
            EnqueueOutcome::QueueFull | EnqueueOutcome::Closed => {
                report.notifications_dropped += 1
            }
        }
    }

    Ok(report)
}

/// Sweep on every tick of `config.interval` until `shutdown` changes or its sender is dropped.
pub async fn run_sweeper(
    state: AppState,
    config: SweeperConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(config.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        "Sweeper started: every {:?}, expiring transactions pending for more than {:?}",
        config.interval,
        config.pending_ttl
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match sweep_once(&state, config.pending_ttl, OffsetDateTime::now_utc()) {
                    Ok(report) if report == SweepReport::default() => {
                        tracing::debug!("Sweep found nothing to expire");
                    }
                    Ok(report) => tracing::info!(
                        "Sweep expired {} transactions, queued {} notifications, dropped {}",
                        report.expired,
                        report.notifications_queued,
                        report.notifications_dropped
                    ),
                    Err(error) => tracing::error!("Sweep failed: {error}"),
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    tracing::info!("Sweeper stopped");
}
