use crate::config::OutboxConfig;
use crate::entities::outbox_event::{self, Entity as OutboxEvent};
use crate::errors::ServiceError;
use crate::events::{OutboundEvent, ORDER_MIRROR_EVENT};
use crate::integrations::shipstation::{CreateOrderRequest, ShippingPlatform};
use chrono::Utc;
use metrics::counter;
use rand::Rng;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const BASE_BACKOFF_SECS: u64 = 2;
const MAX_BACKOFF_SECS: u64 = 3600;
/// Rows left in `processing` longer than this are assumed orphaned by a crashed worker.
const PROCESSING_LEASE_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxStatus {
    Pending,
    Processing,
    Delivered,
    Failed,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Processing => "processing",
            OutboxStatus::Delivered => "delivered",
            OutboxStatus::Failed => "failed",
        }
    }
}

/// Enqueue an event into the outbox table. Pass the open transaction so the
/// row commits or rolls back with the write that produced it.
pub async fn enqueue(
    db: &impl ConnectionTrait,
    aggregate_type: &str,
    aggregate_id: Option<Uuid>,
    event_type: &str,
    payload: &Value,
) -> Result<Uuid, ServiceError> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    outbox_event::ActiveModel {
        id: Set(id),
        aggregate_type: Set(aggregate_type.to_string()),
        aggregate_id: Set(aggregate_id),
        event_type: Set(event_type.to_string()),
        payload: Set(payload.clone()),
        status: Set(OutboxStatus::Pending.as_str().to_string()),
        attempts: Set(0),
        available_at: Set(now),
        last_error: Set(None),
        processed_at: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;

    debug!(
        "enqueued outbox event {} type={} agg={}",
        id, event_type, aggregate_type
    );
    Ok(id)
}

pub async fn enqueue_event(
    db: &impl ConnectionTrait,
    event: &OutboundEvent,
) -> Result<Uuid, ServiceError> {
    let (aggregate_type, aggregate_id) = event.aggregate();
    let payload = match event {
        OutboundEvent::MirrorOrder { request, .. } => serde_json::to_value(request)?,
    };
    enqueue(db, aggregate_type, aggregate_id, event.event_type(), &payload).await
}

/// Delay before the next attempt, without jitter: 2s * 2^attempt, capped at one hour.
pub fn backoff(attempt: i32) -> Duration {
    let exponent = attempt.clamp(0, 31) as u32;
    let secs = BASE_BACKOFF_SECS
        .saturating_mul(2u64.saturating_pow(exponent))
        .min(MAX_BACKOFF_SECS);
    Duration::from_secs(secs)
}

/// Counts from one pass over the outbox
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DrainStats {
    pub claimed: usize,
    pub delivered: usize,
    pub rescheduled: usize,
    pub failed: usize,
    pub reclaimed: u64,
}

/// Drains pending outbox rows into the shipping platform.
#[derive(Clone)]
pub struct OutboxDispatcher {
    db: Arc<DatabaseConnection>,
    shipping: Arc<dyn ShippingPlatform>,
    config: OutboxConfig,
}

impl OutboxDispatcher {
    pub fn new(
        db: Arc<DatabaseConnection>,
        shipping: Arc<dyn ShippingPlatform>,
        config: OutboxConfig,
    ) -> Self {
        Self {
            db,
            shipping,
            config,
        }
    }

    /// Returns processing rows whose lease expired to `pending`.
    async fn reclaim_stale(&self) -> Result<u64, ServiceError> {
        let cutoff = Utc::now() - chrono::Duration::seconds(PROCESSING_LEASE_SECS);
        let result = OutboxEvent::update_many()
            .col_expr(
                outbox_event::Column::Status,
                Expr::value(OutboxStatus::Pending.as_str()),
            )
            .col_expr(outbox_event::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(outbox_event::Column::Status.eq(OutboxStatus::Processing.as_str()))
            .filter(outbox_event::Column::UpdatedAt.lt(cutoff))
            .exec(self.db.as_ref())
            .await?;
        if result.rows_affected > 0 {
            warn!(count = result.rows_affected, "reclaimed stale outbox rows");
        }
        Ok(result.rows_affected)
    }

    /// Moves a row from pending to processing. False when another worker got there first.
    async fn claim(&self, row: &outbox_event::Model) -> Result<bool, ServiceError> {
        let result = OutboxEvent::update_many()
            .col_expr(
                outbox_event::Column::Status,
                Expr::value(OutboxStatus::Processing.as_str()),
            )
            .col_expr(
                outbox_event::Column::Attempts,
                Expr::col(outbox_event::Column::Attempts).add(1),
            )
            .col_expr(outbox_event::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(outbox_event::Column::Id.eq(row.id))
            .filter(outbox_event::Column::Status.eq(OutboxStatus::Pending.as_str()))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn dispatch(&self, row: &outbox_event::Model) -> Result<(), ServiceError> {
        match row.event_type.as_str() {
            ORDER_MIRROR_EVENT => {
                let request: CreateOrderRequest = serde_json::from_value(row.payload.clone())?;
                let created = self.shipping.create_order(&request).await?;
                info!(
                    order_number = %request.order_number,
                    platform_order_id = ?created.order_id,
                    "order mirrored to shipping platform"
                );
                Ok(())
            }
            other => Err(ServiceError::InternalError(format!(
                "no handler for outbox event type {}",
                other
            ))),
        }
    }

    async fn mark_delivered(&self, id: Uuid) -> Result<(), ServiceError> {
        let now = Utc::now();
        OutboxEvent::update_many()
            .col_expr(
                outbox_event::Column::Status,
                Expr::value(OutboxStatus::Delivered.as_str()),
            )
            .col_expr(outbox_event::Column::ProcessedAt, Expr::value(Some(now)))
            .col_expr(outbox_event::Column::UpdatedAt, Expr::value(Some(now)))
            .col_expr(outbox_event::Column::LastError, Expr::value(Option::<String>::None))
            .filter(outbox_event::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    /// Reschedules with backoff, or gives up once attempts are spent or the
    /// error cannot improve with time. Returns the status written.
    async fn mark_failed_attempt(
        &self,
        id: Uuid,
        attempts: i32,
        err: &ServiceError,
    ) -> Result<OutboxStatus, ServiceError> {
        let now = Utc::now();
        let give_up = attempts >= self.config.max_attempts || !err.is_transient();
        let mut update = OutboxEvent::update_many()
            .col_expr(outbox_event::Column::UpdatedAt, Expr::value(Some(now)))
            .col_expr(
                outbox_event::Column::LastError,
                Expr::value(Some(err.to_string())),
            )
            .filter(outbox_event::Column::Id.eq(id));

        let status = if give_up {
            OutboxStatus::Failed
        } else {
            let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..1000));
            let delay = chrono::Duration::from_std(backoff(attempts) + jitter)
                .unwrap_or_else(|_| chrono::Duration::seconds(MAX_BACKOFF_SECS as i64));
            update = update.col_expr(outbox_event::Column::AvailableAt, Expr::value(now + delay));
            OutboxStatus::Pending
        };

        update
            .col_expr(outbox_event::Column::Status, Expr::value(status.as_str()))
            .exec(self.db.as_ref())
            .await?;
        Ok(status)
    }

    /// One pass: reclaim expired leases, then claim and dispatch up to `batch_size` due rows.
    pub async fn drain_once(&self) -> Result<DrainStats, ServiceError> {
        let mut stats = DrainStats {
            reclaimed: self.reclaim_stale().await?,
            ..Default::default()
        };

        let due = OutboxEvent::find()
            .filter(outbox_event::Column::Status.eq(OutboxStatus::Pending.as_str()))
            .filter(outbox_event::Column::AvailableAt.lte(Utc::now()))
            .order_by_asc(outbox_event::Column::CreatedAt)
            .limit(self.config.batch_size)
            .all(self.db.as_ref())
            .await?;

        for row in due {
            if !self.claim(&row).await? {
                continue;
            }
            stats.claimed += 1;
            let attempts = row.attempts + 1;

            match self.dispatch(&row).await {
                Ok(()) => {
                    self.mark_delivered(row.id).await?;
                    counter!("threepl_outbox_dispatch_total", 1, "result" => "delivered");
                    stats.delivered += 1;
                }
                Err(e) => {
                    warn!(outbox_id = %row.id, attempts, error = %e, "outbox dispatch failed");
                    match self.mark_failed_attempt(row.id, attempts, &e).await? {
                        OutboxStatus::Failed => {
                            error!(outbox_id = %row.id, "outbox event abandoned");
                            counter!("threepl_outbox_dispatch_total", 1, "result" => "failed");
                            stats.failed += 1;
                        }
                        _ => {
                            counter!("threepl_outbox_dispatch_total", 1, "result" => "retry");
                            stats.rescheduled += 1;
                        }
                    }
                }
            }
        }

        Ok(stats)
    }
}

/// Background worker that polls the outbox until the task is aborted.
pub fn start_worker(dispatcher: OutboxDispatcher, poll_interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("outbox worker started");
        loop {
            match dispatcher.drain_once().await {
                Ok(stats) if stats.claimed > 0 => debug!(?stats, "outbox pass complete"),
                Ok(_) => {}
                Err(e) => error!("outbox worker error: {}", e),
            }
            sleep(poll_interval).await;
        }
    })
}
