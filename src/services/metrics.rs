use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_gauge, register_gauge_vec, CounterVec, Gauge, GaugeVec};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::models::{link::AppliedLinks, student::StudentStatus};

lazy_static! {
    // ── Event counters ──────────────────────────────────────────────────────
    pub static ref LOGINS_COUNTER: CounterVec = register_counter_vec!(
        "api_logins_total",
        "Login attempts by outcome",
        &["status"]
    ).unwrap();

    pub static ref LINK_OPS_COUNTER: CounterVec = register_counter_vec!(
        "api_link_operations_total",
        "Parent-student link rows written, by operation",
        &["op"]
    ).unwrap();

    // ── Business metrics ────────────────────────────────────────────────────
    pub static ref STUDENTS_GAUGE: GaugeVec = register_gauge_vec!(
        "kindergarten_students_total",
        "Students by status",
        &["status"]
    ).unwrap();

    pub static ref PARENTS_GAUGE: Gauge = register_gauge!(
        "kindergarten_parents_linked_total",
        "Parents linked to at least one active student"
    ).unwrap();
}

/// Count committed link writes.
pub fn record_link_ops(applied: &AppliedLinks) {
    LINK_OPS_COUNTER.with_label_values(&["delete"]).inc_by(applied.deleted as f64);
    LINK_OPS_COUNTER.with_label_values(&["update"]).inc_by(applied.updated as f64);
    LINK_OPS_COUNTER.with_label_values(&["insert"]).inc_by(applied.inserted as f64);
}

/// Spawn the background metrics collector (refreshes every 5 minutes).
pub fn start(pool: PgPool) {
    tokio::spawn(async move {
        // Initial collection on startup
        if let Err(e) = collect(&pool).await {
            warn!("Metrics: initial collection failed: {}", e);
        }
        loop {
            tokio::time::sleep(tokio::time::Duration::from_secs(300)).await;
            if let Err(e) = collect(&pool).await {
                warn!("Metrics: collection failed: {}", e);
            }
        }
    });
}

async fn collect(pool: &PgPool) -> anyhow::Result<()> {
    let by_status: Vec<(StudentStatus, i64)> = sqlx::query_as(
        "SELECT status, COUNT(*)::BIGINT FROM students GROUP BY status",
    )
    .fetch_all(pool)
    .await?;

    // Statuses with no rows must read 0, not keep a stale value
    for status in StudentStatus::ALL {
        let count = by_status
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, c)| *c)
            .unwrap_or(0);
        STUDENTS_GAUGE.with_label_values(&[status.as_str()]).set(count as f64);
    }

    let parents: i64 = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT sp.parent_id)::BIGINT
         FROM student_parents sp
         JOIN students s ON s.id = sp.student_id
         WHERE s.status = 'active'",
    )
    .fetch_one(pool)
    .await?;
    PARENTS_GAUGE.set(parents as f64);

    info!("Metrics: collected");
    Ok(())
}
