//! Asynchronous durable writer.
//!
//! A single background task owns the only connection to the store. The
//! stream callback enqueues write requests through a bounded channel and
//! never blocks: when the queue is full the write is dropped and counted.
//! Natural-key conflicts are suppressed with `INSERT OR IGNORE`, so a
//! later snapshot of the same segment makes a dropped write harmless.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sqlx::{Connection, SqliteConnection};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use super::schema::ensure_schema;
use super::{connect, StoreError};

/// Log every Nth dropped write.
const DROP_LOG_EVERY: u64 = 100;

/// One snapshot row, shared by both prediction tables.
#[derive(Debug, Clone)]
pub struct PredictionRecord {
    pub rid: String,
    pub ssd: Option<String>,
    pub first: String,
    pub second: String,

    pub planned_dep: Option<String>,
    pub dep_time: Option<String>,
    pub dep_time_kind: String,
    pub has_actual_dep: bool,
    pub actual_dep_confirmed: Option<String>,

    pub departure_delay: f64,
    pub dwell_delay: f64,

    pub peak: i64,
    pub day_of_week: String,
    pub day_of_month: i64,
    pub hour_of_day: i64,
    pub weekend: i64,
    pub season: String,
    pub month: i64,
    pub holiday: i64,

    pub predicted_delay: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Table {
    PredictionsAll,
    PredictionsActual,
}

impl Table {
    fn name(&self) -> &'static str {
        match self {
            Table::PredictionsAll => "predictions_all",
            Table::PredictionsActual => "predictions_actual",
        }
    }
}

struct WriteRequest {
    table: Table,
    record: PredictionRecord,
}

/// Handle to the background writer. Dropping the handle (or calling
/// [`RealtimeStore::close`]) closes the queue, which is the writer's
/// shutdown sentinel.
pub struct RealtimeStore {
    tx: Option<mpsc::Sender<WriteRequest>>,
    handle: Option<JoinHandle<()>>,
    discard: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
}

impl RealtimeStore {
    /// Open the store and spawn the writer task. Schema errors surface
    /// here, before any frame is processed.
    pub async fn open(db_path: &Path, queue_size: usize) -> Result<Self, StoreError> {
        let mut conn = connect(db_path, Duration::from_secs(5)).await?;
        ensure_schema(&mut conn).await?;

        let (tx, rx) = mpsc::channel(queue_size);
        let discard = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(writer_loop(conn, rx, discard.clone()));

        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
            discard,
            dropped: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Enqueue a snapshot for `predictions_all`. Returns false when the
    /// queue is full or the store is closed.
    pub fn insert_all(&self, record: PredictionRecord) -> bool {
        self.enqueue(Table::PredictionsAll, record)
    }

    /// Enqueue a confirmed-departure snapshot for `predictions_actual`.
    pub fn insert_actual(&self, record: PredictionRecord) -> bool {
        self.enqueue(Table::PredictionsActual, record)
    }

    /// Total writes dropped because the queue was full.
    pub fn dropped_writes(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn enqueue(&self, table: Table, record: PredictionRecord) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };

        match tx.try_send(WriteRequest { table, record }) {
            Ok(()) => true,
            Err(_) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if total % DROP_LOG_EVERY == 1 {
                    warn!(total, table = table.name(), "Writer queue full, dropping write");
                }
                false
            }
        }
    }

    /// Stop the writer. With `drain` the queued items are written first;
    /// without it they are discarded. Waits at most `join_timeout` for
    /// the writer task to finish.
    pub async fn close(&mut self, drain: bool, join_timeout: Duration) {
        if !drain {
            self.discard.store(true, Ordering::Relaxed);
        }

        // Dropping the sender is the shutdown sentinel: the writer exits
        // once the remaining queue is consumed.
        self.tx.take();

        if let Some(handle) = self.handle.take() {
            if tokio::time::timeout(join_timeout, handle).await.is_err() {
                warn!("Writer did not finish within the join timeout");
            }
        }
    }
}

async fn writer_loop(
    mut conn: SqliteConnection,
    mut rx: mpsc::Receiver<WriteRequest>,
    discard: Arc<AtomicBool>,
) {
    while let Some(req) = rx.recv().await {
        if discard.load(Ordering::Relaxed) {
            continue;
        }
        if let Err(e) = insert(&mut conn, &req).await {
            // Conflicts are already suppressed by INSERT OR IGNORE, so
            // anything surfacing here is a real store problem.
            error!(table = req.table.name(), error = %e, "Store insert failed");
        }
    }

    if let Err(e) = conn.close().await {
        error!(error = %e, "Failed to close store connection");
    }
}

async fn insert(conn: &mut SqliteConnection, req: &WriteRequest) -> Result<(), sqlx::Error> {
    let sql = format!(
        r#"
        INSERT OR IGNORE INTO {} (
            rid, ssd, first, second,
            planned_dep, dep_time, dep_time_kind, has_actual_dep, actual_dep_confirmed,
            departure_delay, dwell_delay,
            peak, day_of_week, day_of_month, hour_of_day, weekend, season, month, holiday,
            predicted_delay
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        req.table.name()
    );

    let r = &req.record;
    sqlx::query(&sql)
        .bind(&r.rid)
        .bind(&r.ssd)
        .bind(&r.first)
        .bind(&r.second)
        .bind(&r.planned_dep)
        .bind(&r.dep_time)
        .bind(&r.dep_time_kind)
        .bind(r.has_actual_dep)
        .bind(&r.actual_dep_confirmed)
        .bind(r.departure_delay)
        .bind(r.dwell_delay)
        .bind(r.peak)
        .bind(&r.day_of_week)
        .bind(r.day_of_month)
        .bind(r.hour_of_day)
        .bind(r.weekend)
        .bind(&r.season)
        .bind(r.month)
        .bind(r.holiday)
        .bind(r.predicted_delay)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::PredictionRecord;

    pub fn record(rid: &str) -> PredictionRecord {
        PredictionRecord {
            rid: rid.to_string(),
            ssd: Some("2025-04-10".to_string()),
            first: "SOTON".to_string(),
            second: "SOTPKWY".to_string(),
            planned_dep: Some("09:00".to_string()),
            dep_time: Some("09:03".to_string()),
            dep_time_kind: "estimate".to_string(),
            has_actual_dep: false,
            actual_dep_confirmed: None,
            departure_delay: 3.0,
            dwell_delay: 0.0,
            peak: 1,
            day_of_week: "Thursday".to_string(),
            day_of_month: 10,
            hour_of_day: 9,
            weekend: 0,
            season: "Spring".to_string(),
            month: 4,
            holiday: 0,
            predicted_delay: 2.5,
        }
    }
}
