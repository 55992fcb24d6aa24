//! Schema management: create tables if missing and apply additive column
//! migrations. Safe to run on every startup.

use sqlx::{Row, SqliteConnection};

const CREATE_PREDICTIONS_ALL: &str = r#"
CREATE TABLE IF NOT EXISTS predictions_all (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at_utc TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),

    rid TEXT NOT NULL,
    ssd TEXT,
    first TEXT NOT NULL,
    second TEXT NOT NULL,

    planned_dep TEXT,
    dep_time TEXT,
    dep_time_kind TEXT,
    has_actual_dep INTEGER NOT NULL,
    actual_dep_confirmed TEXT,

    departure_delay REAL,
    dwell_delay REAL,

    peak INTEGER,
    day_of_week TEXT,
    day_of_month INTEGER,
    hour_of_day INTEGER,
    weekend INTEGER,
    season TEXT,
    month INTEGER,
    holiday INTEGER,

    predicted_delay REAL,

    UNIQUE(rid, first, second, planned_dep)
)
"#;

const CREATE_PREDICTIONS_ACTUAL: &str = r#"
CREATE TABLE IF NOT EXISTS predictions_actual (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at_utc TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),

    rid TEXT NOT NULL,
    ssd TEXT,
    first TEXT NOT NULL,
    second TEXT NOT NULL,

    planned_dep TEXT,
    dep_time TEXT,
    dep_time_kind TEXT,
    has_actual_dep INTEGER NOT NULL,
    actual_dep_confirmed TEXT,

    departure_delay REAL,
    dwell_delay REAL,

    peak INTEGER,
    day_of_week TEXT,
    day_of_month INTEGER,
    hour_of_day INTEGER,
    weekend INTEGER,
    season TEXT,
    month INTEGER,
    holiday INTEGER,

    predicted_delay REAL,

    UNIQUE(rid, first, second, planned_dep)
)
"#;

const CREATE_ACTUAL_ARRIVALS_HSP: &str = r#"
CREATE TABLE IF NOT EXISTS actual_arrivals_hsp (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at_utc TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),

    rid TEXT NOT NULL,
    ssd TEXT,
    first TEXT NOT NULL,
    second TEXT NOT NULL,
    planned_dep TEXT,

    is_main_journey INTEGER NOT NULL DEFAULT 0,

    predicted_delay REAL,

    planned_arr TEXT,
    actual_arr TEXT,
    actual_arr_delay REAL,

    toc_code TEXT,
    hsp_location_crs TEXT,
    hsp_tpls TEXT,

    UNIQUE(rid, first, second, planned_dep)
)
"#;

/// Columns added to `actual_arrivals_hsp` after its first release. Kept
/// so that databases created before a column existed migrate in place.
const HSP_ADDITIVE_COLUMNS: &[(&str, &str)] = &[
    ("is_main_journey", "is_main_journey INTEGER NOT NULL DEFAULT 0"),
    ("predicted_delay", "predicted_delay REAL"),
    ("planned_arr", "planned_arr TEXT"),
    ("actual_arr", "actual_arr TEXT"),
    ("actual_arr_delay", "actual_arr_delay REAL"),
    ("toc_code", "toc_code TEXT"),
    ("hsp_location_crs", "hsp_location_crs TEXT"),
    ("hsp_tpls", "hsp_tpls TEXT"),
];

async fn column_exists(
    conn: &mut SqliteConnection,
    table: &str,
    column: &str,
) -> Result<bool, sqlx::Error> {
    let rows = sqlx::query(&format!("PRAGMA table_info({table})"))
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.iter().any(|r| r.get::<String, _>("name") == column))
}

async fn add_column_if_missing(
    conn: &mut SqliteConnection,
    table: &str,
    column: &str,
    column_def: &str,
) -> Result<(), sqlx::Error> {
    if !column_exists(conn, table, column).await? {
        sqlx::query(&format!("ALTER TABLE {table} ADD COLUMN {column_def}"))
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Ensure all tables exist and apply additive migrations. Idempotent.
pub async fn ensure_schema(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_PREDICTIONS_ALL).execute(&mut *conn).await?;
    sqlx::query(CREATE_PREDICTIONS_ACTUAL)
        .execute(&mut *conn)
        .await?;
    sqlx::query(CREATE_ACTUAL_ARRIVALS_HSP)
        .execute(&mut *conn)
        .await?;

    for (column, column_def) in HSP_ADDITIVE_COLUMNS {
        add_column_if_missing(conn, "actual_arrivals_hsp", column, column_def).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::connect;
    use std::time::Duration;

    #[tokio::test]
    async fn ensure_schema_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = connect(&dir.path().join("test.db"), Duration::from_secs(5))
            .await
            .unwrap();

        ensure_schema(&mut conn).await.unwrap();
        ensure_schema(&mut conn).await.unwrap();

        for table in ["predictions_all", "predictions_actual", "actual_arrivals_hsp"] {
            assert!(column_exists(&mut conn, table, "rid").await.unwrap());
        }
    }

    #[tokio::test]
    async fn additive_migration_adds_missing_columns() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = connect(&dir.path().join("test.db"), Duration::from_secs(5))
            .await
            .unwrap();

        // Simulate a database created before the additive columns existed.
        sqlx::query(
            r#"
            CREATE TABLE actual_arrivals_hsp (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at_utc TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
                rid TEXT NOT NULL,
                ssd TEXT,
                first TEXT NOT NULL,
                second TEXT NOT NULL,
                planned_dep TEXT,
                UNIQUE(rid, first, second, planned_dep)
            )
            "#,
        )
        .execute(&mut conn)
        .await
        .unwrap();

        sqlx::query("INSERT INTO actual_arrivals_hsp (rid, first, second, planned_dep) VALUES ('R1','A','B','10:00')")
            .execute(&mut conn)
            .await
            .unwrap();

        ensure_schema(&mut conn).await.unwrap();

        assert!(column_exists(&mut conn, "actual_arrivals_hsp", "actual_arr_delay")
            .await
            .unwrap());

        // Existing data survives the migration.
        let row = sqlx::query("SELECT rid, is_main_journey FROM actual_arrivals_hsp")
            .fetch_one(&mut conn)
            .await
            .unwrap();
        assert_eq!(row.get::<String, _>("rid"), "R1");
        assert_eq!(row.get::<i64, _>("is_main_journey"), 0);
    }
}
