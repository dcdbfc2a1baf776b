use saldo_core::{iso, Event, WriteOperation};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::memory::MemoryEventStore;

pub type DbPool = Pool<Sqlite>;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Event payload error: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("Operation on stream '{0}' carries no validity window")]
    MissingValidity(String),
}

pub async fn create_db(path: &Path) -> Result<DbPool, DbError> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            stream TEXT NOT NULL,
            gauge TEXT NOT NULL,
            system TEXT NOT NULL,
            start TEXT NOT NULL,
            stop TEXT NOT NULL,
            payload TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS events_stream_window ON events (stream, start, stop)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sources (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            stream TEXT NOT NULL,
            exec TEXT NOT NULL,
            version TEXT NOT NULL,
            reception_time TEXT NOT NULL,
            generation_time TEXT NOT NULL,
            reported_validity_start TEXT NOT NULL,
            reported_validity_stop TEXT NOT NULL,
            validity_start TEXT NOT NULL,
            validity_stop TEXT NOT NULL,
            completeness_check INTEGER NOT NULL,
            completeness_message TEXT NOT NULL,
            events INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Applies every operation in order inside one transaction, so a batch
/// lands entirely or not at all.
pub async fn apply_operations(pool: &DbPool, operations: &[WriteOperation]) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    for op in operations {
        let validity = op
            .validity()
            .ok_or_else(|| DbError::MissingValidity(op.stream().to_string()))?;
        let (start, stop) = (iso(validity.start), iso(validity.stop));

        let erased = sqlx::query("DELETE FROM events WHERE stream = ? AND start < ? AND stop > ?")
            .bind(op.stream())
            .bind(&stop)
            .bind(&start)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        for event in &op.events {
            let id = event.id.to_string();
            sqlx::query("DELETE FROM events WHERE id = ?")
                .bind(&id)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT INTO events (id, stream, gauge, system, start, stop, payload) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(op.stream())
            .bind(&event.gauge.name)
            .bind(&event.gauge.system)
            .bind(iso(event.start))
            .bind(iso(event.stop))
            .bind(serde_json::to_string(event)?)
            .execute(&mut *tx)
            .await?;
        }

        let source = &op.source;
        sqlx::query(
            r#"
            INSERT INTO sources (
                name, stream, exec, version, reception_time, generation_time,
                reported_validity_start, reported_validity_stop, validity_start, validity_stop,
                completeness_check, completeness_message, events
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&source.name)
        .bind(op.stream())
        .bind(&op.dim_signature.exec)
        .bind(&op.dim_signature.version)
        .bind(iso(source.reception_time))
        .bind(iso(source.generation_time))
        .bind(iso(source.reported_validity_start))
        .bind(iso(source.reported_validity_stop))
        .bind(&start)
        .bind(&stop)
        .bind(source.ingestion_completeness.check)
        .bind(&source.ingestion_completeness.message)
        .bind(op.events.len() as i64)
        .execute(&mut *tx)
        .await?;

        debug!(
            stream = op.stream(),
            window = %validity,
            erased,
            inserted = op.events.len(),
            "Applied operation"
        );
    }

    tx.commit().await?;
    info!(operations = operations.len(), "Committed batch");
    Ok(())
}

/// Every stored event, in write order, ready for querying.
pub async fn load_events(pool: &DbPool) -> Result<MemoryEventStore, DbError> {
    let rows = sqlx::query_as::<_, (String, String)>("SELECT stream, payload FROM events ORDER BY seq")
        .fetch_all(pool)
        .await?;

    let mut store = MemoryEventStore::new();
    for (stream, payload) in rows {
        let event: Event = serde_json::from_str(&payload)?;
        store.insert(stream, event);
    }
    Ok(store)
}

/// Stored payloads of one stream ordered by start, as written.
pub async fn get_payloads(pool: &DbPool, stream: &str) -> Result<Vec<String>, DbError> {
    let rows = sqlx::query_as::<_, (String,)>(
        "SELECT payload FROM events WHERE stream = ? ORDER BY start, seq",
    )
    .bind(stream)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|r| r.0).collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub name: String,
    pub stream: String,
    pub exec: String,
    pub generation_time: String,
    pub completeness_check: bool,
    pub completeness_message: String,
    pub events: i64,
}

pub async fn get_sources(pool: &DbPool) -> Result<Vec<SourceRecord>, DbError> {
    let rows = sqlx::query_as::<_, (String, String, String, String, bool, String, i64)>(
        "SELECT name, stream, exec, generation_time, completeness_check, completeness_message, events FROM sources ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| SourceRecord {
            name: r.0,
            stream: r.1,
            exec: r.2,
            generation_time: r.3,
            completeness_check: r.4,
            completeness_message: r.5,
            events: r.6,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use saldo_core::{
        Attribute, Completeness, DimSignature, EventId, EventQuery, EventStore, Gauge,
        SourceMetadata, WriteMode,
    };

    fn ts(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    fn event(key: &str, day: u32) -> Event {
        Event {
            id: EventId::derive(key),
            gauge: Gauge::new("MOVEMENT", "BANK"),
            start: ts(day),
            stop: ts(day + 1),
            values: vec![Attribute::text("concept", key)],
            links: Vec::new(),
        }
    }

    fn operation(stream: &str, from: u32, to: u32, events: Vec<Event>) -> WriteOperation {
        WriteOperation {
            mode: WriteMode::InsertAndErase,
            dim_signature: DimSignature {
                name: stream.to_string(),
                exec: "test".to_string(),
                version: "1.0".to_string(),
            },
            source: SourceMetadata {
                name: "file".to_string(),
                reception_time: ts(1),
                generation_time: ts(1),
                reported_validity_start: ts(from),
                reported_validity_stop: ts(to),
                validity_start: Some(ts(from)),
                validity_stop: Some(ts(to)),
                ingestion_completeness: Completeness::default(),
            },
            events,
        }
    }

    async fn test_db() -> (tempfile::TempDir, DbPool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = create_db(&dir.path().join("saldo.db")).await.unwrap();
        (dir, pool)
    }

    #[tokio::test]
    async fn insert_and_erase_matches_the_memory_store() {
        let (_dir, pool) = test_db().await;
        let ops = vec![
            operation("S", 1, 10, vec![event("a", 2), event("b", 8), event("c", 12)]),
            operation("S", 5, 9, vec![event("d", 6)]),
        ];
        apply_operations(&pool, &ops).await.unwrap();

        let mut expected = MemoryEventStore::new();
        expected.apply_all(&ops).unwrap();
        assert_eq!(load_events(&pool).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn reapplying_keeps_payloads_identical() {
        let (_dir, pool) = test_db().await;
        let ops = vec![operation("S", 1, 10, vec![event("a", 2), event("b", 3)])];
        apply_operations(&pool, &ops).await.unwrap();
        let first = get_payloads(&pool, "S").await.unwrap();
        apply_operations(&pool, &ops).await.unwrap();
        let second = get_payloads(&pool, "S").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(get_sources(&pool).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_batch_leaves_nothing_behind() {
        let (_dir, pool) = test_db().await;
        let mut broken = operation("S", 1, 10, vec![]);
        broken.source.validity_start = None;
        let ops = vec![operation("S", 1, 10, vec![event("a", 2)]), broken];

        let err = apply_operations(&pool, &ops).await.unwrap_err();
        assert!(matches!(err, DbError::MissingValidity(_)));
        assert!(load_events(&pool).await.unwrap().is_empty());
        assert!(get_sources(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn loaded_store_answers_queries() {
        let (_dir, pool) = test_db().await;
        apply_operations(&pool, &[operation("S", 1, 10, vec![event("a", 2)])])
            .await
            .unwrap();
        let store = load_events(&pool).await.unwrap();
        let found = store.get_events(&EventQuery::gauge("MOVEMENT")).unwrap();
        assert_eq!(found, vec![event("a", 2)]);
    }

    #[tokio::test]
    async fn float_amounts_survive_storage_bit_for_bit() {
        let (_dir, pool) = test_db().await;
        let mut e = event("a", 2);
        e.values.push(Attribute::double("amount", -0.1 + -0.2));
        apply_operations(&pool, &[operation("S", 1, 10, vec![e])]).await.unwrap();

        let store = load_events(&pool).await.unwrap();
        let found = store.get_events(&EventQuery::gauge("MOVEMENT")).unwrap();
        assert_eq!(found[0].double("amount"), Some(-0.30000000000000004));
    }
}
