use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{DailyRecord, NewDailyRecord};

use super::schema::SCHEMA;

const DATE_FORMAT: &str = "%Y-%m-%d";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Repository {
    conn: Connection,
}

impl Repository {
    /// Opens the database without touching the schema; call
    /// [`Repository::ensure_schema`] before writing.
    pub async fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        // Other runs may hold the write lock; wait instead of failing.
        conn.call(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Inserts the record, or overwrites the mutable columns of the row that
    /// already holds its date. Returns the row id, which is stable across
    /// reruns for the same date.
    pub async fn upsert_record(&self, record: NewDailyRecord) -> Result<i64> {
        let id = self
            .conn
            .call(move |conn| {
                let id = conn.query_row(
                    r#"INSERT INTO apod_data (title, explanation, url, date, media_type)
                       VALUES (?1, ?2, ?3, ?4, ?5)
                       ON CONFLICT(date) DO UPDATE SET
                           title = excluded.title,
                           explanation = excluded.explanation,
                           url = excluded.url,
                           media_type = excluded.media_type
                       RETURNING id"#,
                    params![
                        record.title,
                        record.explanation,
                        record.url,
                        record.date.format(DATE_FORMAT).to_string(),
                        record.media_type,
                    ],
                    |row| row.get(0),
                )?;
                Ok(id)
            })
            .await?;
        Ok(id)
    }

    pub async fn get_by_date(&self, date: NaiveDate) -> Result<Option<DailyRecord>> {
        let record = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, title, explanation, url, date, media_type, created_at FROM apod_data WHERE date = ?1",
                )?;
                let record = stmt
                    .query_row(params![date.format(DATE_FORMAT).to_string()], record_from_row)
                    .optional()?;
                Ok(record)
            })
            .await?;
        Ok(record)
    }

    pub async fn recent_records(&self, limit: usize) -> Result<Vec<DailyRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, title, explanation, url, date, media_type, created_at FROM apod_data ORDER BY date DESC LIMIT ?1",
                )?;
                let records = stmt
                    .query_map(params![limit], record_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await?;
        Ok(records)
    }

    #[allow(dead_code)]
    pub async fn count_for_date(&self, date: NaiveDate) -> Result<i64> {
        let count = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM apod_data WHERE date = ?1",
                    params![date.format(DATE_FORMAT).to_string()],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // SQLite datetime('now') format (e.g., "2024-01-01 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn record_from_row(row: &Row) -> rusqlite::Result<DailyRecord> {
    let date: String = row.get(4)?;
    let date = NaiveDate::parse_from_str(&date, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    let created_at: String = row.get(6)?;

    Ok(DailyRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        explanation: row.get(2)?,
        url: row.get(3)?,
        date,
        media_type: row.get(5)?,
        created_at: parse_datetime(&created_at).unwrap_or_else(Utc::now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio_test::assert_ok;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    fn record(title: &str, date: &str) -> NewDailyRecord {
        NewDailyRecord {
            title: title.to_string(),
            explanation: Some("B".to_string()),
            url: Some("http://x".to_string()),
            date: day(date),
            media_type: "image".to_string(),
        }
    }

    async fn open_temp() -> (TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apod.db");
        let repo = Repository::open(path.to_str().unwrap()).await.unwrap();
        repo.ensure_schema().await.unwrap();
        (dir, repo)
    }

    async fn table_sql(repo: &Repository) -> String {
        repo.conn
            .call(|conn| {
                let sql: String = conn.query_row(
                    "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = 'apod_data'",
                    [],
                    |row| row.get(0),
                )?;
                Ok(sql)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn ensure_schema_is_idempotent() {
        let (_dir, repo) = open_temp().await;
        let before = table_sql(&repo).await;

        for _ in 0..3 {
            assert_ok!(repo.ensure_schema().await);
        }

        assert_eq!(table_sql(&repo).await, before);
    }

    #[tokio::test]
    async fn insert_then_read_back() {
        let (_dir, repo) = open_temp().await;

        let id = repo.upsert_record(record("A", "2024-01-01")).await.unwrap();
        let stored = repo.get_by_date(day("2024-01-01")).await.unwrap().unwrap();

        assert_eq!(stored.id, id);
        assert_eq!(stored.title, "A");
        assert_eq!(stored.explanation.as_deref(), Some("B"));
        assert_eq!(stored.url.as_deref(), Some("http://x"));
        assert_eq!(stored.media_type.as_deref(), Some("image"));
    }

    #[tokio::test]
    async fn rerun_for_same_date_overwrites_in_place() {
        let (_dir, repo) = open_temp().await;

        let first_id = repo.upsert_record(record("A", "2024-01-01")).await.unwrap();
        let first = repo.get_by_date(day("2024-01-01")).await.unwrap().unwrap();

        let mut update = record("A2", "2024-01-01");
        update.explanation = None;
        update.media_type = "video".to_string();
        let second_id = repo.upsert_record(update).await.unwrap();

        let second = repo.get_by_date(day("2024-01-01")).await.unwrap().unwrap();
        assert_eq!(second_id, first_id);
        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.title, "A2");
        assert_eq!(second.explanation, None);
        assert_eq!(second.media_type.as_deref(), Some("video"));
        assert_eq!(repo.count_for_date(day("2024-01-01")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn distinct_dates_get_distinct_rows() {
        let (_dir, repo) = open_temp().await;

        let a = repo.upsert_record(record("A", "2024-01-01")).await.unwrap();
        let b = repo.upsert_record(record("B", "2024-01-02")).await.unwrap();
        assert_ne!(a, b);

        let recent = repo.recent_records(10).await.unwrap();
        let dates: Vec<_> = recent.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![day("2024-01-02"), day("2024-01-01")]);

        assert_eq!(repo.recent_records(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_writers_never_duplicate_a_date() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apod.db");
        let path = path.to_str().unwrap();

        let first = Repository::open(path).await.unwrap();
        let second = Repository::open(path).await.unwrap();
        first.ensure_schema().await.unwrap();
        second.ensure_schema().await.unwrap();

        let (a, b) = tokio::join!(
            first.upsert_record(record("from first", "2024-03-03")),
            second.upsert_record(record("from second", "2024-03-03")),
        );

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(first.count_for_date(day("2024-03-03")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_date_reads_as_none() {
        let (_dir, repo) = open_temp().await;
        assert!(repo.get_by_date(day("1999-12-31")).await.unwrap().is_none());
        assert_eq!(repo.count_for_date(day("1999-12-31")).await.unwrap(), 0);
    }
}
