use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::storage::{RecordStore, RepairerRecord};

/// Local SQLite-backed record store.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = r#"
    PRAGMA journal_mode=WAL;
    CREATE TABLE IF NOT EXISTS repairers (
        name              TEXT NOT NULL,
        postal_code       TEXT NOT NULL,
        address           TEXT NOT NULL,
        city              TEXT NOT NULL,
        phone             TEXT,
        email             TEXT,
        website           TEXT,
        description       TEXT,
        services          TEXT NOT NULL,
        price_range       TEXT,
        lat               REAL,
        lng               REAL,
        confidence_score  REAL NOT NULL,
        ai_enriched       INTEGER NOT NULL,
        source            TEXT NOT NULL,
        scraped_at        TEXT NOT NULL,
        UNIQUE (name, postal_code)
    );
"#;

impl SqliteRecordStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| PipelineError::Store("sqlite connection lock poisoned".to_string()))
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<(RepairerRecord, String, String)> {
    let services: String = row.get(8)?;
    let scraped_at: String = row.get(15)?;
    let record = RepairerRecord {
        name: row.get(0)?,
        postal_code: row.get(1)?,
        address: row.get(2)?,
        city: row.get(3)?,
        phone: row.get(4)?,
        email: row.get(5)?,
        website: row.get(6)?,
        description: row.get(7)?,
        services: Vec::new(),
        price_range: row.get(9)?,
        lat: row.get(10)?,
        lng: row.get(11)?,
        confidence_score: row.get(12)?,
        ai_enriched: row.get::<_, i64>(13)? != 0,
        source: row.get(14)?,
        scraped_at: Utc::now(),
    };
    Ok((record, services, scraped_at))
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn upsert(&self, record: &RepairerRecord) -> Result<()> {
        let services = serde_json::to_string(&record.services)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO repairers (name, postal_code, address, city, phone, email, website, description,
                                    services, price_range, lat, lng, confidence_score, ai_enriched, source, scraped_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
             ON CONFLICT(name, postal_code) DO UPDATE SET
                address=excluded.address, city=excluded.city, phone=excluded.phone, email=excluded.email,
                website=excluded.website, description=excluded.description, services=excluded.services,
                price_range=excluded.price_range, lat=excluded.lat, lng=excluded.lng,
                confidence_score=excluded.confidence_score, ai_enriched=excluded.ai_enriched,
                source=excluded.source, scraped_at=excluded.scraped_at",
            params![
                record.name,
                record.postal_code,
                record.address,
                record.city,
                record.phone,
                record.email,
                record.website,
                record.description,
                services,
                record.price_range,
                record.lat,
                record.lng,
                record.confidence_score,
                record.ai_enriched as i64,
                record.source,
                record.scraped_at.to_rfc3339(),
            ],
        )?;
        debug!(
            name = %record.name,
            postal_code = %record.postal_code,
            "Upserted record into sqlite"
        );
        Ok(())
    }

    async fn get(&self, name: &str, postal_code: &str) -> Result<Option<RepairerRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT name, postal_code, address, city, phone, email, website, description, services,
                    price_range, lat, lng, confidence_score, ai_enriched, source, scraped_at
             FROM repairers WHERE name = ?1 AND postal_code = ?2",
        )?;
        let row = stmt
            .query_row(params![name, postal_code], row_to_record)
            .optional()?;
        let Some((mut record, services, scraped_at)) = row else {
            return Ok(None);
        };
        record.services = serde_json::from_str(&services)?;
        record.scraped_at = DateTime::parse_from_rfc3339(&scraped_at)
            .map_err(|e| PipelineError::Store(format!("bad scraped_at '{}': {}", scraped_at, e)))?
            .with_timezone(&Utc);
        Ok(Some(record))
    }

    async fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM repairers", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}
