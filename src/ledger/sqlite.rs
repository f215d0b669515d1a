//! SQLite-backed device ledger
//!
//! The `clocksync_device` table has columns `dev_eui` (8-byte blob, primary
//! key), `created_at`, `updated_at` and `last_sync_at` (RFC 3339 text with
//! millisecond precision, `last_sync_at` nullable).

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{ClocksyncDevice, DeviceLedger};
use crate::core::{DevEui, Error, Result};

/// Current schema version
const CURRENT_VERSION: i32 = 1;

/// Durable ledger backed by `SQLite`
///
/// Queries run on the blocking thread pool so a slow disk never stalls the
/// async runtime.
#[derive(Debug, Clone)]
pub struct SqliteLedger {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedger {
    /// Opens the ledger at `path`, creating and migrating it as needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Opens an in-memory ledger (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrate(&conn)?;
        Ok(SqliteLedger {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = lock(&conn)?;
            f(&guard)
        })
        .await
        .map_err(|e| Error::storage(format!("ledger task failed: {}", e)))?
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| Error::storage("ledger connection lock poisoned"))
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )?;

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    if version < 1 {
        conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS clocksync_device (
                dev_eui BLOB PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                last_sync_at TEXT NULL
            );
            INSERT INTO schema_version (version) VALUES (1);
            COMMIT;",
        )?;
        debug!(version = CURRENT_VERSION, "storage: clocksync schema migrated");
    }

    Ok(())
}

fn format_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::storage(format!("invalid timestamp '{}': {}", s, e)))
}

#[async_trait]
impl DeviceLedger for SqliteLedger {
    async fn get(&self, dev_eui: DevEui) -> Result<ClocksyncDevice> {
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT created_at, updated_at, last_sync_at
                    FROM clocksync_device WHERE dev_eui = ?1",
                    params![&dev_eui.as_bytes()[..]],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, Option<String>>(2)?,
                        ))
                    },
                )
                .optional()?;

            let (created_at, updated_at, last_sync_at) = row
                .ok_or_else(|| Error::not_found(format!("clocksync device {}", dev_eui)))?;

            Ok(ClocksyncDevice {
                dev_eui,
                created_at: parse_time(&created_at)?,
                updated_at: parse_time(&updated_at)?,
                last_sync_at: last_sync_at.as_deref().map(parse_time).transpose()?,
            })
        })
        .await
    }

    async fn create(&self, device: &ClocksyncDevice) -> Result<()> {
        let device = device.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO clocksync_device (dev_eui, created_at, updated_at, last_sync_at)
                VALUES (?1, ?2, ?3, ?4)",
                params![
                    &device.dev_eui.as_bytes()[..],
                    format_time(&device.created_at),
                    format_time(&device.updated_at),
                    device.last_sync_at.as_ref().map(format_time),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn update(&self, device: &ClocksyncDevice) -> Result<()> {
        let device = device.clone();
        self.with_conn(move |conn| {
            let affected = conn.execute(
                "UPDATE clocksync_device SET updated_at = ?2, last_sync_at = ?3
                WHERE dev_eui = ?1",
                params![
                    &device.dev_eui.as_bytes()[..],
                    format_time(&device.updated_at),
                    device.last_sync_at.as_ref().map(format_time),
                ],
            )?;
            if affected == 0 {
                return Err(Error::not_found(format!(
                    "clocksync device {}",
                    device.dev_eui
                )));
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    fn device(eui: u8) -> ClocksyncDevice {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap() + TimeDelta::milliseconds(250);
        ClocksyncDevice {
            dev_eui: DevEui([eui; 8]),
            created_at: now,
            updated_at: now,
            last_sync_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_get_update() {
        let ledger = SqliteLedger::open_in_memory().unwrap();

        assert!(matches!(
            ledger.get(DevEui([1; 8])).await,
            Err(Error::NotFound(_))
        ));

        ledger.create(&device(1)).await.unwrap();
        assert_eq!(ledger.get(DevEui([1; 8])).await.unwrap(), device(1));

        let mut changed = device(1);
        changed.updated_at = changed.updated_at + TimeDelta::seconds(30);
        changed.last_sync_at = Some(changed.updated_at);
        ledger.update(&changed).await.unwrap();
        assert_eq!(ledger.get(DevEui([1; 8])).await.unwrap(), changed);
    }

    #[tokio::test]
    async fn test_duplicate_create_fails() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        ledger.create(&device(2)).await.unwrap();
        assert!(matches!(
            ledger.create(&device(2)).await,
            Err(Error::Sqlite(_))
        ));
    }

    #[tokio::test]
    async fn test_update_missing() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        assert!(matches!(
            ledger.update(&device(3)).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reopen_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        {
            let ledger = SqliteLedger::open(&path).unwrap();
            ledger.create(&device(4)).await.unwrap();
        }

        // Migrations are idempotent and data survives a reopen
        let ledger = SqliteLedger::open(&path).unwrap();
        assert_eq!(ledger.get(DevEui([4; 8])).await.unwrap(), device(4));
    }
}
