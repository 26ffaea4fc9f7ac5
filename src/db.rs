//! Local SQLite store for user preferences and the invoice history.
//!
//! Uses rusqlite with WAL mode. Preferences live in a category/key/value
//! table; every generated invoice is appended to `invoice_log`.

use rusqlite::{params, Connection};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{error, info, warn};

use crate::error::{InvoiceError, Result};

/// Current schema version. Bump when adding new migrations.
const CURRENT_SCHEMA_VERSION: i32 = 2;

const DB_FILE_NAME: &str = "invoice.db";

pub struct PreferenceStore {
    conn: Mutex<Connection>,
    pub db_path: Option<PathBuf>,
}

/// One row of `invoice_log`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceLogEntry {
    pub order_number: String,
    pub language: String,
    pub filename: String,
    pub output_path: String,
    pub page_count: i64,
    pub warning_count: i64,
    pub created_at: String,
}

impl PreferenceStore {
    /// Open `{data_dir}/invoice.db`, creating the directory if needed.
    ///
    /// On open failure the file (and its WAL/SHM companions) is deleted and
    /// the open retried once; preferences are cheap to lose.
    pub fn open(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)?;

        let db_path = data_dir.join(DB_FILE_NAME);
        info!("Opening preference store at {}", db_path.display());

        let conn = match open_and_configure(&db_path).and_then(|conn| {
            run_migrations(&conn)?;
            Ok(conn)
        }) {
            Ok(c) => c,
            Err(first_err) => {
                warn!("Preference store open failed ({first_err}), deleting and retrying once");
                if db_path.exists() {
                    let _ = fs::remove_file(&db_path);
                    let _ = fs::remove_file(db_path.with_extension("db-wal"));
                    let _ = fs::remove_file(db_path.with_extension("db-shm"));
                }
                let conn = open_and_configure(&db_path)?;
                run_migrations(&conn)?;
                conn
            }
        };

        info!("Preference store ready (schema v{CURRENT_SCHEMA_VERSION})");
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| InvoiceError::StoreLocked)
    }

    // -----------------------------------------------------------------------
    // Settings
    // -----------------------------------------------------------------------

    pub fn get_setting(&self, category: &str, key: &str) -> Option<String> {
        let conn = self.conn().ok()?;
        conn.query_row(
            "SELECT setting_value FROM local_settings WHERE setting_category = ?1 AND setting_key = ?2",
            params![category, key],
            |row| row.get(0),
        )
        .ok()
    }

    /// Insert or update a setting.
    pub fn set_setting(&self, category: &str, key: &str, value: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO local_settings (setting_category, setting_key, setting_value, updated_at)
             VALUES (?1, ?2, ?3, datetime('now'))
             ON CONFLICT(setting_category, setting_key) DO UPDATE SET
                setting_value = excluded.setting_value,
                updated_at = excluded.updated_at",
            params![category, key, value],
        )?;
        Ok(())
    }

    pub fn delete_setting(&self, category: &str, key: &str) -> Result<()> {
        self.conn()?.execute(
            "DELETE FROM local_settings WHERE setting_category = ?1 AND setting_key = ?2",
            params![category, key],
        )?;
        Ok(())
    }

    /// Delete all settings in a category.
    pub fn delete_all_settings(&self, category: &str) -> Result<()> {
        self.conn()?.execute(
            "DELETE FROM local_settings WHERE setting_category = ?1",
            params![category],
        )?;
        Ok(())
    }

    /// All settings grouped by category as JSON.
    pub fn get_all_settings(&self) -> serde_json::Value {
        let conn = match self.conn() {
            Ok(conn) => conn,
            Err(e) => {
                error!("get_all_settings: {e}");
                return serde_json::json!({});
            }
        };
        let mut stmt = match conn.prepare(
            "SELECT setting_category, setting_key, setting_value FROM local_settings ORDER BY setting_category, setting_key",
        ) {
            Ok(s) => s,
            Err(e) => {
                error!("get_all_settings prepare: {e}");
                return serde_json::json!({});
            }
        };

        let rows = match stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        }) {
            Ok(r) => r,
            Err(e) => {
                error!("get_all_settings query: {e}");
                return serde_json::json!({});
            }
        };

        let mut result = serde_json::Map::new();
        for (cat, key, val) in rows.flatten() {
            let category = result.entry(cat).or_insert_with(|| serde_json::json!({}));
            if let serde_json::Value::Object(ref mut map) = category {
                map.insert(key, serde_json::Value::String(val));
            }
        }
        serde_json::Value::Object(result)
    }

    // -----------------------------------------------------------------------
    // Invoice history
    // -----------------------------------------------------------------------

    pub fn record_invoice(&self, entry: &InvoiceLogEntry) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO invoice_log
                (order_number, language, filename, output_path, page_count, warning_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.order_number,
                entry.language,
                entry.filename,
                entry.output_path,
                entry.page_count,
                entry.warning_count
            ],
        )?;
        Ok(())
    }

    /// Most recent entries first.
    pub fn recent_invoices(&self, limit: usize) -> Result<Vec<InvoiceLogEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT order_number, language, filename, output_path, page_count, warning_count, created_at
             FROM invoice_log ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(InvoiceLogEntry {
                order_number: row.get(0)?,
                language: row.get(1)?,
                filename: row.get(2)?,
                output_path: row.get(3)?,
                page_count: row.get(4)?,
                warning_count: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?;
        let entries = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

/// Open the database file and apply pragmas.
fn open_and_configure(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;
    Ok(conn)
}

/// Run all pending migrations up to `CURRENT_SCHEMA_VERSION`.
fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT DEFAULT (datetime('now'))
        );",
    )?;

    let current: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current >= CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    info!("Migrating preference store from v{current} to v{CURRENT_SCHEMA_VERSION}");

    if current < 1 {
        migrate_v1(conn)?;
    }
    if current < 2 {
        migrate_v2(conn)?;
    }
    Ok(())
}

/// Migration v1: settings table.
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS local_settings (
            id TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(16)))),
            setting_category TEXT NOT NULL,
            setting_key TEXT NOT NULL,
            setting_value TEXT NOT NULL,
            created_at TEXT DEFAULT (datetime('now')),
            updated_at TEXT DEFAULT (datetime('now')),
            UNIQUE(setting_category, setting_key)
        );

        INSERT INTO schema_version (version) VALUES (1);
        ",
    )?;
    Ok(())
}

/// Migration v2: history of generated invoices.
fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS invoice_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_number TEXT NOT NULL,
            language TEXT NOT NULL,
            filename TEXT NOT NULL,
            output_path TEXT NOT NULL,
            page_count INTEGER NOT NULL DEFAULT 1,
            warning_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_invoice_log_order ON invoice_log(order_number);

        INSERT INTO schema_version (version) VALUES (2);
        ",
    )?;
    Ok(())
}
