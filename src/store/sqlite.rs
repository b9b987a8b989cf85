//! Local strategy store
//!
//! SQLite file with an optional JSON backup, for offline use and tests.
//! Rows are scoped by owner; names are unique per owner regardless of
//! ASCII case.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::{StoreError, StrategyStore};
use crate::strategy::{SavedStrategy, StrategyConfiguration, StrategySummary};
use crate::types::StrategyId;

pub struct SqliteStrategyStore {
    conn: Arc<Mutex<Connection>>,
    owner: String,
    json_backup_path: Option<PathBuf>,
}

impl SqliteStrategyStore {
    /// Open (or create) the database file at `db_path`
    pub fn new<P: AsRef<Path>>(db_path: P, owner: impl Into<String>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Storage(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let conn = Connection::open(db_path).map_err(|e| {
            StoreError::Storage(format!("failed to open database {}: {}", db_path.display(), e))
        })?;
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(storage_error)?;
        debug!("journal_mode={}", mode);

        let store = Self::from_connection(conn, owner)?;
        info!("SQLite strategy store opened at {}", db_path.display());
        Ok(store)
    }

    pub fn in_memory(owner: impl Into<String>) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(storage_error)?;
        Self::from_connection(conn, owner)
    }

    /// Write every strategy to `path` as JSON after each change
    pub fn with_json_backup<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.json_backup_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    fn from_connection(conn: Connection, owner: impl Into<String>) -> Result<Self, StoreError> {
        create_tables(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            owner: owner.into(),
            json_backup_path: None,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Storage("database lock poisoned".to_string()))
    }

    /// Dump all of this owner's strategies to the backup file, if one is set
    pub fn export_json(&self) -> Result<(), StoreError> {
        let Some(path) = &self.json_backup_path else {
            return Ok(());
        };

        let strategies = self.load_all()?;
        let state = serde_json::json!({
            "exported_at": Utc::now().to_rfc3339(),
            "owner": self.owner,
            "strategies": strategies,
        });

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Storage(e.to_string()))?;
        }
        let text = serde_json::to_string_pretty(&state)?;
        std::fs::write(path, text).map_err(|e| StoreError::Storage(e.to_string()))?;
        debug!("Strategies exported to: {}", path.display());
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<SavedStrategy>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, name, configuration, created_at, updated_at
                 FROM strategies WHERE owner = ?1 ORDER BY id",
            )
            .map_err(storage_error)?;
        let rows = stmt
            .query_map(params![self.owner], read_row)
            .map_err(storage_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage_error)?;
        rows.into_iter().map(StoredRow::into_saved).collect()
    }

    fn backup_after_write(&self) {
        if let Err(e) = self.export_json() {
            warn!("JSON backup failed: {}", e);
        }
    }
}

impl StrategyStore for SqliteStrategyStore {
    async fn create(
        &self,
        name: &str,
        configuration: &StrategyConfiguration,
    ) -> Result<SavedStrategy, StoreError> {
        let configuration_json = serde_json::to_string(configuration)?;
        let now = Utc::now();

        let id = {
            let conn = self.lock()?;
            conn.execute(
                "INSERT INTO strategies (owner, name, configuration, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![self.owner, name, configuration_json, now.to_rfc3339()],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    StoreError::Conflict(format!("A strategy named \"{}\" already exists.", name))
                }
                other => storage_error(other),
            })?;
            conn.last_insert_rowid()
        };

        debug!("Strategy saved: {} [{}]", name, id);
        self.backup_after_write();

        Ok(SavedStrategy {
            id: StrategyId(id),
            name: name.to_string(),
            configuration: configuration.clone(),
            created_at: Some(now),
            updated_at: Some(now),
        })
    }

    async fn list(&self) -> Result<Vec<StrategySummary>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, name FROM strategies WHERE owner = ?1 ORDER BY id")
            .map_err(storage_error)?;
        let summaries = stmt
            .query_map(params![self.owner], |row| {
                Ok(StrategySummary {
                    id: StrategyId(row.get(0)?),
                    name: row.get(1)?,
                })
            })
            .map_err(storage_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage_error)?;

        debug!("Loaded {} strategies for {}", summaries.len(), self.owner);
        Ok(summaries)
    }

    async fn get(&self, id: StrategyId) -> Result<SavedStrategy, StoreError> {
        let row = {
            let conn = self.lock()?;
            conn.query_row(
                "SELECT id, name, configuration, created_at, updated_at
                 FROM strategies WHERE id = ?1 AND owner = ?2",
                params![id.0, self.owner],
                read_row,
            )
            .optional()
            .map_err(storage_error)?
        };

        match row {
            Some(row) => row.into_saved(),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn delete(&self, id: StrategyId) -> Result<(), StoreError> {
        let affected = {
            let conn = self.lock()?;
            conn.execute(
                "DELETE FROM strategies WHERE id = ?1 AND owner = ?2",
                params![id.0, self.owner],
            )
            .map_err(storage_error)?
        };

        if affected == 0 {
            return Err(StoreError::NotFound(id));
        }
        debug!("Strategy deleted: {}", id);
        self.backup_after_write();
        Ok(())
    }
}

fn create_tables(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS strategies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner TEXT NOT NULL,
            name TEXT NOT NULL,
            configuration TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )
    .map_err(storage_error)?;

    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_strategies_owner_name
         ON strategies(owner, name COLLATE NOCASE)",
        [],
    )
    .map_err(storage_error)?;

    debug!("Database schema created/verified");
    Ok(())
}

struct StoredRow {
    id: i64,
    name: String,
    configuration: String,
    created_at: Option<String>,
    updated_at: Option<String>,
}

impl StoredRow {
    fn into_saved(self) -> Result<SavedStrategy, StoreError> {
        let configuration = serde_json::from_str(&self.configuration).map_err(|e| {
            StoreError::Parse(format!("strategy {} has an unreadable configuration: {}", self.id, e))
        })?;
        Ok(SavedStrategy {
            id: StrategyId(self.id),
            name: self.name,
            configuration,
            created_at: self.created_at.as_deref().and_then(parse_timestamp),
            updated_at: self.updated_at.as_deref().and_then(parse_timestamp),
        })
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredRow> {
    Ok(StoredRow {
        id: row.get(0)?,
        name: row.get(1)?,
        configuration: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn storage_error(err: rusqlite::Error) -> StoreError {
    StoreError::Storage(err.to_string())
}
