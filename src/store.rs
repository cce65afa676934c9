use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};

use crate::error::StoreError;

/// A tracked feed
#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: i64,
    pub name: String,
    pub feed_url: String,
    pub last_downloaded: DateTime<Utc>,
    pub enabled: bool,
}

/// Column the subscription listing is ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Most recently updated first
    Date,
    /// First added to the system first
    Id,
    /// Alphabetical
    Name,
}

/// Identifies a subscription on the command line: a numeric id, or a name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Id(i64),
    Name(String),
}

impl Selector {
    /// A selector that parses as a nonzero integer is an id, anything else
    /// is a name
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(id) if id != 0 => Selector::Id(id),
            _ => Selector::Name(raw.to_string()),
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Id(id) => write!(f, "{id}"),
            Selector::Name(name) => write!(f, "{name}"),
        }
    }
}

/// SQLite-backed store of podcast subscriptions
pub struct SubscriptionStore {
    conn: Connection,
}

impl SubscriptionStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::CreateDirFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let conn = Connection::open(path).map_err(|e| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// In-memory store for tests
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS subscriptions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                feed_url TEXT NOT NULL,
                last_downloaded TEXT NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1
            );
            "#,
        )?;
        Ok(())
    }

    pub fn list(&self, order: SortOrder) -> Result<Vec<Subscription>, StoreError> {
        let order_clause = match order {
            SortOrder::Date => "last_downloaded DESC",
            SortOrder::Id => "id ASC",
            SortOrder::Name => "name ASC",
        };
        let sql = format!(
            "SELECT id, name, feed_url, last_downloaded, enabled \
             FROM subscriptions ORDER BY {order_clause}"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_subscription)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Flip whether a subscription is downloaded; returns its name and the
    /// new state
    pub fn toggle(&self, selector: &Selector) -> Result<(String, bool), StoreError> {
        let changed = match selector {
            Selector::Id(id) => self.conn.execute(
                "UPDATE subscriptions SET enabled = 1 - enabled WHERE id = ?1",
                params![id],
            )?,
            Selector::Name(name) => self.conn.execute(
                "UPDATE subscriptions SET enabled = 1 - enabled WHERE name = ?1",
                params![name],
            )?,
        };
        if changed == 0 {
            return Err(StoreError::NotFound {
                selector: selector.to_string(),
            });
        }

        let read_state = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(String, bool)> {
            Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?))
        };
        let result = match selector {
            Selector::Id(id) => self.conn.query_row(
                "SELECT name, enabled FROM subscriptions WHERE id = ?1",
                params![id],
                read_state,
            )?,
            Selector::Name(name) => self.conn.query_row(
                "SELECT name, enabled FROM subscriptions WHERE name = ?1",
                params![name],
                read_state,
            )?,
        };
        Ok(result)
    }

    pub fn update_last_downloaded(
        &self,
        id: i64,
        date: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE subscriptions SET last_downloaded = ?1 WHERE id = ?2",
            params![date.to_rfc3339(), id],
        )?;
        Ok(())
    }

    /// Add a new subscription seeded with the feed's start date so the
    /// whole backlog counts as new
    pub fn insert(
        &self,
        name: &str,
        feed_url: &str,
        date: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let result = self.conn.execute(
            "INSERT INTO subscriptions (name, feed_url, last_downloaded, enabled) \
             VALUES (?1, ?2, ?3, 1)",
            params![name, feed_url, date.to_rfc3339()],
        );
        match result {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::Duplicate {
                    name: name.to_string(),
                })
            }
            Err(e) => Err(StoreError::QueryFailed(e)),
        }
    }
}

fn row_to_subscription(row: &rusqlite::Row<'_>) -> rusqlite::Result<Subscription> {
    let date_str: String = row.get(3)?;
    let last_downloaded = DateTime::parse_from_rfc3339(&date_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH);
    Ok(Subscription {
        id: row.get(0)?,
        name: row.get(1)?,
        feed_url: row.get(2)?,
        last_downloaded,
        enabled: row.get(4)?,
    })
}
