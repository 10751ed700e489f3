//! Quire Storage Layer
//!
//! Implements the IdentityStore trait on SQLite.
//!
//! # Architecture
//!
//! - One `identities` row per identity (public fields only)
//! - One `relation_members` row per set member; the primary key makes set
//!   insertion idempotent and deletion of an absent member a no-op
//! - [`IdentityStore::apply`] runs inside a single SQLite transaction, which
//!   gives atomic per-record updates and nothing wider
//!
//! # Examples
//!
//! ```no_run
//! use quire_store::SqliteStore;
//!
//! let store = SqliteStore::new(":memory:").unwrap();
//! // Store is now ready for identity operations
//! ```

#![warn(missing_docs)]

use async_trait::async_trait;
use quire_domain::traits::IdentityStore;
use quire_domain::{Identity, NewIdentity, PublicProfile, RelationSet, SetMutation, UserId};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Identity not found
    #[error("Identity not found: {0}")]
    NotFound(String),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Connection unusable after a panic in another holder
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// SQLite-based implementation of IdentityStore
///
/// # Thread Safety
///
/// The connection sits behind a mutex. Every call locks it on the blocking
/// thread pool for one synchronous SQLite call sequence and never holds it
/// across an await point. Clones share the same connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Create a new SqliteStore with the given database path
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use quire_store::SqliteStore;
    ///
    /// let store = SqliteStore::new("quire.db").unwrap();
    /// ```
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Convert UserId to bytes for storage
    fn id_to_bytes(id: UserId) -> Vec<u8> {
        id.value().to_be_bytes().to_vec()
    }

    /// Convert bytes to UserId
    fn bytes_to_id(bytes: &[u8]) -> Result<UserId, StoreError> {
        let arr: [u8; 16] = bytes.try_into().map_err(|_| {
            StoreError::InvalidData(format!("Expected 16 bytes for UserId, got {}", bytes.len()))
        })?;
        Ok(UserId::from_value(u128::from_be_bytes(arr)))
    }

    fn column_id(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<UserId> {
        let bytes: Vec<u8> = row.get(idx)?;
        Self::bytes_to_id(&bytes).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Blob, Box::new(e))
        })
    }

    fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<PublicProfile> {
        Ok(PublicProfile {
            id: Self::column_id(row, 0)?,
            display_name: row.get(1)?,
            external_handle: row.get(2)?,
        })
    }

    fn exists(conn: &Connection, id_bytes: &[u8]) -> Result<bool, StoreError> {
        let found = conn
            .query_row("SELECT 1 FROM identities WHERE id = ?1", params![id_bytes], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    fn now_secs() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }
}

/// Escape LIKE wildcards so user text matches literally
fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for c in text.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

impl SqliteStore {
    /// Run `f` against the connection on the blocking thread pool
    ///
    /// The calling task is suspended, not blocked, while SQLite works, so a
    /// caller-side timeout can expire even when the database is busy.
    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("Task join error: {}", e)))?
    }

    fn load_identity(conn: &Connection, id: UserId) -> Result<Option<Identity>, StoreError> {
        let id_bytes = Self::id_to_bytes(id);

        let identity = conn
            .query_row(
                "SELECT display_name, external_handle, created_at FROM identities WHERE id = ?1",
                params![&id_bytes],
                |row| {
                    Ok(Identity::new(
                        id,
                        row.get::<_, String>(0)?,
                        row.get(1)?,
                        row.get::<_, i64>(2)? as u64,
                    ))
                },
            )
            .optional()?;

        let Some(mut identity) = identity else {
            return Ok(None);
        };

        let mut stmt =
            conn.prepare("SELECT relation, member_id FROM relation_members WHERE owner_id = ?1")?;
        let rows = stmt
            .query_map(params![&id_bytes], |row| {
                Ok((row.get::<_, String>(0)?, Self::column_id(row, 1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        for (relation, member) in rows {
            let set = RelationSet::parse(&relation).ok_or_else(|| {
                StoreError::InvalidData(format!("Unknown relation: {}", relation))
            })?;
            identity = identity.with_members(set, [member]);
        }

        Ok(Some(identity))
    }

    fn apply_mutations(
        conn: &mut Connection,
        id: UserId,
        mutations: &[SetMutation],
    ) -> Result<(), StoreError> {
        let id_bytes = Self::id_to_bytes(id);
        let tx = conn.transaction()?;

        if !Self::exists(&tx, &id_bytes)? {
            return Err(StoreError::NotFound(id.to_string()));
        }

        for mutation in mutations {
            let member = Self::id_to_bytes(mutation.member());
            let relation = mutation.set().as_str();
            match mutation {
                SetMutation::Add(..) => tx.execute(
                    "INSERT OR IGNORE INTO relation_members (owner_id, relation, member_id)
                     VALUES (?1, ?2, ?3)",
                    params![&id_bytes, relation, &member],
                )?,
                SetMutation::Remove(..) => tx.execute(
                    "DELETE FROM relation_members
                     WHERE owner_id = ?1 AND relation = ?2 AND member_id = ?3",
                    params![&id_bytes, relation, &member],
                )?,
            };
        }

        tx.commit()?;
        Ok(())
    }

    fn load_profiles(conn: &Connection, ids: &[UserId]) -> Result<Vec<PublicProfile>, StoreError> {
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, display_name, external_handle FROM identities
             WHERE id IN ({}) ORDER BY display_name, id",
            placeholders
        );
        let mut stmt = conn.prepare(&sql)?;
        let profiles = stmt
            .query_map(
                params_from_iter(ids.iter().map(|id| Self::id_to_bytes(*id))),
                Self::row_to_profile,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(profiles)
    }

    fn insert_identity(conn: &Connection, record: &Identity) -> Result<(), StoreError> {
        conn.execute(
            "INSERT INTO identities (id, display_name, external_handle, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                Self::id_to_bytes(record.id),
                &record.display_name,
                &record.external_handle,
                record.created_at as i64,
            ],
        )?;
        Ok(())
    }

    fn search_profiles(
        conn: &Connection,
        pattern: &str,
        limit: usize,
    ) -> Result<Vec<PublicProfile>, StoreError> {
        let mut stmt = conn.prepare(
            "SELECT id, display_name, external_handle FROM identities
             WHERE display_name LIKE ?1 ESCAPE '\\' OR external_handle LIKE ?1 ESCAPE '\\'
             ORDER BY display_name, id
             LIMIT ?2",
        )?;
        let profiles = stmt
            .query_map(params![pattern, limit as i64], Self::row_to_profile)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(profiles)
    }
}

#[async_trait]
impl IdentityStore for SqliteStore {
    type Error = StoreError;

    async fn get(&self, id: UserId) -> Result<Option<Identity>, Self::Error> {
        self.blocking(move |conn| Self::load_identity(conn, id)).await
    }

    async fn apply(&self, id: UserId, mutations: &[SetMutation]) -> Result<(), Self::Error> {
        let mutations = mutations.to_vec();
        self.blocking(move |conn| Self::apply_mutations(conn, id, &mutations))
            .await
    }

    async fn find_many(&self, ids: &[UserId]) -> Result<Vec<PublicProfile>, Self::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids.to_vec();
        self.blocking(move |conn| Self::load_profiles(conn, &ids)).await
    }

    async fn create(&self, identity: NewIdentity) -> Result<Identity, Self::Error> {
        let display_name = identity.display_name.trim();
        if display_name.is_empty() {
            return Err(StoreError::InvalidData("Display name cannot be empty".to_string()));
        }

        let record = Identity::new(
            UserId::new(),
            display_name,
            identity.external_handle,
            Self::now_secs(),
        );

        self.blocking(move |conn| {
            Self::insert_identity(conn, &record)?;
            Ok(record)
        })
        .await
    }

    async fn search(&self, text: &str, limit: usize) -> Result<Vec<PublicProfile>, Self::Error> {
        let pattern = like_pattern(text);
        self.blocking(move |conn| Self::search_profiles(conn, &pattern, limit))
            .await
    }
}
