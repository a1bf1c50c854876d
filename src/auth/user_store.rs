//! User Storage
//! Mission: Durable, case-insensitively keyed record of registered identities
//!
//! Two backends share the `UserStore` contract: a single JSON file guarded by an
//! exclusive writer lock, and SQLite where the database enforces uniqueness.

use crate::auth::models::{email_key, User, UserRole};
use parking_lot::Mutex;
use rusqlite::{ffi, params, Connection, OptionalExtension};
use std::fs;
use std::io::{self, Write};
use tempfile::NamedTempFile;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use uuid::Uuid;

/// Storage failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("a user with email '{0}' already exists")]
    DuplicateEmail(String),
    #[error("persisted user data at {path} is corrupt: {reason}")]
    Corrupt { path: String, reason: String },
    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Identity collection contract
pub trait UserStore: Send + Sync {
    /// All identities; empty when nothing has been stored yet
    fn load_all(&self) -> StoreResult<Vec<User>>;

    /// Add one identity, rejecting a case-insensitive duplicate email
    fn append(&self, user: User) -> StoreResult<()>;

    /// Case-insensitive lookup
    fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
}

/// Open the backend named by a storage connection string.
///
/// `sqlite://<path>` or a `.db`/`.sqlite` path selects SQLite; `json://<path>` or
/// any other path selects the JSON file store.
pub fn open_user_store(database_url: &str) -> StoreResult<Box<dyn UserStore>> {
    let url = database_url.trim();
    if let Some(path) = url.strip_prefix("sqlite://") {
        return Ok(Box::new(SqliteUserStore::new(path)?));
    }
    if let Some(path) = url.strip_prefix("json://") {
        return Ok(Box::new(JsonFileUserStore::new(path)));
    }

    let is_sqlite = Path::new(url)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "db" | "sqlite" | "sqlite3"))
        .unwrap_or(false);

    if is_sqlite {
        Ok(Box::new(SqliteUserStore::new(url)?))
    } else {
        Ok(Box::new(JsonFileUserStore::new(url)))
    }
}

/// JSON array of users in a single file
pub struct JsonFileUserStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileUserStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        info!("📁 JSON user store at {}", path.display());
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_users(&self) -> StoreResult<Vec<User>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&raw).map_err(|e| {
            error!(
                path = %self.path.display(),
                "🛑 User store is unreadable; refusing to treat it as empty: {}", e
            );
            StoreError::Corrupt {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            }
        })
    }

    /// Write to a sibling temp file, then rename over the target.
    /// The temp file is removed on every failure path.
    fn write_users(&self, users: &[User]) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(users).map_err(io::Error::from)?;

        let parent = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                parent
            }
            None => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl UserStore for JsonFileUserStore {
    fn load_all(&self) -> StoreResult<Vec<User>> {
        self.read_users()
    }

    fn append(&self, user: User) -> StoreResult<()> {
        let _guard = self.write_lock.lock();

        let mut users = self.read_users()?;
        if users.iter().any(|u| u.has_email(&user.email)) {
            return Err(StoreError::DuplicateEmail(user.email));
        }

        info!("✅ Storing user: {} ({})", user.email, user.role);
        users.push(user);
        self.write_users(&users)
    }

    fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.read_users()?.into_iter().find(|u| u.has_email(email)))
    }
}

/// User storage with SQLite backend
pub struct SqliteUserStore {
    db_path: String,
}

impl SqliteUserStore {
    /// Create a new user store and initialize database
    pub fn new(db_path: &str) -> StoreResult<Self> {
        let store = Self {
            db_path: db_path.to_string(),
        };
        store.init_db()?;
        info!("🗄️  SQLite user store at {}", db_path);
        Ok(store)
    }

    fn connect(&self) -> StoreResult<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(conn)
    }

    /// Initialize database schema
    fn init_db(&self) -> StoreResult<()> {
        let conn = self.connect()?;

        // email_key holds the Unicode-lowercased email; SQLite's NOCASE only folds ASCII
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL,
                email TEXT NOT NULL,
                email_key TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    fn row_to_user(&self, row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<User, StoreError>> {
        let id: String = row.get(0)?;
        let role: String = row.get(4)?;

        let corrupt = |reason: String| StoreError::Corrupt {
            path: self.db_path.clone(),
            reason,
        };

        let id = match Uuid::parse_str(&id) {
            Ok(id) => id,
            Err(e) => return Ok(Err(corrupt(format!("bad user id '{id}': {e}")))),
        };
        let role = match role.parse::<UserRole>() {
            Ok(role) => role,
            Err(e) => return Ok(Err(corrupt(e.to_string()))),
        };

        Ok(Ok(User {
            id,
            username: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            role,
            created_at: row.get(5)?,
        }))
    }
}

/// Only the unique index on `email_key` means "email taken"; other constraint
/// failures (such as a primary key clash) stay database errors.
fn is_duplicate_email(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(msg)) => {
            e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE && msg.contains("users.email_key")
        }
        _ => false,
    }
}

impl UserStore for SqliteUserStore {
    fn load_all(&self) -> StoreResult<Vec<User>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, username, email, password_hash, role, created_at
             FROM users ORDER BY rowid",
        )?;

        let rows = stmt
            .query_map([], |row| self.row_to_user(row))?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().collect()
    }

    fn append(&self, user: User) -> StoreResult<()> {
        let conn = self.connect()?;

        let result = conn.execute(
            "INSERT INTO users (id, username, email, email_key, password_hash, role, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.id.to_string(),
                user.username,
                user.email,
                email_key(&user.email),
                user.password_hash,
                user.role.as_str(),
                user.created_at,
            ],
        );

        match result {
            Ok(_) => {
                info!("✅ Created user: {} ({})", user.email, user.role);
                Ok(())
            }
            Err(e) if is_duplicate_email(&e) => Err(StoreError::DuplicateEmail(user.email)),
            Err(e) => Err(e.into()),
        }
    }

    fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, username, email, password_hash, role, created_at
             FROM users WHERE email_key = ?1",
        )?;

        stmt.query_row(params![email_key(email)], |row| self.row_to_user(row))
            .optional()?
            .transpose()
    }
}
