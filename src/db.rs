use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::error::{MessagingError, Result};
use crate::models::{UserId, UserProfile};
use crate::schema::users;

// Type alias for the database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = r2d2::PooledConnection<SqliteConnectionManager>;

const MIGRATIONS: &[(&str, &str)] = &[(
    "2026-10-01-000000_create_messaging_tables",
    include_str!("../migrations/2026-10-01-000000_create_messaging_tables/up.sql"),
)];

/// Database manager for handling connections and operations.
///
/// Cloning is cheap and shares the underlying pool.
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.pool.state();
        f.debug_struct("Database")
            .field("connections", &state.connections)
            .field("idle_connections", &state.idle_connections)
            .finish()
    }
}

impl Database {
    /// Create a new database connection pool with default settings
    pub fn new(database_url: &str) -> Result<Self> {
        Self::with_config(&DatabaseConfig {
            url: database_url.to_string(),
            ..crate::config::AppConfig::default().database
        })
    }

    /// Create a new database connection pool and run migrations
    pub fn with_config(config: &DatabaseConfig) -> Result<Self> {
        let path = database_path(&config.url);

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| MessagingError::Persistence(Box::new(e)))?;
        }

        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        let manager = SqliteConnectionManager::file(&path).with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.pragma_update(None, "foreign_keys", true)
        });
        let pool = Pool::builder()
            .max_size(config.max_connections)
            .connection_timeout(Duration::from_secs(config.connection_timeout_secs))
            .build(manager)?;

        let conn = pool.get()?;
        Self::run_migrations(&conn)?;
        info!(path = %path.display(), max_connections = config.max_connections, "Database ready");

        Ok(Self { pool })
    }

    /// Wrap an existing pool without running migrations
    pub fn from_pool(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Run database migrations
    fn run_migrations(conn: &Connection) -> Result<()> {
        for (name, sql) in MIGRATIONS {
            conn.execute_batch(sql)?;
            debug!(migration = name, "Migration applied");
        }
        Ok(())
    }

    /// Get a connection from the pool
    pub fn get_connection(&self) -> Result<DbConnection> {
        Ok(self.pool.get()?)
    }

    /// Maximum number of pooled connections
    pub fn max_connections(&self) -> u32 {
        self.pool.max_size()
    }

    /// Run `f` with a pooled connection on the blocking thread pool.
    ///
    /// Every storage operation goes through here so that waiting on SQLite
    /// never stalls the async runtime.
    pub async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut *conn)
        })
        .await?
    }

    /// Add a new user or update the display fields of an existing one
    pub async fn add_or_update_user(&self, profile: UserProfile) -> Result<UserProfile> {
        self.run(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {table} ({id}, {name}, {picture}, {email})
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT({id}) DO UPDATE SET
                        {name} = excluded.{name},
                        {picture} = excluded.{picture},
                        {email} = excluded.{email}",
                    table = users::TABLE,
                    id = users::ID,
                    name = users::DISPLAY_NAME,
                    picture = users::PROFILE_PICTURE,
                    email = users::EMAIL,
                ),
                params![profile.id, profile.display_name, profile.profile_picture, profile.email],
            )?;

            get_user(conn, profile.id)?
                .ok_or_else(|| MessagingError::NotFound(format!("user {}", profile.id)))
        })
        .await
    }

    /// Get a user by ID
    pub async fn get_user(&self, user_id: UserId) -> Result<Option<UserProfile>> {
        self.run(move |conn| get_user(conn, user_id)).await
    }
}

/// Look up a user in the directory on an existing connection
pub fn get_user(conn: &Connection, user_id: UserId) -> Result<Option<UserProfile>> {
    let user = conn
        .query_row(
            &format!("SELECT * FROM {} WHERE {} = ?", users::TABLE, users::ID),
            params![user_id],
            map_user,
        )
        .optional()?;

    Ok(user)
}

/// Map a database row to a `UserProfile`
fn map_user(row: &Row) -> rusqlite::Result<UserProfile> {
    Ok(UserProfile {
        id: row.get(users::ID)?,
        display_name: row.get(users::DISPLAY_NAME)?,
        profile_picture: row.get(users::PROFILE_PICTURE)?,
        email: row.get(users::EMAIL)?,
    })
}

/// Strip the `sqlite:` scheme from a database url
fn database_path(database_url: &str) -> PathBuf {
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);
    Path::new(path).to_path_buf()
}
