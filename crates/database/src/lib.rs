//! SQLite persistence layer for the messaging inbox.
//!
//! This crate provides async database operations for conversations,
//! messages, operators, automation settings, the automation log, and
//! learned rules using SQLx with SQLite.
//!
//! Uniqueness of the contact identifier and of the external message id is
//! enforced by the schema; the insert functions report conflicts as values
//! rather than errors so concurrent deliveries are absorbed.
//!
//! # Example
//!
//! ```no_run
//! use database::{conversation, Database};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let db = Database::connect("sqlite:inbox.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     // Resolve or create a conversation for a contact
//!     let (conv, created) =
//!         conversation::upsert_conversation(db.pool(), "5215551234567", Some("Ana")).await?;
//!     println!("conversation {} (new: {})", conv.id, created);
//!
//!     Ok(())
//! }
//! ```

pub mod automation_log;
pub mod conversation;
pub mod error;
pub mod learned_rule;
pub mod message;
pub mod models;
pub mod operator;
pub mod settings;
pub mod validation;

pub use conversation::{ConversationFilter, ConversationFlag};
pub use error::{DatabaseError, Result};
pub use message::StatusUpdate;
pub use models::{
    summarize, AutomationLogEntry, AutomationSettings, ContentType, Conversation, Direction,
    LearnedRule, Message, MessageStatus, NewMessage, Operator, OperatorLoad, OrderStatus,
};
pub use operator::OperatorUpdate;
pub use settings::SettingsUpdate;
pub use validation::ValidationError;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    /// Set high enough to handle concurrent webhook batches and operator polling.
    const DEFAULT_POOL_SIZE: u32 = 20;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `?mode=rwc` to create the database file if it doesn't exist.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> database::Result<()> {
    /// // File database
    /// let db = database::Database::connect("sqlite:data/inbox.db?mode=rwc").await?;
    ///
    /// // In-memory database (for testing)
    /// let db = database::Database::connect("sqlite::memory:").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!(
            "Connected to database: {} (pool size: {})",
            url,
            pool_size
        );

        Ok(Self { pool })
    }

    /// Run database migrations.
    ///
    /// This should be called once after connecting to ensure the schema is up to date.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
