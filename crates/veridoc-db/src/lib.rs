//! # veridoc-db
//!
//! PostgreSQL database layer for veridoc.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for documents, extraction results, and
//!   verification records
//! - Content-addressable blob storage with a filesystem backend
//!
//! ## Example
//!
//! ```rust,ignore
//! use veridoc_db::Database;
//! use veridoc_core::DocumentRepository;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/veridoc").await?;
//!     let count = db.documents.pending_count().await?;
//!     println!("{} documents awaiting pickup", count);
//!     Ok(())
//! }
//! ```

pub mod documents;
pub mod extractions;
pub mod pool;
pub mod storage;
pub mod verifications;

// Re-export core types
pub use veridoc_core::*;

// Re-export repository implementations
pub use documents::PgDocumentRepository;
pub use extractions::PgExtractionRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use storage::{
    compute_content_hash, generate_storage_path, upload_blob, FilesystemBackend,
};
pub use verifications::PgVerificationRepository;

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Document rows and claim bookkeeping.
    pub documents: PgDocumentRepository,
    /// Append-only extraction result history.
    pub extractions: PgExtractionRepository,
    /// Append-only verification record history.
    pub verifications: PgVerificationRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            documents: PgDocumentRepository::new(pool.clone()),
            extractions: PgExtractionRepository::new(pool.clone()),
            verifications: PgVerificationRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}
