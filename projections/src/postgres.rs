//! `PostgreSQL` publication store.
//!
//! # Overview
//!
//! Persists published snapshots as JSONB rows keyed by (model, projection, `ref_id`):
//! - Atomic upsert per key (`ON CONFLICT ... DO UPDATE`)
//! - Per-document and per-view deletes
//! - Separate database support for the read side
//!
//! # Architecture
//!
//! ```text
//! Source documents                  Published views
//! ┌─────────────────────┐          ┌──────────────────────┐
//! │  Document store     │          │  PostgreSQL          │
//! │                     │  publish │                      │
//! │  users              │   →→→    │  published_documents │
//! │  posts              │          │                      │
//! └─────────────────────┘          └──────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use docview_projections::PostgresPublicationStore;
//!
//! let store = PostgresPublicationStore::new_with_separate_db(
//!     "postgres://localhost/publications",
//!     "published_documents".to_string(),
//! ).await?;
//! store.migrate().await?;
//! ```

use docview_core::error::{ProjectionError, Result};
use docview_core::record::ProjectedRecord;
use docview_core::store::{
    PublicationFilter, PublicationKey, PublicationStore, PublishedDocument,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::future::Future;
use std::pin::Pin;

/// Table created by the bundled migrations.
pub const DEFAULT_TABLE: &str = "published_documents";

/// PostgreSQL-backed publication store.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE published_documents (
///     model TEXT NOT NULL,
///     projection TEXT NOT NULL,
///     ref_id TEXT NOT NULL,
///     body JSONB NOT NULL,
///     updated_at TIMESTAMPTZ NOT NULL,
///     PRIMARY KEY (model, projection, ref_id)
/// );
/// ```
///
/// A custom `table_name` must have the same columns and primary key.
#[derive(Clone, Debug)]
pub struct PostgresPublicationStore {
    pool: PgPool,
    table_name: String,
}

impl PostgresPublicationStore {
    /// Create a store using an existing connection pool.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let store = PostgresPublicationStore::new(pool, "published_documents".to_string());
    /// ```
    #[must_use]
    pub const fn new(pool: PgPool, table_name: String) -> Self {
        Self { pool, table_name }
    }

    /// Create a store with its own connection pool.
    ///
    /// Lets published views live in a different database than the source documents.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Storage`] if connection fails.
    pub async fn new_with_separate_db(database_url: &str, table_name: String) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| ProjectionError::Storage(format!("Failed to connect: {e}")))?;

        Ok(Self::new(pool, table_name))
    }

    /// Run the bundled migrations (creates [`DEFAULT_TABLE`]).
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Storage`] if migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ProjectionError::Storage(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get the table name for this store.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

impl PublicationStore for PostgresPublicationStore {
    fn upsert(
        &self,
        document: PublishedDocument,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let query = format!(
                "INSERT INTO {} (model, projection, ref_id, body, updated_at)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (model, projection, ref_id) DO UPDATE
                 SET body = EXCLUDED.body, updated_at = EXCLUDED.updated_at",
                self.table_name
            );

            sqlx::query(&query)
                .bind(&document.key.model)
                .bind(&document.key.projection)
                .bind(&document.key.ref_id)
                .bind(Json(&document.body))
                .bind(document.updated_at)
                .execute(&self.pool)
                .await
                .map_err(|e| ProjectionError::Storage(format!("Failed to upsert: {e}")))?;

            Ok(())
        })
    }

    fn delete(
        &self,
        filter: PublicationFilter,
    ) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + '_>> {
        Box::pin(async move {
            let query = format!(
                "DELETE FROM {}
                 WHERE model = $1 AND ref_id = $2
                   AND ($3::text IS NULL OR projection = $3)",
                self.table_name
            );

            let result = sqlx::query(&query)
                .bind(&filter.model)
                .bind(&filter.ref_id)
                .bind(filter.projection.as_deref())
                .execute(&self.pool)
                .await
                .map_err(|e| ProjectionError::Storage(format!("Failed to delete: {e}")))?;

            Ok(result.rows_affected())
        })
    }

    fn find(
        &self,
        key: PublicationKey,
    ) -> Pin<Box<dyn Future<Output = Result<Option<PublishedDocument>>> + Send + '_>> {
        Box::pin(async move {
            let query = format!(
                "SELECT body, updated_at FROM {}
                 WHERE model = $1 AND projection = $2 AND ref_id = $3",
                self.table_name
            );

            let row: Option<(Json<ProjectedRecord>, chrono::DateTime<chrono::Utc>)> =
                sqlx::query_as(&query)
                    .bind(&key.model)
                    .bind(&key.projection)
                    .bind(&key.ref_id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| ProjectionError::Storage(format!("Failed to find: {e}")))?;

            Ok(row.map(|(Json(body), updated_at)| PublishedDocument {
                key,
                body,
                updated_at,
            }))
        })
    }
}
