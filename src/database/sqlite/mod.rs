use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::database::sqlite::models::{Document, NewDocument};
use crate::database::sqlite::queries::DocumentQueries;
use crate::{NexusError, Result};


pub mod models;
pub mod queries;

pub use models::Metadata;

pub type DbPool = Pool<Sqlite>;

const DATABASE_FILE: &str = "metadata.db";

/// Metadata store. Query helpers report through `anyhow`; this facade turns
/// their failures into [`NexusError`] while keeping typed errors intact.
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")
            .map_err(store_error)?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")
            .map_err(store_error)?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    #[inline]
    pub async fn initialize_from_config_dir(config_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(config_dir)
            .with_context(|| {
                format!(
                    "Failed to create config directory: {}",
                    config_dir.display()
                )
            })
            .map_err(store_error)?;

        Self::new(config_dir.join(DATABASE_FILE)).await
    }

    #[inline]
    pub async fn insert_document(&self, document: &NewDocument) -> Result<Document> {
        DocumentQueries::create(&self.pool, document)
            .await
            .map_err(store_error)
    }

    #[inline]
    pub async fn get_document(&self, id: i64) -> Result<Option<Document>> {
        DocumentQueries::get_by_id(&self.pool, id)
            .await
            .map_err(store_error)
    }

    #[inline]
    pub async fn get_document_by_vector_id(&self, vector_id: u64) -> Result<Option<Document>> {
        DocumentQueries::get_by_vector_id(&self.pool, vector_id)
            .await
            .map_err(store_error)
    }

    #[inline]
    pub async fn get_documents_by_vector_ids(&self, vector_ids: &[u64]) -> Result<Vec<Document>> {
        DocumentQueries::get_by_vector_ids(&self.pool, vector_ids)
            .await
            .map_err(store_error)
    }

    #[inline]
    pub async fn list_documents(&self, limit: u32, offset: u32) -> Result<Vec<Document>> {
        DocumentQueries::list(&self.pool, limit, offset)
            .await
            .map_err(store_error)
    }

    #[inline]
    pub async fn count_documents(&self) -> Result<u64> {
        DocumentQueries::count(&self.pool)
            .await
            .map_err(store_error)
    }

    #[inline]
    pub async fn all_vector_ids(&self) -> Result<Vec<u64>> {
        DocumentQueries::all_vector_ids(&self.pool)
            .await
            .map_err(store_error)
    }

    #[inline]
    pub async fn delete_document(&self, id: i64) -> Result<bool> {
        DocumentQueries::delete(&self.pool, id)
            .await
            .map_err(store_error)
    }

    #[inline]
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn store_error(error: anyhow::Error) -> NexusError {
    match error.downcast::<NexusError>() {
        Ok(typed) => typed,
        Err(other) => NexusError::Database(format!("{other:#}")),
    }
}
