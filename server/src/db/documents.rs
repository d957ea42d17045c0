//! Database operations for the documents table.
//!
//! One row per `(principal, local_id)` pair. The fields column is JSONB
//! and upserts merge with the `||` operator, so a partial write never
//! erases fields omitted from it.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tally_engine::RemoteDocument;

/// A stored document row from the database.
#[derive(Debug)]
pub struct StoredDocument {
    pub principal: String,
    pub local_id: i64,
    pub fields: serde_json::Value,
    pub synced_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredDocument {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredDocument {
            principal: row.try_get("principal")?,
            local_id: row.try_get("local_id")?,
            fields: row.try_get("fields")?,
            synced_at: row.try_get("synced_at")?,
        })
    }
}

impl StoredDocument {
    /// Convert database row to the engine's wire document.
    pub fn to_remote_document(&self) -> RemoteDocument {
        let fields = match &self.fields {
            serde_json::Value::Object(map) => map.clone(),
            // A non-object fields column cannot happen through the upsert
            // path; surface it as an empty document rather than panicking.
            _ => serde_json::Map::new(),
        };
        RemoteDocument {
            local_id: self.local_id.to_string(),
            fields,
            synced_at: self.synced_at.timestamp_millis().max(0) as u64,
        }
    }
}

/// Merge-upsert a document for a principal.
pub async fn upsert_document(
    pool: &PgPool,
    principal: &str,
    local_id: i64,
    fields: &serde_json::Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO documents (principal, local_id, fields, synced_at)
        VALUES ($1, $2, $3, now())
        ON CONFLICT (principal, local_id) DO UPDATE SET
            fields = documents.fields || EXCLUDED.fields,
            synced_at = EXCLUDED.synced_at
        "#,
    )
    .bind(principal)
    .bind(local_id)
    .bind(fields)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get all documents of a principal.
pub async fn fetch_documents(
    pool: &PgPool,
    principal: &str,
) -> Result<Vec<StoredDocument>, sqlx::Error> {
    sqlx::query_as::<_, StoredDocument>(
        r#"
        SELECT principal, local_id, fields, synced_at
        FROM documents
        WHERE principal = $1
        ORDER BY local_id
        "#,
    )
    .bind(principal)
    .fetch_all(pool)
    .await
}

/// Delete the document with this local id. A no-op when absent; the
/// client's delete intent already holds either way.
pub async fn delete_document(
    pool: &PgPool,
    principal: &str,
    local_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        DELETE FROM documents
        WHERE principal = $1 AND local_id = $2
        "#,
    )
    .bind(principal)
    .bind(local_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete every document of a principal. Returns the number removed.
pub async fn purge_documents(pool: &PgPool, principal: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM documents
        WHERE principal = $1
        "#,
    )
    .bind(principal)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
