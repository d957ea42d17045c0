//! Document endpoints - the mirror side of the sync protocol.
//!
//! Clients address documents by their own local record id; the server
//! never invents identifiers. All routes operate strictly within the
//! authenticated principal's document set.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::Serialize;
use tally_engine::RemoteDocument;

use crate::auth::AuthPrincipal;
use crate::db;
use crate::error::{AppError, Result};
use crate::AppState;

/// Create document routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/documents", get(fetch_all).delete(purge))
        .route(
            "/documents/{local_id}",
            delete(remove).put(upsert),
        )
}

/// Response for a purge request.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeResponse {
    pub purged: u64,
}

/// GET /documents - every document of the principal.
async fn fetch_all(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
) -> Result<Json<Vec<RemoteDocument>>> {
    let stored = db::fetch_documents(&state.pool, &principal).await?;
    let documents = stored
        .iter()
        .map(db::StoredDocument::to_remote_document)
        .collect();
    Ok(Json(documents))
}

/// PUT /documents/{local_id} - merge-upsert one document.
///
/// The body is the record's field object. Fields present in the body
/// overwrite stored values; fields absent from it are kept.
async fn upsert(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(local_id): Path<String>,
    Json(fields): Json<serde_json::Value>,
) -> Result<StatusCode> {
    let local_id = parse_local_id(&local_id)?;
    if !fields.is_object() {
        return Err(AppError::BadRequest(
            "document body must be a JSON object".to_string(),
        ));
    }

    db::upsert_document(&state.pool, &principal, local_id, &fields).await?;
    tracing::debug!(principal = %principal, local_id, "document upserted");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /documents/{local_id} - remove one document.
///
/// Succeeds whether or not the document exists; clients replay deletes
/// for records that were never pushed.
async fn remove(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(local_id): Path<String>,
) -> Result<StatusCode> {
    let local_id = parse_local_id(&local_id)?;
    db::delete_document(&state.pool, &principal, local_id).await?;
    tracing::debug!(principal = %principal, local_id, "document deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /documents - remove every document of the principal.
async fn purge(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
) -> Result<Json<PurgeResponse>> {
    let purged = db::purge_documents(&state.pool, &principal).await?;
    tracing::info!(principal = %principal, purged, "documents purged");
    Ok(Json(PurgeResponse { purged }))
}

fn parse_local_id(raw: &str) -> Result<i64> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("invalid local id: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_id_parsing() {
        assert_eq!(parse_local_id("42").unwrap(), 42);
        assert_eq!(parse_local_id("0").unwrap(), 0);
        assert!(parse_local_id("not-a-number").is_err());
        assert!(parse_local_id("").is_err());
        assert!(parse_local_id("1.5").is_err());
    }
}
