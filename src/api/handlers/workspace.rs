// src/api/handlers/workspace.rs
use actix_web::{web, HttpResponse, Result};
use serde_json::json;

use crate::api::AppState;
use crate::database::{self, Workspace};

/// GET /api/v1/workspace - Restore the saved prompt, program and cases
pub async fn get_workspace(state: web::Data<AppState>) -> Result<HttpResponse> {
    let Some(pool) = state.db_pool.as_ref() else {
        return Ok(HttpResponse::ServiceUnavailable().json(json!({
            "error": "Database not configured"
        })));
    };

    match database::load_workspace(pool).await {
        Ok(Some(workspace)) => Ok(HttpResponse::Ok().json(workspace)),
        Ok(None) => Ok(HttpResponse::NotFound().json(json!({
            "error": "No workspace saved"
        }))),
        Err(e) => {
            log::error!("Failed to load workspace: {}", e);
            Ok(HttpResponse::InternalServerError().json(json!({
                "error": "Failed to load workspace"
            })))
        }
    }
}

/// PUT /api/v1/workspace - Save the prompt, program and cases
pub async fn put_workspace(
    state: web::Data<AppState>,
    req: web::Json<Workspace>,
) -> Result<HttpResponse> {
    let Some(pool) = state.db_pool.as_ref() else {
        return Ok(HttpResponse::ServiceUnavailable().json(json!({
            "error": "Database not configured"
        })));
    };

    let workspace = req.into_inner();
    match database::save_workspace(pool, &workspace).await {
        Ok(()) => Ok(HttpResponse::Ok().json(workspace)),
        Err(e) => {
            log::error!("Failed to save workspace: {}", e);
            Ok(HttpResponse::InternalServerError().json(json!({
                "error": "Failed to save workspace"
            })))
        }
    }
}
