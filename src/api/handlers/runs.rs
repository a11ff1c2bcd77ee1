// src/api/handlers/runs.rs
use actix_web::{web, HttpResponse, Result};
use serde::Deserialize;
use serde_json::json;

use crate::api::AppState;
use crate::api::handlers::ws::{VerdictUpdate, WsBroker};
use crate::host::RawCase;
use crate::models::RunRequest;

#[derive(Deserialize)]
pub struct RunCasesRequest {
    pub code: String,
    #[serde(default)]
    pub cases: Vec<RawCase>,
}

/// POST /api/v1/runs - Parse the typed cases and run them against the program
pub async fn run_cases(
    state: web::Data<AppState>,
    broker: web::Data<WsBroker>,
    req: web::Json<RunCasesRequest>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    let dispatch = state.host.dispatch(&req.code, &req.cases).await;

    if !dispatch.superseded {
        broker.broadcast(VerdictUpdate::from(&dispatch.verdict)).await;
    }

    Ok(HttpResponse::Ok().json(dispatch))
}

/// POST /api/v1/sandbox/execute - Raw request/response exchange with the sandbox
pub async fn execute(
    state: web::Data<AppState>,
    req: web::Json<RunRequest>,
) -> Result<HttpResponse> {
    let response = state.host.worker().execute(req.into_inner()).await;
    Ok(HttpResponse::Ok().json(response))
}

/// GET /api/v1/runs/latest - The verdict currently on display
pub async fn get_latest(state: web::Data<AppState>) -> Result<HttpResponse> {
    match state.host.current().await {
        Some(verdict) => Ok(HttpResponse::Ok().json(verdict)),
        None => Ok(HttpResponse::NotFound().json(json!({
            "error": "No run has completed yet"
        }))),
    }
}
