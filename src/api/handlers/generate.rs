// src/api/handlers/generate.rs
use actix_web::{web, HttpResponse, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::AppState;
use crate::errors::JudgeError;
use crate::generator;

#[derive(Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

pub async fn generate(
    state: web::Data<AppState>,
    req: web::Json<GenerateRequest>,
) -> Result<HttpResponse> {
    let req = req.into_inner();

    match generator::generate_program(
        &state.config,
        &state.client,
        &req.prompt,
        req.model.as_deref(),
        req.api_key.as_deref(),
    )
    .await
    {
        Ok(program) => Ok(HttpResponse::Ok().json(program)),
        Err(e) => {
            log::warn!("Code generation failed: {}", e);
            let body = json!({ "error": e.to_string() });
            Ok(match e {
                JudgeError::Config(_) | JudgeError::ProviderNotFound(_) | JudgeError::EmptyResponse => {
                    HttpResponse::BadRequest().json(body)
                }
                JudgeError::ApiError { .. } | JudgeError::Request(_) | JudgeError::UnexpectedResponse(_) => {
                    HttpResponse::BadGateway().json(body)
                }
                _ => HttpResponse::InternalServerError().json(body),
            })
        }
    }
}

#[derive(Serialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
}

pub async fn get_models(state: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(ModelsResponse { models: state.config.models.clone() }))
}
