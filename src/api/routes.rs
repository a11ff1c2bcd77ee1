// src/api/routes.rs
use actix_web::web;
use super::handlers;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(handlers::health_check))
            .route("/models", web::get().to(handlers::get_models))
            .route("/generate", web::post().to(handlers::generate))
            .route("/sandbox/execute", web::post().to(handlers::execute))
            .route("/ws", web::get().to(handlers::ws_handler))
            .service(
                web::scope("/runs")
                    .route("", web::post().to(handlers::run_cases))
                    .route("/latest", web::get().to(handlers::get_latest))
            )
            .service(
                web::resource("/workspace")
                    .route(web::get().to(handlers::get_workspace))
                    .route(web::put().to(handlers::put_workspace))
            )
    );
}
