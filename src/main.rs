// src/main.rs
use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};

use jsjudge::api::handlers::WsBroker;
use jsjudge::api::{configure_routes, AppState};
use jsjudge::config::AppConfig;
use jsjudge::host::HostController;
use jsjudge::{banner, database, worker};

fn main() -> std::io::Result<()> {
    let mut args = std::env::args().skip(1);
    if args.next().as_deref() == Some(worker::WORKER_SUBCOMMAND) {
        return run_worker(args.collect());
    }
    serve()
}

/// Child-process side of process isolation. Stdout carries the response only.
fn run_worker(args: Vec<String>) -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::new().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let limits = worker::parse_worker_args(args).map_err(std::io::Error::other)?;
    worker::serve_stdio(&limits).map_err(std::io::Error::other)
}

fn serve() -> std::io::Result<()> {
    actix_web::rt::System::new().block_on(run_server())
}

async fn run_server() -> std::io::Result<()> {
    banner::print_banner();

    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let app_config = AppConfig::load().map_err(std::io::Error::other)?;

    let db_pool = match app_config.database_url.as_deref() {
        Some(url) => match database::init_db(url).await {
            Ok(pool) => Some(pool),
            Err(e) => {
                log::error!("Workspace persistence disabled, database init failed: {}", e);
                None
            }
        },
        None => {
            log::info!("DATABASE_URL not set; workspace persistence disabled");
            None
        }
    };

    let sandbox_worker = app_config
        .sandbox
        .build_worker()
        .map_err(std::io::Error::other)?;
    log::info!(
        "Sandbox: {:?} isolation, {}ms timeout",
        app_config.sandbox.isolation,
        app_config.sandbox.timeout_ms
    );

    let bind = (app_config.server.host.clone(), app_config.server.port);
    let state = AppState::new(app_config, HostController::new(sandbox_worker), db_pool);
    let broker = WsBroker::new();

    println!("🚀 Listening on http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(state.clone()))
            .app_data(web::Data::new(broker.clone()))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .configure(configure_routes)
    })
    .bind(bind)?
    .run()
    .await
}
