use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};
use std::io;
use std::sync::Arc;

use tasknest::{
    auth::AuthMiddleware,
    config::Config,
    routes::{self, health},
    state::AppState,
    store::PgStore,
};

fn other_error<E: std::fmt::Display>(context: &str, error: E) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, error))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| other_error("Invalid configuration", e))?;

    let state = match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url, config.database_max_connections)
                .await
                .map_err(|e| other_error("Failed to connect to database", e))?;
            log::info!("Using PostgreSQL store");
            AppState::from_config(&config, Arc::new(store))
        }
        None => {
            log::warn!("DATABASE_URL is not set; using the in-memory store, data will not persist");
            AppState::in_memory(&config)
        }
    }
    .map_err(|e| other_error("Invalid configuration", e))?;
    let state = web::Data::new(state);

    log::info!("Starting TaskNest server at {}", config.server_url());

    let cors_origin = config.cors_allowed_origin.clone();
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&cors_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
            .supports_credentials()
            .max_age(3600);

        // Registration order: the last `wrap` runs first.
        App::new()
            .app_data(state.clone())
            .wrap(AuthMiddleware)
            .wrap(cors)
            .wrap(Logger::default())
            .service(health::health)
            .service(web::scope("/api").configure(routes::config))
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await
}
