mod config;
mod error;
mod inference;
mod routes;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use config::AppConfig;
use inference::ModelHandle;
use routes::configure_routes;

/// Any origin and any request header may call the API.
fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_any_header()
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    // A bad artifact must not keep the health endpoint down.
    let model = ModelHandle::load(&config.model_path);
    if !model.is_loaded() {
        log::warn!("Serving without a model; /predict will report it as not loaded");
    }

    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    let model = web::Data::new(model);
    let app_config = web::Data::new(config);

    HttpServer::new(move || {
        App::new()
            .wrap(cors())
            .wrap(Logger::default())
            .app_data(model.clone())
            .app_data(app_config.clone())
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
