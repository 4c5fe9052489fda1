use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use convertly::{server, Converter, ServerConfig};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from_env()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    log::info!("🦀 Starting Convertly conversion service");
    log::info!("📍 Listening on {}:{}", config.host, config.port);
    log::info!(
        "📊 Accepted input: PNG, JPEG, WebP (max {} bytes per file, {} files per request)",
        config.limits.max_file_size,
        config.limits.max_files
    );
    log::info!("📤 Output formats: PNG, JPG/JPEG, WebP, PDF");

    let converter = web::Data::new(Converter::with_settings(config.encoder));
    let limits = web::Data::new(config.limits.clone());

    let mut http_server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .expose_any_header()
            .max_age(3600);

        App::new()
            .app_data(converter.clone())
            .app_data(limits.clone())
            .wrap(Logger::default())
            .wrap(cors)
            .configure(server::routes)
    });

    if let Some(workers) = config.workers {
        http_server = http_server.workers(workers);
    }

    http_server.bind((config.host.as_str(), config.port))?.run().await
}
