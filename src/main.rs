use actix_cors::Cors;
use actix_web::{web, App, HttpServer};

use allvideosaver::config::AppConfig;
use allvideosaver::state::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cfg_path = std::env::args()
        .skip_while(|a| a != "--config")
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let cfg = match AppConfig::load(&cfg_path).and_then(|mut c| c.prepare().map(|_| c)) {
        Ok(c) => c,
        Err(e) => {
            log::error!("[CONFIG] Failed to load {}: {:#}", cfg_path, e);
            std::process::exit(1);
        }
    };

    println!("========================================");
    println!("  AllVideoSaver");
    println!("  http://{}", cfg.listen_addr);
    println!("========================================");
    println!();
    log::info!("[CONFIG] download_dir={}", cfg.download_dir.display());
    if let Some(ffmpeg) = &cfg.ffmpeg_location {
        log::info!("[CONFIG] ffmpeg_location={}", ffmpeg.display());
    }

    let state = web::Data::new(AppState::new(cfg));
    let cleanup = state.cleanup.clone();

    let bind_addr = state.config.listen_addr.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(Cors::permissive())
            .app_data(state.clone())
            .configure(allvideosaver::routes)
    })
    .bind(bind_addr.as_str())?
    .run()
    .await?;

    // Don't leave served files behind on shutdown.
    cleanup.flush().await;
    Ok(())
}
