pub mod cleanup;
pub mod config;
pub mod error;
pub mod extractor;
pub mod formats;
pub mod handlers;
pub mod models;
pub mod state;
pub mod util;

use actix_web::web;

/// Routes shared by the binary and the HTTP tests.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(handlers::json_config())
        .service(web::resource("/").route(web::get().to(handlers::index)))
        .service(web::resource("/static/{name}").route(web::get().to(handlers::static_file)))
        .service(
            web::scope("/api")
                .service(web::resource("/fetch-info").route(web::post().to(handlers::fetch_info)))
                .service(web::resource("/download").route(web::post().to(handlers::download))),
        );
}
