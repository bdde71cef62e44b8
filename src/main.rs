use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use amoria::api::{self, AppState};
use amoria::auth::{AdminSessions, SiteGate};
use amoria::hydration::HydrationGate;
use amoria::store::Store;
use amoria::upload::MediaStore;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    // Load environment variables
    dotenvy::dotenv().ok();

    // Get configuration from environment
    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "8070".to_string())
        .parse()
        .expect("PORT must be a number");

    let db_path = env::var("DATABASE_PATH").unwrap_or_else(|_| "amoria.db".to_string());
    let media_dir = env::var("MEDIA_DIR").unwrap_or_else(|_| "media".to_string());

    // Hydrate the content store (seeds the first-run dataset when empty)
    let store = Arc::new(Store::open(&db_path).expect("Failed to open content store"));

    let admin = Arc::new(AdminSessions::new());
    admin.subscribe(|logged_in| {
        if logged_in {
            log::info!("admin session opened");
        } else {
            log::info!("admin session closed");
        }
    });

    let media = Arc::new(MediaStore::new(PathBuf::from(&media_dir)));

    let hydration = Arc::new(HydrationGate::new());
    if hydration.mark_hydrated() {
        log::info!("content store hydrated");
    }

    log::info!("Database: {}", db_path);
    log::info!("Media dir: {}", media_dir);

    let app_admin = admin.clone();
    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .wrap(SiteGate)
            // Register AdminSessions individually for the admin extractor
            .app_data(web::Data::from(app_admin.clone()))
            .app_data(web::Data::new(AppState {
                store: store.clone(),
                admin: app_admin.clone(),
                media: media.clone(),
                hydration: hydration.clone(),
            }))
            // Payload size limit matches the video upload ceiling (50MB)
            .app_data(web::PayloadConfig::new(50 * 1024 * 1024))
            .configure(api::configure_routes)
    })
    .workers(1); // Single worker for minimal memory

    log::info!("Starting amoria server on port {}", port);

    server.bind(("0.0.0.0", port))?.run().await
}
