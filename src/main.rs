// src/main.rs
use actix_web::{App, HttpServer, middleware, web};
use anyhow::Context;
use log::info;
use std::sync::Arc;
use std::time::Duration;

mod config;
mod errors;
mod handlers;
mod models;
mod services;

use crate::config::{Config, StorageBackend};
use crate::services::{Analyzer, GeminiService, MediaProcessor, MemoryStore, RedisStore, ScanStore};

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn ScanStore>,
    analyzer: Arc<dyn Analyzer>,
    media_processor: Arc<MediaProcessor>,
    history_limit: usize,
    max_upload_bytes: usize,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting ScamGuard service...");

    let config = Config::from_env()?;

    // Initialize services
    let store: Arc<dyn ScanStore> = match config.storage_backend {
        StorageBackend::Redis => Arc::new(
            RedisStore::new(&config.redis_url, config.retention_secs)
                .await
                .with_context(|| format!("Failed to connect to Redis at {}", config.redis_url))?,
        ),
        StorageBackend::Memory => {
            info!("Using in-memory scan store; history is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };
    let analyzer = Arc::new(
        GeminiService::new(
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
            config.gemini_base_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
        .context("Failed to initialize Gemini client")?,
    );
    let media_processor = Arc::new(MediaProcessor::new(
        config.max_upload_bytes,
        config.max_image_dimension,
    ));

    let app_state = AppState {
        store,
        analyzer,
        media_processor,
        history_limit: config.history_limit,
        max_upload_bytes: config.max_upload_bytes,
    };

    info!(
        "Starting HTTP server on {} (model: {})",
        config.bind_addr, config.gemini_model
    );

    let json_limit = config.json_limit();

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().limit(json_limit))
            .wrap(middleware::Logger::default())
            .configure(handlers::configure)
    })
    .bind(&config.bind_addr)
    .with_context(|| format!("Failed to bind {}", config.bind_addr))?
    .run()
    .await?;

    Ok(())
}
