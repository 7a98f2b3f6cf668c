use std::{env, net::SocketAddr, sync::Arc};

use krishi_mitra_rs::{
    backends,
    logger::init_logger,
    routes::{router, AppState},
    uploads::UploadStore,
    Config,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // missing .env is fine, the process environment still applies
    let _ = dotenvy::dotenv();

    let json_logs = env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    init_logger(json_logs);

    let config = Config::from_env().map_err(|e| {
        tracing::error!("Invalid configuration: {}", e);
        e
    })?;

    let http = backends::build_http_client(config.backends.timeout)?;

    #[cfg(feature = "tensorflow")]
    if let Some(tf) = &config.backends.tensorflow {
        krishi_mitra_rs::model_files::ensure_files_exist(&http, tf).await?;
    }

    let uploads = UploadStore::bootstrap(&config.upload_dir, config.keep_uploads).await?;
    let state = Arc::new(AppState {
        detection: backends::detection_chain(&config.backends, &http)?,
        chat: backends::chat_chain(&config.backends, &http),
        uploads,
    });

    let app = router(state, &config.static_dir, config.body_limit_bytes);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on http://{}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
