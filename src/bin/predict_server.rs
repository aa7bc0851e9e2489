use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use tricast::{
    init_logging, load_serving_artifacts, log_app_bind, log_app_start, log_engine_ready,
    logging_config_from_env, predict_router, OnlineFeatureEngine, ServingContext,
    DEFAULT_BUFFER_CAPACITY,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start("predict_server", &logging_cfg);

    let model_dir = PathBuf::from(
        std::env::var("TRICAST_MODEL_DIR").unwrap_or_else(|_| "models".to_string()),
    );
    let (schema, scorers, thresholds) = load_serving_artifacts(&model_dir)?;

    let capacity = std::env::var("TRICAST_BUFFER_CAPACITY")
        .ok()
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(DEFAULT_BUFFER_CAPACITY);
    let mut engine = OnlineFeatureEngine::new(capacity)?;
    engine.set_feature_columns(schema.columns.clone());
    log_engine_ready(capacity, schema.columns.len(), &schema.fingerprint);

    let context = Arc::new(ServingContext::new(engine, scorers, thresholds));
    let app = predict_router(context);

    let addr: SocketAddr = std::env::var("TRICAST_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
        .parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log_app_bind(listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
