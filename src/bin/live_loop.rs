//! Thin polling client: fetch spot prices, append to the observation store,
//! score through the serving context and log the result.

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};
use tricast::{
    append_observation, init_logging, load_serving_artifacts, log_app_start,
    logging_config_from_env, open_store, Coin, OnlineFeatureEngine, ServingContext, Tick,
    DEFAULT_BUFFER_CAPACITY,
};

const PRICE_URL: &str = "https://api.coingecko.com/api/v3/simple/price\
                         ?ids=bitcoin,ethereum,litecoin&vs_currencies=usd\
                         &include_24hr_vol=true";

fn main() -> Result<(), Box<dyn Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start("live_loop", &logging_cfg);

    let model_dir = PathBuf::from(
        std::env::var("TRICAST_MODEL_DIR").unwrap_or_else(|_| "models".to_string()),
    );
    let (schema, scorers, thresholds) = load_serving_artifacts(&model_dir)?;

    let mut engine = OnlineFeatureEngine::new(DEFAULT_BUFFER_CAPACITY)?;
    engine.set_feature_columns(schema.columns.clone());
    let context = ServingContext::new(engine, scorers, thresholds);

    let store_path = PathBuf::from(
        std::env::var("TRICAST_STORE_PATH").unwrap_or_else(|_| "observations.sqlite".to_string()),
    );
    let store = open_store(&store_path)?;

    let poll_seconds: u64 = std::env::var("TRICAST_POLL_SECONDS")
        .unwrap_or_else(|_| "15".to_string())
        .parse()?;
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    loop {
        match fetch_tick(&client) {
            Ok(tick) => {
                append_observation(&store, Utc::now().timestamp_millis(), &tick)?;
                match context.predict_from_tick(tick) {
                    Ok(response) if response.ready => {
                        for coin in Coin::ALL {
                            let prediction =
                                response.prediction(coin).expect("ready response is complete");
                            info!(
                                component = "live_loop",
                                event = "live.prediction",
                                coin = coin.ticker(),
                                proba = prediction.proba,
                                label = prediction.label
                            );
                        }
                    }
                    Ok(_) => info!(
                        component = "live_loop",
                        event = "live.not_ready"
                    ),
                    Err(err) => warn!(
                        component = "live_loop",
                        event = "live.predict.error",
                        error = %err
                    ),
                }
            }
            Err(err) => warn!(
                component = "live_loop",
                event = "live.fetch.error",
                error = %err
            ),
        }

        std::thread::sleep(Duration::from_secs(poll_seconds));
    }
}

fn fetch_tick(client: &reqwest::blocking::Client) -> Result<Tick, Box<dyn Error>> {
    let body = client.get(PRICE_URL).send()?.error_for_status()?.text()?;
    let json: serde_json::Value = serde_json::from_str(&body)?;

    let price = |coin: &str| json[coin]["usd"].as_f64().unwrap_or(f64::NAN);
    // volume is best-effort; 0 is an acceptable placeholder when absent
    let volume = |coin: &str| json[coin]["usd_24h_vol"].as_f64().unwrap_or(0.0);

    Ok(Tick {
        bitcoin_price: price("bitcoin"),
        bitcoin_volume: volume("bitcoin"),
        ethereum_price: price("ethereum"),
        ethereum_volume: volume("ethereum"),
        litecoin_price: price("litecoin"),
        litecoin_volume: volume("litecoin"),
    })
}
