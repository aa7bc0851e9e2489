//! Scoring boundary: serving context, prediction response and HTTP routes.

use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::features::{schema_for_columns, Coin, FeatureError, FeatureSchema, Tick};
use crate::online::OnlineFeatureEngine;

/// Opaque per-coin scoring function: aligned feature row in, probability out.
pub trait Scorer: Send + Sync + 'static {
    fn predict_proba(&self, features: &[f64]) -> f64;
}

/// Per-coin decision thresholds applied to the scored probability. Missing
/// entries in a persisted thresholds file fall back to these defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default = "Thresholds::default_btc")]
    pub btc: f64,
    #[serde(default = "Thresholds::default_eth")]
    pub eth: f64,
    #[serde(default = "Thresholds::default_ltc")]
    pub ltc: f64,
}

impl Thresholds {
    fn default_btc() -> f64 {
        0.55
    }

    fn default_eth() -> f64 {
        0.55
    }

    fn default_ltc() -> f64 {
        0.50
    }

    pub fn for_coin(&self, coin: Coin) -> f64 {
        match coin {
            Coin::Bitcoin => self.btc,
            Coin::Ethereum => self.eth,
            Coin::Litecoin => self.ltc,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            btc: Self::default_btc(),
            eth: Self::default_eth(),
            ltc: Self::default_ltc(),
        }
    }
}

pub struct CoinScorers {
    pub bitcoin: Box<dyn Scorer>,
    pub ethereum: Box<dyn Scorer>,
    pub litecoin: Box<dyn Scorer>,
}

impl CoinScorers {
    fn get(&self, coin: Coin) -> &dyn Scorer {
        match coin {
            Coin::Bitcoin => self.bitcoin.as_ref(),
            Coin::Ethereum => self.ethereum.as_ref(),
            Coin::Litecoin => self.litecoin.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoinPrediction {
    pub proba: f64,
    pub label: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub ready: bool,
    #[serde(rename = "BTC", skip_serializing_if = "Option::is_none")]
    pub btc: Option<CoinPrediction>,
    #[serde(rename = "ETH", skip_serializing_if = "Option::is_none")]
    pub eth: Option<CoinPrediction>,
    #[serde(rename = "LTC", skip_serializing_if = "Option::is_none")]
    pub ltc: Option<CoinPrediction>,
}

impl PredictionResponse {
    pub fn not_ready() -> Self {
        Self {
            ready: false,
            btc: None,
            eth: None,
            ltc: None,
        }
    }

    pub fn prediction(&self, coin: Coin) -> Option<CoinPrediction> {
        match coin {
            Coin::Bitcoin => self.btc,
            Coin::Ethereum => self.eth,
            Coin::Litecoin => self.ltc,
        }
    }

    fn set(&mut self, coin: Coin, prediction: CoinPrediction) {
        match coin {
            Coin::Bitcoin => self.btc = Some(prediction),
            Coin::Ethereum => self.eth = Some(prediction),
            Coin::Litecoin => self.ltc = Some(prediction),
        }
    }
}

/// Explicitly constructed serving state: the single engine advancing one
/// logical tick stream, the opaque scorers and the decision thresholds.
/// No global mutable state; independent contexts stay independent.
pub struct ServingContext {
    engine: Mutex<OnlineFeatureEngine>,
    scorers: CoinScorers,
    thresholds: Thresholds,
    schema: FeatureSchema,
}

impl ServingContext {
    pub fn new(engine: OnlineFeatureEngine, scorers: CoinScorers, thresholds: Thresholds) -> Self {
        let schema = schema_for_columns(engine.feature_columns().to_vec());
        Self {
            engine: Mutex::new(engine),
            scorers,
            thresholds,
            schema,
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Advances the engine with one tick and scores the resulting row.
    ///
    /// The buffer update commits even when nothing downstream runs: short
    /// history is a "not ready" response, never an error.
    pub fn predict_from_tick(&self, tick: Tick) -> Result<PredictionResponse, FeatureError> {
        let row = {
            let mut engine = self
                .engine
                .lock()
                .expect("engine lock should not be poisoned");
            engine.update(tick)?
        };

        let Some(row) = row else {
            return Ok(PredictionResponse::not_ready());
        };

        let mut response = PredictionResponse {
            ready: true,
            btc: None,
            eth: None,
            ltc: None,
        };
        for coin in Coin::ALL {
            let proba = self.scorers.get(coin).predict_proba(&row).clamp(0.0, 1.0);
            let label = u8::from(proba >= self.thresholds.for_coin(coin));
            response.set(coin, CoinPrediction { proba, label });
        }
        Ok(response)
    }
}

#[derive(Clone)]
struct PredictAppState {
    context: Arc<ServingContext>,
}

pub fn predict_router(context: Arc<ServingContext>) -> Router {
    Router::new()
        .route("/predict", post(post_predict))
        .route("/schema", get(get_schema))
        .with_state(PredictAppState { context })
}

async fn post_predict(
    State(state): State<PredictAppState>,
    Json(tick): Json<Tick>,
) -> impl IntoResponse {
    match state.context.predict_from_tick(tick) {
        Ok(response) => {
            info!(
                component = "predict_server",
                event = "http.predict.request",
                ready = response.ready
            );
            Json(response).into_response()
        }
        Err(err) => {
            warn!(
                component = "predict_server",
                event = "http.predict.error",
                error = %err
            );
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

async fn get_schema(State(state): State<PredictAppState>) -> impl IntoResponse {
    Json(state.context.schema().clone())
}
