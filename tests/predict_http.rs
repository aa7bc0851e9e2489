use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use tower::util::ServiceExt;
use tricast::{
    feature_columns, predict_router, CoinScorers, OnlineFeatureEngine, Scorer, ServingContext,
    Thresholds, Tick, MA_LONG,
};

struct ConstantScorer(f64);

impl Scorer for ConstantScorer {
    fn predict_proba(&self, _features: &[f64]) -> f64 {
        self.0
    }
}

fn context_with_probas(btc: f64, eth: f64, ltc: f64) -> Arc<ServingContext> {
    let scorers = CoinScorers {
        bitcoin: Box::new(ConstantScorer(btc)),
        ethereum: Box::new(ConstantScorer(eth)),
        litecoin: Box::new(ConstantScorer(ltc)),
    };
    Arc::new(ServingContext::new(
        OnlineFeatureEngine::with_default_capacity(),
        scorers,
        Thresholds::default(),
    ))
}

fn sample_tick(i: usize) -> Tick {
    let t = i as f64;
    Tick {
        bitcoin_price: 100.0 + t,
        bitcoin_volume: 1_000.0,
        ethereum_price: 50.0 + t,
        ethereum_volume: 500.0,
        litecoin_price: 10.0 + t,
        litecoin_volume: 50.0,
    }
}

fn warm_up(context: &ServingContext) {
    for i in 0..(MA_LONG + 5) {
        context
            .predict_from_tick(sample_tick(i))
            .expect("warmup tick");
    }
}

async fn post_predict_json(
    context: Arc<ServingContext>,
    tick: Tick,
) -> (StatusCode, serde_json::Value) {
    let app = predict_router(context);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/predict")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&tick).expect("tick json")))
                .expect("request builds"),
        )
        .await
        .expect("request succeeds");

    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    (status, serde_json::from_slice(&body).expect("json body"))
}

#[tokio::test]
async fn first_tick_returns_not_ready_without_coin_keys() {
    let context = context_with_probas(0.7, 0.7, 0.7);
    let (status, json) = post_predict_json(context, sample_tick(0)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!({ "ready": false }));
}

#[tokio::test]
async fn warm_engine_scores_every_coin_with_default_thresholds() {
    // 0.52 clears only litecoin's 0.50 default threshold
    let context = context_with_probas(0.70, 0.52, 0.52);
    warm_up(&context);

    let (status, json) = post_predict_json(Arc::clone(&context), sample_tick(MA_LONG + 5)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);
    assert_eq!(json["BTC"]["proba"], 0.70);
    assert_eq!(json["BTC"]["label"], 1);
    assert_eq!(json["ETH"]["proba"], 0.52);
    assert_eq!(json["ETH"]["label"], 0);
    assert_eq!(json["LTC"]["label"], 1);
}

#[tokio::test]
async fn schema_endpoint_exposes_the_served_column_order() {
    let context = context_with_probas(0.5, 0.5, 0.5);
    let app = predict_router(context);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/schema")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");

    let columns: Vec<String> = json["columns"]
        .as_array()
        .expect("columns array")
        .iter()
        .map(|v| v.as_str().expect("column name").to_string())
        .collect();
    assert_eq!(columns, feature_columns());
    assert!(json["fingerprint"].as_str().expect("fingerprint").len() == 64);
}

#[tokio::test]
async fn buffer_commit_survives_scoring_and_state_advances_across_requests() {
    let context = context_with_probas(0.9, 0.9, 0.9);

    // drive the same context through many separate routers, as separate HTTP
    // requests would; the shared engine keeps accumulating history
    let mut became_ready_at = None;
    for i in 0..5 {
        let (status, json) = post_predict_json(Arc::clone(&context), sample_tick(i)).await;
        assert_eq!(status, StatusCode::OK);
        if json["ready"] == true && became_ready_at.is_none() {
            became_ready_at = Some(i);
        }
    }

    // the second observation is enough for a (zero-filled) lagged row
    assert_eq!(became_ready_at, Some(1));
}
