//! Tricast core crate.
//!
//! Rolling technical-indicator features for three coins, exposed identically
//! in two regimes:
//! - offline: full-history feature/label transform for training
//! - online: incremental recomputation over a bounded tick buffer for live
//!   scoring, numerically equivalent to the offline path

mod artifacts;
mod features;
mod frame;
mod observability;
mod online;
mod serving;
mod store;
mod training;

pub use artifacts::{
    load_feature_columns, load_scorer, load_serving_artifacts, load_thresholds, model_file,
    save_feature_columns, save_thresholds, ArtifactError, LinearModelArtifact, LinearScorer,
    FEATURE_COLUMNS_FILE, THRESHOLDS_FILE,
};
pub use features::{
    assert_schema_compatible, build_feature_schema, build_features, corr_column, feature_columns,
    frame_from_ticks, label_column, log_volume_column, ma_column, price_column, raw_columns,
    return_column, return_lag_column, schema_for_columns, volatility_column, volume_column, Coin,
    FeatureError, FeatureSchema, Tick, CORR_PAIRS, CORR_WINDOW, FEATURE_SCHEMA_VERSION, MA_LONG,
    MA_SHORT, VOL_WINDOW,
};
pub use frame::{Frame, FrameError};
pub use observability::{
    init_logging, log_app_bind, log_app_start, log_engine_ready, logging_config_from_env,
    LogFormat, LoggingConfig, LoggingInitError,
};
pub use online::{OnlineFeatureEngine, DEFAULT_BUFFER_CAPACITY, MIN_BUFFER_CAPACITY};
pub use serving::{
    predict_router, CoinPrediction, CoinScorers, PredictionResponse, Scorer, ServingContext,
    Thresholds,
};
pub use store::{append_observation, load_observations, open_store, StoreError};
pub use training::{assemble_training_frame, label_directions, TrainingFrame};
