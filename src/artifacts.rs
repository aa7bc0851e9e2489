//! Persisted serving artifacts, produced by the training side and loaded
//! read-only at serving start: the authoritative feature-column list, an
//! optional per-coin thresholds file and per-coin linear model weights.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::features::{
    assert_schema_compatible, schema_for_columns, Coin, FeatureError, FeatureSchema,
    FEATURE_SCHEMA_VERSION,
};
use crate::serving::{CoinScorers, Scorer, Thresholds};

pub const FEATURE_COLUMNS_FILE: &str = "feature_columns.json";
pub const THRESHOLDS_FILE: &str = "thresholds.json";

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("artifact parse error at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Schema(#[from] FeatureError),
    #[error("model for {coin} has {actual} weights, feature set has {expected} columns")]
    WeightCountMismatch {
        coin: String,
        expected: usize,
        actual: usize,
    },
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ArtifactError> {
    let raw = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ArtifactError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    let raw = serde_json::to_string_pretty(value).expect("artifact types serialize");
    fs::write(path, raw).map_err(|source| ArtifactError::Io {
        path: path.display().to_string(),
        source,
    })
}

pub fn save_feature_columns(dir: &Path, schema: &FeatureSchema) -> Result<(), ArtifactError> {
    write_json(&dir.join(FEATURE_COLUMNS_FILE), schema)
}

/// Loads the persisted feature-column list, recomputing and verifying the
/// fingerprint so a hand-edited or stale file fails loudly at startup rather
/// than silently reordering the feature vector.
pub fn load_feature_columns(dir: &Path) -> Result<FeatureSchema, ArtifactError> {
    let stored: FeatureSchema = read_json(&dir.join(FEATURE_COLUMNS_FILE))?;
    let recomputed = schema_for_columns(stored.columns.clone());
    assert_schema_compatible(FEATURE_SCHEMA_VERSION, &stored.fingerprint, &recomputed)?;

    info!(
        component = "artifacts",
        event = "artifacts.feature_columns.loaded",
        column_count = stored.columns.len(),
        fingerprint = %stored.fingerprint
    );
    Ok(stored)
}

pub fn save_thresholds(dir: &Path, thresholds: &Thresholds) -> Result<(), ArtifactError> {
    write_json(&dir.join(THRESHOLDS_FILE), thresholds)
}

/// Loads per-coin thresholds, falling back to the hardcoded defaults when the
/// file is missing or unreadable. Never fatal.
pub fn load_thresholds(dir: &Path) -> Thresholds {
    let path = dir.join(THRESHOLDS_FILE);
    match read_json::<Thresholds>(&path) {
        Ok(thresholds) => {
            info!(
                component = "artifacts",
                event = "artifacts.thresholds.loaded",
                path = %path.display()
            );
            thresholds
        }
        Err(err) => {
            warn!(
                component = "artifacts",
                event = "artifacts.thresholds.fallback",
                path = %path.display(),
                error = %err
            );
            Thresholds::default()
        }
    }
}

/// Linear model weights over the aligned feature row, squashed through a
/// sigmoid. The training procedure that produces these is external; this
/// side only evaluates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModelArtifact {
    pub bias: f64,
    pub weights: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct LinearScorer {
    bias: f64,
    weights: Vec<f64>,
}

impl LinearScorer {
    pub fn new(bias: f64, weights: Vec<f64>) -> Self {
        Self { bias, weights }
    }
}

impl From<LinearModelArtifact> for LinearScorer {
    fn from(artifact: LinearModelArtifact) -> Self {
        Self::new(artifact.bias, artifact.weights)
    }
}

impl Scorer for LinearScorer {
    fn predict_proba(&self, features: &[f64]) -> f64 {
        let mut z = self.bias;
        for (w, x) in self.weights.iter().zip(features) {
            z += w * x;
        }
        1.0 / (1.0 + (-z).exp())
    }
}

pub fn model_file(coin: Coin) -> String {
    format!("{}_model.json", coin.code())
}

pub fn load_scorer(
    dir: &Path,
    coin: Coin,
    feature_count: usize,
) -> Result<LinearScorer, ArtifactError> {
    let artifact: LinearModelArtifact = read_json(&dir.join(model_file(coin)))?;
    if artifact.weights.len() != feature_count {
        return Err(ArtifactError::WeightCountMismatch {
            coin: coin.code().to_string(),
            expected: feature_count,
            actual: artifact.weights.len(),
        });
    }
    Ok(artifact.into())
}

/// Loads everything the serving process needs from one artifact directory.
pub fn load_serving_artifacts(
    dir: &Path,
) -> Result<(FeatureSchema, CoinScorers, Thresholds), ArtifactError> {
    let schema = load_feature_columns(dir)?;
    let scorers = CoinScorers {
        bitcoin: Box::new(load_scorer(dir, Coin::Bitcoin, schema.columns.len())?),
        ethereum: Box::new(load_scorer(dir, Coin::Ethereum, schema.columns.len())?),
        litecoin: Box::new(load_scorer(dir, Coin::Litecoin, schema.columns.len())?),
    };
    let thresholds = load_thresholds(dir);
    Ok((schema, scorers, thresholds))
}
