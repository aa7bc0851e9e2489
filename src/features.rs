//! Rolling feature transform shared verbatim by training and live serving.
//!
//! Offline/online equivalence rests on one property of this module: output
//! row i depends only on input rows [i - W + 1, i] for each feature's window
//! width W, so recomputing over any suffix of the history that still covers
//! the longest window reproduces the batch values bit for bit.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::frame::{Frame, FrameError};

pub const MA_SHORT: usize = 7;
pub const MA_LONG: usize = 30;
pub const VOL_WINDOW: usize = 7;
pub const CORR_WINDOW: usize = 14;

pub const FEATURE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Coin {
    Bitcoin,
    Ethereum,
    Litecoin,
}

impl Coin {
    pub const ALL: [Coin; 3] = [Coin::Bitcoin, Coin::Ethereum, Coin::Litecoin];

    /// Full name used in raw and per-coin feature column names.
    pub fn slug(self) -> &'static str {
        match self {
            Self::Bitcoin => "bitcoin",
            Self::Ethereum => "ethereum",
            Self::Litecoin => "litecoin",
        }
    }

    /// Short code used in correlation columns, labels and artifact files.
    pub fn code(self) -> &'static str {
        match self {
            Self::Bitcoin => "btc",
            Self::Ethereum => "eth",
            Self::Litecoin => "ltc",
        }
    }

    /// Uppercase ticker used in the serving response.
    pub fn ticker(self) -> &'static str {
        match self {
            Self::Bitcoin => "BTC",
            Self::Ethereum => "ETH",
            Self::Litecoin => "LTC",
        }
    }
}

/// One raw observation: price and volume per coin, keys fixed by the
/// ingestion boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub bitcoin_price: f64,
    pub bitcoin_volume: f64,
    pub ethereum_price: f64,
    pub ethereum_volume: f64,
    pub litecoin_price: f64,
    pub litecoin_volume: f64,
}

impl Tick {
    pub fn price(&self, coin: Coin) -> f64 {
        match coin {
            Coin::Bitcoin => self.bitcoin_price,
            Coin::Ethereum => self.ethereum_price,
            Coin::Litecoin => self.litecoin_price,
        }
    }

    pub fn volume(&self, coin: Coin) -> f64 {
        match coin {
            Coin::Bitcoin => self.bitcoin_volume,
            Coin::Ethereum => self.ethereum_volume,
            Coin::Litecoin => self.litecoin_volume,
        }
    }
}

pub fn price_column(coin: Coin) -> String {
    format!("{}_price", coin.slug())
}

pub fn volume_column(coin: Coin) -> String {
    format!("{}_volume", coin.slug())
}

pub fn return_column(coin: Coin) -> String {
    format!("{}_return", coin.slug())
}

pub fn ma_column(coin: Coin, window: usize) -> String {
    format!("{}_ma{}", coin.slug(), window)
}

pub fn volatility_column(coin: Coin) -> String {
    format!("{}_volatility", coin.slug())
}

pub fn log_volume_column(coin: Coin) -> String {
    format!("log_{}_volume", coin.slug())
}

pub fn return_lag_column(coin: Coin) -> String {
    format!("{}_return_lag1", coin.slug())
}

pub fn corr_column(a: Coin, b: Coin) -> String {
    format!("{}_{}_corr", a.code(), b.code())
}

pub fn label_column(coin: Coin) -> String {
    format!("y_{}", coin.code())
}

pub const CORR_PAIRS: [(Coin, Coin); 3] = [
    (Coin::Bitcoin, Coin::Ethereum),
    (Coin::Bitcoin, Coin::Litecoin),
    (Coin::Ethereum, Coin::Litecoin),
];

/// Raw input columns, per coin, in frame order.
pub fn raw_columns() -> Vec<String> {
    let mut out = Vec::with_capacity(Coin::ALL.len() * 2);
    for coin in Coin::ALL {
        out.push(price_column(coin));
        out.push(volume_column(coin));
    }
    out
}

/// Canonical ordered feature-column list. This order is authoritative: it is
/// persisted after training and reused verbatim at serving time.
pub fn feature_columns() -> Vec<String> {
    let mut out = Vec::new();
    for coin in Coin::ALL {
        out.push(return_column(coin));
        out.push(ma_column(coin, MA_SHORT));
        out.push(ma_column(coin, MA_LONG));
        out.push(volatility_column(coin));
        out.push(log_volume_column(coin));
        out.push(return_lag_column(coin));
    }
    for (a, b) in CORR_PAIRS {
        out.push(corr_column(a, b));
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: u32,
    pub fingerprint: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("missing input column: {0}")]
    MissingColumn(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("schema version mismatch: expected {expected}, got {actual}")]
    SchemaVersionMismatch { expected: u32, actual: u32 },
    #[error("schema fingerprint mismatch: expected {expected}, got {actual}")]
    SchemaFingerprintMismatch { expected: String, actual: String },
    #[error(transparent)]
    Frame(#[from] FrameError),
}

pub fn build_feature_schema() -> FeatureSchema {
    schema_for_columns(feature_columns())
}

pub fn schema_for_columns(columns: Vec<String>) -> FeatureSchema {
    let fingerprint = schema_fingerprint(FEATURE_SCHEMA_VERSION, &columns);
    FeatureSchema {
        version: FEATURE_SCHEMA_VERSION,
        fingerprint,
        columns,
    }
}

pub fn assert_schema_compatible(
    expected_version: u32,
    expected_fingerprint: &str,
    actual: &FeatureSchema,
) -> Result<(), FeatureError> {
    if expected_version != actual.version {
        return Err(FeatureError::SchemaVersionMismatch {
            expected: expected_version,
            actual: actual.version,
        });
    }
    if expected_fingerprint != actual.fingerprint {
        return Err(FeatureError::SchemaFingerprintMismatch {
            expected: expected_fingerprint.to_string(),
            actual: actual.fingerprint.clone(),
        });
    }
    Ok(())
}

pub fn frame_from_ticks(ticks: &[Tick]) -> Frame {
    let mut frame = Frame::new();
    for coin in Coin::ALL {
        let prices: Vec<f64> = ticks.iter().map(|t| t.price(coin)).collect();
        let volumes: Vec<f64> = ticks.iter().map(|t| t.volume(coin)).collect();
        frame
            .insert_column(price_column(coin), prices)
            .expect("tick columns share one length");
        frame
            .insert_column(volume_column(coin), volumes)
            .expect("tick columns share one length");
    }
    frame
}

/// Derives the full feature table from a raw observation table.
///
/// Per coin: pct-change return, ma7/ma30 of price, rolling sample std of the
/// return (width 7), log(1 + volume), lag-1 return. Cross-coin: width-14
/// Pearson correlation of each return pair. All rolling windows are
/// full-window-only; every ±inf in the result is mapped to NaN.
pub fn build_features(raw: &Frame) -> Result<Frame, FeatureError> {
    for coin in Coin::ALL {
        for column in [price_column(coin), volume_column(coin)] {
            if !raw.contains_column(&column) {
                return Err(FeatureError::MissingColumn(column));
            }
        }
    }

    let mut out = raw.clone();
    for coin in Coin::ALL {
        let prices = out
            .column(&price_column(coin))
            .expect("presence checked above")
            .to_vec();
        let volumes = out
            .column(&volume_column(coin))
            .expect("presence checked above")
            .to_vec();

        let returns = pct_change(&prices);
        out.insert_column(return_column(coin), returns.clone())?;
        out.insert_column(ma_column(coin, MA_SHORT), rolling_mean(&prices, MA_SHORT))?;
        out.insert_column(ma_column(coin, MA_LONG), rolling_mean(&prices, MA_LONG))?;
        out.insert_column(volatility_column(coin), rolling_std(&returns, VOL_WINDOW))?;
        out.insert_column(log_volume_column(coin), log1p_missing(&volumes))?;
        out.insert_column(return_lag_column(coin), shifted(&returns, 1))?;
    }

    for (a, b) in CORR_PAIRS {
        let ra = out.column(&return_column(a)).map(<[f64]>::to_vec);
        let rb = out.column(&return_column(b)).map(<[f64]>::to_vec);
        if let (Some(ra), Some(rb)) = (ra, rb) {
            out.insert_column(corr_column(a, b), rolling_corr(&ra, &rb, CORR_WINDOW))?;
        }
    }

    out.map_values(|v| if v.is_infinite() { f64::NAN } else { v });

    debug!(
        component = "features",
        event = "features.transform.finish",
        rows = out.len(),
        columns = out.column_names().len()
    );

    Ok(out)
}

fn pct_change(values: &[f64]) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    for i in 1..values.len() {
        let prev = values[i - 1];
        out[i] = (values[i] - prev) / prev;
    }
    out
}

fn shifted(values: &[f64], periods: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    for i in periods..values.len() {
        out[i] = values[i - periods];
    }
    out
}

fn log1p_missing(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .map(|v| if v.is_finite() { (1.0 + v).ln() } else { f64::NAN })
        .collect()
}

fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    for i in 0..values.len() {
        if i + 1 < window {
            continue;
        }
        let slice = &values[i + 1 - window..=i];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        out[i] = slice.iter().sum::<f64>() / window as f64;
    }
    out
}

fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    for i in 0..values.len() {
        if i + 1 < window {
            continue;
        }
        let slice = &values[i + 1 - window..=i];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        let mean = slice.iter().sum::<f64>() / window as f64;
        // sample standard deviation
        let variance = slice
            .iter()
            .map(|v| {
                let d = *v - mean;
                d * d
            })
            .sum::<f64>()
            / (window as f64 - 1.0);
        out[i] = variance.sqrt();
    }
    out
}

fn rolling_corr(a: &[f64], b: &[f64], window: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; a.len()];
    for i in 0..a.len() {
        if i + 1 < window {
            continue;
        }
        let xa = &a[i + 1 - window..=i];
        let xb = &b[i + 1 - window..=i];
        if xa.iter().chain(xb.iter()).any(|v| v.is_nan()) {
            continue;
        }

        let mean_a = xa.iter().sum::<f64>() / window as f64;
        let mean_b = xb.iter().sum::<f64>() / window as f64;
        let mut cov = 0.0;
        let mut var_a = 0.0;
        let mut var_b = 0.0;
        for (va, vb) in xa.iter().zip(xb.iter()) {
            let da = *va - mean_a;
            let db = *vb - mean_b;
            cov += da * db;
            var_a += da * da;
            var_b += db * db;
        }

        let denom = (var_a * var_b).sqrt();
        // zero-variance windows have no defined correlation
        if denom > 0.0 {
            out[i] = cov / denom;
        }
    }
    out
}

fn schema_fingerprint(version: u32, columns: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("version:{version};"));
    hasher.update("columns:");
    for column in columns {
        hasher.update(column.as_bytes());
        hasher.update(";");
    }
    hex::encode(hasher.finalize())
}
