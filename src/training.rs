//! Label construction and training-frame assembly.

use std::collections::BTreeMap;

use tracing::info;

use crate::features::{
    build_features, feature_columns, label_column, return_column, Coin, FeatureError,
};
use crate::frame::Frame;

/// Final offline artifact: numeric feature matrix, per-coin binary labels,
/// the authoritative ordered feature-column list, and the original row index
/// of each surviving row.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingFrame {
    pub x: Frame,
    pub y: BTreeMap<Coin, Vec<u8>>,
    pub feature_columns: Vec<String>,
    pub row_indices: Vec<usize>,
}

/// Extends a feature table with one binary direction label per coin.
///
/// `y_{coin} = 1` iff the sum of the coin's returns over the `horizon` rows
/// strictly after the current row is > 0. A NaN forward sum compares false
/// and yields 0, so tail rows (and rows whose forward window contains a
/// missing return) carry a degenerate 0 that conflates "negative" and
/// "unknown future"; callers must not trust those as true negatives.
pub fn label_directions(features: &Frame, horizon: usize) -> Result<Frame, FeatureError> {
    if horizon == 0 {
        return Err(FeatureError::InvalidConfig(
            "label horizon must be > 0".to_string(),
        ));
    }

    let mut out = features.clone();
    for coin in Coin::ALL {
        let returns = out
            .column(&return_column(coin))
            .ok_or_else(|| FeatureError::MissingColumn(return_column(coin)))?
            .to_vec();
        out.insert_column(label_column(coin), forward_direction(&returns, horizon))?;
    }
    Ok(out)
}

fn forward_direction(returns: &[f64], horizon: usize) -> Vec<f64> {
    let n = returns.len();
    let mut out = vec![0.0; n];
    for i in 0..n {
        if i + horizon >= n {
            continue;
        }
        let window = &returns[i + 1..=i + horizon];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        if window.iter().sum::<f64>() > 0.0 {
            out[i] = 1.0;
        }
    }
    out
}

/// Full offline pipeline, each step a total function of its input:
///
/// 1. rolling feature transform
/// 2. forward-return labels for `horizon`
/// 3. one extra forward shift of every feature column (anti-lookahead: the
///    vector predicting "now" reflects only data known as of the previous
///    tick, on top of each feature's own internal lag)
/// 4. row alignment with the unshifted labels, dropping any row with a
///    missing value in either part
/// 5. numeric coercion of the surviving feature values (non-finite -> 0)
pub fn assemble_training_frame(raw: &Frame, horizon: usize) -> Result<TrainingFrame, FeatureError> {
    let labeled = label_directions(&build_features(raw)?, horizon)?;

    let columns = feature_columns();
    let mut combined = labeled.select(&columns)?.shift_all(1);
    for coin in Coin::ALL {
        let name = label_column(coin);
        let labels = labeled
            .column(&name)
            .expect("labels inserted by label_directions")
            .to_vec();
        combined.insert_column(name, labels)?;
    }

    let keep: Vec<bool> = combined.nan_row_mask().iter().map(|m| !m).collect();
    let row_indices: Vec<usize> = keep
        .iter()
        .enumerate()
        .filter(|(_, k)| **k)
        .map(|(i, _)| i)
        .collect();
    let aligned = combined.retain_rows(&keep);

    let mut x = aligned.select(&columns)?;
    x.map_values(|v| if v.is_finite() { v } else { 0.0 });

    let mut y = BTreeMap::new();
    for coin in Coin::ALL {
        let labels = aligned
            .column(&label_column(coin))
            .expect("labels retained through alignment")
            .iter()
            .map(|v| u8::from(*v > 0.5))
            .collect();
        y.insert(coin, labels);
    }

    info!(
        component = "training",
        event = "training.frame.assembled",
        input_rows = raw.len(),
        output_rows = x.len(),
        feature_count = columns.len(),
        horizon
    );

    Ok(TrainingFrame {
        x,
        y,
        feature_columns: columns,
        row_indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_direction_sums_the_next_horizon_returns() {
        let returns = [f64::NAN, 0.05, -0.02, 0.01, -0.5, 0.2];
        let labels = forward_direction(&returns, 2);

        // r1 + r2 = 0.03 > 0
        assert_eq!(labels[0], 1.0);
        // r2 + r3 = -0.01
        assert_eq!(labels[1], 0.0);
        assert_eq!(labels[2], 0.0);
        assert_eq!(labels[3], 0.0);
        // tail rows cannot see a full forward window
        assert_eq!(labels[4], 0.0);
        assert_eq!(labels[5], 0.0);
    }

    #[test]
    fn nan_inside_forward_window_yields_zero() {
        let returns = [0.1, 0.9, f64::NAN, 0.9, 0.9, 0.9];
        let labels = forward_direction(&returns, 2);

        // window r1, r2 contains NaN even though r1 alone is positive
        assert_eq!(labels[0], 0.0);
        assert_eq!(labels[2], 1.0);
    }

    #[test]
    fn zero_horizon_is_rejected() {
        let frame = Frame::new();
        let err = label_directions(&frame, 0).expect_err("horizon 0 must fail");
        assert!(matches!(err, FeatureError::InvalidConfig(_)));
    }
}
