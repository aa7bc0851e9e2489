//! Online incremental feature engine over a bounded tick buffer.
//!
//! The engine never recomputes "from the beginning of time": it holds a
//! capacity-bounded buffer of raw ticks and re-runs the full rolling
//! transform over that buffer on every update. Correctness over
//! incrementality; O(buffer) per tick is acceptable because the buffer is
//! bounded and must cover the longest rolling window.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::features::{build_features, feature_columns, frame_from_ticks, FeatureError, Tick, MA_LONG};

pub const DEFAULT_BUFFER_CAPACITY: usize = 3000;

/// Smallest buffer that can ever produce a fully-defined feature row: the
/// longest rolling window (ma30) plus one row of pct-change warmup plus the
/// second-to-last-row selection offset. Below this the widest features stay
/// permanently missing.
pub const MIN_BUFFER_CAPACITY: usize = MA_LONG + 2;

#[derive(Debug, Clone)]
pub struct OnlineFeatureEngine {
    buffer: VecDeque<Tick>,
    capacity: usize,
    feature_columns: Vec<String>,
}

impl OnlineFeatureEngine {
    pub fn new(capacity: usize) -> Result<Self, FeatureError> {
        if capacity < MIN_BUFFER_CAPACITY {
            return Err(FeatureError::InvalidConfig(format!(
                "buffer capacity {capacity} is below the minimum {MIN_BUFFER_CAPACITY}; \
                 the longest rolling window would never fill"
            )));
        }
        Ok(Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
            feature_columns: feature_columns(),
        })
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY).expect("default capacity is above the minimum")
    }

    /// Installs the persisted training column order. Must be called before
    /// serving; defaults to the canonical list.
    pub fn set_feature_columns(&mut self, columns: Vec<String>) {
        self.feature_columns = columns;
    }

    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// Appends one observation and returns the freshest fully-lagged feature
    /// row, aligned to the installed column order, or `None` while history is
    /// insufficient.
    ///
    /// The buffer append is unconditional and committed before anything else
    /// can fail. The returned row is the *second-to-last* transformed row:
    /// it never reflects the just-appended observation's own same-tick
    /// derived values, matching the one-extra-shift discipline of the
    /// training frame. Missing values and ±inf become 0; columns absent from
    /// the transform are filled with 0 and extras are dropped.
    pub fn update(&mut self, tick: Tick) -> Result<Option<Vec<f64>>, FeatureError> {
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(tick);

        let raw = frame_from_ticks(self.buffer.make_contiguous());
        let features = build_features(&raw)?;
        if features.len() < 2 {
            debug!(
                component = "online_engine",
                event = "online.update.not_ready",
                buffer_len = self.buffer.len()
            );
            return Ok(None);
        }

        let row_idx = features.len() - 2;
        let mut row = Vec::with_capacity(self.feature_columns.len());
        let mut repaired = 0usize;
        for name in &self.feature_columns {
            let value = match features.column(name) {
                Some(col) => col[row_idx],
                None => {
                    repaired += 1;
                    f64::NAN
                }
            };
            row.push(if value.is_finite() { value } else { 0.0 });
        }

        if repaired > 0 {
            warn!(
                component = "online_engine",
                event = "online.update.columns_repaired",
                missing_columns = repaired
            );
        }

        Ok(Some(row))
    }
}
