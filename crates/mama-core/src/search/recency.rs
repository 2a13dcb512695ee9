//! Gaussian recency decay
//!
//! Recent decisions get a boost that falls off as a Gaussian over age. The
//! curve is parameterized so that at `scale_days` of age the score is
//! exactly `decay`: `recency = decay^((age/scale)^2)`, equivalently a
//! Gaussian with variance `1 / (2·ln(1/decay))` over `age/scale`.

use serde::{Deserialize, Serialize};

/// Recency re-scoring knobs
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecencyConfig {
    /// Share of the final score taken by recency; 0 disables re-scoring
    pub weight: f64,
    /// Age in days at which the recency score equals `decay`
    pub scale_days: f64,
    /// Recency score at `scale_days`
    pub decay: f64,
}

impl Default for RecencyConfig {
    fn default() -> Self {
        Self {
            weight: 0.3,
            scale_days: 7.0,
            decay: 0.5,
        }
    }
}

impl RecencyConfig {
    /// Whether re-scoring is effectively off.
    pub fn is_disabled(&self) -> bool {
        self.weight <= 0.0
    }
}

/// Gaussian recency score for a decision `age_days` old.
///
/// Degenerate parameters (non-positive scale, decay outside (0, 1)) yield a
/// neutral 1.0 rather than NaN.
pub fn recency_score(age_days: f64, scale_days: f64, decay: f64) -> f64 {
    if scale_days <= 0.0 || decay <= 0.0 || decay >= 1.0 {
        return 1.0;
    }
    let age = age_days.max(0.0);
    let variance = 1.0 / (2.0 * (1.0 / decay).ln());
    (-(age / scale_days).powi(2) / (2.0 * variance)).exp()
}

/// Mix similarity and recency into the final ordering score.
pub fn final_score(similarity: f32, recency: f64, weight: f64) -> f64 {
    similarity as f64 * (1.0 - weight) + recency * weight
}
