//! risk transformer - log-hazard score (+ interval) to absolute risk at a horizon
//!
//! `risk = 1 - S0^exp(score)`, with the 95% interval taken symmetrically on
//! the log-hazard scale (`score -/+ z * se`) and pushed through the same map.

use log::warn;
use serde::Serialize;

use crate::config::Horizon;

/// two-sided 95% normal critical value
pub const DEFAULT_Z: f64 = 1.96;

/// what to do with values outside [0, 1]
///
/// For `S0` in (0, 1] and the bounded coefficients a configuration accepts, the
/// formula already stays inside [0, 1] (an overflowing `exp` gives exactly 1),
/// so `Clamp` only ever matters for values pushed out by rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundsPolicy {
    /// report the raw formula output
    #[default]
    PassThrough,
    /// clamp point & bounds to [0, 1]
    Clamp,
}

/// point risk with its interval, all on the probability scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskEstimate {
    pub point: f64,
    pub lower: f64,
    pub upper: f64,
}

impl RiskEstimate {
    fn clamped(self) -> Self {
        let clamp = |v: f64| v.clamp(0.0, 1.0);
        let out = Self {
            point: clamp(self.point),
            lower: clamp(self.lower),
            upper: clamp(self.upper),
        };
        if out != self {
            warn!("risk estimate {:?} clamped to [0, 1]", self);
        }
        out
    }
}

/// absolute risk at a horizon with baseline survival `s0`
pub fn absolute_risk(baseline_survival: f64, score: f64) -> f64 {
    1.0 - baseline_survival.powf(score.exp())
}

/// point estimate & interval for one horizon
pub fn risk_interval(
    baseline_survival: f64,
    score: f64,
    standard_error: f64,
    z: f64,
    bounds: BoundsPolicy,
) -> RiskEstimate {
    let half_width = z * standard_error;
    let estimate = RiskEstimate {
        point: absolute_risk(baseline_survival, score),
        lower: absolute_risk(baseline_survival, score - half_width),
        upper: absolute_risk(baseline_survival, score + half_width),
    };
    match bounds {
        BoundsPolicy::PassThrough => estimate,
        BoundsPolicy::Clamp => estimate.clamped(),
    }
}

/// one estimate per horizon, in the order given
pub fn transform(
    horizons: &[Horizon],
    score: f64,
    standard_error: f64,
    z: f64,
    bounds: BoundsPolicy,
) -> Vec<RiskEstimate> {
    horizons
        .iter()
        .map(|h| risk_interval(h.baseline_survival(), score, standard_error, z, bounds))
        .collect()
}
