//! risk estimation pipeline - profile in, per-horizon risk report out

use log::debug;
use rayon::prelude::*;
use serde::Serialize;

use crate::{
    config::{ModelConfiguration, ModelId},
    encoder::{encode, ConditionalPolicy},
    error::{Result, RiskError},
    predictor::{linear_predictor, standard_error},
    profile::PatientProfile,
    transform::{transform, BoundsPolicy, RiskEstimate, DEFAULT_Z},
};

/// risk estimation w/ configurable interval width & input policies
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimator {
    critical_value: f64,                  // z for the interval
    conditional_policy: ConditionalPolicy, // unmet conditional factors
    bounds: BoundsPolicy,                 // out-of-range handling
}

impl Default for Estimator {
    fn default() -> Self {
        Self {
            critical_value: DEFAULT_Z,
            conditional_policy: ConditionalPolicy::default(),
            bounds: BoundsPolicy::default(),
        }
    }
}

impl Estimator {
    /// new estimator w/ defaults (z = 1.96, force-zero, pass-through)
    pub fn new() -> Self {
        Self::default()
    }

    /// normal critical value for the interval - must be positive & finite
    pub fn with_critical_value(mut self, z: f64) -> Result<Self> {
        if !(z.is_finite() && z > 0.0) {
            return Err(RiskError::invalid_parameter("critical_value", z.to_string()));
        }
        self.critical_value = z;
        Ok(self)
    }

    pub fn with_conditional_policy(mut self, policy: ConditionalPolicy) -> Self {
        self.conditional_policy = policy;
        self
    }

    pub fn with_bounds(mut self, bounds: BoundsPolicy) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn critical_value(&self) -> f64 {
        self.critical_value
    }

    /// score one patient - fails fast on invalid input, no partial results
    pub fn estimate(&self, config: &ModelConfiguration, profile: &PatientProfile) -> Result<RiskReport> {
        let encoded = encode(config, profile, self.conditional_policy)?;
        let score = linear_predictor(&encoded);
        let se = standard_error(&encoded);
        debug!("{}: score = {:.6}, se = {:.6}", config.id(), score, se);

        let estimates = transform(config.horizons(), score, se, self.critical_value, self.bounds);
        let horizons = config
            .horizons()
            .iter()
            .zip(estimates)
            .map(|(h, estimate)| HorizonRisk {
                label: h.label().to_string(),
                baseline_survival: h.baseline_survival(),
                estimate,
            })
            .collect();

        Ok(RiskReport {
            model: config.id().clone(),
            linear_predictor: score,
            standard_error: se,
            active_predictors: encoded.active_keys().into_iter().map(String::from).collect(),
            horizons,
        })
    }

    /// score many patients in parallel; each result stands on its own
    pub fn estimate_batch(
        &self,
        config: &ModelConfiguration,
        profiles: &[PatientProfile],
    ) -> Vec<Result<RiskReport>> {
        profiles
            .par_iter()
            .map(|profile| self.estimate(config, profile))
            .collect()
    }
}

/// estimate with default settings
pub fn estimate(config: &ModelConfiguration, profile: &PatientProfile) -> Result<RiskReport> {
    Estimator::default().estimate(config, profile)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HorizonRisk {
    pub label: String,
    pub baseline_survival: f64,
    #[serde(flatten)]
    pub estimate: RiskEstimate,
}

/// everything a collaborator needs to present one patient's result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskReport {
    pub model: ModelId,
    pub linear_predictor: f64,
    pub standard_error: f64,
    pub active_predictors: Vec<String>, // variable keys switched on
    pub horizons: Vec<HorizonRisk>,     // declared order
}

impl RiskReport {
    pub fn horizon(&self, label: &str) -> Option<&RiskEstimate> {
        self.horizons
            .iter()
            .find(|h| h.label == label)
            .map(|h| &h.estimate)
    }

    /// print out the estimate
    pub fn print(&self) {
        println!("model {}", self.model);
        println!("linear predictor: {:.6} (se {:.6})", self.linear_predictor, self.standard_error);
        println!("active predictors: {}", self.active_predictors.join(", "));
        println!();

        println!("{:<12} {:>8} {:>8} {:>18}", "horizon", "S0", "risk", "95% CI");
        println!("{:-<49}", "");
        for h in &self.horizons {
            println!(
                "{:<12} {:>8.3} {:>7.1}% {:>8.1}% - {:>5.1}%",
                h.label,
                h.baseline_survival,
                h.estimate.point * 100.0,
                h.estimate.lower * 100.0,
                h.estimate.upper * 100.0
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_config;
    use crate::error::ValidationError;
    use approx::assert_relative_eq;

    fn reference_profile() -> PatientProfile {
        PatientProfile::new()
            .with_selection("stage", "t1")
            .with_selection("grade", "g1")
    }

    #[test]
    fn test_reference_report() {
        let config = sample_config();
        let report = estimate(&config, &reference_profile()).unwrap();

        assert_eq!(report.model.to_string(), "sample@1");
        assert_eq!(report.linear_predictor, 0.0);
        assert_eq!(report.standard_error, 0.0);
        let labels: Vec<&str> = report.horizons.iter().map(|h| h.label.as_str()).collect();
        assert_eq!(labels, vec!["5-year", "10-year"]);

        let five = report.horizon("5-year").unwrap();
        assert_eq!(five.point, 1.0 - 0.94);
        assert_eq!(five.lower, five.point);
        assert_eq!(five.upper, five.point);
        assert!(report.horizon("20-year").is_none());
    }

    #[test]
    fn test_single_factor_report() {
        let config = sample_config();
        let report = estimate(&config, &reference_profile().with_factor("lvi", true)).unwrap();
        assert_relative_eq!(report.linear_predictor, 0.774492, epsilon = 1e-12);
        assert_eq!(report.active_predictors, vec!["stage_1", "grade_1", "lvi"]);

        let five = report.horizon("5-year").unwrap();
        assert_relative_eq!(five.point, 1.0 - 0.94f64.powf(0.774492f64.exp()), epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_profile_fails_fast() {
        let config = sample_config();
        let profile = PatientProfile::new().with_selection("stage", "t9");
        assert!(matches!(
            estimate(&config, &profile),
            Err(RiskError::Validation(ValidationError::UnknownLevel { .. }))
        ));
    }

    #[test]
    fn test_estimator_policies() {
        let config = sample_config();
        let profile = reference_profile().with_factor("targeted", true);

        let lenient = Estimator::new().estimate(&config, &profile).unwrap();
        assert_eq!(lenient.linear_predictor, 0.0);

        let strict = Estimator::new().with_conditional_policy(ConditionalPolicy::Reject);
        assert!(matches!(
            strict.estimate(&config, &profile),
            Err(RiskError::Validation(ValidationError::UnmetPrecondition { .. }))
        ));
    }

    #[test]
    fn test_critical_value_validation() {
        assert_eq!(Estimator::new().critical_value(), 1.96);
        assert!(Estimator::new().with_critical_value(0.0).is_err());
        assert!(Estimator::new().with_critical_value(f64::NAN).is_err());
        assert_eq!(
            Estimator::new().with_critical_value(2.576).unwrap().critical_value(),
            2.576
        );
    }

    #[test]
    fn test_batch_matches_single() {
        let config = sample_config();
        let profiles = vec![
            reference_profile(),
            reference_profile().with_factor("lvi", true),
            PatientProfile::new(),
        ];
        let estimator = Estimator::new();
        let results = estimator.estimate_batch(&config, &profiles);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0], estimator.estimate(&config, &profiles[0]));
        assert_eq!(results[1], estimator.estimate(&config, &profiles[1]));
        assert!(results[2].is_err());
    }

    #[test]
    fn test_report_json_shape() {
        let config = sample_config();
        let report = estimate(&config, &reference_profile()).unwrap();
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["model"], "sample@1");
        assert_eq!(value["horizons"][0]["label"], "5-year");
        assert!(value["horizons"][0]["point"].is_number());
    }
}
