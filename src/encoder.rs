//! profile encoder - turns a patient profile into the reference-coded 0/1
//! indicator vector the model's coefficients apply to.

use log::warn;
use ndarray::{Array1, ArrayView1};

use crate::config::ModelConfiguration;
use crate::error::ValidationError;
use crate::profile::PatientProfile;

/// what to do with a conditional factor whose governing factor is false
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConditionalPolicy {
    /// drop it silently - indicator forced to 0 (how the bedside form behaves:
    /// the question is never asked)
    #[default]
    ForceZero,
    /// fail the request with `UnmetPrecondition`
    Reject,
}

/// indicator vector in the configuration's canonical predictor order
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedVector<'a> {
    config: &'a ModelConfiguration,
    indicators: Array1<f64>,
}

impl<'a> EncodedVector<'a> {
    pub fn config(&self) -> &'a ModelConfiguration {
        self.config
    }

    pub fn indicators(&self) -> ArrayView1<'_, f64> {
        self.indicators.view()
    }

    /// indicator for a variable key, `None` if the model doesn't have it
    pub fn get(&self, variable_key: &str) -> Option<u8> {
        self.config
            .predictors()
            .iter()
            .position(|p| p.variable_key == variable_key)
            .map(|i| self.indicators[i] as u8)
    }

    /// (variable key, indicator) pairs in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, u8)> + '_ {
        self.config
            .predictors()
            .iter()
            .zip(self.indicators.iter())
            .map(|(p, &x)| (p.variable_key.as_str(), x as u8))
    }

    /// variable keys switched on for this patient, for "active factors" listings
    pub fn active_keys(&self) -> Vec<&'a str> {
        self.iter()
            .filter(|&(_, x)| x == 1)
            .map(|(key, _)| key)
            .collect()
    }
}

/// encode a profile against a configuration
///
/// Every group needs exactly one known selection; factors the profile leaves out
/// are false. A conditional factor set while its governing factor is false is
/// handled per `policy`.
pub fn encode<'a>(
    config: &'a ModelConfiguration,
    profile: &PatientProfile,
    policy: ConditionalPolicy,
) -> Result<EncodedVector<'a>, ValidationError> {
    // unknown keys first - a typo'd group shouldn't surface as "missing selection"
    if let Some(group) = profile.selections.keys().find(|g| config.group(g).is_none()) {
        return Err(ValidationError::unknown_group(group));
    }
    if let Some(factor) = profile.factors.keys().find(|f| config.factor(f).is_none()) {
        return Err(ValidationError::unknown_factor(factor));
    }

    let mut indicators = Array1::zeros(config.n_predictors());

    for group in config.groups() {
        let level = profile
            .selections
            .get(group.key())
            .ok_or_else(|| ValidationError::missing_selection(group.key()))?;
        let idx = group
            .predictor_index(level)
            .ok_or_else(|| ValidationError::UnknownLevel {
                group: group.key().to_string(),
                level: level.clone(),
                expected: group.level_ids().collect::<Vec<_>>().join(", "),
            })?;
        indicators[idx] = 1.0;
    }

    let submitted = |key: &str| profile.factors.get(key).copied().unwrap_or(false);
    for factor in config.factors() {
        if !submitted(factor.key()) {
            continue;
        }
        if let Some(governing) = factor.requires().map(|i| &config.factors()[i]) {
            if !submitted(governing.key()) {
                match policy {
                    ConditionalPolicy::Reject => {
                        return Err(ValidationError::unmet_precondition(
                            factor.key(),
                            governing.key(),
                        ));
                    }
                    ConditionalPolicy::ForceZero => {
                        warn!(
                            "ignoring '{}' because '{}' isn't set",
                            factor.key(),
                            governing.key()
                        );
                        continue;
                    }
                }
            }
        }
        indicators[factor.predictor_index()] = 1.0;
    }

    Ok(EncodedVector { config, indicators })
}
