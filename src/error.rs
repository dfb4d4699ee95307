use thiserror::Error;

pub type Result<T> = std::result::Result<T, RiskError>;

/// load-time problems with a model bundle - fatal for that bundle
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("couldn't read {path}: {message}")]
    Io { path: String, message: String },

    #[error("bundle {source_name} isn't valid toml: {message}")]
    Parse { source_name: String, message: String },

    #[error("{field} must not be empty")]
    EmptyField { field: String },

    #[error("group '{group}' has no levels")]
    EmptyGroup { group: String },

    #[error("group '{group}' has no reference level")]
    MissingReference { group: String },

    #[error("group '{group}' has more than one reference level: {levels}")]
    MultipleReferences { group: String, levels: String },

    #[error("reference level '{level}' of group '{group}' must have log hazard ratio 0 and standard error 0")]
    NonZeroReference { group: String, level: String },

    #[error("level '{level}' of group '{group}' has a zero coefficient and zero standard error but isn't the reference")]
    AmbiguousReference { group: String, level: String },

    #[error("variable key '{key}' is used more than once")]
    DuplicateVariableKey { key: String },

    #[error("group '{group}' lists level '{level}' more than once")]
    DuplicateLevel { group: String, level: String },

    #[error("group '{group}' is declared more than once")]
    DuplicateGroup { group: String },

    #[error("factor '{factor}' is declared more than once")]
    DuplicateFactor { factor: String },

    #[error("factor '{factor}' requires unknown factor '{requires}'")]
    UnknownRequiredFactor { factor: String, requires: String },

    #[error("factor '{factor}' requires '{requires}', which is itself conditional or the same factor")]
    ChainedRequirement { factor: String, requires: String },

    #[error("standard error for '{key}' is negative: {value}")]
    NegativeStandardError { key: String, value: f64 },

    #[error("coefficient for '{key}' isn't finite")]
    NonFiniteCoefficient { key: String },

    #[error("coefficient for '{key}' is implausibly large: {value}")]
    CoefficientOutOfRange { key: String, value: f64 },

    #[error("baseline survival for horizon '{horizon}' must lie in (0, 1], got {value}")]
    BaselineSurvivalOutOfRange { horizon: String, value: f64 },

    #[error("bundle declares no horizons")]
    NoHorizons,

    #[error("horizon '{label}' is declared more than once")]
    DuplicateHorizon { label: String },

    #[error("model '{id}' is already registered")]
    DuplicateModel { id: String },

    #[error("'{raw}' isn't a model id - expected name@version")]
    InvalidModelId { raw: String },
}

impl ConfigError {
    pub fn io(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Io {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn parse(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn empty_field(field: impl Into<String>) -> Self {
        Self::EmptyField { field: field.into() }
    }

    pub fn missing_reference(group: impl Into<String>) -> Self {
        Self::MissingReference { group: group.into() }
    }

    pub fn duplicate_variable_key(key: impl Into<String>) -> Self {
        Self::DuplicateVariableKey { key: key.into() }
    }

    pub fn baseline_out_of_range(horizon: impl Into<String>, value: f64) -> Self {
        Self::BaselineSurvivalOutOfRange {
            horizon: horizon.into(),
            value,
        }
    }
}

/// per-request problems with a patient profile - recoverable, tell the caller what to fix
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("model has no group '{group}'")]
    UnknownGroup { group: String },

    #[error("no selection given for group '{group}'")]
    MissingSelection { group: String },

    #[error("'{level}' isn't a level of group '{group}' (expected one of: {expected})")]
    UnknownLevel {
        group: String,
        level: String,
        expected: String,
    },

    #[error("model has no factor '{factor}'")]
    UnknownFactor { factor: String },

    #[error("factor '{factor}' must be a boolean, got '{value}'")]
    NonBooleanFactor { factor: String, value: String },

    #[error("factor '{factor}' can only be set when '{requires}' is set")]
    UnmetPrecondition { factor: String, requires: String },

    #[error("profile is malformed: {message}")]
    MalformedProfile { message: String },
}

impl ValidationError {
    pub fn unknown_group(group: impl Into<String>) -> Self {
        Self::UnknownGroup { group: group.into() }
    }

    pub fn missing_selection(group: impl Into<String>) -> Self {
        Self::MissingSelection { group: group.into() }
    }

    pub fn unknown_factor(factor: impl Into<String>) -> Self {
        Self::UnknownFactor {
            factor: factor.into(),
        }
    }

    pub fn non_boolean(factor: impl Into<String>, value: impl Into<String>) -> Self {
        Self::NonBooleanFactor {
            factor: factor.into(),
            value: value.into(),
        }
    }

    pub fn unmet_precondition(factor: impl Into<String>, requires: impl Into<String>) -> Self {
        Self::UnmetPrecondition {
            factor: factor.into(),
            requires: requires.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedProfile {
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RiskError {
    #[error("bad model configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("bad patient profile: {0}")]
    Validation(#[from] ValidationError),

    #[error("no model registered as '{id}'")]
    UnknownModel { id: String },

    #[error("bad parameter: {parameter} = {value}")]
    InvalidParameter { parameter: String, value: String },
}

impl RiskError {
    pub fn unknown_model(id: impl Into<String>) -> Self {
        Self::UnknownModel { id: id.into() }
    }

    pub fn invalid_parameter(parameter: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_converts_into_risk_error() {
        let err: RiskError = ValidationError::missing_selection("grade").into();
        assert!(matches!(err, RiskError::Validation(ValidationError::MissingSelection { .. })));
        assert_eq!(
            err.to_string(),
            "bad patient profile: no selection given for group 'grade'"
        );
    }

    #[test]
    fn test_config_error_message() {
        let err = ConfigError::baseline_out_of_range("5-year", 1.2);
        assert_eq!(
            err.to_string(),
            "baseline survival for horizon '5-year' must lie in (0, 1], got 1.2"
        );
    }
}
