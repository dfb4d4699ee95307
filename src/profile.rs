//! patient profile - what the caller submits per request.
//!
//! Selections are stable identifiers, never display labels. The profile is not
//! checked against any model here; that's the encoder's job.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

/// Deserializing goes through [`PatientProfile::from_json_value`], so serde
/// input gets the same checks as the explicit JSON constructors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct PatientProfile {
    /// group key -> selected level id
    pub selections: BTreeMap<String, String>,
    /// standalone factor key -> present?; absent keys count as false
    pub factors: BTreeMap<String, bool>,
}

impl TryFrom<Value> for PatientProfile {
    type Error = ValidationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_json_value(&value)
    }
}

impl PatientProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_selection(mut self, group: impl Into<String>, level: impl Into<String>) -> Self {
        self.selections.insert(group.into(), level.into());
        self
    }

    pub fn with_factor(mut self, factor: impl Into<String>, present: bool) -> Self {
        self.factors.insert(factor.into(), present);
        self
    }

    /// set a factor from free text, e.g. a CLI flag or form field
    pub fn set_factor_str(&mut self, factor: &str, raw: &str) -> Result<(), ValidationError> {
        let present = parse_factor_value(factor, raw)?;
        self.factors.insert(factor.to_string(), present);
        Ok(())
    }

    /// build from a JSON value shaped like `{"selections": {...}, "factors": {...}}`
    pub fn from_json_value(value: &Value) -> Result<Self, ValidationError> {
        let object = value
            .as_object()
            .ok_or_else(|| ValidationError::malformed("profile must be a JSON object"))?;

        let mut profile = Self::new();
        for key in object.keys() {
            if key != "selections" && key != "factors" {
                return Err(ValidationError::malformed(format!("unexpected field '{key}'")));
            }
        }

        if let Some(selections) = object.get("selections") {
            let selections = selections
                .as_object()
                .ok_or_else(|| ValidationError::malformed("'selections' must be an object"))?;
            for (group, level) in selections {
                let level = level.as_str().ok_or_else(|| {
                    ValidationError::malformed(format!("selection for '{group}' must be a string"))
                })?;
                profile.selections.insert(group.clone(), level.to_string());
            }
        }

        if let Some(factors) = object.get("factors") {
            let factors = factors
                .as_object()
                .ok_or_else(|| ValidationError::malformed("'factors' must be an object"))?;
            for (factor, raw) in factors {
                let present = match raw {
                    Value::Bool(b) => *b,
                    Value::Number(n) if n.as_u64() == Some(0) => false,
                    Value::Number(n) if n.as_u64() == Some(1) => true,
                    other => return Err(ValidationError::non_boolean(factor, other.to_string())),
                };
                profile.factors.insert(factor.clone(), present);
            }
        }

        Ok(profile)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ValidationError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ValidationError::malformed(e.to_string()))?;
        Self::from_json_value(&value)
    }
}

/// lenient boolean parsing for factor values: true/false, yes/no, 1/0
pub fn parse_factor_value(factor: &str, raw: &str) -> Result<bool, ValidationError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Ok(true),
        "false" | "no" | "n" | "0" => Ok(false),
        _ => Err(ValidationError::non_boolean(factor, raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder() {
        let profile = PatientProfile::new()
            .with_selection("age", "50s")
            .with_factor("lvi", true);
        assert_eq!(profile.selections["age"], "50s");
        assert_eq!(profile.factors["lvi"], true);
    }

    #[test]
    fn test_parse_factor_value() {
        assert_eq!(parse_factor_value("lvi", "Yes"), Ok(true));
        assert_eq!(parse_factor_value("lvi", " 0 "), Ok(false));
        assert_eq!(
            parse_factor_value("lvi", "maybe"),
            Err(ValidationError::non_boolean("lvi", "maybe"))
        );
    }

    #[test]
    fn test_set_factor_str_keeps_profile_on_error() {
        let mut profile = PatientProfile::new().with_factor("her2", true);
        assert!(profile.set_factor_str("her2", "2").is_err());
        assert_eq!(profile.factors["her2"], true);
    }

    #[test]
    fn test_from_json() {
        let profile = PatientProfile::from_json_value(&json!({
            "selections": {"age": "under_40", "grade": "grade_3"},
            "factors": {"lvi": true, "her2": 0, "radiation": 1}
        }))
        .unwrap();
        assert_eq!(profile.selections.len(), 2);
        assert_eq!(profile.factors["lvi"], true);
        assert_eq!(profile.factors["her2"], false);
        assert_eq!(profile.factors["radiation"], true);
    }

    #[test]
    fn test_from_json_rejects_non_boolean_factor() {
        let err = PatientProfile::from_json_value(&json!({"factors": {"lvi": "yes"}})).unwrap_err();
        assert_eq!(err, ValidationError::non_boolean("lvi", "\"yes\""));

        let err = PatientProfile::from_json_value(&json!({"factors": {"lvi": 2}})).unwrap_err();
        assert!(matches!(err, ValidationError::NonBooleanFactor { .. }));
    }

    #[test]
    fn test_serde_deserialize_matches_from_json() {
        let cases = [
            r#"{"selections": {"age": "40s"}, "factors": {"lvi": 1, "her2": false}}"#,
            r#"{"selections": {"age": "40s"}, "extra": 5}"#,
            r#"{"factors": {"lvi": "yes"}}"#,
            r#"{"factors": {"lvi": 2}}"#,
            r#"{}"#,
        ];
        for text in cases {
            let explicit = PatientProfile::from_json_str(text);
            let derived = serde_json::from_str::<PatientProfile>(text);
            assert_eq!(explicit.is_ok(), derived.is_ok(), "{text}");
            match (explicit, derived) {
                (Ok(a), Ok(b)) => assert_eq!(a, b),
                (Err(a), Err(b)) => assert!(b.to_string().contains(&a.to_string()), "{text}: {b}"),
                _ => unreachable!(),
            }
        }
    }

    #[test]
    fn test_serialized_profile_reads_back() {
        let profile = PatientProfile::new()
            .with_selection("grade", "grade_2")
            .with_factor("lvi", true);
        let text = serde_json::to_string(&profile).unwrap();
        assert_eq!(serde_json::from_str::<PatientProfile>(&text).unwrap(), profile);
    }

    #[test]
    fn test_from_json_malformed() {
        for text in ["[]", "{\"selections\": []}", "{\"extra\": 1}", "{\"selections\": {\"age\": 40}}", "{"] {
            assert!(
                matches!(
                    PatientProfile::from_json_str(text),
                    Err(ValidationError::MalformedProfile { .. })
                ),
                "{text} should be malformed"
            );
        }
    }
}
