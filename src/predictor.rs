//! linear predictor & its propagated standard error

use crate::encoder::EncodedVector;

/// combined log-hazard score: sum of log hazard ratios of the active predictors
pub fn linear_predictor(encoded: &EncodedVector<'_>) -> f64 {
    encoded
        .indicators()
        .dot(&encoded.config().log_hazard_ratios()) // linear combination
}

/// standard error of the score, treating coefficient estimates as uncorrelated
///
/// `sqrt(sum((se_k * x_k)^2))`. The fitted model's covariance matrix isn't
/// diagonal, so this is an approximation; published risk figures were produced
/// with it and must keep matching.
pub fn standard_error(encoded: &EncodedVector<'_>) -> f64 {
    let weighted = &encoded.indicators() * &encoded.config().standard_errors();
    weighted.mapv(|v| v * v).sum().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_config;
    use crate::encoder::{encode, ConditionalPolicy};
    use crate::profile::PatientProfile;
    use approx::assert_relative_eq;

    fn profile() -> PatientProfile {
        PatientProfile::new()
            .with_selection("stage", "t1")
            .with_selection("grade", "g1")
    }

    #[test]
    fn test_reference_profile_is_zero() {
        let config = sample_config();
        let encoded = encode(&config, &profile(), ConditionalPolicy::ForceZero).unwrap();
        assert_eq!(linear_predictor(&encoded), 0.0);
        assert_eq!(standard_error(&encoded), 0.0);
    }

    #[test]
    fn test_single_factor() {
        let config = sample_config();
        let encoded =
            encode(&config, &profile().with_factor("lvi", true), ConditionalPolicy::ForceZero).unwrap();
        assert_relative_eq!(linear_predictor(&encoded), 0.774492, epsilon = 1e-12);
        assert_relative_eq!(standard_error(&encoded), 0.311122, epsilon = 1e-12);
    }

    #[test]
    fn test_several_factors_combine() {
        let config = sample_config();
        let p = PatientProfile::new()
            .with_selection("stage", "t3")
            .with_selection("grade", "g2")
            .with_factor("her2", true)
            .with_factor("targeted", true);
        let encoded = encode(&config, &p, ConditionalPolicy::ForceZero).unwrap();

        assert_relative_eq!(linear_predictor(&encoded), 1.0 + 0.3 + 0.4 - 0.2, epsilon = 1e-12);
        let expected_se = (0.4f64.powi(2) + 0.1f64.powi(2) + 0.3f64.powi(2) + 0.25f64.powi(2)).sqrt();
        assert_relative_eq!(standard_error(&encoded), expected_se, epsilon = 1e-12);
    }
}
