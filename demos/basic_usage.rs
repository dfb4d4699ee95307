use recurrence_risk::{
    encode, BoundsPolicy, ConditionalPolicy, Estimator, ModelRegistry, PatientProfile,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Recurrence Risk - Basic Usage Example");
    println!("=====================================\n");

    let registry = ModelRegistry::builtin()?;
    println!("Available models:");
    for id in registry.ids() {
        println!("  - {}", id);
    }
    println!();

    // Example 1: reference patient - risk equals 1 - S0 at every horizon
    println!("Example 1: Reference Patient");
    println!("----------------------------");

    let model = registry.select("ibtr@1.0")?;
    let reference = PatientProfile::new()
        .with_selection("age", "40s")
        .with_selection("margin", "negative")
        .with_selection("t_stage", "pT1")
        .with_selection("grade", "grade_1");

    let report = Estimator::new().estimate(&model, &reference)?;
    report.print();
    println!();

    // Example 2: higher-risk patient, showing which predictors were switched on
    println!("Example 2: Higher-Risk Patient");
    println!("------------------------------");

    let patient = PatientProfile::new()
        .with_selection("age", "under_40")
        .with_selection("margin", "close")
        .with_selection("t_stage", "pT2")
        .with_selection("grade", "grade_3")
        .with_factor("lvi", true)
        .with_factor("her2", true)
        .with_factor("targeted", true)
        .with_factor("radiation", true);

    let encoded = encode(&model, &patient, ConditionalPolicy::Reject)?;
    println!("Active predictors: {}", encoded.active_keys().join(", "));

    let report = Estimator::new()
        .with_conditional_policy(ConditionalPolicy::Reject)
        .with_bounds(BoundsPolicy::Clamp)
        .estimate(&model, &patient)?;
    for h in &report.horizons {
        println!(
            "  {} risk: {:.1}% (95% CI {:.1}% - {:.1}%)",
            h.label,
            h.estimate.point * 100.0,
            h.estimate.lower * 100.0,
            h.estimate.upper * 100.0
        );
    }
    println!();

    // Example 3: same patient under both model versions
    println!("Example 3: Model Comparison");
    println!("---------------------------");

    let older = registry.select("ibtr@0.1")?;
    // the older model has no targeted-therapy factor
    let mut comparable = patient.clone();
    comparable.factors.remove("targeted");
    for config in [&older, &model] {
        let report = Estimator::new().estimate(config, &comparable)?;
        let ten = report.horizon("10-year").map(|e| e.point * 100.0).unwrap_or(f64::NAN);
        println!("  {:<10} 10-year risk: {:.1}%", config.id(), ten);
    }

    Ok(())
}
