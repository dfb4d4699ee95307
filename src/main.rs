use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};

use recurrence_risk::{
    BoundsPolicy, ConditionalPolicy, Estimator, ModelRegistry, PatientProfile, RiskError,
    ValidationError,
};

#[derive(Parser)]
#[command(name = "recurrence-risk", version, about = "Recurrence risk from pre-fitted Cox models")]
struct Cli {
    /// Load model bundles (*.toml) from this directory instead of the built-in ones
    #[arg(long, global = true, value_name = "DIR")]
    model_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available models
    Models,
    /// Show the groups, levels, factors and horizons of one model
    Describe {
        /// Model id, e.g. ibtr@1.0
        model: String,
    },
    /// Estimate risk for one patient
    Estimate(EstimateArgs),
}

#[derive(Args)]
struct EstimateArgs {
    /// Model id, e.g. ibtr@1.0
    #[arg(long)]
    model: String,

    /// Patient profile as JSON: {"selections": {...}, "factors": {...}}
    #[arg(long, value_name = "FILE")]
    profile: Option<PathBuf>,

    /// Categorical selection as group=level (repeatable, overrides --profile)
    #[arg(long = "select", value_name = "GROUP=LEVEL")]
    selections: Vec<String>,

    /// Binary factor as key=true|false (repeatable, overrides --profile)
    #[arg(long = "factor", value_name = "KEY=BOOL")]
    factors: Vec<String>,

    /// Reject conditional factors whose governing factor isn't set
    #[arg(long)]
    reject_unmet: bool,

    /// Clamp estimates to [0, 1]
    #[arg(long)]
    clamp: bool,

    /// Normal critical value for the interval
    #[arg(long, default_value_t = recurrence_risk::DEFAULT_Z)]
    critical_value: f64,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let registry = match &cli.model_dir {
        Some(dir) => ModelRegistry::load_dir(dir)?,
        None => ModelRegistry::builtin()?,
    };

    match cli.command {
        Commands::Models => {
            for id in registry.ids() {
                let description = registry
                    .get(id)
                    .and_then(|m| m.description().map(str::to_string))
                    .unwrap_or_default();
                println!("{:<16} {}", id.to_string(), description);
            }
        }
        Commands::Describe { model } => {
            let config = registry.select(&model)?;
            println!("model {}", config.id());
            for group in config.groups() {
                let levels: Vec<String> = group
                    .level_ids()
                    .map(|id| {
                        if id == group.reference_id() {
                            format!("{id} (ref)")
                        } else {
                            id.to_string()
                        }
                    })
                    .collect();
                println!("  group  {:<18} {}", group.key(), levels.join(", "));
            }
            for factor in config.factors() {
                match factor.requires() {
                    Some(i) => println!(
                        "  factor {:<18} requires {}",
                        factor.key(),
                        config.factors()[i].key()
                    ),
                    None => println!("  factor {}", factor.key()),
                }
            }
            for horizon in config.horizons() {
                println!("  horizon {:<17} S0 = {}", horizon.label(), horizon.baseline_survival());
            }
        }
        Commands::Estimate(args) => {
            let config = registry.select(&args.model)?;
            let profile = build_profile(&args)?;

            let estimator = Estimator::new()
                .with_critical_value(args.critical_value)?
                .with_conditional_policy(if args.reject_unmet {
                    ConditionalPolicy::Reject
                } else {
                    ConditionalPolicy::ForceZero
                })
                .with_bounds(if args.clamp {
                    BoundsPolicy::Clamp
                } else {
                    BoundsPolicy::PassThrough
                });

            let report = estimator.estimate(&config, &profile)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                report.print();
            }
        }
    }
    Ok(())
}

fn build_profile(args: &EstimateArgs) -> Result<PatientProfile, RiskError> {
    let mut profile = match &args.profile {
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|e| {
                ValidationError::malformed(format!("couldn't read {}: {e}", path.display()))
            })?;
            PatientProfile::from_json_str(&text)?
        }
        None => PatientProfile::new(),
    };

    for raw in &args.selections {
        let (group, level) = split_pair(raw)?;
        profile.selections.insert(group.to_string(), level.to_string());
    }
    for raw in &args.factors {
        let (key, value) = split_pair(raw)?;
        profile.set_factor_str(key, value)?;
    }
    Ok(profile)
}

fn split_pair(raw: &str) -> Result<(&str, &str), ValidationError> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim(), v.trim()))
        .filter(|(k, v)| !k.is_empty() && !v.is_empty())
        .ok_or_else(|| ValidationError::malformed(format!("expected key=value, got '{raw}'")))
}
