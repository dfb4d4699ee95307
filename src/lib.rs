//! # recurrence risk
//!
//! absolute recurrence risk at fixed horizons from a pre-fitted cox proportional
//! hazards model - categorical + binary clinical factors in, point risk and 95%
//! interval out.
//!
//! ## what you get
//!
//! - versioned model bundles (TOML), validated once at load
//! - reference-coded encoding of patient profiles by stable identifiers
//! - linear predictor, propagated standard error, per-horizon risk
//! - batch scoring in parallel when you want it
//!
//! ## quick start
//!
//! ```rust
//! use recurrence_risk::{estimate, ModelRegistry, PatientProfile};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = ModelRegistry::builtin()?;
//! let model = registry.select("ibtr@0.1")?;
//!
//! let profile = PatientProfile::new()
//!     .with_selection("age", "40s")
//!     .with_selection("margin", "negative")
//!     .with_selection("t_stage", "pT1")
//!     .with_selection("grade", "grade_1")
//!     .with_factor("lvi", true);
//!
//! let report = estimate(&model, &profile)?;
//! let five_year = report.horizon("5-year").unwrap();
//! assert!(five_year.lower <= five_year.point && five_year.point <= five_year.upper);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod encoder;
pub mod error;
pub mod pipeline;
pub mod predictor;
pub mod profile;
pub mod registry;
pub mod transform;

pub use config::{ModelBundle, ModelConfiguration, ModelId, PredictorLevel};
pub use encoder::{encode, ConditionalPolicy, EncodedVector};
pub use error::{ConfigError, Result, RiskError, ValidationError};
pub use pipeline::{estimate, Estimator, HorizonRisk, RiskReport};
pub use profile::PatientProfile;
pub use registry::ModelRegistry;
pub use transform::{BoundsPolicy, RiskEstimate, DEFAULT_Z};
