//! model configuration - the pre-fitted coefficients & baseline survival a risk
//! estimate is computed from.
//!
//! A configuration starts life as a [`ModelBundle`], the declarative artifact
//! that gets deployed (usually TOML). [`ModelConfiguration::from_bundle`] checks
//! the bundle once and produces an immutable, validated configuration; a bundle
//! that fails any check never becomes usable.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::ConfigError;

/// largest |log hazard ratio| or standard error a bundle may carry; keeps
/// scores and summed squared errors finite for any realistic predictor count
pub const MAX_COEFFICIENT_MAGNITUDE: f64 = 1e3;

/// explicit identifier for one model configuration: `name@version`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId {
    name: String,
    version: String,
}

impl ModelId {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

impl FromStr for ModelId {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().split_once('@') {
            Some((name, version))
                if !name.is_empty() && !version.is_empty() && !version.contains('@') =>
            {
                Ok(Self::new(name, version))
            }
            _ => Err(ConfigError::InvalidModelId {
                raw: raw.to_string(),
            }),
        }
    }
}

impl Serialize for ModelId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// the deployable artifact, exactly as written on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelBundle {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub groups: Vec<GroupSpec>,
    #[serde(default)]
    pub factors: Vec<FactorSpec>,
    #[serde(default)]
    pub horizons: Vec<HorizonSpec>,
}

/// a categorical factor - exactly one level is selected per patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupSpec {
    pub key: String,
    pub levels: Vec<LevelSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LevelSpec {
    /// stable selection identifier callers submit
    pub id: String,
    /// model-internal predictor name
    pub variable_key: String,
    pub log_hazard_ratio: f64,
    pub standard_error: f64,
    #[serde(default)]
    pub is_reference: bool,
}

/// a standalone binary factor, optionally conditional on another one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FactorSpec {
    pub key: String,
    /// defaults to `key`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_key: Option<String>,
    pub log_hazard_ratio: f64,
    pub standard_error: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_factor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HorizonSpec {
    pub label: String,
    pub baseline_survival: f64,
}

impl ModelBundle {
    /// parse a bundle from TOML text; `source_name` only shows up in errors
    pub fn from_toml_str(source_name: &str, text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::parse(source_name, e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::parse(format!("{}@{}", self.name, self.version), e.to_string()))
    }
}

/// one coded predictor column of the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictorLevel {
    pub variable_key: String,
    /// `None` for standalone binary factors
    pub group_key: Option<String>,
    pub log_hazard_ratio: f64,
    pub standard_error: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalGroup {
    key: String,
    levels: Vec<(String, usize)>, // (selection id, predictor index)
    reference: usize,             // position in `levels`
}

impl CategoricalGroup {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// selection ids in declared order
    pub fn level_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.levels.iter().map(|(id, _)| id.as_str())
    }

    pub fn reference_id(&self) -> &str {
        &self.levels[self.reference].0
    }

    /// predictor index for a selection id, if the id belongs to this group
    pub fn predictor_index(&self, level_id: &str) -> Option<usize> {
        self.levels
            .iter()
            .find(|(id, _)| id == level_id)
            .map(|&(_, idx)| idx)
    }

    pub fn predictor_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.levels.iter().map(|&(_, idx)| idx)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryFactor {
    key: String,
    predictor: usize,
    requires: Option<usize>, // index into the configuration's factors
}

impl BinaryFactor {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn predictor_index(&self) -> usize {
        self.predictor
    }

    /// index of the governing factor for conditional factors
    pub fn requires(&self) -> Option<usize> {
        self.requires
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Horizon {
    label: String,
    baseline_survival: f64,
}

impl Horizon {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn baseline_survival(&self) -> f64 {
        self.baseline_survival
    }
}

/// validated, immutable model configuration
///
/// Predictors are laid out in canonical order: group levels in declared order,
/// then standalone factors. The coefficient and standard-error arrays follow
/// that same order, as does every [`EncodedVector`](crate::encoder::EncodedVector)
/// built against this configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfiguration {
    id: ModelId,
    description: Option<String>,
    predictors: Vec<PredictorLevel>,
    groups: Vec<CategoricalGroup>,
    factors: Vec<BinaryFactor>,
    horizons: Vec<Horizon>,
    log_hazard_ratios: Array1<f64>,
    standard_errors: Array1<f64>,
}

impl ModelConfiguration {
    /// check a bundle & build the configuration - any violation rejects the whole bundle
    pub fn from_bundle(bundle: ModelBundle) -> Result<Self, ConfigError> {
        require_non_empty("name", &bundle.name)?;
        require_non_empty("version", &bundle.version)?;
        // both halves must survive a round trip through `name@version`
        let selectable = |part: &str| !part.contains('@') && part.trim() == part;
        if !selectable(&bundle.name) || !selectable(&bundle.version) {
            return Err(ConfigError::InvalidModelId {
                raw: format!("{}@{}", bundle.name, bundle.version),
            });
        }

        let mut predictors: Vec<PredictorLevel> = Vec::new();
        let mut variable_keys: HashSet<String> = HashSet::new();

        let mut groups = Vec::with_capacity(bundle.groups.len());
        let mut group_keys: HashSet<&str> = HashSet::new();
        for spec in &bundle.groups {
            require_non_empty("group key", &spec.key)?;
            if !group_keys.insert(spec.key.as_str()) {
                return Err(ConfigError::DuplicateGroup {
                    group: spec.key.clone(),
                });
            }
            groups.push(build_group(spec, &mut predictors, &mut variable_keys)?);
        }

        let mut factor_index: HashMap<&str, usize> = HashMap::new();
        let mut factors = Vec::with_capacity(bundle.factors.len());
        for spec in &bundle.factors {
            require_non_empty("factor key", &spec.key)?;
            if factor_index.insert(spec.key.as_str(), factors.len()).is_some() {
                return Err(ConfigError::DuplicateFactor {
                    factor: spec.key.clone(),
                });
            }
            let variable_key = spec.variable_key.clone().unwrap_or_else(|| spec.key.clone());
            require_non_empty("variable key", &variable_key)?;
            check_coefficient(&variable_key, spec.log_hazard_ratio, spec.standard_error)?;
            if !variable_keys.insert(variable_key.clone()) {
                return Err(ConfigError::duplicate_variable_key(variable_key));
            }

            factors.push(BinaryFactor {
                key: spec.key.clone(),
                predictor: predictors.len(),
                requires: None,
            });
            predictors.push(PredictorLevel {
                variable_key,
                group_key: None,
                log_hazard_ratio: spec.log_hazard_ratio,
                standard_error: spec.standard_error,
            });
        }

        // second pass: conditional links, only one level deep
        for (i, spec) in bundle.factors.iter().enumerate() {
            let Some(requires) = spec.requires_factor.as_deref() else {
                continue;
            };
            let target = *factor_index
                .get(requires)
                .ok_or_else(|| ConfigError::UnknownRequiredFactor {
                    factor: spec.key.clone(),
                    requires: requires.to_string(),
                })?;
            if target == i || bundle.factors[target].requires_factor.is_some() {
                return Err(ConfigError::ChainedRequirement {
                    factor: spec.key.clone(),
                    requires: requires.to_string(),
                });
            }
            factors[i].requires = Some(target);
        }

        if bundle.horizons.is_empty() {
            return Err(ConfigError::NoHorizons);
        }
        let mut horizons = Vec::with_capacity(bundle.horizons.len());
        let mut labels: HashSet<&str> = HashSet::new();
        for spec in &bundle.horizons {
            require_non_empty("horizon label", &spec.label)?;
            if !labels.insert(spec.label.as_str()) {
                return Err(ConfigError::DuplicateHorizon {
                    label: spec.label.clone(),
                });
            }
            let s0 = spec.baseline_survival;
            // written this way so NaN fails too
            if !(s0 > 0.0 && s0 <= 1.0) {
                return Err(ConfigError::baseline_out_of_range(&spec.label, s0));
            }
            horizons.push(Horizon {
                label: spec.label.clone(),
                baseline_survival: s0,
            });
        }

        let log_hazard_ratios = predictors.iter().map(|p| p.log_hazard_ratio).collect();
        let standard_errors = predictors.iter().map(|p| p.standard_error).collect();

        Ok(Self {
            id: ModelId::new(bundle.name, bundle.version),
            description: bundle.description,
            predictors,
            groups,
            factors,
            horizons,
            log_hazard_ratios,
            standard_errors,
        })
    }

    /// parse & validate TOML text in one go
    pub fn from_toml_str(source_name: &str, text: &str) -> Result<Self, ConfigError> {
        Self::from_bundle(ModelBundle::from_toml_str(source_name, text)?)
    }

    /// load a bundle file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| ConfigError::io(path.display().to_string(), e.to_string()))?;
        Self::from_toml_str(&path.display().to_string(), &text)
    }

    pub fn id(&self) -> &ModelId {
        &self.id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// every predictor column in canonical order
    pub fn predictors(&self) -> &[PredictorLevel] {
        &self.predictors
    }

    pub fn n_predictors(&self) -> usize {
        self.predictors.len()
    }

    pub fn groups(&self) -> &[CategoricalGroup] {
        &self.groups
    }

    pub fn group(&self, key: &str) -> Option<&CategoricalGroup> {
        self.groups.iter().find(|g| g.key == key)
    }

    pub fn factors(&self) -> &[BinaryFactor] {
        &self.factors
    }

    pub fn factor(&self, key: &str) -> Option<&BinaryFactor> {
        self.factors.iter().find(|f| f.key == key)
    }

    /// horizons in declared order
    pub fn horizons(&self) -> &[Horizon] {
        &self.horizons
    }

    pub fn log_hazard_ratios(&self) -> ArrayView1<'_, f64> {
        self.log_hazard_ratios.view()
    }

    pub fn standard_errors(&self) -> ArrayView1<'_, f64> {
        self.standard_errors.view()
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::empty_field(field));
    }
    Ok(())
}

fn check_coefficient(key: &str, log_hazard_ratio: f64, standard_error: f64) -> Result<(), ConfigError> {
    if !log_hazard_ratio.is_finite() || !standard_error.is_finite() {
        return Err(ConfigError::NonFiniteCoefficient {
            key: key.to_string(),
        });
    }
    for value in [log_hazard_ratio, standard_error] {
        if value.abs() > MAX_COEFFICIENT_MAGNITUDE {
            return Err(ConfigError::CoefficientOutOfRange {
                key: key.to_string(),
                value,
            });
        }
    }
    if standard_error < 0.0 {
        return Err(ConfigError::NegativeStandardError {
            key: key.to_string(),
            value: standard_error,
        });
    }
    Ok(())
}

fn is_zero_effect(log_hazard_ratio: f64, standard_error: f64) -> bool {
    log_hazard_ratio == 0.0 && standard_error == 0.0
}

fn build_group(
    spec: &GroupSpec,
    predictors: &mut Vec<PredictorLevel>,
    variable_keys: &mut HashSet<String>,
) -> Result<CategoricalGroup, ConfigError> {
    if spec.levels.is_empty() {
        return Err(ConfigError::EmptyGroup {
            group: spec.key.clone(),
        });
    }

    let mut level_ids: HashSet<&str> = HashSet::new();
    let mut levels = Vec::with_capacity(spec.levels.len());
    for level in &spec.levels {
        require_non_empty("level id", &level.id)?;
        require_non_empty("variable key", &level.variable_key)?;
        check_coefficient(&level.variable_key, level.log_hazard_ratio, level.standard_error)?;
        if !level_ids.insert(level.id.as_str()) {
            return Err(ConfigError::DuplicateLevel {
                group: spec.key.clone(),
                level: level.id.clone(),
            });
        }
        if !variable_keys.insert(level.variable_key.clone()) {
            return Err(ConfigError::duplicate_variable_key(&level.variable_key));
        }
        levels.push((level.id.clone(), predictors.len()));
        predictors.push(PredictorLevel {
            variable_key: level.variable_key.clone(),
            group_key: Some(spec.key.clone()),
            log_hazard_ratio: level.log_hazard_ratio,
            standard_error: level.standard_error,
        });
    }

    let flagged: Vec<usize> = spec
        .levels
        .iter()
        .enumerate()
        .filter(|(_, l)| l.is_reference)
        .map(|(i, _)| i)
        .collect();
    let reference = match flagged.as_slice() {
        [] => return Err(ConfigError::missing_reference(&spec.key)),
        [only] => *only,
        many => {
            let ids: Vec<&str> = many.iter().map(|&i| spec.levels[i].id.as_str()).collect();
            return Err(ConfigError::MultipleReferences {
                group: spec.key.clone(),
                levels: ids.join(", "),
            });
        }
    };

    let ref_level = &spec.levels[reference];
    if !is_zero_effect(ref_level.log_hazard_ratio, ref_level.standard_error) {
        return Err(ConfigError::NonZeroReference {
            group: spec.key.clone(),
            level: ref_level.id.clone(),
        });
    }
    // exactly one zero/zero level per group, and it's the flagged one
    if let Some(other) = spec
        .levels
        .iter()
        .enumerate()
        .find(|&(i, l)| i != reference && is_zero_effect(l.log_hazard_ratio, l.standard_error))
    {
        return Err(ConfigError::AmbiguousReference {
            group: spec.key.clone(),
            level: other.1.id.clone(),
        });
    }

    Ok(CategoricalGroup {
        key: spec.key.clone(),
        levels,
        reference,
    })
}
