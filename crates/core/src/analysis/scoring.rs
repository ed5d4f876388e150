//! Weighted viability score for a candidate site.
//!
//! Each factor maps a raw metric onto a 0-100 sub-score with a monotonic, linear curve:
//!
//! - competition: `100 * (1 - density / reference_density)`, fewer competitors scores higher
//! - socioeconomic: [`SocioeconomicLevel::index`]
//! - foot traffic: `100 * daily_visitors / reference_daily_traffic`
//! - cannibalization: `100 * (1 - risk)`, so nearby own locations pull the score down
//!
//! The composite is the weighted sum of the sub-scores, clamped to `[0, 100]`.

use crate::analysis::error::AnalysisError;
use crate::config::env_override;
use crate::domain::SocioeconomicLevel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

const EXCELENTE_MIN: f64 = 80.0;
const BUENA_MIN: f64 = 65.0;
const EVALUAR_MIN: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    CompetitionDensity,
    Socioeconomic,
    FootTraffic,
    CannibalizationRisk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    Excelente,
    Buena,
    Evaluar,
    Riesgosa,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Excelente => "EXCELENTE",
            Classification::Buena => "BUENA",
            Classification::Evaluar => "EVALUAR",
            Classification::Riesgosa => "RIESGOSA",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorWeights {
    pub competition: f64,
    pub socioeconomic: f64,
    pub foot_traffic: f64,
    pub cannibalization: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            competition: 0.30,
            socioeconomic: 0.25,
            foot_traffic: 0.25,
            cannibalization: 0.20,
        }
    }
}

impl FactorWeights {
    fn entries(&self) -> [(Factor, f64); 4] {
        [
            (Factor::CompetitionDensity, self.competition),
            (Factor::Socioeconomic, self.socioeconomic),
            (Factor::FootTraffic, self.foot_traffic),
            (Factor::CannibalizationRisk, self.cannibalization),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub weights: FactorWeights,
    /// Competitors per km² at which the competition sub-score reaches 0.
    pub reference_density_per_km2: f64,
    /// Daily visitors at which the foot-traffic sub-score reaches 100.
    pub reference_daily_traffic: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: FactorWeights::default(),
            reference_density_per_km2: 2.0,
            reference_daily_traffic: 10_000.0,
        }
    }
}

impl ScoringConfig {
    /// Defaults overridden by `SCORING_*` environment variables. A malformed value is an error.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut out = Self::default();

        if let Some(v) = env_override("SCORING_WEIGHT_COMPETITION")? {
            out.weights.competition = v;
        }
        if let Some(v) = env_override("SCORING_WEIGHT_SOCIOECONOMIC")? {
            out.weights.socioeconomic = v;
        }
        if let Some(v) = env_override("SCORING_WEIGHT_FOOT_TRAFFIC")? {
            out.weights.foot_traffic = v;
        }
        if let Some(v) = env_override("SCORING_WEIGHT_CANNIBALIZATION")? {
            out.weights.cannibalization = v;
        }
        if let Some(v) = env_override("SCORING_REFERENCE_DENSITY")? {
            out.reference_density_per_km2 = v;
        }
        if let Some(v) = env_override("SCORING_REFERENCE_DAILY_TRAFFIC")? {
            out.reference_daily_traffic = v;
        }

        Ok(out)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        let mut sum = 0.0;
        for (factor, weight) in self.weights.entries() {
            if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
                return Err(AnalysisError::InvalidConfig(format!(
                    "weight for {factor:?} must be within [0, 1] (got {weight})"
                )));
            }
            sum += weight;
        }

        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(AnalysisError::InvalidConfig(format!(
                "weights must sum to 1.0 (got {sum})"
            )));
        }

        for (name, value) in [
            ("reference_density_per_km2", self.reference_density_per_km2),
            ("reference_daily_traffic", self.reference_daily_traffic),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(AnalysisError::InvalidConfig(format!(
                    "{name} must be positive (got {value})"
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringInputs {
    pub competitor_density_per_km2: f64,
    pub socioeconomic_level: SocioeconomicLevel,
    pub daily_foot_traffic: f64,
    /// Highest cannibalization risk among nearby own locations, in `[0, 1]`.
    pub cannibalization_risk: f64,
}

impl ScoringInputs {
    fn validate(&self) -> Result<(), AnalysisError> {
        if !(self.competitor_density_per_km2.is_finite() && self.competitor_density_per_km2 >= 0.0) {
            return Err(AnalysisError::InvalidInput(format!(
                "competitor density must be non-negative (got {})",
                self.competitor_density_per_km2
            )));
        }
        if !(self.daily_foot_traffic.is_finite() && self.daily_foot_traffic >= 0.0) {
            return Err(AnalysisError::InvalidInput(format!(
                "daily foot traffic must be non-negative (got {})",
                self.daily_foot_traffic
            )));
        }
        if !(0.0..=1.0).contains(&self.cannibalization_risk) {
            return Err(AnalysisError::InvalidInput(format!(
                "cannibalization risk must be within [0, 1] (got {})",
                self.cannibalization_risk
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub composite_score: f64,
    pub classification: Classification,
    pub component_scores: BTreeMap<Factor, f64>,
}

pub fn classify(score: f64) -> Classification {
    if score >= EXCELENTE_MIN {
        Classification::Excelente
    } else if score >= BUENA_MIN {
        Classification::Buena
    } else if score >= EVALUAR_MIN {
        Classification::Evaluar
    } else {
        Classification::Riesgosa
    }
}

fn to_percent(v: f64) -> f64 {
    (v * 100.0).clamp(0.0, 100.0)
}

pub fn competition_subscore(density_per_km2: f64, reference_density_per_km2: f64) -> f64 {
    to_percent(1.0 - density_per_km2 / reference_density_per_km2)
}

pub fn foot_traffic_subscore(daily_visitors: f64, reference_daily_traffic: f64) -> f64 {
    to_percent(daily_visitors / reference_daily_traffic)
}

pub fn cannibalization_subscore(risk: f64) -> f64 {
    to_percent(1.0 - risk)
}

pub fn score(inputs: &ScoringInputs, config: &ScoringConfig) -> Result<ScoreResult, AnalysisError> {
    config.validate()?;
    inputs.validate()?;

    let mut component_scores = BTreeMap::new();
    component_scores.insert(
        Factor::CompetitionDensity,
        competition_subscore(
            inputs.competitor_density_per_km2,
            config.reference_density_per_km2,
        ),
    );
    component_scores.insert(
        Factor::Socioeconomic,
        inputs.socioeconomic_level.index().clamp(0.0, 100.0),
    );
    component_scores.insert(
        Factor::FootTraffic,
        foot_traffic_subscore(inputs.daily_foot_traffic, config.reference_daily_traffic),
    );
    component_scores.insert(
        Factor::CannibalizationRisk,
        cannibalization_subscore(inputs.cannibalization_risk),
    );

    let composite_score = config
        .weights
        .entries()
        .iter()
        .map(|(factor, weight)| weight * component_scores.get(factor).copied().unwrap_or(0.0))
        .sum::<f64>()
        .clamp(0.0, 100.0);

    Ok(ScoreResult {
        composite_score,
        classification: classify(composite_score),
        component_scores,
    })
}
