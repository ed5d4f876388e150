use crate::analysis::cannibalization::{self, CannibalizationReport};
use crate::analysis::competition::{self, CompetitionReport};
use crate::analysis::error::AnalysisError;
use crate::analysis::scoring::{self, ScoreResult, ScoringConfig, ScoringInputs};
use crate::config::env_override;
use crate::domain::{Competitor, Location, Plaza};
use serde::{Deserialize, Serialize};

const DEFAULT_COMPETITION_RADIUS_KM: f64 = 3.0;
const DEFAULT_RISK_RADIUS_KM: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationParams {
    pub competition_radius_km: f64,
    pub risk_radius_km: f64,
    pub scoring: ScoringConfig,
}

impl Default for EvaluationParams {
    fn default() -> Self {
        Self {
            competition_radius_km: DEFAULT_COMPETITION_RADIUS_KM,
            risk_radius_km: DEFAULT_RISK_RADIUS_KM,
            scoring: ScoringConfig::default(),
        }
    }
}

impl EvaluationParams {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut out = Self {
            scoring: ScoringConfig::from_env()?,
            ..Self::default()
        };

        if let Some(n) = env_override("ANALYSIS_RADIUS_KM")? {
            out.competition_radius_km = n;
        }
        if let Some(n) = env_override("CANNIBALIZATION_RISK_RADIUS_KM")? {
            out.risk_radius_km = n;
        }

        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteEvaluation {
    pub plaza_id: String,
    pub competition: CompetitionReport,
    pub cannibalization: CannibalizationReport,
    pub score: ScoreResult,
}

/// Runs competition, cannibalization and scoring for one plaza.
///
/// `network` is the set of company locations already operating; the plaza itself is
/// skipped if present there or among `competitors`.
pub fn evaluate_site(
    plaza: &Plaza,
    competitors: &[Competitor],
    network: &[Location],
    params: &EvaluationParams,
) -> Result<SiteEvaluation, AnalysisError> {
    plaza.location.coordinate.validate()?;
    params.scoring.validate()?;

    let competitors: Vec<Competitor> = competitors
        .iter()
        .filter(|c| c.location.id != plaza.location.id)
        .cloned()
        .collect();

    let competition = competition::analyze(
        plaza.location.coordinate,
        &competitors,
        params.competition_radius_km,
    )?;
    let cannibalization =
        cannibalization::analyze(&plaza.location, network, params.risk_radius_km)?;

    let inputs = ScoringInputs {
        competitor_density_per_km2: competition.density_per_km2,
        socioeconomic_level: plaza.socioeconomic_level,
        daily_foot_traffic: plaza.foot_traffic.daily_total() as f64,
        cannibalization_risk: cannibalization.max_risk(),
    };
    let score = scoring::score(&inputs, &params.scoring)?;

    Ok(SiteEvaluation {
        plaza_id: plaza.location.id.clone(),
        competition,
        cannibalization,
        score,
    })
}

/// Best site first; equal scores ordered by plaza id.
pub fn rank_sites(evaluations: &mut [SiteEvaluation]) {
    evaluations.sort_by(|a, b| {
        b.score
            .composite_score
            .total_cmp(&a.score.composite_score)
            .then_with(|| a.plaza_id.cmp(&b.plaza_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::geo::tests::{loc, north_of, MONTERREY};
    use crate::analysis::scoring::Classification;
    use crate::domain::{Address, Brand, FootTrafficCurve, LocationKind, SocioeconomicLevel};

    fn plaza(id: &str, hourly_visitors: u32) -> Plaza {
        Plaza {
            location: Location::new(id, format!("Plaza {id}"), MONTERREY, LocationKind::Proposed),
            socioeconomic_level: SocioeconomicLevel::CPlus,
            foot_traffic: FootTrafficCurve {
                hourly: [hourly_visitors; 24],
            },
            address: Address {
                street: "Av. Constitución 400".to_string(),
                neighborhood: "Centro".to_string(),
                municipality: "Monterrey".to_string(),
                postal_code: Some("64000".to_string()),
            },
        }
    }

    #[test]
    fn evaluates_full_pipeline() {
        let p = plaza("plaza-1", 400);
        let competitors = vec![
            Competitor::from_brand(loc("kfc", north_of(MONTERREY, 1.0)), Brand::Kfc),
            Competitor::from_brand(loc("bk", north_of(MONTERREY, 2.5)), Brand::BurgerKing),
        ];
        let network = vec![
            loc("ct-1", north_of(MONTERREY, 1.0)),
            loc("ct-2", north_of(MONTERREY, 6.0)),
        ];

        let eval = evaluate_site(&p, &competitors, &network, &EvaluationParams::default()).unwrap();

        assert_eq!(eval.plaza_id, "plaza-1");
        assert_eq!(eval.competition.total_competitors, 2);
        assert_eq!(eval.cannibalization.affected_locations.len(), 1);
        assert!((eval.cannibalization.affected_locations[0].risk_score - 0.5).abs() < 1e-9);
        assert!((eval.cannibalization.recommended_min_distance_km.unwrap() - 5.0).abs() < 1e-9);
        assert!(eval.score.composite_score > 0.0 && eval.score.composite_score <= 100.0);
    }

    #[test]
    fn plaza_is_never_its_own_competitor() {
        let p = plaza("same", 100);
        let competitors = vec![Competitor::from_brand(
            Location::new("same", "Plaza same", MONTERREY, LocationKind::Existing),
            Brand::CrispyTenders,
        )];

        let eval = evaluate_site(&p, &competitors, &[], &EvaluationParams::default()).unwrap();
        assert_eq!(eval.competition.total_competitors, 0);
        assert!(eval.competition.nearest_competitor.is_none());
    }

    #[test]
    fn propagates_invalid_config() {
        let mut params = EvaluationParams::default();
        params.scoring.weights.competition = 0.5;
        assert!(matches!(
            evaluate_site(&plaza("p", 10), &[], &[], &params),
            Err(AnalysisError::InvalidConfig(_))
        ));
    }

    #[test]
    fn ranks_best_first_then_by_id() {
        let params = EvaluationParams::default();
        let mut evals = vec![
            evaluate_site(&plaza("b", 100), &[], &[], &params).unwrap(),
            evaluate_site(&plaza("c", 500), &[], &[], &params).unwrap(),
            evaluate_site(&plaza("a", 100), &[], &[], &params).unwrap(),
        ];
        rank_sites(&mut evals);
        let ids: Vec<_> = evals.iter().map(|e| e.plaza_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert_eq!(evals[0].score.classification, Classification::Excelente);
    }
}
