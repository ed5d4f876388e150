use crate::analysis::error::AnalysisError;
use crate::analysis::geo;
use crate::domain::{Brand, Competitor, CompetitorCategory, Coordinate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestCompetitor {
    pub id: String,
    pub name: String,
    pub distance_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitionReport {
    pub total_competitors: usize,
    pub direct: usize,
    pub indirect: usize,
    pub nearest_competitor: Option<NearestCompetitor>,
    pub density_per_km2: f64,
}

/// Competitive pressure around `center` counting only competitors within `radius_km`
/// (boundary included). Our own stores never count as competition.
pub fn analyze(
    center: Coordinate,
    competitors: &[Competitor],
    radius_km: f64,
) -> Result<CompetitionReport, AnalysisError> {
    // Fail before scanning so a bad radius never yields a partial report.
    geo::density_per_km2(0, radius_km)?;
    center.validate()?;
    for competitor in competitors {
        competitor.location.coordinate.validate()?;
    }

    let rivals: Vec<&Competitor> = competitors
        .iter()
        .filter(|c| c.brand != Brand::CrispyTenders)
        .collect();
    let in_range: Vec<&Competitor> =
        geo::within_radius(center, radius_km, &rivals, |c| c.location.coordinate)
            .into_iter()
            .map(|(c, _)| *c)
            .collect();

    let direct = in_range
        .iter()
        .filter(|c| c.category == CompetitorCategory::Direct)
        .count();
    let indirect = in_range.len() - direct;

    let nearest_competitor = geo::nearest_by(center, &in_range, |c| c.location.coordinate).map(
        |(c, distance_km)| NearestCompetitor {
            id: c.location.id.clone(),
            name: c.location.name.clone(),
            distance_km,
        },
    );

    let density_per_km2 = geo::density_per_km2(in_range.len(), radius_km)?;

    Ok(CompetitionReport {
        total_competitors: in_range.len(),
        direct,
        indirect,
        nearest_competitor,
        density_per_km2,
    })
}
