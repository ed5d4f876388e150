use crate::analysis::error::AnalysisError;
use crate::analysis::geo;
use crate::domain::Location;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectedLocation {
    pub location_id: String,
    pub distance_km: f64,
    /// 1.0 at distance 0, falling linearly to 0.0 at the risk radius.
    pub risk_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CannibalizationReport {
    pub target_location_id: String,
    /// Closest first; equal distances ordered by location id.
    pub affected_locations: Vec<AffectedLocation>,
    /// Smallest separation already present in the network. `None` when the network
    /// (target excluded) has fewer than two locations.
    pub recommended_min_distance_km: Option<f64>,
}

impl CannibalizationReport {
    /// Highest risk among affected locations, 0.0 when nothing is in range.
    pub fn max_risk(&self) -> f64 {
        self.affected_locations
            .first()
            .map(|a| a.risk_score)
            .unwrap_or(0.0)
    }
}

/// Linear decay `clamp(1 - d / radius, 0, 1)`.
pub fn risk_score(distance_km: f64, risk_radius_km: f64) -> Result<f64, AnalysisError> {
    if !(risk_radius_km.is_finite() && risk_radius_km > 0.0) {
        return Err(AnalysisError::DivisionByZero {
            radius_km: risk_radius_km,
        });
    }
    Ok((1.0 - distance_km / risk_radius_km).clamp(0.0, 1.0))
}

/// Existing locations the `target` would share customers with.
pub fn analyze(
    target: &Location,
    existing_locations: &[Location],
    risk_radius_km: f64,
) -> Result<CannibalizationReport, AnalysisError> {
    risk_score(0.0, risk_radius_km)?;
    target.coordinate.validate()?;
    for location in existing_locations {
        location.coordinate.validate()?;
    }

    let network: Vec<Location> = existing_locations
        .iter()
        .filter(|l| l.id != target.id)
        .cloned()
        .collect();

    let mut affected_locations = Vec::new();
    for (location, distance_km) in
        geo::within_radius(target.coordinate, risk_radius_km, &network, |l| l.coordinate)
    {
        affected_locations.push(AffectedLocation {
            location_id: location.id.clone(),
            distance_km,
            risk_score: risk_score(distance_km, risk_radius_km)?,
        });
    }

    affected_locations.sort_by(|a, b| {
        a.distance_km
            .total_cmp(&b.distance_km)
            .then_with(|| a.location_id.cmp(&b.location_id))
    });

    let recommended_min_distance_km = match recommended_min_distance(&network) {
        Ok(d) => Some(d),
        Err(AnalysisError::InsufficientData { .. }) => None,
        Err(e) => return Err(e),
    };

    Ok(CannibalizationReport {
        target_location_id: target.id.clone(),
        affected_locations,
        recommended_min_distance_km,
    })
}

/// Minimum pairwise distance across the whole network, used as the empirically safe
/// separation between locations.
pub fn recommended_min_distance(existing_locations: &[Location]) -> Result<f64, AnalysisError> {
    if existing_locations.len() < 2 {
        return Err(AnalysisError::InsufficientData {
            required: 2,
            actual: existing_locations.len(),
        });
    }

    let mut min = f64::INFINITY;
    for (i, a) in existing_locations.iter().enumerate() {
        for b in &existing_locations[i + 1..] {
            min = min.min(geo::distance_km(a.coordinate, b.coordinate));
        }
    }
    Ok(min)
}
