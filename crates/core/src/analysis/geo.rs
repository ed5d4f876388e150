//! Great-circle geometry over [`Coordinate`]s.

use crate::analysis::error::AnalysisError;
use crate::domain::{Coordinate, Location};
use std::f64::consts::PI;

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometers. Symmetric, and exactly zero for identical points.
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}

/// Closest candidate to `point` by linear scan.
///
/// Ties go to the earliest candidate in input order. Returns `None` for an empty slice.
pub fn nearest<'a>(point: Coordinate, candidates: &'a [Location]) -> Option<(&'a Location, f64)> {
    nearest_by(point, candidates, |l| l.coordinate)
}

/// [`nearest`] over any item that carries a coordinate.
pub fn nearest_by<'a, T>(
    point: Coordinate,
    candidates: &'a [T],
    coord: impl Fn(&T) -> Coordinate,
) -> Option<(&'a T, f64)> {
    let mut best: Option<(&'a T, f64)> = None;
    for c in candidates {
        let d = distance_km(point, coord(c));
        match best {
            Some((_, best_d)) if best_d <= d => {}
            _ => best = Some((c, d)),
        }
    }
    best
}

/// Items per square kilometer inside a circle of `radius_km`.
pub fn density_per_km2(count: usize, radius_km: f64) -> Result<f64, AnalysisError> {
    if !(radius_km.is_finite() && radius_km > 0.0) {
        return Err(AnalysisError::DivisionByZero { radius_km });
    }
    Ok(count as f64 / (PI * radius_km * radius_km))
}

/// Items whose coordinate lies within `radius_km` of `center` (boundary included), in input order.
pub fn within_radius<'a, T>(
    center: Coordinate,
    radius_km: f64,
    items: &'a [T],
    coord: impl Fn(&T) -> Coordinate,
) -> Vec<(&'a T, f64)> {
    items
        .iter()
        .map(|item| (item, distance_km(center, coord(item))))
        .filter(|(_, d)| *d <= radius_km)
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::LocationKind;

    pub(crate) const MONTERREY: Coordinate = Coordinate {
        lat: 25.6866,
        lng: -100.3161,
    };

    /// Point `km` due north of `from`; haversine along a meridian is exact.
    pub(crate) fn north_of(from: Coordinate, km: f64) -> Coordinate {
        Coordinate {
            lat: from.lat + (km / EARTH_RADIUS_KM).to_degrees(),
            lng: from.lng,
        }
    }

    pub(crate) fn loc(id: &str, coordinate: Coordinate) -> Location {
        Location::new(id, format!("Sucursal {id}"), coordinate, LocationKind::Existing)
    }

    #[test]
    fn distance_is_symmetric_and_zero_on_self() {
        let a = MONTERREY;
        let b = Coordinate {
            lat: 25.6515,
            lng: -100.2895,
        };
        assert_eq!(distance_km(a, a), 0.0);
        assert!((distance_km(a, b) - distance_km(b, a)).abs() < 1e-12);
        assert!(distance_km(a, b) > 4.0 && distance_km(a, b) < 5.0);
    }

    #[test]
    fn distance_matches_meridian_arc() {
        let b = north_of(MONTERREY, 1.0);
        assert!((distance_km(MONTERREY, b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn distance_handles_antipodes() {
        let a = Coordinate { lat: 0.0, lng: 0.0 };
        let b = Coordinate {
            lat: 0.0,
            lng: 180.0,
        };
        assert!((distance_km(a, b) - PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }

    #[test]
    fn nearest_returns_none_on_empty() {
        assert!(nearest(MONTERREY, &[]).is_none());
    }

    #[test]
    fn nearest_breaks_ties_by_input_order() {
        let p = north_of(MONTERREY, 1.0);
        let candidates = vec![
            loc("far", north_of(MONTERREY, 3.0)),
            loc("first", p),
            loc("second", p),
        ];
        let (best, d) = nearest(MONTERREY, &candidates).unwrap();
        assert_eq!(best.id, "first");
        assert!((d - 1.0).abs() < 1e-9);
    }

    #[test]
    fn density_rejects_non_positive_radius() {
        assert_eq!(
            density_per_km2(3, 0.0),
            Err(AnalysisError::DivisionByZero { radius_km: 0.0 })
        );
        assert!(density_per_km2(3, -1.0).is_err());
        assert!(density_per_km2(3, f64::NAN).is_err());
        let d = density_per_km2(2, 3.0).unwrap();
        assert!((d - 2.0 / (PI * 9.0)).abs() < 1e-12);
    }

    #[test]
    fn within_radius_includes_boundary() {
        let items = vec![
            loc("in", north_of(MONTERREY, 0.5)),
            loc("out", north_of(MONTERREY, 2.5)),
            loc("edge", north_of(MONTERREY, 2.0)),
        ];
        let radius = distance_km(MONTERREY, items[2].coordinate);
        let ids: Vec<_> = within_radius(MONTERREY, radius, &items, |l| l.coordinate)
            .into_iter()
            .map(|(l, _)| l.id.as_str())
            .collect();
        assert_eq!(ids, vec!["in", "edge"]);
    }
}
