use crate::analysis::error::AnalysisError;
use serde::{Deserialize, Serialize};

/// WGS84 point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, AnalysisError> {
        let c = Self { lat, lng };
        c.validate()?;
        Ok(c)
    }

    /// Checks the range of a coordinate that was built without `new` (e.g. deserialized).
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let lat_ok = self.lat.is_finite() && (-90.0..=90.0).contains(&self.lat);
        let lng_ok = self.lng.is_finite() && (-180.0..=180.0).contains(&self.lng);
        if lat_ok && lng_ok {
            Ok(())
        } else {
            Err(AnalysisError::InvalidCoordinate {
                lat: self.lat,
                lng: self.lng,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    Existing,
    Proposed,
}

impl LocationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationKind::Existing => "existing",
            LocationKind::Proposed => "proposed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "existing" => Some(LocationKind::Existing),
            "proposed" => Some(LocationKind::Proposed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub coordinate: Coordinate,
    pub kind: LocationKind,
}

impl Location {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        coordinate: Coordinate,
        kind: LocationKind,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            coordinate,
            kind,
        }
    }
}
