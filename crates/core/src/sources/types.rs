use crate::domain::{Brand, CompetitorCategory, SocioeconomicLevel};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorsResponse {
    pub items: Vec<CompetitorItem>,
}

/// One place as returned by the competitor provider, before normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorItem {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub brand: Option<Brand>,
    #[serde(default)]
    pub category: Option<CompetitorCategory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicIndicators {
    pub socioeconomic_level: SocioeconomicLevel,
    #[serde(default)]
    pub population: Option<u64>,
    /// Economic units registered in the census around the point.
    #[serde(default)]
    pub economic_units: Option<u32>,
}
