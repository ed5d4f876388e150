use crate::domain::location::Location;
use serde::{Deserialize, Serialize};

/// Chains tracked in the Monterrey metro area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Brand {
    CrispyTenders,
    Kfc,
    Popeyes,
    ChurchsChicken,
    Wingstop,
    PolloLoco,
    PolloFeliz,
    McDonalds,
    BurgerKing,
    CarlsJr,
    LittleCaesars,
    Dominos,
    Subway,
    Other,
}

impl Brand {
    /// Tags a raw place name (as returned by Places / DENUE) with a known chain.
    ///
    /// Matching is a case-insensitive keyword check. Chicken chains are checked first so
    /// that a name like "Pollo Loco Burger" stays a chicken competitor.
    pub fn from_place_name(name: &str) -> Self {
        let s = name.trim().to_lowercase();
        if s.is_empty() {
            return Brand::Other;
        }

        if s.contains("crispy tenders") {
            Brand::CrispyTenders
        } else if s.contains("kfc") || s.contains("kentucky") {
            Brand::Kfc
        } else if s.contains("popeyes") {
            Brand::Popeyes
        } else if s.contains("church's") || s.contains("church’s") || s.contains("churchs") {
            Brand::ChurchsChicken
        } else if s.contains("wingstop") || s.contains("wing stop") {
            Brand::Wingstop
        } else if s.contains("pollo loco") {
            Brand::PolloLoco
        } else if s.contains("pollo feliz") {
            Brand::PolloFeliz
        } else if s.contains("mcdonald") {
            Brand::McDonalds
        } else if s.contains("burger king") {
            Brand::BurgerKing
        } else if s.contains("carl's jr") || s.contains("carls jr") {
            Brand::CarlsJr
        } else if s.contains("little caesar") {
            Brand::LittleCaesars
        } else if s.contains("domino") {
            Brand::Dominos
        } else if s.contains("subway") {
            Brand::Subway
        } else {
            Brand::Other
        }
    }

    pub fn is_chicken_chain(&self) -> bool {
        matches!(
            self,
            Brand::CrispyTenders
                | Brand::Kfc
                | Brand::Popeyes
                | Brand::ChurchsChicken
                | Brand::Wingstop
                | Brand::PolloLoco
                | Brand::PolloFeliz
        )
    }

    pub fn default_category(&self) -> CompetitorCategory {
        if self.is_chicken_chain() {
            CompetitorCategory::Direct
        } else {
            CompetitorCategory::Indirect
        }
    }

    pub fn default_threat_level(&self) -> ThreatLevel {
        match self {
            Brand::Kfc | Brand::Popeyes | Brand::ChurchsChicken => ThreatLevel::High,
            b if b.is_chicken_chain() => ThreatLevel::Medium,
            _ => ThreatLevel::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompetitorCategory {
    Direct,
    Indirect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatLevel {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competitor {
    pub location: Location,
    pub brand: Brand,
    pub category: CompetitorCategory,
    pub threat_level: ThreatLevel,
}

impl Competitor {
    pub fn from_brand(location: Location, brand: Brand) -> Self {
        Self {
            location,
            brand,
            category: brand.default_category(),
            threat_level: brand.default_threat_level(),
        }
    }
}
