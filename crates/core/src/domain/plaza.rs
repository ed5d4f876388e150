use crate::domain::location::Location;
use serde::{Deserialize, Serialize};

/// AMAI socioeconomic level of the area around a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SocioeconomicLevel {
    #[serde(rename = "AB")]
    AB,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C-")]
    CMinus,
    #[serde(rename = "D+")]
    DPlus,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "E")]
    E,
}

impl SocioeconomicLevel {
    /// Monotonic 0-100 index, higher purchasing power scores higher.
    pub fn index(&self) -> f64 {
        match self {
            SocioeconomicLevel::AB => 100.0,
            SocioeconomicLevel::CPlus => 85.0,
            SocioeconomicLevel::C => 70.0,
            SocioeconomicLevel::CMinus => 55.0,
            SocioeconomicLevel::DPlus => 40.0,
            SocioeconomicLevel::D => 25.0,
            SocioeconomicLevel::E => 10.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SocioeconomicLevel::AB => "AB",
            SocioeconomicLevel::CPlus => "C+",
            SocioeconomicLevel::C => "C",
            SocioeconomicLevel::CMinus => "C-",
            SocioeconomicLevel::DPlus => "D+",
            SocioeconomicLevel::D => "D",
            SocioeconomicLevel::E => "E",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AB" | "A/B" => Some(SocioeconomicLevel::AB),
            "C+" => Some(SocioeconomicLevel::CPlus),
            "C" => Some(SocioeconomicLevel::C),
            "C-" => Some(SocioeconomicLevel::CMinus),
            "D+" => Some(SocioeconomicLevel::DPlus),
            "D" => Some(SocioeconomicLevel::D),
            "E" => Some(SocioeconomicLevel::E),
            _ => None,
        }
    }
}

/// Estimated visitors for each hour of a typical day (index 0 = 00:00-00:59).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FootTrafficCurve {
    pub hourly: [u32; 24],
}

impl FootTrafficCurve {
    pub fn daily_total(&self) -> u64 {
        self.hourly.iter().map(|&v| u64::from(v)).sum()
    }

    /// Busiest hour and its visitors. The earliest hour wins a tie; `None` for an empty curve.
    pub fn peak_hour(&self) -> Option<(usize, u32)> {
        let mut best: Option<(usize, u32)> = None;
        for (hour, &visitors) in self.hourly.iter().enumerate() {
            if visitors == 0 {
                continue;
            }
            match best {
                Some((_, v)) if v >= visitors => {}
                _ => best = Some((hour, visitors)),
            }
        }
        best
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    /// Colonia.
    pub neighborhood: String,
    pub municipality: String,
    pub postal_code: Option<String>,
}

/// Candidate (or existing) commercial site under evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plaza {
    pub location: Location,
    pub socioeconomic_level: SocioeconomicLevel,
    pub foot_traffic: FootTrafficCurve,
    pub address: Address,
}
