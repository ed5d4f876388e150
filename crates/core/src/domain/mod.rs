pub mod competitor;
pub mod location;
pub mod plaza;

pub use competitor::{Brand, Competitor, CompetitorCategory, ThreatLevel};
pub use location::{Coordinate, Location, LocationKind};
pub use plaza::{Address, FootTrafficCurve, Plaza, SocioeconomicLevel};
