//! Narrow interfaces over third-party geodata providers (Places, DENUE, Data México).

pub mod provider;
pub mod types;

pub use provider::{
    CompetitorDataSource, EconomicIndicatorSource, HttpJsonCompetitorSource,
    HttpJsonIndicatorSource, StaticCompetitorSource,
};
pub use types::EconomicIndicators;
