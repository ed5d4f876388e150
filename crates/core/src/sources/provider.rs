use crate::analysis::geo;
use crate::config::{env_override, Settings};
use crate::domain::{Brand, Competitor, Coordinate, Location, LocationKind};
use crate::sources::types::{CompetitorItem, CompetitorsResponse, EconomicIndicators};
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 3;
const MAX_BACKOFF_EXP: u32 = 6;
const COMPETITORS_PATH: &str = "/v1/competitors";
const INDICATORS_PATH: &str = "/v1/indicators";

#[async_trait::async_trait]
pub trait CompetitorDataSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// Competitors around `center`, already normalized into [`Competitor`]s.
    async fn fetch_competitors(&self, center: Coordinate, radius_km: f64)
        -> Result<Vec<Competitor>>;
}

#[async_trait::async_trait]
pub trait EconomicIndicatorSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch_indicators(&self, center: Coordinate) -> Result<EconomicIndicators>;
}

/// GET-with-retry JSON client shared by the HTTP sources.
#[derive(Debug, Clone)]
struct JsonHttp {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    retries: u32,
}

impl JsonHttp {
    fn new(base_url: &str, api_key: Option<String>, timeout_secs: u64, retries: u32) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build data source http client")?;

        Ok(Self {
            http,
            base_url: base_url.to_string(),
            api_key,
            retries: retries.max(1),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    async fn get_once<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let res = self
            .http
            .get(self.url(path))
            .headers(self.headers()?)
            .query(query)
            .send()
            .await
            .context("data source request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read data source response")?;
        let raw_json = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("data source response is not valid JSON: {text}"))?;

        if !status.is_success() {
            anyhow::bail!("data source HTTP {status}: {raw_json}");
        }

        serde_json::from_value::<T>(raw_json).context("failed to parse data source response")
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.get_once(path, query).await {
                Ok(parsed) => return Ok(parsed),
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = retry_backoff(attempt);
                    tracing::warn!(attempt, ?backoff, path, error = %err, "data source fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

/// Exponential backoff after the `attempt`-th failure: 1s, 2s, 4s, ... capped at 64s.
fn retry_backoff(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(MAX_BACKOFF_EXP);
    Duration::from_secs(1u64 << exp)
}

fn timeout_and_retries_from_env() -> Result<(u64, u32)> {
    let timeout_secs = env_override("SOURCE_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT_SECS);
    let retries = env_override("SOURCE_RETRIES")?.unwrap_or(DEFAULT_RETRIES);
    Ok((timeout_secs, retries))
}

#[derive(Debug, Clone)]
pub struct HttpJsonCompetitorSource {
    client: JsonHttp,
}

impl HttpJsonCompetitorSource {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_competitor_source_base_url()?;
        let (timeout_secs, retries) = timeout_and_retries_from_env()?;
        Self::with_base_url(
            base_url,
            settings.competitor_source_api_key.clone(),
            timeout_secs,
            retries,
        )
    }

    pub fn with_base_url(
        base_url: &str,
        api_key: Option<String>,
        timeout_secs: u64,
        retries: u32,
    ) -> Result<Self> {
        Ok(Self {
            client: JsonHttp::new(base_url, api_key, timeout_secs, retries)?,
        })
    }
}

#[async_trait::async_trait]
impl CompetitorDataSource for HttpJsonCompetitorSource {
    fn source_name(&self) -> &'static str {
        "external_http_json"
    }

    async fn fetch_competitors(
        &self,
        center: Coordinate,
        radius_km: f64,
    ) -> Result<Vec<Competitor>> {
        let query = [
            ("lat", center.lat.to_string()),
            ("lng", center.lng.to_string()),
            ("radius_km", radius_km.to_string()),
        ];
        let resp: CompetitorsResponse = self.client.get(COMPETITORS_PATH, &query).await?;

        let mut out = Vec::with_capacity(resp.items.len());
        for item in resp.items {
            out.push(normalize_item(item)?);
        }
        Ok(out)
    }
}

#[derive(Debug, Clone)]
pub struct HttpJsonIndicatorSource {
    client: JsonHttp,
}

impl HttpJsonIndicatorSource {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_indicator_source_base_url()?;
        let (timeout_secs, retries) = timeout_and_retries_from_env()?;
        Self::with_base_url(
            base_url,
            settings.indicator_source_api_key.clone(),
            timeout_secs,
            retries,
        )
    }

    pub fn with_base_url(
        base_url: &str,
        api_key: Option<String>,
        timeout_secs: u64,
        retries: u32,
    ) -> Result<Self> {
        Ok(Self {
            client: JsonHttp::new(base_url, api_key, timeout_secs, retries)?,
        })
    }
}

#[async_trait::async_trait]
impl EconomicIndicatorSource for HttpJsonIndicatorSource {
    fn source_name(&self) -> &'static str {
        "external_http_json"
    }

    async fn fetch_indicators(&self, center: Coordinate) -> Result<EconomicIndicators> {
        let query = [
            ("lat", center.lat.to_string()),
            ("lng", center.lng.to_string()),
        ];
        self.client.get(INDICATORS_PATH, &query).await
    }
}

/// In-memory source for fixtures and offline runs.
#[derive(Debug, Clone, Default)]
pub struct StaticCompetitorSource {
    competitors: Vec<Competitor>,
}

impl StaticCompetitorSource {
    pub fn new(competitors: Vec<Competitor>) -> Self {
        Self { competitors }
    }

    /// Loads a JSON array of [`Competitor`]s.
    pub fn from_json_file(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read competitors file {}", path.display()))?;
        let competitors: Vec<Competitor> = serde_json::from_str(&text)
            .with_context(|| format!("competitors file {} is not valid JSON", path.display()))?;
        for c in &competitors {
            c.location.coordinate.validate()?;
        }
        Ok(Self::new(competitors))
    }
}

#[async_trait::async_trait]
impl CompetitorDataSource for StaticCompetitorSource {
    fn source_name(&self) -> &'static str {
        "static"
    }

    async fn fetch_competitors(
        &self,
        center: Coordinate,
        radius_km: f64,
    ) -> Result<Vec<Competitor>> {
        Ok(
            geo::within_radius(center, radius_km, &self.competitors, |c| c.location.coordinate)
                .into_iter()
                .map(|(c, _)| c.clone())
                .collect(),
        )
    }
}

fn normalize_item(item: CompetitorItem) -> Result<Competitor> {
    let id = item.id.trim().to_string();
    anyhow::ensure!(!id.is_empty(), "competitor id must be non-empty");
    let name = item.name.trim().to_string();
    anyhow::ensure!(!name.is_empty(), "competitor name must be non-empty (id={id})");
    let coordinate = Coordinate::new(item.lat, item.lng)
        .with_context(|| format!("competitor {id} has an invalid coordinate"))?;

    let brand = item.brand.unwrap_or_else(|| Brand::from_place_name(&name));
    let mut competitor = Competitor::from_brand(
        Location::new(id, name, coordinate, LocationKind::Existing),
        brand,
    );
    if let Some(category) = item.category {
        competitor.category = category;
    }
    Ok(competitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CompetitorCategory;
    use serde_json::json;

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(retry_backoff(1), Duration::from_secs(1));
        assert_eq!(retry_backoff(2), Duration::from_secs(2));
        assert_eq!(retry_backoff(4), Duration::from_secs(8));
        assert_eq!(retry_backoff(7), Duration::from_secs(64));
        assert_eq!(retry_backoff(65), Duration::from_secs(64));
        assert_eq!(retry_backoff(u32::MAX), Duration::from_secs(64));
    }

    #[test]
    fn normalizes_brand_from_name_when_missing() {
        let item: CompetitorItem = serde_json::from_value(json!({
            "id": "ChIJ123",
            "name": " KFC Gonzalitos ",
            "lat": 25.69,
            "lng": -100.35
        }))
        .unwrap();

        let c = normalize_item(item).unwrap();
        assert_eq!(c.brand, Brand::Kfc);
        assert_eq!(c.category, CompetitorCategory::Direct);
        assert_eq!(c.location.name, "KFC Gonzalitos");
    }

    #[test]
    fn explicit_category_overrides_brand_default() {
        let item: CompetitorItem = serde_json::from_value(json!({
            "id": "denue-9",
            "name": "Alitas El Chino",
            "lat": 25.7,
            "lng": -100.3,
            "brand": "other",
            "category": "direct"
        }))
        .unwrap();

        let c = normalize_item(item).unwrap();
        assert_eq!(c.brand, Brand::Other);
        assert_eq!(c.category, CompetitorCategory::Direct);
    }

    #[test]
    fn rejects_blank_names_and_bad_coordinates() {
        let blank: CompetitorItem =
            serde_json::from_value(json!({"id": "x", "name": " ", "lat": 25.7, "lng": -100.3}))
                .unwrap();
        assert!(normalize_item(blank).is_err());

        let bad: CompetitorItem =
            serde_json::from_value(json!({"id": "x", "name": "KFC", "lat": 125.7, "lng": -100.3}))
                .unwrap();
        assert!(normalize_item(bad).is_err());
    }

    #[tokio::test]
    async fn static_source_filters_by_radius() {
        let center = Coordinate::new(25.6866, -100.3161).unwrap();
        let near = Competitor::from_brand(
            Location::new(
                "near",
                "Popeyes Centro",
                Coordinate::new(25.6900, -100.3161).unwrap(),
                LocationKind::Existing,
            ),
            Brand::Popeyes,
        );
        let far = Competitor::from_brand(
            Location::new(
                "far",
                "KFC Apodaca",
                Coordinate::new(25.7800, -100.1900).unwrap(),
                LocationKind::Existing,
            ),
            Brand::Kfc,
        );
        let source = StaticCompetitorSource::new(vec![near, far]);

        let found = source.fetch_competitors(center, 3.0).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].location.id, "near");
        assert_eq!(source.source_name(), "static");
    }
}
