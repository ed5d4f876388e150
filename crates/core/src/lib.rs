pub mod analysis;
pub mod domain;
pub mod sources;
pub mod storage;

pub mod config {
    use anyhow::Context;
    use std::fmt::Display;
    use std::str::FromStr;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub competitor_source_base_url: Option<String>,
        pub competitor_source_api_key: Option<String>,
        pub indicator_source_base_url: Option<String>,
        pub indicator_source_api_key: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                competitor_source_base_url: std::env::var("COMPETITOR_SOURCE_BASE_URL").ok(),
                competitor_source_api_key: std::env::var("COMPETITOR_SOURCE_API_KEY").ok(),
                indicator_source_base_url: std::env::var("INDICATOR_SOURCE_BASE_URL").ok(),
                indicator_source_api_key: std::env::var("INDICATOR_SOURCE_API_KEY").ok(),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_competitor_source_base_url(&self) -> anyhow::Result<&str> {
            self.competitor_source_base_url
                .as_deref()
                .context("COMPETITOR_SOURCE_BASE_URL is required")
        }

        pub fn require_indicator_source_base_url(&self) -> anyhow::Result<&str> {
            self.indicator_source_base_url
                .as_deref()
                .context("INDICATOR_SOURCE_BASE_URL is required")
        }
    }

    /// Reads an optional override from the environment. Unset or blank means `None`;
    /// anything else must parse.
    pub fn env_override<T>(key: &str) -> anyhow::Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        parse_override(key, std::env::var(key).ok().as_deref())
    }

    pub fn parse_override<T>(key: &str, raw: Option<&str>) -> anyhow::Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        match raw.parse::<T>() {
            Ok(v) => Ok(Some(v)),
            Err(e) => anyhow::bail!("invalid {key}={raw:?}: {e}"),
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn blank_or_missing_override_is_none() {
            assert_eq!(parse_override::<f64>("ANALYSIS_RADIUS_KM", None).unwrap(), None);
            assert_eq!(parse_override::<f64>("ANALYSIS_RADIUS_KM", Some("  ")).unwrap(), None);
        }

        #[test]
        fn parses_trimmed_override() {
            assert_eq!(
                parse_override::<f64>("ANALYSIS_RADIUS_KM", Some(" 2.5 ")).unwrap(),
                Some(2.5)
            );
            assert_eq!(parse_override::<u32>("SOURCE_RETRIES", Some("5")).unwrap(), Some(5));
        }

        #[test]
        fn malformed_override_is_an_error_naming_the_key() {
            let err = parse_override::<f64>("SCORING_WEIGHT_COMPETITION", Some("0,3")).unwrap_err();
            assert!(err.to_string().contains("SCORING_WEIGHT_COMPETITION"));
            assert!(parse_override::<u32>("SOURCE_RETRIES", Some("-1")).is_err());
        }
    }
}
