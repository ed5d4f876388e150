use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crispy_core::analysis::cannibalization::{self, CannibalizationReport};
use crispy_core::analysis::competition::{self, CompetitionReport};
use crispy_core::analysis::evaluate::{self, EvaluationParams, SiteEvaluation};
use crispy_core::analysis::scoring::{self, ScoreResult, ScoringConfig, ScoringInputs};
use crispy_core::analysis::AnalysisError;
use crispy_core::domain::{Competitor, Coordinate, Location, Plaza};
use crispy_core::storage::evaluations::StoredEvaluation;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = crispy_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match crispy_core::storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let params = EvaluationParams::from_env()?;
    params.scoring.validate()?;

    let app = build_app(AppState { pool, params });

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/competition", post(analyze_competition))
        .route("/api/cannibalization", post(analyze_cannibalization))
        .route("/api/network/min-distance", get(network_min_distance))
        .route("/api/score", post(score_site))
        .route("/api/evaluate", post(evaluate_site))
        .route("/api/plazas", get(list_plazas))
        .route("/api/plazas/:plaza_id/evaluation", get(latest_evaluation))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Clone)]
struct AppState {
    pool: Option<PgPool>,
    params: EvaluationParams,
}

impl AppState {
    fn pool(&self) -> Result<&PgPool, ApiError> {
        self.pool.as_ref().ok_or_else(|| ApiError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "database unavailable".to_string(),
        })
    }
}

/// `{ success, data?, error? }` wrapper used by every `/api` route.
#[derive(Debug, Serialize)]
struct Envelope<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(Envelope {
        success: true,
        data: Some(data),
        error: None,
    }))
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(err: anyhow::Error) -> Self {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %err, "request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal error".to_string(),
        }
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        let status = match err {
            AnalysisError::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Envelope::<()> {
            success: false,
            data: None,
            error: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct CompetitionRequest {
    center: Coordinate,
    competitors: Vec<Competitor>,
    radius_km: Option<f64>,
}

async fn analyze_competition(
    State(state): State<AppState>,
    payload: Result<Json<CompetitionRequest>, JsonRejection>,
) -> ApiResult<CompetitionReport> {
    let Json(req) = payload?;
    let radius_km = req.radius_km.unwrap_or(state.params.competition_radius_km);

    ok(competition::analyze(req.center, &req.competitors, radius_km)?)
}

#[derive(Debug, Deserialize)]
struct CannibalizationRequest {
    target: Location,
    /// Falls back to the stored network when omitted.
    existing: Option<Vec<Location>>,
    risk_radius_km: Option<f64>,
}

async fn analyze_cannibalization(
    State(state): State<AppState>,
    payload: Result<Json<CannibalizationRequest>, JsonRejection>,
) -> ApiResult<CannibalizationReport> {
    let Json(req) = payload?;
    req.target.coordinate.validate()?;
    let network = resolve_network(&state, req.existing).await?;
    let radius_km = req.risk_radius_km.unwrap_or(state.params.risk_radius_km);

    ok(cannibalization::analyze(&req.target, &network, radius_km)?)
}

#[derive(Debug, Serialize)]
struct MinDistance {
    min_distance_km: f64,
    locations: usize,
}

async fn network_min_distance(State(state): State<AppState>) -> ApiResult<MinDistance> {
    let network = crispy_core::storage::locations::load_network(state.pool()?)
        .await
        .map_err(ApiError::internal)?;

    ok(MinDistance {
        min_distance_km: cannibalization::recommended_min_distance(&network)?,
        locations: network.len(),
    })
}

#[derive(Debug, Deserialize)]
struct ScoreRequest {
    inputs: ScoringInputs,
    config: Option<ScoringConfig>,
}

async fn score_site(
    State(state): State<AppState>,
    payload: Result<Json<ScoreRequest>, JsonRejection>,
) -> ApiResult<ScoreResult> {
    let Json(req) = payload?;
    let config = req.config.unwrap_or(state.params.scoring);

    ok(scoring::score(&req.inputs, &config)?)
}

#[derive(Debug, Deserialize)]
struct EvaluateRequest {
    plaza: Plaza,
    competitors: Vec<Competitor>,
    existing: Option<Vec<Location>>,
    params: Option<EvaluationParams>,
}

async fn evaluate_site(
    State(state): State<AppState>,
    payload: Result<Json<EvaluateRequest>, JsonRejection>,
) -> ApiResult<SiteEvaluation> {
    let Json(req) = payload?;
    let network = resolve_network(&state, req.existing).await?;
    let params = req.params.unwrap_or(state.params);

    ok(evaluate::evaluate_site(
        &req.plaza,
        &req.competitors,
        &network,
        &params,
    )?)
}

async fn list_plazas(State(state): State<AppState>) -> ApiResult<Vec<Plaza>> {
    let plazas = crispy_core::storage::locations::load_plazas(state.pool()?)
        .await
        .map_err(ApiError::internal)?;
    ok(plazas)
}

async fn latest_evaluation(
    State(state): State<AppState>,
    Path(plaza_id): Path<String>,
) -> ApiResult<StoredEvaluation> {
    let stored = crispy_core::storage::evaluations::latest_for_plaza(state.pool()?, &plaza_id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found(format!("no evaluation for plaza {plaza_id}")))?;
    ok(stored)
}

async fn resolve_network(
    state: &AppState,
    existing: Option<Vec<Location>>,
) -> Result<Vec<Location>, ApiError> {
    match existing {
        Some(locations) => {
            for l in &locations {
                l.coordinate.validate()?;
            }
            Ok(locations)
        }
        None => crispy_core::storage::locations::load_network(state.pool()?)
            .await
            .map_err(ApiError::internal),
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &crispy_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        build_app(AppState {
            pool: None,
            params: EvaluationParams::default(),
        })
    }

    async fn call(method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        let request = match body {
            Some(v) => builder.body(Body::from(v.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = app().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    fn location(id: &str, lat: f64, lng: f64) -> Value {
        json!({
            "id": id,
            "name": format!("Sucursal {id}"),
            "coordinate": { "lat": lat, "lng": lng },
            "kind": "existing"
        })
    }

    #[tokio::test]
    async fn competition_returns_envelope() {
        let body = json!({
            "center": { "lat": 25.6866, "lng": -100.3161 },
            "radius_km": 3.0,
            "competitors": [
                {
                    "location": location("kfc-1", 25.6956, -100.3161),
                    "brand": "kfc",
                    "category": "direct",
                    "threat_level": "high"
                },
                {
                    "location": location("bk-1", 25.7090, -100.3161),
                    "brand": "burger_king",
                    "category": "indirect",
                    "threat_level": "low"
                }
            ]
        });

        let (status, json) = call("POST", "/api/competition", Some(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["total_competitors"], 2);
        assert_eq!(json["data"]["direct"], 1);
        assert_eq!(json["data"]["nearest_competitor"]["id"], "kfc-1");
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn competitor_with_impossible_latitude_is_rejected() {
        let body = json!({
            "center": { "lat": 25.6866, "lng": -100.3161 },
            "competitors": [
                {
                    "location": location("kfc-typo", 385.6866, -100.3161),
                    "brand": "kfc",
                    "category": "direct",
                    "threat_level": "high"
                }
            ]
        });

        let (status, json) = call("POST", "/api/competition", Some(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("invalid coordinate"));
    }

    #[tokio::test]
    async fn zero_radius_maps_to_bad_request() {
        let body = json!({
            "center": { "lat": 25.6866, "lng": -100.3161 },
            "radius_km": 0.0,
            "competitors": []
        });

        let (status, json) = call("POST", "/api/competition", Some(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("division by zero"));
    }

    #[tokio::test]
    async fn score_rejects_weights_not_summing_to_one() {
        let body = json!({
            "inputs": {
                "competitor_density_per_km2": 0.4,
                "socioeconomic_level": "C",
                "daily_foot_traffic": 6000.0,
                "cannibalization_risk": 0.0
            },
            "config": {
                "weights": {
                    "competition": 0.30,
                    "socioeconomic": 0.25,
                    "foot_traffic": 0.25,
                    "cannibalization": 0.19
                },
                "reference_density_per_km2": 2.0,
                "reference_daily_traffic": 10000.0
            }
        });

        let (status, json) = call("POST", "/api/score", Some(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("invalid scoring config"));
    }

    #[tokio::test]
    async fn score_uses_default_config() {
        let body = json!({
            "inputs": {
                "competitor_density_per_km2": 0.0,
                "socioeconomic_level": "AB",
                "daily_foot_traffic": 12000.0,
                "cannibalization_risk": 0.0
            }
        });

        let (status, json) = call("POST", "/api/score", Some(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["classification"], "EXCELENTE");
    }

    #[tokio::test]
    async fn cannibalization_with_explicit_network() {
        let body = json!({
            "target": {
                "id": "new",
                "name": "Plaza Nueva",
                "coordinate": { "lat": 25.6866, "lng": -100.3161 },
                "kind": "proposed"
            },
            "existing": [
                location("ct-1", 25.6956, -100.3161),
                location("ct-2", 25.7500, -100.3161)
            ],
            "risk_radius_km": 2.0
        });

        let (status, json) = call("POST", "/api/cannibalization", Some(body)).await;

        assert_eq!(status, StatusCode::OK);
        let affected = json["data"]["affected_locations"].as_array().unwrap();
        assert_eq!(affected.len(), 1);
        assert_eq!(affected[0]["location_id"], "ct-1");
    }

    #[tokio::test]
    async fn stored_network_without_database_is_unavailable() {
        let (status, json) = call("GET", "/api/network/min-distance", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["success"], false);

        let body = json!({
            "target": {
                "id": "new",
                "name": "Plaza Nueva",
                "coordinate": { "lat": 25.6866, "lng": -100.3161 },
                "kind": "proposed"
            }
        });
        let (status, _) = call("POST", "/api/cannibalization", Some(body)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn malformed_body_keeps_envelope() {
        let (status, json) = call("POST", "/api/score", Some(json!({"inputs": 3}))).await;
        assert!(status.is_client_error());
        assert_eq!(json["success"], false);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let response = app()
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
