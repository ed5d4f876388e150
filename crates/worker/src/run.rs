use anyhow::Context;
use crispy_core::analysis::evaluate::{self, EvaluationParams, SiteEvaluation};
use sqlx::PgPool;
use crispy_core::domain::{Location, Plaza};
use crispy_core::sources::{CompetitorDataSource, EconomicIndicatorSource};
use crispy_core::storage::evaluations;

pub struct Sources<'a> {
    pub competitors: &'a dyn CompetitorDataSource,
    pub indicators: Option<&'a dyn EconomicIndicatorSource>,
}

#[derive(Debug)]
pub struct PlazaOutcome {
    pub plaza_id: String,
    pub result: anyhow::Result<SiteEvaluation>,
}

/// Fetches the plaza's surroundings and evaluates it against the network.
pub async fn evaluate_plaza(
    plaza: &Plaza,
    network: &[Location],
    sources: &Sources<'_>,
    params: &EvaluationParams,
) -> anyhow::Result<SiteEvaluation> {
    let center = plaza.location.coordinate;

    let competitors = sources
        .competitors
        .fetch_competitors(center, params.competition_radius_km)
        .await
        .with_context(|| {
            format!(
                "{} competitor fetch failed for plaza {}",
                sources.competitors.source_name(),
                plaza.location.id
            )
        })?;

    let mut plaza = plaza.clone();
    if let Some(indicators) = sources.indicators {
        let fetched = indicators.fetch_indicators(center).await.with_context(|| {
            format!(
                "{} indicator fetch failed for plaza {}",
                indicators.source_name(),
                plaza.location.id
            )
        })?;
        if fetched.socioeconomic_level != plaza.socioeconomic_level {
            tracing::debug!(
                plaza_id = %plaza.location.id,
                stored = plaza.socioeconomic_level.as_str(),
                fetched = fetched.socioeconomic_level.as_str(),
                "socioeconomic level refreshed from indicator source"
            );
        }
        plaza.socioeconomic_level = fetched.socioeconomic_level;
    }

    Ok(evaluate::evaluate_site(
        &plaza,
        &competitors,
        network,
        params,
    )?)
}

/// Evaluates every plaza in order. A failing plaza is reported in its outcome and does not
/// stop the run.
pub async fn evaluate_all(
    plazas: &[Plaza],
    network: &[Location],
    sources: &Sources<'_>,
    params: &EvaluationParams,
) -> Vec<PlazaOutcome> {
    let mut out = Vec::with_capacity(plazas.len());
    for (idx, plaza) in plazas.iter().enumerate() {
        let result = evaluate_plaza(plaza, network, sources, params).await;
        match &result {
            Ok(eval) => tracing::info!(
                idx,
                plaza_id = %plaza.location.id,
                score = eval.score.composite_score,
                classification = eval.score.classification.as_str(),
                competitors = eval.competition.total_competitors,
                affected = eval.cannibalization.affected_locations.len(),
                "plaza evaluated"
            ),
            Err(err) => tracing::warn!(
                idx,
                plaza_id = %plaza.location.id,
                error = %err,
                "plaza evaluation failed"
            ),
        }
        out.push(PlazaOutcome {
            plaza_id: plaza.location.id.clone(),
            result,
        });
    }
    out
}

/// Where a run's per-plaza results end up.
#[async_trait::async_trait]
pub trait EvaluationSink: Send + Sync {
    async fn record_success(&self, evaluation: &SiteEvaluation) -> anyhow::Result<()>;

    async fn record_failure(&self, plaza_id: &str, error: &str) -> anyhow::Result<()>;
}

pub struct PgEvaluationSink<'a> {
    pub pool: &'a PgPool,
    pub as_of_date: chrono::NaiveDate,
    pub source: &'static str,
}

#[async_trait::async_trait]
impl EvaluationSink for PgEvaluationSink<'_> {
    async fn record_success(&self, evaluation: &SiteEvaluation) -> anyhow::Result<()> {
        let id =
            evaluations::persist_success(self.pool, self.as_of_date, self.source, evaluation)
                .await?;
        tracing::debug!(%id, plaza_id = %evaluation.plaza_id, "persisted site evaluation");
        Ok(())
    }

    async fn record_failure(&self, plaza_id: &str, error: &str) -> anyhow::Result<()> {
        evaluations::persist_failure(self.pool, self.as_of_date, plaza_id, self.source, error)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    /// Plazas evaluated and, unless dry-running, stored.
    pub evaluations: Vec<SiteEvaluation>,
    pub failures: usize,
}

/// Hands each outcome to `sink` (`None` for a dry run). A failed write is logged and counted as
/// a failure for that plaza; the remaining plazas are still recorded.
pub async fn record_outcomes(
    outcomes: Vec<PlazaOutcome>,
    sink: Option<&dyn EvaluationSink>,
) -> RunSummary {
    let mut summary = RunSummary::default();
    for outcome in outcomes {
        match outcome.result {
            Ok(eval) => {
                if let Some(sink) = sink {
                    if let Err(err) = sink.record_success(&eval).await {
                        write_failed(&outcome.plaza_id, &err);
                        summary.failures += 1;
                        continue;
                    }
                }
                summary.evaluations.push(eval);
            }
            Err(err) => {
                summary.failures += 1;
                sentry_anyhow::capture_anyhow(&err);
                if let Some(sink) = sink {
                    if let Err(write_err) =
                        sink.record_failure(&outcome.plaza_id, &format!("{err:#}")).await
                    {
                        write_failed(&outcome.plaza_id, &write_err);
                    }
                }
            }
        }
    }
    summary
}

fn write_failed(plaza_id: &str, err: &anyhow::Error) {
    tracing::error!(plaza_id, error = %format!("{err:#}"), "failed to store plaza outcome");
    sentry_anyhow::capture_anyhow(err);
}
