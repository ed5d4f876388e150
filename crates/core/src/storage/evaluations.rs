use crate::analysis::cannibalization::CannibalizationReport;
use crate::analysis::competition::CompetitionReport;
use crate::analysis::evaluate::SiteEvaluation;
use crate::analysis::scoring::{classify, ScoreResult};
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct StoredEvaluation {
    pub id: Uuid,
    pub as_of_date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub source: String,
    pub evaluation: SiteEvaluation,
}

pub async fn persist_success(
    pool: &sqlx::PgPool,
    as_of_date: NaiveDate,
    source: &str,
    evaluation: &SiteEvaluation,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let component_scores = serde_json::to_value(&evaluation.score.component_scores)
        .context("serialize component scores failed")?;
    let competition =
        serde_json::to_value(&evaluation.competition).context("serialize competition failed")?;
    let cannibalization = serde_json::to_value(&evaluation.cannibalization)
        .context("serialize cannibalization failed")?;

    sqlx::query(
        "INSERT INTO site_evaluations \
           (id, as_of_date, generated_at, plaza_id, source, status, error, \
            composite_score, classification, component_scores, competition, cannibalization) \
         VALUES ($1, $2, $3, $4, $5, 'success', NULL, $6, $7, $8, $9, $10)",
    )
    .persistent(false)
    .bind(id)
    .bind(as_of_date)
    .bind(Utc::now())
    .bind(&evaluation.plaza_id)
    .bind(source)
    .bind(evaluation.score.composite_score)
    .bind(evaluation.score.classification.as_str())
    .bind(component_scores)
    .bind(competition)
    .bind(cannibalization)
    .execute(pool)
    .await
    .context("insert site_evaluations failed")?;

    Ok(id)
}

pub async fn persist_failure(
    pool: &sqlx::PgPool,
    as_of_date: NaiveDate,
    plaza_id: &str,
    source: &str,
    error: &str,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO site_evaluations (id, as_of_date, generated_at, plaza_id, source, status, error) \
         VALUES ($1, $2, $3, $4, $5, 'error', $6)",
    )
    .persistent(false)
    .bind(id)
    .bind(as_of_date)
    .bind(Utc::now())
    .bind(plaza_id)
    .bind(source)
    .bind(error)
    .execute(pool)
    .await
    .context("insert error site_evaluations failed")?;

    Ok(id)
}

/// Most recent successful evaluation of a plaza.
pub async fn latest_for_plaza(
    pool: &sqlx::PgPool,
    plaza_id: &str,
) -> anyhow::Result<Option<StoredEvaluation>> {
    let row = sqlx::query_as::<
        _,
        (
            Uuid,
            NaiveDate,
            DateTime<Utc>,
            String,
            f64,
            Value,
            Value,
            Value,
        ),
    >(
        "SELECT id, as_of_date, generated_at, source, composite_score, \
                component_scores, competition, cannibalization \
         FROM site_evaluations \
         WHERE plaza_id = $1 AND status = 'success' \
         ORDER BY as_of_date DESC, generated_at DESC \
         LIMIT 1",
    )
    .persistent(false)
    .bind(plaza_id)
    .fetch_optional(pool)
    .await
    .context("select latest site_evaluations failed")?;

    let Some((id, as_of_date, generated_at, source, composite_score, scores, competition, cannibalization)) =
        row
    else {
        return Ok(None);
    };

    let competition: CompetitionReport = serde_json::from_value(competition)
        .with_context(|| format!("invalid competition JSON in DB for evaluation {id}"))?;
    let cannibalization: CannibalizationReport = serde_json::from_value(cannibalization)
        .with_context(|| format!("invalid cannibalization JSON in DB for evaluation {id}"))?;
    let component_scores = serde_json::from_value(scores)
        .with_context(|| format!("invalid component_scores JSON in DB for evaluation {id}"))?;

    Ok(Some(StoredEvaluation {
        id,
        as_of_date,
        generated_at,
        source,
        evaluation: SiteEvaluation {
            plaza_id: plaza_id.to_string(),
            competition,
            cannibalization,
            score: ScoreResult {
                composite_score,
                // Thresholds are fixed, so re-deriving matches what was stored.
                classification: classify(composite_score),
                component_scores,
            },
        },
    }))
}
