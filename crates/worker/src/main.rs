use anyhow::Context;
use clap::Parser;
use crispy_core::analysis::evaluate::{self, EvaluationParams};
use crispy_core::sources::{
    CompetitorDataSource, EconomicIndicatorSource, HttpJsonCompetitorSource,
    HttpJsonIndicatorSource, StaticCompetitorSource,
};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod run;

// Nuevo León has stayed on UTC-6 year-round since DST was abolished in 2022.
const MONTERREY_OFFSET_SECS: i32 = -6 * 3600;

const SUMMARY_TOP_N: usize = 10;

#[derive(Debug, Parser)]
#[command(name = "crispy_worker")]
struct Args {
    /// Run date (YYYY-MM-DD). Defaults to today's Monterrey date.
    #[arg(long)]
    as_of_date: Option<String>,

    /// Evaluate everything but skip writing results and taking the run lock.
    #[arg(long)]
    dry_run: bool,

    /// Only evaluate this plaza id.
    #[arg(long)]
    plaza: Option<String>,

    /// Read competitors from a JSON file instead of the HTTP competitor source.
    #[arg(long)]
    competitors_file: Option<std::path::PathBuf>,
}

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

    let args = Args::parse();

    let as_of_date = resolve_as_of_date(args.as_of_date.as_deref(), chrono::Utc::now())?;

    let params = EvaluationParams::from_env()?;
    params.scoring.validate()?;

    let competitor_source: Box<dyn CompetitorDataSource> = match &args.competitors_file {
        Some(path) => Box::new(StaticCompetitorSource::from_json_file(path)?),
        None => Box::new(HttpJsonCompetitorSource::from_settings(&settings)?),
    };
    let indicator_source = if settings.indicator_source_base_url.is_some() {
        Some(HttpJsonIndicatorSource::from_settings(&settings)?)
    } else {
        None
    };

    let db_url = settings.require_database_url()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    crispy_core::storage::migrate(&pool).await?;

    let network = crispy_core::storage::locations::load_network(&pool).await?;
    let mut plazas = crispy_core::storage::locations::load_plazas(&pool).await?;
    if let Some(only) = args.plaza.as_deref() {
        plazas.retain(|p| p.location.id == only);
        anyhow::ensure!(!plazas.is_empty(), "plaza {only} not found");
    }

    tracing::info!(
        %as_of_date,
        dry_run = args.dry_run,
        plazas = plazas.len(),
        network = network.len(),
        source = competitor_source.source_name(),
        "starting site evaluation run"
    );

    let mut lock_conn = pool.acquire().await.context("acquire lock connection failed")?;
    if !args.dry_run {
        let acquired =
            crispy_core::storage::lock::try_acquire_run_lock(&mut lock_conn, as_of_date).await?;
        if !acquired {
            tracing::warn!(%as_of_date, "run lock not acquired; another run in progress");
            return Ok(());
        }
    }

    let sources = run::Sources {
        competitors: competitor_source.as_ref(),
        indicators: indicator_source
            .as_ref()
            .map(|s| s as &dyn EconomicIndicatorSource),
    };
    let outcomes = run::evaluate_all(&plazas, &network, &sources, &params).await;

    let sink = run::PgEvaluationSink {
        pool: &pool,
        as_of_date,
        source: competitor_source.source_name(),
    };
    let run::RunSummary {
        mut evaluations,
        failures,
    } = run::record_outcomes(
        outcomes,
        (!args.dry_run).then_some(&sink as &dyn run::EvaluationSink),
    )
    .await;

    evaluate::rank_sites(&mut evaluations);
    for (rank, eval) in evaluations.iter().take(SUMMARY_TOP_N).enumerate() {
        tracing::info!(
            rank = rank + 1,
            plaza_id = %eval.plaza_id,
            score = eval.score.composite_score,
            classification = eval.score.classification.as_str(),
            "ranked plaza"
        );
    }

    tracing::info!(
        %as_of_date,
        evaluated = evaluations.len(),
        failures,
        dry_run = args.dry_run,
        "site evaluation run finished"
    );

    if !args.dry_run {
        let _ = crispy_core::storage::lock::release_run_lock(&mut lock_conn, as_of_date).await;
    }
    Ok(())
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

fn resolve_as_of_date(
    as_of_date_arg: Option<&str>,
    now_utc: chrono::DateTime<chrono::Utc>,
) -> anyhow::Result<chrono::NaiveDate> {
    if let Some(s) = as_of_date_arg {
        return chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid --as-of-date {s:?}"));
    }

    let mty = chrono::FixedOffset::east_opt(MONTERREY_OFFSET_SECS)
        .context("invalid Monterrey offset")?;
    Ok(now_utc.with_timezone(&mty).date_naive())
}
