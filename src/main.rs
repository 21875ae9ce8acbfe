use std::{path::Path, process, sync::Arc};

use event_stats::{
    application::{aggregation::StatsCalculator, error::AppError},
    cache::{
        MemoryStore, RegenerationPlanner, RegenerationRunner, StatsCache, StatsCacheConfig,
        derive_key,
    },
    config::{self, Command, GetArgs},
    domain::filters::FilterSet,
    infra::{
        memory::{CatalogFixture, InMemoryCatalog},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;

    let config = StatsCacheConfig::from(&settings.stats);
    let context = build_context(&config, cli_args.command.fixture()).await?;

    match &cli_args.command {
        Command::Get(args) => run_get(&context, args).await,
        Command::Plan(_) => run_plan(&context).await,
        Command::Warm(_) => run_warm(&context).await,
    }
}

struct CliContext {
    cache: Arc<StatsCache>,
    runner: RegenerationRunner,
}

async fn build_context(config: &StatsCacheConfig, fixture: &Path) -> Result<CliContext, AppError> {
    let fixture = CatalogFixture::load(fixture).await?;
    let catalog = Arc::new(InMemoryCatalog::from_fixture(fixture)?);
    info!(
        items = catalog.item_count(),
        namespace = %config.namespace,
        "catalog loaded"
    );

    let mut calculator = StatsCalculator::new(catalog.clone(), catalog.clone());
    if let Some(rounding) = config.rounding_policy() {
        calculator = calculator.with_transform(Arc::new(rounding));
    }

    let store = Arc::new(MemoryStore::new(config));
    let cache = Arc::new(StatsCache::new(config.clone(), store, Arc::new(calculator)));
    let planner = RegenerationPlanner::new(config, catalog.clone(), catalog.clone(), catalog);
    let runner = RegenerationRunner::new(cache.clone(), planner);

    Ok(CliContext { cache, runner })
}

async fn run_get(context: &CliContext, args: &GetArgs) -> Result<(), AppError> {
    let filters = filters_from_args(args);
    let value = context.cache.get_or_compute(args.statistic, &filters).await;
    println!("{value}");
    Ok(())
}

async fn run_plan(context: &CliContext) -> Result<(), AppError> {
    let plan = context.runner.planner().plan().await;
    let namespace = &context.cache.config().namespace;

    for failure in &plan.failures {
        warn!(error = %failure.error, "planning step failed");
    }
    for query in &plan.queries {
        let key = derive_key(namespace, query)
            .map_err(|err| AppError::unexpected(err.to_string()))?;
        println!("{key}");
    }
    Ok(())
}

async fn run_warm(context: &CliContext) -> Result<(), AppError> {
    let report = context.runner.run().await;
    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|err| AppError::unexpected(format!("failed to render report: {err}")))?;
    println!("{rendered}");
    if !report.is_clean() {
        warn!(%report, "regeneration finished with failures");
    }
    Ok(())
}

fn filters_from_args(args: &GetArgs) -> FilterSet {
    let mut filters = FilterSet {
        temporal_partition: args.partition.clone(),
        category: args.category.clone(),
        term_id: args.term_id,
        count_category: args.count_category.clone(),
        filter_category: args.filter_category.clone(),
        ..Default::default()
    };
    for (category, terms) in &args.all_of {
        filters = filters.with_category_terms(category, terms.iter().copied());
    }
    filters.or_default_partition()
}
