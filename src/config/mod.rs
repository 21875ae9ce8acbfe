//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{collections::BTreeMap, num::NonZeroUsize, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::{
    DEFAULT_CROSS_CATEGORY_CAP, DEFAULT_NAMESPACE, DEFAULT_REGENERATION_DELAY_SECS,
    DEFAULT_STORE_CAPACITY, DEFAULT_TTL_SECS,
};
use crate::domain::types::{StatisticType, TermId};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "event-stats";
const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Command-line arguments for the event-stats binary.
#[derive(Debug, Parser)]
#[command(
    name = "event-stats",
    version,
    about = "Cached statistics over scheduled events"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "EVENT_STATS_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Compute one statistic through the cache.
    Get(GetArgs),
    /// Print the keys a regeneration pass would warm.
    Plan(FixtureArgs),
    /// Run a regeneration pass and print its report.
    Warm(FixtureArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct StatsOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Toggle the statistics cache.
    #[arg(
        long = "stats-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub stats_enabled: Option<bool>,

    /// Override the cache key namespace.
    #[arg(long = "stats-namespace", value_name = "NAME")]
    pub namespace: Option<String>,

    /// Override the lifetime of cached values.
    #[arg(long = "stats-ttl-seconds", value_name = "SECONDS")]
    pub ttl_seconds: Option<u64>,

    /// Override the number of cross-category entries planned per category pair.
    #[arg(long = "stats-cross-category-cap", value_name = "COUNT")]
    pub cross_category_cap: Option<usize>,
}

#[derive(Debug, Args, Clone)]
pub struct FixtureArgs {
    #[command(flatten)]
    pub overrides: StatsOverrides,

    /// TOML fixture describing items, categories, and support flags.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub fixture: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct GetArgs {
    #[command(flatten)]
    pub fixture: FixtureArgs,

    /// Statistic to compute, e.g. `items_in_category`.
    #[arg(long, value_name = "STATISTIC", value_parser = StatisticType::from_str)]
    pub statistic: StatisticType,

    /// Temporal partition (upcoming|past). Defaults to upcoming.
    #[arg(long, value_name = "PARTITION")]
    pub partition: Option<String>,

    /// Category of a single-term filter, or the category whose terms are counted.
    #[arg(long, value_name = "CATEGORY")]
    pub category: Option<String>,

    /// Term id for single-term and cross-category filters.
    #[arg(long = "term", value_name = "ID")]
    pub term_id: Option<TermId>,

    /// Multi-category filter entry `CATEGORY=ID[,ID...]`; repeat per category.
    #[arg(long = "all-of", value_name = "CATEGORY=IDS", value_parser = parse_category_terms)]
    pub all_of: Vec<(String, Vec<TermId>)>,

    /// Category whose distinct terms are counted in a cross-category query.
    #[arg(long = "count-category", value_name = "CATEGORY")]
    pub count_category: Option<String>,

    /// Category holding the fixed term in a cross-category query.
    #[arg(long = "filter-category", value_name = "CATEGORY")]
    pub filter_category: Option<String>,
}

fn parse_category_terms(raw: &str) -> Result<(String, Vec<TermId>), String> {
    let (category, ids) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected CATEGORY=IDS, got `{raw}`"))?;
    let category = category.trim();
    if category.is_empty() {
        return Err("category must not be empty".to_string());
    }
    let ids = ids
        .split(',')
        .filter(|id| !id.trim().is_empty())
        .map(|id| {
            id.trim()
                .parse::<TermId>()
                .map_err(|err| format!("invalid term id `{id}`: {err}"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((category.to_string(), ids))
}

impl Command {
    pub fn overrides(&self) -> &StatsOverrides {
        match self {
            Command::Get(args) => &args.fixture.overrides,
            Command::Plan(args) | Command::Warm(args) => &args.overrides,
        }
    }

    pub fn fixture(&self) -> &PathBuf {
        match self {
            Command::Get(args) => &args.fixture.fixture,
            Command::Plan(args) | Command::Warm(args) => &args.fixture,
        }
    }
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub stats: StatsSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct StatsSettings {
    pub enabled: bool,
    pub namespace: String,
    pub ttl: Duration,
    pub regeneration_delay: Duration,
    pub cross_category_cap: usize,
    pub excluded_categories: Vec<String>,
    pub store_capacity: NonZeroUsize,
    pub rounding: BTreeMap<StatisticType, u64>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("EVENT_STATS").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(cli.command.overrides());

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    stats: RawStatsSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &StatsOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(enabled) = overrides.stats_enabled {
            self.stats.enabled = Some(enabled);
        }
        if let Some(namespace) = overrides.namespace.as_ref() {
            self.stats.namespace = Some(namespace.clone());
        }
        if let Some(ttl) = overrides.ttl_seconds {
            self.stats.ttl_seconds = Some(ttl);
        }
        if let Some(cap) = overrides.cross_category_cap {
            self.stats.cross_category_cap = Some(cap);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings { logging, stats } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            stats: build_stats_settings(stats)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_stats_settings(stats: RawStatsSettings) -> Result<StatsSettings, LoadError> {
    let namespace = stats
        .namespace
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
    if namespace.is_empty() {
        return Err(LoadError::invalid("stats.namespace", "must not be empty"));
    }
    if namespace.contains(':') {
        return Err(LoadError::invalid(
            "stats.namespace",
            "must not contain `:`, which separates key segments",
        ));
    }

    let ttl_seconds = stats.ttl_seconds.unwrap_or(DEFAULT_TTL_SECS);
    if ttl_seconds == 0 {
        return Err(LoadError::invalid(
            "stats.ttl_seconds",
            "must be greater than zero",
        ));
    }
    if ttl_seconds > MAX_TTL_SECS {
        return Err(LoadError::invalid(
            "stats.ttl_seconds",
            format!("must not exceed {MAX_TTL_SECS}"),
        ));
    }

    let delay_seconds = stats
        .regeneration_delay_seconds
        .unwrap_or(DEFAULT_REGENERATION_DELAY_SECS);
    if delay_seconds == 0 {
        return Err(LoadError::invalid(
            "stats.regeneration_delay_seconds",
            "must be greater than zero",
        ));
    }

    let store_capacity = NonZeroUsize::new(stats.store_capacity.unwrap_or(DEFAULT_STORE_CAPACITY))
        .ok_or_else(|| LoadError::invalid("stats.store_capacity", "must be greater than zero"))?;

    let mut rounding = BTreeMap::new();
    for (tag, multiple) in stats.rounding.unwrap_or_default() {
        let statistic = StatisticType::from_str(&tag)
            .map_err(|err| LoadError::invalid("stats.rounding", err.to_string()))?;
        if multiple == 0 {
            return Err(LoadError::invalid(
                "stats.rounding",
                format!("multiple for `{tag}` must be greater than zero"),
            ));
        }
        rounding.insert(statistic, multiple);
    }

    let excluded_categories = stats
        .excluded_categories
        .unwrap_or_default()
        .into_iter()
        .map(|category| category.trim().to_string())
        .filter(|category| !category.is_empty())
        .collect();

    Ok(StatsSettings {
        enabled: stats.enabled.unwrap_or(true),
        namespace,
        ttl: Duration::from_secs(ttl_seconds),
        regeneration_delay: Duration::from_secs(delay_seconds),
        cross_category_cap: stats.cross_category_cap.unwrap_or(DEFAULT_CROSS_CATEGORY_CAP),
        excluded_categories,
        store_capacity,
        rounding,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStatsSettings {
    enabled: Option<bool>,
    namespace: Option<String>,
    ttl_seconds: Option<u64>,
    regeneration_delay_seconds: Option<u64>,
    cross_category_cap: Option<usize>,
    excluded_categories: Option<Vec<String>>,
    store_capacity: Option<usize>,
    rounding: Option<BTreeMap<String, u64>>,
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests;
