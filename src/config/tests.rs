use super::*;

fn settings(raw: RawSettings) -> Settings {
    Settings::from_raw(raw).expect("valid settings")
}

#[test]
fn defaults_resolve_without_any_source() {
    let settings = settings(RawSettings::default());

    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert!(settings.stats.enabled);
    assert_eq!(settings.stats.namespace, "event_stats");
    assert_eq!(settings.stats.ttl, Duration::from_secs(DEFAULT_TTL_SECS));
    assert_eq!(
        settings.stats.regeneration_delay,
        Duration::from_secs(DEFAULT_REGENERATION_DELAY_SECS)
    );
    assert_eq!(settings.stats.cross_category_cap, DEFAULT_CROSS_CATEGORY_CAP);
    assert_eq!(settings.stats.store_capacity.get(), DEFAULT_STORE_CAPACITY);

    let cache = crate::cache::StatsCacheConfig::default();
    assert_eq!(cache.ttl_seconds, DEFAULT_TTL_SECS);
    assert_eq!(cache.store_capacity, DEFAULT_STORE_CAPACITY);
    assert!(settings.stats.rounding.is_empty());
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("info".to_string());
    raw.stats.ttl_seconds = Some(600);
    raw.stats.namespace = Some("from_file".to_string());

    let overrides = StatsOverrides {
        log_level: Some("debug".to_string()),
        ttl_seconds: Some(120),
        namespace: Some("from_cli".to_string()),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = settings(raw);

    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.stats.ttl, Duration::from_secs(120));
    assert_eq!(settings.stats.namespace, "from_cli");
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    raw.apply_overrides(&StatsOverrides {
        log_json: Some(true),
        ..Default::default()
    });

    assert!(matches!(settings(raw).logging.format, LogFormat::Json));
}

#[test]
fn cache_can_be_disabled_from_cli() {
    let mut raw = RawSettings::default();
    raw.apply_overrides(&StatsOverrides {
        stats_enabled: Some(false),
        ..Default::default()
    });

    assert!(!settings(raw).stats.enabled);
}

#[test]
fn namespace_must_not_contain_separator() {
    let mut raw = RawSettings::default();
    raw.stats.namespace = Some("event:stats".to_string());

    let err = Settings::from_raw(raw).expect_err("colon is rejected");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "stats.namespace",
            ..
        }
    ));
}

#[test]
fn blank_namespace_is_rejected() {
    let mut raw = RawSettings::default();
    raw.stats.namespace = Some("   ".to_string());
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn ttl_bounds_are_enforced() {
    let mut raw = RawSettings::default();
    raw.stats.ttl_seconds = Some(0);
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.stats.ttl_seconds = Some(MAX_TTL_SECS + 1);
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.stats.ttl_seconds = Some(MAX_TTL_SECS);
    assert_eq!(settings(raw).stats.ttl, Duration::from_secs(MAX_TTL_SECS));
}

#[test]
fn zero_regeneration_delay_is_rejected() {
    let mut raw = RawSettings::default();
    raw.stats.regeneration_delay_seconds = Some(0);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn zero_store_capacity_is_rejected() {
    let mut raw = RawSettings::default();
    raw.stats.store_capacity = Some(0);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn rounding_tags_are_parsed() {
    let mut raw = RawSettings::default();
    raw.stats.rounding = Some(BTreeMap::from([("total_items".to_string(), 10)]));

    let settings = settings(raw);
    assert_eq!(settings.stats.rounding.get(&StatisticType::TotalItems), Some(&10));
}

#[test]
fn unknown_rounding_tag_is_rejected() {
    let mut raw = RawSettings::default();
    raw.stats.rounding = Some(BTreeMap::from([("median".to_string(), 10)]));
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.stats.rounding = Some(BTreeMap::from([("total_items".to_string(), 0)]));
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn excluded_categories_are_trimmed() {
    let mut raw = RawSettings::default();
    raw.stats.excluded_categories = Some(vec![" venue ".to_string(), String::new()]);

    assert_eq!(settings(raw).stats.excluded_categories, vec!["venue"]);
}

#[test]
fn invalid_log_level_is_reported() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("loud".to_string());

    let err = Settings::from_raw(raw).expect_err("unknown level");
    assert!(err.to_string().contains("logging.level"));
}

#[test]
fn all_of_argument_parses_category_and_ids() {
    assert_eq!(
        parse_category_terms("venue=1, 2,3").expect("valid"),
        ("venue".to_string(), vec![1, 2, 3])
    );
    assert!(parse_category_terms("venue").is_err());
    assert!(parse_category_terms("=1").is_err());
    assert!(parse_category_terms("venue=x").is_err());
}

#[test]
fn get_command_parses_from_argv() {
    let args = CliArgs::try_parse_from([
        "event-stats",
        "get",
        "--fixture",
        "demos/fixture.toml",
        "--statistic",
        "items_in_multiple_categories",
        "--all-of",
        "topic=1,2",
        "--all-of",
        "venue=7",
        "--stats-ttl-seconds",
        "30",
    ])
    .expect("valid argv");

    let Command::Get(get) = &args.command else {
        panic!("expected get command");
    };
    assert_eq!(get.statistic, StatisticType::ItemsInMultipleCategories);
    assert_eq!(get.all_of.len(), 2);
    assert_eq!(args.command.overrides().ttl_seconds, Some(30));
    assert_eq!(args.command.fixture(), &PathBuf::from("demos/fixture.toml"));
}

#[test]
fn explicit_config_file_sits_between_defaults_and_cli() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("stats.toml");
    std::fs::write(
        &path,
        "[stats]\nnamespace = \"site_stats\"\ncross_category_cap = 2\n[logging]\njson = true\n",
    )
    .expect("write config");

    let args = CliArgs {
        config_file: Some(path),
        command: Command::Plan(FixtureArgs {
            overrides: StatsOverrides {
                cross_category_cap: Some(3),
                ..Default::default()
            },
            fixture: PathBuf::from("unused.toml"),
        }),
    };

    let settings = load(&args).expect("settings load");
    assert_eq!(settings.stats.namespace, "site_stats");
    assert_eq!(settings.stats.cross_category_cap, 3);
    assert!(matches!(settings.logging.format, LogFormat::Json));
}
