use arknova_stats::app::producers::BgaClient;
use arknova_stats::config::{AnalyzeArgs, MergeArgs, ScrapeArgs};
use arknova_stats::core::card_analysis::CardAnalysis;
use arknova_stats::core::merge::format_timestamp;
use arknova_stats::domain::model::RecordKind;
use arknova_stats::domain::ports::Storage;
use arknova_stats::utils::error::{ErrorSeverity, Result};
use arknova_stats::utils::{logger, validation::Validate};
use arknova_stats::{CliConfig, Command, LocalStorage, MergeEngine, TomlConfig};
use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting arknova-stats");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = run(cli).await {
        tracing::error!(
            "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

async fn run(cli: CliConfig) -> Result<()> {
    let mut config = TomlConfig::load(cli.config.as_deref())?;

    // 應用命令列覆蓋設定
    match &cli.command {
        Command::Merge(args) => args.apply(&mut config),
        Command::Scrape(args) => args.apply(&mut config),
        Command::Analyze(args) => args.apply(&mut config),
    }

    // 驗證配置
    config.validate()?;
    tracing::debug!("Effective configuration: {:?}", config);

    match cli.command {
        Command::Merge(args) => run_merge(&args, &config).await,
        Command::Scrape(args) => run_scrape(&args, &config).await,
        Command::Analyze(args) => run_analyze(&args, &config).await,
    }
}

async fn run_merge(args: &MergeArgs, config: &TomlConfig) -> Result<()> {
    let engine =
        MergeEngine::new(LocalStorage::default()).with_reset_policy(config.merge.reset_policy);

    let reports = engine.run_all(&args.jobs(config)).await?;
    for report in &reports {
        println!("{}", report);
    }

    if reports.iter().any(|r| r.added() > 0) {
        println!("\nDone! Don't forget to commit and push the updated data.");
    } else {
        println!("\nNo new data to add.");
    }
    Ok(())
}

async fn run_scrape(args: &ScrapeArgs, config: &TomlConfig) -> Result<()> {
    let cookies = config.cookies_path()?;

    let storage = LocalStorage::default();
    tracing::info!("Using cookie-based authentication from {}", cookies);
    let client = BgaClient::from_cookie_file(&storage, cookies, config.scrape_options()).await?;

    let output = args.output_path(config);
    let engine = MergeEngine::new(storage);
    let count = engine.stage(&client, &output).await?;

    if count == 0 {
        println!("No games found, {} left as it was", output);
    } else {
        println!("✅ Saved {} {} to {}", count, RecordKind::Games, output);
    }
    Ok(())
}

async fn run_analyze(args: &AnalyzeArgs, config: &TomlConfig) -> Result<()> {
    let engine = MergeEngine::new(LocalStorage::default());
    let store = engine.store();

    let logs_path = args.logs_path(config);
    let logs = store.load_collection(RecordKind::Logs, &logs_path).await?;
    let analysis = CardAnalysis::from_logs(&logs.records)?;
    tracing::info!(
        "Counted {} card plays across {} games",
        analysis.total_plays(),
        analysis.games.len()
    );

    let ranking = config.ranking_options();
    let report = analysis.report(&ranking, format_timestamp(chrono::Utc::now()));
    println!("{}", report.render_summary(5, ranking.top_n));

    let output = args.output_path(config);
    store.write_json(&output, &serde_json::to_value(&report)?).await?;
    println!("Full analysis saved to {}", output);

    if let Some(csv_path) = &args.csv {
        let mut buf = Vec::new();
        report.write_csv(&mut buf)?;
        store.storage().write_file(csv_path, &buf).await?;
        println!("Ranking CSV saved to {}", csv_path);
    }
    Ok(())
}
