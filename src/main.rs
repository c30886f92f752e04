use clap::Parser;
use matrix_etl::config::endpoint;
use matrix_etl::config::LogFormat;
use matrix_etl::utils::error::{EtlError, ErrorSeverity};
use matrix_etl::utils::{logger, validation::Validate};
use matrix_etl::{build_converter, dispatch, CliConfig, EtlEngine, RunSettings};

#[tokio::main]
async fn main() {
    let config = CliConfig::parse();

    // 初始化日誌
    match config.log_format {
        LogFormat::Compact => logger::init_cli_logger(config.verbose),
        LogFormat::Json => logger::init_json_logger(config.verbose),
    }

    tracing::info!("Starting matrix-etl CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = run(config).await {
        // 記錄詳細錯誤信息
        tracing::error!(
            "❌ ETL process failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
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

async fn run(config: CliConfig) -> Result<(), EtlError> {
    let mut settings = match &config.settings {
        Some(path) => RunSettings::from_file(path)?,
        None => RunSettings::default(),
    };
    config.apply_overrides(&mut settings);
    settings.validate()?;

    let source = endpoint::resolve(&config.source_config, &config.source_key)?;
    let target = endpoint::resolve(&config.target_config, &config.target_key)?;
    let handle = dispatch(source, target)?;

    if config.dry_run {
        println!(
            "🔎 Dry run: {} -> {} would use the {} converter",
            handle.source, handle.target, handle.kind
        );
        return Ok(());
    }

    if config.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let converter = build_converter(handle, &settings);
    let engine = EtlEngine::new_with_monitoring(converter, config.monitor)
        .with_timeout(settings.timeout());

    let cancel = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("🛑 Interrupted, finishing chunks already in progress");
            cancel.cancel();
        }
    });

    let result = engine.run().await?;
    let summary = &result.summary;

    if result.is_success() {
        println!("✅ ETL process completed successfully!");
    } else {
        println!(
            "⚠️ ETL process finished with errors: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    println!(
        "📊 {} chunks, {} succeeded, {} failed, {} rows affected",
        summary.total_chunks, summary.succeeded, summary.failed, result.rows_affected
    );
    if summary.cancelled {
        println!("⏹️ Run was cancelled (timeout or interrupt)");
    }
    for failure in &summary.failures {
        println!("   chunk {}: {}", failure.chunk_index, failure.reason);
    }
    if let Some(path) = &result.artifact {
        println!("📁 Output saved to: {}", path);
    }

    Ok(())
}
