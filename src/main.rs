use clap::Parser;
use csv_report::utils::error::ReportError;
use csv_report::utils::{logger, validation::Validate};
use csv_report::{CliConfig, LocalStorage, ReportEngine, ReportPipeline};

fn fail(e: &ReportError) -> ! {
    tracing::error!(
        "❌ Report generation failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
    std::process::exit(e.exit_code());
}

#[tokio::main]
async fn main() {
    let config = CliConfig::parse();

    logger::init_logger(config.log_format, config.verbose, None);

    tracing::info!("Starting csv-report");
    tracing::debug!("CLI config: {:?}", config);

    if let Err(e) = config.validate() {
        fail(&e);
    }

    let monitor_enabled = config.monitor;
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let storage = LocalStorage::default();
    let pipeline = ReportPipeline::new(storage, config);
    let engine = ReportEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(output_path) => {
            tracing::info!("✅ Report generated successfully");
            println!("✅ Report written to: {}", output_path);
        }
        Err(e) => fail(&e),
    }
}
