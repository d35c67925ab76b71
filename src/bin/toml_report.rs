use clap::Parser;
use csv_report::config::toml_config::TomlConfig;
use csv_report::core::ConfigProvider;
use csv_report::utils::logger::{self, LogFormat};
use csv_report::utils::validation::Validate;
use csv_report::{LocalStorage, ReportEngine, ReportPipeline};

#[derive(Parser)]
#[command(name = "toml-report")]
#[command(about = "CSV report generator driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "report.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    /// Validate the configuration and print the plan without generating anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML");
            std::process::exit(2);
        }
    };

    logger::init_logger(args.log_format, args.verbose, config.log_level());
    tracing::info!("📁 Loaded configuration from: {}", args.config);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(e.exit_code());
    }

    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - nothing will be written");
        perform_dry_run(&config);
        return;
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
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
        Err(e) => {
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
    }
}

fn display_config_summary(config: &TomlConfig, args: &Args) {
    println!("📋 Configuration Summary:");
    println!("  Title: {}", config.title());
    println!("  Input: {}", config.input_path());
    println!("  Output: {}", config.output_path());
    println!("  Frequency: {}", config.frequency());
    println!("  Top groups: {}", config.top_n());

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

fn perform_dry_run(config: &TomlConfig) {
    println!("🔍 Dry Run Analysis:");
    println!();

    println!("📥 Input:");
    println!("  Path: {}", config.input_path());
    match std::fs::metadata(config.input_path()) {
        Ok(meta) => println!("  Size: {} bytes", meta.len()),
        Err(e) => println!("  ⚠️ Not readable right now: {}", e),
    }

    println!();
    println!("🧮 Aggregation:");
    match config.date_column() {
        Some(date) => println!("  Time series: '{}' bucketed {}", date, config.frequency()),
        None => println!("  Time series: disabled"),
    }
    println!("  Groups: '{}' (top {})", config.group_column(), config.top_n());
    println!("  Values: '{}'", config.value_column());

    let out_dir = std::path::Path::new(config.output_path())
        .parent()
        .map(|p| p.display().to_string())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| ".".to_string());

    println!();
    println!("💾 Output:");
    println!("  Document: {}", config.output_path());
    println!("  Charts: {}/{{{}, {}}}", out_dir, config.timeseries_image(), config.bar_image());
    if let Some(font) = config.font_path() {
        println!("  Chart font: {}", font);
    }

    println!();
    println!("✅ Dry run analysis complete.");
}
