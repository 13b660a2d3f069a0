use clap::Parser;
use invoice_etl::config::prepare_input_dir;
use invoice_etl::core::pipeline::pending_files;
use invoice_etl::core::ConfigProvider;
use invoice_etl::utils::{logger, validation::Validate};
use invoice_etl::{EtlEngine, InvoicePipeline, LocalStorage, PdfTextExtractor, TomlConfig};

#[derive(Parser)]
#[command(name = "toml-etl")]
#[command(about = "Invoice extraction driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "invoice-etl.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Dry run - show what would be processed without executing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    logger::init_cli_logger(args.verbose);

    tracing::info!("🚀 Starting TOML-based invoice extraction");
    tracing::info!("📁 Loading configuration from: {}", args.config);

    let config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(e.severity().exit_code());
    }

    tracing::info!("✅ Configuration loaded and validated successfully");

    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No actual processing will occur");
        perform_dry_run(&config).await?;
        return Ok(());
    }

    if !prepare_input_dir(config.input_dir())? {
        println!("📂 Created folder '{}'.", config.input_dir());
        println!("💡 Copy the PDF invoices into it and run again.");
        return Ok(());
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let tools = config.tool_locator().locate();
    let extractor = PdfTextExtractor::new(tools, config.extractor_settings());
    let storage = LocalStorage::new(".".to_string());
    let pipeline = InvoicePipeline::new(storage, config, extractor);

    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(output_path) => {
            tracing::info!("✅ Invoice extraction completed successfully!");
            println!("✅ Invoice extraction completed successfully!");
            println!("📁 Output saved to: {}", output_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ Invoice extraction failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let exit_code = e.severity().exit_code();
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn display_config_summary(config: &TomlConfig, args: &Args) {
    println!("📋 Configuration Summary:");
    println!(
        "  Pipeline: {} v{}",
        config.pipeline.name, config.pipeline.version
    );
    if !config.pipeline.description.is_empty() {
        println!("  Description: {}", config.pipeline.description);
    }
    println!("  Input: {}", config.input_dir());
    println!("  Output: {}/{}", config.output_path(), config.output_file());
    println!("  Formats: {}", config.load.formats.join(", "));
    println!("  Report: {}", config.report_kind());
    if config.report_kind().needs_team() {
        println!("  Team: {} / {}", config.team(), config.employee());
    }
    println!(
        "  Category: {}",
        config.extraction.category.as_deref().unwrap_or("auto")
    );
    println!(
        "  OCR: {} ({}, {} dpi)",
        if config.ocr.enabled { "on" } else { "off" },
        config.ocr.lang,
        config.ocr.dpi
    );
    println!("  Concurrency: {}", config.concurrency());

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

async fn perform_dry_run(config: &TomlConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Dry Run Analysis:");
    println!();

    let tools = config.tool_locator().locate();
    println!("🧰 Tools:");
    println!("  pdftotext: {}", tools.pdftotext.display());
    println!("  pdftoppm: {}", tools.pdftoppm.display());
    match &tools.tesseract {
        Some(path) => println!("  tesseract: {}", path.display()),
        None => println!("  tesseract: not found, scanned PDFs will be skipped"),
    }

    println!();
    println!("📄 Files to process:");
    if !std::path::Path::new(config.input_dir()).is_dir() {
        println!("  Folder '{}' does not exist yet", config.input_dir());
        return Ok(());
    }

    let storage = LocalStorage::new(".".to_string());
    let files = pending_files(&storage, config.input_dir()).await?;
    if files.is_empty() {
        println!("  No PDF files in '{}'", config.input_dir());
    }
    for (i, file) in files.iter().enumerate() {
        println!("  {}. {}", i + 1, file.display());
    }

    println!();
    println!("✅ Dry run completed - configuration is valid");

    Ok(())
}
