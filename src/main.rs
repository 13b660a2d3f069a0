use clap::Parser;
use invoice_etl::config::prepare_input_dir;
use invoice_etl::utils::{logger, validation::Validate};
use invoice_etl::{CliConfig, EtlEngine, EtlError, InvoicePipeline, LocalStorage, PdfTextExtractor};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting invoice-etl");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(e.severity().exit_code());
    }

    match prepare_input_dir(&config.input_dir) {
        Ok(true) => {}
        Ok(false) => {
            println!("📂 Created folder '{}'.", config.input_dir);
            println!("💡 Copy the PDF invoices into it and run again.");
            return Ok(());
        }
        Err(e) => {
            exit_with(e);
            return Ok(());
        }
    }

    let monitor_enabled = config.monitor;
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
        Err(e) => exit_with(e),
    }

    Ok(())
}

fn exit_with(e: EtlError) {
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
