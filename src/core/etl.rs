use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use tracing::info;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitoring: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitoring),
        }
    }

    /// Runs extract, transform and load in turn and returns the path of the workbook.
    pub async fn run(&self) -> Result<String> {
        info!("🚀 Starting invoice extraction");
        self.monitor.log_stats("Start");

        // Extract
        let documents = self.pipeline.extract().await?;
        info!("📄 Read {} document(s)", documents.len());
        self.monitor.log_stats("Extract");

        // Transform
        let result = self.pipeline.transform(documents).await?;
        info!(
            "🔎 Parsed {} invoice(s) into {} row(s)",
            result.invoices.len(),
            result.report.rows.len()
        );
        result.summary.log();
        self.monitor.log_stats("Transform");

        // Load
        let output_path = self.pipeline.load(result).await?;
        info!("📝 Output saved to: {}", output_path);
        self.monitor.log_stats("Load");
        self.monitor.log_final_stats();

        Ok(output_path)
    }
}
