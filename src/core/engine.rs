use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct ReportEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> ReportEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    /// Run load → aggregate → charts → document. Returns the document path.
    pub async fn run(&self) -> Result<String> {
        tracing::info!("🚀 Starting report generation");
        self.monitor.log_stats("Start");

        tracing::info!("📥 Loading data...");
        let table = self.pipeline.extract().await?;
        tracing::info!(
            "Loaded {} rows x {} columns",
            table.len(),
            table.columns().len()
        );
        self.monitor.log_stats("Load");

        tracing::info!("🧮 Computing aggregates...");
        let aggregates = self.pipeline.transform(table).await?;
        tracing::info!(
            "Summarised {} values into {} groups and {} time buckets",
            aggregates.stats.count(),
            aggregates.grouped.len(),
            aggregates.series.len()
        );
        self.monitor.log_stats("Aggregate");

        tracing::info!("📈 Rendering charts...");
        let charts = self.pipeline.render(&aggregates).await?;
        for chart in &charts {
            tracing::debug!("Chart '{}' at {}", chart.name, chart.path.display());
        }
        self.monitor.log_stats("Charts");

        tracing::info!("📄 Building document...");
        let output_path = self.pipeline.load(aggregates, charts).await?;
        tracing::info!("Report saved to: {}", output_path);
        self.monitor.log_final_stats();

        Ok(output_path)
    }
}
