use crate::core::aggregate::{aggregate, ColumnSelection};
use crate::core::chart;
use crate::core::document;
use crate::core::loader::parse_table;
use crate::core::{ConfigProvider, Pipeline, Storage};
use crate::domain::model::{Aggregates, ChartArtifact, ReportContext};
use crate::domain::table::Table;
use crate::utils::error::{LoadError, RenderError, Result};
use std::path::{Path, PathBuf};

pub const TIMESERIES_CHART: &str = "timeseries_plot";
pub const BAR_CHART: &str = "bar_plot";

/// CSV in, PDF out, through a [`Storage`] backend.
pub struct ReportPipeline<S: Storage, C: ConfigProvider> {
    pub(crate) storage: S,
    pub(crate) config: C,
}

impl<S: Storage, C: ConfigProvider> ReportPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self { storage, config }
    }

    /// Charts are written next to the output document.
    fn chart_path(&self, file_name: &str) -> PathBuf {
        Path::new(self.config.output_path())
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(file_name)
    }

    fn subtitle(&self) -> String {
        match self.config.subtitle() {
            Some(subtitle) => subtitle.to_string(),
            None => {
                let input = Path::new(self.config.input_path());
                let name = input
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| self.config.input_path().to_string());
                format!("Source: {}", name)
            }
        }
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        self.storage
            .write_file(path, data)
            .await
            .map_err(|source| RenderError::Unwritable {
                path: path.to_string(),
                source,
            })?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for ReportPipeline<S, C> {
    async fn extract(&self) -> Result<Table> {
        let input = self.config.input_path();
        tracing::debug!("Reading input from: {}", input);

        let bytes = self
            .storage
            .read_file(input)
            .await
            .map_err(|source| LoadError::Unreadable {
                path: input.to_string(),
                source,
            })?;
        tracing::debug!("Read {} bytes", bytes.len());

        Ok(parse_table(&bytes, self.config.date_column(), input)?)
    }

    async fn transform(&self, table: Table) -> Result<Aggregates> {
        let columns = ColumnSelection {
            date: self.config.date_column(),
            group: self.config.group_column(),
            value: self.config.value_column(),
        };
        Ok(aggregate(
            &table,
            columns,
            self.config.frequency(),
            self.config.top_n(),
        ))
    }

    async fn render(&self, aggregates: &Aggregates) -> Result<Vec<ChartArtifact>> {
        if !chart::install_font(self.config.font_path()) {
            tracing::warn!("No chart font available, charts will be drawn without text");
        }

        let series = aggregates.series.clone();
        let series_title = format!("Timeseries ({})", self.config.value_column());
        let timeseries =
            tokio::task::spawn_blocking(move || chart::render_timeseries(&series, &series_title));

        let grouped = aggregates.grouped.clone();
        let bar = tokio::task::spawn_blocking(move || chart::render_bar(&grouped, "Top groups by sum"));

        let (timeseries_png, bar_png) = tokio::try_join!(timeseries, bar)?;

        let mut charts = Vec::with_capacity(2);
        for (name, file_name, png) in [
            (TIMESERIES_CHART, self.config.timeseries_image(), timeseries_png?),
            (BAR_CHART, self.config.bar_image(), bar_png?),
        ] {
            let path = self.chart_path(file_name);
            tracing::debug!("Writing {} ({} bytes) to {}", name, png.len(), path.display());
            self.write(&path.to_string_lossy(), &png).await?;
            charts.push(ChartArtifact {
                name: name.to_string(),
                path,
            });
        }
        Ok(charts)
    }

    async fn load(&self, aggregates: Aggregates, charts: Vec<ChartArtifact>) -> Result<String> {
        let output = self.config.output_path();

        let mut images = Vec::with_capacity(charts.len());
        for artifact in &charts {
            match self.storage.read_file(&artifact.path.to_string_lossy()).await {
                Ok(bytes) => images.extend(document::decode_chart(&artifact.name, &bytes)),
                Err(e) => tracing::warn!(
                    "Skipping chart '{}': {} ({})",
                    artifact.name,
                    artifact.path.display(),
                    e
                ),
            }
        }

        let context = ReportContext {
            title: self.config.title().to_string(),
            subtitle: self.subtitle(),
            generated_on: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            source_info: self.config.input_path().to_string(),
            stats: aggregates.stats,
            grouped: aggregates.grouped,
            charts,
        };

        let pdf = document::build(&context, &images)?;
        tracing::debug!("Writing PDF ({} bytes) to {}", pdf.len(), output);
        self.write(output, &pdf).await?;

        Ok(output.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Frequency;
    use crate::utils::error::ReportError;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        async fn put(&self, path: &str, data: &[u8]) {
            self.files.lock().await.insert(path.to_string(), data.to_vec());
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            self.files.lock().await.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> std::io::Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                )
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> std::io::Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct MockConfig {
        input_path: String,
        output_path: String,
        subtitle: Option<String>,
    }

    impl MockConfig {
        fn new() -> Self {
            Self {
                input_path: "data/sales.csv".to_string(),
                output_path: "out/report.pdf".to_string(),
                subtitle: None,
            }
        }
    }

    impl ConfigProvider for MockConfig {
        fn input_path(&self) -> &str {
            &self.input_path
        }

        fn output_path(&self) -> &str {
            &self.output_path
        }

        fn date_column(&self) -> Option<&str> {
            Some("date")
        }

        fn group_column(&self) -> &str {
            "category"
        }

        fn value_column(&self) -> &str {
            "value"
        }

        fn frequency(&self) -> Frequency {
            Frequency::Daily
        }

        fn top_n(&self) -> usize {
            10
        }

        fn subtitle(&self) -> Option<&str> {
            self.subtitle.as_deref()
        }
    }

    const CSV: &[u8] = b"date,category,value\n2024-01-01,A,10\n2024-01-01,B,5\n2024-01-02,A,3\n";

    #[tokio::test]
    async fn test_extract_and_transform() {
        let storage = MockStorage::default();
        storage.put("data/sales.csv", CSV).await;
        let pipeline = ReportPipeline::new(storage, MockConfig::new());

        let table = pipeline.extract().await.unwrap();
        assert_eq!(table.len(), 3);

        let aggregates = pipeline.transform(table).await.unwrap();
        assert_eq!(aggregates.series.points.len(), 2);
        assert_eq!(aggregates.grouped.rows[0].key, "A");
        assert_eq!(aggregates.grouped.rows[0].sum, 13.0);
    }

    #[tokio::test]
    async fn test_extract_missing_input_is_load_error() {
        let pipeline = ReportPipeline::new(MockStorage::default(), MockConfig::new());
        let err = pipeline.extract().await.unwrap_err();
        assert!(matches!(err, ReportError::Load(LoadError::Unreadable { .. })));
    }

    #[tokio::test]
    async fn test_render_writes_charts_next_to_output() {
        let storage = MockStorage::default();
        storage.put("data/sales.csv", CSV).await;
        let pipeline = ReportPipeline::new(storage.clone(), MockConfig::new());

        let table = pipeline.extract().await.unwrap();
        let aggregates = pipeline.transform(table).await.unwrap();
        let charts = pipeline.render(&aggregates).await.unwrap();

        let names: Vec<_> = charts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec![TIMESERIES_CHART, BAR_CHART]);
        assert_eq!(charts[0].path, PathBuf::from("out/timeseries.png"));
        assert_eq!(charts[1].path, PathBuf::from("out/bar.png"));

        let png = storage.get_file("out/timeseries.png").await.unwrap();
        assert!(png.starts_with(b"\x89PNG"));
        assert!(storage.get_file("out/bar.png").await.is_some());
    }

    #[tokio::test]
    async fn test_load_writes_pdf_and_skips_missing_charts() {
        let storage = MockStorage::default();
        storage.put("data/sales.csv", CSV).await;
        let pipeline = ReportPipeline::new(storage.clone(), MockConfig::new());

        let table = pipeline.extract().await.unwrap();
        let aggregates = pipeline.transform(table).await.unwrap();
        let charts = vec![ChartArtifact {
            name: BAR_CHART.to_string(),
            path: PathBuf::from("out/never-written.png"),
        }];

        let output = pipeline.load(aggregates, charts).await.unwrap();
        assert_eq!(output, "out/report.pdf");
        let pdf = storage.get_file("out/report.pdf").await.unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_load_skips_undecodable_chart() {
        let storage = MockStorage::default();
        storage.put("data/sales.csv", CSV).await;
        storage.put("out/bar.png", b"not a png").await;
        let pipeline = ReportPipeline::new(storage.clone(), MockConfig::new());

        let table = pipeline.extract().await.unwrap();
        let aggregates = pipeline.transform(table).await.unwrap();
        let charts = vec![ChartArtifact {
            name: BAR_CHART.to_string(),
            path: PathBuf::from("out/bar.png"),
        }];

        pipeline.load(aggregates, charts).await.unwrap();
        assert!(storage.get_file("out/report.pdf").await.is_some());
    }

    /// Reads succeed, every write fails.
    struct ReadOnlyStorage(MockStorage);

    impl Storage for ReadOnlyStorage {
        async fn read_file(&self, path: &str) -> std::io::Result<Vec<u8>> {
            self.0.read_file(path).await
        }

        async fn write_file(&self, _path: &str, _data: &[u8]) -> std::io::Result<()> {
            Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            ))
        }
    }

    #[tokio::test]
    async fn test_load_unwritable_output_is_render_error() {
        let inner = MockStorage::default();
        inner.put("data/sales.csv", CSV).await;
        let pipeline = ReportPipeline::new(ReadOnlyStorage(inner), MockConfig::new());

        let table = pipeline.extract().await.unwrap();
        let aggregates = pipeline.transform(table).await.unwrap();
        let err = pipeline.load(aggregates, vec![]).await.unwrap_err();

        match err {
            ReportError::Render(RenderError::Unwritable { path, .. }) => {
                assert_eq!(path, "out/report.pdf")
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_default_subtitle_uses_file_name() {
        let pipeline = ReportPipeline::new(MockStorage::default(), MockConfig::new());
        assert_eq!(pipeline.subtitle(), "Source: sales.csv");

        let mut config = MockConfig::new();
        config.subtitle = Some("Q1 figures".to_string());
        let pipeline = ReportPipeline::new(MockStorage::default(), config);
        assert_eq!(pipeline.subtitle(), "Q1 figures");
    }

    #[test]
    fn test_chart_path_without_parent() {
        let mut config = MockConfig::new();
        config.output_path = "report.pdf".to_string();
        let pipeline = ReportPipeline::new(MockStorage::default(), config);
        assert_eq!(pipeline.chart_path("bar.png"), PathBuf::from("bar.png"));
    }
}
