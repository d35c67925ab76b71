use crate::domain::model::{Aggregates, ChartArtifact, Frequency};
use crate::domain::table::Table;
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(
        &self,
        path: &str,
    ) -> impl std::future::Future<Output = std::io::Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = std::io::Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn input_path(&self) -> &str;
    fn output_path(&self) -> &str;
    fn date_column(&self) -> Option<&str>;
    fn group_column(&self) -> &str;
    fn value_column(&self) -> &str;
    fn frequency(&self) -> Frequency;
    fn top_n(&self) -> usize;

    fn title(&self) -> &str {
        "Automated Data Report"
    }

    /// Defaults to "Source: <input file name>".
    fn subtitle(&self) -> Option<&str> {
        None
    }

    fn timeseries_image(&self) -> &str {
        "timeseries.png"
    }

    fn bar_image(&self) -> &str {
        "bar.png"
    }

    fn font_path(&self) -> Option<&str> {
        None
    }
}

/// Load → compute → render → assemble. Each stage consumes the full output
/// of the previous one.
#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Table>;
    async fn transform(&self, table: Table) -> Result<Aggregates>;
    async fn render(&self, aggregates: &Aggregates) -> Result<Vec<ChartArtifact>>;
    async fn load(&self, aggregates: Aggregates, charts: Vec<ChartArtifact>) -> Result<String>;
}
