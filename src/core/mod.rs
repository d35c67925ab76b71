pub mod aggregate;
pub mod chart;
pub mod document;
pub mod engine;
pub mod loader;
pub mod pipeline;

pub use crate::domain::model::{Aggregates, ChartArtifact, ReportContext};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
