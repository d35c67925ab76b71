pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{cli::LocalStorage, toml_config::TomlConfig};

pub use core::{engine::ReportEngine, pipeline::ReportPipeline};
pub use domain::model::{Aggregates, ChartArtifact, Frequency, ReportContext};
pub use utils::error::{LoadError, RenderError, ReportError, Result};
