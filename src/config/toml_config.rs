use crate::core::aggregate::DEFAULT_TOP_N;
use crate::core::ConfigProvider;
use crate::domain::model::Frequency;
use crate::utils::error::{ReportError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub report: ReportSection,
    pub input: InputSection,
    #[serde(default)]
    pub columns: ColumnsSection,
    #[serde(default)]
    pub aggregation: AggregationSection,
    pub output: OutputSection,
    pub charts: Option<ChartsSection>,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSection {
    #[serde(default = "default_title")]
    pub title: String,
    pub subtitle: Option<String>,
}

impl Default for ReportSection {
    fn default() -> Self {
        Self {
            title: default_title(),
            subtitle: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSection {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnsSection {
    /// An empty string disables the time series.
    #[serde(default = "default_date_column")]
    pub date: String,
    #[serde(default = "default_group_column")]
    pub group: String,
    #[serde(default = "default_value_column")]
    pub value: String,
}

impl Default for ColumnsSection {
    fn default() -> Self {
        Self {
            date: default_date_column(),
            group: default_group_column(),
            value: default_value_column(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationSection {
    #[serde(default = "default_frequency")]
    pub frequency: String,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for AggregationSection {
    fn default() -> Self {
        Self {
            frequency: default_frequency(),
            top_n: default_top_n(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    pub path: String,
    pub timeseries_image: Option<String>,
    pub bar_image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartsSection {
    pub font_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_level: Option<String>,
}

fn default_title() -> String {
    "Automated Data Report".to_string()
}

fn default_date_column() -> String {
    "date".to_string()
}

fn default_group_column() -> String {
    "category".to_string()
}

fn default_value_column() -> String {
    "value".to_string()
}

fn default_frequency() -> String {
    "D".to_string()
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ReportError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ReportError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replace `${VAR}` with the variable's value. Unset variables are left
    /// as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ReportError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_path("input.path", &self.input.path)?;
        validation::validate_path("output.path", &self.output.path)?;
        validation::validate_non_empty_string("columns.group", &self.columns.group)?;
        validation::validate_non_empty_string("columns.value", &self.columns.value)?;
        validation::validate_positive_number("aggregation.top_n", self.aggregation.top_n, 1)?;
        validation::validate_frequency("aggregation.frequency", &self.aggregation.frequency)?;

        for (field, name) in [
            ("output.timeseries_image", &self.output.timeseries_image),
            ("output.bar_image", &self.output.bar_image),
        ] {
            if let Some(name) = name {
                validation::validate_path(field, name)?;
            }
        }

        if let Some(level) = self.monitoring.as_ref().and_then(|m| m.log_level.as_deref()) {
            validation::validate_log_level("monitoring.log_level", level)?;
        }

        Ok(())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    /// `[monitoring].log_level`, if set.
    pub fn log_level(&self) -> Option<&str> {
        self.monitoring.as_ref().and_then(|m| m.log_level.as_deref())
    }
}

impl ConfigProvider for TomlConfig {
    fn input_path(&self) -> &str {
        &self.input.path
    }

    fn output_path(&self) -> &str {
        &self.output.path
    }

    fn date_column(&self) -> Option<&str> {
        Some(self.columns.date.as_str()).filter(|c| !c.trim().is_empty())
    }

    fn group_column(&self) -> &str {
        &self.columns.group
    }

    fn value_column(&self) -> &str {
        &self.columns.value
    }

    /// Falls back to daily; `validate` rejects unknown values first.
    fn frequency(&self) -> Frequency {
        self.aggregation.frequency.parse().unwrap_or_default()
    }

    fn top_n(&self) -> usize {
        self.aggregation.top_n
    }

    fn title(&self) -> &str {
        &self.report.title
    }

    fn subtitle(&self) -> Option<&str> {
        self.report.subtitle.as_deref()
    }

    fn timeseries_image(&self) -> &str {
        self.output.timeseries_image.as_deref().unwrap_or("timeseries.png")
    }

    fn bar_image(&self) -> &str {
        self.output.bar_image.as_deref().unwrap_or("bar.png")
    }

    fn font_path(&self) -> Option<&str> {
        self.charts.as_ref().and_then(|c| c.font_path.as_deref())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
