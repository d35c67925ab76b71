use crate::core::aggregate::DEFAULT_TOP_N;
use crate::core::ConfigProvider;
use crate::domain::model::Frequency;
use crate::utils::error::Result;
use crate::utils::logger::LogFormat;
use crate::utils::validation::{self, Validate};
use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "csv-report")]
#[command(about = "Generate a PDF report with statistics and charts from a CSV file")]
pub struct CliConfig {
    #[arg(long, help = "Input CSV file path")]
    pub input: String,

    #[arg(long, help = "Output PDF file path")]
    pub output: String,

    #[arg(long, default_value = "date", help = "Date column name (empty to skip the time series)")]
    pub date_col: String,

    #[arg(long, default_value = "category", help = "Group / category column name")]
    pub group_col: String,

    #[arg(long, default_value = "value", help = "Numeric value column name")]
    pub value_col: String,

    #[arg(long, default_value = "D", help = "Time series bucket frequency (D, W, M)")]
    pub freq: String,

    #[arg(long, default_value_t = DEFAULT_TOP_N, help = "Number of top groups to show")]
    pub top_n: usize,

    #[arg(long, default_value = "Automated Data Report")]
    pub title: String,

    #[arg(long, help = "TrueType font used for chart text")]
    pub font_path: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU and memory usage after each stage")]
    pub monitor: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

impl ConfigProvider for CliConfig {
    fn input_path(&self) -> &str {
        &self.input
    }

    fn output_path(&self) -> &str {
        &self.output
    }

    fn date_column(&self) -> Option<&str> {
        Some(self.date_col.as_str()).filter(|c| !c.trim().is_empty())
    }

    fn group_column(&self) -> &str {
        &self.group_col
    }

    fn value_column(&self) -> &str {
        &self.value_col
    }

    fn frequency(&self) -> Frequency {
        self.freq.parse().unwrap_or_default()
    }

    fn top_n(&self) -> usize {
        self.top_n
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn font_path(&self) -> Option<&str> {
        self.font_path.as_deref()
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("input", &self.input)?;
        validation::validate_path("output", &self.output)?;
        validation::validate_non_empty_string("group_col", &self.group_col)?;
        validation::validate_non_empty_string("value_col", &self.value_col)?;
        validation::validate_positive_number("top_n", self.top_n, 1)?;
        validation::validate_frequency("freq", &self.freq)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let config = CliConfig::parse_from(["csv-report", "--input", "in.csv", "--output", "out.pdf"]);
        assert_eq!(config.date_column(), Some("date"));
        assert_eq!(config.group_column(), "category");
        assert_eq!(config.value_column(), "value");
        assert_eq!(config.frequency(), Frequency::Daily);
        assert_eq!(config.top_n(), 10);
        assert_eq!(config.title(), "Automated Data Report");
        assert_eq!(config.log_format, LogFormat::Compact);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_overrides() {
        let config = CliConfig::parse_from([
            "csv-report", "--input", "in.csv", "--output", "out.pdf", "--date-col", "", "--freq",
            "M", "--top-n", "3", "--log-format", "json",
        ]);
        assert_eq!(config.date_column(), None);
        assert_eq!(config.frequency(), Frequency::Monthly);
        assert_eq!(config.top_n(), 3);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_cli_validation() {
        let config = CliConfig::parse_from([
            "csv-report", "--input", "in.csv", "--output", "out.pdf", "--top-n", "0",
        ]);
        assert!(config.validate().is_err());

        let config = CliConfig::parse_from([
            "csv-report", "--input", "in.csv", "--output", "out.pdf", "--freq", "Q",
        ]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_requires_input_and_output() {
        assert!(CliConfig::try_parse_from(["csv-report", "--input", "in.csv"]).is_err());
    }
}
