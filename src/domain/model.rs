use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Count,
    Mean,
    Std,
    Min,
    Q25,
    Median,
    Q75,
    Max,
}

impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::Count,
        Metric::Mean,
        Metric::Std,
        Metric::Min,
        Metric::Q25,
        Metric::Median,
        Metric::Q75,
        Metric::Max,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Count => "count",
            Metric::Mean => "mean",
            Metric::Std => "std",
            Metric::Min => "min",
            Metric::Q25 => "25%",
            Metric::Median => "median",
            Metric::Q75 => "75%",
            Metric::Max => "max",
        }
    }
}

/// Descriptive statistics over one numeric column.
///
/// An empty value means the column itself was absent; a present column with
/// no valid numbers still reports every metric (count 0, the rest `None`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryStats {
    entries: Vec<(Metric, Option<f64>)>,
}

impl SummaryStats {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn from_entries(entries: Vec<(Metric, Option<f64>)>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.entries
            .iter()
            .find(|(m, _)| *m == metric)
            .and_then(|(_, v)| *v)
    }

    pub fn count(&self) -> usize {
        self.get(Metric::Count).map(|c| c as usize).unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, Option<f64>)> + '_ {
        self.entries.iter().copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupRow {
    pub key: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub sum: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedSummary {
    pub group_column: String,
    pub rows: Vec<GroupRow>,
}

impl GroupedSummary {
    pub fn empty(group_column: &str) -> Self {
        Self {
            group_column: group_column.to_string(),
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn header(&self) -> [String; 4] {
        [
            self.group_column.clone(),
            "count".to_string(),
            "mean".to_string(),
            "sum".to_string(),
        ]
    }
}

/// Calendar bucket width for the time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    /// Start of the bucket containing `ts`. Weeks start on Monday.
    pub fn bucket_start(&self, ts: NaiveDateTime) -> NaiveDateTime {
        let date = ts.date();
        let start = match self {
            Frequency::Daily => date,
            Frequency::Weekly => {
                date - Days::new(u64::from(date.weekday().num_days_from_monday()))
            }
            Frequency::Monthly => date.with_day(1).unwrap_or(date),
        };
        start.and_time(NaiveTime::MIN)
    }

    /// Start of the bucket following the one starting at `start`.
    pub fn next_bucket(&self, start: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            Frequency::Daily => start.checked_add_days(Days::new(1)),
            Frequency::Weekly => start.checked_add_days(Days::new(7)),
            Frequency::Monthly => start.checked_add_months(Months::new(1)),
        }
    }

    /// Tick label format for bucket starts.
    pub fn label_format(&self) -> &'static str {
        match self {
            Frequency::Daily | Frequency::Weekly => "%Y-%m-%d",
            Frequency::Monthly => "%Y-%m",
        }
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "d" | "day" | "daily" => Ok(Frequency::Daily),
            "w" | "week" | "weekly" => Ok(Frequency::Weekly),
            "m" | "ms" | "month" | "monthly" => Ok(Frequency::Monthly),
            other => Err(format!(
                "Unknown frequency '{}'. Use D (daily), W (weekly) or M (monthly)",
                other
            )),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        })
    }
}

/// Dense, gap-free bucketed sums.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    pub frequency: Frequency,
    pub points: Vec<(NaiveDateTime, f64)>,
}

impl TimeSeries {
    pub fn empty(frequency: Frequency) -> Self {
        Self {
            frequency,
            points: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn total(&self) -> f64 {
        self.points.iter().map(|(_, v)| v).sum()
    }

    pub fn value_at(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .iter()
            .find(|(ts, _)| ts.date() == date)
            .map(|(_, v)| *v)
    }
}

/// Everything the aggregation stage derives from the table.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregates {
    pub stats: SummaryStats,
    pub grouped: GroupedSummary,
    pub series: TimeSeries,
}

/// A rendered chart on disk, identified by its logical name
/// (`timeseries_plot`, `bar_plot`).
#[derive(Debug, Clone, PartialEq)]
pub struct ChartArtifact {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ReportContext {
    pub title: String,
    pub subtitle: String,
    pub generated_on: String,
    pub source_info: String,
    pub stats: SummaryStats,
    pub grouped: GroupedSummary,
    pub charts: Vec<ChartArtifact>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_frequency_parse() {
        assert_eq!("D".parse::<Frequency>().unwrap(), Frequency::Daily);
        assert_eq!("weekly".parse::<Frequency>().unwrap(), Frequency::Weekly);
        assert_eq!("M".parse::<Frequency>().unwrap(), Frequency::Monthly);
        assert!("H".parse::<Frequency>().is_err());
    }

    #[test]
    fn test_bucket_start() {
        // 2024-01-03 is a Wednesday.
        let wed = ts(2024, 1, 3, 15);
        assert_eq!(Frequency::Daily.bucket_start(wed), ts(2024, 1, 3, 0));
        assert_eq!(Frequency::Weekly.bucket_start(wed), ts(2024, 1, 1, 0));
        assert_eq!(Frequency::Monthly.bucket_start(wed), ts(2024, 1, 1, 0));
    }

    #[test]
    fn test_next_bucket_crosses_month_end() {
        assert_eq!(
            Frequency::Monthly.next_bucket(ts(2024, 1, 1, 0)),
            Some(ts(2024, 2, 1, 0))
        );
        assert_eq!(
            Frequency::Daily.next_bucket(ts(2024, 2, 29, 0)),
            Some(ts(2024, 3, 1, 0))
        );
    }

    #[test]
    fn test_summary_stats_empty() {
        let stats = SummaryStats::empty();
        assert!(stats.is_empty());
        assert_eq!(stats.count(), 0);
        assert_eq!(stats.get(Metric::Mean), None);
    }
}
