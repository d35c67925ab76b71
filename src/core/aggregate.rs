// Aggregations over a loaded table.
//
// None of these fail: absent columns and unparseable values degrade to empty
// or partial results.
use crate::domain::model::{
    Aggregates, Frequency, GroupRow, GroupedSummary, Metric, SummaryStats, TimeSeries,
};
use crate::domain::table::{Table, Value};
use std::collections::{BTreeMap, HashMap};

pub const DEFAULT_TOP_N: usize = 10;

/// Column names the aggregation stage reads.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSelection<'a> {
    pub date: Option<&'a str>,
    pub group: &'a str,
    pub value: &'a str,
}

pub fn aggregate(
    table: &Table,
    columns: ColumnSelection<'_>,
    frequency: Frequency,
    top_n: usize,
) -> Aggregates {
    let stats = summary_stats(table, columns.value);
    let grouped = group_summary(table, columns.group, columns.value, top_n);
    let series = match columns.date {
        Some(date) => timeseries_aggregate(table, date, columns.value, frequency),
        None => TimeSeries::empty(frequency),
    };
    Aggregates {
        stats,
        grouped,
        series,
    }
}

/// Linear-interpolation quantile of already sorted values.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

pub fn summary_stats(table: &Table, value_column: &str) -> SummaryStats {
    let Some(column) = table.column(value_column) else {
        tracing::warn!("Value column '{}' not found, no summary statistics", value_column);
        return SummaryStats::empty();
    };

    let mut values: Vec<f64> = column.numbers().into_iter().flatten().collect();
    let n = values.len();
    if n == 0 {
        let entries = Metric::ALL
            .iter()
            .map(|m| (*m, if *m == Metric::Count { Some(0.0) } else { None }))
            .collect();
        return SummaryStats::from_entries(entries);
    }

    values.sort_by(f64::total_cmp);
    let mean = values.iter().sum::<f64>() / n as f64;
    // Sample standard deviation (n - 1); undefined for a single value.
    let std = (n > 1).then(|| {
        let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (n - 1) as f64).sqrt()
    });

    SummaryStats::from_entries(vec![
        (Metric::Count, Some(n as f64)),
        (Metric::Mean, Some(mean)),
        (Metric::Std, std),
        (Metric::Min, Some(values[0])),
        (Metric::Q25, Some(quantile(&values, 0.25))),
        (Metric::Median, Some(quantile(&values, 0.5))),
        (Metric::Q75, Some(quantile(&values, 0.75))),
        (Metric::Max, Some(values[n - 1])),
    ])
}

pub fn group_summary(
    table: &Table,
    group_column: &str,
    value_column: &str,
    top_n: usize,
) -> GroupedSummary {
    let Some(groups) = table.column(group_column) else {
        tracing::warn!("Group column '{}' not found, skipping group summary", group_column);
        return GroupedSummary::empty(group_column);
    };
    let values = table
        .column(value_column)
        .map(|c| c.numbers())
        .unwrap_or_else(|| vec![None; table.len()]);

    struct Acc {
        count: usize,
        valid: usize,
        sum: f64,
    }

    // Insertion order doubles as the tie-break order.
    let mut order: Vec<String> = Vec::new();
    let mut accs: HashMap<String, Acc> = HashMap::new();
    for (key, value) in groups.values().zip(values) {
        if matches!(key, Value::Missing) {
            continue;
        }
        let key = key.to_string();
        let acc = accs.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            Acc {
                count: 0,
                valid: 0,
                sum: 0.0,
            }
        });
        acc.count += 1;
        if let Some(v) = value {
            acc.valid += 1;
            acc.sum += v;
        }
    }

    let mut rows: Vec<GroupRow> = order
        .into_iter()
        .filter_map(|key| {
            let acc = accs.remove(&key)?;
            Some(GroupRow {
                count: acc.count,
                mean: (acc.valid > 0).then(|| acc.sum / acc.valid as f64),
                sum: acc.sum,
                key,
            })
        })
        .collect();

    // `sort_by` is stable, so equal sums keep first-seen order.
    rows.sort_by(|a, b| b.sum.total_cmp(&a.sum));
    rows.truncate(top_n);

    GroupedSummary {
        group_column: group_column.to_string(),
        rows,
    }
}

pub fn timeseries_aggregate(
    table: &Table,
    date_column: &str,
    value_column: &str,
    frequency: Frequency,
) -> TimeSeries {
    let Some(dates) = table.column(date_column) else {
        tracing::warn!("Date column '{}' not found, no time series", date_column);
        return TimeSeries::empty(frequency);
    };
    let values = table
        .column(value_column)
        .map(|c| c.numbers())
        .unwrap_or_else(|| vec![None; table.len()]);

    let mut buckets: BTreeMap<_, f64> = BTreeMap::new();
    for (ts, value) in dates.datetimes().into_iter().zip(values) {
        let Some(ts) = ts else { continue };
        *buckets.entry(frequency.bucket_start(ts)).or_insert(0.0) += value.unwrap_or(0.0);
    }

    let (Some((&first, _)), Some((&last, _))) = (buckets.first_key_value(), buckets.last_key_value())
    else {
        tracing::warn!("No parseable dates in column '{}'", date_column);
        return TimeSeries::empty(frequency);
    };

    let mut points = Vec::new();
    let mut cursor = Some(first);
    while let Some(start) = cursor.filter(|s| *s <= last) {
        points.push((start, buckets.get(&start).copied().unwrap_or(0.0)));
        cursor = frequency.next_bucket(start);
    }

    TimeSeries { frequency, points }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loader::parse_table;
    use chrono::NaiveDate;

    fn table(csv: &str) -> Table {
        parse_table(csv.as_bytes(), Some("date"), "test.csv").unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const SAMPLE: &str = "date,category,value\n\
                          2024-01-01,A,10\n\
                          2024-01-01,B,5\n\
                          2024-01-02,A,3\n";

    #[test]
    fn test_worked_example_daily_series() {
        let series = timeseries_aggregate(&table(SAMPLE), "date", "value", Frequency::Daily);
        assert_eq!(series.len(), 2);
        assert_eq!(series.value_at(day(2024, 1, 1)), Some(15.0));
        assert_eq!(series.value_at(day(2024, 1, 2)), Some(3.0));
    }

    #[test]
    fn test_worked_example_groups() {
        let grouped = group_summary(&table(SAMPLE), "category", "value", DEFAULT_TOP_N);
        assert_eq!(
            grouped.rows,
            vec![
                GroupRow {
                    key: "A".into(),
                    count: 2,
                    mean: Some(6.5),
                    sum: 13.0
                },
                GroupRow {
                    key: "B".into(),
                    count: 1,
                    mean: Some(5.0),
                    sum: 5.0
                },
            ]
        );
        assert_eq!(grouped.header()[0], "category");
    }

    #[test]
    fn test_summary_stats_ordering() {
        let t = table("value\n4\n1\n3\n2\nx\n10\n");
        let stats = summary_stats(&t, "value");
        assert_eq!(stats.count(), 5);
        assert!(stats.count() <= t.len());
        let min = stats.get(Metric::Min).unwrap();
        let q25 = stats.get(Metric::Q25).unwrap();
        let median = stats.get(Metric::Median).unwrap();
        let q75 = stats.get(Metric::Q75).unwrap();
        let max = stats.get(Metric::Max).unwrap();
        assert!(min <= q25 && q25 <= median && median <= q75 && q75 <= max);
        assert_eq!(min, 1.0);
        assert_eq!(q25, 2.0);
        assert_eq!(median, 3.0);
        assert_eq!(q75, 4.0);
        assert_eq!(max, 10.0);
        assert_eq!(stats.get(Metric::Mean), Some(4.0));
    }

    #[test]
    fn test_quantile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&sorted, 0.25), 1.75);
        assert_eq!(quantile(&sorted, 0.5), 2.5);
        assert_eq!(quantile(&sorted, 0.75), 3.25);
    }

    #[test]
    fn test_sample_standard_deviation() {
        let stats = summary_stats(&table("value\n2\n4\n4\n4\n5\n5\n7\n9\n"), "value");
        let std = stats.get(Metric::Std).unwrap();
        assert!((std - 2.138089935).abs() < 1e-6);

        let single = summary_stats(&table("value\n3\n"), "value");
        assert_eq!(single.get(Metric::Std), None);
        assert_eq!(single.get(Metric::Mean), Some(3.0));
    }

    #[test]
    fn test_summary_stats_all_invalid() {
        let stats = summary_stats(&table("value\nfoo\nbar\n"), "value");
        assert!(!stats.is_empty());
        assert_eq!(stats.count(), 0);
        for metric in Metric::ALL.iter().skip(1) {
            assert_eq!(stats.get(*metric), None, "{} should be absent", metric.label());
        }
    }

    #[test]
    fn test_summary_stats_missing_column() {
        let stats = summary_stats(&table(SAMPLE), "price");
        assert!(stats.is_empty());
    }

    #[test]
    fn test_group_counts_rows_with_invalid_values() {
        let t = table("category,value\nA,1\nA,oops\nB,\n");
        let grouped = group_summary(&t, "category", "value", 10);
        let a = &grouped.rows[0];
        assert_eq!((a.key.as_str(), a.count, a.mean, a.sum), ("A", 2, Some(1.0), 1.0));
        let b = &grouped.rows[1];
        assert_eq!((b.key.as_str(), b.count, b.mean, b.sum), ("B", 1, None, 0.0));
    }

    #[test]
    fn test_group_ties_keep_first_seen_order() {
        let t = table("category,value\nZ,5\nA,5\nM,7\nA,0\n");
        let grouped = group_summary(&t, "category", "value", 10);
        let keys: Vec<_> = grouped.rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["M", "Z", "A"]);
        assert!(grouped.rows.windows(2).all(|w| w[0].sum >= w[1].sum));
    }

    #[test]
    fn test_group_top_n_truncates() {
        let t = table("category,value\na,1\nb,2\nc,3\nd,4\n");
        let grouped = group_summary(&t, "category", "value", 2);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped.rows[0].key, "d");
        assert_eq!(grouped.rows[1].key, "c");
    }

    #[test]
    fn test_group_missing_column_is_empty() {
        let grouped = group_summary(&table(SAMPLE), "region", "value", 10);
        assert!(grouped.is_empty());
        assert_eq!(grouped.group_column, "region");
    }

    #[test]
    fn test_group_numeric_keys_print_without_fraction() {
        let t = table("category,value\n1,2\n2,3\n");
        let grouped = group_summary(&t, "category", "value", 10);
        assert_eq!(grouped.rows[0].key, "2");
    }

    #[test]
    fn test_timeseries_fills_gaps_and_preserves_total() {
        let t = table("date,value\n2024-01-01,1\n2024-01-05,2\n2024-01-05,bad\n2024-01-03,4\n");
        let series = timeseries_aggregate(&t, "date", "value", Frequency::Daily);
        assert_eq!(series.len(), 5);
        assert_eq!(series.value_at(day(2024, 1, 2)), Some(0.0));
        assert_eq!(series.value_at(day(2024, 1, 4)), Some(0.0));
        assert!(series.points.iter().all(|(_, v)| *v >= 0.0));
        assert!(series.points.windows(2).all(|w| w[0].0 < w[1].0));
        assert_eq!(series.total(), 7.0);
    }

    #[test]
    fn test_timeseries_weekly_and_monthly() {
        let t = table("date,value\n2024-01-03,1\n2024-01-08,2\n2024-03-15,4\n");
        let weekly = timeseries_aggregate(&t, "date", "value", Frequency::Weekly);
        assert_eq!(weekly.points[0].0.date(), day(2024, 1, 1));
        assert_eq!(weekly.points[1], (day(2024, 1, 8).and_hms_opt(0, 0, 0).unwrap(), 2.0));
        assert_eq!(weekly.total(), 7.0);

        let monthly = timeseries_aggregate(&t, "date", "value", Frequency::Monthly);
        let months: Vec<_> = monthly.points.iter().map(|(ts, v)| (ts.date(), *v)).collect();
        assert_eq!(
            months,
            vec![(day(2024, 1, 1), 3.0), (day(2024, 2, 1), 0.0), (day(2024, 3, 1), 4.0)]
        );
    }

    #[test]
    fn test_timeseries_accepts_fractional_seconds() {
        let t = table("date,category,value\n2024-01-01 10:00:00.250,A,10\n2024-01-02 11:30:00.000,A,3\n");
        let series = timeseries_aggregate(&t, "date", "value", Frequency::Daily);
        assert_eq!(series.len(), 2);
        assert_eq!(series.value_at(day(2024, 1, 1)), Some(10.0));
        assert_eq!(series.total(), 13.0);
    }

    #[test]
    fn test_timeseries_accepts_year_month_dates() {
        let t = table("date,value\n2024-01,5\n2024-03,2\n");
        let monthly = timeseries_aggregate(&t, "date", "value", Frequency::Monthly);
        assert_eq!(monthly.len(), 3);
        assert_eq!(monthly.value_at(day(2024, 1, 1)), Some(5.0));
        assert_eq!(monthly.value_at(day(2024, 2, 1)), Some(0.0));
    }

    #[test]
    fn test_timeseries_missing_or_unparseable_dates() {
        let t = table(SAMPLE);
        assert!(timeseries_aggregate(&t, "when", "value", Frequency::Daily).is_empty());

        let garbage = table("date,value\nsoon,1\nlater,2\n");
        assert!(timeseries_aggregate(&garbage, "date", "value", Frequency::Daily).is_empty());
    }

    #[test]
    fn test_aggregate_runs_all_three() {
        let columns = ColumnSelection {
            date: Some("date"),
            group: "category",
            value: "value",
        };
        let result = aggregate(&table(SAMPLE), columns, Frequency::Daily, 10);
        assert_eq!(result.stats.count(), 3);
        assert_eq!(result.grouped.len(), 2);
        assert_eq!(result.series.total(), 18.0);
    }
}
