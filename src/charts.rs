//! Chart-type suggestion by column-name sniffing.
//!
//! Purely advisory: the front end may ignore it. Priority order is
//! geospatial, then time series, then categorical bar.

use crate::warehouse::QueryRows;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartSuggestion {
    Map,
    TimeSeries,
    Bar,
}

const BAR_ROW_LIMIT: usize = 50;

pub fn suggest_chart(rows: &QueryRows) -> Option<ChartSuggestion> {
    if rows.is_empty() {
        return None;
    }

    let lowered: Vec<String> = rows.columns.iter().map(|c| c.to_lowercase()).collect();

    let has_lat = lowered.iter().any(|c| c.contains("lat"));
    let has_lon = lowered.iter().any(|c| c.contains("lon") || c.contains("lng"));
    if has_lat && has_lon {
        return Some(ChartSuggestion::Map);
    }

    let numeric_columns = count_numeric_columns(rows, &lowered);

    let has_date = lowered
        .iter()
        .any(|c| c.contains("date") || c.contains("time") || c.contains("day"));
    if has_date && numeric_columns > 0 {
        return Some(ChartSuggestion::TimeSeries);
    }

    let has_label = rows
        .rows
        .first()
        .map(|row| row.iter().any(|v| v.is_string()))
        .unwrap_or(false);
    if has_label && numeric_columns > 0 && rows.row_count() <= BAR_ROW_LIMIT {
        return Some(ChartSuggestion::Bar);
    }

    None
}

/// Numeric columns, judged by the first row; lat/lon never count as metrics.
fn count_numeric_columns(rows: &QueryRows, lowered: &[String]) -> usize {
    let first = match rows.rows.first() {
        Some(row) => row,
        None => return 0,
    };
    first
        .iter()
        .zip(lowered)
        .filter(|(value, name)| {
            value.is_number() && !name.contains("lat") && !name.contains("lon")
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lat_lon_suggests_map() {
        let rows = QueryRows::new(
            vec!["lat".into(), "lon".into(), "risk_score".into()],
            vec![vec![json!(37.5), json!(126.9), json!(0.8)]],
        );
        assert_eq!(suggest_chart(&rows), Some(ChartSuggestion::Map));
    }

    #[test]
    fn test_date_with_metric_suggests_time_series() {
        let rows = QueryRows::new(
            vec!["event_date".into(), "shock_count".into()],
            vec![vec![json!("2026-08-01"), json!(12)]],
        );
        assert_eq!(suggest_chart(&rows), Some(ChartSuggestion::TimeSeries));
    }

    #[test]
    fn test_label_with_metric_suggests_bar() {
        let rows = QueryRows::new(
            vec!["destination".into(), "damage_rate".into()],
            vec![
                vec![json!("CNSHG"), json!(0.042)],
                vec![json!("KRPUS"), json!(0.021)],
            ],
        );
        assert_eq!(suggest_chart(&rows), Some(ChartSuggestion::Bar));
    }

    #[test]
    fn test_empty_or_textual_results_suggest_nothing() {
        let empty = QueryRows::new(vec!["a".into()], vec![]);
        assert_eq!(suggest_chart(&empty), None);

        let textual = QueryRows::new(
            vec!["code".into(), "risk_level".into()],
            vec![vec![json!("SHP1"), json!("High")]],
        );
        assert_eq!(suggest_chart(&textual), None);
    }
}
