//! Chart-ready datasets for the search summary panels.

use chrono::NaiveDate;
use serde::Serialize;

use crate::search::{LabelledCount, SearchStats};

pub const DAILY_COUNT_BORDER_COLOR: &str = "rgb(255, 99, 132)";
pub const SOURCE_BACKGROUND_COLOR: &str = "rgb(75, 192, 192)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDataset {
    #[serde(rename = "type")]
    pub kind: ChartKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    pub border_color: String,
    pub border_width: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<bool>,
    pub data: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataset>,
}

impl ChartData {
    pub fn is_consistent(&self) -> bool {
        self.datasets
            .iter()
            .all(|dataset| dataset.data.len() == self.labels.len())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCharts {
    pub daily_count: ChartData,
    pub per_source: ChartData,
}

pub fn derive_charts(stats: &SearchStats) -> SearchCharts {
    SearchCharts {
        daily_count: daily_count_chart(&stats.ten_day_count),
        per_source: source_chart(&stats.source),
    }
}

/// Line series over the daily counts, oldest day first.
///
/// When every label is a calendar date the points are ordered chronologically
/// and labelled `MM/DD`; otherwise the backend order and labels are kept.
pub fn daily_count_chart(ten_day_count: &[LabelledCount]) -> ChartData {
    let dated: Option<Vec<(NaiveDate, u64)>> = ten_day_count
        .iter()
        .map(|entry| parse_day(&entry.label).map(|day| (day, entry.count)))
        .collect();

    let (labels, data) = match dated {
        Some(mut days) if !days.is_empty() => {
            days.sort_by_key(|(day, _)| *day);
            days.into_iter()
                .map(|(day, count)| (day.format("%m/%d").to_string(), count))
                .unzip()
        }
        _ => ten_day_count
            .iter()
            .map(|entry| (entry.label.clone(), entry.count))
            .unzip(),
    };

    ChartData {
        labels,
        datasets: vec![ChartDataset {
            kind: ChartKind::Line,
            background_color: None,
            border_color: DAILY_COUNT_BORDER_COLOR.to_string(),
            border_width: 2,
            fill: Some(false),
            data,
        }],
    }
}

/// Bar series of message counts per source; labels[i] and data[i] come from the same entry.
pub fn source_chart(source: &[LabelledCount]) -> ChartData {
    let (labels, data) = source
        .iter()
        .map(|entry| (entry.label.clone(), entry.count))
        .unzip();

    ChartData {
        labels,
        datasets: vec![ChartDataset {
            kind: ChartKind::Bar,
            background_color: Some(SOURCE_BACKGROUND_COLOR.to_string()),
            border_color: "white".to_string(),
            border_width: 2,
            fill: None,
            data,
        }],
    }
}

/// Chart height for a viewport width, following the layout breakpoints.
pub fn chart_height(viewport_width: u32) -> u32 {
    match viewport_width {
        w if w > 1536 => 75,
        w if w > 1280 => 90,
        w if w > 1024 => 110,
        w if w > 768 => 155,
        w if w > 640 => 200,
        _ => 140,
    }
}

fn parse_day(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}
