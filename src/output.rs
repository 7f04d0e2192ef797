use crate::error::LoadError;
use crate::filters::FilterState;
use crate::sections::{SectionOutcome, PAGE_CAPTION, PAGE_TITLE};
use crate::types::{Block, Chart, Dataset, PointMap, Section, Series, TableView};
use crate::util::{format_int, format_number};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::error::Error;
use std::fmt::Write as _;
use tabled::{builder::Builder, settings::Style, Table, Tabled};

const MAP_PREVIEW_POINTS: usize = 10;
const BAR_WIDTH: usize = 30;

#[derive(Tabled)]
struct LoadRow {
    #[tabled(rename = "Dataset")]
    dataset: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Rows")]
    rows: String,
}

#[derive(Tabled)]
struct MetricRow<'a> {
    #[tabled(rename = "Metric")]
    label: &'a str,
    #[tabled(rename = "Value")]
    value: &'a str,
}

#[derive(Tabled)]
struct BarRow {
    label: String,
    value: String,
    #[tabled(rename = "")]
    bar: String,
}

#[derive(Tabled)]
struct SliceRow {
    label: String,
    count: usize,
    share: String,
}

#[derive(Tabled)]
struct BinRow {
    range: String,
    count: usize,
    #[tabled(rename = "")]
    bar: String,
}

fn markdown<T: Tabled>(rows: Vec<T>) -> String {
    if rows.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(rows).with(Style::markdown()).to_string()
}

fn markdown_view(view: &TableView) -> String {
    if view.rows.is_empty() {
        return "(no rows)".to_string();
    }
    let mut b = Builder::default();
    b.push_record(view.columns.iter().cloned());
    for row in &view.rows {
        b.push_record(row.iter().cloned());
    }
    b.build().with(Style::markdown()).to_string()
}

fn bar_glyphs(value: f64, max: f64) -> String {
    if max <= 0.0 || !value.is_finite() {
        return String::new();
    }
    let n = ((value / max) * BAR_WIDTH as f64).round().max(0.0) as usize;
    "#".repeat(n)
}

fn line_table(x: &str, series: &[Series]) -> String {
    // One row per x value, one column per series; series share their x grid.
    let mut xs: Vec<f64> = series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.x))
        .collect();
    xs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    xs.dedup();

    let columns = std::iter::once(x.to_string())
        .chain(series.iter().map(|s| s.name.clone()))
        .collect();
    let rows = xs
        .iter()
        .map(|&xv| {
            std::iter::once(format_number(xv, 0).replace(',', ""))
                .chain(series.iter().map(|s| {
                    s.points
                        .iter()
                        .find(|p| p.x == xv)
                        .map(|p| format_number(p.y, 2))
                        .unwrap_or_default()
                }))
                .collect::<Vec<String>>()
        })
        .collect();
    markdown_view(&TableView { columns, rows })
}

fn chart_text(chart: &Chart) -> String {
    match chart {
        Chart::Line { x, series } => line_table(x, series),
        Chart::Bar { x, y, bars } => {
            let max = bars.iter().map(|b| b.value).fold(0.0, f64::max);
            let rows: Vec<BarRow> = bars
                .iter()
                .map(|b| BarRow {
                    label: b.label.clone(),
                    value: format_number(b.value, 2),
                    bar: bar_glyphs(b.value, max),
                })
                .collect();
            format!("{} by {}\n{}", y, x, markdown(rows))
        }
        Chart::Pie { names, slices } => {
            let total: usize = slices.iter().map(|s| s.count).sum();
            let rows: Vec<SliceRow> = slices
                .iter()
                .map(|s| SliceRow {
                    label: s.label.clone(),
                    count: s.count,
                    share: format!("{:.1}%", s.count as f64 * 100.0 / total.max(1) as f64),
                })
                .collect();
            format!("share of {}\n{}", names, markdown(rows))
        }
        Chart::Histogram { x, bins } => {
            let max = bins.iter().map(|b| b.count).max().unwrap_or(0) as f64;
            let rows: Vec<BinRow> = bins
                .iter()
                .map(|b| BinRow {
                    range: format!("{:.2} – {:.2}", b.start, b.end),
                    count: b.count,
                    bar: bar_glyphs(b.count as f64, max),
                })
                .collect();
            format!("distribution of {}\n{}", x, markdown(rows))
        }
    }
}

fn map_text(map: &PointMap) -> String {
    let mut out = format!("{} station(s) on map", format_int(map.points.len()));
    if map.points.is_empty() {
        return out;
    }
    let view = TableView {
        columns: vec!["latitude".to_string(), "longitude".to_string()],
        rows: map
            .points
            .iter()
            .take(MAP_PREVIEW_POINTS)
            .map(|p| vec![p.latitude.to_string(), p.longitude.to_string()])
            .collect(),
    };
    out.push('\n');
    out.push_str(&markdown_view(&view));
    if map.points.len() > MAP_PREVIEW_POINTS {
        let _ = write!(out, "\n(+{} more)", map.points.len() - MAP_PREVIEW_POINTS);
    }
    out
}

pub fn section_text(section: &Section) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==\n", section.title);

    // Consecutive metric cards are gathered into one table.
    let mut metrics: Vec<MetricRow> = Vec::new();
    for block in &section.blocks {
        if let Block::Metric { label, value } = block {
            metrics.push(MetricRow { label, value });
            continue;
        }
        if !metrics.is_empty() {
            let _ = writeln!(out, "{}\n", markdown(std::mem::take(&mut metrics)));
        }
        match block {
            Block::Metric { .. } => {}
            Block::Heading(text) => {
                let _ = writeln!(out, "-- {} --", text);
            }
            Block::Chart(chart) => {
                let _ = writeln!(out, "{}\n", chart_text(chart));
            }
            Block::Table(view) => {
                let _ = writeln!(out, "{}\n", markdown_view(view));
            }
            Block::Map(map) => {
                let _ = writeln!(out, "{}\n", map_text(map));
            }
            Block::Bullets(items) => {
                for item in items {
                    let _ = writeln!(out, "- {}", item);
                }
                out.push('\n');
            }
            Block::Video { url } => {
                let _ = writeln!(out, "Video: {}\n", url);
            }
        }
    }
    if !metrics.is_empty() {
        let _ = writeln!(out, "{}\n", markdown(metrics));
    }
    out
}

pub fn outcome_text(outcome: &SectionOutcome) -> String {
    match &outcome.result {
        Ok(section) => section_text(section),
        Err(e) => format!(
            "== {} ==\n\nThis section could not be rendered: {}\n",
            outcome.key.tab(),
            e
        ),
    }
}

pub fn print_header(filters: &FilterState) {
    println!("{}", PAGE_TITLE);
    println!("{}", PAGE_CAPTION);
    let year = filters
        .year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "(none)".to_string());
    let districts = if filters.districts.is_empty() {
        "(none)".to_string()
    } else {
        filters
            .districts
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    };
    println!("Year: {} | Districts: {}\n", year, districts);
}

pub fn print_outcome(outcome: &SectionOutcome) {
    println!("{}", outcome_text(outcome));
}

pub fn load_summary_text(outcomes: &[(Dataset, Result<usize, LoadError>)]) -> String {
    let rows = outcomes
        .iter()
        .map(|(dataset, result)| match result {
            Ok(n) => LoadRow {
                dataset: dataset.to_string(),
                status: "ok".to_string(),
                rows: format_int(*n),
            },
            Err(e) => LoadRow {
                dataset: dataset.to_string(),
                status: e.to_string(),
                rows: "-".to_string(),
            },
        })
        .collect();
    markdown(rows)
}

#[derive(Debug, Serialize)]
pub struct FilterExport {
    pub year: Option<i32>,
    pub districts: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SectionExport<'a> {
    pub tab: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<&'a Section>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DashboardExport<'a> {
    pub title: &'static str,
    pub caption: &'static str,
    pub generated_at: DateTime<Utc>,
    pub filters: FilterExport,
    pub sections: Vec<SectionExport<'a>>,
}

pub fn dashboard_export<'a>(
    filters: &FilterState,
    outcomes: &'a [SectionOutcome],
) -> DashboardExport<'a> {
    DashboardExport {
        title: PAGE_TITLE,
        caption: PAGE_CAPTION,
        generated_at: Utc::now(),
        filters: FilterExport {
            year: filters.year,
            districts: filters.districts.iter().cloned().collect(),
        },
        sections: outcomes
            .iter()
            .map(|o| SectionExport {
                tab: o.key.tab(),
                section: o.result.as_ref().ok(),
                error: o.result.as_ref().err().map(|e| e.to_string()),
            })
            .collect(),
    }
}

pub fn write_json<T: Serialize>(path: &std::path::Path, value: &T) -> Result<(), Box<dyn Error>> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}
