// One render function per dashboard tab. Each is a pure function of the
// cached tables and the current filters; `render_all` runs them in isolation
// so one failing tab never blanks the others.
use crate::error::{DashboardError, LookupError};
use crate::filters::{stations_in, to_points, FilterState};
use crate::loader::Datasets;
use crate::types::{
    Bar, Block, Chart, EvAdoptionRow, FeedbackRow, GridLoadRow, Point, PointMap,
    Section, SectionKey, Series, Slice, StationRow, Table, TariffRow,
};
use crate::util::{format_int, format_number, histogram, mean, round2, MeanAcc};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

pub const PAGE_TITLE: &str = "SmartDash MVP – Kigali EV Dashboard";
pub const PAGE_CAPTION: &str = "Demonstration using simulated datasets.";
pub const EV_TARIFF_LABEL: &str = "EV_Tariff";
pub const STATION_PREVIEW_ROWS: usize = 50;
pub const SESSION_ENERGY_BINS: usize = 40;
const DEMO_VIDEO_URL: &str = "https://youtu.be/TdP2X5-MQ08";
const QUICK_INSIGHTS: [&str; 3] = [
    "EV growth is dominated by 2-wheelers.",
    "Charging infrastructure is concentrated in Kigali.",
    "Evening charging significantly increases grid load.",
];

#[derive(Debug)]
pub struct SectionOutcome {
    pub key: SectionKey,
    pub result: Result<Section, DashboardError>,
}

pub fn render(
    key: SectionKey,
    data: &Datasets,
    filters: &FilterState,
) -> Result<Section, DashboardError> {
    debug!(section = key.tab(), "rendering");
    match key {
        SectionKey::Overview => overview(data, filters),
        SectionKey::Adoption => adoption(data),
        SectionKey::Infrastructure => infrastructure(data),
        SectionKey::EnergyGrid => energy_grid(data),
        SectionKey::PolicyInvestment => policy_investment(data),
        SectionKey::Feedback => feedback(data),
    }
}

pub fn render_all(data: &Datasets, filters: &FilterState) -> Vec<SectionOutcome> {
    SectionKey::ALL
        .iter()
        .map(|&key| {
            let result = render(key, data, filters);
            if let Err(e) = &result {
                warn!(section = key.tab(), error = %e, "section failed");
            }
            SectionOutcome { key, result }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Overview
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverviewMetrics {
    pub total_evs: i64,
    pub ev_2w: i64,
    pub stations: usize,
    pub ev_tariff: i64,
}

/// The adoption row for `year`. An absent year is an error, never a default.
pub fn adoption_for_year(
    ev: &Table<EvAdoptionRow>,
    year: Option<i32>,
) -> Result<&EvAdoptionRow, LookupError> {
    let dataset = ev.dataset;
    let year = year.ok_or(LookupError::NoYearSelected { dataset })?;
    ev.rows
        .iter()
        .find(|r| r.year == year)
        .ok_or(LookupError::YearNotFound { dataset, year })
}

pub fn ev_tariff(tariffs: &Table<TariffRow>) -> Result<f64, LookupError> {
    tariffs
        .rows
        .iter()
        .find(|r| r.tariff_type == EV_TARIFF_LABEL)
        .map(|r| r.price_rwf_per_kwh)
        .ok_or_else(|| LookupError::CategoryNotFound {
            dataset: tariffs.dataset,
            column: "Tariff_Type",
            value: EV_TARIFF_LABEL.to_string(),
        })
}

pub fn overview_metrics(
    ev: &Table<EvAdoptionRow>,
    stations: &Table<StationRow>,
    tariffs: &Table<TariffRow>,
    year: Option<i32>,
) -> Result<OverviewMetrics, LookupError> {
    let row = adoption_for_year(ev, year)?;
    Ok(OverviewMetrics {
        total_evs: row.ev_total as i64,
        ev_2w: row.ev_2w as i64,
        stations: stations.len(),
        ev_tariff: ev_tariff(tariffs)? as i64,
    })
}

pub fn overview(data: &Datasets, filters: &FilterState) -> Result<Section, DashboardError> {
    let ev = data.ev_adoption()?;
    let stations = data.stations()?;
    let tariffs = data.tariffs()?;
    let m = overview_metrics(&ev, &stations, &tariffs, filters.year)?;

    let mut s = Section::new(SectionKey::Overview, "Overview");
    s.metric("Total EVs", format_int(m.total_evs));
    s.metric("EV 2-Wheelers", format_int(m.ev_2w));
    s.metric("Charging Stations", format_int(m.stations));
    s.metric("EV Tariff (RWF/kWh)", m.ev_tariff.to_string());

    s.heading("EV Adoption Trend");
    s.push(Block::Chart(Chart::Line {
        x: "Year".to_string(),
        series: vec![series(&ev.rows, "EV_Total", |r| r.year as f64, |r| r.ev_total)],
    }));

    s.heading("Charging Station Map");
    s.push(Block::Map(PointMap {
        points: to_points(stations_in(&stations, filters)),
    }));

    s.heading("Quick Insights");
    s.push(Block::Bullets(
        QUICK_INSIGHTS.iter().map(|t| t.to_string()).collect(),
    ));
    s.heading("Demo Video");
    s.push(Block::Video {
        url: DEMO_VIDEO_URL.to_string(),
    });
    Ok(s)
}

// ---------------------------------------------------------------------------
// Adoption
// ---------------------------------------------------------------------------

pub fn adoption(data: &Datasets) -> Result<Section, DashboardError> {
    let ev = data.ev_adoption()?;
    let imports = data.imports()?;
    let districts = data.districts()?;

    let mut s = Section::new(SectionKey::Adoption, "EV Adoption Analysis");
    s.heading("EV by Category (Annual)");
    let year = |r: &EvAdoptionRow| r.year as f64;
    s.push(Block::Chart(Chart::Line {
        x: "Year".to_string(),
        series: vec![
            series(&ev.rows, "EV_2W", year, |r| r.ev_2w),
            series(&ev.rows, "EV_3W", year, |r| r.ev_3w),
            series(&ev.rows, "EV_Cars", year, |r| r.ev_cars),
            series(&ev.rows, "EV_Buses", year, |r| r.ev_buses),
        ],
    }));

    s.heading("EV Imports (Simulated)");
    s.push(Block::Chart(Chart::Bar {
        x: "Year".to_string(),
        y: "Imported_EV_Count".to_string(),
        bars: imports
            .rows
            .iter()
            .map(|r| Bar {
                label: r.year.to_string(),
                value: r.imported_ev_count,
            })
            .collect(),
    }));

    s.heading("District-Level Attributes");
    s.push(Block::Table(districts.view()));
    Ok(s)
}

// ---------------------------------------------------------------------------
// Infrastructure
// ---------------------------------------------------------------------------

/// Station count per district, in ascending district order.
pub fn stations_per_district(stations: &Table<StationRow>) -> Vec<Bar> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for r in &stations.rows {
        *counts.entry(r.district.as_str()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(district, n)| Bar {
            label: district.to_string(),
            value: n as f64,
        })
        .collect()
}

/// Charger type shares, largest first, ties by name.
pub fn charger_types(stations: &Table<StationRow>) -> Vec<Slice> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for r in &stations.rows {
        *counts.entry(r.charger_type.as_str()).or_insert(0) += 1;
    }
    let mut slices: Vec<Slice> = counts
        .into_iter()
        .map(|(label, count)| Slice {
            label: label.to_string(),
            count,
        })
        .collect();
    slices.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    slices
}

pub fn infrastructure(data: &Datasets) -> Result<Section, DashboardError> {
    let stations = data.stations()?;

    let mut s = Section::new(SectionKey::Infrastructure, "Charging Infrastructure");
    s.heading("Station Overview");
    s.push(Block::Table(stations.head(STATION_PREVIEW_ROWS)));

    s.heading("Stations per District");
    s.push(Block::Chart(Chart::Bar {
        x: "District".to_string(),
        y: "Count".to_string(),
        bars: stations_per_district(&stations),
    }));

    s.heading("Charging Network Map");
    s.push(Block::Map(PointMap {
        points: to_points(&stations.rows),
    }));

    s.heading("Charger Types");
    s.push(Block::Chart(Chart::Pie {
        names: "Charger_Type".to_string(),
        slices: charger_types(&stations),
    }));
    Ok(s)
}

// ---------------------------------------------------------------------------
// Energy & grid
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourlyLoad {
    pub hour: u32,
    pub baseline: f64,
    pub ev: f64,
    pub total: f64,
}

/// Mean of each load column per hour of day across all sampled days.
pub fn hourly_means(rows: &[GridLoadRow]) -> Vec<HourlyLoad> {
    let mut by_hour: BTreeMap<u32, [MeanAcc; 3]> = BTreeMap::new();
    for r in rows {
        let acc = by_hour.entry(r.hour).or_default();
        acc[0].push(r.baseline_load_kwh);
        acc[1].push(r.ev_load_kwh);
        acc[2].push(r.total_load_kwh);
    }
    by_hour
        .into_iter()
        .map(|(hour, [baseline, ev, total])| HourlyLoad {
            hour,
            // every bucket holds at least one row
            baseline: baseline.mean().unwrap_or(0.0),
            ev: ev.mean().unwrap_or(0.0),
            total: total.mean().unwrap_or(0.0),
        })
        .collect()
}

pub fn energy_grid(data: &Datasets) -> Result<Section, DashboardError> {
    let tariffs = data.tariffs()?;
    let grid = data.grid_load()?;
    let sessions = data.sessions()?;
    let sectors = data.sectors()?;

    let mut s = Section::new(SectionKey::EnergyGrid, "Energy Pricing & Grid Load");
    s.heading("Energy Tariffs");
    s.push(Block::Table(tariffs.view()));

    s.heading("Grid Load Curve (Daily Average)");
    let hourly = hourly_means(&grid.rows);
    let hour = |h: &HourlyLoad| h.hour as f64;
    s.push(Block::Chart(Chart::Line {
        x: "Hour".to_string(),
        series: vec![
            series(&hourly, "Baseline_Load_kWh", hour, |h| h.baseline),
            series(&hourly, "EV_Load_kWh", hour, |h| h.ev),
            series(&hourly, "Total_Load_kWh", hour, |h| h.total),
        ],
    }));

    s.heading("Charging Session Energy Distribution");
    let energy: Vec<f64> = sessions.rows.iter().map(|r| r.energy_consumed_kwh).collect();
    s.push(Block::Chart(Chart::Histogram {
        x: "Energy_Consumed_kWh".to_string(),
        bins: histogram(&energy, SESSION_ENERGY_BINS),
    }));

    s.heading("Electricity Consumption by Sector");
    s.push(Block::Chart(Chart::Bar {
        x: "Sector".to_string(),
        y: "Annual_Consumption_GWh".to_string(),
        bars: sectors
            .rows
            .iter()
            .map(|r| Bar {
                label: r.sector.clone(),
                value: r.annual_consumption_gwh,
            })
            .collect(),
    }));
    Ok(s)
}

// ---------------------------------------------------------------------------
// Policy & investment
// ---------------------------------------------------------------------------

pub fn policy_investment(data: &Datasets) -> Result<Section, DashboardError> {
    let policies = data.policies()?;
    let investment = data.investment()?;

    let mut s = Section::new(
        SectionKey::PolicyInvestment,
        "Policy Timeline & Investment Costs",
    );
    s.heading("Policy Timeline");
    s.push(Block::Table(policies.view()));
    s.heading("Charging Investment Costs");
    s.push(Block::Table(investment.view()));
    Ok(s)
}

// ---------------------------------------------------------------------------
// Feedback
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ratings {
    pub usability: f64,
    pub clarity: f64,
}

/// Mean ratings rounded to two decimals.
pub fn average_ratings(feedback: &Table<FeedbackRow>) -> Result<Ratings, LookupError> {
    if feedback.is_empty() {
        return Err(LookupError::NoRows {
            dataset: feedback.dataset,
        });
    }
    let usability = mean(feedback.rows.iter().map(|r| r.usability_rating)).unwrap_or(0.0);
    let clarity = mean(feedback.rows.iter().map(|r| r.clarity_rating)).unwrap_or(0.0);
    Ok(Ratings {
        usability: round2(usability),
        clarity: round2(clarity),
    })
}

pub fn feedback(data: &Datasets) -> Result<Section, DashboardError> {
    let feedback = data.feedback()?;
    let ratings = average_ratings(&feedback)?;

    let mut s = Section::new(SectionKey::Feedback, "User Feedback (Simulated)");
    s.metric("Avg Usability Rating", format_number(ratings.usability, 2));
    s.metric("Avg Clarity Rating", format_number(ratings.clarity, 2));

    s.heading("Responses");
    s.push(Block::Table(feedback.view()));

    s.heading("Comments");
    s.push(Block::Bullets(
        feedback.rows.iter().map(|r| r.comments.clone()).collect(),
    ));
    Ok(s)
}

fn series<T>(rows: &[T], name: &str, x: impl Fn(&T) -> f64, y: impl Fn(&T) -> f64) -> Series {
    let mut points: Vec<Point> = rows.iter().map(|r| Point { x: x(r), y: y(r) }).collect();
    points.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));
    Series {
        name: name.to_string(),
        points,
    }
}
