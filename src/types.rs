use csv::StringRecord;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// The eleven CSV resources the dashboard is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Dataset {
    EvAdoption,
    ChargingStations,
    Tariffs,
    GridLoad,
    ChargingSessions,
    PolicyTimeline,
    ChargingInvestment,
    EvImports,
    SectorConsumption,
    Districts,
    UserFeedback,
}

impl Dataset {
    pub const ALL: [Dataset; 11] = [
        Dataset::EvAdoption,
        Dataset::ChargingStations,
        Dataset::Tariffs,
        Dataset::GridLoad,
        Dataset::ChargingSessions,
        Dataset::PolicyTimeline,
        Dataset::ChargingInvestment,
        Dataset::EvImports,
        Dataset::SectorConsumption,
        Dataset::Districts,
        Dataset::UserFeedback,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Dataset::EvAdoption => "ev_adoption.csv",
            Dataset::ChargingStations => "charging_stations.csv",
            Dataset::Tariffs => "tariffs.csv",
            Dataset::GridLoad => "grid_load_week.csv",
            Dataset::ChargingSessions => "charging_sessions.csv",
            Dataset::PolicyTimeline => "policy_timeline.csv",
            Dataset::ChargingInvestment => "charging_investment.csv",
            Dataset::EvImports => "ev_imports.csv",
            Dataset::SectorConsumption => "sector_consumption.csv",
            Dataset::Districts => "districts.csv",
            Dataset::UserFeedback => "user_feedback.csv",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// A row schema: the columns a dataset must carry and how one CSV record
/// becomes a typed row.
pub trait Record: Sized + Send + Sync + 'static {
    const REQUIRED: &'static [&'static str];

    fn from_record(headers: &StringRecord, record: &StringRecord) -> Result<Self, csv::Error>;

    /// A column value that must be unique but repeats, with the 1-based row
    /// of its second occurrence.
    fn duplicate(_rows: &[Self]) -> Option<Duplicate> {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Duplicate {
    pub column: &'static str,
    pub value: String,
    pub row: usize,
}

/// `Record` for a serde row struct with the given required columns.
macro_rules! serde_record {
    ($row:ty, [$($col:literal),* $(,)?]) => {
        impl Record for $row {
            const REQUIRED: &'static [&'static str] = &[$($col),*];

            fn from_record(
                headers: &StringRecord,
                record: &StringRecord,
            ) -> Result<Self, csv::Error> {
                record.deserialize(Some(headers))
            }
        }
    };
}

/// Numeric cells must be finite; `NaN`/`inf` are rejected at load.
fn finite<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let v = f64::deserialize(d)?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(de::Error::custom(format!("non-finite value {v}")))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EvAdoptionRow {
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "EV_Total", deserialize_with = "finite")]
    pub ev_total: f64,
    #[serde(rename = "EV_2W", deserialize_with = "finite")]
    pub ev_2w: f64,
    #[serde(rename = "EV_3W", deserialize_with = "finite")]
    pub ev_3w: f64,
    #[serde(rename = "EV_Cars", deserialize_with = "finite")]
    pub ev_cars: f64,
    #[serde(rename = "EV_Buses", deserialize_with = "finite")]
    pub ev_buses: f64,
}

impl Record for EvAdoptionRow {
    const REQUIRED: &'static [&'static str] =
        &["Year", "EV_Total", "EV_2W", "EV_3W", "EV_Cars", "EV_Buses"];

    fn from_record(headers: &StringRecord, record: &StringRecord) -> Result<Self, csv::Error> {
        record.deserialize(Some(headers))
    }

    // one row per year
    fn duplicate(rows: &[Self]) -> Option<Duplicate> {
        let mut seen = HashSet::new();
        rows.iter()
            .position(|r| !seen.insert(r.year))
            .map(|idx| Duplicate {
                column: "Year",
                value: rows[idx].year.to_string(),
                row: idx + 1,
            })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StationRow {
    #[serde(rename = "District")]
    pub district: String,
    #[serde(rename = "Latitude", deserialize_with = "finite")]
    pub latitude: f64,
    #[serde(rename = "Longitude", deserialize_with = "finite")]
    pub longitude: f64,
    #[serde(rename = "Charger_Type")]
    pub charger_type: String,
}

serde_record!(StationRow, ["District", "Latitude", "Longitude", "Charger_Type"]);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TariffRow {
    #[serde(rename = "Tariff_Type")]
    pub tariff_type: String,
    #[serde(rename = "Price_RWF_per_kWh", deserialize_with = "finite")]
    pub price_rwf_per_kwh: f64,
}

serde_record!(TariffRow, ["Tariff_Type", "Price_RWF_per_kWh"]);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GridLoadRow {
    #[serde(rename = "Hour")]
    pub hour: u32,
    #[serde(rename = "Baseline_Load_kWh", deserialize_with = "finite")]
    pub baseline_load_kwh: f64,
    #[serde(rename = "EV_Load_kWh", deserialize_with = "finite")]
    pub ev_load_kwh: f64,
    #[serde(rename = "Total_Load_kWh", deserialize_with = "finite")]
    pub total_load_kwh: f64,
}

serde_record!(
    GridLoadRow,
    ["Hour", "Baseline_Load_kWh", "EV_Load_kWh", "Total_Load_kWh"]
);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionRow {
    #[serde(rename = "Energy_Consumed_kWh", deserialize_with = "finite")]
    pub energy_consumed_kwh: f64,
}

serde_record!(SessionRow, ["Energy_Consumed_kWh"]);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImportRow {
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Imported_EV_Count", deserialize_with = "finite")]
    pub imported_ev_count: f64,
}

serde_record!(ImportRow, ["Year", "Imported_EV_Count"]);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SectorRow {
    #[serde(rename = "Sector")]
    pub sector: String,
    #[serde(rename = "Annual_Consumption_GWh", deserialize_with = "finite")]
    pub annual_consumption_gwh: f64,
}

serde_record!(SectorRow, ["Sector", "Annual_Consumption_GWh"]);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeedbackRow {
    #[serde(rename = "Usability_Rating", deserialize_with = "finite")]
    pub usability_rating: f64,
    #[serde(rename = "Clarity_Rating", deserialize_with = "finite")]
    pub clarity_rating: f64,
    #[serde(rename = "Comments")]
    pub comments: String,
}

serde_record!(FeedbackRow, ["Usability_Rating", "Clarity_Rating", "Comments"]);

/// Row type for reference tables that are only ever shown as-is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verbatim;

impl Record for Verbatim {
    const REQUIRED: &'static [&'static str] = &[];

    fn from_record(_: &StringRecord, _: &StringRecord) -> Result<Self, csv::Error> {
        Ok(Verbatim)
    }
}

/// An immutable loaded dataset: the raw cells for display plus typed rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Table<T> {
    pub dataset: Dataset,
    pub columns: Vec<String>,
    pub cells: Vec<Vec<String>>,
    pub rows: Vec<T>,
}

impl<T> Table<T> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn view(&self) -> TableView {
        self.head(self.cells.len())
    }

    pub fn head(&self, n: usize) -> TableView {
        TableView {
            columns: self.columns.clone(),
            rows: self.cells.iter().take(n).cloned().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Render artifacts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableView {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slice {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Chart {
    Line { x: String, series: Vec<Series> },
    Bar { x: String, y: String, bars: Vec<Bar> },
    Pie { names: String, slices: Vec<Slice> },
    Histogram { x: String, bins: Vec<Bin> },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointMap {
    pub points: Vec<MapPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Block {
    Heading(String),
    Metric { label: String, value: String },
    Chart(Chart),
    Table(TableView),
    Map(PointMap),
    Bullets(Vec<String>),
    Video { url: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKey {
    Overview,
    Adoption,
    Infrastructure,
    EnergyGrid,
    PolicyInvestment,
    Feedback,
}

impl SectionKey {
    pub const ALL: [SectionKey; 6] = [
        SectionKey::Overview,
        SectionKey::Adoption,
        SectionKey::Infrastructure,
        SectionKey::EnergyGrid,
        SectionKey::PolicyInvestment,
        SectionKey::Feedback,
    ];

    /// Tab label as shown in the tab strip.
    pub fn tab(self) -> &'static str {
        match self {
            SectionKey::Overview => "Overview",
            SectionKey::Adoption => "EV Adoption",
            SectionKey::Infrastructure => "Charging Infrastructure",
            SectionKey::EnergyGrid => "Energy & Grid",
            SectionKey::PolicyInvestment => "Policy & Investment",
            SectionKey::Feedback => "User Feedback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub key: SectionKey,
    pub title: String,
    pub blocks: Vec<Block>,
}

impl Section {
    pub fn new(key: SectionKey, title: &str) -> Self {
        Section {
            key,
            title: title.to_string(),
            blocks: Vec::new(),
        }
    }

    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub fn heading(&mut self, text: &str) {
        self.blocks.push(Block::Heading(text.to_string()));
    }

    pub fn metric(&mut self, label: &str, value: impl Into<String>) {
        self.blocks.push(Block::Metric {
            label: label.to_string(),
            value: value.into(),
        });
    }
}
