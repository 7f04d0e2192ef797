// Global filter state: one selected year and a set of selected districts.
use crate::loader::Datasets;
use crate::types::{EvAdoptionRow, MapPoint, StationRow, Table};
use std::collections::{BTreeSet, HashSet};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterState {
    /// `None` only when the adoption table has no years at all.
    pub year: Option<i32>,
    pub districts: BTreeSet<String>,
}

/// Distinct years, ascending.
pub fn year_options(ev: &Table<EvAdoptionRow>) -> Vec<i32> {
    ev.rows
        .iter()
        .map(|r| r.year)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Distinct districts in the order they first appear.
pub fn district_options(stations: &Table<StationRow>) -> Vec<String> {
    let mut seen = HashSet::new();
    stations
        .rows
        .iter()
        .filter(|r| seen.insert(r.district.as_str()))
        .map(|r| r.district.clone())
        .collect()
}

impl FilterState {
    /// Earliest year and every district. Defaults come from whatever loads: a table that fails leaves its half of
    /// the state empty, and the sections that need it report the error.
    pub fn from_datasets(datasets: &Datasets) -> Self {
        let year = match datasets.ev_adoption() {
            Ok(ev) => year_options(&ev).first().copied(),
            Err(e) => {
                warn!(error = %e, "no year options");
                None
            }
        };
        let districts = match datasets.stations() {
            Ok(stations) => district_options(&stations).into_iter().collect(),
            Err(e) => {
                warn!(error = %e, "no district options");
                BTreeSet::new()
            }
        };
        FilterState { year, districts }
    }

    pub fn select_year(&mut self, year: i32) {
        self.year = Some(year);
    }

    pub fn select_districts<I, S>(&mut self, districts: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.districts = districts.into_iter().map(Into::into).collect();
    }

    pub fn includes_district(&self, district: &str) -> bool {
        self.districts.contains(district)
    }
}

/// Stations whose district is selected, exact match only.
pub fn stations_in<'a>(
    stations: &'a Table<StationRow>,
    filters: &'a FilterState,
) -> impl Iterator<Item = &'a StationRow> + 'a {
    stations
        .rows
        .iter()
        .filter(move |r| filters.includes_district(&r.district))
}

pub fn to_points<'a, I>(stations: I) -> Vec<MapPoint>
where
    I: IntoIterator<Item = &'a StationRow>,
{
    stations
        .into_iter()
        .map(|r| MapPoint {
            latitude: r.latitude,
            longitude: r.longitude,
        })
        .collect()
}
