use crate::error::LoadError;
use crate::source::DataSource;
use crate::types::{
    Dataset, EvAdoptionRow, FeedbackRow, GridLoadRow, ImportRow, Record, SectorRow, SessionRow,
    StationRow, Table, TariffRow, Verbatim,
};
use csv::{ReaderBuilder, Trim};
use once_cell::sync::OnceCell;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Parse CSV text into a typed table, rejecting it if a required column is
/// missing or any row does not fit the row schema.
pub fn parse_table<T: Record>(dataset: Dataset, text: &str) -> Result<Table<T>, LoadError> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .from_reader(text.as_bytes());
    let headers = rdr
        .headers()
        .map_err(|e| LoadError::Parse {
            dataset,
            row: 0,
            reason: e.to_string(),
        })?
        .clone();

    let missing: Vec<String> = T::REQUIRED
        .iter()
        .filter(|col| !headers.iter().any(|h| h == **col))
        .map(|col| col.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(LoadError::Schema { dataset, missing });
    }

    let mut cells = Vec::new();
    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let parse_err = |e: csv::Error| LoadError::Parse {
            dataset,
            row: idx + 1,
            reason: e.to_string(),
        };
        let record = result.map_err(parse_err)?;
        rows.push(T::from_record(&headers, &record).map_err(parse_err)?);
        cells.push(record.iter().map(str::to_string).collect());
    }

    if let Some(dup) = T::duplicate(&rows) {
        return Err(LoadError::Duplicate {
            dataset,
            column: dup.column,
            value: dup.value,
            row: dup.row,
        });
    }

    Ok(Table {
        dataset,
        columns: headers.iter().map(str::to_string).collect(),
        cells,
        rows,
    })
}

struct Entry {
    table: Arc<dyn Any + Send + Sync>,
    loaded_at: Instant,
}

type Slot = Arc<OnceCell<Entry>>;

/// Per-dataset memo of loaded tables.
///
/// Each dataset gets its own slot; concurrent first requests for the same
/// dataset wait on that slot so the source is hit once. A failed load leaves
/// the slot empty, so the next request retries. Entries are dropped by
/// `invalidate`/`clear`, or on access once older than the optional TTL.
pub struct DatasetCache {
    source: Box<dyn DataSource>,
    ttl: Option<Duration>,
    slots: Mutex<HashMap<Dataset, Slot>>,
    fetches: AtomicUsize,
}

impl DatasetCache {
    pub fn new(source: Box<dyn DataSource>, ttl: Option<Duration>) -> Self {
        DatasetCache {
            source,
            ttl,
            slots: Mutex::new(HashMap::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn get<T: Record>(&self, dataset: Dataset) -> Result<Arc<Table<T>>, LoadError> {
        let slot = self.slot(dataset);
        let entry = slot.get_or_try_init(|| self.load::<T>(dataset))?;
        entry
            .table
            .clone()
            .downcast::<Table<T>>()
            .map_err(|_| LoadError::TypeMismatch { dataset })
    }

    fn load<T: Record>(&self, dataset: Dataset) -> Result<Entry, LoadError> {
        let location = self.source.describe(dataset);
        info!(%dataset, %location, "loading dataset");
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();
        let table = self
            .source
            .fetch(dataset)
            .and_then(|text| parse_table::<T>(dataset, &text))
            .inspect_err(|e| warn!(%dataset, error = %e, "load failed"))?;
        info!(%dataset, rows = table.len(), elapsed = ?start.elapsed(), "dataset loaded");
        Ok(Entry {
            table: Arc::new(table),
            loaded_at: Instant::now(),
        })
    }

    fn slot(&self, dataset: Dataset) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = slots.entry(dataset).or_default();
        let expired = match (self.ttl, slot.get()) {
            (Some(ttl), Some(entry)) => entry.loaded_at.elapsed() >= ttl,
            _ => false,
        };
        if expired {
            debug!(%dataset, "cache entry expired");
            *slot = Slot::default();
        }
        Arc::clone(slot)
    }

    pub fn invalidate(&self, dataset: Dataset) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots.remove(&dataset).is_some() {
            debug!(%dataset, "cache entry invalidated");
        }
    }

    pub fn clear(&self) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        info!(entries = slots.len(), "cache cleared");
        slots.clear();
    }

    /// Datasets currently held, in declaration order.
    pub fn loaded(&self) -> Vec<Dataset> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<Dataset> = slots
            .iter()
            .filter(|(_, slot)| slot.get().is_some())
            .map(|(dataset, _)| *dataset)
            .collect();
        out.sort();
        out
    }

    /// Number of source fetches attempted so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

/// Typed access to the eleven datasets, each bound to its row schema.
pub struct Datasets {
    cache: DatasetCache,
}

impl Datasets {
    pub fn new(cache: DatasetCache) -> Self {
        Datasets { cache }
    }

    pub fn cache(&self) -> &DatasetCache {
        &self.cache
    }

    pub fn ev_adoption(&self) -> Result<Arc<Table<EvAdoptionRow>>, LoadError> {
        self.cache.get(Dataset::EvAdoption)
    }

    pub fn stations(&self) -> Result<Arc<Table<StationRow>>, LoadError> {
        self.cache.get(Dataset::ChargingStations)
    }

    pub fn tariffs(&self) -> Result<Arc<Table<TariffRow>>, LoadError> {
        self.cache.get(Dataset::Tariffs)
    }

    pub fn grid_load(&self) -> Result<Arc<Table<GridLoadRow>>, LoadError> {
        self.cache.get(Dataset::GridLoad)
    }

    pub fn sessions(&self) -> Result<Arc<Table<SessionRow>>, LoadError> {
        self.cache.get(Dataset::ChargingSessions)
    }

    pub fn policies(&self) -> Result<Arc<Table<Verbatim>>, LoadError> {
        self.cache.get(Dataset::PolicyTimeline)
    }

    pub fn investment(&self) -> Result<Arc<Table<Verbatim>>, LoadError> {
        self.cache.get(Dataset::ChargingInvestment)
    }

    pub fn imports(&self) -> Result<Arc<Table<ImportRow>>, LoadError> {
        self.cache.get(Dataset::EvImports)
    }

    pub fn sectors(&self) -> Result<Arc<Table<SectorRow>>, LoadError> {
        self.cache.get(Dataset::SectorConsumption)
    }

    pub fn districts(&self) -> Result<Arc<Table<Verbatim>>, LoadError> {
        self.cache.get(Dataset::Districts)
    }

    pub fn feedback(&self) -> Result<Arc<Table<FeedbackRow>>, LoadError> {
        self.cache.get(Dataset::UserFeedback)
    }

    /// Row count of one dataset, loading it if needed.
    pub fn row_count(&self, dataset: Dataset) -> Result<usize, LoadError> {
        Ok(match dataset {
            Dataset::EvAdoption => self.ev_adoption()?.len(),
            Dataset::ChargingStations => self.stations()?.len(),
            Dataset::Tariffs => self.tariffs()?.len(),
            Dataset::GridLoad => self.grid_load()?.len(),
            Dataset::ChargingSessions => self.sessions()?.len(),
            Dataset::PolicyTimeline => self.policies()?.len(),
            Dataset::ChargingInvestment => self.investment()?.len(),
            Dataset::EvImports => self.imports()?.len(),
            Dataset::SectorConsumption => self.sectors()?.len(),
            Dataset::Districts => self.districts()?.len(),
            Dataset::UserFeedback => self.feedback()?.len(),
        })
    }

    /// Load every dataset, reporting each outcome separately.
    pub fn load_all(&self) -> Vec<(Dataset, Result<usize, LoadError>)> {
        Dataset::ALL
            .iter()
            .map(|&dataset| (dataset, self.row_count(dataset)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixture_datasets, StubSource};
    use std::thread;

    #[test]
    fn parse_keeps_extra_columns_and_typed_rows() {
        let text = "Station_ID,District,Latitude,Longitude,Charger_Type\n\
                    S1, Gasabo ,-1.94,30.06,DC Fast\n";
        let table: Table<StationRow> = parse_table(Dataset::ChargingStations, text).unwrap();
        assert_eq!(table.columns[0], "Station_ID");
        assert_eq!(table.cells[0][1], "Gasabo");
        assert_eq!(table.rows[0].district, "Gasabo");
        assert_eq!(table.rows[0].latitude, -1.94);
    }

    #[test]
    fn parse_rejects_missing_columns() {
        let err = parse_table::<TariffRow>(Dataset::Tariffs, "Tariff_Type,Price\nEV_Tariff,1\n")
            .unwrap_err();
        match err {
            LoadError::Schema { dataset, missing } => {
                assert_eq!(dataset, Dataset::Tariffs);
                assert_eq!(missing, vec!["Price_RWF_per_kWh".to_string()]);
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn parse_reports_bad_row_number() {
        let text = "Energy_Consumed_kWh\n12.5\nlots\n";
        match parse_table::<SessionRow>(Dataset::ChargingSessions, text) {
            Err(LoadError::Parse { row, .. }) => assert_eq!(row, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn parse_rejects_non_finite_numbers() {
        let text = "Year,EV_Total,EV_2W,EV_3W,EV_Cars,EV_Buses\n\
                    2019,10,5,1,1,1\n\
                    2020,NaN,inf,1,1,1\n";
        match parse_table::<EvAdoptionRow>(Dataset::EvAdoption, text) {
            Err(LoadError::Parse { dataset, row, reason }) => {
                assert_eq!(dataset, Dataset::EvAdoption);
                assert_eq!(row, 2);
                assert!(reason.contains("non-finite"), "{reason}");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn parse_rejects_repeated_year() {
        let text = "Year,EV_Total,EV_2W,EV_3W,EV_Cars,EV_Buses\n\
                    2020,10,5,1,1,1\n\
                    2021,20,9,1,1,1\n\
                    2020,30,12,1,1,1\n";
        match parse_table::<EvAdoptionRow>(Dataset::EvAdoption, text) {
            Err(LoadError::Duplicate { column, value, row, .. }) => {
                assert_eq!(column, "Year");
                assert_eq!(value, "2020");
                assert_eq!(row, 3);
            }
            other => panic!("expected duplicate error, got {other:?}"),
        }
    }

    #[test]
    fn parse_empty_text_is_schema_error() {
        assert!(matches!(
            parse_table::<SessionRow>(Dataset::ChargingSessions, ""),
            Err(LoadError::Schema { .. })
        ));
        let verbatim = parse_table::<Verbatim>(Dataset::Districts, "").unwrap();
        assert!(verbatim.is_empty());
    }

    #[test]
    fn second_load_is_served_from_cache() {
        let source = StubSource::with_fixtures();
        let counter = source.counter();
        let datasets = Datasets::new(DatasetCache::new(Box::new(source), None));

        let first = datasets.tariffs().unwrap();
        let second = datasets.tariffs().unwrap();
        assert_eq!(first, second);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(counter.get(Dataset::Tariffs), 1);
        assert_eq!(datasets.cache().fetch_count(), 1);
        assert_eq!(datasets.cache().loaded(), vec![Dataset::Tariffs]);
    }

    #[test]
    fn failures_are_not_cached() {
        let source = StubSource::with_fixtures().without(Dataset::Districts);
        let counter = source.counter();
        let datasets = Datasets::new(DatasetCache::new(Box::new(source), None));

        assert!(datasets.districts().is_err());
        assert!(datasets.districts().is_err());
        assert_eq!(counter.get(Dataset::Districts), 2);
        assert!(datasets.cache().loaded().is_empty());
    }

    #[test]
    fn invalidate_forces_refetch() {
        let datasets = fixture_datasets();
        datasets.feedback().unwrap();
        datasets.cache().invalidate(Dataset::UserFeedback);
        datasets.feedback().unwrap();
        assert_eq!(datasets.cache().fetch_count(), 2);

        datasets.cache().clear();
        assert!(datasets.cache().loaded().is_empty());
    }

    #[test]
    fn expired_entries_reload() {
        let source = StubSource::with_fixtures();
        let counter = source.counter();
        let cache = DatasetCache::new(Box::new(source), Some(Duration::ZERO));
        cache.get::<SectorRow>(Dataset::SectorConsumption).unwrap();
        cache.get::<SectorRow>(Dataset::SectorConsumption).unwrap();
        assert_eq!(counter.get(Dataset::SectorConsumption), 2);
    }

    #[test]
    fn wrong_row_type_is_reported() {
        let datasets = fixture_datasets();
        datasets.policies().unwrap();
        let err = datasets
            .cache()
            .get::<TariffRow>(Dataset::PolicyTimeline)
            .unwrap_err();
        assert!(matches!(err, LoadError::TypeMismatch { .. }));
    }

    #[test]
    fn concurrent_first_access_fetches_once() {
        let source = StubSource::with_fixtures().with_delay(Duration::from_millis(20));
        let counter = source.counter();
        let datasets = Datasets::new(DatasetCache::new(Box::new(source), None));

        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| datasets.stations().unwrap());
            }
        });
        assert_eq!(counter.get(Dataset::ChargingStations), 1);
    }

    #[test]
    fn load_all_reports_each_dataset() {
        let datasets = fixture_datasets();
        let outcomes = datasets.load_all();
        assert_eq!(outcomes.len(), Dataset::ALL.len());
        assert!(outcomes.iter().all(|(_, r)| r.is_ok()));
        assert_eq!(datasets.cache().loaded().len(), Dataset::ALL.len());
    }
}
