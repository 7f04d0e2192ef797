// Test-only data source serving fixture CSVs and counting fetches.
use crate::error::LoadError;
use crate::loader::{DatasetCache, Datasets};
use crate::source::DataSource;
use crate::types::Dataset;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub const EV_ADOPTION: &str = "\
Year,EV_Total,EV_2W,EV_3W,EV_Cars,EV_Buses
2022,2500,1900,300,250,50
2020,600,450,80,60,10
2021,1200,900,150,120,30
";

pub const STATIONS: &str = "\
Station_ID,Name,District,Latitude,Longitude,Charger_Type
S001,Kimironko Hub,Gasabo,-1.9355,30.1035,DC Fast
S002,Nyabugogo,Nyarugenge,-1.9398,30.0445,AC Level 2
S003,Remera,Gasabo,-1.9577,30.1127,AC Level 2
S004,Kicukiro Centre,Kicukiro,-1.9706,30.1044,DC Fast
S005,Downtown,Nyarugenge,-1.9441,30.0619,AC Level 2
";

pub const TARIFFS: &str = "\
Tariff_Type,Price_RWF_per_kWh,Description
Residential,212,Households
Commercial,249,Shops and offices
EV_Tariff,150,Public EV charging
";

pub const GRID_LOAD: &str = "\
Day,Hour,Baseline_Load_kWh,EV_Load_kWh,Total_Load_kWh
Mon,0,100,10,110
Mon,1,90,20,110
Tue,0,120,30,150
Tue,1,110,40,150
";

pub const SESSIONS: &str = "\
Session_ID,Station_ID,Energy_Consumed_kWh
1,S001,10.0
2,S002,12.5
3,S003,20.0
4,S004,35.0
5,S005,50.0
";

pub const POLICIES: &str = "\
Year,Policy,Description
2019,EV tax exemption,\"Import duty waived on EVs, spare parts and chargers\"
2021,EV charging tariff,Dedicated tariff for charging stations
";

pub const INVESTMENT: &str = "\
Charger_Type,Unit_Cost_USD,Installation_Cost_USD
AC Level 2,1500,800
DC Fast,25000,6000
";

pub const IMPORTS: &str = "\
Year,Imported_EV_Count
2020,300
2021,700
2022,1400
";

pub const SECTORS: &str = "\
Sector,Annual_Consumption_GWh
Residential,320.5
Industrial,410.25
Transport,12.75
";

pub const DISTRICTS: &str = "\
District,Population,Area_km2
Gasabo,879505,429
Kicukiro,491731,167
Nyarugenge,374319,134
";

pub const FEEDBACK: &str = "\
Respondent,Usability_Rating,Clarity_Rating,Comments
R1,4,5,\"Clear charts, easy to use\"
R2,5,4,Map is helpful
R3,3,4,
";

pub fn fixture(dataset: Dataset) -> &'static str {
    match dataset {
        Dataset::EvAdoption => EV_ADOPTION,
        Dataset::ChargingStations => STATIONS,
        Dataset::Tariffs => TARIFFS,
        Dataset::GridLoad => GRID_LOAD,
        Dataset::ChargingSessions => SESSIONS,
        Dataset::PolicyTimeline => POLICIES,
        Dataset::ChargingInvestment => INVESTMENT,
        Dataset::EvImports => IMPORTS,
        Dataset::SectorConsumption => SECTORS,
        Dataset::Districts => DISTRICTS,
        Dataset::UserFeedback => FEEDBACK,
    }
}

#[derive(Clone, Default)]
pub struct FetchCounter(Arc<Mutex<HashMap<Dataset, usize>>>);

impl FetchCounter {
    pub fn get(&self, dataset: Dataset) -> usize {
        self.0.lock().unwrap().get(&dataset).copied().unwrap_or(0)
    }

    fn bump(&self, dataset: Dataset) {
        *self.0.lock().unwrap().entry(dataset).or_insert(0) += 1;
    }
}

pub struct StubSource {
    files: HashMap<Dataset, String>,
    counter: FetchCounter,
    delay: Option<Duration>,
}

impl StubSource {
    pub fn with_fixtures() -> Self {
        StubSource {
            files: Dataset::ALL
                .iter()
                .map(|&d| (d, fixture(d).to_string()))
                .collect(),
            counter: FetchCounter::default(),
            delay: None,
        }
    }

    pub fn with(mut self, dataset: Dataset, text: &str) -> Self {
        self.files.insert(dataset, text.to_string());
        self
    }

    pub fn without(mut self, dataset: Dataset) -> Self {
        self.files.remove(&dataset);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn counter(&self) -> FetchCounter {
        self.counter.clone()
    }
}

impl DataSource for StubSource {
    fn fetch(&self, dataset: Dataset) -> Result<String, LoadError> {
        self.counter.bump(dataset);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        self.files
            .get(&dataset)
            .cloned()
            .ok_or_else(|| LoadError::Fetch {
                dataset,
                location: self.describe(dataset),
                reason: "404 Not Found".to_string(),
            })
    }

    fn describe(&self, dataset: Dataset) -> String {
        format!("stub://{}", dataset.file_name())
    }
}

pub fn datasets_from(source: StubSource) -> Datasets {
    Datasets::new(DatasetCache::new(Box::new(source), None))
}

pub fn fixture_datasets() -> Datasets {
    datasets_from(StubSource::with_fixtures())
}
