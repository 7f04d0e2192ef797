// Entry point and interactive terminal driver.
//
// Every menu action re-renders from the cached tables and the current
// filter state:
// - [1] loads all datasets and prints what was fetched.
// - [2]/[3] change the global year and district filters.
// - [4]/[5] render one tab or all tabs.
// - [6] exports the rendered dashboard as JSON.
// - [7] drops one dataset (or the whole cache) so it is fetched again.
mod config;
mod error;
mod filters;
mod loader;
mod output;
mod sections;
mod source;
mod types;
mod util;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use config::Config;
use filters::{district_options, year_options, FilterState};
use loader::{DatasetCache, Datasets};
use sections::SectionOutcome;
use source::{DataSource, DirSource, HttpSource};
use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use types::{Dataset, SectionKey};

struct App {
    datasets: Datasets,
    filters: Option<FilterState>,
    export_path: PathBuf,
}

/// Print `label` and read one trimmed line. `None` once stdin is closed.
fn prompt(label: &str) -> Option<String> {
    print!("{}", label);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    match io::stdin().read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

fn read_choice() -> Option<String> {
    prompt("Enter choice: ")
}

impl App {
    /// Current filters, deriving the defaults from the adoption and station
    /// tables the first time they are needed.
    fn filters(&mut self) -> &mut FilterState {
        let datasets = &self.datasets;
        self.filters
            .get_or_insert_with(|| FilterState::from_datasets(datasets))
    }

    /// Every tab rendered against the current filters; failures stay per tab.
    fn render_all(&mut self) -> (FilterState, Vec<SectionOutcome>) {
        let filters = self.filters().clone();
        let outcomes = sections::render_all(&self.datasets, &filters);
        (filters, outcomes)
    }

    fn export(&mut self) -> Result<usize, Box<dyn Error>> {
        let (filters, outcomes) = self.render_all();
        let export = output::dashboard_export(&filters, &outcomes);
        output::write_json(&self.export_path, &export)?;
        Ok(outcomes.iter().filter(|o| o.result.is_ok()).count())
    }

    /// Drop one dataset, or everything when `target` is `None`. Filters built
    /// from a dropped adoption or station table are rebuilt on next use.
    fn reload(&mut self, target: Option<Dataset>) {
        match target {
            Some(dataset) => self.datasets.cache().invalidate(dataset),
            None => self.datasets.cache().clear(),
        }
        if matches!(
            target,
            None | Some(Dataset::EvAdoption) | Some(Dataset::ChargingStations)
        ) {
            self.filters = None;
        }
    }

    fn handle_load(&mut self) {
        println!("Loading datasets...");
        let outcomes = self.datasets.load_all();
        println!("{}\n", output::load_summary_text(&outcomes));
        info!(
            fetches = self.datasets.cache().fetch_count(),
            cached = self.datasets.cache().loaded().len(),
            "load finished"
        );
        let failed = outcomes.iter().filter(|(_, r)| r.is_err()).count();
        if failed > 0 {
            println!("Note: {} dataset(s) failed to load.\n", failed);
        }
    }

    fn handle_select_year(&mut self) {
        let options = match self.datasets.ev_adoption() {
            Ok(ev) => year_options(&ev),
            Err(e) => {
                println!("Error: {}\n", e);
                return;
            }
        };
        let filters = self.filters();
        let listed: Vec<String> = options.iter().map(|y| y.to_string()).collect();
        println!("Available years: {}", listed.join(", "));
        let Some(input) = prompt("Select Year: ") else {
            return;
        };
        match input.parse::<i32>() {
            Ok(year) => {
                filters.select_year(year);
                if !options.contains(&year) {
                    println!("Note: {} is not in the adoption table.", year);
                }
                info!(year, "year selected");
                println!();
            }
            Err(_) => println!("Invalid year: {:?}\n", input),
        }
    }

    fn handle_select_districts(&mut self) {
        let options = match self.datasets.stations() {
            Ok(stations) => district_options(&stations),
            Err(e) => {
                println!("Error: {}\n", e);
                return;
            }
        };
        let filters = self.filters();
        for (i, d) in options.iter().enumerate() {
            let mark = if filters.includes_district(d) { "x" } else { " " };
            println!("[{}] ({}) {}", i + 1, mark, d);
        }
        let Some(input) =
            prompt("Select Districts (numbers or names, comma separated; 'all' or 'none'): ")
        else {
            return;
        };
        let selected: Vec<String> = match input.to_lowercase().as_str() {
            "all" => options.clone(),
            "none" | "" => Vec::new(),
            _ => input
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(|t| match t.parse::<usize>() {
                    Ok(n) if (1..=options.len()).contains(&n) => options[n - 1].clone(),
                    _ => t.to_string(),
                })
                .collect(),
        };
        filters.select_districts(selected);
        info!(count = filters.districts.len(), "districts selected");
        println!();
    }

    fn handle_view_section(&mut self) {
        for (i, key) in SectionKey::ALL.iter().enumerate() {
            println!("[{}] {}", i + 1, key.tab());
        }
        let Some(input) = read_choice() else {
            return;
        };
        let key = match input.parse::<usize>() {
            Ok(n) if (1..=SectionKey::ALL.len()).contains(&n) => SectionKey::ALL[n - 1],
            _ => {
                println!("Invalid choice. Please enter 1-{}.\n", SectionKey::ALL.len());
                return;
            }
        };
        let filters = self.filters().clone();
        output::print_header(&filters);
        let outcome = SectionOutcome {
            key,
            result: sections::render(key, &self.datasets, &filters),
        };
        output::print_outcome(&outcome);
    }

    fn handle_view_all(&mut self) {
        let (filters, outcomes) = self.render_all();
        output::print_header(&filters);
        for outcome in &outcomes {
            output::print_outcome(outcome);
        }
    }

    fn handle_export(&mut self) {
        match self.export() {
            Ok(rendered) => println!(
                "Dashboard exported to {} ({} of {} sections rendered)\n",
                self.export_path.display(),
                rendered,
                SectionKey::ALL.len()
            ),
            Err(e) => {
                error!(path = %self.export_path.display(), error = %e, "export failed");
                eprintln!("Write error: {}\n", e);
            }
        }
    }

    fn handle_reload(&mut self) {
        let Some(input) = prompt("Dataset to reload (file name, blank for all): ") else {
            return;
        };
        if input.is_empty() {
            self.reload(None);
            println!("Cache cleared; data will be fetched again on next view.\n");
            return;
        }
        match Dataset::ALL.iter().find(|d| d.file_name() == input) {
            Some(&dataset) => {
                self.reload(Some(dataset));
                println!("{} will be fetched again on next view.\n", dataset);
            }
            None => println!("Unknown dataset: {:?}\n", input),
        }
    }
}

fn build_source(cfg: &Config) -> Result<Box<dyn DataSource>> {
    Ok(match &cfg.data_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "reading datasets from directory");
            Box::new(DirSource::new(dir.clone()))
        }
        None => {
            info!(base_url = %cfg.base_url, "reading datasets from remote");
            Box::new(
                HttpSource::new(&cfg.base_url, cfg.http_timeout)
                    .context("building HTTP client")?,
            )
        }
    })
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let cfg = Config::from_env().context("reading configuration")?;
    let source = build_source(&cfg)?;
    let mut app = App {
        datasets: Datasets::new(DatasetCache::new(source, cfg.cache_ttl)),
        filters: None,
        export_path: cfg.export_path.clone(),
    };
    info!("startup");

    loop {
        println!("{}", sections::PAGE_TITLE);
        println!("[1] Load datasets");
        println!("[2] Select year");
        println!("[3] Select districts");
        println!("[4] View a section");
        println!("[5] View all sections");
        println!("[6] Export dashboard (JSON)");
        println!("[7] Reload data");
        println!("[0] Exit\n");
        let Some(choice) = read_choice() else {
            break;
        };
        match choice.as_str() {
            "1" => app.handle_load(),
            "2" => app.handle_select_year(),
            "3" => app.handle_select_districts(),
            "4" => app.handle_view_section(),
            "5" => app.handle_view_all(),
            "6" => app.handle_export(),
            "7" => app.handle_reload(),
            "0" => break,
            _ => println!("Invalid choice. Please enter 0-7.\n"),
        }
    }
    println!("Exiting the program.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{datasets_from, StubSource};
    use tempfile::tempdir;

    fn app(source: StubSource) -> App {
        App {
            datasets: datasets_from(source),
            filters: None,
            export_path: PathBuf::from("dashboard.json"),
        }
    }

    #[test]
    fn missing_station_table_still_renders_other_tabs() {
        let mut app = app(StubSource::with_fixtures().without(Dataset::ChargingStations));
        assert_eq!(app.filters().year, Some(2020));
        assert!(app.filters().districts.is_empty());

        let (_, outcomes) = app.render_all();
        assert_eq!(outcomes.len(), SectionKey::ALL.len());
        for o in &outcomes {
            match o.key {
                SectionKey::Overview | SectionKey::Infrastructure => {
                    let err = o.result.as_ref().unwrap_err().to_string();
                    assert!(err.contains("charging_stations.csv"), "{err}");
                }
                _ => assert!(o.result.is_ok(), "{:?} should render", o.key),
            }
        }
    }

    #[test]
    fn missing_adoption_table_still_renders_other_tabs() {
        let mut app = app(StubSource::with_fixtures().without(Dataset::EvAdoption));
        assert_eq!(app.filters().year, None);
        let (_, outcomes) = app.render_all();
        let ok: Vec<SectionKey> = outcomes
            .iter()
            .filter(|o| o.result.is_ok())
            .map(|o| o.key)
            .collect();
        assert_eq!(
            ok,
            vec![
                SectionKey::Infrastructure,
                SectionKey::EnergyGrid,
                SectionKey::PolicyInvestment,
                SectionKey::Feedback,
            ]
        );
    }

    #[test]
    fn export_writes_every_tab_when_a_table_is_missing() {
        let tmp = tempdir().unwrap();
        let mut app = app(StubSource::with_fixtures().without(Dataset::ChargingStations));
        app.export_path = tmp.path().join("dashboard.json");
        assert_eq!(app.export().unwrap(), 4);

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&app.export_path).unwrap()).unwrap();
        assert_eq!(json["sections"].as_array().unwrap().len(), 6);
    }

    #[test]
    fn reloading_filter_tables_resets_filters() {
        let mut app = app(StubSource::with_fixtures());
        app.filters().select_year(1999);
        app.filters().select_districts(["Gasabo"]);

        app.reload(Some(Dataset::Tariffs));
        assert_eq!(app.filters().year, Some(1999));

        app.reload(Some(Dataset::ChargingStations));
        assert_eq!(app.filters().year, Some(2020));
        assert_eq!(app.filters().districts.len(), 3);

        app.filters().select_year(2022);
        app.reload(None);
        assert_eq!(app.filters().year, Some(2020));
        assert!(app.datasets.cache().fetch_count() >= 4);
    }
}
