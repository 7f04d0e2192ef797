// Where dataset bytes come from: a remote base URL or a local directory.
use crate::error::LoadError;
use crate::types::Dataset;
use reqwest::blocking::Client;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Produces the CSV text for one dataset. Implementations must be safe to
/// share between sessions.
pub trait DataSource: Send + Sync {
    fn fetch(&self, dataset: Dataset) -> Result<String, LoadError>;

    /// Human readable location used in log lines and error messages.
    fn describe(&self, dataset: Dataset) -> String;
}

pub struct HttpSource {
    client: Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(HttpSource {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl DataSource for HttpSource {
    fn fetch(&self, dataset: Dataset) -> Result<String, LoadError> {
        let url = self.describe(dataset);
        debug!(%url, "GET");
        let fail = |e: reqwest::Error| LoadError::Fetch {
            dataset,
            location: url.clone(),
            reason: e.to_string(),
        };
        self.client
            .get(&url)
            .send()
            .map_err(fail)?
            .error_for_status()
            .map_err(fail)?
            .text()
            .map_err(fail)
    }

    fn describe(&self, dataset: Dataset) -> String {
        format!("{}/{}", self.base_url, dataset.file_name())
    }
}

pub struct DirSource {
    dir: PathBuf,
}

impl DirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirSource { dir: dir.into() }
    }
}

impl DataSource for DirSource {
    fn fetch(&self, dataset: Dataset) -> Result<String, LoadError> {
        let path = self.dir.join(dataset.file_name());
        debug!(path = %path.display(), "read");
        fs::read_to_string(&path).map_err(|e| LoadError::Fetch {
            dataset,
            location: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    fn describe(&self, dataset: Dataset) -> String {
        self.dir.join(dataset.file_name()).display().to_string()
    }
}
