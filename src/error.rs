// Error taxonomy shared by the loader, the filters and the sections.
use crate::types::Dataset;
use thiserror::Error;

/// A dataset could not be fetched or did not match its schema.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to fetch {dataset} from {location}: {reason}")]
    Fetch {
        dataset: Dataset,
        location: String,
        reason: String,
    },
    #[error("{dataset} is missing required column(s): {}", missing.join(", "))]
    Schema {
        dataset: Dataset,
        missing: Vec<String>,
    },
    #[error("{dataset} row {row} could not be parsed: {reason}")]
    Parse {
        dataset: Dataset,
        row: usize,
        reason: String,
    },
    #[error("{dataset} repeats {column} = {value} at row {row}")]
    Duplicate {
        dataset: Dataset,
        column: &'static str,
        value: String,
        row: usize,
    },
    #[error("{dataset} was cached with a different row type")]
    TypeMismatch { dataset: Dataset },
}

/// A lookup that must match exactly one row matched none.
#[derive(Debug, Error, PartialEq)]
pub enum LookupError {
    #[error("no {dataset} row for year {year}")]
    YearNotFound { dataset: Dataset, year: i32 },
    #[error("no year selected ({dataset} has no rows)")]
    NoYearSelected { dataset: Dataset },
    #[error("{dataset} has no row where {column} = {value:?}")]
    CategoryNotFound {
        dataset: Dataset,
        column: &'static str,
        value: String,
    },
    #[error("{dataset} has no rows to average")]
    NoRows { dataset: Dataset },
}

/// Anything that can stop a single section from rendering.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
}
