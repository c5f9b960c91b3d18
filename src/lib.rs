pub mod config;
pub mod number_formatter;
pub mod permission;
pub mod report;
pub mod server;
pub mod store;
pub mod tui;
pub mod viewer;

use chrono::NaiveDate;
use permission::{Permission, PermissionGate};
use report::{Report, ReportOptions};
use serde::{Deserialize, Serialize};
use std::num::ParseIntError;
use std::path::PathBuf;
use store::{SpendStore, StoreError};
use thiserror::Error;

/// Date format shown to the user and stored inside each record.
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Date format used for the record key under the `spends` collection.
pub const KEY_FORMAT: &str = "%d%m%Y";

/// One spending record as it is stored remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendEntry {
    pub date: String,
    pub amount: String,
    pub cause: String,
}

impl SpendEntry {
    pub fn amount_value(&self) -> Result<u64, AppError> {
        self.amount
            .trim()
            .parse()
            .map_err(|source| AppError::InvalidStoredAmount {
                date: self.date.clone(),
                amount: self.amount.clone(),
                source,
            })
    }
}

/// Raw text of the entry form, exactly as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryForm {
    pub date: String,
    pub amount: String,
    pub cause: String,
}

impl EntryForm {
    pub fn new(
        date: impl Into<String>,
        amount: impl Into<String>,
        cause: impl Into<String>,
    ) -> Self {
        Self {
            date: date.into(),
            amount: amount.into(),
            cause: cause.into(),
        }
    }

    /// Checks the form and returns the store key together with the entry to write.
    pub fn validate(&self) -> Result<(String, SpendEntry), AppError> {
        let date = self.date.trim();
        let amount = self.amount.trim();
        let cause = self.cause.trim();

        if date.is_empty() || amount.is_empty() || cause.is_empty() {
            return Err(AppError::MissingFields);
        }

        let amount: u64 = amount.parse().map_err(|source| AppError::InvalidAmount {
            source,
            input: amount.to_string(),
        })?;
        let date = parse_date(date)?;

        let entry = SpendEntry {
            date: date.format(DATE_FORMAT).to_string(),
            amount: amount.to_string(),
            cause: cause.to_string(),
        };
        Ok((entry_key(date), entry))
    }
}

pub fn parse_date(input: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(input, DATE_FORMAT).map_err(|source| AppError::InvalidDate {
        source,
        input: input.to_string(),
    })
}

/// Key of the record for `date`. Entries sharing a date share a key.
pub fn entry_key(date: NaiveDate) -> String {
    date.format(KEY_FORMAT).to_string()
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Please fill in all fields")]
    MissingFields,

    #[error("Please ensure all fields are correctly filled. Error: {source}")]
    InvalidAmount {
        source: ParseIntError,
        input: String,
    },

    #[error("Please ensure all fields are correctly filled. Error: {source}")]
    InvalidDate {
        source: chrono::format::ParseError,
        input: String,
    },

    #[error("Failed to save data")]
    SaveFailed(#[source] StoreError),

    #[error("The read failed: {0}")]
    ReadFailed(#[source] StoreError),

    #[error("Invalid amount '{amount}' stored for {date}")]
    InvalidStoredAmount {
        date: String,
        amount: String,
        source: ParseIntError,
    },

    #[error("Total amount is too large")]
    TotalOverflow,

    #[error("No remote store configured, set `store.url` or pass --store-url")]
    StoreNotConfigured,

    #[error("Invalid store URL: {0}")]
    InvalidStoreUrl(#[source] StoreError),

    #[error("External storage is not available")]
    StorageUnavailable,

    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    #[error("Failed to create PDF: {0}")]
    Pdf(String),

    #[error("PDF file does not exist: {}", .0.display())]
    MissingReport(PathBuf),

    #[error("No application available to view PDF")]
    NoViewer,

    #[error("Storage permission is required to create PDF")]
    PermissionDenied,

    #[error("Store emulator failed")]
    Emulator(#[source] std::io::Error),
}

/// Validates the form and writes one record. Nothing reaches the store unless
/// validation succeeds.
pub async fn save_entry<S: SpendStore>(store: &S, form: &EntryForm) -> Result<SpendEntry, AppError> {
    let (key, entry) = form.validate()?;
    tracing::debug!(%key, "saving entry");
    store
        .put(&key, &entry)
        .await
        .map_err(AppError::SaveFailed)?;
    tracing::info!(%key, amount = %entry.amount, "entry saved");
    Ok(entry)
}

#[derive(Debug)]
pub struct GeneratedReport {
    pub path: PathBuf,
    pub report: Report,
}

/// Gate, fetch, build and write. The returned path is the file actually written.
pub async fn create_report<S: SpendStore>(
    store: &S,
    gate: &dyn PermissionGate,
    options: &ReportOptions,
) -> Result<GeneratedReport, AppError> {
    if gate.storage_write(&options.output_dir) == Permission::Denied {
        tracing::info!(dir = %options.output_dir.display(), "storage permission denied");
        return Err(AppError::PermissionDenied);
    }

    let entries = store.fetch_all().await.map_err(|err| {
        tracing::error!("The read failed: {err}");
        AppError::ReadFailed(err)
    })?;
    tracing::debug!(count = entries.len(), "fetched entries");

    let report = Report::from_entries(&entries)?;
    let timestamp = chrono::Local::now().naive_local();
    let path = report::write_report(&report, &options.output_dir, timestamp).await?;
    Ok(GeneratedReport { path, report })
}
