//! Command-line surface.

use std::time::Duration;

use blobworm_azure::ClientSettings;
use blobworm_core::app::{DEFAULT_EXTENSION_DAYS, MAX_EXTENSION_DAYS, RunOptions};
use blobworm_core::domain::Operations;
use clap::{Parser, value_parser};

/// Lists the blobs of a container, tags them, and optionally extends their
/// immutability policy and deletes them.
///
/// Credentials come from AZURE_ACCOUNT_NAME, AZURE_ACCOUNT_KEY and
/// AZURE_CONTAINER_NAME (a `.env` file is read first when present).
#[derive(Debug, Parser)]
#[command(name = "blobworm", version)]
pub struct Cli {
    /// Passes to run after tagging: `extend`, `delete`. Other words are
    /// ignored with a warning.
    #[arg(value_name = "OPERATION")]
    pub operations: Vec<String>,

    /// Days from now the extension pass sets as the new expiry.
    #[arg(
        long,
        default_value_t = DEFAULT_EXTENSION_DAYS,
        value_parser = value_parser!(u32).range(1..=i64::from(MAX_EXTENSION_DAYS))
    )]
    pub extend_days: u32,

    /// Blob endpoint override, e.g. an Azurite URL.
    #[arg(long, env = "AZURE_BLOB_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Upper bound for each HTTP request.
    #[arg(long, default_value_t = 10, value_parser = value_parser!(u64).range(1..))]
    pub request_timeout_secs: u64,

    /// Blobs per listing page (service default when unset).
    #[arg(long, value_parser = value_parser!(u32).range(1..=5000))]
    pub page_size: Option<u32>,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Selected operations plus the words that were not recognised.
    pub fn run_options(&self) -> (RunOptions, Vec<String>) {
        let (operations, ignored) = Operations::from_words(&self.operations);
        let options = RunOptions {
            operations,
            extension_days: self.extend_days,
        };
        (options, ignored)
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            endpoint: self.endpoint.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            page_size: self.page_size,
            ..ClientSettings::default()
        }
    }
}
