//! Connection settings for the Blob REST adapter.

use std::time::Duration;

/// REST API version sent as `x-ms-version`. Blob immutability policies and
/// tag listing need 2020-10-02 or later.
pub const API_VERSION: &str = "2021-12-02";

/// Host suffix of the public cloud blob endpoint.
pub const BLOB_ENDPOINT_SUFFIX: &str = "blob.core.windows.net";

#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Overrides `https://{account}.blob.core.windows.net`, e.g. an Azurite
    /// URL such as `http://127.0.0.1:10000/devstoreaccount1`.
    pub endpoint: Option<String>,

    /// Upper bound for one HTTP request.
    pub request_timeout: Duration,

    /// Upper bound for the existence probe made while connecting.
    pub probe_timeout: Duration,

    /// `maxresults` for listing pages; the service default (5000) when unset.
    pub page_size: Option<u32>,
}

impl ClientSettings {
    pub fn endpoint_for(&self, account: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://{account}.{BLOB_ENDPOINT_SUFFIX}"),
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            request_timeout: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(30),
            page_size: None,
        }
    }
}
