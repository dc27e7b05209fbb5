//! `BlobClient` over the Blob REST API.

use std::sync::Arc;

use async_trait::async_trait;
use blobworm_core::domain::{
    BlobProperties, ImmutabilityPolicy, ImmutabilityPolicyMode, StorageError, TagSet,
};
use blobworm_core::ports::BlobClient;
use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_LENGTH, HeaderMap, LAST_MODIFIED};
use reqwest::{Method, Url};
use tracing::{debug, instrument};

use crate::pipeline::{Pipeline, Request, format_http_date, header, header_bool, parse_http_date};
use crate::xml;

const UNTIL_DATE_HEADER: &str = "x-ms-immutability-policy-until-date";
const MODE_HEADER: &str = "x-ms-immutability-policy-mode";
const LEGAL_HOLD_HEADER: &str = "x-ms-legal-hold";

pub struct AzureBlobClient {
    pipeline: Arc<Pipeline>,
    container: String,
    name: String,
    /// `container/name`, used in errors and logs.
    target: String,
}

impl AzureBlobClient {
    pub(crate) fn new(pipeline: Arc<Pipeline>, container: String, name: String) -> Self {
        let target = format!("{container}/{name}");
        Self {
            pipeline,
            container,
            name,
            target,
        }
    }

    /// Blob URL; `/` in the name stays a path separator. Names with a
    /// `.`/`..` component cannot be addressed and fail here.
    fn url(&self, operation: &'static str) -> Result<Url, StorageError> {
        let mut segments = vec![self.container.as_str()];
        segments.extend(self.name.split('/'));
        self.pipeline.url(operation, &self.target, &segments)
    }

    fn url_with_comp(&self, operation: &'static str, comp: &str) -> Result<Url, StorageError> {
        let mut url = self.url(operation)?;
        url.query_pairs_mut().append_pair("comp", comp);
        Ok(url)
    }

    fn not_found(&self, err: StorageError) -> StorageError {
        match err {
            StorageError::Service {
                status: 404,
                ref code,
                ..
            } if code == "BlobNotFound" => StorageError::BlobNotFound {
                blob: self.name.clone(),
            },
            StorageError::Service {
                status: 404,
                ref code,
                ..
            } if code == "ContainerNotFound" => StorageError::ContainerNotFound {
                container: self.container.clone(),
            },
            other => other,
        }
    }

    fn malformed(&self, operation: &'static str, reason: String) -> StorageError {
        StorageError::Malformed {
            operation,
            target: self.target.clone(),
            reason,
        }
    }

    fn expiry(
        &self,
        operation: &'static str,
        headers: &HeaderMap,
    ) -> Result<Option<DateTime<Utc>>, StorageError> {
        header(headers, UNTIL_DATE_HEADER)
            .map(|raw| {
                parse_http_date(raw)
                    .ok_or_else(|| self.malformed(operation, format!("invalid {UNTIL_DATE_HEADER} {raw:?}")))
            })
            .transpose()
    }
}

#[async_trait]
impl BlobClient for AzureBlobClient {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(blob = %self.target))]
    async fn get_properties(&self) -> Result<BlobProperties, StorageError> {
        const OPERATION: &str = "get blob properties";

        let response = self
            .pipeline
            .send(Request::new(OPERATION, &self.target, Method::HEAD, self.url(OPERATION)?))
            .await
            .map_err(|err| self.not_found(err))?;

        let headers = response.headers();
        Ok(BlobProperties {
            name: self.name.clone(),
            expires_on: self.expiry(OPERATION, headers)?,
            policy_mode: header(headers, MODE_HEADER).and_then(ImmutabilityPolicyMode::parse_str),
            legal_hold: header_bool(headers, LEGAL_HOLD_HEADER),
            content_length: header(headers, CONTENT_LENGTH.as_str()).and_then(|v| v.parse().ok()),
            last_modified: header(headers, LAST_MODIFIED.as_str()).and_then(parse_http_date),
        })
    }

    #[instrument(skip(self), fields(blob = %self.target))]
    async fn set_immutability_policy(
        &self,
        until: DateTime<Utc>,
        mode: ImmutabilityPolicyMode,
    ) -> Result<ImmutabilityPolicy, StorageError> {
        const OPERATION: &str = "set immutability policy";

        let request = Request::new(
            OPERATION,
            &self.target,
            Method::PUT,
            self.url_with_comp(OPERATION, "immutabilityPolicies")?,
        )
        .header(UNTIL_DATE_HEADER, format_http_date(until))
        .header(MODE_HEADER, mode.as_str());

        let response = self
            .pipeline
            .send(request)
            .await
            .map_err(|err| self.not_found(err))?;

        let headers = response.headers();
        let expires_on = self
            .expiry(OPERATION, headers)?
            .ok_or_else(|| self.malformed(OPERATION, format!("response lacks {UNTIL_DATE_HEADER}")))?;
        let mode = header(headers, MODE_HEADER)
            .and_then(ImmutabilityPolicyMode::parse_str)
            .ok_or_else(|| self.malformed(OPERATION, format!("response lacks a valid {MODE_HEADER}")))?;

        debug!(%expires_on, %mode, "immutability policy confirmed");
        Ok(ImmutabilityPolicy { expires_on, mode })
    }

    #[instrument(skip(self, tags), fields(blob = %self.target, tags = tags.len()))]
    async fn set_tags(&self, tags: &TagSet) -> Result<(), StorageError> {
        const OPERATION: &str = "set blob tags";

        let url = self.url_with_comp(OPERATION, "tags")?;
        let request =
            Request::new(OPERATION, &self.target, Method::PUT, url).xml_body(xml::tags_body(tags));
        self.pipeline
            .send(request)
            .await
            .map_err(|err| self.not_found(err))?;
        Ok(())
    }

    #[instrument(skip(self), fields(blob = %self.target))]
    async fn delete(&self) -> Result<(), StorageError> {
        const OPERATION: &str = "delete blob";

        let request = Request::new(OPERATION, &self.target, Method::DELETE, self.url(OPERATION)?)
            .header("x-ms-delete-snapshots", "include");
        self.pipeline
            .send(request)
            .await
            .map_err(|err| self.not_found(err))?;
        Ok(())
    }
}
