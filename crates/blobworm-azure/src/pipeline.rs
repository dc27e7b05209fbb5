//! Request pipeline: stamps date/version headers, signs, sends, and turns
//! non-success responses into `StorageError::Service`.

use std::time::Duration;

use blobworm_core::domain::{ContainerTarget, StorageError};
use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Response, Url};
use tracing::debug;

use crate::auth::SharedKeyCredential;
use crate::settings::{API_VERSION, ClientSettings};
use crate::xml;

pub(crate) const ERROR_CODE_HEADER: &str = "x-ms-error-code";

/// One request before signing.
pub(crate) struct Request<'a> {
    operation: &'static str,
    target: &'a str,
    method: Method,
    url: Url,
    headers: Vec<(HeaderName, String)>,
    body: Option<String>,
    timeout: Option<Duration>,
}

impl<'a> Request<'a> {
    pub(crate) fn new(operation: &'static str, target: &'a str, method: Method, url: Url) -> Self {
        Self {
            operation,
            target,
            method,
            url,
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub(crate) fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((HeaderName::from_static(name), value.into()));
        self
    }

    /// Replaces the client-wide request timeout for this request only.
    pub(crate) fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// XML request body.
    pub(crate) fn xml_body(mut self, body: String) -> Self {
        self.body = Some(body);
        self
    }
}

pub(crate) struct Pipeline {
    http: reqwest::Client,
    credential: SharedKeyCredential,
    base: Url,
    request_timeout: Duration,
}

impl Pipeline {
    pub(crate) fn new(target: &ContainerTarget, settings: &ClientSettings) -> Result<Self, StorageError> {
        let credential = SharedKeyCredential::new(&target.account_name, &target.account_key)?;

        let endpoint = settings.endpoint_for(&target.account_name);
        let base = Url::parse(&endpoint).map_err(|e| StorageError::InvalidEndpoint {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(StorageError::InvalidEndpoint {
                endpoint,
                reason: "endpoint cannot carry a path".to_string(),
            });
        }

        // Every request carries its own timeout; see `send`.
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| StorageError::Transport {
                operation: "build http client",
                target: endpoint.clone(),
                source: Box::new(e),
            })?;

        Ok(Self {
            http,
            credential,
            base,
            request_timeout: settings.request_timeout,
        })
    }

    /// Endpoint URL with `segments` appended as percent-encoded path
    /// segments.
    ///
    /// URL parsing resolves `.`/`..` segments (also when percent-encoded)
    /// and strips tab, CR and LF, so such segments are rejected rather than
    /// addressing a different resource.
    pub(crate) fn url(
        &self,
        operation: &'static str,
        target: &str,
        segments: &[&str],
    ) -> Result<Url, StorageError> {
        if let Some(bad) = segments.iter().find(|s| !is_addressable(s)) {
            return Err(StorageError::InvalidRequest {
                operation,
                target: target.to_string(),
                reason: format!("path segment {bad:?} cannot be carried in a URL"),
            });
        }

        let mut url = self.base.clone();
        // cannot_be_a_base was rejected in `new`, so this always succeeds.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    pub(crate) async fn send(&self, request: Request<'_>) -> Result<Response, StorageError> {
        let Request {
            operation,
            target,
            method,
            url,
            headers: extra,
            body,
            timeout,
        } = request;
        let timeout = timeout.unwrap_or(self.request_timeout);
        let invalid = |reason: String| StorageError::Malformed {
            operation,
            target: target.to_string(),
            reason,
        };

        let mut headers = HeaderMap::new();
        for (name, value) in extra {
            let value = HeaderValue::from_str(&value)
                .map_err(|e| invalid(format!("invalid value for header {name}: {e}")))?;
            headers.insert(name, value);
        }
        let date = HeaderValue::from_str(&format_http_date(Utc::now()))
            .map_err(|e| invalid(format!("invalid x-ms-date: {e}")))?;
        headers.insert("x-ms-date", date);
        headers.insert("x-ms-version", HeaderValue::from_static(API_VERSION));

        // PUT needs an explicit length even when empty.
        let body = match body {
            Some(body) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/xml; charset=utf-8"));
                Some(body)
            }
            None if method == Method::PUT => Some(String::new()),
            None => None,
        };
        if let Some(body) = &body {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        }

        let authorization = self.credential.authorization(&method, &url, &headers)?;
        let authorization = HeaderValue::from_str(&authorization)
            .map_err(|e| invalid(format!("invalid authorization header: {e}")))?;
        headers.insert(AUTHORIZATION, authorization);

        debug!(operation, target, %method, url = %url, "sending request");
        let mut builder = self
            .http
            .request(method, url)
            .headers(headers)
            .timeout(timeout);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                StorageError::Timeout {
                    operation,
                    target: target.to_string(),
                    timeout,
                }
            } else {
                StorageError::Transport {
                    operation,
                    target: target.to_string(),
                    source: Box::new(e),
                }
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let header_code = header(response.headers(), ERROR_CODE_HEADER).map(str::to_string);
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                debug!(operation, target, %status, error = %e, "error body could not be read");
                String::new()
            }
        };
        let parsed = xml::parse_error_body(&text);
        let reason = status.canonical_reason().unwrap_or("unexpected status");
        let err = StorageError::Service {
            operation,
            target: target.to_string(),
            status: status.as_u16(),
            code: header_code
                .or(parsed.code)
                .unwrap_or_else(|| "Unknown".to_string()),
            message: parsed
                .message
                .and_then(|m| m.lines().next().map(str::to_string))
                .unwrap_or_else(|| reason.to_string()),
        };
        debug!(operation, target, error = %err, "request rejected");
        Err(err)
    }

    /// Reads a successful response body.
    pub(crate) async fn text(
        &self,
        operation: &'static str,
        target: &str,
        response: Response,
    ) -> Result<String, StorageError> {
        response.text().await.map_err(|e| StorageError::Transport {
            operation,
            target: target.to_string(),
            source: Box::new(e),
        })
    }
}

fn is_addressable(segment: &str) -> bool {
    !matches!(segment, "." | "..") && !segment.contains(['\t', '\n', '\r'])
}

pub(crate) fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Absent or anything but `true` reads as false.
pub(crate) fn header_bool(headers: &HeaderMap, name: &str) -> bool {
    header(headers, name).is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}

/// RFC 1123 date as used in `x-ms-date` and immutability headers.
pub(crate) fn format_http_date(t: DateTime<Utc>) -> String {
    t.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

pub(crate) fn parse_http_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(s.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
