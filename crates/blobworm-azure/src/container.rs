//! `ContainerClient` over the Blob REST API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use blobworm_core::domain::{BlobPage, ContainerTarget, ImmutabilityProperties, StorageError};
use blobworm_core::ports::{BlobClient, ContainerClient};
use reqwest::{Method, Url};
use tracing::{debug, info, instrument};

use crate::blob::AzureBlobClient;
use crate::pipeline::{Pipeline, Request, header_bool};
use crate::settings::ClientSettings;
use crate::xml;

const LIST_INCLUDE: &str = "metadata,tags,immutabilitypolicy";

#[derive(Clone)]
pub struct AzureContainerClient {
    pipeline: Arc<Pipeline>,
    container: String,
    page_size: Option<u32>,
}

impl AzureContainerClient {
    /// Builds a client and checks that the container exists. The check is
    /// one request bounded by `settings.probe_timeout` instead of the
    /// per-request timeout.
    #[instrument(skip_all, fields(account = %target.account_name, container = %target.container_name))]
    pub async fn connect(
        target: &ContainerTarget,
        settings: &ClientSettings,
    ) -> Result<Self, StorageError> {
        let client = Self::build(target, settings)?;
        let properties = client
            .fetch_properties("check container existence", Some(settings.probe_timeout))
            .await?;
        info!(
            has_immutability_policy = properties.has_immutability_policy,
            "connected to container"
        );
        Ok(client)
    }

    pub(crate) fn build(
        target: &ContainerTarget,
        settings: &ClientSettings,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            pipeline: Arc::new(Pipeline::new(target, settings)?),
            container: target.container_name.clone(),
            page_size: settings.page_size,
        })
    }

    fn url(&self, operation: &'static str) -> Result<Url, StorageError> {
        self.pipeline.url(operation, &self.container, &[&self.container])
    }

    async fn fetch_properties(
        &self,
        operation: &'static str,
        timeout: Option<Duration>,
    ) -> Result<ImmutabilityProperties, StorageError> {
        let mut url = self.url(operation)?;
        url.query_pairs_mut().append_pair("restype", "container");

        let mut request = Request::new(operation, &self.container, Method::HEAD, url);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = self
            .pipeline
            .send(request)
            .await
            .map_err(|err| self.not_found(err))?;

        let headers = response.headers();
        Ok(ImmutabilityProperties {
            has_immutability_policy: header_bool(headers, "x-ms-has-immutability-policy"),
            has_legal_hold: header_bool(headers, "x-ms-has-legal-hold"),
            immutable_storage_with_versioning_enabled: header_bool(
                headers,
                "x-ms-immutable-storage-with-versioning-enabled",
            ),
        })
    }

    fn not_found(&self, err: StorageError) -> StorageError {
        match err {
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
}

#[async_trait]
impl ContainerClient for AzureContainerClient {
    fn container_name(&self) -> &str {
        &self.container
    }

    #[instrument(skip(self), fields(container = %self.container))]
    async fn check_immutability(&self) -> Result<ImmutabilityProperties, StorageError> {
        self.fetch_properties("get container properties", None).await
    }

    #[instrument(skip(self), fields(container = %self.container))]
    async fn list_blobs_page(&self, marker: Option<&str>) -> Result<BlobPage, StorageError> {
        const OPERATION: &str = "list blobs";

        let mut url = self.url(OPERATION)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("restype", "container")
                .append_pair("comp", "list")
                .append_pair("include", LIST_INCLUDE);
            if let Some(marker) = marker {
                query.append_pair("marker", marker);
            }
            if let Some(page_size) = self.page_size {
                query.append_pair("maxresults", &page_size.to_string());
            }
        }

        let response = self
            .pipeline
            .send(Request::new(OPERATION, &self.container, Method::GET, url))
            .await
            .map_err(|err| self.not_found(err))?;
        let body = self.pipeline.text(OPERATION, &self.container, response).await?;

        let page = xml::parse_list_blobs(&body).map_err(|reason| StorageError::Malformed {
            operation: OPERATION,
            target: self.container.clone(),
            reason,
        })?;
        debug!(
            blobs = page.blobs.len(),
            more = page.next_marker.is_some(),
            "listing page received"
        );
        Ok(page)
    }

    fn blob_client(&self, blob_name: &str) -> Box<dyn BlobClient> {
        Box::new(AzureBlobClient::new(
            Arc::clone(&self.pipeline),
            self.container.clone(),
            blob_name.to_string(),
        ))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::settings::API_VERSION;
    use blobworm_core::domain::Secret;
    use mockito::{Matcher, Server};
    use std::time::Instant;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    pub(crate) const KEY: &str = "YmxvYndvcm0tdGVzdC1rZXk=";

    pub(crate) fn target() -> ContainerTarget {
        ContainerTarget {
            account_name: "acct".to_string(),
            account_key: Secret::new(KEY),
            container_name: "c1".to_string(),
        }
    }

    pub(crate) fn settings(endpoint: String) -> ClientSettings {
        ClientSettings {
            endpoint: Some(endpoint),
            ..ClientSettings::default()
        }
    }

    fn listing(names: &[&str], next_marker: &str) -> String {
        let blobs: String = names
            .iter()
            .map(|n| format!("<Blob><Name>{n}</Name><Properties/><Tags><TagSet/></Tags></Blob>"))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?><EnumerationResults ContainerName="c1"><Blobs>{blobs}</Blobs><NextMarker>{next_marker}</NextMarker></EnumerationResults>"#
        )
    }

    #[tokio::test]
    async fn connect_probes_the_container() {
        let mut server = Server::new_async().await;
        let probe = server
            .mock("HEAD", "/c1")
            .match_query(Matcher::UrlEncoded("restype".into(), "container".into()))
            .match_header("x-ms-version", API_VERSION)
            .match_header("x-ms-date", Matcher::Regex(r" GMT$".into()))
            .match_header("authorization", Matcher::Regex(r"^SharedKey acct:.+".into()))
            .with_status(200)
            .with_header("x-ms-has-immutability-policy", "true")
            .with_header("x-ms-has-legal-hold", "false")
            .expect(2)
            .create_async()
            .await;

        let client = AzureContainerClient::connect(&target(), &settings(server.url()))
            .await
            .unwrap();
        let props = client.check_immutability().await.unwrap();

        assert!(props.has_immutability_policy);
        assert!(!props.has_legal_hold);
        assert!(!props.immutable_storage_with_versioning_enabled);
        probe.assert_async().await;
    }

    /// Accepts connections and never answers them.
    async fn silent_endpoint() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn connect_waits_for_the_probe_timeout_not_the_request_timeout() {
        let settings = ClientSettings {
            endpoint: Some(silent_endpoint().await),
            request_timeout: Duration::from_millis(100),
            probe_timeout: Duration::from_millis(600),
            page_size: None,
        };

        let started = Instant::now();
        let err = AzureContainerClient::connect(&target(), &settings)
            .await
            .err()
            .unwrap();
        let elapsed = started.elapsed();

        assert!(
            matches!(
                err,
                StorageError::Timeout { operation: "check container existence", timeout, .. }
                    if timeout == Duration::from_millis(600)
            ),
            "{err}"
        );
        assert!(elapsed >= Duration::from_millis(500), "gave up after {elapsed:?}");
    }

    #[tokio::test]
    async fn other_requests_use_the_request_timeout() {
        let settings = ClientSettings {
            endpoint: Some(silent_endpoint().await),
            request_timeout: Duration::from_millis(100),
            probe_timeout: Duration::from_secs(30),
            page_size: None,
        };

        let client = AzureContainerClient::build(&target(), &settings).unwrap();
        let err = client.check_immutability().await.unwrap_err();

        assert!(
            matches!(err, StorageError::Timeout { timeout, .. } if timeout == Duration::from_millis(100)),
            "{err}"
        );
    }

    #[tokio::test]
    async fn truncated_error_body_keeps_status_and_header_code() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let _ = socket.read(&mut buf).await;
            let head = "HTTP/1.1 500 Internal Server Error\r\nx-ms-error-code: InternalError\r\ncontent-length: 200\r\n\r\n<Error><Co";
            let _ = socket.write_all(head.as_bytes()).await;
        });

        let client = AzureContainerClient::build(&target(), &settings(format!("http://{addr}"))).unwrap();
        let err = client.list_blobs_page(None).await.unwrap_err();

        assert!(
            matches!(
                err,
                StorageError::Service { status: 500, ref code, ref message, .. }
                    if code == "InternalError" && message == "Internal Server Error"
            ),
            "{err}"
        );
    }

    #[tokio::test]
    async fn connect_reports_missing_container() {
        let mut server = Server::new_async().await;
        server
            .mock("HEAD", "/c1")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_header("x-ms-error-code", "ContainerNotFound")
            .create_async()
            .await;

        let err = AzureContainerClient::connect(&target(), &settings(server.url()))
            .await
            .err()
            .unwrap();
        assert!(
            matches!(err, StorageError::ContainerNotFound { ref container } if container == "c1"),
            "{err}"
        );
    }

    #[tokio::test]
    async fn connect_rejects_a_bad_key_without_a_request() {
        let mut server = Server::new_async().await;
        let probe = server
            .mock("HEAD", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let mut bad = target();
        bad.account_key = Secret::new("not base64!");
        let err = AzureContainerClient::connect(&bad, &settings(server.url()))
            .await
            .err()
            .unwrap();

        assert!(matches!(err, StorageError::InvalidCredential { .. }), "{err}");
        probe.assert_async().await;
    }

    #[tokio::test]
    async fn list_blobs_follows_markers() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("GET", "/c1")
            .match_query(Matcher::Exact(
                "restype=container&comp=list&include=metadata%2Ctags%2Cimmutabilitypolicy&maxresults=2"
                    .into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/xml")
            .with_body(listing(&["a", "b"], "m1"))
            .create_async()
            .await;
        let second = server
            .mock("GET", "/c1")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("comp".into(), "list".into()),
                Matcher::UrlEncoded("marker".into(), "m1".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/xml")
            .with_body(listing(&["c"], ""))
            .create_async()
            .await;

        let mut settings = settings(server.url());
        settings.page_size = Some(2);
        let client = AzureContainerClient::build(&target(), &settings).unwrap();
        let blobs = client.list_blobs().await.unwrap();

        let names: Vec<_> = blobs.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert!(blobs.iter().all(|b| b.tags == Some(Vec::new())));
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn listing_errors_carry_the_service_code() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/c1")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body(
                r#"<?xml version="1.0" encoding="utf-8"?><Error><Code>AuthenticationFailed</Code><Message>Server failed to authenticate the request.</Message></Error>"#,
            )
            .create_async()
            .await;

        let client = AzureContainerClient::build(&target(), &settings(server.url())).unwrap();
        let err = client.list_blobs().await.unwrap_err();

        assert_eq!(err.code(), Some("AuthenticationFailed"));
        assert!(matches!(err, StorageError::Service { status: 403, .. }), "{err}");
    }

    #[tokio::test]
    async fn malformed_listing_is_reported() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/c1")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<EnumerationResults><Blobs><Blob>")
            .create_async()
            .await;

        let client = AzureContainerClient::build(&target(), &settings(server.url())).unwrap();
        let err = client.list_blobs_page(None).await.unwrap_err();
        assert!(matches!(err, StorageError::Malformed { operation: "list blobs", .. }), "{err}");
    }
}
