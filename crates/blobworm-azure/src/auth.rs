//! Shared Key request signing for the Blob service.
//!
//! Signature = Base64(HMAC-SHA256(base64-decoded key, string-to-sign)), sent
//! as `Authorization: SharedKey {account}:{signature}`.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use blobworm_core::domain::{Secret, StorageError};
use hmac::{Hmac, Mac};
use reqwest::header::HeaderMap;
use reqwest::{Method, Url};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Standard headers that take a fixed slot in the string-to-sign, in order.
const SIGNED_STANDARD_HEADERS: [&str; 11] = [
    "content-encoding",
    "content-language",
    "content-length",
    "content-md5",
    "content-type",
    "date",
    "if-modified-since",
    "if-match",
    "if-none-match",
    "if-unmodified-since",
    "range",
];

#[derive(Clone)]
pub struct SharedKeyCredential {
    account: String,
    key: Vec<u8>,
}

impl std::fmt::Debug for SharedKeyCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedKeyCredential")
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

impl SharedKeyCredential {
    /// Decodes the base64 account key. Fails without any network access.
    pub fn new(account: impl Into<String>, key: &Secret) -> Result<Self, StorageError> {
        let account = account.into();
        let key = STANDARD
            .decode(key.expose().trim())
            .map_err(|e| StorageError::InvalidCredential {
                account: account.clone(),
                reason: format!("account key is not valid base64: {e}"),
            })?;
        if key.is_empty() {
            return Err(StorageError::InvalidCredential {
                account,
                reason: "account key is empty".to_string(),
            });
        }
        Ok(Self { account, key })
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Value of the `Authorization` header for a request that already
    /// carries all of its headers (including `x-ms-date`).
    pub fn authorization(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
    ) -> Result<String, StorageError> {
        let to_sign = string_to_sign(&self.account, method, url, headers);
        let mut mac =
            HmacSha256::new_from_slice(&self.key).map_err(|e| StorageError::InvalidCredential {
                account: self.account.clone(),
                reason: e.to_string(),
            })?;
        mac.update(to_sign.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());
        Ok(format!("SharedKey {}:{}", self.account, signature))
    }
}

pub(crate) fn string_to_sign(account: &str, method: &Method, url: &Url, headers: &HeaderMap) -> String {
    let mut out = String::new();
    out.push_str(method.as_str());
    out.push('\n');
    for name in SIGNED_STANDARD_HEADERS {
        let value = header_str(headers, name);
        // Since 2015-02-21 a zero length is signed as an empty string.
        if name == "content-length" && value == "0" {
            out.push('\n');
            continue;
        }
        out.push_str(value);
        out.push('\n');
    }
    out.push_str(&canonicalized_headers(headers));
    out.push_str(&canonicalized_resource(account, url));
    out
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

fn canonicalized_headers(headers: &HeaderMap) -> String {
    let mut ms: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (name, value) in headers {
        let name = name.as_str();
        if !name.starts_with("x-ms-") {
            continue;
        }
        if let Ok(value) = value.to_str() {
            ms.entry(name).or_default().push(value.trim());
        }
    }
    let mut out = String::new();
    for (name, values) in ms {
        out.push_str(name);
        out.push(':');
        out.push_str(&values.join(","));
        out.push('\n');
    }
    out
}

fn canonicalized_resource(account: &str, url: &Url) -> String {
    let mut out = format!("/{}{}", account, url.path());
    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in url.query_pairs() {
        params
            .entry(name.to_lowercase())
            .or_default()
            .push(value.into_owned());
    }
    for (name, mut values) in params {
        values.sort();
        out.push('\n');
        out.push_str(&name);
        out.push(':');
        out.push_str(&values.join(","));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    /// base64("blobworm-test-key")
    const TEST_KEY: &str = "YmxvYndvcm0tdGVzdC1rZXk=";

    fn list_request() -> (Url, HeaderMap) {
        let url = Url::parse(
            "https://acct.blob.core.windows.net/c1?restype=container&comp=list&include=metadata%2Ctags%2Cimmutabilitypolicy",
        )
        .unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-ms-date", HeaderValue::from_static("Mon, 19 Oct 2026 08:00:00 GMT"));
        headers.insert("x-ms-version", HeaderValue::from_static("2021-12-02"));
        (url, headers)
    }

    #[test]
    fn string_to_sign_layout() {
        let (url, headers) = list_request();
        let s = string_to_sign("acct", &Method::GET, &url, &headers);
        let expected = "GET\n\n\n\n\n\n\n\n\n\n\n\n\
            x-ms-date:Mon, 19 Oct 2026 08:00:00 GMT\n\
            x-ms-version:2021-12-02\n\
            /acct/c1\n\
            comp:list\n\
            include:metadata,tags,immutabilitypolicy\n\
            restype:container";
        assert_eq!(s, expected);
    }

    #[test]
    fn zero_content_length_is_signed_empty() {
        let url = Url::parse("https://acct.blob.core.windows.net/c1/a.txt?comp=immutabilityPolicies").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("content-length", HeaderValue::from_static("0"));
        headers.insert("x-ms-date", HeaderValue::from_static("Mon, 19 Oct 2026 08:00:00 GMT"));

        let s = string_to_sign("acct", &Method::PUT, &url, &headers);
        assert!(s.starts_with("PUT\n\n\n\n\n"));
        assert!(s.ends_with("/acct/c1/a.txt\ncomp:immutabilityPolicies"));
    }

    #[test]
    fn content_headers_take_their_slots() {
        let url = Url::parse("https://acct.blob.core.windows.net/c1/a.txt?comp=tags").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("content-length", HeaderValue::from_static("42"));
        headers.insert("content-type", HeaderValue::from_static("application/xml"));

        let s = string_to_sign("acct", &Method::PUT, &url, &headers);
        assert!(s.starts_with("PUT\n\n\n42\n\napplication/xml\n"));
    }

    #[test]
    fn known_signature() {
        let credential = SharedKeyCredential::new("acct", &Secret::new(TEST_KEY)).unwrap();
        let (url, headers) = list_request();

        let auth = credential.authorization(&Method::GET, &url, &headers).unwrap();
        assert_eq!(auth, "SharedKey acct:MIiOO/DlJG+t5CfIsP++qtLxfhu267QiloNxSvXcn94=");
    }

    #[test]
    fn invalid_key_is_rejected() {
        let err = SharedKeyCredential::new("acct", &Secret::new("not base64!")).unwrap_err();
        assert!(matches!(err, StorageError::InvalidCredential { .. }));

        let err = SharedKeyCredential::new("acct", &Secret::new("")).unwrap_err();
        assert!(matches!(err, StorageError::InvalidCredential { .. }));
    }

    #[test]
    fn debug_does_not_leak_the_key() {
        let credential = SharedKeyCredential::new("acct", &Secret::new(TEST_KEY)).unwrap();
        let debug = format!("{credential:?}");
        assert!(debug.contains("acct"));
        assert!(!debug.contains("key: ["));
    }
}
