//! Errors - 設定エラーとストレージエラー
//!
//! # 分類
//! - ConfigError: 起動時の設定不足（致命的、ネットワークに触れる前に失敗）
//! - StorageError: ストレージ層のエラー（操作名と対象を必ず保持する）

use std::error::Error as StdError;
use std::time::Duration;

use thiserror::Error;

/// 通信エラーを保持するための Box 化エラー（コアを HTTP クライアントに依存させない）
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// ConfigError は接続先の解決エラー
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no {what} was provided (set {var})")]
    Missing {
        var: &'static str,
        what: &'static str,
    },
}

/// StorageError はストレージサービスとのやり取りで起きたエラー
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid shared key credential for account {account}: {reason}")]
    InvalidCredential { account: String, reason: String },

    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("container {container} does not exist")]
    ContainerNotFound { container: String },

    #[error("blob {blob} does not exist")]
    BlobNotFound { blob: String },

    #[error("{operation} on {target} failed with status {status} ({code}): {message}")]
    Service {
        operation: &'static str,
        target: String,
        status: u16,
        code: String,
        message: String,
    },

    #[error("{operation} on {target} failed")]
    Transport {
        operation: &'static str,
        target: String,
        #[source]
        source: BoxError,
    },

    #[error("{operation} on {target} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        target: String,
        timeout: Duration,
    },

    #[error("{operation} on {target} returned a malformed response: {reason}")]
    Malformed {
        operation: &'static str,
        target: String,
        reason: String,
    },

    #[error("{operation} on {target} was not sent: {reason}")]
    InvalidRequest {
        operation: &'static str,
        target: String,
        reason: String,
    },

    #[error("{operation} is not supported: {reason}")]
    Unsupported {
        operation: &'static str,
        reason: &'static str,
    },
}

impl StorageError {
    /// サービスが返したエラーコード（あれば）
    pub fn code(&self) -> Option<&str> {
        match self {
            StorageError::Service { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }
}

/// エラーを source チェーンごと 1 行にまとめる
pub fn report(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_includes_the_wrapped_error() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset");
        let err = StorageError::Transport {
            operation: "set tags",
            target: "c1/a.txt".to_string(),
            source: Box::new(io),
        };

        assert_eq!(report(&err), "set tags on c1/a.txt failed: connection reset");
        assert!(err.source().is_some());
    }

    #[test]
    fn missing_config_names_the_variable() {
        let err = ConfigError::Missing {
            var: "AZURE_ACCOUNT_KEY",
            what: "account key",
        };
        assert_eq!(err.to_string(), "no account key was provided (set AZURE_ACCOUNT_KEY)");
    }

    #[test]
    fn code_is_only_present_for_service_errors() {
        let err = StorageError::Service {
            operation: "delete blob",
            target: "c1/a.txt".to_string(),
            status: 409,
            code: "BlobImmutableDueToPolicy".to_string(),
            message: "blob is immutable".to_string(),
        };
        assert_eq!(err.code(), Some("BlobImmutableDueToPolicy"));

        let err = StorageError::BlobNotFound {
            blob: "a.txt".to_string(),
        };
        assert_eq!(err.code(), None);
    }
}
