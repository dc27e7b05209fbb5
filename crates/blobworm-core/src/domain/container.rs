//! Container - 接続先とコンテナ単位の immutability フラグ

use std::fmt;

use serde::{Deserialize, Serialize};

/// Secret は `Debug`/`Display` で値を出さない文字列
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// 生の値（必要なのはリクエスト署名だけ）
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// ContainerTarget は接続先コンテナと認証情報
///
/// resolver が構築した時点で 3 フィールドとも空ではない
#[derive(Debug, Clone)]
pub struct ContainerTarget {
    pub account_name: String,
    pub account_key: Secret,
    pub container_name: String,
}

/// ImmutabilityProperties はコンテナ単位の immutability フラグ
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImmutabilityProperties {
    pub has_immutability_policy: bool,
    pub has_legal_hold: bool,
    pub immutable_storage_with_versioning_enabled: bool,
}
