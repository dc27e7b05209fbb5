//! Blob - Blob レコードと immutability ポリシー
//!
//! `BlobRecord` は一覧取得のたびに作られる一時的な値です。
//! 何も永続化せず、ストレージサービスが唯一の正です。

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// BlobTag は一覧で返される 1 つのタグ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobTag {
    pub key: String,
    pub value: String,
}

impl BlobTag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// ImmutabilityPolicyMode は Blob 単位ポリシーのモード
///
/// `Mutable` はサービスが報告するだけ（Unlocked のあと緩められたポリシー）。
/// クライアントが設定するのは `Unlocked` か `Locked`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImmutabilityPolicyMode {
    Unlocked,
    Locked,
    Mutable,
}

impl ImmutabilityPolicyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImmutabilityPolicyMode::Unlocked => "Unlocked",
            ImmutabilityPolicyMode::Locked => "Locked",
            ImmutabilityPolicyMode::Mutable => "Mutable",
        }
    }

    /// サービスの表記を解釈する（一覧は小文字、ヘッダは先頭大文字なので大小無視）
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unlocked" => Some(ImmutabilityPolicyMode::Unlocked),
            "locked" => Some(ImmutabilityPolicyMode::Locked),
            "mutable" => Some(ImmutabilityPolicyMode::Mutable),
            _ => None,
        }
    }
}

impl fmt::Display for ImmutabilityPolicyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ImmutabilityPolicy は設定・延長後にサービスが確定したポリシー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImmutabilityPolicy {
    pub expires_on: DateTime<Utc>,
    pub mode: ImmutabilityPolicyMode,
}

/// BlobRecord はコンテナ一覧の 1 件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobRecord {
    /// 1 回の一覧の中で一意
    pub name: String,

    /// ポリシー未設定なら None
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_on: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_mode: Option<ImmutabilityPolicyMode>,

    /// サービスが返した順のタグ。タグ要素がなければ None
    /// （タグを要求しても None になりうる）
    #[serde(default)]
    pub tags: Option<Vec<BlobTag>>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl BlobRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expires_on: None,
            policy_mode: None,
            tags: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_expiry(mut self, expires_on: DateTime<Utc>) -> Self {
        self.expires_on = Some(expires_on);
        self
    }

    pub fn with_tags(mut self, tags: Vec<BlobTag>) -> Self {
        self.tags = Some(tags);
        self
    }

    /// タグの値（タグ集合があり、キーが含まれる場合）
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .as_ref()?
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }
}

impl fmt::Display for BlobRecord {
    /// `[name <expiry> "k"="v" ]` 形式。欠けている部分は `<nil>`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} ", self.name)?;
        match &self.expires_on {
            Some(expiry) => write!(f, "{}", expiry)?,
            None => f.write_str("<nil>")?,
        }
        f.write_str(" ")?;
        match &self.tags {
            Some(tags) => {
                for tag in tags {
                    write!(f, "{:?}={:?} ", tag.key, tag.value)?;
                }
            }
            None => f.write_str("<nil>")?,
        }
        f.write_str("]")
    }
}

/// BlobProperties は一覧を経由せず直接取得した 1 Blob のプロパティ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobProperties {
    pub name: String,
    pub expires_on: Option<DateTime<Utc>>,
    pub policy_mode: Option<ImmutabilityPolicyMode>,
    pub legal_hold: bool,
    pub content_length: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// BlobPage はページング一覧の 1 ページ
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlobPage {
    pub blobs: Vec<BlobRecord>,

    /// 継続トークン（不透明）。最後のページでは None
    pub next_marker: Option<String>,
}
