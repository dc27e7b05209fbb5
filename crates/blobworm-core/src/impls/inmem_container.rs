//! InMemoryContainer - 開発用のコンテナ
//!
//! サービスの振る舞いのうち、このツールが依存する部分だけを再現します：
//! - マーカー付きのページング
//! - ロックされたポリシーは短縮できない
//! - 有効なポリシーがある Blob は削除できない
//!
//! 失敗注入（Blob 名 × 操作）で、バッチ処理が途中の失敗で止まらないことを検証できます。

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    BlobPage, BlobProperties, BlobRecord, BlobTag, ImmutabilityPolicy, ImmutabilityPolicyMode,
    ImmutabilityProperties, StorageError, TagSet,
};
use crate::ports::{BlobClient, Clock, ContainerClient, SystemClock};

/// BlobOperation は記録・失敗注入の対象になる Blob 操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlobOperation {
    GetProperties,
    SetImmutability,
    SetTags,
    Delete,
}

impl BlobOperation {
    fn label(&self) -> &'static str {
        match self {
            BlobOperation::GetProperties => "get blob properties",
            BlobOperation::SetImmutability => "set immutability policy",
            BlobOperation::SetTags => "set tags",
            BlobOperation::Delete => "delete blob",
        }
    }
}

#[derive(Debug, Clone, Default)]
struct StoredBlob {
    tags: Option<TagSet>,
    metadata: BTreeMap<String, String>,
    policy: Option<ImmutabilityPolicy>,
    legal_hold: bool,
    content_length: u64,
}

struct State {
    blobs: BTreeMap<String, StoredBlob>,
    properties: ImmutabilityProperties,
    page_size: usize,
    failures: HashSet<(String, BlobOperation)>,
    fail_listing_at_page: Option<usize>,
    pages_served: usize,
    calls: Vec<(BlobOperation, String)>,
}

/// InMemoryContainer はメモリ上のコンテナ（clone は状態を共有）
#[derive(Clone)]
pub struct InMemoryContainer {
    name: String,
    state: Arc<Mutex<State>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryContainer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(State {
                blobs: BTreeMap::new(),
                properties: ImmutabilityProperties::default(),
                page_size: 5000,
                failures: HashSet::new(),
                fail_listing_at_page: None,
                pages_served: 0,
                calls: Vec::new(),
            })),
            clock: Arc::new(SystemClock),
        }
    }

    /// 削除時にポリシーが有効かどうかの判定に使う時計
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_blob(self, name: impl Into<String>) -> Self {
        self.lock().blobs.insert(name.into(), StoredBlob::default());
        self
    }

    pub fn with_blobs<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut state = self.lock();
            for name in names {
                state.blobs.insert(name.into(), StoredBlob::default());
            }
        }
        self
    }

    pub fn with_policy(self, name: &str, policy: ImmutabilityPolicy) -> Self {
        self.lock().blobs.entry(name.to_string()).or_default().policy = Some(policy);
        self
    }

    pub fn with_properties(self, properties: ImmutabilityProperties) -> Self {
        self.lock().properties = properties;
        self
    }

    /// 1 ページあたりの最大件数（最低 1）
    pub fn with_page_size(self, page_size: usize) -> Self {
        self.lock().page_size = page_size.max(1);
        self
    }

    /// `blob` に対する `operation` をサービスエラーで失敗させる
    pub fn fail_on(self, blob: impl Into<String>, operation: BlobOperation) -> Self {
        self.lock().failures.insert((blob.into(), operation));
        self
    }

    /// n 番目のページ要求を失敗させる（1 始まり、呼び出しをまたいで数える）
    pub fn fail_listing_at_page(self, page: usize) -> Self {
        self.lock().fail_listing_at_page = Some(page);
        self
    }

    /// これまでに試みた Blob 操作（呼び出し順）
    pub fn calls(&self) -> Vec<(BlobOperation, String)> {
        self.lock().calls.clone()
    }

    pub fn pages_served(&self) -> usize {
        self.lock().pages_served
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().blobs.contains_key(name)
    }

    pub fn tags_of(&self, name: &str) -> Option<TagSet> {
        self.lock().blobs.get(name)?.tags.clone()
    }

    pub fn policy_of(&self, name: &str) -> Option<ImmutabilityPolicy> {
        self.lock().blobs.get(name)?.policy
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // ロック中の panic はテストの assert からしか起きない
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn record_of(name: &str, blob: &StoredBlob) -> BlobRecord {
    BlobRecord {
        name: name.to_string(),
        expires_on: blob.policy.map(|p| p.expires_on),
        policy_mode: blob.policy.map(|p| p.mode),
        tags: blob.tags.as_ref().map(|tags| {
            tags.iter()
                .map(|(k, v)| BlobTag::new(k.clone(), v.clone()))
                .collect()
        }),
        metadata: blob.metadata.clone(),
    }
}

#[async_trait]
impl ContainerClient for InMemoryContainer {
    fn container_name(&self) -> &str {
        &self.name
    }

    async fn check_immutability(&self) -> Result<ImmutabilityProperties, StorageError> {
        Ok(self.lock().properties)
    }

    async fn list_blobs_page(&self, marker: Option<&str>) -> Result<BlobPage, StorageError> {
        let mut state = self.lock();
        state.pages_served += 1;
        if state.fail_listing_at_page == Some(state.pages_served) {
            return Err(StorageError::Service {
                operation: "list blobs",
                target: self.name.clone(),
                status: 500,
                code: "InternalError".to_string(),
                message: "injected listing failure".to_string(),
            });
        }

        let mut remaining = state
            .blobs
            .iter()
            .filter(|(name, _)| marker.is_none_or(|m| name.as_str() >= m));
        let blobs: Vec<BlobRecord> = remaining
            .by_ref()
            .take(state.page_size)
            .map(|(name, blob)| record_of(name, blob))
            .collect();
        let next_marker = remaining.next().map(|(name, _)| name.clone());

        Ok(BlobPage { blobs, next_marker })
    }

    fn blob_client(&self, blob_name: &str) -> Box<dyn BlobClient> {
        Box::new(InMemoryBlob {
            container: self.clone(),
            name: blob_name.to_string(),
        })
    }
}

/// InMemoryBlob は `InMemoryContainer` 上の BlobClient
struct InMemoryBlob {
    container: InMemoryContainer,
    name: String,
}

impl InMemoryBlob {
    /// 呼び出しを記録し、失敗注入を適用する
    ///
    /// ロック済みの状態を返すので、呼び出し側はそのまま操作を続けられる
    fn begin(&self, operation: BlobOperation) -> Result<MutexGuard<'_, State>, StorageError> {
        let mut state = self.container.lock();
        state.calls.push((operation, self.name.clone()));
        if state.failures.contains(&(self.name.clone(), operation)) {
            return Err(self.service_error(operation, 500, "InternalError", "injected failure"));
        }
        if !state.blobs.contains_key(&self.name) {
            return Err(StorageError::BlobNotFound {
                blob: self.name.clone(),
            });
        }
        Ok(state)
    }

    fn target(&self) -> String {
        format!("{}/{}", self.container.name, self.name)
    }

    fn service_error(
        &self,
        operation: BlobOperation,
        status: u16,
        code: &str,
        message: &str,
    ) -> StorageError {
        StorageError::Service {
            operation: operation.label(),
            target: self.target(),
            status,
            code: code.to_string(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl BlobClient for InMemoryBlob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_properties(&self) -> Result<BlobProperties, StorageError> {
        let state = self.begin(BlobOperation::GetProperties)?;
        let blob = &state.blobs[&self.name];
        Ok(BlobProperties {
            name: self.name.clone(),
            expires_on: blob.policy.map(|p| p.expires_on),
            policy_mode: blob.policy.map(|p| p.mode),
            legal_hold: blob.legal_hold,
            content_length: Some(blob.content_length),
            last_modified: None,
        })
    }

    async fn set_immutability_policy(
        &self,
        until: DateTime<Utc>,
        mode: ImmutabilityPolicyMode,
    ) -> Result<ImmutabilityPolicy, StorageError> {
        let op = BlobOperation::SetImmutability;
        let mut state = self.begin(op)?;
        let blob = state
            .blobs
            .get_mut(&self.name)
            .ok_or_else(|| StorageError::BlobNotFound {
                blob: self.name.clone(),
            })?;
        if let Some(current) = blob.policy
            && current.mode == ImmutabilityPolicyMode::Locked
            && until < current.expires_on
        {
            return Err(self.service_error(
                op,
                409,
                "ImmutabilityPolicyLocked",
                "a locked policy can only be extended",
            ));
        }
        let policy = ImmutabilityPolicy {
            expires_on: until,
            mode,
        };
        blob.policy = Some(policy);
        Ok(policy)
    }

    async fn set_tags(&self, tags: &TagSet) -> Result<(), StorageError> {
        let mut state = self.begin(BlobOperation::SetTags)?;
        if let Some(blob) = state.blobs.get_mut(&self.name) {
            blob.tags = Some(tags.clone());
        }
        Ok(())
    }

    async fn delete(&self) -> Result<(), StorageError> {
        let op = BlobOperation::Delete;
        let now = self.container.clock.now();
        let mut state = self.begin(op)?;
        let active = state
            .blobs
            .get(&self.name)
            .and_then(|b| b.policy)
            .is_some_and(|p| p.expires_on > now);
        if active {
            return Err(self.service_error(
                op,
                409,
                "BlobImmutableDueToPolicy",
                "this operation is not permitted as the blob is immutable due to a policy",
            ));
        }
        state.blobs.remove(&self.name);
        Ok(())
    }
}
