//! Run - 1 コンテナに対する 1 回分の逐次実行

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{
    BlobRecord, ImmutabilityProperties, Operations, StorageError, TagSet, report, run_tags,
};
use crate::ports::{Clock, ContainerClient};

/// 延長日数の既定値（CLI で上書き可能）
pub const DEFAULT_EXTENSION_DAYS: u32 = 5;

/// 延長日数の上限（サービスの時間ベース保持の最長 146000 日）
pub const MAX_EXTENSION_DAYS: u32 = 146_000;

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub operations: Operations,
    pub extension_days: u32,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            operations: Operations::default(),
            extension_days: DEFAULT_EXTENSION_DAYS,
        }
    }
}

/// Failure はバッチ処理中に失敗した Blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub blob: String,
    pub error: String,
}

/// BatchOutcome は 1 パス分の Blob ごとの結果
///
/// Blob をまたいだロールバックはしない（部分的な成功も正常な結果）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<Failure>,
}

impl BatchOutcome {
    fn record_success(&mut self, blob: &str) {
        self.succeeded.push(blob.to_string());
    }

    fn record_failure(&mut self, blob: &str, err: &StorageError) {
        self.failed.push(Failure {
            blob: blob.to_string(),
            error: report(err),
        });
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// RunReport は 1 回の実行で観測・実施した内容
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub container: String,
    /// タグ付け後の再一覧（延長・削除はこの一覧に対して行う）
    pub blobs: Vec<BlobRecord>,
    pub immutability: ImmutabilityProperties,
    pub tags: TagSet,
    pub tagging: BatchOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<BatchOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion: Option<BatchOutcome>,
}

/// 一覧 → 表示 → タグ付け → 再一覧 → 延長? → 削除? を順に実行
///
/// # エラー方針
/// - 一覧取得とコンテナのプロパティ確認の失敗は致命的（中断）
/// - Blob 単位の失敗はログとレポートに残し、次の Blob に進む
pub async fn run(
    container: &dyn ContainerClient,
    clock: &dyn Clock,
    options: &RunOptions,
) -> Result<RunReport, StorageError> {
    let name = container.container_name().to_string();

    info!(container = %name, "listing all the blobs in the container");
    let blobs = container.list_blobs().await?;
    log_blobs(&blobs);

    let immutability = container.check_immutability().await?;
    info!(
        container = %name,
        "HasImmutabilityPolicy={} IsImmutableStorageWithVersioningEnabled={} HasLegalHold={}",
        immutability.has_immutability_policy,
        immutability.immutable_storage_with_versioning_enabled,
        immutability.has_legal_hold,
    );

    let tags = run_tags(clock.now());
    info!(blobs = blobs.len(), "setting the same tags on all blobs");
    let tagging = tag_all(container, &blobs, &tags).await;

    info!(container = %name, "listing the blobs after setting the tags");
    let blobs = container.list_blobs().await?;
    log_blobs(&blobs);

    let extension = if options.operations.extend {
        Some(extend_all(container, &blobs, clock, options.extension_days).await)
    } else {
        None
    };

    let deletion = if options.operations.delete {
        Some(delete_all(container, &blobs).await)
    } else {
        None
    };

    Ok(RunReport {
        container: name,
        blobs,
        immutability,
        tags,
        tagging,
        extension,
        deletion,
    })
}

fn log_blobs(blobs: &[BlobRecord]) {
    if blobs.is_empty() {
        info!("the container has no blobs");
    }
    for blob in blobs {
        info!("{blob}");
    }
}

async fn tag_all(container: &dyn ContainerClient, blobs: &[BlobRecord], tags: &TagSet) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    for blob in blobs {
        match container.blob_client(&blob.name).set_tags(tags).await {
            Ok(()) => outcome.record_success(&blob.name),
            Err(err) => {
                warn!(blob = %blob.name, error = %report(&err), "failed to set tags on blob");
                outcome.record_failure(&blob.name, &err);
            }
        }
    }
    outcome
}

async fn extend_all(
    container: &dyn ContainerClient,
    blobs: &[BlobRecord],
    clock: &dyn Clock,
    days: u32,
) -> BatchOutcome {
    info!(days, "extending the immutable period of the blobs");
    let mut outcome = BatchOutcome::default();
    for blob in blobs {
        info!(blob = %blob.name, days, "extending immutable period of blob");
        match container
            .blob_client(&blob.name)
            .extend_immutability(clock, days)
            .await
        {
            Ok(policy) => {
                info!(
                    blob = %blob.name,
                    mode = %policy.mode,
                    "blob {} expires on {}",
                    blob.name,
                    policy.expires_on
                );
                outcome.record_success(&blob.name);
            }
            Err(err) => {
                warn!(blob = %blob.name, error = %report(&err), "failed to set immutability on blob");
                outcome.record_failure(&blob.name, &err);
            }
        }
    }
    outcome
}

async fn delete_all(container: &dyn ContainerClient, blobs: &[BlobRecord]) -> BatchOutcome {
    info!("deleting blobs");
    let mut outcome = BatchOutcome::default();
    for blob in blobs {
        match container.blob_client(&blob.name).delete().await {
            Ok(()) => {
                info!(blob = %blob.name, "deleted blob");
                outcome.record_success(&blob.name);
            }
            Err(err) => {
                warn!(blob = %blob.name, error = %report(&err), "failed to delete blob");
                outcome.record_failure(&blob.name, &err);
            }
        }
    }
    outcome
}
