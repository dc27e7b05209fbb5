//! ContainerClient port - 1 つのコンテナへの接続
//!
//! 接続（存在確認）は実装側のコンストラクタで行います。
//! trait はコンストラクト済みのクライアントに対する操作のみを定義します。

use async_trait::async_trait;
use tracing::debug;

use crate::domain::{BlobPage, BlobRecord, ImmutabilityProperties, StorageError};
use crate::ports::BlobClient;

/// ContainerClient は 1 コンテナ分の操作を提供
///
/// # 設計原則
/// - 読み取り専用のハンドル（構築後に状態を変えない）
/// - ページングは `list_blobs_page` だけが知っていればよい
/// - `list_blobs` は全ページを集約し、途中で失敗したら結果を捨てる
#[async_trait]
pub trait ContainerClient: Send + Sync {
    fn container_name(&self) -> &str;

    /// コンテナ単位の immutability フラグを返す
    async fn check_immutability(&self) -> Result<ImmutabilityProperties, StorageError>;

    /// `marker` から 1 ページ分を取得（`None` なら先頭から）
    ///
    /// 各レコードはメタデータ・タグ・immutability の期限を含む
    async fn list_blobs_page(&self, marker: Option<&str>) -> Result<BlobPage, StorageError>;

    /// 継続マーカーがなくなるまでページを要求し、全 Blob を返す
    ///
    /// どれか 1 ページでも失敗したら一覧全体を中断する
    async fn list_blobs(&self) -> Result<Vec<BlobRecord>, StorageError> {
        let mut blobs = Vec::new();
        let mut marker: Option<String> = None;
        let mut pages = 0usize;
        loop {
            let page = self.list_blobs_page(marker.as_deref()).await?;
            pages += 1;
            blobs.extend(page.blobs);

            match page.next_marker {
                Some(next) if next.is_empty() => break,
                Some(next) => {
                    if marker.as_deref() == Some(next.as_str()) {
                        return Err(StorageError::Malformed {
                            operation: "list blobs",
                            target: self.container_name().to_string(),
                            reason: format!("continuation marker {next:?} repeated"),
                        });
                    }
                    marker = Some(next);
                }
                None => break,
            }
        }
        debug!(container = %self.container_name(), pages, blobs = blobs.len(), "listing complete");
        Ok(blobs)
    }

    /// コンテナ単位のポリシー設定は管理プレーンの権限が必要で、
    /// 共有キーでは行えないため Unsupported を返す
    async fn set_container_immutability(&self) -> Result<(), StorageError> {
        Err(StorageError::Unsupported {
            operation: "set container immutability policy",
            reason: "container-level policies require management-plane permissions",
        })
    }

    /// このコンテナ内の 1 Blob 用クライアント（リクエストは発生しない）
    fn blob_client(&self, blob_name: &str) -> Box<dyn BlobClient>;
}
