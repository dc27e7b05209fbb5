//! BlobClient port - 1 つの Blob への操作
//!
//! すべての操作は 1 リクエストで完結し、成功か失敗かの二択です（リトライしない）。

use async_trait::async_trait;
use chrono::{DateTime, Duration, Timelike, Utc};

use crate::domain::{
    BlobProperties, ImmutabilityPolicy, ImmutabilityPolicyMode, StorageError, TagSet,
};
use crate::ports::Clock;

#[async_trait]
pub trait BlobClient: Send + Sync {
    fn name(&self) -> &str;

    async fn get_properties(&self) -> Result<BlobProperties, StorageError>;

    /// `until` で期限切れになるポリシーを設定し、サービスが確定した内容を返す
    async fn set_immutability_policy(
        &self,
        until: DateTime<Utc>,
        mode: ImmutabilityPolicyMode,
    ) -> Result<ImmutabilityPolicy, StorageError>;

    /// `clock.now()` から `days` 日後に期限切れになる Unlocked ポリシーを設定
    ///
    /// # 期限の計算
    /// - サービスは秒単位で保持するため、次の秒に切り上げる（now + days より前にはならない）
    /// - 表現できない日時になる場合はリクエストを送らずにエラーを返す
    async fn extend_immutability(
        &self,
        clock: &dyn Clock,
        days: u32,
    ) -> Result<ImmutabilityPolicy, StorageError> {
        let until = Duration::try_days(i64::from(days))
            .and_then(|period| clock.now().checked_add_signed(period))
            .and_then(ceil_to_second)
            .ok_or_else(|| StorageError::InvalidRequest {
                operation: "set immutability policy",
                target: self.name().to_string(),
                reason: format!("an expiry {days} days from now is out of range"),
            })?;
        self.set_immutability_policy(until, ImmutabilityPolicyMode::Unlocked)
            .await
    }

    /// Blob のタグ集合を丸ごと置き換える
    async fn set_tags(&self, tags: &TagSet) -> Result<(), StorageError>;

    /// スナップショットごと Blob を削除する
    async fn delete(&self) -> Result<(), StorageError>;
}

fn ceil_to_second(t: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match t.with_nanosecond(0) {
        Some(whole) if whole < t => whole.checked_add_signed(Duration::seconds(1)),
        Some(whole) => Some(whole),
        None => Some(t),
    }
}
