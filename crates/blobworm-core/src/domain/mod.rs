//! Domain - ドメインモデル（Blob レコード、接続先、操作フラグ、エラー）

pub mod blob;
pub mod container;
pub mod errors;
pub mod operations;
pub mod tags;

pub use blob::{BlobPage, BlobProperties, BlobRecord, BlobTag, ImmutabilityPolicy, ImmutabilityPolicyMode};
pub use container::{ContainerTarget, ImmutabilityProperties, Secret};
pub use errors::{ConfigError, StorageError, report};
pub use operations::Operations;
pub use tags::{TagSet, run_tags};
