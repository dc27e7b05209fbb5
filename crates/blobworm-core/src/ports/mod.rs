//! Ports - 抽象化レイヤー
//!
//! ストレージサービスへのインターフェースを trait として定義し、
//! 実装の詳細（REST, 署名, ページング形式）を隠蔽します。
//!
//! # 実装
//! - `blobworm-azure`: AzureContainerClient（本番用）
//! - `impls::InMemoryContainer`: テスト・開発用

pub mod blob_client;
pub mod clock;
pub mod container_client;

pub use self::blob_client::BlobClient;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::container_client::ContainerClient;
