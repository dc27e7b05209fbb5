//! Impls - 実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryContainer**: ページング・失敗注入に対応したインメモリのコンテナ
//!
//! # 本番用実装
//! 本番用の実装は別クレートに配置します：
//! - `blobworm-azure`: AzureContainerClient / AzureBlobClient

pub mod inmem_container;

pub use self::inmem_container::{BlobOperation, InMemoryContainer};
