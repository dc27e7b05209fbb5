//! blobworm-core
//!
//! 1 つのストレージコンテナ内の Blob について、WORM（immutability）の
//! 確認・タグ付け・延長を行うためのコア部品です。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（BlobRecord, ContainerTarget, Operations, errors）
//! - **ports**: 抽象化レイヤー（ContainerClient, BlobClient, Clock）
//! - **impls**: 実装（InMemoryContainer: テスト・開発用）
//! - **app**: アプリケーションロジック（list → tag → extend → delete の一連の流れ）
//! - **config**: 環境変数からの接続先解決
//!
//! 本番用の実装（Blob REST API）は `blobworm-azure` クレートに配置します。

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
