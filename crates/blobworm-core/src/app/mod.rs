//! App - アプリケーション層
//!
//! ports を組み合わせて 1 回分の実行（run）を組み立てます。
//!
//! # 流れ
//! 1. 一覧取得（失敗したら中断）
//! 2. コンテナの immutability 確認（失敗したら中断）
//! 3. 全 Blob にタグ付け（Blob 単位の失敗はログのみ）
//! 4. 再一覧（失敗したら中断）
//! 5. `extend` 指定時: 保持期間の延長
//! 6. `delete` 指定時: 削除

pub mod run;

pub use self::run::{
    BatchOutcome, DEFAULT_EXTENSION_DAYS, Failure, MAX_EXTENSION_DAYS, RunOptions, RunReport, run,
};
