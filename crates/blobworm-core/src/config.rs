//! Config - 環境変数からの接続先解決
//!
//! 3 つの変数はすべて必須で既定値はありません（空文字は未設定扱い）。
//! 解決処理は環境変数の読み取り以外に副作用を持ちません。

use crate::domain::{ConfigError, ContainerTarget, Secret};

pub const ACCOUNT_NAME_VAR: &str = "AZURE_ACCOUNT_NAME";
pub const ACCOUNT_KEY_VAR: &str = "AZURE_ACCOUNT_KEY";
pub const CONTAINER_NAME_VAR: &str = "AZURE_CONTAINER_NAME";

impl ContainerTarget {
    /// プロセスの環境変数から接続先を読む
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// `lookup` 経由で接続先を読む
    ///
    /// アカウント名 → アカウントキー → コンテナ名の順に確認し、
    /// 最初に見つからなかった変数でエラーを返す
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |var: &'static str, what: &'static str| {
            lookup(var)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing { var, what })
        };

        let account_name = require(ACCOUNT_NAME_VAR, "account name")?;
        let account_key = require(ACCOUNT_KEY_VAR, "account key")?;
        let container_name = require(CONTAINER_NAME_VAR, "container name")?;

        Ok(Self {
            account_name,
            account_key: Secret::new(account_key),
            container_name,
        })
    }
}
