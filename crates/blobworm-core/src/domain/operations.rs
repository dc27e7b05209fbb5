//! Operations - コマンドライン引数で選ぶ操作フラグ

use serde::{Deserialize, Serialize};

/// Operations は任意の変更系パス（起動ごとに計算し直す）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operations {
    pub extend: bool,
    pub delete: bool,
}

impl Operations {
    pub const EXTEND: &'static str = "extend";
    pub const DELETE: &'static str = "delete";

    /// 語を任意の順で解釈する
    ///
    /// 完全一致・大文字小文字を区別。操作でない語は呼び出し側が報告できるよう返す
    pub fn from_words<I, S>(words: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ops = Operations::default();
        let mut ignored = Vec::new();
        for word in words {
            match word.as_ref() {
                Self::EXTEND => ops.extend = true,
                Self::DELETE => ops.delete = true,
                other => ignored.push(other.to_string()),
            }
        }
        (ops, ignored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::none(&[], false, false)]
    #[case::extend_only(&["extend"], true, false)]
    #[case::delete_only(&["delete"], false, true)]
    #[case::both(&["extend", "delete"], true, true)]
    #[case::any_order(&["delete", "extend"], true, true)]
    #[case::repeated(&["extend", "extend"], true, false)]
    #[case::case_sensitive(&["Extend", "DELETE"], false, false)]
    fn parses_words(#[case] words: &[&str], #[case] extend: bool, #[case] delete: bool) {
        let (ops, _) = Operations::from_words(words);
        assert_eq!(ops, Operations { extend, delete });
    }

    #[test]
    fn unknown_words_are_returned() {
        let (ops, ignored) = Operations::from_words(["extend", "purge", "Delete"]);
        assert!(ops.extend);
        assert!(!ops.delete);
        assert_eq!(ignored, vec!["purge".to_string(), "Delete".to_string()]);
    }
}
