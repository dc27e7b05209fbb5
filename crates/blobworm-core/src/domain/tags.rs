//! Tags - Blob に付けるタグ集合

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};

/// TagSet はキーと値のタグ集合
///
/// 適用すると Blob のタグを丸ごと置き換えるので、同じ集合を 2 回適用しても結果は同じ
pub type TagSet = BTreeMap<String, String>;

/// 1 回の実行で全 Blob に付ける固定のタグ集合（`time` は集合を作った時刻）
pub fn run_tags(now: DateTime<Utc>) -> TagSet {
    TagSet::from([
        (
            "time".to_string(),
            now.to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
        ("tag".to_string(), "set".to_string()),
        ("key".to_string(), "value".to_string()),
        ("test".to_string(), "ing".to_string()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn run_tags_are_fixed_apart_from_time() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 5).unwrap();
        let tags = run_tags(now);

        assert_eq!(tags.len(), 4);
        assert_eq!(tags["time"], "2026-10-19T08:00:05Z");
        assert_eq!(tags["tag"], "set");
        assert_eq!(tags["key"], "value");
        assert_eq!(tags["test"], "ing");
    }
}
