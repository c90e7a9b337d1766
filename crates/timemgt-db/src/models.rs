//! Database row types. These map directly to SQLite rows.
//! Identifiers are lowercase hex, timestamps fixed-width UTC RFC 3339.
use chrono::{DateTime, SecondsFormat, Utc};
use timemgt_types::ObjectId;

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

pub struct TagRow {
    pub id: String,
    pub uid: String,
    pub name: String,
    pub color: String,
    pub created_at: String,
    pub updated_at: Option<String>,
}

pub struct RecordRow {
    pub id: String,
    pub uid: String,
    pub tag_ids: Vec<String>,
    pub event: String,
    pub duration: i64,
    pub created_at: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct StatisticRow {
    pub tag_id: Option<String>,
    pub total_duration: i64,
}

/// Offset/limit window. `limit == 0` means no limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub skip: i64,
    pub limit: i64,
}

impl Page {
    /// Lenient parse: anything that is not a non-negative integer becomes 0.
    pub fn parse(skip: Option<&str>, limit: Option<&str>) -> Self {
        let lenient = |v: Option<&str>| {
            v.and_then(|s| s.trim().parse::<i64>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(0)
        };
        Self {
            skip: lenient(skip),
            limit: lenient(limit),
        }
    }

    /// SQLite reads a negative LIMIT as unbounded.
    pub(crate) fn sql_limit(&self) -> i64 {
        if self.limit > 0 { self.limit } else { -1 }
    }
}

/// Narrowing for the per-tag statistics.
#[derive(Debug, Clone, Default)]
pub struct StatisticFilter {
    /// Inclusive creation-time window.
    pub range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// When non-empty, only these tags are reported.
    pub tag_ids: Vec<ObjectId>,
}

/// Fixed-width so lexical order matches chronological order.
pub fn format_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_parse_is_lenient() {
        assert_eq!(Page::parse(Some("5"), Some("10")), Page { skip: 5, limit: 10 });
        assert_eq!(Page::parse(Some("abc"), None), Page::default());
        assert_eq!(Page::parse(Some("-3"), Some("")), Page::default());
        assert_eq!(Page::default().sql_limit(), -1);
    }

    #[test]
    fn formatted_times_sort_lexically() {
        let a = parse_time("2024-01-01T00:00:09Z").unwrap();
        let b = parse_time("2024-01-01T00:00:10.5Z").unwrap();
        assert!(format_time(&a) < format_time(&b));
        assert_eq!(parse_time(&format_time(&b)), Some(b));
    }
}
