//! Row -> API model conversion. Rows that fail to decode are logged and
//! dropped from listings instead of failing the whole request.

use chrono::{DateTime, Local};
use tracing::warn;

use timemgt_db::models::{RecordRow, StatisticRow, TagRow, UserRow, parse_time};
use timemgt_types::ObjectId;
use timemgt_types::models::{Record, StatisticEntry, Tag, UserProfile};

fn id(raw: &str, what: &str) -> Option<ObjectId> {
    match raw.parse() {
        Ok(id) => Some(id),
        Err(e) => {
            warn!("Corrupt {} id '{}': {}", what, raw, e);
            None
        }
    }
}

fn time(raw: &str) -> Option<DateTime<Local>> {
    let parsed = parse_time(raw).map(|t| t.with_timezone(&Local));
    if parsed.is_none() {
        warn!("Corrupt timestamp '{}'", raw);
    }
    parsed
}

fn opt_time(raw: Option<&str>) -> Option<DateTime<Local>> {
    raw.and_then(time)
}

pub fn user(row: UserRow) -> Option<UserProfile> {
    Some(UserProfile {
        id: id(&row.id, "user")?,
        name: row.name,
        email: row.email,
        created_at: time(&row.created_at)?,
    })
}

pub fn tag(row: TagRow) -> Option<Tag> {
    Some(Tag {
        id: id(&row.id, "tag")?,
        uid: id(&row.uid, "owner")?,
        created_at: time(&row.created_at)?,
        updated_at: opt_time(row.updated_at.as_deref()),
        name: row.name,
        color: row.color,
    })
}

pub fn record(row: RecordRow) -> Option<Record> {
    let tid = row
        .tag_ids
        .iter()
        .map(|t| id(t, "tag"))
        .collect::<Option<Vec<_>>>()?;

    Some(Record {
        id: id(&row.id, "record")?,
        uid: id(&row.uid, "owner")?,
        tid,
        created_at: time(&row.created_at)?,
        updated_at: opt_time(row.updated_at.as_deref()),
        event: row.event,
        duration: row.duration,
    })
}

/// A `NULL` tag id is untagged time and stays `None`.
pub fn statistic(row: StatisticRow) -> Option<StatisticEntry> {
    let tag_id = match row.tag_id.as_deref() {
        Some(raw) => Some(id(raw, "tag")?),
        None => None,
    };
    Some(StatisticEntry {
        tag_id,
        total_duration: row.total_duration,
    })
}
