use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::id::ObjectId;

/// Account as shown to its owner. The password hash never leaves the db layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: ObjectId,
    pub name: String,
    pub email: String,
    #[serde(rename = "createAt")]
    pub created_at: DateTime<Local>,
}

/// A named, colored category owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: ObjectId,
    pub uid: ObjectId,
    pub name: String,
    pub color: String,
    #[serde(rename = "createAt")]
    pub created_at: DateTime<Local>,
    #[serde(rename = "updateAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Local>>,
}

/// A logged event charged against one or more tags.
///
/// `duration` is the gap in nanoseconds between this record's creation and
/// the owner's previous record. It is fixed at insert time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: ObjectId,
    pub uid: ObjectId,
    pub tid: Vec<ObjectId>,
    pub event: String,
    #[serde(rename = "createAt")]
    pub created_at: DateTime<Local>,
    #[serde(rename = "updateAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Local>>,
    pub duration: i64,
}

/// Total time charged to one tag. `tag_id` is `None` for untagged records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticEntry {
    pub tag_id: Option<ObjectId>,
    pub total_duration: i64,
}
