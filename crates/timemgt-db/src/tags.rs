use chrono::{DateTime, Utc};
use rusqlite::Row;
use timemgt_types::ObjectId;
use tracing::debug;

use crate::error::on_duplicate;
use crate::models::{Page, TagRow, format_time};
use crate::{Database, DbError, Result};

const DUPLICATE_TAG: &str = "a tag with this name already exists";

impl Database {
    pub fn create_tag(
        &self,
        id: ObjectId,
        uid: ObjectId,
        name: &str,
        color: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tags (id, uid, name, color, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                (id.to_hex(), uid.to_hex(), name, color, format_time(&now)),
            )
            .map_err(on_duplicate(DUPLICATE_TAG))?;
            Ok(())
        })
    }

    /// Rename/recolor a tag. Only the owner's tag matches.
    pub fn update_tag(
        &self,
        id: ObjectId,
        uid: ObjectId,
        name: &str,
        color: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE tags SET name = ?1, color = ?2, updated_at = ?3 WHERE id = ?4 AND uid = ?5",
                    (name, color, format_time(&now), id.to_hex(), uid.to_hex()),
                )
                .map_err(on_duplicate(DUPLICATE_TAG))?;
            if changed == 0 {
                return Err(DbError::NotFound("tag"));
            }
            Ok(())
        })
    }

    /// Delete a tag unless any of the owner's records still reference it.
    pub fn delete_tag(&self, id: ObjectId, uid: ObjectId) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let used: i64 = tx.query_row(
                "SELECT COUNT(*) FROM record_tags rt
                 JOIN records r ON r.id = rt.record_id
                 WHERE r.uid = ?1 AND rt.tag_id = ?2",
                (uid.to_hex(), id.to_hex()),
                |r| r.get(0),
            )?;
            if used != 0 {
                debug!("tag {} still used by {} records", id, used);
                return Err(DbError::TagInUse(used));
            }

            let deleted = tx.execute(
                "DELETE FROM tags WHERE id = ?1 AND uid = ?2",
                (id.to_hex(), uid.to_hex()),
            )?;
            if deleted == 0 {
                return Err(DbError::NotFound("tag"));
            }

            tx.commit()?;
            Ok(())
        })
    }

    /// The owner's tags in insertion order.
    pub fn list_tags(&self, uid: ObjectId, page: Page) -> Result<Vec<TagRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, uid, name, color, created_at, updated_at
                 FROM tags
                 WHERE uid = ?1
                 ORDER BY rowid
                 LIMIT ?2 OFFSET ?3",
            )?;

            let rows = stmt
                .query_map((uid.to_hex(), page.sql_limit(), page.skip), tag_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn count_tags(&self, uid: ObjectId) -> Result<i64> {
        self.with_conn(|conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM tags WHERE uid = ?1",
                [uid.to_hex()],
                |r| r.get(0),
            )?;
            Ok(n)
        })
    }
}

fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<TagRow> {
    Ok(TagRow {
        id: row.get(0)?,
        uid: row.get(1)?,
        name: row.get(2)?,
        color: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
