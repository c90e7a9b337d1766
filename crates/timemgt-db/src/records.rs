use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{Row, Transaction};
use timemgt_types::ObjectId;
use tracing::{debug, warn};

use crate::models::{Page, RecordRow, StatisticFilter, StatisticRow, format_time, parse_time};
use crate::queries::{OptionalExt, placeholders};
use crate::{Database, DbError, Result};

impl Database {
    /// Insert a record and chain its duration to the owner's latest record.
    ///
    /// Lookup and insert share one transaction on the single writer
    /// connection, so two creations can never observe the same predecessor.
    /// Returns the stored duration in nanoseconds.
    pub fn create_record(
        &self,
        id: ObjectId,
        uid: ObjectId,
        tag_ids: &[ObjectId],
        event: &str,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let last: Option<String> = tx
                .query_row(
                    "SELECT created_at FROM records
                     WHERE uid = ?1
                     ORDER BY created_at DESC, rowid DESC
                     LIMIT 1",
                    [uid.to_hex()],
                    |r| r.get(0),
                )
                .optional()?;

            let duration = match last.as_deref().map(|s| (s, parse_time(s))) {
                Some((_, Some(prev))) => (now - prev).num_nanoseconds().unwrap_or(0),
                Some((raw, None)) => {
                    warn!("Corrupt created_at '{}' on latest record of {}", raw, uid);
                    0
                }
                None => 0,
            };

            tx.execute(
                "INSERT INTO records (id, uid, event, duration, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                (id.to_hex(), uid.to_hex(), event, duration, format_time(&now)),
            )?;
            insert_record_tags(&tx, id, tag_ids)?;

            tx.commit()?;
            debug!("record {} created for {} (duration {}ns)", id, uid, duration);
            Ok(duration)
        })
    }

    /// Replace event text and tag set. The stored duration is left alone.
    pub fn update_record(
        &self,
        id: ObjectId,
        uid: ObjectId,
        tag_ids: &[ObjectId],
        event: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let changed = tx.execute(
                "UPDATE records SET event = ?1, updated_at = ?2 WHERE id = ?3 AND uid = ?4",
                (event, format_time(&now), id.to_hex(), uid.to_hex()),
            )?;
            if changed == 0 {
                return Err(DbError::NotFound("record"));
            }

            tx.execute("DELETE FROM record_tags WHERE record_id = ?1", [id.to_hex()])?;
            insert_record_tags(&tx, id, tag_ids)?;

            tx.commit()?;
            Ok(())
        })
    }

    pub fn delete_record(&self, id: ObjectId, uid: ObjectId) -> Result<()> {
        self.with_conn(|conn| {
            // record_tags rows go with it (ON DELETE CASCADE)
            let deleted = conn.execute(
                "DELETE FROM records WHERE id = ?1 AND uid = ?2",
                (id.to_hex(), uid.to_hex()),
            )?;
            if deleted == 0 {
                return Err(DbError::NotFound("record"));
            }
            Ok(())
        })
    }

    /// The owner's records, newest first.
    pub fn list_records(&self, uid: ObjectId, page: Page) -> Result<Vec<RecordRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, uid, event, duration, created_at, updated_at
                 FROM records
                 WHERE uid = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2 OFFSET ?3",
            )?;

            let mut rows = stmt
                .query_map((uid.to_hex(), page.sql_limit(), page.skip), record_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            if rows.is_empty() {
                return Ok(rows);
            }

            // Batch-fetch tag sets for the page
            let sql = format!(
                "SELECT record_id, tag_id FROM record_tags
                 WHERE record_id IN ({})
                 ORDER BY record_id, position",
                placeholders(1, rows.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut tags: HashMap<String, Vec<String>> = HashMap::new();
            let pairs = stmt.query_map(
                rusqlite::params_from_iter(rows.iter().map(|r| r.id.as_str())),
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )?;
            for pair in pairs {
                let (record_id, tag_id) = pair?;
                tags.entry(record_id).or_default().push(tag_id);
            }

            for row in &mut rows {
                row.tag_ids = tags.remove(&row.id).unwrap_or_default();
            }

            Ok(rows)
        })
    }

    pub fn count_records(&self, uid: ObjectId) -> Result<i64> {
        self.with_conn(|conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM records WHERE uid = ?1",
                [uid.to_hex()],
                |r| r.get(0),
            )?;
            Ok(n)
        })
    }

    /// Total duration per tag, largest first.
    ///
    /// Each record contributes its duration once to every tag it carries.
    /// Records without tags group under a `NULL` tag id and are kept unless
    /// a tag filter is given.
    pub fn statistic(&self, uid: ObjectId, filter: &StatisticFilter) -> Result<Vec<StatisticRow>> {
        let mut params: Vec<String> = vec![uid.to_hex()];
        let mut sql = String::from(
            "SELECT rt.tag_id, SUM(r.duration) AS total
             FROM records r
             LEFT JOIN record_tags rt ON rt.record_id = r.id
             WHERE r.uid = ?1",
        );

        if let Some((start, end)) = &filter.range {
            sql.push_str(&format!(
                " AND r.created_at >= ?{} AND r.created_at <= ?{}",
                params.len() + 1,
                params.len() + 2
            ));
            params.push(format_time(start));
            params.push(format_time(end));
        }

        if !filter.tag_ids.is_empty() {
            sql.push_str(&format!(
                " AND rt.tag_id IN ({})",
                placeholders(params.len() + 1, filter.tag_ids.len())
            ));
            params.extend(filter.tag_ids.iter().map(ObjectId::to_hex));
        }

        sql.push_str(" GROUP BY rt.tag_id ORDER BY total DESC, rt.tag_id");

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                    Ok(StatisticRow {
                        tag_id: row.get(0)?,
                        total_duration: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

/// Store the tag set in request order; repeats keep their first position.
fn insert_record_tags(tx: &Transaction<'_>, id: ObjectId, tag_ids: &[ObjectId]) -> Result<()> {
    let mut stmt = tx.prepare(
        "INSERT OR IGNORE INTO record_tags (record_id, tag_id, position) VALUES (?1, ?2, ?3)",
    )?;
    for (position, tag_id) in tag_ids.iter().enumerate() {
        stmt.execute((id.to_hex(), tag_id.to_hex(), position as i64))?;
    }
    Ok(())
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok(RecordRow {
        id: row.get(0)?,
        uid: row.get(1)?,
        tag_ids: Vec::new(),
        event: row.get(2)?,
        duration: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
