//! Append-only provenance log.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::constants::tables::LINEAGE;
use crate::data::LineageRecord;
use crate::errors::LoadError;
use crate::types::ContentHash;

/// Per-family provenance reported with every load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineageDefaults {
    /// Human-readable origin of the raw files.
    pub origin_ref: &'static str,
    /// Canonical download location, when one exists.
    pub download_url: Option<&'static str>,
    /// Release identifier of the raw files.
    pub dataset_version: Option<&'static str>,
}

impl LineageDefaults {
    /// Build the lineage row for one parse of `dataset`.
    pub fn record(
        &self,
        dataset: &str,
        content_hash: ContentHash,
        notes: Option<String>,
    ) -> LineageRecord {
        LineageRecord {
            dataset: dataset.to_string(),
            origin_ref: self.origin_ref.to_string(),
            download_url: self.download_url.map(str::to_string),
            content_hash,
            dataset_version: self.dataset_version.map(str::to_string),
            notes,
            loaded_at: Utc::now(),
        }
    }
}

/// A stored lineage row.
#[derive(Clone, Debug, PartialEq)]
pub struct LineageEntry {
    /// Monotonic row id assigned by the store.
    pub lineage_id: i64,
    /// Recorded provenance.
    pub record: LineageRecord,
}

/// Append `record` and return its `lineage_id`.
///
/// Must run inside the dataset's transaction, after every data upsert.
pub fn record(conn: &Connection, record: &LineageRecord) -> Result<i64, LoadError> {
    conn.execute(
        &format!(
            "INSERT INTO {LINEAGE} (dataset, origin_ref, download_url, content_hash, dataset_version, notes, loaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        ),
        params![
            record.dataset,
            record.origin_ref,
            record.download_url,
            record.content_hash,
            record.dataset_version,
            record.notes,
            record.loaded_at.to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Lineage rows for `dataset`, newest first.
pub fn history(conn: &Connection, dataset: &str) -> Result<Vec<LineageEntry>, LoadError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT lineage_id, dataset, origin_ref, download_url, content_hash, dataset_version, notes, loaded_at
         FROM {LINEAGE} WHERE dataset = ?1 ORDER BY lineage_id DESC"
    ))?;
    let rows = stmt.query_map([dataset], |row| {
        let loaded_at: String = row.get(7)?;
        Ok((
            row.get::<_, i64>(0)?,
            LineageRecord {
                dataset: row.get(1)?,
                origin_ref: row.get(2)?,
                download_url: row.get(3)?,
                content_hash: row.get(4)?,
                dataset_version: row.get(5)?,
                notes: row.get(6)?,
                loaded_at: DateTime::<Utc>::MIN_UTC,
            },
            loaded_at,
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (lineage_id, mut record, loaded_at) = row?;
        record.loaded_at = DateTime::parse_from_rfc3339(&loaded_at)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|err| {
                LoadError::Configuration(format!(
                    "lineage row {lineage_id} has an invalid timestamp '{loaded_at}': {err}"
                ))
            })?;
        entries.push(LineageEntry { lineage_id, record });
    }
    Ok(entries)
}

/// Content hash of the most recent load of `dataset`, if any.
pub fn latest_hash(conn: &Connection, dataset: &str) -> Result<Option<ContentHash>, LoadError> {
    let hash = conn
        .query_row(
            &format!(
                "SELECT content_hash FROM {LINEAGE} WHERE dataset = ?1 ORDER BY lineage_id DESC LIMIT 1"
            ),
            [dataset],
            |row| row.get(0),
        )
        .optional()?;
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ensure_schema;

    const DEFAULTS: LineageDefaults = LineageDefaults {
        origin_ref: "unit fixture",
        download_url: Some("https://example.invalid/raw.zip"),
        dataset_version: None,
    };

    #[test]
    fn history_is_append_only_and_newest_first() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        assert_eq!(latest_hash(&conn, "esci").unwrap(), None);

        let first = record(&conn, &DEFAULTS.record("esci", "aaa".into(), None)).unwrap();
        let second = record(
            &conn,
            &DEFAULTS.record("esci", "bbb".into(), Some("items=2".into())),
        )
        .unwrap();
        record(&conn, &DEFAULTS.record("wdc", "ccc".into(), None)).unwrap();
        assert!(second > first);

        let entries = history(&conn, "esci").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].lineage_id, second);
        assert_eq!(entries[0].record.content_hash, "bbb");
        assert_eq!(entries[0].record.notes.as_deref(), Some("items=2"));
        assert_eq!(
            entries[1].record.download_url.as_deref(),
            Some("https://example.invalid/raw.zip")
        );
        assert_eq!(latest_hash(&conn, "esci").unwrap().as_deref(), Some("bbb"));
    }

    #[test]
    fn timestamps_round_trip_through_storage() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        let written = DEFAULTS.record("abt_buy", "abc".into(), None);
        record(&conn, &written).unwrap();
        let stored = &history(&conn, "abt_buy").unwrap()[0].record;
        assert_eq!(stored.loaded_at, written.loaded_at);
    }
}
