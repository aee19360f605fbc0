//! Unified schema ownership and keyed upserts.
//!
//! `ensure_schema` only ever creates missing objects. `upsert` replaces rows
//! sharing the same key columns, so re-loading a dataset reflects the latest
//! parse instead of accumulating duplicates.

use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use tracing::debug;

use crate::constants::tables::{
    ENTITIES, ITEM_ENTITY, ITEM_ITEM_PAIRS, ITEMS, QUERIES, QUERY_ITEM_LABELS,
};
use crate::data::{EntityRow, ItemEntityLink, ItemItemPair, ItemRow, QueryItemLabel, QueryRow};
use crate::errors::LoadError;
use crate::types::TableName;

const DDL: &str = "
CREATE TABLE IF NOT EXISTS items (
    item_id TEXT PRIMARY KEY,
    dataset TEXT NOT NULL,
    dataset_item_key TEXT NOT NULL,
    merchant TEXT,
    site TEXT,
    locale TEXT,
    brand TEXT,
    title TEXT,
    description TEXT,
    bullet_points TEXT,
    color TEXT,
    price REAL,
    currency TEXT,
    category TEXT,
    image_url TEXT,
    attrs TEXT NOT NULL DEFAULT '{}',
    split TEXT,
    variant TEXT,
    version TEXT
);

CREATE TABLE IF NOT EXISTS queries (
    query_id TEXT PRIMARY KEY,
    dataset TEXT NOT NULL,
    query_text TEXT,
    locale TEXT,
    query_type TEXT,
    source TEXT,
    session_id TEXT,
    event_date TEXT
);

CREATE TABLE IF NOT EXISTS query_item_labels (
    query_id TEXT NOT NULL,
    item_id TEXT NOT NULL,
    label_family TEXT NOT NULL,
    label TEXT NOT NULL,
    position INTEGER,
    session_id TEXT,
    timeframe_ms INTEGER,
    split TEXT
);

CREATE TABLE IF NOT EXISTS item_item_pairs (
    left_item_id TEXT NOT NULL,
    right_item_id TEXT NOT NULL,
    label TEXT NOT NULL CHECK (label IN ('match', 'non_match')),
    pair_source TEXT NOT NULL CHECK (pair_source IN ('gold', 'generated', 'benchmark')),
    split TEXT,
    variant TEXT,
    CHECK (left_item_id <= right_item_id)
);

CREATE TABLE IF NOT EXISTS entities (
    entity_id TEXT PRIMARY KEY,
    dataset TEXT NOT NULL,
    notes TEXT
);

CREATE TABLE IF NOT EXISTS item_entity (
    item_id TEXT NOT NULL,
    entity_id TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS lineage (
    lineage_id INTEGER PRIMARY KEY AUTOINCREMENT,
    dataset TEXT NOT NULL,
    origin_ref TEXT NOT NULL,
    download_url TEXT,
    content_hash TEXT NOT NULL,
    dataset_version TEXT,
    notes TEXT,
    loaded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_dataset ON items(dataset);
CREATE INDEX IF NOT EXISTS idx_items_variant_split ON items(dataset, variant, split);
CREATE INDEX IF NOT EXISTS idx_queries_dataset ON queries(dataset);
CREATE INDEX IF NOT EXISTS idx_labels_key
    ON query_item_labels(query_id, item_id, label_family, position, timeframe_ms);
CREATE INDEX IF NOT EXISTS idx_labels_family ON query_item_labels(label_family, label);
CREATE INDEX IF NOT EXISTS idx_labels_item ON query_item_labels(item_id);
CREATE INDEX IF NOT EXISTS idx_pairs_key
    ON item_item_pairs(left_item_id, right_item_id, pair_source);
CREATE INDEX IF NOT EXISTS idx_pairs_source ON item_item_pairs(pair_source);
CREATE INDEX IF NOT EXISTS idx_item_entity_key ON item_entity(item_id, entity_id);
CREATE INDEX IF NOT EXISTS idx_item_entity_entity ON item_entity(entity_id);
CREATE INDEX IF NOT EXISTS idx_lineage_dataset ON lineage(dataset, lineage_id);
";

/// Create every table and index that does not exist yet.
///
/// Never drops or alters existing objects, so repeated calls are safe.
pub fn ensure_schema(conn: &Connection) -> Result<(), LoadError> {
    conn.execute_batch(DDL)?;
    Ok(())
}

/// Column layout and replacement key of one unified table.
#[derive(Clone, Copy, Debug)]
pub struct TableSpec {
    /// Table name.
    pub name: TableName,
    /// Insert column order.
    pub columns: &'static [&'static str],
    /// Columns identifying a row for replacement.
    pub key_columns: &'static [&'static str],
}

/// `items`, keyed by `item_id`.
pub const ITEMS_SPEC: TableSpec = TableSpec {
    name: ITEMS,
    columns: &[
        "item_id",
        "dataset",
        "dataset_item_key",
        "merchant",
        "site",
        "locale",
        "brand",
        "title",
        "description",
        "bullet_points",
        "color",
        "price",
        "currency",
        "category",
        "image_url",
        "attrs",
        "split",
        "variant",
        "version",
    ],
    key_columns: &["item_id"],
};

/// `queries`, keyed by `query_id`.
pub const QUERIES_SPEC: TableSpec = TableSpec {
    name: QUERIES,
    columns: &[
        "query_id",
        "dataset",
        "query_text",
        "locale",
        "query_type",
        "source",
        "session_id",
        "event_date",
    ],
    key_columns: &["query_id"],
};

/// `query_item_labels`, keyed by query, item, family, position, and timeframe.
pub const LABELS_SPEC: TableSpec = TableSpec {
    name: QUERY_ITEM_LABELS,
    columns: &[
        "query_id",
        "item_id",
        "label_family",
        "label",
        "position",
        "session_id",
        "timeframe_ms",
        "split",
    ],
    key_columns: &["query_id", "item_id", "label_family", "position", "timeframe_ms"],
};

/// `item_item_pairs`, keyed by both item ids and the pair source.
pub const PAIRS_SPEC: TableSpec = TableSpec {
    name: ITEM_ITEM_PAIRS,
    columns: &[
        "left_item_id",
        "right_item_id",
        "label",
        "pair_source",
        "split",
        "variant",
    ],
    key_columns: &["left_item_id", "right_item_id", "pair_source"],
};

/// `entities`, keyed by `entity_id`.
pub const ENTITIES_SPEC: TableSpec = TableSpec {
    name: ENTITIES,
    columns: &["entity_id", "dataset", "notes"],
    key_columns: &["entity_id"],
};

/// `item_entity`, keyed by both ids.
pub const ITEM_ENTITY_SPEC: TableSpec = TableSpec {
    name: ITEM_ENTITY,
    columns: &["item_id", "entity_id"],
    key_columns: &["item_id", "entity_id"],
};

/// A value type that maps onto one row of a unified table.
pub trait TableRow {
    /// Target table.
    const SPEC: TableSpec;
    /// Column values in `SPEC.columns` order.
    fn values(&self) -> Vec<Value>;
}

/// Counts produced by one upsert call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// Rows written.
    pub written: usize,
    /// Pre-existing rows removed because they shared a key with a written row.
    pub replaced: usize,
}

impl UpsertOutcome {
    /// Add `other` into `self`.
    pub fn merge(&mut self, other: UpsertOutcome) {
        self.written += other.written;
        self.replaced += other.replaced;
    }
}

/// Insert `rows` into `spec`, replacing any existing row with equal `key_columns`.
///
/// Key comparison uses SQL `IS`, so NULL key values match each other. Callers
/// pass a `Transaction` (which derefs to `Connection`) to get atomicity.
pub fn upsert<I>(
    conn: &Connection,
    spec: &TableSpec,
    rows: I,
    key_columns: &[&str],
) -> Result<UpsertOutcome, LoadError>
where
    I: IntoIterator<Item = Vec<Value>>,
{
    let key_positions = key_columns
        .iter()
        .map(|key| {
            spec.columns
                .iter()
                .position(|column| column == key)
                .ok_or_else(|| {
                    LoadError::Configuration(format!(
                        "key column '{key}' is not a column of table '{}'",
                        spec.name
                    ))
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if key_positions.is_empty() {
        return Err(LoadError::Configuration(format!(
            "upsert into '{}' needs at least one key column",
            spec.name
        )));
    }

    let predicate = key_columns
        .iter()
        .enumerate()
        .map(|(idx, key)| format!("{key} IS ?{}", idx + 1))
        .collect::<Vec<_>>()
        .join(" AND ");
    let placeholders = (1..=spec.columns.len())
        .map(|idx| format!("?{idx}"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut delete =
        conn.prepare_cached(&format!("DELETE FROM {} WHERE {predicate}", spec.name))?;
    let mut insert = conn.prepare_cached(&format!(
        "INSERT INTO {} ({}) VALUES ({placeholders})",
        spec.name,
        spec.columns.join(", ")
    ))?;

    let mut outcome = UpsertOutcome::default();
    for values in rows {
        if values.len() != spec.columns.len() {
            return Err(LoadError::Configuration(format!(
                "row for '{}' has {} values, expected {}",
                spec.name,
                values.len(),
                spec.columns.len()
            )));
        }
        let keys = key_positions.iter().map(|pos| &values[*pos]);
        outcome.replaced += delete.execute(params_from_iter(keys))?;
        insert.execute(params_from_iter(values.iter()))?;
        outcome.written += 1;
    }
    debug!(
        table = spec.name,
        written = outcome.written,
        replaced = outcome.replaced,
        "upsert finished"
    );
    Ok(outcome)
}

/// Upsert typed rows using their table's declared key columns.
pub fn upsert_rows<R: TableRow>(conn: &Connection, rows: &[R]) -> Result<UpsertOutcome, LoadError> {
    upsert(conn, &R::SPEC, rows.iter().map(TableRow::values), R::SPEC.key_columns)
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn opt_text(value: &Option<String>) -> Value {
    value.as_ref().map_or(Value::Null, |value| Value::Text(value.clone()))
}

impl TableRow for ItemRow {
    const SPEC: TableSpec = ITEMS_SPEC;

    fn values(&self) -> Vec<Value> {
        vec![
            text(&self.item_id),
            text(&self.dataset),
            text(&self.dataset_item_key),
            opt_text(&self.merchant),
            opt_text(&self.site),
            opt_text(&self.locale),
            opt_text(&self.brand),
            opt_text(&self.title),
            opt_text(&self.description),
            opt_text(&self.bullet_points),
            opt_text(&self.color),
            self.price.map_or(Value::Null, Value::Real),
            opt_text(&self.currency),
            opt_text(&self.category),
            opt_text(&self.image_url),
            text(&self.attrs),
            opt_text(&self.split),
            opt_text(&self.variant),
            opt_text(&self.version),
        ]
    }
}

impl TableRow for QueryRow {
    const SPEC: TableSpec = QUERIES_SPEC;

    fn values(&self) -> Vec<Value> {
        vec![
            text(&self.query_id),
            text(&self.dataset),
            opt_text(&self.query_text),
            opt_text(&self.locale),
            opt_text(&self.query_type),
            opt_text(&self.source),
            opt_text(&self.session_id),
            opt_text(&self.event_date),
        ]
    }
}

impl TableRow for QueryItemLabel {
    const SPEC: TableSpec = LABELS_SPEC;

    fn values(&self) -> Vec<Value> {
        vec![
            text(&self.query_id),
            text(&self.item_id),
            text(&self.label_family),
            text(&self.label),
            self.position.map_or(Value::Null, Value::Integer),
            opt_text(&self.session_id),
            self.timeframe_ms.map_or(Value::Null, Value::Integer),
            opt_text(&self.split),
        ]
    }
}

impl TableRow for ItemItemPair {
    const SPEC: TableSpec = PAIRS_SPEC;

    fn values(&self) -> Vec<Value> {
        vec![
            text(self.left_item_id()),
            text(self.right_item_id()),
            text(self.label.as_str()),
            text(self.pair_source.as_str()),
            opt_text(&self.split),
            opt_text(&self.variant),
        ]
    }
}

impl TableRow for EntityRow {
    const SPEC: TableSpec = ENTITIES_SPEC;

    fn values(&self) -> Vec<Value> {
        vec![text(&self.entity_id), text(&self.dataset), opt_text(&self.notes)]
    }
}

impl TableRow for ItemEntityLink {
    const SPEC: TableSpec = ITEM_ENTITY_SPEC;

    fn values(&self) -> Vec<Value> {
        vec![text(&self.item_id), text(&self.entity_id)]
    }
}
