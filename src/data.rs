//! Normalized rows produced by adapters and written by the schema manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use crate::types::{
    ContentHash, DatasetName, EntityId, ItemId, LabelValue, NaturalKey, QueryId,
};

/// Catalog entry in the unified `items` table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemRow {
    /// Derived id, unique per `(dataset, dataset_item_key, variant, split)`.
    pub item_id: ItemId,
    /// Owning dataset.
    pub dataset: DatasetName,
    /// Raw natural key as found in the source (possibly prefixed by side/locale).
    pub dataset_item_key: NaturalKey,
    /// Seller or catalog side.
    pub merchant: Option<String>,
    /// Host site of the offer.
    pub site: Option<String>,
    /// Marketplace locale, e.g. `us`.
    pub locale: Option<String>,
    /// Brand or manufacturer.
    pub brand: Option<String>,
    /// Product title.
    pub title: Option<String>,
    /// Free-text description with markup stripped.
    pub description: Option<String>,
    /// Bullet-point text.
    pub bullet_points: Option<String>,
    /// Color.
    pub color: Option<String>,
    /// Parsed amount.
    pub price: Option<f64>,
    /// ISO 4217 code when known.
    pub currency: Option<String>,
    /// Category label or id.
    pub category: Option<String>,
    /// Image URL.
    pub image_url: Option<String>,
    /// Opaque JSON object holding every unmapped raw column.
    pub attrs: String,
    /// Split the item was published in.
    pub split: Option<String>,
    /// Locale or catalog variant.
    pub variant: Option<String>,
    /// Dataset release.
    pub version: Option<String>,
}

/// Search query, benchmark query, or session in the `queries` table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRow {
    /// Derived id.
    pub query_id: QueryId,
    /// Owning dataset.
    pub dataset: DatasetName,
    /// Normalized query text; absent for queryless and session queries.
    pub query_text: Option<String>,
    /// Marketplace locale.
    pub locale: Option<String>,
    /// `full`, `queryless`, or `session`.
    pub query_type: Option<String>,
    /// Where the query came from (raw file stem or published source).
    pub source: Option<String>,
    /// Browsing session.
    pub session_id: Option<String>,
    /// Event date as written in the raw file.
    pub event_date: Option<String>,
}

/// Relevance judgment or interaction signal linking a query to an item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryItemLabel {
    /// Judged query.
    pub query_id: QueryId,
    /// Judged item.
    pub item_id: ItemId,
    /// Label family name, e.g. `ESCI` or `click`.
    pub label_family: String,
    /// Canonical label within the family vocabulary.
    pub label: LabelValue,
    /// Rank on the result page, or event ordinal.
    pub position: Option<i64>,
    /// Browsing session.
    pub session_id: Option<String>,
    /// Event time offset in milliseconds.
    pub timeframe_ms: Option<i64>,
    /// Split of the judgment.
    pub split: Option<String>,
}

/// Matching judgment between two items.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairLabel {
    /// Same product.
    Match,
    /// Different products.
    NonMatch,
}

impl PairLabel {
    /// Value stored in the `label` column.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PairLabel::Match => "match",
            PairLabel::NonMatch => "non_match",
        }
    }

    /// Interpret a raw match indicator; `None` for anything unrecognized.
    pub fn parse_indicator(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "1.0" | "true" | "yes" | "match" => Some(PairLabel::Match),
            "0" | "0.0" | "false" | "no" | "non_match" | "non-match" | "nonmatch" => {
                Some(PairLabel::NonMatch)
            }
            _ => None,
        }
    }
}

/// Where a pair judgment came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairSource {
    /// Human-annotated ground truth.
    Gold,
    /// Synthetically generated.
    Generated,
    /// Shipped by an external benchmark.
    Benchmark,
}

impl PairSource {
    /// Value stored in the `pair_source` column.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PairSource::Gold => "gold",
            PairSource::Generated => "generated",
            PairSource::Benchmark => "benchmark",
        }
    }
}

impl fmt::Display for PairSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row in `item_item_pairs`; construct with [`ItemItemPair::new`] to keep the
/// left/right ordering convention.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PairFields")]
pub struct ItemItemPair {
    left_item_id: ItemId,
    right_item_id: ItemId,
    /// Match judgment.
    pub label: PairLabel,
    /// Provenance of the judgment.
    pub pair_source: PairSource,
    /// Split the pair belongs to.
    pub split: Option<String>,
    /// Variant the pair belongs to.
    pub variant: Option<String>,
}

#[derive(Deserialize)]
struct PairFields {
    left_item_id: ItemId,
    right_item_id: ItemId,
    label: PairLabel,
    pair_source: PairSource,
    split: Option<String>,
    variant: Option<String>,
}

impl TryFrom<PairFields> for ItemItemPair {
    type Error = String;

    fn try_from(fields: PairFields) -> Result<Self, Self::Error> {
        if fields.left_item_id > fields.right_item_id {
            return Err(format!(
                "left_item_id '{}' sorts after right_item_id '{}'",
                fields.left_item_id, fields.right_item_id
            ));
        }
        Ok(Self {
            left_item_id: fields.left_item_id,
            right_item_id: fields.right_item_id,
            label: fields.label,
            pair_source: fields.pair_source,
            split: fields.split,
            variant: fields.variant,
        })
    }
}

impl ItemItemPair {
    /// Build a pair, storing the lexicographically smaller id on the left.
    pub fn new(a: ItemId, b: ItemId, label: PairLabel, pair_source: PairSource) -> Self {
        let (left_item_id, right_item_id) = if a <= b { (a, b) } else { (b, a) };
        Self {
            left_item_id,
            right_item_id,
            label,
            pair_source,
            split: None,
            variant: None,
        }
    }

    /// Set the split.
    pub fn with_split(mut self, split: Option<String>) -> Self {
        self.split = split;
        self
    }

    /// Set the variant.
    pub fn with_variant(mut self, variant: Option<String>) -> Self {
        self.variant = variant;
        self
    }

    /// Lexicographically smaller item id.
    pub fn left_item_id(&self) -> &str {
        &self.left_item_id
    }

    /// Lexicographically larger item id.
    pub fn right_item_id(&self) -> &str {
        &self.right_item_id
    }
}

/// Cluster of items believed to be the same real-world product.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityRow {
    /// Derived id.
    pub entity_id: EntityId,
    /// Owning dataset.
    pub dataset: DatasetName,
    /// Free text; the first variant that referenced the entity.
    pub notes: Option<String>,
}

/// Many-to-many link between items and entities.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemEntityLink {
    /// Linked item.
    pub item_id: ItemId,
    /// Linked entity.
    pub entity_id: EntityId,
}

/// Append-only provenance row written once per committed load.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineageRecord {
    /// Loaded dataset.
    pub dataset: DatasetName,
    /// Human-readable origin of the raw data.
    pub origin_ref: String,
    /// Where the raw data can be downloaded.
    pub download_url: Option<String>,
    /// SHA-256 of the raw directory.
    pub content_hash: ContentHash,
    /// Dataset release.
    pub dataset_version: Option<String>,
    /// Row tally of the load.
    pub notes: Option<String>,
    /// Commit time.
    pub loaded_at: DateTime<Utc>,
}

/// Row-level problems encountered while parsing one dataset.
///
/// None of these abort the load; they are surfaced in the dataset summary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowIssues {
    /// Malformed records skipped (unreadable fields, empty keys, bad indicators).
    pub skipped: usize,
    /// Labels outside their family's vocabulary.
    pub rejected: usize,
    /// Pairs, labels, or links referencing an item/query absent from the load.
    pub dangling: usize,
}

impl RowIssues {
    /// Sum of all counters.
    pub fn total(&self) -> usize {
        self.skipped + self.rejected + self.dangling
    }

    /// Add `other` into `self`.
    pub fn merge(&mut self, other: RowIssues) {
        self.skipped += other.skipped;
        self.rejected += other.rejected;
        self.dangling += other.dangling;
    }
}

/// Everything an adapter produces for one dataset.
#[derive(Clone, Debug)]
pub struct NormalizedBatch {
    /// Owning dataset.
    pub dataset: DatasetName,
    /// Rows for `items`.
    pub items: Vec<ItemRow>,
    /// Rows for `queries`.
    pub queries: Vec<QueryRow>,
    /// Rows for `query_item_labels`.
    pub labels: Vec<QueryItemLabel>,
    /// Rows for `item_item_pairs`.
    pub pairs: Vec<ItemItemPair>,
    /// Rows for `entities`.
    pub entities: Vec<EntityRow>,
    /// Rows for `item_entity`.
    pub item_entities: Vec<ItemEntityLink>,
    /// Lineage row appended on commit.
    pub lineage: LineageRecord,
    /// Row-level problems found while parsing.
    pub issues: RowIssues,
}

impl NormalizedBatch {
    /// Total number of data rows (lineage excluded).
    pub fn row_count(&self) -> usize {
        self.items.len()
            + self.queries.len()
            + self.labels.len()
            + self.pairs.len()
            + self.entities.len()
            + self.item_entities.len()
    }

    /// Short human-readable row tally used in lineage notes.
    pub fn tally(&self) -> String {
        format!(
            "items={} queries={} labels={} pairs={} entities={} item_entity={} skipped={} rejected={} dangling={}",
            self.items.len(),
            self.queries.len(),
            self.labels.len(),
            self.pairs.len(),
            self.entities.len(),
            self.item_entities.len(),
            self.issues.skipped,
            self.issues.rejected,
            self.issues.dangling,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_put_smaller_id_left() {
        let pair = ItemItemPair::new("b".into(), "a".into(), PairLabel::Match, PairSource::Gold);
        assert_eq!(pair.left_item_id(), "a");
        assert_eq!(pair.right_item_id(), "b");

        let flipped =
            ItemItemPair::new("a".into(), "b".into(), PairLabel::Match, PairSource::Gold);
        assert_eq!(pair, flipped);
    }

    #[test]
    fn deserialized_pairs_must_keep_ordering() {
        let ordered = r#"{"left_item_id":"a","right_item_id":"b","label":"match","pair_source":"gold","split":null,"variant":null}"#;
        let pair: ItemItemPair = serde_json::from_str(ordered).unwrap();
        assert_eq!(pair.left_item_id(), "a");

        let reversed = r#"{"left_item_id":"b","right_item_id":"a","label":"match","pair_source":"gold","split":null,"variant":null}"#;
        let err = serde_json::from_str::<ItemItemPair>(reversed).unwrap_err();
        assert!(err.to_string().contains("sorts after"));
    }

    #[test]
    fn indicator_parsing_accepts_common_spellings() {
        assert_eq!(PairLabel::parse_indicator(" 1 "), Some(PairLabel::Match));
        assert_eq!(PairLabel::parse_indicator("TRUE"), Some(PairLabel::Match));
        assert_eq!(PairLabel::parse_indicator("non-match"), Some(PairLabel::NonMatch));
        assert_eq!(PairLabel::parse_indicator("0"), Some(PairLabel::NonMatch));
        assert_eq!(PairLabel::parse_indicator("maybe"), None);
    }

    #[test]
    fn row_issues_merge_and_total() {
        let mut issues = RowIssues {
            skipped: 1,
            rejected: 2,
            dangling: 0,
        };
        issues.merge(RowIssues {
            skipped: 0,
            rejected: 1,
            dangling: 4,
        });
        assert_eq!(issues.total(), 8);
        assert_eq!(issues.rejected, 3);
    }
}
