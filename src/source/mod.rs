//! Dataset adapters and the batch builder they share.
//!
//! Ownership model:
//! - `DatasetAdapter` turns one raw directory into a `NormalizedBatch`. It
//!   never touches storage.
//! - `DatasetKind` is the closed registry of dataset families.
//! - `BatchBuilder` owns dedupe, referential checks, and row-issue counting so
//!   every adapter applies them the same way.

use indexmap::{IndexMap, IndexSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::constants::datasets;
use crate::constants::limits::ROW_WARNINGS_PER_DATASET;
use crate::data::{
    EntityRow, ItemEntityLink, ItemItemPair, ItemRow, NormalizedBatch, PairSource, QueryItemLabel,
    QueryRow, RowIssues,
};
use crate::errors::LoadError;
use crate::hash::hash_directory;
use crate::lineage::LineageDefaults;
use crate::transport::table::{RawRow, TableReader};
use crate::types::{EntityId, ItemId, QueryId};

/// Source implementation modules.
pub mod sources;

pub use sources::abt_buy::AbtBuyAdapter;
pub use sources::cikm16::Cikm16Adapter;
pub use sources::esci::EsciAdapter;
pub use sources::wdc::WdcAdapter;

/// Raw-files-to-rows transformation for one dataset family.
///
/// `load` must be deterministic for a fixed directory state: the same files
/// yield the same ids and rows in the same order.
pub trait DatasetAdapter: Send + Sync {
    /// Canonical dataset name written to every row.
    fn name(&self) -> &'static str;
    /// Provenance reported in the lineage row.
    fn lineage_defaults(&self) -> LineageDefaults;
    /// Parse every raw file under `raw_dir`.
    fn load(&self, raw_dir: &Path) -> Result<NormalizedBatch, LoadError>;
}

/// Every dataset the loader knows how to ingest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DatasetKind {
    /// Pairwise product matching.
    AbtBuy,
    /// Session interaction logs.
    Cikm16,
    /// Query-product relevance judgments.
    Esci,
    /// Multi-locale product catalog.
    Wdc,
}

impl DatasetKind {
    /// All kinds in registry order.
    pub const fn all() -> [DatasetKind; 4] {
        [
            DatasetKind::AbtBuy,
            DatasetKind::Cikm16,
            DatasetKind::Esci,
            DatasetKind::Wdc,
        ]
    }

    /// Canonical dataset name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::AbtBuy => datasets::ABT_BUY,
            DatasetKind::Cikm16 => datasets::CIKM16,
            DatasetKind::Esci => datasets::ESCI,
            DatasetKind::Wdc => datasets::WDC,
        }
    }

    /// Shape of the raw data.
    pub const fn family(&self) -> &'static str {
        match self {
            DatasetKind::AbtBuy => "pairwise-matching",
            DatasetKind::Cikm16 => "session-interaction",
            DatasetKind::Esci => "query-relevance",
            DatasetKind::Wdc => "multi-locale catalog",
        }
    }

    /// Adapter implementing this kind.
    pub fn adapter(&self) -> Box<dyn DatasetAdapter> {
        match self {
            DatasetKind::AbtBuy => Box::new(AbtBuyAdapter),
            DatasetKind::Cikm16 => Box::new(Cikm16Adapter),
            DatasetKind::Esci => Box::new(EsciAdapter),
            DatasetKind::Wdc => Box::new(WdcAdapter),
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetKind {
    type Err = LoadError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = raw.trim().to_ascii_lowercase();
        DatasetKind::all()
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| {
                LoadError::Configuration(format!(
                    "unknown dataset '{raw}' (expected one of: {})",
                    datasets::ALL.join(", ")
                ))
            })
    }
}

type LabelKey = (QueryId, ItemId, String, Option<i64>, Option<i64>);
type PairKey = (ItemId, ItemId, PairSource);

/// Accumulates one dataset's rows with first-occurrence dedupe.
///
/// Labels, pairs, and links are only accepted when every row they reference
/// was added earlier; otherwise they are counted as dangling.
pub struct BatchBuilder {
    dataset: &'static str,
    items: IndexMap<ItemId, ItemRow>,
    queries: IndexMap<QueryId, QueryRow>,
    labels: IndexMap<LabelKey, QueryItemLabel>,
    pairs: IndexMap<PairKey, ItemItemPair>,
    entities: IndexMap<EntityId, EntityRow>,
    item_entities: IndexSet<ItemEntityLink>,
    issues: RowIssues,
    warnings: usize,
}

impl BatchBuilder {
    /// Start an empty batch for `dataset`.
    pub fn new(dataset: &'static str) -> Self {
        Self {
            dataset,
            items: IndexMap::new(),
            queries: IndexMap::new(),
            labels: IndexMap::new(),
            pairs: IndexMap::new(),
            entities: IndexMap::new(),
            item_entities: IndexSet::new(),
            issues: RowIssues::default(),
            warnings: 0,
        }
    }

    /// Dataset the batch belongs to.
    pub fn dataset(&self) -> &'static str {
        self.dataset
    }

    /// Row-level problems counted so far.
    pub fn issues(&self) -> RowIssues {
        self.issues
    }

    /// True when `item_id` was added.
    pub fn has_item(&self, item_id: &str) -> bool {
        self.items.contains_key(item_id)
    }

    /// True when `query_id` was added.
    pub fn has_query(&self, query_id: &str) -> bool {
        self.queries.contains_key(query_id)
    }

    /// Add an item; returns `false` when the id was already present.
    pub fn add_item(&mut self, item: ItemRow) -> bool {
        if self.items.contains_key(&item.item_id) {
            return false;
        }
        self.items.insert(item.item_id.clone(), item);
        true
    }

    /// Add a query; returns `false` when the id was already present.
    pub fn add_query(&mut self, query: QueryRow) -> bool {
        if self.queries.contains_key(&query.query_id) {
            return false;
        }
        self.queries.insert(query.query_id.clone(), query);
        true
    }

    /// Add an entity; returns `false` when the id was already present.
    pub fn add_entity(&mut self, entity: EntityRow) -> bool {
        if self.entities.contains_key(&entity.entity_id) {
            return false;
        }
        self.entities.insert(entity.entity_id.clone(), entity);
        true
    }

    /// Add a label whose query and item were loaded earlier in this batch.
    pub fn add_label(&mut self, origin: &Path, record: u64, label: QueryItemLabel) -> bool {
        if !self.has_query(&label.query_id) {
            self.dangling(origin, record, "label references a query absent from this load");
            return false;
        }
        if !self.has_item(&label.item_id) {
            self.dangling(origin, record, "label references an item absent from this load");
            return false;
        }
        let key = (
            label.query_id.clone(),
            label.item_id.clone(),
            label.label_family.clone(),
            label.position,
            label.timeframe_ms,
        );
        self.labels.entry(key).or_insert(label);
        true
    }

    /// Add a pair whose two items were loaded earlier in this batch.
    pub fn add_pair(&mut self, origin: &Path, record: u64, pair: ItemItemPair) -> bool {
        if !self.has_item(pair.left_item_id()) || !self.has_item(pair.right_item_id()) {
            self.dangling(origin, record, "pair references an item absent from this load");
            return false;
        }
        let key = (
            pair.left_item_id().to_string(),
            pair.right_item_id().to_string(),
            pair.pair_source,
        );
        self.pairs.entry(key).or_insert(pair);
        true
    }

    /// Link an item to an entity; both must already be in the batch.
    pub fn link_entity(&mut self, origin: &Path, record: u64, link: ItemEntityLink) -> bool {
        if !self.has_item(&link.item_id) || !self.entities.contains_key(&link.entity_id) {
            self.dangling(origin, record, "entity link references an unknown item");
            return false;
        }
        self.item_entities.insert(link);
        true
    }

    /// Unwrap an id derived from a raw record.
    ///
    /// Identifier failures are counted as skipped rows and yield `Ok(None)`;
    /// every other error propagates.
    pub fn keyed<T>(
        &mut self,
        origin: &Path,
        record: u64,
        derived: Result<T, LoadError>,
    ) -> Result<Option<T>, LoadError> {
        match derived {
            Ok(value) => Ok(Some(value)),
            Err(LoadError::Identifier(reason)) => {
                self.skip(origin, record, &reason);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Count and log a malformed record.
    pub fn skip(&mut self, origin: &Path, record: u64, reason: &str) {
        self.issues.skipped += 1;
        self.row_warning(origin, record, "skipped", reason);
    }

    /// Count and log a label outside its family's vocabulary.
    pub fn reject(&mut self, origin: &Path, record: u64, reason: &str) {
        self.issues.rejected += 1;
        self.row_warning(origin, record, "rejected", reason);
    }

    /// Count and log a row whose reference cannot be resolved.
    pub fn dangling(&mut self, origin: &Path, record: u64, reason: &str) {
        self.issues.dangling += 1;
        self.row_warning(origin, record, "dangling", reason);
    }

    fn row_warning(&mut self, origin: &Path, record: u64, kind: &str, reason: &str) {
        self.warnings += 1;
        if self.warnings <= ROW_WARNINGS_PER_DATASET {
            warn!(
                dataset = self.dataset,
                path = %origin.display(),
                record,
                kind,
                "{reason}"
            );
        } else if self.warnings == ROW_WARNINGS_PER_DATASET + 1 {
            warn!(
                dataset = self.dataset,
                "further row warnings suppressed; totals appear in the load summary"
            );
        }
    }

    /// Visit every row of `reader`, folding reader-level skips into this batch.
    pub fn scan(
        &mut self,
        reader: TableReader,
        mut visit: impl FnMut(&mut Self, &RawRow) -> Result<(), LoadError>,
    ) -> Result<u64, LoadError> {
        let path = reader.path().to_path_buf();
        let mut read_issues = RowIssues::default();
        let records = reader.for_each(&mut read_issues, |row| visit(self, row))?;
        self.issues.merge(read_issues);
        debug!(
            dataset = self.dataset,
            path = %path.display(),
            records,
            "scanned raw table"
        );
        Ok(records)
    }

    /// Seal the batch and attach its lineage row.
    pub fn finish(
        self,
        raw_dir: &Path,
        defaults: &LineageDefaults,
    ) -> Result<NormalizedBatch, LoadError> {
        let content_hash = hash_directory(raw_dir)?;
        let mut batch = NormalizedBatch {
            dataset: self.dataset.to_string(),
            items: self.items.into_values().collect(),
            queries: self.queries.into_values().collect(),
            labels: self.labels.into_values().collect(),
            pairs: self.pairs.into_values().collect(),
            entities: self.entities.into_values().collect(),
            item_entities: self.item_entities.into_iter().collect(),
            lineage: defaults.record(self.dataset, content_hash, None),
            issues: self.issues,
        };
        batch.lineage.notes = Some(batch.tally());
        if batch.issues.total() > 0 {
            warn!(
                dataset = self.dataset,
                skipped = batch.issues.skipped,
                rejected = batch.issues.rejected,
                dangling = batch.issues.dangling,
                "dataset parsed with row issues"
            );
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{PairLabel, PairSource};
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn item(id: &str) -> ItemRow {
        ItemRow {
            item_id: id.to_string(),
            dataset: "unit".into(),
            dataset_item_key: id.to_string(),
            title: Some(format!("title {id}")),
            attrs: "{}".into(),
            ..ItemRow::default()
        }
    }

    fn query(id: &str) -> QueryRow {
        QueryRow {
            query_id: id.to_string(),
            dataset: "unit".into(),
            ..QueryRow::default()
        }
    }

    fn label(query_id: &str, item_id: &str) -> QueryItemLabel {
        QueryItemLabel {
            query_id: query_id.into(),
            item_id: item_id.into(),
            label_family: "view".into(),
            label: "1".into(),
            position: Some(1),
            session_id: None,
            timeframe_ms: None,
            split: None,
        }
    }

    #[test]
    fn names_resolve_case_insensitively() {
        assert_eq!("ESCI".parse::<DatasetKind>().unwrap(), DatasetKind::Esci);
        assert_eq!(" wdc ".parse::<DatasetKind>().unwrap(), DatasetKind::Wdc);
        let err = "amazon".parse::<DatasetKind>().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("abt_buy"));
        for kind in DatasetKind::all() {
            assert_eq!(kind.adapter().name(), kind.as_str());
        }
    }

    #[test]
    fn first_occurrence_wins() {
        let mut builder = BatchBuilder::new("unit");
        assert!(builder.add_item(item("a")));
        let mut dup = item("a");
        dup.title = Some("second".into());
        assert!(!builder.add_item(dup));

        let temp = tempdir().unwrap();
        let batch = builder
            .finish(temp.path(), &DatasetKind::AbtBuy.adapter().lineage_defaults())
            .unwrap();
        assert_eq!(batch.items.len(), 1);
        assert_eq!(batch.items[0].title.as_deref(), Some("title a"));
    }

    #[test]
    fn unresolved_references_are_dangling() {
        let origin = PathBuf::from("fixture.csv");
        let mut builder = BatchBuilder::new("unit");
        builder.add_item(item("a"));
        builder.add_item(item("b"));
        builder.add_query(query("q"));

        assert!(builder.add_label(&origin, 1, label("q", "a")));
        assert!(builder.add_label(&origin, 2, label("q", "a")));
        assert!(!builder.add_label(&origin, 3, label("q", "missing")));
        assert!(!builder.add_label(&origin, 4, label("missing", "a")));
        assert!(builder.add_pair(
            &origin,
            5,
            ItemItemPair::new("b".into(), "a".into(), PairLabel::Match, PairSource::Gold)
        ));
        assert!(!builder.add_pair(
            &origin,
            6,
            ItemItemPair::new("a".into(), "zzz".into(), PairLabel::Match, PairSource::Gold)
        ));

        let issues = builder.issues();
        assert_eq!(issues.dangling, 3);
        let temp = tempdir().unwrap();
        let batch = builder
            .finish(temp.path(), &DatasetKind::Esci.adapter().lineage_defaults())
            .unwrap();
        assert_eq!(batch.labels.len(), 1);
        assert_eq!(batch.pairs.len(), 1);
        assert!(batch.lineage.notes.as_deref().unwrap().contains("dangling=3"));
    }

    #[test]
    fn identifier_errors_become_skips() {
        let origin = PathBuf::from("fixture.csv");
        let mut builder = BatchBuilder::new("unit");
        let id = builder
            .keyed(&origin, 7, crate::ids::item_id("unit", " ", None, None))
            .unwrap();
        assert!(id.is_none());
        assert_eq!(builder.issues().skipped, 1);

        let err = builder.keyed::<String>(
            &origin,
            8,
            Err(LoadError::Configuration("boom".into())),
        );
        assert!(err.is_err());
    }
}
