use std::fmt::Write as _;
use std::time::Duration;

use crate::data::RowIssues;
use crate::errors::LoadError;
use crate::schema::UpsertOutcome;
use crate::source::DatasetKind;

/// Rows written by one committed dataset load.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// `items` upserts.
    pub items: UpsertOutcome,
    /// `queries` upserts.
    pub queries: UpsertOutcome,
    /// `entities` upserts.
    pub entities: UpsertOutcome,
    /// `item_entity` upserts.
    pub item_entities: UpsertOutcome,
    /// `query_item_labels` upserts.
    pub labels: UpsertOutcome,
    /// `item_item_pairs` upserts.
    pub pairs: UpsertOutcome,
    /// Row-level problems found while parsing.
    pub issues: RowIssues,
    /// Id of the appended lineage row.
    pub lineage_id: i64,
    /// Hash of the raw directory recorded in lineage.
    pub content_hash: String,
    /// True when the previous lineage row carried the same content hash.
    pub unchanged_content: bool,
}

impl LoadStats {
    /// Rows written across all tables.
    pub fn written(&self) -> usize {
        self.tables().iter().map(|outcome| outcome.written).sum()
    }

    /// Previously stored rows replaced across all tables.
    pub fn replaced(&self) -> usize {
        self.tables().iter().map(|outcome| outcome.replaced).sum()
    }

    fn tables(&self) -> [UpsertOutcome; 6] {
        [
            self.items,
            self.queries,
            self.entities,
            self.item_entities,
            self.labels,
            self.pairs,
        ]
    }
}

/// Result of one requested dataset.
#[derive(Debug)]
pub struct DatasetOutcome {
    /// Requested dataset.
    pub dataset: DatasetKind,
    /// Commit statistics, or the error that rolled the dataset back.
    pub result: Result<LoadStats, LoadError>,
    /// Parse plus persist time.
    pub elapsed: Duration,
}

impl DatasetOutcome {
    /// True when the dataset committed.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-dataset outcomes of one orchestrator run, in request order.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// One outcome per requested dataset.
    pub outcomes: Vec<DatasetOutcome>,
}

impl RunSummary {
    /// True when every requested dataset committed.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(DatasetOutcome::is_success)
    }

    /// Outcomes that rolled back.
    pub fn failed(&self) -> impl Iterator<Item = &DatasetOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.is_success())
    }

    /// Outcome of `dataset`, if it was requested.
    pub fn outcome(&self, dataset: DatasetKind) -> Option<&DatasetOutcome> {
        self.outcomes.iter().find(|outcome| outcome.dataset == dataset)
    }

    /// One line per dataset, suitable for terminal output.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for outcome in &self.outcomes {
            let secs = outcome.elapsed.as_secs_f64();
            let _ = match &outcome.result {
                Ok(stats) => writeln!(
                    out,
                    "{:<8} ok      items={} queries={} labels={} pairs={} entities={} links={} replaced={} skipped={} rejected={} dangling={}{} ({secs:.2}s)",
                    outcome.dataset.as_str(),
                    stats.items.written,
                    stats.queries.written,
                    stats.labels.written,
                    stats.pairs.written,
                    stats.entities.written,
                    stats.item_entities.written,
                    stats.replaced(),
                    stats.issues.skipped,
                    stats.issues.rejected,
                    stats.issues.dangling,
                    if stats.unchanged_content { " unchanged" } else { "" },
                ),
                Err(err) => writeln!(
                    out,
                    "{:<8} FAILED  {err} ({secs:.2}s)",
                    outcome.dataset.as_str()
                ),
            };
        }
        out
    }
}
