//! Dataset load orchestration.
//!
//! Parsing happens off the connection (optionally on rayon workers); writes
//! are serialized on the orchestrator's connection with one transaction per
//! dataset. A dataset either lands completely, lineage included, or not at all.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rusqlite::Connection;
use tracing::{debug, error, info};

use crate::config::LoaderConfig;
use crate::data::NormalizedBatch;
use crate::errors::LoadError;
use crate::lineage;
use crate::metrics::{DatasetOutcome, LoadStats, RunSummary};
use crate::schema::{ensure_schema, upsert_rows};
use crate::source::DatasetKind;

/// Resolve dataset names, failing on the first unknown one.
///
/// Duplicates are dropped; request order is kept.
pub fn resolve_names<S: AsRef<str>>(names: &[S]) -> Result<Vec<DatasetKind>, LoadError> {
    let mut kinds = Vec::with_capacity(names.len());
    for name in names {
        let kind: DatasetKind = name.as_ref().parse()?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    if kinds.is_empty() {
        return Err(LoadError::Configuration("no datasets requested".into()));
    }
    Ok(kinds)
}

/// Parse one dataset directory without touching storage.
pub fn parse_dataset(kind: DatasetKind, raw_dir: &Path) -> Result<NormalizedBatch, LoadError> {
    if !raw_dir.is_dir() {
        return Err(LoadError::Configuration(format!(
            "raw directory for '{kind}' does not exist: {}",
            raw_dir.display()
        )));
    }
    debug!("[retail:{kind}] parsing {}", raw_dir.display());
    kind.adapter().load(raw_dir)
}

/// Persist one batch inside a single transaction.
///
/// Write order: items, queries, entities, item_entity, labels, pairs, then
/// lineage. Any error drops the transaction, rolling the dataset back.
pub fn persist(conn: &mut Connection, batch: &NormalizedBatch) -> Result<LoadStats, LoadError> {
    let tx = conn.transaction()?;
    let mut stats = LoadStats {
        items: upsert_rows(&tx, &batch.items)?,
        queries: upsert_rows(&tx, &batch.queries)?,
        entities: upsert_rows(&tx, &batch.entities)?,
        item_entities: upsert_rows(&tx, &batch.item_entities)?,
        labels: upsert_rows(&tx, &batch.labels)?,
        pairs: upsert_rows(&tx, &batch.pairs)?,
        issues: batch.issues,
        content_hash: batch.lineage.content_hash.clone(),
        ..LoadStats::default()
    };
    let previous = lineage::latest_hash(&tx, &batch.dataset)?;
    stats.unchanged_content = previous.as_deref() == Some(batch.lineage.content_hash.as_str());
    stats.lineage_id = lineage::record(&tx, &batch.lineage)?;
    tx.commit()?;
    if stats.unchanged_content {
        info!(
            "[retail:{}] raw content unchanged since the previous load; rows refreshed anyway",
            batch.dataset
        );
    }
    Ok(stats)
}

/// Loads requested datasets into one SQLite database.
pub struct Orchestrator<'c> {
    conn: &'c mut Connection,
    config: LoaderConfig,
}

impl<'c> Orchestrator<'c> {
    /// Wrap `conn`, applying the busy timeout and ensuring the schema exists.
    pub fn new(conn: &'c mut Connection, config: LoaderConfig) -> Result<Self, LoadError> {
        conn.busy_timeout(config.busy_timeout)?;
        ensure_schema(conn)?;
        Ok(Self { conn, config })
    }

    /// Active configuration.
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Load every named dataset.
    ///
    /// Unknown names fail the whole call before any work. Other failures are
    /// confined to their dataset and reported in the summary.
    pub fn run<S: AsRef<str>>(&mut self, names: &[S]) -> Result<RunSummary, LoadError> {
        let kinds = resolve_names(names)?;
        let plan: Vec<(DatasetKind, PathBuf)> = kinds
            .into_iter()
            .map(|kind| (kind, self.config.raw_dir(kind)))
            .collect();

        let started = Instant::now();
        let parse = |(kind, dir): &(DatasetKind, PathBuf)| {
            let begun = Instant::now();
            (*kind, parse_dataset(*kind, dir), begun.elapsed())
        };
        let parsed: Vec<_> = if self.config.parallel && plan.len() > 1 {
            plan.par_iter().map(parse).collect()
        } else {
            plan.iter().map(parse).collect()
        };
        debug!(
            "[retail] parsed {} dataset(s) in {:.2}s",
            parsed.len(),
            started.elapsed().as_secs_f64()
        );

        let mut summary = RunSummary::default();
        for (kind, batch, parse_time) in parsed {
            summary.outcomes.push(self.finish(kind, batch, parse_time));
        }
        Ok(summary)
    }

    /// Parse and persist a single dataset.
    pub fn load_dataset(&mut self, kind: DatasetKind) -> DatasetOutcome {
        let begun = Instant::now();
        let batch = parse_dataset(kind, &self.config.raw_dir(kind));
        self.finish(kind, batch, begun.elapsed())
    }

    fn finish(
        &mut self,
        kind: DatasetKind,
        batch: Result<NormalizedBatch, LoadError>,
        parse_time: Duration,
    ) -> DatasetOutcome {
        let begun = Instant::now();
        let result = batch.and_then(|batch| persist(&mut *self.conn, &batch));
        let elapsed = parse_time + begun.elapsed();
        match &result {
            Ok(stats) => info!(
                dataset = kind.as_str(),
                written = stats.written(),
                replaced = stats.replaced(),
                skipped = stats.issues.skipped,
                rejected = stats.issues.rejected,
                dangling = stats.issues.dangling,
                lineage_id = stats.lineage_id,
                "dataset committed"
            ),
            Err(err) => error!(dataset = kind.as_str(), error = %err, "dataset failed"),
        }
        DatasetOutcome {
            dataset: kind,
            result,
            elapsed,
        }
    }
}

/// Load `names` from `<raw_root>/<dataset>` with default settings.
pub fn run<S: AsRef<str>>(
    conn: &mut Connection,
    names: &[S],
    raw_root: impl Into<PathBuf>,
) -> Result<RunSummary, LoadError> {
    resolve_names(names)?;
    let config = LoaderConfig::default().with_raw_root(raw_root);
    Orchestrator::new(conn, config)?.run(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_validated_and_deduplicated() {
        let kinds = resolve_names(&["wdc", "ESCI", "wdc"]).unwrap();
        assert_eq!(kinds, vec![DatasetKind::Wdc, DatasetKind::Esci]);
        assert!(resolve_names(&["wdc", "nope"]).unwrap_err().is_configuration());
        assert!(resolve_names::<&str>(&[]).unwrap_err().is_configuration());
    }

    #[test]
    fn unknown_name_fails_before_any_write() {
        let mut conn = Connection::open_in_memory().unwrap();
        let err = run(&mut conn, &["abt_buy", "bogus"], "/nonexistent").unwrap_err();
        assert!(err.is_configuration());
        let tables: i64 = conn
            .query_row("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(tables, 0);
    }

    #[test]
    fn missing_raw_directory_fails_only_that_dataset() {
        let mut conn = Connection::open_in_memory().unwrap();
        let summary = run(&mut conn, &["esci", "cikm16"], "/nonexistent/raw").unwrap();
        assert_eq!(summary.outcomes.len(), 2);
        assert!(
            summary
                .outcomes
                .iter()
                .all(|outcome| matches!(outcome.result, Err(LoadError::Configuration(_))))
        );
        assert!(!summary.is_success());
    }
}
