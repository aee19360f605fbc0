#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Command-line entry point used by the `retail-unify` binary.
pub mod cli;
/// Loader configuration and directory resolution.
pub mod config;
/// Centralized constants: dataset names, raw file names, environment keys.
pub mod constants;
/// Normalized row types shared by adapters and the schema manager.
pub mod data;
mod hash;
/// Deterministic identifier derivation.
pub mod ids;
/// Load orchestration across datasets.
pub mod ingestion;
/// Label families and vocabularies.
pub mod labels;
/// Append-only provenance log.
pub mod lineage;
/// Per-dataset and per-run load summaries.
pub mod metrics;
/// Unified schema and keyed upserts.
pub mod schema;
/// Dataset adapters.
pub mod source;
/// Raw file discovery and table readers.
pub mod transport;
/// Shared type aliases.
pub mod types;
/// Text, price, and attribute normalization helpers.
pub mod utils;

mod errors;

pub use config::LoaderConfig;
pub use data::{
    EntityRow, ItemEntityLink, ItemItemPair, ItemRow, LineageRecord, NormalizedBatch, PairLabel,
    PairSource, QueryItemLabel, QueryRow, RowIssues,
};
pub use errors::LoadError;
pub use ids::{IdKind, derive_id, derive_scoped_id};
pub use ingestion::{Orchestrator, run};
pub use labels::LabelFamily;
pub use lineage::{LineageDefaults, LineageEntry};
pub use metrics::{DatasetOutcome, LoadStats, RunSummary};
pub use schema::{TableRow, TableSpec, UpsertOutcome, ensure_schema, upsert};
pub use source::{
    AbtBuyAdapter, BatchBuilder, Cikm16Adapter, DatasetAdapter, DatasetKind, EsciAdapter,
    WdcAdapter,
};
pub use types::{
    ColumnName, ContentHash, DatasetName, EntityId, ItemId, LabelValue, NaturalKey, QueryId,
    TableName,
};
