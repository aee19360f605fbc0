/// Dataset name as requested by callers and stored in every table.
/// Examples: `abt_buy`, `esci`, `wdc`
pub type DatasetName = String;
/// Derived item identifier (32 lowercase hex chars).
/// Example: `3f2a9c0d5b7e41a88c0b6f1e2d4a9b70`
pub type ItemId = String;
/// Derived query identifier (32 lowercase hex chars).
pub type QueryId = String;
/// Derived entity (cluster) identifier (32 lowercase hex chars).
pub type EntityId = String;
/// Raw natural key exactly as it appears in the source files.
/// Examples: `tablea:1234`, `us:B07XYZ1234`, `offer-998`
pub type NaturalKey = String;
/// Lowercased, trimmed column name from a raw header row.
/// Examples: `product_id`, `pricecurrency`, `sessionid`
pub type ColumnName = String;
/// Label value inside a label family.
/// Examples: `Exact`, `Irrelevant`, `1`
pub type LabelValue = String;
/// Hex-encoded SHA-256 digest of raw inputs.
pub type ContentHash = String;
/// Table name in the unified schema.
/// Examples: `items`, `query_item_labels`
pub type TableName = &'static str;
