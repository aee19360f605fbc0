/// Filesystem discovery helpers.
pub mod fs;
/// Delimited and Parquet row readers.
pub mod table;
