//! Row readers for delimited text and Parquet tables.
//!
//! Both formats are surfaced as [`RawRow`] values keyed by a normalized
//! [`Header`] (trimmed, lowercased column names) so adapters can locate
//! columns without caring about the on-disk format.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::data::RowIssues;
use crate::errors::LoadError;
use crate::transport::fs::has_extension;
use crate::types::ColumnName;

/// Normalized column names of one table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    columns: Vec<ColumnName>,
    index: HashMap<ColumnName, usize>,
}

impl Header {
    /// Build from raw column names, normalizing each.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let columns: Vec<ColumnName> = columns
            .into_iter()
            .map(|name| normalize_column(name.as_ref()))
            .collect();
        let mut index = HashMap::new();
        for (pos, name) in columns.iter().enumerate() {
            index.entry(name.clone()).or_insert(pos);
        }
        Self { columns, index }
    }

    /// Columns in table order.
    pub fn columns(&self) -> &[ColumnName] {
        &self.columns
    }

    /// Index of the first column named `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// True when every name in `names` is a column.
    pub fn contains_all(&self, names: &[&str]) -> bool {
        names.iter().all(|name| self.index.contains_key(*name))
    }

    /// First column whose name equals one of `candidates` (checked in candidate order).
    pub fn find_exact(&self, candidates: &[&str]) -> Option<ColumnName> {
        candidates
            .iter()
            .find(|name| self.index.contains_key(**name))
            .map(|name| (*name).to_string())
    }

    /// First column (in table order) whose name contains `needle`.
    pub fn find_containing(&self, needle: &str) -> Option<ColumnName> {
        self.columns
            .iter()
            .find(|column| column.contains(needle))
            .cloned()
    }
}

/// Trim, drop a UTF-8 BOM, and lowercase a raw header cell.
pub fn normalize_column(raw: &str) -> ColumnName {
    raw.trim_start_matches('\u{feff}').trim().to_lowercase()
}

/// One data row with access by normalized column name.
#[derive(Clone, Debug)]
pub struct RawRow {
    header: Arc<Header>,
    values: Vec<String>,
    /// 1-based record number within the file (header excluded).
    pub record: u64,
}

impl RawRow {
    /// Raw cell value; `None` when the column is absent or the row is short.
    pub fn get(&self, column: &str) -> Option<&str> {
        let pos = self.header.position(column)?;
        self.values.get(pos).map(String::as_str)
    }

    /// Like [`RawRow::get`] for an optional column name.
    pub fn get_opt(&self, column: Option<&ColumnName>) -> Option<&str> {
        column.and_then(|name| self.get(name))
    }

    /// Trimmed, non-blank cell value.
    pub fn value(&self, column: &str) -> Option<&str> {
        self.get(column)
            .map(str::trim)
            .filter(|value| !value.is_empty() && !value.eq_ignore_ascii_case("nan"))
    }

    /// Like [`RawRow::value`] for an optional column name.
    pub fn value_opt(&self, column: Option<&ColumnName>) -> Option<&str> {
        column.and_then(|name| self.value(name))
    }

    /// `(column, value)` for every column not listed in `mapped`, in table order.
    pub fn unmapped<'a>(
        &'a self,
        mapped: &'a [&str],
    ) -> impl Iterator<Item = (&'a str, Option<&'a str>)> + 'a {
        self.header
            .columns()
            .iter()
            .enumerate()
            .filter(move |(_, name)| {
                !name.is_empty() && !mapped.iter().any(|wanted| *wanted == name.as_str())
            })
            .map(move |(pos, name)| (name.as_str(), self.values.get(pos).map(String::as_str)))
    }
}

/// How to treat the first line of a delimited file.
#[derive(Clone, Debug)]
pub enum HeaderMode {
    /// The first line names the columns.
    Present,
    /// The file has no header; use these names.
    Absent(Vec<&'static str>),
    /// Use the first line as header when it looks like one (no numeric
    /// cells, and a first cell naming an id column or one of the fallback
    /// names), otherwise fall back to names.
    Detect(Vec<&'static str>),
}

enum Rows {
    Delimited {
        reader: csv::Reader<File>,
        pending: Option<csv::StringRecord>,
    },
    #[cfg(feature = "parquet")]
    Parquet(parquet::record::reader::RowIter<'static>),
}

/// Streaming table reader over one raw file.
pub struct TableReader {
    dataset: String,
    path: PathBuf,
    header: Arc<Header>,
    rows: Rows,
}

impl TableReader {
    /// Open a delimited or Parquet table whose first line is a header.
    pub fn open(dataset: &str, path: &Path) -> Result<Self, LoadError> {
        if has_extension(path, &["parquet"]) {
            return Self::open_parquet(dataset, path);
        }
        Self::open_delimited(dataset, path, HeaderMode::Present)
    }

    /// Open a delimited table; the delimiter is sniffed from the first line.
    pub fn open_delimited(dataset: &str, path: &Path, mode: HeaderMode) -> Result<Self, LoadError> {
        let delimiter = sniff_delimiter(path)?;
        Self::open_with_delimiter(dataset, path, mode, delimiter)
    }

    /// Open a delimited table with a known delimiter.
    ///
    /// Tab-separated files are read without quote handling, so stray `"`
    /// inside a cell stays literal.
    pub fn open_with_delimiter(
        dataset: &str,
        path: &Path,
        mode: HeaderMode,
        delimiter: u8,
    ) -> Result<Self, LoadError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .quoting(delimiter != b'\t')
            .from_path(path)?;

        let mut first = csv::StringRecord::new();
        let has_first = reader.read_record(&mut first)?;
        let (header, pending) = match mode {
            HeaderMode::Present => (Header::new(first.iter()), None),
            HeaderMode::Absent(names) => (Header::new(names), has_first.then_some(first)),
            HeaderMode::Detect(names) => {
                if has_first && looks_like_header(&first, &names) {
                    (Header::new(first.iter()), None)
                } else {
                    (Header::new(names), has_first.then_some(first))
                }
            }
        };

        Ok(Self {
            dataset: dataset.to_string(),
            path: path.to_path_buf(),
            header: Arc::new(header),
            rows: Rows::Delimited { reader, pending },
        })
    }

    #[cfg(feature = "parquet")]
    fn open_parquet(dataset: &str, path: &Path) -> Result<Self, LoadError> {
        use parquet::file::reader::{FileReader, SerializedFileReader};

        let reader = SerializedFileReader::new(File::open(path)?)?;
        let header = Header::new(
            reader
                .metadata()
                .file_metadata()
                .schema()
                .get_fields()
                .iter()
                .map(|field| field.name().to_string()),
        );
        Ok(Self {
            dataset: dataset.to_string(),
            path: path.to_path_buf(),
            header: Arc::new(header),
            rows: Rows::Parquet(reader.into_iter()),
        })
    }

    #[cfg(not(feature = "parquet"))]
    fn open_parquet(dataset: &str, path: &Path) -> Result<Self, LoadError> {
        Err(LoadError::Configuration(format!(
            "dataset '{dataset}' needs {} but parquet support is disabled",
            path.display()
        )))
    }

    /// Normalized header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// File being read.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Visit every row in file order.
    ///
    /// Malformed records (bad UTF-8, undecodable Parquet rows) are logged and
    /// counted as skipped; I/O failures and visitor errors end the scan.
    pub fn for_each(
        self,
        issues: &mut RowIssues,
        mut visit: impl FnMut(&RawRow) -> Result<(), LoadError>,
    ) -> Result<u64, LoadError> {
        let Self {
            dataset,
            path,
            header,
            rows,
        } = self;
        let mut record = 0u64;
        match rows {
            Rows::Delimited {
                mut reader,
                pending,
            } => {
                if let Some(first) = pending {
                    record += 1;
                    visit(&to_row(&header, &first, record))?;
                }
                let mut buf = csv::StringRecord::new();
                loop {
                    match reader.read_record(&mut buf) {
                        Ok(false) => break,
                        Ok(true) => {
                            record += 1;
                            if buf.iter().all(|cell| cell.trim().is_empty()) {
                                continue;
                            }
                            visit(&to_row(&header, &buf, record))?;
                        }
                        Err(err) if err.is_io_error() => return Err(err.into()),
                        Err(err) => {
                            record += 1;
                            issues.skipped += 1;
                            warn!(
                                dataset = %dataset,
                                path = %path.display(),
                                record,
                                error = %err,
                                "skipping malformed record"
                            );
                        }
                    }
                }
            }
            #[cfg(feature = "parquet")]
            Rows::Parquet(iter) => {
                for row in iter {
                    record += 1;
                    match row {
                        Ok(row) => {
                            let values = row
                                .get_column_iter()
                                .map(|(_, field)| {
                                    value_to_text(&field.to_json_value()).unwrap_or_default()
                                })
                                .collect();
                            visit(&RawRow {
                                header: header.clone(),
                                values,
                                record,
                            })?;
                        }
                        Err(err) => {
                            issues.skipped += 1;
                            warn!(
                                dataset = %dataset,
                                path = %path.display(),
                                record,
                                error = %err,
                                "skipping malformed record"
                            );
                        }
                    }
                }
            }
        }
        Ok(record)
    }
}

fn to_row(header: &Arc<Header>, record: &csv::StringRecord, number: u64) -> RawRow {
    RawRow {
        header: header.clone(),
        values: record.iter().map(str::to_string).collect(),
        record: number,
    }
}

/// Scalar rendering of a JSON cell; nested values keep their JSON text.
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

fn looks_like_header(first: &csv::StringRecord, names: &[&str]) -> bool {
    if first
        .iter()
        .any(|cell| !cell.trim().is_empty() && cell.trim().parse::<f64>().is_ok())
    {
        return false;
    }
    let cell = normalize_column(first.get(0).unwrap_or(""));
    if names.iter().any(|name| *name == cell) {
        return true;
    }
    cell.split(|ch: char| !ch.is_ascii_alphanumeric())
        .any(|token| token.starts_with("id"))
}

/// Pick the delimiter from the first line.
///
/// `.tsv` files and any line holding a tab are tab-separated, whatever the
/// comma count. Otherwise `;` wins over `,` when it is more frequent.
pub fn sniff_delimiter(path: &Path) -> Result<u8, LoadError> {
    if has_extension(path, &["tsv"]) {
        return Ok(b'\t');
    }
    let mut first_line = String::new();
    BufReader::new(File::open(path)?).read_line(&mut first_line)?;
    if first_line.contains('\t') {
        return Ok(b'\t');
    }
    let count = |needle: char| first_line.matches(needle).count();
    Ok(if count(';') > count(',') { b';' } else { b',' })
}
