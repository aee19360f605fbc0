use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::constants::datasets::ESCI;
use crate::constants::lineage::{ESCI_ORIGIN, ESCI_URL, ESCI_VERSION};
use crate::constants::raw::{ESCI_EXAMPLES_STEM, ESCI_PRODUCTS_STEM, ESCI_SOURCES};
use crate::data::{ItemRow, NormalizedBatch, QueryItemLabel, QueryRow, RowIssues};
use crate::errors::LoadError;
use crate::ids::{item_id, query_id};
use crate::labels::LabelFamily;
use crate::lineage::LineageDefaults;
use crate::source::{BatchBuilder, DatasetAdapter};
use crate::transport::fs::find_with_stem;
use crate::transport::table::{Header, TableReader};
use crate::utils::{attrs_json, clean_value, normalize_text};

const TABLE_EXTENSIONS: &[&str] = &["parquet", "csv", "tsv"];

const PRODUCT_COLUMNS: &[&str] = &[
    "product_id",
    "product_locale",
    "product_brand",
    "product_title",
    "product_description",
    "product_bullet_point",
    "product_color",
];
const EXAMPLE_REQUIRED: &[&str] = &["query_id", "product_id", "product_locale", "esci_label"];

/// Loads the Shopping Queries products, judgments, and optional query sources.
pub struct EsciAdapter;

fn locate(raw_dir: &Path, stem: &str) -> Result<PathBuf, LoadError> {
    find_with_stem(raw_dir, stem, TABLE_EXTENSIONS).ok_or_else(|| LoadError::MissingInput {
        dataset: ESCI.to_string(),
        path: raw_dir.join(format!("{stem}.parquet")),
    })
}

fn require_columns(header: &Header, path: &Path, columns: &[&str]) -> Result<(), LoadError> {
    let missing: Vec<&str> = columns
        .iter()
        .copied()
        .filter(|column| header.position(column).is_none())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(LoadError::Parse {
            dataset: ESCI.to_string(),
            path: path.to_path_buf(),
            details: format!("missing required columns: {}", missing.join(", ")),
        })
    }
}

fn product_key(locale: &str, product_id: &str) -> String {
    format!("{locale}:{product_id}")
}

impl EsciAdapter {
    fn load_products(builder: &mut BatchBuilder, raw_dir: &Path) -> Result<(), LoadError> {
        let path = locate(raw_dir, ESCI_PRODUCTS_STEM)?;
        let reader = TableReader::open(ESCI, &path)?;
        require_columns(reader.header(), &path, &PRODUCT_COLUMNS[..2])?;

        builder.scan(reader, |builder, row| {
            let (Some(pid), Some(locale)) = (row.value("product_id"), row.value("product_locale"))
            else {
                builder.skip(&path, row.record, "product row lacks id or locale");
                return Ok(());
            };
            let key = product_key(locale, pid);
            let Some(id) = builder.keyed(&path, row.record, item_id(ESCI, &key, None, None))? else {
                return Ok(());
            };
            builder.add_item(ItemRow {
                item_id: id,
                dataset: ESCI.to_string(),
                dataset_item_key: key,
                locale: Some(locale.to_string()),
                brand: normalize_text(row.get("product_brand")),
                title: normalize_text(row.get("product_title")),
                description: normalize_text(row.get("product_description")),
                bullet_points: normalize_text(row.get("product_bullet_point")),
                color: normalize_text(row.get("product_color")),
                attrs: attrs_json(row.unmapped(PRODUCT_COLUMNS))?,
                ..ItemRow::default()
            });
            Ok(())
        })?;
        Ok(())
    }

    fn load_sources(raw_dir: &Path) -> Result<HashMap<String, String>, LoadError> {
        let path = raw_dir.join(ESCI_SOURCES);
        let mut sources = HashMap::new();
        if !path.is_file() {
            debug!("[retail:{ESCI}] no {} present; query sources left empty", ESCI_SOURCES);
            return Ok(sources);
        }
        let reader = TableReader::open(ESCI, &path)?;
        require_columns(reader.header(), &path, &["query_id", "source"])?;
        let mut issues = RowIssues::default();
        reader.for_each(&mut issues, |row| {
            if let (Some(qid), Some(source)) = (row.value("query_id"), row.value("source")) {
                sources.entry(qid.to_string()).or_insert_with(|| source.to_string());
            }
            Ok(())
        })?;
        Ok(sources)
    }

    fn load_examples(
        builder: &mut BatchBuilder,
        raw_dir: &Path,
        sources: &HashMap<String, String>,
    ) -> Result<(), LoadError> {
        let path = locate(raw_dir, ESCI_EXAMPLES_STEM)?;
        let reader = TableReader::open(ESCI, &path)?;
        require_columns(reader.header(), &path, EXAMPLE_REQUIRED)?;
        let family = LabelFamily::Esci;

        builder.scan(reader, |builder, row| {
            let (Some(raw_qid), Some(pid), Some(locale)) = (
                row.value("query_id"),
                row.value("product_id"),
                row.value("product_locale"),
            ) else {
                builder.skip(&path, row.record, "judgment lacks query id, product id, or locale");
                return Ok(());
            };
            let Some(qid) = builder.keyed(&path, row.record, query_id(ESCI, &[raw_qid]))? else {
                return Ok(());
            };
            builder.add_query(QueryRow {
                query_id: qid.clone(),
                dataset: ESCI.to_string(),
                query_text: normalize_text(row.get("query")),
                locale: Some(locale.to_string()),
                query_type: Some("full".to_string()),
                source: sources.get(raw_qid).cloned(),
                ..QueryRow::default()
            });

            let raw_label = row.value("esci_label").unwrap_or("");
            let Some(label) = family.canonical(raw_label) else {
                builder.reject(
                    &path,
                    row.record,
                    &format!("label '{raw_label}' is not in the {family} vocabulary"),
                );
                return Ok(());
            };
            let key = product_key(locale, pid);
            let iid = item_id(ESCI, &key, None, None);
            let Some(iid) = builder.keyed(&path, row.record, iid)? else {
                return Ok(());
            };
            builder.add_label(
                &path,
                row.record,
                QueryItemLabel {
                    query_id: qid,
                    item_id: iid,
                    label_family: family.as_str().to_string(),
                    label,
                    position: None,
                    session_id: None,
                    timeframe_ms: None,
                    split: clean_value(row.get("split")),
                },
            );
            Ok(())
        })?;
        Ok(())
    }
}

impl DatasetAdapter for EsciAdapter {
    fn name(&self) -> &'static str {
        ESCI
    }

    fn lineage_defaults(&self) -> LineageDefaults {
        LineageDefaults {
            origin_ref: ESCI_ORIGIN,
            download_url: Some(ESCI_URL),
            dataset_version: Some(ESCI_VERSION),
        }
    }

    fn load(&self, raw_dir: &Path) -> Result<NormalizedBatch, LoadError> {
        let mut builder = BatchBuilder::new(ESCI);
        Self::load_products(&mut builder, raw_dir)?;
        let sources = Self::load_sources(raw_dir)?;
        Self::load_examples(&mut builder, raw_dir, &sources)?;
        let batch = builder.finish(raw_dir, &self.lineage_defaults())?;
        info!(
            "[retail:{ESCI}] parsed items={} queries={} labels={}",
            batch.items.len(),
            batch.queries.len(),
            batch.labels.len()
        );
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_fixture(dir: &Path) {
        fs::write(
            dir.join(format!("{ESCI_PRODUCTS_STEM}.csv")),
            "product_id,product_title,product_description,product_bullet_point,product_brand,product_color,product_locale\n\
             B01,Running Shoe,<p>Light</p>,Breathable,Acme,Red,us\n\
             B02,Trail Shoe,,Grippy,Acme,,us\n\
             B01,Laufschuh,,,Acme,Rot,de\n",
        )
        .unwrap();
        fs::write(
            dir.join(format!("{ESCI_EXAMPLES_STEM}.csv")),
            "example_id,query,query_id,product_id,product_locale,esci_label,small_version,large_version,split\n\
             0,running shoes,1,B01,us,E,1,1,train\n\
             1,running shoes,1,B02,us,Substitute,1,1,train\n\
             2,running shoes,1,B01,de,Irrelevant,0,1,train\n\
             3,laufschuhe,2,B01,de,Partial,0,1,test\n\
             4,laufschuhe,2,B99,de,Exact,0,1,test\n",
        )
        .unwrap();
        fs::write(dir.join(ESCI_SOURCES), "query_id,source\n1,negations\n").unwrap();
    }

    #[test]
    fn locale_scoped_products_and_labels() {
        let temp = tempdir().unwrap();
        write_fixture(temp.path());
        let batch = EsciAdapter.load(temp.path()).unwrap();

        assert_eq!(batch.items.len(), 3);
        let keys: Vec<_> = batch.items.iter().map(|i| i.dataset_item_key.as_str()).collect();
        assert_eq!(keys, vec!["us:B01", "us:B02", "de:B01"]);
        assert_eq!(batch.items[0].description.as_deref(), Some("Light"));
        assert_eq!(batch.items[0].attrs, "{}");

        assert_eq!(batch.queries.len(), 2);
        assert_eq!(batch.queries[0].source.as_deref(), Some("negations"));
        assert_eq!(batch.queries[1].source, None);
        assert_eq!(batch.queries[0].query_type.as_deref(), Some("full"));

        assert_eq!(batch.labels.len(), 3);
        assert_eq!(batch.labels[0].label, "Exact");
        assert_eq!(batch.labels[0].label_family, "ESCI");
        assert_eq!(batch.labels[0].split.as_deref(), Some("train"));
        assert_eq!(batch.issues.rejected, 1);
        assert_eq!(batch.issues.dangling, 1);
    }

    #[test]
    fn sources_file_is_optional_but_products_are_not() {
        let temp = tempdir().unwrap();
        write_fixture(temp.path());
        fs::remove_file(temp.path().join(ESCI_SOURCES)).unwrap();
        let batch = EsciAdapter.load(temp.path()).unwrap();
        assert!(batch.queries.iter().all(|q| q.source.is_none()));

        fs::remove_file(temp.path().join(format!("{ESCI_PRODUCTS_STEM}.csv"))).unwrap();
        let err = EsciAdapter.load(temp.path()).unwrap_err();
        assert!(matches!(err, LoadError::MissingInput { .. }));
    }

    #[test]
    fn missing_label_column_is_a_parse_error() {
        let temp = tempdir().unwrap();
        write_fixture(temp.path());
        fs::write(
            temp.path().join(format!("{ESCI_EXAMPLES_STEM}.csv")),
            "query,query_id,product_id,product_locale\nshoes,1,B01,us\n",
        )
        .unwrap();
        let err = EsciAdapter.load(temp.path()).unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
    }
}
