#![cfg(feature = "parquet")]

mod support;

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use parquet::data_type::{ByteArray, ByteArrayType};
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::parser::parse_message_type;
use retail_unify::{DatasetKind, run};
use rusqlite::Connection;
use tempfile::tempdir;

use support::{count, strings};

/// Write one row group of optional UTF-8 columns; `None` cells are stored as nulls.
fn write_parquet(path: &Path, columns: &[(&str, Vec<Option<&str>>)]) {
    let fields: Vec<String> = columns
        .iter()
        .map(|(name, _)| format!("OPTIONAL BYTE_ARRAY {name} (UTF8);"))
        .collect();
    let message = format!("message schema {{ {} }}", fields.join(" "));
    let schema = Arc::new(parse_message_type(&message).unwrap());
    let props = Arc::new(WriterProperties::builder().build());
    let mut writer = SerializedFileWriter::new(File::create(path).unwrap(), schema, props).unwrap();
    let mut row_group = writer.next_row_group().unwrap();
    for (_, cells) in columns {
        let mut column = row_group.next_column().unwrap().unwrap();
        let levels: Vec<i16> = cells.iter().map(|cell| i16::from(cell.is_some())).collect();
        let present: Vec<ByteArray> = cells
            .iter()
            .flatten()
            .map(|cell| ByteArray::from(*cell))
            .collect();
        column
            .typed::<ByteArrayType>()
            .write_batch(&present, Some(&levels), None)
            .unwrap();
        column.close().unwrap();
    }
    row_group.close().unwrap();
    writer.close().unwrap();
}

fn write_esci_shards(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    write_parquet(
        &dir.join("shopping_queries_dataset_products.parquet"),
        &[
            ("product_id", vec![Some("B01"), Some("B02")]),
            ("product_title", vec![Some("Running Shoe"), Some("Trail Shoe")]),
            ("product_description", vec![None, Some("<p>Grippy</p>")]),
            ("product_bullet_point", vec![None, None]),
            ("product_brand", vec![Some("Acme"), None]),
            ("product_color", vec![None, Some("Red")]),
            ("product_locale", vec![Some("us"), Some("us")]),
        ],
    );
    write_parquet(
        &dir.join("shopping_queries_dataset_examples.parquet"),
        &[
            ("example_id", vec![Some("0"), Some("1"), Some("2")]),
            ("query", vec![Some("running shoes"), Some("running shoes"), Some("running shoes")]),
            ("query_id", vec![Some("1"), Some("1"), Some("1")]),
            ("product_id", vec![Some("B01"), Some("B02"), Some("B02")]),
            ("product_locale", vec![Some("us"), Some("us"), Some("us")]),
            ("esci_label", vec![Some("E"), Some("I"), None]),
            ("split", vec![Some("train"), None, Some("train")]),
        ],
    );
}

#[test]
fn parquet_shards_load_with_null_optional_columns() {
    let temp = tempdir().unwrap();
    write_esci_shards(&temp.path().join("esci"));
    let mut conn = Connection::open_in_memory().unwrap();

    let summary = run(&mut conn, &["esci"], temp.path()).unwrap();
    let stats = summary
        .outcome(DatasetKind::Esci)
        .unwrap()
        .result
        .as_ref()
        .unwrap();
    assert_eq!(stats.items.written, 2);
    assert_eq!(stats.queries.written, 1);
    assert_eq!(stats.labels.written, 2);
    assert_eq!(stats.issues.rejected, 1);

    assert_eq!(
        count(
            &conn,
            "SELECT COUNT(*) FROM items WHERE dataset_item_key = 'us:B01'
             AND description IS NULL AND color IS NULL AND brand = 'Acme'"
        ),
        1
    );
    assert_eq!(
        strings(&conn, "SELECT description FROM items WHERE dataset_item_key = 'us:B02'"),
        vec!["Grippy"]
    );
    assert_eq!(
        strings(
            &conn,
            "SELECT label || ':' || IFNULL(split, '-') FROM query_item_labels ORDER BY label"
        ),
        vec!["Exact:train", "Irrelevant:-"]
    );
}
