use std::path::Path;

use tracing::info;

use crate::constants::datasets::ABT_BUY;
use crate::constants::lineage::{ABT_BUY_ORIGIN, ABT_BUY_URL};
use crate::constants::raw::{ABT_MATCHES, ABT_TABLE_A, ABT_TABLE_B};
use crate::data::{ItemItemPair, ItemRow, NormalizedBatch, PairLabel, PairSource};
use crate::errors::LoadError;
use crate::ids::item_id;
use crate::lineage::LineageDefaults;
use crate::source::{BatchBuilder, DatasetAdapter};
use crate::transport::fs::require_file;
use crate::transport::table::{HeaderMode, TableReader};
use crate::utils::{attrs_json, normalize_text, parse_price_currency};

/// One catalog side of the benchmark.
struct Side {
    file: &'static str,
    tag: &'static str,
    site: &'static str,
    headerless: &'static [&'static str],
}

const TABLE_A: Side = Side {
    file: ABT_TABLE_A,
    tag: "tablea",
    site: "tablea.com",
    headerless: &["id", "name", "description"],
};

const TABLE_B: Side = Side {
    file: ABT_TABLE_B,
    tag: "tableb",
    site: "tableb.com",
    headerless: &["id", "name", "description", "manufacturer", "price"],
};

const MATCH_HEADERLESS: &[&str] = &["tablea_id", "tableb_id", "label"];

const ID_COLUMNS: &[&str] = &["id", "product_id", "idabt", "idbuy"];
const NAME_COLUMNS: &[&str] = &["name", "title"];
const DESCRIPTION_COLUMNS: &[&str] = &["description"];
const BRAND_COLUMNS: &[&str] = &["manufacturer", "brand"];
const PRICE_COLUMNS: &[&str] = &["price"];
const LEFT_COLUMNS: &[&str] = &["tablea_id", "ltable_id", "idabt", "id_abt", "left_id"];
const RIGHT_COLUMNS: &[&str] = &["tableb_id", "rtable_id", "idbuy", "id_buy", "right_id"];
const INDICATOR_COLUMNS: &[&str] = &["label", "match", "is_match", "gold"];

/// Loads the two catalogs and the gold match list of the Abt-Buy benchmark.
///
/// Item keys carry the side tag (`tablea:<id>`, `tableb:<id>`) because both
/// catalogs reuse small integer ids.
pub struct AbtBuyAdapter;

impl AbtBuyAdapter {
    fn side_key(side: &Side, raw_id: &str) -> String {
        format!("{}:{}", side.tag, raw_id)
    }

    fn load_side(builder: &mut BatchBuilder, raw_dir: &Path, side: &Side) -> Result<(), LoadError> {
        let path = require_file(ABT_BUY, raw_dir.join(side.file))?;
        let reader = TableReader::open_with_delimiter(
            ABT_BUY,
            &path,
            HeaderMode::Detect(side.headerless.to_vec()),
            b'\t',
        )?;
        let header = reader.header().clone();
        let id_col = header.find_exact(ID_COLUMNS).ok_or_else(|| LoadError::Parse {
            dataset: ABT_BUY.to_string(),
            path: path.clone(),
            details: "no id column".into(),
        })?;
        let name_col = header.find_exact(NAME_COLUMNS);
        let desc_col = header.find_exact(DESCRIPTION_COLUMNS);
        let brand_col = header.find_exact(BRAND_COLUMNS);
        let price_col = header.find_exact(PRICE_COLUMNS);
        let mapped: Vec<&str> = [
            Some(&id_col),
            name_col.as_ref(),
            desc_col.as_ref(),
            brand_col.as_ref(),
            price_col.as_ref(),
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect();

        let mut loaded = 0usize;
        builder.scan(reader, |builder, row| {
            let Some(raw_id) = row.value(&id_col) else {
                builder.skip(&path, row.record, "row has no id");
                return Ok(());
            };
            let key = Self::side_key(side, raw_id);
            let Some(id) = builder.keyed(&path, row.record, item_id(ABT_BUY, &key, None, None))?
            else {
                return Ok(());
            };
            let (price, currency) = parse_price_currency(row.value_opt(price_col.as_ref()));
            let item = ItemRow {
                item_id: id,
                dataset: ABT_BUY.to_string(),
                dataset_item_key: key,
                merchant: Some(side.tag.to_string()),
                site: Some(side.site.to_string()),
                brand: normalize_text(row.value_opt(brand_col.as_ref())),
                title: normalize_text(row.get_opt(name_col.as_ref())),
                description: normalize_text(row.get_opt(desc_col.as_ref())),
                price,
                currency,
                attrs: attrs_json(row.unmapped(&mapped))?,
                ..ItemRow::default()
            };
            if builder.add_item(item) {
                loaded += 1;
            }
            Ok(())
        })?;
        info!("[retail:{ABT_BUY}] {} items from {}", loaded, side.file);
        Ok(())
    }

    fn load_matches(builder: &mut BatchBuilder, raw_dir: &Path) -> Result<(), LoadError> {
        let path = require_file(ABT_BUY, raw_dir.join(ABT_MATCHES))?;
        let reader = TableReader::open_delimited(
            ABT_BUY,
            &path,
            HeaderMode::Detect(MATCH_HEADERLESS.to_vec()),
        )?;
        let header = reader.header().clone();
        let columns = header.columns();
        let left_col = header
            .find_exact(LEFT_COLUMNS)
            .or_else(|| columns.first().cloned());
        let right_col = header
            .find_exact(RIGHT_COLUMNS)
            .or_else(|| columns.get(1).cloned());
        let (Some(left_col), Some(right_col)) = (left_col, right_col) else {
            return Err(LoadError::Parse {
                dataset: ABT_BUY.to_string(),
                path,
                details: "match list needs two id columns".into(),
            });
        };
        let indicator_col = header
            .find_exact(INDICATOR_COLUMNS)
            .or_else(|| columns.get(2).cloned());

        builder.scan(reader, |builder, row| {
            let (Some(left_raw), Some(right_raw)) = (row.value(&left_col), row.value(&right_col))
            else {
                builder.skip(&path, row.record, "match row is missing an id");
                return Ok(());
            };
            let label = match row.value_opt(indicator_col.as_ref()) {
                None => PairLabel::Match,
                Some(raw) => match PairLabel::parse_indicator(raw) {
                    Some(label) => label,
                    None => {
                        let reason = format!("unrecognized match indicator '{raw}'");
                        builder.skip(&path, row.record, &reason);
                        return Ok(());
                    }
                },
            };
            let left = item_id(ABT_BUY, &Self::side_key(&TABLE_A, left_raw), None, None);
            let right = item_id(ABT_BUY, &Self::side_key(&TABLE_B, right_raw), None, None);
            let (Some(left), Some(right)) = (
                builder.keyed(&path, row.record, left)?,
                builder.keyed(&path, row.record, right)?,
            ) else {
                return Ok(());
            };
            builder.add_pair(
                &path,
                row.record,
                ItemItemPair::new(left, right, label, PairSource::Gold),
            );
            Ok(())
        })?;
        Ok(())
    }
}

impl DatasetAdapter for AbtBuyAdapter {
    fn name(&self) -> &'static str {
        ABT_BUY
    }

    fn lineage_defaults(&self) -> LineageDefaults {
        LineageDefaults {
            origin_ref: ABT_BUY_ORIGIN,
            download_url: Some(ABT_BUY_URL),
            dataset_version: None,
        }
    }

    fn load(&self, raw_dir: &Path) -> Result<NormalizedBatch, LoadError> {
        let mut builder = BatchBuilder::new(ABT_BUY);
        Self::load_side(&mut builder, raw_dir, &TABLE_A)?;
        Self::load_side(&mut builder, raw_dir, &TABLE_B)?;
        Self::load_matches(&mut builder, raw_dir)?;
        builder.finish(raw_dir, &self.lineage_defaults())
    }
}
