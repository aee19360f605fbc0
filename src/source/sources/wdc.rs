//! WDC Products catalog with locale/split variants.
//!
//! Each variant directory is loaded independently and its item ids are scoped
//! by `(variant, split)`, so the same offer id in two variants yields two
//! items. Nothing is merged across variants.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::constants::datasets::WDC;
use crate::constants::lineage::{WDC_ORIGIN, WDC_URL};
use crate::constants::raw::{SPLIT_TOKENS, WDC_OFFER_COLUMNS, WDC_PAIR_COLUMNS, WDC_VERSION};
use crate::data::{
    EntityRow, ItemEntityLink, ItemItemPair, ItemRow, NormalizedBatch, PairLabel, PairSource,
};
use crate::errors::LoadError;
use crate::ids::{entity_id, item_id};
use crate::lineage::LineageDefaults;
use crate::source::{BatchBuilder, DatasetAdapter};
use crate::transport::fs::{file_name_str, list_files, subdirectories};
use crate::transport::table::{Header, HeaderMode, TableReader};
use crate::utils::{attrs_json, clean_value, normalize_text, parse_price_currency};

const TABLE_EXTENSIONS: &[&str] = &["csv", "tsv"];
const ENTITY_OFFER_COLUMNS: &[&str] = &["offer_id", "id", "item_id"];

/// One directory of offers sharing a variant and split.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariantUnit {
    /// Directory holding the offers file.
    pub dir: PathBuf,
    /// Locale or catalog variant, e.g. `en`.
    pub variant: Option<String>,
    /// Split name, e.g. `train`.
    pub split: Option<String>,
}

/// Split a directory name into `(variant, split)`.
///
/// Tokens are separated by `_` or `-`; a token naming a split sets the split
/// and the remaining tokens, rejoined with `_`, form the variant.
pub fn parse_variant_name(name: &str) -> (Option<String>, Option<String>) {
    let mut split = None;
    let mut variant = Vec::new();
    for token in name.split(['_', '-']).filter(|token| !token.is_empty()) {
        let lower = token.to_ascii_lowercase();
        if split.is_none() && SPLIT_TOKENS.contains(&lower.as_str()) {
            split = Some(lower);
        } else {
            variant.push(token);
        }
    }
    let variant = (!variant.is_empty()).then(|| variant.join("_"));
    (variant, split)
}

fn join_variant(outer: Option<String>, inner: Option<String>) -> Option<String> {
    match (outer, inner) {
        (Some(outer), Some(inner)) => Some(format!("{outer}_{inner}")),
        (outer, inner) => outer.or(inner),
    }
}

/// First table in `dir` whose header satisfies `accept`.
fn find_table(
    dir: &Path,
    candidates: impl IntoIterator<Item = PathBuf>,
    accept: impl Fn(&Header) -> bool,
) -> Option<PathBuf> {
    for path in candidates {
        match TableReader::open_delimited(WDC, &path, HeaderMode::Present) {
            Ok(reader) if accept(reader.header()) => return Some(path),
            Ok(_) => {}
            Err(err) => debug!(
                "[retail:{WDC}] ignoring unreadable {} in {}: {}",
                file_name_str(&path),
                dir.display(),
                err
            ),
        }
    }
    None
}

fn find_offers_file(dir: &Path) -> Result<Option<PathBuf>, LoadError> {
    let candidates = list_files(dir, TABLE_EXTENSIONS)?;
    Ok(find_table(dir, candidates, |header| {
        header.contains_all(&WDC_OFFER_COLUMNS)
    }))
}

fn find_pairs_file(dir: &Path) -> Result<Option<PathBuf>, LoadError> {
    let all = list_files(dir, &["csv", "tsv", "txt"])?;
    let named = all.iter().filter(|path| {
        let name = file_name_str(path).to_ascii_lowercase();
        name.starts_with("pairs.")
            || (name.contains("pairs") && (name.ends_with(".csv") || name.ends_with(".tsv")))
    });
    let fallback = all.iter().filter(|path| {
        let name = file_name_str(path).to_ascii_lowercase();
        name.ends_with(".csv") || name.ends_with(".tsv")
    });
    let accept = |header: &Header| header.contains_all(&WDC_PAIR_COLUMNS);
    Ok(find_table(dir, named.cloned(), accept)
        .or_else(|| find_table(dir, fallback.cloned(), accept)))
}

fn find_entity_file(dir: &Path) -> Result<Option<PathBuf>, LoadError> {
    let candidates = list_files(dir, TABLE_EXTENSIONS)?.into_iter().filter(|path| {
        let name = file_name_str(path).to_ascii_lowercase();
        name.contains("offer_to_entity")
            || (name.contains("offer") && name.contains("entity"))
            || name.contains("multi")
    });
    Ok(find_table(dir, candidates, |header| {
        header.find_exact(ENTITY_OFFER_COLUMNS).is_some()
            && header.find_containing("entity").is_some()
    }))
}

/// Variant directories under `raw_dir`, in sorted order.
///
/// With no subdirectories, `raw_dir` itself is the only unit and its own name
/// supplies variant and split. A subdirectory without an offers file is
/// searched one level deeper for split directories.
pub fn discover_units(raw_dir: &Path) -> Result<Vec<VariantUnit>, LoadError> {
    let subs = subdirectories(raw_dir)?;
    if subs.is_empty() {
        let (variant, split) = parse_variant_name(file_name_str(raw_dir));
        return Ok(vec![VariantUnit {
            dir: raw_dir.to_path_buf(),
            variant,
            split,
        }]);
    }

    let mut units = Vec::new();
    for sub in subs {
        let (variant, split) = parse_variant_name(file_name_str(&sub));
        let nested = subdirectories(&sub)?;
        if nested.is_empty() || find_offers_file(&sub)?.is_some() {
            units.push(VariantUnit {
                dir: sub,
                variant,
                split,
            });
            continue;
        }
        for inner in nested {
            let (inner_variant, inner_split) = parse_variant_name(file_name_str(&inner));
            units.push(VariantUnit {
                dir: inner,
                variant: join_variant(variant.clone(), inner_variant),
                split: inner_split.or_else(|| split.clone()),
            });
        }
    }
    Ok(units)
}

/// Loads every variant of the WDC Products catalog.
pub struct WdcAdapter;

impl WdcAdapter {
    fn load_unit(builder: &mut BatchBuilder, unit: &VariantUnit) -> Result<(), LoadError> {
        let Some(offers) = find_offers_file(&unit.dir)? else {
            return Err(LoadError::Parse {
                dataset: WDC.to_string(),
                path: unit.dir.clone(),
                details: format!(
                    "no offers file with columns {}",
                    WDC_OFFER_COLUMNS.join(", ")
                ),
            });
        };
        let variant = unit.variant.as_deref();
        let split = unit.split.as_deref();

        let reader = TableReader::open_delimited(WDC, &offers, HeaderMode::Present)?;
        let mut loaded = 0usize;
        builder.scan(reader, |builder, row| {
            let Some(offer_id) = row.value("id") else {
                builder.skip(&offers, row.record, "offer has no id");
                return Ok(());
            };
            let Some(id) =
                builder.keyed(&offers, row.record, item_id(WDC, offer_id, variant, split))?
            else {
                return Ok(());
            };
            let (price, parsed_currency) = parse_price_currency(row.value("price"));
            let currency = clean_value(row.get("pricecurrency"))
                .map(|code| code.to_ascii_uppercase())
                .or(parsed_currency);
            let added = builder.add_item(ItemRow {
                item_id: id,
                dataset: WDC.to_string(),
                dataset_item_key: offer_id.to_string(),
                brand: normalize_text(row.get("brand")),
                title: normalize_text(row.get("title")),
                description: normalize_text(row.get("description")),
                price,
                currency,
                attrs: attrs_json(row.unmapped(&WDC_OFFER_COLUMNS))?,
                split: unit.split.clone(),
                variant: unit.variant.clone(),
                version: Some(WDC_VERSION.to_string()),
                ..ItemRow::default()
            });
            if added {
                loaded += 1;
            }
            Ok(())
        })?;

        if let Some(pairs) = find_pairs_file(&unit.dir)? {
            let reader = TableReader::open_delimited(WDC, &pairs, HeaderMode::Present)?;
            builder.scan(reader, |builder, row| {
                let (Some(left), Some(right)) = (row.value("left_id"), row.value("right_id"))
                else {
                    builder.skip(&pairs, row.record, "pair row is missing an id");
                    return Ok(());
                };
                let Some(label) = row.value("label").and_then(PairLabel::parse_indicator) else {
                    builder.skip(&pairs, row.record, "pair row has no usable label");
                    return Ok(());
                };
                let left = item_id(WDC, left, variant, split);
                let right = item_id(WDC, right, variant, split);
                let (Some(left), Some(right)) = (
                    builder.keyed(&pairs, row.record, left)?,
                    builder.keyed(&pairs, row.record, right)?,
                ) else {
                    return Ok(());
                };
                let pair = ItemItemPair::new(left, right, label, PairSource::Benchmark)
                    .with_split(unit.split.clone())
                    .with_variant(unit.variant.clone());
                builder.add_pair(&pairs, row.record, pair);
                Ok(())
            })?;
        }

        if let Some(links) = find_entity_file(&unit.dir)? {
            let reader = TableReader::open_delimited(WDC, &links, HeaderMode::Present)?;
            let header = reader.header().clone();
            let (Some(offer_col), Some(entity_col)) = (
                header.find_exact(ENTITY_OFFER_COLUMNS),
                header.find_containing("entity"),
            ) else {
                return Ok(());
            };
            builder.scan(reader, |builder, row| {
                let (Some(offer_id), Some(cluster)) =
                    (row.value(&offer_col), row.value(&entity_col))
                else {
                    builder.skip(&links, row.record, "entity row is missing a value");
                    return Ok(());
                };
                let Some(eid) = builder.keyed(&links, row.record, entity_id(WDC, cluster))? else {
                    return Ok(());
                };
                let Some(iid) =
                    builder.keyed(&links, row.record, item_id(WDC, offer_id, variant, split))?
                else {
                    return Ok(());
                };
                if !builder.has_item(&iid) {
                    builder.dangling(&links, row.record, "entity link references an unknown offer");
                    return Ok(());
                }
                builder.add_entity(EntityRow {
                    entity_id: eid.clone(),
                    dataset: WDC.to_string(),
                    notes: unit.variant.clone(),
                });
                builder.link_entity(
                    &links,
                    row.record,
                    ItemEntityLink {
                        item_id: iid,
                        entity_id: eid,
                    },
                );
                Ok(())
            })?;
        }

        info!(
            "[retail:{WDC}] variant={} split={} items={} from {}",
            variant.unwrap_or("-"),
            split.unwrap_or("-"),
            loaded,
            unit.dir.display()
        );
        Ok(())
    }
}

impl DatasetAdapter for WdcAdapter {
    fn name(&self) -> &'static str {
        WDC
    }

    fn lineage_defaults(&self) -> LineageDefaults {
        LineageDefaults {
            origin_ref: WDC_ORIGIN,
            download_url: Some(WDC_URL),
            dataset_version: Some(WDC_VERSION),
        }
    }

    fn load(&self, raw_dir: &Path) -> Result<NormalizedBatch, LoadError> {
        let mut builder = BatchBuilder::new(WDC);
        for unit in discover_units(raw_dir)? {
            Self::load_unit(&mut builder, &unit)?;
        }
        builder.finish(raw_dir, &self.lineage_defaults())
    }
}
