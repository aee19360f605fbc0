//! DIGINETICA session logs.
//!
//! Result-page clicks join to their query through the raw query id. View and
//! purchase logs carry no query, so each session becomes a `session` query.
//! Event order is the file order; nothing is re-sorted.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::constants::datasets::CIKM16;
use crate::constants::lineage::{CIKM16_ORIGIN, CIKM16_URL, CIKM16_VERSION};
use crate::constants::raw::{
    CIKM_CATEGORIES, CIKM_CLICKS, CIKM_PRODUCTS, CIKM_PURCHASES, CIKM_QUERIES, CIKM_SPLIT,
    CIKM_VIEWS,
};
use crate::data::{ItemRow, NormalizedBatch, QueryItemLabel, QueryRow, RowIssues};
use crate::errors::LoadError;
use crate::ids::{item_id, query_id};
use crate::labels::LabelFamily;
use crate::lineage::LineageDefaults;
use crate::source::{BatchBuilder, DatasetAdapter};
use crate::transport::fs::require_file;
use crate::transport::table::{Header, RawRow, TableReader};
use crate::types::{ColumnName, QueryId};
use crate::utils::{attrs_json, clean_value, normalize_text, parse_price_currency};

const ID_COLUMNS: &[&str] = &["productid", "product_id", "itemid", "item_id", "id"];
const ITEM_COLUMNS: &[&str] = &["itemid", "productid", "item_id", "product_id"];
const QUERY_TEXT_COLUMNS: &[&str] = &[
    "query",
    "query_text",
    "searchtokens",
    "search_tokens",
    "searchstring.tokens",
];
const POSITION_COLUMNS: &[&str] = &["position", "rank"];

/// Raw query id -> (derived id, session).
type QueryIndex = HashMap<String, (QueryId, Option<String>)>;

/// Loads DIGINETICA products, queries, and interaction logs.
pub struct Cikm16Adapter;

fn parse_error(path: &Path, details: impl Into<String>) -> LoadError {
    LoadError::Parse {
        dataset: CIKM16.to_string(),
        path: path.to_path_buf(),
        details: details.into(),
    }
}

fn find_price_column(header: &Header) -> Option<ColumnName> {
    header
        .columns()
        .iter()
        .find(|column| column.contains("price") && !column.contains("log"))
        .cloned()
}

fn is_truthy(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|value| value.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "1.0" | "true" | "yes" | "t")
    )
}

/// Integer cell; `Err` carries the offending text.
fn parse_int(raw: Option<&str>) -> Result<Option<i64>, String> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    if let Ok(value) = raw.parse::<i64>() {
        return Ok(Some(value));
    }
    match raw.parse::<f64>() {
        Ok(value) if value.fract() == 0.0 && value.is_finite() => Ok(Some(value as i64)),
        _ => Err(raw.to_string()),
    }
}

fn cikm_item_id(raw: &str) -> Result<String, LoadError> {
    item_id(CIKM16, raw, None, Some(CIKM_SPLIT))
}

impl Cikm16Adapter {
    fn load_categories(raw_dir: &Path) -> Result<HashMap<String, String>, LoadError> {
        let path = raw_dir.join(CIKM_CATEGORIES);
        let mut categories = HashMap::new();
        if !path.is_file() {
            debug!("[retail:{CIKM16}] {} absent; categories left empty", CIKM_CATEGORIES);
            return Ok(categories);
        }
        let reader = TableReader::open(CIKM16, &path)?;
        let header = reader.header();
        let (Some(pid_col), Some(cat_col)) =
            (header.find_exact(ID_COLUMNS), header.find_containing("category"))
        else {
            debug!("[retail:{CIKM16}] {} lacks id/category columns", CIKM_CATEGORIES);
            return Ok(categories);
        };
        let mut issues = RowIssues::default();
        reader.for_each(&mut issues, |row| {
            if let (Some(pid), Some(category)) = (row.value(&pid_col), row.value(&cat_col)) {
                categories
                    .entry(pid.to_string())
                    .or_insert_with(|| category.to_string());
            }
            Ok(())
        })?;
        Ok(categories)
    }

    fn load_products(builder: &mut BatchBuilder, raw_dir: &Path) -> Result<(), LoadError> {
        let path = require_file(CIKM16, raw_dir.join(CIKM_PRODUCTS))?;
        let categories = Self::load_categories(raw_dir)?;
        let reader = TableReader::open(CIKM16, &path)?;
        let header = reader.header().clone();
        let id_col = header
            .find_exact(ID_COLUMNS)
            .ok_or_else(|| parse_error(&path, "no product id column"))?;
        let title_col = header
            .find_containing("title")
            .or_else(|| header.find_containing("name"));
        let desc_col = header.find_containing("desc");
        let brand_col = header.find_containing("brand");
        let price_col = find_price_column(&header);
        let mapped: Vec<&str> = [
            Some(&id_col),
            title_col.as_ref(),
            desc_col.as_ref(),
            brand_col.as_ref(),
            price_col.as_ref(),
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect();

        builder.scan(reader, |builder, row| {
            let Some(pid) = row.value(&id_col) else {
                builder.skip(&path, row.record, "product row has no id");
                return Ok(());
            };
            let Some(id) = builder.keyed(&path, row.record, cikm_item_id(pid))? else {
                return Ok(());
            };
            let (price, currency) = parse_price_currency(row.value_opt(price_col.as_ref()));
            builder.add_item(ItemRow {
                item_id: id,
                dataset: CIKM16.to_string(),
                dataset_item_key: pid.to_string(),
                brand: normalize_text(row.get_opt(brand_col.as_ref())),
                title: normalize_text(row.get_opt(title_col.as_ref())),
                description: normalize_text(row.get_opt(desc_col.as_ref())),
                price,
                currency,
                category: categories.get(pid).cloned(),
                attrs: attrs_json(row.unmapped(&mapped))?,
                split: Some(CIKM_SPLIT.to_string()),
                ..ItemRow::default()
            });
            Ok(())
        })?;
        Ok(())
    }

    fn load_queries(builder: &mut BatchBuilder, raw_dir: &Path) -> Result<QueryIndex, LoadError> {
        let path = raw_dir.join(CIKM_QUERIES);
        let mut index = QueryIndex::new();
        if !path.is_file() {
            debug!("[retail:{CIKM16}] {} absent; no search queries", CIKM_QUERIES);
            return Ok(index);
        }
        let reader = TableReader::open(CIKM16, &path)?;
        let header = reader.header().clone();
        let qid_col = header.find_containing("queryid");
        let text_col = header
            .find_exact(QUERY_TEXT_COLUMNS)
            .or_else(|| header.find_containing("search"));
        if qid_col.is_none() && text_col.is_none() {
            return Err(parse_error(&path, "no query id or query text column"));
        }
        let queryless_col = header.find_containing("queryless");
        let locale_col = header.find_containing("locale");
        let session_col = header.find_containing("session");
        let date_col = header
            .find_containing("eventdate")
            .or_else(|| header.find_containing("event_date"));

        builder.scan(reader, |builder, row| {
            let session = row.value_opt(session_col.as_ref());
            let text = normalize_text(row.get_opt(text_col.as_ref()));
            let raw_qid = row.value_opt(qid_col.as_ref());

            let mut parts: Vec<&str> = Vec::with_capacity(3);
            match (&qid_col, raw_qid, text.as_deref()) {
                (Some(_), Some(qid), _) => parts.extend(["query", qid]),
                (None, _, Some(text)) => parts.extend(["text", text]),
                _ => {
                    builder.skip(&path, row.record, "query row has no key");
                    return Ok(());
                }
            }
            if let Some(session) = session {
                parts.insert(1, session);
            }
            let Some(qid) = builder.keyed(&path, row.record, query_id(CIKM16, &parts))? else {
                return Ok(());
            };

            let queryless = match &queryless_col {
                Some(column) => is_truthy(row.value(column)),
                None => text.is_none(),
            };
            let query_type = if queryless { "queryless" } else { "full" };
            if let Some(raw) = raw_qid {
                index
                    .entry(raw.to_string())
                    .or_insert_with(|| (qid.clone(), session.map(str::to_string)));
            }
            builder.add_query(QueryRow {
                query_id: qid,
                dataset: CIKM16.to_string(),
                query_text: text,
                locale: clean_value(row.get_opt(locale_col.as_ref())),
                query_type: Some(query_type.to_string()),
                source: Some("train-queries".to_string()),
                session_id: session.map(str::to_string),
                event_date: clean_value(row.get_opt(date_col.as_ref())),
            });
            Ok(())
        })?;
        Ok(index)
    }

    /// Session query for logs without a query id.
    fn session_query(
        builder: &mut BatchBuilder,
        path: &Path,
        row: &RawRow,
        session: &str,
        event_date: Option<String>,
        source: &str,
    ) -> Result<Option<QueryId>, LoadError> {
        let Some(qid) = builder.keyed(path, row.record, query_id(CIKM16, &["session", session]))?
        else {
            return Ok(None);
        };
        builder.add_query(QueryRow {
            query_id: qid.clone(),
            dataset: CIKM16.to_string(),
            query_type: Some("session".to_string()),
            source: Some(source.to_string()),
            session_id: Some(session.to_string()),
            event_date,
            ..QueryRow::default()
        });
        Ok(Some(qid))
    }

    fn load_interactions(
        builder: &mut BatchBuilder,
        raw_dir: &Path,
        file: &str,
        family: LabelFamily,
        queries: &QueryIndex,
    ) -> Result<(), LoadError> {
        let path = raw_dir.join(file);
        if !path.is_file() {
            debug!("[retail:{CIKM16}] {} absent; no {} labels", file, family);
            return Ok(());
        }
        let source = file.trim_end_matches(".csv");
        let reader = TableReader::open(CIKM16, &path)?;
        let header = reader.header().clone();
        let qid_col = header.find_containing("queryid");
        let session_col = header.find_containing("session");
        let item_col = header
            .find_exact(ITEM_COLUMNS)
            .ok_or_else(|| parse_error(&path, "no item id column"))?;
        if qid_col.is_none() && session_col.is_none() {
            return Err(parse_error(&path, "no query id or session column"));
        }
        let timeframe_col = header.find_containing("timeframe");
        let position_col = header.find_exact(POSITION_COLUMNS);
        let date_col = header.find_containing("eventdate");
        let Some(label) = family.canonical("1") else {
            return Err(parse_error(&path, format!("{family} has no positive label")));
        };
        let mut ordinals: HashMap<QueryId, i64> = HashMap::new();
        let mut accepted = 0usize;

        builder.scan(reader, |builder, row| {
            let (qid, session) = match &qid_col {
                Some(column) => {
                    let Some(raw) = row.value(column) else {
                        builder.skip(&path, row.record, "event has no query id");
                        return Ok(());
                    };
                    match queries.get(raw) {
                        Some((qid, session)) => (qid.clone(), session.clone()),
                        None => {
                            let reason = format!("unknown query id '{raw}'");
                            builder.dangling(&path, row.record, &reason);
                            return Ok(());
                        }
                    }
                }
                None => {
                    let Some(session) = row.value_opt(session_col.as_ref()) else {
                        builder.skip(&path, row.record, "event has no session id");
                        return Ok(());
                    };
                    let event_date = clean_value(row.get_opt(date_col.as_ref()));
                    let Some(qid) =
                        Self::session_query(builder, &path, row, session, event_date, source)?
                    else {
                        return Ok(());
                    };
                    (qid, Some(session.to_string()))
                }
            };

            let ordinal = ordinals.entry(qid.clone()).or_insert(0);
            *ordinal += 1;
            let ordinal = *ordinal;

            let Some(raw_item) = row.value(&item_col) else {
                builder.skip(&path, row.record, "event has no item id");
                return Ok(());
            };
            let position = match position_col.as_ref() {
                Some(column) => match parse_int(row.value(column)) {
                    Ok(position) => position,
                    Err(raw) => {
                        builder.skip(&path, row.record, &format!("bad position '{raw}'"));
                        return Ok(());
                    }
                },
                None => Some(ordinal),
            };
            let timeframe_ms = match parse_int(row.value_opt(timeframe_col.as_ref())) {
                Ok(timeframe) => timeframe,
                Err(raw) => {
                    builder.skip(&path, row.record, &format!("bad timeframe '{raw}'"));
                    return Ok(());
                }
            };
            let Some(iid) = builder.keyed(&path, row.record, cikm_item_id(raw_item))? else {
                return Ok(());
            };
            let added = builder.add_label(
                &path,
                row.record,
                QueryItemLabel {
                    query_id: qid,
                    item_id: iid,
                    label_family: family.as_str().to_string(),
                    label: label.clone(),
                    position,
                    session_id: session,
                    timeframe_ms,
                    split: Some(CIKM_SPLIT.to_string()),
                },
            );
            if added {
                accepted += 1;
            }
            Ok(())
        })?;
        info!("[retail:{CIKM16}] {} {} labels from {}", accepted, family, file);
        Ok(())
    }
}

impl DatasetAdapter for Cikm16Adapter {
    fn name(&self) -> &'static str {
        CIKM16
    }

    fn lineage_defaults(&self) -> LineageDefaults {
        LineageDefaults {
            origin_ref: CIKM16_ORIGIN,
            download_url: Some(CIKM16_URL),
            dataset_version: Some(CIKM16_VERSION),
        }
    }

    fn load(&self, raw_dir: &Path) -> Result<NormalizedBatch, LoadError> {
        let mut builder = BatchBuilder::new(CIKM16);
        Self::load_products(&mut builder, raw_dir)?;
        let queries = Self::load_queries(&mut builder, raw_dir)?;
        Self::load_interactions(&mut builder, raw_dir, CIKM_VIEWS, LabelFamily::View, &queries)?;
        Self::load_interactions(&mut builder, raw_dir, CIKM_CLICKS, LabelFamily::Click, &queries)?;
        Self::load_interactions(
            &mut builder,
            raw_dir,
            CIKM_PURCHASES,
            LabelFamily::Purchase,
            &queries,
        )?;
        builder.finish(raw_dir, &self.lineage_defaults())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_fixture(dir: &Path) {
        fs::write(
            dir.join(CIKM_PRODUCTS),
            "itemId;pricelog2;product.name.tokens\n1;10;4,5\n2;11;6\n3;9;7,8\n",
        )
        .unwrap();
        fs::write(dir.join(CIKM_CATEGORIES), "itemId;categoryId\n1;100\n2;200\n").unwrap();
        fs::write(
            dir.join(CIKM_QUERIES),
            "queryId;sessionId;userId;timeframe;duration;eventdate;searchstring.tokens;categoryId;items;is.test\n\
             7;s1;;0;100;2016-05-09;16655,244;;1,2,3;FALSE\n\
             8;s2;;0;100;2016-05-10;;45;2,3;FALSE\n",
        )
        .unwrap();
        fs::write(
            dir.join(CIKM_CLICKS),
            "queryId;timeframe;itemId\n7;500;2\n7;900;1\n404;1;1\n8;10;99\n",
        )
        .unwrap();
        fs::write(
            dir.join(CIKM_VIEWS),
            "sessionId;userId;itemId;timeframe;eventdate\ns1;;3;100;2016-05-09\ns1;;1;200;2016-05-09\ns3;;2;50;2016-05-11\n",
        )
        .unwrap();
        fs::write(
            dir.join(CIKM_PURCHASES),
            "sessionId;userId;timeframe;eventdate;ordernumber;itemId\ns1;;300;2016-05-09;1;1\n",
        )
        .unwrap();
    }

    #[test]
    fn products_take_categories_and_keep_log_price_in_attrs() {
        let temp = tempdir().unwrap();
        write_fixture(temp.path());
        let batch = Cikm16Adapter.load(temp.path()).unwrap();
        assert_eq!(batch.items.len(), 3);
        let first = &batch.items[0];
        assert_eq!(first.dataset_item_key, "1");
        assert_eq!(first.category.as_deref(), Some("100"));
        assert_eq!(first.title.as_deref(), Some("4,5"));
        assert_eq!(first.price, None);
        assert_eq!(first.split.as_deref(), Some("train"));
        assert_eq!(first.attrs, r#"{"pricelog2":"10"}"#);
        assert_eq!(batch.items[2].category, None);
    }

    #[test]
    fn clicks_join_queries_and_sessions_become_queries() {
        let temp = tempdir().unwrap();
        write_fixture(temp.path());
        let batch = Cikm16Adapter.load(temp.path()).unwrap();

        let search: Vec<_> = batch
            .queries
            .iter()
            .filter(|q| q.source.as_deref() == Some("train-queries"))
            .collect();
        assert_eq!(search.len(), 2);
        assert_eq!(search[0].query_type.as_deref(), Some("full"));
        assert_eq!(search[1].query_type.as_deref(), Some("queryless"));
        assert_eq!(search[0].session_id.as_deref(), Some("s1"));

        let sessions: Vec<_> = batch
            .queries
            .iter()
            .filter(|q| q.query_type.as_deref() == Some("session"))
            .collect();
        assert_eq!(sessions.len(), 2);

        let clicks: Vec<_> = batch
            .labels
            .iter()
            .filter(|l| l.label_family == "click")
            .collect();
        assert_eq!(clicks.len(), 2);
        assert_eq!(clicks[0].position, Some(1));
        assert_eq!(clicks[1].position, Some(2));
        assert_eq!(clicks[0].timeframe_ms, Some(500));
        assert_eq!(clicks[0].session_id.as_deref(), Some("s1"));
        assert_eq!(clicks[0].query_id, search[0].query_id);

        let views: Vec<_> = batch.labels.iter().filter(|l| l.label_family == "view").collect();
        assert_eq!(views.len(), 3);
        assert_eq!(views[1].position, Some(2));
        assert_eq!(views[2].position, Some(1));
        assert_eq!(views[0].query_id, views[1].query_id);

        let purchases: Vec<_> = batch
            .labels
            .iter()
            .filter(|l| l.label_family == "purchase")
            .collect();
        assert_eq!(purchases.len(), 1);
        assert_eq!(purchases[0].query_id, views[0].query_id);
        assert!(batch.labels.iter().all(|l| l.label == "1"));

        // unknown query 404 and unknown item 99
        assert_eq!(batch.issues.dangling, 2);
    }

    #[test]
    fn products_file_is_required() {
        let temp = tempdir().unwrap();
        let err = Cikm16Adapter.load(temp.path()).unwrap_err();
        assert!(matches!(err, LoadError::MissingInput { .. }));
    }

    #[test]
    fn integer_cells_accept_float_spelling() {
        assert_eq!(parse_int(Some("3")), Ok(Some(3)));
        assert_eq!(parse_int(Some("3.0")), Ok(Some(3)));
        assert_eq!(parse_int(None), Ok(None));
        assert_eq!(parse_int(Some("x")), Err("x".to_string()));
    }
}
