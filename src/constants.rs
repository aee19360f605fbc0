/// Canonical dataset names accepted by the loader.
pub mod datasets {
    /// Abt-Buy product matching benchmark.
    pub const ABT_BUY: &str = "abt_buy";
    /// CIKM Cup 2016 (DIGINETICA) session logs.
    pub const CIKM16: &str = "cikm16";
    /// Amazon Shopping Queries (ESCI) relevance judgments.
    pub const ESCI: &str = "esci";
    /// WDC Products multi-variant catalog.
    pub const WDC: &str = "wdc";
    /// Every dataset name in registry order.
    pub const ALL: [&str; 4] = [ABT_BUY, CIKM16, ESCI, WDC];
}

/// Identifier derivation constants.
pub mod ids {
    /// Number of hex characters kept from the SHA-256 digest.
    pub const ID_HEX_LEN: usize = 32;
    /// Marker byte for an absent scope qualifier.
    pub const SCOPE_ABSENT: u8 = 0x00;
    /// Marker byte preceding a present scope qualifier.
    pub const SCOPE_PRESENT: u8 = 0x01;
}

/// Table names in the unified schema.
pub mod tables {
    use crate::types::TableName;

    /// Catalog items.
    pub const ITEMS: TableName = "items";
    /// Queries and sessions.
    pub const QUERIES: TableName = "queries";
    /// Query-item judgments and interaction signals.
    pub const QUERY_ITEM_LABELS: TableName = "query_item_labels";
    /// Item-item match pairs.
    pub const ITEM_ITEM_PAIRS: TableName = "item_item_pairs";
    /// Product clusters.
    pub const ENTITIES: TableName = "entities";
    /// Item-to-entity links.
    pub const ITEM_ENTITY: TableName = "item_entity";
    /// Append-only load provenance.
    pub const LINEAGE: TableName = "lineage";
}

/// Raw file names and markers used by the adapters.
pub mod raw {
    /// Abt-side catalog of the pairwise benchmark.
    pub const ABT_TABLE_A: &str = "TableA.csv";
    /// Buy-side catalog of the pairwise benchmark.
    pub const ABT_TABLE_B: &str = "TableB.csv";
    /// Gold match list of the pairwise benchmark.
    pub const ABT_MATCHES: &str = "matches.csv";

    /// ESCI product table stem (`.parquet` or `.csv`).
    pub const ESCI_PRODUCTS_STEM: &str = "shopping_queries_dataset_products";
    /// ESCI judgment table stem (`.parquet` or `.csv`).
    pub const ESCI_EXAMPLES_STEM: &str = "shopping_queries_dataset_examples";
    /// Optional ESCI query source mapping.
    pub const ESCI_SOURCES: &str = "shopping_queries_dataset_sources.csv";

    /// DIGINETICA product table.
    pub const CIKM_PRODUCTS: &str = "products.csv";
    /// Optional product-to-category map.
    pub const CIKM_CATEGORIES: &str = "product-categories.csv";
    /// Search queries with session ids.
    pub const CIKM_QUERIES: &str = "train-queries.csv";
    /// Item views per session.
    pub const CIKM_VIEWS: &str = "train-item-views.csv";
    /// Result-page clicks per query.
    pub const CIKM_CLICKS: &str = "train-clicks.csv";
    /// Purchases per session.
    pub const CIKM_PURCHASES: &str = "train-purchases.csv";

    /// Columns an offers file must carry to be recognized.
    pub const WDC_OFFER_COLUMNS: [&str; 6] =
        ["id", "title", "description", "price", "pricecurrency", "brand"];
    /// Columns a pairs file must carry to be recognized.
    pub const WDC_PAIR_COLUMNS: [&str; 3] = ["left_id", "right_id", "label"];
    /// Directory tokens treated as split names.
    pub const SPLIT_TOKENS: [&str; 5] = ["train", "valid", "validation", "test", "dev"];
    /// Catalog version stamped on WDC items.
    pub const WDC_VERSION: &str = "2024";
    /// Split stamped on CIKM16 rows (only the training logs are public).
    pub const CIKM_SPLIT: &str = "train";
}

/// Provenance defaults reported in lineage rows.
pub mod lineage {
    /// Origin of the pairwise benchmark.
    pub const ABT_BUY_ORIGIN: &str = "Abt-Buy entity matching benchmark (Leipzig DB group)";
    /// Download location of the pairwise benchmark.
    pub const ABT_BUY_URL: &str = "https://dbs.uni-leipzig.de/file/Abt-Buy.zip";
    /// Origin of the Shopping Queries dataset.
    pub const ESCI_ORIGIN: &str = "Amazon Shopping Queries Dataset (ESCI)";
    /// Repository of the Shopping Queries dataset.
    pub const ESCI_URL: &str = "https://github.com/amazon-science/esci-data";
    /// Shopping Queries release.
    pub const ESCI_VERSION: &str = "v1";
    /// Origin of the DIGINETICA logs.
    pub const CIKM16_ORIGIN: &str = "CIKM Cup 2016 Track 2 (DIGINETICA)";
    /// Competition page of the DIGINETICA logs.
    pub const CIKM16_URL: &str = "https://competitions.codalab.org/competitions/11161";
    /// DIGINETICA release.
    pub const CIKM16_VERSION: &str = "2016";
    /// Origin of the WDC Products catalog.
    pub const WDC_ORIGIN: &str = "WDC Products benchmark (Web Data Commons)";
    /// Download page of the WDC Products catalog.
    pub const WDC_URL: &str =
        "https://webdatacommons.org/largescaleproductcorpus/wdc-products/";
}

/// Environment variables consulted during configuration resolution.
pub mod env {
    /// Root directory holding one subdirectory per dataset.
    pub const RAW_ROOT: &str = "RETAIL_UNIFY_RAW_ROOT";
    /// Prefix for per-dataset overrides, e.g. `RETAIL_UNIFY_ESCI_DIR`.
    pub const DATASET_DIR_PREFIX: &str = "RETAIL_UNIFY_";
    /// Suffix for per-dataset overrides.
    pub const DATASET_DIR_SUFFIX: &str = "_DIR";
    /// Default raw root when nothing else is configured.
    pub const DEFAULT_RAW_ROOT: &str = "data";
}

/// Storage engine tuning.
pub mod storage {
    /// How long a writer waits on a locked database before failing.
    pub const BUSY_TIMEOUT_MS: u64 = 5_000;
}

/// Logging limits.
pub mod limits {
    /// Row-level warnings logged per dataset before only counting.
    pub const ROW_WARNINGS_PER_DATASET: usize = 25;
}
