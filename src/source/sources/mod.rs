/// Pairwise product-matching benchmark.
pub mod abt_buy;
/// Session interaction logs.
pub mod cikm16;
/// Query-product relevance judgments.
pub mod esci;
/// Multi-locale product catalog.
pub mod wdc;
