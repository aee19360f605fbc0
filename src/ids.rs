//! Deterministic identifier derivation.
//!
//! Ids are a pure function of dataset name, id kind, optional scope
//! qualifiers, and natural-key parts. No counters or shared state are
//! involved, so adapters may derive ids from any thread.

use sha2::Digest;
use std::fmt;

use crate::constants::ids::{ID_HEX_LEN, SCOPE_ABSENT, SCOPE_PRESENT};
use crate::errors::LoadError;
use crate::hash::{stable_hash_with, update_field};
use crate::types::{EntityId, ItemId, QueryId};

/// Discriminator mixed into every derived id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IdKind {
    /// Catalog entry.
    Item,
    /// Search query or session.
    Query,
    /// Cluster of items believed to be the same product.
    Entity,
}

impl IdKind {
    /// Tag hashed into the id.
    pub const fn as_str(&self) -> &'static str {
        match self {
            IdKind::Item => "item",
            IdKind::Query => "query",
            IdKind::Entity => "entity",
        }
    }
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive an id from required natural-key parts.
///
/// Every part must be non-blank: an empty part would silently collapse
/// distinct records onto the same id.
pub fn derive_id(dataset: &str, kind: IdKind, parts: &[&str]) -> Result<String, LoadError> {
    derive_scoped_id(dataset, kind, &[], parts)
}

/// Derive an id from optional scope qualifiers plus required natural-key parts.
///
/// Qualifiers encode presence explicitly, so `None` never equals `Some("")`.
pub fn derive_scoped_id(
    dataset: &str,
    kind: IdKind,
    scope: &[Option<&str>],
    parts: &[&str],
) -> Result<String, LoadError> {
    if dataset.trim().is_empty() {
        return Err(LoadError::Identifier(format!(
            "{kind} id requested with an empty dataset name"
        )));
    }
    if parts.is_empty() {
        return Err(LoadError::Identifier(format!(
            "{kind} id for '{dataset}' requested without natural-key parts"
        )));
    }
    if let Some(pos) = parts.iter().position(|part| part.trim().is_empty()) {
        return Err(LoadError::Identifier(format!(
            "{kind} id for '{dataset}' has an empty natural-key part at position {pos}"
        )));
    }

    let mut digest = stable_hash_with(|hasher| {
        update_field(hasher, dataset.as_bytes());
        update_field(hasher, kind.as_str().as_bytes());
        update_field(hasher, &(scope.len() as u64).to_le_bytes());
        for qualifier in scope {
            match qualifier {
                Some(value) => {
                    hasher.update([SCOPE_PRESENT]);
                    update_field(hasher, value.as_bytes());
                }
                None => hasher.update([SCOPE_ABSENT]),
            }
        }
        for part in parts {
            update_field(hasher, part.as_bytes());
        }
    });
    digest.truncate(ID_HEX_LEN);
    Ok(digest)
}

/// Item id keyed on `(dataset, dataset_item_key, variant, split)`.
pub fn item_id(
    dataset: &str,
    dataset_item_key: &str,
    variant: Option<&str>,
    split: Option<&str>,
) -> Result<ItemId, LoadError> {
    derive_scoped_id(dataset, IdKind::Item, &[variant, split], &[dataset_item_key])
}

/// Query id keyed on `(dataset, raw query identifier parts)`.
pub fn query_id(dataset: &str, parts: &[&str]) -> Result<QueryId, LoadError> {
    derive_id(dataset, IdKind::Query, parts)
}

/// Entity id keyed on `(dataset, raw cluster id)`.
pub fn entity_id(dataset: &str, raw: &str) -> Result<EntityId, LoadError> {
    derive_id(dataset, IdKind::Entity, &[raw])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn derivation_is_deterministic() {
        let a = item_id("wdc", "offer-1", Some("en"), Some("train")).unwrap();
        let b = item_id("wdc", "offer-1", Some("en"), Some("train")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), ID_HEX_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn dataset_and_kind_partition_the_id_space() {
        let item_a = derive_id("abt_buy", IdKind::Item, &["42"]).unwrap();
        let item_b = derive_id("esci", IdKind::Item, &["42"]).unwrap();
        let query = derive_id("abt_buy", IdKind::Query, &["42"]).unwrap();
        let entity = derive_id("abt_buy", IdKind::Entity, &["42"]).unwrap();
        let ids: HashSet<_> = [item_a, item_b, query, entity].into_iter().collect();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn scope_distinguishes_variants_and_absence() {
        let en = item_id("wdc", "p1", Some("en"), Some("train")).unwrap();
        let de = item_id("wdc", "p1", Some("de"), Some("train")).unwrap();
        let unscoped = item_id("wdc", "p1", None, None).unwrap();
        let empty_scope = item_id("wdc", "p1", Some(""), None).unwrap();
        let split_only = item_id("wdc", "p1", None, Some("train")).unwrap();
        let variant_only = item_id("wdc", "p1", Some("train"), None).unwrap();
        let ids: HashSet<_> = [en, de, unscoped, empty_scope, split_only, variant_only]
            .into_iter()
            .collect();
        assert_eq!(ids.len(), 6);
    }

    #[test]
    fn parts_do_not_run_together() {
        let a = query_id("cikm16", &["12", "3"]).unwrap();
        let b = query_id("cikm16", &["1", "23"]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn empty_components_are_rejected() {
        assert!(matches!(
            item_id("abt_buy", "", None, None),
            Err(LoadError::Identifier(_))
        ));
        assert!(matches!(
            query_id("esci", &["q1", "  "]),
            Err(LoadError::Identifier(_))
        ));
        assert!(matches!(entity_id("", "c1"), Err(LoadError::Identifier(_))));
        assert!(matches!(
            derive_id("esci", IdKind::Query, &[]),
            Err(LoadError::Identifier(_))
        ));
    }

    #[test]
    fn distinct_keys_give_distinct_ids() {
        let ids: HashSet<_> = (0..5_000)
            .map(|idx| item_id("esci", &format!("us:{idx}"), None, None).unwrap())
            .collect();
        assert_eq!(ids.len(), 5_000);
    }
}
