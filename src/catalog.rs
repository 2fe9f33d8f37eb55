//! Item catalog module.
//!
//! The catalog is an external, read-only source of per-item metadata:
//! whether an item can stack, and which equipment type tags it carries.
//! The engine never stores a catalog; callers inject one per operation.
//! Lookups must be side-effect-free and idempotent within one call.

use crate::item_id::{ItemId, TypeTag};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Per-item metadata as the engine sees it.
///
/// An empty tag set marks an item that cannot be equipped.
///
/// # Examples
///
/// ```rust
/// use zzslot::{CatalogEntry, TypeTag};
///
/// let potion = CatalogEntry::stackable();
/// assert!(potion.stackable);
///
/// let sword = CatalogEntry::unique().with_type_tag(TypeTag::from_str("Sword"));
/// assert!(!sword.stackable);
/// assert!(sword.is_equipment());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Whether multiple units of this item may share one slot.
    pub stackable: bool,
    /// Equipment type tags. Empty for non-equipment items.
    pub type_tags: BTreeSet<TypeTag>,
}

impl CatalogEntry {
    /// Entry for a stackable item.
    pub fn stackable() -> Self {
        Self {
            stackable: true,
            type_tags: BTreeSet::new(),
        }
    }

    /// Entry for a non-stackable item.
    pub fn unique() -> Self {
        Self {
            stackable: false,
            type_tags: BTreeSet::new(),
        }
    }

    /// Add an equipment type tag.
    pub fn with_type_tag(mut self, tag: TypeTag) -> Self {
        self.type_tags.insert(tag);
        self
    }

    /// Whether this item can be equipped at all.
    pub fn is_equipment(&self) -> bool {
        !self.type_tags.is_empty()
    }

    /// Whether this item's tags intersect an accepted-type set.
    pub fn accepted_by(&self, accepted: &BTreeSet<TypeTag>) -> bool {
        self.type_tags.iter().any(|tag| accepted.contains(tag))
    }
}

/// Trait for catalog lookups.
///
/// Implementations are expected to be deterministic: the same item id must
/// yield the same entry for the duration of one engine operation. A `None`
/// result is treated by the engine as a hard failure for the operation in
/// progress; no partial mutation happens.
///
/// # Examples
///
/// ```rust
/// use zzslot::{CatalogEntry, ItemCatalog, ItemId, MapCatalog};
///
/// let mut catalog = MapCatalog::new();
/// catalog.insert(ItemId::from_str("potion"), CatalogEntry::stackable());
///
/// assert!(catalog.lookup(&ItemId::from_str("potion")).is_some());
/// assert!(catalog.lookup(&ItemId::from_str("missing")).is_none());
/// ```
pub trait ItemCatalog {
    /// Look up the metadata for an item. `None` means the item is unknown.
    fn lookup(&self, item: &ItemId) -> Option<CatalogEntry>;
}

/// A map-backed catalog.
///
/// Useful for tests and for hosts whose item metadata already lives in
/// memory. Game integrations typically implement [`ItemCatalog`] directly
/// on top of their asset store instead.
///
/// # Examples
///
/// ```rust
/// use zzslot::{CatalogEntry, ItemCatalog, ItemId, MapCatalog, TypeTag};
///
/// let mut catalog = MapCatalog::new();
/// catalog.insert(ItemId::from_str("potion"), CatalogEntry::stackable());
/// catalog.insert(
///     ItemId::from_str("helmet"),
///     CatalogEntry::unique().with_type_tag(TypeTag::from_str("Helmet")),
/// );
///
/// let entry = catalog.lookup(&ItemId::from_str("helmet")).unwrap();
/// assert!(entry.is_equipment());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MapCatalog {
    entries: HashMap<ItemId, CatalogEntry>,
}

impl MapCatalog {
    /// Create a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, item: ItemId, entry: CatalogEntry) {
        self.entries.insert(item, entry);
    }
}

impl ItemCatalog for MapCatalog {
    fn lookup(&self, item: &ItemId) -> Option<CatalogEntry> {
        self.entries.get(item).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_catalog_lookup() {
        let mut catalog = MapCatalog::new();
        catalog.insert(ItemId::from_str("potion"), CatalogEntry::stackable());

        let entry = catalog.lookup(&ItemId::from_str("potion")).unwrap();
        assert!(entry.stackable);
        assert!(!entry.is_equipment());

        assert!(catalog.lookup(&ItemId::from_str("sword")).is_none());
    }

    #[test]
    fn test_accepted_by_intersection() {
        let entry = CatalogEntry::unique()
            .with_type_tag(TypeTag::from_str("Sword"))
            .with_type_tag(TypeTag::from_str("TwoHanded"));

        let mut accepted = BTreeSet::new();
        accepted.insert(TypeTag::from_str("Sword"));
        assert!(entry.accepted_by(&accepted));

        let mut other = BTreeSet::new();
        other.insert(TypeTag::from_str("Helmet"));
        assert!(!entry.accepted_by(&other));
    }
}
