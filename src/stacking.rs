//! Stacking arithmetic module.
//!
//! Pure merge, split and overflow math over amounts and limits. No
//! catalog lookups and no container state live here; the container
//! operations feed in the effective limits and act on the results.

use crate::catalog::CatalogEntry;
use crate::properties::{bags_equal, PropertyBag};
use crate::slots::ItemRecord;

/// Result of merging an incoming amount into an existing stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Merge {
    /// The stack's amount after the merge.
    pub merged: u32,
    /// The portion that did not fit and must be routed elsewhere.
    pub overflow: u32,
}

impl Merge {
    /// Whether everything fit into the stack.
    pub fn complete(&self) -> bool {
        self.overflow == 0
    }

    /// How many units the merge actually absorbed.
    pub fn absorbed(&self, incoming: u32) -> u32 {
        incoming - self.overflow
    }
}

/// Merge `incoming` units into a stack currently holding `existing`.
///
/// If the sum fits within `limit` the merge is complete; otherwise the
/// stack is filled to the limit and the remainder overflows.
///
/// # Examples
///
/// ```rust
/// use zzslot::stacking::merge_amounts;
///
/// let full = merge_amounts(7, 3, 10);
/// assert_eq!((full.merged, full.overflow), (10, 0));
///
/// let partial = merge_amounts(7, 5, 10);
/// assert_eq!((partial.merged, partial.overflow), (10, 2));
/// ```
pub fn merge_amounts(existing: u32, incoming: u32, limit: u32) -> Merge {
    let total = existing.saturating_add(incoming);
    if total <= limit {
        Merge {
            merged: total,
            overflow: 0,
        }
    } else {
        Merge {
            merged: limit,
            overflow: total - limit,
        }
    }
}

/// The stack limit that actually applies to an item.
///
/// Non-stackable items are capped at one unit per slot no matter what the
/// container's limit says.
pub fn effective_stack_limit(entry: &CatalogEntry, container_limit: u32) -> u32 {
    if entry.stackable {
        container_limit.max(1)
    } else {
        1
    }
}

/// Whether `split_amount` is a valid split of a stack of `amount`.
///
/// Both resulting records must hold at least one unit, so the split must
/// be strictly between zero and the current amount.
pub fn split_is_valid(amount: u32, split_amount: u32) -> bool {
    split_amount > 0 && split_amount < amount
}

/// Whether a stored record can absorb units of the given item.
///
/// Mergeable means: same catalog item, equal dynamic-property bags (an
/// empty bag counts as absent), and the catalog marks the item stackable.
pub fn mergeable(
    record: &ItemRecord,
    item: &crate::item_id::ItemId,
    props: Option<&PropertyBag>,
    entry: &CatalogEntry,
) -> bool {
    entry.stackable && record.item == *item && bags_equal(record.properties.as_ref(), props)
}

/// Whether two stored records can merge with each other.
pub fn records_mergeable(first: &ItemRecord, second: &ItemRecord, entry: &CatalogEntry) -> bool {
    mergeable(first, &second.item, second.properties.as_ref(), entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item_id::ItemId;

    #[test]
    fn test_merge_full() {
        let merge = merge_amounts(3, 4, 10);
        assert_eq!(merge.merged, 7);
        assert_eq!(merge.overflow, 0);
        assert!(merge.complete());
    }

    #[test]
    fn test_merge_exact_limit() {
        let merge = merge_amounts(6, 4, 10);
        assert_eq!(merge.merged, 10);
        assert!(merge.complete());
    }

    #[test]
    fn test_merge_overflow() {
        let merge = merge_amounts(8, 5, 10);
        assert_eq!(merge.merged, 10);
        assert_eq!(merge.overflow, 3);
        assert_eq!(merge.absorbed(5), 2);
    }

    #[test]
    fn test_effective_limit_non_stackable() {
        assert_eq!(effective_stack_limit(&CatalogEntry::unique(), 99), 1);
        assert_eq!(effective_stack_limit(&CatalogEntry::stackable(), 99), 99);
    }

    #[test]
    fn test_split_bounds() {
        assert!(split_is_valid(10, 3));
        assert!(!split_is_valid(10, 0));
        assert!(!split_is_valid(10, 10));
        assert!(!split_is_valid(10, 11));
        assert!(!split_is_valid(1, 1));
    }

    #[test]
    fn test_mergeable_requires_equal_bags() {
        let item = ItemId::from_str("potion");
        let entry = CatalogEntry::stackable();

        let plain = ItemRecord::new(item.clone(), 5);
        assert!(mergeable(&plain, &item, None, &entry));

        let bag = PropertyBag::single("quality", "Quality", "fine");
        let enchanted = ItemRecord::new(item.clone(), 5).with_properties(bag.clone());
        assert!(!mergeable(&enchanted, &item, None, &entry));
        assert!(mergeable(&enchanted, &item, Some(&bag), &entry));
    }

    #[test]
    fn test_non_stackable_never_merges() {
        let item = ItemId::from_str("sword");
        let record = ItemRecord::new(item.clone(), 1);
        assert!(!mergeable(&record, &item, None, &CatalogEntry::unique()));
    }
}
