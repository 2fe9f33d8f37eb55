//! Consistency validator module.
//!
//! Structural self-check and repair over slot maps. The validator runs on
//! load/registration, after forced configuration changes, or whenever a
//! host asks for it explicitly; it is never invoked implicitly inside a
//! data setter. Repairs are deterministic and idempotent: running the
//! validator twice in a row produces the same state as running it once.

use crate::catalog::ItemCatalog;
use crate::item_id::{ItemId, TypeTag};
use crate::slots::{SlotMap, SlotNumber};
use crate::stacking::effective_stack_limit;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One repair the validator applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RepairAction {
    /// A seed entry targeting reserved slot 0 was moved to a free slot.
    SlotReassigned { from: SlotNumber, to: SlotNumber },
    /// A seed entry was dropped because no free slot was left for it.
    SeedEntryDropped { slot: SlotNumber },
    /// A later seed entry duplicated an already-seeded slot number.
    DuplicateSlotRemoved { slot: SlotNumber },
    /// A record sat on a slot number beyond the capacity.
    OutOfRangeSlotRemoved { slot: SlotNumber },
    /// A record held zero units. A record with amount 0 is destroyed, not
    /// resurrected.
    EmptyRecordRemoved { slot: SlotNumber },
    /// A record referenced an item the catalog does not know.
    UnknownItemRemoved { slot: SlotNumber, item: ItemId },
    /// A record's amount exceeded its effective stack limit.
    AmountClamped {
        slot: SlotNumber,
        from: u32,
        to: u32,
    },
    /// A record carried an empty property bag.
    EmptyBagDropped { slot: SlotNumber },
    /// An equipment record occupied a slot with no type slot behind it.
    UntypedEquipmentRemoved { slot: SlotNumber },
}

impl RepairAction {
    /// The slot this repair touched.
    pub fn slot(&self) -> SlotNumber {
        match self {
            RepairAction::SlotReassigned { to, .. } => *to,
            RepairAction::SeedEntryDropped { slot }
            | RepairAction::DuplicateSlotRemoved { slot }
            | RepairAction::OutOfRangeSlotRemoved { slot }
            | RepairAction::EmptyRecordRemoved { slot }
            | RepairAction::UnknownItemRemoved { slot, .. }
            | RepairAction::AmountClamped { slot, .. }
            | RepairAction::EmptyBagDropped { slot }
            | RepairAction::UntypedEquipmentRemoved { slot } => *slot,
        }
    }
}

/// Everything the consistency validator changed in one pass.
///
/// # Examples
///
/// ```rust
/// use zzslot::RepairReport;
///
/// let report = RepairReport::new();
/// assert!(report.is_clean());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepairReport {
    /// Applied repairs, in the order they happened.
    pub actions: Vec<RepairAction>,
}

impl RepairReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the pass found nothing to repair.
    pub fn is_clean(&self) -> bool {
        self.actions.is_empty()
    }

    /// Slots touched by any repair, ascending and unique.
    pub fn touched_slots(&self) -> Vec<SlotNumber> {
        let mut slots: Vec<SlotNumber> = self.actions.iter().map(RepairAction::slot).collect();
        slots.sort_unstable();
        slots.dedup();
        slots
    }

    pub(crate) fn record(&mut self, action: RepairAction) {
        warn!("consistency validator: {action:?}");
        self.actions.push(action);
    }

    pub(crate) fn merge(&mut self, other: RepairReport) {
        self.actions.extend(other.actions);
    }

    /// Decide where a seed entry may land, repairing reserved and
    /// colliding slot numbers. Returns `None` when the entry must be
    /// dropped.
    pub(crate) fn admit_seed_slot(
        &mut self,
        slots: &SlotMap,
        slot: SlotNumber,
    ) -> Option<SlotNumber> {
        if slot == 0 {
            return match slots.lowest_free_slot(&[]) {
                Some(free) => {
                    self.record(RepairAction::SlotReassigned {
                        from: 0,
                        to: free,
                    });
                    Some(free)
                }
                None => {
                    self.record(RepairAction::SeedEntryDropped { slot: 0 });
                    None
                }
            };
        }
        if slot > slots.capacity() {
            self.record(RepairAction::OutOfRangeSlotRemoved { slot });
            return None;
        }
        if slots.contains(slot) {
            self.record(RepairAction::DuplicateSlotRemoved { slot });
            return None;
        }
        Some(slot)
    }
}

/// Repair one slot map against a stack limit and the catalog.
///
/// Deletes out-of-range slots, empty records and unknown items; clamps
/// overflowing amounts (1 for non-stackable items); drops empty bags.
pub(crate) fn repair_slot_map(
    slots: &mut SlotMap,
    stack_limit: u32,
    catalog: &dyn ItemCatalog,
) -> RepairReport {
    let mut report = RepairReport::new();
    let occupied = slots.occupied_slots();

    for slot in occupied {
        if slot > slots.capacity() {
            slots.remove(slot);
            report.record(RepairAction::OutOfRangeSlotRemoved { slot });
            continue;
        }

        let (item, amount, bag_empty) = match slots.get(slot) {
            Some(record) => (
                record.item.clone(),
                record.amount,
                record.properties.as_ref().map(|b| b.is_empty()),
            ),
            None => continue,
        };

        if amount == 0 {
            slots.remove(slot);
            report.record(RepairAction::EmptyRecordRemoved { slot });
            continue;
        }

        let entry = match catalog.lookup(&item) {
            Some(entry) => entry,
            None => {
                slots.remove(slot);
                report.record(RepairAction::UnknownItemRemoved { slot, item });
                continue;
            }
        };

        let limit = effective_stack_limit(&entry, stack_limit);
        if amount > limit {
            if let Some(record) = slots.get_mut(slot) {
                record.amount = limit;
            }
            report.record(RepairAction::AmountClamped {
                slot,
                from: amount,
                to: limit,
            });
        }

        if bag_empty == Some(true) {
            if let Some(record) = slots.get_mut(slot) {
                record.properties = None;
            }
            report.record(RepairAction::EmptyBagDropped { slot });
        }
    }

    report
}

/// Repair an equipment slot map: every occupied slot must be backed by a
/// type slot; record-level checks then apply with the equipment limit.
pub(crate) fn repair_equipment_map(
    slots: &mut SlotMap,
    types: &BTreeMap<SlotNumber, BTreeSet<TypeTag>>,
    equip_stack_limit: u32,
    catalog: &dyn ItemCatalog,
) -> RepairReport {
    let mut report = RepairReport::new();

    for slot in slots.occupied_slots() {
        if !types.contains_key(&slot) {
            slots.remove(slot);
            report.record(RepairAction::UntypedEquipmentRemoved { slot });
        }
    }

    report.merge(repair_slot_map(slots, equip_stack_limit, catalog));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogEntry, MapCatalog};
    use crate::slots::ItemRecord;
    use crate::PropertyBag;

    fn catalog() -> MapCatalog {
        let mut catalog = MapCatalog::new();
        catalog.insert(ItemId::from_str("potion"), CatalogEntry::stackable());
        catalog.insert(ItemId::from_str("sword"), CatalogEntry::unique());
        catalog
    }

    #[test]
    fn test_repair_clamps_overflow() {
        let catalog = catalog();
        let mut slots = SlotMap::new(5);
        slots
            .insert(1, ItemRecord::new(ItemId::from_str("potion"), 25))
            .unwrap();

        let report = repair_slot_map(&mut slots, 10, &catalog);
        assert_eq!(slots.get(1).unwrap().amount, 10);
        assert_eq!(report.actions.len(), 1);
    }

    #[test]
    fn test_repair_clamps_non_stackable_to_one() {
        let catalog = catalog();
        let mut slots = SlotMap::new(5);
        slots
            .insert(2, ItemRecord::new(ItemId::from_str("sword"), 4))
            .unwrap();

        repair_slot_map(&mut slots, 10, &catalog);
        assert_eq!(slots.get(2).unwrap().amount, 1);
    }

    #[test]
    fn test_repair_removes_unknown_items() {
        let catalog = catalog();
        let mut slots = SlotMap::new(5);
        slots
            .insert(1, ItemRecord::new(ItemId::from_str("mystery"), 1))
            .unwrap();

        let report = repair_slot_map(&mut slots, 10, &catalog);
        assert!(slots.is_empty());
        assert!(!report.is_clean());
    }

    #[test]
    fn test_repair_drops_empty_bags() {
        let catalog = catalog();
        let mut slots = SlotMap::new(5);
        let mut record = ItemRecord::new(ItemId::from_str("potion"), 1);
        record.properties = Some(PropertyBag::new());
        slots.insert(1, record).unwrap();

        repair_slot_map(&mut slots, 10, &catalog);
        assert!(slots.get(1).unwrap().properties.is_none());
    }

    #[test]
    fn test_repair_is_idempotent() {
        let catalog = catalog();
        let mut slots = SlotMap::new(5);
        slots
            .insert(1, ItemRecord::new(ItemId::from_str("potion"), 25))
            .unwrap();
        slots
            .insert(4, ItemRecord::new(ItemId::from_str("mystery"), 3))
            .unwrap();

        let first = repair_slot_map(&mut slots, 10, &catalog);
        let after_first = slots.clone();
        let second = repair_slot_map(&mut slots, 10, &catalog);

        assert!(!first.is_clean());
        assert!(second.is_clean());
        assert_eq!(slots, after_first);
    }

    #[test]
    fn test_untyped_equipment_removed() {
        let catalog = catalog();
        let mut slots = SlotMap::unbounded();
        slots
            .insert(3, ItemRecord::new(ItemId::from_str("sword"), 1))
            .unwrap();

        let types = BTreeMap::new();
        let report = repair_equipment_map(&mut slots, &types, 10, &catalog);

        assert!(slots.is_empty());
        assert_eq!(
            report.actions,
            vec![RepairAction::UntypedEquipmentRemoved { slot: 3 }]
        );
    }
}
