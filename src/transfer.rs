//! Cross-container transfer module.
//!
//! Moves items between two container instances: single-slot transfers,
//! whole-container collection, and slot swaps. Both containers' processing
//! flags are acquired before either is mutated, in ascending
//! `ContainerId` order so that two transfers issued in opposite
//! directions cannot deadlock, and released together on every outcome.
//! If either flag is already held the whole operation fails fast and
//! touches neither container.

use crate::catalog::ItemCatalog;
use crate::container::Container;
use crate::equipment::EquipmentContainer;
use crate::error::ContainerError;
use crate::slots::SlotNumber;
use crate::stacking::{effective_stack_limit, records_mergeable};
use serde::{Deserialize, Serialize};

/// Result of a single-slot transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferOutcome {
    /// Units the destination accepted.
    pub moved: u32,
    /// Units left behind on the source slot.
    pub remaining: u32,
    /// Destination slots that received units, ascending and unique.
    pub dest_slots: Vec<SlotNumber>,
}

/// Result of a collect-all batch.
///
/// Collection is not all-or-nothing: a failed or partial individual
/// transfer does not abort the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectOutcome {
    /// Whether any item moved at all.
    pub moved_any: bool,
    /// Whether anything was left behind on the source.
    pub items_left: bool,
}

/// Acquire both processing flags in ascending id order, or fail fast
/// with `Busy` having set neither.
pub(crate) fn acquire_both(a: &mut Container, b: &mut Container) -> Result<(), ContainerError> {
    let (lo, hi) = if a.id() <= b.id() { (a, b) } else { (b, a) };
    if lo.is_processing() {
        return Err(ContainerError::Busy(lo.id()));
    }
    lo.set_processing(true);
    if hi.is_processing() {
        lo.set_processing(false);
        return Err(ContainerError::Busy(hi.id()));
    }
    hi.set_processing(true);
    Ok(())
}

pub(crate) fn release_both(a: &mut Container, b: &mut Container) {
    a.set_processing(false);
    b.set_processing(false);
}

/// Move an amount from one container's slot into another container.
///
/// The destination is offered the items through its regular add path;
/// only the portion it accepts leaves the source. With
/// `revert_when_full`, a partial acceptance reverts the destination and
/// the whole transfer fails; without it the accepted portion moves and
/// the rest stays. Nothing moved at all is an error either way.
///
/// # Examples
///
/// ```rust
/// use zzslot::{
///     transfer_slot, CatalogEntry, Container, ContainerConfig, ItemId, MapCatalog,
/// };
///
/// let mut catalog = MapCatalog::new();
/// let potion = ItemId::from_str("potion");
/// catalog.insert(potion.clone(), CatalogEntry::stackable());
///
/// let mut chest = Container::new(ContainerConfig::new(10, 10));
/// let mut bag = Container::new(ContainerConfig::new(10, 10));
/// chest.add_item(&catalog, &potion, None, 6, true, true).unwrap();
///
/// let outcome = transfer_slot(&mut chest, &mut bag, 1, 6, true, false, &catalog).unwrap();
/// assert_eq!(outcome.moved, 6);
/// assert!(chest.is_empty());
/// assert_eq!(bag.count_item(&potion), 6);
/// ```
pub fn transfer_slot(
    source: &mut Container,
    dest: &mut Container,
    slot: SlotNumber,
    amount: u32,
    allow_stack: bool,
    revert_when_full: bool,
    catalog: &dyn ItemCatalog,
) -> Result<TransferOutcome, ContainerError> {
    acquire_both(source, dest)?;
    let result = transfer_slot_locked(
        source,
        dest,
        slot,
        amount,
        allow_stack,
        revert_when_full,
        catalog,
    );
    release_both(source, dest);
    result
}

fn transfer_slot_locked(
    source: &mut Container,
    dest: &mut Container,
    slot: SlotNumber,
    amount: u32,
    allow_stack: bool,
    revert_when_full: bool,
    catalog: &dyn ItemCatalog,
) -> Result<TransferOutcome, ContainerError> {
    let record = source
        .slot_map()
        .get(slot)
        .cloned()
        .ok_or(ContainerError::InvalidSlot(slot))?;
    if amount == 0 || amount > record.amount {
        return Err(ContainerError::InvalidAmount(amount));
    }

    let outcome = dest.add_item_internal(
        catalog,
        &record.item,
        record.bag(),
        amount,
        allow_stack,
        revert_when_full,
    )?;
    let moved = amount - outcome.unplaced;
    if moved == 0 {
        return Err(ContainerError::CapacityExceeded(dest.id()));
    }

    let remaining = record.amount - moved;
    if remaining == 0 {
        source.slot_map_mut().remove(slot);
    } else if let Some(record) = source.slot_map_mut().get_mut(slot) {
        record.amount = remaining;
    }

    source.push_inventory_event(&[slot]);
    dest.push_inventory_event(&outcome.changed_slots);
    Ok(TransferOutcome {
        moved,
        remaining,
        dest_slots: outcome.changed_slots,
    })
}

/// Offer every slot of `source` to `dest`, one slot at a time.
///
/// Each slot's contents go through the destination's regular add path;
/// whatever the destination declines stays behind. One coalesced change
/// event fires per container.
pub fn collect_all(
    source: &mut Container,
    dest: &mut Container,
    allow_stack: bool,
    catalog: &dyn ItemCatalog,
) -> Result<CollectOutcome, ContainerError> {
    acquire_both(source, dest)?;

    let mut moved_any = false;
    let mut items_left = false;
    let mut source_changed: Vec<SlotNumber> = Vec::new();
    let mut dest_changed: Vec<SlotNumber> = Vec::new();

    for slot in source.slot_map().occupied_slots() {
        let record = match source.slot_map().get(slot) {
            Some(record) => record.clone(),
            None => continue,
        };
        match dest.add_item_internal(
            catalog,
            &record.item,
            record.bag(),
            record.amount,
            allow_stack,
            false,
        ) {
            Ok(outcome) => {
                let moved = record.amount - outcome.unplaced;
                if moved == 0 {
                    items_left = true;
                    continue;
                }
                moved_any = true;
                source_changed.push(slot);
                dest_changed.extend(outcome.changed_slots);
                if outcome.unplaced == 0 {
                    source.slot_map_mut().remove(slot);
                } else {
                    if let Some(record) = source.slot_map_mut().get_mut(slot) {
                        record.amount = outcome.unplaced;
                    }
                    items_left = true;
                }
            }
            Err(_) => items_left = true,
        }
    }

    if !moved_any {
        items_left = true;
    }
    source.push_inventory_event(&source_changed);
    dest.push_inventory_event(&dest_changed);

    release_both(source, dest);
    Ok(CollectOutcome {
        moved_any,
        items_left,
    })
}

/// Swap one slot of `source` against one slot of `dest`.
///
/// A mergeable pair whose combined amount fits the destination limit
/// merges entirely; otherwise the records trade places (or move into the
/// empty side). An exchange that would leave either record over its new
/// container's stack limit is rejected.
pub fn swap_with_container(
    source: &mut Container,
    first: SlotNumber,
    dest: &mut Container,
    second: SlotNumber,
    allow_merge: bool,
    catalog: &dyn ItemCatalog,
) -> Result<(), ContainerError> {
    acquire_both(source, dest)?;
    let result = swap_with_container_locked(source, first, dest, second, allow_merge, catalog);
    release_both(source, dest);
    result
}

fn swap_with_container_locked(
    source: &mut Container,
    first: SlotNumber,
    dest: &mut Container,
    second: SlotNumber,
    allow_merge: bool,
    catalog: &dyn ItemCatalog,
) -> Result<(), ContainerError> {
    dest.slot_map().check_slot(second)?;
    let source_record = source
        .slot_map()
        .get(first)
        .cloned()
        .ok_or(ContainerError::InvalidSlot(first))?;
    let entry = catalog
        .lookup(&source_record.item)
        .ok_or_else(|| ContainerError::UnknownItem(source_record.item.clone()))?;

    match dest.slot_map().get(second).cloned() {
        Some(dest_record) => {
            let dest_limit = effective_stack_limit(&entry, dest.config().stack_limit);
            let combined = source_record.amount + dest_record.amount;
            let mergeable = allow_merge && records_mergeable(&dest_record, &source_record, &entry);

            if mergeable && combined <= dest_limit {
                if let Some(record) = dest.slot_map_mut().get_mut(second) {
                    record.amount = combined;
                }
                source.slot_map_mut().remove(first);
            } else {
                // Structural exchange across containers; both records must
                // respect their new home's limit.
                let dest_entry = catalog
                    .lookup(&dest_record.item)
                    .ok_or_else(|| ContainerError::UnknownItem(dest_record.item.clone()))?;
                let source_limit =
                    effective_stack_limit(&dest_entry, source.config().stack_limit);
                if source_record.amount > dest_limit {
                    return Err(ContainerError::CapacityExceeded(dest.id()));
                }
                if dest_record.amount > source_limit {
                    return Err(ContainerError::CapacityExceeded(source.id()));
                }

                source.slot_map_mut().remove(first);
                dest.slot_map_mut().remove(second);
                source.slot_map_mut().insert(first, dest_record)?;
                dest.slot_map_mut().insert(second, source_record)?;
            }
        }
        None => {
            let dest_limit = effective_stack_limit(&entry, dest.config().stack_limit);
            if source_record.amount > dest_limit {
                return Err(ContainerError::CapacityExceeded(dest.id()));
            }
            source.slot_map_mut().remove(first);
            dest.slot_map_mut().insert(second, source_record)?;
        }
    }

    source.push_inventory_event(&[first]);
    dest.push_inventory_event(&[second]);
    Ok(())
}

/// Move an amount from an equipment slot into another container.
pub fn transfer_equipment_slot(
    source: &mut EquipmentContainer,
    equip_slot: SlotNumber,
    dest: &mut Container,
    amount: u32,
    allow_stack: bool,
    revert_when_full: bool,
    catalog: &dyn ItemCatalog,
) -> Result<TransferOutcome, ContainerError> {
    acquire_both(source.inventory_mut(), dest)?;
    let result = transfer_equipment_slot_locked(
        source,
        equip_slot,
        dest,
        amount,
        allow_stack,
        revert_when_full,
        catalog,
    );
    release_both(source.inventory_mut(), dest);
    result
}

fn transfer_equipment_slot_locked(
    source: &mut EquipmentContainer,
    equip_slot: SlotNumber,
    dest: &mut Container,
    amount: u32,
    allow_stack: bool,
    revert_when_full: bool,
    catalog: &dyn ItemCatalog,
) -> Result<TransferOutcome, ContainerError> {
    let record = source
        .equipment_map()
        .get(equip_slot)
        .cloned()
        .ok_or(ContainerError::InvalidSlot(equip_slot))?;
    if amount == 0 || amount > record.amount {
        return Err(ContainerError::InvalidAmount(amount));
    }

    let outcome = dest.add_item_internal(
        catalog,
        &record.item,
        record.bag(),
        amount,
        allow_stack,
        revert_when_full,
    )?;
    let moved = amount - outcome.unplaced;
    if moved == 0 {
        return Err(ContainerError::CapacityExceeded(dest.id()));
    }

    let remaining = record.amount - moved;
    if remaining == 0 {
        source.equipment_map_mut().remove(equip_slot);
    } else if let Some(record) = source.equipment_map_mut().get_mut(equip_slot) {
        record.amount = remaining;
    }

    source.inventory_mut().push_equipment_event(&[equip_slot]);
    dest.push_inventory_event(&outcome.changed_slots);
    Ok(TransferOutcome {
        moved,
        remaining,
        dest_slots: outcome.changed_slots,
    })
}

/// Offer everything an equipment container holds to another container,
/// equipment slots first, then inventory.
pub fn collect_all_equipment(
    source: &mut EquipmentContainer,
    dest: &mut Container,
    allow_stack: bool,
    catalog: &dyn ItemCatalog,
) -> Result<CollectOutcome, ContainerError> {
    acquire_both(source.inventory_mut(), dest)?;

    let mut moved_any = false;
    let mut items_left = false;
    let mut equip_changed: Vec<SlotNumber> = Vec::new();
    let mut source_changed: Vec<SlotNumber> = Vec::new();
    let mut dest_changed: Vec<SlotNumber> = Vec::new();

    for slot in source.equipment_map().occupied_slots() {
        let record = match source.equipment_map().get(slot) {
            Some(record) => record.clone(),
            None => continue,
        };
        match dest.add_item_internal(
            catalog,
            &record.item,
            record.bag(),
            record.amount,
            allow_stack,
            false,
        ) {
            Ok(outcome) => {
                let moved = record.amount - outcome.unplaced;
                if moved == 0 {
                    items_left = true;
                    continue;
                }
                moved_any = true;
                equip_changed.push(slot);
                dest_changed.extend(outcome.changed_slots);
                if outcome.unplaced == 0 {
                    source.equipment_map_mut().remove(slot);
                } else {
                    if let Some(record) = source.equipment_map_mut().get_mut(slot) {
                        record.amount = outcome.unplaced;
                    }
                    items_left = true;
                }
            }
            Err(_) => items_left = true,
        }
    }

    for slot in source.inventory().slot_map().occupied_slots() {
        let record = match source.inventory().slot_map().get(slot) {
            Some(record) => record.clone(),
            None => continue,
        };
        match dest.add_item_internal(
            catalog,
            &record.item,
            record.bag(),
            record.amount,
            allow_stack,
            false,
        ) {
            Ok(outcome) => {
                let moved = record.amount - outcome.unplaced;
                if moved == 0 {
                    items_left = true;
                    continue;
                }
                moved_any = true;
                source_changed.push(slot);
                dest_changed.extend(outcome.changed_slots);
                if outcome.unplaced == 0 {
                    source.inventory_mut().slot_map_mut().remove(slot);
                } else {
                    if let Some(record) = source.inventory_mut().slot_map_mut().get_mut(slot) {
                        record.amount = outcome.unplaced;
                    }
                    items_left = true;
                }
            }
            Err(_) => items_left = true,
        }
    }

    if !moved_any {
        items_left = true;
    }
    source.inventory_mut().push_equipment_event(&equip_changed);
    source.inventory_mut().push_inventory_event(&source_changed);
    dest.push_inventory_event(&dest_changed);

    release_both(source.inventory_mut(), dest);
    Ok(CollectOutcome {
        moved_any,
        items_left,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogEntry, MapCatalog};
    use crate::container::ContainerConfig;
    use crate::item_id::ItemId;

    fn catalog() -> MapCatalog {
        let mut catalog = MapCatalog::new();
        catalog.insert(ItemId::from_str("potion"), CatalogEntry::stackable());
        catalog.insert(ItemId::from_str("sword"), CatalogEntry::unique());
        catalog.insert(ItemId::from_str("shield"), CatalogEntry::unique());
        catalog
    }

    fn potion() -> ItemId {
        ItemId::from_str("potion")
    }

    #[test]
    fn test_transfer_moves_accepted_portion() {
        let catalog = catalog();
        let mut source = Container::new(ContainerConfig::new(5, 10));
        let mut dest = Container::new(ContainerConfig::new(1, 10));
        source
            .add_item(&catalog, &potion(), None, 10, true, true)
            .unwrap();
        dest.add_item(&catalog, &potion(), None, 7, true, true)
            .unwrap();

        let outcome =
            transfer_slot(&mut source, &mut dest, 1, 10, true, false, &catalog).unwrap();

        assert_eq!(outcome.moved, 3);
        assert_eq!(outcome.remaining, 7);
        assert_eq!(source.slot(1).unwrap().amount, 7);
        assert_eq!(dest.slot(1).unwrap().amount, 10);
    }

    #[test]
    fn test_transfer_conservation() {
        let catalog = catalog();
        let mut source = Container::new(ContainerConfig::new(5, 10));
        let mut dest = Container::new(ContainerConfig::new(5, 10));
        source
            .add_item(&catalog, &potion(), None, 23, true, true)
            .unwrap();

        let total_before = source.count_item(&potion()) + dest.count_item(&potion());
        transfer_slot(&mut source, &mut dest, 1, 10, true, false, &catalog).unwrap();
        transfer_slot(&mut source, &mut dest, 2, 5, true, false, &catalog).unwrap();

        assert_eq!(
            source.count_item(&potion()) + dest.count_item(&potion()),
            total_before
        );
    }

    #[test]
    fn test_transfer_busy_dest_touches_neither() {
        let catalog = catalog();
        let mut source = Container::new(ContainerConfig::new(5, 10));
        let mut dest = Container::new(ContainerConfig::new(5, 10));
        source
            .add_item(&catalog, &potion(), None, 5, true, true)
            .unwrap();

        dest.set_processing(true);
        let result = transfer_slot(&mut source, &mut dest, 1, 5, true, false, &catalog);
        assert_eq!(result, Err(ContainerError::Busy(dest.id())));

        // The source flag must have been released again.
        assert!(!source.is_processing());
        assert_eq!(source.slot(1).unwrap().amount, 5);

        dest.set_processing(false);
        assert!(transfer_slot(&mut source, &mut dest, 1, 5, true, false, &catalog).is_ok());
    }

    #[test]
    fn test_transfer_nothing_moved_is_error() {
        let catalog = catalog();
        let mut source = Container::new(ContainerConfig::new(5, 10));
        let mut dest = Container::new(ContainerConfig::new(1, 10));
        source
            .add_item(&catalog, &potion(), None, 5, true, true)
            .unwrap();
        dest.add_item(&catalog, &ItemId::from_str("sword"), None, 1, false, true)
            .unwrap();

        let result = transfer_slot(&mut source, &mut dest, 1, 5, true, false, &catalog);
        assert_eq!(result, Err(ContainerError::CapacityExceeded(dest.id())));
        assert_eq!(source.slot(1).unwrap().amount, 5);
    }

    #[test]
    fn test_collect_all_partial() {
        let catalog = catalog();
        let mut source = Container::new(ContainerConfig::new(5, 10));
        let mut dest = Container::new(ContainerConfig::new(2, 10));
        source
            .add_item(&catalog, &ItemId::from_str("sword"), None, 1, false, true)
            .unwrap();
        source
            .add_item(&catalog, &ItemId::from_str("shield"), None, 1, false, true)
            .unwrap();
        source
            .add_item(&catalog, &potion(), None, 4, false, true)
            .unwrap();

        let outcome = collect_all(&mut source, &mut dest, false, &catalog).unwrap();

        assert!(outcome.moved_any);
        assert!(outcome.items_left);
        assert_eq!(dest.slots().len(), 2);
        assert_eq!(source.slots().len(), 1);
    }

    #[test]
    fn test_collect_all_empties_source_when_room() {
        let catalog = catalog();
        let mut source = Container::new(ContainerConfig::new(5, 10));
        let mut dest = Container::new(ContainerConfig::new(5, 10));
        source
            .add_item(&catalog, &potion(), None, 14, true, true)
            .unwrap();

        let outcome = collect_all(&mut source, &mut dest, true, &catalog).unwrap();

        assert!(outcome.moved_any);
        assert!(!outcome.items_left);
        assert!(source.is_empty());
        assert_eq!(dest.count_item(&potion()), 14);
    }

    #[test]
    fn test_collect_all_coalesces_events() {
        let catalog = catalog();
        let mut source = Container::new(ContainerConfig::new(5, 10));
        let mut dest = Container::new(ContainerConfig::new(5, 10));
        source
            .add_item(&catalog, &potion(), None, 14, true, true)
            .unwrap();
        source.drain_events();

        collect_all(&mut source, &mut dest, true, &catalog).unwrap();

        assert_eq!(source.drain_events().len(), 1);
        assert_eq!(dest.drain_events().len(), 1);
    }

    #[test]
    fn test_swap_with_container_exchange() {
        let catalog = catalog();
        let mut source = Container::new(ContainerConfig::new(5, 10));
        let mut dest = Container::new(ContainerConfig::new(5, 10));
        source
            .add_item(&catalog, &ItemId::from_str("sword"), None, 1, false, true)
            .unwrap();
        dest.add_item(&catalog, &ItemId::from_str("shield"), None, 1, false, true)
            .unwrap();

        swap_with_container(&mut source, 1, &mut dest, 1, false, &catalog).unwrap();

        assert_eq!(source.slot(1).unwrap().item, ItemId::from_str("shield"));
        assert_eq!(dest.slot(1).unwrap().item, ItemId::from_str("sword"));
    }

    #[test]
    fn test_swap_with_container_full_merge_only() {
        let catalog = catalog();
        let mut source = Container::new(ContainerConfig::new(5, 10));
        let mut dest = Container::new(ContainerConfig::new(5, 10));
        source
            .add_item(&catalog, &potion(), None, 4, true, true)
            .unwrap();
        dest.add_item(&catalog, &potion(), None, 5, true, true)
            .unwrap();

        swap_with_container(&mut source, 1, &mut dest, 1, true, &catalog).unwrap();

        // 4 + 5 fits entirely: merged, source slot gone.
        assert!(source.slot(1).is_none());
        assert_eq!(dest.slot(1).unwrap().amount, 9);
    }

    #[test]
    fn test_swap_with_container_into_empty() {
        let catalog = catalog();
        let mut source = Container::new(ContainerConfig::new(5, 10));
        let mut dest = Container::new(ContainerConfig::new(5, 10));
        source
            .add_item(&catalog, &potion(), None, 4, true, true)
            .unwrap();

        swap_with_container(&mut source, 1, &mut dest, 3, false, &catalog).unwrap();

        assert!(source.slot(1).is_none());
        assert_eq!(dest.slot(3).unwrap().amount, 4);
    }
}
