//! Equipment container module.
//!
//! An `EquipmentContainer` composes a regular inventory [`Container`]
//! with a set of type-constrained equipment slots. Equipment slots are
//! declared as *type slots* (a slot number plus a set of accepted type
//! tags) and may sit empty; an item can occupy one only if its catalog
//! tag set intersects the accepted set.
//!
//! One host, one advisory lock: equipment operations hold the composed
//! inventory's processing flag for their full duration, so an equip that
//! spills items into the inventory cannot interleave with anything else.

use crate::catalog::ItemCatalog;
use crate::container::{
    swap_merge_entry, swap_slots_in_map, AddOutcome, Container, ContainerConfig, ContainerId,
};
use crate::error::ContainerError;
use crate::events::SlotsChanged;
use crate::item_id::{ItemId, TypeTag};
use crate::properties::{bags_equal, PropertyBag};
use crate::repair::{repair_equipment_map, RepairAction, RepairReport};
use crate::slots::{ItemRecord, SlotMap, SlotNumber, SlotSnapshot};
use crate::stacking::{effective_stack_limit, merge_amounts, mergeable};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One equipment type slot: its accepted types and current occupant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentSlotView {
    /// The equipment slot number.
    pub slot: SlotNumber,
    /// Type tags this slot accepts.
    pub accepted_types: BTreeSet<TypeTag>,
    /// The equipped record, if any.
    pub record: Option<SlotSnapshot>,
}

/// Seed entry for one equipment type slot, with an optional occupant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentSeedEntry {
    /// The type slot number.
    pub slot: SlotNumber,
    /// Accepted type tags. An empty set drops the entry on load.
    pub accepted_types: BTreeSet<TypeTag>,
    /// Item equipped in this slot, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<ItemId>,
    /// Amount equipped. Ignored when `item` is absent.
    #[serde(default)]
    pub amount: u32,
    /// Dynamic properties of the occupant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<PropertyBag>,
}

/// Result of an unequip operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnequipOutcome {
    /// Inventory slots that received units, ascending and unique.
    pub inventory_slots: Vec<SlotNumber>,
    /// Units the equipment slot retained because inventory space ran out.
    pub remaining: u32,
}

impl UnequipOutcome {
    /// Whether the equipment slot was fully emptied.
    pub fn complete(&self) -> bool {
        self.remaining == 0
    }
}

/// A container with type-constrained equipment slots layered on top.
///
/// # Examples
///
/// ```rust
/// use std::collections::BTreeSet;
/// use zzslot::{
///     CatalogEntry, ContainerConfig, EquipmentContainer, ItemId, MapCatalog, TypeTag,
/// };
///
/// let mut catalog = MapCatalog::new();
/// let sword = ItemId::from_str("sword");
/// catalog.insert(
///     sword.clone(),
///     CatalogEntry::unique().with_type_tag(TypeTag::from_str("Sword")),
/// );
///
/// let mut host = EquipmentContainer::new(ContainerConfig::new(10, 10), 10);
/// let mut accepted = BTreeSet::new();
/// accepted.insert(TypeTag::from_str("Sword"));
/// host.set_equipment_type(&catalog, 1, Some(accepted)).unwrap();
///
/// host.inventory_mut()
///     .add_item(&catalog, &sword, None, 1, false, true)
///     .unwrap();
/// host.equip_from_inventory(&catalog, 1, Some(1), true, true).unwrap();
///
/// assert!(host.inventory().slot(1).is_none());
/// assert_eq!(host.equipped(1).unwrap().item, sword);
/// ```
#[derive(Debug, Clone)]
pub struct EquipmentContainer {
    inventory: Container,
    equipment: SlotMap,
    types: BTreeMap<SlotNumber, BTreeSet<TypeTag>>,
    equip_stack_limit: u32,
}

impl EquipmentContainer {
    /// Create an equipment container with an empty inventory and no type
    /// slots.
    pub fn new(config: ContainerConfig, equip_stack_limit: u32) -> Self {
        Self {
            inventory: Container::new(config),
            equipment: SlotMap::unbounded(),
            types: BTreeMap::new(),
            equip_stack_limit: equip_stack_limit.max(1),
        }
    }

    /// Build an equipment container from persisted seed data.
    ///
    /// Both seed lists run through the consistency validator before the
    /// container is considered live.
    pub fn from_seed(
        config: ContainerConfig,
        equip_stack_limit: u32,
        inventory_seed: &[SlotSnapshot],
        equipment_seed: &[EquipmentSeedEntry],
        catalog: &dyn ItemCatalog,
    ) -> (Self, RepairReport) {
        let (inventory, mut report) = Container::from_seed(config, inventory_seed, catalog);
        let mut host = Self {
            inventory,
            equipment: SlotMap::unbounded(),
            types: BTreeMap::new(),
            equip_stack_limit: equip_stack_limit.max(1),
        };

        for entry in equipment_seed {
            if entry.slot == 0 {
                report.record(RepairAction::SeedEntryDropped { slot: 0 });
                continue;
            }
            if host.types.contains_key(&entry.slot) {
                report.record(RepairAction::DuplicateSlotRemoved { slot: entry.slot });
                continue;
            }
            if entry.accepted_types.is_empty() {
                report.record(RepairAction::SeedEntryDropped { slot: entry.slot });
                continue;
            }
            host.types.insert(entry.slot, entry.accepted_types.clone());

            if let Some(item) = entry.item.clone() {
                let mut record = ItemRecord::new(item, entry.amount);
                if let Some(bag) = entry.properties.clone() {
                    record = record.with_properties(bag);
                }
                if host.equipment.insert(entry.slot, record).is_err() {
                    report.record(RepairAction::DuplicateSlotRemoved { slot: entry.slot });
                }
            }
        }

        report.merge(repair_equipment_map(
            &mut host.equipment,
            &host.types,
            host.equip_stack_limit,
            catalog,
        ));
        (host, report)
    }

    /// Identity shared with the composed inventory.
    pub fn id(&self) -> ContainerId {
        self.inventory.id()
    }

    /// The composed inventory container.
    pub fn inventory(&self) -> &Container {
        &self.inventory
    }

    /// Mutable access to the composed inventory; plain inventory
    /// operations go through here and take the shared flag themselves.
    pub fn inventory_mut(&mut self) -> &mut Container {
        &mut self.inventory
    }

    /// The equipment stack limit.
    pub fn equip_stack_limit(&self) -> u32 {
        self.equip_stack_limit
    }

    /// Accepted type tags of a type slot.
    pub fn accepted_types(&self, slot: SlotNumber) -> Option<&BTreeSet<TypeTag>> {
        self.types.get(&slot)
    }

    /// Snapshot of the equipped record in a slot, if any.
    pub fn equipped(&self, slot: SlotNumber) -> Option<SlotSnapshot> {
        self.equipment
            .get(slot)
            .map(|record| SlotSnapshot::of(slot, record))
    }

    /// Every type slot with its accepted types and occupant, ascending.
    pub fn equipment_slots(&self) -> Vec<EquipmentSlotView> {
        self.types
            .iter()
            .map(|(slot, accepted)| EquipmentSlotView {
                slot: *slot,
                accepted_types: accepted.clone(),
                record: self.equipped(*slot),
            })
            .collect()
    }

    /// Drain queued change notifications for the whole host.
    pub fn drain_events(&mut self) -> Vec<SlotsChanged> {
        self.inventory.drain_events()
    }

    /// Whether an equipment slot carries a dynamic property.
    pub fn equipment_has_property(&self, slot: SlotNumber, name: &str) -> bool {
        self.equipment
            .get(slot)
            .and_then(|record| record.bag())
            .map(|bag| bag.contains(name))
            .unwrap_or(false)
    }

    /// Get a dynamic property of an equipment slot by name.
    pub fn equipment_property(&self, slot: SlotNumber, name: &str) -> Option<crate::ItemProperty> {
        self.equipment
            .get(slot)
            .and_then(|record| record.bag())
            .and_then(|bag| bag.get(name))
            .cloned()
    }

    /// Assign, reassign or clear the accepted types of an equipment slot.
    ///
    /// Assigning a fresh slot requires a non-empty set. Reassigning an
    /// occupied slot to a different set first unequips the occupant into
    /// inventory, failing the whole call (with no state change) if that
    /// is impossible. Passing `None` clears the type slot, also
    /// unequipping first. An already-equipped item is not retroactively
    /// validated against the new set.
    pub fn set_equipment_type(
        &mut self,
        catalog: &dyn ItemCatalog,
        slot: SlotNumber,
        accepted: Option<BTreeSet<TypeTag>>,
    ) -> Result<(), ContainerError> {
        self.with_processing(|this| {
            if slot == 0 {
                return Err(ContainerError::InvalidSlot(slot));
            }
            let accepted = accepted.filter(|set| !set.is_empty());

            let current = match this.types.get(&slot) {
                Some(current) => current.clone(),
                None => {
                    // Unassigned -> assigned requires a valid set.
                    let accepted = accepted.ok_or(ContainerError::InvalidSlot(slot))?;
                    this.types.insert(slot, accepted);
                    this.inventory.push_equipment_event(&[slot]);
                    return Ok(());
                }
            };

            if accepted.as_ref() == Some(&current) {
                return Ok(());
            }

            let mut inventory_slots = Vec::new();
            if this.equipment.contains(slot) {
                let inv_snapshot = this.inventory.slot_map().clone();
                let equip_snapshot = this.equipment.clone();
                match this.unequip_internal(catalog, slot, &[], true, None) {
                    Ok(outcome) if outcome.complete() => {
                        inventory_slots = outcome.inventory_slots;
                    }
                    _ => {
                        *this.inventory.slot_map_mut() = inv_snapshot;
                        this.equipment = equip_snapshot;
                        warn!(
                            "container {}: equipment slot {slot} could not be unequipped, type change aborted",
                            this.id()
                        );
                        return Err(ContainerError::CapacityExceeded(this.id()));
                    }
                }
            }

            match accepted {
                Some(accepted) => {
                    this.types.insert(slot, accepted);
                }
                None => {
                    this.types.remove(&slot);
                }
            }

            this.inventory.push_equipment_event(&[slot]);
            this.inventory.push_inventory_event(&inventory_slots);
            Ok(())
        })
    }

    /// Equip an item out of the inventory.
    ///
    /// With no `equip_slot` given, type slots are scanned in ascending
    /// order and the first whose accepted types intersect the item's tags
    /// is bound. A same-item, equal-properties occupant merges when
    /// stacking is allowed (overflow stays on the inventory side); any
    /// other occupant is unequipped into inventory first, preferring the
    /// freed source slot. If the occupant cannot be unequipped the whole
    /// call fails and every temporary removal is restored.
    ///
    /// Returns the equipment slot that was bound.
    pub fn equip_from_inventory(
        &mut self,
        catalog: &dyn ItemCatalog,
        inv_slot: SlotNumber,
        equip_slot: Option<SlotNumber>,
        allow_unequipped_stack: bool,
        allow_stack: bool,
    ) -> Result<SlotNumber, ContainerError> {
        self.with_processing(|this| {
            let record = this
                .inventory
                .slot_map()
                .get(inv_slot)
                .cloned()
                .ok_or(ContainerError::InvalidSlot(inv_slot))?;
            let entry = catalog
                .lookup(&record.item)
                .ok_or_else(|| ContainerError::UnknownItem(record.item.clone()))?;
            if entry.type_tags.is_empty() {
                return Err(ContainerError::TypeMismatch {
                    slot: equip_slot.unwrap_or(0),
                    item: record.item.clone(),
                });
            }

            let target = match equip_slot {
                Some(slot) => {
                    let accepted = this
                        .types
                        .get(&slot)
                        .ok_or(ContainerError::InvalidSlot(slot))?;
                    if !entry.accepted_by(accepted) {
                        return Err(ContainerError::TypeMismatch {
                            slot,
                            item: record.item.clone(),
                        });
                    }
                    slot
                }
                None => this
                    .types
                    .iter()
                    .find(|(_, accepted)| entry.accepted_by(accepted))
                    .map(|(slot, _)| *slot)
                    .ok_or(ContainerError::TypeMismatch {
                        slot: 0,
                        item: record.item.clone(),
                    })?,
            };

            let equip_limit = effective_stack_limit(&entry, this.equip_stack_limit);

            let occupant = this.equipment.get(target).cloned();
            if let Some(occupant) = occupant {
                let same_item = occupant.item == record.item
                    && bags_equal(occupant.bag(), record.bag());
                if same_item {
                    if !(allow_stack && entry.stackable) {
                        // Already wearing it; nothing to do.
                        return Ok(target);
                    }
                    let merge = merge_amounts(occupant.amount, record.amount, equip_limit);
                    if merge.absorbed(record.amount) == 0 {
                        return Ok(target);
                    }
                    if let Some(equipped) = this.equipment.get_mut(target) {
                        equipped.amount = merge.merged;
                    }
                    if merge.overflow == 0 {
                        this.inventory.slot_map_mut().remove(inv_slot);
                    } else if let Some(source) = this.inventory.slot_map_mut().get_mut(inv_slot) {
                        source.amount = merge.overflow;
                    }
                    this.inventory.push_equipment_event(&[target]);
                    this.inventory.push_inventory_event(&[inv_slot]);
                    return Ok(target);
                }

                // A different item is equipped: displace it first. Any
                // failure below restores the snapshots untouched.
                let inv_snapshot = this.inventory.slot_map().clone();
                let equip_snapshot = this.equipment.clone();

                this.inventory.slot_map_mut().remove(inv_slot);
                let unequip =
                    this.unequip_internal(catalog, target, &[], allow_unequipped_stack, Some(inv_slot));
                let mut changed = match unequip {
                    Ok(outcome) if outcome.complete() => outcome.inventory_slots,
                    _ => {
                        *this.inventory.slot_map_mut() = inv_snapshot;
                        this.equipment = equip_snapshot;
                        return Err(ContainerError::CapacityExceeded(this.id()));
                    }
                };

                let moved = if allow_stack && entry.stackable {
                    record.amount.min(equip_limit)
                } else {
                    1
                };
                let leftover = record.amount - moved;

                let mut equipped = ItemRecord::new(record.item.clone(), moved);
                if let Some(bag) = record.bag().cloned() {
                    equipped = equipped.with_properties(bag);
                }
                this.equipment.insert(target, equipped)?;
                changed.push(inv_slot);

                if leftover > 0 {
                    let placed = if this.inventory.slot_map().contains(inv_slot) {
                        this.inventory.add_item_internal(
                            catalog,
                            &record.item,
                            record.bag(),
                            leftover,
                            true,
                            true,
                        )
                    } else {
                        let mut rest = ItemRecord::new(record.item.clone(), leftover);
                        if let Some(bag) = record.bag().cloned() {
                            rest = rest.with_properties(bag);
                        }
                        this.inventory
                            .slot_map_mut()
                            .insert(inv_slot, rest)
                            .map(|_| AddOutcome {
                                changed_slots: vec![inv_slot],
                                unplaced: 0,
                            })
                    };
                    match placed {
                        Ok(outcome) => changed.extend(outcome.changed_slots),
                        Err(_) => {
                            *this.inventory.slot_map_mut() = inv_snapshot;
                            this.equipment = equip_snapshot;
                            return Err(ContainerError::CapacityExceeded(this.id()));
                        }
                    }
                }

                this.inventory.push_equipment_event(&[target]);
                this.inventory.push_inventory_event(&changed);
                return Ok(target);
            }

            // Empty equip slot: move units over, leftovers stay put.
            let moved = if allow_stack && entry.stackable {
                record.amount.min(equip_limit)
            } else {
                1
            };
            let leftover = record.amount - moved;

            let mut equipped = ItemRecord::new(record.item.clone(), moved);
            if let Some(bag) = record.bag().cloned() {
                equipped = equipped.with_properties(bag);
            }
            this.equipment.insert(target, equipped)?;

            if leftover == 0 {
                this.inventory.slot_map_mut().remove(inv_slot);
            } else if let Some(source) = this.inventory.slot_map_mut().get_mut(inv_slot) {
                source.amount = leftover;
            }

            this.inventory.push_equipment_event(&[target]);
            this.inventory.push_inventory_event(&[inv_slot]);
            Ok(target)
        })
    }

    /// Unequip an item into the inventory.
    ///
    /// Placement preference: `specific_slot` when empty or holding a
    /// mergeable stack, then any mergeable stack (skipping
    /// `ignore_slots`), then the next free slot. Non-stackable items
    /// return one unit per placement. When space runs out the equipment
    /// slot retains the remainder and the outcome reports it; if nothing
    /// could be placed at all the call fails.
    pub fn unequip(
        &mut self,
        catalog: &dyn ItemCatalog,
        equip_slot: SlotNumber,
        ignore_slots: &[SlotNumber],
        allow_stack: bool,
        specific_slot: Option<SlotNumber>,
    ) -> Result<UnequipOutcome, ContainerError> {
        self.with_processing(|this| {
            let outcome =
                this.unequip_internal(catalog, equip_slot, ignore_slots, allow_stack, specific_slot)?;
            this.inventory.push_equipment_event(&[equip_slot]);
            this.inventory.push_inventory_event(&outcome.inventory_slots);
            Ok(outcome)
        })
    }

    /// Add an externally sourced item straight into an equipment slot.
    ///
    /// Used for starting loadouts and scripted rewards; the item never
    /// passes through the inventory unless it overflows. A same-item,
    /// equal-properties occupant merges when stacking is allowed; any
    /// other occupant is unequipped into inventory first or the call
    /// fails. Overflow beyond the equipment limit is routed through the
    /// inventory's add; the returned outcome lists the changed inventory
    /// slots and the units that found no home.
    pub fn add_item_to_equipment_slot(
        &mut self,
        catalog: &dyn ItemCatalog,
        item: &ItemId,
        equip_slot: SlotNumber,
        props: Option<&PropertyBag>,
        amount: u32,
        allow_unequipped_stack: bool,
        allow_stack: bool,
    ) -> Result<AddOutcome, ContainerError> {
        self.with_processing(|this| {
            if amount == 0 {
                return Err(ContainerError::InvalidAmount(amount));
            }
            let entry = catalog
                .lookup(item)
                .ok_or_else(|| ContainerError::UnknownItem(item.clone()))?;
            let accepted = this
                .types
                .get(&equip_slot)
                .ok_or(ContainerError::InvalidSlot(equip_slot))?;
            if entry.type_tags.is_empty() || !entry.accepted_by(accepted) {
                return Err(ContainerError::TypeMismatch {
                    slot: equip_slot,
                    item: item.clone(),
                });
            }

            let equip_limit = effective_stack_limit(&entry, this.equip_stack_limit);
            let props = props.filter(|bag| !bag.is_empty());
            let mut inventory_changed: Vec<SlotNumber> = Vec::new();
            let mut remaining = amount;

            let occupant = this.equipment.get(equip_slot).cloned();
            match occupant {
                Some(occupant) if allow_stack && mergeable(&occupant, item, props, &entry) => {
                    let merge = merge_amounts(occupant.amount, remaining, equip_limit);
                    if let Some(equipped) = this.equipment.get_mut(equip_slot) {
                        equipped.amount = merge.merged;
                    }
                    remaining = merge.overflow;
                }
                Some(occupant) => {
                    let inv_snapshot = this.inventory.slot_map().clone();
                    let equip_snapshot = this.equipment.clone();
                    let occupant_entry = catalog
                        .lookup(&occupant.item)
                        .ok_or_else(|| ContainerError::UnknownItem(occupant.item.clone()))?;

                    let displaced = if allow_unequipped_stack && occupant_entry.stackable {
                        this.inventory.add_item_internal(
                            catalog,
                            &occupant.item,
                            occupant.bag(),
                            occupant.amount,
                            true,
                            true,
                        )
                    } else {
                        match this.inventory.slot_map().lowest_free_slot(&[]) {
                            Some(slot) => this
                                .inventory
                                .slot_map_mut()
                                .insert(slot, occupant.clone())
                                .map(|_| AddOutcome {
                                    changed_slots: vec![slot],
                                    unplaced: 0,
                                }),
                            None => Err(ContainerError::CapacityExceeded(this.id())),
                        }
                    };
                    match displaced {
                        Ok(outcome) => inventory_changed.extend(outcome.changed_slots),
                        Err(_) => {
                            *this.inventory.slot_map_mut() = inv_snapshot;
                            this.equipment = equip_snapshot;
                            return Err(ContainerError::CapacityExceeded(this.id()));
                        }
                    }

                    this.equipment.remove(equip_slot);
                    let placed = remaining.min(equip_limit);
                    let mut equipped = ItemRecord::new(item.clone(), placed);
                    if let Some(bag) = props {
                        equipped = equipped.with_properties(bag.clone());
                    }
                    this.equipment.insert(equip_slot, equipped)?;
                    remaining -= placed;
                }
                None => {
                    let placed = remaining.min(equip_limit);
                    let mut equipped = ItemRecord::new(item.clone(), placed);
                    if let Some(bag) = props {
                        equipped = equipped.with_properties(bag.clone());
                    }
                    this.equipment.insert(equip_slot, equipped)?;
                    remaining -= placed;
                }
            }

            if remaining > 0 {
                let outcome =
                    this.inventory
                        .add_item_internal(catalog, item, props, remaining, allow_stack, false)?;
                inventory_changed.extend(outcome.changed_slots);
                remaining = outcome.unplaced;
                if remaining > 0 {
                    warn!(
                        "container {}: overflow of {remaining} x {item} found no home and was not placed",
                        this.id()
                    );
                }
            }

            this.inventory.push_equipment_event(&[equip_slot]);
            this.inventory.push_inventory_event(&inventory_changed);
            Ok(AddOutcome {
                changed_slots: inventory_changed,
                unplaced: remaining,
            })
        })
    }

    /// Remove an amount directly from an equipment slot.
    ///
    /// Returns the pre-removal snapshot. Removing everything empties the
    /// slot; the type slot itself stays assigned.
    pub fn remove_equipment_amount(
        &mut self,
        equip_slot: SlotNumber,
        amount: u32,
    ) -> Result<SlotSnapshot, ContainerError> {
        self.with_processing(|this| {
            let record = this
                .equipment
                .get(equip_slot)
                .ok_or(ContainerError::InvalidSlot(equip_slot))?;
            if amount == 0 || amount > record.amount {
                return Err(ContainerError::InvalidAmount(amount));
            }

            let snapshot = SlotSnapshot::of(equip_slot, record);
            if amount == record.amount {
                this.equipment.remove(equip_slot);
            } else if let Some(record) = this.equipment.get_mut(equip_slot) {
                record.amount -= amount;
            }

            this.inventory.push_equipment_event(&[equip_slot]);
            Ok(snapshot)
        })
    }

    /// Swap or merge the contents of two equipment slots.
    ///
    /// Symmetric with the inventory swap: mergeable occupants merge (with
    /// overflow staying on the first slot); otherwise the records trade
    /// places, but only when each item's tags intersect the other slot's
    /// accepted types.
    pub fn swap_equipped(
        &mut self,
        catalog: &dyn ItemCatalog,
        first: SlotNumber,
        second: SlotNumber,
        allow_merge: bool,
    ) -> Result<(), ContainerError> {
        self.with_processing(|this| {
            if first == second {
                return Err(ContainerError::InvalidSlot(second));
            }
            if !this.types.contains_key(&first) {
                return Err(ContainerError::InvalidSlot(first));
            }
            if !this.types.contains_key(&second) {
                return Err(ContainerError::InvalidSlot(second));
            }
            if !this.equipment.contains(first) && !this.equipment.contains(second) {
                return Err(ContainerError::InvalidSlot(first));
            }

            let merging =
                allow_merge && swap_merge_entry(&this.equipment, catalog, first, second)?.is_some();
            if !merging {
                // Both directions must satisfy the destination's types.
                this.check_move(catalog, first, second)?;
                this.check_move(catalog, second, first)?;
            }

            let changed = swap_slots_in_map(
                &mut this.equipment,
                catalog,
                first,
                second,
                allow_merge,
                this.equip_stack_limit,
            )?;
            this.inventory.push_equipment_event(&changed);
            Ok(())
        })
    }

    /// Set the stored amount of an equipment slot directly.
    pub fn set_equipment_amount(
        &mut self,
        catalog: &dyn ItemCatalog,
        equip_slot: SlotNumber,
        amount: u32,
    ) -> Result<(), ContainerError> {
        self.with_processing(|this| {
            if amount == 0 || amount > this.equip_stack_limit {
                return Err(ContainerError::InvalidAmount(amount));
            }
            let record = this
                .equipment
                .get(equip_slot)
                .ok_or(ContainerError::InvalidSlot(equip_slot))?;
            let entry = catalog
                .lookup(&record.item)
                .ok_or_else(|| ContainerError::UnknownItem(record.item.clone()))?;

            let new_amount = if !entry.stackable && amount > 1 { 1 } else { amount };
            if record.amount == new_amount {
                return Ok(());
            }
            if let Some(record) = this.equipment.get_mut(equip_slot) {
                record.amount = new_amount;
            }
            this.inventory.push_equipment_event(&[equip_slot]);
            Ok(())
        })
    }

    /// Add, edit or remove one dynamic property of an equipment slot.
    pub fn set_equipment_property(
        &mut self,
        equip_slot: SlotNumber,
        name: &str,
        display_name: &str,
        value: &str,
    ) -> Result<(), ContainerError> {
        self.with_processing(|this| {
            let record = this
                .equipment
                .get_mut(equip_slot)
                .ok_or(ContainerError::InvalidSlot(equip_slot))?;

            let before = record.properties.take();
            let mut bag = before.clone().unwrap_or_default();
            bag.set(name, display_name, value);
            let after = if bag.is_empty() { None } else { Some(bag) };
            let changed = !bags_equal(before.as_ref(), after.as_ref());
            record.properties = after;

            if changed {
                this.inventory.push_equipment_event(&[equip_slot]);
            }
            Ok(())
        })
    }

    /// Change the equipment stack limit; same reject/force semantics as
    /// [`Container::set_stack_limit`].
    pub fn set_equipment_stack_limit(
        &mut self,
        catalog: &dyn ItemCatalog,
        new_limit: u32,
        force: bool,
    ) -> Result<RepairReport, ContainerError> {
        self.with_processing(|this| {
            if new_limit == 0 {
                return Err(ContainerError::InvalidAmount(new_limit));
            }
            if !force {
                if let Some((slot, record)) =
                    this.equipment.iter().find(|(_, r)| r.amount > new_limit)
                {
                    warn!(
                        "container {}: equipment stack limit {new_limit} rejected, slot {slot} holds {}",
                        this.id(),
                        record.amount
                    );
                    return Err(ContainerError::CapacityExceeded(this.id()));
                }
                this.equip_stack_limit = new_limit;
                let slots = this.equipment.occupied_slots();
                this.inventory.push_equipment_event(&slots);
                return Ok(RepairReport::new());
            }

            this.equip_stack_limit = new_limit;
            let report =
                repair_equipment_map(&mut this.equipment, &this.types, new_limit, catalog);
            let touched = report.touched_slots();
            this.inventory.push_equipment_event(&touched);
            Ok(report)
        })
    }

    /// Run the consistency validator over equipment and inventory.
    pub fn validate_and_repair(
        &mut self,
        catalog: &dyn ItemCatalog,
    ) -> Result<RepairReport, ContainerError> {
        self.with_processing(|this| {
            let mut report = repair_equipment_map(
                &mut this.equipment,
                &this.types,
                this.equip_stack_limit,
                catalog,
            );
            let equip_touched = report.touched_slots();
            this.inventory.push_equipment_event(&equip_touched);

            let stack_limit = this.inventory.config().stack_limit;
            let inventory_report =
                crate::repair::repair_slot_map(this.inventory.slot_map_mut(), stack_limit, catalog);
            let inv_touched = inventory_report.touched_slots();
            this.inventory.push_inventory_event(&inv_touched);
            report.merge(inventory_report);
            Ok(report)
        })
    }

    pub(crate) fn with_processing<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ContainerError>,
    ) -> Result<T, ContainerError> {
        if self.inventory.is_processing() {
            warn!(
                "container {}: rejected call, still processing previous request",
                self.inventory.id()
            );
            return Err(ContainerError::Busy(self.inventory.id()));
        }
        self.inventory.set_processing(true);
        let result = f(self);
        self.inventory.set_processing(false);
        result
    }

    pub(crate) fn equipment_map(&self) -> &SlotMap {
        &self.equipment
    }

    pub(crate) fn equipment_map_mut(&mut self) -> &mut SlotMap {
        &mut self.equipment
    }

    /// One direction of an exchange: the record in `from` must be
    /// accepted by the type slot `to`.
    fn check_move(
        &self,
        catalog: &dyn ItemCatalog,
        from: SlotNumber,
        to: SlotNumber,
    ) -> Result<(), ContainerError> {
        let record = match self.equipment.get(from) {
            Some(record) => record,
            None => return Ok(()),
        };
        let entry = catalog
            .lookup(&record.item)
            .ok_or_else(|| ContainerError::UnknownItem(record.item.clone()))?;
        let accepted = self
            .types
            .get(&to)
            .ok_or(ContainerError::InvalidSlot(to))?;
        if !entry.accepted_by(accepted) {
            return Err(ContainerError::TypeMismatch {
                slot: to,
                item: record.item.clone(),
            });
        }
        Ok(())
    }

    pub(crate) fn unequip_internal(
        &mut self,
        catalog: &dyn ItemCatalog,
        equip_slot: SlotNumber,
        ignore_slots: &[SlotNumber],
        allow_stack: bool,
        specific_slot: Option<SlotNumber>,
    ) -> Result<UnequipOutcome, ContainerError> {
        let record = self
            .equipment
            .get(equip_slot)
            .cloned()
            .ok_or(ContainerError::InvalidSlot(equip_slot))?;
        if !self.types.contains_key(&equip_slot) {
            return Err(ContainerError::StructuralInconsistency(format!(
                "equipment slot {equip_slot} is occupied but has no type slot"
            )));
        }
        let entry = catalog
            .lookup(&record.item)
            .ok_or_else(|| ContainerError::UnknownItem(record.item.clone()))?;

        let inv_limit = effective_stack_limit(&entry, self.inventory.config().stack_limit);
        let stack_ok = allow_stack && entry.stackable;
        let props = record.bag().cloned();
        let mut remaining = record.amount;
        let mut changed: Vec<SlotNumber> = Vec::new();

        // The caller-preferred slot gets first refusal. `None` means the
        // slot is unusable, `Some(None)` empty, `Some(Some(n))` holds a
        // mergeable stack of n.
        if let Some(spec) = specific_slot {
            let usable = spec >= 1
                && spec <= self.inventory.config().capacity
                && !ignore_slots.contains(&spec);
            let state = if !usable {
                None
            } else {
                match self.inventory.slot_map().get(spec) {
                    Some(existing)
                        if stack_ok
                            && existing.amount < inv_limit
                            && mergeable(existing, &record.item, props.as_ref(), &entry) =>
                    {
                        Some(Some(existing.amount))
                    }
                    Some(_) => None,
                    None => Some(None),
                }
            };

            match state {
                Some(Some(existing_amount)) => {
                    let merge = merge_amounts(existing_amount, remaining, inv_limit);
                    if let Some(existing) = self.inventory.slot_map_mut().get_mut(spec) {
                        existing.amount = merge.merged;
                    }
                    remaining = merge.overflow;
                    changed.push(spec);
                }
                Some(None) => {
                    let placed = if stack_ok { remaining.min(inv_limit) } else { 1 };
                    let mut chunk = ItemRecord::new(record.item.clone(), placed);
                    if let Some(bag) = props.clone() {
                        chunk = chunk.with_properties(bag);
                    }
                    self.inventory.slot_map_mut().insert(spec, chunk)?;
                    changed.push(spec);
                    remaining -= placed;
                }
                None => {}
            }
        }

        while remaining > 0 {
            if stack_ok {
                if let Some(slot) = self.inventory.find_mergeable_slot(
                    &record.item,
                    props.as_ref(),
                    &entry,
                    inv_limit,
                    ignore_slots,
                ) {
                    let existing = self
                        .inventory
                        .slot_map()
                        .get(slot)
                        .map(|r| r.amount)
                        .unwrap_or(0);
                    let merge = merge_amounts(existing, remaining, inv_limit);
                    if let Some(target) = self.inventory.slot_map_mut().get_mut(slot) {
                        target.amount = merge.merged;
                    }
                    remaining = merge.overflow;
                    changed.push(slot);
                    continue;
                }
            }

            match self.inventory.slot_map().lowest_free_slot(ignore_slots) {
                Some(slot) => {
                    let placed = if stack_ok { remaining.min(inv_limit) } else { 1 };
                    let mut chunk = ItemRecord::new(record.item.clone(), placed);
                    if let Some(bag) = props.clone() {
                        chunk = chunk.with_properties(bag);
                    }
                    self.inventory.slot_map_mut().insert(slot, chunk)?;
                    changed.push(slot);
                    remaining -= placed;
                }
                None => break,
            }
        }

        let moved = record.amount - remaining;
        if moved == 0 {
            return Err(ContainerError::CapacityExceeded(self.id()));
        }

        if remaining == 0 {
            self.equipment.remove(equip_slot);
        } else if let Some(retained) = self.equipment.get_mut(equip_slot) {
            retained.amount = remaining;
            warn!(
                "container {}: equipment slot {equip_slot} retained {remaining} units, inventory ran out of space",
                self.id()
            );
        }

        changed.sort_unstable();
        changed.dedup();
        Ok(UnequipOutcome {
            inventory_slots: changed,
            remaining,
        })
    }
}
