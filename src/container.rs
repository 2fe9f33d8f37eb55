//! Generic item container module.
//!
//! Provides the `Container` type, the authoritative store for one set of
//! inventory slots. It coordinates the slot registry and the stacking
//! arithmetic, consults the injected catalog, guards every mutating call
//! with the processing flag, and queues change notifications for the
//! host.
//!
//! Execution model: one authoritative thread of control per container.
//! Operations run synchronously to completion; a call arriving while
//! another is in flight fails fast with `Busy` instead of queueing.

use crate::catalog::ItemCatalog;
use crate::error::ContainerError;
use crate::events::{EventQueue, SlotScope, SlotsChanged};
use crate::item_id::ItemId;
use crate::properties::PropertyBag;
use crate::repair::{repair_slot_map, RepairReport};
use crate::slots::{ItemRecord, SlotMap, SlotNumber, SlotSnapshot};
use crate::stacking::{effective_stack_limit, merge_amounts, mergeable, split_is_valid};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identity of a container instance.
///
/// Used for change notifications and for the deterministic lock order of
/// cross-container operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerId(u64);

impl ContainerId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Runtime configuration of a container.
///
/// Injected at construction and changed only through the explicit update
/// API; there is no global default instance.
///
/// # Examples
///
/// ```rust
/// use zzslot::ContainerConfig;
///
/// let config = ContainerConfig::new(20, 99);
/// assert_eq!(config.capacity, 20);
/// assert_eq!(config.stack_limit, 99);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Number of slots; valid slot numbers are `1..=capacity`.
    pub capacity: u32,
    /// Maximum units per stackable record.
    pub stack_limit: u32,
}

impl ContainerConfig {
    /// Create a configuration. Both values are clamped to at least 1.
    pub fn new(capacity: u32, stack_limit: u32) -> Self {
        Self {
            capacity: capacity.max(1),
            stack_limit: stack_limit.max(1),
        }
    }
}

/// Result of an add operation.
///
/// `changed_slots` lists every slot whose contents differ (ascending,
/// unique); `unplaced` is the remainder that found no room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddOutcome {
    /// Slots that were created or topped up.
    pub changed_slots: Vec<SlotNumber>,
    /// Units that could not be placed.
    pub unplaced: u32,
}

impl AddOutcome {
    /// Whether the requested amount was placed completely.
    pub fn fully_placed(&self) -> bool {
        self.unplaced == 0
    }
}

/// The authoritative store for one set of inventory slots.
///
/// # Examples
///
/// ```rust
/// use zzslot::{CatalogEntry, Container, ContainerConfig, ItemId, MapCatalog};
///
/// let mut catalog = MapCatalog::new();
/// let potion = ItemId::from_str("potion");
/// catalog.insert(potion.clone(), CatalogEntry::stackable());
///
/// let mut container = Container::new(ContainerConfig::new(10, 10));
/// let outcome = container
///     .add_item(&catalog, &potion, None, 7, true, true)
///     .unwrap();
///
/// assert!(outcome.fully_placed());
/// assert_eq!(container.count_item(&potion), 7);
/// ```
#[derive(Debug, Clone)]
pub struct Container {
    id: ContainerId,
    config: ContainerConfig,
    slots: SlotMap,
    processing: bool,
    events: EventQueue,
}

impl Container {
    /// Create an empty container with the given configuration.
    pub fn new(config: ContainerConfig) -> Self {
        Self {
            id: ContainerId::next(),
            config,
            slots: SlotMap::new(config.capacity),
            processing: false,
            events: EventQueue::default(),
        }
    }

    /// Build a container from externally supplied seed records.
    ///
    /// The seed list runs through the consistency validator before the
    /// container is considered live; the report describes every repair
    /// that was applied.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use zzslot::{CatalogEntry, Container, ContainerConfig, ItemId, MapCatalog, SlotSnapshot};
    ///
    /// let mut catalog = MapCatalog::new();
    /// catalog.insert(ItemId::from_str("potion"), CatalogEntry::stackable());
    ///
    /// let seed = vec![SlotSnapshot {
    ///     slot: 3,
    ///     item: ItemId::from_str("potion"),
    ///     amount: 5,
    ///     properties: None,
    /// }];
    ///
    /// let (container, report) = Container::from_seed(
    ///     ContainerConfig::new(10, 10),
    ///     &seed,
    ///     &catalog,
    /// );
    /// assert!(report.is_clean());
    /// assert_eq!(container.slot(3).unwrap().amount, 5);
    /// ```
    pub fn from_seed(
        config: ContainerConfig,
        seed: &[SlotSnapshot],
        catalog: &dyn ItemCatalog,
    ) -> (Self, RepairReport) {
        let mut container = Self::new(config);
        let mut report = RepairReport::new();

        for entry in seed {
            let slot = match report.admit_seed_slot(&container.slots, entry.slot) {
                Some(slot) => slot,
                None => continue,
            };

            let mut record = ItemRecord::new(entry.item.clone(), entry.amount);
            if let Some(bag) = entry.properties.clone() {
                record = record.with_properties(bag);
            }
            // admit_seed_slot guarantees the slot is free and in range
            if container.slots.insert(slot, record).is_err() {
                continue;
            }
        }

        report.merge(repair_slot_map(
            &mut container.slots,
            container.config.stack_limit,
            catalog,
        ));
        (container, report)
    }

    /// The container's process-unique identity.
    pub fn id(&self) -> ContainerId {
        self.id
    }

    /// The current configuration.
    pub fn config(&self) -> ContainerConfig {
        self.config
    }

    /// Snapshot of one slot, if occupied.
    pub fn slot(&self, slot: SlotNumber) -> Option<SlotSnapshot> {
        self.slots.get(slot).map(|record| SlotSnapshot::of(slot, record))
    }

    /// Snapshots of every occupied slot in ascending slot order.
    pub fn slots(&self) -> Vec<SlotSnapshot> {
        self.slots.snapshots()
    }

    /// Number of unoccupied slots.
    pub fn free_slots(&self) -> u32 {
        self.slots.free_slots()
    }

    /// Whether every slot is occupied.
    pub fn is_full(&self) -> bool {
        self.slots.is_full()
    }

    /// Whether no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Total units of an item across all slots.
    pub fn count_item(&self, item: &ItemId) -> u32 {
        self.slots
            .iter()
            .filter(|(_, record)| record.item == *item)
            .map(|(_, record)| record.amount)
            .sum()
    }

    /// Drain queued change notifications.
    pub fn drain_events(&mut self) -> Vec<SlotsChanged> {
        self.events.drain()
    }

    /// Add an item, stacking onto existing records and allocating free
    /// slots as needed.
    ///
    /// With `allow_stack` (and a stackable item), mergeable non-full
    /// stacks are topped up in ascending slot order first. Free slots are
    /// then filled to the limit except the last. When room runs out:
    /// `revert_when_full` rolls the whole operation back and reports
    /// `CapacityExceeded`; otherwise placements are kept and the
    /// remainder is reported unplaced.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use zzslot::{CatalogEntry, Container, ContainerConfig, ItemId, MapCatalog};
    ///
    /// let mut catalog = MapCatalog::new();
    /// let potion = ItemId::from_str("potion");
    /// catalog.insert(potion.clone(), CatalogEntry::stackable());
    ///
    /// let mut container = Container::new(ContainerConfig::new(10, 10));
    /// container.add_item(&catalog, &potion, None, 7, true, true).unwrap();
    /// let outcome = container.add_item(&catalog, &potion, None, 5, true, true).unwrap();
    ///
    /// // 7 + 5 = one full stack of 10 plus a new stack of 2.
    /// assert_eq!(outcome.unplaced, 0);
    /// assert_eq!(container.slot(1).unwrap().amount, 10);
    /// assert_eq!(container.slot(2).unwrap().amount, 2);
    /// ```
    pub fn add_item(
        &mut self,
        catalog: &dyn ItemCatalog,
        item: &ItemId,
        props: Option<&PropertyBag>,
        amount: u32,
        allow_stack: bool,
        revert_when_full: bool,
    ) -> Result<AddOutcome, ContainerError> {
        self.with_processing(|this| {
            let outcome =
                this.add_item_internal(catalog, item, props, amount, allow_stack, revert_when_full)?;
            this.push_inventory_event(&outcome.changed_slots);
            Ok(outcome)
        })
    }

    /// Add an item to one explicit slot.
    ///
    /// An occupied, mergeable target is topped up; an empty target gets a
    /// new record (amount clamped to the limit). Overflow is routed
    /// through [`Container::add_item`] when `enable_fallback`, otherwise
    /// reported unplaced. A fully-unplaced result with fallback disabled
    /// is an error.
    pub fn add_item_to_slot(
        &mut self,
        catalog: &dyn ItemCatalog,
        item: &ItemId,
        slot: SlotNumber,
        props: Option<&PropertyBag>,
        amount: u32,
        allow_stack: bool,
        enable_fallback: bool,
    ) -> Result<AddOutcome, ContainerError> {
        self.with_processing(|this| {
            let outcome = this.add_item_to_slot_internal(
                catalog,
                item,
                slot,
                props,
                amount,
                allow_stack,
                enable_fallback,
            )?;
            this.push_inventory_event(&outcome.changed_slots);
            Ok(outcome)
        })
    }

    /// Remove an amount from a slot.
    ///
    /// Fails if `amount` exceeds the stored amount; no negative results
    /// are permitted. Removing everything deletes the record and its
    /// property bag. Returns the pre-removal snapshot for auditability.
    pub fn remove_amount(
        &mut self,
        slot: SlotNumber,
        amount: u32,
    ) -> Result<SlotSnapshot, ContainerError> {
        self.with_processing(|this| {
            let snapshot = this.remove_amount_internal(slot, amount)?;
            this.push_inventory_event(&[slot]);
            Ok(snapshot)
        })
    }

    /// Split a stack onto the next free slot.
    ///
    /// The new record carries a copy of the source's dynamic properties.
    /// Returns the destination slot number.
    pub fn split_stack(
        &mut self,
        slot: SlotNumber,
        split_amount: u32,
    ) -> Result<SlotNumber, ContainerError> {
        self.with_processing(|this| {
            this.slots.check_slot(slot)?;
            let record = this
                .slots
                .get(slot)
                .ok_or(ContainerError::InvalidSlot(slot))?;
            if !split_is_valid(record.amount, split_amount) {
                return Err(ContainerError::InvalidAmount(split_amount));
            }

            let dest = this
                .slots
                .lowest_free_slot(&[])
                .ok_or(ContainerError::CapacityExceeded(this.id))?;

            let mut split = ItemRecord::new(record.item.clone(), split_amount);
            if let Some(bag) = record.bag().cloned() {
                split = split.with_properties(bag);
            }
            this.slots.insert(dest, split)?;
            if let Some(source) = this.slots.get_mut(slot) {
                source.amount -= split_amount;
            }

            this.push_inventory_event(&[slot, dest]);
            Ok(dest)
        })
    }

    /// Swap or merge the contents of two slots.
    ///
    /// Four cases: both occupied (merge exactly like [`Container::add_item`]'s
    /// merge step when `allow_merge` and the records are mergeable, with
    /// overflow staying on the source slot; otherwise a structural
    /// exchange), only one occupied (the record moves), neither occupied
    /// (failure). Property bags move with their records and are never
    /// duplicated or dropped.
    pub fn swap_items(
        &mut self,
        catalog: &dyn ItemCatalog,
        first: SlotNumber,
        second: SlotNumber,
        allow_merge: bool,
    ) -> Result<(), ContainerError> {
        self.with_processing(|this| {
            this.slots.check_slot(first)?;
            this.slots.check_slot(second)?;
            if first == second {
                return Err(ContainerError::InvalidSlot(second));
            }
            let limit = this.config.stack_limit;
            let changed =
                swap_slots_in_map(&mut this.slots, catalog, first, second, allow_merge, limit)?;
            this.push_inventory_event(&changed);
            Ok(())
        })
    }

    /// Set the stored amount of a slot directly.
    ///
    /// The amount must be within `1..=stack_limit`; non-stackable items
    /// are clamped to 1. Use [`Container::remove_amount`] to take items
    /// out; this is a raw adjustment for hosts that already did their own
    /// accounting.
    pub fn set_amount(
        &mut self,
        catalog: &dyn ItemCatalog,
        slot: SlotNumber,
        amount: u32,
    ) -> Result<(), ContainerError> {
        self.with_processing(|this| {
            this.slots.check_slot(slot)?;
            if amount == 0 || amount > this.config.stack_limit {
                return Err(ContainerError::InvalidAmount(amount));
            }
            let record = this
                .slots
                .get(slot)
                .ok_or(ContainerError::InvalidSlot(slot))?;
            let entry = catalog
                .lookup(&record.item)
                .ok_or_else(|| ContainerError::UnknownItem(record.item.clone()))?;

            let new_amount = if !entry.stackable && amount > 1 {
                debug!(
                    "container {}: amount for slot {slot} clamped to 1, item is not stackable",
                    this.id
                );
                1
            } else {
                amount
            };
            if record.amount == new_amount {
                return Ok(());
            }
            if let Some(record) = this.slots.get_mut(slot) {
                record.amount = new_amount;
            }
            this.push_inventory_event(&[slot]);
            Ok(())
        })
    }

    /// Add, edit or remove one dynamic property of a slot.
    ///
    /// An empty `value` removes the property; a bag that becomes empty is
    /// dropped entirely.
    pub fn set_property(
        &mut self,
        slot: SlotNumber,
        name: &str,
        display_name: &str,
        value: &str,
    ) -> Result<(), ContainerError> {
        self.with_processing(|this| {
            this.slots.check_slot(slot)?;
            let record = this
                .slots
                .get_mut(slot)
                .ok_or(ContainerError::InvalidSlot(slot))?;

            let before = record.properties.take();
            let mut bag = before.clone().unwrap_or_default();
            bag.set(name, display_name, value);
            let after = if bag.is_empty() { None } else { Some(bag) };
            let changed = !crate::properties::bags_equal(before.as_ref(), after.as_ref());
            record.properties = after;

            if changed {
                this.push_inventory_event(&[slot]);
            }
            Ok(())
        })
    }

    /// Whether a slot carries a dynamic property with the given name.
    pub fn has_property(&self, slot: SlotNumber, name: &str) -> bool {
        self.slots
            .get(slot)
            .and_then(|record| record.bag())
            .map(|bag| bag.contains(name))
            .unwrap_or(false)
    }

    /// Get a dynamic property of a slot by name.
    pub fn property(&self, slot: SlotNumber, name: &str) -> Option<crate::ItemProperty> {
        self.slots
            .get(slot)
            .and_then(|record| record.bag())
            .and_then(|bag| bag.get(name))
            .cloned()
    }

    /// Change the stack limit.
    ///
    /// A non-forced change is rejected while any record would overflow
    /// the new limit. A forced change applies the limit and then runs the
    /// consistency validator, which clamps or deletes whatever no longer
    /// fits.
    pub fn set_stack_limit(
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
                    this.slots.iter().find(|(_, r)| r.amount > new_limit)
                {
                    warn!(
                        "container {}: stack limit {new_limit} rejected, slot {slot} holds {}",
                        this.id, record.amount
                    );
                    return Err(ContainerError::CapacityExceeded(this.id));
                }
                this.config.stack_limit = new_limit;
                this.push_inventory_event(&this.slots.occupied_slots());
                return Ok(RepairReport::new());
            }

            this.config.stack_limit = new_limit;
            let report = repair_slot_map(&mut this.slots, new_limit, catalog);
            this.push_inventory_event(&report.touched_slots());
            Ok(report)
        })
    }

    /// Change the capacity.
    ///
    /// A non-forced change is rejected while any occupied slot number
    /// would exceed the new capacity. A forced change applies the
    /// capacity and then runs the consistency validator, which deletes
    /// whatever no longer fits.
    pub fn set_capacity(
        &mut self,
        catalog: &dyn ItemCatalog,
        new_capacity: u32,
        force: bool,
    ) -> Result<RepairReport, ContainerError> {
        self.with_processing(|this| {
            if new_capacity == 0 {
                return Err(ContainerError::InvalidAmount(new_capacity));
            }
            if !force {
                if let Some(slot) = this
                    .slots
                    .occupied_slots()
                    .into_iter()
                    .find(|slot| *slot > new_capacity)
                {
                    warn!(
                        "container {}: capacity {new_capacity} rejected, slot {slot} is occupied",
                        this.id
                    );
                    return Err(ContainerError::CapacityExceeded(this.id));
                }
                this.config.capacity = new_capacity;
                this.slots.set_capacity(new_capacity);
                this.push_inventory_event(&this.slots.occupied_slots());
                return Ok(RepairReport::new());
            }

            this.config.capacity = new_capacity;
            this.slots.set_capacity(new_capacity);
            let report = repair_slot_map(&mut this.slots, this.config.stack_limit, catalog);
            this.push_inventory_event(&report.touched_slots());
            Ok(report)
        })
    }

    /// Run the consistency validator over the live records.
    ///
    /// Structural self-check and repair pass; deletes or clamps offending
    /// entries and reports what it changed. Running it twice in a row
    /// produces the same state as running it once.
    pub fn validate_and_repair(
        &mut self,
        catalog: &dyn ItemCatalog,
    ) -> Result<RepairReport, ContainerError> {
        self.with_processing(|this| {
            let report = repair_slot_map(&mut this.slots, this.config.stack_limit, catalog);
            this.push_inventory_event(&report.touched_slots());
            Ok(report)
        })
    }

    // Internal operations. These skip the processing flag and the event
    // queue so that composite operations (equip, transfer, collect) can
    // run several steps under one flag acquisition and coalesce their
    // notifications.

    pub(crate) fn with_processing<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ContainerError>,
    ) -> Result<T, ContainerError> {
        if self.processing {
            warn!("container {}: rejected call, still processing previous request", self.id);
            return Err(ContainerError::Busy(self.id));
        }
        self.processing = true;
        let result = f(self);
        self.processing = false;
        result
    }

    pub(crate) fn is_processing(&self) -> bool {
        self.processing
    }

    pub(crate) fn set_processing(&mut self, processing: bool) {
        self.processing = processing;
    }

    pub(crate) fn slot_map(&self) -> &SlotMap {
        &self.slots
    }

    pub(crate) fn slot_map_mut(&mut self) -> &mut SlotMap {
        &mut self.slots
    }

    pub(crate) fn push_inventory_event(&mut self, slots: &[SlotNumber]) {
        self.events.push(self.id, SlotScope::Inventory, slots);
    }

    pub(crate) fn push_equipment_event(&mut self, slots: &[SlotNumber]) {
        self.events.push(self.id, SlotScope::Equipment, slots);
    }

    pub(crate) fn add_item_internal(
        &mut self,
        catalog: &dyn ItemCatalog,
        item: &ItemId,
        props: Option<&PropertyBag>,
        amount: u32,
        allow_stack: bool,
        revert_when_full: bool,
    ) -> Result<AddOutcome, ContainerError> {
        if amount == 0 {
            return Err(ContainerError::InvalidAmount(amount));
        }
        let entry = catalog
            .lookup(item)
            .ok_or_else(|| ContainerError::UnknownItem(item.clone()))?;
        let limit = effective_stack_limit(&entry, self.config.stack_limit);
        let props = props.filter(|bag| !bag.is_empty());

        let snapshot = revert_when_full.then(|| self.slots.clone());
        let mut changed: Vec<SlotNumber> = Vec::new();
        let mut remaining = amount;

        if allow_stack && entry.stackable {
            let candidates: Vec<SlotNumber> = self
                .slots
                .iter()
                .filter(|(_, record)| record.amount < limit && mergeable(record, item, props, &entry))
                .map(|(slot, _)| slot)
                .collect();
            for slot in candidates {
                if remaining == 0 {
                    break;
                }
                if let Some(record) = self.slots.get_mut(slot) {
                    let merge = merge_amounts(record.amount, remaining, limit);
                    record.amount = merge.merged;
                    remaining = merge.overflow;
                    changed.push(slot);
                }
            }
        }

        while remaining > 0 {
            let slot = match self.slots.lowest_free_slot(&[]) {
                Some(slot) => slot,
                None => break,
            };
            let placed = if entry.stackable { remaining.min(limit) } else { 1 };
            let mut record = ItemRecord::new(item.clone(), placed);
            if let Some(bag) = props {
                record = record.with_properties(bag.clone());
            }
            self.slots.insert(slot, record)?;
            changed.push(slot);
            remaining -= placed;
        }

        if remaining > 0 && revert_when_full {
            if let Some(snapshot) = snapshot {
                self.slots = snapshot;
            }
            debug!(
                "container {}: {remaining} of {amount} x {item} did not fit, reverting placements",
                self.id
            );
            return Err(ContainerError::CapacityExceeded(self.id));
        }

        Ok(AddOutcome {
            changed_slots: changed,
            unplaced: remaining,
        })
    }

    pub(crate) fn add_item_to_slot_internal(
        &mut self,
        catalog: &dyn ItemCatalog,
        item: &ItemId,
        slot: SlotNumber,
        props: Option<&PropertyBag>,
        amount: u32,
        allow_stack: bool,
        enable_fallback: bool,
    ) -> Result<AddOutcome, ContainerError> {
        if amount == 0 {
            return Err(ContainerError::InvalidAmount(amount));
        }
        self.slots.check_slot(slot)?;
        let entry = catalog
            .lookup(item)
            .ok_or_else(|| ContainerError::UnknownItem(item.clone()))?;
        let limit = effective_stack_limit(&entry, self.config.stack_limit);
        let props = props.filter(|bag| !bag.is_empty());

        let mut changed: Vec<SlotNumber> = Vec::new();
        let mut remaining = amount;

        if self.slots.contains(slot) {
            let can_merge = self
                .slots
                .get(slot)
                .map(|record| allow_stack && mergeable(record, item, props, &entry))
                .unwrap_or(false);
            if can_merge {
                if let Some(record) = self.slots.get_mut(slot) {
                    let merge = merge_amounts(record.amount, remaining, limit);
                    if merge.absorbed(remaining) > 0 {
                        changed.push(slot);
                    }
                    record.amount = merge.merged;
                    remaining = merge.overflow;
                }
            } else if !enable_fallback {
                return Err(ContainerError::SlotOccupied(slot));
            }
        } else {
            let placed = if entry.stackable { remaining.min(limit) } else { 1 };
            let mut record = ItemRecord::new(item.clone(), placed);
            if let Some(bag) = props {
                record = record.with_properties(bag.clone());
            }
            self.slots.insert(slot, record)?;
            changed.push(slot);
            remaining -= placed;
        }

        if remaining > 0 && enable_fallback {
            let outcome =
                self.add_item_internal(catalog, item, props, remaining, allow_stack, false)?;
            changed.extend(outcome.changed_slots);
            remaining = outcome.unplaced;
        }

        if changed.is_empty() && remaining > 0 {
            return Err(ContainerError::CapacityExceeded(self.id));
        }

        Ok(AddOutcome {
            changed_slots: changed,
            unplaced: remaining,
        })
    }

    pub(crate) fn remove_amount_internal(
        &mut self,
        slot: SlotNumber,
        amount: u32,
    ) -> Result<SlotSnapshot, ContainerError> {
        self.slots.check_slot(slot)?;
        let record = self
            .slots
            .get(slot)
            .ok_or(ContainerError::InvalidSlot(slot))?;
        if amount == 0 || amount > record.amount {
            return Err(ContainerError::InvalidAmount(amount));
        }

        let snapshot = SlotSnapshot::of(slot, record);
        if amount == record.amount {
            self.slots.remove(slot);
        } else if let Some(record) = self.slots.get_mut(slot) {
            record.amount -= amount;
        }
        Ok(snapshot)
    }

    /// Find the lowest-numbered non-full stack that can absorb the item,
    /// skipping `excluding`.
    pub(crate) fn find_mergeable_slot(
        &self,
        item: &ItemId,
        props: Option<&PropertyBag>,
        entry: &crate::catalog::CatalogEntry,
        limit: u32,
        excluding: &[SlotNumber],
    ) -> Option<SlotNumber> {
        self.slots
            .iter()
            .filter(|(slot, _)| !excluding.contains(slot))
            .find(|(_, record)| record.amount < limit && mergeable(record, item, props, entry))
            .map(|(slot, _)| slot)
    }
}

/// Swap or merge the contents of two slots of one slot map.
///
/// Shared by the inventory and equipment swap paths; `limit_base` is the
/// stack limit of the map being mutated. Callers have already validated
/// slot numbers (and, for equipment, type constraints). Returns the slots
/// whose contents actually changed.
pub(crate) fn swap_slots_in_map(
    slots: &mut SlotMap,
    catalog: &dyn ItemCatalog,
    first: SlotNumber,
    second: SlotNumber,
    allow_merge: bool,
    limit_base: u32,
) -> Result<Vec<SlotNumber>, ContainerError> {
    match (slots.contains(first), slots.contains(second)) {
        (false, false) => Err(ContainerError::InvalidSlot(first)),
        (true, false) => {
            if let Some(record) = slots.remove(first) {
                slots.insert(second, record)?;
            }
            Ok(vec![first, second])
        }
        (false, true) => {
            if let Some(record) = slots.remove(second) {
                slots.insert(first, record)?;
            }
            Ok(vec![first, second])
        }
        (true, true) => {
            if allow_merge {
                if let Some(entry) = swap_merge_entry(slots, catalog, first, second)? {
                    let limit = effective_stack_limit(&entry, limit_base);
                    let incoming = slots.get(first).map(|record| record.amount).unwrap_or(0);
                    let existing = slots.get(second).map(|record| record.amount).unwrap_or(0);
                    let merge = merge_amounts(existing, incoming, limit);
                    if merge.absorbed(incoming) == 0 {
                        // The target stack is already full; nothing moves.
                        return Ok(Vec::new());
                    }
                    if let Some(record) = slots.get_mut(second) {
                        record.amount = merge.merged;
                    }
                    if merge.overflow == 0 {
                        slots.remove(first);
                    } else if let Some(record) = slots.get_mut(first) {
                        record.amount = merge.overflow;
                    }
                    return Ok(vec![first, second]);
                }
            }

            // Structural exchange: records (and their bags) trade places.
            let a = slots
                .remove(first)
                .ok_or(ContainerError::InvalidSlot(first))?;
            let b = slots
                .remove(second)
                .ok_or(ContainerError::InvalidSlot(second))?;
            slots.insert(first, b)?;
            slots.insert(second, a)?;
            Ok(vec![first, second])
        }
    }
}

/// Catalog entry when the two occupied slots hold mergeable stacks,
/// `None` otherwise.
pub(crate) fn swap_merge_entry(
    slots: &SlotMap,
    catalog: &dyn ItemCatalog,
    first: SlotNumber,
    second: SlotNumber,
) -> Result<Option<crate::catalog::CatalogEntry>, ContainerError> {
    let (a, b) = match (slots.get(first), slots.get(second)) {
        (Some(a), Some(b)) => (a, b),
        _ => return Ok(None),
    };
    if a.item != b.item {
        return Ok(None);
    }
    let entry = catalog
        .lookup(&a.item)
        .ok_or_else(|| ContainerError::UnknownItem(a.item.clone()))?;
    if entry.stackable && crate::properties::bags_equal(a.bag(), b.bag()) {
        Ok(Some(entry))
    } else {
        Ok(None)
    }
}
