//! Slot registry module.
//!
//! Provides the `SlotMap` type: the sparse mapping from stable external
//! slot numbers to item records. A slot number is a positive integer
//! chosen by the caller or allocated by lowest-free-slot search; it is an
//! identity, not a storage position. Slot `0` is reserved and always
//! rejected.

use crate::error::ContainerError;
use crate::item_id::ItemId;
use crate::properties::PropertyBag;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stable external identity of a position within a container. `0` is
/// reserved/invalid.
pub type SlotNumber = u32;

/// One occupied slot: the item it holds, how many units, and the optional
/// dynamic-property bag.
///
/// The bag is present only when at least one named property exists; for
/// comparison purposes an absent bag and an empty bag are equivalent.
///
/// # Examples
///
/// ```rust
/// use zzslot::{ItemId, ItemRecord, PropertyBag};
///
/// let plain = ItemRecord::new(ItemId::from_str("potion"), 5);
/// assert!(plain.properties.is_none());
///
/// let named = ItemRecord::new(ItemId::from_str("sword"), 1)
///     .with_properties(PropertyBag::single("name", "Name", "Dawnbreaker"));
/// assert!(named.properties.is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Catalog reference of the stored item.
    pub item: ItemId,
    /// Stored amount, always at least 1 while the record exists.
    pub amount: u32,
    /// Dynamic properties of this item instance, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<PropertyBag>,
}

impl ItemRecord {
    /// Create a record without dynamic properties.
    pub fn new(item: ItemId, amount: u32) -> Self {
        Self {
            item,
            amount,
            properties: None,
        }
    }

    /// Attach a property bag. An empty bag is normalized to absent.
    pub fn with_properties(mut self, bag: PropertyBag) -> Self {
        self.properties = if bag.is_empty() { None } else { Some(bag) };
        self
    }

    /// Normalized view of the bag: `None` when absent or empty.
    pub fn bag(&self) -> Option<&PropertyBag> {
        self.properties.as_ref().filter(|bag| !bag.is_empty())
    }
}

/// Read-only snapshot of one slot, used for audit returns and seed data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotSnapshot {
    /// The slot number the record occupied.
    pub slot: SlotNumber,
    /// Catalog reference of the stored item.
    pub item: ItemId,
    /// Amount at the time of the snapshot.
    pub amount: u32,
    /// Dynamic properties at the time of the snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<PropertyBag>,
}

impl SlotSnapshot {
    pub(crate) fn of(slot: SlotNumber, record: &ItemRecord) -> Self {
        Self {
            slot,
            item: record.item.clone(),
            amount: record.amount,
            properties: record.bag().cloned(),
        }
    }
}

/// Sparse slot-number to record mapping.
///
/// Keeps slot, item, amount and properties together in one map, so the
/// parallel facts about a slot cannot drift apart. Iteration order is
/// ascending slot number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotMap {
    capacity: u32,
    records: BTreeMap<SlotNumber, ItemRecord>,
}

impl SlotMap {
    /// Create an empty map accepting slots `1..=capacity`.
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity: capacity.max(1),
            records: BTreeMap::new(),
        }
    }

    /// Create an empty map with no upper slot bound.
    ///
    /// Equipment containers bound their slots by type-slot membership
    /// rather than by a numeric range.
    pub(crate) fn unbounded() -> Self {
        Self {
            capacity: u32::MAX,
            records: BTreeMap::new(),
        }
    }

    /// The highest valid slot number.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub(crate) fn set_capacity(&mut self, capacity: u32) {
        self.capacity = capacity.max(1);
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of unoccupied slots within the capacity.
    pub fn free_slots(&self) -> u32 {
        self.capacity - self.records.len() as u32
    }

    /// Whether every slot within the capacity is occupied.
    pub fn is_full(&self) -> bool {
        self.records.len() as u32 >= self.capacity
    }

    /// Validate a slot number against the reserved value and the range.
    pub fn check_slot(&self, slot: SlotNumber) -> Result<(), ContainerError> {
        if slot == 0 || slot > self.capacity {
            return Err(ContainerError::InvalidSlot(slot));
        }
        Ok(())
    }

    /// Whether the slot is occupied.
    pub fn contains(&self, slot: SlotNumber) -> bool {
        self.records.contains_key(&slot)
    }

    /// Get the record stored at a slot.
    pub fn get(&self, slot: SlotNumber) -> Option<&ItemRecord> {
        self.records.get(&slot)
    }

    /// Get a mutable reference to the record stored at a slot.
    pub fn get_mut(&mut self, slot: SlotNumber) -> Option<&mut ItemRecord> {
        self.records.get_mut(&slot)
    }

    /// Insert a record at a slot. Fails if the slot number is invalid or
    /// already occupied.
    pub fn insert(&mut self, slot: SlotNumber, record: ItemRecord) -> Result<(), ContainerError> {
        self.check_slot(slot)?;
        if self.records.contains_key(&slot) {
            return Err(ContainerError::SlotOccupied(slot));
        }
        self.records.insert(slot, record);
        Ok(())
    }

    /// Remove and return the record at a slot, if any.
    pub fn remove(&mut self, slot: SlotNumber) -> Option<ItemRecord> {
        self.records.remove(&slot)
    }

    /// Find the lowest unoccupied slot number, skipping `excluding`.
    ///
    /// Scans `1..=capacity` ascending and returns the first number that is
    /// neither occupied nor excluded.
    pub fn lowest_free_slot(&self, excluding: &[SlotNumber]) -> Option<SlotNumber> {
        if self.is_full() {
            return None;
        }
        (1..=self.capacity).find(|n| !self.records.contains_key(n) && !excluding.contains(n))
    }

    /// Iterate over occupied slots in ascending slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotNumber, &ItemRecord)> {
        self.records.iter().map(|(slot, record)| (*slot, record))
    }

    /// Occupied slot numbers in ascending order.
    pub fn occupied_slots(&self) -> Vec<SlotNumber> {
        self.records.keys().copied().collect()
    }

    /// Snapshot every occupied slot in ascending order.
    pub fn snapshots(&self) -> Vec<SlotSnapshot> {
        self.records
            .iter()
            .map(|(slot, record)| SlotSnapshot::of(*slot, record))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(item: &str, amount: u32) -> ItemRecord {
        ItemRecord::new(ItemId::from_str(item), amount)
    }

    #[test]
    fn test_insert_and_get() {
        let mut map = SlotMap::new(5);
        map.insert(3, record("potion", 4)).unwrap();

        assert!(map.contains(3));
        assert_eq!(map.get(3).unwrap().amount, 4);
        assert_eq!(map.len(), 1);
        assert_eq!(map.free_slots(), 4);
    }

    #[test]
    fn test_slot_zero_rejected() {
        let mut map = SlotMap::new(5);
        assert_eq!(
            map.insert(0, record("potion", 1)),
            Err(ContainerError::InvalidSlot(0))
        );
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut map = SlotMap::new(5);
        assert_eq!(
            map.insert(6, record("potion", 1)),
            Err(ContainerError::InvalidSlot(6))
        );
    }

    #[test]
    fn test_double_insert_rejected() {
        let mut map = SlotMap::new(5);
        map.insert(2, record("potion", 1)).unwrap();
        assert_eq!(
            map.insert(2, record("sword", 1)),
            Err(ContainerError::SlotOccupied(2))
        );
    }

    #[test]
    fn test_lowest_free_slot() {
        let mut map = SlotMap::new(4);
        map.insert(1, record("a", 1)).unwrap();
        map.insert(3, record("b", 1)).unwrap();

        assert_eq!(map.lowest_free_slot(&[]), Some(2));
        assert_eq!(map.lowest_free_slot(&[2]), Some(4));
        assert_eq!(map.lowest_free_slot(&[2, 4]), None);
    }

    #[test]
    fn test_lowest_free_slot_full() {
        let mut map = SlotMap::new(2);
        map.insert(1, record("a", 1)).unwrap();
        map.insert(2, record("b", 1)).unwrap();
        assert!(map.is_full());
        assert_eq!(map.lowest_free_slot(&[]), None);
    }

    #[test]
    fn test_iteration_ascending() {
        let mut map = SlotMap::new(10);
        map.insert(7, record("a", 1)).unwrap();
        map.insert(2, record("b", 1)).unwrap();
        map.insert(5, record("c", 1)).unwrap();

        let order: Vec<SlotNumber> = map.iter().map(|(slot, _)| slot).collect();
        assert_eq!(order, vec![2, 5, 7]);
    }

    #[test]
    fn test_empty_bag_normalized() {
        let rec = record("potion", 1).with_properties(PropertyBag::new());
        assert!(rec.properties.is_none());
        assert!(rec.bag().is_none());
    }
}
