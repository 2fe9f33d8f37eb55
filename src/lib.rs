//! # zzslot - Deterministic, Slot-Indexed MMORPG Container Engine
//!
//! An authoritative item-container engine designed for game servers that
//! provides:
//! - **Deterministic** bookkeeping (same operations → same state)
//! - **Sparse, stable slot numbers** (a slot is an identity, not a
//!   storage position)
//! - **Conservation-safe** stacking, splitting and transfers (items are
//!   never lost or duplicated)
//! - **Rollback-on-failure** semantics for the operations that request
//!   them
//!
//! ## Core Concepts
//!
//! ### Container Pipeline
//!
//! Operations flow through a simple pipeline:
//!
//! ```text
//! [Container op] → [SlotMap] → [stacking arithmetic] → [SlotsChanged]
//! ```
//!
//! 1. **Operations** validate inputs and consult the injected catalog
//! 2. **The slot registry** locates or allocates slot records
//! 3. **The stacking engine** computes merged amounts and overflow
//! 4. **Change events** tell the host which slots actually differ
//!
//! ### Key Features
//!
//! - **Processing flag**: a non-reentrant advisory lock per container;
//!   concurrent calls fail fast with `Busy`
//! - **Equipment slots**: type-tag constrained slots layered over a
//!   regular container by composition
//! - **Cross-container transfers**: both flags acquired in deterministic
//!   order, partial batches reported honestly
//! - **Consistency validator**: explicit repair pass for seed data and
//!   forced configuration changes
//!
//! ## Example
//!
//! ```rust
//! use zzslot::*;
//!
//! let mut catalog = MapCatalog::new();
//! let potion = ItemId::from_str("potion");
//! catalog.insert(potion.clone(), CatalogEntry::stackable());
//!
//! let mut container = Container::new(ContainerConfig::new(10, 10));
//!
//! // 7 then 5 with stacking: one full stack of 10, a new stack of 2.
//! container.add_item(&catalog, &potion, None, 7, true, true).unwrap();
//! let outcome = container.add_item(&catalog, &potion, None, 5, true, true).unwrap();
//!
//! assert_eq!(outcome.unplaced, 0);
//! assert_eq!(container.count_item(&potion), 12);
//! ```
//!
//! ## Modules
//!
//! - [`item_id`] - Item and type-tag identifier types
//! - [`properties`] - Dynamic per-instance property bags
//! - [`catalog`] - Read-only item metadata lookup
//! - [`slots`] - Sparse slot registry
//! - [`stacking`] - Merge/split/overflow arithmetic
//! - [`container`] - The generic container
//! - [`equipment`] - The equipment container specialization
//! - [`transfer`] - Cross-container moves
//! - [`repair`] - Consistency validator
//! - [`events`] - Change notifications
//! - [`error`] - Error types

pub mod catalog;
pub mod container;
pub mod equipment;
pub mod error;
pub mod events;
pub mod item_id;
pub mod properties;
pub mod repair;
pub mod slots;
pub mod stacking;
pub mod transfer;

// Re-export main types for convenience
pub use catalog::{CatalogEntry, ItemCatalog, MapCatalog};
pub use container::{AddOutcome, Container, ContainerConfig, ContainerId};
pub use equipment::{EquipmentContainer, EquipmentSeedEntry, EquipmentSlotView, UnequipOutcome};
pub use error::ContainerError;
pub use events::{SlotScope, SlotsChanged};
pub use item_id::{ItemId, TypeTag};
pub use properties::{ItemProperty, PropertyBag};
pub use repair::{RepairAction, RepairReport};
pub use slots::{ItemRecord, SlotMap, SlotNumber, SlotSnapshot};
pub use transfer::{
    collect_all, collect_all_equipment, swap_with_container, transfer_equipment_slot,
    transfer_slot, CollectOutcome, TransferOutcome,
};
