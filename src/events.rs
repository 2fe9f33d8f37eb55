//! Change notification module.
//!
//! Every successful mutating call produces one `SlotsChanged` event
//! listing the slots whose stored contents actually differ afterwards.
//! Batch operations coalesce into one event per affected container. The
//! host (UI, replication layer) drains the queue; direct callers get
//! their answers from return values instead.

use crate::container::ContainerId;
use crate::slots::SlotNumber;
use serde::{Deserialize, Serialize};

/// Which slot family of a container changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotScope {
    /// Regular inventory slots.
    Inventory,
    /// Equipment type slots.
    Equipment,
}

/// Notification that a container's slots changed.
///
/// Fired only on success. `slots` is sorted, deduplicated, and lists
/// every slot that was added, removed, or had its amount or properties
/// changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotsChanged {
    /// The container whose contents changed.
    pub container: ContainerId,
    /// Whether inventory or equipment slots changed.
    pub scope: SlotScope,
    /// The affected slot numbers, ascending and unique.
    pub slots: Vec<SlotNumber>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct EventQueue {
    events: Vec<SlotsChanged>,
}

impl EventQueue {
    pub(crate) fn push(&mut self, container: ContainerId, scope: SlotScope, slots: &[SlotNumber]) {
        let mut slots: Vec<SlotNumber> = slots.to_vec();
        slots.sort_unstable();
        slots.dedup();
        if slots.is_empty() {
            return;
        }
        self.events.push(SlotsChanged {
            container,
            scope,
            slots,
        });
    }

    pub(crate) fn drain(&mut self) -> Vec<SlotsChanged> {
        std::mem::take(&mut self.events)
    }
}
