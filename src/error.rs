//! Error types for container operations.
//!
//! All errors that can occur during a container operation are represented
//! by the `ContainerError` enum. Operations never panic across the public
//! boundary; they report exactly one outcome to their caller.

use crate::container::ContainerId;
use crate::item_id::ItemId;
use crate::slots::SlotNumber;
use thiserror::Error;

/// Errors that can occur during container operations.
///
/// None of these is fatal to the host process. A failed call leaves the
/// container in its pre-call state, except for the explicitly-partial
/// batch operations whose outcomes report what was and was not moved.
///
/// # Examples
///
/// ```rust
/// use zzslot::{ContainerError, ItemId};
///
/// let err = ContainerError::UnknownItem(ItemId::from_str("missing"));
/// println!("{}", err); // "unknown catalog item: missing"
/// ```
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ContainerError {
    /// The container's processing flag is already held.
    ///
    /// A call arriving while another operation is in flight fails fast
    /// rather than queue or block. Carries the id of the busy container so
    /// cross-container callers can tell which side was held.
    #[error("container {0} is busy processing another request")]
    Busy(ContainerId),

    /// A slot number is zero or outside the container's range.
    #[error("invalid slot number: {0}")]
    InvalidSlot(SlotNumber),

    /// An amount is zero, exceeds the stored amount, or is otherwise out
    /// of range for the requested operation.
    #[error("invalid amount: {0}")]
    InvalidAmount(u32),

    /// A record already occupies the targeted slot.
    #[error("slot {0} is already occupied")]
    SlotOccupied(SlotNumber),

    /// The catalog has no entry for the referenced item.
    #[error("unknown catalog item: {0}")]
    UnknownItem(ItemId),

    /// The item's type tags do not intersect the equipment slot's
    /// accepted types.
    #[error("item {item} does not match the accepted types of equipment slot {slot}")]
    TypeMismatch { slot: SlotNumber, item: ItemId },

    /// No free slot is available and the caller disallowed partial
    /// placement.
    #[error("container {0} has no room for the requested placement")]
    CapacityExceeded(ContainerId),

    /// An internal invariant was found broken mid-operation.
    ///
    /// This indicates a defect, not user error. The single call is
    /// aborted and the consistency validator is the recovery mechanism.
    #[error("structural inconsistency: {0}")]
    StructuralInconsistency(String),
}
