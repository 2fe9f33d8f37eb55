//! Item and type-tag identifier module.
//!
//! Provides the `ItemId` and `TypeTag` types, interned string identifiers
//! for catalog items and equipment type tags. Both use `Arc<str>` for
//! memory efficiency and fast comparison.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

/// Interned string identifier for catalog items.
///
/// Uses `Arc<str>` for memory efficiency and fast comparison.
/// Multiple `ItemId` instances with the same string content share the same
/// underlying allocation.
///
/// # Examples
///
/// ```rust
/// use zzslot::ItemId;
///
/// let potion = ItemId::from_str("potion");
/// let sword = ItemId::from_str("sword");
///
/// // Can be created from string slices or owned strings
/// let potion2: ItemId = "potion".into();
/// let potion3: ItemId = String::from("potion").into();
///
/// assert_eq!(potion, potion2);
/// assert_eq!(potion, potion3);
/// assert_ne!(potion, sword);
/// ```
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ItemId(Arc<str>);

impl Serialize for ItemId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.as_ref().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(ItemId::from(s))
    }
}

impl ItemId {
    /// Create a new `ItemId` from a string slice.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use zzslot::ItemId;
    ///
    /// let item = ItemId::from_str("potion");
    /// assert_eq!(item.as_str(), "potion");
    /// ```
    pub fn from_str(s: &str) -> Self {
        Self(Arc::from(s))
    }

    /// Get the string representation of this `ItemId`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self::from_str(s)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Interned string identifier for equipment type tags.
///
/// A type tag names a category of equipment-capable items ("Helmet",
/// "Sword", ...). Equipment slots accept a set of tags; an item may occupy
/// a slot only if its catalog tag set intersects the slot's accepted set.
///
/// # Examples
///
/// ```rust
/// use zzslot::TypeTag;
///
/// let helmet = TypeTag::from_str("Helmet");
/// let helmet2: TypeTag = "Helmet".into();
///
/// assert_eq!(helmet, helmet2);
/// ```
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct TypeTag(Arc<str>);

impl Serialize for TypeTag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.as_ref().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TypeTag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(TypeTag::from(s))
    }
}

impl TypeTag {
    /// Create a new `TypeTag` from a string slice.
    pub fn from_str(s: &str) -> Self {
        Self(Arc::from(s))
    }

    /// Get the string representation of this `TypeTag`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TypeTag {
    fn from(s: &str) -> Self {
        Self::from_str(s)
    }
}

impl From<String> for TypeTag {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
