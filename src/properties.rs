//! Dynamic item properties module.
//!
//! A `PropertyBag` is an optional set of named attributes attached to a
//! specific item instance (durability, enchantments, owner marks), as
//! opposed to the static metadata the catalog holds for the item in
//! general. The engine does not interpret property values; it only
//! compares them.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A single dynamic property of an item instance.
///
/// Properties carry a machine `name` (unique within a bag), a
/// human-facing `display_name`, and a text `value`. The value can be a
/// simple number, a word, or a JSON string for complex payloads.
///
/// Equality compares `(name, value)` as text. Ordering comparisons are
/// defined only between two properties sharing the same name whose values
/// both parse as numbers; every other comparison is `false`.
///
/// # Examples
///
/// ```rust
/// use zzslot::ItemProperty;
///
/// let a = ItemProperty::new("damage", "Damage", "30");
/// let b = ItemProperty::new("damage", "Damage", "45");
///
/// assert!(a < b);
/// assert_ne!(a, b);
///
/// // Different names never compare, even with numeric values.
/// let c = ItemProperty::new("speed", "Speed", "45");
/// assert!(!(b < c) && !(b > c) && !(b >= c));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemProperty {
    /// Machine name of the property. Unique within a bag.
    pub name: String,
    /// Display name used for this property in UI layers.
    pub display_name: String,
    /// The value of the property, stored as text.
    pub value: String,
}

impl ItemProperty {
    /// Create a new property.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use zzslot::ItemProperty;
    ///
    /// let durability = ItemProperty::new("durability", "Durability", "80");
    /// assert_eq!(durability.value, "80");
    /// ```
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            value: value.into(),
        }
    }

    fn numeric_value(&self) -> Option<f64> {
        self.value.trim().parse::<f64>().ok()
    }
}

impl PartialEq for ItemProperty {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.value == other.value
    }
}

impl PartialOrd for ItemProperty {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.name != other.name {
            return None;
        }
        let lhs = self.numeric_value()?;
        let rhs = other.numeric_value()?;
        lhs.partial_cmp(&rhs)
    }
}

/// An ordered set of dynamic properties, unique by name.
///
/// Two bags are equal iff they contain the same `(name, value)` pairs,
/// regardless of insertion order. For all comparison purposes an empty
/// bag is equivalent to an absent one; the engine drops bags that become
/// empty instead of keeping them around.
///
/// # Examples
///
/// ```rust
/// use zzslot::PropertyBag;
///
/// let mut bag = PropertyBag::new();
/// bag.set("damage", "Damage", "30");
/// bag.set("rarity", "Rarity", "epic");
///
/// assert!(bag.contains("damage"));
/// assert_eq!(bag.get("rarity").unwrap().value, "epic");
///
/// // Setting an empty value removes the property.
/// bag.set("damage", "Damage", "");
/// assert!(!bag.contains("damage"));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyBag {
    properties: Vec<ItemProperty>,
}

impl PropertyBag {
    /// Create a new empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bag holding a single property.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use zzslot::PropertyBag;
    ///
    /// let bag = PropertyBag::single("durability", "Durability", "100");
    /// assert_eq!(bag.len(), 1);
    /// ```
    pub fn single(
        name: impl Into<String>,
        display_name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let mut bag = Self::new();
        bag.set(name, display_name, value);
        bag
    }

    /// Number of properties in the bag.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether the bag holds no properties.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Check if a property with the given name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.properties.iter().any(|p| p.name == name)
    }

    /// Get a property by name.
    pub fn get(&self, name: &str) -> Option<&ItemProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Add, edit or remove a property.
    ///
    /// An existing property with the same name is updated in place. An
    /// empty `value` removes the property instead.
    pub fn set(
        &mut self,
        name: impl Into<String>,
        display_name: impl Into<String>,
        value: impl Into<String>,
    ) {
        let name = name.into();
        let value = value.into();
        if value.is_empty() {
            self.properties.retain(|p| p.name != name);
            return;
        }

        let display_name = display_name.into();
        if let Some(existing) = self.properties.iter_mut().find(|p| p.name == name) {
            existing.display_name = display_name;
            existing.value = value;
            return;
        }

        self.properties.push(ItemProperty {
            name,
            display_name,
            value,
        });
    }

    /// Iterate over the properties in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ItemProperty> {
        self.properties.iter()
    }
}

impl PartialEq for PropertyBag {
    fn eq(&self, other: &Self) -> bool {
        if self.properties.len() != other.properties.len() {
            return false;
        }
        self.properties.iter().all(|p| {
            other
                .get(&p.name)
                .map(|o| o.value == p.value)
                .unwrap_or(false)
        })
    }
}

/// Compare two optional bags, treating an empty bag as equivalent to an
/// absent one.
pub(crate) fn bags_equal(first: Option<&PropertyBag>, second: Option<&PropertyBag>) -> bool {
    match (first, second) {
        (Some(a), Some(b)) => a == b,
        (Some(a), None) | (None, Some(a)) => a.is_empty(),
        (None, None) => true,
    }
}
