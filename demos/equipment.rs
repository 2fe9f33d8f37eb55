//! Equipment example: Type slots, equipping and collecting loot
//!
//! This example demonstrates:
//! - Declaring type-constrained equipment slots
//! - Equipping from inventory and unequipping back
//! - Direct loadout placement with overflow
//! - Collecting a whole host into a chest

use std::collections::BTreeSet;
use zzslot::*;

fn main() -> Result<(), ContainerError> {
    let mut catalog = MapCatalog::new();
    let sword = ItemId::from_str("sword");
    let arrow = ItemId::from_str("arrow");
    catalog.insert(
        sword.clone(),
        CatalogEntry::unique().with_type_tag(TypeTag::from_str("Sword")),
    );
    catalog.insert(
        arrow.clone(),
        CatalogEntry::stackable().with_type_tag(TypeTag::from_str("Ammo")),
    );

    // A character: 10 inventory slots, equipment stacks up to 30
    let mut character = EquipmentContainer::new(ContainerConfig::new(10, 10), 30);

    let mut weapon_types = BTreeSet::new();
    weapon_types.insert(TypeTag::from_str("Sword"));
    character.set_equipment_type(&catalog, 1, Some(weapon_types))?;

    let mut ammo_types = BTreeSet::new();
    ammo_types.insert(TypeTag::from_str("Ammo"));
    character.set_equipment_type(&catalog, 2, Some(ammo_types))?;

    // Starting loadout straight into the quiver, overflow into the bag
    println!("Granting 40 arrows to the quiver (limit 30):");
    let outcome =
        character.add_item_to_equipment_slot(&catalog, &arrow, 2, None, 40, true, true)?;
    println!(
        "  quiver x{}, inventory x{} (unplaced {})",
        character.equipped(2).map(|s| s.amount).unwrap_or(0),
        character.inventory().count_item(&arrow),
        outcome.unplaced
    );

    // Pick up a named sword and equip it
    let name = PropertyBag::single("name", "Name", "Dawnbreaker");
    character
        .inventory_mut()
        .add_item(&catalog, &sword, Some(&name), 1, false, true)?;
    println!("\nEquipping the sword...");
    let bound = character.equip_from_inventory(&catalog, 2, None, true, true)?;
    println!(
        "  bound to slot {bound}: {}",
        character
            .equipped(bound)
            .and_then(|s| s.properties)
            .and_then(|bag| bag.get("name").map(|p| p.value.clone()))
            .unwrap_or_default()
    );

    println!("\nEquipment slots:");
    for view in character.equipment_slots() {
        match view.record {
            Some(record) => println!(
                "  [{}] {:?} -> {} x{}",
                view.slot, view.accepted_types, record.item, record.amount
            ),
            None => println!("  [{}] {:?} -> empty", view.slot, view.accepted_types),
        }
    }

    // Dump everything into a chest
    let mut chest = Container::new(ContainerConfig::new(20, 50));
    println!("\nCollecting everything into the chest...");
    let outcome = collect_all_equipment(&mut character, &mut chest, true, &catalog)?;
    println!(
        "  moved_any = {}, items_left = {}",
        outcome.moved_any, outcome.items_left
    );

    println!("\nChest contents:");
    for slot in chest.slots() {
        println!("  [{}] {} x{}", slot.slot, slot.item, slot.amount);
    }

    Ok(())
}
