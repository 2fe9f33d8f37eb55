//! Basic example: Adding, stacking, splitting and removing items
//!
//! This example demonstrates:
//! - Setting up a catalog and a container
//! - Stacking adds with overflow into new slots
//! - Splitting a stack and merging it back
//! - Draining change notifications

use zzslot::*;

fn main() -> Result<(), ContainerError> {
    // Build a catalog the engine can consult
    let mut catalog = MapCatalog::new();
    let potion = ItemId::from_str("potion");
    let sword = ItemId::from_str("sword");
    catalog.insert(potion.clone(), CatalogEntry::stackable());
    catalog.insert(sword.clone(), CatalogEntry::unique());

    // A 10-slot container with stacks of up to 10
    let mut container = Container::new(ContainerConfig::new(10, 10));

    println!("Adding items:");
    let outcome = container.add_item(&catalog, &potion, None, 7, true, true)?;
    println!("  - 7 potions -> slots {:?}", outcome.changed_slots);

    let outcome = container.add_item(&catalog, &potion, None, 5, true, true)?;
    println!(
        "  - 5 potions -> slots {:?} (stack filled, rest spilled over)",
        outcome.changed_slots
    );

    let outcome = container.add_item(&catalog, &sword, None, 1, false, true)?;
    println!("  - 1 sword  -> slots {:?}", outcome.changed_slots);

    println!("\nContainer contents:");
    for slot in container.slots() {
        println!("  [{}] {} x{}", slot.slot, slot.item, slot.amount);
    }

    // Split the full potion stack
    println!("\nSplitting slot 1 by 4...");
    let dest = container.split_stack(1, 4)?;
    println!("  new stack on slot {dest}");

    // And merge it back via a stacking swap
    println!("Merging slot {dest} back onto slot 1...");
    container.swap_items(&catalog, dest, 1, true)?;

    // Remove a few potions, keeping the audit snapshot
    let snapshot = container.remove_amount(1, 3)?;
    println!(
        "\nRemoved 3 from slot 1 (held {} before)",
        snapshot.amount
    );

    println!("\nTotal potions: {}", container.count_item(&potion));

    println!("\nChange notifications this session:");
    for event in container.drain_events() {
        println!("  {:?} slots {:?}", event.scope, event.slots);
    }

    Ok(())
}
