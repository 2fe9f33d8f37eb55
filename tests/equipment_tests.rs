use std::collections::BTreeSet;
use zzslot::*;

fn tag(name: &str) -> TypeTag {
    TypeTag::from_str(name)
}

fn tags(names: &[&str]) -> BTreeSet<TypeTag> {
    names.iter().map(|n| tag(n)).collect()
}

fn catalog() -> MapCatalog {
    let mut catalog = MapCatalog::new();
    catalog.insert(ItemId::from_str("potion"), CatalogEntry::stackable());
    catalog.insert(
        ItemId::from_str("sword"),
        CatalogEntry::unique().with_type_tag(tag("Sword")),
    );
    catalog.insert(
        ItemId::from_str("helmet"),
        CatalogEntry::unique().with_type_tag(tag("Helmet")),
    );
    catalog.insert(
        ItemId::from_str("arrow"),
        CatalogEntry::stackable().with_type_tag(tag("Ammo")),
    );
    catalog
}

fn sword() -> ItemId {
    ItemId::from_str("sword")
}

fn arrow() -> ItemId {
    ItemId::from_str("arrow")
}

/// Equip/unequip round trip: the sword leaves inventory slot 3 for equip
/// slot 5 and comes back to a free slot when unequipped.
#[test]
fn test_equip_unequip_round_trip_scenario() {
    let catalog = catalog();
    let mut host = EquipmentContainer::new(ContainerConfig::new(10, 10), 10);
    host.set_equipment_type(&catalog, 5, Some(tags(&["Sword"])))
        .unwrap();
    host.inventory_mut()
        .add_item_to_slot(&catalog, &sword(), 3, None, 1, false, false)
        .unwrap();

    host.equip_from_inventory(&catalog, 3, Some(5), true, true)
        .unwrap();
    assert!(host.inventory().slot(3).is_none());
    assert_eq!(host.equipped(5).unwrap().item, sword());

    let outcome = host.unequip(&catalog, 5, &[], false, None).unwrap();
    assert!(outcome.complete());
    assert!(host.equipped(5).is_none());
    assert_eq!(host.inventory().count_item(&sword()), 1);
}

/// Type mismatch rejected: a sword aimed at a helmet slot changes nothing.
#[test]
fn test_type_mismatch_scenario() {
    let catalog = catalog();
    let mut host = EquipmentContainer::new(ContainerConfig::new(10, 10), 10);
    host.set_equipment_type(&catalog, 1, Some(tags(&["Helmet"])))
        .unwrap();
    host.inventory_mut()
        .add_item(&catalog, &sword(), None, 1, false, true)
        .unwrap();

    let result = host.equip_from_inventory(&catalog, 1, Some(1), true, true);

    assert_eq!(
        result,
        Err(ContainerError::TypeMismatch {
            slot: 1,
            item: sword()
        })
    );
    assert_eq!(host.inventory().slot(1).unwrap().item, sword());
    assert!(host.equipped(1).is_none());
}

/// The equipment slot state machine: unassigned → assigned → occupied →
/// empty → unassigned, with the forced unequip on type clear.
#[test]
fn test_equipment_slot_state_machine() {
    let catalog = catalog();
    let mut host = EquipmentContainer::new(ContainerConfig::new(10, 10), 10);

    // Unassigned: equipping into the slot is invalid.
    host.inventory_mut()
        .add_item(&catalog, &sword(), None, 1, false, true)
        .unwrap();
    assert_eq!(
        host.equip_from_inventory(&catalog, 1, Some(4), true, true),
        Err(ContainerError::InvalidSlot(4))
    );

    // Assigned-empty.
    host.set_equipment_type(&catalog, 4, Some(tags(&["Sword"])))
        .unwrap();
    assert!(host.equipped(4).is_none());

    // Assigned-occupied.
    host.equip_from_inventory(&catalog, 1, Some(4), true, true)
        .unwrap();
    assert!(host.equipped(4).is_some());

    // Clearing the type forces the occupant back to inventory first.
    host.set_equipment_type(&catalog, 4, None).unwrap();
    assert!(host.accepted_types(4).is_none());
    assert!(host.equipped(4).is_none());
    assert_eq!(host.inventory().count_item(&sword()), 1);
}

/// Conservation across the equip boundary: units only ever move between
/// the inventory and the equipment slot.
#[test]
fn test_equip_conservation() {
    let catalog = catalog();
    let mut host = EquipmentContainer::new(ContainerConfig::new(10, 10), 15);
    host.set_equipment_type(&catalog, 1, Some(tags(&["Ammo"])))
        .unwrap();

    host.inventory_mut()
        .add_item(&catalog, &arrow(), None, 24, true, true)
        .unwrap();

    let total = |host: &EquipmentContainer| {
        host.inventory().count_item(&arrow())
            + host.equipped(1).map(|s| s.amount).unwrap_or(0)
    };
    assert_eq!(total(&host), 24);

    host.equip_from_inventory(&catalog, 1, Some(1), true, true)
        .unwrap();
    assert_eq!(total(&host), 24);

    host.unequip(&catalog, 1, &[], true, None).unwrap();
    assert_eq!(total(&host), 24);
}

/// Direct equipment adds clamp to the equipment limit and spill the rest
/// into the inventory.
#[test]
fn test_starting_loadout_overflow() {
    let catalog = catalog();
    let mut host = EquipmentContainer::new(ContainerConfig::new(10, 10), 15);
    host.set_equipment_type(&catalog, 2, Some(tags(&["Ammo"])))
        .unwrap();

    let outcome = host
        .add_item_to_equipment_slot(&catalog, &arrow(), 2, None, 40, true, true)
        .unwrap();

    assert!(outcome.fully_placed());
    assert_eq!(host.equipped(2).unwrap().amount, 15);
    assert_eq!(host.inventory().count_item(&arrow()), 25);
}

/// Collect-all drains equipment slots before inventory and reports
/// partial outcomes.
#[test]
fn test_collect_all_including_equipment() {
    let catalog = catalog();
    let mut host = EquipmentContainer::new(ContainerConfig::new(10, 10), 10);
    host.set_equipment_type(&catalog, 1, Some(tags(&["Sword"])))
        .unwrap();
    host.add_item_to_equipment_slot(&catalog, &sword(), 1, None, 1, true, false)
        .unwrap();
    host.inventory_mut()
        .add_item(&catalog, &arrow(), None, 6, true, true)
        .unwrap();

    let mut chest = Container::new(ContainerConfig::new(5, 10));
    let outcome = collect_all_equipment(&mut host, &mut chest, true, &catalog).unwrap();

    assert!(outcome.moved_any);
    assert!(!outcome.items_left);
    assert!(host.equipped(1).is_none());
    assert!(host.inventory().is_empty());
    assert_eq!(chest.count_item(&sword()), 1);
    assert_eq!(chest.count_item(&arrow()), 6);
}

/// A cramped destination leaves part of the loadout behind.
#[test]
fn test_collect_all_equipment_partial() {
    let catalog = catalog();
    let mut host = EquipmentContainer::new(ContainerConfig::new(10, 10), 10);
    host.set_equipment_type(&catalog, 1, Some(tags(&["Sword"])))
        .unwrap();
    host.add_item_to_equipment_slot(&catalog, &sword(), 1, None, 1, true, false)
        .unwrap();
    host.inventory_mut()
        .add_item(&catalog, &ItemId::from_str("helmet"), None, 1, false, true)
        .unwrap();

    let mut chest = Container::new(ContainerConfig::new(1, 10));
    let outcome = collect_all_equipment(&mut host, &mut chest, false, &catalog).unwrap();

    assert!(outcome.moved_any);
    assert!(outcome.items_left);
    // Equipment drained first, inventory had to stay.
    assert!(host.equipped(1).is_none());
    assert_eq!(host.inventory().slots().len(), 1);
    assert_eq!(chest.count_item(&sword()), 1);
}

/// Moving part of an equipped stack into a chest.
#[test]
fn test_transfer_from_equipment_slot() {
    let catalog = catalog();
    let mut host = EquipmentContainer::new(ContainerConfig::new(10, 10), 20);
    host.set_equipment_type(&catalog, 1, Some(tags(&["Ammo"])))
        .unwrap();
    host.add_item_to_equipment_slot(&catalog, &arrow(), 1, None, 18, true, true)
        .unwrap();

    let mut chest = Container::new(ContainerConfig::new(5, 10));
    let outcome =
        transfer_equipment_slot(&mut host, 1, &mut chest, 12, true, false, &catalog).unwrap();

    assert_eq!(outcome.moved, 12);
    assert_eq!(host.equipped(1).unwrap().amount, 6);
    assert_eq!(chest.count_item(&arrow()), 12);
}

/// Loading a full host from persisted seed data.
#[test]
fn test_equipment_from_seed() {
    let catalog = catalog();
    let inventory_seed = vec![SlotSnapshot {
        slot: 1,
        item: arrow(),
        amount: 5,
        properties: None,
    }];
    let equipment_seed = vec![EquipmentSeedEntry {
        slot: 1,
        accepted_types: tags(&["Sword"]),
        item: Some(sword()),
        amount: 1,
        properties: Some(PropertyBag::single("durability", "Durability", "77")),
    }];

    let (host, report) = EquipmentContainer::from_seed(
        ContainerConfig::new(10, 10),
        10,
        &inventory_seed,
        &equipment_seed,
        &catalog,
    );

    assert!(report.is_clean());
    assert_eq!(host.inventory().slot(1).unwrap().amount, 5);
    let equipped = host.equipped(1).unwrap();
    assert_eq!(equipped.item, sword());
    assert_eq!(
        equipped.properties.unwrap().get("durability").unwrap().value,
        "77"
    );
}

/// Unequip with an ignore list routes around protected slots.
#[test]
fn test_unequip_respects_ignored_slots() {
    let catalog = catalog();
    let mut host = EquipmentContainer::new(ContainerConfig::new(3, 10), 10);
    host.set_equipment_type(&catalog, 1, Some(tags(&["Sword"])))
        .unwrap();
    host.add_item_to_equipment_slot(&catalog, &sword(), 1, None, 1, true, false)
        .unwrap();

    let outcome = host.unequip(&catalog, 1, &[1, 2], false, None).unwrap();
    assert_eq!(outcome.inventory_slots, vec![3]);
    assert_eq!(host.inventory().slot(3).unwrap().item, sword());
}

/// Equipment swap honors both slots' accepted types, symmetric with the
/// inventory swap.
#[test]
fn test_equipment_swap_symmetry() {
    let catalog = catalog();
    let mut host = EquipmentContainer::new(ContainerConfig::new(10, 10), 10);
    host.set_equipment_type(&catalog, 1, Some(tags(&["Sword", "Helmet"])))
        .unwrap();
    host.set_equipment_type(&catalog, 2, Some(tags(&["Sword", "Helmet"])))
        .unwrap();
    host.add_item_to_equipment_slot(&catalog, &sword(), 1, None, 1, true, false)
        .unwrap();
    host.add_item_to_equipment_slot(
        &catalog,
        &ItemId::from_str("helmet"),
        2,
        None,
        1,
        true,
        false,
    )
    .unwrap();

    host.swap_equipped(&catalog, 1, 2, false).unwrap();
    assert_eq!(host.equipped(1).unwrap().item, ItemId::from_str("helmet"));
    assert_eq!(host.equipped(2).unwrap().item, sword());
}
