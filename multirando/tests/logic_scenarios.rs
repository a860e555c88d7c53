use anyhow::Result;
use multirando::completion::{can_beat_game, get_all_state, unlocks_new_location};
use multirando_game::{
    DifficultyRequirements, Item, ItemRule, Requirement, RegionType, Spot, World, WorldSettings,
};
use multirando_logic::CollectionState;
use rand::{rngs::StdRng, Rng, SeedableRng};

fn all_spots(world: &World) -> Vec<Spot> {
    let mut spots: Vec<Spot> = vec![];
    spots.extend((0..world.regions.len()).map(Spot::Region));
    spots.extend((0..world.entrances.len()).map(Spot::Entrance));
    spots.extend((0..world.locations.len()).map(Spot::Location));
    spots
}

// Menu -> Light World -> (Hammer) Dark World -> (Lamp) Cave, with one
// chest per region past the start.
fn chain_world() -> World {
    let mut world = World::new(1, WorldSettings::default());
    let menu = world.add_region("Menu", 1, RegionType::LightWorld);
    world.set_start_region(menu);
    let light = world.add_region("Light World", 1, RegionType::LightWorld);
    let dark = world.add_region("Dark World", 1, RegionType::DarkWorld);
    let cave = world.add_region("Cave", 1, RegionType::Cave);
    world.connect_regions(menu, light, "Links House Exit", Requirement::Free);
    world.connect_regions(light, dark, "Broken Bridge", Requirement::item("Hammer"));
    world.connect_regions(dark, cave, "Dark Cave Mouth", Requirement::item("Lamp"));
    world.add_location(light, "Light Chest", Requirement::Free);
    world.add_location(dark, "Dark Chest", Requirement::Free);
    world.add_location(cave, "Cave Chest", Requirement::Free);
    world
}

#[test]
fn test_monotonicity() -> Result<()> {
    let world = chain_world();
    let mut state = CollectionState::new();
    let items = [
        Item::progression("Hammer", 1),
        Item::progression("Lamp", 1),
        Item::progression("Bow", 1),
    ];
    let mut reachable_before: Vec<Spot> = vec![];
    for item in &items {
        let reachable_now: Vec<Spot> = all_spots(&world)
            .into_iter()
            .filter(|&spot| state.can_reach(&world, spot))
            .collect();
        for spot in &reachable_before {
            assert!(
                reachable_now.contains(spot),
                "collecting made {spot:?} unreachable"
            );
        }
        reachable_before = reachable_now;
        state.collect(&world, item, false, None);
    }
    Ok(())
}

// Fixed-point reachability computed with no cache at all, used as the
// oracle for the cache soundness test. Only handles item-testing rules.
fn oracle_can_reach(world: &World, collected: &[(String, usize)], spot: Spot) -> bool {
    fn eval(req: &Requirement, player: usize, collected: &[(String, usize)]) -> bool {
        let count = |name: &str| {
            collected
                .iter()
                .filter(|(n, p)| n == name && *p == player)
                .count()
        };
        match req {
            Requirement::Free => true,
            Requirement::Never => false,
            Requirement::Item(name) => count(name) >= 1,
            Requirement::ItemCount { name, count: c } => count(name) >= *c,
            Requirement::And(reqs) => reqs.iter().all(|r| eval(r, player, collected)),
            Requirement::Or(reqs) => reqs.iter().any(|r| eval(r, player, collected)),
            other => panic!("rule {other:?} not supported by the oracle"),
        }
    }

    let mut region_ok = vec![false; world.regions.len()];
    let mut entrance_ok = vec![false; world.entrances.len()];
    loop {
        let mut changed = false;
        for (id, entrance) in world.entrances.iter().enumerate() {
            let ok = region_ok[entrance.parent_region]
                && eval(&entrance.access_rule, entrance.player, collected);
            if ok && !entrance_ok[id] {
                entrance_ok[id] = true;
                changed = true;
            }
        }
        for (id, region) in world.regions.iter().enumerate() {
            let ok = region.start || region.entrances.iter().any(|&e| entrance_ok[e]);
            if ok && !region_ok[id] {
                region_ok[id] = true;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    match spot {
        Spot::Region(id) => region_ok[id],
        Spot::Entrance(id) => entrance_ok[id],
        Spot::Location(id) => {
            let loc = &world.locations[id];
            region_ok[loc.parent_region] && eval(&loc.access_rule, loc.player, collected)
        }
    }
}

// The cache must never be observable: interleave random collects with
// random queries and compare every answer against the uncached oracle.
// The world contains a cycle so the provisional-false path gets exercised.
#[test]
fn test_cache_soundness_randomized() -> Result<()> {
    let mut world = World::new(1, WorldSettings::default());
    let menu = world.add_region("Menu", 1, RegionType::LightWorld);
    world.set_start_region(menu);
    let a = world.add_region("A", 1, RegionType::LightWorld);
    let b = world.add_region("B", 1, RegionType::DarkWorld);
    let c = world.add_region("C", 1, RegionType::Cave);
    let d = world.add_region("D", 1, RegionType::Dungeon);
    world.connect_regions(menu, a, "Menu to A", Requirement::Free);
    world.connect_regions(a, b, "A to B", Requirement::item("Hammer"));
    // B and C reach each other; the only way in is through B.
    world.connect_regions(b, c, "B to C", Requirement::Free);
    world.connect_regions(c, b, "C to B", Requirement::Free);
    world.connect_regions(
        c,
        d,
        "C to D",
        Requirement::make_and(vec![
            Requirement::item("Lamp"),
            Requirement::item_count("Bomb", 2),
        ]),
    );
    world.add_location(a, "A Chest", Requirement::item("Boots"));
    world.add_location(b, "B Chest", Requirement::Free);
    world.add_location(d, "D Chest", Requirement::item("Flute"));

    let pool = ["Hammer", "Lamp", "Bomb", "Boots", "Flute", "Bow"];
    let spots = all_spots(&world);

    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut state = CollectionState::new();
    let mut collected: Vec<(String, usize)> = vec![];
    for _ in 0..400 {
        if rng.gen_range(0..4) == 0 {
            let name = pool[rng.gen_range(0..pool.len())];
            state.collect(&world, &Item::progression(name, 1), false, None);
            collected.push((name.to_string(), 1));
        } else {
            let spot = spots[rng.gen_range(0..spots.len())];
            assert_eq!(
                state.can_reach(&world, spot),
                oracle_can_reach(&world, &collected, spot),
                "cached answer diverged for {spot:?} with {collected:?}"
            );
        }
    }
    Ok(())
}

#[test]
fn test_cycle_safety() -> Result<()> {
    let mut world = World::new(1, WorldSettings::default());
    let menu = world.add_region("Menu", 1, RegionType::LightWorld);
    world.set_start_region(menu);
    let a = world.add_region("A", 1, RegionType::Cave);
    let b = world.add_region("B", 1, RegionType::Cave);
    world.connect_regions(a, b, "A to B", Requirement::Free);
    world.connect_regions(b, a, "B to A", Requirement::Free);
    world.connect_regions(menu, a, "Locked Door", Requirement::item("Key"));

    // No entry point is open yet: the A/B cycle must resolve to false
    // without recursing forever.
    let mut state = CollectionState::new();
    assert!(!state.can_reach(&world, Spot::Region(a)));
    assert!(!state.can_reach(&world, Spot::Region(b)));

    // The provisional false answers from breaking the cycle must not have
    // stuck: opening the door makes both ends reachable.
    state.collect(&world, &Item::progression("Key", 1), false, None);
    assert!(state.can_reach(&world, Spot::Region(a)));
    assert!(state.can_reach(&world, Spot::Region(b)));
    Ok(())
}

#[test]
fn test_sweep_idempotence_and_cascade() -> Result<()> {
    let mut world = World::new(1, WorldSettings::default());
    let menu = world.add_region("Menu", 1, RegionType::LightWorld);
    world.set_start_region(menu);
    let sanctuary = world.add_region("Sanctuary", 1, RegionType::LightWorld);
    world.connect_regions(menu, sanctuary, "Sanctuary Door", Requirement::Free);
    // Firing the first event is what makes the second one reachable.
    let rescue = world.add_event_location(
        sanctuary,
        "Zelda",
        Requirement::Free,
        Item::event("Zelda Rescued", 1),
    );
    let telepathy = world.add_event_location(
        sanctuary,
        "Sanctuary Telepathy",
        Requirement::item("Zelda Rescued"),
        Item::event("Sanctuary Prayer", 1),
    );

    let mut state = CollectionState::new();
    state.sweep_for_events(&world, false, None);
    assert!(state.events.contains(&rescue));
    assert!(state.events.contains(&telepathy), "sweep did not cascade");
    assert!(state.has("Sanctuary Prayer", 1, 1));

    let events_after_first = state.events.clone();
    let collected_after_first = state.collected.clone();
    state.sweep_for_events(&world, false, None);
    assert_eq!(state.events, events_after_first);
    assert_eq!(state.collected, collected_after_first);
    Ok(())
}

#[test]
fn test_progressive_capping() -> Result<()> {
    let settings = WorldSettings {
        difficulty: DifficultyRequirements {
            progressive_sword_limit: 2,
            ..DifficultyRequirements::default()
        },
        ..WorldSettings::default()
    };
    let world = World::new(1, settings);
    let mut state = CollectionState::new();
    let sword = Item::progression("Progressive Sword", 1);
    for _ in 0..4 {
        state.collect(&world, &sword, false, None);
    }
    assert!(state.has("Fighter Sword", 1, 1));
    assert!(state.has("Master Sword", 1, 1));
    assert!(!state.has("Tempered Sword", 1, 1));
    assert!(!state.has("Golden Sword", 1, 1));
    assert!(state.has_sword(1));
    assert!(state.has_beam_sword(1));
    assert_eq!(state.collected.len(), 2);

    let glove = Item::progression("Progressive Glove", 1);
    for _ in 0..3 {
        state.collect(&world, &glove, false, None);
    }
    assert!(state.can_lift_heavy_rocks(1));
    assert_eq!(state.collected.len(), 4);
    Ok(())
}

#[test]
fn test_bottle_cap() -> Result<()> {
    let world = World::new(1, WorldSettings::default());
    let mut state = CollectionState::new();
    for _ in 0..6 {
        state.collect(&world, &Item::progression("Bottle (Red Potion)", 1), false, None);
    }
    assert_eq!(
        state.bottle_count(1),
        world.settings.difficulty.progressive_bottle_limit
    );
    assert!(state.has_bottle(1));
    Ok(())
}

#[test]
fn test_filler_items_not_collected() -> Result<()> {
    let world = World::new(1, WorldSettings::default());
    let mut state = CollectionState::new();
    state.collect(&world, &Item::filler("Rupees (300)", 1), false, None);
    assert!(state.collected.is_empty());
    // Events land even when the item is not flagged as advancement.
    state.collect(&world, &Item::filler("Rupees (300)", 1), true, None);
    assert_eq!(state.collected.len(), 1);
    Ok(())
}

#[test]
fn test_remove_progressive_walks_down() -> Result<()> {
    let mut world = World::new(1, WorldSettings::default());
    let menu = world.add_region("Menu", 1, RegionType::LightWorld);
    world.set_start_region(menu);
    let arena = world.add_region("Arena", 1, RegionType::Cave);
    world.connect_regions(menu, arena, "Arena Door", Requirement::HasBeamSword);

    let mut state = CollectionState::new();
    let sword = Item::progression("Progressive Sword", 1);
    state.collect(&world, &sword, false, None);
    state.collect(&world, &sword, false, None);
    assert!(state.can_reach(&world, Spot::Region(arena)));

    // Removing the family drops the best tier held, and the full cache
    // flush makes the door close again.
    state.remove(&sword);
    assert!(state.has("Fighter Sword", 1, 1));
    assert!(!state.has("Master Sword", 1, 1));
    assert!(!state.can_reach(&world, Spot::Region(arena)));

    state.remove(&sword);
    assert!(!state.has_sword(1));
    Ok(())
}

fn key_gate_world(place_key: bool) -> World {
    let mut world = World::new(1, WorldSettings::default());
    let start = world.add_region("Start", 1, RegionType::LightWorld);
    world.set_start_region(start);
    let end = world.add_region("End", 1, RegionType::LightWorld);
    world.connect_regions(start, end, "Gate", Requirement::item("Key"));
    let pedestal = world.add_location(start, "Pedestal", Requirement::Free);
    let chest = world.add_location(end, "End Chest", Requirement::Free);
    world
        .push_item(chest, Item::progression("Triforce", 1))
        .unwrap();
    if place_key {
        world
            .push_item(pedestal, Item::progression("Key", 1))
            .unwrap();
    }
    world
}

#[test]
fn test_completability_key_gate() -> Result<()> {
    // Key not placed anywhere: the Triforce can never be gathered.
    let world = key_gate_world(false);
    assert!(!can_beat_game(&world, None));

    // A state that already holds the key can finish.
    let mut state = CollectionState::new();
    state.collect(&world, &Item::progression("Key", 1), false, None);
    assert!(can_beat_game(&world, Some(&state)));

    // Key placed reachably: beatable from scratch.
    let world = key_gate_world(true);
    assert!(can_beat_game(&world, None));
    Ok(())
}

#[test]
fn test_get_all_state() -> Result<()> {
    let mut world = key_gate_world(false);
    // The key sits in the pool, not on a location.
    world.add_item(Item::progression("Key", 1));
    let mut all_state = get_all_state(&world, false, None);
    let end = world.get_region("End", 1)?;
    assert!(all_state.can_reach(&world, Spot::Region(end)));
    assert!(all_state.has("Key", 1, 1));
    Ok(())
}

#[test]
fn test_get_all_state_keys() -> Result<()> {
    let mut world = World::new(1, WorldSettings::default());
    let menu = world.add_region("Menu", 1, RegionType::LightWorld);
    world.set_start_region(menu);
    let palace = world.add_region("Palace", 1, RegionType::Dungeon);
    world.connect_regions(
        menu,
        palace,
        "Palace Door",
        Requirement::item_count("Small Key (Palace)", 1),
    );
    world.add_dungeon(
        "Palace",
        1,
        vec![palace],
        None,
        vec![Item::small_key("Small Key (Palace)", 1)],
        vec![],
    );

    let mut without_keys = get_all_state(&world, false, None);
    assert!(!without_keys.can_reach(&world, Spot::Region(palace)));

    let mut with_keys = get_all_state(&world, true, None);
    assert!(with_keys.can_reach(&world, Spot::Region(palace)));
    Ok(())
}

#[test]
fn test_unlocks_new_location() -> Result<()> {
    let mut world = World::new(1, WorldSettings::default());
    let start = world.add_region("Start", 1, RegionType::LightWorld);
    world.set_start_region(start);
    let end = world.add_region("End", 1, RegionType::LightWorld);
    world.connect_regions(start, end, "Gate", Requirement::item("Key"));
    world.add_location(end, "End Chest", Requirement::Free);

    let mut state = CollectionState::new();
    assert!(unlocks_new_location(
        &world,
        &mut state,
        &Item::progression("Key", 1)
    ));
    assert!(!unlocks_new_location(
        &world,
        &mut state,
        &Item::progression("Bow", 1)
    ));

    // Once the key is actually held, collecting another changes nothing.
    state.collect(&world, &Item::progression("Key", 1), false, None);
    assert!(!unlocks_new_location(
        &world,
        &mut state,
        &Item::progression("Key", 1)
    ));
    Ok(())
}

#[test]
fn test_placeable_locations_respect_fill_rules() -> Result<()> {
    let mut world = World::new(1, WorldSettings::default());
    let menu = world.add_region("Menu", 1, RegionType::LightWorld);
    world.set_start_region(menu);
    let palace = world.add_region("Palace", 1, RegionType::Dungeon);
    world.connect_regions(menu, palace, "Palace Door", Requirement::Free);
    let outside = world.add_location(menu, "Outside Chest", Requirement::Free);
    let inside = world.add_location(palace, "Inside Chest", Requirement::Free);
    let key = Item::small_key("Small Key (Palace)", 1);
    world.add_dungeon("Palace", 1, vec![palace], None, vec![key.clone()], vec![]);

    // Both chests are reachable, but the key may only land in its own
    // dungeon.
    let mut state = CollectionState::new();
    assert!(!state.can_fill(&world, outside, &key, true));
    assert_eq!(
        state.placeable_locations(&world, Some(1), &key),
        vec![inside]
    );

    // An unrestricted item can land in either.
    let hammer = Item::progression("Hammer", 1);
    assert_eq!(
        state.placeable_locations(&world, Some(1), &hammer),
        vec![outside, inside]
    );
    Ok(())
}

#[test]
fn test_can_fill_access_and_always_allow() -> Result<()> {
    let mut world = World::new(1, WorldSettings::default());
    let menu = world.add_region("Menu", 1, RegionType::LightWorld);
    world.set_start_region(menu);
    let vault = world.add_region("Vault", 1, RegionType::Cave);
    world.connect_regions(menu, vault, "Vault Door", Requirement::item("Key"));
    let chest = world.add_location(vault, "Vault Chest", Requirement::Free);

    // Rules pass either way; only check_access sees that the chest is
    // still behind the locked door.
    let mut state = CollectionState::new();
    let hammer = Item::progression("Hammer", 1);
    assert!(state.can_fill(&world, chest, &hammer, false));
    assert!(!state.can_fill(&world, chest, &hammer, true));
    state.collect(&world, &Item::progression("Key", 1), false, None);
    assert!(state.can_fill(&world, chest, &hammer, true));

    // always_allow bypasses both the item rule and the access check.
    let sealed = world.add_location(menu, "Sealed Chest", Requirement::Never);
    world.locations[sealed].item_rule = ItemRule::NotNamed("Moon Pearl".to_string());
    let pearl = Item::progression("Moon Pearl", 1);
    let mut state = CollectionState::new();
    assert!(!state.can_fill(&world, sealed, &pearl, false));
    world.locations[sealed].always_allow = ItemRule::Named("Moon Pearl".to_string());
    assert!(state.can_fill(&world, sealed, &pearl, true));
    Ok(())
}

#[test]
fn test_push_item_then_collect_placed() -> Result<()> {
    let mut world = World::new(1, WorldSettings::default());
    let start = world.add_region("Start", 1, RegionType::LightWorld);
    world.set_start_region(start);
    let end = world.add_region("End", 1, RegionType::LightWorld);
    world.connect_regions(start, end, "Gate", Requirement::item("Lamp"));
    let chest = world.add_location(start, "Chest", Requirement::Free);
    let beacon = world.add_event_location(
        end,
        "Beacon",
        Requirement::Free,
        Item::event("Beacon Lit", 1),
    );

    let mut state = CollectionState::new();
    assert!(!state.can_reach(&world, Spot::Region(end)));

    // Placing and then collecting the lamp opens the gate and the
    // follow-up sweep fires the event behind it.
    world.push_item(chest, Item::progression("Lamp", 1))?;
    state.collect_placed(&world, chest);
    assert!(state.has("Lamp", 1, 1));
    assert!(state.locations_checked.contains(&chest));
    assert!(state.can_reach(&world, Spot::Region(end)));
    assert!(state.events.contains(&beacon));
    assert!(state.has("Beacon Lit", 1, 1));
    Ok(())
}

#[test]
fn test_location_dependencies() -> Result<()> {
    let mut world = World::new(1, WorldSettings::default());
    let start = world.add_region("Start", 1, RegionType::LightWorld);
    world.set_start_region(start);
    let vault = world.add_region("Vault", 1, RegionType::Cave);
    world.connect_regions(start, vault, "Vault Door", Requirement::item("Key"));
    let inner = world.add_location(vault, "Vault Chest", Requirement::Free);
    let outer = world.add_location(start, "Outer Chest", Requirement::Free);
    world.locations[outer].dependencies.push(inner);

    let mut state = CollectionState::new();
    assert!(!state.can_reach(&world, Spot::Location(outer)));
    state.collect(&world, &Item::progression("Key", 1), false, None);
    assert!(state.can_reach(&world, Spot::Location(outer)));
    Ok(())
}
