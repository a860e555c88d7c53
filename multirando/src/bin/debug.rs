use anyhow::Result;
use log::info;
use multirando::completion::{can_beat_game, get_all_state};
use multirando::playthrough::create_playthrough;
use multirando_game::{Item, PlayerId, Requirement, RegionType, World, WorldSettings};

// A small two-player world: lamps, swords, and gloves are shuffled across
// the players, Eastern Palace holds each player's Triforce behind a small
// key and an event boss.
fn build_demo_world() -> Result<World> {
    let mut world = World::new(2, WorldSettings::default());

    for player in 1..=2 {
        let menu = world.add_region("Menu", player, RegionType::LightWorld);
        world.set_start_region(menu);
        let light_world = world.add_region("Light World", player, RegionType::LightWorld);
        world.connect_regions(menu, light_world, "Links House Exit", Requirement::Free);

        let mountain = world.add_region("Death Mountain", player, RegionType::LightWorld);
        world.connect_regions(
            light_world,
            mountain,
            "Death Mountain Ascent",
            Requirement::CanLiftRocks,
        );

        let palace = world.add_region("Eastern Palace", player, RegionType::Dungeon);
        world.connect_regions(
            light_world,
            palace,
            "Eastern Palace Entrance",
            Requirement::item("Lamp"),
        );

        world.add_location(light_world, "Lost Woods Chest", Requirement::Free);
        world.add_location(light_world, "Kakariko Well", Requirement::Free);
        world.add_location(light_world, "Blacksmith", Requirement::Free);
        world.add_location(mountain, "Spectacle Rock Chest", Requirement::Free);
        world.add_location(palace, "Eastern Palace - Entrance Chest", Requirement::Free);
        world.add_location(
            palace,
            "Eastern Palace - Big Chest",
            Requirement::item_count("Small Key (Eastern Palace)", 1),
        );
        world.add_event_location(
            palace,
            "Armos Knights",
            Requirement::HasSword,
            Item::event("Defeat Armos Knights", player),
        );

        let key = Item::small_key("Small Key (Eastern Palace)", player);
        world.add_dungeon(
            "Eastern Palace",
            player,
            vec![palace],
            None,
            vec![key],
            vec![],
        );
    }

    let place = |world: &mut World, loc: &str, loc_player: PlayerId, item: Item| -> Result<()> {
        let id = world.get_location(loc, loc_player)?;
        world.push_item(id, item)?;
        Ok(())
    };

    for player in 1..=2 {
        let other = 3 - player;
        place(
            &mut world,
            "Lost Woods Chest",
            player,
            Item::progression("Lamp", other),
        )?;
        place(
            &mut world,
            "Kakariko Well",
            player,
            Item::progression("Progressive Glove", other),
        )?;
        place(
            &mut world,
            "Blacksmith",
            player,
            Item::progression("Progressive Sword", player),
        )?;
        place(
            &mut world,
            "Spectacle Rock Chest",
            player,
            Item::filler("Rupees (300)", player),
        )?;
        // Dungeon-item locations are flagged as events so the key-only
        // sweep auto-collects their keys during sphere calculation.
        let key_chest = world.get_location("Eastern Palace - Entrance Chest", player)?;
        world.push_item(key_chest, Item::small_key("Small Key (Eastern Palace)", player))?;
        world.locations[key_chest].event = true;
        place(
            &mut world,
            "Eastern Palace - Big Chest",
            player,
            Item::progression("Triforce", player),
        )?;
    }

    Ok(world)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let world = build_demo_world()?;
    info!(
        "Built demo world: {} players, {} regions, {} entrances, {} locations",
        world.players,
        world.regions.len(),
        world.entrances.len(),
        world.locations.len()
    );

    let mut all_state = get_all_state(&world, true, None);
    info!(
        "All-state audit: {} of {} locations reachable",
        all_state.reachable_locations(&world, None).len(),
        world.locations.len()
    );

    info!("Game beatable: {}", can_beat_game(&world, None));

    let playthrough = create_playthrough(&world)?;
    println!("{}", serde_json::to_string_pretty(&playthrough)?);
    Ok(())
}
