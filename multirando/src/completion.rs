use hashbrown::HashMap;
use multirando_game::{
    Goal, Item, LocationId, PlayerId, Spot, World, TREASURE_HUNT_ITEMS, TRIFORCE,
};
use multirando_logic::CollectionState;

/// True when the win condition already holds in `state`: every player has
/// the Triforce, or (treasure-hunt goal) every player's combined treasure
/// count meets the configured threshold.
pub fn has_beaten_game(world: &World, state: &CollectionState) -> bool {
    if (1..=world.players).all(|p| state.has(TRIFORCE, p, 1)) {
        return true;
    }
    if world.settings.goal == Goal::TriforceHunt {
        return (1..=world.players)
            .all(|p| treasure_count(state, p) >= world.settings.treasure_hunt_count);
    }
    false
}

fn treasure_count(state: &CollectionState, player: PlayerId) -> usize {
    TREASURE_HUNT_ITEMS
        .iter()
        .map(|name| state.item_count(name, player))
        .sum()
}

/// Whether the game can still be completed from `starting_state` (or from
/// scratch), gathering placed progression in breadth-first spheres. Items
/// found in a pass only count toward the next pass, and an empty sphere
/// means progression is exhausted.
pub fn can_beat_game(world: &World, starting_state: Option<&CollectionState>) -> bool {
    let mut state = match starting_state {
        Some(s) => s.clone(),
        None => CollectionState::new(),
    };
    if has_beaten_game(world, &state) {
        return true;
    }

    let mut prog_locations: Vec<LocationId> = vec![];
    for id in world.filled_locations(None) {
        let loc = &world.locations[id];
        let Some(item) = &loc.item else { continue };
        if (item.advancement || loc.event) && !state.locations_checked.contains(&id) {
            prog_locations.push(id);
        }
    }

    let mut treasure_pieces_collected: HashMap<PlayerId, usize> = HashMap::new();
    let mut triforces_collected: HashMap<PlayerId, bool> = HashMap::new();
    for player in 1..=world.players {
        treasure_pieces_collected.insert(player, treasure_count(&state, player));
        triforces_collected.insert(player, state.has(TRIFORCE, player, 1));
    }

    while !prog_locations.is_empty() {
        let mut sphere: Vec<LocationId> = vec![];
        for &id in &prog_locations {
            if !state.can_reach(world, Spot::Location(id)) {
                continue;
            }
            let Some(item) = &world.locations[id].item else {
                continue;
            };
            // Win-condition items count the moment their location is in a
            // sphere; no need to finish collecting the pass.
            if item.name == TRIFORCE {
                triforces_collected.insert(item.player, true);
                if triforces_collected.values().all(|&v| v) {
                    return true;
                }
            } else if TREASURE_HUNT_ITEMS.contains(&item.name.as_str()) {
                *treasure_pieces_collected.entry(item.player).or_insert(0) += 1;
                if world.settings.goal == Goal::TriforceHunt
                    && (1..=world.players).all(|p| {
                        treasure_pieces_collected[&p] >= world.settings.treasure_hunt_count
                    })
                {
                    return true;
                }
            }
            sphere.push(id);
        }

        if sphere.is_empty() {
            // Nothing new is reachable; the remaining progression can
            // never be gathered.
            return false;
        }

        prog_locations.retain(|id| !sphere.contains(id));
        for &id in &sphere {
            if let Some(item) = &world.locations[id].item {
                state.collect(world, item, true, Some(id));
            }
        }
    }

    false
}

/// The state with the entire remaining item pool soft-collected,
/// optionally with every dungeon's keys injected, then swept for events.
/// Answers "with everything still to be placed in hand, what is
/// reachable?".
pub fn get_all_state(world: &World, keys: bool, player: Option<PlayerId>) -> CollectionState {
    let mut ret = CollectionState::new();
    for item in &world.itempool {
        ret.soft_collect(world, item);
    }
    if keys {
        for dungeon in &world.dungeons {
            if player.is_some_and(|p| dungeon.player != p) {
                continue;
            }
            for key in &dungeon.small_keys {
                ret.soft_collect(world, key);
            }
            if let Some(big_key) = &dungeon.big_key {
                ret.soft_collect(world, big_key);
            }
        }
    }
    ret.sweep_for_events(world, false, player);
    ret.clear_cached_unreachable(world, None);
    ret
}

/// Whether collecting `item` on top of `state` opens up any unfilled
/// location that was not reachable before.
pub fn unlocks_new_location(world: &World, state: &mut CollectionState, item: &Item) -> bool {
    let mut temp_state = state.clone();
    temp_state.clear_cached_unreachable(world, None);
    temp_state.collect(world, item, true, None);
    for id in world.unfilled_locations(None) {
        if temp_state.can_reach(world, Spot::Location(id))
            && !state.can_reach(world, Spot::Location(id))
        {
            return true;
        }
    }
    false
}
