use anyhow::{bail, Result};
use log::debug;
use multirando_game::{Goal, LocationId, PlayerId, RegionId, Spot, World};
use multirando_logic::CollectionState;
use serde::Serialize;

use crate::completion::can_beat_game;

#[derive(Clone, Debug, Serialize)]
pub struct Playthrough {
    pub spheres: Vec<PlaythroughSphere>,
    pub paths: Vec<PlaythroughPath>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PlaythroughSphere {
    pub number: usize,
    pub entries: Vec<PlaythroughEntry>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PlaythroughEntry {
    pub location: String,
    pub location_player: PlayerId,
    pub item: String,
    pub item_player: PlayerId,
}

/// One hop of a route: the region stood in and the exit taken out of it
/// (None at the destination).
#[derive(Clone, Debug, Serialize)]
pub struct PathStep {
    pub region: String,
    pub exit: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PlaythroughPath {
    pub location: String,
    pub player: PlayerId,
    pub steps: Vec<PathStep>,
}

/// Computes a minimal sphere-ordered playthrough: breadth-first spheres
/// over placed progression, a reverse pass culling every item the game
/// can still be beaten without, and a final sphere rebuild over what
/// survives. Works on a scratch copy of the world; the input is untouched.
pub fn create_playthrough(world: &World) -> Result<Playthrough> {
    let mut world = world.clone();

    // Defeating Ganon is not part of these goals, so an item sitting
    // there must not look like required progression.
    if matches!(world.settings.goal, Goal::Pedestal | Goal::TriforceHunt) {
        for player in 1..=world.players {
            if let Ok(id) = world.get_location("Ganon", player) {
                world.locations[id].item = None;
            }
        }
    }

    if world.settings.check_beatable_only && !can_beat_game(&world, None) {
        bail!("cannot create a playthrough of an unbeatable game");
    }

    let mut candidates: Vec<LocationId> = vec![];
    for id in world.filled_locations(None) {
        if world.locations[id]
            .item
            .as_ref()
            .is_some_and(|item| item.advancement)
        {
            candidates.push(id);
        }
    }
    let total = candidates.len();

    let mut state = CollectionState::new();
    let mut collection_spheres: Vec<Vec<LocationId>> = vec![];
    while !candidates.is_empty() {
        if !world.settings.keysanity {
            state.sweep_for_events(&world, true, None);
        }
        let mut sphere: Vec<LocationId> = vec![];
        for &id in &candidates {
            if state.can_reach(&world, Spot::Location(id)) {
                sphere.push(id);
            }
        }
        candidates.retain(|id| !sphere.contains(id));
        for &id in &sphere {
            if let Some(item) = &world.locations[id].item {
                state.collect(&world, item, true, Some(id));
            }
        }
        let sphere_len = sphere.len();
        collection_spheres.push(sphere);
        debug!(
            "Calculated sphere {}, containing {} of {} progress items",
            collection_spheres.len(),
            sphere_len,
            total
        );
        if sphere_len == 0 {
            if !world.settings.check_beatable_only {
                let unreached: Vec<String> = candidates
                    .iter()
                    .map(|&id| world.locations[id].name.clone())
                    .collect();
                bail!(
                    "not all progression items reachable: {}",
                    unreached.join(", ")
                );
            }
            break;
        }
    }

    // Walk the spheres backwards, dropping anything the game can be
    // beaten without.
    for sphere in collection_spheres.iter_mut().rev() {
        let mut to_delete: Vec<LocationId> = vec![];
        for &id in sphere.iter() {
            if let Some(item) = &world.locations[id].item {
                debug!(
                    "Checking if {} (Player {}) is required to beat the game",
                    item.name, item.player
                );
            }
            let old_item = world.locations[id].item.take();
            if can_beat_game(&world, None) {
                to_delete.push(id);
            } else {
                world.locations[id].item = old_item;
            }
        }
        sphere.retain(|id| !to_delete.contains(id));
    }

    // Rebuild the spheres over the survivors to get the final ordering
    // and the routes taken.
    let mut required: Vec<LocationId> = collection_spheres.iter().flatten().copied().collect();
    let mut state = CollectionState::new();
    let mut final_spheres: Vec<Vec<LocationId>> = vec![];
    while !required.is_empty() {
        if !world.settings.keysanity {
            state.sweep_for_events(&world, true, None);
        }
        let mut sphere: Vec<LocationId> = vec![];
        for &id in &required {
            if state.can_reach(&world, Spot::Location(id)) {
                sphere.push(id);
            }
        }
        if sphere.is_empty() {
            bail!("not all required items reachable; playthrough culling went wrong");
        }
        required.retain(|id| !sphere.contains(id));
        for &id in &sphere {
            if let Some(item) = &world.locations[id].item {
                state.collect(&world, item, true, Some(id));
            }
        }
        debug!(
            "Calculated final sphere {}, containing {} progress items",
            final_spheres.len() + 1,
            sphere.len()
        );
        final_spheres.push(sphere);
    }

    let mut spheres: Vec<PlaythroughSphere> = vec![];
    let mut paths: Vec<PlaythroughPath> = vec![];
    for (i, sphere) in final_spheres.iter().enumerate() {
        let mut entries: Vec<PlaythroughEntry> = vec![];
        for &id in sphere {
            let loc = &world.locations[id];
            let Some(item) = &loc.item else { continue };
            entries.push(PlaythroughEntry {
                location: loc.name.clone(),
                location_player: loc.player,
                item: item.name.clone(),
                item_player: item.player,
            });
            paths.push(PlaythroughPath {
                location: loc.name.clone(),
                player: loc.player,
                steps: region_path(&world, &state, loc.parent_region),
            });
        }
        spheres.push(PlaythroughSphere {
            number: i + 1,
            entries,
        });
    }

    Ok(Playthrough { spheres, paths })
}

// Flattens the predecessor chain recorded by the final traversal into
// (region, exit taken) steps from the root.
fn region_path(world: &World, state: &CollectionState, region: RegionId) -> Vec<PathStep> {
    let chain = state.get_path(Spot::Region(region));
    let mut steps: Vec<PathStep> = vec![];
    for (i, spot) in chain.iter().enumerate() {
        if let Spot::Region(r) = spot {
            let exit = match chain.get(i + 1) {
                Some(Spot::Entrance(e)) => Some(world.entrances[*e].name.clone()),
                _ => None,
            };
            steps.push(PathStep {
                region: world.regions[*r].name.clone(),
                exit,
            });
        }
    }
    steps
}
