pub mod helpers;

use hashbrown::{HashMap, HashSet};
use log::debug;
use multirando_game::{
    EntranceId, Item, LocationId, PlayerId, RegionId, Requirement, Spot, World, GLOVE_TIERS,
    SHIELD_TIERS, SWORD_TIERS,
};

/// A snapshot of everything collected so far, with memoized reachability
/// layered on top. States are cheap to clone and clones never share cache
/// entries, so speculative queries cannot poison the state they started
/// from.
#[derive(Clone, Debug, Default)]
pub struct CollectionState {
    /// Insertion-ordered multiset of collected item names per player.
    /// Only progression and event items ever land here.
    pub collected: Vec<(String, PlayerId)>,
    /// Event locations that have already fired.
    pub events: HashSet<LocationId>,
    pub locations_checked: HashSet<LocationId>,
    /// Predecessor links recorded the first time a region or entrance is
    /// proven reachable, consumed by playthrough path reporting.
    pub path: HashMap<Spot, Spot>,
    region_cache: HashMap<RegionId, bool>,
    entrance_cache: HashMap<EntranceId, bool>,
    location_cache: HashMap<LocationId, bool>,
    // Spots whose reachability is currently being computed. Doubles as the
    // recursion depth gauge: empty means a top-level query.
    resolving: HashSet<Spot>,
}

impl CollectionState {
    pub fn new() -> CollectionState {
        CollectionState::default()
    }

    pub fn has(&self, name: &str, player: PlayerId, count: usize) -> bool {
        if count == 1 {
            self.collected.iter().any(|(n, p)| n == name && *p == player)
        } else {
            self.item_count(name, player) >= count
        }
    }

    pub fn item_count(&self, name: &str, player: PlayerId) -> usize {
        self.collected
            .iter()
            .filter(|(n, p)| n == name && *p == player)
            .count()
    }

    /// Memoized reachability query. A spot already being resolved is
    /// assumed unreachable, which is what terminates cyclic entrance
    /// chains. True results are cached permanently (collecting can only
    /// grow the reachable set); false results are cached only when the
    /// query that computed them was top-level, so a provisional answer
    /// produced while breaking a cycle never sticks.
    pub fn can_reach(&mut self, world: &World, spot: Spot) -> bool {
        if self.resolving.contains(&spot) {
            return false;
        }
        if let Some(cached) = self.cached(spot) {
            return cached;
        }
        self.resolving.insert(spot);
        let reached = match spot {
            Spot::Region(id) => self.region_reachable(world, id),
            Spot::Entrance(id) => self.entrance_reachable(world, id),
            Spot::Location(id) => self.location_reachable(world, id, false),
        };
        self.resolving.remove(&spot);
        if reached {
            self.cache_insert(spot, true);
        } else if self.resolving.is_empty() {
            self.cache_insert(spot, false);
        }
        reached
    }

    fn cached(&self, spot: Spot) -> Option<bool> {
        match spot {
            Spot::Region(id) => self.region_cache.get(&id).copied(),
            Spot::Entrance(id) => self.entrance_cache.get(&id).copied(),
            Spot::Location(id) => self.location_cache.get(&id).copied(),
        }
    }

    fn cache_insert(&mut self, spot: Spot, value: bool) {
        match spot {
            Spot::Region(id) => {
                self.region_cache.insert(id, value);
            }
            Spot::Entrance(id) => {
                self.entrance_cache.insert(id, value);
            }
            Spot::Location(id) => {
                self.location_cache.insert(id, value);
            }
        }
    }

    fn region_reachable(&mut self, world: &World, id: RegionId) -> bool {
        if world.regions[id].start {
            return true;
        }
        for &entrance in &world.regions[id].entrances {
            if self.can_reach(world, Spot::Entrance(entrance)) {
                self.path
                    .entry(Spot::Region(id))
                    .or_insert(Spot::Entrance(entrance));
                return true;
            }
        }
        false
    }

    fn entrance_reachable(&mut self, world: &World, id: EntranceId) -> bool {
        let entrance = &world.entrances[id];
        if self.satisfies(world, &entrance.access_rule, entrance.player)
            && self.can_reach(world, Spot::Region(entrance.parent_region))
        {
            self.path
                .entry(Spot::Entrance(id))
                .or_insert(Spot::Region(entrance.parent_region));
            return true;
        }
        false
    }

    fn location_reachable(
        &mut self,
        world: &World,
        id: LocationId,
        ignore_dependencies: bool,
    ) -> bool {
        if !ignore_dependencies {
            for &dep in &world.locations[id].dependencies {
                if !self.dependency_reachable(world, dep) {
                    return false;
                }
            }
        }
        let loc = &world.locations[id];
        self.satisfies(world, &loc.access_rule, loc.player)
            && self.can_reach(world, Spot::Region(loc.parent_region))
    }

    // Speculative query used for another location's dependency chain: the
    // dependency's own dependencies are skipped and the result is never
    // written to the cache, though an existing entry is trusted.
    fn dependency_reachable(&mut self, world: &World, id: LocationId) -> bool {
        let spot = Spot::Location(id);
        if self.resolving.contains(&spot) {
            return false;
        }
        if let Some(&cached) = self.location_cache.get(&id) {
            return cached;
        }
        self.resolving.insert(spot);
        let reached = self.location_reachable(world, id, true);
        self.resolving.remove(&spot);
        reached
    }

    /// Evaluates an access rule for `player`. Spot names inside rules are
    /// construction-time data; a failed lookup is a data error and panics.
    pub fn satisfies(&mut self, world: &World, req: &Requirement, player: PlayerId) -> bool {
        match req {
            Requirement::Free => true,
            Requirement::Never => false,
            Requirement::Item(name) => self.has(name, player, 1),
            Requirement::ItemCount { name, count } => self.has(name, player, *count),
            Requirement::HasSword => self.has_sword(player),
            Requirement::HasBeamSword => self.has_beam_sword(player),
            Requirement::HasBluntWeapon => self.has_blunt_weapon(player),
            Requirement::CanLiftRocks => self.can_lift_rocks(player),
            Requirement::CanLiftHeavyRocks => self.can_lift_heavy_rocks(player),
            Requirement::CanShootArrows => self.can_shoot_arrows(player),
            Requirement::CanExtendMagic { smallmagic } => {
                self.can_extend_magic(player, *smallmagic)
            }
            Requirement::CanKillMostThings { enemies } => {
                self.can_kill_most_things(player, *enemies)
            }
            Requirement::HasFireSource => self.has_fire_source(player),
            Requirement::HasBottle => self.has_bottle(player),
            Requirement::HasHearts { count } => self.has_hearts(player, *count),
            Requirement::HasMedallion(slot) => {
                self.has(world.required_medallion(player, *slot), player, 1)
            }
            Requirement::CanReachRegion(name) => {
                let id = world
                    .get_region(name, player)
                    .unwrap_or_else(|e| panic!("{e}"));
                self.can_reach(world, Spot::Region(id))
            }
            Requirement::CanReachEntrance(name) => {
                let id = world
                    .get_entrance(name, player)
                    .unwrap_or_else(|e| panic!("{e}"));
                self.can_reach(world, Spot::Entrance(id))
            }
            Requirement::CanReachLocation(name) => {
                let id = world
                    .get_location(name, player)
                    .unwrap_or_else(|e| panic!("{e}"));
                self.can_reach(world, Spot::Location(id))
            }
            Requirement::And(reqs) => reqs.iter().all(|r| self.satisfies(world, r, player)),
            Requirement::Or(reqs) => reqs.iter().any(|r| self.satisfies(world, r, player)),
        }
    }

    /// Adds an item to the collected multiset. Progressive families map
    /// the token name to the next concrete tier; plain items land only if
    /// they are progression-relevant or event markers. On any actual
    /// append the stale unreachable entries are dropped and, unless this
    /// collect is itself part of an event sweep, events are re-swept.
    pub fn collect(
        &mut self,
        world: &World,
        item: &Item,
        is_event: bool,
        location: Option<LocationId>,
    ) {
        if let Some(location) = location {
            self.locations_checked.insert(location);
        }
        let changed = self.collect_into_multiset(world, item, is_event || item.advancement);
        if changed {
            self.clear_cached_unreachable(world, None);
            if !is_event {
                self.sweep_for_events(world, false, None);
            }
        }
    }

    /// Pool-accounting collect used by all-state audits: keys count even
    /// when not flagged as progression, and neither location bookkeeping
    /// nor cache invalidation nor event sweeping happens.
    pub fn soft_collect(&mut self, world: &World, item: &Item) {
        self.collect_into_multiset(world, item, item.advancement || item.is_key());
    }

    fn collect_into_multiset(&mut self, world: &World, item: &Item, append_plain: bool) -> bool {
        if item.name.starts_with("Progressive ") {
            if item.name.contains("Sword") {
                self.collect_progressive(
                    item.player,
                    &SWORD_TIERS,
                    world.settings.difficulty.progressive_sword_limit,
                )
            } else if item.name.contains("Glove") {
                self.collect_progressive(item.player, &GLOVE_TIERS, GLOVE_TIERS.len())
            } else if item.name.contains("Shield") {
                self.collect_progressive(
                    item.player,
                    &SHIELD_TIERS,
                    world.settings.difficulty.progressive_shield_limit,
                )
            } else {
                false
            }
        } else if item.name.starts_with("Bottle") {
            if self.bottle_count(item.player) < world.settings.difficulty.progressive_bottle_limit
            {
                self.collected.push((item.name.clone(), item.player));
                true
            } else {
                false
            }
        } else if append_plain {
            self.collected.push((item.name.clone(), item.player));
            true
        } else {
            false
        }
    }

    fn collect_progressive(&mut self, player: PlayerId, tiers: &[&str], limit: usize) -> bool {
        let held = (0..tiers.len()).rev().find(|&i| self.has(tiers[i], player, 1));
        let next = held.map_or(0, |i| i + 1);
        if next < tiers.len() && next < limit {
            self.collected.push((tiers[next].to_string(), player));
            true
        } else {
            false
        }
    }

    /// Inverse of `collect` for a single item. Progressive families lose
    /// their best tier actually held. A removal can only shrink
    /// reachability, so every cache entry is flushed, not just the false
    /// ones.
    pub fn remove(&mut self, item: &Item) {
        if !item.advancement {
            return;
        }
        let removed = if item.name.starts_with("Progressive ") {
            if item.name.contains("Sword") {
                self.remove_progressive(item.player, &SWORD_TIERS)
            } else if item.name.contains("Glove") {
                self.remove_progressive(item.player, &GLOVE_TIERS)
            } else if item.name.contains("Shield") {
                self.remove_progressive(item.player, &SHIELD_TIERS)
            } else {
                false
            }
        } else {
            self.remove_named(&item.name, item.player)
        };
        if removed {
            self.region_cache.clear();
            self.entrance_cache.clear();
            self.location_cache.clear();
            self.resolving.clear();
        }
    }

    fn remove_progressive(&mut self, player: PlayerId, tiers: &[&str]) -> bool {
        let held = (0..tiers.len()).rev().find(|&i| self.has(tiers[i], player, 1));
        let Some(best) = held else {
            debug_assert!(false, "removing a progressive tier that was never granted");
            return false;
        };
        self.remove_named(tiers[best], player)
    }

    fn remove_named(&mut self, name: &str, player: PlayerId) -> bool {
        match self
            .collected
            .iter()
            .position(|(n, p)| n == name && *p == player)
        {
            Some(pos) => {
                self.collected.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Drops every cached false entry, optionally only for one player's
    /// spots. Cached true entries stay valid forever under collection.
    pub fn clear_cached_unreachable(&mut self, world: &World, player: Option<PlayerId>) {
        match player {
            None => {
                self.region_cache.retain(|_, v| *v);
                self.entrance_cache.retain(|_, v| *v);
                self.location_cache.retain(|_, v| *v);
            }
            Some(p) => {
                self.region_cache
                    .retain(|id, v| *v || world.regions[*id].player != p);
                self.entrance_cache
                    .retain(|id, v| *v || world.entrances[*id].player != p);
                self.location_cache
                    .retain(|id, v| *v || world.locations[*id].player != p);
            }
        }
    }

    /// Fires every reachable event location that has not fired yet,
    /// collecting its item, and repeats until a full pass finds no more
    /// reachable event locations than the previous one. Idempotent once
    /// stable.
    pub fn sweep_for_events(&mut self, world: &World, key_only: bool, player: Option<PlayerId>) {
        let mut candidates: Vec<LocationId> = vec![];
        for (id, loc) in world.locations.iter().enumerate() {
            if !loc.event {
                continue;
            }
            if let Some(p) = player {
                if loc.player != p {
                    continue;
                }
            }
            let Some(item) = &loc.item else { continue };
            if key_only && !item.is_key() {
                continue;
            }
            candidates.push(id);
        }
        let mut checked = 0;
        loop {
            let mut reachable: Vec<LocationId> = vec![];
            for &id in &candidates {
                if self.can_reach(world, Spot::Location(id)) {
                    reachable.push(id);
                }
            }
            for &id in &reachable {
                if self.events.insert(id) {
                    if let Some(item) = &world.locations[id].item {
                        debug!(
                            "Event fired: {} (Player {})",
                            world.locations[id].name, world.locations[id].player
                        );
                        self.collect(world, item, true, Some(id));
                    }
                }
            }
            if reachable.len() <= checked {
                break;
            }
            checked = reachable.len();
        }
    }

    /// Collects a just-placed location's item into this state, the second
    /// half of a push-and-collect placement.
    pub fn collect_placed(&mut self, world: &World, location: LocationId) {
        if let Some(item) = &world.locations[location].item {
            self.collect(world, item, world.locations[location].event, Some(location));
        }
    }

    pub fn can_fill(
        &mut self,
        world: &World,
        location: LocationId,
        item: &Item,
        check_access: bool,
    ) -> bool {
        world.always_allows(location, item)
            || (world.fill_rules_allow(location, item)
                && (!check_access || self.can_reach(world, Spot::Location(location))))
    }

    pub fn reachable_locations(
        &mut self,
        world: &World,
        player: Option<PlayerId>,
    ) -> Vec<LocationId> {
        let mut out = vec![];
        for id in 0..world.locations.len() {
            if player.is_none_or(|p| world.locations[id].player == p)
                && self.can_reach(world, Spot::Location(id))
            {
                out.push(id);
            }
        }
        out
    }

    /// Unfilled locations where `item` could land right now: reachable
    /// and accepted by the fill rules. The candidate set a fill pass
    /// would choose from.
    pub fn placeable_locations(
        &mut self,
        world: &World,
        player: Option<PlayerId>,
        item: &Item,
    ) -> Vec<LocationId> {
        let mut out = vec![];
        for id in 0..world.locations.len() {
            if world.locations[id].item.is_none()
                && player.is_none_or(|p| world.locations[id].player == p)
                && self.can_fill(world, id, item, true)
            {
                out.push(id);
            }
        }
        out
    }

    /// The chain of spots recorded when `spot` was first proven reachable,
    /// walking predecessor links back to the graph root; returned
    /// root-first. Empty links mean the spot was never proven reachable.
    pub fn get_path(&self, spot: Spot) -> Vec<Spot> {
        let mut chain = vec![spot];
        let mut cur = spot;
        while let Some(&pred) = self.path.get(&cur) {
            chain.push(pred);
            cur = pred;
        }
        chain.reverse();
        chain
    }
}
