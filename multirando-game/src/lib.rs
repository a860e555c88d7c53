use hashbrown::HashMap;
use log::debug;
use serde::{Deserialize, Serialize};
use strum_macros::{EnumString, VariantNames};
use thiserror::Error;

pub type PlayerId = usize; // 1-based, in 1..=World::players
pub type RegionId = usize; // index into World.regions
pub type EntranceId = usize; // index into World.entrances
pub type LocationId = usize; // index into World.locations
pub type DungeonId = usize; // index into World.dungeons

pub const TRIFORCE: &str = "Triforce";
pub const TREASURE_HUNT_ITEMS: [&str; 2] = ["Triforce Piece", "Power Star"];

// Concrete tier names appended when collecting a "Progressive ..." item,
// lowest tier first.
pub const SWORD_TIERS: [&str; 4] = [
    "Fighter Sword",
    "Master Sword",
    "Tempered Sword",
    "Golden Sword",
];
pub const GLOVE_TIERS: [&str; 2] = ["Power Glove", "Titans Mitts"];
pub const SHIELD_TIERS: [&str; 3] = ["Blue Shield", "Red Shield", "Mirror Shield"];

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("no such {kind} {name:?} for player {player}")]
    NotFound {
        kind: &'static str,
        name: String,
        player: PlayerId,
    },
    #[error("cannot place {item:?} at {location:?}: {reason}")]
    InvalidPlacement {
        item: String,
        location: String,
        reason: &'static str,
    },
}

#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    EnumString,
    VariantNames,
    Serialize,
    Deserialize,
)]
pub enum ItemType {
    #[default]
    None,
    SmallKey,
    BigKey,
    Map,
    Compass,
    Crystal,
}

impl ItemType {
    pub fn is_small_key(self) -> bool {
        self == ItemType::SmallKey
    }

    pub fn is_big_key(self) -> bool {
        self == ItemType::BigKey
    }

    pub fn is_key(self) -> bool {
        matches!(self, ItemType::SmallKey | ItemType::BigKey)
    }

    pub fn is_map(self) -> bool {
        self == ItemType::Map
    }

    pub fn is_compass(self) -> bool {
        self == ItemType::Compass
    }

    pub fn is_crystal(self) -> bool {
        self == ItemType::Crystal
    }

    pub fn is_dungeon_item(self) -> bool {
        self.is_key() || self.is_map() || self.is_compass()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub player: PlayerId,
    pub advancement: bool,
    pub priority: bool,
    pub item_type: ItemType,
}

impl Item {
    pub fn new(
        name: &str,
        player: PlayerId,
        advancement: bool,
        priority: bool,
        item_type: ItemType,
    ) -> Item {
        Item {
            name: name.to_string(),
            player,
            advancement,
            priority,
            item_type,
        }
    }

    /// An item that can gate reachability.
    pub fn progression(name: &str, player: PlayerId) -> Item {
        Item::new(name, player, true, false, ItemType::None)
    }

    /// The marker item held by an event location.
    pub fn event(name: &str, player: PlayerId) -> Item {
        Item::new(name, player, true, false, ItemType::None)
    }

    pub fn filler(name: &str, player: PlayerId) -> Item {
        Item::new(name, player, false, false, ItemType::None)
    }

    pub fn small_key(name: &str, player: PlayerId) -> Item {
        Item::new(name, player, false, false, ItemType::SmallKey)
    }

    pub fn big_key(name: &str, player: PlayerId) -> Item {
        Item::new(name, player, false, false, ItemType::BigKey)
    }

    pub fn map(name: &str, player: PlayerId) -> Item {
        Item::new(name, player, false, false, ItemType::Map)
    }

    pub fn compass(name: &str, player: PlayerId) -> Item {
        Item::new(name, player, false, false, ItemType::Compass)
    }

    pub fn crystal(name: &str, player: PlayerId) -> Item {
        Item::new(name, player, true, false, ItemType::Crystal)
    }

    pub fn is_key(&self) -> bool {
        self.item_type.is_key()
    }

    pub fn is_small_key(&self) -> bool {
        self.item_type.is_small_key()
    }

    pub fn is_big_key(&self) -> bool {
        self.item_type.is_big_key()
    }

    pub fn is_crystal(&self) -> bool {
        self.item_type.is_crystal()
    }

    pub fn is_dungeon_item(&self) -> bool {
        self.item_type.is_dungeon_item()
    }
}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, EnumString, VariantNames, Serialize, Deserialize,
)]
pub enum RegionType {
    LightWorld,
    DarkWorld,
    Cave,
    Dungeon,
}

impl RegionType {
    pub fn is_indoors(self) -> bool {
        matches!(self, RegionType::Cave | RegionType::Dungeon)
    }
}

#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    EnumString,
    VariantNames,
    Serialize,
    Deserialize,
)]
pub enum Goal {
    #[default]
    Ganon,
    Pedestal,
    Dungeons,
    TriforceHunt,
    Crystals,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MedallionSlot {
    MiseryMire,
    TurtleRock,
}

/// Tier caps for the progressive item families. A limit of N means tiers
/// 1..=N of the family can be obtained; further collects are swallowed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyRequirements {
    pub progressive_sword_limit: usize,
    pub progressive_shield_limit: usize,
    pub progressive_bottle_limit: usize,
}

impl Default for DifficultyRequirements {
    fn default() -> Self {
        DifficultyRequirements {
            progressive_sword_limit: 4,
            progressive_shield_limit: 3,
            progressive_bottle_limit: 4,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSettings {
    pub goal: Goal,
    pub treasure_hunt_count: usize,
    pub keysanity: bool,
    pub check_beatable_only: bool,
    pub difficulty: DifficultyRequirements,
}

/// An access rule attached to an entrance or location, evaluated against a
/// `CollectionState`. Rules referencing other spots by name are resolved
/// against the owning spot's player at evaluation time.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Requirement {
    Free,
    Never,
    Item(String),
    ItemCount { name: String, count: usize },
    HasSword,
    HasBeamSword,
    HasBluntWeapon,
    CanLiftRocks,
    CanLiftHeavyRocks,
    CanShootArrows,
    CanExtendMagic { smallmagic: usize },
    CanKillMostThings { enemies: usize },
    HasFireSource,
    HasBottle,
    HasHearts { count: usize },
    HasMedallion(MedallionSlot),
    CanReachRegion(String),
    CanReachEntrance(String),
    CanReachLocation(String),
    And(Vec<Requirement>),
    Or(Vec<Requirement>),
}

impl Requirement {
    pub fn item(name: &str) -> Requirement {
        Requirement::Item(name.to_string())
    }

    pub fn item_count(name: &str, count: usize) -> Requirement {
        Requirement::ItemCount {
            name: name.to_string(),
            count,
        }
    }

    pub fn make_and(reqs: Vec<Requirement>) -> Requirement {
        let mut out_reqs: Vec<Requirement> = vec![];
        for req in reqs {
            if let Requirement::Never = req {
                return Requirement::Never;
            } else if let Requirement::Free = req {
                continue;
            } else if let Requirement::And(and_reqs) = req {
                out_reqs.extend(and_reqs);
            } else {
                out_reqs.push(req);
            }
        }
        if out_reqs.is_empty() {
            Requirement::Free
        } else if out_reqs.len() == 1 {
            out_reqs.into_iter().next().unwrap()
        } else {
            Requirement::And(out_reqs)
        }
    }

    pub fn make_or(reqs: Vec<Requirement>) -> Requirement {
        let mut out_reqs: Vec<Requirement> = vec![];
        for req in reqs {
            if let Requirement::Never = req {
                continue;
            } else if let Requirement::Free = req {
                return Requirement::Free;
            } else if let Requirement::Or(or_reqs) = req {
                out_reqs.extend(or_reqs);
            } else {
                out_reqs.push(req);
            }
        }
        if out_reqs.is_empty() {
            Requirement::Never
        } else if out_reqs.len() == 1 {
            out_reqs.into_iter().next().unwrap()
        } else {
            Requirement::Or(out_reqs)
        }
    }
}

/// A placement filter evaluated against an `Item` alone.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemRule {
    Any,
    Never,
    Named(String),
    NotNamed(String),
    OwnedBy(PlayerId),
    And(Vec<ItemRule>),
    Or(Vec<ItemRule>),
}

impl ItemRule {
    pub fn allows(&self, item: &Item) -> bool {
        match self {
            ItemRule::Any => true,
            ItemRule::Never => false,
            ItemRule::Named(name) => item.name == *name,
            ItemRule::NotNamed(name) => item.name != *name,
            ItemRule::OwnedBy(player) => item.player == *player,
            ItemRule::And(rules) => rules.iter().all(|r| r.allows(item)),
            ItemRule::Or(rules) => rules.iter().any(|r| r.allows(item)),
        }
    }
}

/// A reachability-queryable graph object.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Spot {
    Region(RegionId),
    Entrance(EntranceId),
    Location(LocationId),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub player: PlayerId,
    pub region_type: RegionType,
    pub entrances: Vec<EntranceId>, // incoming
    pub exits: Vec<EntranceId>,     // outgoing
    pub locations: Vec<LocationId>,
    pub dungeon: Option<DungeonId>,
    /// Reachable unconditionally; the graph root a player starts from.
    pub start: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Entrance {
    pub name: String,
    pub player: PlayerId,
    pub parent_region: RegionId,
    pub connected_region: Option<RegionId>,
    pub access_rule: Requirement,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub player: PlayerId,
    pub parent_region: RegionId,
    pub item: Option<Item>,
    pub access_rule: Requirement,
    pub item_rule: ItemRule,
    pub always_allow: ItemRule,
    pub event: bool,
    // Locations that must be reachable before this one can be.
    pub dependencies: Vec<LocationId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Dungeon {
    pub name: String,
    pub player: PlayerId,
    pub regions: Vec<RegionId>,
    pub big_key: Option<Item>,
    pub small_keys: Vec<Item>,
    pub dungeon_items: Vec<Item>, // maps and compasses
}

impl Dungeon {
    pub fn all_items(&self) -> impl Iterator<Item = &Item> {
        self.dungeon_items
            .iter()
            .chain(self.small_keys.iter())
            .chain(self.big_key.iter())
    }

    pub fn is_dungeon_item(&self, item: &Item) -> bool {
        item.player == self.player && self.all_items().any(|i| i.name == item.name)
    }
}

/// The static world model: regions, entrances, locations, and dungeons in
/// flat arenas addressed by integer ids, plus the unplaced item pool and
/// the settings reachability queries consult. Immutable after construction
/// except through the builder and placement methods.
#[derive(Clone, Debug)]
pub struct World {
    pub players: usize,
    pub settings: WorldSettings,
    pub regions: Vec<Region>,
    pub entrances: Vec<Entrance>,
    pub locations: Vec<Location>,
    pub dungeons: Vec<Dungeon>,
    pub itempool: Vec<Item>,
    required_medallions: HashMap<PlayerId, [String; 2]>,
    region_index: HashMap<(String, PlayerId), RegionId>,
    entrance_index: HashMap<(String, PlayerId), EntranceId>,
    location_index: HashMap<(String, PlayerId), LocationId>,
    dungeon_index: HashMap<(String, PlayerId), DungeonId>,
}

impl World {
    pub fn new(players: usize, settings: WorldSettings) -> World {
        let required_medallions = (1..=players)
            .map(|p| (p, ["Ether".to_string(), "Quake".to_string()]))
            .collect();
        World {
            players,
            settings,
            regions: vec![],
            entrances: vec![],
            locations: vec![],
            dungeons: vec![],
            itempool: vec![],
            required_medallions,
            region_index: HashMap::new(),
            entrance_index: HashMap::new(),
            location_index: HashMap::new(),
            dungeon_index: HashMap::new(),
        }
    }

    pub fn add_region(&mut self, name: &str, player: PlayerId, region_type: RegionType) -> RegionId {
        let id = self.regions.len();
        self.regions.push(Region {
            name: name.to_string(),
            player,
            region_type,
            entrances: vec![],
            exits: vec![],
            locations: vec![],
            dungeon: None,
            start: false,
        });
        self.region_index
            .entry((name.to_string(), player))
            .or_insert(id);
        id
    }

    /// Creates an entrance leaving `region`. It leads nowhere until
    /// `connect` is called on it.
    pub fn add_exit(&mut self, region: RegionId, name: &str, access_rule: Requirement) -> EntranceId {
        let id = self.entrances.len();
        let player = self.regions[region].player;
        self.entrances.push(Entrance {
            name: name.to_string(),
            player,
            parent_region: region,
            connected_region: None,
            access_rule,
        });
        self.regions[region].exits.push(id);
        self.entrance_index
            .entry((name.to_string(), player))
            .or_insert(id);
        id
    }

    /// Marks a region as a player's starting point, reachable with
    /// nothing collected.
    pub fn set_start_region(&mut self, region: RegionId) {
        self.regions[region].start = true;
    }

    pub fn connect(&mut self, entrance: EntranceId, target: RegionId) {
        self.entrances[entrance].connected_region = Some(target);
        self.regions[target].entrances.push(entrance);
    }

    /// `add_exit` + `connect` in one step.
    pub fn connect_regions(
        &mut self,
        from: RegionId,
        to: RegionId,
        name: &str,
        access_rule: Requirement,
    ) -> EntranceId {
        let entrance = self.add_exit(from, name, access_rule);
        self.connect(entrance, to);
        entrance
    }

    pub fn add_location(&mut self, region: RegionId, name: &str, access_rule: Requirement) -> LocationId {
        let id = self.locations.len();
        let player = self.regions[region].player;
        self.locations.push(Location {
            name: name.to_string(),
            player,
            parent_region: region,
            item: None,
            access_rule,
            item_rule: ItemRule::Any,
            always_allow: ItemRule::Never,
            event: false,
            dependencies: vec![],
        });
        self.regions[region].locations.push(id);
        self.location_index
            .entry((name.to_string(), player))
            .or_insert(id);
        id
    }

    /// An event location auto-collects its item once reachable.
    pub fn add_event_location(
        &mut self,
        region: RegionId,
        name: &str,
        access_rule: Requirement,
        item: Item,
    ) -> LocationId {
        let id = self.add_location(region, name, access_rule);
        self.locations[id].event = true;
        self.locations[id].item = Some(item);
        id
    }

    pub fn add_dungeon(
        &mut self,
        name: &str,
        player: PlayerId,
        regions: Vec<RegionId>,
        big_key: Option<Item>,
        small_keys: Vec<Item>,
        dungeon_items: Vec<Item>,
    ) -> DungeonId {
        let id = self.dungeons.len();
        for &r in &regions {
            self.regions[r].dungeon = Some(id);
        }
        self.dungeons.push(Dungeon {
            name: name.to_string(),
            player,
            regions,
            big_key,
            small_keys,
            dungeon_items,
        });
        self.dungeon_index
            .entry((name.to_string(), player))
            .or_insert(id);
        id
    }

    pub fn add_item(&mut self, item: Item) {
        self.itempool.push(item);
    }

    pub fn add_items(&mut self, items: Vec<Item>) {
        self.itempool.extend(items);
    }

    pub fn set_medallion(&mut self, player: PlayerId, slot: MedallionSlot, item_name: &str) {
        let slots = self
            .required_medallions
            .entry(player)
            .or_insert_with(|| ["Ether".to_string(), "Quake".to_string()]);
        slots[slot as usize] = item_name.to_string();
    }

    pub fn required_medallion(&self, player: PlayerId, slot: MedallionSlot) -> &str {
        &self.required_medallions[&player][slot as usize]
    }

    pub fn get_region(&self, name: &str, player: PlayerId) -> Result<RegionId, WorldError> {
        self.region_index
            .get(&(name.to_string(), player))
            .copied()
            .ok_or_else(|| WorldError::NotFound {
                kind: "region",
                name: name.to_string(),
                player,
            })
    }

    pub fn get_entrance(&self, name: &str, player: PlayerId) -> Result<EntranceId, WorldError> {
        self.entrance_index
            .get(&(name.to_string(), player))
            .copied()
            .ok_or_else(|| WorldError::NotFound {
                kind: "entrance",
                name: name.to_string(),
                player,
            })
    }

    pub fn get_location(&self, name: &str, player: PlayerId) -> Result<LocationId, WorldError> {
        self.location_index
            .get(&(name.to_string(), player))
            .copied()
            .ok_or_else(|| WorldError::NotFound {
                kind: "location",
                name: name.to_string(),
                player,
            })
    }

    pub fn get_dungeon(&self, name: &str, player: PlayerId) -> Result<DungeonId, WorldError> {
        self.dungeon_index
            .get(&(name.to_string(), player))
            .copied()
            .ok_or_else(|| WorldError::NotFound {
                kind: "dungeon",
                name: name.to_string(),
                player,
            })
    }

    /// Places `item` at `location`, validating the fill rules but not
    /// reachability. Fails rather than overwriting an earlier placement.
    pub fn push_item(&mut self, location: LocationId, item: Item) -> Result<(), WorldError> {
        if self.locations[location].item.is_some() {
            return Err(WorldError::InvalidPlacement {
                item: item.name,
                location: self.locations[location].name.clone(),
                reason: "location already holds an item",
            });
        }
        if !self.always_allows(location, &item) && !self.fill_rules_allow(location, &item) {
            return Err(WorldError::InvalidPlacement {
                item: item.name,
                location: self.locations[location].name.clone(),
                reason: "rejected by fill rules",
            });
        }
        debug!(
            "Placed {} at {}",
            item.name, self.locations[location].name
        );
        self.locations[location].item = Some(item);
        Ok(())
    }

    pub fn always_allows(&self, location: LocationId, item: &Item) -> bool {
        self.locations[location].always_allow.allows(item)
    }

    pub fn fill_rules_allow(&self, location: LocationId, item: &Item) -> bool {
        let loc = &self.locations[location];
        self.region_can_fill(loc.parent_region, item) && loc.item_rule.allows(item)
    }

    /// Dungeon items stay in a region of their own dungeon unless
    /// keysanity lifts the restriction.
    pub fn region_can_fill(&self, region: RegionId, item: &Item) -> bool {
        if item.is_dungeon_item() && !self.settings.keysanity {
            let region = &self.regions[region];
            match region.dungeon {
                Some(d) => self.dungeons[d].is_dungeon_item(item) && item.player == region.player,
                None => false,
            }
        } else {
            true
        }
    }

    pub fn filled_locations(&self, player: Option<PlayerId>) -> Vec<LocationId> {
        let mut out = vec![];
        for (id, loc) in self.locations.iter().enumerate() {
            if loc.item.is_some() && player.is_none_or(|p| loc.player == p) {
                out.push(id);
            }
        }
        out
    }

    pub fn unfilled_locations(&self, player: Option<PlayerId>) -> Vec<LocationId> {
        let mut out = vec![];
        for (id, loc) in self.locations.iter().enumerate() {
            if loc.item.is_none() && player.is_none_or(|p| loc.player == p) {
                out.push(id);
            }
        }
        out
    }

    pub fn find_items(&self, name: &str, player: PlayerId) -> Vec<LocationId> {
        let mut out = vec![];
        for (id, loc) in self.locations.iter().enumerate() {
            if let Some(item) = &loc.item {
                if item.name == name && item.player == player {
                    out.push(id);
                }
            }
        }
        out
    }
}
