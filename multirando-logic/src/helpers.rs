//! The predicate vocabulary access rules are written in terms of.

use multirando_game::{MedallionSlot, PlayerId, World};

use crate::CollectionState;

impl CollectionState {
    pub fn has_sword(&self, player: PlayerId) -> bool {
        self.has("Fighter Sword", player, 1)
            || self.has("Master Sword", player, 1)
            || self.has("Tempered Sword", player, 1)
            || self.has("Golden Sword", player, 1)
    }

    pub fn has_beam_sword(&self, player: PlayerId) -> bool {
        self.has("Master Sword", player, 1)
            || self.has("Tempered Sword", player, 1)
            || self.has("Golden Sword", player, 1)
    }

    pub fn has_blunt_weapon(&self, player: PlayerId) -> bool {
        self.has_sword(player) || self.has("Hammer", player, 1)
    }

    pub fn can_lift_rocks(&self, player: PlayerId) -> bool {
        self.has("Power Glove", player, 1) || self.has("Titans Mitts", player, 1)
    }

    pub fn can_lift_heavy_rocks(&self, player: PlayerId) -> bool {
        self.has("Titans Mitts", player, 1)
    }

    pub fn has_bottle(&self, player: PlayerId) -> bool {
        self.bottle_count(player) > 0
    }

    pub fn bottle_count(&self, player: PlayerId) -> usize {
        self.collected
            .iter()
            .filter(|(n, p)| n.starts_with("Bottle") && *p == player)
            .count()
    }

    pub fn has_hearts(&self, player: PlayerId, count: usize) -> bool {
        self.heart_count(player) >= count
    }

    pub fn heart_count(&self, player: PlayerId) -> usize {
        self.item_count("Boss Heart Container", player)
            + self.item_count("Sanctuary Heart Container", player)
            + self.item_count("Piece of Heart", player) / 4
            + 3 // starting hearts
    }

    pub fn can_extend_magic(&self, player: PlayerId, smallmagic: usize) -> bool {
        let mut basemagic = 8;
        if self.has("Quarter Magic", player, 1) {
            basemagic = 32;
        } else if self.has("Half Magic", player, 1) {
            basemagic = 16;
        }
        basemagic >= smallmagic
    }

    pub fn can_kill_most_things(&self, player: PlayerId, enemies: usize) -> bool {
        self.has_blunt_weapon(player)
            || self.has("Cane of Somaria", player, 1)
            || (self.has("Cane of Byrna", player, 1)
                && (enemies < 6 || self.can_extend_magic(player, 16)))
            || self.can_shoot_arrows(player)
            || self.has("Fire Rod", player, 1)
    }

    pub fn can_shoot_arrows(&self, player: PlayerId) -> bool {
        self.has("Bow", player, 1)
    }

    pub fn has_fire_source(&self, player: PlayerId) -> bool {
        self.has("Fire Rod", player, 1) || self.has("Lamp", player, 1)
    }

    /// Key-count vocabulary alias for `has`.
    pub fn has_key(&self, name: &str, player: PlayerId, count: usize) -> bool {
        self.has(name, player, count)
    }

    pub fn has_misery_mire_medallion(&self, world: &World, player: PlayerId) -> bool {
        self.has(
            world.required_medallion(player, MedallionSlot::MiseryMire),
            player,
            1,
        )
    }

    pub fn has_turtle_rock_medallion(&self, world: &World, player: PlayerId) -> bool {
        self.has(
            world.required_medallion(player, MedallionSlot::TurtleRock),
            player,
            1,
        )
    }
}
