// Roster slots, positions, and point-in-time roster snapshots.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Football positions used for roster slot designation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Quarterback,
    RunningBack,
    WideReceiver,
    TightEnd,
    Flex,
    Kicker,
    Defense,
    Bench,
    InjuredReserve,
}

impl Position {
    /// Parse a position string into a Position enum.
    ///
    /// Handles the common platform abbreviations:
    /// - "QB" -> Quarterback, "RB" -> RunningBack, "WR" -> WideReceiver
    /// - "FLEX"/"W/R/T" -> Flex, "DST"/"DEF"/"D/ST" -> Defense
    /// - "BE"/"BN" -> Bench, "IR" -> InjuredReserve
    pub fn from_str_pos(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "QB" => Some(Position::Quarterback),
            "RB" => Some(Position::RunningBack),
            "WR" => Some(Position::WideReceiver),
            "TE" => Some(Position::TightEnd),
            "FLEX" | "W/R/T" | "RB/WR/TE" => Some(Position::Flex),
            "K" | "PK" => Some(Position::Kicker),
            "DST" | "DEF" | "D/ST" => Some(Position::Defense),
            "BE" | "BN" => Some(Position::Bench),
            "IR" | "DL" => Some(Position::InjuredReserve),
            _ => None,
        }
    }

    /// Return the display string for this position.
    pub fn display_str(&self) -> &'static str {
        match self {
            Position::Quarterback => "QB",
            Position::RunningBack => "RB",
            Position::WideReceiver => "WR",
            Position::TightEnd => "TE",
            Position::Flex => "FLEX",
            Position::Kicker => "K",
            Position::Defense => "DST",
            Position::Bench => "BE",
            Position::InjuredReserve => "IR",
        }
    }

    /// Whether a player at this position may occupy a FLEX slot.
    pub fn is_flex_eligible(&self) -> bool {
        matches!(
            self,
            Position::RunningBack | Position::WideReceiver | Position::TightEnd
        )
    }

    /// Whether this is a meta-slot rather than a concrete playing position.
    pub fn is_meta_slot(&self) -> bool {
        matches!(
            self,
            Position::Flex | Position::Bench | Position::InjuredReserve
        )
    }

    /// Deterministic ordering index for roster slot display.
    pub fn sort_order(&self) -> u8 {
        match self {
            Position::Quarterback => 0,
            Position::RunningBack => 1,
            Position::WideReceiver => 2,
            Position::TightEnd => 3,
            Position::Flex => 4,
            Position::Kicker => 5,
            Position::Defense => 6,
            Position::Bench => 7,
            Position::InjuredReserve => 8,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

/// A player occupying a roster slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosteredPlayer {
    pub player_id: String,
    pub name: String,
    /// The player's own position (never a meta-slot).
    pub position: Position,
    /// Salary committed to this player.
    pub price: u32,
}

/// A single slot on a team's roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterSlot {
    /// The position designation of this slot.
    pub position: Position,
    /// The player occupying this slot, if any.
    pub player: Option<RosteredPlayer>,
}

/// The state of one team's roster at a point in time.
///
/// Snapshots are read fresh from the store immediately before each
/// settlement decision, never cached from selection time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterSnapshot {
    pub team_id: String,
    pub slots: Vec<RosterSlot>,
    /// Per-team salary cap from the league config.
    pub salary_cap: u32,
}

impl RosterSnapshot {
    /// Create an empty roster from a config mapping position strings to slot
    /// counts, e.g. `{"QB": 1, "RB": 2, "WR": 2, "FLEX": 1, "BE": 6, "IR": 2}`.
    ///
    /// Slots are created in deterministic order based on `Position::sort_order()`.
    pub fn new(team_id: &str, roster_config: &HashMap<String, usize>, salary_cap: u32) -> Self {
        let mut slots: Vec<RosterSlot> = Vec::new();

        for (pos_str, &count) in roster_config {
            if let Some(pos) = Position::from_str_pos(pos_str) {
                for _ in 0..count {
                    slots.push(RosterSlot {
                        position: pos,
                        player: None,
                    });
                }
            }
        }

        slots.sort_by_key(|s| s.position.sort_order());

        RosterSnapshot {
            team_id: team_id.to_string(),
            slots,
            salary_cap,
        }
    }

    /// Total salary committed across occupied slots.
    ///
    /// InjuredReserve slots are excluded: IR players do not consume cap space.
    pub fn spent(&self) -> u32 {
        self.slots
            .iter()
            .filter(|s| s.position != Position::InjuredReserve)
            .filter_map(|s| s.player.as_ref())
            .map(|p| p.price)
            .sum()
    }

    /// Remaining cap space.
    pub fn cap_space(&self) -> u32 {
        self.salary_cap.saturating_sub(self.spent())
    }

    /// Whether the given player occupies any slot on this roster.
    pub fn contains(&self, player_id: &str) -> bool {
        self.slots
            .iter()
            .filter_map(|s| s.player.as_ref())
            .any(|p| p.player_id == player_id)
    }

    /// Whether the given player occupies an *active* (non-IR) slot.
    ///
    /// Release declarations must name active players; an IR stash cannot be
    /// dropped to make roster room.
    pub fn active_contains(&self, player_id: &str) -> bool {
        self.slots
            .iter()
            .filter(|s| s.position != Position::InjuredReserve)
            .filter_map(|s| s.player.as_ref())
            .any(|p| p.player_id == player_id)
    }

    /// Player ids occupying active (non-IR) slots.
    pub fn active_player_ids(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter(|s| s.position != Position::InjuredReserve)
            .filter_map(|s| s.player.as_ref())
            .map(|p| p.player_id.clone())
            .collect()
    }

    /// Number of occupied slots.
    pub fn filled_count(&self) -> usize {
        self.slots.iter().filter(|s| s.player.is_some()).count()
    }

    /// Find the index of the slot a player at `pos` would occupy, or `None`
    /// if the roster has no room.
    ///
    /// Slot assignment priority:
    /// 1. Dedicated position slot (exact match)
    /// 2. FLEX slot (flex-eligible positions only)
    /// 3. Bench (BE) slot
    pub fn slot_for(&self, pos: Position) -> Option<usize> {
        if let Some(idx) = self
            .slots
            .iter()
            .position(|s| s.position == pos && s.player.is_none())
        {
            return Some(idx);
        }

        if pos.is_flex_eligible() {
            if let Some(idx) = self
                .slots
                .iter()
                .position(|s| s.position == Position::Flex && s.player.is_none())
            {
                return Some(idx);
            }
        }

        self.slots
            .iter()
            .position(|s| s.position == Position::Bench && s.player.is_none())
    }

    /// Remove a player from the roster, returning the vacated entry.
    pub fn remove(&mut self, player_id: &str) -> Option<RosteredPlayer> {
        for slot in &mut self.slots {
            if slot
                .player
                .as_ref()
                .is_some_and(|p| p.player_id == player_id)
            {
                return slot.player.take();
            }
        }
        None
    }

    /// Place a player on the roster, returning the slot index used.
    /// Returns `None` (and leaves the roster unchanged) when full.
    pub fn add(&mut self, player: RosteredPlayer) -> Option<usize> {
        let idx = self.slot_for(player.position)?;
        self.slots[idx].player = Some(player);
        Some(idx)
    }

    /// Whether the roster would have a slot for a player at `pos` after
    /// dropping the declared release players. Read-only; works on a clone.
    pub fn has_room_after_releases(&self, pos: Position, releases: &[String]) -> bool {
        let mut trial = self.clone();
        for player_id in releases {
            trial.remove(player_id);
        }
        trial.slot_for(pos).is_some()
    }

    /// Cap space after refunding the declared release players' salaries.
    pub fn cap_space_after_releases(&self, releases: &[String]) -> u32 {
        let mut trial = self.clone();
        for player_id in releases {
            trial.remove(player_id);
        }
        trial.cap_space()
    }
}
