use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Name used when a request does not specify one.
pub const DEFAULT_HOME_NAME: &str = "default";

pub const MAX_HOME_NAME_LEN: usize = 32;

/// A world-relative pose: position plus look direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub yaw: f32,
    #[serde(default)]
    pub pitch: f32,
}

/// Integer block coordinates a location falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockPos {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl Location {
    pub fn block(&self) -> BlockPos {
        BlockPos {
            x: self.x.floor() as i64,
            y: self.y.floor() as i64,
            z: self.z.floor() as i64,
        }
    }

    /// True when `to` is in another world or another block than `self`.
    /// Look direction and movement inside a block are ignored.
    pub fn has_moved_blocks(&self, to: &Location) -> bool {
        self.world != to.world || self.block() != to.block()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid home name '{0}': use 1-32 letters, digits, '_' or '-'")]
pub struct InvalidHomeName(pub String);

/// A validated home name, always ASCII lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HomeName(String);

impl HomeName {
    pub fn parse(raw: &str) -> Result<Self, InvalidHomeName> {
        let normalized = raw.to_ascii_lowercase();
        let valid_len = (1..=MAX_HOME_NAME_LEN).contains(&normalized.len());
        let valid_chars = normalized
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

        if valid_len && valid_chars {
            Ok(Self(normalized))
        } else {
            Err(InvalidHomeName(raw.to_string()))
        }
    }

    /// Parse an optional argument, falling back to [`DEFAULT_HOME_NAME`].
    pub fn resolve(raw: Option<&str>) -> Result<Self, InvalidHomeName> {
        Self::parse(raw.unwrap_or(DEFAULT_HOME_NAME))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HomeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for HomeName {
    type Error = InvalidHomeName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<HomeName> for String {
    fn from(name: HomeName) -> Self {
        name.0
    }
}

/// A saved home. Identity is (owner, name).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Home {
    pub owner: Uuid,
    pub name: HomeName,
    pub location: Location,
    pub shared: bool,
}

/// What happened to a teleport request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TeleportOutcome {
    /// Moved right away (no delay configured).
    Teleported { home: HomeName },
    /// A delayed teleport was armed; the result arrives later as a notice.
    Scheduled { home: HomeName, delay_secs: u64 },
    /// The host refused the move.
    Failed { home: HomeName },
    /// The home's world is not loaded.
    WorldUnavailable { home: HomeName },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(world: &str, x: f64, y: f64, z: f64) -> Location {
        Location {
            world: world.to_string(),
            x,
            y,
            z,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    #[test]
    fn names_are_lowercased() {
        let name = HomeName::parse("Base_01").unwrap();
        assert_eq!(name.as_str(), "base_01");
    }

    #[test]
    fn invalid_names_rejected() {
        assert!(HomeName::parse("").is_err());
        assert!(HomeName::parse("has space").is_err());
        assert!(HomeName::parse("dot.name").is_err());
        assert!(HomeName::parse("집").is_err());
        assert!(HomeName::parse(&"a".repeat(33)).is_err());
        assert!(HomeName::parse(&"a".repeat(32)).is_ok());
    }

    #[test]
    fn missing_name_resolves_to_default() {
        assert_eq!(HomeName::resolve(None).unwrap().as_str(), DEFAULT_HOME_NAME);
        assert_eq!(HomeName::resolve(Some("Mine")).unwrap().as_str(), "mine");
    }

    #[test]
    fn deserializing_validates() {
        let ok: HomeName = serde_json::from_str("\"Farm\"").unwrap();
        assert_eq!(ok.as_str(), "farm");
        assert!(serde_json::from_str::<HomeName>("\"no way\"").is_err());
    }

    #[test]
    fn block_uses_floor_for_negatives() {
        let loc = at("world", -0.5, 64.99, 10.0);
        assert_eq!(loc.block(), BlockPos { x: -1, y: 64, z: 10 });
    }

    #[test]
    fn jitter_and_looking_around_is_not_movement() {
        let from = at("world", 10.1, 64.0, 10.1);
        let mut to = at("world", 10.9, 64.5, 10.7);
        to.yaw = 180.0;
        to.pitch = -45.0;
        assert!(!from.has_moved_blocks(&to));
    }

    #[test]
    fn block_boundary_or_world_change_is_movement() {
        let from = at("world", 10.9, 64.0, 10.0);
        assert!(from.has_moved_blocks(&at("world", 11.0, 64.0, 10.0)));
        assert!(from.has_moved_blocks(&at("world", 10.9, 63.9, 10.0)));
        assert!(from.has_moved_blocks(&at("world_nether", 10.9, 64.0, 10.0)));
    }
}
