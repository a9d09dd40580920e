use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{HomeName, Location};

/// Messages delivered to a player outside of a direct request/response,
/// mostly from the delayed teleport path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Notice {
    /// A delayed teleport was armed
    DelayStarted { home: HomeName, delay_secs: u64 },

    /// The pending teleport was cancelled because the player moved
    DelayCancelledMoved,

    /// The player took damage recently and must wait
    DamageCooldown { remaining_secs: u64, cooldown_secs: u64 },

    /// The player arrived at the home
    Teleported { home: HomeName },

    /// The host refused the move
    TeleportFailed { home: HomeName },

    /// The home's world is not loaded
    WorldUnavailable { home: HomeName },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DelayStarted { home, delay_secs } => {
                write!(f, "Teleporting to home '{}' in {} seconds. Don't move!", home, delay_secs)
            }
            Self::DelayCancelledMoved => write!(f, "Teleport cancelled because you moved."),
            Self::DamageCooldown { remaining_secs, cooldown_secs } => {
                write!(
                    f,
                    "You took damage recently. Homes are locked for {}s after damage ({}s remaining).",
                    cooldown_secs, remaining_secs
                )
            }
            Self::Teleported { home } => write!(f, "Teleported to home '{}'.", home),
            Self::TeleportFailed { home } => write!(f, "Could not teleport to home '{}'.", home),
            Self::WorldUnavailable { home } => {
                write!(f, "The world of home '{}' is not available.", home)
            }
        }
    }
}

/// Commands sent FROM the game host TO the homeset server over the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BridgeCommand {
    /// Authenticate the bridge connection (first message when a token is configured)
    Identify { token: String },

    /// A player connected at the given location
    PlayerJoin { user_id: Uuid, location: Location },

    /// A player's position changed
    PlayerMove {
        user_id: Uuid,
        from: Location,
        to: Location,
    },

    /// A player took damage (final amount after reductions)
    PlayerDamage { user_id: Uuid, amount: f64 },

    /// A player disconnected
    PlayerQuit { user_id: Uuid },

    /// A world became available for teleports
    WorldLoaded { world: String },

    /// A world was unloaded
    WorldUnloaded { world: String },
}

/// Events sent FROM the homeset server TO the game host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BridgeEvent {
    /// Move the player to the location
    Teleport { user_id: Uuid, location: Location },

    /// Show a message to the player
    Notice {
        user_id: Uuid,
        message: String,
        notice: Notice,
    },
}

impl BridgeEvent {
    pub fn notice(user_id: Uuid, notice: Notice) -> Self {
        Self::Notice {
            user_id,
            message: notice.to_string(),
            notice,
        }
    }

    pub fn user_id(&self) -> Uuid {
        match self {
            Self::Teleport { user_id, .. } | Self::Notice { user_id, .. } => *user_id,
        }
    }
}
