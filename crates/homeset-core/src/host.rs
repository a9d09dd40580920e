use uuid::Uuid;

use homeset_types::events::Notice;
use homeset_types::models::{HomeName, Location, TeleportOutcome};

/// Result of asking the host to move a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveResult {
    Moved,
    /// The host refused or could not complete the move
    Refused,
    /// The target world is not loaded
    WorldUnavailable,
}

impl MoveResult {
    pub fn outcome(self, home: HomeName) -> TeleportOutcome {
        match self {
            Self::Moved => TeleportOutcome::Teleported { home },
            Self::Refused => TeleportOutcome::Failed { home },
            Self::WorldUnavailable => TeleportOutcome::WorldUnavailable { home },
        }
    }

    pub fn notice(self, home: HomeName) -> Notice {
        match self {
            Self::Moved => Notice::Teleported { home },
            Self::Refused => Notice::TeleportFailed { home },
            Self::WorldUnavailable => Notice::WorldUnavailable { home },
        }
    }
}

/// The game-side capabilities the core relies on. Implementations must be
/// cheap and non-blocking; they are called while handling requests and
/// from timer tasks.
pub trait HomeHost: Send + Sync {
    /// Current location of an online player, `None` when offline.
    fn location(&self, user: Uuid) -> Option<Location>;

    /// Attempt to move the player to `target`.
    fn teleport(&self, user: Uuid, target: &Location) -> MoveResult;

    /// Deliver a message to the player. Dropped if they are offline.
    fn notify(&self, user: Uuid, notice: Notice);
}

/// Decides who may create or keep shared homes.
pub trait SharingPolicy: Send + Sync {
    fn can_manage_shared_homes(&self, user: Uuid) -> bool;
}

impl<F> SharingPolicy for F
where
    F: Fn(Uuid) -> bool + Send + Sync,
{
    fn can_manage_shared_homes(&self, user: Uuid) -> bool {
        self(user)
    }
}
