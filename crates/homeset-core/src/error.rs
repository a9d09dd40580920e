use thiserror::Error;
use uuid::Uuid;

use homeset_types::models::{HomeName, InvalidHomeName};

/// Coarse classification used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Storage failed. Log it, show a generic message.
    Persistence,
    /// Home or user absent. An expected outcome.
    NotFound,
    /// Rejected before any write.
    Conflict,
    /// Teleports are locked after damage.
    Cooldown,
}

#[derive(Debug, Error)]
pub enum HomeError {
    /// The message is deliberately generic; the cause stays in the source chain.
    #[error("storage failure")]
    Persistence(#[from] anyhow::Error),

    #[error("home '{0}' not found")]
    NotFound(HomeName),

    #[error("user {0} is not online")]
    UserUnavailable(Uuid),

    #[error(transparent)]
    InvalidName(#[from] InvalidHomeName),

    #[error("home limit of {max} reached")]
    HomeLimitReached { max: u32 },

    #[error("shared home name '{0}' is already taken")]
    SharedNameTaken(HomeName),

    #[error("teleport locked after damage, {remaining_secs}s remaining")]
    CoolingDown {
        remaining_secs: u64,
        cooldown_secs: u64,
    },
}

impl HomeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Persistence(_) => ErrorKind::Persistence,
            Self::NotFound(_) | Self::UserUnavailable(_) => ErrorKind::NotFound,
            Self::InvalidName(_) | Self::HomeLimitReached { .. } | Self::SharedNameTaken(_) => {
                ErrorKind::Conflict
            }
            Self::CoolingDown { .. } => ErrorKind::Cooldown,
        }
    }
}
