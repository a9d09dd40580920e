use std::collections::HashSet;

use anyhow::Context;
use uuid::Uuid;

use homeset_core::SharingPolicy;

pub const SHARE_MANAGERS_VAR: &str = "HOMESET_SHARE_MANAGERS";

/// Who may create or keep shared homes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SharePolicy {
    Everyone,
    Only(HashSet<Uuid>),
}

impl SharePolicy {
    /// `*` allows everyone; otherwise a comma-separated list of user ids.
    /// An empty list allows nobody.
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let raw = raw.trim();
        if raw == "*" {
            return Ok(Self::Everyone);
        }

        let mut managers = HashSet::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let id = Uuid::parse_str(part)
                .with_context(|| format!("invalid user id '{}' in {}", part, SHARE_MANAGERS_VAR))?;
            managers.insert(id);
        }
        Ok(Self::Only(managers))
    }

    /// Unset means everyone may share.
    pub fn from_env() -> anyhow::Result<Self> {
        match std::env::var(SHARE_MANAGERS_VAR) {
            Ok(raw) => Self::parse(&raw),
            Err(_) => Ok(Self::Everyone),
        }
    }
}

impl SharingPolicy for SharePolicy {
    fn can_manage_shared_homes(&self, user: Uuid) -> bool {
        match self {
            Self::Everyone => true,
            Self::Only(managers) => managers.contains(&user),
        }
    }
}
