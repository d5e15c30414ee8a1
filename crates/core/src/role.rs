//! Authorization roles granted to sessions.

use serde::{Deserialize, Serialize};

/// The authorization level a session operates with.
///
/// The role is decided once at connect time by the access gate and cached
/// on the session; every write re-checks it against the target variable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Granted by the open-access policy when no credentials are
    /// configured. Write-capable, mirroring that policy exactly.
    Anonymous,
    /// A credentialed account allowed to write variables.
    #[default]
    Operator,
    /// A credentialed read-only account.
    Observer,
}

impl Role {
    /// Whether this role may write writable variables.
    pub fn can_write(&self) -> bool {
        match self {
            Self::Anonymous | Self::Operator => true,
            Self::Observer => false,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anonymous => write!(f, "anonymous"),
            Self::Operator => write!(f, "operator"),
            Self::Observer => write!(f, "observer"),
        }
    }
}
