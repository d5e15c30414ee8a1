use std::fmt;

use railgrid_engine::SpaceError;
use railgrid_gate::AuthRejected;

/// Per-request errors surfaced to the transport layer.
///
/// None of these affect other sessions or the server process; the
/// transport reports them to the remote client and carries on.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestError {
    /// Address-space or subscription error.
    Space(SpaceError),
    /// The gate refused the presented identity.
    Rejected(AuthRejected),
    /// The server is shutting down; no new work is accepted.
    ServerStopped,
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Space(e) => write!(f, "{e}"),
            Self::Rejected(e) => write!(f, "{e}"),
            Self::ServerStopped => write!(f, "server is shutting down"),
        }
    }
}

impl std::error::Error for RequestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Space(e) => Some(e),
            Self::Rejected(e) => Some(e),
            Self::ServerStopped => None,
        }
    }
}

impl From<SpaceError> for RequestError {
    fn from(e: SpaceError) -> Self {
        Self::Space(e)
    }
}

impl From<AuthRejected> for RequestError {
    fn from(e: AuthRejected) -> Self {
        Self::Rejected(e)
    }
}
