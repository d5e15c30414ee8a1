use std::fmt;

use railgrid_core::{NodeId, Role};

use crate::subscription::{MonitorHandle, SubscriptionId};

/// Errors from address-space and subscription operations.
///
/// Construction-time errors (`DuplicateId`, `ParentNotFound`) are fatal to
/// server startup; the rest are per-request errors recovered at the request
/// boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum SpaceError {
    /// The id is already taken.
    DuplicateId(NodeId),
    /// The named parent node does not exist.
    ParentNotFound(NodeId),
    /// No such node, or the node carries no value.
    NodeNotFound(NodeId),
    /// The variable's writability flag is off.
    NotWritable(NodeId),
    /// The requester's role lacks write capability.
    NotAuthorized { node: NodeId, role: Role },
    /// Unknown or already-deleted subscription.
    SubscriptionNotFound(SubscriptionId),
    /// Unknown monitor handle within an existing subscription.
    HandleNotFound {
        subscription: SubscriptionId,
        handle: MonitorHandle,
    },
}

impl fmt::Display for SpaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateId(id) => write!(f, "node id already exists: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent node not found: {id}"),
            Self::NodeNotFound(id) => write!(f, "node not found: {id}"),
            Self::NotWritable(id) => write!(f, "variable is not writable: {id}"),
            Self::NotAuthorized { node, role } => {
                write!(f, "role '{role}' may not write {node}")
            }
            Self::SubscriptionNotFound(sub) => {
                write!(f, "subscription not found: {sub}")
            }
            Self::HandleNotFound { subscription, handle } => {
                write!(f, "subscription {subscription}: no such handle {handle}")
            }
        }
    }
}

impl std::error::Error for SpaceError {}
