//! `railgrid-core` — shared vocabulary types for the address-space server.
//!
//! Pure data crate: node identity, typed values, authorization roles.
//! No IO, no engine logic.

pub mod node_id;
pub mod role;
pub mod value;

pub use node_id::{NodeClass, NodeId, NodeKey};
pub use role::Role;
pub use value::Value;
