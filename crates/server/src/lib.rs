//! `railgrid-server` — the server session façade.
//!
//! Composition root for the address-space core: builds the fixed railway
//! address space, wires the access gate and the store→subscription change
//! path, and owns the start/run/shutdown lifecycle. The transport layer
//! drives everything through [`Server::connect`] and [`Session`]; no
//! network IO happens in this crate.

mod config;
mod error;
mod layout;
mod server;
mod session;

pub use config::{EndpointConfig, ServerConfig, DEFAULT_NAMESPACE_URI};
pub use error::RequestError;
pub use layout::{
    build_railway, RailwayNodes, DEV_VAR_ID, LEFT_LIGHTS_ID, LEFT_TURNOUT_ID, LIGHTS_ID,
    RIGHT_LIGHTS_ID, RIGHT_TURNOUT_ID, TURNOUTS_ID,
};
pub use server::{Server, ShutdownHandle};
pub use session::Session;
