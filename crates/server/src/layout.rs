//! The fixed railway address space built at startup.
//!
//! Numbering is part of the server's contract with remote clients:
//!
//! ```text
//! Objects
//! └── Railway                   (s=Railway)
//!     ├── Lights                (i=2000)
//!     │   ├── LeftLights        (i=2005)
//!     │   └── RightLights       (i=2006)
//!     └── Turnouts              (i=2001)
//!         ├── DevVar            (i=2002)
//!         ├── LeftTurnout       (i=2003)
//!         └── RightTurnout      (i=2004)
//! ```
//!
//! All variables are writable Int64 starting at 0.

use railgrid_core::{NodeId, Value};
use railgrid_engine::{AddressSpace, SpaceError};

pub const LIGHTS_ID: u32 = 2000;
pub const TURNOUTS_ID: u32 = 2001;
pub const DEV_VAR_ID: u32 = 2002;
pub const LEFT_TURNOUT_ID: u32 = 2003;
pub const RIGHT_TURNOUT_ID: u32 = 2004;
pub const LEFT_LIGHTS_ID: u32 = 2005;
pub const RIGHT_LIGHTS_ID: u32 = 2006;

/// Ids of the nodes the layout creates.
#[derive(Debug, Clone, PartialEq)]
pub struct RailwayNodes {
    pub railway: NodeId,
    pub lights: NodeId,
    pub turnouts: NodeId,
    pub dev_var: NodeId,
    pub left_turnout: NodeId,
    pub right_turnout: NodeId,
    pub left_lights: NodeId,
    pub right_lights: NodeId,
}

impl RailwayNodes {
    /// The five variables, in creation order.
    pub fn variables(&self) -> [&NodeId; 5] {
        [
            &self.dev_var,
            &self.left_turnout,
            &self.right_turnout,
            &self.left_lights,
            &self.right_lights,
        ]
    }
}

/// Build the railway tree in namespace `ns`. Any failure here is fatal to
/// startup: the server must not come up with a malformed address space.
pub fn build_railway(space: &mut AddressSpace, ns: u16) -> Result<RailwayNodes, SpaceError> {
    let railway = space.add_folder(ns, "Railway")?;

    let lights = space.add_object(&railway, NodeId::numeric(ns, LIGHTS_ID), "Lights")?;
    let turnouts = space.add_object(&railway, NodeId::numeric(ns, TURNOUTS_ID), "Turnouts")?;

    let zero = Value::Int(0);
    let dev_var =
        space.add_variable(&turnouts, NodeId::numeric(ns, DEV_VAR_ID), "DevVar", zero, true)?;
    let left_turnout = space.add_variable(
        &turnouts,
        NodeId::numeric(ns, LEFT_TURNOUT_ID),
        "LeftTurnout",
        zero,
        true,
    )?;
    let right_turnout = space.add_variable(
        &turnouts,
        NodeId::numeric(ns, RIGHT_TURNOUT_ID),
        "RightTurnout",
        zero,
        true,
    )?;
    let left_lights = space.add_variable(
        &lights,
        NodeId::numeric(ns, LEFT_LIGHTS_ID),
        "LeftLights",
        zero,
        true,
    )?;
    let right_lights = space.add_variable(
        &lights,
        NodeId::numeric(ns, RIGHT_LIGHTS_ID),
        "RightLights",
        zero,
        true,
    )?;

    Ok(RailwayNodes {
        railway,
        lights,
        turnouts,
        dev_var,
        left_turnout,
        right_turnout,
        left_lights,
        right_lights,
    })
}
