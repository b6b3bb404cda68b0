pub mod link;
pub mod suspension;
pub mod tire;

pub use link::{BearingFriction, FrictionModel, Material, ShaftGeometry, TransmissionParams};
pub use suspension::{RigMeasurements, SuspensionModel, SuspensionParams, SuspensionState, SuspensionStep};
pub use tire::{SlipRegularisation, TireParams, magic_formula, slip_ratio, wheel_hub_velocity};
