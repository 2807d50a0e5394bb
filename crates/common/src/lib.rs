//! Shared identifier types for the shipment tracking workspace.

mod types;

pub use types::{ShipmentId, UserId};
