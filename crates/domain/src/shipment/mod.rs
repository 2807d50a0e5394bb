//! Shipment creation, lookup, admin mutation and public tracking.

mod draft;
mod service;
mod tracking;

pub use draft::{AddressDraft, DimensionsDraft, PackageDraft, ShipmentDraft};
pub use service::ShipmentService;
pub use tracking::PublicTracking;

use document_store::ShipmentId;

use crate::error::DomainError;

/// Parses a shipment id taken from a URL path.
///
/// A value that is not a UUID cannot address any record, so it is reported
/// as not found.
pub fn parse_shipment_id(raw: &str) -> Result<ShipmentId, DomainError> {
    raw.parse()
        .map_err(|_| DomainError::shipment_not_found(raw))
}
