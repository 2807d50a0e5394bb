use chrono::{DateTime, Utc};
use document_store::{Address, PaymentStatus, Shipment, ShipmentId, ShipmentStatus, TrackingId};
use serde::Serialize;

/// Reduced view of a shipment served to unauthenticated callers.
///
/// Never carries the amount, package details or owner.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicTracking {
    pub id: ShipmentId,
    pub tracking_id: TrackingId,
    pub status: ShipmentStatus,
    pub payment: PaymentStatus,
    pub source: Address,
    pub destination: Address,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Shipment> for PublicTracking {
    fn from(shipment: &Shipment) -> Self {
        Self {
            id: shipment.id,
            tracking_id: shipment.tracking_id.clone(),
            status: shipment.status,
            payment: shipment.payment_status,
            source: shipment.source.clone(),
            destination: shipment.destination.clone(),
            created_at: shipment.created_at,
            updated_at: shipment.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use document_store::{Dimensions, PackageDetails, ShipmentType, UserId};

    #[test]
    fn projection_hides_private_fields() {
        let address = Address {
            address: "1 Dock Rd".to_string(),
            city: "Oakland".to_string(),
            state: "CA".to_string(),
            country: "US".to_string(),
        };
        let shipment = Shipment::new(
            UserId::new(),
            address.clone(),
            address,
            PackageDetails {
                weight: 1.0,
                dimensions: Dimensions {
                    length: 1.0,
                    width: 1.0,
                    height: 1.0,
                },
                description: None,
            },
            ShipmentType::Standard,
            99.0,
            Utc::now(),
        );

        let json = serde_json::to_value(PublicTracking::from(&shipment)).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();

        assert_eq!(json["payment"], "pending");
        assert_eq!(json["status"], "order-received");
        for hidden in ["amount", "packageDetails", "user", "updatedStatus", "paymentStatus"] {
            assert!(!keys.contains(&hidden), "{hidden} leaked");
        }
    }
}
