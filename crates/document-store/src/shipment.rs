//! Shipment record and its enumerations.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use common::{ShipmentId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::{Validate, ValidationErrors};

/// Error returned when a label does not belong to an enumeration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`{value}` is not a valid {kind}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Lifecycle label of a shipment.
///
/// Variants are declared in business order, which is also the order used by
/// range comparisons in queries. Any status may follow any other.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "kebab-case")]
pub enum ShipmentStatus {
    #[default]
    OrderReceived,
    AwaitingPickup,
    PickedUp,
    InTransit,
    ArrivedAtSortingFacility,
    DepartedFromSortingFacility,
    OutForDelivery,
    Delivered,
    DeliveryAttempted,
    FailedDelivery,
    AddressIssue,
    HeldAtCustoms,
    Delayed,
    DamagedInTransit,
    ReturnInitiated,
    ReturnInTransit,
    ReturnReceived,
    RefundProcessed,
    Cancelled,
}

impl ShipmentStatus {
    /// Every status in business order.
    pub const ALL: [ShipmentStatus; 19] = [
        ShipmentStatus::OrderReceived,
        ShipmentStatus::AwaitingPickup,
        ShipmentStatus::PickedUp,
        ShipmentStatus::InTransit,
        ShipmentStatus::ArrivedAtSortingFacility,
        ShipmentStatus::DepartedFromSortingFacility,
        ShipmentStatus::OutForDelivery,
        ShipmentStatus::Delivered,
        ShipmentStatus::DeliveryAttempted,
        ShipmentStatus::FailedDelivery,
        ShipmentStatus::AddressIssue,
        ShipmentStatus::HeldAtCustoms,
        ShipmentStatus::Delayed,
        ShipmentStatus::DamagedInTransit,
        ShipmentStatus::ReturnInitiated,
        ShipmentStatus::ReturnInTransit,
        ShipmentStatus::ReturnReceived,
        ShipmentStatus::RefundProcessed,
        ShipmentStatus::Cancelled,
    ];

    /// Returns the wire label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::OrderReceived => "order-received",
            ShipmentStatus::AwaitingPickup => "awaiting-pickup",
            ShipmentStatus::PickedUp => "picked-up",
            ShipmentStatus::InTransit => "in-transit",
            ShipmentStatus::ArrivedAtSortingFacility => "arrived-at-sorting-facility",
            ShipmentStatus::DepartedFromSortingFacility => "departed-from-sorting-facility",
            ShipmentStatus::OutForDelivery => "out-for-delivery",
            ShipmentStatus::Delivered => "delivered",
            ShipmentStatus::DeliveryAttempted => "delivery-attempted",
            ShipmentStatus::FailedDelivery => "failed-delivery",
            ShipmentStatus::AddressIssue => "address-issue",
            ShipmentStatus::HeldAtCustoms => "held-at-customs",
            ShipmentStatus::Delayed => "delayed",
            ShipmentStatus::DamagedInTransit => "damaged-in-transit",
            ShipmentStatus::ReturnInitiated => "return-initiated",
            ShipmentStatus::ReturnInTransit => "return-in-transit",
            ShipmentStatus::ReturnReceived => "return-received",
            ShipmentStatus::RefundProcessed => "refund-processed",
            ShipmentStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ShipmentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("shipment status", s))
    }
}

/// Whether the shipment has been paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Successful,
}

impl PaymentStatus {
    /// Returns the wire label.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Successful => "successful",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "successful" => Ok(PaymentStatus::Successful),
            other => Err(ParseEnumError::new("payment status", other)),
        }
    }
}

/// Service level chosen at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShipmentType {
    Standard,
    Express,
}

impl ShipmentType {
    /// Returns the wire label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentType::Standard => "standard",
            ShipmentType::Express => "express",
        }
    }
}

impl std::fmt::Display for ShipmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ShipmentType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(ShipmentType::Standard),
            "express" => Ok(ShipmentType::Express),
            other => Err(ParseEnumError::new("shipment type", other)),
        }
    }
}

/// Short public identifier shown to customers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingId(String);

impl TrackingId {
    /// Length of a generated tracking id.
    pub const LEN: usize = 8;

    /// Generates a fresh id from the first eight hex digits of a UUIDv4.
    pub fn generate() -> Self {
        let simple = Uuid::new_v4().simple().to_string();
        Self(simple[..Self::LEN].to_uppercase())
    }

    /// Wraps an existing tracking id, e.g. one taken from a URL.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TrackingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Postal address tuple used for both ends of a shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
}

/// Package dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

/// Physical description of the parcel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDetails {
    pub weight: f64,
    pub dimensions: Dimensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One entry of the append-only status audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    #[serde(rename = "shipment")]
    pub status: ShipmentStatus,
    pub timestamp: DateTime<Utc>,
}

impl StatusEntry {
    /// Creates an entry stamped with `timestamp`.
    pub fn new(status: ShipmentStatus, timestamp: DateTime<Utc>) -> Self {
        Self { status, timestamp }
    }
}

/// A persisted shipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    pub id: ShipmentId,
    pub tracking_id: TrackingId,
    pub user: UserId,
    pub amount: f64,
    pub source: Address,
    pub destination: Address,
    pub package_details: PackageDetails,
    pub status: ShipmentStatus,
    pub updated_status: Vec<StatusEntry>,
    pub payment_status: PaymentStatus,
    pub shipment_type: ShipmentType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shipment {
    /// Builds a new shipment in its initial state with a fresh tracking id.
    pub fn new(
        owner: UserId,
        source: Address,
        destination: Address,
        package_details: PackageDetails,
        shipment_type: ShipmentType,
        amount: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ShipmentId::new(),
            tracking_id: TrackingId::generate(),
            user: owner,
            amount,
            source,
            destination,
            package_details,
            status: ShipmentStatus::default(),
            updated_status: Vec::new(),
            payment_status: PaymentStatus::default(),
            shipment_type,
            created_at: now,
            updated_at: now,
        }
    }
}

fn validate_address(errors: &mut ValidationErrors, side: &str, address: &Address) {
    errors.require_text(
        &format!("{side}.address"),
        &address.address,
        &format!("Please provide {side} address"),
    );
    errors.require_text(
        &format!("{side}.city"),
        &address.city,
        &format!("Please provide {side} city"),
    );
    errors.require_text(
        &format!("{side}.state"),
        &address.state,
        &format!("Please provide {side} state"),
    );
    errors.require_text(
        &format!("{side}.country"),
        &address.country,
        &format!("Please provide {side} country"),
    );
}

impl Validate for PackageDetails {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_non_negative(
            "packageDetails.weight",
            self.weight,
            "Package weight must be a non-negative number",
        );
        errors.require_non_negative(
            "packageDetails.dimensions.length",
            self.dimensions.length,
            "Package length must be a non-negative number",
        );
        errors.require_non_negative(
            "packageDetails.dimensions.width",
            self.dimensions.width,
            "Package width must be a non-negative number",
        );
        errors.require_non_negative(
            "packageDetails.dimensions.height",
            self.dimensions.height,
            "Package height must be a non-negative number",
        );
        errors.into_result()
    }
}

impl Validate for Shipment {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        errors.require_text("trackingId", self.tracking_id.as_str(), "Tracking ID is required");
        errors.require_non_negative("amount", self.amount, "Amount must be a non-negative number");
        validate_address(&mut errors, "source", &self.source);
        validate_address(&mut errors, "destination", &self.destination);
        if let Err(package_errors) = self.package_details.validate() {
            errors.extend(package_errors);
        }
        if self.updated_at < self.created_at {
            errors.push("updatedAt", "Update time cannot precede creation time");
        }

        errors.into_result()
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn new_shipment_starts_in_initial_state() {
        let shipment = shipment(UserId::new());

        assert_eq!(shipment.status, ShipmentStatus::OrderReceived);
        assert_eq!(shipment.payment_status, PaymentStatus::Pending);
        assert!(shipment.updated_status.is_empty());
        assert_eq!(shipment.created_at, shipment.updated_at);
    }

    #[test]
    fn tracking_id_is_eight_uppercase_hex_chars() {
        for _ in 0..50 {
            let id = TrackingId::generate();
            assert_eq!(id.as_str().len(), TrackingId::LEN);
            assert!(
                id.as_str()
                    .chars()
                    .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
            );
        }
    }

    #[test]
    fn status_labels_round_trip_through_from_str() {
        for status in ShipmentStatus::ALL {
            assert_eq!(status.as_str().parse::<ShipmentStatus>().unwrap(), status);
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn status_order_follows_the_lifecycle() {
        assert!(ShipmentStatus::OrderReceived < ShipmentStatus::InTransit);
        assert!(ShipmentStatus::InTransit < ShipmentStatus::Delivered);
        assert!(ShipmentStatus::RefundProcessed < ShipmentStatus::Cancelled);
    }

    #[test]
    fn unknown_labels_are_rejected() {
        let err = "teleported".parse::<ShipmentStatus>().unwrap_err();
        assert_eq!(err.to_string(), "`teleported` is not a valid shipment status");
        assert!("refunded".parse::<PaymentStatus>().is_err());
        assert!("overnight".parse::<ShipmentType>().is_err());
    }

    #[test]
    fn shipment_serializes_with_camel_case_keys() {
        let mut shipment = shipment(UserId::new());
        shipment
            .updated_status
            .push(StatusEntry::new(ShipmentStatus::InTransit, Utc::now()));

        let json = serde_json::to_value(&shipment).unwrap();
        assert_eq!(json["status"], "order-received");
        assert_eq!(json["paymentStatus"], "pending");
        assert_eq!(json["shipmentType"], "standard");
        assert_eq!(json["packageDetails"]["dimensions"]["length"], 30.0);
        assert_eq!(json["updatedStatus"][0]["shipment"], "in-transit");
        assert!(json["trackingId"].is_string());
    }

    #[test]
    fn validation_collects_every_blank_address_field() {
        let mut shipment = shipment(UserId::new());
        shipment.source.city = String::new();
        shipment.destination.country = " ".to_string();
        shipment.amount = -5.0;

        let errors = shipment.validate().unwrap_err();
        assert!(errors.has_field("source.city"));
        assert!(errors.has_field("destination.country"));
        assert!(errors.has_field("amount"));
        assert_eq!(errors.errors().len(), 3);
    }

    #[test]
    fn valid_shipment_passes_validation() {
        assert!(shipment(UserId::new()).validate().is_ok());
    }
}
