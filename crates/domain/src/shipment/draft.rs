//! Request body accepted when creating a shipment.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use document_store::{
    Address, Dimensions, PackageDetails, ParseEnumError, PaymentStatus, Shipment,
    ShipmentStatus, ShipmentType, UserId, Validate, ValidationErrors,
};
use serde::Deserialize;

/// Address as submitted; missing parts are reported by validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AddressDraft {
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

impl AddressDraft {
    fn into_address(self) -> Address {
        Address {
            address: self.address.unwrap_or_default(),
            city: self.city.unwrap_or_default(),
            state: self.state.unwrap_or_default(),
            country: self.country.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DimensionsDraft {
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PackageDraft {
    pub weight: Option<f64>,
    pub dimensions: Option<DimensionsDraft>,
    pub description: Option<String>,
}

/// Shipment creation body.
///
/// `user`, `trackingId` and `updatedStatus` are not part of the draft, so
/// values sent for them are ignored. `status` and `paymentStatus` must name a
/// known label when present, but a new shipment always starts at
/// `order-received` and `pending`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShipmentDraft {
    pub source: Option<AddressDraft>,
    pub destination: Option<AddressDraft>,
    pub package_details: Option<PackageDraft>,
    pub shipment_type: Option<String>,
    pub amount: Option<f64>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
}

/// Records a validation error when `raw` is present but not a label of `T`.
fn check_label<T>(errors: &mut ValidationErrors, field: &str, raw: Option<&str>)
where
    T: FromStr<Err = ParseEnumError>,
{
    if let Some(Err(e)) = raw.map(str::parse::<T>) {
        errors.push(field, e.to_string());
    }
}

fn required_number(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<f64>,
    message: &str,
) -> f64 {
    value.unwrap_or_else(|| {
        errors.push(field, message);
        0.0
    })
}

impl ShipmentDraft {
    /// Builds a new shipment owned by `owner`, collecting every failed
    /// constraint into one error list.
    pub fn into_shipment(
        self,
        owner: UserId,
        now: DateTime<Utc>,
    ) -> Result<Shipment, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let package = self.package_details.unwrap_or_default();
        let dimensions = match package.dimensions {
            Some(d) => d,
            None => {
                errors.push(
                    "packageDetails.dimensions",
                    "Please provide package dimensions",
                );
                DimensionsDraft {
                    length: Some(0.0),
                    width: Some(0.0),
                    height: Some(0.0),
                }
            }
        };
        let package_details = PackageDetails {
            weight: required_number(
                &mut errors,
                "packageDetails.weight",
                package.weight,
                "Please provide package weight",
            ),
            dimensions: Dimensions {
                length: required_number(
                    &mut errors,
                    "packageDetails.dimensions.length",
                    dimensions.length,
                    "Please provide package length",
                ),
                width: required_number(
                    &mut errors,
                    "packageDetails.dimensions.width",
                    dimensions.width,
                    "Please provide package width",
                ),
                height: required_number(
                    &mut errors,
                    "packageDetails.dimensions.height",
                    dimensions.height,
                    "Please provide package height",
                ),
            },
            description: package.description.filter(|d| !d.trim().is_empty()),
        };

        let shipment_type: ShipmentType = match self.shipment_type.as_deref().map(str::trim) {
            None | Some("") => {
                errors.push("shipmentType", "Please provide shipment type");
                ShipmentType::Standard
            }
            Some(raw) => raw.parse().unwrap_or_else(|e: ParseEnumError| {
                errors.push("shipmentType", e.to_string());
                ShipmentType::Standard
            }),
        };

        check_label::<ShipmentStatus>(&mut errors, "status", self.status.as_deref());
        check_label::<PaymentStatus>(&mut errors, "paymentStatus", self.payment_status.as_deref());

        let shipment = Shipment::new(
            owner,
            self.source.unwrap_or_default().into_address(),
            self.destination.unwrap_or_default().into_address(),
            package_details,
            shipment_type,
            self.amount.unwrap_or(0.0),
            now,
        );

        if let Err(record_errors) = shipment.validate() {
            errors.extend(record_errors);
        }
        errors.into_result().map(|()| shipment)
    }
}
