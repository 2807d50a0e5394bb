//! Shipment service providing the shipment operations behind the HTTP routes.

use chrono::Utc;
use document_store::{
    ParseEnumError, PaymentStatus, Shipment, ShipmentId, ShipmentStatus, ShipmentStore,
    ShipmentStoreExt, ShipmentUpdate, StatusEntry, TrackingId, User, UserId, ValidationErrors,
};

use super::{PublicTracking, ShipmentDraft};
use crate::error::DomainError;
use crate::listing::{ListingPage, ListingRequest, Pagination};

/// Service for managing shipments.
///
/// Every mutation is a single atomic write through the store; there is no
/// read-modify-write across documents.
#[derive(Clone)]
pub struct ShipmentService<S: ShipmentStore> {
    store: S,
}

impl<S: ShipmentStore> ShipmentService<S> {
    /// Creates a new shipment service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates a shipment owned by `owner`.
    #[tracing::instrument(skip(self, draft))]
    pub async fn create(
        &self,
        owner: UserId,
        draft: ShipmentDraft,
    ) -> Result<Shipment, DomainError> {
        let shipment = draft.into_shipment(owner, Utc::now())?;
        let shipment = self.store.insert_shipment(shipment).await?;

        metrics::counter!("shipments_created_total").increment(1);
        tracing::info!(tracking_id = %shipment.tracking_id, "shipment created");
        Ok(shipment)
    }

    /// Lists the owner's shipments in creation order.
    #[tracing::instrument(skip(self))]
    pub async fn list_own(&self, owner: UserId) -> Result<Vec<Shipment>, DomainError> {
        Ok(self.store.shipments_for_owner(owner).await?)
    }

    /// Fetches one shipment for `caller`.
    ///
    /// Non-admin callers may only see their own shipments.
    #[tracing::instrument(skip(self, caller), fields(caller = %caller.id))]
    pub async fn get_for(&self, id: ShipmentId, caller: &User) -> Result<Shipment, DomainError> {
        let shipment = self.find(id).await?;

        if shipment.user != caller.id && !caller.is_admin() {
            return Err(DomainError::Forbidden(format!(
                "User {} is not authorized to access this shipment",
                caller.id
            )));
        }
        Ok(shipment)
    }

    /// Looks up a shipment by tracking id for unauthenticated callers.
    #[tracing::instrument(skip(self))]
    pub async fn track(&self, tracking_id: &str) -> Result<PublicTracking, DomainError> {
        let shipment = self
            .store
            .find_shipment_by_tracking_id(&TrackingId::new(tracking_id))
            .await?
            .ok_or_else(|| {
                DomainError::NotFound(format!(
                    "Shipment not found with tracking ID of {tracking_id}"
                ))
            })?;

        Ok(PublicTracking::from(&shipment))
    }

    /// Sets the status and appends it to the audit trail.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: ShipmentId,
        status: Option<&str>,
    ) -> Result<Shipment, DomainError> {
        let raw = non_empty(status)
            .ok_or_else(|| DomainError::BadRequest("Please provide a status".to_string()))?;

        if !self.store.shipment_exists(id).await? {
            return Err(DomainError::shipment_not_found(id));
        }
        let status: ShipmentStatus = raw.parse().map_err(enum_error("status"))?;

        let now = Utc::now();
        let update = ShipmentUpdate::at(now).status(StatusEntry::new(status, now));
        let shipment = self
            .store
            .update_shipment(id, update)
            .await?
            .ok_or_else(|| DomainError::shipment_not_found(id))?;

        metrics::counter!("shipment_status_updates_total", "status" => status.as_str())
            .increment(1);
        tracing::info!(%status, "shipment status updated");
        Ok(shipment)
    }

    /// Sets the payment status. No audit entry is written.
    #[tracing::instrument(skip(self))]
    pub async fn update_payment(
        &self,
        id: ShipmentId,
        payment_status: Option<&str>,
    ) -> Result<Shipment, DomainError> {
        let raw = non_empty(payment_status).ok_or_else(|| {
            DomainError::BadRequest("Please provide a payment status".to_string())
        })?;

        let payment_status: PaymentStatus = match raw.parse() {
            Ok(value) => value,
            Err(e) => {
                // A missing record takes precedence over a bad value
                if !self.store.shipment_exists(id).await? {
                    return Err(DomainError::shipment_not_found(id));
                }
                return Err(enum_error("paymentStatus")(e));
            }
        };

        self.store
            .update_shipment(id, ShipmentUpdate::at(Utc::now()).payment_status(payment_status))
            .await?
            .ok_or_else(|| DomainError::shipment_not_found(id))
    }

    /// Sets the amount. A missing amount only refreshes `updatedAt`.
    #[tracing::instrument(skip(self))]
    pub async fn update_amount(
        &self,
        id: ShipmentId,
        amount: Option<f64>,
    ) -> Result<Shipment, DomainError> {
        if amount.is_some_and(|a| !a.is_finite() || a < 0.0) {
            return Err(DomainError::BadRequest(
                "Please provide a valid amount".to_string(),
            ));
        }

        let mut update = ShipmentUpdate::at(Utc::now());
        if let Some(amount) = amount {
            update = update.amount(amount);
        }

        self.store
            .update_shipment(id, update)
            .await?
            .ok_or_else(|| DomainError::shipment_not_found(id))
    }

    /// Permanently removes a shipment.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: ShipmentId) -> Result<(), DomainError> {
        if !self.store.delete_shipment(id).await? {
            return Err(DomainError::shipment_not_found(id));
        }
        tracing::info!("shipment deleted");
        Ok(())
    }

    /// Runs an admin listing query: one page plus pagination links.
    #[tracing::instrument(skip(self, request))]
    pub async fn list_all(&self, request: &ListingRequest) -> Result<ListingPage, DomainError> {
        let total = self.store.count_shipments(request.filter()).await?;
        let shipments = self.store.find_shipments(request.to_query()).await?;

        let data = shipments
            .iter()
            .map(|s| request.projection().apply(s))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ListingPage {
            count: data.len(),
            pagination: Pagination::compute(request.page(), request.limit(), total),
            data,
        })
    }

    async fn find(&self, id: ShipmentId) -> Result<Shipment, DomainError> {
        self.store
            .find_shipment(id)
            .await?
            .ok_or_else(|| DomainError::shipment_not_found(id))
    }
}

/// Blank values count as missing; anything else is parsed exactly as sent.
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn enum_error(field: &'static str) -> impl Fn(ParseEnumError) -> DomainError {
    move |e| DomainError::Validation(ValidationErrors::single(field, e.to_string()))
}
