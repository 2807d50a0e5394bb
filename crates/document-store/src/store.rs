use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ShipmentId, UserId};

use crate::query::{ShipmentFilter, ShipmentQuery};
use crate::shipment::{PaymentStatus, Shipment, StatusEntry, TrackingId};
use crate::user::User;
use crate::validation::{Validate, ValidationErrors};
use crate::Result;

/// Field changes applied to one shipment in a single atomic write.
///
/// `updated_at` is always written, even when no other field changes.
#[derive(Debug, Clone, PartialEq)]
pub struct ShipmentUpdate {
    /// New status; also appended to the audit trail in the same write.
    pub status_change: Option<StatusEntry>,

    /// New payment status.
    pub payment_status: Option<PaymentStatus>,

    /// New amount.
    pub amount: Option<f64>,

    /// Refreshed modification time.
    pub updated_at: DateTime<Utc>,
}

impl ShipmentUpdate {
    /// Creates an update that only refreshes `updated_at`.
    pub fn at(updated_at: DateTime<Utc>) -> Self {
        Self {
            status_change: None,
            payment_status: None,
            amount: None,
            updated_at,
        }
    }

    /// Sets the status and appends the audit entry.
    pub fn status(mut self, entry: StatusEntry) -> Self {
        self.status_change = Some(entry);
        self
    }

    /// Sets the payment status.
    pub fn payment_status(mut self, payment_status: PaymentStatus) -> Self {
        self.payment_status = Some(payment_status);
        self
    }

    /// Sets the amount.
    pub fn amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Applies the changes to an in-memory record.
    pub fn apply_to(&self, shipment: &mut Shipment) {
        if let Some(entry) = &self.status_change {
            shipment.status = entry.status;
            shipment.updated_status.push(entry.clone());
        }
        if let Some(payment_status) = self.payment_status {
            shipment.payment_status = payment_status;
        }
        if let Some(amount) = self.amount {
            shipment.amount = amount;
        }
        shipment.updated_at = self.updated_at;
    }
}

impl Validate for ShipmentUpdate {
    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(amount) = self.amount {
            errors.require_non_negative("amount", amount, "Amount must be a non-negative number");
        }
        errors.into_result()
    }
}

/// Persistence for user accounts.
///
/// Emails are unique; inserting a taken email fails with `DuplicateKey`.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Validates and inserts a new user.
    async fn insert_user(&self, user: User) -> Result<User>;

    /// Retrieves a user by id.
    async fn find_user(&self, id: UserId) -> Result<Option<User>>;

    /// Retrieves a user by (lower-cased) email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Lists every user in creation order.
    async fn list_users(&self) -> Result<Vec<User>>;
}

/// Persistence for shipments.
///
/// Tracking ids are unique; inserting a taken one fails with `DuplicateKey`.
#[async_trait]
pub trait ShipmentStore: Send + Sync {
    /// Validates and inserts a new shipment.
    async fn insert_shipment(&self, shipment: Shipment) -> Result<Shipment>;

    /// Retrieves a shipment by record id.
    async fn find_shipment(&self, id: ShipmentId) -> Result<Option<Shipment>>;

    /// Retrieves a shipment by its public tracking id.
    async fn find_shipment_by_tracking_id(
        &self,
        tracking_id: &TrackingId,
    ) -> Result<Option<Shipment>>;

    /// Retrieves shipments matching a query, sorted and windowed.
    async fn find_shipments(&self, query: ShipmentQuery) -> Result<Vec<Shipment>>;

    /// Counts shipments matching a filter.
    async fn count_shipments(&self, filter: &ShipmentFilter) -> Result<u64>;

    /// Validates and applies an update in one atomic single-document write.
    ///
    /// Returns `None` if no shipment has this id.
    async fn update_shipment(
        &self,
        id: ShipmentId,
        update: ShipmentUpdate,
    ) -> Result<Option<Shipment>>;

    /// Permanently removes a shipment. Returns false if it did not exist.
    async fn delete_shipment(&self, id: ShipmentId) -> Result<bool>;
}

/// A store holding both record types.
pub trait DocumentStore: UserStore + ShipmentStore {}

impl<T: UserStore + ShipmentStore + ?Sized> DocumentStore for T {}

/// Extension trait providing convenience methods for shipment stores.
#[async_trait]
pub trait ShipmentStoreExt: ShipmentStore {
    /// Checks if a shipment exists.
    async fn shipment_exists(&self, id: ShipmentId) -> Result<bool> {
        Ok(self.find_shipment(id).await?.is_some())
    }

    /// Lists one owner's shipments in creation order.
    async fn shipments_for_owner(&self, owner: UserId) -> Result<Vec<Shipment>> {
        self.find_shipments(ShipmentQuery::for_owner(owner)).await
    }
}

// Blanket implementation for all ShipmentStore implementations
impl<T: ShipmentStore + ?Sized> ShipmentStoreExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shipment::ShipmentStatus;
    use crate::shipment::fixtures::shipment;

    #[test]
    fn apply_sets_status_and_appends_audit_entry() {
        let mut s = shipment(UserId::new());
        let now = Utc::now();
        let update = ShipmentUpdate::at(now).status(StatusEntry::new(ShipmentStatus::InTransit, now));

        update.apply_to(&mut s);

        assert_eq!(s.status, ShipmentStatus::InTransit);
        assert_eq!(s.updated_status.len(), 1);
        assert_eq!(s.updated_status[0].status, ShipmentStatus::InTransit);
        assert_eq!(s.updated_at, now);
    }

    #[test]
    fn apply_without_changes_only_touches_updated_at() {
        let mut s = shipment(UserId::new());
        let before = s.clone();
        let later = s.updated_at + chrono::Duration::seconds(5);

        ShipmentUpdate::at(later).apply_to(&mut s);

        assert_eq!(s.amount, before.amount);
        assert_eq!(s.status, before.status);
        assert_eq!(s.payment_status, before.payment_status);
        assert_eq!(s.updated_at, later);
    }

    #[test]
    fn negative_amount_update_is_invalid() {
        let update = ShipmentUpdate::at(Utc::now()).amount(-1.0);
        assert!(update.validate().is_err());
        assert!(ShipmentUpdate::at(Utc::now()).amount(0.0).validate().is_ok());
    }
}
