use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{ShipmentId, UserId};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    query::{ShipmentFilter, ShipmentQuery},
    shipment::{Shipment, TrackingId},
    store::{ShipmentStore, ShipmentUpdate, UserStore},
    user::User,
    validation::Validate,
};

/// In-memory document store.
///
/// Provides the same interface and constraints as the PostgreSQL
/// implementation; used by tests and when no database is configured.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    users: Arc<RwLock<HashMap<UserId, User>>>,
    shipments: Arc<RwLock<HashMap<ShipmentId, Shipment>>>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of shipments stored.
    pub async fn shipment_count(&self) -> usize {
        self.shipments.read().await.len()
    }

    /// Clears all users and shipments.
    pub async fn clear(&self) {
        self.users.write().await.clear();
        self.shipments.write().await.clear();
    }
}

#[async_trait]
impl UserStore for InMemoryDocumentStore {
    async fn insert_user(&self, user: User) -> Result<User> {
        user.validate()?;

        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateKey {
                field: "email",
                value: user.email,
            });
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let users = self.users.read().await;
        let mut all: Vec<_> = users.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(all)
    }
}

#[async_trait]
impl ShipmentStore for InMemoryDocumentStore {
    async fn insert_shipment(&self, shipment: Shipment) -> Result<Shipment> {
        shipment.validate()?;

        let mut shipments = self.shipments.write().await;
        if shipments
            .values()
            .any(|s| s.tracking_id == shipment.tracking_id)
        {
            return Err(StoreError::DuplicateKey {
                field: "trackingId",
                value: shipment.tracking_id.to_string(),
            });
        }
        shipments.insert(shipment.id, shipment.clone());
        Ok(shipment)
    }

    async fn find_shipment(&self, id: ShipmentId) -> Result<Option<Shipment>> {
        Ok(self.shipments.read().await.get(&id).cloned())
    }

    async fn find_shipment_by_tracking_id(
        &self,
        tracking_id: &TrackingId,
    ) -> Result<Option<Shipment>> {
        let shipments = self.shipments.read().await;
        Ok(shipments
            .values()
            .find(|s| &s.tracking_id == tracking_id)
            .cloned())
    }

    async fn find_shipments(&self, query: ShipmentQuery) -> Result<Vec<Shipment>> {
        let shipments = self.shipments.read().await;
        let mut matching: Vec<_> = shipments
            .values()
            .filter(|s| query.filter.matches(s))
            .cloned()
            .collect();

        matching.sort_by(|a, b| query.compare(a, b));

        // Apply offset and limit
        let offset = query.offset.unwrap_or(0);
        let window = matching.into_iter().skip(offset);
        let page = match query.limit {
            Some(limit) => window.take(limit).collect(),
            None => window.collect(),
        };

        Ok(page)
    }

    async fn count_shipments(&self, filter: &ShipmentFilter) -> Result<u64> {
        let shipments = self.shipments.read().await;
        let count = shipments.values().filter(|s| filter.matches(s)).count();
        Ok(count as u64)
    }

    async fn update_shipment(
        &self,
        id: ShipmentId,
        update: ShipmentUpdate,
    ) -> Result<Option<Shipment>> {
        update.validate()?;

        let mut shipments = self.shipments.write().await;
        let Some(stored) = shipments.get_mut(&id) else {
            return Ok(None);
        };

        let mut updated = stored.clone();
        update.apply_to(&mut updated);
        updated.validate()?;
        *stored = updated.clone();

        Ok(Some(updated))
    }

    async fn delete_shipment(&self, id: ShipmentId) -> Result<bool> {
        Ok(self.shipments.write().await.remove(&id).is_some())
    }
}
