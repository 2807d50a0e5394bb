//! Document storage for users and shipments.
//!
//! Two interchangeable backends implement [`UserStore`] and [`ShipmentStore`]:
//! [`InMemoryDocumentStore`] for tests and database-less runs, and
//! [`PostgresDocumentStore`] for production. Both validate every record
//! before writing it and enforce the same unique keys.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod shipment;
pub mod store;
pub mod user;
pub mod validation;

pub use common::{ShipmentId, UserId};
pub use error::{Result, StoreError};
pub use memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use query::{
    Comparison, FieldKind, FieldValue, InvalidValue, Predicate, ShipmentField, ShipmentFilter,
    ShipmentQuery, SortDirection, SortKey, UnknownField, parse_timestamp,
};
pub use shipment::{
    Address, Dimensions, PackageDetails, ParseEnumError, PaymentStatus, Shipment, ShipmentStatus,
    ShipmentType, StatusEntry, TrackingId,
};
pub use store::{DocumentStore, ShipmentStore, ShipmentStoreExt, ShipmentUpdate, UserStore};
pub use user::{Role, User, is_valid_email};
pub use validation::{FieldError, Validate, ValidationErrors};
