//! Domain layer for the shipment tracking API.
//!
//! This crate provides:
//! - `ShipmentService` for creation, owner reads, admin mutations and public tracking
//! - `ListingRequest` turning admin query strings into typed store queries
//! - `AuthService` for signup, login, token verification and the admin check

pub mod auth;
pub mod error;
pub mod listing;
pub mod shipment;

pub use auth::{AuthService, Claims, LoginRequest, NewAccount, TokenError, TokenSigner};
pub use error::DomainError;
pub use listing::{ListingPage, ListingRequest, PageLink, Pagination, Projection};
pub use shipment::{PublicTracking, ShipmentDraft, ShipmentService, parse_shipment_id};
