use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use common::UserId;

use crate::shipment::{PaymentStatus, Shipment, ShipmentStatus, ShipmentType, TrackingId};

/// A queryable shipment field, addressed by its dotted JSON path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShipmentField {
    TrackingId,
    User,
    Amount,
    Status,
    PaymentStatus,
    ShipmentType,
    CreatedAt,
    UpdatedAt,
    SourceAddress,
    SourceCity,
    SourceState,
    SourceCountry,
    DestinationAddress,
    DestinationCity,
    DestinationState,
    DestinationCountry,
    PackageWeight,
    PackageLength,
    PackageWidth,
    PackageHeight,
    PackageDescription,
}

/// Value type of a field, used to parse raw query-string values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Timestamp,
    User,
    Status,
    PaymentStatus,
    ShipmentType,
}

impl ShipmentField {
    pub const ALL: [ShipmentField; 21] = [
        ShipmentField::TrackingId,
        ShipmentField::User,
        ShipmentField::Amount,
        ShipmentField::Status,
        ShipmentField::PaymentStatus,
        ShipmentField::ShipmentType,
        ShipmentField::CreatedAt,
        ShipmentField::UpdatedAt,
        ShipmentField::SourceAddress,
        ShipmentField::SourceCity,
        ShipmentField::SourceState,
        ShipmentField::SourceCountry,
        ShipmentField::DestinationAddress,
        ShipmentField::DestinationCity,
        ShipmentField::DestinationState,
        ShipmentField::DestinationCountry,
        ShipmentField::PackageWeight,
        ShipmentField::PackageLength,
        ShipmentField::PackageWidth,
        ShipmentField::PackageHeight,
        ShipmentField::PackageDescription,
    ];

    /// Returns the dotted JSON path of the field.
    pub fn path(&self) -> &'static str {
        match self {
            ShipmentField::TrackingId => "trackingId",
            ShipmentField::User => "user",
            ShipmentField::Amount => "amount",
            ShipmentField::Status => "status",
            ShipmentField::PaymentStatus => "paymentStatus",
            ShipmentField::ShipmentType => "shipmentType",
            ShipmentField::CreatedAt => "createdAt",
            ShipmentField::UpdatedAt => "updatedAt",
            ShipmentField::SourceAddress => "source.address",
            ShipmentField::SourceCity => "source.city",
            ShipmentField::SourceState => "source.state",
            ShipmentField::SourceCountry => "source.country",
            ShipmentField::DestinationAddress => "destination.address",
            ShipmentField::DestinationCity => "destination.city",
            ShipmentField::DestinationState => "destination.state",
            ShipmentField::DestinationCountry => "destination.country",
            ShipmentField::PackageWeight => "packageDetails.weight",
            ShipmentField::PackageLength => "packageDetails.dimensions.length",
            ShipmentField::PackageWidth => "packageDetails.dimensions.width",
            ShipmentField::PackageHeight => "packageDetails.dimensions.height",
            ShipmentField::PackageDescription => "packageDetails.description",
        }
    }

    /// Returns the value type of the field.
    pub fn kind(&self) -> FieldKind {
        match self {
            ShipmentField::User => FieldKind::User,
            ShipmentField::Status => FieldKind::Status,
            ShipmentField::PaymentStatus => FieldKind::PaymentStatus,
            ShipmentField::ShipmentType => FieldKind::ShipmentType,
            ShipmentField::CreatedAt | ShipmentField::UpdatedAt => FieldKind::Timestamp,
            ShipmentField::Amount
            | ShipmentField::PackageWeight
            | ShipmentField::PackageLength
            | ShipmentField::PackageWidth
            | ShipmentField::PackageHeight => FieldKind::Number,
            ShipmentField::TrackingId
            | ShipmentField::SourceAddress
            | ShipmentField::SourceCity
            | ShipmentField::SourceState
            | ShipmentField::SourceCountry
            | ShipmentField::DestinationAddress
            | ShipmentField::DestinationCity
            | ShipmentField::DestinationState
            | ShipmentField::DestinationCountry
            | ShipmentField::PackageDescription => FieldKind::Text,
        }
    }

    /// Reads the field from a shipment. Only an absent description yields `None`.
    pub fn value_of(&self, shipment: &Shipment) -> Option<FieldValue> {
        let value = match self {
            ShipmentField::TrackingId => FieldValue::Text(shipment.tracking_id.as_str().to_string()),
            ShipmentField::User => FieldValue::User(shipment.user),
            ShipmentField::Amount => FieldValue::Number(shipment.amount),
            ShipmentField::Status => FieldValue::Status(shipment.status),
            ShipmentField::PaymentStatus => FieldValue::PaymentStatus(shipment.payment_status),
            ShipmentField::ShipmentType => FieldValue::ShipmentType(shipment.shipment_type),
            ShipmentField::CreatedAt => FieldValue::Timestamp(shipment.created_at),
            ShipmentField::UpdatedAt => FieldValue::Timestamp(shipment.updated_at),
            ShipmentField::SourceAddress => FieldValue::Text(shipment.source.address.clone()),
            ShipmentField::SourceCity => FieldValue::Text(shipment.source.city.clone()),
            ShipmentField::SourceState => FieldValue::Text(shipment.source.state.clone()),
            ShipmentField::SourceCountry => FieldValue::Text(shipment.source.country.clone()),
            ShipmentField::DestinationAddress => {
                FieldValue::Text(shipment.destination.address.clone())
            }
            ShipmentField::DestinationCity => FieldValue::Text(shipment.destination.city.clone()),
            ShipmentField::DestinationState => FieldValue::Text(shipment.destination.state.clone()),
            ShipmentField::DestinationCountry => {
                FieldValue::Text(shipment.destination.country.clone())
            }
            ShipmentField::PackageWeight => FieldValue::Number(shipment.package_details.weight),
            ShipmentField::PackageLength => {
                FieldValue::Number(shipment.package_details.dimensions.length)
            }
            ShipmentField::PackageWidth => {
                FieldValue::Number(shipment.package_details.dimensions.width)
            }
            ShipmentField::PackageHeight => {
                FieldValue::Number(shipment.package_details.dimensions.height)
            }
            ShipmentField::PackageDescription => {
                FieldValue::Text(shipment.package_details.description.clone()?)
            }
        };
        Some(value)
    }
}

impl std::fmt::Display for ShipmentField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path())
    }
}

/// Error for a field path that names no queryable field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown field `{0}`")]
pub struct UnknownField(pub String);

impl FromStr for ShipmentField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|field| field.path() == s)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

/// Error for a raw value that does not parse as the field's type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid value `{value}` for {kind:?} field")]
pub struct InvalidValue {
    pub kind: FieldKind,
    pub value: String,
}

impl FieldKind {
    /// Parses a raw query-string value into a typed value of this kind.
    pub fn parse(&self, raw: &str) -> Result<FieldValue, InvalidValue> {
        let invalid = || InvalidValue {
            kind: *self,
            value: raw.to_string(),
        };
        match self {
            FieldKind::Text => Ok(FieldValue::Text(raw.to_string())),
            FieldKind::Number => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(FieldValue::Number)
                .ok_or_else(invalid),
            FieldKind::Timestamp => parse_timestamp(raw).map(FieldValue::Timestamp).ok_or_else(invalid),
            FieldKind::User => raw.parse::<UserId>().map(FieldValue::User).map_err(|_| invalid()),
            FieldKind::Status => raw
                .parse::<ShipmentStatus>()
                .map(FieldValue::Status)
                .map_err(|_| invalid()),
            FieldKind::PaymentStatus => raw
                .parse::<PaymentStatus>()
                .map(FieldValue::PaymentStatus)
                .map_err(|_| invalid()),
            FieldKind::ShipmentType => raw
                .parse::<ShipmentType>()
                .map(FieldValue::ShipmentType)
                .map_err(|_| invalid()),
        }
    }
}

/// Parses an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (UTC midnight).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// A typed field value.
///
/// Values only compare with values of the same variant; enumerations compare
/// by declaration order.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Timestamp(DateTime<Utc>),
    User(UserId),
    Status(ShipmentStatus),
    PaymentStatus(PaymentStatus),
    ShipmentType(ShipmentType),
}

impl FieldValue {
    /// Returns the kind this value belongs to.
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Text(_) => FieldKind::Text,
            FieldValue::Number(_) => FieldKind::Number,
            FieldValue::Timestamp(_) => FieldKind::Timestamp,
            FieldValue::User(_) => FieldKind::User,
            FieldValue::Status(_) => FieldKind::Status,
            FieldValue::PaymentStatus(_) => FieldKind::PaymentStatus,
            FieldValue::ShipmentType(_) => FieldKind::ShipmentType,
        }
    }
}

impl PartialOrd for FieldValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::Text(a), FieldValue::Text(b)) => a.partial_cmp(b),
            (FieldValue::Number(a), FieldValue::Number(b)) => a.partial_cmp(b),
            (FieldValue::Timestamp(a), FieldValue::Timestamp(b)) => a.partial_cmp(b),
            (FieldValue::User(a), FieldValue::User(b)) => a.partial_cmp(b),
            (FieldValue::Status(a), FieldValue::Status(b)) => a.partial_cmp(b),
            (FieldValue::PaymentStatus(a), FieldValue::PaymentStatus(b)) => a.partial_cmp(b),
            (FieldValue::ShipmentType(a), FieldValue::ShipmentType(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Comparison applied to a field.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    Eq(FieldValue),
    Gt(FieldValue),
    Gte(FieldValue),
    Lt(FieldValue),
    Lte(FieldValue),
    In(Vec<FieldValue>),
}

impl Comparison {
    /// Returns true if `actual` satisfies the comparison.
    pub fn matches(&self, actual: &FieldValue) -> bool {
        match self {
            Comparison::Eq(expected) => actual == expected,
            Comparison::Gt(bound) => actual.partial_cmp(bound) == Some(Ordering::Greater),
            Comparison::Gte(bound) => matches!(
                actual.partial_cmp(bound),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Comparison::Lt(bound) => actual.partial_cmp(bound) == Some(Ordering::Less),
            Comparison::Lte(bound) => matches!(
                actual.partial_cmp(bound),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Comparison::In(candidates) => candidates.iter().any(|c| c == actual),
        }
    }
}

/// A single field condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: ShipmentField,
    pub comparison: Comparison,
}

impl Predicate {
    /// Creates a predicate on `field`.
    pub fn new(field: ShipmentField, comparison: Comparison) -> Self {
        Self { field, comparison }
    }

    /// Returns true if the shipment satisfies the predicate.
    pub fn matches(&self, shipment: &Shipment) -> bool {
        self.field
            .value_of(shipment)
            .is_some_and(|actual| self.comparison.matches(&actual))
    }
}

/// Conjunction of predicates. An empty filter matches every shipment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShipmentFilter {
    predicates: Vec<Predicate>,
}

impl ShipmentFilter {
    /// Creates a filter that matches everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filter for shipments owned by `owner`.
    pub fn for_owner(owner: UserId) -> Self {
        Self::new().and(ShipmentField::User, Comparison::Eq(FieldValue::User(owner)))
    }

    /// Adds a predicate.
    pub fn and(mut self, field: ShipmentField, comparison: Comparison) -> Self {
        self.predicates.push(Predicate::new(field, comparison));
        self
    }

    /// Adds a predicate in place.
    pub fn push(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    /// Restricts to shipments created at or after `from`.
    pub fn created_from(self, from: DateTime<Utc>) -> Self {
        self.and(
            ShipmentField::CreatedAt,
            Comparison::Gte(FieldValue::Timestamp(from)),
        )
    }

    /// Restricts to shipments created at or before `until`.
    pub fn created_until(self, until: DateTime<Utc>) -> Self {
        self.and(
            ShipmentField::CreatedAt,
            Comparison::Lte(FieldValue::Timestamp(until)),
        )
    }

    /// Restricts to the shipment with this tracking id.
    pub fn tracking_id(self, tracking_id: &TrackingId) -> Self {
        self.and(
            ShipmentField::TrackingId,
            Comparison::Eq(FieldValue::Text(tracking_id.as_str().to_string())),
        )
    }

    /// Returns the predicates in insertion order.
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Returns true if the filter has no predicates.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Returns true if the shipment satisfies every predicate.
    pub fn matches(&self, shipment: &Shipment) -> bool {
        self.predicates.iter().all(|p| p.matches(shipment))
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// One sort key. Parses from `field` or `-field` (descending).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: ShipmentField,
    pub direction: SortDirection,
}

impl SortKey {
    /// Ascending order on `field`.
    pub fn asc(field: ShipmentField) -> Self {
        Self {
            field,
            direction: SortDirection::Ascending,
        }
    }

    /// Descending order on `field`.
    pub fn desc(field: ShipmentField) -> Self {
        Self {
            field,
            direction: SortDirection::Descending,
        }
    }

    /// Orders two shipments by this key. Absent values sort first.
    pub fn compare(&self, a: &Shipment, b: &Shipment) -> Ordering {
        let ordering = match (self.field.value_of(a), self.field.value_of(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        match self.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

impl FromStr for SortKey {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.strip_prefix('-') {
            Some(path) => path.parse().map(SortKey::desc),
            None => s.strip_prefix('+').unwrap_or(s).parse().map(SortKey::asc),
        }
    }
}

/// Builder for shipment queries: filter, sort order and page window.
///
/// With no sort keys, results come back in creation order. Ties are always
/// broken by record id so paging is stable.
#[derive(Debug, Clone, Default)]
pub struct ShipmentQuery {
    /// Conditions every returned shipment satisfies.
    pub filter: ShipmentFilter,

    /// Sort keys, most significant first.
    pub sort: Vec<SortKey>,

    /// Number of matching shipments to skip.
    pub offset: Option<usize>,

    /// Maximum number of shipments to return.
    pub limit: Option<usize>,
}

impl ShipmentQuery {
    /// Creates a query matching every shipment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for one owner's shipments.
    pub fn for_owner(owner: UserId) -> Self {
        Self {
            filter: ShipmentFilter::for_owner(owner),
            ..Default::default()
        }
    }

    /// Replaces the filter.
    pub fn filter(mut self, filter: ShipmentFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Appends a sort key.
    pub fn sort_by(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }

    /// Skips this many shipments before returning results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Limits the number of shipments returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Total order used to sort results: the sort keys, then creation time
    /// when no keys are given, then record id.
    pub fn compare(&self, a: &Shipment, b: &Shipment) -> Ordering {
        let keyed = if self.sort.is_empty() {
            a.created_at.cmp(&b.created_at)
        } else {
            self.sort
                .iter()
                .map(|key| key.compare(a, b))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        };
        keyed.then_with(|| a.id.cmp(&b.id))
    }
}
