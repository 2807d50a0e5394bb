//! Admin listing: query-string parsing into a typed shipment query, field
//! projection and pagination.
//!
//! Parameters other than the reserved ones are field filters of the form
//! `field=value` or `field[op]=value`:
//!
//! ```text
//! /api/admin/shipments?status[gte]=in-transit&source.city[in]=Oakland,Denver
//!     &sort=-amount,createdAt&page=2&limit=10&select=trackingId,status
//! ```

mod page;
mod projection;

pub use page::{ListingPage, PageLink, Pagination};
pub use projection::Projection;

use document_store::{
    Comparison, FieldValue, ShipmentField, ShipmentFilter, ShipmentQuery, SortKey, TrackingId,
    parse_timestamp,
};

use crate::error::DomainError;

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_LIMIT: usize = 25;

/// Comparison operator named inside the brackets of `field[op]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl Operator {
    fn parse(token: &str) -> Result<Self, DomainError> {
        match token {
            "gt" => Ok(Operator::Gt),
            "gte" => Ok(Operator::Gte),
            "lt" => Ok(Operator::Lt),
            "lte" => Ok(Operator::Lte),
            "in" => Ok(Operator::In),
            other => Err(DomainError::BadRequest(format!(
                "Unknown operator `{other}`"
            ))),
        }
    }
}

/// A parsed admin listing request.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRequest {
    filter: ShipmentFilter,
    sort: Vec<SortKey>,
    page: usize,
    limit: usize,
    projection: Projection,
}

impl Default for ListingRequest {
    fn default() -> Self {
        Self {
            filter: ShipmentFilter::new(),
            sort: vec![SortKey::desc(ShipmentField::CreatedAt)],
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            projection: Projection::All,
        }
    }
}

fn positive_or(raw: &str, default: usize) -> usize {
    raw.trim()
        .parse::<usize>()
        .ok()
        .filter(|n| *n > 0)
        .unwrap_or(default)
}

fn parse_bound(name: &str, raw: &str) -> Result<FieldValue, DomainError> {
    parse_timestamp(raw)
        .map(FieldValue::Timestamp)
        .ok_or_else(|| DomainError::BadRequest(format!("Invalid {name} `{raw}`")))
}

fn parse_value(field: ShipmentField, raw: &str) -> Result<FieldValue, DomainError> {
    field.kind().parse(raw).map_err(|_| {
        DomainError::BadRequest(format!("Invalid value `{raw}` for field `{field}`"))
    })
}

impl ListingRequest {
    /// Parses raw query-string pairs.
    ///
    /// `in` lists accept comma-separated values and repeated parameters for
    /// the same field merge into one list.
    pub fn from_params<I, K, V>(params: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut request = Self::default();
        let mut sort = Vec::new();
        let mut select = Vec::new();
        let mut in_lists: Vec<(ShipmentField, Vec<FieldValue>)> = Vec::new();

        for (key, value) in params {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "select" => select.push(value.to_string()),
                "sort" => {
                    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
                        let sort_key = entry.parse::<SortKey>().map_err(|_| {
                            DomainError::BadRequest(format!("Unknown sort field `{entry}`"))
                        })?;
                        sort.push(sort_key);
                    }
                }
                "page" => request.page = positive_or(value, DEFAULT_PAGE),
                "limit" => request.limit = positive_or(value, DEFAULT_LIMIT),
                "startDate" => {
                    let from = parse_bound("startDate", value)?;
                    request.filter = request
                        .filter
                        .and(ShipmentField::CreatedAt, Comparison::Gte(from));
                }
                "endDate" => {
                    let until = parse_bound("endDate", value)?;
                    request.filter = request
                        .filter
                        .and(ShipmentField::CreatedAt, Comparison::Lte(until));
                }
                "trackingId" => {
                    request.filter = request.filter.tracking_id(&TrackingId::new(value));
                }
                _ => {
                    let (path, operator) = split_operator(key)?;
                    let field = path.parse::<ShipmentField>().map_err(|_| {
                        DomainError::BadRequest(format!("Unknown field `{path}`"))
                    })?;

                    let comparison = match operator {
                        None => Comparison::Eq(parse_value(field, value)?),
                        Some(Operator::In) => {
                            let values = value
                                .split(',')
                                .map(str::trim)
                                .filter(|v| !v.is_empty())
                                .map(|v| parse_value(field, v))
                                .collect::<Result<Vec<_>, _>>()?;
                            match in_lists.iter_mut().find(|(f, _)| *f == field) {
                                Some((_, existing)) => existing.extend(values),
                                None => in_lists.push((field, values)),
                            }
                            continue;
                        }
                        Some(Operator::Gt) => Comparison::Gt(parse_value(field, value)?),
                        Some(Operator::Gte) => Comparison::Gte(parse_value(field, value)?),
                        Some(Operator::Lt) => Comparison::Lt(parse_value(field, value)?),
                        Some(Operator::Lte) => Comparison::Lte(parse_value(field, value)?),
                    };
                    request.filter = request.filter.and(field, comparison);
                }
            }
        }

        for (field, values) in in_lists {
            request.filter = request.filter.and(field, Comparison::In(values));
        }
        if !sort.is_empty() {
            request.sort = sort;
        }
        if !select.is_empty() {
            request.projection = Projection::parse(&select.join(","))?;
        }

        Ok(request)
    }

    /// Filter shared by the page query and the total count.
    pub fn filter(&self) -> &ShipmentFilter {
        &self.filter
    }

    pub fn sort(&self) -> &[SortKey] {
        &self.sort
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Index of the first record on the page.
    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Builds the store query for the requested page.
    pub fn to_query(&self) -> ShipmentQuery {
        let query = self
            .sort
            .iter()
            .fold(ShipmentQuery::new().filter(self.filter.clone()), |q, key| {
                q.sort_by(*key)
            });
        query.offset(self.offset()).limit(self.limit)
    }
}

/// Splits `field[op]` into the field path and operator.
fn split_operator(key: &str) -> Result<(&str, Option<Operator>), DomainError> {
    match key.split_once('[') {
        None => Ok((key, None)),
        Some((path, rest)) => {
            let token = rest.strip_suffix(']').ok_or_else(|| {
                DomainError::BadRequest(format!("Malformed filter parameter `{key}`"))
            })?;
            Ok((path, Some(Operator::parse(token)?)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use document_store::{Predicate, ShipmentStatus};

    fn parse(params: &[(&str, &str)]) -> Result<ListingRequest, DomainError> {
        ListingRequest::from_params(params.iter().copied())
    }

    #[test]
    fn defaults() {
        let request = parse(&[]).unwrap();
        assert_eq!(request.page(), 1);
        assert_eq!(request.limit(), 25);
        assert_eq!(request.sort(), &[SortKey::desc(ShipmentField::CreatedAt)]);
        assert!(request.filter().is_empty());
        assert_eq!(request.projection(), &Projection::All);
    }

    #[test]
    fn operators_map_to_typed_comparisons() {
        let request = parse(&[
            ("status[gte]", "in-transit"),
            ("amount[lt]", "100"),
            ("shipmentType", "express"),
        ])
        .unwrap();

        assert_eq!(
            request.filter().predicates(),
            &[
                Predicate::new(
                    ShipmentField::Status,
                    Comparison::Gte(FieldValue::Status(ShipmentStatus::InTransit))
                ),
                Predicate::new(
                    ShipmentField::Amount,
                    Comparison::Lt(FieldValue::Number(100.0))
                ),
                Predicate::new(
                    ShipmentField::ShipmentType,
                    Comparison::Eq(FieldValue::ShipmentType(
                        document_store::ShipmentType::Express
                    ))
                ),
            ]
        );
    }

    #[test]
    fn in_lists_merge_comma_and_repeated_values() {
        let request = parse(&[
            ("status[in]", "delivered,cancelled"),
            ("status[in]", "delayed"),
        ])
        .unwrap();

        assert_eq!(
            request.filter().predicates(),
            &[Predicate::new(
                ShipmentField::Status,
                Comparison::In(vec![
                    FieldValue::Status(ShipmentStatus::Delivered),
                    FieldValue::Status(ShipmentStatus::Cancelled),
                    FieldValue::Status(ShipmentStatus::Delayed),
                ])
            )]
        );
    }

    #[test]
    fn operator_words_in_values_are_left_alone() {
        let request = parse(&[("source.city", "gte")]).unwrap();
        assert_eq!(
            request.filter().predicates()[0].comparison,
            Comparison::Eq(FieldValue::Text("gte".to_string()))
        );
    }

    #[test]
    fn reserved_parameters_refine_the_filter() {
        let request = parse(&[
            ("startDate", "2024-01-01"),
            ("trackingId", "AB12CD34"),
            ("endDate", "2024-02-01T00:00:00Z"),
        ])
        .unwrap();

        let fields: Vec<ShipmentField> = request
            .filter()
            .predicates()
            .iter()
            .map(|p| p.field)
            .collect();
        assert_eq!(
            fields,
            vec![
                ShipmentField::CreatedAt,
                ShipmentField::TrackingId,
                ShipmentField::CreatedAt
            ]
        );
    }

    #[test]
    fn bad_pages_fall_back_to_defaults() {
        let request = parse(&[("page", "0"), ("limit", "ten")]).unwrap();
        assert_eq!((request.page(), request.limit()), (1, 25));

        let request = parse(&[("page", "3"), ("limit", "10")]).unwrap();
        assert_eq!(request.offset(), 20);
        let query = request.to_query();
        assert_eq!((query.offset, query.limit), (Some(20), Some(10)));
    }

    #[test]
    fn sort_list_parses_directions() {
        let request = parse(&[("sort", "-amount,createdAt")]).unwrap();
        assert_eq!(
            request.sort(),
            &[
                SortKey::desc(ShipmentField::Amount),
                SortKey::asc(ShipmentField::CreatedAt)
            ]
        );
    }

    #[test]
    fn invalid_input_is_a_bad_request() {
        for params in [
            vec![("password", "x")],
            vec![("status[regex]", "in")],
            vec![("status[gte", "in-transit")],
            vec![("status", "lost")],
            vec![("amount[gt]", "lots")],
            vec![("sort", "-nope")],
            vec![("startDate", "last week")],
            vec![("select", "status,-amount")],
        ] {
            let err = parse(&params).unwrap_err();
            assert!(matches!(err, DomainError::BadRequest(_)), "{params:?}");
        }
    }
}
