use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ShipmentId, UserId};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    query::{Comparison, FieldKind, FieldValue, ShipmentField, ShipmentFilter, ShipmentQuery, SortDirection, SortKey},
    shipment::{Address, PackageDetails, ParseEnumError, Shipment, StatusEntry, TrackingId},
    store::{ShipmentStore, ShipmentUpdate, UserStore},
    user::User,
    validation::Validate,
};

const USER_COLUMNS: &str = "id, name, email, password_hash, role::text AS role, created_at";

const SHIPMENT_COLUMNS: &str = "id, tracking_id, user_id, amount, source, destination, \
     package_details, status::text AS status, updated_status, \
     payment_status::text AS payment_status, shipment_type::text AS shipment_type, \
     created_at, updated_at";

/// PostgreSQL-backed document store.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` with a default-sized pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_user(row: PgRow) -> Result<User> {
        let id: Uuid = row.try_get("id")?;
        let role: String = row.try_get("role")?;

        Ok(User {
            id: UserId::from_uuid(id),
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            role: parse_label(id, &role)?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_shipment(row: PgRow) -> Result<Shipment> {
        let id: Uuid = row.try_get("id")?;
        let status: String = row.try_get("status")?;
        let payment_status: String = row.try_get("payment_status")?;
        let shipment_type: String = row.try_get("shipment_type")?;

        Ok(Shipment {
            id: ShipmentId::from_uuid(id),
            tracking_id: TrackingId::new(row.try_get::<String, _>("tracking_id")?),
            user: UserId::from_uuid(row.try_get("user_id")?),
            amount: row.try_get("amount")?,
            source: row.try_get::<Json<Address>, _>("source")?.0,
            destination: row.try_get::<Json<Address>, _>("destination")?.0,
            package_details: row.try_get::<Json<PackageDetails>, _>("package_details")?.0,
            status: parse_label(id, &status)?,
            updated_status: row
                .try_get::<Json<Vec<StatusEntry>>, _>("updated_status")?
                .0,
            payment_status: parse_label(id, &payment_status)?,
            shipment_type: parse_label(id, &shipment_type)?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

fn parse_label<T>(id: Uuid, raw: &str) -> Result<T>
where
    T: FromStr<Err = ParseEnumError>,
{
    raw.parse().map_err(|e: ParseEnumError| StoreError::Corrupt {
        id: id.to_string(),
        reason: e.to_string(),
    })
}

/// Maps a unique-constraint violation on `constraint` to `DuplicateKey`.
fn unique_violation(e: sqlx::Error, constraint: &str, field: &'static str, value: &str) -> StoreError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.constraint() == Some(constraint) => {
            StoreError::DuplicateKey {
                field,
                value: value.to_string(),
            }
        }
        _ => StoreError::Database(e),
    }
}

/// Parameter value collected while building dynamic SQL.
#[derive(Debug, Clone, PartialEq)]
enum BindValue {
    Text(String),
    Number(f64),
    BigInt(i64),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
    TextList(Vec<String>),
    NumberList(Vec<f64>),
    TimestampList(Vec<DateTime<Utc>>),
    UuidList(Vec<Uuid>),
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    binds: Vec<BindValue>,
) -> Query<'q, Postgres, PgArguments> {
    for value in binds {
        query = match value {
            BindValue::Text(v) => query.bind(v),
            BindValue::Number(v) => query.bind(v),
            BindValue::BigInt(v) => query.bind(v),
            BindValue::Timestamp(v) => query.bind(v),
            BindValue::Uuid(v) => query.bind(v),
            BindValue::TextList(v) => query.bind(v),
            BindValue::NumberList(v) => query.bind(v),
            BindValue::TimestampList(v) => query.bind(v),
            BindValue::UuidList(v) => query.bind(v),
        };
    }
    query
}

/// SQL expression reading `field`. Text fields compare bytewise, matching the
/// in-memory store. Enum columns are qualified so `ORDER BY` sorts the stored
/// enum rather than the `::text` output alias.
fn column_expr(field: ShipmentField) -> &'static str {
    match field {
        ShipmentField::TrackingId => r#"tracking_id COLLATE "C""#,
        ShipmentField::User => "user_id",
        ShipmentField::Amount => "amount",
        ShipmentField::Status => "shipments.status",
        ShipmentField::PaymentStatus => "shipments.payment_status",
        ShipmentField::ShipmentType => "shipments.shipment_type",
        ShipmentField::CreatedAt => "created_at",
        ShipmentField::UpdatedAt => "updated_at",
        ShipmentField::SourceAddress => r#"(source->>'address') COLLATE "C""#,
        ShipmentField::SourceCity => r#"(source->>'city') COLLATE "C""#,
        ShipmentField::SourceState => r#"(source->>'state') COLLATE "C""#,
        ShipmentField::SourceCountry => r#"(source->>'country') COLLATE "C""#,
        ShipmentField::DestinationAddress => r#"(destination->>'address') COLLATE "C""#,
        ShipmentField::DestinationCity => r#"(destination->>'city') COLLATE "C""#,
        ShipmentField::DestinationState => r#"(destination->>'state') COLLATE "C""#,
        ShipmentField::DestinationCountry => r#"(destination->>'country') COLLATE "C""#,
        ShipmentField::PackageWeight => "(package_details->>'weight')::double precision",
        ShipmentField::PackageLength => {
            "(package_details->'dimensions'->>'length')::double precision"
        }
        ShipmentField::PackageWidth => "(package_details->'dimensions'->>'width')::double precision",
        ShipmentField::PackageHeight => {
            "(package_details->'dimensions'->>'height')::double precision"
        }
        ShipmentField::PackageDescription => {
            r#"(package_details->>'description') COLLATE "C""#
        }
    }
}

/// Postgres enum type backing `field`, if any.
fn enum_type(field: ShipmentField) -> Option<&'static str> {
    match field.kind() {
        FieldKind::Status => Some("shipment_status"),
        FieldKind::PaymentStatus => Some("payment_status"),
        FieldKind::ShipmentType => Some("shipment_type"),
        _ => None,
    }
}

fn label(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Text(v) => Some(v.clone()),
        FieldValue::Status(v) => Some(v.as_str().to_string()),
        FieldValue::PaymentStatus(v) => Some(v.as_str().to_string()),
        FieldValue::ShipmentType(v) => Some(v.as_str().to_string()),
        _ => None,
    }
}

fn scalar_bind(value: &FieldValue) -> BindValue {
    match value {
        FieldValue::Number(v) => BindValue::Number(*v),
        FieldValue::Timestamp(v) => BindValue::Timestamp(*v),
        FieldValue::User(v) => BindValue::Uuid(v.as_uuid()),
        other => BindValue::Text(label(other).unwrap_or_default()),
    }
}

fn list_bind(kind: FieldKind, values: &[FieldValue]) -> BindValue {
    match kind {
        FieldKind::Number => BindValue::NumberList(
            values
                .iter()
                .filter_map(|v| match v {
                    FieldValue::Number(n) => Some(*n),
                    _ => None,
                })
                .collect(),
        ),
        FieldKind::Timestamp => BindValue::TimestampList(
            values
                .iter()
                .filter_map(|v| match v {
                    FieldValue::Timestamp(t) => Some(*t),
                    _ => None,
                })
                .collect(),
        ),
        FieldKind::User => BindValue::UuidList(
            values
                .iter()
                .filter_map(|v| match v {
                    FieldValue::User(u) => Some(u.as_uuid()),
                    _ => None,
                })
                .collect(),
        ),
        _ => BindValue::TextList(values.iter().filter_map(label).collect()),
    }
}

/// Appends a `WHERE` clause for `filter`, pushing parameters onto `binds`.
fn push_where(sql: &mut String, filter: &ShipmentFilter, binds: &mut Vec<BindValue>) {
    sql.push_str(" WHERE 1=1");

    for predicate in filter.predicates() {
        let field = predicate.field;
        let column = column_expr(field);
        let cast = enum_type(field).map(|t| format!("::{t}")).unwrap_or_default();

        let (op, value) = match &predicate.comparison {
            Comparison::In(values) => {
                let values: Vec<FieldValue> = values
                    .iter()
                    .filter(|v| v.kind() == field.kind())
                    .cloned()
                    .collect();
                binds.push(list_bind(field.kind(), &values));
                let array_cast = if cast.is_empty() { String::new() } else { format!("{cast}[]") };
                sql.push_str(&format!(" AND {column} = ANY(${}{array_cast})", binds.len()));
                continue;
            }
            Comparison::Eq(v) => ("=", v),
            Comparison::Gt(v) => (">", v),
            Comparison::Gte(v) => (">=", v),
            Comparison::Lt(v) => ("<", v),
            Comparison::Lte(v) => ("<=", v),
        };

        // A value of another type can never match
        if value.kind() != field.kind() {
            sql.push_str(" AND FALSE");
            continue;
        }

        binds.push(scalar_bind(value));
        sql.push_str(&format!(" AND {column} {op} ${}{cast}", binds.len()));
    }
}

fn push_order_by(sql: &mut String, sort: &[SortKey]) {
    if sort.is_empty() {
        sql.push_str(" ORDER BY created_at ASC, id ASC");
        return;
    }

    let keys: Vec<String> = sort
        .iter()
        .map(|key| {
            let direction = match key.direction {
                SortDirection::Ascending => "ASC NULLS FIRST",
                SortDirection::Descending => "DESC NULLS LAST",
            };
            format!("{} {direction}", column_expr(key.field))
        })
        .collect();
    sql.push_str(&format!(" ORDER BY {}, id ASC", keys.join(", ")));
}

#[async_trait]
impl UserStore for PostgresDocumentStore {
    async fn insert_user(&self, user: User) -> Result<User> {
        user.validate()?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, created_at)
            VALUES ($1, $2, $3, $4, $5::user_role, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id.as_uuid())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "users_email_key", "email", &user.email))?;

        Self::row_to_user(row)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_user).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_user).transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_user).collect()
    }
}

#[async_trait]
impl ShipmentStore for PostgresDocumentStore {
    async fn insert_shipment(&self, shipment: Shipment) -> Result<Shipment> {
        shipment.validate()?;

        // Timestamps come back truncated to the column's microsecond precision
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO shipments (id, tracking_id, user_id, amount, source, destination,
                                   package_details, status, updated_status, payment_status,
                                   shipment_type, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8::shipment_status, $9,
                    $10::payment_status, $11::shipment_type, $12, $13)
            RETURNING {SHIPMENT_COLUMNS}
            "#
        ))
        .bind(shipment.id.as_uuid())
        .bind(shipment.tracking_id.as_str())
        .bind(shipment.user.as_uuid())
        .bind(shipment.amount)
        .bind(Json(&shipment.source))
        .bind(Json(&shipment.destination))
        .bind(Json(&shipment.package_details))
        .bind(shipment.status.as_str())
        .bind(Json(&shipment.updated_status))
        .bind(shipment.payment_status.as_str())
        .bind(shipment.shipment_type.as_str())
        .bind(shipment.created_at)
        .bind(shipment.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            unique_violation(
                e,
                "shipments_tracking_id_key",
                "trackingId",
                shipment.tracking_id.as_str(),
            )
        })?;

        Self::row_to_shipment(row)
    }

    async fn find_shipment(&self, id: ShipmentId) -> Result<Option<Shipment>> {
        let row = sqlx::query(&format!(
            "SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_shipment).transpose()
    }

    async fn find_shipment_by_tracking_id(
        &self,
        tracking_id: &TrackingId,
    ) -> Result<Option<Shipment>> {
        let row = sqlx::query(&format!(
            "SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE tracking_id = $1"
        ))
        .bind(tracking_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_shipment).transpose()
    }

    async fn find_shipments(&self, query: ShipmentQuery) -> Result<Vec<Shipment>> {
        let mut binds = Vec::new();
        let mut sql = format!("SELECT {SHIPMENT_COLUMNS} FROM shipments");

        // Build dynamic query
        push_where(&mut sql, &query.filter, &mut binds);
        push_order_by(&mut sql, &query.sort);

        if let Some(limit) = query.limit {
            binds.push(BindValue::BigInt(i64::try_from(limit).unwrap_or(i64::MAX)));
            sql.push_str(&format!(" LIMIT ${}", binds.len()));
        }
        if let Some(offset) = query.offset {
            binds.push(BindValue::BigInt(i64::try_from(offset).unwrap_or(i64::MAX)));
            sql.push_str(&format!(" OFFSET ${}", binds.len()));
        }

        tracing::debug!(%sql, "querying shipments");
        let rows = bind_all(sqlx::query(&sql), binds)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::row_to_shipment).collect()
    }

    async fn count_shipments(&self, filter: &ShipmentFilter) -> Result<u64> {
        let mut binds = Vec::new();
        let mut sql = String::from("SELECT COUNT(*) AS total FROM shipments");
        push_where(&mut sql, filter, &mut binds);

        let row = bind_all(sqlx::query(&sql), binds)
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = row.try_get("total")?;
        Ok(total.max(0) as u64)
    }

    async fn update_shipment(
        &self,
        id: ShipmentId,
        update: ShipmentUpdate,
    ) -> Result<Option<Shipment>> {
        update.validate()?;

        let status = update.status_change.as_ref().map(|e| e.status.as_str());
        let audit_entry = update
            .status_change
            .as_ref()
            .map(|entry| Json(vec![entry.clone()]));

        let row = sqlx::query(&format!(
            r#"
            UPDATE shipments
            SET status = COALESCE($2::shipment_status, status),
                updated_status = updated_status || COALESCE($3::jsonb, '[]'::jsonb),
                payment_status = COALESCE($4::payment_status, payment_status),
                amount = COALESCE($5, amount),
                updated_at = $6
            WHERE id = $1
            RETURNING {SHIPMENT_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(status)
        .bind(audit_entry)
        .bind(update.payment_status.map(|p| p.as_str()))
        .bind(update.amount)
        .bind(update.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_shipment).transpose()
    }

    async fn delete_shipment(&self, id: ShipmentId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM shipments WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shipment::ShipmentStatus;

    #[test]
    fn where_clause_numbers_parameters_in_order() {
        let owner = UserId::new();
        let filter = ShipmentFilter::for_owner(owner)
            .and(
                ShipmentField::Status,
                Comparison::Gte(FieldValue::Status(ShipmentStatus::InTransit)),
            )
            .and(
                ShipmentField::SourceCity,
                Comparison::In(vec![FieldValue::Text("Oakland".to_string())]),
            );

        let mut sql = String::new();
        let mut binds = Vec::new();
        push_where(&mut sql, &filter, &mut binds);

        assert_eq!(
            sql,
            r#" WHERE 1=1 AND user_id = $1 AND shipments.status >= $2::shipment_status AND (source->>'city') COLLATE "C" = ANY($3)"#
        );
        assert_eq!(binds.len(), 3);
        assert_eq!(binds[1], BindValue::Text("in-transit".to_string()));
        assert_eq!(binds[2], BindValue::TextList(vec!["Oakland".to_string()]));
    }

    #[test]
    fn enum_lists_are_cast_to_array_types() {
        let filter = ShipmentFilter::new().and(
            ShipmentField::Status,
            Comparison::In(vec![
                FieldValue::Status(ShipmentStatus::Delivered),
                FieldValue::Status(ShipmentStatus::Cancelled),
            ]),
        );

        let mut sql = String::new();
        let mut binds = Vec::new();
        push_where(&mut sql, &filter, &mut binds);

        assert!(sql.ends_with("shipments.status = ANY($1::shipment_status[])"));
    }

    #[test]
    fn mismatched_value_kind_becomes_false() {
        let filter = ShipmentFilter::new().and(
            ShipmentField::Amount,
            Comparison::Eq(FieldValue::Text("ten".to_string())),
        );

        let mut sql = String::new();
        let mut binds = Vec::new();
        push_where(&mut sql, &filter, &mut binds);

        assert_eq!(sql, " WHERE 1=1 AND FALSE");
        assert!(binds.is_empty());
    }

    #[test]
    fn order_by_defaults_to_creation_then_id() {
        let mut sql = String::new();
        push_order_by(&mut sql, &[]);
        assert_eq!(sql, " ORDER BY created_at ASC, id ASC");

        let mut sql = String::new();
        push_order_by(&mut sql, &[SortKey::desc(ShipmentField::CreatedAt)]);
        assert_eq!(sql, " ORDER BY created_at DESC NULLS LAST, id ASC");
    }
}
