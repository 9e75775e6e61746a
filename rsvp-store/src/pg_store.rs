use async_trait::async_trait;
use rsvp_core::{Collection, ColumnType, Condition, DataStore, Filter, OrderBy, StoreError, StoreResult};
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::time::Duration;

/// Postgres-backed data store.
///
/// Every primitive is one SQL statement, so a filtered `update` is a
/// conditional write executed atomically by the database. Rows are read
/// back through `to_jsonb(t)`.
pub struct PgStore {
    pool: PgPool,
    acquire_timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, acquire_timeout: Duration) -> Self {
        Self { pool, acquire_timeout }
    }

    fn map_err(&self, e: sqlx::Error) -> StoreError {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return StoreError::Constraint {
                    message: db.message().to_string(),
                };
            }
        }

        match &e {
            sqlx::Error::PoolTimedOut => StoreError::Timeout { after: self.acquire_timeout },
            sqlx::Error::Decode(_) | sqlx::Error::ColumnDecode { .. } => StoreError::Decode { message: e.to_string() },
            _ => StoreError::Transport { message: e.to_string() },
        }
    }
}

// Values are bound as text and cast server-side to the column type.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn push_value(qb: &mut QueryBuilder<'static, Postgres>, ty: ColumnType, value: &Value) {
    qb.push_bind(scalar_text(value));
    qb.push("::");
    qb.push(ty.sql_name());
}

fn push_where(qb: &mut QueryBuilder<'static, Postgres>, collection: Collection, filter: &Filter) -> StoreResult<()> {
    for (i, condition) in filter.conditions.iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        match condition {
            Condition::Eq(column, Value::Null) | Condition::IsNull(column) => {
                collection.column(column)?;
                qb.push(column.as_str());
                qb.push(" IS NULL");
            }
            Condition::Eq(column, value) => {
                let ty = collection.column(column)?;
                qb.push(column.as_str());
                qb.push(" = ");
                push_value(qb, ty, value);
            }
        }
    }
    Ok(())
}

fn object<'a>(collection: Collection, value: &'a Value) -> StoreResult<&'a serde_json::Map<String, Value>> {
    value.as_object().ok_or_else(|| StoreError::InvalidQuery {
        message: format!("expected an object for {}", collection),
    })
}

pub(crate) fn select_query(
    collection: Collection,
    filter: &Filter,
    order: Option<&OrderBy>,
) -> StoreResult<QueryBuilder<'static, Postgres>> {
    let mut qb = QueryBuilder::new("SELECT to_jsonb(t) FROM ");
    qb.push(collection.table_name());
    qb.push(" AS t");
    push_where(&mut qb, collection, filter)?;

    if let Some(order) = order {
        collection.column(&order.column)?;
        qb.push(" ORDER BY ");
        qb.push(order.column.as_str());
        qb.push(if order.ascending { " ASC" } else { " DESC" });
    }

    Ok(qb)
}

pub(crate) fn insert_query(collection: Collection, row: &Value) -> StoreResult<QueryBuilder<'static, Postgres>> {
    let row = object(collection, row)?;

    let mut qb = QueryBuilder::new("INSERT INTO ");
    qb.push(collection.table_name());
    qb.push(" AS t");

    if row.is_empty() {
        qb.push(" DEFAULT VALUES");
    } else {
        let mut columns = Vec::with_capacity(row.len());
        for (column, value) in row {
            columns.push((column.as_str(), collection.column(column)?, value));
        }

        qb.push(" (");
        qb.push(columns.iter().map(|(column, _, _)| *column).collect::<Vec<_>>().join(", "));
        qb.push(") VALUES (");
        for (i, (_, ty, value)) in columns.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            push_value(&mut qb, *ty, value);
        }
        qb.push(")");
    }

    qb.push(" RETURNING to_jsonb(t)");
    Ok(qb)
}

pub(crate) fn update_query(
    collection: Collection,
    filter: &Filter,
    patch: &Value,
) -> StoreResult<QueryBuilder<'static, Postgres>> {
    let patch = object(collection, patch)?;
    if patch.is_empty() && !collection.has_updated_at() {
        return Err(StoreError::InvalidQuery {
            message: format!("empty patch for {}", collection),
        });
    }

    let mut qb = QueryBuilder::new("UPDATE ");
    qb.push(collection.table_name());
    qb.push(" AS t SET ");

    for (i, (column, value)) in patch.iter().enumerate() {
        let ty = collection.column(column)?;
        if i > 0 {
            qb.push(", ");
        }
        qb.push(column.as_str());
        qb.push(" = ");
        push_value(&mut qb, ty, value);
    }
    if collection.has_updated_at() {
        if !patch.is_empty() {
            qb.push(", ");
        }
        qb.push("updated_at = now()");
    }

    push_where(&mut qb, collection, filter)?;
    qb.push(" RETURNING to_jsonb(t)");
    Ok(qb)
}

pub(crate) fn delete_query(collection: Collection, filter: &Filter) -> StoreResult<QueryBuilder<'static, Postgres>> {
    let mut qb = QueryBuilder::new("DELETE FROM ");
    qb.push(collection.table_name());
    push_where(&mut qb, collection, filter)?;
    Ok(qb)
}

#[async_trait]
impl DataStore for PgStore {
    async fn select(
        &self,
        collection: Collection,
        filter: &Filter,
        order: Option<&OrderBy>,
    ) -> StoreResult<Vec<Value>> {
        let mut qb = select_query(collection, filter, order)?;
        qb.build_query_scalar::<Value>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn insert(&self, collection: Collection, row: Value) -> StoreResult<Value> {
        let mut qb = insert_query(collection, &row)?;
        qb.build_query_scalar::<Value>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: Value,
    ) -> StoreResult<Vec<Value>> {
        let mut qb = update_query(collection, filter, &patch)?;
        qb.build_query_scalar::<Value>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn delete(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        let mut qb = delete_query(collection, filter)?;
        let result = qb.build()
            .execute(&self.pool)
            .await
            .map_err(|e| self.map_err(e))?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn test_select_sql() {
        let filter = Filter::new().eq("id", json!(Uuid::nil())).eq("status", "available");
        let qb = select_query(Collection::Gifts, &filter, Some(&OrderBy::asc("name"))).unwrap();
        assert_eq!(
            qb.sql(),
            "SELECT to_jsonb(t) FROM gifts AS t WHERE id = $1::uuid AND status = $2::text ORDER BY name ASC"
        );
    }

    #[test]
    fn test_conditional_update_sql() {
        let filter = Filter::new().eq("id", json!(Uuid::nil())).eq("status", "available");
        let qb = update_query(Collection::Gifts, &filter, &json!({ "reserved_by": Uuid::nil() })).unwrap();
        assert_eq!(
            qb.sql(),
            "UPDATE gifts AS t SET reserved_by = $1::uuid, updated_at = now() WHERE id = $2::uuid AND status = $3::text RETURNING to_jsonb(t)"
        );
    }

    #[test]
    fn test_null_equality_becomes_is_null() {
        let filter = Filter::new().eq("reserved_by", Value::Null);
        let qb = delete_query(Collection::Gifts, &filter).unwrap();
        assert_eq!(qb.sql(), "DELETE FROM gifts WHERE reserved_by IS NULL");
    }

    #[test]
    fn test_insert_sql() {
        let qb = insert_query(Collection::GiftReservations, &json!({ "gift_id": Uuid::nil() })).unwrap();
        assert_eq!(
            qb.sql(),
            "INSERT INTO gift_reservations AS t (gift_id) VALUES ($1::uuid) RETURNING to_jsonb(t)"
        );

        let qb = insert_query(Collection::Gifts, &json!({})).unwrap();
        assert_eq!(qb.sql(), "INSERT INTO gifts AS t DEFAULT VALUES RETURNING to_jsonb(t)");
    }

    #[test]
    fn test_rejects_unknown_columns() {
        let filter = Filter::new().eq("1=1; --", "x");
        assert!(matches!(
            select_query(Collection::Guests, &filter, None),
            Err(StoreError::InvalidQuery { .. })
        ));
        assert!(matches!(
            update_query(Collection::GiftReservations, &Filter::new(), &json!({})),
            Err(StoreError::InvalidQuery { .. })
        ));
        assert!(update_query(Collection::Guests, &Filter::new(), &json!("status")).is_err());
    }

    #[test]
    fn test_scalar_text() {
        assert_eq!(scalar_text(&json!(3)), Some("3".to_string()));
        assert_eq!(scalar_text(&json!("attending")), Some("attending".to_string()));
        assert_eq!(scalar_text(&Value::Null), None);
    }
}
