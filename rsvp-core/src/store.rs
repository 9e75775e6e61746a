use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Backend collections reachable through the data store client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Guests,
    Gifts,
    GiftReservations,
}

/// Storage type of a column, used by SQL backends to cast bound parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Uuid,
    Text,
    Int,
    Timestamp,
}

impl ColumnType {
    pub fn sql_name(&self) -> &'static str {
        match self {
            ColumnType::Uuid => "uuid",
            ColumnType::Text => "text",
            ColumnType::Int => "int4",
            ColumnType::Timestamp => "timestamptz",
        }
    }
}

const GUEST_COLUMNS: &[(&str, ColumnType)] = &[
    ("id", ColumnType::Uuid),
    ("name", ColumnType::Text),
    ("companions", ColumnType::Int),
    ("status", ColumnType::Text),
    ("created_at", ColumnType::Timestamp),
    ("updated_at", ColumnType::Timestamp),
];

const GIFT_COLUMNS: &[(&str, ColumnType)] = &[
    ("id", ColumnType::Uuid),
    ("name", ColumnType::Text),
    ("description", ColumnType::Text),
    ("status", ColumnType::Text),
    ("reserved_by", ColumnType::Uuid),
    ("image_url", ColumnType::Text),
    ("created_at", ColumnType::Timestamp),
    ("updated_at", ColumnType::Timestamp),
];

const RESERVATION_COLUMNS: &[(&str, ColumnType)] = &[
    ("id", ColumnType::Uuid),
    ("gift_id", ColumnType::Uuid),
    ("guest_id", ColumnType::Uuid),
    ("created_at", ColumnType::Timestamp),
];

impl Collection {
    pub fn table_name(&self) -> &'static str {
        match self {
            Collection::Guests => "guests",
            Collection::Gifts => "gifts",
            Collection::GiftReservations => "gift_reservations",
        }
    }

    pub fn columns(&self) -> &'static [(&'static str, ColumnType)] {
        match self {
            Collection::Guests => GUEST_COLUMNS,
            Collection::Gifts => GIFT_COLUMNS,
            Collection::GiftReservations => RESERVATION_COLUMNS,
        }
    }

    pub fn has_updated_at(&self) -> bool {
        !matches!(self, Collection::GiftReservations)
    }

    /// Columns whose values must be unique across the collection, besides `id`.
    pub fn unique_columns(&self) -> &'static [&'static str] {
        match self {
            Collection::GiftReservations => &["gift_id"],
            _ => &[],
        }
    }

    /// Look up a column, rejecting anything outside the whitelist.
    pub fn column(&self, name: &str) -> StoreResult<ColumnType> {
        self.columns()
            .iter()
            .find(|(col, _)| *col == name)
            .map(|(_, ty)| *ty)
            .ok_or_else(|| StoreError::InvalidQuery {
                message: format!("unknown column {}.{}", self.table_name(), name),
            })
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(String, Value),
    IsNull(String),
}

impl Condition {
    pub fn column(&self) -> &str {
        match self {
            Condition::Eq(col, _) | Condition::IsNull(col) => col,
        }
    }

    pub fn matches(&self, row: &Value) -> bool {
        match self {
            Condition::Eq(col, expected) => row.get(col).map(|v| v == expected).unwrap_or(false),
            Condition::IsNull(col) => row.get(col).map(Value::is_null).unwrap_or(true),
        }
    }
}

/// Conjunction of column conditions. An empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `column = value`. Values are compared in their JSON form, so pass
    /// uuids and enums through `serde_json::json!` or `to_value`.
    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq(column.to_string(), value.into()));
        self
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.conditions.push(Condition::IsNull(column.to_string()));
        self
    }

    pub fn matches(&self, row: &Value) -> bool {
        self.conditions.iter().all(|c| c.matches(row))
    }

    pub fn validate(&self, collection: Collection) -> StoreResult<()> {
        for condition in &self.conditions {
            collection.column(condition.column())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

impl OrderBy {
    pub fn asc(column: &str) -> Self {
        Self { column: column.to_string(), ascending: true }
    }

    pub fn desc(column: &str) -> Self {
        Self { column: column.to_string(), ascending: false }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Constraint violation: {message}")]
    Constraint { message: String },

    #[error("Store transport failure: {message}")]
    Transport { message: String },

    #[error("Store request timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("Malformed row: {message}")]
    Decode { message: String },

    #[error("Invalid query: {message}")]
    InvalidQuery { message: String },
}

impl StoreError {
    /// Uniqueness (or similar) violations are expected protocol outcomes,
    /// everything else is a genuine failure.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, StoreError::Constraint { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Request/response client over the backend collections.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn select(
        &self,
        collection: Collection,
        filter: &Filter,
        order: Option<&OrderBy>,
    ) -> StoreResult<Vec<Value>>;

    /// Insert one row and return it as stored. The store fills in `id`,
    /// `created_at` and `updated_at` when the row leaves them out.
    async fn insert(&self, collection: Collection, row: Value) -> StoreResult<Value>;

    /// Apply `patch` to every row matching `filter`, in one atomic step.
    /// Returns the updated rows; an empty vector means nothing matched.
    async fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: Value,
    ) -> StoreResult<Vec<Value>>;

    /// Remove every row matching `filter`, returning how many went away.
    async fn delete(&self, collection: Collection, filter: &Filter) -> StoreResult<u64>;
}

/// Bounds every call to the wrapped store with a timeout.
pub struct TimedStore<S> {
    inner: S,
    limit: Duration,
}

impl<S> TimedStore<S> {
    pub fn new(inner: S, limit: Duration) -> Self {
        Self { inner, limit }
    }

    async fn bounded<T>(&self, fut: impl std::future::Future<Output = StoreResult<T>>) -> StoreResult<T> {
        match tokio::time::timeout(self.limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Store call exceeded {:?}", self.limit);
                Err(StoreError::Timeout { after: self.limit })
            }
        }
    }
}

#[async_trait]
impl<S: DataStore> DataStore for TimedStore<S> {
    async fn select(
        &self,
        collection: Collection,
        filter: &Filter,
        order: Option<&OrderBy>,
    ) -> StoreResult<Vec<Value>> {
        self.bounded(self.inner.select(collection, filter, order)).await
    }

    async fn insert(&self, collection: Collection, row: Value) -> StoreResult<Value> {
        self.bounded(self.inner.insert(collection, row)).await
    }

    async fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: Value,
    ) -> StoreResult<Vec<Value>> {
        self.bounded(self.inner.update(collection, filter, patch)).await
    }

    async fn delete(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        self.bounded(self.inner.delete(collection, filter)).await
    }
}
