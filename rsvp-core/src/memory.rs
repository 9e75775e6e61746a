use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::cache::{CacheError, CacheResult, GuestCacheBackend};
use crate::store::{Collection, DataStore, Filter, OrderBy, StoreError, StoreResult};
use crate::Guest;

type Table = Vec<Map<String, Value>>;

/// In-process data store. Every primitive runs under one lock, so each
/// call is atomic with respect to every other call, like a single SQL
/// statement would be.
pub struct MemoryStore {
    tables: Mutex<HashMap<Collection, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, HashMap<Collection, Table>>> {
        self.tables.lock().map_err(|_| StoreError::Transport {
            message: "memory store lock poisoned".to_string(),
        })
    }

    /// Number of rows currently held in a collection.
    pub fn count(&self, collection: Collection) -> usize {
        self.lock()
            .map(|tables| tables.get(&collection).map(Vec::len).unwrap_or(0))
            .unwrap_or(0)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn as_object(collection: Collection, value: Value) -> StoreResult<Map<String, Value>> {
    match value {
        Value::Object(map) => {
            for key in map.keys() {
                collection.column(key)?;
            }
            Ok(map)
        }
        other => Err(StoreError::InvalidQuery {
            message: format!("expected an object for {}, got {}", collection, other),
        }),
    }
}

/// Column defaults mirroring the SQL schema.
fn apply_defaults(collection: Collection, row: &mut Map<String, Value>) {
    let now = Value::String(Utc::now().to_rfc3339());
    row.entry("id").or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
    row.entry("created_at").or_insert_with(|| now.clone());
    if collection.has_updated_at() {
        row.entry("updated_at").or_insert_with(|| now.clone());
    }

    match collection {
        Collection::Guests => {
            row.entry("companions").or_insert(Value::from(0));
            row.entry("status").or_insert(Value::from("pending"));
        }
        Collection::Gifts => {
            row.entry("description").or_insert(Value::from(""));
            row.entry("status").or_insert(Value::from("available"));
            row.entry("reserved_by").or_insert(Value::Null);
            row.entry("image_url").or_insert(Value::Null);
        }
        Collection::GiftReservations => {}
    }
}

fn check_unique(collection: Collection, rows: &[Map<String, Value>]) -> StoreResult<()> {
    for column in std::iter::once(&"id").chain(collection.unique_columns()) {
        let mut seen = HashSet::new();
        for row in rows {
            match row.get(*column) {
                None | Some(Value::Null) => continue,
                Some(value) => {
                    if !seen.insert(value.to_string()) {
                        return Err(StoreError::Constraint {
                            message: format!(
                                "duplicate key value violates unique constraint on {}.{}",
                                collection, column
                            ),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn select(
        &self,
        collection: Collection,
        filter: &Filter,
        order: Option<&OrderBy>,
    ) -> StoreResult<Vec<Value>> {
        filter.validate(collection)?;
        if let Some(order) = order {
            collection.column(&order.column)?;
        }

        let tables = self.lock()?;
        let mut rows: Vec<Value> = tables
            .get(&collection)
            .map(|table| {
                table
                    .iter()
                    .map(|row| Value::Object(row.clone()))
                    .filter(|row| filter.matches(row))
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = order {
            rows.sort_by(|a, b| {
                let ord = compare(a.get(&order.column), b.get(&order.column));
                if order.ascending { ord } else { ord.reverse() }
            });
        }

        Ok(rows)
    }

    async fn insert(&self, collection: Collection, row: Value) -> StoreResult<Value> {
        let mut row = as_object(collection, row)?;
        apply_defaults(collection, &mut row);

        let mut tables = self.lock()?;
        let table = tables.entry(collection).or_default();

        table.push(row.clone());
        if let Err(e) = check_unique(collection, table) {
            table.pop();
            return Err(e);
        }

        Ok(Value::Object(row))
    }

    async fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: Value,
    ) -> StoreResult<Vec<Value>> {
        filter.validate(collection)?;
        let patch = as_object(collection, patch)?;
        let now = Value::String(Utc::now().to_rfc3339());

        let mut tables = self.lock()?;
        let table = tables.entry(collection).or_default();

        // Stage the new table so a constraint failure leaves it untouched
        let mut staged = table.clone();
        let mut updated = Vec::new();
        for row in staged.iter_mut() {
            if !filter.matches(&Value::Object(row.clone())) {
                continue;
            }
            for (key, value) in &patch {
                row.insert(key.clone(), value.clone());
            }
            if collection.has_updated_at() {
                row.insert("updated_at".to_string(), now.clone());
            }
            updated.push(Value::Object(row.clone()));
        }

        check_unique(collection, &staged)?;
        *table = staged;

        Ok(updated)
    }

    async fn delete(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        filter.validate(collection)?;

        let mut tables = self.lock()?;
        let table = tables.entry(collection).or_default();
        let before = table.len();
        table.retain(|row| !filter.matches(&Value::Object(row.clone())));

        Ok((before - table.len()) as u64)
    }
}

#[derive(Default, Clone)]
struct CacheEntry {
    guest: Option<Guest>,
    reserved_gift: Option<Uuid>,
}

/// Process-local guest cache keyed by session id.
pub struct MemoryGuestCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryGuestCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn with_entry<T>(&self, session: &str, f: impl FnOnce(&mut CacheEntry) -> T) -> CacheResult<T> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CacheError::Backend("memory cache lock poisoned".to_string()))?;
        Ok(f(entries.entry(session.to_string()).or_default()))
    }
}

impl Default for MemoryGuestCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GuestCacheBackend for MemoryGuestCache {
    async fn load_guest(&self, session: &str) -> CacheResult<Option<Guest>> {
        self.with_entry(session, |e| e.guest.clone())
    }

    async fn store_guest(&self, session: &str, guest: &Guest) -> CacheResult<()> {
        self.with_entry(session, |e| e.guest = Some(guest.clone()))
    }

    async fn clear_guest(&self, session: &str) -> CacheResult<()> {
        self.with_entry(session, |e| e.guest = None)
    }

    async fn reserved_gift(&self, session: &str) -> CacheResult<Option<Uuid>> {
        self.with_entry(session, |e| e.reserved_gift)
    }

    async fn set_reserved_gift(&self, session: &str, gift_id: Uuid) -> CacheResult<()> {
        self.with_entry(session, |e| e.reserved_gift = Some(gift_id))
    }

    async fn clear_reserved_gift(&self, session: &str) -> CacheResult<()> {
        self.with_entry(session, |e| e.reserved_gift = None)
    }
}
